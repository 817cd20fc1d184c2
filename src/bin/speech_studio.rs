//! `speech-studio` -- command-line front end for the speech studio.
//!
//! - `speech-studio speak <TEXT>` -- narrate text with one voice.
//! - `speech-studio story <TOPIC>` -- generate a short story and read it aloud.
//! - `speech-studio dialogue <TOPIC> --speaker A=Kore --speaker B=Puck` -- two-speaker dialogue.
//! - `speech-studio text <PROMPT>` -- plain text generation.
//! - `speech-studio voices` -- list voices and effects.
//!
//! API keys are read from `GEMINI_API_KEY` (or `API_KEY`). Log level follows
//! `RUST_LOG` unless `--verbose` is given.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use speech_studio::audio::{Effect, MemorySink, OutputSink, PlaybackReport, WavFileSink};
use speech_studio::{SpeakerVoice, Studio, StudioConfig, TextGenerator, Voice};
use tracing_subscriber::EnvFilter;

/// Text-to-speech studio powered by Gemini.
#[derive(Parser)]
#[command(name = "speech-studio", about = "Text-to-speech studio powered by Gemini", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// YAML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Narrate text with a single voice.
    Speak {
        text: String,
        #[arg(long)]
        voice: Option<Voice>,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Generate a short story about a topic and read it aloud.
    Story {
        topic: String,
        #[arg(long)]
        voice: Option<Voice>,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Generate and perform a two-speaker dialogue.
    Dialogue {
        topic: String,
        /// Speaker and voice as NAME=VOICE; give exactly two.
        #[arg(long = "speaker", num_args = 1, required = true)]
        speakers: Vec<SpeakerVoice>,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Generate text only.
    Text { prompt: String },

    /// List available voices and effects.
    Voices,
}

#[derive(Args)]
struct OutputArgs {
    /// Effect applied to playback: none, reverb or echo.
    #[arg(long)]
    effect: Option<Effect>,

    /// Where to save the generated speech as WAV.
    #[arg(short, long, default_value = "speech.wav")]
    out: PathBuf,

    /// Write each rendered playback (with effect) into this directory.
    #[arg(long)]
    render_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("speech_studio=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    if let Err(e) = run(cli).await {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => StudioConfig::load(path)?,
        None => StudioConfig::from_env()?,
    };

    match cli.command {
        Commands::Voices => {
            println!("Voices:");
            for v in Voice::ALL {
                println!("  {:<8} {}", v.as_str(), v.description());
            }
            println!("Effects:");
            for e in Effect::ALL {
                println!("  {:<8} {}", e.as_str(), e.label());
            }
            Ok(())
        }
        Commands::Text { prompt } => {
            let studio = Studio::with_gemini(config)?;
            let text = studio.backend().generate_text(&prompt).await.map_err(user_facing)?;
            println!("{}", text);
            Ok(())
        }
        Commands::Speak {
            text,
            voice,
            output,
        } => {
            let voice = voice.unwrap_or(config.default_voice);
            let effect = output.effect.unwrap_or(config.default_effect);
            let mut studio = open_studio(config, &output)?;
            let report = studio.speak(&text, voice, effect).await.map_err(user_facing)?;
            finish(&mut studio, &report, &output)
        }
        Commands::Story {
            topic,
            voice,
            output,
        } => {
            let voice = voice.unwrap_or(config.default_voice);
            let effect = output.effect.unwrap_or(config.default_effect);
            let mut studio = open_studio(config, &output)?;
            let story = studio
                .tell_story(&topic, voice, effect)
                .await
                .map_err(user_facing)?;
            println!("{}\n", story.text);
            finish(&mut studio, &story.playback, &output)
        }
        Commands::Dialogue {
            topic,
            speakers,
            output,
        } => {
            let speakers: [SpeakerVoice; 2] = speakers
                .try_into()
                .map_err(|_| anyhow::anyhow!("a dialogue needs exactly two --speaker entries"))?;
            let effect = output.effect.unwrap_or(config.default_effect);
            let mut studio = open_studio(config, &output)?;
            let dialogue = studio
                .perform_dialogue(&topic, &speakers, effect)
                .await
                .map_err(user_facing)?;
            println!("{}\n", dialogue.script);
            finish(&mut studio, &dialogue.playback, &output)
        }
    }
}

fn open_studio(
    config: StudioConfig,
    output: &OutputArgs,
) -> anyhow::Result<Studio<speech_studio::GeminiClient>> {
    let sink: Box<dyn OutputSink> = match &output.render_dir {
        Some(dir) => Box::new(WavFileSink::new(dir)?),
        None => Box::new(MemorySink::new()),
    };
    let mut studio = Studio::with_gemini(config)?;
    studio.activate(sink).context("failed to open audio session")?;
    Ok(studio)
}

fn finish<B>(studio: &mut Studio<B>, report: &PlaybackReport, output: &OutputArgs) -> anyhow::Result<()>
where
    B: speech_studio::SpeechSynthesizer + TextGenerator,
{
    println!(
        "played {:.2}s ({} ch, effect: {})",
        report.duration_secs, report.output_channels, report.effect
    );
    let wav = studio.export_wav_to(&output.out).map_err(user_facing)?;
    println!(
        "saved {} ({} bytes, {})",
        output.out.display(),
        wav.bytes().len(),
        wav.mime_type()
    );
    Ok(())
}

fn user_facing(e: speech_studio::Error) -> anyhow::Error {
    tracing::debug!(error = %e, "command failed");
    anyhow::anyhow!(e.user_message())
}
