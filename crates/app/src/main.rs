//! voxcast command-line frontend
//!
//! Speaks text through the best available speech engine and exposes
//! small inspection subcommands for voices, locales and engines.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use voxcast_foundation::Locale;
use voxcast_tts::{EngineRegistry, EngineState, TextToSpeech, TtsConfig};

#[derive(Parser)]
#[command(
    name = "voxcast",
    about = "Speak text through the best available speech engine"
)]
struct Cli {
    /// Engine to prefer (e.g. "espeak", "noop")
    #[arg(long, global = true, env = "VOXCAST_ENGINE")]
    engine: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Speak the given text and wait until playback finishes
    Say {
        text: String,

        /// Pitch in [-1.0, 1.0]; out-of-range values are clamped
        #[arg(long)]
        pitch: Option<f32>,

        /// Rate in [-1.0, 1.0]; out-of-range values are clamped
        #[arg(long)]
        rate: Option<f32>,

        /// Volume in [0, 100]; out-of-range values are clamped
        #[arg(long)]
        volume: Option<i32>,

        /// Locale tag such as en-US or de
        #[arg(long)]
        locale: Option<String>,

        /// Voice name, resolved against the selected engine
        #[arg(long)]
        voice: Option<String>,
    },
    /// List voices, optionally restricted to a locale
    Voices {
        #[arg(long)]
        locale: Option<String>,
    },
    /// List locales of the selected engine
    Locales,
    /// List registered engines and their availability
    Engines,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn base_config(engine: Option<String>) -> TtsConfig {
    let mut config = TtsConfig::default();
    if let Some(engine) = engine {
        config.preferred_engine = Some(engine);
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let registry = EngineRegistry::with_defaults();

    match cli.command {
        Command::Engines => {
            for info in registry.available_engines() {
                println!(
                    "{:10} {:24} {}",
                    info.id,
                    info.name,
                    if info.is_available {
                        "available"
                    } else {
                        "unavailable"
                    }
                );
            }
            Ok(())
        }
        Command::Say {
            text,
            pitch,
            rate,
            volume,
            locale,
            voice,
        } => {
            let mut config = base_config(cli.engine);
            if let Some(pitch) = pitch {
                config.pitch = pitch;
            }
            if let Some(rate) = rate {
                config.rate = rate;
            }
            if let Some(volume) = volume {
                config.volume = volume.clamp(0, 100) as u8;
            }
            if let Some(locale) = locale {
                config.locale = Some(Locale::new(locale));
            }
            config.voice = voice;

            let mut tts = TextToSpeech::new(&registry, config).await;
            tts.say(text).await?;
            loop {
                tts.poll();
                match tts.state() {
                    EngineState::Ready => break,
                    EngineState::BackendError => {
                        bail!(
                            "synthesis failed: {}",
                            tts.last_error().unwrap_or("unknown engine error")
                        );
                    }
                    _ => tokio::time::sleep(Duration::from_millis(50)).await,
                }
            }
            Ok(())
        }
        Command::Voices { locale } => {
            let tts = TextToSpeech::new(&registry, base_config(cli.engine)).await;
            let Some(info) = tts.engine_info() else {
                bail!("no speech engine available");
            };
            let filter = locale.map(Locale::new);
            println!("Voices of {}:", info.id);
            for voice in tts.available_voices(filter.as_ref()) {
                println!(
                    "{:32} {:10} {:3} {}",
                    voice.name, voice.locale, voice.variant, voice.token
                );
            }
            Ok(())
        }
        Command::Locales => {
            let tts = TextToSpeech::new(&registry, base_config(cli.engine)).await;
            let Some(info) = tts.engine_info() else {
                bail!("no speech engine available");
            };
            println!("Locales of {}:", info.id);
            for locale in tts.available_locales() {
                println!("{}", locale);
            }
            Ok(())
        }
    }
}
