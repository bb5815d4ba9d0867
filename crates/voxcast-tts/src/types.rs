//! Core types for the speaking lifecycle

use serde::{Deserialize, Serialize};
use std::time::Instant;

use voxcast_foundation::Locale;

/// Default volume when the configuration does not set one.
pub const DEFAULT_VOLUME: u8 = 80;

/// State of the speech synthesizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Ready to start a new text. Also the state after a text finished
    /// or was stopped.
    Ready,
    /// The current text is being spoken.
    Speaking,
    /// Synthesis was paused and can be resumed.
    Paused,
    /// The engine was unable to synthesize the current text. Recoverable
    /// by a later successful `say`, except when no engine could be
    /// selected at all.
    BackendError,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Ready => write!(f, "ready"),
            EngineState::Speaking => write!(f, "speaking"),
            EngineState::Paused => write!(f, "paused"),
            EngineState::BackendError => write!(f, "backend-error"),
        }
    }
}

/// A voice as reported by an engine.
///
/// This is a snapshot, not a live reference; engines hand out fresh
/// descriptors on every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Human-readable voice name
    pub name: String,
    /// The locale this voice speaks
    pub locale: Locale,
    /// Gender/variant tag, opaque to the library (e.g. "M", "F", "-")
    pub variant: String,
    /// Engine-specific identifier, opaque token
    pub token: String,
}

/// Speech parameters applied to an utterance.
///
/// Pitch and rate are in [-1.0, 1.0] with 0.0 as normal speech; volume
/// is in [0, 100]. Out-of-range input is clamped by the parameter
/// manager, never rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechParameters {
    pub pitch: f32,
    pub rate: f32,
    pub volume: u8,
    pub locale: Locale,
    /// Selected voice; `None` means the engine default.
    pub voice: Option<Voice>,
}

impl Default for SpeechParameters {
    fn default() -> Self {
        Self {
            pitch: 0.0,
            rate: 0.0,
            volume: DEFAULT_VOLUME,
            locale: Locale::default(),
            voice: None,
        }
    }
}

/// One in-flight unit of text submitted for synthesis, with its own
/// parameter snapshot. At most one utterance is alive per synthesizer.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub id: u64,
    pub text: String,
    pub queued_at: Instant,
    pub params: SpeechParameters,
}

impl Utterance {
    pub fn new(id: u64, text: impl Into<String>, params: SpeechParameters) -> Self {
        Self {
            id,
            text: text.into(),
            queued_at: Instant::now(),
            params,
        }
    }
}

/// Outcome of one dispatched utterance, delivered by the engine through
/// its completion sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Playback ran to the end of the text.
    Completed,
    /// Playback was cancelled.
    Stopped,
    /// The engine failed; the reason is an opaque adapter string.
    Failed(String),
}

/// Change notifications republished to subscribers.
///
/// One notification per observed change; no-op sets produce nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum TtsEvent {
    StateChanged(EngineState),
    PitchChanged(f32),
    RateChanged(f32),
    VolumeChanged(u8),
    LocaleChanged(Locale),
    VoiceChanged(Voice),
}

/// Synthesizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Preferred engine ID, tried first during selection
    pub preferred_engine: Option<String>,
    /// Fallback engine IDs to try in order
    pub fallback_engines: Vec<String>,
    /// Initial locale; `None` means the system locale
    pub locale: Option<Locale>,
    /// Initial voice name, resolved against the selected engine
    pub voice: Option<String>,
    /// Initial pitch in [-1.0, 1.0]
    pub pitch: f32,
    /// Initial rate in [-1.0, 1.0]
    pub rate: f32,
    /// Initial volume in [0, 100]
    pub volume: u8,
}

impl Default for TtsConfig {
    fn default() -> Self {
        // Allow overriding the engine choice from the environment
        let preferred_engine = std::env::var("VOXCAST_ENGINE").ok();

        Self {
            preferred_engine,
            fallback_engines: vec!["espeak".to_string(), "noop".to_string()],
            locale: None,
            voice: None,
            pitch: 0.0,
            rate: 0.0,
            volume: DEFAULT_VOLUME,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_parameters_are_neutral() {
        let params = SpeechParameters::default();
        assert_eq!(params.pitch, 0.0);
        assert_eq!(params.rate, 0.0);
        assert_eq!(params.volume, DEFAULT_VOLUME);
        assert!(params.voice.is_none());
    }

    #[test]
    fn utterance_snapshot_is_independent() {
        let mut params = SpeechParameters::default();
        let utterance = Utterance::new(1, "hello", params.clone());
        params.volume = 10;
        assert_eq!(utterance.params.volume, DEFAULT_VOLUME);
        assert_eq!(utterance.text, "hello");
    }

    #[test]
    #[serial]
    fn config_reads_engine_from_env() {
        std::env::set_var("VOXCAST_ENGINE", "noop");
        let config = TtsConfig::default();
        assert_eq!(config.preferred_engine.as_deref(), Some("noop"));
        std::env::remove_var("VOXCAST_ENGINE");
    }

    #[test]
    #[serial]
    fn config_without_env_has_no_preference() {
        std::env::remove_var("VOXCAST_ENGINE");
        let config = TtsConfig::default();
        assert!(config.preferred_engine.is_none());
        assert_eq!(config.fallback_engines, vec!["espeak", "noop"]);
    }

    #[test]
    fn engine_state_display() {
        assert_eq!(EngineState::Ready.to_string(), "ready");
        assert_eq!(EngineState::BackendError.to_string(), "backend-error");
    }
}
