//! Text-to-speech engine abstraction for VoxCast
//!
//! This crate provides the core of the library: the engine capability
//! interface, runtime engine selection, the utterance state machine,
//! parameter management with clamping and reconciliation, and the
//! `TextToSpeech` facade that ties them together.
//!
//! Use [`TextToSpeech::say`] to start synthesizing text. The speaking
//! lifecycle is asynchronous; completion is observed through
//! [`TtsEvent::StateChanged`] notifications, not call-site errors.

use std::sync::atomic::{AtomicU64, Ordering};

pub mod engine;
pub mod engines;
pub mod events;
pub mod params;
pub mod state_machine;
pub mod synthesizer;
pub mod types;

pub use engine::{
    CompletionSender, EngineCapabilities, EngineFactory, EngineInfo, EngineRegistry,
    ParameterKind, ParameterUpdate, PauseSupport, TtsEngine,
};
pub use synthesizer::TextToSpeech;
pub use types::{
    EngineState, SpeakOutcome, SpeechParameters, TtsConfig, TtsEvent, Utterance, Voice,
};
pub use voxcast_foundation::{EngineError, Locale, VoxCastError};

/// Generates unique utterance IDs
static UTTERANCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique utterance ID
pub fn next_utterance_id() -> u64 {
    UTTERANCE_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}
