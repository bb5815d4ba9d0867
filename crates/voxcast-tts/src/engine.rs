//! Engine Adapter Architecture
//!
//! This module defines the capability interface for text-to-speech
//! engines. Any speech backend (speech-dispatcher, espeak, cloud APIs,
//! etc.) implements these traits; the rest of the library never talks
//! to a platform engine directly.

use async_trait::async_trait;
use std::fmt::Debug;
use tokio::sync::mpsc;

use voxcast_foundation::{EngineError, Locale, VoxCastError};

use crate::types::{SpeakOutcome, TtsConfig, Utterance, Voice};

/// Metadata about a speech engine
#[derive(Debug, Clone)]
pub struct EngineInfo {
    /// Unique identifier for the engine (e.g. "espeak", "noop")
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Brief description of the engine
    pub description: String,

    /// Whether this engine requires network access
    pub requires_network: bool,

    /// Whether this engine synthesizes locally
    pub is_local: bool,

    /// Whether this engine is currently usable on the system
    pub is_available: bool,
}

/// How an engine honors pause requests.
///
/// Declared explicitly so callers never depend on an adapter silently
/// no-op-ing. Some platforms can only stop the current utterance and
/// restart it from the beginning on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PauseSupport {
    /// The engine cannot pause at all; a pause request is a failure.
    #[default]
    Unsupported,
    /// Pause cancels playback; resume restarts the utterance from the
    /// beginning.
    RestartsUtterance,
    /// Pause suspends playback; resume continues mid-utterance.
    ResumesMidUtterance,
}

/// Capabilities a speech engine declares up front
#[derive(Debug, Clone, Copy)]
pub struct EngineCapabilities {
    /// Pause/resume fidelity
    pub pause: PauseSupport,

    /// Whether pitch changes take effect
    pub pitch_control: bool,

    /// Whether rate changes take effect
    pub rate_control: bool,

    /// Whether volume changes take effect
    pub volume_control: bool,

    /// Whether a specific voice can be selected
    pub voice_selection: bool,
}

impl Default for EngineCapabilities {
    fn default() -> Self {
        Self {
            pause: PauseSupport::Unsupported,
            pitch_control: true,
            rate_control: true,
            volume_control: true,
            voice_selection: true,
        }
    }
}

/// Identifies one speech parameter for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Pitch,
    Rate,
    Volume,
    Locale,
    Voice,
}

/// A typed parameter value pushed to or read back from an engine.
///
/// `set_parameter` returns the value the engine actually applied, which
/// may be coerced (quantized, clamped to the engine's own range, or a
/// different voice entirely).
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterUpdate {
    Pitch(f32),
    Rate(f32),
    Volume(u8),
    Locale(Locale),
    Voice(Voice),
}

impl ParameterUpdate {
    pub fn kind(&self) -> ParameterKind {
        match self {
            ParameterUpdate::Pitch(_) => ParameterKind::Pitch,
            ParameterUpdate::Rate(_) => ParameterKind::Rate,
            ParameterUpdate::Volume(_) => ParameterKind::Volume,
            ParameterUpdate::Locale(_) => ParameterKind::Locale,
            ParameterUpdate::Voice(_) => ParameterKind::Voice,
        }
    }
}

/// Completion signal for one dispatched utterance.
///
/// `dispatch_id` identifies the dispatch generation, not the utterance;
/// the state machine uses it to discard signals from superseded
/// dispatches (stopped, replaced, or restarted after pause).
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    pub dispatch_id: u64,
    pub outcome: SpeakOutcome,
}

/// Handed to an engine with each `speak` call. The engine must deliver
/// exactly one outcome through it, from whatever thread or task its
/// playback runs on; delivery is marshaled onto the control context by
/// the facade.
#[derive(Debug, Clone)]
pub struct CompletionSender {
    dispatch_id: u64,
    tx: mpsc::UnboundedSender<CompletionSignal>,
}

impl CompletionSender {
    pub(crate) fn new(dispatch_id: u64, tx: mpsc::UnboundedSender<CompletionSignal>) -> Self {
        Self { dispatch_id, tx }
    }

    /// Report the outcome of the dispatched utterance.
    pub fn complete(&self, outcome: SpeakOutcome) {
        let signal = CompletionSignal {
            dispatch_id: self.dispatch_id,
            outcome,
        };
        // The receiver is gone only when the synthesizer was dropped.
        let _ = self.tx.send(signal);
    }
}

/// The main trait that all speech engines must implement
#[async_trait]
pub trait TtsEngine: Send + Sync + Debug {
    /// Get engine metadata
    fn info(&self) -> EngineInfo;

    /// Get the engine's declared capabilities
    fn capabilities(&self) -> EngineCapabilities;

    /// Check if the engine is usable right now
    async fn is_available(&self) -> bool;

    /// Initialize the engine with configuration. Called once before any
    /// other operation; also regenerates the voice and locale catalogs.
    async fn initialize(&mut self, config: TtsConfig) -> Result<(), EngineError>;

    /// Voices available for the given locale, or all voices when no
    /// locale is given. Never fails; an unsupported locale yields an
    /// empty vector.
    fn voices(&self, locale: Option<&Locale>) -> Vec<Voice>;

    /// Locales this engine can currently speak
    fn locales(&self) -> Vec<Locale>;

    /// Start speaking the utterance with its parameter snapshot.
    ///
    /// Returns once dispatch is accepted. The engine must eventually
    /// deliver exactly one [`SpeakOutcome`] through `completion`.
    async fn speak(
        &mut self,
        utterance: &Utterance,
        completion: CompletionSender,
    ) -> Result<(), EngineError>;

    /// Cancel playback. Idempotent, also when nothing is speaking.
    async fn stop(&mut self) -> Result<(), EngineError>;

    /// Pause playback, honoring the declared [`PauseSupport`]. Engines
    /// declaring `Unsupported` are never asked.
    async fn pause(&mut self) -> Result<(), EngineError>;

    /// Resume paused playback. For `RestartsUtterance` engines this is
    /// a no-op; the caller re-dispatches the retained utterance.
    async fn resume(&mut self) -> Result<(), EngineError>;

    /// Apply one parameter, returning the value actually applied so the
    /// caller can reconcile.
    async fn set_parameter(
        &mut self,
        update: ParameterUpdate,
    ) -> Result<ParameterUpdate, EngineError>;

    /// Read back the current value of one parameter.
    async fn parameter(&self, kind: ParameterKind) -> Result<ParameterUpdate, EngineError>;
}

/// Factory for creating speech engines
pub trait EngineFactory: Send + Sync {
    /// Create a new instance of the engine
    fn create(&self) -> Result<Box<dyn TtsEngine>, EngineError>;

    /// Get engine info without creating an instance
    fn engine_info(&self) -> EngineInfo;

    /// Check if the engine's requirements are met
    fn check_requirements(&self) -> Result<(), EngineError>;
}

/// Registry holding the compiled-in engine factories.
///
/// Selection is a one-shot decision at synthesizer construction: the
/// first engine whose requirements check passes and that initializes
/// without error wins. There is no retry or backoff; engine
/// availability rarely changes without full reinitialization.
#[derive(Default)]
pub struct EngineRegistry {
    factories: Vec<Box<dyn EngineFactory>>,
    preferred_order: Vec<String>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the bundled engines in priority order:
    /// platform-preferred espeak first, the generic noop fallback last.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crate::engines::espeak::EspeakEngineFactory::new()));
        registry.register(Box::new(crate::engines::noop::NoOpEngineFactory));
        registry
    }

    /// Register a new engine factory
    pub fn register(&mut self, factory: Box<dyn EngineFactory>) {
        self.factories.push(factory);
    }

    /// Set the preferred order of engines to try
    pub fn set_preferred_order(&mut self, order: Vec<String>) {
        self.preferred_order = order;
    }

    /// All registered engines, with availability filled in
    pub fn available_engines(&self) -> Vec<EngineInfo> {
        self.factories
            .iter()
            .map(|f| {
                let mut info = f.engine_info();
                info.is_available = f.check_requirements().is_ok();
                info
            })
            .collect()
    }

    /// Create an engine by ID
    pub fn create_engine(&self, id: &str) -> Result<Box<dyn TtsEngine>, EngineError> {
        self.factories
            .iter()
            .find(|f| f.engine_info().id == id)
            .ok_or_else(|| EngineError::NotAvailable {
                reason: format!("Engine '{id}' not found"),
            })?
            .create()
    }

    /// Select and initialize the best available engine.
    ///
    /// Candidates are tried in order: the configured preferred engine,
    /// the configured fallbacks, the registry's preferred order, then
    /// every remaining factory in registration order. The first engine
    /// that creates and initializes successfully is returned.
    pub async fn select(&self, config: &TtsConfig) -> Result<Box<dyn TtsEngine>, VoxCastError> {
        for id in self.candidate_order(config) {
            let factory = match self.factories.iter().find(|f| f.engine_info().id == id) {
                Some(f) => f,
                None => {
                    tracing::debug!("Configured engine '{}' is not registered", id);
                    continue;
                }
            };

            if let Err(e) = factory.check_requirements() {
                tracing::warn!("Engine '{}' unavailable: {}", id, e);
                continue;
            }

            let mut engine = match factory.create() {
                Ok(engine) => engine,
                Err(e) => {
                    tracing::warn!("Engine '{}' failed to create: {}", id, e);
                    continue;
                }
            };

            match engine.initialize(config.clone()).await {
                Ok(()) => {
                    tracing::info!("Selected speech engine '{}'", id);
                    return Ok(engine);
                }
                Err(e) => {
                    tracing::warn!("Engine '{}' failed to initialize: {}", id, e);
                }
            }
        }

        Err(VoxCastError::NoEngineAvailable)
    }

    fn candidate_order(&self, config: &TtsConfig) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        let mut push = |id: &str, order: &mut Vec<String>| {
            if !order.iter().any(|o| o == id) {
                order.push(id.to_string());
            }
        };

        if let Some(preferred) = &config.preferred_engine {
            push(preferred, &mut order);
        }
        for id in &config.fallback_engines {
            push(id, &mut order);
        }
        for id in &self.preferred_order {
            push(id, &mut order);
        }
        for factory in &self.factories {
            push(&factory.engine_info().id, &mut order);
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::noop::NoOpEngineFactory;

    fn bare_config() -> TtsConfig {
        TtsConfig {
            preferred_engine: None,
            fallback_engines: Vec::new(),
            ..TtsConfig::default()
        }
    }

    #[test]
    fn parameter_update_kind() {
        assert_eq!(ParameterUpdate::Pitch(0.0).kind(), ParameterKind::Pitch);
        assert_eq!(
            ParameterUpdate::Volume(50).kind(),
            ParameterKind::Volume
        );
    }

    #[test]
    fn empty_registry_lists_nothing() {
        let registry = EngineRegistry::new();
        assert!(registry.available_engines().is_empty());
    }

    #[tokio::test]
    async fn empty_registry_selects_nothing() {
        let registry = EngineRegistry::new();
        let result = registry.select(&bare_config()).await;
        assert!(matches!(result, Err(VoxCastError::NoEngineAvailable)));
    }

    #[tokio::test]
    async fn selection_falls_through_to_registration_order() {
        let mut registry = EngineRegistry::new();
        registry.register(Box::new(NoOpEngineFactory));
        let engine = registry.select(&bare_config()).await.unwrap();
        assert_eq!(engine.info().id, "noop");
    }

    #[tokio::test]
    async fn preferred_engine_wins() {
        let mut registry = EngineRegistry::new();
        registry.register(Box::new(NoOpEngineFactory));
        let config = TtsConfig {
            preferred_engine: Some("noop".to_string()),
            fallback_engines: vec!["missing".to_string()],
            ..bare_config()
        };
        let engine = registry.select(&config).await.unwrap();
        assert_eq!(engine.info().id, "noop");
    }

    #[test]
    fn create_engine_unknown_id_errors() {
        let registry = EngineRegistry::new();
        let result = registry.create_engine("bogus");
        assert!(matches!(
            result,
            Err(EngineError::NotAvailable { .. })
        ));
    }

    #[test]
    fn candidate_order_deduplicates() {
        let mut registry = EngineRegistry::new();
        registry.register(Box::new(NoOpEngineFactory));
        let config = TtsConfig {
            preferred_engine: Some("noop".to_string()),
            fallback_engines: vec!["noop".to_string(), "espeak".to_string()],
            ..bare_config()
        };
        let order = registry.candidate_order(&config);
        assert_eq!(order, vec!["noop".to_string(), "espeak".to_string()]);
    }
}
