//! Mock speech engine for testing
//!
//! The engine itself is handed to the synthesizer; a cloneable
//! [`MockHandle`] stays with the test and remote-controls outcomes:
//! deferring completions, inducing failures, coercing parameters, and
//! inspecting recorded calls.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use voxcast_foundation::{EngineError, Locale};

use crate::engine::{
    CompletionSender, EngineCapabilities, EngineFactory, EngineInfo, ParameterKind,
    ParameterUpdate, PauseSupport, TtsEngine,
};
use crate::types::{SpeakOutcome, SpeechParameters, TtsConfig, Utterance, Voice};

/// Configuration for mock behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Fail `initialize` with this reason
    pub fail_initialize: Option<String>,

    /// Fail every `speak` dispatch with this reason
    pub fail_speak: Option<String>,

    /// Deliver `Completed` during `speak` instead of waiting for the
    /// handle
    pub complete_instantly: bool,

    /// Declared pause fidelity
    pub pause: PauseSupport,

    /// Fail `pause` requests with this reason
    pub fail_pause: Option<String>,

    /// Coerce every applied pitch to this value
    pub coerce_pitch: Option<f32>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            fail_initialize: None,
            fail_speak: None,
            complete_instantly: false,
            pause: PauseSupport::ResumesMidUtterance,
            fail_pause: None,
            coerce_pitch: None,
        }
    }
}

#[derive(Debug)]
struct MockShared {
    params: SpeechParameters,
    pending: Option<CompletionSender>,
    speak_calls: Vec<(u64, String)>,
    stop_calls: usize,
    pause_calls: usize,
    resume_calls: usize,
    initialized: bool,
}

impl MockShared {
    fn new() -> Self {
        Self {
            params: SpeechParameters {
                locale: Locale::new("en-US"),
                voice: Some(voice_catalog().remove(0)),
                ..SpeechParameters::default()
            },
            pending: None,
            speak_calls: Vec::new(),
            stop_calls: 0,
            pause_calls: 0,
            resume_calls: 0,
            initialized: false,
        }
    }
}

fn voice_catalog() -> Vec<Voice> {
    vec![
        Voice {
            name: "alice".to_string(),
            locale: Locale::new("en-US"),
            variant: "F".to_string(),
            token: "mock:alice".to_string(),
        },
        Voice {
            name: "brian".to_string(),
            locale: Locale::new("en-GB"),
            variant: "M".to_string(),
            token: "mock:brian".to_string(),
        },
        Voice {
            name: "helga".to_string(),
            locale: Locale::new("de-DE"),
            variant: "F".to_string(),
            token: "mock:helga".to_string(),
        },
    ]
}

/// Mock speech engine
#[derive(Debug)]
pub struct MockEngine {
    config: MockConfig,
    shared: Arc<Mutex<MockShared>>,
}

/// Test-side remote control for a [`MockEngine`]
#[derive(Debug, Clone)]
pub struct MockHandle {
    shared: Arc<Mutex<MockShared>>,
}

impl MockHandle {
    /// Deliver the outcome for the pending dispatch. Returns `false`
    /// when no dispatch is pending.
    pub fn complete(&self, outcome: SpeakOutcome) -> bool {
        match self.shared.lock().pending.take() {
            Some(sender) => {
                sender.complete(outcome);
                true
            }
            None => false,
        }
    }

    pub fn speak_count(&self) -> usize {
        self.shared.lock().speak_calls.len()
    }

    pub fn last_spoken(&self) -> Option<(u64, String)> {
        self.shared.lock().speak_calls.last().cloned()
    }

    pub fn stop_calls(&self) -> usize {
        self.shared.lock().stop_calls
    }

    pub fn pause_calls(&self) -> usize {
        self.shared.lock().pause_calls
    }

    pub fn resume_calls(&self) -> usize {
        self.shared.lock().resume_calls
    }

    pub fn applied_params(&self) -> SpeechParameters {
        self.shared.lock().params.clone()
    }
}

#[async_trait]
impl TtsEngine for MockEngine {
    fn info(&self) -> EngineInfo {
        EngineInfo {
            id: "mock".to_string(),
            name: "Mock TTS".to_string(),
            description: "Configurable mock engine for testing".to_string(),
            requires_network: false,
            is_local: true,
            is_available: true,
        }
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            pause: self.config.pause,
            ..EngineCapabilities::default()
        }
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn initialize(&mut self, _config: TtsConfig) -> Result<(), EngineError> {
        if let Some(reason) = &self.config.fail_initialize {
            return Err(EngineError::InitializationFailed(reason.clone()));
        }
        self.shared.lock().initialized = true;
        Ok(())
    }

    fn voices(&self, locale: Option<&Locale>) -> Vec<Voice> {
        let all = voice_catalog();
        match locale {
            None => all,
            Some(locale) => {
                let exact: Vec<Voice> =
                    all.iter().filter(|v| &v.locale == locale).cloned().collect();
                if !exact.is_empty() {
                    return exact;
                }
                all.into_iter()
                    .filter(|v| v.locale.matches_language(locale))
                    .collect()
            }
        }
    }

    fn locales(&self) -> Vec<Locale> {
        let mut locales: Vec<Locale> = voice_catalog().into_iter().map(|v| v.locale).collect();
        locales.dedup();
        locales
    }

    async fn speak(
        &mut self,
        utterance: &Utterance,
        completion: CompletionSender,
    ) -> Result<(), EngineError> {
        let mut shared = self.shared.lock();
        shared
            .speak_calls
            .push((utterance.id, utterance.text.clone()));
        if let Some(reason) = &self.config.fail_speak {
            return Err(EngineError::SynthesisFailed(reason.clone()));
        }
        if self.config.complete_instantly {
            completion.complete(SpeakOutcome::Completed);
        } else {
            shared.pending = Some(completion);
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        self.shared.lock().stop_calls += 1;
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), EngineError> {
        let mut shared = self.shared.lock();
        shared.pause_calls += 1;
        if let Some(reason) = &self.config.fail_pause {
            return Err(EngineError::SynthesisFailed(reason.clone()));
        }
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), EngineError> {
        self.shared.lock().resume_calls += 1;
        Ok(())
    }

    async fn set_parameter(
        &mut self,
        update: ParameterUpdate,
    ) -> Result<ParameterUpdate, EngineError> {
        let mut shared = self.shared.lock();
        let applied = match update {
            ParameterUpdate::Pitch(v) => {
                let applied = self.config.coerce_pitch.unwrap_or(v);
                shared.params.pitch = applied;
                ParameterUpdate::Pitch(applied)
            }
            ParameterUpdate::Rate(v) => {
                shared.params.rate = v;
                ParameterUpdate::Rate(v)
            }
            ParameterUpdate::Volume(v) => {
                shared.params.volume = v;
                ParameterUpdate::Volume(v)
            }
            ParameterUpdate::Locale(locale) => {
                // Switching locale also switches to that locale's first
                // voice; an unknown locale is refused by keeping the
                // current one.
                let candidate = voice_catalog()
                    .into_iter()
                    .find(|v| v.locale == locale || v.locale.matches_language(&locale));
                match candidate {
                    Some(voice) => {
                        shared.params.locale = locale.clone();
                        shared.params.voice = Some(voice);
                        ParameterUpdate::Locale(locale)
                    }
                    None => ParameterUpdate::Locale(shared.params.locale.clone()),
                }
            }
            ParameterUpdate::Voice(voice) => {
                let known = voice_catalog().into_iter().find(|v| v.token == voice.token);
                match known {
                    Some(voice) => {
                        shared.params.locale = voice.locale.clone();
                        shared.params.voice = Some(voice.clone());
                        ParameterUpdate::Voice(voice)
                    }
                    None => {
                        let current = shared
                            .params
                            .voice
                            .clone()
                            .unwrap_or_else(|| voice_catalog().remove(0));
                        ParameterUpdate::Voice(current)
                    }
                }
            }
        };
        Ok(applied)
    }

    async fn parameter(&self, kind: ParameterKind) -> Result<ParameterUpdate, EngineError> {
        let shared = self.shared.lock();
        Ok(match kind {
            ParameterKind::Pitch => ParameterUpdate::Pitch(shared.params.pitch),
            ParameterKind::Rate => ParameterUpdate::Rate(shared.params.rate),
            ParameterKind::Volume => ParameterUpdate::Volume(shared.params.volume),
            ParameterKind::Locale => ParameterUpdate::Locale(shared.params.locale.clone()),
            ParameterKind::Voice => ParameterUpdate::Voice(
                shared
                    .params
                    .voice
                    .clone()
                    .unwrap_or_else(|| voice_catalog().remove(0)),
            ),
        })
    }
}

/// Factory for creating MockEngine instances sharing one remote
/// control
pub struct MockEngineFactory {
    config: MockConfig,
    shared: Arc<Mutex<MockShared>>,
}

impl MockEngineFactory {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Mutex::new(MockShared::new())),
        }
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Default for MockEngineFactory {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

impl EngineFactory for MockEngineFactory {
    fn create(&self) -> Result<Box<dyn TtsEngine>, EngineError> {
        Ok(Box::new(MockEngine {
            config: self.config.clone(),
            shared: Arc::clone(&self.shared),
        }))
    }

    fn engine_info(&self) -> EngineInfo {
        EngineInfo {
            id: "mock".to_string(),
            name: "Mock TTS".to_string(),
            description: "Configurable mock engine for testing".to_string(),
            requires_network: false,
            is_local: true,
            is_available: true,
        }
    }

    fn check_requirements(&self) -> Result<(), EngineError> {
        Ok(())
    }
}
