//! No-operation speech engine for testing and fallback

use async_trait::async_trait;

use voxcast_foundation::{EngineError, Locale};

use crate::engine::{
    CompletionSender, EngineCapabilities, EngineFactory, EngineInfo, ParameterKind,
    ParameterUpdate, PauseSupport, TtsEngine,
};
use crate::types::{SpeakOutcome, SpeechParameters, TtsConfig, Utterance, Voice};

/// A silent engine that never produces audio and completes every
/// utterance immediately. Useful as the generic fallback and for
/// exercising the lifecycle without a speech daemon.
#[derive(Debug, Clone)]
pub struct NoOpEngine {
    params: SpeechParameters,
    initialized: bool,
}

impl NoOpEngine {
    pub fn new() -> Self {
        Self {
            params: SpeechParameters::default(),
            initialized: false,
        }
    }

    fn null_voice() -> Voice {
        Voice {
            name: "null".to_string(),
            locale: Locale::new("en-US"),
            variant: "-".to_string(),
            token: "null".to_string(),
        }
    }
}

impl Default for NoOpEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TtsEngine for NoOpEngine {
    fn info(&self) -> EngineInfo {
        EngineInfo {
            id: "noop".to_string(),
            name: "No-Op TTS".to_string(),
            description: "A null engine that produces no audio".to_string(),
            requires_network: false,
            is_local: true,
            is_available: true,
        }
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            // Nothing ever plays, so pause trivially resumes in place.
            pause: PauseSupport::ResumesMidUtterance,
            ..EngineCapabilities::default()
        }
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn initialize(&mut self, config: TtsConfig) -> Result<(), EngineError> {
        if let Some(locale) = config.locale {
            self.params.locale = locale;
        }
        self.params.voice = Some(Self::null_voice());
        self.initialized = true;
        Ok(())
    }

    fn voices(&self, locale: Option<&Locale>) -> Vec<Voice> {
        let voice = Self::null_voice();
        match locale {
            Some(locale) if !voice.locale.matches_language(locale) => Vec::new(),
            _ => vec![voice],
        }
    }

    fn locales(&self) -> Vec<Locale> {
        vec![Self::null_voice().locale]
    }

    async fn speak(
        &mut self,
        utterance: &Utterance,
        completion: CompletionSender,
    ) -> Result<(), EngineError> {
        tracing::debug!(
            "NoOpEngine swallowing utterance {} ({} chars)",
            utterance.id,
            utterance.text.len()
        );
        completion.complete(SpeakOutcome::Completed);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn set_parameter(
        &mut self,
        update: ParameterUpdate,
    ) -> Result<ParameterUpdate, EngineError> {
        let applied = match update {
            ParameterUpdate::Pitch(v) => {
                self.params.pitch = v;
                ParameterUpdate::Pitch(v)
            }
            ParameterUpdate::Rate(v) => {
                self.params.rate = v;
                ParameterUpdate::Rate(v)
            }
            ParameterUpdate::Volume(v) => {
                self.params.volume = v;
                ParameterUpdate::Volume(v)
            }
            ParameterUpdate::Locale(l) => {
                self.params.locale = l.clone();
                ParameterUpdate::Locale(l)
            }
            // Only the one bundled voice exists; anything else is
            // coerced back to it.
            ParameterUpdate::Voice(v) => {
                let applied = if v.token == Self::null_voice().token {
                    v
                } else {
                    self.params.voice.clone().unwrap_or_else(Self::null_voice)
                };
                self.params.voice = Some(applied.clone());
                ParameterUpdate::Voice(applied)
            }
        };
        Ok(applied)
    }

    async fn parameter(&self, kind: ParameterKind) -> Result<ParameterUpdate, EngineError> {
        Ok(match kind {
            ParameterKind::Pitch => ParameterUpdate::Pitch(self.params.pitch),
            ParameterKind::Rate => ParameterUpdate::Rate(self.params.rate),
            ParameterKind::Volume => ParameterUpdate::Volume(self.params.volume),
            ParameterKind::Locale => ParameterUpdate::Locale(self.params.locale.clone()),
            ParameterKind::Voice => ParameterUpdate::Voice(
                self.params.voice.clone().unwrap_or_else(Self::null_voice),
            ),
        })
    }
}

/// Factory for creating NoOpEngine instances
pub struct NoOpEngineFactory;

impl EngineFactory for NoOpEngineFactory {
    fn create(&self) -> Result<Box<dyn TtsEngine>, EngineError> {
        Ok(Box::new(NoOpEngine::new()))
    }

    fn engine_info(&self) -> EngineInfo {
        NoOpEngine::new().info()
    }

    fn check_requirements(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CompletionSignal;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn speak_completes_immediately() {
        let mut engine = NoOpEngine::new();
        engine.initialize(TtsConfig::default()).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel::<CompletionSignal>();
        let utterance = Utterance::new(1, "hello", SpeechParameters::default());
        engine
            .speak(&utterance, CompletionSender::new(7, tx))
            .await
            .unwrap();

        let signal = rx.try_recv().unwrap();
        assert_eq!(signal.dispatch_id, 7);
        assert_eq!(signal.outcome, SpeakOutcome::Completed);
    }

    #[tokio::test]
    async fn unsupported_locale_yields_no_voices() {
        let engine = NoOpEngine::new();
        assert!(engine.voices(Some(&Locale::new("zh-CN"))).is_empty());
        assert_eq!(engine.voices(None).len(), 1);
        assert_eq!(engine.voices(Some(&Locale::new("en-GB"))).len(), 1);
    }

    #[tokio::test]
    async fn foreign_voice_is_coerced_to_the_null_voice() {
        let mut engine = NoOpEngine::new();
        engine.initialize(TtsConfig::default()).await.unwrap();
        let foreign = Voice {
            name: "helga".to_string(),
            locale: Locale::new("de-DE"),
            variant: "F".to_string(),
            token: "mock:helga".to_string(),
        };
        let applied = engine
            .set_parameter(ParameterUpdate::Voice(foreign))
            .await
            .unwrap();
        assert_eq!(applied, ParameterUpdate::Voice(NoOpEngine::null_voice()));
    }
}
