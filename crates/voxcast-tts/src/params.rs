//! Parameter management
//!
//! Holds the pitch/rate/volume/locale/voice settings, clamps incoming
//! values to their declared ranges, pushes changes to the active engine
//! and reconciles with the value the engine actually applied. Setters
//! never fail; a push the engine rejects is logged and the clamped
//! local value kept.

use crate::engine::{ParameterKind, ParameterUpdate, TtsEngine};
use crate::types::{SpeechParameters, TtsConfig, TtsEvent, Voice};
use voxcast_foundation::Locale;

pub(crate) struct ParameterManager {
    params: SpeechParameters,
}

impl ParameterManager {
    pub fn new(config: &TtsConfig) -> Self {
        Self {
            params: SpeechParameters {
                pitch: clamp_unit(config.pitch),
                rate: clamp_unit(config.rate),
                volume: config.volume.min(100),
                locale: config.locale.clone().unwrap_or_default(),
                voice: None,
            },
        }
    }

    pub fn snapshot(&self) -> SpeechParameters {
        self.params.clone()
    }

    pub fn pitch(&self) -> f32 {
        self.params.pitch
    }

    pub fn rate(&self) -> f32 {
        self.params.rate
    }

    pub fn volume(&self) -> u8 {
        self.params.volume
    }

    pub fn locale(&self) -> &Locale {
        &self.params.locale
    }

    pub fn voice(&self) -> Option<&Voice> {
        self.params.voice.as_ref()
    }

    /// Seed the voice before the initial push, bypassing change events.
    pub fn prime_voice(&mut self, voice: Voice) {
        self.params.voice = Some(voice);
    }

    /// Push every stored parameter to a freshly selected engine and
    /// silently adopt the applied values. Change notifications only
    /// start with later mutations.
    pub async fn apply_initial(&mut self, engine: &mut (dyn TtsEngine + 'static)) {
        let updates = [
            ParameterUpdate::Pitch(self.params.pitch),
            ParameterUpdate::Rate(self.params.rate),
            ParameterUpdate::Volume(self.params.volume),
            ParameterUpdate::Locale(self.params.locale.clone()),
        ];
        for update in updates {
            match engine.set_parameter(update).await {
                Ok(applied) => self.adopt(applied),
                Err(e) => tracing::warn!("Initial parameter push failed: {}", e),
            }
        }
        match self.params.voice.clone() {
            Some(voice) => match engine.set_parameter(ParameterUpdate::Voice(voice)).await {
                Ok(applied) => self.adopt(applied),
                Err(e) => tracing::warn!("Initial voice push failed: {}", e),
            },
            // The voice defaults to whatever the engine speaks with.
            None => {
                if let Ok(applied) = engine.parameter(ParameterKind::Voice).await {
                    self.adopt(applied);
                }
            }
        }
    }

    pub async fn set_pitch(
        &mut self,
        engine: Option<&mut (dyn TtsEngine + 'static)>,
        pitch: f32,
    ) -> Vec<TtsEvent> {
        if !pitch.is_finite() {
            tracing::warn!("Ignoring non-finite pitch {}", pitch);
            return Vec::new();
        }
        let clamped = clamp_unit(pitch);
        if clamped == self.params.pitch {
            return Vec::new();
        }
        let applied = match push(engine, ParameterUpdate::Pitch(clamped)).await {
            Some(ParameterUpdate::Pitch(v)) => v,
            _ => clamped,
        };
        if applied == self.params.pitch {
            return Vec::new();
        }
        self.params.pitch = applied;
        vec![TtsEvent::PitchChanged(applied)]
    }

    pub async fn set_rate(
        &mut self,
        engine: Option<&mut (dyn TtsEngine + 'static)>,
        rate: f32,
    ) -> Vec<TtsEvent> {
        if !rate.is_finite() {
            tracing::warn!("Ignoring non-finite rate {}", rate);
            return Vec::new();
        }
        let clamped = clamp_unit(rate);
        if clamped == self.params.rate {
            return Vec::new();
        }
        let applied = match push(engine, ParameterUpdate::Rate(clamped)).await {
            Some(ParameterUpdate::Rate(v)) => v,
            _ => clamped,
        };
        if applied == self.params.rate {
            return Vec::new();
        }
        self.params.rate = applied;
        vec![TtsEvent::RateChanged(applied)]
    }

    pub async fn set_volume(
        &mut self,
        engine: Option<&mut (dyn TtsEngine + 'static)>,
        volume: i32,
    ) -> Vec<TtsEvent> {
        let clamped = volume.clamp(0, 100) as u8;
        if clamped == self.params.volume {
            return Vec::new();
        }
        let applied = match push(engine, ParameterUpdate::Volume(clamped)).await {
            Some(ParameterUpdate::Volume(v)) => v,
            _ => clamped,
        };
        if applied == self.params.volume {
            return Vec::new();
        }
        self.params.volume = applied;
        vec![TtsEvent::VolumeChanged(applied)]
    }

    /// Change the locale. Engines typically switch to the new locale's
    /// default voice, so the voice is re-read afterwards and a
    /// `VoiceChanged` emitted when it differs.
    pub async fn set_locale(
        &mut self,
        engine: Option<&mut (dyn TtsEngine + 'static)>,
        locale: Locale,
    ) -> Vec<TtsEvent> {
        if locale == self.params.locale {
            return Vec::new();
        }
        let mut events = Vec::new();
        match engine {
            Some(engine) => {
                let applied = match engine
                    .set_parameter(ParameterUpdate::Locale(locale.clone()))
                    .await
                {
                    Ok(ParameterUpdate::Locale(l)) => l,
                    Ok(_) => locale,
                    Err(e) => {
                        tracing::warn!("Locale push failed: {}", e);
                        locale
                    }
                };
                if applied != self.params.locale {
                    self.params.locale = applied.clone();
                    events.push(TtsEvent::LocaleChanged(applied));
                    events.extend(self.reconcile(engine, &[ParameterKind::Voice]).await);
                }
            }
            None => {
                self.params.locale = locale.clone();
                events.push(TtsEvent::LocaleChanged(locale));
            }
        }
        events
    }

    /// Change the voice. A voice carries its own locale and the engine
    /// may adjust further attributes, so every other parameter is
    /// re-read afterwards; one event fires per observed difference,
    /// `VoiceChanged` first.
    pub async fn set_voice(
        &mut self,
        engine: Option<&mut (dyn TtsEngine + 'static)>,
        voice: Voice,
    ) -> Vec<TtsEvent> {
        if Some(&voice) == self.params.voice.as_ref() {
            return Vec::new();
        }
        let mut events = Vec::new();
        match engine {
            Some(engine) => {
                let applied = match engine
                    .set_parameter(ParameterUpdate::Voice(voice.clone()))
                    .await
                {
                    Ok(ParameterUpdate::Voice(v)) => v,
                    Ok(_) => voice,
                    Err(e) => {
                        tracing::warn!("Voice push failed: {}", e);
                        voice
                    }
                };
                if Some(&applied) != self.params.voice.as_ref() {
                    self.params.voice = Some(applied.clone());
                    events.push(TtsEvent::VoiceChanged(applied));
                    events.extend(
                        self.reconcile(
                            engine,
                            &[
                                ParameterKind::Pitch,
                                ParameterKind::Rate,
                                ParameterKind::Volume,
                                ParameterKind::Locale,
                            ],
                        )
                        .await,
                    );
                }
            }
            None => {
                let locale = voice.locale.clone();
                self.params.voice = Some(voice.clone());
                events.push(TtsEvent::VoiceChanged(voice));
                if locale != self.params.locale {
                    self.params.locale = locale.clone();
                    events.push(TtsEvent::LocaleChanged(locale));
                }
            }
        }
        events
    }

    /// Re-read the given parameters from the engine and emit one event
    /// per value that differs from what is stored.
    async fn reconcile(
        &mut self,
        engine: &mut (dyn TtsEngine + 'static),
        kinds: &[ParameterKind],
    ) -> Vec<TtsEvent> {
        let mut events = Vec::new();
        for kind in kinds {
            let applied = match engine.parameter(*kind).await {
                Ok(applied) => applied,
                Err(e) => {
                    tracing::debug!("Parameter read-back failed: {}", e);
                    continue;
                }
            };
            match applied {
                ParameterUpdate::Pitch(v) if v != self.params.pitch => {
                    self.params.pitch = v;
                    events.push(TtsEvent::PitchChanged(v));
                }
                ParameterUpdate::Rate(v) if v != self.params.rate => {
                    self.params.rate = v;
                    events.push(TtsEvent::RateChanged(v));
                }
                ParameterUpdate::Volume(v) if v != self.params.volume => {
                    self.params.volume = v;
                    events.push(TtsEvent::VolumeChanged(v));
                }
                ParameterUpdate::Locale(l) if l != self.params.locale => {
                    self.params.locale = l.clone();
                    events.push(TtsEvent::LocaleChanged(l));
                }
                ParameterUpdate::Voice(v) if Some(&v) != self.params.voice.as_ref() => {
                    self.params.voice = Some(v.clone());
                    events.push(TtsEvent::VoiceChanged(v));
                }
                _ => {}
            }
        }
        events
    }

    fn adopt(&mut self, update: ParameterUpdate) {
        match update {
            ParameterUpdate::Pitch(v) => self.params.pitch = v,
            ParameterUpdate::Rate(v) => self.params.rate = v,
            ParameterUpdate::Volume(v) => self.params.volume = v,
            ParameterUpdate::Locale(l) => self.params.locale = l,
            ParameterUpdate::Voice(v) => self.params.voice = Some(v),
        }
    }
}

fn clamp_unit(value: f32) -> f32 {
    value.clamp(-1.0, 1.0)
}

/// Push one update to the engine, if there is one; `None` when there is
/// no engine or the push failed.
async fn push(
    engine: Option<&mut (dyn TtsEngine + 'static)>,
    update: ParameterUpdate,
) -> Option<ParameterUpdate> {
    let engine = engine?;
    match engine.set_parameter(update).await {
        Ok(applied) => Some(applied),
        Err(e) => {
            tracing::warn!("Parameter push failed: {}", e);
            None
        }
    }
}
