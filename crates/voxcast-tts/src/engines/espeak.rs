//! espeak-ng speech engine
//!
//! Spawns the `espeak-ng` command-line synthesizer for each utterance
//! and monitors the child process from a tokio task. Pitch, rate and
//! volume are mapped onto espeak's native integer ranges, so applied
//! values come back quantized; the parameter manager reconciles with
//! them.
//!
//! espeak-ng has no way to suspend a running process mid-word, so the
//! declared pause support is `RestartsUtterance`: pause cancels the
//! child and resume re-speaks the retained utterance from the
//! beginning.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::oneshot;

use voxcast_foundation::{EngineError, Locale};

use crate::engine::{
    CompletionSender, EngineCapabilities, EngineFactory, EngineInfo, ParameterKind,
    ParameterUpdate, PauseSupport, TtsEngine,
};
use crate::types::{SpeakOutcome, SpeechParameters, TtsConfig, Utterance, Voice};

// espeak-ng native ranges: pitch 0-99 (default 50), speed 80-450 words
// per minute (default 175), amplitude 0-200 (default 100).
const ESPEAK_PITCH_MAX: f32 = 99.0;
const ESPEAK_WPM_MIN: f32 = 80.0;
const ESPEAK_WPM_NORMAL: f32 = 175.0;
const ESPEAK_WPM_MAX: f32 = 450.0;

#[derive(Debug)]
pub struct EspeakEngine {
    binary: String,
    params: SpeechParameters,
    voices: Vec<Voice>,
    locales: Vec<Locale>,
    cancel: Option<oneshot::Sender<()>>,
    initialized: bool,
}

impl EspeakEngine {
    pub fn new(binary: String) -> Self {
        Self {
            binary,
            params: SpeechParameters::default(),
            voices: Vec::new(),
            locales: Vec::new(),
            cancel: None,
            initialized: false,
        }
    }

    /// Find a usable espeak binary on this system.
    pub fn find_binary() -> Option<String> {
        for candidate in ["espeak-ng", "espeak"] {
            let probe = std::process::Command::new(candidate)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            if let Ok(status) = probe {
                if status.success() {
                    return Some(candidate.to_string());
                }
            }
        }
        None
    }

    fn espeak_pitch(pitch: f32) -> u32 {
        (((pitch.clamp(-1.0, 1.0) + 1.0) / 2.0) * ESPEAK_PITCH_MAX).round() as u32
    }

    fn pitch_from_espeak(value: u32) -> f32 {
        (value as f32 / ESPEAK_PITCH_MAX) * 2.0 - 1.0
    }

    /// Map rate [-1.0, 1.0] onto words per minute, piecewise so that
    /// 0.0 lands exactly on espeak's normal speed.
    fn espeak_wpm(rate: f32) -> u32 {
        let rate = rate.clamp(-1.0, 1.0);
        let wpm = if rate >= 0.0 {
            ESPEAK_WPM_NORMAL + rate * (ESPEAK_WPM_MAX - ESPEAK_WPM_NORMAL)
        } else {
            ESPEAK_WPM_NORMAL + rate * (ESPEAK_WPM_NORMAL - ESPEAK_WPM_MIN)
        };
        wpm.round() as u32
    }

    fn rate_from_espeak(wpm: u32) -> f32 {
        let wpm = wpm as f32;
        if wpm >= ESPEAK_WPM_NORMAL {
            (wpm - ESPEAK_WPM_NORMAL) / (ESPEAK_WPM_MAX - ESPEAK_WPM_NORMAL)
        } else {
            -(ESPEAK_WPM_NORMAL - wpm) / (ESPEAK_WPM_NORMAL - ESPEAK_WPM_MIN)
        }
    }

    /// Build a `Locale` from an espeak language tag such as `en-gb` or
    /// `en-gb-x-rp`, keeping only language and region.
    fn locale_from_tag(tag: &str) -> Locale {
        let mut parts = tag.split(['-', '_']);
        let language = parts.next().unwrap_or_default();
        match parts.next() {
            Some(region) if region.len() == 2 && region.chars().all(|c| c.is_ascii_alphabetic()) => {
                Locale::new(format!("{language}-{region}"))
            }
            _ => Locale::new(language),
        }
    }

    /// Parse `espeak-ng --voices` output. Columns are
    /// `Pty Language Age/Gender VoiceName File Other`.
    fn parse_voices(output: &str) -> Vec<Voice> {
        output
            .lines()
            .skip(1)
            .filter_map(|line| {
                let fields: Vec<&str> = line.split_whitespace().collect();
                if fields.len() < 5 {
                    return None;
                }
                let tag = fields[1];
                let variant = fields[2].rsplit('/').next().unwrap_or("-");
                Some(Voice {
                    name: fields[3].to_string(),
                    locale: Self::locale_from_tag(tag),
                    variant: variant.to_string(),
                    token: tag.to_string(),
                })
            })
            .collect()
    }

    fn best_voice_for(&self, locale: &Locale) -> Option<Voice> {
        self.voices
            .iter()
            .find(|v| &v.locale == locale)
            .or_else(|| {
                self.voices
                    .iter()
                    .find(|v| v.locale.matches_language(locale))
            })
            .cloned()
    }

    fn cancel_current(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

#[async_trait]
impl TtsEngine for EspeakEngine {
    fn info(&self) -> EngineInfo {
        EngineInfo {
            id: "espeak".to_string(),
            name: "eSpeak NG".to_string(),
            description: "Local synthesis via the espeak-ng command".to_string(),
            requires_network: false,
            is_local: true,
            // An instance only exists when create() found the binary.
            is_available: true,
        }
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            pause: PauseSupport::RestartsUtterance,
            ..EngineCapabilities::default()
        }
    }

    async fn is_available(&self) -> bool {
        Self::find_binary().is_some()
    }

    async fn initialize(&mut self, config: TtsConfig) -> Result<(), EngineError> {
        let output = Command::new(&self.binary)
            .arg("--voices")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                EngineError::InitializationFailed(format!("failed to run {}: {}", self.binary, e))
            })?;
        if !output.status.success() {
            return Err(EngineError::InitializationFailed(format!(
                "{} --voices exited with {}",
                self.binary, output.status
            )));
        }

        self.voices = Self::parse_voices(&String::from_utf8_lossy(&output.stdout));
        if self.voices.is_empty() {
            return Err(EngineError::InitializationFailed(
                "espeak-ng reported no voices".to_string(),
            ));
        }

        let mut locales: Vec<Locale> = self.voices.iter().map(|v| v.locale.clone()).collect();
        locales.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        locales.dedup();
        self.locales = locales;

        if let Some(locale) = config.locale {
            self.params.locale = locale;
        }
        let locale = self.params.locale.clone();
        self.params.voice = self.best_voice_for(&locale);
        self.initialized = true;
        tracing::debug!(
            "espeak-ng initialized with {} voices, {} locales",
            self.voices.len(),
            self.locales.len()
        );
        Ok(())
    }

    fn voices(&self, locale: Option<&Locale>) -> Vec<Voice> {
        match locale {
            None => self.voices.clone(),
            Some(locale) => {
                let exact: Vec<Voice> = self
                    .voices
                    .iter()
                    .filter(|v| &v.locale == locale)
                    .cloned()
                    .collect();
                if !exact.is_empty() {
                    return exact;
                }
                self.voices
                    .iter()
                    .filter(|v| v.locale.matches_language(locale))
                    .cloned()
                    .collect()
            }
        }
    }

    fn locales(&self) -> Vec<Locale> {
        self.locales.clone()
    }

    async fn speak(
        &mut self,
        utterance: &Utterance,
        completion: CompletionSender,
    ) -> Result<(), EngineError> {
        // At most one child; a replacement dispatch cancels the old one.
        self.cancel_current();

        let params = &utterance.params;
        let voice_arg = params
            .voice
            .as_ref()
            .map(|v| v.token.clone())
            .unwrap_or_else(|| params.locale.language().to_string());

        let mut child = Command::new(&self.binary)
            .arg("-p")
            .arg(Self::espeak_pitch(params.pitch).to_string())
            .arg("-s")
            .arg(Self::espeak_wpm(params.rate).to_string())
            .arg("-a")
            .arg((params.volume as u32 * 2).to_string())
            .arg("-v")
            .arg(voice_arg)
            .arg("--")
            .arg(&utterance.text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.cancel = Some(cancel_tx);

        tokio::spawn(async move {
            let exited = tokio::select! {
                status = child.wait() => Some(status),
                _ = cancel_rx => None,
            };
            match exited {
                Some(Ok(status)) if status.success() => {
                    completion.complete(SpeakOutcome::Completed);
                }
                Some(Ok(status)) => {
                    completion.complete(SpeakOutcome::Failed(format!(
                        "espeak-ng exited with {status}"
                    )));
                }
                Some(Err(e)) => {
                    completion.complete(SpeakOutcome::Failed(format!(
                        "waiting for espeak-ng failed: {e}"
                    )));
                }
                None => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    completion.complete(SpeakOutcome::Stopped);
                }
            }
        });

        Ok(())
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        self.cancel_current();
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), EngineError> {
        // Pause restarts the utterance: cancel now, the caller
        // re-dispatches on resume.
        self.cancel_current();
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
                let quantized = Self::pitch_from_espeak(Self::espeak_pitch(v));
                self.params.pitch = quantized;
                ParameterUpdate::Pitch(quantized)
            }
            ParameterUpdate::Rate(v) => {
                let quantized = Self::rate_from_espeak(Self::espeak_wpm(v));
                self.params.rate = quantized;
                ParameterUpdate::Rate(quantized)
            }
            ParameterUpdate::Volume(v) => {
                let clamped = v.min(100);
                self.params.volume = clamped;
                ParameterUpdate::Volume(clamped)
            }
            ParameterUpdate::Locale(locale) => match self.best_voice_for(&locale) {
                Some(voice) => {
                    self.params.locale = locale.clone();
                    self.params.voice = Some(voice);
                    ParameterUpdate::Locale(locale)
                }
                // No voice speaks it; keep the current locale.
                None => ParameterUpdate::Locale(self.params.locale.clone()),
            },
            ParameterUpdate::Voice(voice) => {
                match self.voices.iter().find(|v| v.token == voice.token).cloned() {
                    Some(voice) => {
                        self.params.locale = voice.locale.clone();
                        self.params.voice = Some(voice.clone());
                        ParameterUpdate::Voice(voice)
                    }
                    None => match &self.params.voice {
                        Some(current) => ParameterUpdate::Voice(current.clone()),
                        None => ParameterUpdate::Voice(voice),
                    },
                }
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
            ParameterKind::Voice => match &self.params.voice {
                Some(voice) => ParameterUpdate::Voice(voice.clone()),
                None => {
                    return Err(EngineError::NotAvailable {
                        reason: "engine not initialized".to_string(),
                    })
                }
            },
        })
    }
}

/// Factory for creating EspeakEngine instances
pub struct EspeakEngineFactory;

impl EspeakEngineFactory {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EspeakEngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineFactory for EspeakEngineFactory {
    fn create(&self) -> Result<Box<dyn TtsEngine>, EngineError> {
        let binary = EspeakEngine::find_binary().ok_or_else(|| EngineError::NotAvailable {
            reason: "espeak-ng not found in PATH".to_string(),
        })?;
        Ok(Box::new(EspeakEngine::new(binary)))
    }

    fn engine_info(&self) -> EngineInfo {
        EngineInfo {
            id: "espeak".to_string(),
            name: "eSpeak NG".to_string(),
            description: "Local synthesis via the espeak-ng command".to_string(),
            requires_network: false,
            is_local: true,
            is_available: EspeakEngine::find_binary().is_some(),
        }
    }

    fn check_requirements(&self) -> Result<(), EngineError> {
        EspeakEngine::find_binary()
            .map(|_| ())
            .ok_or_else(|| EngineError::NotAvailable {
                reason: "espeak-ng not found in PATH".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_VOICES: &str = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 2  en-gb           --/M      English_(Great_Britain) gmw/en
 5  en-gb-x-rp      --/M      English_(Received_Pronunciation) gmw/en-GB-x-rp
 2  en-us           --/M      English_(America)  gmw/en-US
 5  de              --/M      German             gmw/de
";

    #[test]
    fn pitch_mapping_covers_espeak_range() {
        assert_eq!(EspeakEngine::espeak_pitch(-1.0), 0);
        assert_eq!(EspeakEngine::espeak_pitch(0.0), 50);
        assert_eq!(EspeakEngine::espeak_pitch(1.0), 99);
        // Quantization round-trips within one espeak step.
        let applied = EspeakEngine::pitch_from_espeak(EspeakEngine::espeak_pitch(0.3));
        assert!((applied - 0.3).abs() < 2.0 / 99.0);
    }

    #[test]
    fn rate_mapping_is_piecewise_around_normal_speed() {
        assert_eq!(EspeakEngine::espeak_wpm(-1.0), 80);
        assert_eq!(EspeakEngine::espeak_wpm(0.0), 175);
        assert_eq!(EspeakEngine::espeak_wpm(1.0), 450);
        assert_eq!(EspeakEngine::rate_from_espeak(175), 0.0);
        assert_eq!(EspeakEngine::rate_from_espeak(450), 1.0);
        assert_eq!(EspeakEngine::rate_from_espeak(80), -1.0);
    }

    #[test]
    fn parses_voice_listing() {
        let voices = EspeakEngine::parse_voices(SAMPLE_VOICES);
        assert_eq!(voices.len(), 5);
        assert_eq!(voices[0].name, "Afrikaans");
        assert_eq!(voices[0].locale, Locale::new("af"));
        assert_eq!(voices[0].variant, "M");
        assert_eq!(voices[1].locale, Locale::new("en-GB"));
        assert_eq!(voices[1].token, "en-gb");
    }

    #[test]
    fn locale_from_tag_keeps_language_and_region_only() {
        assert_eq!(EspeakEngine::locale_from_tag("en-gb"), Locale::new("en-GB"));
        assert_eq!(
            EspeakEngine::locale_from_tag("en-gb-x-rp"),
            Locale::new("en-GB")
        );
        assert_eq!(EspeakEngine::locale_from_tag("de"), Locale::new("de"));
    }

    #[tokio::test]
    async fn locale_change_switches_to_matching_voice() {
        let mut engine = EspeakEngine::new("espeak-ng".to_string());
        engine.voices = EspeakEngine::parse_voices(SAMPLE_VOICES);

        let applied = engine
            .set_parameter(ParameterUpdate::Locale(Locale::new("de-DE")))
            .await
            .unwrap();
        assert_eq!(applied, ParameterUpdate::Locale(Locale::new("de-DE")));
        assert_eq!(engine.params.voice.as_ref().unwrap().token, "de");
    }

    #[tokio::test]
    async fn unknown_locale_is_refused() {
        let mut engine = EspeakEngine::new("espeak-ng".to_string());
        engine.voices = EspeakEngine::parse_voices(SAMPLE_VOICES);
        engine.params.locale = Locale::new("en-US");

        let applied = engine
            .set_parameter(ParameterUpdate::Locale(Locale::new("zz-ZZ")))
            .await
            .unwrap();
        assert_eq!(applied, ParameterUpdate::Locale(Locale::new("en-US")));
    }

    #[tokio::test]
    async fn pitch_is_quantized_to_espeak_steps() {
        let mut engine = EspeakEngine::new("espeak-ng".to_string());
        let applied = engine
            .set_parameter(ParameterUpdate::Pitch(0.5))
            .await
            .unwrap();
        match applied {
            ParameterUpdate::Pitch(v) => {
                assert!((v - 0.5).abs() < 2.0 / 99.0);
                assert_eq!(engine.params.pitch, v);
            }
            other => panic!("unexpected update {other:?}"),
        }
    }
}
