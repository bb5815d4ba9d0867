//! The public synthesizer facade
//!
//! `TextToSpeech` ties the selected engine, the utterance state
//! machine, the parameter manager and the event dispatcher together.
//! Control operations are expected to be invoked from a single control
//! context; engine completion signals may arrive from worker tasks and
//! are marshaled onto the control context by [`TextToSpeech::poll`],
//! which drains the completion channel before applying transitions.

use tokio::sync::mpsc;

use voxcast_foundation::{Locale, VoxCastError};

use crate::engine::{
    CompletionSender, CompletionSignal, EngineInfo, EngineRegistry, PauseSupport, TtsEngine,
};
use crate::events::EventDispatcher;
use crate::next_utterance_id;
use crate::params::ParameterManager;
use crate::state_machine::UtteranceStateMachine;
use crate::types::{EngineState, TtsConfig, TtsEvent, Utterance, Voice};

pub struct TextToSpeech {
    engine: Option<Box<dyn TtsEngine>>,
    machine: UtteranceStateMachine,
    params: ParameterManager,
    dispatcher: EventDispatcher,
    completion_tx: mpsc::UnboundedSender<CompletionSignal>,
    completion_rx: mpsc::UnboundedReceiver<CompletionSignal>,
}

impl TextToSpeech {
    /// Build a synthesizer, selecting the first usable engine from the
    /// registry.
    ///
    /// When no engine can be selected the synthesizer still exists, but
    /// permanently in [`EngineState::BackendError`]: every later
    /// [`say`](Self::say) fails with [`VoxCastError::NoEngineAvailable`].
    pub async fn new(registry: &EngineRegistry, config: TtsConfig) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let mut params = ParameterManager::new(&config);

        let (engine, machine) = match registry.select(&config).await {
            Ok(mut engine) => {
                if let Some(name) = &config.voice {
                    match engine.voices(None).into_iter().find(|v| v.name == *name) {
                        Some(voice) => params.prime_voice(voice),
                        None => tracing::warn!("Configured voice '{}' not found", name),
                    }
                }
                params.apply_initial(engine.as_mut()).await;
                (Some(engine), UtteranceStateMachine::new())
            }
            Err(e) => {
                tracing::warn!("Speech engine selection failed: {}", e);
                (None, UtteranceStateMachine::failed(e.to_string()))
            }
        };

        Self {
            engine,
            machine,
            params,
            dispatcher: EventDispatcher::new(),
            completion_tx,
            completion_rx,
        }
    }

    /// Subscribe to change notifications. Unsubscribe by dropping the
    /// receiver.
    pub fn subscribe(&mut self) -> crossbeam_channel::Receiver<TtsEvent> {
        self.dispatcher.subscribe()
    }

    /// Marshal pending engine completion signals onto this context and
    /// apply the resulting state transitions.
    ///
    /// Every control operation drains the channel first, so calling
    /// this explicitly is only needed to observe a completion while
    /// otherwise idle.
    pub fn poll(&mut self) {
        while let Ok(signal) = self.completion_rx.try_recv() {
            if let Some(new_state) = self.machine.complete(signal) {
                self.dispatcher.emit(TtsEvent::StateChanged(new_state));
            }
        }
    }

    /// Start synthesizing `text` with the current parameters.
    ///
    /// Returns once the dispatch is accepted; completion is observed
    /// through `StateChanged` notifications. A `say` while an utterance
    /// is speaking or paused is rejected with [`VoxCastError::Busy`].
    /// An engine that rejects the dispatch is reported through the
    /// `BackendError` state and [`last_error`](Self::last_error), not
    /// as a call-site error; a later `say` re-attempts.
    pub async fn say(&mut self, text: impl Into<String>) -> Result<(), VoxCastError> {
        self.poll();
        if self.engine.is_none() {
            return Err(VoxCastError::NoEngineAvailable);
        }
        if self.machine.is_busy() {
            return Err(VoxCastError::Busy);
        }

        let utterance = Utterance::new(next_utterance_id(), text, self.params.snapshot());
        let dispatch_id = self.machine.issue_dispatch_id();
        let completion = CompletionSender::new(dispatch_id, self.completion_tx.clone());

        let Some(engine) = self.engine.as_deref_mut() else {
            return Err(VoxCastError::NoEngineAvailable);
        };
        match engine.speak(&utterance, completion).await {
            Ok(()) => {
                tracing::debug!("Dispatched utterance {}", utterance.id);
                self.machine.begin(utterance, dispatch_id);
                self.dispatcher
                    .emit(TtsEvent::StateChanged(EngineState::Speaking));
                Ok(())
            }
            Err(e) => {
                if self.machine.record_failure(e.to_string()) {
                    self.dispatcher
                        .emit(TtsEvent::StateChanged(EngineState::BackendError));
                }
                Ok(())
            }
        }
    }

    /// Stop the currently speaking text. A no-op when nothing is
    /// speaking or paused.
    ///
    /// The transition to `Ready` is optimistic; the engine may take a
    /// short while to actually cease audio output, and its late
    /// completion report is discarded.
    pub async fn stop(&mut self) {
        self.poll();
        if !self.machine.is_busy() {
            return;
        }
        if let Some(engine) = self.engine.as_deref_mut() {
            if let Err(e) = engine.stop().await {
                tracing::warn!("Engine stop failed: {}", e);
            }
        }
        if self.machine.stop() {
            self.dispatcher
                .emit(TtsEvent::StateChanged(EngineState::Ready));
        }
    }

    /// Pause the current speech. A no-op unless speaking.
    ///
    /// Engines declare their pause fidelity up front; one that cannot
    /// pause at all makes this a reported failure (`BackendError`)
    /// rather than a silent no-op.
    pub async fn pause(&mut self) {
        self.poll();
        if self.machine.state() != EngineState::Speaking {
            return;
        }
        let Some(engine) = self.engine.as_deref_mut() else {
            return;
        };
        match engine.capabilities().pause {
            PauseSupport::Unsupported => {
                let reason = format!("Engine '{}' does not support pause", engine.info().id);
                if self.machine.record_failure(reason) {
                    self.dispatcher
                        .emit(TtsEvent::StateChanged(EngineState::BackendError));
                }
            }
            PauseSupport::RestartsUtterance | PauseSupport::ResumesMidUtterance => {
                match engine.pause().await {
                    Ok(()) => {
                        if self.machine.pause() {
                            self.dispatcher
                                .emit(TtsEvent::StateChanged(EngineState::Paused));
                        }
                    }
                    Err(e) => {
                        if self.machine.record_failure(e.to_string()) {
                            self.dispatcher
                                .emit(TtsEvent::StateChanged(EngineState::BackendError));
                        }
                    }
                }
            }
        }
    }

    /// Resume speaking after [`pause`](Self::pause). A no-op unless
    /// paused. On engines whose pause restarts the utterance, the
    /// retained utterance is re-dispatched from the beginning.
    pub async fn resume(&mut self) {
        self.poll();
        if self.machine.state() != EngineState::Paused {
            return;
        }
        let Some(engine) = self.engine.as_deref_mut() else {
            return;
        };
        match engine.capabilities().pause {
            PauseSupport::Unsupported => {}
            PauseSupport::ResumesMidUtterance => match engine.resume().await {
                Ok(()) => {
                    let dispatch_id = self.machine.dispatch_id();
                    if self.machine.resume(dispatch_id) {
                        self.dispatcher
                            .emit(TtsEvent::StateChanged(EngineState::Speaking));
                    }
                }
                Err(e) => {
                    if self.machine.record_failure(e.to_string()) {
                        self.dispatcher
                            .emit(TtsEvent::StateChanged(EngineState::BackendError));
                    }
                }
            },
            PauseSupport::RestartsUtterance => {
                let Some(utterance) = self.machine.utterance().cloned() else {
                    return;
                };
                let dispatch_id = self.machine.issue_dispatch_id();
                let completion = CompletionSender::new(dispatch_id, self.completion_tx.clone());
                match engine.speak(&utterance, completion).await {
                    Ok(()) => {
                        if self.machine.resume(dispatch_id) {
                            self.dispatcher
                                .emit(TtsEvent::StateChanged(EngineState::Speaking));
                        }
                    }
                    Err(e) => {
                        if self.machine.record_failure(e.to_string()) {
                            self.dispatcher
                                .emit(TtsEvent::StateChanged(EngineState::BackendError));
                        }
                    }
                }
            }
        }
    }

    /// Voice pitch in [-1.0, 1.0]; 0.0 is normal speech pitch.
    pub fn pitch(&self) -> f32 {
        self.params.pitch()
    }

    pub async fn set_pitch(&mut self, pitch: f32) {
        self.poll();
        let events = self.params.set_pitch(self.engine.as_deref_mut(), pitch).await;
        self.dispatcher.emit_all(events);
    }

    /// Voice rate in [-1.0, 1.0]; 0.0 is normal speech flow.
    pub fn rate(&self) -> f32 {
        self.params.rate()
    }

    pub async fn set_rate(&mut self, rate: f32) {
        self.poll();
        let events = self.params.set_rate(self.engine.as_deref_mut(), rate).await;
        self.dispatcher.emit_all(events);
    }

    /// Volume in [0, 100]. Out-of-range input is clamped, never
    /// rejected.
    pub fn volume(&self) -> u8 {
        self.params.volume()
    }

    pub async fn set_volume(&mut self, volume: i32) {
        self.poll();
        let events = self
            .params
            .set_volume(self.engine.as_deref_mut(), volume)
            .await;
        self.dispatcher.emit_all(events);
    }

    /// The current locale. Defaults to the system locale.
    pub fn locale(&self) -> &Locale {
        self.params.locale()
    }

    pub async fn set_locale(&mut self, locale: Locale) {
        self.poll();
        let events = self
            .params
            .set_locale(self.engine.as_deref_mut(), locale)
            .await;
        self.dispatcher.emit_all(events);
    }

    /// The current voice, once the engine reported one.
    pub fn voice(&self) -> Option<&Voice> {
        self.params.voice()
    }

    /// Set the voice to use. On some engines this also changes other
    /// attributes such as locale or pitch, in which case notifications
    /// fire for those changes as well.
    pub async fn set_voice(&mut self, voice: Voice) {
        self.poll();
        let events = self.params.set_voice(self.engine.as_deref_mut(), voice).await;
        self.dispatcher.emit_all(events);
    }

    /// Current state of the synthesizer. Completion-driven transitions
    /// become visible after [`poll`](Self::poll) or any control call.
    pub fn state(&self) -> EngineState {
        self.machine.state()
    }

    /// The reason for the most recent `BackendError`, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.machine.last_error()
    }

    /// The utterance currently speaking or paused.
    pub fn current_utterance(&self) -> Option<&Utterance> {
        self.machine.utterance()
    }

    /// Locales the active engine can currently speak.
    pub fn available_locales(&self) -> Vec<Locale> {
        self.engine
            .as_ref()
            .map(|e| e.locales())
            .unwrap_or_default()
    }

    /// Voices available for the given locale, or all voices when no
    /// locale is given. An unsupported locale yields an empty vector.
    pub fn available_voices(&self, locale: Option<&Locale>) -> Vec<Voice> {
        self.engine
            .as_ref()
            .map(|e| e.voices(locale))
            .unwrap_or_default()
    }

    /// Metadata of the selected engine; `None` when selection failed.
    pub fn engine_info(&self) -> Option<EngineInfo> {
        self.engine.as_ref().map(|e| e.info())
    }
}

impl std::fmt::Debug for TextToSpeech {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextToSpeech")
            .field("engine", &self.engine_info().map(|i| i.id))
            .field("state", &self.machine.state())
            .finish()
    }
}
