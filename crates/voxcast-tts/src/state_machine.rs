//! Utterance state machine
//!
//! Owns the synthesizer state and the single in-flight utterance, and
//! validates every transition. Completion signals carry a dispatch
//! generation; signals from superseded dispatches (stopped, replaced,
//! or restarted after a pause) are discarded, which makes the
//! optimistic stop-to-Ready transition safe even though the engine may
//! keep producing audio for a short while.

use crate::engine::CompletionSignal;
use crate::types::{EngineState, SpeakOutcome, Utterance};

#[derive(Debug)]
pub(crate) struct UtteranceStateMachine {
    state: EngineState,
    utterance: Option<Utterance>,
    /// Generation of the currently live dispatch; 0 when none.
    dispatch_id: u64,
    next_dispatch_id: u64,
    last_error: Option<String>,
    /// Set when engine selection failed at construction; the machine is
    /// then permanently stuck in `BackendError`.
    terminal: bool,
}

/// Whether `from -> to` is a defined edge of the lifecycle.
pub(crate) fn valid_transition(from: EngineState, to: EngineState) -> bool {
    use EngineState::*;
    matches!(
        (from, to),
        (Ready, Speaking)
            | (Ready, BackendError)
            | (Speaking, Ready)
            | (Speaking, Paused)
            | (Speaking, BackendError)
            | (Paused, Speaking)
            | (Paused, Ready)
            | (Paused, BackendError)
            | (BackendError, Speaking)
            | (BackendError, BackendError)
    )
}

impl UtteranceStateMachine {
    pub fn new() -> Self {
        Self {
            state: EngineState::Ready,
            utterance: None,
            dispatch_id: 0,
            next_dispatch_id: 1,
            last_error: None,
            terminal: false,
        }
    }

    /// A machine that never leaves `BackendError`; used when no engine
    /// could be selected.
    pub fn failed(reason: String) -> Self {
        Self {
            state: EngineState::BackendError,
            utterance: None,
            dispatch_id: 0,
            next_dispatch_id: 1,
            last_error: Some(reason),
            terminal: true,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn utterance(&self) -> Option<&Utterance> {
        self.utterance.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether an utterance is in flight (speaking or paused).
    pub fn is_busy(&self) -> bool {
        matches!(self.state, EngineState::Speaking | EngineState::Paused)
    }

    /// Allocate the dispatch generation for an utterance about to be
    /// handed to the engine.
    pub fn issue_dispatch_id(&mut self) -> u64 {
        let id = self.next_dispatch_id;
        self.next_dispatch_id += 1;
        id
    }

    /// A `say` was accepted by the engine: enter `Speaking` with the
    /// given utterance and dispatch generation.
    pub fn begin(&mut self, utterance: Utterance, dispatch_id: u64) {
        if self.terminal {
            return;
        }
        debug_assert!(!self.is_busy());
        self.utterance = Some(utterance);
        self.dispatch_id = dispatch_id;
        self.transition(EngineState::Speaking);
    }

    /// A dispatch (or a pause the engine could not honor) failed
    /// synchronously: enter `BackendError` and record the reason.
    /// Returns `true` when the state actually changed.
    pub fn record_failure(&mut self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        tracing::warn!("Speech engine failure: {}", reason);
        self.utterance = None;
        self.dispatch_id = 0;
        self.last_error = Some(reason);
        self.transition(EngineState::BackendError)
    }

    /// Apply an asynchronous completion signal. Returns the new state
    /// when the signal produced a transition, `None` when it was stale
    /// or had no defined edge.
    pub fn complete(&mut self, signal: CompletionSignal) -> Option<EngineState> {
        if signal.dispatch_id != self.dispatch_id || self.state != EngineState::Speaking {
            tracing::debug!(
                "Discarding stale completion (dispatch {} in state {})",
                signal.dispatch_id,
                self.state
            );
            return None;
        }

        self.utterance = None;
        self.dispatch_id = 0;
        match signal.outcome {
            SpeakOutcome::Completed | SpeakOutcome::Stopped => {
                self.transition(EngineState::Ready);
                Some(EngineState::Ready)
            }
            SpeakOutcome::Failed(reason) => {
                self.last_error = Some(reason);
                self.transition(EngineState::BackendError);
                Some(EngineState::BackendError)
            }
        }
    }

    /// `stop()` request. Returns `true` when there was something to
    /// stop; `stop` in `Ready` or `BackendError` is a no-op.
    pub fn stop(&mut self) -> bool {
        if !self.is_busy() {
            return false;
        }
        self.utterance = None;
        self.dispatch_id = 0;
        self.transition(EngineState::Ready)
    }

    /// `pause()` request; only defined while `Speaking`. The utterance
    /// is retained so resume can re-dispatch it on restart-only
    /// engines.
    pub fn pause(&mut self) -> bool {
        if self.state != EngineState::Speaking {
            return false;
        }
        self.transition(EngineState::Paused)
    }

    /// `resume()` request; only defined while `Paused`.
    pub fn resume(&mut self, dispatch_id: u64) -> bool {
        if self.state != EngineState::Paused {
            return false;
        }
        self.dispatch_id = dispatch_id;
        self.transition(EngineState::Speaking)
    }

    /// The dispatch generation currently live, if any.
    pub fn dispatch_id(&self) -> u64 {
        self.dispatch_id
    }

    fn transition(&mut self, new_state: EngineState) -> bool {
        if self.terminal {
            tracing::debug!(
                "Ignoring transition to {} on terminally failed synthesizer",
                new_state
            );
            return false;
        }
        if self.state == new_state {
            return false;
        }
        if !valid_transition(self.state, new_state) {
            tracing::error!("Invalid state transition: {} -> {}", self.state, new_state);
            return false;
        }
        tracing::debug!("State transition: {} -> {}", self.state, new_state);
        self.state = new_state;
        true
    }
}
