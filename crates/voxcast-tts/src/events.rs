//! Event fan-out to subscribers
//!
//! Every subscriber gets its own channel; a notification is delivered
//! to each of them exactly once, in the order the changes occurred.
//! Dropping the receiver unsubscribes; dead channels are pruned on the
//! next emit.

use crossbeam_channel::{Receiver, Sender};

use crate::types::TtsEvent;

#[derive(Default)]
pub(crate) struct EventDispatcher {
    subscribers: Vec<Sender<TtsEvent>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<TtsEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, event: TtsEvent) {
        tracing::debug!("Event: {:?}", event);
        self.subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn emit_all(&mut self, events: Vec<TtsEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
