//! The move sink: where reconciled moves are delivered.
//!
//! The connection calls [`MoveSink::on_move`] once per physical move, in the
//! order the moves were made.  Implementations should return quickly; the
//! notification loop waits for the call to finish before reading the next
//! notification.

use std::sync::{Mutex, PoisonError};

use cube_core::MoveEvent;

/// Receives reconciled moves.
#[cfg_attr(test, mockall::automock)]
pub trait MoveSink: Send + Sync {
    /// Called once for each move, oldest first.
    fn on_move(&self, event: &MoveEvent);
}

/// A sink that stores every move it receives.
///
/// Useful in tests and for the replay binary.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MoveEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every event received so far.
    pub fn events(&self) -> Vec<MoveEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The received moves in standard notation, e.g. `["R", "U'"]`.
    pub fn tokens(&self) -> Vec<String> {
        self.events().iter().map(ToString::to_string).collect()
    }
}

impl MoveSink for RecordingSink {
    fn on_move(&self, event: &MoveEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*event);
    }
}

/// A sink that forwards each move to a closure.
pub struct CallbackSink<F> {
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: Fn(&MoveEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> MoveSink for CallbackSink<F>
where
    F: Fn(&MoveEvent) + Send + Sync,
{
    fn on_move(&self, event: &MoveEvent) {
        (self.callback)(event);
    }
}
