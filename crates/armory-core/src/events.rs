//! Fire-and-forget notifications emitted after successful transitions
//!
//! The state machine never reads anything back from a sink, so a sink that
//! drops everything ([`NullSink`]) is always a valid choice.

use crate::{MagazineId, ReloadType};
use serde::{Deserialize, Serialize};

/// Something observable changed on a weapon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AmmoEvent {
    /// The inserted magazine or its round count changed
    MagazineChanged {
        /// Magazine now in the weapon
        magazine: Option<MagazineId>,
        /// Rounds left in it
        rounds: u32,
    },
    /// A round entered or left the chamber
    ChamberStateChanged { has_round: bool },
    /// A reload started, finished or was cancelled
    ReloadStateChanged {
        is_reloading: bool,
        reload_type: ReloadType,
        /// Seconds the reload takes; zero when it ends
        duration: f32,
    },
}

/// Receiver of [`AmmoEvent`]s
pub trait NotificationSink {
    fn notify(&mut self, event: AmmoEvent);
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&mut self, _event: AmmoEvent) {}
}

/// Sink that keeps every event in order
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<AmmoEvent>,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events, oldest first
    pub fn events(&self) -> &[AmmoEvent] {
        &self.events
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Take all recorded events, leaving the log empty
    pub fn drain(&mut self) -> Vec<AmmoEvent> {
        std::mem::take(&mut self.events)
    }
}

impl NotificationSink for EventLog {
    fn notify(&mut self, event: AmmoEvent) {
        self.events.push(event);
    }
}

impl<T: NotificationSink + ?Sized> NotificationSink for &mut T {
    fn notify(&mut self, event: AmmoEvent) {
        (**self).notify(event);
    }
}

impl<T: NotificationSink + ?Sized> NotificationSink for Box<T> {
    fn notify(&mut self, event: AmmoEvent) {
        (**self).notify(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_log_drain() {
        let mut log = EventLog::new();
        log.notify(AmmoEvent::ChamberStateChanged { has_round: true });
        log.notify(AmmoEvent::ChamberStateChanged { has_round: false });
        assert_eq!(log.len(), 2);

        let drained = log.drain();
        assert_eq!(drained[0], AmmoEvent::ChamberStateChanged { has_round: true });
        assert!(log.is_empty());
    }

    #[test]
    fn test_boxed_sink() {
        let mut sink: Box<dyn NotificationSink> = Box::new(NullSink);
        sink.notify(AmmoEvent::MagazineChanged {
            magazine: None,
            rounds: 0,
        });
    }
}
