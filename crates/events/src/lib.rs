#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async communication in aptsync
//!
//! Library crates never print or log directly. They emit typed events over
//! an unbounded channel; the CLI forwards every event to `tracing` and drives
//! progress output from them.

pub mod events;
pub use events::{
    AppEvent, CleanEvent, DownloadEvent, EngineEvent, FailureContext, GeneralEvent, LockEvent,
    RepoEvent,
};

use tokio::sync::mpsc::UnboundedSender;

/// Type alias for the event sender
pub type EventSender = UnboundedSender<AppEvent>;

/// Type alias for the event receiver
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<AppEvent>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// Anything that may hold an event sender
///
/// Components built without a channel still call `emit`; the event is dropped.
pub trait EventEmitter {
    /// Get the event sender for this emitter
    fn event_sender(&self) -> Option<&EventSender>;

    /// Emit an event through this emitter
    fn emit(&self, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            // Receiver gone means nobody is listening
            let _ = sender.send(event);
        }
    }

    fn emit_debug(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::debug(message)));
    }

    fn emit_warning(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning(message)));
    }

    /// Warning about a specific path or URL
    fn emit_warning_with_context(&self, message: impl Into<String>, context: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning_with_context(
            message, context,
        )));
    }

    /// Emit an error event
    fn emit_error(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error(message)));
    }
}

/// Implementation of `EventEmitter` for the raw `EventSender`
impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}

/// Emitting through an optional sender is a no-op when absent
impl EventEmitter for Option<EventSender> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct Component {
        tx: Option<EventSender>,
    }

    impl EventEmitter for Component {
        fn event_sender(&self) -> Option<&EventSender> {
            self.tx.as_ref()
        }
    }

    #[test]
    fn test_warning_with_context_reaches_receiver() {
        let (tx, mut rx) = channel();
        let component = Component { tx: Some(tx) };
        component.emit_warning_with_context("skipped line", "Release");

        match rx.try_recv() {
            Ok(AppEvent::General(GeneralEvent::Warning { message, context })) => {
                assert_eq!(message, "skipped line");
                assert_eq!(context.as_deref(), Some("Release"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_events_serialize_with_domain_tag() {
        let event = AppEvent::Lock(LockEvent::Recovered {
            marker: PathBuf::from("/m/var/locks/ab12.lock"),
            destination: Some(PathBuf::from("/m/pool/a.deb")),
            url: Some("http://h/pool/a.deb".into()),
        });
        let json = serde_json::to_value(&event).unwrap_or_default();

        assert_eq!(json["domain"], "lock");
        assert_eq!(event.log_target(), "aptsync::events::lock");
        assert_eq!(event.log_level(), tracing::Level::WARN);
    }
}
