//! Event dispatcher.
//!
//! Turn events flow over an unbounded channel owned by the caller. Sending
//! never blocks and a vanished observer never fails the turn.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::warn;

use crate::domain::events::TurnEvent;

/// Delivers turn events to a single observer.
#[derive(Debug, Clone, Default)]
pub struct EventDispatcher {
    sender: Option<UnboundedSender<TurnEvent>>,
}

impl EventDispatcher {
    /// Creates a dispatcher together with the receiving end.
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<TurnEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// A dispatcher with no observer; events are dropped.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// Sends an event to the observer, if one is still listening.
    pub fn emit(&self, event: TurnEvent) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(event).is_err() {
            warn!("turn event observer has gone away; dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emitted_events_arrive_in_order() {
        let (dispatcher, mut receiver) = EventDispatcher::channel();

        dispatcher.emit(TurnEvent::chunk("a"));
        dispatcher.emit(TurnEvent::done());
        drop(dispatcher);

        assert_eq!(receiver.recv().await, Some(TurnEvent::chunk("a")));
        assert_eq!(receiver.recv().await, Some(TurnEvent::done()));
        assert_eq!(receiver.recv().await, None);
    }

    #[test]
    fn test_emit_after_receiver_dropped_does_not_panic() {
        let (dispatcher, receiver) = EventDispatcher::channel();
        drop(receiver);

        dispatcher.emit(TurnEvent::done());
    }

    #[test]
    fn test_detached_dispatcher_drops_events() {
        EventDispatcher::detached().emit(TurnEvent::chunk("ignored"));
    }
}
