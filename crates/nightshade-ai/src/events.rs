//! Notification bus for one-shot behavior events.
//!
//! Behaviors publish; owner logic and presentation scripts subscribe. Every
//! subscriber gets its own channel so each one observes exactly one copy of
//! every notification.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::state_machine::BehaviorKind;
use nightshade_common::EntityId;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// A chase episode began
    ChaseStarted,
    /// The chase gave up (fires at most once per episode)
    ChaseStopped,
    /// The chase behavior was exited
    ChaseEnded,
    /// The target could not be resolved within the acquisition timeout
    TargetNotFound,
    /// Strategic repositioning exhausted its attempts and fell back to a random waypoint
    StrategicRepositionFailed,
    /// Stalking switched from passive to aggressive
    StalkTurnedAggressive,
    /// The owner switched behaviors
    BehaviorChanged {
        /// Previous behavior, if any
        from: Option<BehaviorKind>,
        /// New behavior
        to: BehaviorKind,
    },
}

/// A notification raised by an antagonist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Antagonist that raised it
    pub source: EntityId,
    /// Event kind
    pub kind: NotificationKind,
}

/// Fan-out bus delivering every notification to every subscriber.
#[derive(Debug, Default)]
pub struct NotificationBus {
    /// One sender per live subscriber
    subscribers: Mutex<Vec<Sender<Notification>>>,
}

impl NotificationBus {
    /// Creates a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber and returns its receiving end.
    pub fn subscribe(&self) -> Receiver<Notification> {
        let (sender, receiver) = unbounded();
        self.subscribers.lock().push(sender);
        receiver
    }

    /// Publishes a notification to every subscriber.
    ///
    /// Subscribers whose receiver has been dropped are removed.
    pub fn publish(&self, source: EntityId, kind: NotificationKind) {
        let notification = Notification { source, kind };
        trace!(?notification, "publish");
        self.subscribers
            .lock()
            .retain(|sender| sender.send(notification).is_ok());
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Drains all pending notifications from a receiver.
pub fn drain(receiver: &Receiver<Notification>) -> Vec<Notification> {
    receiver.try_iter().collect()
}
