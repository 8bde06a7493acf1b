//! Topic-based message bus with latched topics.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.  Latched topics additionally keep their most recent message in
//! a [`tokio::sync::watch`] cell and replay it to anyone who subscribes later.
//!
//! # Topics
//!
//! | Topic | Resolved name | Latched | Traffic |
//! |---|---|---|---|
//! | [`Topic::AvailableTrackedUsers`] | `/<node>/available_tracked_users` | yes | user ids known to the middleware |
//! | [`Topic::DefaultUser`] | `/<node>/default_user` | yes | the user republished unsuffixed |
//! | [`Topic::Tf`] | `/tf` | no | one transform per joint per tracked user per tick |
//! | [`Topic::UserChooser`] | `/<node>/user_chooser` | no | inbound default-user requests |
//!
//! Every receive path has a non-blocking form ([`TopicReceiver::try_recv`]) so
//! a single-threaded loop can drain pending messages between frames.

use std::sync::Arc;

use skeltrack_types::{Event, EventPayload, StampedTransform};
use tokio::sync::{broadcast, watch};
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Default private namespace.
pub const DEFAULT_NODE_NAME: &str = "skeltrack";

/// Enumeration of all routing topics on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Ids of every user the middleware currently knows.  Latched.
    AvailableTrackedUsers,
    /// The user whose joints are also published under unsuffixed names.  Latched.
    DefaultUser,
    /// Transform stream.
    Tf,
    /// Requests to change the default user.
    UserChooser,
}

impl Topic {
    /// Name relative to the node's private namespace.
    pub fn name(self) -> &'static str {
        match self {
            Topic::AvailableTrackedUsers => "available_tracked_users",
            Topic::DefaultUser => "default_user",
            Topic::Tf => "tf",
            Topic::UserChooser => "user_chooser",
        }
    }

    /// Whether late subscribers receive the last published message.
    pub fn is_latched(self) -> bool {
        matches!(self, Topic::AvailableTrackedUsers | Topic::DefaultUser)
    }
}

#[derive(Clone, Debug)]
struct Lane {
    sender: broadcast::Sender<Event>,
    latch: Option<Arc<watch::Sender<Option<Event>>>>,
}

impl Lane {
    fn new(capacity: usize, latched: bool) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        let latch = latched.then(|| Arc::new(watch::channel(None).0));
        Self { sender, latch }
    }
}

/// Shared message bus. Clone it cheaply – all clones share the same
/// underlying channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    node_name: String,
    available_tracked_users: Lane,
    default_user: Lane,
    tf: Lane,
    user_chooser: Lane,
}

impl EventBus {
    /// Create a bus for the node `node_name` with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(node_name: impl Into<String>, capacity: usize) -> Self {
        Self {
            node_name: node_name.into(),
            available_tracked_users: Lane::new(capacity, Topic::AvailableTrackedUsers.is_latched()),
            default_user: Lane::new(capacity, Topic::DefaultUser.is_latched()),
            tf: Lane::new(capacity, Topic::Tf.is_latched()),
            user_chooser: Lane::new(capacity, Topic::UserChooser.is_latched()),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Fully qualified topic name.  The transform stream is global; every
    /// other topic lives in the node's private namespace.
    pub fn resolve(&self, topic: Topic) -> String {
        match topic {
            Topic::Tf => "/tf".to_string(),
            _ => format!("/{}/{}", self.node_name, topic.name()),
        }
    }

    /// Publish `payload` on `topic`.
    ///
    /// Returns the number of active receivers that were handed the event.
    /// Publishing with nobody listening is normal and returns `0`; latched
    /// topics still remember the message for later subscribers.
    pub fn publish_to(&self, topic: Topic, payload: EventPayload) -> usize {
        let event = Event::new(self.resolve(topic), payload);
        let lane = self.lane(topic);
        if let Some(latch) = &lane.latch {
            latch.send_replace(Some(event.clone()));
        }
        lane.sender.send(event).unwrap_or(0)
    }

    /// Broadcast one transform on [`Topic::Tf`].
    pub fn send_transform(&self, transform: StampedTransform) -> usize {
        self.publish_to(Topic::Tf, EventPayload::Transform(transform))
    }

    /// Subscribe to `topic`.
    ///
    /// On a latched topic the receiver first yields the most recent message,
    /// if any was ever published.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        let lane = self.lane(topic);
        let latched = lane.latch.as_ref().and_then(|latch| latch.borrow().clone());
        TopicReceiver {
            topic,
            latched,
            receiver: lane.sender.subscribe(),
        }
    }

    /// Last message published on a latched topic.
    pub fn latest(&self, topic: Topic) -> Option<Event> {
        self.lane(topic)
            .latch
            .as_ref()
            .and_then(|latch| latch.borrow().clone())
    }

    fn lane(&self, topic: Topic) -> &Lane {
        match topic {
            Topic::AvailableTrackedUsers => &self.available_tracked_users,
            Topic::DefaultUser => &self.default_user,
            Topic::Tf => &self.tf,
            Topic::UserChooser => &self.user_chooser,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_NODE_NAME, DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// A receiver bound to a single [`Topic`].
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    latched: Option<Event>,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Next pending event, without waiting.
    ///
    /// Returns `None` when nothing is queued.  Messages dropped because this
    /// receiver fell behind are logged and skipped.
    pub fn try_recv(&mut self) -> Option<Event> {
        if let Some(event) = self.latched.take() {
            return Some(event);
        }
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(topic = self.topic.name(), lagged_by = n, "TopicReceiver lagged");
                    continue;
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return None,
            }
        }
    }

    /// Every pending event, oldest first.
    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        if let Some(event) = self.latched.take() {
            return Ok(event);
        }
        self.receiver.recv().await
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}
