//! `skeltrack-middleware` – message plumbing
//!
//! Carries roster updates, default-user selections and transforms between the
//! tracker and whoever listens, without caring about the data's meaning.
//!
//! # Modules
//!
//! - [`bus`] – Topic-based publish/subscribe bus built on Tokio broadcast
//!   channels, with latched topics that replay their last message to late
//!   subscribers.

pub mod bus;

pub use bus::{DEFAULT_NODE_NAME, EventBus, Topic, TopicReceiver};
