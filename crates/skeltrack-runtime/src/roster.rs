//! [`RosterService`] – the roster and default-user publishers.
//!
//! Both topics are latched, so a consumer that connects late still learns the
//! current roster and default user.

use skeltrack_kernel::UserLifecycle;
use skeltrack_middleware::{EventBus, Topic};
use skeltrack_types::{EventPayload, UserId};
use tracing::{debug, info, warn};

/// Publishes `available_tracked_users` and `default_user`.
#[derive(Debug, Clone)]
pub struct RosterService {
    bus: EventBus,
    roster: Vec<UserId>,
}

impl RosterService {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            roster: Vec::new(),
        }
    }

    /// The last roster published, in middleware order.
    pub fn roster(&self) -> &[UserId] {
        &self.roster
    }

    /// Replace the roster snapshot and publish it.
    pub fn publish_roster(&mut self, users: Vec<UserId>) {
        debug!(users = ?users, "publishing roster");
        self.roster = users;
        self.bus.publish_to(
            Topic::AvailableTrackedUsers,
            EventPayload::TrackedUsers(self.roster.clone()),
        );
    }

    /// Handle a `user_chooser` request.
    ///
    /// Accepted only when `user` is tracked; otherwise a warning is logged and
    /// the current default stays.  Returns whether the default changed.
    pub fn set_default_user(&self, user: UserId, lifecycle: &mut UserLifecycle) -> bool {
        match lifecycle.select_default_user(user) {
            Ok(()) => {
                self.publish_default_user(user);
                info!("Default user is now user {user}.");
                true
            }
            Err(e) => {
                warn!("{e}.");
                false
            }
        }
    }

    pub fn publish_default_user(&self, user: UserId) {
        self.bus
            .publish_to(Topic::DefaultUser, EventPayload::DefaultUser(user));
    }
}
