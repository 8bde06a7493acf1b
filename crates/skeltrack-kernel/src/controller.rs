//! [`UserLifecycle`] – owner of every user's state and of the default user.
//!
//! The controller is the [`SkeletonEventHandler`] handed to
//! [`SensorSession::tick`][skeltrack_hal::SensorSession::tick].  For each
//! callback it consults [`transition`], issues every resulting command through
//! [`SkeletonCommands`] and commits the new state.  A rejected command is
//! logged and does not stop the commands after it, so a failed
//! `StopPoseDetection` still leads to a calibration request and a user whose
//! first request was refused is still recorded.  Every user keeps moving
//! through the table on its next callback instead of stalling in a state the
//! middleware has already left.
//!
//! Roster changes are never published from inside a callback.  A snapshot of
//! the middleware's user list is queued instead and handed out by
//! [`UserLifecycle::take_roster_updates`] once the frame is done.

use std::collections::HashMap;

use skeltrack_hal::{SkeletonCommands, SkeletonEventHandler};
use skeltrack_types::{SkeletonEvent, TrackerError, UserId, UserState};
use tracing::{debug, info, warn};

use crate::lifecycle::{CalibrationPolicy, transition};

// ────────────────────────────────────────────────────────────────────────────
// UserLifecycle
// ────────────────────────────────────────────────────────────────────────────

/// Drives each user from pose-waiting through calibration to tracking.
///
/// # Example
///
/// ```
/// use skeltrack_kernel::{CalibrationPolicy, UserLifecycle};
/// use skeltrack_types::UserId;
///
/// let mut lifecycle = UserLifecycle::new(CalibrationPolicy::with_pose("Psi"));
/// assert_eq!(lifecycle.state(UserId(1)), None);
/// assert!(lifecycle.select_default_user(UserId(1)).is_err());
/// ```
#[derive(Debug)]
pub struct UserLifecycle {
    policy: CalibrationPolicy,
    users: HashMap<UserId, UserState>,
    default_user: Option<UserId>,
    roster_updates: Vec<Vec<UserId>>,
}

impl UserLifecycle {
    pub fn new(policy: CalibrationPolicy) -> Self {
        Self {
            policy,
            users: HashMap::new(),
            default_user: None,
            roster_updates: Vec::new(),
        }
    }

    pub fn policy(&self) -> &CalibrationPolicy {
        &self.policy
    }

    /// Current state of `user`, or `None` when the controller does not know it.
    pub fn state(&self, user: UserId) -> Option<UserState> {
        self.users.get(&user).copied()
    }

    pub fn is_tracked(&self, user: UserId) -> bool {
        self.state(user) == Some(UserState::Tracked)
    }

    /// Tracked users in ascending id order.
    pub fn tracked_users(&self) -> Vec<UserId> {
        let mut tracked: Vec<UserId> = self
            .users
            .iter()
            .filter(|(_, state)| **state == UserState::Tracked)
            .map(|(user, _)| *user)
            .collect();
        tracked.sort();
        tracked
    }

    pub fn default_user(&self) -> Option<UserId> {
        self.default_user
    }

    /// Make `user` the default.
    ///
    /// Rejected with [`TrackerError::UntrackedUser`] unless `user` is tracked;
    /// a rejected request leaves the current default untouched.
    pub fn select_default_user(&mut self, user: UserId) -> Result<(), TrackerError> {
        if !self.is_tracked(user) {
            return Err(TrackerError::UntrackedUser(user));
        }
        self.default_user = Some(user);
        Ok(())
    }

    /// Roster snapshots queued since the last call, oldest first.
    pub fn take_roster_updates(&mut self) -> Vec<Vec<UserId>> {
        std::mem::take(&mut self.roster_updates)
    }

    fn log_event(&self, event: &SkeletonEvent) {
        match event {
            SkeletonEvent::NewUser(user) => info!("New User {user}"),
            SkeletonEvent::LostUser(user) => info!("Lost user {user}."),
            SkeletonEvent::CalibrationStart(user) => info!("Calibration started for user {user}"),
            SkeletonEvent::CalibrationEnd { user, success: true } => {
                info!("Calibration complete, start tracking user {user}")
            }
            SkeletonEvent::CalibrationEnd { user, success: false } => {
                info!("Calibration failed for user {user}")
            }
            SkeletonEvent::PoseDetected { pose, user } => info!("Pose {pose} detected for user {user}"),
        }
    }
}

impl SkeletonEventHandler for UserLifecycle {
    fn on_event(&mut self, event: &SkeletonEvent, commands: &mut dyn SkeletonCommands) {
        self.log_event(event);
        let user = event.user();
        let current = self.state(user);

        let Some(step) = transition(current, event, &self.policy) else {
            debug!(user = %user, state = ?current, event = ?event, "event ignored");
            return;
        };

        for command in &step.commands {
            if let Err(status) = commands.execute(command) {
                warn!(user = %user, command = ?command, %status, "middleware rejected command");
            }
        }

        if step.next == UserState::Lost {
            self.users.remove(&user);
            if self.default_user == Some(user) {
                info!(user = %user, "default user lost");
                self.default_user = None;
            }
        } else {
            self.users.insert(user, step.next);
        }

        if step.roster_changed {
            let roster: Vec<UserId> = commands
                .users()
                .into_iter()
                .filter(|known| step.next != UserState::Lost || *known != user)
                .collect();
            self.roster_updates.push(roster);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
