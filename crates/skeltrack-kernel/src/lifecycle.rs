//! Per-user state machine as a pure function.
//!
//! [`transition`] maps `(state, event)` to the next state and the commands the
//! controller must issue.  It touches neither the middleware nor the bus, so
//! every row of the table below is testable in isolation.
//!
//! | From | Event | Commands | To |
//! |---|---|---|---|
//! | (none) | `NewUser`, pose needed | `StartPoseDetection` | `PoseWait` |
//! | (none) | `NewUser`, no pose | `RequestCalibration(force)` | `Calibrating` |
//! | `PoseWait` | `PoseDetected` | `StopPoseDetection`, `RequestCalibration(force)` | `Calibrating` |
//! | `Calibrating` | `CalibrationStart` | – | `Calibrating` |
//! | `Calibrating` | `CalibrationEnd` ok | `StartTracking` | `Tracked` |
//! | `Calibrating` | `CalibrationEnd` failed, pose needed | `StartPoseDetection` | `PoseWait` |
//! | `Calibrating` | `CalibrationEnd` failed, no pose | `RequestCalibration(force)` | `Calibrating` |
//! | any | `LostUser` | – | `Lost` |

use skeltrack_types::{SkeletonCommand, SkeletonEvent, UserId, UserState};

/// How calibration is started for a new user.  Fixed for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationPolicy {
    /// The subject must hold `pose_name` before calibration.
    pub needs_pose: bool,
    pub pose_name: String,
}

impl CalibrationPolicy {
    /// Calibrate straight away, no pose.
    pub fn immediate() -> Self {
        Self {
            needs_pose: false,
            pose_name: String::new(),
        }
    }

    /// Wait for `pose_name` first.
    pub fn with_pose(pose_name: impl Into<String>) -> Self {
        Self {
            needs_pose: true,
            pose_name: pose_name.into(),
        }
    }

    /// First step of a calibration attempt for `user`.
    fn begin(&self, user: UserId) -> (UserState, SkeletonCommand) {
        if self.needs_pose {
            (
                UserState::PoseWait,
                SkeletonCommand::StartPoseDetection {
                    pose: self.pose_name.clone(),
                    user,
                },
            )
        } else {
            (
                UserState::Calibrating,
                SkeletonCommand::RequestCalibration { user, force: true },
            )
        }
    }
}

/// Outcome of one accepted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: UserState,
    /// Issued in order.
    pub commands: Vec<SkeletonCommand>,
    /// The roster must be republished once the commands succeed.
    pub roster_changed: bool,
}

impl Transition {
    fn to(next: UserState, commands: Vec<SkeletonCommand>) -> Self {
        Self {
            next,
            commands,
            roster_changed: false,
        }
    }

    fn publishing_roster(mut self) -> Self {
        self.roster_changed = true;
        self
    }
}

/// Apply `event` to a user currently in `current` (`None` when unknown).
///
/// Returns `None` for events outside the table; the caller leaves the user
/// untouched.  A `Lost` user is treated as unknown, so a reused id starts
/// over on its next `NewUser`.
pub fn transition(
    current: Option<UserState>,
    event: &SkeletonEvent,
    policy: &CalibrationPolicy,
) -> Option<Transition> {
    let live = current.filter(|state| *state != UserState::Lost);
    match (live, event) {
        (_, SkeletonEvent::LostUser(_)) => {
            Some(Transition::to(UserState::Lost, Vec::new()).publishing_roster())
        }
        (None, SkeletonEvent::NewUser(user)) => {
            let (next, command) = policy.begin(*user);
            Some(Transition::to(next, vec![command]))
        }
        (Some(UserState::PoseWait), SkeletonEvent::PoseDetected { user, .. }) => Some(Transition::to(
            UserState::Calibrating,
            vec![
                SkeletonCommand::StopPoseDetection(*user),
                SkeletonCommand::RequestCalibration {
                    user: *user,
                    force: true,
                },
            ],
        )),
        (Some(UserState::Calibrating), SkeletonEvent::CalibrationStart(_)) => {
            Some(Transition::to(UserState::Calibrating, Vec::new()))
        }
        (Some(UserState::Calibrating), SkeletonEvent::CalibrationEnd { user, success: true }) => Some(
            Transition::to(UserState::Tracked, vec![SkeletonCommand::StartTracking(*user)])
                .publishing_roster(),
        ),
        (Some(UserState::Calibrating), SkeletonEvent::CalibrationEnd { user, success: false }) => {
            let (next, command) = policy.begin(*user);
            Some(Transition::to(next, vec![command]))
        }
        _ => None,
    }
}
