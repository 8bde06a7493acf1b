use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Opaque user identifier assigned by the depth middleware.
///
/// Unique while the user is known; the middleware may hand the same id to a
/// different body after the original one is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u16);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for UserId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

/// Skeletal joints streamed for every tracked user.
///
/// Left/right follow the middleware's own side labels, not the names the
/// joints are published under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Joint {
    Head,
    Neck,
    Torso,
    LeftShoulder,
    LeftElbow,
    LeftHand,
    RightShoulder,
    RightElbow,
    RightHand,
    LeftHip,
    LeftKnee,
    LeftFoot,
    RightHip,
    RightKnee,
    RightFoot,
}

impl Joint {
    /// All joints, in the order they are emitted each tick.
    pub const ALL: [Joint; 15] = [
        Joint::Head,
        Joint::Neck,
        Joint::Torso,
        Joint::LeftShoulder,
        Joint::LeftElbow,
        Joint::LeftHand,
        Joint::RightShoulder,
        Joint::RightElbow,
        Joint::RightHand,
        Joint::LeftHip,
        Joint::LeftKnee,
        Joint::LeftFoot,
        Joint::RightHip,
        Joint::RightKnee,
        Joint::RightFoot,
    ];
}

/// Raw joint reading as delivered by the middleware.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointSample {
    /// Position in millimetres, sensor axis convention (X right, Y up, Z forward).
    pub position_mm: [f32; 3],
    pub position_confidence: f32,
    /// 3×3 rotation matrix, row-major.
    pub orientation: [f32; 9],
    pub orientation_confidence: f32,
}

impl JointSample {
    pub const IDENTITY_ROTATION: [f32; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

    /// A fully confident sample at `position_mm` with identity orientation.
    pub fn at(position_mm: [f32; 3]) -> Self {
        Self {
            position_mm,
            position_confidence: 1.0,
            orientation: Self::IDENTITY_ROTATION,
            orientation_confidence: 1.0,
        }
    }
}

/// Per-user lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserState {
    /// Waiting for the subject to assume the calibration pose.
    PoseWait,
    /// A calibration request is outstanding.
    Calibrating,
    /// Calibration succeeded; joints are streamed every tick.
    Tracked,
    /// The middleware lost the user. Removed right after the transition.
    Lost,
}

/// Callbacks raised by the middleware while it advances a frame, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkeletonEvent {
    NewUser(UserId),
    LostUser(UserId),
    CalibrationStart(UserId),
    CalibrationEnd { user: UserId, success: bool },
    PoseDetected { pose: String, user: UserId },
}

impl SkeletonEvent {
    /// The user this event concerns.
    pub fn user(&self) -> UserId {
        match self {
            SkeletonEvent::NewUser(user)
            | SkeletonEvent::LostUser(user)
            | SkeletonEvent::CalibrationStart(user)
            | SkeletonEvent::CalibrationEnd { user, .. }
            | SkeletonEvent::PoseDetected { user, .. } => *user,
        }
    }
}

/// Commands the lifecycle controller issues to the middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkeletonCommand {
    StartPoseDetection { pose: String, user: UserId },
    StopPoseDetection(UserId),
    RequestCalibration { user: UserId, force: bool },
    StartTracking(UserId),
}

/// A rigid transform between two named frames, as broadcast on `/tf`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampedTransform {
    /// Parent frame, e.g. `"openni_depth_frame"`.
    pub frame_id: String,
    /// Child frame, e.g. `"head_3"` or `"head"`.
    pub child_frame_id: String,
    pub translation: [f64; 3],
    /// Quaternion in `x, y, z, w` order.
    pub rotation: [f64; 4],
}

/// Unified message wrapper for the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Fully resolved topic name, e.g. `"/skeltrack/default_user"`.
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data routed over the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    /// Every user currently known to the middleware, in query order.
    TrackedUsers(Vec<UserId>),
    /// The user whose frames are also published unsuffixed.
    DefaultUser(UserId),
    /// Inbound request to change the default user.
    UserChooser(UserId),
    Transform(StampedTransform),
}

/// Runtime configuration of the tracker node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Base frame every joint transform is published under.
    #[serde(default = "default_camera_frame_id")]
    pub camera_frame_id: String,

    /// Tick loop frequency.
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,

    /// Middleware XML configuration file.
    #[serde(default = "default_middleware_config_path")]
    pub middleware_config_path: PathBuf,
}

fn default_camera_frame_id() -> String {
    "openni_depth_frame".to_string()
}

fn default_tick_rate_hz() -> u32 {
    30
}

/// `openni_tracker.xml` inside the package's shared data directory.
///
/// `SKELTRACK_SHARE_DIR` points at an installed data directory; otherwise the
/// workspace `share/` directory this crate was built from is used.
pub fn default_middleware_config_path() -> PathBuf {
    let share = std::env::var("SKELTRACK_SHARE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../share"));
    share.join("openni_tracker.xml")
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            camera_frame_id: default_camera_frame_id(),
            tick_rate_hz: default_tick_rate_hz(),
            middleware_config_path: default_middleware_config_path(),
        }
    }
}

/// Status codes reported by the depth middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MiddlewareStatus {
    FileNotFound,
    NoNodePresent,
    NotSupported,
    WaitTimeout,
    BadUserId,
    /// Any other non-OK code.
    Failed(u32),
}

impl MiddlewareStatus {
    /// Numeric status code, never zero.
    pub fn code(self) -> u32 {
        match self {
            MiddlewareStatus::FileNotFound => 65538,
            MiddlewareStatus::NoNodePresent => 65557,
            MiddlewareStatus::NotSupported => 65546,
            MiddlewareStatus::WaitTimeout => 65567,
            MiddlewareStatus::BadUserId => 65622,
            MiddlewareStatus::Failed(0) => 1,
            MiddlewareStatus::Failed(code) => code,
        }
    }
}

impl fmt::Display for MiddlewareStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiddlewareStatus::FileNotFound => write!(f, "File not found"),
            MiddlewareStatus::NoNodePresent => write!(f, "Can't create any node of the requested type"),
            MiddlewareStatus::NotSupported => write!(f, "Operation not supported"),
            MiddlewareStatus::WaitTimeout => write!(f, "Wait for data timed out"),
            MiddlewareStatus::BadUserId => write!(f, "Bad user id"),
            MiddlewareStatus::Failed(code) => write!(f, "Failed (status {code})"),
        }
    }
}

/// Errors surfaced by the tracker.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("InitFromXml failed for '{path}': {status}")]
    ConfigLoad { path: PathBuf, status: MiddlewareStatus },

    #[error("Find depth generator failed: {0}")]
    NoDepthNode(MiddlewareStatus),

    #[error("Find user generator failed: {0}")]
    UserGeneratorUnavailable(MiddlewareStatus),

    #[error("Supplied user generator doesn't support skeleton")]
    SkeletonUnsupported,

    #[error("Pose required, but not supported")]
    PoseDetectionUnsupported,

    #[error("StartGenerating failed: {0}")]
    StartGenerating(MiddlewareStatus),

    #[error("WaitAndUpdateAll failed: {0}")]
    FrameWait(MiddlewareStatus),

    #[error("There is currently no tracked user with number {0}")]
    UntrackedUser(UserId),

    #[error("Config error: {0}")]
    Config(String),
}

impl TrackerError {
    /// Process exit code for a fatal error.
    ///
    /// Capability failures exit with `1`; failed middleware checks exit with
    /// the middleware status code truncated to the platform's 8 bits, bumped to
    /// `1` if the truncation would read as success.
    pub fn exit_code(&self) -> u8 {
        let status = match self {
            TrackerError::ConfigLoad { status, .. }
            | TrackerError::NoDepthNode(status)
            | TrackerError::UserGeneratorUnavailable(status)
            | TrackerError::StartGenerating(status)
            | TrackerError::FrameWait(status) => *status,
            TrackerError::SkeletonUnsupported
            | TrackerError::PoseDetectionUnsupported
            | TrackerError::UntrackedUser(_)
            | TrackerError::Config(_) => return 1,
        };
        match (status.code() & 0xff) as u8 {
            0 => 1,
            code => code,
        }
    }
}
