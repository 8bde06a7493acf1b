//! Per-joint conversion from middleware readings to published transforms.
//!
//! A raw [`JointSample`] is in millimetres in the sensor's native axes.  The
//! conversion, applied joint by joint:
//!
//! 1. metres, with the X axis flipped: `(-X, Y, Z) / 1000`;
//! 2. rotation matrix → quaternion `(qx, qy, qz, qw)`, published as
//!    `(qx, -qy, -qz, qw)`;
//! 3. the result is pre-multiplied by the fixed frame-convention change
//!    [`frame_convention`], a pure rotation equal to ZYX Euler `(π/2, 0, π/2)`.
//!
//! # Published names
//!
//! Limb joints are published with their sides swapped: the middleware's
//! LEFT hand is published as `right_hand`, and so on for shoulders, elbows,
//! hands, hips, knees and feet.  Head, neck and torso keep their names.

use std::f64::consts::FRAC_PI_2;

use skeltrack_types::{Joint, JointSample, UserId};

use crate::transform::{Quaternion, Transform3D, Vec3};

/// Name a middleware joint is published under.
pub fn published_role(joint: Joint) -> &'static str {
    match joint {
        Joint::Head => "head",
        Joint::Neck => "neck",
        Joint::Torso => "torso",
        Joint::LeftShoulder => "right_shoulder",
        Joint::LeftElbow => "right_elbow",
        Joint::LeftHand => "right_hand",
        Joint::RightShoulder => "left_shoulder",
        Joint::RightElbow => "left_elbow",
        Joint::RightHand => "left_hand",
        Joint::LeftHip => "right_hip",
        Joint::LeftKnee => "right_knee",
        Joint::LeftFoot => "right_foot",
        Joint::RightHip => "left_hip",
        Joint::RightKnee => "left_knee",
        Joint::RightFoot => "left_foot",
    }
}

/// Per-user child frame name, e.g. `right_hand_2`.
pub fn user_frame_id(role: &str, user: UserId) -> String {
    format!("{role}_{user}")
}

/// Fixed rotation from the sensor's axes into the robotics convention
/// (X forward, Y left, Z up).
pub fn frame_convention() -> Transform3D {
    Transform3D::new(
        Vec3::zero(),
        Quaternion::from_euler_zyx(FRAC_PI_2, 0.0, FRAC_PI_2),
    )
}

/// Joint pose in the sensor frame, before the frame-convention change.
pub fn sensor_transform(sample: &JointSample) -> Transform3D {
    let [x, y, z] = sample.position_mm.map(f64::from);
    let translation = Vec3::new(-x / 1000.0, y / 1000.0, z / 1000.0);

    let q = Quaternion::from_rotation_matrix(&sample.orientation.map(f64::from));
    Transform3D::new(translation, Quaternion::new(q.w, q.x, -q.y, -q.z))
}

/// The transform published for one joint: `C · T_joint`.
pub fn joint_transform(sample: &JointSample) -> Transform3D {
    frame_convention().compose(sensor_transform(sample))
}
