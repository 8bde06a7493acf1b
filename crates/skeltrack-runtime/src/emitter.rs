//! [`JointTransformEmitter`] – per-tick joint transforms for every tracked user.

use skeltrack_hal::{DepthBackend, SensorSession, SkeletonCommands};
use skeltrack_kernel::UserLifecycle;
use skeltrack_middleware::EventBus;
use skeltrack_perception::{joint_transform, published_role, user_frame_id};
use skeltrack_types::{Joint, StampedTransform, UserId};
use tracing::warn;

/// Reads joints from the session and broadcasts them under the base frame.
#[derive(Debug, Clone)]
pub struct JointTransformEmitter {
    base_frame_id: String,
}

impl JointTransformEmitter {
    pub fn new(base_frame_id: impl Into<String>) -> Self {
        Self {
            base_frame_id: base_frame_id.into(),
        }
    }

    pub fn base_frame_id(&self) -> &str {
        &self.base_frame_id
    }

    /// Transforms for one user, in [`Joint::ALL`] order.
    ///
    /// Each joint yields `<role>_<user>`, followed by an unsuffixed `<role>`
    /// copy when `user` is the default user.  Joints the middleware cannot
    /// read are skipped with a warning.
    pub fn user_transforms<B: DepthBackend>(
        &self,
        session: &SensorSession<B>,
        user: UserId,
        is_default: bool,
    ) -> Vec<StampedTransform> {
        let mut out = Vec::with_capacity(if is_default { 30 } else { 15 });
        for joint in Joint::ALL {
            let sample = match session.joint(user, joint) {
                Ok(sample) => sample,
                Err(status) => {
                    warn!(user = %user, joint = ?joint, %status, "joint read failed");
                    continue;
                }
            };
            let role = published_role(joint);
            let transform = joint_transform(&sample);
            out.push(transform.stamped(&self.base_frame_id, user_frame_id(role, user)));
            if is_default {
                out.push(transform.stamped(&self.base_frame_id, role));
            }
        }
        out
    }

    /// Broadcast every tracked user's joints on `/tf`.
    ///
    /// Iterates the middleware's user list and skips anyone the lifecycle
    /// does not consider tracked or the middleware is not tracking.  Returns
    /// the number of transforms sent.
    pub fn emit<B: DepthBackend>(
        &self,
        session: &SensorSession<B>,
        lifecycle: &UserLifecycle,
        bus: &EventBus,
    ) -> usize {
        let default_user = lifecycle.default_user();
        let mut sent = 0;
        for user in session.users() {
            if !lifecycle.is_tracked(user) || !session.is_tracking(user) {
                continue;
            }
            for transform in self.user_transforms(session, user, default_user == Some(user)) {
                bus.send_transform(transform);
                sent += 1;
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use skeltrack_hal::SimDepthBackend;
    use skeltrack_kernel::CalibrationPolicy;
    use skeltrack_middleware::Topic;
    use skeltrack_types::{EventPayload, JointSample, MiddlewareStatus, SkeletonEvent};
    use tempfile::NamedTempFile;

    fn xml() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "<OpenNI/>").unwrap();
        file
    }

    /// A session and lifecycle with `users` tracked.
    fn tracked(users: &[u16]) -> (SensorSession<SimDepthBackend>, UserLifecycle, NamedTempFile) {
        let config = xml();
        let mut backend = SimDepthBackend::new();
        let mut frame = Vec::new();
        for &id in users {
            frame.push(SkeletonEvent::NewUser(UserId(id)));
        }
        backend.push_frame(frame);
        backend.push_frame(
            users
                .iter()
                .map(|&id| SkeletonEvent::CalibrationEnd {
                    user: UserId(id),
                    success: true,
                })
                .collect(),
        );
        let mut session = SensorSession::open(backend, config.path()).unwrap();
        session.start_primed().unwrap();
        let mut lifecycle = UserLifecycle::new(CalibrationPolicy::immediate());
        session.tick(&mut lifecycle).unwrap();
        session.tick(&mut lifecycle).unwrap();
        (session, lifecycle, config)
    }

    #[test]
    fn tracked_user_gets_fifteen_suffixed_frames() {
        let (session, lifecycle, _config) = tracked(&[3]);
        let emitter = JointTransformEmitter::new("openni_depth_frame");
        let frames = emitter.user_transforms(&session, UserId(3), false);

        assert_eq!(frames.len(), 15);
        assert!(frames.iter().all(|t| t.frame_id == "openni_depth_frame"));
        assert!(frames.iter().all(|t| t.child_frame_id.ends_with("_3")));
        assert!(lifecycle.is_tracked(UserId(3)));
    }

    #[test]
    fn default_user_frames_are_duplicated_unsuffixed() {
        let (session, _lifecycle, _config) = tracked(&[9]);
        let emitter = JointTransformEmitter::new("openni_depth_frame");
        let frames = emitter.user_transforms(&session, UserId(9), true);

        assert_eq!(frames.len(), 30);
        let head_9 = frames.iter().find(|t| t.child_frame_id == "head_9").unwrap();
        let head = frames.iter().find(|t| t.child_frame_id == "head").unwrap();
        assert_eq!(head_9.translation, head.translation);
        assert_eq!(head_9.rotation, head.rotation);
    }

    #[test]
    fn left_hand_is_published_as_right_hand() {
        let (mut session, _lifecycle, _config) = tracked(&[2]);
        session
            .backend_mut()
            .set_joint(UserId(2), Joint::LeftHand, JointSample::at([1000.0, 0.0, 0.0]));
        let emitter = JointTransformEmitter::new("base");
        let frames = emitter.user_transforms(&session, UserId(2), false);

        let right = frames.iter().find(|t| t.child_frame_id == "right_hand_2").unwrap();
        let expected = joint_transform(&JointSample::at([1000.0, 0.0, 0.0]));
        assert_eq!(right.translation, [expected.translation.x, expected.translation.y, expected.translation.z]);
        let left = frames.iter().find(|t| t.child_frame_id == "left_hand_2").unwrap();
        assert_ne!(left.translation, right.translation);
    }

    #[test]
    fn emit_skips_untracked_users() {
        let (mut session, mut lifecycle, _config) = tracked(&[4]);
        session.backend_mut().push_frame(vec![SkeletonEvent::NewUser(UserId(5))]);
        session.tick(&mut lifecycle).unwrap();

        let bus = EventBus::default();
        let mut tf = bus.subscribe_to(Topic::Tf);
        let emitter = JointTransformEmitter::new("openni_depth_frame");
        assert_eq!(emitter.emit(&session, &lifecycle, &bus), 15);

        let children: Vec<String> = tf
            .drain()
            .into_iter()
            .filter_map(|e| match e.payload {
                EventPayload::Transform(t) => Some(t.child_frame_id),
                _ => None,
            })
            .collect();
        assert_eq!(children.len(), 15);
        assert!(children.iter().all(|c| c.ends_with("_4")));
    }

    #[test]
    fn emit_skips_user_the_middleware_refused_to_track() {
        let config = xml();
        let mut backend = SimDepthBackend::new();
        backend.push_frame(vec![SkeletonEvent::NewUser(UserId(6))]);
        backend.push_frame(vec![SkeletonEvent::CalibrationEnd {
            user: UserId(6),
            success: true,
        }]);
        let mut session = SensorSession::open(backend, config.path()).unwrap();
        session.start_primed().unwrap();
        let mut lifecycle = UserLifecycle::new(CalibrationPolicy::immediate());
        session.tick(&mut lifecycle).unwrap();
        session
            .backend_mut()
            .fail_next_command(MiddlewareStatus::Failed(3));
        session.tick(&mut lifecycle).unwrap();
        assert!(lifecycle.is_tracked(UserId(6)));

        let bus = EventBus::default();
        let emitter = JointTransformEmitter::new("openni_depth_frame");
        assert_eq!(emitter.base_frame_id(), "openni_depth_frame");
        assert_eq!(emitter.emit(&session, &lifecycle, &bus), 0);
    }
}
