//! [`SensorSession`] – the single owning handle on the depth middleware.
//!
//! Created once at startup by [`SensorSession::open`] and threaded explicitly
//! to whoever needs the middleware.  Dropping the session stops every
//! generator and releases the context, so every exit path (including a
//! failed `open`) leaves the middleware torn down.

use std::path::Path;

use skeltrack_types::{Joint, JointSample, MiddlewareStatus, SkeletonCommand, TrackerError, UserId};
use tracing::{debug, info, warn};

use crate::sensor::{Capability, DepthBackend, SkeletonCommands, SkeletonEventHandler, SkeletonProfile};

/// Initial size of the buffer handed to the middleware's user query.
pub const USER_QUERY_CAPACITY: usize = 15;

/// An open middleware session.
pub struct SensorSession<B: DepthBackend> {
    backend: B,
    needs_pose: bool,
    pose_name: String,
    generating: bool,
    released: bool,
}

impl<B: DepthBackend> SensorSession<B> {
    /// Bring up the middleware from the XML configuration at `config_path`.
    ///
    /// # Errors
    ///
    /// - [`TrackerError::ConfigLoad`] – the configuration cannot be loaded.
    /// - [`TrackerError::NoDepthNode`] – no depth generator exists.
    /// - [`TrackerError::UserGeneratorUnavailable`] – no user generator exists
    ///   and none can be created.
    /// - [`TrackerError::SkeletonUnsupported`] – the user generator cannot
    ///   track skeletons.
    /// - [`TrackerError::PoseDetectionUnsupported`] – calibration needs a pose
    ///   but the user generator cannot detect poses.
    pub fn open(backend: B, config_path: &Path) -> Result<Self, TrackerError> {
        let mut session = Self {
            backend,
            needs_pose: false,
            pose_name: String::new(),
            generating: false,
            released: false,
        };
        session.bring_up(config_path)?;
        Ok(session)
    }

    fn bring_up(&mut self, config_path: &Path) -> Result<(), TrackerError> {
        info!(path = %config_path.display(), "Setting up configuration from XML file");
        self.backend
            .init_from_xml_file(config_path)
            .map_err(|status| TrackerError::ConfigLoad {
                path: config_path.to_path_buf(),
                status,
            })?;

        info!("Looking for existing depth generators ...");
        self.backend
            .find_depth_generator()
            .map_err(TrackerError::NoDepthNode)?;

        info!("Looking for existing user generators ...");
        if let Err(status) = self.backend.find_user_generator() {
            debug!(%status, "no existing user generator");
            self.backend
                .create_user_generator()
                .map_err(TrackerError::UserGeneratorUnavailable)?;
            info!("No existing user generators found. Created new one.");
        }

        if !self.backend.is_capability_supported(Capability::Skeleton) {
            return Err(TrackerError::SkeletonUnsupported);
        }

        info!("Checking pose detection capability ...");
        if self.backend.needs_pose_for_calibration() {
            self.needs_pose = true;
            if !self.backend.is_capability_supported(Capability::PoseDetection) {
                return Err(TrackerError::PoseDetectionUnsupported);
            }
            match self.backend.calibration_pose() {
                Ok(pose) => self.pose_name = pose,
                Err(status) => warn!(%status, "could not read the calibration pose"),
            }
            info!(pose = %self.pose_name, "Calibration requires a pose");
        }

        info!("Setting skeleton profile ...");
        if let Err(status) = self.backend.set_skeleton_profile(SkeletonProfile::All) {
            warn!(%status, "SetSkeletonProfile failed");
        }
        Ok(())
    }

    /// Begin generating on every node.
    pub fn start(&mut self) -> Result<(), TrackerError> {
        self.backend
            .start_generating_all()
            .map_err(TrackerError::StartGenerating)?;
        self.generating = true;
        Ok(())
    }

    /// Halt every generator.
    pub fn stop(&mut self) -> Result<(), MiddlewareStatus> {
        let result = self.backend.stop_generating_all();
        self.generating = false;
        result
    }

    /// Start, stop and start again.
    ///
    /// Some driver stacks only deliver stable frames after a restart.  Only
    /// the first start is fatal; the restart is logged and trusted.
    pub fn start_primed(&mut self) -> Result<(), TrackerError> {
        info!("Starting to generate everything ...");
        self.start()?;

        info!("Stopping to generate everything ...");
        if let Err(status) = self.stop() {
            warn!(%status, "StopGeneratingAll failed");
        }

        info!("Starting to generate everything ...");
        match self.backend.start_generating_all() {
            Ok(()) => self.generating = true,
            Err(status) => warn!(%status, "StartGeneratingAll failed on restart"),
        }

        if let Err(status) = self.backend.global_error_state() {
            warn!(%status, "middleware reports a global error");
        }
        Ok(())
    }

    /// Wait for the next frame and dispatch its callbacks to `handler`.
    ///
    /// Returns the number of callbacks dispatched.
    pub fn tick(&mut self, handler: &mut dyn SkeletonEventHandler) -> Result<usize, TrackerError> {
        let events = self
            .backend
            .wait_and_update_all()
            .map_err(TrackerError::FrameWait)?;
        let count = events.len();
        for event in &events {
            handler.on_event(event, self);
        }
        Ok(count)
    }

    pub fn needs_pose(&self) -> bool {
        self.needs_pose
    }

    pub fn calibration_pose_name(&self) -> &str {
        &self.pose_name
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    /// Latest reading of `joint` for `user`.
    pub fn joint(&self, user: UserId, joint: Joint) -> Result<JointSample, MiddlewareStatus> {
        self.backend.joint_sample(user, joint)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Stop generating and release the middleware.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if self.released {
            return;
        }
        if self.generating
            && let Err(status) = self.stop()
        {
            warn!(%status, "StopGeneratingAll failed during shutdown");
        }
        self.backend.release();
        self.released = true;
        info!("middleware session released");
    }
}

impl<B: DepthBackend> SkeletonCommands for SensorSession<B> {
    fn execute(&mut self, command: &SkeletonCommand) -> Result<(), MiddlewareStatus> {
        self.backend.execute(command)
    }

    fn is_tracking(&self, user: UserId) -> bool {
        self.backend.is_tracking(user)
    }

    fn users(&self) -> Vec<UserId> {
        let mut buffer = vec![UserId(0); USER_QUERY_CAPACITY];
        loop {
            let count = self.backend.get_users(&mut buffer);
            if count <= buffer.len() {
                buffer.truncate(count);
                return buffer;
            }
            buffer.resize(count, UserId(0));
        }
    }
}

impl<B: DepthBackend> Drop for SensorSession<B> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimCall, SimDepthBackend};
    use skeltrack_types::SkeletonEvent;

    fn config_file() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().expect("temp config")
    }

    struct Recorder(Vec<SkeletonEvent>);

    impl SkeletonEventHandler for Recorder {
        fn on_event(&mut self, event: &SkeletonEvent, _commands: &mut dyn SkeletonCommands) {
            self.0.push(event.clone());
        }
    }

    #[test]
    fn open_without_pose_requirement() {
        let file = config_file();
        let session = SensorSession::open(SimDepthBackend::new(), file.path()).unwrap();
        assert!(!session.needs_pose());
        assert_eq!(session.calibration_pose_name(), "");
    }

    #[test]
    fn open_records_calibration_pose() {
        let file = config_file();
        let backend = SimDepthBackend::new().requiring_pose("Psi");
        let session = SensorSession::open(backend, file.path()).unwrap();
        assert!(session.needs_pose());
        assert_eq!(session.calibration_pose_name(), "Psi");
    }

    #[test]
    fn missing_config_file_fails_and_releases() {
        let backend = SimDepthBackend::new();
        let calls = backend.call_log();
        let result = SensorSession::open(backend, Path::new("/nonexistent/openni.xml"));
        assert_eq!(calls.borrow().last(), Some(&SimCall::Release));
        match result {
            Err(TrackerError::ConfigLoad { status, .. }) => {
                assert_eq!(status, MiddlewareStatus::FileNotFound)
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("open must fail"),
        }
    }

    #[test]
    fn middleware_init_failure_is_a_config_load_error() {
        let file = config_file();
        let backend = SimDepthBackend::new().failing_init(MiddlewareStatus::Failed(7));
        let calls = backend.call_log();
        let result = SensorSession::open(backend, file.path());
        assert_eq!(calls.borrow().last(), Some(&SimCall::Release));
        let Err(err) = result else {
            panic!("open must fail");
        };
        assert!(matches!(
            err,
            TrackerError::ConfigLoad {
                status: MiddlewareStatus::Failed(7),
                ..
            }
        ));
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn missing_depth_node_is_fatal() {
        let file = config_file();
        let result = SensorSession::open(SimDepthBackend::new().without_depth_node(), file.path());
        assert!(matches!(result, Err(TrackerError::NoDepthNode(MiddlewareStatus::NoNodePresent))));
    }

    #[test]
    fn user_generator_is_created_when_absent() {
        let file = config_file();
        let backend = SimDepthBackend::new().without_existing_user_generator();
        let session = SensorSession::open(backend, file.path()).unwrap();
        assert!(session.backend().calls().contains(&SimCall::CreateUserGenerator));
    }

    #[test]
    fn uncreatable_user_generator_is_fatal() {
        let file = config_file();
        let backend = SimDepthBackend::new().without_user_generator();
        let result = SensorSession::open(backend, file.path());
        assert!(matches!(result, Err(TrackerError::UserGeneratorUnavailable(_))));
    }

    #[test]
    fn skeleton_capability_is_required() {
        let file = config_file();
        let result = SensorSession::open(SimDepthBackend::new().without_skeleton(), file.path());
        let err = result.err().expect("must fail");
        assert!(matches!(err, TrackerError::SkeletonUnsupported));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn pose_detection_required_when_pose_needed() {
        let file = config_file();
        let backend = SimDepthBackend::new()
            .requiring_pose("Psi")
            .without_pose_detection();
        let result = SensorSession::open(backend, file.path());
        assert!(matches!(result, Err(TrackerError::PoseDetectionUnsupported)));
    }

    #[test]
    fn start_primed_runs_start_stop_start() {
        let file = config_file();
        let mut session = SensorSession::open(SimDepthBackend::new(), file.path()).unwrap();
        session.start_primed().unwrap();
        assert!(session.is_generating());

        let generation: Vec<_> = session
            .backend()
            .calls()
            .iter()
            .filter(|c| matches!(c, SimCall::StartGenerating | SimCall::StopGenerating))
            .cloned()
            .collect();
        assert_eq!(
            generation,
            vec![SimCall::StartGenerating, SimCall::StopGenerating, SimCall::StartGenerating]
        );
    }

    #[test]
    fn shutdown_stops_and_releases() {
        let file = config_file();
        let mut session = SensorSession::open(SimDepthBackend::new(), file.path()).unwrap();
        session.start_primed().unwrap();
        let calls = session.backend().call_log();
        session.shutdown();
        let calls = calls.borrow();
        let tail = &calls[calls.len() - 2..];
        assert_eq!(tail, &[SimCall::StopGenerating, SimCall::Release]);
    }

    #[test]
    fn tick_dispatches_callbacks_in_order() {
        let file = config_file();
        let mut session = SensorSession::open(SimDepthBackend::new(), file.path()).unwrap();
        session.start_primed().unwrap();
        session.backend_mut().push_frame(vec![
            SkeletonEvent::NewUser(UserId(3)),
            SkeletonEvent::CalibrationStart(UserId(3)),
        ]);

        let mut recorder = Recorder(Vec::new());
        assert_eq!(session.tick(&mut recorder).unwrap(), 2);
        assert_eq!(
            recorder.0,
            vec![SkeletonEvent::NewUser(UserId(3)), SkeletonEvent::CalibrationStart(UserId(3))]
        );
        // An empty frame dispatches nothing.
        assert_eq!(session.tick(&mut recorder).unwrap(), 0);
    }

    #[test]
    fn frame_wait_failure_surfaces() {
        let file = config_file();
        let mut session = SensorSession::open(SimDepthBackend::new(), file.path()).unwrap();
        session.backend_mut().fail_next_wait(MiddlewareStatus::WaitTimeout);
        let mut recorder = Recorder(Vec::new());
        let err = session.tick(&mut recorder).err().expect("must fail");
        assert!(matches!(err, TrackerError::FrameWait(MiddlewareStatus::WaitTimeout)));
    }

    #[test]
    fn users_query_grows_past_fifteen() {
        let file = config_file();
        let mut session = SensorSession::open(SimDepthBackend::new(), file.path()).unwrap();
        let arrivals = (1..=20).map(|id| SkeletonEvent::NewUser(UserId(id))).collect();
        session.backend_mut().push_frame(arrivals);
        session.tick(&mut Recorder(Vec::new())).unwrap();

        let users = session.users();
        assert_eq!(users.len(), 20);
        assert_eq!(users.first(), Some(&UserId(1)));
        assert_eq!(users.last(), Some(&UserId(20)));
    }

    #[test]
    fn users_query_never_reads_past_count() {
        let file = config_file();
        let mut session = SensorSession::open(SimDepthBackend::new(), file.path()).unwrap();
        session
            .backend_mut()
            .push_frame(vec![SkeletonEvent::NewUser(UserId(4)), SkeletonEvent::NewUser(UserId(9))]);
        session.tick(&mut Recorder(Vec::new())).unwrap();
        assert_eq!(session.users(), vec![UserId(4), UserId(9)]);
    }
}
