//! In-process depth middleware for tests and headless runs.
//!
//! [`SimDepthBackend`] implements [`DepthBackend`] without any hardware.  It
//! keeps the middleware's own bookkeeping (known users, tracking set,
//! generating flag), records every call and command it receives, and plays
//! back scripted frames of callbacks.  Bring-up failures are configured with
//! the builder methods.
//!
//! # Example
//!
//! ```rust
//! use skeltrack_hal::sim::SimDepthBackend;
//! use skeltrack_types::{SkeletonEvent, UserId};
//!
//! let mut backend = SimDepthBackend::new().requiring_pose("Psi");
//! backend.push_frame(vec![SkeletonEvent::NewUser(UserId(7))]);
//! ```
//!
//! In demo mode ([`with_auto_calibration`][SimDepthBackend::with_auto_calibration])
//! the simulator answers pose-detection and calibration requests by itself
//! after a fixed number of frames, so a scripted arrival walks through the
//! whole lifecycle without further input.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::rc::Rc;

use skeltrack_types::{Joint, JointSample, MiddlewareStatus, SkeletonCommand, SkeletonEvent, UserId};

use crate::sensor::{Capability, DepthBackend, SkeletonProfile};

/// A call the simulator received, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCall {
    InitFromXml,
    FindDepthGenerator,
    FindUserGenerator,
    CreateUserGenerator,
    SetSkeletonProfile,
    StartGenerating,
    StopGenerating,
    WaitAndUpdate,
    Release,
}

/// Scripted, hardware-free depth middleware.
pub struct SimDepthBackend {
    // ── Bring-up behaviour ────────────────────────────────────────────────
    init_failure: Option<MiddlewareStatus>,
    has_depth_node: bool,
    has_user_generator: bool,
    can_create_user_generator: bool,
    skeleton_supported: bool,
    pose_detection_supported: bool,
    calibration_pose: Option<String>,
    auto_respond_after: Option<u64>,
    // ── Middleware state ──────────────────────────────────────────────────
    frame: u64,
    generating: bool,
    users: Vec<UserId>,
    tracking: HashSet<UserId>,
    joints: HashMap<(UserId, Joint), JointSample>,
    script: VecDeque<Vec<SkeletonEvent>>,
    scheduled: Vec<(u64, SkeletonEvent)>,
    wait_failure: Option<MiddlewareStatus>,
    command_failure: Option<MiddlewareStatus>,
    // ── Recorders ─────────────────────────────────────────────────────────
    calls: Rc<RefCell<Vec<SimCall>>>,
    commands: Vec<SkeletonCommand>,
}

impl Default for SimDepthBackend {
    fn default() -> Self {
        Self {
            init_failure: None,
            has_depth_node: true,
            has_user_generator: true,
            can_create_user_generator: true,
            skeleton_supported: true,
            pose_detection_supported: true,
            calibration_pose: None,
            auto_respond_after: None,
            frame: 0,
            generating: false,
            users: Vec::new(),
            tracking: HashSet::new(),
            joints: HashMap::new(),
            script: VecDeque::new(),
            scheduled: Vec::new(),
            wait_failure: None,
            command_failure: None,
            calls: Rc::new(RefCell::new(Vec::new())),
            commands: Vec::new(),
        }
    }
}

impl SimDepthBackend {
    /// A healthy middleware: depth node and user generator present, skeleton
    /// capability, no calibration pose.
    pub fn new() -> Self {
        Self::default()
    }

    /// Demo preset: a single user walks in after a second of frames and is
    /// calibrated automatically.
    pub fn demo() -> Self {
        let mut backend = Self::new().with_auto_calibration(15);
        for _ in 0..30 {
            backend.push_frame(Vec::new());
        }
        backend.push_frame(vec![SkeletonEvent::NewUser(UserId(1))]);
        backend
    }

    // ── Builder ───────────────────────────────────────────────────────────

    /// Calibration needs the subject to hold `pose` first.
    pub fn requiring_pose(mut self, pose: impl Into<String>) -> Self {
        self.calibration_pose = Some(pose.into());
        self
    }

    pub fn without_pose_detection(mut self) -> Self {
        self.pose_detection_supported = false;
        self
    }

    pub fn without_skeleton(mut self) -> Self {
        self.skeleton_supported = false;
        self
    }

    pub fn without_depth_node(mut self) -> Self {
        self.has_depth_node = false;
        self
    }

    /// No user generator in the configuration, but one can be created.
    pub fn without_existing_user_generator(mut self) -> Self {
        self.has_user_generator = false;
        self
    }

    /// No user generator and creating one fails.
    pub fn without_user_generator(mut self) -> Self {
        self.has_user_generator = false;
        self.can_create_user_generator = false;
        self
    }

    pub fn failing_init(mut self, status: MiddlewareStatus) -> Self {
        self.init_failure = Some(status);
        self
    }

    /// Answer pose-detection and calibration requests after `frames` frames.
    pub fn with_auto_calibration(mut self, frames: u64) -> Self {
        self.auto_respond_after = Some(frames.max(1));
        self
    }

    // ── Scripting ─────────────────────────────────────────────────────────

    /// Queue the callbacks raised by one future frame.
    pub fn push_frame(&mut self, events: Vec<SkeletonEvent>) {
        self.script.push_back(events);
    }

    /// Make the next frame wait fail with `status`.
    pub fn fail_next_wait(&mut self, status: MiddlewareStatus) {
        self.wait_failure = Some(status);
    }

    /// Make the next command fail with `status`.  The command is still recorded.
    pub fn fail_next_command(&mut self, status: MiddlewareStatus) {
        self.command_failure = Some(status);
    }

    /// Override the reading returned for `joint` of `user`.
    pub fn set_joint(&mut self, user: UserId, joint: Joint, sample: JointSample) {
        self.joints.insert((user, joint), sample);
    }

    // ── Inspection ────────────────────────────────────────────────────────

    pub fn calls(&self) -> Vec<SimCall> {
        self.calls.borrow().clone()
    }

    /// Shared call log; stays readable after the backend is dropped.
    pub fn call_log(&self) -> Rc<RefCell<Vec<SimCall>>> {
        Rc::clone(&self.calls)
    }

    pub fn commands(&self) -> Vec<SkeletonCommand> {
        self.commands.clone()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn record(&self, call: SimCall) {
        self.calls.borrow_mut().push(call);
    }

    fn schedule(&mut self, delay: u64, event: SkeletonEvent) {
        self.scheduled.push((self.frame + delay, event));
    }

    fn apply(&mut self, event: &SkeletonEvent) {
        match event {
            SkeletonEvent::NewUser(user) => {
                if !self.users.contains(user) {
                    self.users.push(*user);
                }
            }
            SkeletonEvent::LostUser(user) => {
                self.users.retain(|u| u != user);
                self.tracking.remove(user);
                self.scheduled.retain(|(_, e)| e.user() != *user);
            }
            _ => {}
        }
    }

    /// Neutral standing pose, users side by side two metres from the sensor.
    fn default_sample(&self, user: UserId, joint: Joint) -> JointSample {
        let (x, y) = match joint {
            Joint::Head => (0.0, 700.0),
            Joint::Neck => (0.0, 500.0),
            Joint::Torso => (0.0, 250.0),
            Joint::LeftShoulder => (-180.0, 480.0),
            Joint::LeftElbow => (-220.0, 200.0),
            Joint::LeftHand => (-240.0, -50.0),
            Joint::RightShoulder => (180.0, 480.0),
            Joint::RightElbow => (220.0, 200.0),
            Joint::RightHand => (240.0, -50.0),
            Joint::LeftHip => (-100.0, 0.0),
            Joint::LeftKnee => (-110.0, -420.0),
            Joint::LeftFoot => (-120.0, -850.0),
            Joint::RightHip => (100.0, 0.0),
            Joint::RightKnee => (110.0, -420.0),
            Joint::RightFoot => (120.0, -850.0),
        };
        let sway = 40.0 * (self.frame as f32 * 0.05).sin();
        let lane = f32::from(user.0) * 700.0 - 700.0;
        JointSample::at([x + lane + sway, y, 2000.0])
    }
}

impl DepthBackend for SimDepthBackend {
    fn init_from_xml_file(&mut self, path: &Path) -> Result<(), MiddlewareStatus> {
        self.record(SimCall::InitFromXml);
        if let Some(status) = self.init_failure {
            return Err(status);
        }
        if !path.is_file() {
            return Err(MiddlewareStatus::FileNotFound);
        }
        Ok(())
    }

    fn find_depth_generator(&mut self) -> Result<(), MiddlewareStatus> {
        self.record(SimCall::FindDepthGenerator);
        if self.has_depth_node {
            Ok(())
        } else {
            Err(MiddlewareStatus::NoNodePresent)
        }
    }

    fn find_user_generator(&mut self) -> Result<(), MiddlewareStatus> {
        self.record(SimCall::FindUserGenerator);
        if self.has_user_generator {
            Ok(())
        } else {
            Err(MiddlewareStatus::NoNodePresent)
        }
    }

    fn create_user_generator(&mut self) -> Result<(), MiddlewareStatus> {
        self.record(SimCall::CreateUserGenerator);
        if self.can_create_user_generator {
            self.has_user_generator = true;
            Ok(())
        } else {
            Err(MiddlewareStatus::NoNodePresent)
        }
    }

    fn is_capability_supported(&self, capability: Capability) -> bool {
        match capability {
            Capability::Skeleton => self.skeleton_supported,
            Capability::PoseDetection => self.pose_detection_supported,
        }
    }

    fn needs_pose_for_calibration(&self) -> bool {
        self.calibration_pose.is_some()
    }

    fn calibration_pose(&self) -> Result<String, MiddlewareStatus> {
        self.calibration_pose.clone().ok_or(MiddlewareStatus::NotSupported)
    }

    fn set_skeleton_profile(&mut self, _profile: SkeletonProfile) -> Result<(), MiddlewareStatus> {
        self.record(SimCall::SetSkeletonProfile);
        Ok(())
    }

    fn start_generating_all(&mut self) -> Result<(), MiddlewareStatus> {
        self.record(SimCall::StartGenerating);
        self.generating = true;
        Ok(())
    }

    fn stop_generating_all(&mut self) -> Result<(), MiddlewareStatus> {
        self.record(SimCall::StopGenerating);
        self.generating = false;
        Ok(())
    }

    fn global_error_state(&self) -> Result<(), MiddlewareStatus> {
        Ok(())
    }

    fn wait_and_update_all(&mut self) -> Result<Vec<SkeletonEvent>, MiddlewareStatus> {
        self.record(SimCall::WaitAndUpdate);
        if let Some(status) = self.wait_failure.take() {
            return Err(status);
        }
        self.frame += 1;

        // Scripted callbacks first; a scripted loss cancels that user's
        // pending automatic responses before they can fire.
        let mut events = self.script.pop_front().unwrap_or_default();
        for event in &events {
            self.apply(event);
        }

        let frame = self.frame;
        let (due, pending): (Vec<_>, Vec<_>) =
            self.scheduled.drain(..).partition(|(at, _)| *at <= frame);
        self.scheduled = pending;
        events.extend(due.into_iter().map(|(_, event)| event));
        Ok(events)
    }

    fn get_users(&self, buffer: &mut [UserId]) -> usize {
        for (slot, user) in buffer.iter_mut().zip(&self.users) {
            *slot = *user;
        }
        self.users.len()
    }

    fn is_tracking(&self, user: UserId) -> bool {
        self.tracking.contains(&user)
    }

    fn joint_sample(&self, user: UserId, joint: Joint) -> Result<JointSample, MiddlewareStatus> {
        if !self.users.contains(&user) {
            return Err(MiddlewareStatus::BadUserId);
        }
        Ok(self
            .joints
            .get(&(user, joint))
            .copied()
            .unwrap_or_else(|| self.default_sample(user, joint)))
    }

    fn execute(&mut self, command: &SkeletonCommand) -> Result<(), MiddlewareStatus> {
        self.commands.push(command.clone());
        if let Some(status) = self.command_failure.take() {
            return Err(status);
        }

        let user = match command {
            SkeletonCommand::StartPoseDetection { user, .. }
            | SkeletonCommand::StopPoseDetection(user)
            | SkeletonCommand::RequestCalibration { user, .. }
            | SkeletonCommand::StartTracking(user) => *user,
        };
        if !self.users.contains(&user) {
            return Err(MiddlewareStatus::BadUserId);
        }

        match command {
            SkeletonCommand::StartTracking(user) => {
                self.tracking.insert(*user);
            }
            SkeletonCommand::StartPoseDetection { pose, user } => {
                if let Some(delay) = self.auto_respond_after {
                    self.schedule(
                        delay,
                        SkeletonEvent::PoseDetected { pose: pose.clone(), user: *user },
                    );
                }
            }
            SkeletonCommand::RequestCalibration { user, .. } => {
                self.tracking.remove(user);
                if let Some(delay) = self.auto_respond_after {
                    self.schedule(1, SkeletonEvent::CalibrationStart(*user));
                    self.schedule(
                        delay.max(2),
                        SkeletonEvent::CalibrationEnd { user: *user, success: true },
                    );
                }
            }
            SkeletonCommand::StopPoseDetection(_) => {}
        }
        Ok(())
    }

    fn release(&mut self) {
        self.record(SimCall::Release);
        self.generating = false;
        self.users.clear();
        self.tracking.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_frames_play_back_in_order() {
        let mut sim = SimDepthBackend::new();
        sim.push_frame(vec![SkeletonEvent::NewUser(UserId(1))]);
        sim.push_frame(vec![SkeletonEvent::LostUser(UserId(1))]);

        assert_eq!(sim.wait_and_update_all().unwrap(), vec![SkeletonEvent::NewUser(UserId(1))]);
        let mut buffer = [UserId(0); 4];
        assert_eq!(sim.get_users(&mut buffer), 1);
        assert_eq!(buffer[0], UserId(1));

        assert_eq!(sim.wait_and_update_all().unwrap(), vec![SkeletonEvent::LostUser(UserId(1))]);
        assert_eq!(sim.get_users(&mut buffer), 0);
        assert!(sim.wait_and_update_all().unwrap().is_empty());
        assert_eq!(sim.frame(), 3);
    }

    #[test]
    fn get_users_reports_full_count_with_small_buffer() {
        let mut sim = SimDepthBackend::new();
        sim.push_frame((1..=3).map(|id| SkeletonEvent::NewUser(UserId(id))).collect());
        sim.wait_and_update_all().unwrap();

        let mut buffer = [UserId(0); 2];
        assert_eq!(sim.get_users(&mut buffer), 3);
        assert_eq!(buffer, [UserId(1), UserId(2)]);
    }

    #[test]
    fn start_tracking_marks_user_tracked() {
        let mut sim = SimDepthBackend::new();
        sim.push_frame(vec![SkeletonEvent::NewUser(UserId(5))]);
        sim.wait_and_update_all().unwrap();

        sim.execute(&SkeletonCommand::StartTracking(UserId(5))).unwrap();
        assert!(sim.is_tracking(UserId(5)));
        assert_eq!(sim.commands(), vec![SkeletonCommand::StartTracking(UserId(5))]);
    }

    #[test]
    fn commands_for_unknown_users_fail() {
        let mut sim = SimDepthBackend::new();
        let result = sim.execute(&SkeletonCommand::StartTracking(UserId(9)));
        assert_eq!(result, Err(MiddlewareStatus::BadUserId));
        assert_eq!(sim.commands().len(), 1);
    }

    #[test]
    fn injected_command_failure_is_one_shot() {
        let mut sim = SimDepthBackend::new();
        sim.push_frame(vec![SkeletonEvent::NewUser(UserId(2))]);
        sim.wait_and_update_all().unwrap();
        sim.fail_next_command(MiddlewareStatus::Failed(7));

        let request = SkeletonCommand::RequestCalibration { user: UserId(2), force: true };
        assert_eq!(sim.execute(&request), Err(MiddlewareStatus::Failed(7)));
        assert_eq!(sim.execute(&request), Ok(()));
    }

    #[test]
    fn auto_calibration_answers_requests() {
        let mut sim = SimDepthBackend::new().with_auto_calibration(3);
        sim.push_frame(vec![SkeletonEvent::NewUser(UserId(1))]);
        sim.wait_and_update_all().unwrap();
        sim.execute(&SkeletonCommand::RequestCalibration { user: UserId(1), force: true })
            .unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.extend(sim.wait_and_update_all().unwrap());
        }
        assert_eq!(
            seen,
            vec![
                SkeletonEvent::CalibrationStart(UserId(1)),
                SkeletonEvent::CalibrationEnd { user: UserId(1), success: true },
            ]
        );
    }

    #[test]
    fn auto_pose_detection_echoes_the_pose() {
        let mut sim = SimDepthBackend::new().requiring_pose("Psi").with_auto_calibration(2);
        sim.push_frame(vec![SkeletonEvent::NewUser(UserId(7))]);
        sim.wait_and_update_all().unwrap();
        sim.execute(&SkeletonCommand::StartPoseDetection { pose: "Psi".into(), user: UserId(7) })
            .unwrap();

        sim.wait_and_update_all().unwrap();
        let events = sim.wait_and_update_all().unwrap();
        assert_eq!(
            events,
            vec![SkeletonEvent::PoseDetected { pose: "Psi".into(), user: UserId(7) }]
        );
    }

    #[test]
    fn lost_user_cancels_pending_responses() {
        let mut sim = SimDepthBackend::new().with_auto_calibration(2);
        sim.push_frame(vec![SkeletonEvent::NewUser(UserId(1))]);
        sim.wait_and_update_all().unwrap();
        sim.execute(&SkeletonCommand::RequestCalibration { user: UserId(1), force: true })
            .unwrap();
        sim.push_frame(vec![SkeletonEvent::LostUser(UserId(1))]);

        assert_eq!(
            sim.wait_and_update_all().unwrap(),
            vec![SkeletonEvent::LostUser(UserId(1))]
        );
        assert!(sim.wait_and_update_all().unwrap().is_empty());
    }

    #[test]
    fn joint_override_wins_over_default_pose() {
        let mut sim = SimDepthBackend::new();
        sim.push_frame(vec![SkeletonEvent::NewUser(UserId(2))]);
        sim.wait_and_update_all().unwrap();

        let sample = JointSample::at([1000.0, 0.0, 0.0]);
        sim.set_joint(UserId(2), Joint::LeftHand, sample);
        assert_eq!(sim.joint_sample(UserId(2), Joint::LeftHand).unwrap(), sample);
        assert!(sim.joint_sample(UserId(2), Joint::Head).is_ok());
        assert_eq!(
            sim.joint_sample(UserId(8), Joint::Head),
            Err(MiddlewareStatus::BadUserId)
        );
    }

    #[test]
    fn missing_file_fails_init() {
        let mut sim = SimDepthBackend::new();
        assert_eq!(
            sim.init_from_xml_file(Path::new("/nonexistent/openni_tracker.xml")),
            Err(MiddlewareStatus::FileNotFound)
        );
    }
}
