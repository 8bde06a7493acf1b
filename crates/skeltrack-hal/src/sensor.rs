//! Traits at the seam between the tracker and the depth middleware.
//!
//! - [`DepthBackend`] – the vendor binding.  One implementation per
//!   middleware; [`SimDepthBackend`][crate::sim::SimDepthBackend] ships for
//!   tests and headless runs.
//! - [`SkeletonCommands`] – the subset of the session a middleware callback
//!   may use.  It cannot advance a frame, so handlers never re-enter the
//!   middleware.
//! - [`SkeletonEventHandler`] – receives middleware callbacks synchronously
//!   while [`SensorSession::tick`][crate::session::SensorSession::tick] runs.

use std::path::Path;

use skeltrack_types::{Joint, JointSample, MiddlewareStatus, SkeletonCommand, SkeletonEvent, UserId};

/// Optional capabilities of a user generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Skeleton,
    PoseDetection,
}

/// Which joints the skeleton tracker fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkeletonProfile {
    All,
    Upper,
    Lower,
    HeadHands,
}

/// A depth middleware binding.
///
/// Every call reports failure through a [`MiddlewareStatus`].  Callbacks
/// raised while a frame is advanced are returned from
/// [`wait_and_update_all`][Self::wait_and_update_all] in the order the
/// middleware raised them.
pub trait DepthBackend {
    /// Load the middleware's XML configuration and build its production graph.
    fn init_from_xml_file(&mut self, path: &Path) -> Result<(), MiddlewareStatus>;

    /// Locate the depth generator declared in the configuration.
    fn find_depth_generator(&mut self) -> Result<(), MiddlewareStatus>;

    /// Locate an existing user generator.
    fn find_user_generator(&mut self) -> Result<(), MiddlewareStatus>;

    /// Create a user generator when none exists.
    fn create_user_generator(&mut self) -> Result<(), MiddlewareStatus>;

    fn is_capability_supported(&self, capability: Capability) -> bool;

    /// `true` when the subject must hold a pose before calibration starts.
    fn needs_pose_for_calibration(&self) -> bool;

    /// Name of the calibration pose, e.g. `"Psi"`.
    fn calibration_pose(&self) -> Result<String, MiddlewareStatus>;

    fn set_skeleton_profile(&mut self, profile: SkeletonProfile) -> Result<(), MiddlewareStatus>;

    fn start_generating_all(&mut self) -> Result<(), MiddlewareStatus>;

    fn stop_generating_all(&mut self) -> Result<(), MiddlewareStatus>;

    fn global_error_state(&self) -> Result<(), MiddlewareStatus>;

    /// Block until the next synchronised frame, update every generator and
    /// return the callbacks raised during the update.
    fn wait_and_update_all(&mut self) -> Result<Vec<SkeletonEvent>, MiddlewareStatus>;

    /// Fill `buffer` with known user ids and return how many users the
    /// middleware knows.  The return value may exceed `buffer.len()`, in which
    /// case only the first `buffer.len()` ids were written.
    fn get_users(&self, buffer: &mut [UserId]) -> usize;

    fn is_tracking(&self, user: UserId) -> bool;

    fn joint_sample(&self, user: UserId, joint: Joint) -> Result<JointSample, MiddlewareStatus>;

    /// Issue a pose-detection, calibration or tracking command.
    fn execute(&mut self, command: &SkeletonCommand) -> Result<(), MiddlewareStatus>;

    /// Release the context and every node it owns.
    fn release(&mut self);
}

/// What a middleware callback may ask of the session.
pub trait SkeletonCommands {
    fn execute(&mut self, command: &SkeletonCommand) -> Result<(), MiddlewareStatus>;

    fn is_tracking(&self, user: UserId) -> bool;

    /// Every user currently known to the middleware, in middleware order.
    fn users(&self) -> Vec<UserId>;
}

/// Receiver of middleware callbacks.
pub trait SkeletonEventHandler {
    fn on_event(&mut self, event: &SkeletonEvent, commands: &mut dyn SkeletonCommands);
}
