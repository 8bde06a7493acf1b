//! [`TrackerNode`] – the fixed-rate tick driver.
//!
//! One thread owns everything: the sensor session, the lifecycle controller,
//! the publishers and the `user_chooser` receiver.  Each cycle:
//!
//! 1. drain pending `user_chooser` requests;
//! 2. advance the sensor one frame, dispatching its callbacks to the
//!    lifecycle controller;
//! 3. publish any roster snapshots queued during those callbacks;
//! 4. broadcast joint transforms for every tracked user;
//! 5. sleep the remainder of the period.
//!
//! Shutdown is a cooperative flag checked between cycles.  However the loop
//! ends, the session is stopped and released.

use std::sync::atomic::{AtomicBool, Ordering};

use skeltrack_hal::{DepthBackend, SensorSession};
use skeltrack_kernel::{CalibrationPolicy, UserLifecycle};
use skeltrack_middleware::{EventBus, Topic, TopicReceiver};
use skeltrack_types::{EventPayload, TrackerConfig, TrackerError};
use tracing::{debug, error, info};

use crate::emitter::JointTransformEmitter;
use crate::rate::Rate;
use crate::roster::RosterService;

/// What one cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    /// `user_chooser` requests handled.
    pub requests: usize,
    /// Middleware callbacks dispatched.
    pub events: usize,
    /// Roster snapshots published.
    pub rosters: usize,
    /// Transforms broadcast.
    pub transforms: usize,
}

/// Owns the tracker's state and drives it at a fixed rate.
pub struct TrackerNode<B: DepthBackend> {
    session: SensorSession<B>,
    lifecycle: UserLifecycle,
    roster: RosterService,
    emitter: JointTransformEmitter,
    bus: EventBus,
    user_chooser: TopicReceiver,
    rate: Rate,
}

impl<B: DepthBackend> TrackerNode<B> {
    /// Wire a started session to `bus`.
    ///
    /// The calibration policy is taken from what the session discovered at
    /// bring-up.
    pub fn new(session: SensorSession<B>, bus: EventBus, config: &TrackerConfig) -> Self {
        let policy = if session.needs_pose() {
            CalibrationPolicy::with_pose(session.calibration_pose_name())
        } else {
            CalibrationPolicy::immediate()
        };
        info!(
            frame = %config.camera_frame_id,
            rate_hz = config.tick_rate_hz,
            needs_pose = policy.needs_pose,
            "Setting up tracker node ..."
        );
        Self {
            session,
            lifecycle: UserLifecycle::new(policy),
            roster: RosterService::new(bus.clone()),
            emitter: JointTransformEmitter::new(config.camera_frame_id.clone()),
            user_chooser: bus.subscribe_to(Topic::UserChooser),
            bus,
            rate: Rate::new(config.tick_rate_hz),
        }
    }

    pub fn session(&self) -> &SensorSession<B> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SensorSession<B> {
        &mut self.session
    }

    pub fn lifecycle(&self) -> &UserLifecycle {
        &self.lifecycle
    }

    pub fn roster(&self) -> &RosterService {
        &self.roster
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Run one cycle without sleeping.
    ///
    /// # Errors
    ///
    /// [`TrackerError::FrameWait`] when the middleware fails to deliver a
    /// frame.  Nothing is emitted for that cycle.
    pub fn spin_once(&mut self) -> Result<TickStats, TrackerError> {
        let mut stats = TickStats::default();

        while let Some(event) = self.user_chooser.try_recv() {
            match event.payload {
                EventPayload::UserChooser(user) => {
                    self.roster.set_default_user(user, &mut self.lifecycle);
                    stats.requests += 1;
                }
                other => debug!(payload = ?other, "ignoring non-user_chooser payload"),
            }
        }

        stats.events = self.session.tick(&mut self.lifecycle)?;

        for users in self.lifecycle.take_roster_updates() {
            self.roster.publish_roster(users);
            stats.rosters += 1;
        }

        stats.transforms = self.emitter.emit(&self.session, &self.lifecycle, &self.bus);
        Ok(stats)
    }

    /// Cycle at the configured rate until `shutdown` is set or a frame wait
    /// fails, then shut the session down.
    pub fn run(mut self, shutdown: &AtomicBool) -> Result<(), TrackerError> {
        info!("And go!");
        self.rate.reset();
        let result = loop {
            if shutdown.load(Ordering::SeqCst) {
                info!("shutdown requested");
                break Ok(());
            }
            if let Err(e) = self.spin_once() {
                error!(error = %e, "tick failed");
                break Err(e);
            }
            self.rate.sleep();
        };
        self.shutdown();
        result
    }

    /// Stop generating and release the middleware.
    pub fn shutdown(self) {
        self.session.shutdown();
    }
}
