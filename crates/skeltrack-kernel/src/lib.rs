//! `skeltrack-kernel` – user lifecycle
//!
//! Decides, per detected body, when to wait for a pose, when to calibrate and
//! when to start tracking.  It does not read joints; it only regulates.
//!
//! # Modules
//!
//! - [`lifecycle`] – [`transition`][lifecycle::transition]: the per-user state
//!   machine as a pure `(state, event) → (state, commands)` function, together
//!   with the session's [`CalibrationPolicy`][lifecycle::CalibrationPolicy].
//! - [`controller`] – [`UserLifecycle`][controller::UserLifecycle]: the
//!   middleware callback handler that owns every user's state and the default
//!   user, and queues roster snapshots for the tick driver.

pub mod controller;
pub mod lifecycle;

pub use controller::UserLifecycle;
pub use lifecycle::{CalibrationPolicy, Transition, transition};
