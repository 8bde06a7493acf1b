//! `skeltrack-runtime` – the tracker loop
//!
//! Turns middleware callbacks and joint readings into bus traffic, one frame
//! at a time.
//!
//! # Modules
//!
//! - [`node`] – [`TrackerNode`][node::TrackerNode]: the single-threaded tick
//!   driver that owns the sensor session and runs chooser requests, frame
//!   advance, roster publishing and joint emission in that order.
//! - [`roster`] – [`RosterService`][roster::RosterService]: latched
//!   `available_tracked_users` and `default_user` publishers, plus
//!   validation of `user_chooser` requests.
//! - [`emitter`] – [`JointTransformEmitter`][emitter::JointTransformEmitter]:
//!   reads every tracked user's joints and broadcasts them as named frames.
//! - [`rate`] – [`Rate`][rate::Rate]: fixed-frequency pacing.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: initialises
//!   the global `tracing` subscriber with an optional OTLP span exporter.

pub mod emitter;
pub mod node;
pub mod rate;
pub mod roster;
pub mod telemetry;

pub use emitter::JointTransformEmitter;
pub use node::{TickStats, TrackerNode};
pub use rate::Rate;
pub use roster::RosterService;
pub use telemetry::{TracerProviderGuard, init_tracing};
