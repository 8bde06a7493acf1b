//! `skeltrack-hal` – depth sensor abstraction.
//!
//! The tracker never speaks to a vendor SDK directly.  It talks to the
//! [`DepthBackend`][sensor::DepthBackend] trait through a
//! [`SensorSession`][session::SensorSession], the single owning handle on the
//! middleware.
//!
//! # Modules
//!
//! - [`sensor`] – the backend seam plus the callback traits
//!   ([`SkeletonEventHandler`][sensor::SkeletonEventHandler],
//!   [`SkeletonCommands`][sensor::SkeletonCommands]).
//! - [`session`] – bring-up, the start/stop/start prime, per-frame tick and
//!   teardown.
//! - [`sim`] – [`SimDepthBackend`][sim::SimDepthBackend], a scripted
//!   in-process middleware for tests and headless runs.

pub mod sensor;
pub mod session;
pub mod sim;

pub use sensor::{Capability, DepthBackend, SkeletonCommands, SkeletonEventHandler, SkeletonProfile};
pub use session::SensorSession;
pub use sim::SimDepthBackend;
