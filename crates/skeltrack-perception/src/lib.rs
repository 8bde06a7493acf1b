//! `skeltrack-perception` – joint geometry.
//!
//! Turns raw skeleton readings into the rigid transforms published on the
//! transform stream.
//!
//! # Modules
//!
//! - [`transform`] – [`Transform3D`][transform::Transform3D],
//!   [`Quaternion`][transform::Quaternion] and [`Vec3`][transform::Vec3]:
//!   rigid-body math, rotation-matrix and ZYX Euler constructors.
//! - [`skeleton`] – per-joint axis conversion, the frame-convention change
//!   and the mirrored left/right naming used on output.

pub mod skeleton;
pub mod transform;

pub use skeleton::{joint_transform, published_role, user_frame_id};
pub use transform::{Quaternion, Transform3D, Vec3};
