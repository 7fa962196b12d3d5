//! # Nightshade Common
//!
//! Common types, utilities, and shared abstractions for Project Nightshade.
//!
//! This crate provides foundational types used across all Nightshade crates:
//! - ID types (EntityId, WaypointId)
//! - Geometry (planes, frustums, bounding boxes, rays, layer masks)
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod geometry;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::geometry::*;
    pub use crate::ids::*;
    pub use glam::Vec3;
}

pub use prelude::*;
