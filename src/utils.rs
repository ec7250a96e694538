//! Utility functions for landmark geometry and coordinate transformations.

pub mod geometry;

pub use geometry::{clamp_to_image, distance, midpoint, BoundingBox};
