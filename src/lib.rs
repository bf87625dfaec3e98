pub mod backend_config;
pub mod config_manager;
pub mod engine;
pub mod geometry_utils;
pub mod systems;
pub mod tether_interface;
pub mod tracking;

use nalgebra::{Vector2, Vector3};

/// Screen-space point; pixels or metres depending on context
pub type Point2D = Vector2<f32>;

/// Tracking-space or screen-world point, in metres
pub type Point3D = Vector3<f32>;
