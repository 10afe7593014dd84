//! Live visualization core for attack-path statistics over a network topology.
//!
//! Everything here is independent of the windowing shell: the binary feeds
//! pointer input and backend events in, and paints what the overview exposes.

pub mod backend;
pub mod camera;
pub mod config;
pub mod error;
mod geometry;
pub mod hull;
pub mod interaction;
pub mod matrix;
pub mod model;
pub mod observe;
pub mod overlay;
pub mod overview;
pub mod selection;

pub use overview::Overview;
