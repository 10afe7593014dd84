//! Tunable constants for the visualization core.
//!
//! Every field has a default, so a config file only needs the values it wants
//! to override.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisConfig {
    pub camera: CameraConfig,
    pub interaction: InteractionConfig,
    pub overlay: OverlayConfig,
    pub hull: HullConfig,
    pub matrix: MatrixConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Screen pixels kept free around the content by `center_on`.
    pub padding: f32,
    pub min_scale: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            padding: 40.0,
            min_scale: 0.02,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Total pointer travel (screen pixels) under which a lasso is a click.
    pub click_radius: f32,
    pub wheel_sensitivity: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            click_radius: 4.0,
            wheel_sensitivity: 0.0018,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// World-space radius of a host disc; also the hit-test radius.
    pub host_radius: f32,
    pub max_link_thickness: f32,
    /// Halo opacity damping `D`.
    pub halo_damping: f32,
    /// Halo opacity floor `H` for ratios at or above 1.
    pub halo_floor: f32,
    pub halo_radius: f32,
    pub low_color: [u8; 3],
    pub high_color: [u8; 3],
    pub baseline_band_color: [u8; 3],
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            host_radius: 10.0,
            max_link_thickness: 12.0,
            halo_damping: 0.85,
            halo_floor: 0.25,
            halo_radius: 22.0,
            low_color: [236, 240, 241],
            high_color: [44, 62, 80],
            baseline_band_color: [127, 140, 141],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HullConfig {
    /// Two over-represented hosts closer than this share a hull.
    pub cluster_threshold: f32,
    pub thickness: f32,
    pub ring_points: usize,
}

impl Default for HullConfig {
    fn default() -> Self {
        Self {
            cluster_threshold: 120.0,
            thickness: 8.0,
            ring_points: 12,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    pub diagonal_color: [u8; 3],
    pub power_iterations: usize,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            diagonal_color: [128, 128, 128],
            power_iterations: 64,
        }
    }
}

impl VisConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
