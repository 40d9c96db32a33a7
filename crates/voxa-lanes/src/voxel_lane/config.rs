// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-session voxelization parameters.

use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use voxa_core::math::{LinearRgba, Vec3};

/// Smallest accepted voxel resolution.
pub const MIN_VOXEL_RESOLUTION: u32 = 4;
/// Largest accepted voxel resolution. Fragment records pack voxel
/// coordinates into 16-bit fields.
pub const MAX_VOXEL_RESOLUTION: u32 = 1024;

/// Bytes of one fragment record in the node pool.
pub const FRAGMENT_RECORD_BYTES: u64 = 16;

fn default_node_pool_multiplier() -> u32 {
    8
}

fn default_cone_aperture() -> f32 {
    0.2
}

/// Immutable parameters of one voxelization session.
///
/// Loaded from RON and validated once when the pipeline is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoxelizationConfig {
    /// Centre of the voxelized cube.
    pub scene_center: Vec3,
    /// Half the edge length of the voxelized cube.
    pub scene_half_extent: f32,
    /// Voxels along each edge of the volume.
    pub voxel_resolution: u32,
    /// Pixels along each edge of the per-axis list grid. Defaults to
    /// `voxel_resolution`.
    #[serde(default)]
    pub axis_viewport_resolution: Option<u32>,
    /// World units per second of the sandbox fly-through.
    pub camera_move_speed: f32,
    /// Scales the node pool beyond one record per grid pixel.
    #[serde(default = "default_node_pool_multiplier")]
    pub node_pool_multiplier: u32,
    /// Full cone angle in radians.
    #[serde(default = "default_cone_aperture")]
    pub cone_aperture: f32,
    /// Colour behind the traced volume. Falls back to the framebuffer's clear colour.
    #[serde(default)]
    pub background: Option<LinearRgba>,
}

impl Default for VoxelizationConfig {
    fn default() -> Self {
        Self {
            scene_center: Vec3::ZERO,
            scene_half_extent: 1.0,
            voxel_resolution: 256,
            axis_viewport_resolution: None,
            camera_move_speed: 1.0,
            node_pool_multiplier: default_node_pool_multiplier(),
            cone_aperture: default_cone_aperture(),
            background: None,
        }
    }
}

impl VoxelizationConfig {
    /// Parses and validates a RON document.
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_ron_str(&source)?;
        log::info!(
            "VoxelizationConfig: Loaded {:?} ({}³ voxels)",
            path,
            config.voxel_resolution
        );
        Ok(config)
    }

    /// Serializes the config as pretty RON.
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Checks every field against its accepted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.scene_half_extent.is_finite() || self.scene_half_extent <= 0.0 {
            return Err(ConfigError::HalfExtent(self.scene_half_extent));
        }
        if !(MIN_VOXEL_RESOLUTION..=MAX_VOXEL_RESOLUTION).contains(&self.voxel_resolution) {
            return Err(ConfigError::VoxelResolution {
                value: self.voxel_resolution,
                min: MIN_VOXEL_RESOLUTION,
                max: MAX_VOXEL_RESOLUTION,
            });
        }
        if self.axis_viewport_resolution == Some(0) {
            return Err(ConfigError::ViewportResolution);
        }
        if !self.camera_move_speed.is_finite() || self.camera_move_speed < 0.0 {
            return Err(ConfigError::MoveSpeed(self.camera_move_speed));
        }
        if self.node_pool_multiplier == 0 {
            return Err(ConfigError::NodePoolMultiplier);
        }
        if !(self.cone_aperture > 0.0 && self.cone_aperture < std::f32::consts::PI) {
            return Err(ConfigError::ConeAperture(self.cone_aperture));
        }
        Ok(())
    }

    /// Pixels along each edge of the per-axis list grid.
    pub fn viewport_resolution(&self) -> u32 {
        self.axis_viewport_resolution
            .unwrap_or(self.voxel_resolution)
    }

    /// Edge length of one voxel in world units.
    pub fn voxel_size(&self) -> f32 {
        2.0 * self.scene_half_extent / self.voxel_resolution as f32
    }

    /// Records in each axis's node pool, including the reserved sentinel slot.
    pub fn node_capacity(&self) -> u32 {
        let pixels = u64::from(self.viewport_resolution()).pow(2);
        let bytes = pixels * FRAGMENT_RECORD_BYTES * u64::from(self.node_pool_multiplier);
        (bytes / FRAGMENT_RECORD_BYTES).min(u64::from(u32::MAX)) as u32
    }

    /// Number of mip levels of the voxel volume.
    pub fn volume_mip_levels(&self) -> u32 {
        u32::BITS - self.voxel_resolution.leading_zeros()
    }
}
