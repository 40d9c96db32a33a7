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

//! Error types for the voxel lanes.

use super::pipeline::FrameStage;
use std::path::PathBuf;
use thiserror::Error;
use voxa_core::renderer::{BindingError, RenderError, ResourceError, ShaderError};

/// A rejected or unreadable [`VoxelizationConfig`](super::VoxelizationConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("scene_half_extent must be finite and positive, got {0}")]
    HalfExtent(f32),

    #[error("voxel_resolution must lie in [{min}, {max}], got {value}")]
    VoxelResolution { value: u32, min: u32, max: u32 },

    #[error("axis_viewport_resolution must be at least 1")]
    ViewportResolution,

    #[error("camera_move_speed must be finite and non-negative, got {0}")]
    MoveSpeed(f32),

    #[error("node_pool_multiplier must be at least 1")]
    NodePoolMultiplier,

    #[error("cone_aperture must lie in (0, pi), got {0}")]
    ConeAperture(f32),

    #[error("failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),

    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while building or running the voxelization pipeline.
#[derive(Error, Debug)]
pub enum VoxelError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("technique setup failed: {0}")]
    Shader(#[from] ShaderError),

    #[error("channel assignment failed: {0}")]
    Binding(#[from] BindingError),

    #[error("resource operation failed: {0}")]
    Resource(#[from] ResourceError),

    #[error("frame submission failed: {0}")]
    Render(#[from] RenderError),

    #[error("frame stage {to:?} cannot follow {from:?}")]
    StageOrder { from: FrameStage, to: FrameStage },

    #[error("framebuffer is {found:?} but the cone tracer was built for {expected:?}")]
    TargetFormat {
        expected: voxa_core::renderer::api::TextureFormat,
        found: voxa_core::renderer::api::TextureFormat,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_read_well() {
        let err = ConfigError::VoxelResolution {
            value: 2048,
            min: 4,
            max: 1024,
        };
        assert_eq!(
            err.to_string(),
            "voxel_resolution must lie in [4, 1024], got 2048"
        );
        let wrapped: VoxelError = err.into();
        assert!(wrapped.to_string().starts_with("invalid configuration"));
    }

    #[test]
    fn test_stage_order_names_both_stages() {
        let err = VoxelError::StageOrder {
            from: FrameStage::Idle,
            to: FrameStage::ConeTrace,
        };
        assert_eq!(err.to_string(), "frame stage ConeTrace cannot follow Idle");
    }
}
