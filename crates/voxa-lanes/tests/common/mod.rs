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

//! Shared fixtures for the lane integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use voxa_core::math::{Extent2D, LinearRgba, Mat4, Vec3};
use voxa_core::renderer::api::TextureFormat;
use voxa_core::renderer::GraphicsDevice;
use voxa_core::scene::{MeshData, SceneObject, StaticScene};
use voxa_lanes::{PipelineOptions, VoxelizationConfig, VoxelizationPipeline};
use voxa_infra::{OffscreenTarget, ReferenceDevice};

/// Frame size of every test target.
pub const FRAME: u32 = 16;

/// A unit cube around the origin at `resolution` voxels.
pub fn config(resolution: u32) -> VoxelizationConfig {
    VoxelizationConfig {
        voxel_resolution: resolution,
        ..VoxelizationConfig::default()
    }
}

/// World `z` of the centre of voxel slice `slice` in a unit cube.
pub fn slice_center(resolution: u32, slice: u32) -> f32 {
    -1.0 + (slice as f32 + 0.5) * 2.0 / resolution as f32
}

pub struct Harness {
    pub device: Arc<ReferenceDevice>,
    pub target: Arc<OffscreenTarget>,
    pub pipeline: VoxelizationPipeline,
}

impl Harness {
    pub fn new(config: VoxelizationConfig) -> anyhow::Result<Self> {
        Self::with_options(config, PipelineOptions::default())
    }

    pub fn with_options(
        config: VoxelizationConfig,
        options: PipelineOptions,
    ) -> anyhow::Result<Self> {
        let device = Arc::new(ReferenceDevice::new());
        let target = Arc::new(OffscreenTarget::new(
            device.as_ref(),
            Extent2D::new(FRAME, FRAME),
            TextureFormat::Rgba8Unorm,
        )?);
        let pipeline = VoxelizationPipeline::with_options(
            device.clone(),
            device.as_ref(),
            target.clone(),
            config,
            options,
        )?;
        Ok(Self {
            device,
            target,
            pipeline,
        })
    }

    /// Row-major pixels of the framebuffer.
    pub fn pixels(&self) -> anyhow::Result<Vec<LinearRgba>> {
        Ok(self.target.read_pixels(self.device.as_ref())?)
    }

    pub fn center_pixel(&self) -> anyhow::Result<LinearRgba> {
        let pixels = self.pixels()?;
        Ok(pixels[(FRAME / 2 * FRAME + FRAME / 2) as usize])
    }
}

/// A scene holding one square of half size `half_size` in the plane `z`.
pub fn quad_scene(
    device: &dyn GraphicsDevice,
    half_size: f32,
    z: f32,
    color: LinearRgba,
) -> anyhow::Result<StaticScene> {
    let mesh = MeshData::quad(half_size).upload(device)?;
    let mut scene = StaticScene::new();
    scene.push(SceneObject {
        transform: Mat4::from_translation(Vec3::new(0.0, 0.0, z)),
        mesh,
        color,
    });
    Ok(scene)
}

/// RGBA8 texel `[x, y, z]` of a tightly packed cubic level.
pub fn texel(level: &[u8], resolution: u32, [x, y, z]: [u32; 3]) -> [u8; 4] {
    let i = ((x + y * resolution + z * resolution * resolution) * 4) as usize;
    [level[i], level[i + 1], level[i + 2], level[i + 3]]
}

/// Number of texels with any non-zero channel.
pub fn occupied(level: &[u8]) -> usize {
    level
        .chunks_exact(4)
        .filter(|t| t.iter().any(|&b| b != 0))
        .count()
}
