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

// Voxa Sandbox
// Headless fly-through around a small voxelized scene

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use voxa_core::math::{Extent2D, LinearRgba, Mat4, Vec3};
use voxa_core::renderer::api::TextureFormat;
use voxa_core::renderer::{GraphicsDevice, TechniqueCompiler};
use voxa_core::scene::{MeshData, SceneObject, StaticScene};
use voxa_core::ViewingCamera;
use voxa_infra::{OffscreenTarget, ReferenceDevice, WgpuDevice};
use voxa_lanes::{VoxelizationConfig, VoxelizationPipeline};

const FRAME_SIZE: u32 = 128;
const FRAMES: u32 = 120;
const FRAME_TIME: f32 = 1.0 / 60.0;

fn build_scene(device: &dyn GraphicsDevice) -> Result<StaticScene> {
    let mut scene = StaticScene::new();
    scene.push(SceneObject {
        transform: Mat4::from_translation(Vec3::new(0.0, 0.0, -0.25)),
        mesh: MeshData::quad(0.6).upload(device)?,
        color: LinearRgba::new(0.9, 0.2, 0.15, 1.0),
    });
    scene.push(SceneObject {
        transform: Mat4::from_translation(Vec3::new(0.3, -0.2, 0.3))
            * Mat4::from_rotation_y(0.6),
        mesh: MeshData::cube(0.2).upload(device)?,
        color: LinearRgba::new(0.2, 0.6, 0.9, 1.0),
    });
    Ok(scene)
}

fn release_scene(device: &dyn GraphicsDevice, scene: StaticScene) -> Result<()> {
    for object in scene.objects() {
        object.mesh.destroy(device)?;
    }
    Ok(())
}

/// Runs the scripted fly-through on any backend.
fn run<D>(device: Arc<D>, config: VoxelizationConfig) -> Result<()>
where
    D: GraphicsDevice + TechniqueCompiler,
{
    let target = Arc::new(
        OffscreenTarget::new(
            device.as_ref(),
            Extent2D::new(FRAME_SIZE, FRAME_SIZE),
            TextureFormat::Rgba8Unorm,
        )?
        .with_clear_color(LinearRgba::BLACK),
    );
    let speed = config.camera_move_speed;
    let mut pipeline =
        VoxelizationPipeline::new(device.clone(), device.as_ref(), target.clone(), config)?;
    let scene = build_scene(device.as_ref())?;

    // Strafe right for the first half, back left for the second.
    let mut camera = ViewingCamera::default();
    for frame in 0..FRAMES {
        let direction = if frame < FRAMES / 2 { 1.0 } else { -1.0 };
        camera = camera.translated(Vec3::X * (direction * speed * FRAME_TIME));

        let report = pipeline.render_frame(&scene, &camera)?;
        if frame % 30 == 0 {
            log::info!(
                "Sandbox: Frame {frame}: {} renderables, draws per axis {:?}",
                report.renderables,
                report.draws_per_axis
            );
        }
    }

    let lit = target
        .read_pixels(device.as_ref())?
        .into_iter()
        .filter(|p| p.a > 0.0 && (p.r + p.g + p.b) > 0.2)
        .count();
    log::info!("Sandbox: Final frame has {lit} lit pixels out of {}", FRAME_SIZE * FRAME_SIZE);

    release_scene(device.as_ref(), scene)?;
    pipeline.destroy()?;
    if let Ok(target) = Arc::try_unwrap(target) {
        target.destroy(device.as_ref())?;
    }
    Ok(())
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info"))
        .filter_module("wgpu_hal", log::LevelFilter::Error)
        .filter_module("naga", log::LevelFilter::Warn)
        .init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/voxa.ron"));
    let config = VoxelizationConfig::load(&path)?;

    match WgpuDevice::new_headless() {
        Ok(device) => run(Arc::new(device), config),
        Err(e) => {
            log::warn!("Sandbox: No GPU adapter ({e}), using the reference device");
            run(Arc::new(ReferenceDevice::new()), config)
        }
    }
}
