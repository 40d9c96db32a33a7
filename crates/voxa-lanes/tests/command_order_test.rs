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

//! Checks the command list a frame submits against the frame state machine.

use std::sync::{Arc, Mutex};
use voxa_core::math::{Extent2D, Extent3D, LinearRgba, Mat4, Origin3D};
use voxa_core::renderer::api::*;
use voxa_core::renderer::{CommandEncoder, GraphicsDevice, RenderError, ResourceError};
use voxa_core::scene::{MeshData, SceneObject, StaticScene};
use voxa_core::ViewingCamera;
use voxa_infra::{OffscreenTarget, ReferenceDevice};
use voxa_lanes::{Barrier, PipelineOptions, VoxelizationConfig, VoxelizationPipeline};

/// Forwards to a [`ReferenceDevice`] and keeps a copy of every submission.
#[derive(Debug, Default)]
struct RecordingDevice {
    inner: ReferenceDevice,
    submitted: Mutex<Vec<CommandList>>,
}

impl GraphicsDevice for RecordingDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        self.inner.create_buffer(descriptor)
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        self.inner.create_buffer_with_data(descriptor, data)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        self.inner.write_buffer(id, offset, data)
    }

    fn read_buffer(&self, id: BufferId) -> Result<Vec<u8>, ResourceError> {
        self.inner.read_buffer(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.inner.destroy_buffer(id)
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        self.inner.create_texture(descriptor)
    }

    fn write_texture(
        &self,
        id: TextureId,
        mip_level: u32,
        origin: Origin3D,
        size: Extent3D,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        self.inner.write_texture(id, mip_level, origin, size, data)
    }

    fn read_texture(&self, id: TextureId, mip_level: u32) -> Result<Vec<u8>, ResourceError> {
        self.inner.read_texture(id, mip_level)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        self.inner.destroy_texture(id)
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        self.inner.create_sampler(descriptor)
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        self.inner.destroy_sampler(id)
    }

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        self.inner.create_command_encoder(label)
    }

    fn submit(&self, commands: CommandList) -> Result<(), RenderError> {
        self.submitted
            .lock()
            .map_err(|e| RenderError::Submission(e.to_string()))?
            .push(commands.clone());
        self.inner.submit(commands)
    }

    fn limits(&self) -> DeviceLimits {
        self.inner.limits()
    }

    fn adapter_info(&self) -> AdapterInfo {
        self.inner.adapter_info()
    }
}

/// Collapses a command list into the coarse events the state machine orders.
fn events(list: &CommandList) -> Vec<String> {
    let mut events: Vec<String> = Vec::new();
    for command in list.commands() {
        let event = match command {
            Command::ClearBuffer { .. } | Command::ClearImageRegion { .. } => "clear".to_owned(),
            Command::BeginRasterPass(descriptor) => {
                descriptor.label.clone().unwrap_or_default()
            }
            Command::BeginComputePass { label } => label.clone().unwrap_or_default(),
            Command::MemoryBarrier(scope) => format!("barrier {scope:?}"),
            Command::GenerateMipmaps(_) => "mipmaps".to_owned(),
            _ => continue,
        };
        if events.last() != Some(&event) {
            events.push(event);
        }
    }
    events
}

fn record_frame(options: PipelineOptions) -> anyhow::Result<Vec<String>> {
    let device = Arc::new(RecordingDevice::default());
    let target = Arc::new(OffscreenTarget::new(
        device.as_ref(),
        Extent2D::new(8, 8),
        TextureFormat::Rgba8Unorm,
    )?);
    let config = VoxelizationConfig {
        voxel_resolution: 8,
        ..VoxelizationConfig::default()
    };
    let mut pipeline =
        VoxelizationPipeline::with_options(device.clone(), &device.inner, target, config, options)?;

    let mut scene = StaticScene::new();
    scene.push(SceneObject {
        transform: Mat4::IDENTITY,
        mesh: MeshData::cube(0.5).upload(device.as_ref())?,
        color: LinearRgba::WHITE,
    });
    pipeline.render_frame(&scene, &ViewingCamera::default())?;

    let submitted = device
        .submitted
        .lock()
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    assert_eq!(submitted.len(), 1, "a frame is one submission");
    Ok(events(&submitted[0]))
}

fn barrier(scope: BarrierScope) -> String {
    format!("barrier {scope:?}")
}

#[test]
fn test_frame_records_stages_in_state_machine_order() -> anyhow::Result<()> {
    let events = record_frame(PipelineOptions::default())?;
    assert_eq!(
        events,
        vec![
            "clear".to_owned(),
            "voxa_list_build_X".to_owned(),
            "voxa_list_build_Y".to_owned(),
            "voxa_list_build_Z".to_owned(),
            barrier(Barrier::ListsToResolve.scope()),
            "voxa_resolve".to_owned(),
            barrier(BarrierScope::SHADER_STORAGE),
            "voxa_commit".to_owned(),
            barrier(Barrier::ResolveToTrace.scope()),
            "mipmaps".to_owned(),
            "voxa_cone_trace".to_owned(),
        ]
    );
    Ok(())
}

#[test]
fn test_disabled_barrier_records_no_command() -> anyhow::Result<()> {
    let events = record_frame(PipelineOptions {
        list_barrier: false,
        ..PipelineOptions::default()
    })?;
    assert!(!events.contains(&barrier(Barrier::ListsToResolve.scope())));
    assert!(events.contains(&barrier(Barrier::ResolveToTrace.scope())));
    let resolve = events.iter().position(|e| e == "voxa_resolve");
    let last_build = events.iter().position(|e| e == "voxa_list_build_Z");
    assert_eq!(resolve, last_build.map(|i| i + 1));
    Ok(())
}
