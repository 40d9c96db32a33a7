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

use std::sync::Arc;
use voxa_core::math::{Extent2D, LinearRgba, Vec4};
use voxa_core::renderer::api::*;
use voxa_core::renderer::traits::host_kernel::{HostFragmentInput, HostVertexInput};
use voxa_core::renderer::traits::HostVertexOutput;
use voxa_core::renderer::{
    CommandEncoder, ComputePass, FramebufferProvider, GraphicsDevice, HostKernel, HostResources,
    RasterPass, RenderError, TechniqueCompiler,
};
use voxa_infra::{OffscreenTarget, ReferenceDevice};

const BUMP_WGSL: &str = r#"
@group(0) @binding(0) var<storage, read_write> counter: atomic<u32>;

@compute @workgroup_size(1)
fn main() {
    atomicAdd(&counter, 1u);
}
"#;

const COPY_WGSL: &str = r#"
@group(0) @binding(0) var<storage, read> copy_src: array<u32>;
@group(0) @binding(1) var<storage, read_write> copy_dst: array<u32>;

@compute @workgroup_size(1)
fn main() {
    copy_dst[0] = copy_src[0];
}
"#;

const FILL_WGSL: &str = r#"
@vertex
fn vs(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
    let uv = vec2<f32>(f32((i << 1u) & 2u), f32(i & 2u));
    return vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
}

@fragment
fn fs() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.0, 0.0, 1.0);
}
"#;

#[derive(Debug)]
struct BumpKernel;

impl HostKernel for BumpKernel {
    fn compute(
        &self,
        _global_id: [u32; 3],
        resources: &mut dyn HostResources,
    ) -> Result<(), RenderError> {
        resources.atomic_add_u32("counter", 0, 1)?;
        Ok(())
    }
}

#[derive(Debug)]
struct CopyKernel;

impl HostKernel for CopyKernel {
    fn compute(
        &self,
        _global_id: [u32; 3],
        resources: &mut dyn HostResources,
    ) -> Result<(), RenderError> {
        let value = resources.load_u32("copy_src", 0)?;
        resources.store_u32("copy_dst", 0, value)
    }
}

#[derive(Debug)]
struct FillKernel;

impl HostKernel for FillKernel {
    fn vertex(
        &self,
        input: &HostVertexInput,
        _resources: &dyn HostResources,
    ) -> Result<HostVertexOutput, RenderError> {
        let i = input.vertex_index;
        let (u, v) = (((i << 1) & 2) as f32, (i & 2) as f32);
        Ok(HostVertexOutput {
            position: Vec4::new(u * 2.0 - 1.0, v * 2.0 - 1.0, 0.0, 1.0),
            ..Default::default()
        })
    }

    fn fragment(
        &self,
        _input: &HostFragmentInput,
        _resources: &mut dyn HostResources,
    ) -> Result<Option<Vec4>, RenderError> {
        Ok(Some(Vec4::new(1.0, 0.0, 0.0, 1.0)))
    }
}

fn compute_technique(
    label: &str,
    source: &'static str,
    interface: Vec<ResourceDeclaration>,
    kernel: Arc<dyn HostKernel>,
) -> TechniqueDescriptor {
    TechniqueDescriptor {
        label: label.to_owned(),
        stages: vec![StageSource::new(ShaderStage::Compute, "main", source)],
        interface,
        raster: RasterState::SIDE_EFFECTS_ONLY,
        vertex_layout: None,
        color_format: None,
        host_kernel: Some(kernel),
    }
}

struct CounterFixture {
    device: ReferenceDevice,
    bump: Technique,
    copy: Technique,
    counter: BufferId,
    output: BufferId,
}

const COUNTER: ChannelSlot = ChannelSlot::new(ResourceKind::AtomicCounter, 0);
const COPY_SRC: ChannelSlot = ChannelSlot::new(ResourceKind::StorageBuffer, 0);
const COPY_DST: ChannelSlot = ChannelSlot::new(ResourceKind::StorageBuffer, 1);

fn counter_fixture() -> CounterFixture {
    let device = ReferenceDevice::new();
    let mut bump = device
        .compile(&compute_technique(
            "bump",
            BUMP_WGSL,
            vec![ResourceDeclaration::required(
                "counter",
                ResourceKind::AtomicCounter,
            )],
            Arc::new(BumpKernel),
        ))
        .unwrap();
    bump.assign("counter", COUNTER.index).unwrap();
    let mut copy = device
        .compile(&compute_technique(
            "copy",
            COPY_WGSL,
            vec![
                ResourceDeclaration::required("copy_src", ResourceKind::StorageBuffer),
                ResourceDeclaration::required("copy_dst", ResourceKind::StorageBuffer),
            ],
            Arc::new(CopyKernel),
        ))
        .unwrap();
    copy.assign("copy_src", COPY_SRC.index)
        .unwrap()
        .assign("copy_dst", COPY_DST.index)
        .unwrap();

    let counter = device
        .create_buffer(&BufferDescriptor::storage("counter", 4))
        .unwrap();
    let output = device
        .create_buffer(&BufferDescriptor::storage("output", 4))
        .unwrap();
    CounterFixture {
        device,
        bump: bump.build().unwrap(),
        copy: copy.build().unwrap(),
        counter,
        output,
    }
}

/// Bumps the counter, then copies it into the output buffer within the same
/// submission, optionally separated by a barrier.
fn bump_then_copy(
    fixture: &CounterFixture,
    barrier: Option<BarrierScope>,
    bind_dst: bool,
) -> u32 {
    let device = &fixture.device;
    let mut encoder = device.create_command_encoder(Some("bump_then_copy"));
    encoder.clear_buffer(fixture.counter, 0);
    encoder.clear_buffer(fixture.output, 0);
    encoder.bind_buffer(COUNTER, fixture.counter);
    {
        let mut pass = encoder.begin_compute_pass(Some("bump"));
        pass.set_technique(&fixture.bump);
        pass.dispatch(1, 1, 1);
    }
    if let Some(scope) = barrier {
        encoder.memory_barrier(scope);
    }
    encoder.bind_buffer(COPY_SRC, fixture.counter);
    if bind_dst {
        encoder.bind_buffer(COPY_DST, fixture.output);
    }
    {
        let mut pass = encoder.begin_compute_pass(Some("copy"));
        pass.set_technique(&fixture.copy);
        pass.dispatch(1, 1, 1);
    }
    device.submit(encoder.finish()).unwrap();

    let bytes = device.read_buffer(fixture.output).unwrap();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[test]
fn test_atomic_writes_need_a_matching_barrier() {
    let fixture = counter_fixture();
    assert_eq!(bump_then_copy(&fixture, None, true), 0);
    assert_eq!(
        bump_then_copy(&fixture, Some(BarrierScope::SHADER_STORAGE), true),
        0
    );
    assert_eq!(
        bump_then_copy(&fixture, Some(BarrierScope::ATOMIC_COUNTER), true),
        1
    );
}

#[test]
fn test_end_of_submission_publishes_everything() {
    let fixture = counter_fixture();
    bump_then_copy(&fixture, None, true);
    let bytes = fixture.device.read_buffer(fixture.counter).unwrap();
    assert_eq!(bytes, 1u32.to_le_bytes());
}

#[test]
fn test_empty_channel_skips_the_dispatch() {
    let fixture = counter_fixture();
    // copy_dst has nothing bound; the copy is skipped but the submission succeeds.
    assert_eq!(bump_then_copy(&fixture, Some(BarrierScope::ALL), false), 0);
}

#[test]
fn test_pass_left_open_is_rejected() {
    let fixture = counter_fixture();
    let mut commands = RecordingEncoder::new(Some("broken"));
    {
        let mut pass = commands.begin_compute_pass(None);
        pass.set_technique(&fixture.bump);
    }
    let mut list: Vec<Command> = Box::new(commands).finish().into_iter().collect();
    // Drop the EndPass the guard recorded.
    list.pop();
    let result = fixture.device.submit(CommandList::from_commands(Some("broken"), list));
    assert!(matches!(result, Err(RenderError::Submission(_))));
}

#[test]
fn test_fullscreen_triangle_covers_the_target() {
    let device = ReferenceDevice::new();
    let target = OffscreenTarget::new(&device, Extent2D::new(4, 4), TextureFormat::Rgba8Unorm)
        .unwrap();
    let technique = device
        .compile(&TechniqueDescriptor {
            label: "fill".to_owned(),
            stages: vec![
                StageSource::new(ShaderStage::Vertex, "vs", FILL_WGSL),
                StageSource::new(ShaderStage::Fragment, "fs", FILL_WGSL),
            ],
            interface: Vec::new(),
            raster: RasterState::FULLSCREEN_OVER,
            vertex_layout: None,
            color_format: Some(TextureFormat::Rgba8Unorm),
            host_kernel: Some(Arc::new(FillKernel)),
        })
        .unwrap()
        .build()
        .unwrap();

    let mut encoder = device.create_command_encoder(None);
    {
        let mut pass = encoder.begin_raster_pass(&RasterPassDescriptor {
            clear_color: Some(target.clear_color()),
            ..RasterPassDescriptor::load("fill", target.color_target())
        });
        pass.set_technique(&technique);
        pass.draw(0..3, 0..1);
    }
    device.submit(encoder.finish()).unwrap();

    let pixels = target.read_pixels(&device).unwrap();
    assert_eq!(pixels.len(), 16);
    for pixel in pixels {
        approx::assert_relative_eq!(pixel.r, 1.0, epsilon = 1e-3);
        approx::assert_relative_eq!(pixel.a, 1.0, epsilon = 1e-3);
        assert_eq!(pixel.g, 0.0);
        assert_ne!(pixel, LinearRgba::BLACK);
    }
}
