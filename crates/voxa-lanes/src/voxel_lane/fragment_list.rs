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

//! Per-axis fragment list construction.
//!
//! For each axis, the scene is rasterized through that axis' orthographic
//! camera into a `grid²` array of list heads. Every fragment claims a record
//! from the axis' node pool and is pushed onto its pixel's list. Depth, colour
//! writes, blending and culling are all disabled, so every covered pixel of
//! every triangle produces a record.
//!
//! # Channels
//!
//! | Slot             | Resource                  |
//! |------------------|---------------------------|
//! | `UniformBuffer0` | `axis` camera and grid    |
//! | `StorageBuffer0` | `objects` transforms      |
//! | `StorageBuffer1` | `heads` of the bound axis |
//! | `StorageBuffer2` | `nodes` of the bound axis |
//! | `AtomicCounter0` | `counter` of the bound axis |

use super::atomic_list::{
    walk, AppendTarget, AtomicListAppend, FragmentRecord, RECORD_WORDS, SENTINEL,
};
use super::axis_camera::{Axis, AxisCamera};
use super::config::{VoxelizationConfig, FRAGMENT_RECORD_BYTES};
use super::error::VoxelError;
use super::mapping::{pack_color, pack_voxel, VolumeMapping};
use super::shaders::LIST_BUILD_WGSL;
use std::borrow::Cow;
use std::sync::Arc;
use voxa_core::math::{Extent3D, LinearRgba, Mat4, Vec3, Vec4};
use voxa_core::renderer::api::{
    BufferDescriptor, BufferId, ChannelSlot, RasterPassDescriptor, RasterState,
    ResourceDeclaration, ResourceKind, ShaderStage, StageSource, Technique, TechniqueDescriptor,
    TextureDescriptor, TextureDimension, TextureFormat, TextureId, TextureUsage,
};
use voxa_core::renderer::traits::host_kernel::{
    read_storage, read_uniform, HostFragmentInput, HostVertexInput, HostVertexOutput,
};
use voxa_core::renderer::{
    CommandEncoder, GraphicsDevice, HostKernel, HostResources, RenderError, TechniqueCompiler,
};
use voxa_core::scene::{DrawableLayout, Vertex};

pub const AXIS_UNIFORM: ChannelSlot = ChannelSlot::new(ResourceKind::UniformBuffer, 0);
pub const OBJECTS: ChannelSlot = ChannelSlot::new(ResourceKind::StorageBuffer, 0);
pub const HEADS: ChannelSlot = ChannelSlot::new(ResourceKind::StorageBuffer, 1);
pub const NODES: ChannelSlot = ChannelSlot::new(ResourceKind::StorageBuffer, 2);
pub const COUNTER: ChannelSlot = ChannelSlot::new(ResourceKind::AtomicCounter, 0);

/// `AxisUniforms` in `list_build.wgsl`.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct AxisUniforms {
    pub view_proj: Mat4,
    /// Minimum corner of the cube in `xyz`, edge length in `w`.
    pub volume: [f32; 4],
    /// Voxel resolution, grid resolution, axis index, pool capacity.
    pub grid: [u32; 4],
}

/// `ObjectData` in `list_build.wgsl`, one per renderable.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct ObjectData {
    pub world: Mat4,
    pub color: LinearRgba,
}

// --- Host kernel ---

/// Appends through the bindings of a running list-build draw.
struct KernelListTarget<'r> {
    resources: &'r mut dyn HostResources,
}

impl AppendTarget for KernelListTarget<'_> {
    type Error = RenderError;

    fn claim(&mut self) -> Result<u32, RenderError> {
        self.resources.atomic_add_u32("counter", 0, 1)
    }

    fn write_record(&mut self, index: u32, record: &FragmentRecord) -> Result<(), RenderError> {
        let base = index as usize * RECORD_WORDS;
        for (i, word) in record.to_words().into_iter().enumerate() {
            self.resources.store_u32("nodes", base + i, word)?;
        }
        Ok(())
    }

    fn exchange_head(&mut self, pixel: usize, index: u32) -> Result<u32, RenderError> {
        self.resources.atomic_exchange_u32("heads", pixel, index)
    }

    fn patch_next(&mut self, index: u32, next: u32) -> Result<(), RenderError> {
        self.resources
            .store_u32("nodes", index as usize * RECORD_WORDS, next)
    }
}

/// Host twin of `list_build.wgsl`.
#[derive(Debug)]
pub struct ListBuildKernel;

impl HostKernel for ListBuildKernel {
    fn vertex(
        &self,
        input: &HostVertexInput,
        resources: &dyn HostResources,
    ) -> Result<HostVertexOutput, RenderError> {
        let axis: AxisUniforms = read_uniform(resources, "axis")?;
        let object: ObjectData = read_storage(resources, "objects", input.instance_index as usize)?;
        let world = object.world * Vec4::from_vec3(input.attributes[0].truncate(), 1.0);
        let mut varyings = [Vec4::ZERO; 4];
        varyings[0] = world;
        varyings[1] = Vec4::new(input.instance_index as f32, 0.0, 0.0, 0.0);
        Ok(HostVertexOutput {
            position: axis.view_proj * world,
            varyings,
        })
    }

    fn fragment(
        &self,
        input: &HostFragmentInput,
        resources: &mut dyn HostResources,
    ) -> Result<Option<Vec4>, RenderError> {
        let axis: AxisUniforms = read_uniform(resources, "axis")?;
        let [voxel_res, grid, axis_index, capacity] = axis.grid;
        let px = (input.frag_coord.x.max(0.0) as u32).min(grid - 1);
        let py = (input.frag_coord.y.max(0.0) as u32).min(grid - 1);
        let instance = input.varyings[1].x.round().max(0.0) as usize;
        let object: ObjectData = read_storage(resources, "objects", instance)?;

        let half = axis.volume[3] * 0.5;
        let min = Vec3::new(axis.volume[0], axis.volume[1], axis.volume[2]);
        let mapping = VolumeMapping::new(min + Vec3::splat(half), half, voxel_res);
        let voxel = mapping.world_to_voxel(input.varyings[0].truncate());
        let (xy, z_axis) = pack_voxel(voxel, axis_index);

        let record = FragmentRecord {
            next: SENTINEL,
            color: pack_color(object.color),
            xy,
            z_axis,
        };
        let pixel = (py * grid + px) as usize;
        AtomicListAppend::new(capacity).append(&mut KernelListTarget { resources }, pixel, record)?;
        Ok(None)
    }
}

// --- FragmentListBuilder ---

/// The buffers of one axis' fragment list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisList {
    /// `grid²` head indices.
    pub heads: BufferId,
    /// `capacity` four-word records.
    pub nodes: BufferId,
    /// The single allocation counter word.
    pub counter: BufferId,
}

/// Owns the per-axis lists and the list-build technique.
#[derive(Debug)]
pub struct FragmentListBuilder {
    device: Arc<dyn GraphicsDevice>,
    technique: Technique,
    cameras: [AxisCamera; 3],
    lists: [AxisList; 3],
    axis_uniforms: [BufferId; 3],
    objects: BufferId,
    object_capacity: usize,
    dummy_target: TextureId,
    append: AtomicListAppend,
    grid: u32,
}

/// The list-build technique. Draws with [`Vertex::layout`] geometry.
pub fn list_build_descriptor() -> TechniqueDescriptor {
    TechniqueDescriptor {
        label: "voxa_list_build".to_owned(),
        stages: vec![
            StageSource::new(ShaderStage::Vertex, "vs_main", LIST_BUILD_WGSL),
            StageSource::new(ShaderStage::Fragment, "fs_main", LIST_BUILD_WGSL),
        ],
        interface: vec![
            ResourceDeclaration::required("axis", ResourceKind::UniformBuffer),
            ResourceDeclaration::required("objects", ResourceKind::StorageBuffer),
            ResourceDeclaration::required("heads", ResourceKind::StorageBuffer),
            ResourceDeclaration::required("nodes", ResourceKind::StorageBuffer),
            ResourceDeclaration::required("counter", ResourceKind::AtomicCounter),
        ],
        raster: RasterState::SIDE_EFFECTS_ONLY,
        vertex_layout: Some(Vertex::layout()),
        color_format: Some(TextureFormat::R8Unorm),
        host_kernel: Some(Arc::new(ListBuildKernel)),
    }
}

fn object_buffer(device: &dyn GraphicsDevice, capacity: usize) -> Result<BufferId, VoxelError> {
    let size = (capacity.max(1) * std::mem::size_of::<ObjectData>()) as u64;
    Ok(device.create_buffer(&BufferDescriptor::storage("voxa_objects", size))?)
}

impl FragmentListBuilder {
    /// Compiles the list-build technique and allocates the three lists.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        compiler: &dyn TechniqueCompiler,
        config: &VoxelizationConfig,
    ) -> Result<Self, VoxelError> {
        let mut unbound = compiler.compile(&list_build_descriptor())?;
        unbound
            .assign("axis", AXIS_UNIFORM.index)?
            .assign("objects", OBJECTS.index)?
            .assign("heads", HEADS.index)?
            .assign("nodes", NODES.index)?
            .assign("counter", COUNTER.index)?;
        let technique = unbound.build()?;

        let grid = config.viewport_resolution();
        let capacity = config.node_capacity();
        let cameras = AxisCamera::for_config(config);
        let mapping = VolumeMapping::from_config(config);
        let min = mapping.min_corner();
        let edge = 2.0 * mapping.half_extent();

        let mut lists = Vec::with_capacity(3);
        let mut axis_uniforms = Vec::with_capacity(3);
        for camera in &cameras {
            let axis = camera.axis;
            let heads_label = format!("voxa_heads_{axis:?}");
            let nodes_label = format!("voxa_nodes_{axis:?}");
            let counter_label = format!("voxa_counter_{axis:?}");
            lists.push(AxisList {
                heads: device.create_buffer(&BufferDescriptor::storage(
                    &heads_label,
                    u64::from(grid) * u64::from(grid) * 4,
                ))?,
                nodes: device.create_buffer(&BufferDescriptor::storage(
                    &nodes_label,
                    u64::from(capacity) * FRAGMENT_RECORD_BYTES,
                ))?,
                counter: device.create_buffer(&BufferDescriptor::storage(&counter_label, 4))?,
            });

            let uniforms = AxisUniforms {
                view_proj: camera.view_proj,
                volume: [min.x, min.y, min.z, edge],
                grid: [config.voxel_resolution, grid, axis.index() as u32, capacity],
            };
            let label = format!("voxa_axis_uniforms_{axis:?}");
            axis_uniforms.push(device.create_buffer_with_data(
                &BufferDescriptor::uniform(&label, std::mem::size_of::<AxisUniforms>() as u64),
                bytemuck::bytes_of(&uniforms),
            )?);
        }

        let dummy_target = device.create_texture(&TextureDescriptor {
            label: Some(Cow::Borrowed("voxa_list_build_target")),
            size: Extent3D::new(grid, grid, 1),
            mip_level_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::R8Unorm,
            usage: TextureUsage::RENDER_ATTACHMENT,
        })?;
        let objects = object_buffer(device.as_ref(), 1)?;

        log::info!(
            "FragmentListBuilder: {grid}² grid per axis, {capacity} records per pool ({} KiB)",
            u64::from(capacity) * FRAGMENT_RECORD_BYTES / 1024
        );

        let [x, y, z] = [lists[0], lists[1], lists[2]];
        let [ux, uy, uz] = [axis_uniforms[0], axis_uniforms[1], axis_uniforms[2]];
        Ok(Self {
            device,
            technique,
            cameras,
            lists: [x, y, z],
            axis_uniforms: [ux, uy, uz],
            objects,
            object_capacity: 1,
            dummy_target,
            append: AtomicListAppend::new(capacity),
            grid,
        })
    }

    /// The camera used for `axis`.
    pub fn camera(&self, axis: Axis) -> &AxisCamera {
        &self.cameras[axis.index()]
    }

    pub fn list(&self, axis: Axis) -> AxisList {
        self.lists[axis.index()]
    }

    pub fn grid_resolution(&self) -> u32 {
        self.grid
    }

    /// Records per node pool, slot 0 included.
    pub fn capacity(&self) -> u32 {
        self.append.capacity()
    }

    /// Records resetting every head to the sentinel and every counter to 1.
    pub fn clear(&self, encoder: &mut dyn CommandEncoder) {
        for list in &self.lists {
            encoder.clear_buffer(list.heads, SENTINEL);
            encoder.clear_buffer(list.counter, 1);
        }
    }

    /// Uploads one [`ObjectData`] per draw. Lands before the next submission.
    pub fn upload_objects(&mut self, objects: &[ObjectData]) -> Result<(), VoxelError> {
        if objects.len() > self.object_capacity {
            let capacity = objects.len().next_power_of_two();
            let replacement = object_buffer(self.device.as_ref(), capacity)?;
            self.device.destroy_buffer(self.objects)?;
            self.objects = replacement;
            self.object_capacity = capacity;
            log::debug!("FragmentListBuilder: Object buffer grown to {capacity} entries");
        }
        if !objects.is_empty() {
            self.device
                .write_buffer(self.objects, 0, bytemuck::cast_slice(objects))?;
        }
        Ok(())
    }

    /// Records the list-build pass for `axis`. Draw `i` reads object `i`.
    ///
    /// Returns the number of draws recorded.
    pub fn build(
        &self,
        encoder: &mut dyn CommandEncoder,
        axis: Axis,
        draws: &[DrawableLayout],
    ) -> u32 {
        let list = self.lists[axis.index()];
        encoder.bind_buffer(AXIS_UNIFORM, self.axis_uniforms[axis.index()]);
        encoder.bind_buffer(OBJECTS, self.objects);
        encoder.bind_buffer(HEADS, list.heads);
        encoder.bind_buffer(NODES, list.nodes);
        encoder.bind_buffer(COUNTER, list.counter);

        let label = format!("voxa_list_build_{axis:?}");
        let mut pass =
            encoder.begin_raster_pass(&RasterPassDescriptor::load(&label, self.dummy_target));
        pass.set_technique(&self.technique);
        let mut recorded = 0;
        for (instance, draw) in (0u32..).zip(draws) {
            if draw.index_count == 0 {
                continue;
            }
            pass.set_vertex_buffer(0, draw.vertex_buffer, 0);
            pass.set_index_buffer(draw.index_buffer, 0, draw.index_format);
            pass.draw_indexed(0..draw.index_count, 0, instance..instance + 1);
            recorded += 1;
        }
        recorded
    }

    /// Fragments dropped on `axis` in the last build. Blocks on the device.
    pub fn overflow_count(&self, axis: Axis) -> Result<u32, VoxelError> {
        let counter = self.read_words(self.lists[axis.index()].counter)?;
        Ok(self.append.overflow(counter.first().copied().unwrap_or(0)))
    }

    /// Head pointers of `axis`. Blocks on the device.
    pub fn read_heads(&self, axis: Axis) -> Result<Vec<u32>, VoxelError> {
        self.read_words(self.lists[axis.index()].heads)
    }

    /// Every record on `axis` reachable from `pixel`, newest first. Blocks on the device.
    pub fn read_list(&self, axis: Axis, pixel: usize) -> Result<Vec<FragmentRecord>, VoxelError> {
        let heads = self.read_heads(axis)?;
        let nodes = self.read_words(self.lists[axis.index()].nodes)?;
        let head = heads.get(pixel).copied().unwrap_or(SENTINEL);
        Ok(walk(&nodes, head, self.capacity())
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    fn read_words(&self, buffer: BufferId) -> Result<Vec<u32>, VoxelError> {
        let bytes = self.device.read_buffer(buffer)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Releases every buffer and the list-build target.
    pub fn destroy(self) -> Result<(), VoxelError> {
        for list in self.lists {
            self.device.destroy_buffer(list.heads)?;
            self.device.destroy_buffer(list.nodes)?;
            self.device.destroy_buffer(list.counter)?;
        }
        for uniform in self.axis_uniforms {
            self.device.destroy_buffer(uniform)?;
        }
        self.device.destroy_buffer(self.objects)?;
        self.device.destroy_texture(self.dummy_target)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layouts_match_the_shader() {
        assert_eq!(std::mem::size_of::<AxisUniforms>(), 96);
        assert_eq!(std::mem::size_of::<ObjectData>(), 80);
    }

    #[test]
    fn test_descriptor_declares_every_channel() {
        let descriptor = list_build_descriptor();
        assert!(!descriptor.is_compute());
        assert_eq!(descriptor.interface.len(), 5);
        assert_eq!(
            descriptor.declaration("counter").map(|d| d.kind),
            Some(ResourceKind::AtomicCounter)
        );
    }
}
