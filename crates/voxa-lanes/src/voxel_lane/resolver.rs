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

//! Fragment lists to voxel volume.
//!
//! Resolve walks each axis' lists and folds every record into a `res³`
//! accumulation buffer with `atomicMax` over premultiplied RGBA8. Alpha sits in
//! the top byte, so the most opaque fragment of a voxel wins and ties fall to
//! the colour bits. The fold is order independent, so resolving the same lists
//! twice gives identical volumes. A commit pass then unpacks the buffer into
//! level 0 of the volume texture.

use super::config::VoxelizationConfig;
use super::error::VoxelError;
use super::fragment_list::AxisList;
use super::mapping::{pack_premultiplied, unpack_voxel};
use super::shaders::{COMMIT_WGSL, COMMIT_WORKGROUP, RESOLVE_WGSL, RESOLVE_WORKGROUP};
use std::borrow::Cow;
use std::sync::Arc;
use voxa_core::math::{Extent3D, LinearRgba, Region3D};
use voxa_core::renderer::api::{
    BarrierScope, BufferDescriptor, BufferId, ChannelSlot, ClearValue, ImageDescriptor,
    RasterState, ResourceDeclaration, ResourceKind, ShaderStage, StageSource, Technique,
    TechniqueDescriptor, TextureFormat, TextureId, TextureUsage,
};
use voxa_core::renderer::traits::host_kernel::read_uniform;
use voxa_core::renderer::{
    CommandEncoder, GraphicsDevice, HostKernel, HostResources, RenderError, TechniqueCompiler,
};

pub const RESOLVE_UNIFORM: ChannelSlot = ChannelSlot::new(ResourceKind::UniformBuffer, 1);
pub const RESOLVE_HEADS: ChannelSlot = ChannelSlot::new(ResourceKind::StorageBuffer, 3);
pub const RESOLVE_NODES: ChannelSlot = ChannelSlot::new(ResourceKind::StorageBuffer, 4);
pub const ACCUMULATION: ChannelSlot = ChannelSlot::new(ResourceKind::StorageBuffer, 5);
pub const VOLUME_IMAGE: ChannelSlot = ChannelSlot::new(ResourceKind::StorageImage, 0);

/// `ResolveUniforms` in `resolve.wgsl` and `commit.wgsl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct ResolveUniforms {
    /// Voxel resolution, grid resolution, pool capacity, unused.
    pub grid: [u32; 4],
}

// --- Host kernels ---

/// Host twin of `resolve.wgsl`.
#[derive(Debug)]
pub struct ResolveKernel;

impl HostKernel for ResolveKernel {
    fn compute(
        &self,
        [x, y, _]: [u32; 3],
        resources: &mut dyn HostResources,
    ) -> Result<(), RenderError> {
        let uniforms: ResolveUniforms = read_uniform(resources, "resolve")?;
        let [res, grid, capacity, _] = uniforms.grid;
        if x >= grid || y >= grid {
            return Ok(());
        }
        let mut cursor = resources.load_u32("heads", (y * grid + x) as usize)?;
        let mut steps = 0;
        while cursor != 0 && cursor < capacity && steps < capacity {
            let base = cursor as usize * 4;
            let next = resources.load_u32("nodes", base)?;
            let color = resources.load_u32("nodes", base + 1)?;
            let xy = resources.load_u32("nodes", base + 2)?;
            let z_axis = resources.load_u32("nodes", base + 3)?;
            let ([vx, vy, vz], _) = unpack_voxel(xy, z_axis);
            if vx < res && vy < res && vz < res {
                let index = (vx + vy * res + vz * res * res) as usize;
                resources.atomic_max_u32("accumulation", index, pack_premultiplied(color))?;
            }
            cursor = next;
            steps += 1;
        }
        Ok(())
    }
}

/// Host twin of `commit.wgsl`.
#[derive(Debug)]
pub struct CommitKernel;

impl HostKernel for CommitKernel {
    fn compute(
        &self,
        [x, y, z]: [u32; 3],
        resources: &mut dyn HostResources,
    ) -> Result<(), RenderError> {
        let uniforms: ResolveUniforms = read_uniform(resources, "resolve")?;
        let res = uniforms.grid[0];
        if x >= res || y >= res || z >= res {
            return Ok(());
        }
        let packed = resources.load_u32("accumulation", (x + y * res + z * res * res) as usize)?;
        resources.store_texel("volume", [x, y, z], LinearRgba::unpack_rgba8(packed).into())
    }
}

fn compute_descriptor(
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

/// The list walk technique.
pub fn resolve_descriptor() -> TechniqueDescriptor {
    compute_descriptor(
        "voxa_resolve",
        RESOLVE_WGSL,
        vec![
            ResourceDeclaration::required("resolve", ResourceKind::UniformBuffer),
            ResourceDeclaration::required("heads", ResourceKind::StorageBuffer),
            ResourceDeclaration::required("nodes", ResourceKind::StorageBuffer),
            ResourceDeclaration::required("accumulation", ResourceKind::StorageBuffer),
        ],
        Arc::new(ResolveKernel),
    )
}

/// The accumulation-to-volume technique.
pub fn commit_descriptor() -> TechniqueDescriptor {
    compute_descriptor(
        "voxa_commit",
        COMMIT_WGSL,
        vec![
            ResourceDeclaration::required("resolve", ResourceKind::UniformBuffer),
            ResourceDeclaration::required("accumulation", ResourceKind::StorageBuffer),
            ResourceDeclaration::required("volume", ResourceKind::StorageImage),
        ],
        Arc::new(CommitKernel),
    )
}

fn groups(extent: u32, workgroup: u32) -> u32 {
    extent.div_ceil(workgroup)
}

// --- VoxelVolumeResolver ---

/// Owns the accumulation buffer and the voxel volume.
#[derive(Debug)]
pub struct VoxelVolumeResolver {
    device: Arc<dyn GraphicsDevice>,
    resolve: Technique,
    commit: Technique,
    uniforms: BufferId,
    accumulation: BufferId,
    volume: TextureId,
    resolution: u32,
    grid: u32,
    mip_levels: u32,
}

impl VoxelVolumeResolver {
    /// Compiles the resolve and commit techniques and allocates the volume.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        compiler: &dyn TechniqueCompiler,
        config: &VoxelizationConfig,
    ) -> Result<Self, VoxelError> {
        let mut resolve = compiler.compile(&resolve_descriptor())?;
        resolve
            .assign("resolve", RESOLVE_UNIFORM.index)?
            .assign("heads", RESOLVE_HEADS.index)?
            .assign("nodes", RESOLVE_NODES.index)?
            .assign("accumulation", ACCUMULATION.index)?;

        let mut commit = compiler.compile(&commit_descriptor())?;
        commit
            .assign("resolve", RESOLVE_UNIFORM.index)?
            .assign("accumulation", ACCUMULATION.index)?
            .assign("volume", VOLUME_IMAGE.index)?;

        let resolution = config.voxel_resolution;
        let grid = config.viewport_resolution();
        let uniforms = ResolveUniforms {
            grid: [resolution, grid, config.node_capacity(), 0],
        };
        let uniforms = device.create_buffer_with_data(
            &BufferDescriptor::uniform(
                "voxa_resolve_uniforms",
                std::mem::size_of::<ResolveUniforms>() as u64,
            ),
            bytemuck::bytes_of(&uniforms),
        )?;
        let voxels = Extent3D::cube(resolution).volume();
        let accumulation = device.create_buffer(&BufferDescriptor::storage(
            "voxa_accumulation",
            voxels * 4,
        ))?;
        let volume = device.create_image_3d(&ImageDescriptor {
            label: Some(Cow::Borrowed("voxa_volume")),
            width: resolution,
            height: resolution,
            depth: resolution,
            format: TextureFormat::Rgba8Unorm,
            mipmapped: true,
            usage: TextureUsage::TEXTURE_BINDING
                | TextureUsage::STORAGE_BINDING
                | TextureUsage::COPY_DST
                | TextureUsage::COPY_SRC,
        })?;

        log::info!(
            "VoxelVolumeResolver: {resolution}³ volume, {} mip levels",
            config.volume_mip_levels()
        );
        Ok(Self {
            device,
            resolve: resolve.build()?,
            commit: commit.build()?,
            uniforms,
            accumulation,
            volume,
            resolution,
            grid,
            mip_levels: config.volume_mip_levels(),
        })
    }

    /// The resolved volume. Only meaningful after [`resolve`](Self::resolve).
    pub fn volume(&self) -> TextureId {
        self.volume
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Records zeroing the accumulation buffer and every level of the volume.
    pub fn clear(&self, encoder: &mut dyn CommandEncoder) {
        encoder.clear_buffer(self.accumulation, 0);
        let extent = Extent3D::cube(self.resolution);
        for level in 0..self.mip_levels {
            encoder.clear_image_region(
                self.volume,
                level,
                Region3D::whole(extent.mip_level(level)),
                ClearValue::Color(LinearRgba::TRANSPARENT),
            );
        }
    }

    /// Records the three list walks and the commit into level 0.
    ///
    /// The caller must have made list-build writes visible first.
    pub fn resolve(&self, encoder: &mut dyn CommandEncoder, lists: &[AxisList; 3]) {
        encoder.bind_buffer(RESOLVE_UNIFORM, self.uniforms);
        encoder.bind_buffer(ACCUMULATION, self.accumulation);
        let walk_groups = groups(self.grid, RESOLVE_WORKGROUP);
        for list in lists {
            encoder.bind_buffer(RESOLVE_HEADS, list.heads);
            encoder.bind_buffer(RESOLVE_NODES, list.nodes);
            let mut pass = encoder.begin_compute_pass(Some("voxa_resolve"));
            pass.set_technique(&self.resolve);
            pass.dispatch(walk_groups, walk_groups, 1);
        }

        encoder.memory_barrier(BarrierScope::SHADER_STORAGE);

        encoder.bind_image(VOLUME_IMAGE, self.volume, 0);
        let commit_groups = groups(self.resolution, COMMIT_WORKGROUP);
        let mut pass = encoder.begin_compute_pass(Some("voxa_commit"));
        pass.set_technique(&self.commit);
        pass.dispatch(commit_groups, commit_groups, commit_groups);
    }

    /// Raw RGBA8 texels of `level`, x fastest. Blocks on the device.
    pub fn read_volume(&self, level: u32) -> Result<Vec<u8>, VoxelError> {
        Ok(self.device.read_texture(self.volume, level)?)
    }

    /// Packed premultiplied texels of the accumulation buffer. Blocks on the device.
    pub fn read_accumulation(&self) -> Result<Vec<u32>, VoxelError> {
        let bytes = self.device.read_buffer(self.accumulation)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Releases the volume and the resolve buffers.
    pub fn destroy(self) -> Result<(), VoxelError> {
        self.device.destroy_buffer(self.uniforms)?;
        self.device.destroy_buffer(self.accumulation)?;
        self.device.destroy_texture(self.volume)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_covers_partial_workgroups() {
        assert_eq!(groups(16, 8), 2);
        assert_eq!(groups(17, 8), 3);
        assert_eq!(groups(1, 4), 1);
    }
}
