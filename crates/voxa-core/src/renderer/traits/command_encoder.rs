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

use crate::math::Region3D;
use crate::renderer::api::command::{ClearValue, CommandList, RasterPassDescriptor};
use crate::renderer::api::technique::Technique;
use crate::renderer::api::{BarrierScope, BufferId, ChannelSlot, IndexFormat, SamplerId, TextureId};
use std::ops::Range;

/// A trait representing an active raster pass, used for recording drawing commands.
///
/// Dropping the pass ends it.
pub trait RasterPass {
    /// Sets the technique for subsequent draw calls.
    fn set_technique(&mut self, technique: &Technique);

    /// Binds a vertex buffer to a specific slot.
    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64);

    /// Binds an index buffer for indexed drawing.
    fn set_index_buffer(&mut self, buffer: BufferId, offset: u64, format: IndexFormat);

    /// Records a non-indexed draw call.
    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>);

    /// Records an indexed draw call.
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);
}

/// A trait representing an active compute pass, used for recording dispatch commands.
pub trait ComputePass {
    /// Sets the technique for subsequent dispatches.
    fn set_technique(&mut self, technique: &Technique);

    /// Records a dispatch of `x * y * z` workgroups.
    fn dispatch(&mut self, x: u32, y: u32, z: u32);
}

/// A trait for an object that records a sequence of GPU commands.
///
/// Passes borrow the encoder mutably, so channel binds, clears and barriers
/// can only be recorded between passes.
pub trait CommandEncoder {
    /// Fills every word of `buffer` with `value`.
    fn clear_buffer(&mut self, buffer: BufferId, value: u32);

    /// Fills `region` of one mip level with `value`.
    fn clear_image_region(
        &mut self,
        texture: TextureId,
        mip_level: u32,
        region: Region3D,
        value: ClearValue,
    );

    /// Places a buffer in a uniform, storage or counter channel.
    fn bind_buffer(&mut self, slot: ChannelSlot, buffer: BufferId);

    /// Places a texture in a sampled-texture channel.
    fn bind_texture(&mut self, slot: ChannelSlot, texture: TextureId);

    /// Places one mip level in a storage-image channel.
    fn bind_image(&mut self, slot: ChannelSlot, texture: TextureId, mip_level: u32);

    /// Places a sampler in a sampler channel.
    fn bind_sampler(&mut self, slot: ChannelSlot, sampler: SamplerId);

    /// Makes shader writes in `scope` visible to everything recorded after it.
    fn memory_barrier(&mut self, scope: BarrierScope);

    /// Begins a new raster pass.
    fn begin_raster_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RasterPassDescriptor,
    ) -> Box<dyn RasterPass + 'encoder>;

    /// Begins a new compute pass.
    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        label: Option<&str>,
    ) -> Box<dyn ComputePass + 'encoder>;

    /// Rebuilds mip levels above 0 of `texture` from level 0.
    fn generate_mipmaps(&mut self, texture: TextureId);

    /// Finalizes the command recording.
    fn finish(self: Box<Self>) -> CommandList;
}
