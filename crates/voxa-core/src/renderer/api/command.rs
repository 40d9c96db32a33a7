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

//! Recorded GPU commands.
//!
//! Encoders record into a [`CommandList`], which backends execute in order at
//! [`GraphicsDevice::submit`](crate::renderer::traits::GraphicsDevice::submit).

use super::binding::{BarrierScope, ChannelSlot};
use super::buffer::{BufferId, IndexFormat};
use super::technique::Technique;
use super::texture::{SamplerId, TextureId};
use crate::math::{LinearRgba, Region3D};
use crate::renderer::traits::{CommandEncoder, ComputePass, RasterPass};
use std::ops::Range;

/// The value an image clear fills texels with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// A colour, for normalized and float formats.
    Color(LinearRgba),
    /// A raw integer, for integer formats.
    Uint(u32),
}

/// Describes a raster pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterPassDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Colour attachment. The pass covers its full extent.
    pub color_target: TextureId,
    /// Clear the colour target to this value; `None` loads it.
    pub clear_color: Option<LinearRgba>,
    /// Depth attachment, if the technique tests or writes depth.
    pub depth_target: Option<TextureId>,
    /// Clear the depth target to this value; `None` loads it.
    pub clear_depth: Option<f32>,
}

impl RasterPassDescriptor {
    /// A pass over `color_target` that loads existing contents and has no depth.
    pub fn load(label: &str, color_target: TextureId) -> Self {
        Self {
            label: Some(label.to_owned()),
            color_target,
            clear_color: None,
            depth_target: None,
            clear_depth: None,
        }
    }
}

/// A single recorded command.
#[derive(Debug, Clone)]
pub enum Command {
    /// Fills every 32-bit word of a buffer with `value`.
    ClearBuffer {
        /// Target buffer.
        buffer: BufferId,
        /// Word value.
        value: u32,
    },
    /// Fills a region of one mip level.
    ClearImageRegion {
        /// Target texture.
        texture: TextureId,
        /// Mip level.
        mip_level: u32,
        /// Region in texels.
        region: Region3D,
        /// Fill value.
        value: ClearValue,
    },
    /// Places a buffer in a buffer channel.
    BindBuffer {
        /// Channel.
        slot: ChannelSlot,
        /// Buffer.
        buffer: BufferId,
    },
    /// Places a texture in a sampled-texture channel.
    BindTexture {
        /// Channel.
        slot: ChannelSlot,
        /// Texture.
        texture: TextureId,
    },
    /// Places one mip level of a texture in a storage-image channel.
    BindImage {
        /// Channel.
        slot: ChannelSlot,
        /// Texture.
        texture: TextureId,
        /// Mip level.
        mip_level: u32,
    },
    /// Places a sampler in a sampler channel.
    BindSampler {
        /// Channel.
        slot: ChannelSlot,
        /// Sampler.
        sampler: SamplerId,
    },
    /// Makes earlier shader writes in `scope` visible to later commands.
    MemoryBarrier(BarrierScope),
    /// Opens a raster pass.
    BeginRasterPass(RasterPassDescriptor),
    /// Opens a compute pass.
    BeginComputePass {
        /// Debug label.
        label: Option<String>,
    },
    /// Selects the technique for later draws or dispatches in the pass.
    SetTechnique(Technique),
    /// Binds a vertex buffer.
    SetVertexBuffer {
        /// Vertex buffer slot.
        slot: u32,
        /// Buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: u64,
    },
    /// Binds the index buffer.
    SetIndexBuffer {
        /// Buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: u64,
        /// Index width.
        format: IndexFormat,
    },
    /// Non-indexed draw.
    Draw {
        /// Vertex range.
        vertices: Range<u32>,
        /// Instance range.
        instances: Range<u32>,
    },
    /// Indexed draw.
    DrawIndexed {
        /// Index range.
        indices: Range<u32>,
        /// Added to each index before vertex fetch.
        base_vertex: i32,
        /// Instance range.
        instances: Range<u32>,
    },
    /// Compute dispatch, in workgroups.
    Dispatch {
        /// Workgroups along X.
        x: u32,
        /// Workgroups along Y.
        y: u32,
        /// Workgroups along Z.
        z: u32,
    },
    /// Closes the open pass.
    EndPass,
    /// Rebuilds every mip level above 0 from level 0.
    GenerateMipmaps(TextureId),
}

/// An ordered, immutable list of commands ready for submission.
#[derive(Debug, Clone, Default)]
pub struct CommandList {
    label: Option<String>,
    commands: Vec<Command>,
}

impl CommandList {
    /// Wraps commands recorded elsewhere. Backends validate the pass structure at submit.
    pub fn from_commands(label: Option<&str>, commands: Vec<Command>) -> Self {
        Self {
            label: label.map(str::to_owned),
            commands,
        }
    }

    /// Label given to the encoder that produced this list.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Commands in recorded order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl IntoIterator for CommandList {
    type Item = Command;
    type IntoIter = std::vec::IntoIter<Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}

/// The [`CommandEncoder`] every backend hands out. Recording is backend
/// independent; translation happens at submit.
#[derive(Debug, Default)]
pub struct RecordingEncoder {
    label: Option<String>,
    commands: Vec<Command>,
}

impl RecordingEncoder {
    /// Starts an empty recording.
    pub fn new(label: Option<&str>) -> Self {
        Self {
            label: label.map(str::to_owned),
            commands: Vec::new(),
        }
    }
}

impl CommandEncoder for RecordingEncoder {
    fn clear_buffer(&mut self, buffer: BufferId, value: u32) {
        self.commands.push(Command::ClearBuffer { buffer, value });
    }

    fn clear_image_region(
        &mut self,
        texture: TextureId,
        mip_level: u32,
        region: Region3D,
        value: ClearValue,
    ) {
        self.commands.push(Command::ClearImageRegion {
            texture,
            mip_level,
            region,
            value,
        });
    }

    fn bind_buffer(&mut self, slot: ChannelSlot, buffer: BufferId) {
        self.commands.push(Command::BindBuffer { slot, buffer });
    }

    fn bind_texture(&mut self, slot: ChannelSlot, texture: TextureId) {
        self.commands.push(Command::BindTexture { slot, texture });
    }

    fn bind_image(&mut self, slot: ChannelSlot, texture: TextureId, mip_level: u32) {
        self.commands.push(Command::BindImage {
            slot,
            texture,
            mip_level,
        });
    }

    fn bind_sampler(&mut self, slot: ChannelSlot, sampler: SamplerId) {
        self.commands.push(Command::BindSampler { slot, sampler });
    }

    fn memory_barrier(&mut self, scope: BarrierScope) {
        self.commands.push(Command::MemoryBarrier(scope));
    }

    fn begin_raster_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RasterPassDescriptor,
    ) -> Box<dyn RasterPass + 'encoder> {
        self.commands
            .push(Command::BeginRasterPass(descriptor.clone()));
        Box::new(RecordingPass {
            commands: &mut self.commands,
        })
    }

    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        label: Option<&str>,
    ) -> Box<dyn ComputePass + 'encoder> {
        self.commands.push(Command::BeginComputePass {
            label: label.map(str::to_owned),
        });
        Box::new(RecordingPass {
            commands: &mut self.commands,
        })
    }

    fn generate_mipmaps(&mut self, texture: TextureId) {
        self.commands.push(Command::GenerateMipmaps(texture));
    }

    fn finish(self: Box<Self>) -> CommandList {
        CommandList {
            label: self.label,
            commands: self.commands,
        }
    }
}

/// An open pass. Dropping it records [`Command::EndPass`].
struct RecordingPass<'encoder> {
    commands: &'encoder mut Vec<Command>,
}

impl RasterPass for RecordingPass<'_> {
    fn set_technique(&mut self, technique: &Technique) {
        self.commands.push(Command::SetTechnique(technique.clone()));
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64) {
        self.commands.push(Command::SetVertexBuffer {
            slot,
            buffer,
            offset,
        });
    }

    fn set_index_buffer(&mut self, buffer: BufferId, offset: u64, format: IndexFormat) {
        self.commands.push(Command::SetIndexBuffer {
            buffer,
            offset,
            format,
        });
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.commands.push(Command::Draw {
            vertices,
            instances,
        });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.commands.push(Command::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
    }
}

impl ComputePass for RecordingPass<'_> {
    fn set_technique(&mut self, technique: &Technique) {
        self.commands.push(Command::SetTechnique(technique.clone()));
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.commands.push(Command::Dispatch { x, y, z });
    }
}

impl Drop for RecordingPass<'_> {
    fn drop(&mut self) {
        self.commands.push(Command::EndPass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Extent3D;
    use crate::renderer::api::binding::ResourceKind;

    #[test]
    fn test_dropping_a_pass_closes_it() {
        let mut encoder = Box::new(RecordingEncoder::new(Some("frame")));
        encoder.clear_buffer(BufferId(0), 1);
        {
            let mut pass = encoder.begin_compute_pass(Some("resolve"));
            pass.dispatch(4, 4, 1);
        }
        encoder.memory_barrier(BarrierScope::SHADER_STORAGE);
        let list = encoder.finish();

        assert_eq!(list.label(), Some("frame"));
        assert_eq!(list.len(), 5);
        assert!(matches!(list.commands()[0], Command::ClearBuffer { value: 1, .. }));
        assert!(matches!(list.commands()[1], Command::BeginComputePass { .. }));
        assert!(matches!(list.commands()[3], Command::EndPass));
        assert!(matches!(
            list.commands()[4],
            Command::MemoryBarrier(scope) if scope == BarrierScope::SHADER_STORAGE
        ));
    }

    #[test]
    fn test_binds_and_clears_record_in_order() {
        let mut encoder = Box::new(RecordingEncoder::new(None));
        let slot = ChannelSlot::new(ResourceKind::StorageImage, 0);
        encoder.clear_image_region(
            TextureId(3),
            0,
            Region3D::whole(Extent3D::cube(8)),
            ClearValue::Uint(0),
        );
        encoder.bind_image(slot, TextureId(3), 0);
        encoder.generate_mipmaps(TextureId(3));
        let commands: Vec<Command> = encoder.finish().into_iter().collect();
        assert!(matches!(commands[1], Command::BindImage { mip_level: 0, .. }));
        assert!(matches!(commands[2], Command::GenerateMipmaps(TextureId(3))));
    }
}
