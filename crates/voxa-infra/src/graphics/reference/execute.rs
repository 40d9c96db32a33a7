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

//! In-order execution of a recorded command list.

use super::bindings::HostBindings;
use super::device::ReferenceProgram;
use super::memory::{Layered, ResourceStore, TextureEntry};
use super::raster::{self, DrawCall, DrawState};
use crate::graphics::texel;
use std::collections::HashMap;
use std::ops::Range;
use voxa_core::math::{Region3D, Vec4};
use voxa_core::renderer::api::{
    BarrierScope, BoundResource, BufferId, ChannelTable, ClearValue, Command, CommandList,
    IndexFormat, ProgramId, RasterPassDescriptor, Technique, TextureDimension, TextureId,
};
use voxa_core::renderer::{RenderError, ResourceError};

/// Counters collected while executing one submission.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExecutionStats {
    pub draws: u32,
    pub dispatches: u32,
    pub skipped: u32,
    pub fragments: u64,
    pub barriers: u32,
}

#[derive(Debug)]
enum Pass {
    Closed,
    Raster(RasterPassDescriptor),
    Compute,
}

pub(crate) struct Executor<'a> {
    store: &'a mut ResourceStore,
    programs: &'a HashMap<ProgramId, ReferenceProgram>,
    channels: ChannelTable,
    pass: Pass,
    technique: Option<Technique>,
    vertex_buffer: Option<(BufferId, u64)>,
    index_buffer: Option<(BufferId, u64, IndexFormat)>,
    stats: ExecutionStats,
}

fn submission(message: &str) -> RenderError {
    RenderError::Submission(message.to_owned())
}

impl<'a> Executor<'a> {
    pub fn new(
        store: &'a mut ResourceStore,
        programs: &'a HashMap<ProgramId, ReferenceProgram>,
    ) -> Self {
        Self {
            store,
            programs,
            channels: ChannelTable::new(),
            pass: Pass::Closed,
            technique: None,
            vertex_buffer: None,
            index_buffer: None,
            stats: ExecutionStats::default(),
        }
    }

    /// Runs every command, then publishes all outstanding writes.
    pub fn run(mut self, commands: CommandList) -> Result<ExecutionStats, RenderError> {
        let label = commands.label().unwrap_or("unlabelled").to_owned();
        for command in commands {
            self.execute(command)?;
        }
        if !matches!(self.pass, Pass::Closed) {
            return Err(RenderError::Submission(format!(
                "command list '{label}' ended inside an open pass"
            )));
        }
        self.store.publish(BarrierScope::ALL);
        log::trace!("ReferenceDevice: Executed '{label}': {:?}", self.stats);
        Ok(self.stats)
    }

    fn require_closed(&self, what: &str) -> Result<(), RenderError> {
        match self.pass {
            Pass::Closed => Ok(()),
            _ => Err(RenderError::Submission(format!("{what} recorded inside a pass"))),
        }
    }

    fn execute(&mut self, command: Command) -> Result<(), RenderError> {
        match command {
            Command::ClearBuffer { buffer, value } => {
                self.require_closed("buffer clear")?;
                self.store
                    .buffer_mut(buffer)?
                    .memory
                    .fill_through(&value.to_le_bytes());
            }
            Command::ClearImageRegion {
                texture,
                mip_level,
                region,
                value,
            } => {
                self.require_closed("image clear")?;
                clear_region(self.store.texture_mut(texture)?, mip_level, region, value)?;
            }
            Command::BindBuffer { slot, buffer } => {
                self.channels.bind(slot, BoundResource::Buffer(buffer));
            }
            Command::BindTexture { slot, texture } => {
                self.channels.bind(slot, BoundResource::Texture(texture));
            }
            Command::BindImage {
                slot,
                texture,
                mip_level,
            } => {
                self.channels
                    .bind(slot, BoundResource::Image { texture, mip_level });
            }
            Command::BindSampler { slot, sampler } => {
                self.channels.bind(slot, BoundResource::Sampler(sampler));
            }
            Command::MemoryBarrier(scope) => {
                self.require_closed("memory barrier")?;
                let published = self.store.publish(scope);
                self.stats.barriers += 1;
                log::trace!("ReferenceDevice: Barrier {scope:?} published {published} blocks");
            }
            Command::BeginRasterPass(descriptor) => {
                self.require_closed("raster pass")?;
                self.begin_raster_pass(&descriptor)?;
                self.pass = Pass::Raster(descriptor);
            }
            Command::BeginComputePass { .. } => {
                self.require_closed("compute pass")?;
                self.pass = Pass::Compute;
            }
            Command::SetTechnique(technique) => {
                if matches!(self.pass, Pass::Closed) {
                    return Err(submission("technique set outside a pass"));
                }
                self.technique = Some(technique);
            }
            Command::SetVertexBuffer {
                slot,
                buffer,
                offset,
            } => {
                if slot == 0 {
                    self.vertex_buffer = Some((buffer, offset));
                } else {
                    log::warn!("ReferenceDevice: Ignoring vertex buffer in slot {slot}");
                }
            }
            Command::SetIndexBuffer {
                buffer,
                offset,
                format,
            } => {
                self.index_buffer = Some((buffer, offset, format));
            }
            Command::Draw {
                vertices,
                instances,
            } => self.draw(DrawCall::Vertices(vertices), instances)?,
            Command::DrawIndexed {
                indices,
                base_vertex,
                instances,
            } => self.draw(
                DrawCall::Indexed {
                    indices,
                    base_vertex,
                },
                instances,
            )?,
            Command::Dispatch { x, y, z } => self.dispatch([x, y, z])?,
            Command::EndPass => {
                if matches!(self.pass, Pass::Closed) {
                    return Err(submission("pass ended without being opened"));
                }
                self.pass = Pass::Closed;
                self.technique = None;
                self.vertex_buffer = None;
                self.index_buffer = None;
            }
            Command::GenerateMipmaps(texture) => {
                self.require_closed("mipmap generation")?;
                generate_mipmaps(self.store.texture_mut(texture)?, texture);
            }
        }
        Ok(())
    }

    fn begin_raster_pass(&mut self, descriptor: &RasterPassDescriptor) -> Result<(), RenderError> {
        if let Some(color) = descriptor.clear_color {
            let target = self.store.texture_mut(descriptor.color_target)?;
            let pattern = texel::clear_pattern(target.format, ClearValue::Color(color))?;
            target.level_mut(0)?.fill_through(&pattern);
        }
        if let (Some(depth), Some(target)) = (descriptor.clear_depth, descriptor.depth_target) {
            let target = self.store.texture_mut(target)?;
            if !target.format.is_depth() {
                return Err(ResourceError::UnsupportedFormat(format!(
                    "depth attachment '{}' has format {:?}",
                    target.label, target.format
                ))
                .into());
            }
            target.level_mut(0)?.fill_through(&depth.to_le_bytes());
        }
        Ok(())
    }

    fn draw(&mut self, call: DrawCall, instances: Range<u32>) -> Result<(), RenderError> {
        let Pass::Raster(pass) = &self.pass else {
            return Err(submission("draw outside a raster pass"));
        };
        let technique = self
            .technique
            .as_ref()
            .ok_or_else(|| submission("draw without a technique"))?;
        let program = program_for(self.programs, technique)?;
        if program.is_compute {
            return Err(RenderError::Submission(format!(
                "compute technique '{}' used in a raster pass",
                program.label
            )));
        }
        let resolved = match self.channels.resolve(technique) {
            Ok(resolved) => resolved,
            Err(e) => {
                log::error!("ReferenceDevice: Skipping draw: {e}");
                self.stats.skipped += 1;
                return Ok(());
            }
        };

        let state = DrawState {
            program,
            pass,
            vertex_buffer: self.vertex_buffer,
            index_buffer: self.index_buffer,
        };
        let mut bindings = HostBindings::new(technique.label(), &resolved, &mut *self.store);
        let fragments = raster::draw(&state, &call, instances, &mut bindings)?;
        self.stats.draws += 1;
        self.stats.fragments += fragments;
        Ok(())
    }

    fn dispatch(&mut self, groups: [u32; 3]) -> Result<(), RenderError> {
        if !matches!(self.pass, Pass::Compute) {
            return Err(submission("dispatch outside a compute pass"));
        }
        let technique = self
            .technique
            .clone()
            .ok_or_else(|| submission("dispatch without a technique"))?;
        let program = program_for(self.programs, &technique)?;
        if !program.is_compute {
            return Err(RenderError::Submission(format!(
                "raster technique '{}' used in a compute pass",
                program.label
            )));
        }
        let resolved = match self.channels.resolve(&technique) {
            Ok(resolved) => resolved,
            Err(e) => {
                log::error!("ReferenceDevice: Skipping dispatch: {e}");
                self.stats.skipped += 1;
                return Ok(());
            }
        };

        let size = program.workgroup_size;
        let mut bindings = HostBindings::new(technique.label(), &resolved, &mut *self.store);
        for gz in 0..groups[2] {
            for gy in 0..groups[1] {
                for gx in 0..groups[0] {
                    for lz in 0..size[2] {
                        for ly in 0..size[1] {
                            for lx in 0..size[0] {
                                let id = [
                                    gx * size[0] + lx,
                                    gy * size[1] + ly,
                                    gz * size[2] + lz,
                                ];
                                program.kernel.compute(id, &mut bindings)?;
                            }
                        }
                    }
                }
            }
        }
        self.stats.dispatches += 1;
        Ok(())
    }
}

fn program_for<'p>(
    programs: &'p HashMap<ProgramId, ReferenceProgram>,
    technique: &Technique,
) -> Result<&'p ReferenceProgram, RenderError> {
    programs.get(&technique.program()).ok_or_else(|| {
        RenderError::Submission(format!(
            "technique '{}' refers to an unknown program",
            technique.label()
        ))
    })
}

fn clear_region(
    texture: &mut TextureEntry,
    level: u32,
    region: Region3D,
    value: ClearValue,
) -> Result<(), RenderError> {
    if !region.fits_within(texture.level_extent(level)) {
        return Err(ResourceError::OutOfBounds.into());
    }
    let pattern = texel::clear_pattern(texture.format, value)?;
    let origin = region.origin;
    let extent = region.extent;
    for z in origin.z..origin.z + extent.depth {
        for y in origin.y..origin.y + extent.height {
            for x in origin.x..origin.x + extent.width {
                let offset = texture
                    .texel_offset(level, [x, y, z])
                    .ok_or(ResourceError::OutOfBounds)?;
                texture.level_mut(level)?.write_through(offset, &pattern)?;
            }
        }
    }
    Ok(())
}

/// Box-filters each level from the visible contents of the level above it.
fn generate_mipmaps(texture: &mut TextureEntry, id: TextureId) {
    for level in 1..texture.levels.len() as u32 {
        match downsample(texture, level) {
            Ok(memory) => texture.levels[level as usize] = memory,
            Err(e) => {
                log::warn!(
                    "ReferenceDevice: Cannot generate mipmaps for texture {id:?} ('{}'): {e}",
                    texture.label
                );
                return;
            }
        }
    }
}

fn downsample(texture: &TextureEntry, level: u32) -> Result<Layered, ResourceError> {
    let src = texture.level_extent(level - 1);
    let dst = texture.level_extent(level);
    let size = texture.format.bytes_per_texel() as usize;
    let depth_taps = match texture.dimension {
        TextureDimension::D2 => 1,
        TextureDimension::D3 => 2,
    };
    let fetch = |x: u32, y: u32, z: u32| -> Result<Vec4, ResourceError> {
        let coord = [
            x.min(src.width - 1),
            y.min(src.height - 1),
            z.min(src.depth - 1),
        ];
        let offset = texture
            .texel_offset(level - 1, coord)
            .ok_or(ResourceError::OutOfBounds)?;
        texel::decode(
            texture.format,
            texture.level(level - 1)?.visible_bytes(offset, size)?,
        )
    };

    let mut out = Layered::zeroed(dst.volume() as usize * size);
    for z in 0..dst.depth {
        for y in 0..dst.height {
            for x in 0..dst.width {
                let mut sum = Vec4::ZERO;
                let mut taps = 0.0;
                for dz in 0..depth_taps {
                    for dy in 0..2 {
                        for dx in 0..2 {
                            sum = sum + fetch(2 * x + dx, 2 * y + dy, 2 * z + dz)?;
                            taps += 1.0;
                        }
                    }
                }
                let offset = texture
                    .texel_offset(level, [x, y, z])
                    .ok_or(ResourceError::OutOfBounds)?;
                out.write_through(offset, &texel::encode(texture.format, sum / taps)?)?;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxa_core::math::Extent3D;
    use voxa_core::renderer::api::TextureFormat;

    #[test]
    fn test_mipmaps_average_visible_texels() {
        let mut texture = TextureEntry::new(
            "volume".into(),
            Extent3D::cube(2),
            TextureDimension::D3,
            TextureFormat::Rgba8Unorm,
            2,
        );
        let offset = texture.texel_offset(0, [0, 0, 0]).unwrap();
        texture
            .level_mut(0)
            .unwrap()
            .write_through(offset, &[255, 0, 0, 255])
            .unwrap();
        generate_mipmaps(&mut texture, TextureId(0));
        // One of eight texels is opaque red: 255 / 8 rounds to 32.
        assert_eq!(texture.level(1).unwrap().visible(), &[32, 0, 0, 32]);
    }

    #[test]
    fn test_unsupported_formats_leave_levels_untouched() {
        let mut texture = TextureEntry::new(
            "half".into(),
            Extent3D::cube(2),
            TextureDimension::D3,
            TextureFormat::Rgba16Float,
            2,
        );
        generate_mipmaps(&mut texture, TextureId(1));
        assert!(texture.level(1).unwrap().visible().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_region_clear_only_touches_the_region() {
        let mut texture = TextureEntry::new(
            "image".into(),
            Extent3D::new(4, 1, 1),
            TextureDimension::D2,
            TextureFormat::R32Uint,
            1,
        );
        let region = Region3D {
            origin: voxa_core::math::Origin3D { x: 1, y: 0, z: 0 },
            extent: Extent3D::new(2, 1, 1),
        };
        clear_region(&mut texture, 0, region, ClearValue::Uint(9)).unwrap();
        let level = texture.level(0).unwrap();
        let words: Vec<u32> = (0..4).map(|i| level.load_word(i).unwrap()).collect();
        assert_eq!(words, [0, 9, 9, 0]);
    }
}
