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

//! Translation of recorded command lists into wgpu passes.

use super::conversions::IntoWgpu;
use super::device::{WgpuDeviceInternal, WgpuPipeline, WgpuResources};
use super::mipmap::MipmapGenerator;
use crate::graphics::texel;
use std::sync::Arc;
use voxa_core::math::Region3D;
use voxa_core::renderer::api::{
    BoundResource, BufferId, ChannelTable, ClearValue, Command, CommandList, RasterPassDescriptor,
    ResolvedBinding, Technique, TextureDimension, TextureId,
};
use voxa_core::renderer::{RenderError, ResourceError};
use wgpu::util::DeviceExt;

enum ActivePass {
    None,
    Render(wgpu::RenderPass<'static>),
    Compute(wgpu::ComputePass<'static>),
}

/// A resource kept alive while its bind group is built.
enum HeldBinding {
    Buffer(Arc<wgpu::Buffer>),
    View(wgpu::TextureView),
    Sampler(Arc<wgpu::Sampler>),
}

fn submission(message: &str) -> RenderError {
    RenderError::Submission(message.to_owned())
}

pub(crate) struct Translator<'a> {
    internal: &'a WgpuDeviceInternal,
    resources: &'a mut WgpuResources,
    encoder: &'a mut wgpu::CommandEncoder,
    channels: ChannelTable,
    pass: ActivePass,
    technique: Option<Technique>,
}

impl<'a> Translator<'a> {
    pub fn new(
        internal: &'a WgpuDeviceInternal,
        resources: &'a mut WgpuResources,
        encoder: &'a mut wgpu::CommandEncoder,
    ) -> Self {
        Self {
            internal,
            resources,
            encoder,
            channels: ChannelTable::new(),
            pass: ActivePass::None,
            technique: None,
        }
    }

    /// Records every command into the encoder. The caller submits it.
    pub fn run(mut self, commands: CommandList) -> Result<(), RenderError> {
        let label = commands.label().unwrap_or("unlabelled").to_owned();
        for command in commands {
            self.translate(command)?;
        }
        if !matches!(self.pass, ActivePass::None) {
            return Err(RenderError::Submission(format!(
                "command list '{label}' ended inside an open pass"
            )));
        }
        log::trace!("WgpuDevice: Translated command list '{label}'");
        Ok(())
    }

    fn device(&self) -> &wgpu::Device {
        &self.internal.context.device
    }

    fn require_closed(&self, what: &str) -> Result<(), RenderError> {
        match self.pass {
            ActivePass::None => Ok(()),
            _ => Err(RenderError::Submission(format!("{what} recorded inside a pass"))),
        }
    }

    fn translate(&mut self, command: Command) -> Result<(), RenderError> {
        match command {
            Command::ClearBuffer { buffer, value } => {
                self.require_closed("buffer clear")?;
                self.clear_buffer(buffer, value)?;
            }
            Command::ClearImageRegion {
                texture,
                mip_level,
                region,
                value,
            } => {
                self.require_closed("image clear")?;
                self.clear_region(texture, mip_level, region, value)?;
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
                // wgpu orders every write before the next pass starts.
                log::trace!("WgpuDevice: Barrier {scope:?} at pass boundary");
            }
            Command::BeginRasterPass(descriptor) => {
                self.require_closed("raster pass")?;
                self.begin_raster_pass(&descriptor)?;
            }
            Command::BeginComputePass { label } => {
                self.require_closed("compute pass")?;
                let pass = self
                    .encoder
                    .begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: label.as_deref(),
                        timestamp_writes: None,
                    })
                    .forget_lifetime();
                self.pass = ActivePass::Compute(pass);
            }
            Command::SetTechnique(technique) => {
                if matches!(self.pass, ActivePass::None) {
                    return Err(submission("technique set outside a pass"));
                }
                self.technique = Some(technique);
            }
            Command::SetVertexBuffer {
                slot,
                buffer,
                offset,
            } => {
                let entry = self
                    .resources
                    .buffers
                    .get(&buffer)
                    .ok_or(ResourceError::NotFound)?;
                let ActivePass::Render(pass) = &mut self.pass else {
                    return Err(submission("vertex buffer set outside a raster pass"));
                };
                pass.set_vertex_buffer(slot, entry.wgpu_buffer.slice(offset..));
            }
            Command::SetIndexBuffer {
                buffer,
                offset,
                format,
            } => {
                let entry = self
                    .resources
                    .buffers
                    .get(&buffer)
                    .ok_or(ResourceError::NotFound)?;
                let ActivePass::Render(pass) = &mut self.pass else {
                    return Err(submission("index buffer set outside a raster pass"));
                };
                pass.set_index_buffer(entry.wgpu_buffer.slice(offset..), format.into_wgpu());
            }
            Command::Draw {
                vertices,
                instances,
            } => {
                if self.prepare(false)? {
                    if let ActivePass::Render(pass) = &mut self.pass {
                        pass.draw(vertices, instances);
                    }
                }
            }
            Command::DrawIndexed {
                indices,
                base_vertex,
                instances,
            } => {
                if self.prepare(false)? {
                    if let ActivePass::Render(pass) = &mut self.pass {
                        pass.draw_indexed(indices, base_vertex, instances);
                    }
                }
            }
            Command::Dispatch { x, y, z } => {
                if self.prepare(true)? {
                    if let ActivePass::Compute(pass) = &mut self.pass {
                        pass.dispatch_workgroups(x, y, z);
                    }
                }
            }
            Command::EndPass => {
                if matches!(self.pass, ActivePass::None) {
                    return Err(submission("pass ended without being opened"));
                }
                // Dropping the pass ends it and unlocks the encoder.
                self.pass = ActivePass::None;
                self.technique = None;
            }
            Command::GenerateMipmaps(texture) => {
                self.require_closed("mipmap generation")?;
                self.generate_mipmaps(texture)?;
            }
        }
        Ok(())
    }

    fn clear_buffer(&mut self, buffer: BufferId, value: u32) -> Result<(), RenderError> {
        let entry = self
            .resources
            .buffers
            .get(&buffer)
            .ok_or(ResourceError::NotFound)?;
        let target = Arc::clone(&entry.wgpu_buffer);
        let size = entry.size;
        if value == 0 {
            self.encoder.clear_buffer(&target, 0, None);
            return Ok(());
        }
        let device = &self.internal.context.device;
        let pattern = self
            .resources
            .clear_patterns
            .entry((value, size))
            .or_insert_with(|| {
                let words = vec![value; (size / 4) as usize];
                Arc::new(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("voxa_clear_pattern"),
                    contents: bytemuck::cast_slice(&words),
                    usage: wgpu::BufferUsages::COPY_SRC,
                }))
            });
        self.encoder
            .copy_buffer_to_buffer(pattern.as_ref(), 0, &target, 0, size);
        Ok(())
    }

    fn clear_region(
        &mut self,
        texture: TextureId,
        mip_level: u32,
        region: Region3D,
        value: ClearValue,
    ) -> Result<(), RenderError> {
        let entry = self
            .resources
            .textures
            .get(&texture)
            .ok_or(ResourceError::NotFound)?;
        if mip_level >= entry.mip_level_count
            || !region.fits_within(entry.size.mip_level(mip_level))
        {
            return Err(ResourceError::OutOfBounds.into());
        }
        let extent = region.extent;
        if extent.volume() == 0 {
            return Ok(());
        }
        let pattern = texel::clear_pattern(entry.format, value)?;
        let row = pattern.repeat(extent.width as usize);
        let data = row.repeat((extent.height * extent.depth) as usize);

        // Buffer-to-texture copies at a non-zero depth offset are lost on some
        // GL drivers, so the clear goes through the queue. Work recorded so far
        // is submitted first to keep the command order.
        let texture = entry.wgpu_texture.clone();
        let fresh = self
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("voxa_after_image_clear"),
            });
        let recorded = std::mem::replace(&mut *self.encoder, fresh);
        let queue = &self.internal.context.queue;
        queue.submit(Some(recorded.finish()));
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level,
                origin: region.origin.into_wgpu(),
                aspect: wgpu::TextureAspect::All,
            },
            &data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(row.len() as u32),
                rows_per_image: Some(extent.height),
            },
            extent.into_wgpu(),
        );
        Ok(())
    }

    fn begin_raster_pass(&mut self, descriptor: &RasterPassDescriptor) -> Result<(), RenderError> {
        let color = self
            .resources
            .textures
            .get(&descriptor.color_target)
            .ok_or(ResourceError::NotFound)?;
        let color_view = color.wgpu_texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("voxa_color_target"),
            base_mip_level: 0,
            mip_level_count: Some(1),
            ..Default::default()
        });
        let depth_view = match descriptor.depth_target {
            Some(id) => {
                let depth = self
                    .resources
                    .textures
                    .get(&id)
                    .ok_or(ResourceError::NotFound)?;
                if !depth.format.is_depth() {
                    return Err(ResourceError::UnsupportedFormat(format!(
                        "depth attachment {id:?} has format {:?}",
                        depth.format
                    ))
                    .into());
                }
                Some(depth.wgpu_texture.create_view(&wgpu::TextureViewDescriptor::default()))
            }
            None => None,
        };

        let load = match descriptor.clear_color {
            Some(clear) => wgpu::LoadOp::Clear(clear.into_wgpu()),
            None => wgpu::LoadOp::Load,
        };
        let depth_load = match descriptor.clear_depth {
            Some(depth) => wgpu::LoadOp::Clear(depth),
            None => wgpu::LoadOp::Load,
        };
        let pass = self
            .encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: descriptor.label.as_deref(),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: depth_view.as_ref().map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: depth_load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            })
            .forget_lifetime();
        self.pass = ActivePass::Render(pass);
        Ok(())
    }

    /// Sets the pipeline and bind groups for the current technique.
    ///
    /// Returns `false` when the technique's bindings do not resolve, in which
    /// case the draw or dispatch is skipped.
    fn prepare(&mut self, compute: bool) -> Result<bool, RenderError> {
        let technique = self
            .technique
            .as_ref()
            .ok_or_else(|| submission("draw or dispatch without a technique"))?;
        let resources: &WgpuResources = self.resources;
        let program = resources
            .programs
            .get(&technique.program())
            .ok_or_else(|| {
                RenderError::Submission(format!(
                    "technique '{}' refers to an unknown program",
                    technique.label()
                ))
            })?;

        let resolved = match self.channels.resolve(technique) {
            Ok(resolved) => resolved,
            Err(e) => {
                log::error!("WgpuDevice: Skipping '{}': {e}", program.label);
                return Ok(false);
            }
        };
        let held = resolved
            .iter()
            .map(|binding| hold(resources, binding))
            .collect::<Result<Vec<_>, ResourceError>>()?;

        let device = &self.internal.context.device;
        let bind_groups: Vec<wgpu::BindGroup> = program
            .bind_group_layouts
            .iter()
            .enumerate()
            .map(|(group, layout)| {
                let entries: Vec<wgpu::BindGroupEntry> = resolved
                    .iter()
                    .zip(&held)
                    .filter(|(binding, _)| binding.resource.group == group as u32)
                    .map(|(binding, held)| wgpu::BindGroupEntry {
                        binding: binding.resource.binding,
                        resource: match held {
                            HeldBinding::Buffer(buffer) => buffer.as_entire_binding(),
                            HeldBinding::View(view) => wgpu::BindingResource::TextureView(view),
                            HeldBinding::Sampler(sampler) => wgpu::BindingResource::Sampler(sampler),
                        },
                    })
                    .collect();
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(program.label.as_str()),
                    layout,
                    entries: &entries,
                })
            })
            .collect();

        match (&mut self.pass, &program.pipeline) {
            (ActivePass::Render(pass), WgpuPipeline::Raster(pipeline)) if !compute => {
                pass.set_pipeline(pipeline);
                for (index, group) in bind_groups.iter().enumerate() {
                    pass.set_bind_group(index as u32, group, &[]);
                }
            }
            (ActivePass::Compute(pass), WgpuPipeline::Compute(pipeline)) if compute => {
                pass.set_pipeline(pipeline);
                for (index, group) in bind_groups.iter().enumerate() {
                    pass.set_bind_group(index as u32, group, &[]);
                }
            }
            _ => {
                return Err(RenderError::Submission(format!(
                    "technique '{}' does not match the open pass",
                    program.label
                )))
            }
        }
        Ok(true)
    }

    fn generate_mipmaps(&mut self, texture: TextureId) -> Result<(), RenderError> {
        let entry = self
            .resources
            .textures
            .get(&texture)
            .ok_or(ResourceError::NotFound)?;
        if entry.mip_level_count < 2 {
            return Ok(());
        }
        if !MipmapGenerator::supports(entry.format) {
            log::warn!(
                "WgpuDevice: Cannot generate mipmaps for texture {texture:?}: {:?} is not supported",
                entry.format
            );
            return Ok(());
        }
        self.internal.mipmaps.encode(
            &self.internal.context.device,
            self.encoder,
            &entry.wgpu_texture,
            entry.dimension,
            entry.size,
            entry.mip_level_count,
        );
        Ok(())
    }
}

fn hold(
    resources: &WgpuResources,
    binding: &ResolvedBinding<'_>,
) -> Result<HeldBinding, ResourceError> {
    match binding.bound {
        BoundResource::Buffer(id) => resources
            .buffers
            .get(&id)
            .map(|entry| HeldBinding::Buffer(Arc::clone(&entry.wgpu_buffer)))
            .ok_or(ResourceError::NotFound),
        BoundResource::Texture(id) => {
            let entry = resources.textures.get(&id).ok_or(ResourceError::NotFound)?;
            let dimension: wgpu::TextureViewDimension = entry.dimension.into_wgpu();
            Ok(HeldBinding::View(entry.wgpu_texture.create_view(
                &wgpu::TextureViewDescriptor {
                    label: Some(binding.resource.name.as_str()),
                    dimension: Some(dimension),
                    ..Default::default()
                },
            )))
        }
        BoundResource::Image { texture, mip_level } => {
            let entry = resources
                .textures
                .get(&texture)
                .ok_or(ResourceError::NotFound)?;
            if mip_level >= entry.mip_level_count {
                return Err(ResourceError::OutOfBounds);
            }
            let dimension = match entry.dimension {
                TextureDimension::D2 => wgpu::TextureViewDimension::D2,
                TextureDimension::D3 => wgpu::TextureViewDimension::D3,
            };
            Ok(HeldBinding::View(entry.wgpu_texture.create_view(
                &wgpu::TextureViewDescriptor {
                    label: Some(binding.resource.name.as_str()),
                    dimension: Some(dimension),
                    base_mip_level: mip_level,
                    mip_level_count: Some(1),
                    ..Default::default()
                },
            )))
        }
        BoundResource::Sampler(id) => resources
            .samplers
            .get(&id)
            .map(|sampler| HeldBinding::Sampler(Arc::clone(sampler)))
            .ok_or(ResourceError::NotFound),
    }
}
