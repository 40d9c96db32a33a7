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

use super::context::WgpuGraphicsContext;
use super::conversions::IntoWgpu;
use super::mipmap::MipmapGenerator;
use super::submit::Translator;
use crate::graphics::naga::{link_technique, LinkedProgram, LinkedResource, NameConvention};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use voxa_core::math::{Extent3D, Origin3D};
use voxa_core::renderer::api::{
    AdapterInfo, AddressMode, BufferDescriptor, BufferId, CommandList, DeviceLimits,
    GraphicsBackendType, ProgramId, RecordingEncoder, ResourceKind, SamplerDescriptor, SamplerId,
    ShaderStage, StorageAccess, TechniqueDescriptor, TextureDescriptor, TextureDimension,
    TextureFormat, TextureId, UnboundTechnique,
};
use voxa_core::renderer::reflection::{ElementType, ScalarType};
use voxa_core::renderer::{
    CommandEncoder, GraphicsDevice, RenderError, ResourceError, ShaderError, TechniqueCompiler,
};

/// Rows of texel copies must be padded to this many bytes.
const COPY_ROW_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

#[derive(Debug)]
pub(crate) struct WgpuBufferEntry {
    pub(crate) wgpu_buffer: Arc<wgpu::Buffer>,
    pub(crate) size: u64,
}

#[derive(Debug)]
pub(crate) struct WgpuTextureEntry {
    pub(crate) wgpu_texture: Arc<wgpu::Texture>,
    pub(crate) size: Extent3D,
    pub(crate) dimension: TextureDimension,
    pub(crate) format: TextureFormat,
    pub(crate) mip_level_count: u32,
}

#[derive(Debug)]
pub(crate) enum WgpuPipeline {
    Raster(wgpu::RenderPipeline),
    Compute(wgpu::ComputePipeline),
}

#[derive(Debug)]
pub(crate) struct WgpuProgramEntry {
    pub(crate) label: String,
    pub(crate) pipeline: WgpuPipeline,
    /// One layout per bind group index, including empty groups.
    pub(crate) bind_group_layouts: Vec<wgpu::BindGroupLayout>,
}

/// Every resource the device owns, locked as a whole during submission.
#[derive(Debug, Default)]
pub(crate) struct WgpuResources {
    pub(crate) buffers: HashMap<BufferId, WgpuBufferEntry>,
    pub(crate) textures: HashMap<TextureId, WgpuTextureEntry>,
    pub(crate) samplers: HashMap<SamplerId, Arc<wgpu::Sampler>>,
    pub(crate) programs: HashMap<ProgramId, WgpuProgramEntry>,
    /// Pre-filled staging buffers for non-zero buffer clears, by `(value, size)`.
    pub(crate) clear_patterns: HashMap<(u32, u64), Arc<wgpu::Buffer>>,
}

/// The internal, non-clonable state of the WgpuDevice.
#[derive(Debug)]
pub(crate) struct WgpuDeviceInternal {
    pub(crate) context: WgpuGraphicsContext,
    pub(crate) resources: Mutex<WgpuResources>,
    pub(crate) mipmaps: MipmapGenerator,
    next_id: AtomicUsize,
}

/// A [`GraphicsDevice`] and [`TechniqueCompiler`] on top of wgpu.
///
/// Command lists are translated into wgpu passes at submit. Channel binds
/// become bind groups built from each technique's reflection at draw time.
/// Passes are the synchronization boundary on wgpu, so a memory barrier only
/// has to sit between passes, which the encoder already guarantees.
#[derive(Debug, Clone)]
pub struct WgpuDevice {
    internal: Arc<WgpuDeviceInternal>,
}

/// Maps an error captured around an allocation onto [`ResourceError`].
fn allocation_result(
    error: Option<wgpu::Error>,
    requested: u64,
    limit: u64,
) -> Result<(), ResourceError> {
    match error {
        None => Ok(()),
        Some(wgpu::Error::OutOfMemory { source }) => {
            log::error!("WgpuDevice: Allocation of {requested} bytes failed: {source}");
            Err(ResourceError::OutOfMemory { requested, limit })
        }
        Some(other) => Err(ResourceError::BackendError(other.to_string())),
    }
}

fn padded_row(bytes: u32) -> u32 {
    bytes.div_ceil(COPY_ROW_ALIGNMENT) * COPY_ROW_ALIGNMENT
}

impl WgpuDevice {
    /// Wraps an initialized context.
    pub fn new(context: WgpuGraphicsContext) -> Self {
        let mipmaps = MipmapGenerator::new(&context.device);
        Self {
            internal: Arc::new(WgpuDeviceInternal {
                context,
                resources: Mutex::new(WgpuResources::default()),
                mipmaps,
                next_id: AtomicUsize::new(0),
            }),
        }
    }

    /// Creates a device on a fresh headless context.
    pub fn new_headless() -> anyhow::Result<Self> {
        Ok(Self::new(WgpuGraphicsContext::new_headless_blocking()?))
    }

    /// The underlying context, for interop with a windowing layer.
    pub fn context(&self) -> &WgpuGraphicsContext {
        &self.internal.context
    }

    /// Retrieves the internal WGPU texture, e.g. to present it.
    pub fn get_wgpu_texture(&self, id: TextureId) -> Option<Arc<wgpu::Texture>> {
        let resources = self.internal.resources.lock().ok()?;
        resources
            .textures
            .get(&id)
            .map(|entry| Arc::clone(&entry.wgpu_texture))
    }

    fn next_id(&self) -> usize {
        self.internal.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn resources(&self, what: &str) -> Result<MutexGuard<'_, WgpuResources>, ResourceError> {
        self.internal
            .resources
            .lock()
            .map_err(|e| ResourceError::BackendError(format!("Mutex poisoned ({what}): {e}")))
    }

    fn device(&self) -> &wgpu::Device {
        &self.internal.context.device
    }

    fn queue(&self) -> &wgpu::Queue {
        &self.internal.context.queue
    }

    /// Submits a copy into a mappable staging buffer and blocks until it is readable.
    fn read_back(
        &self,
        size: u64,
        record: impl FnOnce(&mut wgpu::CommandEncoder, &wgpu::Buffer),
    ) -> Result<Vec<u8>, ResourceError> {
        let staging = self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("voxa_readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("voxa_readback"),
            });
        record(&mut encoder, &staging);
        self.queue().submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device()
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| ResourceError::BackendError(format!("Device poll failed: {e:?}")))?;
        receiver
            .recv()
            .map_err(|e| ResourceError::BackendError(format!("Readback channel closed: {e}")))?
            .map_err(|e| ResourceError::BackendError(format!("WGPU map_async failed: {e:?}")))?;

        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(bytes)
    }

    fn create_program(
        &self,
        descriptor: &TechniqueDescriptor,
        linked: &LinkedProgram,
    ) -> Result<WgpuProgramEntry, ShaderError> {
        let device = self.device();
        let link_error = |details: String| ShaderError::Link {
            label: descriptor.label.clone(),
            details,
        };

        let group_count = linked
            .resources
            .iter()
            .map(|r| r.record.group + 1)
            .max()
            .unwrap_or(0);
        let mut bind_group_layouts = Vec::with_capacity(group_count as usize);
        for group in 0..group_count {
            let entries = linked
                .resources
                .iter()
                .filter(|r| r.record.group == group)
                .map(layout_entry)
                .collect::<Result<Vec<_>, String>>()
                .map_err(link_error)?;
            bind_group_layouts.push(device.create_bind_group_layout(
                &wgpu::BindGroupLayoutDescriptor {
                    label: Some(format!("{}_group{group}", descriptor.label).as_str()),
                    entries: &entries,
                },
            ));
        }
        let layout_refs: Vec<Option<&wgpu::BindGroupLayout>> = bind_group_layouts.iter().map(Some).collect();
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(format!("{}_Layout", descriptor.label).as_str()),
            bind_group_layouts: &layout_refs,
            immediate_size: 0,
        });

        let modules: Vec<(ShaderStage, wgpu::ShaderModule, &str)> = linked
            .stages
            .iter()
            .map(|stage| {
                let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(descriptor.label.as_str()),
                    source: wgpu::ShaderSource::Wgsl(stage.source.clone()),
                });
                (stage.stage, module, stage.entry_point.as_str())
            })
            .collect();
        let module_for = |wanted: ShaderStage| {
            modules
                .iter()
                .find(|(stage, _, _)| *stage == wanted)
                .map(|(_, module, entry)| (module, *entry))
        };

        let pipeline = if descriptor.is_compute() {
            let (module, entry) = module_for(ShaderStage::Compute)
                .ok_or_else(|| link_error("compute stage missing".to_owned()))?;
            WgpuPipeline::Compute(device.create_compute_pipeline(
                &wgpu::ComputePipelineDescriptor {
                    label: Some(descriptor.label.as_str()),
                    layout: Some(&pipeline_layout),
                    module,
                    entry_point: Some(entry),
                    compilation_options: Default::default(),
                    cache: None,
                },
            ))
        } else {
            let (vs_module, vs_entry) = module_for(ShaderStage::Vertex)
                .ok_or_else(|| link_error("vertex stage missing".to_owned()))?;
            let (fs_module, fs_entry) = module_for(ShaderStage::Fragment)
                .ok_or_else(|| link_error("fragment stage missing".to_owned()))?;
            let color_format = descriptor
                .color_format
                .ok_or_else(|| link_error("raster technique has no colour format".to_owned()))?;

            let attributes: Vec<wgpu::VertexAttribute> = descriptor
                .vertex_layout
                .iter()
                .flat_map(|layout| layout.attributes.iter())
                .map(|a| wgpu::VertexAttribute {
                    format: a.format.into_wgpu(),
                    offset: a.offset,
                    shader_location: a.shader_location,
                })
                .collect();
            let vertex_buffers: Vec<wgpu::VertexBufferLayout> = descriptor
                .vertex_layout
                .iter()
                .map(|layout| wgpu::VertexBufferLayout {
                    array_stride: layout.array_stride,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                })
                .collect();

            let raster = descriptor.raster;
            let color_targets = [Some(wgpu::ColorTargetState {
                format: color_format.into_wgpu(),
                blend: raster.blend.map(IntoWgpu::into_wgpu),
                write_mask: raster.color_writes.into_wgpu(),
            })];
            let depth_stencil = raster.depth.map(|depth| wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: Some(depth.write_enabled),
                depth_compare: Some(depth.compare.into_wgpu()),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            });

            WgpuPipeline::Raster(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(descriptor.label.as_str()),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: vs_module,
                    entry_point: Some(vs_entry),
                    buffers: &vertex_buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: fs_module,
                    entry_point: Some(fs_entry),
                    targets: &color_targets,
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: raster.front_face.into_wgpu(),
                    cull_mode: raster.cull_mode.into_wgpu(),
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            }))
        };

        Ok(WgpuProgramEntry {
            label: descriptor.label.clone(),
            pipeline,
            bind_group_layouts,
        })
    }
}

fn texture_view_dimension(dimension: TextureDimension) -> wgpu::TextureViewDimension {
    dimension.into_wgpu()
}

fn layout_entry(resource: &LinkedResource) -> Result<wgpu::BindGroupLayoutEntry, String> {
    let record = &resource.record;
    let ty = match (record.kind, &record.element) {
        (ResourceKind::UniformBuffer, _) => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        (ResourceKind::StorageBuffer | ResourceKind::AtomicCounter, _) => {
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage {
                    read_only: !record.writable,
                },
                has_dynamic_offset: false,
                min_binding_size: None,
            }
        }
        (ResourceKind::SampledTexture, ElementType::Texture { dimension, sample }) => {
            wgpu::BindingType::Texture {
                sample_type: match sample {
                    ScalarType::F32 => wgpu::TextureSampleType::Float { filterable: true },
                    ScalarType::U32 => wgpu::TextureSampleType::Uint,
                    ScalarType::I32 => wgpu::TextureSampleType::Sint,
                    ScalarType::Bool => return Err(format!("'{}' samples bools", resource.name)),
                },
                view_dimension: texture_view_dimension(*dimension),
                multisampled: false,
            }
        }
        (
            ResourceKind::StorageImage,
            ElementType::Image {
                dimension,
                format,
                access,
            },
        ) => {
            let format = format.ok_or_else(|| {
                format!("storage image '{}' has an unsupported format", resource.name)
            })?;
            let access = if access.contains(StorageAccess::LOAD | StorageAccess::STORE) {
                wgpu::StorageTextureAccess::ReadWrite
            } else if access.contains(StorageAccess::STORE) {
                wgpu::StorageTextureAccess::WriteOnly
            } else {
                wgpu::StorageTextureAccess::ReadOnly
            };
            wgpu::BindingType::StorageTexture {
                access,
                format: format.into_wgpu(),
                view_dimension: texture_view_dimension(*dimension),
            }
        }
        (ResourceKind::Sampler, ElementType::Sampler { comparison }) => {
            wgpu::BindingType::Sampler(if *comparison {
                wgpu::SamplerBindingType::Comparison
            } else {
                wgpu::SamplerBindingType::Filtering
            })
        }
        (kind, element) => {
            return Err(format!(
                "'{}' of kind {kind:?} cannot be bound as {element:?}",
                resource.name
            ))
        }
    };
    Ok(wgpu::BindGroupLayoutEntry {
        binding: record.binding,
        visibility: record.stages.into_wgpu(),
        ty,
        count: None,
    })
}

impl GraphicsDevice for WgpuDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let limits = self.limits();
        if descriptor.size > limits.max_buffer_size {
            return Err(ResourceError::OutOfMemory {
                requested: descriptor.size,
                limit: limits.max_buffer_size,
            });
        }
        // Copies and clears work on whole words.
        let size =
            descriptor.size.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT;
        let mut usage: wgpu::BufferUsages = descriptor.usage.into_wgpu();
        // Mappable buffers may only pair with a single copy direction.
        if !usage.intersects(wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::MAP_WRITE) {
            usage |= wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST;
        }
        let scope = self.device().push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let wgpu_buffer = self.device().create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size,
            usage,
            mapped_at_creation: false,
        });
        allocation_result(pollster::block_on(scope.pop()), size, limits.max_buffer_size)?;
        let id = BufferId(self.next_id());
        self.resources("buffers")?.buffers.insert(
            id,
            WgpuBufferEntry {
                wgpu_buffer: Arc::new(wgpu_buffer),
                size,
            },
        );
        log::info!(
            "WgpuDevice: Created buffer '{:?}' with ID: {:?}, size: {} bytes",
            descriptor.label.as_deref().unwrap_or("Unnamed"),
            id,
            size
        );
        Ok(id)
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        let id = self.create_buffer(&BufferDescriptor {
            size: descriptor.size.max(data.len() as u64),
            ..descriptor.clone()
        })?;
        self.write_buffer(id, 0, data)?;
        Ok(id)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let resources = self.resources("buffers")?;
        let entry = resources.buffers.get(&id).ok_or(ResourceError::NotFound)?;
        if offset + data.len() as u64 > entry.size {
            return Err(ResourceError::OutOfBounds);
        }
        let mut padded = data.to_vec();
        padded.resize(data.len().next_multiple_of(4), 0);
        self.queue().write_buffer(&entry.wgpu_buffer, offset, &padded);
        Ok(())
    }

    fn read_buffer(&self, id: BufferId) -> Result<Vec<u8>, ResourceError> {
        let (buffer, size) = {
            let resources = self.resources("buffers")?;
            let entry = resources.buffers.get(&id).ok_or(ResourceError::NotFound)?;
            (Arc::clone(&entry.wgpu_buffer), entry.size)
        };
        self.read_back(size, |encoder, staging| {
            encoder.copy_buffer_to_buffer(&buffer, 0, staging, 0, size);
        })
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let entry = self
            .resources("buffers")?
            .buffers
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        entry.wgpu_buffer.destroy();
        log::debug!("WgpuDevice: Destroyed buffer ID: {id:?}");
        Ok(())
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let limits = self.limits();
        let size = descriptor.size;
        let max_edge = match descriptor.dimension {
            TextureDimension::D2 => limits.max_texture_dimension_2d,
            TextureDimension::D3 => limits.max_texture_dimension_3d,
        };
        if size.width.max(size.height).max(size.depth) > max_edge {
            return Err(ResourceError::BackendError(format!(
                "texture {}x{}x{} exceeds the {max_edge} texel limit",
                size.width, size.height, size.depth
            )));
        }
        let mut usage: wgpu::TextureUsages = descriptor.usage.into_wgpu();
        usage |= wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST;
        if descriptor.mip_level_count > 1 && MipmapGenerator::supports(descriptor.format) {
            usage |= wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::STORAGE_BINDING;
        }
        let wgpu_texture = self.device().create_texture(&wgpu::TextureDescriptor {
            label: descriptor.label.as_deref(),
            size: size.into_wgpu(),
            mip_level_count: descriptor.mip_level_count.max(1),
            sample_count: 1,
            dimension: descriptor.dimension.into_wgpu(),
            format: descriptor.format.into_wgpu(),
            usage,
            view_formats: &[],
        });
        let id = TextureId(self.next_id());
        self.resources("textures")?.textures.insert(
            id,
            WgpuTextureEntry {
                wgpu_texture: Arc::new(wgpu_texture),
                size,
                dimension: descriptor.dimension,
                format: descriptor.format,
                mip_level_count: descriptor.mip_level_count.max(1),
            },
        );
        log::info!(
            "WgpuDevice: Created texture '{:?}' with ID: {:?}, {}x{}x{} {:?}",
            descriptor.label.as_deref().unwrap_or("Unnamed"),
            id,
            size.width,
            size.height,
            size.depth,
            descriptor.format
        );
        Ok(id)
    }

    fn write_texture(
        &self,
        id: TextureId,
        mip_level: u32,
        origin: Origin3D,
        size: Extent3D,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let resources = self.resources("textures")?;
        let entry = resources.textures.get(&id).ok_or(ResourceError::NotFound)?;
        let bytes_per_row = size.width * entry.format.bytes_per_texel();
        self.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.wgpu_texture,
                mip_level,
                origin: origin.into_wgpu(),
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(size.height),
            },
            size.into_wgpu(),
        );
        log::debug!(
            "WgpuDevice: Wrote {} bytes to texture ID: {:?} level {} at offset {:?}",
            data.len(),
            id,
            mip_level,
            origin
        );
        Ok(())
    }

    fn read_texture(&self, id: TextureId, mip_level: u32) -> Result<Vec<u8>, ResourceError> {
        let (texture, extent, texel) = {
            let resources = self.resources("textures")?;
            let entry = resources.textures.get(&id).ok_or(ResourceError::NotFound)?;
            if mip_level >= entry.mip_level_count {
                return Err(ResourceError::OutOfBounds);
            }
            (
                Arc::clone(&entry.wgpu_texture),
                entry.size.mip_level(mip_level),
                entry.format.bytes_per_texel(),
            )
        };
        let row = extent.width * texel;
        let padded = padded_row(row);
        let rows = extent.height * extent.depth;
        let bytes = self.read_back(padded as u64 * rows as u64, |encoder, staging| {
            encoder.copy_texture_to_buffer(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyBufferInfo {
                    buffer: staging,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(padded),
                        rows_per_image: Some(extent.height),
                    },
                },
                extent.into_wgpu(),
            );
        })?;
        Ok(bytes
            .chunks_exact(padded as usize)
            .flat_map(|chunk| &chunk[..row as usize])
            .copied()
            .collect())
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        let entry = self
            .resources("textures")?
            .textures
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        entry.wgpu_texture.destroy();
        log::debug!("WgpuDevice: Destroyed texture ID: {id:?}");
        Ok(())
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        let mut address_mode = descriptor.address_mode;
        if address_mode == AddressMode::ClampToBorder
            && !self.internal.context.supports_clamp_to_border()
        {
            log::warn!(
                "WgpuDevice: Sampler '{:?}' asked for border clamping, which the adapter lacks; using ClampToEdge",
                descriptor.label
            );
            address_mode = AddressMode::ClampToEdge;
        }
        let mode: wgpu::AddressMode = address_mode.into_wgpu();
        let sampler = self.device().create_sampler(&wgpu::SamplerDescriptor {
            label: descriptor.label.as_deref(),
            address_mode_u: mode,
            address_mode_v: mode,
            address_mode_w: mode,
            mag_filter: descriptor.mag_filter.into_wgpu(),
            min_filter: descriptor.min_filter.into_wgpu(),
            mipmap_filter: descriptor.mipmap_filter.into_wgpu(),
            lod_min_clamp: descriptor.lod_min_clamp,
            lod_max_clamp: descriptor.lod_max_clamp,
            compare: None,
            anisotropy_clamp: 1,
            border_color: if address_mode == AddressMode::ClampToBorder {
                descriptor.border_color.into_wgpu()
            } else {
                None
            },
        });
        let id = SamplerId(self.next_id());
        self.resources("samplers")?
            .samplers
            .insert(id, Arc::new(sampler));
        Ok(id)
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        self.resources("samplers")?
            .samplers
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(RecordingEncoder::new(label))
    }

    fn submit(&self, commands: CommandList) -> Result<(), RenderError> {
        let mut resources = self.resources("submit")?;
        let mut encoder = self
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: commands.label(),
            });
        Translator::new(&self.internal, &mut resources, &mut encoder).run(commands)?;
        self.queue().submit(Some(encoder.finish()));
        Ok(())
    }

    fn limits(&self) -> DeviceLimits {
        let limits = &self.internal.context.device_limits;
        DeviceLimits {
            max_buffer_size: limits.max_buffer_size,
            max_storage_buffer_binding_size: limits.max_storage_buffer_binding_size as u64,
            max_texture_dimension_2d: limits.max_texture_dimension_2d,
            max_texture_dimension_3d: limits.max_texture_dimension_3d,
            supports_clamp_to_border: self.internal.context.supports_clamp_to_border(),
        }
    }

    fn adapter_info(&self) -> AdapterInfo {
        let backend_type = match self.internal.context.adapter_backend {
            wgpu::Backend::Vulkan => GraphicsBackendType::Vulkan,
            wgpu::Backend::Metal => GraphicsBackendType::Metal,
            wgpu::Backend::Dx12 => GraphicsBackendType::Dx12,
            wgpu::Backend::Gl => GraphicsBackendType::OpenGL,
            wgpu::Backend::BrowserWebGpu => GraphicsBackendType::WebGpu,
            _ => GraphicsBackendType::Unknown,
        };
        AdapterInfo {
            name: self.internal.context.adapter_name.clone(),
            backend_type,
        }
    }
}

impl TechniqueCompiler for WgpuDevice {
    fn compile(&self, descriptor: &TechniqueDescriptor) -> Result<UnboundTechnique, ShaderError> {
        let linked = link_technique(descriptor)?;
        let entry = self.create_program(descriptor, &linked)?;
        let id = ProgramId(self.next_id());
        self.resources("programs")
            .map_err(|e| ShaderError::Link {
                label: descriptor.label.clone(),
                details: e.to_string(),
            })?
            .programs
            .insert(id, entry);
        log::info!(
            "WgpuDevice: Linked technique '{}' as {:?} ({} resources)",
            descriptor.label,
            id,
            linked.resources.len()
        );
        Ok(UnboundTechnique::new(
            id,
            descriptor.label.clone(),
            linked.reflection(NameConvention::IncludesTerminator),
        ))
    }
}
