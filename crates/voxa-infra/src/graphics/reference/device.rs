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

use super::execute::Executor;
use super::memory::{BufferEntry, Layered, ResourceStore, TextureEntry};
use super::sampler::SamplerState;
use crate::graphics::naga::{link_technique, NameConvention};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use voxa_core::math::{Extent3D, Origin3D};
use voxa_core::renderer::api::{
    AdapterInfo, AddressMode, BufferDescriptor, BufferId, BufferUsage, CommandList,
    DeviceLimits, GraphicsBackendType, ProgramId, RasterState, RecordingEncoder,
    SamplerDescriptor, SamplerId, TechniqueDescriptor, TextureDescriptor, TextureDimension,
    TextureId, UnboundTechnique, VertexLayout,
};
use voxa_core::renderer::{
    CommandEncoder, GraphicsDevice, HostKernel, RenderError, ResourceError, ShaderError,
    TechniqueCompiler,
};

/// A linked technique as the executor runs it.
#[derive(Debug, Clone)]
pub(crate) struct ReferenceProgram {
    pub label: String,
    pub kernel: Arc<dyn HostKernel>,
    pub is_compute: bool,
    pub raster: RasterState,
    pub vertex_layout: Option<VertexLayout>,
    pub workgroup_size: [u32; 3],
}

#[derive(Debug, Default)]
struct DeviceState {
    store: ResourceStore,
    programs: HashMap<ProgramId, ReferenceProgram>,
}

/// A CPU implementation of [`GraphicsDevice`] and [`TechniqueCompiler`].
///
/// Shaders are validated and reflected through naga exactly like on the wgpu
/// backend, but stages run through the [`HostKernel`] attached to the
/// technique. Memory follows an explicit visibility model: shader writes only
/// become visible to later reads after a [`MemoryBarrier`] covering them, or
/// when the submission finishes.
///
/// [`MemoryBarrier`]: voxa_core::renderer::api::Command::MemoryBarrier
#[derive(Debug)]
pub struct ReferenceDevice {
    state: Mutex<DeviceState>,
    next_id: AtomicUsize,
    limits: DeviceLimits,
}

impl Default for ReferenceDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceDevice {
    /// Creates a device with default limits. Border clamping is supported.
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits {
            supports_clamp_to_border: true,
            ..DeviceLimits::default()
        })
    }

    /// Creates a device enforcing `limits`.
    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self {
            state: Mutex::new(DeviceState::default()),
            next_id: AtomicUsize::new(0),
            limits,
        }
    }

    fn state(&self, what: &str) -> Result<MutexGuard<'_, DeviceState>, ResourceError> {
        self.state
            .lock()
            .map_err(|e| ResourceError::BackendError(format!("Mutex poisoned ({what}): {e}")))
    }

    fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn check_buffer_size(&self, descriptor: &BufferDescriptor) -> Result<(), ResourceError> {
        let limit = if descriptor.usage.contains(BufferUsage::STORAGE) {
            self.limits
                .max_storage_buffer_binding_size
                .min(self.limits.max_buffer_size)
        } else {
            self.limits.max_buffer_size
        };
        if descriptor.size > limit {
            return Err(ResourceError::OutOfMemory {
                requested: descriptor.size,
                limit,
            });
        }
        Ok(())
    }
}

impl GraphicsDevice for ReferenceDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        self.check_buffer_size(descriptor)?;
        let label = descriptor.label.as_deref().unwrap_or("unlabelled").to_owned();
        let id = BufferId(self.next_id());
        self.state("buffers")?.store.buffers.insert(
            id,
            BufferEntry {
                label,
                memory: Layered::zeroed(descriptor.size as usize),
            },
        );
        log::debug!(
            "ReferenceDevice: Created buffer '{:?}' with ID: {:?}, size: {} bytes",
            descriptor.label,
            id,
            descriptor.size
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
        self.state("buffers")?
            .store
            .buffer_mut(id)?
            .memory
            .write_through(offset as usize, data)
    }

    fn read_buffer(&self, id: BufferId) -> Result<Vec<u8>, ResourceError> {
        Ok(self.state("buffers")?.store.buffer(id)?.memory.visible().to_vec())
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let entry = self
            .state("buffers")?
            .store
            .buffers
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        log::debug!("ReferenceDevice: Destroyed buffer '{}' ({id:?})", entry.label);
        Ok(())
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let size = descriptor.size;
        let max_edge = match descriptor.dimension {
            TextureDimension::D2 => self.limits.max_texture_dimension_2d,
            TextureDimension::D3 => self.limits.max_texture_dimension_3d,
        };
        if size.width.max(size.height).max(size.depth) > max_edge {
            return Err(ResourceError::BackendError(format!(
                "texture {}x{}x{} exceeds the {max_edge} texel limit",
                size.width, size.height, size.depth
            )));
        }
        if descriptor.mip_level_count == 0 || descriptor.mip_level_count > size.max_mip_levels() {
            return Err(ResourceError::BackendError(format!(
                "{} mip levels requested for a {}x{}x{} texture",
                descriptor.mip_level_count, size.width, size.height, size.depth
            )));
        }

        let label = descriptor.label.as_deref().unwrap_or("unlabelled").to_owned();
        let id = TextureId(self.next_id());
        self.state("textures")?.store.textures.insert(
            id,
            TextureEntry::new(
                label,
                size,
                descriptor.dimension,
                descriptor.format,
                descriptor.mip_level_count,
            ),
        );
        log::debug!(
            "ReferenceDevice: Created texture '{:?}' with ID: {:?}, {:?} {:?}, {} levels",
            descriptor.label,
            id,
            descriptor.dimension,
            descriptor.format,
            descriptor.mip_level_count
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
        let mut state = self.state("textures")?;
        let texture = state.store.texture_mut(id)?;
        let texel = texture.format.bytes_per_texel() as usize;
        let row = size.width as usize * texel;
        if data.len() < row * size.height as usize * size.depth as usize {
            return Err(ResourceError::OutOfBounds);
        }
        let extent = texture.level_extent(mip_level);
        if origin.x + size.width > extent.width
            || origin.y + size.height > extent.height
            || origin.z + size.depth > extent.depth
        {
            return Err(ResourceError::OutOfBounds);
        }
        for z in 0..size.depth {
            for y in 0..size.height {
                let offset = texture
                    .texel_offset(mip_level, [origin.x, origin.y + y, origin.z + z])
                    .ok_or(ResourceError::OutOfBounds)?;
                let start = (z as usize * size.height as usize + y as usize) * row;
                texture
                    .level_mut(mip_level)?
                    .write_through(offset, &data[start..start + row])?;
            }
        }
        Ok(())
    }

    fn read_texture(&self, id: TextureId, mip_level: u32) -> Result<Vec<u8>, ResourceError> {
        let state = self.state("textures")?;
        Ok(state
            .store
            .texture(id)?
            .level(mip_level)?
            .visible()
            .to_vec())
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        let entry = self
            .state("textures")?
            .store
            .textures
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        log::debug!("ReferenceDevice: Destroyed texture '{}' ({id:?})", entry.label);
        Ok(())
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        if descriptor.address_mode == AddressMode::ClampToBorder
            && !self.limits.supports_clamp_to_border
        {
            return Err(ResourceError::BackendError(
                "clamp-to-border addressing is not supported by this device".to_owned(),
            ));
        }
        let id = SamplerId(self.next_id());
        self.state("samplers")?
            .store
            .samplers
            .insert(id, SamplerState::from(descriptor));
        Ok(id)
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        self.state("samplers")?
            .store
            .samplers
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(RecordingEncoder::new(label))
    }

    fn submit(&self, commands: CommandList) -> Result<(), RenderError> {
        let mut state = self.state("submit")?;
        let DeviceState { store, programs } = &mut *state;
        Executor::new(store, programs).run(commands).map(|_| ())
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            name: "Voxa CPU reference".to_owned(),
            backend_type: GraphicsBackendType::Reference,
        }
    }
}

impl TechniqueCompiler for ReferenceDevice {
    fn compile(&self, descriptor: &TechniqueDescriptor) -> Result<UnboundTechnique, ShaderError> {
        let linked = link_technique(descriptor)?;
        let kernel = descriptor
            .host_kernel
            .clone()
            .ok_or_else(|| ShaderError::Link {
                label: descriptor.label.clone(),
                details: "technique has no host kernel".to_owned(),
            })?;

        let id = ProgramId(self.next_id());
        let program = ReferenceProgram {
            label: descriptor.label.clone(),
            kernel,
            is_compute: descriptor.is_compute(),
            raster: descriptor.raster,
            vertex_layout: descriptor.vertex_layout.clone(),
            workgroup_size: linked.workgroup_size(),
        };
        self.state("programs")
            .map_err(|e| ShaderError::Link {
                label: descriptor.label.clone(),
                details: e.to_string(),
            })?
            .programs
            .insert(id, program);

        log::info!(
            "ReferenceDevice: Linked technique '{}' as {:?} ({} resources)",
            descriptor.label,
            id,
            linked.resources.len()
        );
        Ok(UnboundTechnique::new(
            id,
            descriptor.label.clone(),
            linked.reflection(NameConvention::ExcludesTerminator),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_buffers_respect_the_binding_limit() {
        let device = ReferenceDevice::with_limits(DeviceLimits {
            max_buffer_size: 1024,
            max_storage_buffer_binding_size: 256,
            ..DeviceLimits::default()
        });
        let err = device
            .create_buffer(&BufferDescriptor::storage("big", 512))
            .unwrap_err();
        assert_eq!(
            err,
            ResourceError::OutOfMemory {
                requested: 512,
                limit: 256
            }
        );
        assert!(device
            .create_buffer(&BufferDescriptor::uniform("ok", 512))
            .is_ok());
    }

    #[test]
    fn test_partial_texture_upload() {
        let device = ReferenceDevice::new();
        let id = device
            .create_texture(&TextureDescriptor {
                label: None,
                size: Extent3D::new(2, 2, 1),
                mip_level_count: 1,
                dimension: TextureDimension::D2,
                format: voxa_core::renderer::api::TextureFormat::R8Unorm,
                usage: voxa_core::renderer::api::TextureUsage::COPY_DST,
            })
            .unwrap();
        device
            .write_texture(id, 0, Origin3D { x: 1, y: 1, z: 0 }, Extent3D::new(1, 1, 1), &[7])
            .unwrap();
        assert_eq!(device.read_texture(id, 0).unwrap(), vec![0, 0, 0, 7]);
    }

    #[test]
    fn test_default_limits_allow_border_clamping() {
        let device = ReferenceDevice::new();
        assert!(device.limits().supports_clamp_to_border);
        assert!(device
            .create_sampler(&SamplerDescriptor::trilinear_transparent_border())
            .is_ok());
        assert_eq!(
            device.adapter_info().backend_type,
            GraphicsBackendType::Reference
        );
    }
}
