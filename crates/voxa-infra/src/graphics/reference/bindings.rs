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

//! Name-based resource access for host kernels.

use super::memory::ResourceStore;
use super::sampler;
use crate::graphics::texel;
use voxa_core::math::{Extent3D, Vec3, Vec4};
use voxa_core::renderer::api::{
    BarrierScope, BoundResource, BufferId, ResolvedBinding, ResourceKind,
};
use voxa_core::renderer::{BindingError, HostResources, RenderError};

/// The resources one draw or dispatch resolved, applied to the store through
/// the visibility model.
pub(crate) struct HostBindings<'a> {
    technique: String,
    bindings: Vec<(String, ResourceKind, BoundResource)>,
    store: &'a mut ResourceStore,
}

impl<'a> HostBindings<'a> {
    pub fn new(
        technique: &str,
        resolved: &[ResolvedBinding<'_>],
        store: &'a mut ResourceStore,
    ) -> Self {
        Self {
            technique: technique.to_owned(),
            bindings: resolved
                .iter()
                .map(|b| (b.resource.name.clone(), b.resource.kind, b.bound))
                .collect(),
            store,
        }
    }

    pub fn store(&self) -> &ResourceStore {
        &*self.store
    }

    pub fn store_mut(&mut self) -> &mut ResourceStore {
        &mut *self.store
    }

    fn lookup(&self, name: &str) -> Result<(ResourceKind, BoundResource), RenderError> {
        self.bindings
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, kind, bound)| (*kind, *bound))
            .ok_or_else(|| {
                RenderError::Binding(BindingError::ResourceNotFound {
                    technique: self.technique.clone(),
                    name: name.to_owned(),
                })
            })
    }

    fn mismatch(&self, name: &str, expected: ResourceKind, found: ResourceKind) -> RenderError {
        RenderError::Binding(BindingError::KindMismatch {
            technique: self.technique.clone(),
            name: name.to_owned(),
            expected,
            found,
        })
    }

    fn buffer(&self, name: &str) -> Result<(ResourceKind, BufferId), RenderError> {
        match self.lookup(name)? {
            (kind, BoundResource::Buffer(id)) => Ok((kind, id)),
            (kind, _) => Err(self.mismatch(name, ResourceKind::StorageBuffer, kind)),
        }
    }

    fn update_word(
        &mut self,
        name: &str,
        index: usize,
        update: impl FnOnce(u32) -> u32,
    ) -> Result<u32, RenderError> {
        let (kind, id) = self.buffer(name)?;
        let memory = &mut self.store.buffer_mut(id)?.memory;
        Ok(memory.update_word(index, kind.barrier_domain(), update)?)
    }
}

impl HostResources for HostBindings<'_> {
    fn uniform_bytes(&self, name: &str) -> Result<&[u8], RenderError> {
        let (_, id) = self.buffer(name)?;
        Ok(self.store.buffer(id)?.memory.visible())
    }

    fn word_len(&self, name: &str) -> Result<usize, RenderError> {
        let (_, id) = self.buffer(name)?;
        Ok(self.store.buffer(id)?.memory.len() / 4)
    }

    fn load_u32(&self, name: &str, index: usize) -> Result<u32, RenderError> {
        let (_, id) = self.buffer(name)?;
        Ok(self.store.buffer(id)?.memory.load_word(index)?)
    }

    fn store_u32(&mut self, name: &str, index: usize, value: u32) -> Result<(), RenderError> {
        self.update_word(name, index, |_| value).map(|_| ())
    }

    fn atomic_add_u32(&mut self, name: &str, index: usize, value: u32) -> Result<u32, RenderError> {
        self.update_word(name, index, |old| old.wrapping_add(value))
    }

    fn atomic_exchange_u32(
        &mut self,
        name: &str,
        index: usize,
        value: u32,
    ) -> Result<u32, RenderError> {
        self.update_word(name, index, |_| value)
    }

    fn atomic_max_u32(&mut self, name: &str, index: usize, value: u32) -> Result<u32, RenderError> {
        self.update_word(name, index, |old| old.max(value))
    }

    fn image_extent(&self, name: &str) -> Result<Extent3D, RenderError> {
        let (texture, level) = match self.lookup(name)? {
            (_, BoundResource::Image { texture, mip_level }) => (texture, mip_level),
            (_, BoundResource::Texture(texture)) => (texture, 0),
            (kind, _) => return Err(self.mismatch(name, ResourceKind::StorageImage, kind)),
        };
        Ok(self.store.texture(texture)?.level_extent(level))
    }

    fn store_texel(&mut self, name: &str, coord: [u32; 3], value: Vec4) -> Result<(), RenderError> {
        let (texture, level) = match self.lookup(name)? {
            (_, BoundResource::Image { texture, mip_level }) => (texture, mip_level),
            (kind, _) => return Err(self.mismatch(name, ResourceKind::StorageImage, kind)),
        };
        let entry = self.store.texture_mut(texture)?;
        // Out-of-range stores are dropped, as on the GPU.
        let Some(offset) = entry.texel_offset(level, coord) else {
            return Ok(());
        };
        let bytes = texel::encode(entry.format, value)?;
        entry.level_mut(level)?.write_pending(
            offset,
            &bytes,
            BarrierScope::SHADER_IMAGE_ACCESS | BarrierScope::TEXTURE_FETCH,
        )?;
        Ok(())
    }

    fn sample(
        &self,
        texture: &str,
        sampler: &str,
        coord: Vec3,
        lod: f32,
    ) -> Result<Vec4, RenderError> {
        let texture_id = match self.lookup(texture)? {
            (_, BoundResource::Texture(id)) => id,
            (kind, _) => return Err(self.mismatch(texture, ResourceKind::SampledTexture, kind)),
        };
        let sampler_id = match self.lookup(sampler)? {
            (_, BoundResource::Sampler(id)) => id,
            (kind, _) => return Err(self.mismatch(sampler, ResourceKind::Sampler, kind)),
        };
        let entry = self.store.texture(texture_id)?;
        let state = self.store.sampler(sampler_id)?;
        sampler::sample(entry, state, coord, lod).map_err(RenderError::from)
    }
}
