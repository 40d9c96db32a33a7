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

//! The device-side channel table and draw-time binding resolution.

use super::binding::{ChannelSlot, ResourceKind};
use super::buffer::BufferId;
use super::technique::Technique;
use super::texture::{SamplerId, TextureId};
use crate::renderer::error::BindingError;
use crate::renderer::reflection::ReflectedResource;
use std::collections::HashMap;

/// A concrete resource sitting in a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundResource {
    /// A buffer, for uniform, storage and counter channels.
    Buffer(BufferId),
    /// A whole texture, for sampled-texture channels.
    Texture(TextureId),
    /// One mip level of a texture, for storage-image channels.
    Image {
        /// Texture.
        texture: TextureId,
        /// Bound level.
        mip_level: u32,
    },
    /// A sampler.
    Sampler(SamplerId),
}

impl BoundResource {
    /// The class this resource is most naturally bound as. Buffers report
    /// [`ResourceKind::StorageBuffer`].
    pub fn natural_kind(&self) -> ResourceKind {
        match self {
            BoundResource::Buffer(_) => ResourceKind::StorageBuffer,
            BoundResource::Texture(_) => ResourceKind::SampledTexture,
            BoundResource::Image { .. } => ResourceKind::StorageImage,
            BoundResource::Sampler(_) => ResourceKind::Sampler,
        }
    }

    /// Whether this resource can sit in a channel of class `kind`.
    pub fn fits(&self, kind: ResourceKind) -> bool {
        match self {
            BoundResource::Buffer(_) => kind.is_buffer(),
            BoundResource::Texture(_) => kind == ResourceKind::SampledTexture,
            BoundResource::Image { .. } => kind == ResourceKind::StorageImage,
            BoundResource::Sampler(_) => kind == ResourceKind::Sampler,
        }
    }
}

/// A resolved binding: which resource feeds which reflected variable.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedBinding<'t> {
    /// Reflected variable.
    pub resource: &'t ReflectedResource,
    /// Slot it was resolved through.
    pub slot: ChannelSlot,
    /// Concrete resource found in the slot.
    pub bound: BoundResource,
}

/// Channel contents during command execution. Bindings persist across passes
/// until overwritten.
#[derive(Debug, Default, Clone)]
pub struct ChannelTable {
    slots: HashMap<ChannelSlot, BoundResource>,
}

impl ChannelTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `resource` in `slot`, replacing what was there.
    pub fn bind(&mut self, slot: ChannelSlot, resource: BoundResource) {
        self.slots.insert(slot, resource);
    }

    /// The resource in `slot`, if any.
    pub fn get(&self, slot: ChannelSlot) -> Option<BoundResource> {
        self.slots.get(&slot).copied()
    }

    /// Resolves every resource of `technique` through its channel map.
    pub fn resolve<'t>(
        &self,
        technique: &'t Technique,
    ) -> Result<Vec<ResolvedBinding<'t>>, BindingError> {
        technique
            .bindings()
            .map(|(resource, slot)| {
                let bound = self
                    .get(slot)
                    .ok_or_else(|| BindingError::EmptyChannel {
                        technique: technique.label().to_owned(),
                        name: resource.name.clone(),
                        slot,
                    })?;
                if !bound.fits(resource.kind) {
                    return Err(BindingError::KindMismatch {
                        technique: technique.label().to_owned(),
                        name: resource.name.clone(),
                        expected: resource.kind,
                        found: bound.natural_kind(),
                    });
                }
                Ok(ResolvedBinding {
                    resource,
                    slot,
                    bound,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_resource_fits_its_class() {
        let buffer = BoundResource::Buffer(BufferId(1));
        assert!(buffer.fits(ResourceKind::AtomicCounter));
        assert!(!buffer.fits(ResourceKind::SampledTexture));
        let image = BoundResource::Image {
            texture: TextureId(2),
            mip_level: 0,
        };
        assert!(image.fits(ResourceKind::StorageImage));
        assert!(!image.fits(ResourceKind::SampledTexture));
    }

    #[test]
    fn test_rebinding_replaces_slot() {
        let slot = ChannelSlot::new(ResourceKind::StorageBuffer, 0);
        let mut table = ChannelTable::new();
        table.bind(slot, BoundResource::Buffer(BufferId(1)));
        table.bind(slot, BoundResource::Buffer(BufferId(2)));
        assert_eq!(table.get(slot), Some(BoundResource::Buffer(BufferId(2))));
        assert_eq!(
            table.get(ChannelSlot::new(ResourceKind::UniformBuffer, 0)),
            None
        );
    }
}
