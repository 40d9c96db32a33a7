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

//! Resource storage with an explicit visibility model.
//!
//! Every buffer and every texture mip level holds two copies of its bytes.
//! Shader stores and atomics land in the pending copy and mark the barrier
//! domain they were written through; loads and samples read the visible copy.
//! A barrier whose scope intersects the dirty domains copies pending over
//! visible. Transfers write both copies.

use super::sampler::SamplerState;
use std::collections::HashMap;
use voxa_core::math::Extent3D;
use voxa_core::renderer::api::{
    BarrierScope, BufferId, SamplerId, TextureDimension, TextureFormat, TextureId,
};
use voxa_core::renderer::ResourceError;

/// A block of bytes with a visible and a pending layer.
#[derive(Debug, Clone)]
pub(crate) struct Layered {
    visible: Vec<u8>,
    pending: Vec<u8>,
    dirty: BarrierScope,
}

impl Layered {
    pub fn zeroed(len: usize) -> Self {
        Self {
            visible: vec![0; len],
            pending: vec![0; len],
            dirty: BarrierScope::EMPTY,
        }
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn visible(&self) -> &[u8] {
        &self.visible
    }

    #[cfg(test)]
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    fn range(&self, offset: usize, len: usize) -> Result<std::ops::Range<usize>, ResourceError> {
        let end = offset.checked_add(len).ok_or(ResourceError::OutOfBounds)?;
        if end > self.len() {
            return Err(ResourceError::OutOfBounds);
        }
        Ok(offset..end)
    }

    /// Transfer write into both layers.
    pub fn write_through(&mut self, offset: usize, data: &[u8]) -> Result<(), ResourceError> {
        let range = self.range(offset, data.len())?;
        self.visible[range.clone()].copy_from_slice(data);
        self.pending[range].copy_from_slice(data);
        Ok(())
    }

    /// Transfer fill of the whole block with a repeating pattern.
    pub fn fill_through(&mut self, pattern: &[u8]) {
        if pattern.is_empty() {
            return;
        }
        for (i, byte) in self.visible.iter_mut().enumerate() {
            *byte = pattern[i % pattern.len()];
        }
        self.pending.copy_from_slice(&self.visible);
    }

    /// Shader write into the pending layer.
    pub fn write_pending(
        &mut self,
        offset: usize,
        data: &[u8],
        domain: BarrierScope,
    ) -> Result<(), ResourceError> {
        let range = self.range(offset, data.len())?;
        self.pending[range].copy_from_slice(data);
        self.dirty.insert(domain);
        Ok(())
    }

    pub fn visible_bytes(&self, offset: usize, len: usize) -> Result<&[u8], ResourceError> {
        let range = self.range(offset, len)?;
        Ok(&self.visible[range])
    }

    pub fn load_word(&self, index: usize) -> Result<u32, ResourceError> {
        let bytes = self.visible_bytes(index * 4, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read-modify-write of one pending word. Returns the previous value.
    pub fn update_word(
        &mut self,
        index: usize,
        domain: BarrierScope,
        update: impl FnOnce(u32) -> u32,
    ) -> Result<u32, ResourceError> {
        let range = self.range(index * 4, 4)?;
        let slot = &mut self.pending[range];
        let old = u32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]);
        slot.copy_from_slice(&update(old).to_le_bytes());
        self.dirty.insert(domain);
        Ok(old)
    }

    /// Publishes pending writes if any of them belong to `scope`.
    pub fn publish(&mut self, scope: BarrierScope) -> bool {
        if !self.dirty.intersects(scope) {
            return false;
        }
        self.visible.copy_from_slice(&self.pending);
        self.dirty = BarrierScope::EMPTY;
        true
    }
}

#[derive(Debug)]
pub(crate) struct BufferEntry {
    pub label: String,
    pub memory: Layered,
}

#[derive(Debug)]
pub(crate) struct TextureEntry {
    pub label: String,
    pub size: Extent3D,
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub levels: Vec<Layered>,
}

impl TextureEntry {
    pub fn new(
        label: String,
        size: Extent3D,
        dimension: TextureDimension,
        format: TextureFormat,
        mip_level_count: u32,
    ) -> Self {
        let texel = format.bytes_per_texel() as usize;
        let levels = (0..mip_level_count.max(1))
            .map(|level| Layered::zeroed(size.mip_level(level).volume() as usize * texel))
            .collect();
        Self {
            label,
            size,
            dimension,
            format,
            levels,
        }
    }

    pub fn level_extent(&self, level: u32) -> Extent3D {
        self.size.mip_level(level)
    }

    pub fn level(&self, level: u32) -> Result<&Layered, ResourceError> {
        self.levels
            .get(level as usize)
            .ok_or(ResourceError::OutOfBounds)
    }

    pub fn level_mut(&mut self, level: u32) -> Result<&mut Layered, ResourceError> {
        self.levels
            .get_mut(level as usize)
            .ok_or(ResourceError::OutOfBounds)
    }

    /// Byte offset of texel `[x, y, z]` in `level`, or `None` outside of it.
    pub fn texel_offset(&self, level: u32, [x, y, z]: [u32; 3]) -> Option<usize> {
        let extent = self.level_extent(level);
        if x >= extent.width || y >= extent.height || z >= extent.depth {
            return None;
        }
        let index = (z as usize * extent.height as usize + y as usize) * extent.width as usize
            + x as usize;
        Some(index * self.format.bytes_per_texel() as usize)
    }
}

/// All resources of a [`ReferenceDevice`](super::ReferenceDevice).
#[derive(Debug, Default)]
pub(crate) struct ResourceStore {
    pub buffers: HashMap<BufferId, BufferEntry>,
    pub textures: HashMap<TextureId, TextureEntry>,
    pub samplers: HashMap<SamplerId, SamplerState>,
}

impl ResourceStore {
    pub fn buffer(&self, id: BufferId) -> Result<&BufferEntry, ResourceError> {
        self.buffers.get(&id).ok_or(ResourceError::NotFound)
    }

    pub fn buffer_mut(&mut self, id: BufferId) -> Result<&mut BufferEntry, ResourceError> {
        self.buffers.get_mut(&id).ok_or(ResourceError::NotFound)
    }

    pub fn texture(&self, id: TextureId) -> Result<&TextureEntry, ResourceError> {
        self.textures.get(&id).ok_or(ResourceError::NotFound)
    }

    pub fn texture_mut(&mut self, id: TextureId) -> Result<&mut TextureEntry, ResourceError> {
        self.textures.get_mut(&id).ok_or(ResourceError::NotFound)
    }

    pub fn sampler(&self, id: SamplerId) -> Result<&SamplerState, ResourceError> {
        self.samplers.get(&id).ok_or(ResourceError::NotFound)
    }

    /// Publishes every resource with pending writes in `scope`. Returns how
    /// many blocks were published.
    pub fn publish(&mut self, scope: BarrierScope) -> usize {
        let buffers = self
            .buffers
            .values_mut()
            .map(|b| &mut b.memory);
        let levels = self.textures.values_mut().flat_map(|t| t.levels.iter_mut());
        buffers
            .chain(levels)
            .map(|memory| memory.publish(scope))
            .filter(|&published| published)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_writes_wait_for_a_matching_barrier() {
        let mut memory = Layered::zeroed(8);
        memory
            .update_word(1, BarrierScope::ATOMIC_COUNTER, |v| v + 5)
            .unwrap();
        assert_eq!(memory.load_word(1).unwrap(), 0);
        assert_eq!(memory.pending()[4], 5);

        assert!(!memory.publish(BarrierScope::SHADER_STORAGE));
        assert_eq!(memory.load_word(1).unwrap(), 0);
        assert!(memory.publish(BarrierScope::ATOMIC_COUNTER | BarrierScope::SHADER_STORAGE));
        assert_eq!(memory.load_word(1).unwrap(), 5);
    }

    #[test]
    fn test_transfers_are_visible_immediately() {
        let mut memory = Layered::zeroed(8);
        memory.fill_through(&7u32.to_le_bytes());
        assert_eq!(memory.load_word(0).unwrap(), 7);
        assert_eq!(memory.load_word(1).unwrap(), 7);
        memory.write_through(0, &[1, 0, 0, 0]).unwrap();
        assert_eq!(memory.load_word(0).unwrap(), 1);
        assert!(memory.write_through(6, &[0; 4]).is_err());
    }

    #[test]
    fn test_texel_offsets_follow_row_major_slices() {
        let texture = TextureEntry::new(
            "volume".into(),
            Extent3D::cube(4),
            TextureDimension::D3,
            TextureFormat::Rgba8Unorm,
            3,
        );
        assert_eq!(texture.levels.len(), 3);
        assert_eq!(texture.texel_offset(0, [1, 2, 3]), Some((3 * 16 + 2 * 4 + 1) * 4));
        assert_eq!(texture.texel_offset(1, [2, 0, 0]), None);
        assert_eq!(texture.level(2).unwrap().len(), 4);
    }
}
