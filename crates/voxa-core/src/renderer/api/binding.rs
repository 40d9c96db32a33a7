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

//! Binding channels and memory barrier scopes.
//!
//! Resources reach shaders in two steps. A technique maps each reflected
//! resource name to a channel index of the resource's [`ResourceKind`]
//! (see [`UnboundTechnique::assign`](super::technique::UnboundTechnique::assign)),
//! and the command stream places concrete buffers, textures and samplers into
//! channels (see [`CommandEncoder`](crate::renderer::traits::CommandEncoder)).
//! Each kind has its own channel namespace.

use crate::voxa_flags;
use std::fmt;

/// The class of a shader resource. Each class has an independent channel namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// A uniform block.
    UniformBuffer,
    /// A read-only or read/write storage buffer.
    StorageBuffer,
    /// A storage buffer holding a single atomic counter.
    AtomicCounter,
    /// A texture read through a sampler.
    SampledTexture,
    /// A texture written or read texel-by-texel.
    StorageImage,
    /// A sampler object.
    Sampler,
}

impl ResourceKind {
    /// All kinds, in a stable order.
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::UniformBuffer,
        ResourceKind::StorageBuffer,
        ResourceKind::AtomicCounter,
        ResourceKind::SampledTexture,
        ResourceKind::StorageImage,
        ResourceKind::Sampler,
    ];

    /// Returns `true` for kinds backed by a buffer.
    pub const fn is_buffer(self) -> bool {
        matches!(
            self,
            ResourceKind::UniformBuffer | ResourceKind::StorageBuffer | ResourceKind::AtomicCounter
        )
    }

    /// The barrier domain that publishes shader writes to this kind.
    pub const fn barrier_domain(self) -> BarrierScope {
        match self {
            ResourceKind::UniformBuffer => BarrierScope::UNIFORM,
            ResourceKind::StorageBuffer => BarrierScope::SHADER_STORAGE,
            ResourceKind::AtomicCounter => BarrierScope::ATOMIC_COUNTER,
            ResourceKind::SampledTexture => BarrierScope::TEXTURE_FETCH,
            ResourceKind::StorageImage => BarrierScope::SHADER_IMAGE_ACCESS,
            ResourceKind::Sampler => BarrierScope::EMPTY,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::UniformBuffer => "uniform buffer",
            ResourceKind::StorageBuffer => "storage buffer",
            ResourceKind::AtomicCounter => "atomic counter",
            ResourceKind::SampledTexture => "sampled texture",
            ResourceKind::StorageImage => "storage image",
            ResourceKind::Sampler => "sampler",
        };
        f.write_str(name)
    }
}

/// One binding channel: a kind and an index within that kind's namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelSlot {
    /// The channel namespace.
    pub kind: ResourceKind,
    /// Index inside the namespace.
    pub index: u32,
}

impl ChannelSlot {
    /// Creates a channel slot.
    pub const fn new(kind: ResourceKind, index: u32) -> Self {
        Self { kind, index }
    }
}

impl fmt::Display for ChannelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} channel {}", self.kind, self.index)
    }
}

voxa_flags! {
    /// Memory domains covered by a barrier.
    ///
    /// Shader writes in a domain become visible to later commands only after a
    /// barrier naming that domain. Transfer commands (clears, uploads) and
    /// raster color output are always visible to subsequent commands.
    pub struct BarrierScope: u32 {
        /// Storage buffer loads, stores and atomics.
        const SHADER_STORAGE = 1 << 0;
        /// Storage image loads and stores.
        const SHADER_IMAGE_ACCESS = 1 << 1;
        /// Sampled texture fetches.
        const TEXTURE_FETCH = 1 << 2;
        /// Atomic counter buffers.
        const ATOMIC_COUNTER = 1 << 3;
        /// Uniform block reads.
        const UNIFORM = 1 << 4;
        /// Every domain.
        const ALL = 0b11111;
    }
}

voxa_flags! {
    /// Shader stages a resource is visible to.
    pub struct ShaderStages: u32 {
        /// Vertex stage.
        const VERTEX = 1 << 0;
        /// Fragment stage.
        const FRAGMENT = 1 << 1;
        /// Compute stage.
        const COMPUTE = 1 << 2;
    }
}

voxa_flags! {
    /// Access a shader performs on a resource.
    pub struct StorageAccess: u32 {
        /// The shader reads the resource.
        const LOAD = 1 << 0;
        /// The shader writes the resource.
        const STORE = 1 << 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_writable_kind_has_a_barrier_domain() {
        for kind in ResourceKind::ALL {
            if kind != ResourceKind::Sampler {
                assert!(!kind.barrier_domain().is_empty(), "{kind}");
            }
        }
        assert!(BarrierScope::ALL.contains(
            BarrierScope::SHADER_STORAGE | BarrierScope::SHADER_IMAGE_ACCESS
        ));
    }

    #[test]
    fn test_slot_display() {
        let slot = ChannelSlot::new(ResourceKind::AtomicCounter, 2);
        assert_eq!(format!("{slot}"), "atomic counter channel 2");
    }
}
