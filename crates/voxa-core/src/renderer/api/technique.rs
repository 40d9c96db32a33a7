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

//! Technique descriptions and the bind-after-link type-state builder.
//!
//! A [`TechniqueCompiler`](crate::renderer::traits::TechniqueCompiler) turns a
//! [`TechniqueDescriptor`] into an [`UnboundTechnique`]. Channels are assigned on
//! the unbound value and [`UnboundTechnique::build`] produces a [`Technique`],
//! the only type a pass accepts.

use super::binding::{ChannelSlot, ResourceKind, ShaderStages};
use super::pipeline::{RasterState, VertexLayout};
use super::texture::TextureFormat;
use crate::renderer::error::BindingError;
use crate::renderer::reflection::{ReflectedResource, ReflectionTable, ResourceMetadata};
use crate::renderer::traits::HostKernel;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage.
    Vertex,
    /// Fragment stage.
    Fragment,
    /// Compute stage.
    Compute,
}

impl ShaderStage {
    /// The single-stage visibility mask for this stage.
    pub const fn as_flag(self) -> ShaderStages {
        match self {
            ShaderStage::Vertex => ShaderStages::VERTEX,
            ShaderStage::Fragment => ShaderStages::FRAGMENT,
            ShaderStage::Compute => ShaderStages::COMPUTE,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
        })
    }
}

/// WGSL source for one stage.
#[derive(Debug, Clone)]
pub struct StageSource {
    /// Stage this source provides.
    pub stage: ShaderStage,
    /// Name of the entry point function.
    pub entry_point: Cow<'static, str>,
    /// WGSL module text.
    pub source: Cow<'static, str>,
}

impl StageSource {
    /// Builds a stage from static source text.
    pub fn new(stage: ShaderStage, entry_point: &'static str, source: &'static str) -> Self {
        Self {
            stage,
            entry_point: Cow::Borrowed(entry_point),
            source: Cow::Borrowed(source),
        }
    }
}

/// A resource the technique expects its shaders to expose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDeclaration {
    /// Variable name in the shader.
    pub name: String,
    /// Resource class.
    pub kind: ResourceKind,
    /// Optional resources may be absent from the linked program.
    pub optional: bool,
}

impl ResourceDeclaration {
    /// A resource that must be present after link.
    pub fn required(name: &str, kind: ResourceKind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            optional: false,
        }
    }

    /// A resource the shaders may omit.
    pub fn optional(name: &str, kind: ResourceKind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            optional: true,
        }
    }
}

/// Everything needed to compile and link a technique.
#[derive(Debug, Clone)]
pub struct TechniqueDescriptor {
    /// Debug label, used in errors and logs.
    pub label: String,
    /// Vertex and fragment stages, or a single compute stage.
    pub stages: Vec<StageSource>,
    /// Declared resource interface.
    pub interface: Vec<ResourceDeclaration>,
    /// Fixed-function state for raster techniques.
    pub raster: RasterState,
    /// Vertex buffer layout, if the vertex stage reads attributes.
    pub vertex_layout: Option<VertexLayout>,
    /// Format of the colour target a raster technique renders into.
    pub color_format: Option<TextureFormat>,
    /// CPU implementation of the stages, executed by host backends only.
    pub host_kernel: Option<Arc<dyn HostKernel>>,
}

impl TechniqueDescriptor {
    /// Returns `true` if the technique has a compute stage.
    pub fn is_compute(&self) -> bool {
        self.stages.iter().any(|s| s.stage == ShaderStage::Compute)
    }

    /// The source for `stage`, if present.
    pub fn stage(&self, stage: ShaderStage) -> Option<&StageSource> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// The declaration for `name`, if present.
    pub fn declaration(&self, name: &str) -> Option<&ResourceDeclaration> {
        self.interface.iter().find(|d| d.name == name)
    }
}

/// Opaque handle to a linked program owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub usize);

/// A linked technique whose resources have not all been given channels yet.
#[derive(Debug)]
pub struct UnboundTechnique {
    program: ProgramId,
    label: String,
    reflection: Arc<ReflectionTable>,
    channels: Vec<Option<u32>>,
}

impl UnboundTechnique {
    /// Wraps a freshly linked program. Every channel starts unassigned.
    pub fn new(program: ProgramId, label: impl Into<String>, reflection: ReflectionTable) -> Self {
        let channels = vec![None; reflection.resources().len()];
        Self {
            program,
            label: label.into(),
            reflection: Arc::new(reflection),
            channels,
        }
    }

    /// The backend program handle.
    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// The reflection table discovered at link.
    pub fn reflection(&self) -> &ReflectionTable {
        &self.reflection
    }

    /// Placement of `name` (or `"block.member"`) of class `kind`.
    ///
    /// A missing name is not fatal. Callers treat it as an absent optional resource.
    pub fn resolve_resource_layout(
        &self,
        name: &str,
        kind: ResourceKind,
    ) -> Result<ResourceMetadata, BindingError> {
        self.reflection
            .layout_of(name, kind)
            .ok_or_else(|| self.lookup_error(name, kind))
    }

    /// Places resource `name` in channel `channel` of its class.
    pub fn assign(&mut self, name: &str, channel: u32) -> Result<&mut Self, BindingError> {
        let index = self
            .reflection
            .position(name)
            .ok_or_else(|| BindingError::ResourceNotFound {
                technique: self.label.clone(),
                name: name.to_owned(),
            })?;
        self.channels[index] = Some(channel);
        Ok(self)
    }

    /// Like [`assign`](Self::assign), returning `false` if the shaders do not use `name`.
    pub fn assign_optional(&mut self, name: &str, channel: u32) -> bool {
        match self.reflection.position(name) {
            Some(index) => {
                self.channels[index] = Some(channel);
                true
            }
            None => {
                log::debug!(
                    "Technique '{}': optional resource '{name}' is not referenced",
                    self.label
                );
                false
            }
        }
    }

    /// Seals the channel map. Fails if any reflected resource is still unassigned.
    pub fn build(self) -> Result<Technique, BindingError> {
        let names: Vec<String> = self
            .reflection
            .resources()
            .iter()
            .zip(&self.channels)
            .filter(|(_, channel)| channel.is_none())
            .map(|(resource, _)| resource.name.clone())
            .collect();
        if !names.is_empty() {
            return Err(BindingError::Unassigned {
                technique: self.label,
                names,
            });
        }

        let channels = self.channels.into_iter().flatten().collect();
        Ok(Technique {
            inner: Arc::new(TechniqueInner {
                program: self.program,
                label: self.label,
                reflection: self.reflection,
                channels,
            }),
        })
    }

    fn lookup_error(&self, name: &str, kind: ResourceKind) -> BindingError {
        let block = name.split_once('.').map_or(name, |(block, _)| block);
        match self.reflection.resource(block) {
            Some(found) if found.kind != kind => BindingError::KindMismatch {
                technique: self.label.clone(),
                name: name.to_owned(),
                expected: kind,
                found: found.kind,
            },
            _ => BindingError::ResourceNotFound {
                technique: self.label.clone(),
                name: name.to_owned(),
            },
        }
    }
}

#[derive(Debug)]
struct TechniqueInner {
    program: ProgramId,
    label: String,
    reflection: Arc<ReflectionTable>,
    channels: Vec<u32>,
}

/// A linked technique with every resource assigned to a channel.
///
/// Cheap to clone. The channel map is immutable for the technique's lifetime.
#[derive(Debug, Clone)]
pub struct Technique {
    inner: Arc<TechniqueInner>,
}

impl Technique {
    /// The backend program handle.
    pub fn program(&self) -> ProgramId {
        self.inner.program
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// The reflection table discovered at link.
    pub fn reflection(&self) -> &ReflectionTable {
        &self.inner.reflection
    }

    /// The channel slot of the resource at reflection index `resource`.
    pub fn slot_of(&self, resource: usize) -> Option<ChannelSlot> {
        let kind = self.inner.reflection.resources().get(resource)?.kind;
        let index = *self.inner.channels.get(resource)?;
        Some(ChannelSlot::new(kind, index))
    }

    /// Every reflected resource paired with its channel slot.
    pub fn bindings(&self) -> impl Iterator<Item = (&ReflectedResource, ChannelSlot)> + '_ {
        self.inner
            .reflection
            .resources()
            .iter()
            .zip(&self.inner.channels)
            .map(|(resource, &index)| (resource, ChannelSlot::new(resource.kind, index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::reflection::{
        write_name_into, ElementType, EntryPointInfo, InterfaceItem, ProgramInterface,
        RawMemberRecord, RawResourceRecord, RawVertexInput, ScalarType,
    };

    struct TwoBuffers;

    const NAMES: [&str; 2] = ["heads", "counter"];

    impl ProgramInterface for TwoBuffers {
        fn resource_count(&self) -> usize {
            2
        }
        fn member_count(&self, _: usize) -> usize {
            0
        }
        fn vertex_input_count(&self) -> usize {
            0
        }
        fn name_length(&self, item: InterfaceItem) -> usize {
            match item {
                InterfaceItem::Resource(i) => NAMES[i].len() + 1,
                _ => 0,
            }
        }
        fn read_name(&self, item: InterfaceItem, buffer: &mut [u8]) -> usize {
            match item {
                InterfaceItem::Resource(i) => write_name_into(NAMES[i], buffer),
                _ => write_name_into("", buffer),
            }
        }
        fn resource(&self, index: usize) -> RawResourceRecord {
            RawResourceRecord {
                kind: if index == 0 {
                    ResourceKind::StorageBuffer
                } else {
                    ResourceKind::AtomicCounter
                },
                group: 0,
                binding: index as u32,
                element: ElementType::Atomic(ScalarType::U32),
                stages: ShaderStages::FRAGMENT,
                writable: true,
            }
        }
        fn member(&self, _: usize, _: usize) -> RawMemberRecord {
            unreachable!("no block members")
        }
        fn vertex_input(&self, _: usize) -> RawVertexInput {
            unreachable!("no vertex inputs")
        }
        fn entry_points(&self) -> Vec<EntryPointInfo> {
            Vec::new()
        }
    }

    fn unbound() -> UnboundTechnique {
        UnboundTechnique::new(
            ProgramId(7),
            "list_build",
            ReflectionTable::from_interface(&TwoBuffers),
        )
    }

    #[test]
    fn test_build_requires_every_channel() {
        let mut technique = unbound();
        technique.assign("heads", 0).unwrap();
        match technique.build() {
            Err(BindingError::Unassigned { names, .. }) => assert_eq!(names, ["counter"]),
            other => panic!("expected Unassigned, got {other:?}"),
        }
    }

    #[test]
    fn test_assigned_slots_keep_their_kind() {
        let mut unbound = unbound();
        unbound.assign("heads", 3).unwrap().assign("counter", 1).unwrap();
        let technique = unbound.build().unwrap();
        assert_eq!(
            technique.slot_of(0),
            Some(ChannelSlot::new(ResourceKind::StorageBuffer, 3))
        );
        assert_eq!(
            technique.slot_of(1),
            Some(ChannelSlot::new(ResourceKind::AtomicCounter, 1))
        );
        assert_eq!(technique.bindings().count(), 2);
    }

    #[test]
    fn test_missing_names_are_reported_not_fatal() {
        let mut technique = unbound();
        assert!(matches!(
            technique.assign("volume", 0),
            Err(BindingError::ResourceNotFound { .. })
        ));
        assert!(!technique.assign_optional("volume", 0));
        assert!(matches!(
            technique.resolve_resource_layout("counter", ResourceKind::StorageBuffer),
            Err(BindingError::KindMismatch { .. })
        ));
        assert!(technique
            .resolve_resource_layout("counter", ResourceKind::AtomicCounter)
            .is_ok());
    }
}
