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

//! The reflection table built once per linked technique.

use super::element::ElementType;
use super::interface::{read_reflected_name, EntryPointInfo, InterfaceItem, ProgramInterface};
use crate::renderer::api::binding::{ResourceKind, ShaderStages};
use crate::renderer::api::technique::ShaderStage;

/// A member of a block-typed resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectedMember {
    /// Member name.
    pub name: String,
    /// Byte offset from the start of the block.
    pub offset: u64,
    /// Member type.
    pub element: ElementType,
}

/// A bindable resource discovered in a linked program.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectedResource {
    /// Variable name in the shader source.
    pub name: String,
    /// Resource class.
    pub kind: ResourceKind,
    /// Bind group.
    pub group: u32,
    /// Binding index inside the group.
    pub binding: u32,
    /// Resource type.
    pub element: ElementType,
    /// Stages that reference the resource.
    pub stages: ShaderStages,
    /// Whether any stage writes the resource.
    pub writable: bool,
    /// Members, for block-typed resources.
    pub members: Vec<ReflectedMember>,
}

/// A vertex stage input.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectedVertexInput {
    /// Parameter or member name.
    pub name: String,
    /// `@location` of the input.
    pub location: u32,
    /// Input type.
    pub element: ElementType,
}

/// Placement of a named resource or block member: `{binding, offset, stride, count}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceMetadata {
    /// Bind group of the owning resource.
    pub group: u32,
    /// Binding index of the owning resource.
    pub binding: u32,
    /// Byte offset inside the owning resource; 0 for a whole resource.
    pub offset: u64,
    /// Bytes between consecutive elements.
    pub stride: u64,
    /// Number of elements, `None` for a runtime-sized array.
    pub count: Option<u32>,
    /// Type at that location.
    pub element: ElementType,
}

/// Every resource, vertex input and entry point of a linked program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReflectionTable {
    resources: Vec<ReflectedResource>,
    vertex_inputs: Vec<ReflectedVertexInput>,
    entry_points: Vec<EntryPointInfo>,
}

impl ReflectionTable {
    /// Builds the table from a backend's program interface.
    pub fn from_interface(interface: &dyn ProgramInterface) -> Self {
        let resources = (0..interface.resource_count())
            .map(|index| {
                let raw = interface.resource(index);
                let members = (0..interface.member_count(index))
                    .map(|member| {
                        let m = interface.member(index, member);
                        ReflectedMember {
                            name: read_reflected_name(
                                interface,
                                InterfaceItem::Member {
                                    resource: index,
                                    member,
                                },
                            ),
                            offset: m.offset,
                            element: m.element,
                        }
                    })
                    .collect();
                ReflectedResource {
                    name: read_reflected_name(interface, InterfaceItem::Resource(index)),
                    kind: raw.kind,
                    group: raw.group,
                    binding: raw.binding,
                    element: raw.element,
                    stages: raw.stages,
                    writable: raw.writable,
                    members,
                }
            })
            .collect();

        let vertex_inputs = (0..interface.vertex_input_count())
            .map(|index| {
                let raw = interface.vertex_input(index);
                ReflectedVertexInput {
                    name: read_reflected_name(interface, InterfaceItem::VertexInput(index)),
                    location: raw.location,
                    element: raw.element,
                }
            })
            .collect();

        Self {
            resources,
            vertex_inputs,
            entry_points: interface.entry_points(),
        }
    }

    /// All reflected resources, in interface order.
    pub fn resources(&self) -> &[ReflectedResource] {
        &self.resources
    }

    /// Vertex stage inputs.
    pub fn vertex_inputs(&self) -> &[ReflectedVertexInput] {
        &self.vertex_inputs
    }

    /// Entry points.
    pub fn entry_points(&self) -> &[EntryPointInfo] {
        &self.entry_points
    }

    /// The entry point for `stage`, if any.
    pub fn entry_point(&self, stage: ShaderStage) -> Option<&EntryPointInfo> {
        self.entry_points.iter().find(|e| e.stage == stage)
    }

    /// Index of the resource called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.resources.iter().position(|r| r.name == name)
    }

    /// The resource called `name`.
    pub fn resource(&self, name: &str) -> Option<&ReflectedResource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Looks up `name` of class `kind`. A dotted name such as `"axis.view_proj"`
    /// resolves a member of a block resource.
    pub fn layout_of(&self, name: &str, kind: ResourceKind) -> Option<ResourceMetadata> {
        let (block, member) = match name.split_once('.') {
            Some((block, member)) => (block, Some(member)),
            None => (name, None),
        };
        let resource = self
            .resources
            .iter()
            .find(|r| r.name == block && r.kind == kind)?;

        match member {
            None => Some(ResourceMetadata {
                group: resource.group,
                binding: resource.binding,
                offset: 0,
                stride: resource.element.stride(),
                count: resource.element.count(),
                element: resource.element.clone(),
            }),
            Some(member) => {
                let m = resource.members.iter().find(|m| m.name == member)?;
                Some(ResourceMetadata {
                    group: resource.group,
                    binding: resource.binding,
                    offset: m.offset,
                    stride: m.element.stride(),
                    count: m.element.count(),
                    element: m.element.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::reflection::element::ScalarType;
    use crate::renderer::reflection::interface::{
        write_name_into, RawMemberRecord, RawResourceRecord, RawVertexInput,
    };

    /// A two-resource interface that reports name lengths one byte short.
    struct ShortLengths;

    const NAMES: [&str; 2] = ["axis", "heads"];
    const MEMBERS: [&str; 2] = ["view_proj", "resolution"];

    impl ProgramInterface for ShortLengths {
        fn resource_count(&self) -> usize {
            2
        }
        fn member_count(&self, resource: usize) -> usize {
            if resource == 0 {
                2
            } else {
                0
            }
        }
        fn vertex_input_count(&self) -> usize {
            1
        }
        fn name_length(&self, item: InterfaceItem) -> usize {
            match item {
                InterfaceItem::Resource(i) => NAMES[i].len(),
                InterfaceItem::Member { member, .. } => MEMBERS[member].len(),
                InterfaceItem::VertexInput(_) => "position".len(),
            }
        }
        fn read_name(&self, item: InterfaceItem, buffer: &mut [u8]) -> usize {
            let name = match item {
                InterfaceItem::Resource(i) => NAMES[i],
                InterfaceItem::Member { member, .. } => MEMBERS[member],
                InterfaceItem::VertexInput(_) => "position",
            };
            write_name_into(name, buffer)
        }
        fn resource(&self, index: usize) -> RawResourceRecord {
            match index {
                0 => RawResourceRecord {
                    kind: ResourceKind::UniformBuffer,
                    group: 0,
                    binding: 0,
                    element: ElementType::Struct {
                        size: 80,
                        alignment: 16,
                    },
                    stages: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                    writable: false,
                },
                _ => RawResourceRecord {
                    kind: ResourceKind::StorageBuffer,
                    group: 0,
                    binding: 1,
                    element: ElementType::Array {
                        element: Box::new(ElementType::Atomic(ScalarType::U32)),
                        count: None,
                        stride: 4,
                    },
                    stages: ShaderStages::FRAGMENT,
                    writable: true,
                },
            }
        }
        fn member(&self, _: usize, member: usize) -> RawMemberRecord {
            match member {
                0 => RawMemberRecord {
                    offset: 0,
                    element: ElementType::Matrix {
                        columns: 4,
                        rows: 4,
                    },
                },
                _ => RawMemberRecord {
                    offset: 64,
                    element: ElementType::Scalar(ScalarType::U32),
                },
            }
        }
        fn vertex_input(&self, _: usize) -> RawVertexInput {
            RawVertexInput {
                location: 0,
                element: ElementType::Vector {
                    scalar: ScalarType::F32,
                    components: 3,
                },
            }
        }
        fn entry_points(&self) -> Vec<EntryPointInfo> {
            Vec::new()
        }
    }

    #[test]
    fn test_table_names_survive_short_lengths() {
        let table = ReflectionTable::from_interface(&ShortLengths);
        let names: Vec<_> = table.resources().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["axis", "heads"]);
        assert_eq!(table.vertex_inputs()[0].name, "position");
    }

    #[test]
    fn test_member_layout_reports_offset() {
        let table = ReflectionTable::from_interface(&ShortLengths);
        let meta = table
            .layout_of("axis.resolution", ResourceKind::UniformBuffer)
            .unwrap();
        assert_eq!(meta.offset, 64);
        assert_eq!(meta.stride, 4);
        assert_eq!(meta.count, Some(1));
    }

    #[test]
    fn test_layout_of_requires_matching_kind() {
        let table = ReflectionTable::from_interface(&ShortLengths);
        assert!(table.layout_of("heads", ResourceKind::UniformBuffer).is_none());
        let heads = table.layout_of("heads", ResourceKind::StorageBuffer).unwrap();
        assert_eq!(heads.binding, 1);
        assert_eq!(heads.count, None);
        assert!(table.layout_of("missing", ResourceKind::StorageBuffer).is_none());
    }
}
