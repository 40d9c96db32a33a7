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

//! The raw program-interface query surface a backend exposes after linking.
//!
//! Backends report names the way a driver does: a reported length and a
//! copy into a caller-provided buffer. Drivers disagree on whether that length
//! counts the NUL terminator, so every name goes through
//! [`read_reflected_name`].

use super::element::ElementType;
use crate::renderer::api::binding::{ResourceKind, ShaderStages};
use crate::renderer::api::technique::ShaderStage;

/// Addresses a named item of a program interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceItem {
    /// A bindable resource, by index.
    Resource(usize),
    /// A member of a block-typed resource.
    Member {
        /// Index of the owning resource.
        resource: usize,
        /// Index of the member.
        member: usize,
    },
    /// A vertex stage input, by index.
    VertexInput(usize),
}

/// Everything a backend reports about a resource except its name.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResourceRecord {
    /// Class of the resource.
    pub kind: ResourceKind,
    /// Bind group.
    pub group: u32,
    /// Binding index inside the group.
    pub binding: u32,
    /// Type of the resource.
    pub element: ElementType,
    /// Stages that actually reference the resource.
    pub stages: ShaderStages,
    /// Whether any stage writes the resource.
    pub writable: bool,
}

/// Everything a backend reports about a block member except its name.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMemberRecord {
    /// Byte offset from the start of the block.
    pub offset: u64,
    /// Type of the member.
    pub element: ElementType,
}

/// Everything a backend reports about a vertex input except its name.
#[derive(Debug, Clone, PartialEq)]
pub struct RawVertexInput {
    /// `@location` of the input.
    pub location: u32,
    /// Type of the input.
    pub element: ElementType,
}

/// An entry point of a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPointInfo {
    /// Shader stage.
    pub stage: ShaderStage,
    /// Function name.
    pub name: String,
    /// Workgroup size, `[1, 1, 1]` outside compute.
    pub workgroup_size: [u32; 3],
}

/// Read access to the resources of a linked program.
pub trait ProgramInterface {
    /// Number of bindable resources.
    fn resource_count(&self) -> usize;

    /// Number of members of resource `resource`; 0 for non-block resources.
    fn member_count(&self, resource: usize) -> usize;

    /// Number of vertex stage inputs.
    fn vertex_input_count(&self) -> usize;

    /// The name length the backend reports for `item`. Backends differ in
    /// whether this counts the terminator.
    fn name_length(&self, item: InterfaceItem) -> usize;

    /// Copies the name of `item` into `buffer` as a NUL-terminated string,
    /// truncated to `buffer.len() - 1` bytes, and returns the number of bytes
    /// written before the terminator.
    fn read_name(&self, item: InterfaceItem, buffer: &mut [u8]) -> usize;

    /// Non-name properties of resource `index`.
    fn resource(&self, index: usize) -> RawResourceRecord;

    /// Non-name properties of a block member.
    fn member(&self, resource: usize, member: usize) -> RawMemberRecord;

    /// Non-name properties of vertex input `index`.
    fn vertex_input(&self, index: usize) -> RawVertexInput;

    /// Entry points present in the program.
    fn entry_points(&self) -> Vec<EntryPointInfo>;
}

/// Upper bound on the buffer [`read_reflected_name`] will grow to.
const MAX_NAME_CAPACITY: usize = 4096;

/// Reads the name of `item`, accepting lengths reported with or without the
/// NUL terminator.
///
/// The buffer always has room for one byte more than reported. If the backend
/// still fills it completely the report may have been short, so the read is
/// retried with a larger buffer.
pub fn read_reflected_name(interface: &dyn ProgramInterface, item: InterfaceItem) -> String {
    let mut capacity = (interface.name_length(item) + 1).max(2);
    loop {
        let mut buffer = vec![0u8; capacity];
        let written = interface.read_name(item, &mut buffer).min(capacity - 1);
        if written + 1 < capacity || capacity >= MAX_NAME_CAPACITY {
            let end = buffer[..written]
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(written);
            return String::from_utf8_lossy(&buffer[..end]).into_owned();
        }
        capacity = (capacity * 2).min(MAX_NAME_CAPACITY);
    }
}

/// Copies `name` into `buffer` following the [`ProgramInterface::read_name`]
/// contract. Backends use this to implement that method.
pub fn write_name_into(name: &str, buffer: &mut [u8]) -> usize {
    let Some(room) = buffer.len().checked_sub(1) else {
        return 0;
    };
    let n = name.len().min(room);
    buffer[..n].copy_from_slice(&name.as_bytes()[..n]);
    buffer[n] = 0;
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    /// An interface with one resource whose reported name length is configurable.
    struct OneName {
        name: &'static str,
        reported: usize,
    }

    impl ProgramInterface for OneName {
        fn resource_count(&self) -> usize {
            1
        }
        fn member_count(&self, _: usize) -> usize {
            0
        }
        fn vertex_input_count(&self) -> usize {
            0
        }
        fn name_length(&self, _: InterfaceItem) -> usize {
            self.reported
        }
        fn read_name(&self, _: InterfaceItem, buffer: &mut [u8]) -> usize {
            write_name_into(self.name, buffer)
        }
        fn resource(&self, _: usize) -> RawResourceRecord {
            unreachable!()
        }
        fn member(&self, _: usize, _: usize) -> RawMemberRecord {
            unreachable!()
        }
        fn vertex_input(&self, _: usize) -> RawVertexInput {
            unreachable!()
        }
        fn entry_points(&self) -> Vec<EntryPointInfo> {
            Vec::new()
        }
    }

    #[test]
    fn test_length_including_terminator() {
        let iface = OneName {
            name: "heads",
            reported: 6,
        };
        assert_eq!(read_reflected_name(&iface, InterfaceItem::Resource(0)), "heads");
    }

    #[test]
    fn test_length_one_byte_short() {
        let iface = OneName {
            name: "node_pool",
            reported: 9,
        };
        assert_eq!(
            read_reflected_name(&iface, InterfaceItem::Resource(0)),
            "node_pool"
        );
    }

    #[test]
    fn test_badly_underreported_length_is_recovered() {
        let iface = OneName {
            name: "allocation_counter",
            reported: 3,
        };
        assert_eq!(
            read_reflected_name(&iface, InterfaceItem::Resource(0)),
            "allocation_counter"
        );
    }

    #[test]
    fn test_write_name_truncates_and_terminates() {
        let mut buf = [0xffu8; 4];
        assert_eq!(write_name_into("volume", &mut buf), 3);
        assert_eq!(&buf, b"vol\0");
        assert_eq!(write_name_into("x", &mut []), 0);
    }
}
