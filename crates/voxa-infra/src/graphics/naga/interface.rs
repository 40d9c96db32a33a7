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

//! [`ProgramInterface`] over a [`LinkedProgram`].

use super::LinkedProgram;
use voxa_core::renderer::reflection::{
    write_name_into, EntryPointInfo, InterfaceItem, ProgramInterface, RawMemberRecord,
    RawResourceRecord, RawVertexInput,
};

/// How a backend reports name lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameConvention {
    /// Reported lengths count the NUL terminator.
    IncludesTerminator,
    /// Reported lengths are the bare string length.
    ExcludesTerminator,
}

/// A linked program viewed through a backend's naming convention.
#[derive(Debug, Clone, Copy)]
pub struct LinkedInterface<'a> {
    pub program: &'a LinkedProgram,
    pub convention: NameConvention,
}

impl<'a> LinkedInterface<'a> {
    pub fn new(program: &'a LinkedProgram, convention: NameConvention) -> Self {
        Self {
            program,
            convention,
        }
    }

    fn name(&self, item: InterfaceItem) -> &'a str {
        let program = self.program;
        match item {
            InterfaceItem::Resource(index) => program
                .resources
                .get(index)
                .map_or("", |r| r.name.as_str()),
            InterfaceItem::Member { resource, member } => program
                .resources
                .get(resource)
                .and_then(|r| r.members.get(member))
                .map_or("", |(name, _)| name.as_str()),
            InterfaceItem::VertexInput(index) => program
                .vertex_inputs
                .get(index)
                .map_or("", |(name, _)| name.as_str()),
        }
    }
}

impl ProgramInterface for LinkedInterface<'_> {
    fn resource_count(&self) -> usize {
        self.program.resources.len()
    }

    fn member_count(&self, resource: usize) -> usize {
        self.program
            .resources
            .get(resource)
            .map_or(0, |r| r.members.len())
    }

    fn vertex_input_count(&self) -> usize {
        self.program.vertex_inputs.len()
    }

    fn name_length(&self, item: InterfaceItem) -> usize {
        let len = self.name(item).len();
        match self.convention {
            NameConvention::IncludesTerminator => len + 1,
            NameConvention::ExcludesTerminator => len,
        }
    }

    fn read_name(&self, item: InterfaceItem, buffer: &mut [u8]) -> usize {
        write_name_into(self.name(item), buffer)
    }

    fn resource(&self, index: usize) -> RawResourceRecord {
        self.program.resources[index].record.clone()
    }

    fn member(&self, resource: usize, member: usize) -> RawMemberRecord {
        self.program.resources[resource].members[member].1.clone()
    }

    fn vertex_input(&self, index: usize) -> RawVertexInput {
        self.program.vertex_inputs[index].1.clone()
    }

    fn entry_points(&self) -> Vec<EntryPointInfo> {
        self.program.entry_points.clone()
    }
}
