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

//! Every shipped technique links through naga, and the reflected interface
//! matches the host-side uniform structs and channel plan.

use voxa_core::renderer::api::{ResourceKind, ShaderStages, TextureFormat};
use voxa_infra::{link_technique, LinkedProgram};
use voxa_lanes::{
    commit_descriptor, cone_trace_descriptor, list_build_descriptor, resolve_descriptor,
    shaders::{COMMIT_WORKGROUP, RESOLVE_WORKGROUP},
};

fn kinds(program: &LinkedProgram) -> Vec<(&str, ResourceKind)> {
    program
        .resources
        .iter()
        .map(|r| (r.name.as_str(), r.record.kind))
        .collect()
}

fn member_offsets<'p>(program: &'p LinkedProgram, name: &str) -> Vec<(&'p str, u64)> {
    program
        .resources
        .iter()
        .find(|r| r.name == name)
        .map(|r| r.members.iter().map(|(n, m)| (n.as_str(), m.offset)).collect())
        .unwrap_or_default()
}

fn stages(program: &LinkedProgram, name: &str) -> Option<ShaderStages> {
    program
        .resources
        .iter()
        .find(|r| r.name == name)
        .map(|r| r.record.stages)
}

#[test]
fn test_list_build_interface() {
    let program = link_technique(&list_build_descriptor()).unwrap();
    let mut found = kinds(&program);
    found.sort();
    let mut expected = vec![
        ("axis", ResourceKind::UniformBuffer),
        ("objects", ResourceKind::StorageBuffer),
        ("heads", ResourceKind::StorageBuffer),
        ("nodes", ResourceKind::StorageBuffer),
        ("counter", ResourceKind::AtomicCounter),
    ];
    expected.sort();
    assert_eq!(found, expected);

    assert_eq!(
        member_offsets(&program, "axis"),
        [("view_proj", 0), ("volume", 64), ("grid", 80)]
    );
    assert_eq!(
        stages(&program, "axis"),
        Some(ShaderStages::VERTEX | ShaderStages::FRAGMENT)
    );
    assert_eq!(stages(&program, "heads"), Some(ShaderStages::FRAGMENT));
    assert_eq!(program.vertex_inputs.len(), 1);
}

#[test]
fn test_resolve_and_commit_interfaces() {
    let resolve = link_technique(&resolve_descriptor()).unwrap();
    assert_eq!(
        resolve.workgroup_size(),
        [RESOLVE_WORKGROUP, RESOLVE_WORKGROUP, 1]
    );
    assert_eq!(member_offsets(&resolve, "resolve"), [("grid", 0)]);
    assert!(resolve
        .resources
        .iter()
        .find(|r| r.name == "accumulation")
        .is_some_and(|r| r.record.writable));

    let commit = link_technique(&commit_descriptor()).unwrap();
    assert_eq!(commit.workgroup_size(), [COMMIT_WORKGROUP; 3]);
    assert!(kinds(&commit).contains(&("volume", ResourceKind::StorageImage)));
    assert_eq!(stages(&commit, "volume"), Some(ShaderStages::COMPUTE));
}

#[test]
fn test_cone_trace_interface() {
    let program = link_technique(&cone_trace_descriptor(TextureFormat::Rgba8Unorm)).unwrap();
    let mut found = kinds(&program);
    found.sort();
    let mut expected = vec![
        ("trace", ResourceKind::UniformBuffer),
        ("voxels", ResourceKind::SampledTexture),
        ("voxel_sampler", ResourceKind::Sampler),
    ];
    expected.sort();
    assert_eq!(found, expected);
    assert_eq!(
        member_offsets(&program, "trace"),
        [("inv_view_proj", 0), ("volume", 64), ("params", 80)]
    );
    assert_eq!(stages(&program, "trace"), Some(ShaderStages::FRAGMENT));
    assert!(program.vertex_inputs.is_empty());
}
