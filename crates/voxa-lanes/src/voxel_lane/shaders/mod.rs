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

//! WGSL sources for the voxelization lanes, embedded at compile time.
//!
//! # Available Shaders
//!
//! - [`LIST_BUILD_WGSL`] - per-axis fragment list construction
//! - [`RESOLVE_WGSL`] - list walk into the accumulation buffer
//! - [`COMMIT_WGSL`] - accumulation buffer to the voxel volume
//! - [`CONE_TRACE_WGSL`] - full-screen voxel cone tracing
//!
//! Each source has a host kernel twin in its lane module so the same technique
//! runs on the reference device.

/// Vertex + fragment. Pushes every fragment onto its pixel's list through
/// `atomic_list_append`.
pub const LIST_BUILD_WGSL: &str = include_str!("list_build.wgsl");

/// Compute, 8×8 workgroups over the list grid.
pub const RESOLVE_WGSL: &str = include_str!("resolve.wgsl");

/// Compute, 4×4×4 workgroups over the volume.
pub const COMMIT_WGSL: &str = include_str!("commit.wgsl");

/// Vertex + fragment. Full-screen triangle, premultiplied output.
pub const CONE_TRACE_WGSL: &str = include_str!("cone_trace.wgsl");

/// Workgroup edge of the resolve pass.
pub const RESOLVE_WORKGROUP: u32 = 8;

/// Workgroup edge of the commit pass.
pub const COMMIT_WORKGROUP: u32 = 4;
