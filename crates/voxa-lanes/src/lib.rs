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

//! # Voxa Lanes
//!
//! The voxelization hot path: per-axis fragment list construction, volume
//! resolve and voxel cone tracing, sequenced by [`VoxelizationPipeline`].
//!
//! Lanes only talk to the contracts in `voxa-core`, so the same code runs on
//! the wgpu device and on the CPU reference device.

pub mod voxel_lane;

pub use voxel_lane::*;
