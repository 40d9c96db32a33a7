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

//! Voxelization lane - scene to voxel volume to cone traced frame

mod atomic_list;
mod axis_camera;
mod config;
mod cone_tracer;
mod error;
mod fragment_list;
mod mapping;
mod pipeline;
mod resolver;
pub mod shaders;

pub use atomic_list::*;
pub use axis_camera::*;
pub use config::*;
pub use cone_tracer::*;
pub use error::*;
pub use fragment_list::*;
pub use mapping::*;
pub use pipeline::*;
pub use resolver::*;
