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

//! Interface contracts backends implement and lanes consume.

mod command_encoder;
mod framebuffer;
mod graphics_device;
pub mod host_kernel;
mod technique_compiler;

pub use self::command_encoder::*;
pub use self::framebuffer::*;
pub use self::graphics_device::*;
pub use self::host_kernel::*;
pub use self::technique_compiler::*;
