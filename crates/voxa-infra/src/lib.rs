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

//! # Voxa Infra
//!
//! Concrete implementations of the `voxa-core` rendering contracts.
//!
//! Two backends live here:
//! - [`WgpuDevice`], a wgpu device that translates recorded command lists
//!   into wgpu passes at submit time.
//! - [`ReferenceDevice`], a CPU rasterizer and compute executor with an
//!   explicit memory-visibility model, used to test ordering and barriers.
//!
//! Both compile techniques through the same naga-based link step in
//! [`graphics::naga`].

pub mod graphics;

pub use graphics::naga::{link_technique, LinkedProgram, NameConvention};
pub use graphics::reference::ReferenceDevice;
pub use graphics::target::OffscreenTarget;
pub use graphics::wgpu::{WgpuDevice, WgpuGraphicsContext};
