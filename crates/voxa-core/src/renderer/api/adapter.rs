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

//! Adapter information and device limits.

/// The graphics API a device runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GraphicsBackendType {
    /// Vulkan.
    Vulkan,
    /// Metal.
    Metal,
    /// Direct3D 12.
    Dx12,
    /// OpenGL / WebGL.
    OpenGL,
    /// WebGPU in the browser.
    WebGpu,
    /// The CPU reference implementation.
    Reference,
    /// Unknown or not yet reported.
    #[default]
    Unknown,
}

/// Backend-agnostic description of the adapter a device was created on.
#[derive(Debug, Clone, Default)]
pub struct AdapterInfo {
    /// Adapter name as reported by the driver.
    pub name: String,
    /// Graphics API in use.
    pub backend_type: GraphicsBackendType,
}

/// Limits a device enforces on resource creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Largest buffer in bytes.
    pub max_buffer_size: u64,
    /// Largest storage buffer binding in bytes.
    pub max_storage_buffer_binding_size: u64,
    /// Largest edge of a 2D texture.
    pub max_texture_dimension_2d: u32,
    /// Largest edge of a 3D texture.
    pub max_texture_dimension_3d: u32,
    /// Whether samplers may use [`AddressMode::ClampToBorder`](super::texture::AddressMode::ClampToBorder).
    pub supports_clamp_to_border: bool,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_buffer_size: 256 << 20,
            max_storage_buffer_binding_size: 128 << 20,
            max_texture_dimension_2d: 8192,
            max_texture_dimension_3d: 2048,
            supports_clamp_to_border: false,
        }
    }
}
