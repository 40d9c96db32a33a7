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

use crate::math::dimension::{Extent3D, Origin3D};
use crate::renderer::api::*;
use crate::renderer::error::{RenderError, ResourceError};
use crate::renderer::traits::CommandEncoder;
use std::fmt::Debug;

/// Owns GPU resources and executes recorded command lists.
///
/// Resource creation, uploads and debug readback happen immediately. Everything
/// that must be ordered against shader work is recorded on a [`CommandEncoder`]
/// and runs at [`submit`](GraphicsDevice::submit).
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Creates a new GPU buffer.
    /// ## Errors
    /// * `ResourceError::OutOfMemory` - If the size exceeds the device limit.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Creates a new GPU buffer and initializes it with the provided data.
    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError>;

    /// Writes data to a GPU buffer. The write lands before the next submission executes.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Copies a buffer back to the host.
    ///
    /// Blocks until all submitted work is complete. Debug and test use only.
    fn read_buffer(&self, id: BufferId) -> Result<Vec<u8>, ResourceError>;

    /// Destroys a GPU buffer.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Creates a new GPU texture.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Creates a 2D image. Mip levels are allocated when requested but only
    /// filled by [`CommandEncoder::generate_mipmaps`].
    fn create_image_2d(&self, descriptor: &ImageDescriptor) -> Result<TextureId, ResourceError> {
        self.create_texture(&descriptor.to_texture_descriptor(TextureDimension::D2))
    }

    /// Creates a 3D image. See [`create_image_2d`](GraphicsDevice::create_image_2d).
    fn create_image_3d(&self, descriptor: &ImageDescriptor) -> Result<TextureId, ResourceError> {
        self.create_texture(&descriptor.to_texture_descriptor(TextureDimension::D3))
    }

    /// Uploads tightly packed texel data into a region of one mip level.
    fn write_texture(
        &self,
        id: TextureId,
        mip_level: u32,
        origin: Origin3D,
        size: Extent3D,
        data: &[u8],
    ) -> Result<(), ResourceError>;

    /// Copies one mip level back to the host, tightly packed.
    ///
    /// Blocks until all submitted work is complete. Debug and test use only.
    fn read_texture(&self, id: TextureId, mip_level: u32) -> Result<Vec<u8>, ResourceError>;

    /// Destroys a GPU texture.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Creates a new sampler.
    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError>;

    /// Destroys a sampler.
    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError>;

    /// Creates a new command encoder to record GPU commands.
    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder>;

    /// Executes a command list in recorded order.
    ///
    /// A draw or dispatch whose bindings cannot be resolved is skipped with an
    /// error log; the rest of the list still runs.
    fn submit(&self, commands: CommandList) -> Result<(), RenderError>;

    /// Limits enforced by this device.
    fn limits(&self) -> DeviceLimits;

    /// Get the adapter information of the rendering system.
    fn adapter_info(&self) -> AdapterInfo;
}
