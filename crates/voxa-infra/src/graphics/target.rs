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

//! An offscreen colour target usable with any device.

use super::texel;
use std::borrow::Cow;
use voxa_core::math::{Extent2D, Extent3D, LinearRgba};
use voxa_core::renderer::api::{
    TextureDescriptor, TextureDimension, TextureFormat, TextureId, TextureUsage,
};
use voxa_core::renderer::{FramebufferProvider, GraphicsDevice, ResourceError};

/// A [`FramebufferProvider`] backed by a plain 2D texture.
///
/// Used for headless rendering and tests, where there is no window surface.
#[derive(Debug)]
pub struct OffscreenTarget {
    texture: TextureId,
    extent: Extent2D,
    format: TextureFormat,
    clear_color: LinearRgba,
}

impl OffscreenTarget {
    /// Allocates the target on `device`.
    pub fn new(
        device: &dyn GraphicsDevice,
        extent: Extent2D,
        format: TextureFormat,
    ) -> Result<Self, ResourceError> {
        let texture = device.create_texture(&TextureDescriptor {
            label: Some(Cow::Borrowed("offscreen_target")),
            size: Extent3D::new(extent.width.max(1), extent.height.max(1), 1),
            mip_level_count: 1,
            dimension: TextureDimension::D2,
            format,
            usage: TextureUsage::RENDER_ATTACHMENT
                | TextureUsage::COPY_SRC
                | TextureUsage::COPY_DST
                | TextureUsage::TEXTURE_BINDING,
        })?;
        Ok(Self {
            texture,
            extent,
            format,
            clear_color: LinearRgba::BLACK,
        })
    }

    /// Sets the colour reported by [`FramebufferProvider::clear_color`].
    pub fn with_clear_color(mut self, color: LinearRgba) -> Self {
        self.clear_color = color;
        self
    }

    /// Reads the target back as row-major linear colours.
    pub fn read_pixels(&self, device: &dyn GraphicsDevice) -> Result<Vec<LinearRgba>, ResourceError> {
        let bytes = device.read_texture(self.texture, 0)?;
        bytes
            .chunks_exact(self.format.bytes_per_texel() as usize)
            .map(|texel| texel::decode(self.format, texel).map(LinearRgba::from))
            .collect()
    }

    /// Releases the texture.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        device.destroy_texture(self.texture)
    }
}

impl FramebufferProvider for OffscreenTarget {
    fn color_target(&self) -> TextureId {
        self.texture
    }

    fn color_format(&self) -> TextureFormat {
        self.format
    }

    fn viewport(&self) -> Extent2D {
        self.extent
    }

    fn clear_color(&self) -> LinearRgba {
        self.clear_color
    }
}
