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

//! Texture, image and sampler descriptions.

use crate::math::dimension::Extent3D;
use crate::voxa_flags;
use std::borrow::Cow;

/// An opaque handle to a texture or image resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);

/// An opaque handle to a sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SamplerId(pub usize);

/// The dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    /// A two-dimensional texture or image.
    D2,
    /// A three-dimensional (volume) texture or image.
    D3,
}

/// Texel formats supported by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// One 8-bit normalized channel.
    R8Unorm,
    /// One 32-bit unsigned integer channel.
    R32Uint,
    /// One 32-bit float channel.
    R32Float,
    /// Four 8-bit normalized channels, linear.
    Rgba8Unorm,
    /// Four 8-bit normalized channels, sRGB encoded.
    Rgba8UnormSrgb,
    /// Four 8-bit normalized channels in BGRA order, linear.
    Bgra8Unorm,
    /// Four 8-bit normalized channels in BGRA order, sRGB encoded.
    Bgra8UnormSrgb,
    /// Four 16-bit float channels.
    Rgba16Float,
    /// Four 32-bit float channels.
    Rgba32Float,
    /// 32-bit float depth.
    Depth32Float,
}

impl TextureFormat {
    /// Size of one texel in bytes.
    pub const fn bytes_per_texel(self) -> u32 {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::R32Uint
            | TextureFormat::R32Float
            | TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Depth32Float => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }

    /// Returns `true` for depth formats.
    pub const fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }

    /// Returns `true` if the format stores sRGB-encoded color.
    pub const fn is_srgb(self) -> bool {
        matches!(
            self,
            TextureFormat::Rgba8UnormSrgb | TextureFormat::Bgra8UnormSrgb
        )
    }
}

voxa_flags! {
    /// Allowed usages of a texture.
    pub struct TextureUsage: u32 {
        /// The texture can be the source of a copy or readback.
        const COPY_SRC = 1 << 0;
        /// The texture can be the destination of a copy, upload or clear.
        const COPY_DST = 1 << 1;
        /// The texture can be sampled in a shader.
        const TEXTURE_BINDING = 1 << 2;
        /// The texture can be bound as a read/write image.
        const STORAGE_BINDING = 1 << 3;
        /// The texture can be used as a color or depth attachment.
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

/// A full texture description.
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Size of mip level 0.
    pub size: Extent3D,
    /// Number of mip levels, at least 1.
    pub mip_level_count: u32,
    /// 2D or 3D.
    pub dimension: TextureDimension,
    /// Texel format.
    pub format: TextureFormat,
    /// Allowed usages.
    pub usage: TextureUsage,
}

/// The `CreateImage2D` / `CreateImage3D` request.
///
/// When `mipmapped` is set the texture is allocated with a full mip chain, but
/// the lower levels stay undefined until
/// [`CommandEncoder::generate_mipmaps`](crate::renderer::traits::CommandEncoder::generate_mipmaps)
/// is recorded.
#[derive(Debug, Clone)]
pub struct ImageDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth in texels. Ignored for 2D images.
    pub depth: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Allocate a full mip chain.
    pub mipmapped: bool,
    /// Allowed usages.
    pub usage: TextureUsage,
}

impl<'a> ImageDescriptor<'a> {
    /// Converts into a [`TextureDescriptor`] of the given dimension.
    pub fn to_texture_descriptor(&self, dimension: TextureDimension) -> TextureDescriptor<'a> {
        let depth = match dimension {
            TextureDimension::D2 => 1,
            TextureDimension::D3 => self.depth.max(1),
        };
        let size = Extent3D::new(self.width.max(1), self.height.max(1), depth);
        TextureDescriptor {
            label: self.label.clone(),
            size,
            mip_level_count: if self.mipmapped {
                size.max_mip_levels()
            } else {
                1
            },
            dimension,
            format: self.format,
            usage: self.usage,
        }
    }
}

/// How texture coordinates outside `[0, 1]` are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    /// Clamp to the edge texel.
    #[default]
    ClampToEdge,
    /// Wrap around.
    Repeat,
    /// Return the sampler's border color.
    ClampToBorder,
}

/// Texel filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Nearest texel.
    #[default]
    Nearest,
    /// Linear interpolation between texels.
    Linear,
}

/// Border color used by [`AddressMode::ClampToBorder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerBorderColor {
    /// `[0, 0, 0, 0]`.
    #[default]
    TransparentBlack,
    /// `[0, 0, 0, 1]`.
    OpaqueBlack,
    /// `[1, 1, 1, 1]`.
    OpaqueWhite,
}

/// A sampler description.
#[derive(Debug, Clone)]
pub struct SamplerDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Addressing on all three axes.
    pub address_mode: AddressMode,
    /// Magnification filter.
    pub mag_filter: FilterMode,
    /// Minification filter.
    pub min_filter: FilterMode,
    /// Filter between mip levels.
    pub mipmap_filter: FilterMode,
    /// Minimum level of detail.
    pub lod_min_clamp: f32,
    /// Maximum level of detail.
    pub lod_max_clamp: f32,
    /// Border color, used only with [`AddressMode::ClampToBorder`].
    pub border_color: SamplerBorderColor,
}

impl Default for SamplerDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: None,
            address_mode: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mipmap_filter: FilterMode::Nearest,
            lod_min_clamp: 0.0,
            lod_max_clamp: 32.0,
            border_color: SamplerBorderColor::TransparentBlack,
        }
    }
}

impl SamplerDescriptor<'_> {
    /// Trilinear filtering with a transparent border outside the unit cube.
    pub fn trilinear_transparent_border() -> Self {
        Self {
            label: Some(Cow::Borrowed("trilinear_transparent_border")),
            address_mode: AddressMode::ClampToBorder,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            border_color: SamplerBorderColor::TransparentBlack,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mipmapped_image_gets_full_chain() {
        let desc = ImageDescriptor {
            label: None,
            width: 64,
            height: 64,
            depth: 64,
            format: TextureFormat::Rgba8Unorm,
            mipmapped: true,
            usage: TextureUsage::TEXTURE_BINDING,
        };
        let tex = desc.to_texture_descriptor(TextureDimension::D3);
        assert_eq!(tex.mip_level_count, 7);
        let flat = desc.to_texture_descriptor(TextureDimension::D2);
        assert_eq!(flat.size.depth, 1);
    }

    #[test]
    fn test_texel_sizes() {
        assert_eq!(TextureFormat::Rgba8Unorm.bytes_per_texel(), 4);
        assert_eq!(TextureFormat::Rgba32Float.bytes_per_texel(), 16);
        assert!(TextureFormat::Depth32Float.is_depth());
    }
}
