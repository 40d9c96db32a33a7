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

//! Texel encoding for the formats the renderer uses.
//!
//! The reference backend stores textures as raw texel bytes and both backends
//! turn [`ClearValue`]s into fill patterns, so the encodings live here once.

use voxa_core::math::{saturate, LinearRgba, Vec4};
use voxa_core::renderer::api::{ClearValue, TextureFormat};
use voxa_core::renderer::ResourceError;

fn unsupported(format: TextureFormat) -> ResourceError {
    ResourceError::UnsupportedFormat(format!("{format:?} has no host texel codec"))
}

fn linear_to_srgb(c: f32) -> f32 {
    let c = saturate(c);
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn unorm8(c: f32) -> u8 {
    (saturate(c) * 255.0).round() as u8
}

/// Encodes one texel.
pub fn encode(format: TextureFormat, value: Vec4) -> Result<Vec<u8>, ResourceError> {
    let bytes = match format {
        TextureFormat::R8Unorm => vec![unorm8(value.x)],
        TextureFormat::R32Uint => (value.x.max(0.0).round() as u32).to_le_bytes().to_vec(),
        TextureFormat::R32Float | TextureFormat::Depth32Float => value.x.to_le_bytes().to_vec(),
        TextureFormat::Rgba8Unorm => LinearRgba::from(value).pack_rgba8().to_le_bytes().to_vec(),
        TextureFormat::Rgba8UnormSrgb => vec![
            unorm8(linear_to_srgb(value.x)),
            unorm8(linear_to_srgb(value.y)),
            unorm8(linear_to_srgb(value.z)),
            unorm8(value.w),
        ],
        TextureFormat::Bgra8Unorm => vec![
            unorm8(value.z),
            unorm8(value.y),
            unorm8(value.x),
            unorm8(value.w),
        ],
        TextureFormat::Bgra8UnormSrgb => vec![
            unorm8(linear_to_srgb(value.z)),
            unorm8(linear_to_srgb(value.y)),
            unorm8(linear_to_srgb(value.x)),
            unorm8(value.w),
        ],
        TextureFormat::Rgba32Float => bytemuck::cast_slice(&[value.x, value.y, value.z, value.w])
            .to_vec(),
        TextureFormat::Rgba16Float => return Err(unsupported(format)),
    };
    Ok(bytes)
}

/// Decodes one texel. Missing channels read as `0`, missing alpha as `1`.
pub fn decode(format: TextureFormat, bytes: &[u8]) -> Result<Vec4, ResourceError> {
    let size = format.bytes_per_texel() as usize;
    let bytes = bytes.get(..size).ok_or(ResourceError::OutOfBounds)?;
    let unorm = |i: usize| bytes[i] as f32 / 255.0;
    let word = |i: usize| [bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]];

    let texel = match format {
        TextureFormat::R8Unorm => Vec4::new(unorm(0), 0.0, 0.0, 1.0),
        TextureFormat::R32Uint => Vec4::new(u32::from_le_bytes(word(0)) as f32, 0.0, 0.0, 1.0),
        TextureFormat::R32Float | TextureFormat::Depth32Float => {
            Vec4::new(f32::from_le_bytes(word(0)), 0.0, 0.0, 1.0)
        }
        TextureFormat::Rgba8Unorm => LinearRgba::unpack_rgba8(u32::from_le_bytes(word(0))).into(),
        TextureFormat::Rgba8UnormSrgb => Vec4::new(
            srgb_to_linear(unorm(0)),
            srgb_to_linear(unorm(1)),
            srgb_to_linear(unorm(2)),
            unorm(3),
        ),
        TextureFormat::Bgra8Unorm => Vec4::new(unorm(2), unorm(1), unorm(0), unorm(3)),
        TextureFormat::Bgra8UnormSrgb => Vec4::new(
            srgb_to_linear(unorm(2)),
            srgb_to_linear(unorm(1)),
            srgb_to_linear(unorm(0)),
            unorm(3),
        ),
        TextureFormat::Rgba32Float => Vec4::new(
            f32::from_le_bytes(word(0)),
            f32::from_le_bytes(word(4)),
            f32::from_le_bytes(word(8)),
            f32::from_le_bytes(word(12)),
        ),
        TextureFormat::Rgba16Float => return Err(unsupported(format)),
    };
    Ok(texel)
}

/// The bytes of one texel filled by a clear.
///
/// `ClearValue::Uint` writes the raw word into 4-byte formats; for any other
/// size only `0` is accepted.
pub fn clear_pattern(format: TextureFormat, value: ClearValue) -> Result<Vec<u8>, ResourceError> {
    match value {
        ClearValue::Color(color) => encode(format, color.into()),
        ClearValue::Uint(word) if format.bytes_per_texel() == 4 => Ok(word.to_le_bytes().to_vec()),
        ClearValue::Uint(0) => Ok(vec![0; format.bytes_per_texel() as usize]),
        ClearValue::Uint(word) => Err(ResourceError::UnsupportedFormat(format!(
            "cannot clear {format:?} with raw word {word:#x}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rgba8_matches_pack4x8unorm_order() {
        let bytes = encode(TextureFormat::Rgba8Unorm, Vec4::new(1.0, 0.0, 0.0, 1.0)).unwrap();
        assert_eq!(bytes, [255, 0, 0, 255]);
        let back = decode(TextureFormat::Rgba8Unorm, &bytes).unwrap();
        assert_eq!(back, Vec4::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_bgra_swizzles_and_srgb_brightens_midtones() {
        let bytes = encode(TextureFormat::Bgra8UnormSrgb, Vec4::new(0.5, 0.0, 0.0, 1.0)).unwrap();
        assert_eq!(bytes[1], 0);
        assert!(bytes[2] > 128);
        let back = decode(TextureFormat::Bgra8UnormSrgb, &bytes).unwrap();
        assert_relative_eq!(back.x, 0.5, epsilon = 0.01);
    }

    #[test]
    fn test_clear_pattern_rules() {
        assert_eq!(
            clear_pattern(TextureFormat::Rgba8Unorm, ClearValue::Uint(0xff00_00ff)).unwrap(),
            [0xff, 0, 0, 0xff]
        );
        assert_eq!(
            clear_pattern(TextureFormat::R8Unorm, ClearValue::Uint(0)).unwrap(),
            [0]
        );
        assert!(clear_pattern(TextureFormat::R8Unorm, ClearValue::Uint(3)).is_err());
        assert!(encode(TextureFormat::Rgba16Float, Vec4::ZERO).is_err());
    }
}
