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

//! Filtered texture sampling over visible texels.

use super::memory::TextureEntry;
use crate::graphics::texel;
use voxa_core::math::{Vec3, Vec4};
use voxa_core::renderer::api::{
    AddressMode, FilterMode, SamplerBorderColor, SamplerDescriptor, TextureDimension,
};
use voxa_core::renderer::ResourceError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SamplerState {
    pub address_mode: AddressMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
    pub border_color: SamplerBorderColor,
}

impl From<&SamplerDescriptor<'_>> for SamplerState {
    fn from(descriptor: &SamplerDescriptor<'_>) -> Self {
        Self {
            address_mode: descriptor.address_mode,
            mag_filter: descriptor.mag_filter,
            min_filter: descriptor.min_filter,
            mipmap_filter: descriptor.mipmap_filter,
            lod_min_clamp: descriptor.lod_min_clamp,
            lod_max_clamp: descriptor.lod_max_clamp,
            border_color: descriptor.border_color,
        }
    }
}

fn border(color: SamplerBorderColor) -> Vec4 {
    match color {
        SamplerBorderColor::TransparentBlack => Vec4::ZERO,
        SamplerBorderColor::OpaqueBlack => Vec4::W,
        SamplerBorderColor::OpaqueWhite => Vec4::new(1.0, 1.0, 1.0, 1.0),
    }
}

/// Applies the address mode to one integer texel coordinate.
fn address(mode: AddressMode, i: i64, size: u32) -> Option<u32> {
    let n = size as i64;
    match mode {
        AddressMode::ClampToEdge => Some(i.clamp(0, n - 1) as u32),
        AddressMode::Repeat => Some(i.rem_euclid(n) as u32),
        AddressMode::ClampToBorder => (0..n).contains(&i).then_some(i as u32),
    }
}

fn fetch(
    texture: &TextureEntry,
    sampler: &SamplerState,
    level: u32,
    [x, y, z]: [i64; 3],
) -> Result<Vec4, ResourceError> {
    let extent = texture.level_extent(level);
    let texel = (|| {
        Some([
            address(sampler.address_mode, x, extent.width)?,
            address(sampler.address_mode, y, extent.height)?,
            address(sampler.address_mode, z, extent.depth)?,
        ])
    })();
    let Some(coord) = texel else {
        return Ok(border(sampler.border_color));
    };
    let offset = texture
        .texel_offset(level, coord)
        .ok_or(ResourceError::OutOfBounds)?;
    let size = texture.format.bytes_per_texel() as usize;
    texel::decode(
        texture.format,
        texture.level(level)?.visible_bytes(offset, size)?,
    )
}

fn sample_level(
    texture: &TextureEntry,
    sampler: &SamplerState,
    filter: FilterMode,
    coord: Vec3,
    level: u32,
) -> Result<Vec4, ResourceError> {
    let extent = texture.level_extent(level);
    let flat = texture.dimension == TextureDimension::D2;
    let scaled = [
        coord.x * extent.width as f32,
        coord.y * extent.height as f32,
        if flat { 0.5 } else { coord.z * extent.depth as f32 },
    ];

    match filter {
        FilterMode::Nearest => fetch(texture, sampler, level, scaled.map(|c| c.floor() as i64)),
        FilterMode::Linear => {
            let base = scaled.map(|c| (c - 0.5).floor());
            let frac = [
                scaled[0] - 0.5 - base[0],
                scaled[1] - 0.5 - base[1],
                scaled[2] - 0.5 - base[2],
            ];
            let base = base.map(|c| c as i64);
            let depth_taps = if flat { 1 } else { 2 };
            let mut result = Vec4::ZERO;
            for dz in 0..depth_taps {
                for dy in 0..2 {
                    for dx in 0..2 {
                        let weight = |d: i64, f: f32| if d == 0 { 1.0 - f } else { f };
                        let w = weight(dx, frac[0])
                            * weight(dy, frac[1])
                            * if flat { 1.0 } else { weight(dz, frac[2]) };
                        if w == 0.0 {
                            continue;
                        }
                        let tap = [base[0] + dx, base[1] + dy, if flat { 0 } else { base[2] + dz }];
                        result = result + fetch(texture, sampler, level, tap)? * w;
                    }
                }
            }
            Ok(result)
        }
    }
}

/// Samples `texture` at normalized `coord` with an explicit level of detail.
pub(crate) fn sample(
    texture: &TextureEntry,
    sampler: &SamplerState,
    coord: Vec3,
    lod: f32,
) -> Result<Vec4, ResourceError> {
    let max_level = (texture.levels.len() - 1) as f32;
    let lod = lod
        .clamp(sampler.lod_min_clamp, sampler.lod_max_clamp)
        .clamp(0.0, max_level);

    if lod <= 0.0 {
        return sample_level(texture, sampler, sampler.mag_filter, coord, 0);
    }
    match sampler.mipmap_filter {
        FilterMode::Nearest => {
            sample_level(texture, sampler, sampler.min_filter, coord, lod.round() as u32)
        }
        FilterMode::Linear => {
            let lower = lod.floor();
            let t = lod - lower;
            let a = sample_level(texture, sampler, sampler.min_filter, coord, lower as u32)?;
            if t == 0.0 {
                return Ok(a);
            }
            let b = sample_level(texture, sampler, sampler.min_filter, coord, lower as u32 + 1)?;
            Ok(a * (1.0 - t) + b * t)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use voxa_core::math::Extent3D;
    use voxa_core::renderer::api::TextureFormat;

    fn volume_with_center_texel() -> TextureEntry {
        let mut texture = TextureEntry::new(
            "volume".into(),
            Extent3D::cube(2),
            TextureDimension::D3,
            TextureFormat::Rgba8Unorm,
            2,
        );
        let offset = texture.texel_offset(0, [1, 1, 1]).unwrap();
        texture
            .level_mut(0)
            .unwrap()
            .write_through(offset, &[255, 255, 255, 255])
            .unwrap();
        texture
            .level_mut(1)
            .unwrap()
            .write_through(0, &[32, 32, 32, 32])
            .unwrap();
        texture
    }

    #[test]
    fn test_border_is_transparent_outside_the_unit_cube() {
        let texture = volume_with_center_texel();
        let sampler = SamplerState::from(&SamplerDescriptor::trilinear_transparent_border());
        let outside = sample(&texture, &sampler, Vec3::new(1.5, 0.75, 0.75), 0.0).unwrap();
        assert_eq!(outside, Vec4::ZERO);
        let inside = sample(&texture, &sampler, Vec3::new(0.75, 0.75, 0.75), 0.0).unwrap();
        assert_relative_eq!(inside.w, 1.0);
    }

    #[test]
    fn test_trilinear_blends_between_levels() {
        let texture = volume_with_center_texel();
        let sampler = SamplerState::from(&SamplerDescriptor::trilinear_transparent_border());
        let coarse = sample(&texture, &sampler, Vec3::splat(0.5), 1.0).unwrap();
        assert_relative_eq!(coarse.w, 32.0 / 255.0, epsilon = 1e-5);
        let half = sample(&texture, &sampler, Vec3::splat(0.5), 0.5).unwrap();
        assert_relative_eq!(half.w, 0.5 * 0.125 + 0.5 * 32.0 / 255.0, epsilon = 1e-5);
    }

    #[test]
    fn test_clamp_to_edge_repeats_the_last_texel() {
        let texture = volume_with_center_texel();
        let sampler = SamplerState::from(&SamplerDescriptor::default());
        let v = sample(&texture, &sampler, Vec3::new(9.0, 9.0, 9.0), 0.0).unwrap();
        assert_relative_eq!(v.w, 1.0);
    }
}
