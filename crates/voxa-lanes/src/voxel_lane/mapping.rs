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

//! World to voxel coordinate mapping shared by every lane.

use super::config::VoxelizationConfig;
use voxa_core::math::{LinearRgba, Vec3};

/// Maps world positions into the `resolution³` grid spanning the scene cube.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeMapping {
    center: Vec3,
    half_extent: f32,
    resolution: u32,
}

impl VolumeMapping {
    /// Creates a mapping for the cube `center ± half_extent`.
    pub fn new(center: Vec3, half_extent: f32, resolution: u32) -> Self {
        Self {
            center,
            half_extent,
            resolution: resolution.max(1),
        }
    }

    /// The mapping described by `config`.
    pub fn from_config(config: &VoxelizationConfig) -> Self {
        Self::new(
            config.scene_center,
            config.scene_half_extent,
            config.voxel_resolution,
        )
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn half_extent(&self) -> f32 {
        self.half_extent
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Minimum corner of the cube.
    pub fn min_corner(&self) -> Vec3 {
        self.center - Vec3::splat(self.half_extent)
    }

    /// Edge length of one voxel.
    pub fn voxel_size(&self) -> f32 {
        2.0 * self.half_extent / self.resolution as f32
    }

    /// `floor((p - (c - h)) / 2h * res)`, clamped to `[0, res - 1]` per axis.
    pub fn world_to_voxel(&self, p: Vec3) -> [u32; 3] {
        let scaled = (p - self.min_corner()) / (2.0 * self.half_extent) * self.resolution as f32;
        let max = (self.resolution - 1) as f32;
        [scaled.x, scaled.y, scaled.z].map(|c| {
            // NaN lands on 0 through the cast.
            c.floor().clamp(0.0, max) as u32
        })
    }

    /// World position of the centre of voxel `v`.
    pub fn voxel_center(&self, [x, y, z]: [u32; 3]) -> Vec3 {
        let size = self.voxel_size();
        self.min_corner() + Vec3::new(x as f32 + 0.5, y as f32 + 0.5, z as f32 + 0.5) * size
    }

    /// Row-major index `x + y·res + z·res²`.
    pub fn linear_index(&self, [x, y, z]: [u32; 3]) -> usize {
        let res = self.resolution as usize;
        x as usize + y as usize * res + z as usize * res * res
    }

    /// Whether `p` lies inside the cube, boundaries included.
    pub fn contains(&self, p: Vec3) -> bool {
        let min = self.min_corner();
        let max = self.center + Vec3::splat(self.half_extent);
        (0..3).all(|i| p[i] >= min[i] && p[i] <= max[i])
    }
}

/// Packs a straight-alpha colour for a fragment record.
pub fn pack_color(color: LinearRgba) -> u32 {
    color.pack_rgba8()
}

/// Packs the colour written to the volume. The alpha byte is the most
/// significant, so `max` over packed values keeps the most opaque fragment.
pub fn pack_premultiplied(straight: u32) -> u32 {
    LinearRgba::unpack_rgba8(straight).premultiplied().pack_rgba8()
}

/// Splits record word `[2]` and `[3]` back into a voxel coordinate and axis index.
pub fn unpack_voxel(xy: u32, z_axis: u32) -> ([u32; 3], u32) {
    ([xy & 0xffff, xy >> 16, z_axis & 0xffff], z_axis >> 16)
}

/// Builds record words `[2]` and `[3]` from a voxel coordinate and axis index.
pub fn pack_voxel([x, y, z]: [u32; 3], axis: u32) -> (u32, u32) {
    ((x & 0xffff) | (y << 16), (z & 0xffff) | (axis << 16))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> VolumeMapping {
        VolumeMapping::new(Vec3::ZERO, 1.0, 8)
    }

    #[test]
    fn test_corners_clamp_into_the_grid() {
        let m = unit();
        assert_eq!(m.world_to_voxel(Vec3::splat(-1.0)), [0, 0, 0]);
        assert_eq!(m.world_to_voxel(Vec3::splat(1.0)), [7, 7, 7]);
        assert_eq!(m.world_to_voxel(Vec3::splat(50.0)), [7, 7, 7]);
        assert_eq!(m.world_to_voxel(Vec3::new(-9.0, 0.0, 0.1)), [0, 4, 4]);
    }

    #[test]
    fn test_voxel_centres_map_back_to_themselves() {
        let m = VolumeMapping::new(Vec3::new(2.0, -1.0, 0.5), 3.0, 16);
        for v in [[0, 0, 0], [15, 3, 9], [7, 15, 15]] {
            assert_eq!(m.world_to_voxel(m.voxel_center(v)), v);
        }
        approx::assert_relative_eq!(m.voxel_size(), 6.0 / 16.0);
    }

    #[test]
    fn test_linear_index_is_x_fastest() {
        let m = unit();
        assert_eq!(m.linear_index([1, 0, 0]), 1);
        assert_eq!(m.linear_index([0, 1, 0]), 8);
        assert_eq!(m.linear_index([0, 0, 1]), 64);
    }

    #[test]
    fn test_voxel_packing() {
        let (xy, z_axis) = pack_voxel([1023, 5, 700], 2);
        assert_eq!(unpack_voxel(xy, z_axis), ([1023, 5, 700], 2));
    }

    #[test]
    fn test_premultiplied_packing_orders_by_alpha() {
        let faint = pack_premultiplied(pack_color(LinearRgba::new(1.0, 1.0, 1.0, 0.25)));
        let solid = pack_premultiplied(pack_color(LinearRgba::new(0.0, 0.0, 0.1, 1.0)));
        assert!(solid > faint);
        let unpacked = LinearRgba::unpack_rgba8(faint);
        approx::assert_relative_eq!(unpacked.r, 0.25, epsilon = 1.0 / 255.0);
    }
}
