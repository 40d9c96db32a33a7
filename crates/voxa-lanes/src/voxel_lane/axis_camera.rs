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

//! The three orthographic cameras used to rasterize the scene cube.
//!
//! Each camera sits on the positive side of its axis and looks back through the
//! cube centre, so the three projections cover the same `2h` square at the same
//! pixel pitch and differ only by viewing direction:
//!
//! | Axis | Looks down | Up   | Screen right |
//! |------|------------|------|--------------|
//! | X    | −X         | +Y   | −Z           |
//! | Y    | −Y         | −Z   | +X           |
//! | Z    | −Z         | +Y   | +X           |

use super::config::VoxelizationConfig;
use voxa_core::math::{Mat4, Vec3};

/// A principal axis of the scene cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Every axis, in build order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// `0`, `1` or `2`.
    pub const fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// The axis with the given index, if any.
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Axis::X),
            1 => Some(Axis::Y),
            2 => Some(Axis::Z),
            _ => None,
        }
    }

    /// Unit vector along the positive axis.
    pub const fn direction(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }

    /// Up vector paired with this axis' camera.
    pub fn up(self) -> Vec3 {
        match self {
            Axis::X | Axis::Z => Vec3::Y,
            Axis::Y => -Vec3::Z,
        }
    }

    /// Converts an axis-grid texel `[pixel_x, pixel_y, depth_slice]` into the
    /// voxel it covers, for a grid as fine as the volume.
    pub fn texel_to_voxel(self, [px, py, d]: [u32; 3], resolution: u32) -> [u32; 3] {
        let flip = |c: u32| resolution - 1 - c.min(resolution - 1);
        match self {
            Axis::X => [flip(d), flip(py), flip(px)],
            Axis::Y => [px, flip(d), py],
            Axis::Z => [px, flip(py), flip(d)],
        }
    }
}

/// Orthographic camera spanning exactly the scene cube along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCamera {
    pub axis: Axis,
    pub view: Mat4,
    pub projection: Mat4,
    pub view_proj: Mat4,
    /// Pixels along each edge of the list grid.
    pub resolution: u32,
}

impl AxisCamera {
    /// Builds the camera for `axis` around the cube `center ± half_extent`.
    pub fn new(axis: Axis, center: Vec3, half_extent: f32, resolution: u32) -> Self {
        let eye = center + axis.direction() * half_extent;
        // The eye never coincides with the centre and the up vector is always
        // perpendicular, so the basis is well formed for a positive extent.
        let view = Mat4::look_at_rh(eye, center, axis.up()).unwrap_or(Mat4::IDENTITY);
        let projection = Mat4::orthographic_rh_zo(
            -half_extent,
            half_extent,
            -half_extent,
            half_extent,
            0.0,
            2.0 * half_extent,
        );
        Self {
            axis,
            view,
            projection,
            view_proj: projection * view,
            resolution: resolution.max(1),
        }
    }

    /// The three cameras for `config`, indexed by [`Axis::index`].
    pub fn for_config(config: &VoxelizationConfig) -> [AxisCamera; 3] {
        Axis::ALL.map(|axis| {
            Self::new(
                axis,
                config.scene_center,
                config.scene_half_extent,
                config.viewport_resolution(),
            )
        })
    }

    /// Maps a world position to `[pixel_x, pixel_y, depth_slice]` in this
    /// camera's grid. Pixel rows grow downwards, as in framebuffer space.
    pub fn project_to_texel(&self, p: Vec3) -> [u32; 3] {
        let ndc = self.view_proj.project_point3(p);
        let res = self.resolution as f32;
        let to_texel = |c: f32| c.floor().clamp(0.0, res - 1.0) as u32;
        [
            to_texel((ndc.x * 0.5 + 0.5) * res),
            to_texel((0.5 - ndc.y * 0.5) * res),
            to_texel(ndc.z * res),
        ]
    }
}
