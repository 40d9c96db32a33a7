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

//! Integer extents, origins and regions for textures, images and viewports.

use serde::{Deserialize, Serialize};

/// A two-dimensional extent, typically representing width and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent2D {
    /// The width component of the extent.
    pub width: u32,
    /// The height component of the extent.
    pub height: u32,
}

impl Extent2D {
    /// Creates a new extent.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width divided by height, or 1.0 for a degenerate extent.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// A three-dimensional extent, representing width, height, and depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent3D {
    /// The width component of the extent.
    pub width: u32,
    /// The height component of the extent.
    pub height: u32,
    /// The depth of a 3D texture. 1 for 2D textures.
    pub depth: u32,
}

impl Extent3D {
    /// Creates a new extent.
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// A cube of edge `n`.
    pub const fn cube(n: u32) -> Self {
        Self::new(n, n, n)
    }

    /// Total number of texels.
    pub const fn volume(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth as u64
    }

    /// The extent of mip `level`, never smaller than one texel on any axis.
    pub fn mip_level(&self, level: u32) -> Self {
        let shrink = |v: u32| (v >> level).max(1);
        Self::new(shrink(self.width), shrink(self.height), shrink(self.depth))
    }

    /// Number of levels in a full mip chain for this extent.
    pub fn max_mip_levels(&self) -> u32 {
        let largest = self.width.max(self.height).max(self.depth).max(1);
        32 - largest.leading_zeros()
    }
}

/// A three-dimensional origin, representing an (x, y, z) offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Origin3D {
    /// The x-coordinate of the origin.
    pub x: u32,
    /// The y-coordinate of the origin.
    pub y: u32,
    /// The z-coordinate of the origin.
    pub z: u32,
}

impl Origin3D {
    /// The zero origin.
    pub const ZERO: Self = Self { x: 0, y: 0, z: 0 };
}

/// A box-shaped sub-region of a texture level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Region3D {
    /// Corner of the region closest to the texture origin.
    pub origin: Origin3D,
    /// Size of the region.
    pub extent: Extent3D,
}

impl Region3D {
    /// A region covering a whole texture level of size `extent`.
    pub const fn whole(extent: Extent3D) -> Self {
        Self {
            origin: Origin3D::ZERO,
            extent,
        }
    }

    /// Returns `true` if the region lies entirely inside `bounds`.
    pub fn fits_within(&self, bounds: Extent3D) -> bool {
        let end = |o: u32, e: u32| o as u64 + e as u64;
        end(self.origin.x, self.extent.width) <= bounds.width as u64
            && end(self.origin.y, self.extent.height) <= bounds.height as u64
            && end(self.origin.z, self.extent.depth) <= bounds.depth as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_chain_length() {
        assert_eq!(Extent3D::cube(256).max_mip_levels(), 9);
        assert_eq!(Extent3D::cube(1).max_mip_levels(), 1);
        assert_eq!(Extent3D::new(8, 2, 1).max_mip_levels(), 4);
    }

    #[test]
    fn test_mip_level_never_reaches_zero() {
        assert_eq!(Extent3D::new(8, 2, 1).mip_level(3), Extent3D::new(1, 1, 1));
    }

    #[test]
    fn test_region_bounds() {
        let bounds = Extent3D::cube(4);
        assert!(Region3D::whole(bounds).fits_within(bounds));
        let shifted = Region3D {
            origin: Origin3D { x: 1, y: 0, z: 0 },
            extent: bounds,
        };
        assert!(!shifted.fits_within(bounds));
    }
}
