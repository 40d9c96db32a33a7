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

//! The viewing camera the cone tracer renders from.

use crate::math::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// A perspective camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewingCamera {
    /// Eye position.
    pub eye: Vec3,
    /// Point looked at.
    pub target: Vec3,
    /// Approximate up direction.
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Width over height.
    pub aspect: f32,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
}

impl Default for ViewingCamera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: std::f32::consts::FRAC_PI_4,
            aspect: 1.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl ViewingCamera {
    /// World-to-view transform. A degenerate basis (eye on target, or up
    /// parallel to the view direction) falls back to identity.
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up).unwrap_or(Mat4::IDENTITY)
    }

    /// View-to-clip transform with `[0, 1]` depth.
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_zo(self.fov_y, self.aspect, self.near, self.far)
    }

    /// World-to-clip transform.
    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Unit vector from the eye toward the target.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize()
    }

    /// The camera moved rigidly by `delta`.
    pub fn translated(&self, delta: Vec3) -> Self {
        Self {
            eye: self.eye + delta,
            target: self.target + delta,
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_target_projects_to_screen_centre() {
        let camera = ViewingCamera::default();
        let ndc = camera.view_proj().project_point3(camera.target);
        assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_translated_keeps_direction() {
        let camera = ViewingCamera::default();
        let moved = camera.translated(Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(moved.forward(), camera.forward());
        assert_eq!(moved.eye, Vec3::new(1.0, 0.0, 3.0));
    }
}
