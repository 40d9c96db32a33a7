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

use crate::math::{Extent2D, LinearRgba};
use crate::renderer::api::{TextureFormat, TextureId};
use std::fmt::Debug;

/// The render target a frame is composited onto.
pub trait FramebufferProvider: Send + Sync + Debug {
    /// Colour texture for the current frame.
    fn color_target(&self) -> TextureId;

    /// Format of [`color_target`](FramebufferProvider::color_target).
    fn color_format(&self) -> TextureFormat;

    /// Size of the target in pixels.
    fn viewport(&self) -> Extent2D;

    /// Colour the target is cleared to before compositing.
    fn clear_color(&self) -> LinearRgba {
        LinearRgba::BLACK
    }
}
