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

//! Fixed-function raster state and vertex input layout.

use crate::voxa_flags;

/// Triangle faces to discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Keep every triangle.
    #[default]
    None,
    /// Discard front faces.
    Front,
    /// Discard back faces.
    Back,
}

/// Winding order considered front-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    /// Counter-clockwise triangles face the viewer.
    #[default]
    Ccw,
    /// Clockwise triangles face the viewer.
    Cw,
}

/// Comparison used by depth testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// Passes if the new value is less than the stored one.
    #[default]
    Less,
    /// Passes if the new value is less than or equal to the stored one.
    LessEqual,
    /// Always passes.
    Always,
}

impl CompareFunction {
    /// Evaluates the comparison for `incoming` against `stored`.
    pub fn passes(self, incoming: f32, stored: f32) -> bool {
        match self {
            CompareFunction::Never => false,
            CompareFunction::Less => incoming < stored,
            CompareFunction::LessEqual => incoming <= stored,
            CompareFunction::Always => true,
        }
    }
}

/// A blend factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// 0.
    Zero,
    /// 1.
    One,
    /// Source alpha.
    SrcAlpha,
    /// 1 - source alpha.
    OneMinusSrcAlpha,
}

/// How source and destination terms combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOperation {
    /// `src * src_factor + dst * dst_factor`.
    #[default]
    Add,
    /// Component-wise maximum, factors ignored.
    Max,
}

/// Blending for one group of channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    /// Factor applied to the fragment output.
    pub src_factor: BlendFactor,
    /// Factor applied to the stored value.
    pub dst_factor: BlendFactor,
    /// Combination operator.
    pub operation: BlendOperation,
}

/// Color and alpha blending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    /// Blending of the RGB channels.
    pub color: BlendComponent,
    /// Blending of the alpha channel.
    pub alpha: BlendComponent,
}

impl BlendState {
    /// Premultiplied-alpha OVER: `src = ONE`, `dst = ONE_MINUS_SRC_ALPHA` on all channels.
    pub const PREMULTIPLIED_OVER: Self = {
        let over = BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            operation: BlendOperation::Add,
        };
        Self {
            color: over,
            alpha: over,
        }
    };
}

voxa_flags! {
    /// Color channels written by a raster pass.
    pub struct ColorWrites: u32 {
        /// Red channel.
        const RED = 1 << 0;
        /// Green channel.
        const GREEN = 1 << 1;
        /// Blue channel.
        const BLUE = 1 << 2;
        /// Alpha channel.
        const ALPHA = 1 << 3;
        /// All four channels.
        const ALL = 0b1111;
    }
}

/// Depth testing and writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthState {
    /// Comparison applied before a fragment is kept.
    pub compare: CompareFunction,
    /// Whether passing fragments update the depth buffer.
    pub write_enabled: bool,
}

/// The fixed-function state a raster technique is compiled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterState {
    /// Depth state, or `None` for no depth test and no depth write.
    pub depth: Option<DepthState>,
    /// Color channels written to the target.
    pub color_writes: ColorWrites,
    /// Blending, or `None` to overwrite.
    pub blend: Option<BlendState>,
    /// Face culling.
    pub cull_mode: CullMode,
    /// Front-face winding.
    pub front_face: FrontFace,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            depth: Some(DepthState {
                compare: CompareFunction::Less,
                write_enabled: true,
            }),
            color_writes: ColorWrites::ALL,
            blend: None,
            cull_mode: CullMode::Back,
            front_face: FrontFace::Ccw,
        }
    }
}

impl RasterState {
    /// State for passes that only produce shader side effects: no depth,
    /// no color writes, no blending and no culling.
    pub const SIDE_EFFECTS_ONLY: Self = Self {
        depth: None,
        color_writes: ColorWrites::EMPTY,
        blend: None,
        cull_mode: CullMode::None,
        front_face: FrontFace::Ccw,
    };

    /// Full-screen composite with premultiplied OVER blending and no depth.
    pub const FULLSCREEN_OVER: Self = Self {
        depth: None,
        color_writes: ColorWrites::ALL,
        blend: Some(BlendState::PREMULTIPLIED_OVER),
        cull_mode: CullMode::None,
        front_face: FrontFace::Ccw,
    };
}

/// Format of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// Two 32-bit floats.
    Float32x2,
    /// Three 32-bit floats.
    Float32x3,
    /// Four 32-bit floats.
    Float32x4,
}

impl VertexFormat {
    /// Size in bytes.
    pub const fn size(self) -> u64 {
        match self {
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }

    /// Number of float components.
    pub const fn components(self) -> usize {
        match self {
            VertexFormat::Float32x2 => 2,
            VertexFormat::Float32x3 => 3,
            VertexFormat::Float32x4 => 4,
        }
    }
}

/// One attribute inside a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// `@location` in the vertex shader.
    pub shader_location: u32,
    /// Attribute format.
    pub format: VertexFormat,
    /// Byte offset from the start of the vertex.
    pub offset: u64,
}

/// Layout of the single interleaved vertex buffer a technique reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    /// Bytes between consecutive vertices.
    pub array_stride: u64,
    /// Attributes in the buffer.
    pub attributes: Vec<VertexAttribute>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_effect_state_disables_everything() {
        let s = RasterState::SIDE_EFFECTS_ONLY;
        assert!(s.depth.is_none());
        assert!(s.color_writes.is_empty());
        assert!(s.blend.is_none());
        assert_eq!(s.cull_mode, CullMode::None);
    }

    #[test]
    fn test_premultiplied_over_factors() {
        let b = BlendState::PREMULTIPLIED_OVER;
        assert_eq!(b.color.src_factor, BlendFactor::One);
        assert_eq!(b.color.dst_factor, BlendFactor::OneMinusSrcAlpha);
        assert_eq!(b.color, b.alpha);
    }
}
