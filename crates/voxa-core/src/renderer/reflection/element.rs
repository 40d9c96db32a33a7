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

//! The closed set of element types a shader interface can expose.

use crate::renderer::api::binding::StorageAccess;
use crate::renderer::api::texture::{TextureDimension, TextureFormat};

/// A 32-bit scalar component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// `f32`.
    F32,
    /// `u32`.
    U32,
    /// `i32`.
    I32,
    /// `bool`. Not host-shareable.
    Bool,
}

/// The type of a reflected resource, block member or vertex input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// A single scalar.
    Scalar(ScalarType),
    /// A vector of 2, 3 or 4 scalars.
    Vector {
        /// Component type.
        scalar: ScalarType,
        /// Number of components.
        components: u8,
    },
    /// A float matrix of `columns` column vectors with `rows` components each.
    Matrix {
        /// Number of columns.
        columns: u8,
        /// Number of rows.
        rows: u8,
    },
    /// An atomic scalar.
    Atomic(ScalarType),
    /// A fixed-size or runtime-sized array.
    Array {
        /// Element type.
        element: Box<ElementType>,
        /// Element count, `None` for a runtime-sized array.
        count: Option<u32>,
        /// Bytes between consecutive elements.
        stride: u32,
    },
    /// A structure. Members are reported separately.
    Struct {
        /// Size of the structure in bytes.
        size: u32,
        /// Required alignment in bytes.
        alignment: u32,
    },
    /// A sampler.
    Sampler {
        /// Whether this is a comparison sampler.
        comparison: bool,
    },
    /// A sampled texture.
    Texture {
        /// Texture dimensionality.
        dimension: TextureDimension,
        /// Sampled component type.
        sample: ScalarType,
    },
    /// A storage image.
    Image {
        /// Image dimensionality.
        dimension: TextureDimension,
        /// Texel format, if the backend exposes one we know.
        format: Option<TextureFormat>,
        /// Declared access.
        access: StorageAccess,
    },
}

/// Size and alignment of a host-shareable type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementLayout {
    /// Size in bytes.
    pub size: u64,
    /// Alignment in bytes.
    pub alignment: u64,
}

/// `(components, size, alignment)` of 32-bit vectors under host-shareable rules.
/// Scalars are the one-component row.
const VECTOR_LAYOUTS: [(u8, u64, u64); 4] = [(1, 4, 4), (2, 8, 8), (3, 12, 16), (4, 16, 16)];

fn vector_layout(components: u8) -> Option<ElementLayout> {
    VECTOR_LAYOUTS
        .iter()
        .find(|(n, _, _)| *n == components)
        .map(|&(_, size, alignment)| ElementLayout { size, alignment })
}

impl ElementType {
    /// Layout of the type, or `None` for opaque handles, runtime-sized arrays
    /// and `bool`.
    pub fn layout(&self) -> Option<ElementLayout> {
        match self {
            ElementType::Scalar(ScalarType::Bool) => None,
            ElementType::Scalar(_) | ElementType::Atomic(_) => vector_layout(1),
            ElementType::Vector { scalar, components } => match scalar {
                ScalarType::Bool => None,
                _ => vector_layout(*components),
            },
            ElementType::Matrix { columns, rows } => {
                let column = vector_layout(*rows)?;
                Some(ElementLayout {
                    size: column.alignment * *columns as u64,
                    alignment: column.alignment,
                })
            }
            ElementType::Array {
                element,
                count,
                stride,
            } => {
                let count = (*count)?;
                let inner = element.layout()?;
                Some(ElementLayout {
                    size: *stride as u64 * count as u64,
                    alignment: inner.alignment,
                })
            }
            ElementType::Struct { size, alignment } => Some(ElementLayout {
                size: *size as u64,
                alignment: *alignment as u64,
            }),
            ElementType::Sampler { .. } | ElementType::Texture { .. } | ElementType::Image { .. } => {
                None
            }
        }
    }

    /// Bytes between consecutive elements when the type is indexed, or the size
    /// of the type itself when it is not an array.
    pub fn stride(&self) -> u64 {
        match self {
            ElementType::Array { stride, .. } => *stride as u64,
            other => other.layout().map_or(0, |l| l.size),
        }
    }

    /// Number of elements: the array length, `None` for runtime-sized arrays,
    /// and 1 for everything else.
    pub fn count(&self) -> Option<u32> {
        match self {
            ElementType::Array { count, .. } => *count,
            _ => Some(1),
        }
    }

    /// Returns `true` for samplers, textures and images.
    pub fn is_opaque(&self) -> bool {
        matches!(
            self,
            ElementType::Sampler { .. } | ElementType::Texture { .. } | ElementType::Image { .. }
        )
    }
}
