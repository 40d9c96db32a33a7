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

//! Mapping from naga IR types to the renderer's element types.

use naga::{ArraySize, Handle, ImageClass, ImageDimension, Module, Scalar, ScalarKind, Type, TypeInner};
use voxa_core::renderer::api::{StorageAccess, TextureDimension, TextureFormat};
use voxa_core::renderer::reflection::{ElementType, ScalarType};

/// `(kind, width, scalar)` for every scalar the renderer can reflect.
const SCALAR_TABLE: [(ScalarKind, u8, ScalarType); 4] = [
    (ScalarKind::Float, 4, ScalarType::F32),
    (ScalarKind::Uint, 4, ScalarType::U32),
    (ScalarKind::Sint, 4, ScalarType::I32),
    (ScalarKind::Bool, 1, ScalarType::Bool),
];

/// Storage texel formats with a renderer counterpart.
const STORAGE_FORMATS: [(naga::StorageFormat, TextureFormat); 7] = [
    (naga::StorageFormat::R8Unorm, TextureFormat::R8Unorm),
    (naga::StorageFormat::R32Uint, TextureFormat::R32Uint),
    (naga::StorageFormat::R32Float, TextureFormat::R32Float),
    (naga::StorageFormat::Rgba8Unorm, TextureFormat::Rgba8Unorm),
    (naga::StorageFormat::Rgba16Float, TextureFormat::Rgba16Float),
    (naga::StorageFormat::Rgba32Float, TextureFormat::Rgba32Float),
    (naga::StorageFormat::Bgra8Unorm, TextureFormat::Bgra8Unorm),
];

pub(crate) fn scalar_type(scalar: Scalar) -> Result<ScalarType, String> {
    SCALAR_TABLE
        .iter()
        .find(|(kind, width, _)| *kind == scalar.kind && *width == scalar.width)
        .map(|&(_, _, ty)| ty)
        .ok_or_else(|| format!("unsupported scalar {:?}{}", scalar.kind, scalar.width * 8))
}

pub(crate) fn storage_format(format: naga::StorageFormat) -> Option<TextureFormat> {
    STORAGE_FORMATS
        .iter()
        .find(|(naga_format, _)| *naga_format == format)
        .map(|&(_, format)| format)
}

fn texture_dimension(dim: ImageDimension) -> Result<TextureDimension, String> {
    match dim {
        ImageDimension::D2 => Ok(TextureDimension::D2),
        ImageDimension::D3 => Ok(TextureDimension::D3),
        other => Err(format!("unsupported image dimension {other:?}")),
    }
}

pub(crate) fn storage_access(access: naga::StorageAccess) -> StorageAccess {
    let mut ours = StorageAccess::EMPTY;
    if access.contains(naga::StorageAccess::LOAD) {
        ours.insert(StorageAccess::LOAD);
    }
    if access.contains(naga::StorageAccess::STORE) {
        ours.insert(StorageAccess::STORE);
    }
    ours
}

fn alignment_of(element: &ElementType) -> u64 {
    match element {
        ElementType::Array { element, .. } => alignment_of(element),
        other => other.layout().map_or(4, |layout| layout.alignment),
    }
}

/// Converts the naga type behind `ty`.
pub(crate) fn element_type(module: &Module, ty: Handle<Type>) -> Result<ElementType, String> {
    match module.types[ty].inner {
        TypeInner::Scalar(scalar) => Ok(ElementType::Scalar(scalar_type(scalar)?)),
        TypeInner::Vector { size, scalar } => Ok(ElementType::Vector {
            scalar: scalar_type(scalar)?,
            components: size as u8,
        }),
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } => match scalar_type(scalar)? {
            ScalarType::F32 => Ok(ElementType::Matrix {
                columns: columns as u8,
                rows: rows as u8,
            }),
            other => Err(format!("unsupported {other:?} matrix")),
        },
        TypeInner::Atomic(scalar) => Ok(ElementType::Atomic(scalar_type(scalar)?)),
        TypeInner::Array { base, size, stride } => {
            let count = match size {
                ArraySize::Constant(n) => Some(n.get()),
                ArraySize::Dynamic => None,
                _ => return Err("arrays sized by override constants are not supported".into()),
            };
            Ok(ElementType::Array {
                element: Box::new(element_type(module, base)?),
                count,
                stride,
            })
        }
        TypeInner::Struct {
            ref members, span, ..
        } => {
            let mut alignment = 1;
            for member in members {
                alignment = alignment.max(alignment_of(&element_type(module, member.ty)?));
            }
            Ok(ElementType::Struct {
                size: span,
                alignment: alignment as u32,
            })
        }
        TypeInner::Sampler { comparison } => Ok(ElementType::Sampler { comparison }),
        TypeInner::Image {
            dim,
            arrayed,
            class,
            ..
        } => {
            if arrayed {
                return Err("arrayed images are not supported".into());
            }
            let dimension = texture_dimension(dim)?;
            match class {
                ImageClass::Sampled { kind, .. } => Ok(ElementType::Texture {
                    dimension,
                    sample: scalar_type(Scalar { kind, width: 4 })?,
                }),
                ImageClass::Depth { .. } => Ok(ElementType::Texture {
                    dimension,
                    sample: ScalarType::F32,
                }),
                ImageClass::Storage { format, access } => Ok(ElementType::Image {
                    dimension,
                    format: storage_format(format),
                    access: storage_access(access),
                }),
                other => Err(format!("unsupported image class {other:?}")),
            }
        }
        ref other => Err(format!("unsupported type {other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_table_rejects_half_precision() {
        assert_eq!(scalar_type(Scalar::F32), Ok(ScalarType::F32));
        assert_eq!(scalar_type(Scalar::U32), Ok(ScalarType::U32));
        assert!(scalar_type(Scalar::F64).is_err());
    }

    #[test]
    fn test_storage_formats_map_to_renderer_formats() {
        for (naga_format, ours) in STORAGE_FORMATS {
            assert_eq!(storage_format(naga_format), Some(ours));
        }
        assert_eq!(storage_format(naga::StorageFormat::Rgb10a2Unorm), None);
    }

    #[test]
    fn test_struct_alignment_follows_widest_member() {
        let module = naga::front::wgsl::parse_str(
            "struct Node { color: vec4<f32>, count: u32 }
             struct Nodes { items: array<Node> }
             @group(0) @binding(0) var<storage> nodes: Nodes;",
        )
        .unwrap();
        let (_, var) = module.global_variables.iter().next().unwrap();
        match element_type(&module, var.ty).unwrap() {
            ElementType::Struct { alignment, .. } => assert_eq!(alignment, 16),
            other => panic!("expected a struct, got {other:?}"),
        }
    }
}
