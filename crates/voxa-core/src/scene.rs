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

//! The scene interface the voxel lanes consume, plus a flat scene and a few
//! procedural meshes for tests and the sandbox.

use crate::math::{LinearRgba, Mat4, Vec3};
use crate::renderer::api::{
    BufferDescriptor, BufferId, BufferUsage, IndexFormat, VertexAttribute, VertexFormat,
    VertexLayout,
};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::GraphicsDevice;
use std::borrow::Cow;

/// Buffers and draw parameters of one renderable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawableLayout {
    /// Interleaved [`Vertex`] data.
    pub vertex_buffer: BufferId,
    /// Index data.
    pub index_buffer: BufferId,
    /// Number of indices to draw.
    pub index_count: u32,
    /// Width of each index.
    pub index_format: IndexFormat,
    /// Surface colour, straight alpha.
    pub base_color: LinearRgba,
}

/// Something that can be drawn.
pub trait Renderable {
    /// Object-to-world transform.
    fn world_matrix(&self) -> Mat4;

    /// Buffers and draw parameters.
    fn drawable_layout(&self) -> DrawableLayout;
}

/// A source of renderables for one frame.
pub trait Scene {
    /// Every renderable to draw this frame, in draw order.
    fn renderable_queue(&self) -> Vec<&dyn Renderable>;
}

/// The vertex format every [`MeshData`] uses.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Vertex {
    /// Object-space position.
    pub position: [f32; 3],
    /// Object-space normal.
    pub normal: [f32; 3],
}

impl Vertex {
    /// Layout of [`Vertex`]: position at location 0, normal at location 1.
    pub fn layout() -> VertexLayout {
        VertexLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            attributes: vec![
                VertexAttribute {
                    shader_location: 0,
                    format: VertexFormat::Float32x3,
                    offset: 0,
                },
                VertexAttribute {
                    shader_location: 1,
                    format: VertexFormat::Float32x3,
                    offset: 12,
                },
            ],
        }
    }
}

/// CPU-side indexed triangle mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Vertices.
    pub vertices: Vec<Vertex>,
    /// Triangle list indices, counter-clockwise front faces.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// A square of edge `2 * half_size` in the XY plane, facing +Z.
    pub fn quad(half_size: f32) -> Self {
        let h = half_size;
        let normal = [0.0, 0.0, 1.0];
        let vertices = [[-h, -h], [h, -h], [h, h], [-h, h]]
            .into_iter()
            .map(|[x, y]| Vertex {
                position: [x, y, 0.0],
                normal,
            })
            .collect();
        Self {
            vertices,
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// An axis-aligned cube of edge `2 * half_size` centred on the origin.
    pub fn cube(half_size: f32) -> Self {
        // (normal, tangent u, tangent v) with u × v = normal.
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ];

        let mut mesh = Self::default();
        for (normal, u, v) in FACES {
            let (n, u, v) = (Vec3::from(normal), Vec3::from(u), Vec3::from(v));
            let base = mesh.vertices.len() as u32;
            for (su, sv) in [(-1.0_f32, -1.0_f32), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let p = (n + u * su + v * sv) * half_size;
                mesh.vertices.push(Vertex {
                    position: p.to_array(),
                    normal,
                });
            }
            mesh.indices
                .extend([base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }

    /// Uploads the mesh into a vertex and an index buffer.
    pub fn upload(&self, device: &dyn GraphicsDevice) -> Result<GpuMesh, ResourceError> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&self.vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&self.indices);

        let vertex_buffer = device.create_buffer_with_data(
            &BufferDescriptor {
                label: Some(Cow::Borrowed("mesh_vertices")),
                size: vertex_bytes.len() as u64,
                usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
            },
            vertex_bytes,
        )?;
        let index_buffer = device.create_buffer_with_data(
            &BufferDescriptor {
                label: Some(Cow::Borrowed("mesh_indices")),
                size: index_bytes.len() as u64,
                usage: BufferUsage::INDEX | BufferUsage::COPY_DST,
            },
            index_bytes,
        )?;

        Ok(GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: self.indices.len() as u32,
            index_format: IndexFormat::Uint32,
        })
    }
}

/// A mesh resident on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuMesh {
    /// Vertex buffer.
    pub vertex_buffer: BufferId,
    /// Index buffer.
    pub index_buffer: BufferId,
    /// Number of indices.
    pub index_count: u32,
    /// Width of each index.
    pub index_format: IndexFormat,
}

impl GpuMesh {
    /// Releases both buffers.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        device.destroy_buffer(self.vertex_buffer)?;
        device.destroy_buffer(self.index_buffer)
    }
}

/// A mesh placed in the world with a colour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneObject {
    /// Object-to-world transform.
    pub transform: Mat4,
    /// Geometry.
    pub mesh: GpuMesh,
    /// Surface colour.
    pub color: LinearRgba,
}

impl Renderable for SceneObject {
    fn world_matrix(&self) -> Mat4 {
        self.transform
    }

    fn drawable_layout(&self) -> DrawableLayout {
        DrawableLayout {
            vertex_buffer: self.mesh.vertex_buffer,
            index_buffer: self.mesh.index_buffer,
            index_count: self.mesh.index_count,
            index_format: self.mesh.index_format,
            base_color: self.color,
        }
    }
}

/// A flat list of objects.
#[derive(Debug, Clone, Default)]
pub struct StaticScene {
    objects: Vec<SceneObject>,
}

impl StaticScene {
    /// An empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an object.
    pub fn push(&mut self, object: SceneObject) {
        self.objects.push(object);
    }

    /// Objects in insertion order.
    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }
}

impl Scene for StaticScene {
    fn renderable_queue(&self) -> Vec<&dyn Renderable> {
        self.objects.iter().map(|o| o as &dyn Renderable).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_faces_wind_outward() {
        let cube = MeshData::cube(1.0);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        for tri in cube.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from(cube.vertices[i as usize].position));
            let n = Vec3::from(cube.vertices[tri[0] as usize].normal);
            let face = (b - a).cross(c - a).normalize();
            assert_relative_eq!(face.dot(n), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_quad_spans_requested_size() {
        let quad = MeshData::quad(0.5);
        let xs: Vec<f32> = quad.vertices.iter().map(|v| v.position[0]).collect();
        assert_eq!(xs, [-0.5, 0.5, 0.5, -0.5]);
        assert!(quad.vertices.iter().all(|v| v.position[2] == 0.0));
    }

    #[test]
    fn test_vertex_layout_matches_struct() {
        let layout = Vertex::layout();
        assert_eq!(layout.array_stride, 24);
        assert_eq!(layout.attributes[1].offset, 12);
    }
}
