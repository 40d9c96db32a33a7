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

//! Triangle setup and scan conversion for the reference backend.
//!
//! Triangles are rasterized at pixel centres with the top-left fill rule.
//! Depth interpolates linearly in screen space and varyings are perspective
//! correct. There is no clipping: triangles with a vertex at or behind the
//! eye plane are dropped.

use super::bindings::HostBindings;
use super::device::ReferenceProgram;
use crate::graphics::texel;
use std::ops::Range;
use voxa_core::math::{Vec4, EPSILON};
use voxa_core::renderer::api::{
    BlendComponent, BlendFactor, BlendOperation, BlendState, BufferId, ColorWrites, CullMode,
    FrontFace, IndexFormat, RasterPassDescriptor, TextureId,
};
use voxa_core::renderer::traits::host_kernel::{
    HostFragmentInput, HostVertexInput, HOST_VARYINGS,
};
use voxa_core::renderer::{RenderError, ResourceError};

/// What a draw command asks for.
#[derive(Debug, Clone)]
pub(crate) enum DrawCall {
    Vertices(Range<u32>),
    Indexed {
        indices: Range<u32>,
        base_vertex: i32,
    },
}

/// Pass and input-assembly state a draw runs with.
pub(crate) struct DrawState<'a> {
    pub program: &'a ReferenceProgram,
    pub pass: &'a RasterPassDescriptor,
    pub vertex_buffer: Option<(BufferId, u64)>,
    pub index_buffer: Option<(BufferId, u64, IndexFormat)>,
}

#[derive(Debug, Clone, Copy)]
struct ScreenVertex {
    x: f32,
    y: f32,
    z: f32,
    inv_w: f32,
    varyings: [Vec4; HOST_VARYINGS],
}

fn vertex_indices(
    state: &DrawState<'_>,
    bindings: &HostBindings<'_>,
    call: &DrawCall,
) -> Result<Vec<i64>, RenderError> {
    match call {
        DrawCall::Vertices(range) => Ok(range.clone().map(i64::from).collect()),
        DrawCall::Indexed {
            indices,
            base_vertex,
        } => {
            let (buffer, offset, format) = state.index_buffer.ok_or_else(|| {
                RenderError::Submission("indexed draw without an index buffer".to_owned())
            })?;
            let memory = &bindings.store().buffer(buffer)?.memory;
            let width = format.byte_size() as usize;
            indices
                .clone()
                .map(|i| -> Result<i64, RenderError> {
                    let start = offset as usize + i as usize * width;
                    let bytes = memory.visible_bytes(start, width)?;
                    let index = match format {
                        IndexFormat::Uint16 => u16::from_le_bytes([bytes[0], bytes[1]]) as i64,
                        IndexFormat::Uint32 => {
                            u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64
                        }
                    };
                    Ok(index + *base_vertex as i64)
                })
                .collect()
        }
    }
}

fn fetch_vertex(
    state: &DrawState<'_>,
    bindings: &HostBindings<'_>,
    vertex: i64,
    instance: u32,
) -> Result<HostVertexInput, RenderError> {
    let mut input = HostVertexInput {
        vertex_index: u32::try_from(vertex).map_err(|_| ResourceError::OutOfBounds)?,
        instance_index: instance,
        attributes: [Vec4::ZERO; HOST_VARYINGS],
    };
    let (Some(layout), Some((buffer, offset))) = (&state.program.vertex_layout, state.vertex_buffer)
    else {
        return Ok(input);
    };
    let memory = &bindings.store().buffer(buffer)?.memory;
    let base = offset as usize + vertex as usize * layout.array_stride as usize;
    for attribute in &layout.attributes {
        let location = attribute.shader_location as usize;
        if location >= HOST_VARYINGS {
            continue;
        }
        let bytes = memory.visible_bytes(
            base + attribute.offset as usize,
            attribute.format.size() as usize,
        )?;
        let mut value = [0.0, 0.0, 0.0, 1.0];
        for (slot, chunk) in value.iter_mut().zip(bytes.chunks_exact(4)) {
            *slot = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        input.attributes[location] = Vec4::new(value[0], value[1], value[2], value[3]);
    }
    Ok(input)
}

fn edge(a: &ScreenVertex, b: &ScreenVertex, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

fn is_top_left(a: &ScreenVertex, b: &ScreenVertex) -> bool {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    (dy == 0.0 && dx > 0.0) || dy < 0.0
}

fn blend_factor(factor: BlendFactor, src_alpha: f32) -> f32 {
    match factor {
        BlendFactor::Zero => 0.0,
        BlendFactor::One => 1.0,
        BlendFactor::SrcAlpha => src_alpha,
        BlendFactor::OneMinusSrcAlpha => 1.0 - src_alpha,
    }
}

fn blend_channel(component: BlendComponent, src: f32, dst: f32, src_alpha: f32) -> f32 {
    match component.operation {
        BlendOperation::Add => {
            src * blend_factor(component.src_factor, src_alpha)
                + dst * blend_factor(component.dst_factor, src_alpha)
        }
        BlendOperation::Max => src.max(dst),
    }
}

fn blend(state: BlendState, src: Vec4, dst: Vec4) -> Vec4 {
    let a = src.w;
    Vec4::new(
        blend_channel(state.color, src.x, dst.x, a),
        blend_channel(state.color, src.y, dst.y, a),
        blend_channel(state.color, src.z, dst.z, a),
        blend_channel(state.alpha, src.w, dst.w, a),
    )
}

fn write_color(
    bindings: &mut HostBindings<'_>,
    state: &DrawState<'_>,
    target: TextureId,
    [x, y]: [u32; 2],
    color: Vec4,
) -> Result<(), RenderError> {
    let raster = &state.program.raster;
    let texture = bindings.store_mut().texture_mut(target)?;
    let offset = texture
        .texel_offset(0, [x, y, 0])
        .ok_or(ResourceError::OutOfBounds)?;
    let size = texture.format.bytes_per_texel() as usize;
    let dst = texel::decode(texture.format, texture.level(0)?.visible_bytes(offset, size)?)?;
    let src = match raster.blend {
        Some(state) => blend(state, color, dst),
        None => color,
    };
    let writes = raster.color_writes;
    let pick = |mask: ColorWrites, s: f32, d: f32| if writes.contains(mask) { s } else { d };
    let out = Vec4::new(
        pick(ColorWrites::RED, src.x, dst.x),
        pick(ColorWrites::GREEN, src.y, dst.y),
        pick(ColorWrites::BLUE, src.z, dst.z),
        pick(ColorWrites::ALPHA, src.w, dst.w),
    );
    let bytes = texel::encode(texture.format, out)?;
    texture.level_mut(0)?.write_through(offset, &bytes)?;
    Ok(())
}

/// Returns `false` when the depth test rejects the fragment.
fn depth_test(
    bindings: &mut HostBindings<'_>,
    state: &DrawState<'_>,
    [x, y]: [u32; 2],
    z: f32,
) -> Result<bool, RenderError> {
    let (Some(depth), Some(target)) = (state.program.raster.depth, state.pass.depth_target) else {
        return Ok(true);
    };
    let texture = bindings.store_mut().texture_mut(target)?;
    let offset = texture
        .texel_offset(0, [x, y, 0])
        .ok_or(ResourceError::OutOfBounds)?;
    let bytes = texture.level(0)?.visible_bytes(offset, 4)?;
    let stored = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if !depth.compare.passes(z, stored) {
        return Ok(false);
    }
    if depth.write_enabled {
        texture.level_mut(0)?.write_through(offset, &z.to_le_bytes())?;
    }
    Ok(true)
}

fn rasterize(
    bindings: &mut HostBindings<'_>,
    state: &DrawState<'_>,
    mut v: [ScreenVertex; 3],
    ndc_area: f32,
    extent: (u32, u32),
) -> Result<u64, RenderError> {
    let front_facing = match state.program.raster.front_face {
        FrontFace::Ccw => ndc_area > 0.0,
        FrontFace::Cw => ndc_area < 0.0,
    };
    let culled = match state.program.raster.cull_mode {
        CullMode::None => false,
        CullMode::Front => front_facing,
        CullMode::Back => !front_facing,
    };
    if culled {
        return Ok(0);
    }

    let mut area = edge(&v[0], &v[1], v[2].x, v[2].y);
    if area < 0.0 {
        v.swap(1, 2);
        area = -area;
    }
    if area <= f32::MIN_POSITIVE {
        return Ok(0);
    }

    let (width, height) = extent;
    let min_x = v.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
    let max_x = v.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
    let min_y = v.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    let max_y = v.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
    let x_range = (min_x.floor().max(0.0) as u32)..(max_x.ceil().min(width as f32).max(0.0) as u32);
    let y_range = (min_y.floor().max(0.0) as u32)..(max_y.ceil().min(height as f32).max(0.0) as u32);

    let edges = [(1, 2), (2, 0), (0, 1)];
    let top_left = edges.map(|(a, b)| is_top_left(&v[a], &v[b]));
    let mut fragments = 0;

    for py in y_range {
        for px in x_range.clone() {
            let (cx, cy) = (px as f32 + 0.5, py as f32 + 0.5);
            let weights = edges.map(|(a, b)| edge(&v[a], &v[b], cx, cy));
            let inside = weights
                .iter()
                .zip(top_left)
                .all(|(&w, tl)| w > 0.0 || (w == 0.0 && tl));
            if !inside {
                continue;
            }
            let l = weights.map(|w| w / area);
            let z = l[0] * v[0].z + l[1] * v[1].z + l[2] * v[2].z;
            if !(0.0..=1.0).contains(&z) {
                continue;
            }
            if !depth_test(bindings, state, [px, py], z)? {
                continue;
            }

            let inv_w = l[0] * v[0].inv_w + l[1] * v[1].inv_w + l[2] * v[2].inv_w;
            let mut varyings = [Vec4::ZERO; HOST_VARYINGS];
            for (i, varying) in varyings.iter_mut().enumerate() {
                for (k, vertex) in v.iter().enumerate() {
                    *varying = *varying + vertex.varyings[i] * (l[k] * vertex.inv_w / inv_w);
                }
            }
            let input = HostFragmentInput {
                frag_coord: Vec4::new(cx, cy, z, inv_w),
                varyings,
                front_facing,
            };
            fragments += 1;
            let color = state.program.kernel.fragment(&input, bindings)?;
            if let Some(color) = color {
                if !state.program.raster.color_writes.is_empty() {
                    write_color(bindings, state, state.pass.color_target, [px, py], color)?;
                }
            }
        }
    }
    Ok(fragments)
}

/// Runs one draw. Returns the number of fragments shaded.
pub(crate) fn draw(
    state: &DrawState<'_>,
    call: &DrawCall,
    instances: Range<u32>,
    bindings: &mut HostBindings<'_>,
) -> Result<u64, RenderError> {
    let target = bindings.store().texture(state.pass.color_target)?;
    let extent = target.level_extent(0);
    let extent = (extent.width, extent.height);
    let vertices = vertex_indices(state, bindings, call)?;
    let mut fragments = 0;

    for instance in instances {
        for triangle in vertices.chunks_exact(3) {
            let mut screen = [None; 3];
            let mut ndc = [[0.0f32; 2]; 3];
            for (k, &vertex) in triangle.iter().enumerate() {
                let input = fetch_vertex(state, bindings, vertex, instance)?;
                let output = state.program.kernel.vertex(&input, &*bindings)?;
                let clip = output.position;
                if clip.w <= EPSILON {
                    break;
                }
                let (nx, ny, nz) = (clip.x / clip.w, clip.y / clip.w, clip.z / clip.w);
                ndc[k] = [nx, ny];
                screen[k] = Some(ScreenVertex {
                    x: (nx * 0.5 + 0.5) * extent.0 as f32,
                    y: (0.5 - ny * 0.5) * extent.1 as f32,
                    z: nz,
                    inv_w: 1.0 / clip.w,
                    varyings: output.varyings,
                });
            }
            let [Some(a), Some(b), Some(c)] = screen else {
                continue;
            };
            let ndc_area = (ndc[1][0] - ndc[0][0]) * (ndc[2][1] - ndc[0][1])
                - (ndc[2][0] - ndc[0][0]) * (ndc[1][1] - ndc[0][1]);
            if ndc_area.abs() <= f32::MIN_POSITIVE {
                continue;
            }
            fragments += rasterize(bindings, state, [a, b, c], ndc_area, extent)?;
        }
    }
    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32, y: f32) -> ScreenVertex {
        ScreenVertex {
            x,
            y,
            z: 0.5,
            inv_w: 1.0,
            varyings: [Vec4::ZERO; HOST_VARYINGS],
        }
    }

    #[test]
    fn test_top_left_rule_owns_shared_edges_once() {
        // Two triangles sharing the diagonal of a 2x2 square.
        let a = [vertex(0.0, 0.0), vertex(2.0, 0.0), vertex(0.0, 2.0)];
        let b = [vertex(2.0, 0.0), vertex(2.0, 2.0), vertex(0.0, 2.0)];
        let covers = |t: &[ScreenVertex; 3], px: f32, py: f32| {
            let edges = [(1, 2), (2, 0), (0, 1)];
            edges.iter().all(|&(i, j)| {
                let w = edge(&t[i], &t[j], px, py);
                w > 0.0 || (w == 0.0 && is_top_left(&t[i], &t[j]))
            })
        };
        // The pixel centre (1, 1) lies exactly on the shared diagonal.
        let owners = [covers(&a, 1.0, 1.0), covers(&b, 1.0, 1.0)];
        assert_eq!(owners.iter().filter(|&&o| o).count(), 1);
    }

    #[test]
    fn test_premultiplied_over_blend() {
        let dst = Vec4::new(0.0, 0.0, 1.0, 1.0);
        let src = Vec4::new(0.5, 0.0, 0.0, 0.5);
        let out = blend(BlendState::PREMULTIPLIED_OVER, src, dst);
        assert_eq!(out, Vec4::new(0.5, 0.0, 0.5, 1.0));
    }
}
