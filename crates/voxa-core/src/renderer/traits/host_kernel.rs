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

//! CPU implementations of technique stages.
//!
//! Host backends cannot run WGSL, so a technique may carry a [`HostKernel`]
//! mirroring its shaders. Kernels reach resources by their reflected names
//! through [`HostResources`], which applies the backend's memory model.

use crate::math::{Extent3D, Vec3, Vec4};
use crate::renderer::error::{RenderError, ResourceError};
use std::fmt::Debug;

/// Number of vertex attributes and interpolated varyings a host kernel sees.
pub const HOST_VARYINGS: usize = 4;

/// One vertex fed to [`HostKernel::vertex`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostVertexInput {
    /// Index of the vertex in the draw.
    pub vertex_index: u32,
    /// Index of the instance in the draw.
    pub instance_index: u32,
    /// Attributes by shader location, zero-extended to four components.
    pub attributes: [Vec4; HOST_VARYINGS],
}

/// Output of [`HostKernel::vertex`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HostVertexOutput {
    /// Clip-space position.
    pub position: Vec4,
    /// Values interpolated across the primitive.
    pub varyings: [Vec4; HOST_VARYINGS],
}

/// One fragment fed to [`HostKernel::fragment`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostFragmentInput {
    /// Pixel centre in framebuffer coordinates, depth in `z`, `1/w` in `w`.
    pub frag_coord: Vec4,
    /// Interpolated varyings.
    pub varyings: [Vec4; HOST_VARYINGS],
    /// Whether the primitive faces the viewer.
    pub front_facing: bool,
}

/// Name-based access to the resources bound for a draw or dispatch.
///
/// Loads and samples see the visible layer. Stores and atomics go to the
/// pending layer, published by a memory barrier or the end of the submission.
pub trait HostResources {
    /// Bytes of the uniform buffer bound to `name`.
    fn uniform_bytes(&self, name: &str) -> Result<&[u8], RenderError>;

    /// Length in 32-bit words of the buffer bound to `name`.
    fn word_len(&self, name: &str) -> Result<usize, RenderError>;

    /// Loads word `index` of the buffer bound to `name`.
    fn load_u32(&self, name: &str, index: usize) -> Result<u32, RenderError>;

    /// Stores word `index` of the buffer bound to `name`.
    fn store_u32(&mut self, name: &str, index: usize, value: u32) -> Result<(), RenderError>;

    /// Atomically adds `value`, returning the previous word.
    fn atomic_add_u32(&mut self, name: &str, index: usize, value: u32)
        -> Result<u32, RenderError>;

    /// Atomically replaces the word, returning the previous one.
    fn atomic_exchange_u32(
        &mut self,
        name: &str,
        index: usize,
        value: u32,
    ) -> Result<u32, RenderError>;

    /// Atomically keeps the larger word, returning the previous one.
    fn atomic_max_u32(&mut self, name: &str, index: usize, value: u32)
        -> Result<u32, RenderError>;

    /// Extent of the mip level bound to storage image `name`.
    fn image_extent(&self, name: &str) -> Result<Extent3D, RenderError>;

    /// Writes one texel of storage image `name`.
    fn store_texel(&mut self, name: &str, coord: [u32; 3], value: Vec4)
        -> Result<(), RenderError>;

    /// Samples texture `texture` with sampler `sampler` at normalized `coord`
    /// and explicit level of detail `lod`.
    fn sample(
        &self,
        texture: &str,
        sampler: &str,
        coord: Vec3,
        lod: f32,
    ) -> Result<Vec4, RenderError>;
}

/// Reads the uniform block `name` as `T`.
pub fn read_uniform<T: bytemuck::Pod>(
    resources: &dyn HostResources,
    name: &str,
) -> Result<T, RenderError> {
    let bytes = resources.uniform_bytes(name)?;
    let size = std::mem::size_of::<T>();
    let bytes = bytes
        .get(..size)
        .ok_or(RenderError::Resource(ResourceError::OutOfBounds))?;
    Ok(bytemuck::pod_read_unaligned(bytes))
}

/// Reads element `index` of a storage array of `T`. `T` must be a whole number of words.
pub fn read_storage<T: bytemuck::Pod>(
    resources: &dyn HostResources,
    name: &str,
    index: usize,
) -> Result<T, RenderError> {
    let words = std::mem::size_of::<T>() / 4;
    let base = index * words;
    let mut value = T::zeroed();
    for (i, chunk) in bytemuck::bytes_of_mut(&mut value)
        .chunks_exact_mut(4)
        .enumerate()
    {
        chunk.copy_from_slice(&resources.load_u32(name, base + i)?.to_le_bytes());
    }
    Ok(value)
}

/// CPU mirror of a technique's stages.
pub trait HostKernel: Send + Sync + Debug {
    /// Runs the vertex stage for one vertex.
    fn vertex(
        &self,
        input: &HostVertexInput,
        resources: &dyn HostResources,
    ) -> Result<HostVertexOutput, RenderError> {
        let _ = (input, resources);
        Err(RenderError::Submission(
            "host kernel has no vertex stage".to_owned(),
        ))
    }

    /// Runs the fragment stage. `None` writes no colour.
    fn fragment(
        &self,
        input: &HostFragmentInput,
        resources: &mut dyn HostResources,
    ) -> Result<Option<Vec4>, RenderError> {
        let _ = (input, resources);
        Ok(None)
    }

    /// Runs one compute invocation.
    fn compute(
        &self,
        global_id: [u32; 3],
        resources: &mut dyn HostResources,
    ) -> Result<(), RenderError> {
        let _ = (global_id, resources);
        Ok(())
    }
}
