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

//! Full-screen voxel cone tracing against the resolved volume.
//!
//! One primary cone per pixel starts at the near plane and is marched front to
//! back through the scene cube. Its diameter grows with distance, and each
//! sample reads the mip level whose voxels match that diameter. Samples are
//! composited with premultiplied front-to-back OVER, and the result is blended
//! OVER the framebuffer.
//!
//! # Channels
//!
//! | Slot              | Resource                           |
//! |-------------------|------------------------------------|
//! | `UniformBuffer2`  | `trace` inverse camera and volume   |
//! | `SampledTexture0` | `voxels` mipmapped volume           |
//! | `Sampler0`        | `voxel_sampler`, trilinear          |

use super::config::VoxelizationConfig;
use super::error::VoxelError;
use super::mapping::VolumeMapping;
use super::shaders::CONE_TRACE_WGSL;
use std::borrow::Cow;
use std::sync::Arc;
use voxa_core::math::{Extent3D, LinearRgba, Mat4, Vec3, Vec4};
use voxa_core::renderer::api::{
    BufferDescriptor, BufferId, ChannelSlot, RasterPassDescriptor, RasterState,
    ResourceDeclaration, ResourceKind, SamplerDescriptor, SamplerId, ShaderStage, StageSource,
    Technique, TechniqueDescriptor, TextureDescriptor, TextureDimension, TextureFormat, TextureId,
    TextureUsage,
};
use voxa_core::renderer::traits::host_kernel::{
    read_uniform, HostFragmentInput, HostVertexInput, HostVertexOutput,
};
use voxa_core::renderer::{
    CommandEncoder, FramebufferProvider, GraphicsDevice, HostKernel, HostResources, RenderError,
    TechniqueCompiler,
};
use voxa_core::ViewingCamera;

pub const TRACE_UNIFORM: ChannelSlot = ChannelSlot::new(ResourceKind::UniformBuffer, 2);
pub const VOXELS: ChannelSlot = ChannelSlot::new(ResourceKind::SampledTexture, 0);
pub const VOXEL_SAMPLER: ChannelSlot = ChannelSlot::new(ResourceKind::Sampler, 0);

/// Accumulated opacity at which a cone stops marching.
pub const OPAQUE_CUTOFF: f32 = 0.99;

/// `TraceUniforms` in `cone_trace.wgsl`.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct TraceUniforms {
    pub inv_view_proj: Mat4,
    /// Minimum corner of the cube in `xyz`, edge length in `w`.
    pub volume: [f32; 4],
    /// Voxel size, cone aperture, coarsest level, step budget.
    pub params: [f32; 4],
}

/// Upper bound on march steps through a cube of `resolution` voxels.
///
/// The smallest step is half a voxel and the longest chord is the diagonal.
pub fn step_budget(resolution: u32) -> u32 {
    (2.0 * 3.0_f32.sqrt() * resolution as f32).ceil() as u32 + 2
}

fn unproject(inv_view_proj: Mat4, ndc: [f32; 2], depth: f32) -> Vec3 {
    let p = inv_view_proj * Vec4::new(ndc[0], ndc[1], depth, 1.0);
    p.truncate() / p.w
}

/// Entry and exit distances of a ray through an axis-aligned box.
fn slab(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> (f32, f32) {
    let mut enter = 0.0_f32;
    let mut exit = f32::INFINITY;
    for i in 0..3 {
        let d = if dir[i].abs() < 1e-6 { 1e-6 } else { dir[i] };
        let t0 = (min[i] - origin[i]) / d;
        let t1 = (max[i] - origin[i]) / d;
        enter = enter.max(t0.min(t1));
        exit = exit.min(t0.max(t1));
    }
    (enter, exit)
}

/// Host twin of `cone_trace.wgsl`.
#[derive(Debug)]
pub struct ConeTraceKernel;

impl HostKernel for ConeTraceKernel {
    fn vertex(
        &self,
        input: &HostVertexInput,
        _resources: &dyn HostResources,
    ) -> Result<HostVertexOutput, RenderError> {
        let index = input.vertex_index;
        let u = ((index << 1) & 2) as f32;
        let v = (index & 2) as f32;
        let ndc = [u * 2.0 - 1.0, v * 2.0 - 1.0];
        let mut varyings = [Vec4::ZERO; 4];
        varyings[0] = Vec4::new(ndc[0], ndc[1], 0.0, 0.0);
        Ok(HostVertexOutput {
            position: Vec4::new(ndc[0], ndc[1], 0.0, 1.0),
            varyings,
        })
    }

    fn fragment(
        &self,
        input: &HostFragmentInput,
        resources: &mut dyn HostResources,
    ) -> Result<Option<Vec4>, RenderError> {
        let uniforms: TraceUniforms = read_uniform(resources, "trace")?;
        let ndc = [input.varyings[0].x, input.varyings[0].y];
        let origin = unproject(uniforms.inv_view_proj, ndc, 0.0);
        let dir = (unproject(uniforms.inv_view_proj, ndc, 1.0) - origin).normalize();

        let [mx, my, mz, edge] = uniforms.volume;
        let box_min = Vec3::new(mx, my, mz);
        let (t_enter, t_exit) = slab(origin, dir, box_min, box_min + Vec3::splat(edge));

        let [voxel, aperture, max_lod, budget] = uniforms.params;
        let spread = 2.0 * (aperture * 0.5).tan();
        let budget = budget as u32;

        let mut accum = Vec4::ZERO;
        let mut t = t_enter;
        let mut steps = 0;
        while t < t_exit && accum.w < OPAQUE_CUTOFF && steps < budget {
            let diameter = voxel.max(spread * t);
            let lod = (diameter / voxel).log2().clamp(0.0, max_lod);
            let uvw = (origin + dir * t - box_min) / edge;
            let inside = (0..3).all(|i| (0.0..=1.0).contains(&uvw[i]));
            let tap = if inside {
                resources.sample("voxels", "voxel_sampler", uvw, lod)?
            } else {
                Vec4::ZERO
            };
            accum = accum + tap * (1.0 - accum.w);
            t += diameter * 0.5;
            steps += 1;
        }
        Ok(Some(accum))
    }
}

/// The trace technique for targets of `color_format`.
pub fn cone_trace_descriptor(color_format: TextureFormat) -> TechniqueDescriptor {
    TechniqueDescriptor {
        label: "voxa_cone_trace".to_owned(),
        stages: vec![
            StageSource::new(ShaderStage::Vertex, "vs_main", CONE_TRACE_WGSL),
            StageSource::new(ShaderStage::Fragment, "fs_main", CONE_TRACE_WGSL),
        ],
        interface: vec![
            ResourceDeclaration::required("trace", ResourceKind::UniformBuffer),
            ResourceDeclaration::required("voxels", ResourceKind::SampledTexture),
            ResourceDeclaration::required("voxel_sampler", ResourceKind::Sampler),
        ],
        raster: RasterState::FULLSCREEN_OVER,
        vertex_layout: None,
        color_format: Some(color_format),
        host_kernel: Some(Arc::new(ConeTraceKernel)),
    }
}

/// Renders the volume into a framebuffer.
#[derive(Debug)]
pub struct ConeTracer {
    device: Arc<dyn GraphicsDevice>,
    technique: Technique,
    uniforms: BufferId,
    sampler: SamplerId,
    default_volume: TextureId,
    color_format: TextureFormat,
    mapping: VolumeMapping,
    aperture: f32,
    max_lod: f32,
}

impl ConeTracer {
    /// Compiles the trace technique for targets of `color_format`.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        compiler: &dyn TechniqueCompiler,
        config: &VoxelizationConfig,
        color_format: TextureFormat,
    ) -> Result<Self, VoxelError> {
        let mut unbound = compiler.compile(&cone_trace_descriptor(color_format))?;
        unbound
            .assign("trace", TRACE_UNIFORM.index)?
            .assign("voxels", VOXELS.index)?
            .assign("voxel_sampler", VOXEL_SAMPLER.index)?;
        let technique = unbound.build()?;

        let uniforms = device.create_buffer(&BufferDescriptor::uniform(
            "voxa_trace_uniforms",
            std::mem::size_of::<TraceUniforms>() as u64,
        ))?;
        let sampler = device.create_sampler(&SamplerDescriptor::trilinear_transparent_border())?;
        let default_volume = device.create_texture(&TextureDescriptor {
            label: Some(Cow::Borrowed("voxa_default_volume")),
            size: Extent3D::cube(1),
            mip_level_count: 1,
            dimension: TextureDimension::D3,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        })?;

        Ok(Self {
            device,
            technique,
            uniforms,
            sampler,
            default_volume,
            color_format,
            mapping: VolumeMapping::from_config(config),
            aperture: config.cone_aperture,
            max_lod: config.volume_mip_levels().saturating_sub(1) as f32,
        })
    }

    pub fn color_format(&self) -> TextureFormat {
        self.color_format
    }

    /// The 1³ transparent volume traced when no volume is supplied.
    pub fn default_volume(&self) -> TextureId {
        self.default_volume
    }

    /// Uniforms for one frame. A non-finite camera inverse falls back to identity.
    pub fn uniforms(&self, camera: &ViewingCamera, voxel_lods: bool) -> TraceUniforms {
        let inv_view_proj = camera.view_proj().inverse().unwrap_or(Mat4::IDENTITY);
        let min = self.mapping.min_corner();
        TraceUniforms {
            inv_view_proj,
            volume: [min.x, min.y, min.z, 2.0 * self.mapping.half_extent()],
            params: [
                self.mapping.voxel_size(),
                self.aperture,
                if voxel_lods { self.max_lod } else { 0.0 },
                step_budget(self.mapping.resolution()) as f32,
            ],
        }
    }

    /// Records mip generation for `volume` and the full-screen trace into `target`.
    ///
    /// The pass clears the target to `background` before blending, so
    /// anything the target held is overwritten. Without a volume the
    /// transparent default is traced and the frame shows only the background.
    pub fn trace(
        &self,
        encoder: &mut dyn CommandEncoder,
        volume: Option<TextureId>,
        camera: &ViewingCamera,
        target: &dyn FramebufferProvider,
        background: LinearRgba,
    ) -> Result<(), VoxelError> {
        if target.color_format() != self.color_format {
            return Err(VoxelError::TargetFormat {
                expected: self.color_format,
                found: target.color_format(),
            });
        }

        let texture = match volume {
            Some(volume) => {
                encoder.generate_mipmaps(volume);
                volume
            }
            None => {
                log::trace!("ConeTracer: No volume supplied, tracing the empty default");
                self.default_volume
            }
        };
        let uniforms = self.uniforms(camera, volume.is_some());
        self.device
            .write_buffer(self.uniforms, 0, bytemuck::bytes_of(&uniforms))?;

        encoder.bind_buffer(TRACE_UNIFORM, self.uniforms);
        encoder.bind_texture(VOXELS, texture);
        encoder.bind_sampler(VOXEL_SAMPLER, self.sampler);

        let mut descriptor = RasterPassDescriptor::load("voxa_cone_trace", target.color_target());
        descriptor.clear_color = Some(background);
        let mut pass = encoder.begin_raster_pass(&descriptor);
        pass.set_technique(&self.technique);
        pass.draw(0..3, 0..1);
        Ok(())
    }

    /// Releases the uniform buffer, sampler and default volume.
    pub fn destroy(self) -> Result<(), VoxelError> {
        self.device.destroy_buffer(self.uniforms)?;
        self.device.destroy_sampler(self.sampler)?;
        self.device.destroy_texture(self.default_volume)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_layout_matches_the_shader() {
        assert_eq!(std::mem::size_of::<TraceUniforms>(), 96);
    }

    #[test]
    fn test_budget_covers_the_diagonal_at_half_voxel_steps() {
        assert!(step_budget(64) as f32 >= 64.0 * 3.0_f32.sqrt() * 2.0);
        assert!(step_budget(1) >= 4);
    }

    #[test]
    fn test_slab_hits_and_misses() {
        let (enter, exit) = slab(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::splat(-1.0),
            Vec3::splat(1.0),
        );
        assert_relative_eq!(enter, 4.0, epsilon = 1e-5);
        assert_relative_eq!(exit, 6.0, epsilon = 1e-5);

        let (enter, exit) = slab(
            Vec3::new(3.0, 0.0, 5.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::splat(-1.0),
            Vec3::splat(1.0),
        );
        assert!(enter >= exit);
    }
}
