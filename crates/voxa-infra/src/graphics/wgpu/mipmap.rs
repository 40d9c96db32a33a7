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

//! Compute-shader mipmap generation.

use voxa_core::math::Extent3D;
use voxa_core::renderer::api::{TextureDimension, TextureFormat};

const MIPMAP_3D_WGSL: &str = include_str!("shaders/mipmap_3d.wgsl");
const MIPMAP_2D_WGSL: &str = include_str!("shaders/mipmap_2d.wgsl");

#[derive(Debug)]
struct Downsampler {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    workgroup: [u32; 3],
}

impl Downsampler {
    fn new(device: &wgpu::Device, label: &str, source: &'static str, workgroup: [u32; 3]) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: None,
            module: &module,
            entry_point: Some("downsample"),
            compilation_options: Default::default(),
            cache: None,
        });
        let layout = pipeline.get_bind_group_layout(0);
        Self {
            pipeline,
            layout,
            workgroup,
        }
    }
}

/// Rebuilds mip chains of `rgba8unorm` textures with a box filter.
#[derive(Debug)]
pub(crate) struct MipmapGenerator {
    volume: Downsampler,
    image: Downsampler,
}

impl MipmapGenerator {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            volume: Downsampler::new(device, "voxa_mipmap_3d", MIPMAP_3D_WGSL, [4, 4, 4]),
            image: Downsampler::new(device, "voxa_mipmap_2d", MIPMAP_2D_WGSL, [8, 8, 1]),
        }
    }

    /// Whether `format` can be downsampled here.
    pub fn supports(format: TextureFormat) -> bool {
        format == TextureFormat::Rgba8Unorm
    }

    /// Records one compute pass per level above 0.
    pub fn encode(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        texture: &wgpu::Texture,
        dimension: TextureDimension,
        size: Extent3D,
        mip_level_count: u32,
    ) {
        let (downsampler, view_dimension) = match dimension {
            TextureDimension::D2 => (&self.image, wgpu::TextureViewDimension::D2),
            TextureDimension::D3 => (&self.volume, wgpu::TextureViewDimension::D3),
        };
        let level_view = |level: u32| {
            texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("voxa_mipmap_level"),
                dimension: Some(view_dimension),
                base_mip_level: level,
                mip_level_count: Some(1),
                ..Default::default()
            })
        };

        for level in 1..mip_level_count {
            let src = level_view(level - 1);
            let dst = level_view(level);
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("voxa_mipmap_bind_group"),
                layout: &downsampler.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&src),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&dst),
                    },
                ],
            });

            let extent = size.mip_level(level);
            let [wx, wy, wz] = downsampler.workgroup;
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("voxa_mipmap"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&downsampler.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(
                extent.width.div_ceil(wx),
                extent.height.div_ceil(wy),
                extent.depth.div_ceil(wz),
            );
        }
    }
}
