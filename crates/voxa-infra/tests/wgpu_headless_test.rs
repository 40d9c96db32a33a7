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

//! Runs only where a wgpu adapter is available; otherwise each test returns early.

use voxa_core::math::{Extent2D, Extent3D, LinearRgba, Origin3D, Region3D};
use voxa_core::renderer::api::*;
use voxa_core::renderer::{FramebufferProvider, GraphicsDevice};
use voxa_infra::{OffscreenTarget, WgpuDevice};

fn headless_device() -> Option<WgpuDevice> {
    match WgpuDevice::new_headless() {
        Ok(device) => Some(device),
        Err(e) => {
            eprintln!("Skipping wgpu test: {e}");
            None
        }
    }
}

#[test]
fn test_buffer_clear_and_readback() {
    let Some(device) = headless_device() else {
        return;
    };
    let buffer = device
        .create_buffer(&BufferDescriptor::storage("words", 16))
        .unwrap();
    let mut encoder = device.create_command_encoder(Some("clear"));
    encoder.clear_buffer(buffer, 7);
    device.submit(encoder.finish()).unwrap();

    let bytes = device.read_buffer(buffer).unwrap();
    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    assert_eq!(words, vec![7; 4]);
}

#[test]
fn test_image_region_clear_on_a_volume() {
    let Some(device) = headless_device() else {
        return;
    };
    let volume = device
        .create_texture(&TextureDescriptor {
            label: None,
            size: Extent3D::cube(4),
            mip_level_count: 1,
            dimension: TextureDimension::D3,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::COPY_DST | TextureUsage::COPY_SRC,
        })
        .unwrap();
    let mut encoder = device.create_command_encoder(None);
    encoder.clear_image_region(
        volume,
        0,
        Region3D {
            origin: Origin3D { x: 0, y: 0, z: 2 },
            extent: Extent3D::new(4, 4, 2),
        },
        ClearValue::Color(LinearRgba::WHITE),
    );
    device.submit(encoder.finish()).unwrap();

    let bytes = device.read_texture(volume, 0).unwrap();
    assert_eq!(bytes.len(), 4 * 4 * 4 * 4);
    let slice = 4 * 4 * 4;
    assert!(bytes[..2 * slice].iter().all(|&b| b == 0));
    assert!(bytes[2 * slice..].iter().all(|&b| b == 255));
}

#[test]
fn test_region_clears_keep_their_recorded_order() {
    let Some(device) = headless_device() else {
        return;
    };
    let volume = device
        .create_texture(&TextureDescriptor {
            label: None,
            size: Extent3D::cube(4),
            mip_level_count: 1,
            dimension: TextureDimension::D3,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::COPY_DST | TextureUsage::COPY_SRC,
        })
        .unwrap();
    let buffer = device
        .create_buffer(&BufferDescriptor::storage("words", 8))
        .unwrap();

    let mut encoder = device.create_command_encoder(Some("ordered_clears"));
    encoder.clear_buffer(buffer, 3);
    encoder.clear_image_region(
        volume,
        0,
        Region3D {
            origin: Origin3D::ZERO,
            extent: Extent3D::cube(4),
        },
        ClearValue::Color(LinearRgba::WHITE),
    );
    encoder.clear_image_region(
        volume,
        0,
        Region3D {
            origin: Origin3D { x: 0, y: 0, z: 1 },
            extent: Extent3D::new(4, 4, 3),
        },
        ClearValue::Color(LinearRgba::TRANSPARENT),
    );
    encoder.clear_buffer(buffer, 5);
    device.submit(encoder.finish()).unwrap();

    let bytes = device.read_texture(volume, 0).unwrap();
    let slice = 4 * 4 * 4;
    assert!(bytes[..slice].iter().all(|&b| b == 255));
    assert!(bytes[slice..].iter().all(|&b| b == 0));

    let words = device.read_buffer(buffer).unwrap();
    assert_eq!(&words[..4], &5u32.to_le_bytes());
}

#[test]
fn test_raster_pass_clears_the_target() {
    let Some(device) = headless_device() else {
        return;
    };
    let target = OffscreenTarget::new(&device, Extent2D::new(8, 8), TextureFormat::Rgba8Unorm)
        .unwrap()
        .with_clear_color(LinearRgba::GREEN);
    let mut encoder = device.create_command_encoder(None);
    {
        let _pass = encoder.begin_raster_pass(&RasterPassDescriptor {
            clear_color: Some(target.clear_color()),
            ..RasterPassDescriptor::load("clear", target.color_target())
        });
    }
    device.submit(encoder.finish()).unwrap();

    let pixels = target.read_pixels(&device).unwrap();
    assert!(pixels.iter().all(|p| *p == LinearRgba::GREEN));
}

#[test]
fn test_adapter_reports_limits() {
    let Some(device) = headless_device() else {
        return;
    };
    let limits = device.limits();
    assert!(limits.max_texture_dimension_3d >= 256);
}
