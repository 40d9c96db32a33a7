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

mod common;

use common::{config, occupied, quad_scene, slice_center, texel, Harness};
use voxa_core::math::LinearRgba;
use voxa_core::renderer::GraphicsDevice;
use voxa_core::scene::StaticScene;
use voxa_core::ViewingCamera;
use voxa_lanes::{Axis, FrameStage, PipelineOptions, SENTINEL};

const RES: u32 = 16;

/// A red square covering voxels 4..12 on x and y, inside slice 8.
fn quad_harness(options: PipelineOptions) -> anyhow::Result<(Harness, StaticScene)> {
    let harness = Harness::with_options(config(RES), options)?;
    let scene = quad_scene(
        harness.device.as_ref(),
        0.5,
        slice_center(RES, 8),
        LinearRgba::RED,
    )?;
    Ok((harness, scene))
}

#[test]
fn test_quad_fills_its_footprint_in_the_centre_slice() -> anyhow::Result<()> {
    let (mut harness, scene) = quad_harness(PipelineOptions::default())?;
    let report = harness
        .pipeline
        .render_frame(&scene, &ViewingCamera::default())?;
    assert_eq!(report.renderables, 1);
    assert_eq!(report.draws_per_axis, [1, 1, 1]);

    let level = harness.pipeline.resolver().read_volume(0)?;
    for x in 4..12 {
        for y in 4..12 {
            assert_eq!(texel(&level, RES, [x, y, 8]), [255, 0, 0, 255], "at {x},{y}");
        }
    }
    assert_eq!(texel(&level, RES, [0, 0, 8]), [0; 4]);
    assert_eq!(texel(&level, RES, [14, 8, 8]), [0; 4]);
    assert_eq!(texel(&level, RES, [8, 8, 0]), [0; 4]);
    assert_eq!(texel(&level, RES, [8, 8, 12]), [0; 4]);
    assert_eq!(occupied(&level), 64);
    Ok(())
}

#[test]
fn test_cone_trace_sees_the_quad() -> anyhow::Result<()> {
    let (mut harness, scene) = quad_harness(PipelineOptions::default())?;
    harness
        .pipeline
        .render_frame(&scene, &ViewingCamera::default())?;

    let center = harness.center_pixel()?;
    assert!(center.r > 0.02, "centre pixel stayed background: {center:?}");
    assert!(center.g < 0.01 && center.b < 0.01);
    Ok(())
}

#[test]
fn test_frame_walks_every_stage_in_order() -> anyhow::Result<()> {
    let (mut harness, scene) = quad_harness(PipelineOptions::default())?;
    assert!(harness.pipeline.last_frame_trace().is_empty());
    harness
        .pipeline
        .render_frame(&scene, &ViewingCamera::default())?;
    assert_eq!(
        harness.pipeline.last_frame_trace(),
        FrameStage::frame_sequence().as_slice()
    );
    Ok(())
}

#[test]
fn test_frames_do_not_accumulate() -> anyhow::Result<()> {
    let (mut harness, scene) = quad_harness(PipelineOptions::default())?;
    let camera = ViewingCamera::default();
    harness.pipeline.render_frame(&scene, &camera)?;
    let first = harness.pipeline.resolver().read_volume(0)?;
    let first_pixels = harness.pixels()?;
    harness.pipeline.render_frame(&scene, &camera)?;
    assert_eq!(harness.pipeline.resolver().read_volume(0)?, first);
    assert_eq!(harness.pixels()?, first_pixels);

    // A frame without renderables leaves nothing behind.
    harness.pipeline.render_frame(&StaticScene::new(), &camera)?;
    assert_eq!(occupied(&harness.pipeline.resolver().read_volume(0)?), 0);
    assert_eq!(harness.center_pixel()?, LinearRgba::BLACK);
    Ok(())
}

#[test]
fn test_configured_background_replaces_clear_color() -> anyhow::Result<()> {
    let background = LinearRgba::new(0.0, 0.0, 1.0, 1.0);
    let mut cfg = config(RES);
    cfg.background = Some(background);
    let mut harness = Harness::new(cfg)?;
    harness
        .pipeline
        .render_frame(&StaticScene::new(), &ViewingCamera::default())?;
    assert!(harness.pixels()?.iter().all(|p| *p == background));
    Ok(())
}

#[test]
fn test_tracing_without_a_volume_shows_only_the_background() -> anyhow::Result<()> {
    let (mut harness, scene) = quad_harness(PipelineOptions::default())?;
    let camera = ViewingCamera::default();
    harness.pipeline.render_frame(&scene, &camera)?;
    assert_ne!(harness.center_pixel()?, LinearRgba::BLACK);

    // The previous frame's pixels are replaced, not blended over.
    let background = LinearRgba::new(0.25, 0.5, 0.75, 1.0);
    let mut encoder = harness.device.create_command_encoder(Some("trace_default"));
    harness.pipeline.tracer().trace(
        encoder.as_mut(),
        None,
        &camera,
        harness.target.as_ref(),
        background,
    )?;
    harness.device.submit(encoder.finish())?;

    let pixels = harness.pixels()?;
    assert!(
        pixels.iter().all(|p| (p.r - background.r).abs() < 0.01
            && (p.g - background.g).abs() < 0.01
            && (p.b - background.b).abs() < 0.01
            && (p.a - 1.0).abs() < 0.01),
        "expected pure background, got {:?}",
        pixels.iter().find(|p| **p != background)
    );
    Ok(())
}

#[test]
fn test_overflow_is_counted_and_dropped() -> anyhow::Result<()> {
    // 16 pixels per axis and 16 records, one of which is the sentinel slot.
    let mut cfg = config(4);
    cfg.node_pool_multiplier = 1;
    let mut harness = Harness::new(cfg)?;
    let scene = quad_scene(
        harness.device.as_ref(),
        1.0,
        slice_center(4, 2),
        LinearRgba::GREEN,
    )?;
    harness
        .pipeline
        .render_frame(&scene, &ViewingCamera::default())?;

    let lists = harness.pipeline.lists();
    assert_eq!(lists.capacity(), 16);
    assert_eq!(lists.overflow_count(Axis::Z)?, 1);
    assert_eq!(lists.overflow_count(Axis::X)?, 0);
    assert_eq!(lists.overflow_count(Axis::Y)?, 0);
    let empty = lists
        .read_heads(Axis::Z)?
        .into_iter()
        .filter(|&h| h == SENTINEL)
        .count();
    assert_eq!(empty, 1);

    let level = harness.pipeline.resolver().read_volume(0)?;
    assert_eq!(occupied(&level), 15);
    Ok(())
}

#[test]
fn test_larger_pool_absorbs_the_same_scene() -> anyhow::Result<()> {
    let mut cfg = config(4);
    cfg.node_pool_multiplier = 2;
    let mut harness = Harness::new(cfg)?;
    let scene = quad_scene(
        harness.device.as_ref(),
        1.0,
        slice_center(4, 2),
        LinearRgba::GREEN,
    )?;
    harness
        .pipeline
        .render_frame(&scene, &ViewingCamera::default())?;
    assert_eq!(harness.pipeline.lists().overflow_count(Axis::Z)?, 0);
    assert_eq!(
        occupied(&harness.pipeline.resolver().read_volume(0)?),
        16
    );
    Ok(())
}

#[test]
fn test_every_list_record_lands_in_its_slice() -> anyhow::Result<()> {
    let (mut harness, scene) = quad_harness(PipelineOptions::default())?;
    harness
        .pipeline
        .render_frame(&scene, &ViewingCamera::default())?;
    let lists = harness.pipeline.lists();
    // Pixel (8, 8) of the Z grid is covered once.
    let records = lists.read_list(Axis::Z, (8 * RES + 8) as usize)?;
    assert_eq!(records.len(), 1);
    let ([x, y, z], axis) = voxa_lanes::unpack_voxel(records[0].xy, records[0].z_axis);
    assert_eq!((x, z, axis), (8, 8, 2));
    assert_eq!(y, 7);
    assert_eq!(records[0].color, LinearRgba::RED.pack_rgba8());
    // The quad is edge-on to the other two axes.
    assert!(lists.read_heads(Axis::X)?.iter().all(|&h| h == SENTINEL));
    Ok(())
}
