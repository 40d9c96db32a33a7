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

//! Per-frame orchestration of the voxelization lanes.
//!
//! A frame always walks the same stages, recorded into one command list:
//!
//! ```text
//! Idle → ClearResources → BuildLists(X) → BuildLists(Y) → BuildLists(Z)
//!      → MemoryBarrier(ListsToResolve) → ResolveVolume
//!      → MemoryBarrier(ResolveToTrace) → ConeTrace → Idle
//! ```
//!
//! The pipeline owns the axis cameras, the fragment lists and the volume, and
//! only clears them between frames.

use super::axis_camera::Axis;
use super::config::VoxelizationConfig;
use super::cone_tracer::ConeTracer;
use super::error::VoxelError;
use super::fragment_list::{AxisList, FragmentListBuilder, ObjectData};
use super::resolver::VoxelVolumeResolver;
use std::sync::Arc;
use voxa_core::renderer::api::BarrierScope;
use voxa_core::renderer::{CommandEncoder, FramebufferProvider, GraphicsDevice, TechniqueCompiler};
use voxa_core::scene::{DrawableLayout, Scene};
use voxa_core::ViewingCamera;

/// The two ordering points of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Barrier {
    /// List-build atomics and records become visible to the resolve walk.
    ListsToResolve,
    /// Committed volume texels become visible to mip generation and sampling.
    ResolveToTrace,
}

impl Barrier {
    pub fn scope(self) -> BarrierScope {
        match self {
            Barrier::ListsToResolve => {
                BarrierScope::SHADER_STORAGE
                    | BarrierScope::ATOMIC_COUNTER
                    | BarrierScope::SHADER_IMAGE_ACCESS
            }
            Barrier::ResolveToTrace => {
                BarrierScope::SHADER_IMAGE_ACCESS | BarrierScope::TEXTURE_FETCH
            }
        }
    }
}

/// A state of the per-frame state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStage {
    Idle,
    ClearResources,
    BuildLists(Axis),
    MemoryBarrier(Barrier),
    ResolveVolume,
    ConeTrace,
}

impl FrameStage {
    /// The only stage allowed to follow `self`.
    pub fn next(self) -> FrameStage {
        match self {
            FrameStage::Idle => FrameStage::ClearResources,
            FrameStage::ClearResources => FrameStage::BuildLists(Axis::X),
            FrameStage::BuildLists(Axis::X) => FrameStage::BuildLists(Axis::Y),
            FrameStage::BuildLists(Axis::Y) => FrameStage::BuildLists(Axis::Z),
            FrameStage::BuildLists(Axis::Z) => FrameStage::MemoryBarrier(Barrier::ListsToResolve),
            FrameStage::MemoryBarrier(Barrier::ListsToResolve) => FrameStage::ResolveVolume,
            FrameStage::ResolveVolume => FrameStage::MemoryBarrier(Barrier::ResolveToTrace),
            FrameStage::MemoryBarrier(Barrier::ResolveToTrace) => FrameStage::ConeTrace,
            FrameStage::ConeTrace => FrameStage::Idle,
        }
    }

    /// Every stage of one frame after `Idle`, ending back at `Idle`.
    pub fn frame_sequence() -> Vec<FrameStage> {
        let mut stages = Vec::with_capacity(9);
        let mut stage = FrameStage::Idle.next();
        loop {
            stages.push(stage);
            if stage == FrameStage::Idle {
                return stages;
            }
            stage = stage.next();
        }
    }
}

/// Tracks the current stage and refuses out-of-order transitions.
#[derive(Debug, Default)]
struct StageCursor {
    current: Option<FrameStage>,
    visited: Vec<FrameStage>,
}

impl StageCursor {
    fn enter(&mut self, to: FrameStage) -> Result<(), VoxelError> {
        let from = self.current.unwrap_or(FrameStage::Idle);
        if from.next() != to {
            return Err(VoxelError::StageOrder { from, to });
        }
        log::trace!("VoxelizationPipeline: {from:?} -> {to:?}");
        self.current = Some(to);
        self.visited.push(to);
        Ok(())
    }
}

/// Switches that let tests observe what each barrier protects.
///
/// A disabled barrier keeps its stage in the trace but records no command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub list_barrier: bool,
    pub volume_barrier: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            list_barrier: true,
            volume_barrier: true,
        }
    }
}

impl PipelineOptions {
    fn enabled(&self, barrier: Barrier) -> bool {
        match barrier {
            Barrier::ListsToResolve => self.list_barrier,
            Barrier::ResolveToTrace => self.volume_barrier,
        }
    }
}

/// What a frame drew.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameReport {
    /// Renderables the scene queued.
    pub renderables: usize,
    /// Draws recorded on each axis, indexed by [`Axis::index`].
    pub draws_per_axis: [u32; 3],
}

/// Voxelizes a scene every frame and cone traces it into the framebuffer.
#[derive(Debug)]
pub struct VoxelizationPipeline {
    device: Arc<dyn GraphicsDevice>,
    framebuffer: Arc<dyn FramebufferProvider>,
    config: VoxelizationConfig,
    options: PipelineOptions,
    lists: FragmentListBuilder,
    resolver: VoxelVolumeResolver,
    tracer: ConeTracer,
    last_trace: Vec<FrameStage>,
}

impl VoxelizationPipeline {
    /// Validates `config`, compiles every technique and allocates the frame resources.
    ///
    /// ## Errors
    /// Any invalid setting, shader or link failure aborts construction.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        compiler: &dyn TechniqueCompiler,
        framebuffer: Arc<dyn FramebufferProvider>,
        config: VoxelizationConfig,
    ) -> Result<Self, VoxelError> {
        Self::with_options(device, compiler, framebuffer, config, PipelineOptions::default())
    }

    pub fn with_options(
        device: Arc<dyn GraphicsDevice>,
        compiler: &dyn TechniqueCompiler,
        framebuffer: Arc<dyn FramebufferProvider>,
        config: VoxelizationConfig,
        options: PipelineOptions,
    ) -> Result<Self, VoxelError> {
        config.validate()?;
        let lists = FragmentListBuilder::new(device.clone(), compiler, &config)?;
        let resolver = VoxelVolumeResolver::new(device.clone(), compiler, &config)?;
        let tracer = ConeTracer::new(
            device.clone(),
            compiler,
            &config,
            framebuffer.color_format(),
        )?;
        if !options.list_barrier || !options.volume_barrier {
            log::warn!("VoxelizationPipeline: Created with barriers disabled: {options:?}");
        }
        log::info!(
            "VoxelizationPipeline: Ready on '{}' with a {}³ volume",
            device.adapter_info().name,
            config.voxel_resolution
        );
        Ok(Self {
            device,
            framebuffer,
            config,
            options,
            lists,
            resolver,
            tracer,
            last_trace: Vec::new(),
        })
    }

    pub fn config(&self) -> &VoxelizationConfig {
        &self.config
    }

    pub fn lists(&self) -> &FragmentListBuilder {
        &self.lists
    }

    pub fn resolver(&self) -> &VoxelVolumeResolver {
        &self.resolver
    }

    pub fn tracer(&self) -> &ConeTracer {
        &self.tracer
    }

    /// Stages entered by the last completed frame, ending with `Idle`.
    pub fn last_frame_trace(&self) -> &[FrameStage] {
        &self.last_trace
    }

    /// Records, submits and leaves one frame in the framebuffer's colour target.
    pub fn render_frame(
        &mut self,
        scene: &dyn Scene,
        camera: &ViewingCamera,
    ) -> Result<FrameReport, VoxelError> {
        let renderables = scene.renderable_queue();
        let objects: Vec<ObjectData> = renderables
            .iter()
            .map(|r| ObjectData {
                world: r.world_matrix(),
                color: r.drawable_layout().base_color,
            })
            .collect();
        let draws: Vec<DrawableLayout> =
            renderables.iter().map(|r| r.drawable_layout()).collect();
        self.lists.upload_objects(&objects)?;

        let mut encoder = self.device.create_command_encoder(Some("voxa_frame"));
        let mut cursor = StageCursor::default();
        let mut report = FrameReport {
            renderables: renderables.len(),
            ..FrameReport::default()
        };

        cursor.enter(FrameStage::ClearResources)?;
        self.lists.clear(encoder.as_mut());
        self.resolver.clear(encoder.as_mut());

        for axis in Axis::ALL {
            cursor.enter(FrameStage::BuildLists(axis))?;
            report.draws_per_axis[axis.index()] = self.lists.build(encoder.as_mut(), axis, &draws);
        }

        self.barrier(&mut cursor, encoder.as_mut(), Barrier::ListsToResolve)?;

        cursor.enter(FrameStage::ResolveVolume)?;
        let lists: [AxisList; 3] = Axis::ALL.map(|axis| self.lists.list(axis));
        self.resolver.resolve(encoder.as_mut(), &lists);

        self.barrier(&mut cursor, encoder.as_mut(), Barrier::ResolveToTrace)?;

        cursor.enter(FrameStage::ConeTrace)?;
        let background = self
            .config
            .background
            .unwrap_or_else(|| self.framebuffer.clear_color());
        self.tracer.trace(
            encoder.as_mut(),
            Some(self.resolver.volume()),
            camera,
            self.framebuffer.as_ref(),
            background,
        )?;

        cursor.enter(FrameStage::Idle)?;
        self.device.submit(encoder.finish())?;
        self.last_trace = cursor.visited;
        log::debug!("VoxelizationPipeline: Frame done: {report:?}");
        Ok(report)
    }

    fn barrier(
        &self,
        cursor: &mut StageCursor,
        encoder: &mut dyn CommandEncoder,
        barrier: Barrier,
    ) -> Result<(), VoxelError> {
        cursor.enter(FrameStage::MemoryBarrier(barrier))?;
        if self.options.enabled(barrier) {
            encoder.memory_barrier(barrier.scope());
        } else {
            log::warn!("VoxelizationPipeline: Skipping {barrier:?} barrier");
        }
        Ok(())
    }

    /// Releases every GPU resource the pipeline owns.
    pub fn destroy(self) -> Result<(), VoxelError> {
        self.lists.destroy()?;
        self.resolver.destroy()?;
        self.tracer.destroy()?;
        log::info!("VoxelizationPipeline: Destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_sequence_visits_every_stage_once() {
        let stages = FrameStage::frame_sequence();
        assert_eq!(
            stages,
            vec![
                FrameStage::ClearResources,
                FrameStage::BuildLists(Axis::X),
                FrameStage::BuildLists(Axis::Y),
                FrameStage::BuildLists(Axis::Z),
                FrameStage::MemoryBarrier(Barrier::ListsToResolve),
                FrameStage::ResolveVolume,
                FrameStage::MemoryBarrier(Barrier::ResolveToTrace),
                FrameStage::ConeTrace,
                FrameStage::Idle,
            ]
        );
    }

    #[test]
    fn test_cursor_rejects_a_skipped_stage() {
        let mut cursor = StageCursor::default();
        cursor.enter(FrameStage::ClearResources).unwrap();
        let err = cursor.enter(FrameStage::ResolveVolume).unwrap_err();
        assert!(matches!(
            err,
            VoxelError::StageOrder {
                from: FrameStage::ClearResources,
                to: FrameStage::ResolveVolume
            }
        ));
        assert_eq!(cursor.visited, vec![FrameStage::ClearResources]);
    }

    #[test]
    fn test_barrier_scopes() {
        let lists = Barrier::ListsToResolve.scope();
        assert!(lists.contains(BarrierScope::SHADER_STORAGE | BarrierScope::ATOMIC_COUNTER));
        assert!(lists.contains(BarrierScope::SHADER_IMAGE_ACCESS));
        let volume = Barrier::ResolveToTrace.scope();
        assert!(volume.contains(BarrierScope::TEXTURE_FETCH));
        assert!(!volume.intersects(BarrierScope::SHADER_STORAGE));
    }
}
