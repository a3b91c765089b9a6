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

//! The tiled compute tier.
//!
//! Pass sequence of one frame:
//!
//! 1. Shadow maps, when due.
//! 2. Depth pre-pass writing hardware depth and an R32F linear depth copy.
//! 3. Texture-fetch barrier.
//! 4. Depth reduction: one workgroup per tile writes the tile's depth range.
//! 5. Shader-storage barrier.
//! 6. Light culling: one invocation per tile fills the tile's index slice.
//! 7. Shader-storage barrier.
//! 8. Tiled forward shading into HDR, albedo and normal targets, testing
//!    against the pre-pass depth.
//! 9. Composite into the frame target.
//!
//! Every few frames the culling counters are copied to a readback buffer so
//! the dropped-light count can be reported.

use super::arena::LightArena;
use super::host_culler::CULL_GROUP_SIZE;
use super::{
    bound_program, depth_state, fullscreen_pipeline, record_composite, require_extent,
    stage_composite, BoundProgram, FrameContext, FrameStats, LaneSettings, ProgramKind,
    RenderLane, ScenePipelines,
};
use crate::error::LaneError;
use crate::shadow::ShadowSystem;
use std::sync::Arc;
use strata_core::math::{Extent2D, Vec4};
use strata_core::renderer::api::*;
use strata_core::renderer::{
    CommandEncoder, Framebuffer, FramebufferDescriptor, GpuBindGroup, GpuBuffer,
    GpuComputePipeline, GpuRenderPipeline, GraphicsDevice, RendererPath, TileCullStats,
    TiledCullingConfig,
};

/// Pre-pass depth attachment.
pub const PREPASS_DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
/// Pre-pass linear depth copy.
pub const LINEAR_DEPTH_FORMAT: TextureFormat = TextureFormat::R32Float;
/// Shading outputs: HDR color, albedo + metallic, view normal + roughness.
pub const SHADING_FORMATS: [TextureFormat; 3] = [
    TextureFormat::Rgba16Float,
    TextureFormat::Rgba8Unorm,
    TextureFormat::Rgba16Float,
];

const CULL_STATS_SIZE: u64 = std::mem::size_of::<TileCullStats>() as u64;

#[derive(Debug)]
struct TiledTargets {
    prepass: Framebuffer,
    shading: Framebuffer,
    tile_meta: GpuBuffer,
    light_indices: GpuBuffer,
    depth_ranges: GpuBuffer,
    tiles_x: u32,
    tiles_y: u32,
}

impl TiledTargets {
    fn allocate(
        device: &Arc<dyn GraphicsDevice>,
        config: &TiledCullingConfig,
        extent: Extent2D,
    ) -> Result<Self, LaneError> {
        let prepass = Framebuffer::new(
            device,
            &FramebufferDescriptor {
                label: "prepass",
                extent,
                color_formats: &[LINEAR_DEPTH_FORMAT],
                depth_format: Some(PREPASS_DEPTH_FORMAT),
            },
        )?;
        let shading = Framebuffer::new(
            device,
            &FramebufferDescriptor {
                label: "tiled_shading",
                extent,
                color_formats: &SHADING_FORMATS,
                depth_format: None,
            },
        )?;
        let storage = |label: &str, size: u64| {
            GpuBuffer::create(
                device,
                &BufferDescriptor {
                    label: Some(label.into()),
                    size,
                    usage: BufferUsage::STORAGE | BufferUsage::COPY_DST,
                },
            )
        };
        let (width, height) = (extent.width, extent.height);
        let (tiles_x, tiles_y) = config.tile_dimensions(width, height);
        Ok(Self {
            prepass,
            shading,
            tile_meta: storage("tile_meta", config.tile_meta_buffer_size(width, height))?,
            light_indices: storage(
                "light_indices",
                config.light_index_buffer_size(width, height),
            )?,
            depth_ranges: storage(
                "tile_depth_ranges",
                config.depth_range_buffer_size(width, height),
            )?,
            tiles_x,
            tiles_y,
        })
    }

    fn total_tiles(&self) -> u32 {
        self.tiles_x * self.tiles_y
    }

    fn view(framebuffer: &Framebuffer, index: usize) -> Result<TextureViewId, LaneError> {
        framebuffer
            .color(index)
            .map(|attachment| attachment.view())
            .ok_or(LaneError::MissingTargets("TiledCompute"))
    }

    fn release(&mut self) {
        self.prepass.release();
        self.shading.release();
        self.tile_meta.release();
        self.light_indices.release();
        self.depth_ranges.release();
    }
}

#[derive(Debug)]
struct TiledBindings {
    lights: BufferId,
    prepass: GpuBindGroup,
    reduce: GpuBindGroup,
    cull: GpuBindGroup,
    shading: GpuBindGroup,
    composite: GpuBindGroup,
}

/// Forward+ shading with compute light culling per screen tile.
#[derive(Debug)]
pub struct TiledComputeLane {
    device: Arc<dyn GraphicsDevice>,
    config: TiledCullingConfig,
    shadows: ShadowSystem,
    arena: LightArena,

    prepass: BoundProgram,
    prepass_pipelines: ScenePipelines,
    reduce: BoundProgram,
    reduce_pipeline: GpuComputePipeline,
    cull: BoundProgram,
    cull_pipeline: GpuComputePipeline,
    shading: BoundProgram,
    shading_pipeline: GpuRenderPipeline,
    composite: BoundProgram,
    composite_pipeline: GpuRenderPipeline,

    cull_stats: GpuBuffer,
    readback: GpuBuffer,
    readback_every: u32,
    readback_pending: bool,

    targets: Option<TiledTargets>,
    bindings: Option<TiledBindings>,
}

impl TiledComputeLane {
    /// Builds every program and pipeline, and allocates the shadow maps and counters.
    pub fn new(device: &Arc<dyn GraphicsDevice>, settings: &LaneSettings) -> Result<Self, LaneError> {
        log::info!(
            "TiledComputeLane: initializing GPU resources ({}px tiles, {} lights per tile)",
            settings.tiled.tile_size.pixels(),
            settings.tiled.max_lights_per_tile
        );
        let library = &settings.shaders;
        let shadows = ShadowSystem::new(device, library, settings.shadows)?;

        let prepass = bound_program(device, library, ProgramKind::DepthPrepass)?;
        let prepass_pipelines = ScenePipelines::new(
            device,
            &prepass,
            PREPASS_DEPTH_FORMAT,
            &[ColorTargetState::replace(LINEAR_DEPTH_FORMAT)],
        )?;

        let compute = |program: &BoundProgram| {
            GpuComputePipeline::create(
                device,
                &ComputePipelineDescriptor {
                    label: Some(program.label().to_string().into()),
                    program: program.id(),
                },
            )
        };
        let reduce = bound_program(device, library, ProgramKind::TileDepthReduce)?;
        let reduce_pipeline = compute(&reduce)?;
        let cull = bound_program(device, library, ProgramKind::TileLightCull)?;
        let cull_pipeline = compute(&cull)?;

        let shading = bound_program(device, library, ProgramKind::TiledShading)?;
        let shading_pipeline = GpuRenderPipeline::create(
            device,
            &RenderPipelineDescriptor {
                label: Some("tiled_shading".into()),
                program: shading.id(),
                vertex_buffers: vec![strata_core::renderer::Vertex::buffer_layout()].into(),
                cull_mode: CullMode::None,
                depth_stencil: Some(depth_state(
                    PREPASS_DEPTH_FORMAT,
                    false,
                    CompareFunction::LessEqual,
                )),
                color_targets: SHADING_FORMATS
                    .iter()
                    .map(|&format| ColorTargetState::replace(format))
                    .collect::<Vec<_>>()
                    .into(),
            },
        )?;

        let composite = bound_program(device, library, ProgramKind::Composite)?;
        let composite_pipeline = fullscreen_pipeline(
            device,
            &composite,
            None,
            ColorTargetState::replace(settings.target_format),
        )?;

        let cull_stats = GpuBuffer::create(
            device,
            &BufferDescriptor {
                label: Some("tile_cull_stats".into()),
                size: CULL_STATS_SIZE,
                usage: BufferUsage::STORAGE | BufferUsage::COPY_SRC | BufferUsage::COPY_DST,
            },
        )?;
        let readback = GpuBuffer::create(
            device,
            &BufferDescriptor {
                label: Some("tile_cull_stats_readback".into()),
                size: CULL_STATS_SIZE,
                usage: BufferUsage::MAP_READ | BufferUsage::COPY_DST,
            },
        )?;

        Ok(Self {
            device: device.clone(),
            config: settings.tiled.sanitized(),
            shadows,
            arena: LightArena::new(),
            prepass,
            prepass_pipelines,
            reduce,
            reduce_pipeline,
            cull,
            cull_pipeline,
            shading,
            shading_pipeline,
            composite,
            composite_pipeline,
            cull_stats,
            readback,
            readback_every: settings.stats_readback_every,
            readback_pending: false,
            targets: None,
            bindings: None,
        })
    }

    /// The lane's shadow maps.
    pub fn shadows(&self) -> &ShadowSystem {
        &self.shadows
    }

    /// This frame's light list.
    pub fn arena(&self) -> &LightArena {
        &self.arena
    }

    /// Tile size and light budget in use.
    pub fn config(&self) -> &TiledCullingConfig {
        &self.config
    }

    /// The storage buffer the culling pass accumulates its counters into.
    pub fn cull_stats_buffer(&self) -> BufferId {
        self.cull_stats.id()
    }

    /// Tiles along x and y for the current targets.
    pub fn tile_grid(&self) -> Option<(u32, u32)> {
        self.targets.as_ref().map(|t| (t.tiles_x, t.tiles_y))
    }

    fn ensure_targets(&mut self, extent: Extent2D) -> Result<(), LaneError> {
        require_extent("TiledCompute", extent)?;
        if self
            .targets
            .as_ref()
            .is_some_and(|t| t.prepass.extent() == extent)
        {
            return Ok(());
        }
        self.bindings = None;
        let targets = TiledTargets::allocate(&self.device, &self.config, extent)?;
        log::debug!(
            "TiledComputeLane: allocated targets {}x{} ({}x{} tiles)",
            extent.width,
            extent.height,
            targets.tiles_x,
            targets.tiles_y
        );
        self.targets = Some(targets);
        Ok(())
    }

    fn ensure_bindings(&mut self) -> Result<(), LaneError> {
        let lights = self
            .arena
            .buffer_id()
            .ok_or(LaneError::MissingTargets("TiledCompute"))?;
        if self.bindings.as_ref().is_some_and(|b| b.lights == lights) {
            return Ok(());
        }
        let targets = self
            .targets
            .as_ref()
            .ok_or(LaneError::MissingTargets("TiledCompute"))?;
        let shadows = self.shadows.bind_entries()?;
        let linear_depth = TiledTargets::view(&targets.prepass, 0)?;
        let hdr = TiledTargets::view(&targets.shading, 0)?;
        let albedo = TiledTargets::view(&targets.shading, 1)?;
        let normal = TiledTargets::view(&targets.shading, 2)?;
        let light_entry = BindGroupEntry::buffer(1, lights);
        let meta_entry = BindGroupEntry::buffer(5, targets.tile_meta.id());
        let indices_entry = BindGroupEntry::buffer(6, targets.light_indices.id());
        let ranges_entry = BindGroupEntry::buffer(7, targets.depth_ranges.id());

        let mut shading_entries = vec![light_entry, meta_entry, indices_entry];
        shading_entries.extend_from_slice(&shadows);
        let mut composite_entries = vec![
            BindGroupEntry::texture(2, albedo),
            BindGroupEntry::texture(3, normal),
            BindGroupEntry::texture(4, linear_depth),
            BindGroupEntry::texture(7, hdr),
        ];
        composite_entries.extend_from_slice(&shadows);

        let device = &self.device;
        self.bindings = Some(TiledBindings {
            lights,
            prepass: self.prepass.bind(device, &[])?,
            reduce: self.reduce.bind(
                device,
                &[BindGroupEntry::texture(4, linear_depth), ranges_entry],
            )?,
            cull: self.cull.bind(
                device,
                &[
                    light_entry,
                    meta_entry,
                    indices_entry,
                    ranges_entry,
                    BindGroupEntry::buffer(12, self.cull_stats.id()),
                ],
            )?,
            shading: self.shading.bind(device, &shading_entries)?,
            composite: self.composite.bind(device, &composite_entries)?,
        });
        log::debug!("TiledComputeLane: bind groups rebuilt");
        Ok(())
    }

    fn stage_uniforms(&mut self, frame: &FrameContext<'_>) -> Result<(), LaneError> {
        let camera = frame.camera;
        let sun = frame.sun;
        let extent = camera.viewport;
        let tile_size = self.config.tile_size.pixels();
        let (tiles_x, tiles_y) = self.config.tile_dimensions(extent.width, extent.height);
        let view_projection = camera.view_projection().to_cols_array();

        self.prepass.set("mvp", &view_projection);
        self.prepass.set("view", &camera.view.to_cols_array());
        self.prepass.upload()?;

        self.reduce
            .set("params", &[extent.width, extent.height, tile_size, tiles_x]);
        self.reduce.upload()?;

        let cull = &mut self.cull;
        cull.set("inverse_projection", &camera.inverse_projection.to_cols_array());
        cull.set("screen", &[extent.width, extent.height, tile_size, tiles_x]);
        cull.set(
            "counts",
            &[
                tiles_y,
                self.arena.len() as u32,
                self.config.max_lights_per_tile,
                0u32,
            ],
        );
        cull.upload()?;

        let shading = &mut self.shading;
        shading.set("mvp", &view_projection);
        shading.set("view", &camera.view.to_cols_array());
        shading.set(
            "light_dir",
            &Vec4::from((sun.view_direction(&camera.view), 0.0)).to_array(),
        );
        shading.set(
            "light_color",
            &Vec4::from((sun.color, sun.intensity)).to_array(),
        );
        shading.set("ambient", &Vec4::from((sun.ambient, 1.0)).to_array());
        shading.set("material", &frame.material.to_uniform());
        shading.set("tiles", &[tile_size, tiles_x, 0u32, 0u32]);
        shading.upload()?;

        stage_composite(&mut self.composite, frame);
        self.composite.upload()?;
        Ok(())
    }

    fn readback_due(&self, frame: u64) -> bool {
        self.readback_every > 0 && frame % u64::from(self.readback_every) == 0
    }
}

impl RenderLane for TiledComputeLane {
    fn strategy_name(&self) -> &'static str {
        "TiledCompute"
    }

    fn path(&self) -> RendererPath {
        RendererPath::TiledCompute
    }

    fn resize(&mut self, extent: Extent2D) {
        if self
            .targets
            .as_ref()
            .is_some_and(|t| t.prepass.extent() != extent)
        {
            log::debug!("TiledComputeLane: viewport resized, targets invalidated");
            self.bindings = None;
            self.targets = None;
        }
    }

    fn render(
        &mut self,
        frame: &FrameContext<'_>,
        encoder: &mut dyn CommandEncoder,
    ) -> Result<FrameStats, LaneError> {
        let camera = frame.camera;
        self.ensure_targets(camera.viewport)?;

        self.shadows.begin_frame();
        let shadows = &mut self.shadows;
        self.arena
            .rebuild(frame.lights, frame.time, camera, |light, position| {
                shadows.register(light, position)
            });
        self.shadows.update_cascades(camera, frame.sun.direction);
        self.shadows.render(encoder, frame.draws)?;
        self.shadows.upload(camera)?;

        if self.arena.upload(&self.device)? {
            self.bindings = None;
        }
        self.ensure_bindings()?;
        self.stage_uniforms(frame)?;
        self.cull_stats
            .write(0, bytemuck::bytes_of(&TileCullStats::default()))?;

        let (Some(targets), Some(bindings)) = (self.targets.as_ref(), self.bindings.as_ref()) else {
            return Err(LaneError::MissingTargets("TiledCompute"));
        };

        {
            let colors = targets
                .prepass
                .color_attachments(Operations::clear(Color::TRANSPARENT));
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("depth_prepass"),
                color_attachments: &colors,
                depth_stencil_attachment: targets.prepass.depth_attachment(Operations::clear(1.0)),
            });
            pass.set_bind_group(0, bindings.prepass.id());
            for item in frame.draws {
                pass.set_pipeline(self.prepass_pipelines.select(item));
                item.mesh.draw(pass.as_mut());
            }
        }
        encoder.memory_barrier(BarrierFlags::TEXTURE_FETCH);

        {
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("tile_depth_reduce"),
            });
            pass.set_pipeline(self.reduce_pipeline.id());
            pass.set_bind_group(0, bindings.reduce.id());
            pass.dispatch_workgroups(targets.tiles_x, targets.tiles_y, 1);
        }
        encoder.memory_barrier(BarrierFlags::SHADER_STORAGE);

        {
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("tile_light_cull"),
            });
            pass.set_pipeline(self.cull_pipeline.id());
            pass.set_bind_group(0, bindings.cull.id());
            pass.dispatch_workgroups(targets.total_tiles().div_ceil(CULL_GROUP_SIZE), 1, 1);
        }
        encoder.memory_barrier(BarrierFlags::SHADER_STORAGE);

        {
            let mut colors = targets
                .shading
                .color_attachments(Operations::clear(Color::TRANSPARENT));
            if let Some(hdr) = colors.first_mut() {
                hdr.ops = Operations::clear(Color::BLACK);
            }
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("tiled_shading"),
                color_attachments: &colors,
                depth_stencil_attachment: targets.prepass.depth_attachment(Operations::load()),
            });
            pass.set_pipeline(self.shading_pipeline.id());
            pass.set_bind_group(0, bindings.shading.id());
            for item in frame.draws {
                item.mesh.draw(pass.as_mut());
            }
        }

        record_composite(
            encoder,
            frame,
            self.composite_pipeline.id(),
            bindings.composite.id(),
        );

        if self.readback_due(frame.frame) {
            encoder.copy_buffer_to_buffer(
                self.cull_stats.id(),
                0,
                self.readback.id(),
                0,
                CULL_STATS_SIZE,
            );
            self.readback_pending = true;
        }

        log::trace!(
            "TiledComputeLane: frame {} prepass -> reduce {}x{} -> cull -> shading -> composite",
            frame.frame,
            targets.tiles_x,
            targets.tiles_y
        );

        let shadow_stats = self.shadows.stats();
        Ok(FrameStats {
            frame: frame.frame,
            path: RendererPath::TiledCompute,
            lights: self.arena.len() as u32,
            spot_shadows: shadow_stats.spot_registrations,
            point_shadows: shadow_stats.point_registrations,
            cascades_updated: shadow_stats.cascades_rendered,
            dropped_tile_lights: None,
        })
    }

    fn resolve_stats(&mut self, stats: &mut FrameStats) -> Result<(), LaneError> {
        if !self.readback_pending {
            return Ok(());
        }
        self.readback_pending = false;
        let bytes = self
            .device
            .read_buffer(self.readback.id(), 0, CULL_STATS_SIZE)?;
        let counters: TileCullStats = bytemuck::pod_read_unaligned(&bytes);
        if counters.dropped > 0 {
            log::debug!(
                "TiledComputeLane: {} light-tile pairs dropped, {} accepted",
                counters.dropped,
                counters.accepted
            );
        }
        stats.dropped_tile_lights = Some(counters.dropped);
        Ok(())
    }

    fn release(&mut self) {
        self.bindings = None;
        if let Some(mut targets) = self.targets.take() {
            targets.release();
        }
        self.shadows.release();
        self.prepass_pipelines.release();
        self.reduce_pipeline.release();
        self.cull_pipeline.release();
        self.shading_pipeline.release();
        self.composite_pipeline.release();
        self.cull_stats.release();
        self.readback.release();
        log::debug!("TiledComputeLane: released GPU resources");
    }
}
