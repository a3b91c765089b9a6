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

//! Rendering lanes, one per lighting tier.
//!
//! Each tier is a [`RenderLane`] that owns every GPU resource its passes
//! touch. [`LightingEngine`] is the tier picked at startup; it is chosen once
//! and every call is dispatched with a `match`, so the engine never needs to
//! know which passes run underneath.

pub mod arena;
pub mod host_culler;
pub mod shaders;
pub mod uniforms;

mod deferred_lane;
mod simple_forward_lane;
mod tiled_compute_lane;

pub use arena::{camera_inside_volume, LightArena, VolumeBatch, VOLUME_SCALE};
pub use deferred_lane::DeferredLane;
pub use shaders::{ProgramKind, ShaderLibrary};
pub use simple_forward_lane::SimpleForwardLane;
pub use tiled_compute_lane::TiledComputeLane;
pub use uniforms::BoundProgram;

use crate::error::LaneError;
use crate::shadow::ShadowSystem;
use std::fmt;
use std::sync::Arc;
use strata_core::config::{EngineConfig, ShadowSettings};
use strata_core::math::{Extent2D, Vec4};
use strata_core::renderer::api::*;
use strata_core::renderer::{
    CameraView, CommandEncoder, DebugView, DirectionalLight, GpuRenderPipeline, GraphicsDevice,
    Light, MeshBuffer, RendererPath, ResourceError, TiledCullingConfig, Vertex,
};

/// Surface response shared by every object in the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Metalness in `[0, 1]`.
    pub metallic: f32,
    /// Roughness in `[0, 1]`; drives the specular power.
    pub roughness: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            metallic: 0.0,
            roughness: 0.6,
        }
    }
}

impl Material {
    /// `(metallic, roughness, 0, 0)`, the layout of the `material` uniform.
    pub fn to_uniform(self) -> [f32; 4] {
        [self.metallic, self.roughness, 0.0, 0.0]
    }
}

/// One mesh to draw this frame.
#[derive(Debug, Clone, Copy)]
pub struct DrawItem<'a> {
    /// Vertex and index buffers, already in world space.
    pub mesh: &'a MeshBuffer,
    /// Whether the mesh writes depth. The ground plane does not.
    pub writes_depth: bool,
    /// Whether the mesh is drawn into shadow maps.
    pub casts_shadow: bool,
}

/// Everything a lane needs to render one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    /// Frame counter, starting at 1.
    pub frame: u64,
    /// Seconds since startup, drives light animation.
    pub time: f32,
    /// Camera matrices and viewport.
    pub camera: &'a CameraView,
    /// Local lights in scene order.
    pub lights: &'a [Light],
    /// The directional light and ambient term.
    pub sun: &'a DirectionalLight,
    /// Surface response of every draw.
    pub material: Material,
    /// Meshes to draw.
    pub draws: &'a [DrawItem<'a>],
    /// The view the final image is written to.
    pub target: TextureViewId,
    /// Background color.
    pub clear_color: Color,
    /// What the final pass shows.
    pub debug_view: DebugView,
}

/// Counters describing one rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Frame counter.
    pub frame: u64,
    /// The tier that rendered it.
    pub path: RendererPath,
    /// Local lights shaded.
    pub lights: u32,
    /// Spot shadows granted.
    pub spot_shadows: u32,
    /// Point shadows granted.
    pub point_shadows: u32,
    /// Whether the directional cascades were re-rendered.
    pub cascades_updated: bool,
    /// Light-tile pairs dropped by full tiles, when a readback completed this frame.
    pub dropped_tile_lights: Option<u32>,
}

impl fmt::Display for FrameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {} [{}] lights={} spot_shadows={} point_shadows={} cascades_updated={}",
            self.frame,
            self.path,
            self.lights,
            self.spot_shadows,
            self.point_shadows,
            self.cascades_updated
        )?;
        if let Some(dropped) = self.dropped_tile_lights {
            write!(f, " dropped_tile_lights={dropped}")?;
        }
        Ok(())
    }
}

/// Construction parameters shared by the lanes.
#[derive(Debug, Clone)]
pub struct LaneSettings {
    /// Where WGSL sources come from.
    pub shaders: ShaderLibrary,
    /// Tile size and per-tile light budget.
    pub tiled: TiledCullingConfig,
    /// Shadow map sizes and cadence.
    pub shadows: ShadowSettings,
    /// Frames between dropped-light readbacks; `0` disables them.
    pub stats_readback_every: u32,
    /// Format of the views passed as [`FrameContext::target`].
    pub target_format: TextureFormat,
}

impl LaneSettings {
    /// Settings taken from the engine configuration.
    pub fn from_config(config: &EngineConfig, target_format: TextureFormat) -> Self {
        Self {
            shaders: ShaderLibrary::from_root(config.renderer.shader_root.clone()),
            tiled: config.tiled.sanitized(),
            shadows: config.shadows.sanitized(),
            stats_readback_every: config.renderer.stats_readback_every,
            target_format,
        }
    }
}

impl Default for LaneSettings {
    fn default() -> Self {
        Self {
            shaders: ShaderLibrary::embedded(),
            tiled: TiledCullingConfig::default(),
            shadows: ShadowSettings::default(),
            stats_readback_every: 60,
            target_format: TextureFormat::Bgra8Unorm,
        }
    }
}

/// A rendering strategy for one lighting tier.
///
/// A lane records its passes into the caller's encoder; submission and
/// presentation stay with the caller.
pub trait RenderLane {
    /// A human-readable name, used as the log prefix.
    fn strategy_name(&self) -> &'static str;

    /// The tier this lane implements.
    fn path(&self) -> RendererPath;

    /// Invalidates size-dependent targets. They are reallocated on the next
    /// [`render`](Self::render).
    fn resize(&mut self, extent: Extent2D);

    /// Records every pass of one frame.
    fn render(
        &mut self,
        frame: &FrameContext<'_>,
        encoder: &mut dyn CommandEncoder,
    ) -> Result<FrameStats, LaneError>;

    /// Fills in counters that are only known once the frame was submitted.
    fn resolve_stats(&mut self, _stats: &mut FrameStats) -> Result<(), LaneError> {
        Ok(())
    }

    /// Destroys every GPU resource. Later calls do nothing.
    fn release(&mut self);
}

/// The lighting tier chosen at startup.
#[derive(Debug)]
pub enum LightingEngine {
    /// One forward pass, directional light only.
    SimpleForward(SimpleForwardLane),
    /// G-buffer plus light volumes.
    Deferred(DeferredLane),
    /// Depth pre-pass, compute tile culling and tiled forward shading.
    TiledCompute(TiledComputeLane),
}

impl LightingEngine {
    /// Builds the lane for `path`. Any resource failure aborts construction.
    pub fn new(
        device: &Arc<dyn GraphicsDevice>,
        path: RendererPath,
        settings: &LaneSettings,
    ) -> Result<Self, LaneError> {
        log::info!("LightingEngine: building the {path} lane");
        let engine = match path {
            RendererPath::SimpleForward => {
                Self::SimpleForward(SimpleForwardLane::new(device, settings)?)
            }
            RendererPath::Deferred => Self::Deferred(DeferredLane::new(device, settings)?),
            RendererPath::TiledCompute => {
                Self::TiledCompute(TiledComputeLane::new(device, settings)?)
            }
        };
        Ok(engine)
    }

    /// The shadow system of the lit tiers.
    pub fn shadows(&self) -> Option<&ShadowSystem> {
        match self {
            Self::SimpleForward(_) => None,
            Self::Deferred(lane) => Some(lane.shadows()),
            Self::TiledCompute(lane) => Some(lane.shadows()),
        }
    }
}

impl RenderLane for LightingEngine {
    fn strategy_name(&self) -> &'static str {
        match self {
            Self::SimpleForward(lane) => lane.strategy_name(),
            Self::Deferred(lane) => lane.strategy_name(),
            Self::TiledCompute(lane) => lane.strategy_name(),
        }
    }

    fn path(&self) -> RendererPath {
        match self {
            Self::SimpleForward(_) => RendererPath::SimpleForward,
            Self::Deferred(_) => RendererPath::Deferred,
            Self::TiledCompute(_) => RendererPath::TiledCompute,
        }
    }

    fn resize(&mut self, extent: Extent2D) {
        match self {
            Self::SimpleForward(lane) => lane.resize(extent),
            Self::Deferred(lane) => lane.resize(extent),
            Self::TiledCompute(lane) => lane.resize(extent),
        }
    }

    fn render(
        &mut self,
        frame: &FrameContext<'_>,
        encoder: &mut dyn CommandEncoder,
    ) -> Result<FrameStats, LaneError> {
        match self {
            Self::SimpleForward(lane) => lane.render(frame, encoder),
            Self::Deferred(lane) => lane.render(frame, encoder),
            Self::TiledCompute(lane) => lane.render(frame, encoder),
        }
    }

    fn resolve_stats(&mut self, stats: &mut FrameStats) -> Result<(), LaneError> {
        match self {
            Self::SimpleForward(lane) => lane.resolve_stats(stats),
            Self::Deferred(lane) => lane.resolve_stats(stats),
            Self::TiledCompute(lane) => lane.resolve_stats(stats),
        }
    }

    fn release(&mut self) {
        match self {
            Self::SimpleForward(lane) => lane.release(),
            Self::Deferred(lane) => lane.release(),
            Self::TiledCompute(lane) => lane.release(),
        }
    }
}

/// A depth-writing and a depth-testing pipeline over the same program.
#[derive(Debug)]
pub(crate) struct ScenePipelines {
    writes_depth: GpuRenderPipeline,
    tests_depth: GpuRenderPipeline,
}

impl ScenePipelines {
    pub(crate) fn new(
        device: &Arc<dyn GraphicsDevice>,
        program: &BoundProgram,
        depth_format: TextureFormat,
        color_targets: &[ColorTargetState],
    ) -> Result<Self, ResourceError> {
        let build = |write: bool| {
            GpuRenderPipeline::create(
                device,
                &RenderPipelineDescriptor {
                    label: Some(
                        format!("{}_{}", program.label(), if write { "write" } else { "test" }).into(),
                    ),
                    program: program.id(),
                    vertex_buffers: vec![Vertex::buffer_layout()].into(),
                    cull_mode: CullMode::None,
                    depth_stencil: Some(depth_state(depth_format, write, CompareFunction::LessEqual)),
                    color_targets: color_targets.to_vec().into(),
                },
            )
        };
        Ok(Self {
            writes_depth: build(true)?,
            tests_depth: build(false)?,
        })
    }

    pub(crate) fn select(&self, item: &DrawItem<'_>) -> RenderPipelineId {
        if item.writes_depth {
            self.writes_depth.id()
        } else {
            self.tests_depth.id()
        }
    }

    pub(crate) fn release(&mut self) {
        self.writes_depth.release();
        self.tests_depth.release();
    }
}

pub(crate) fn depth_state(
    format: TextureFormat,
    write: bool,
    compare: CompareFunction,
) -> DepthStencilState {
    DepthStencilState {
        format,
        depth_write_enabled: write,
        depth_compare: compare,
        bias: DepthBias::default(),
    }
}

/// A pipeline drawing one full-screen triangle.
pub(crate) fn fullscreen_pipeline(
    device: &Arc<dyn GraphicsDevice>,
    program: &BoundProgram,
    depth_stencil: Option<DepthStencilState>,
    target: ColorTargetState,
) -> Result<GpuRenderPipeline, ResourceError> {
    GpuRenderPipeline::create(
        device,
        &RenderPipelineDescriptor {
            label: Some(program.label().to_string().into()),
            program: program.id(),
            vertex_buffers: Vec::new().into(),
            cull_mode: CullMode::None,
            depth_stencil,
            color_targets: vec![target].into(),
        },
    )
}

/// Builds a program and its uniform buffer.
pub(crate) fn bound_program(
    device: &Arc<dyn GraphicsDevice>,
    library: &ShaderLibrary,
    kind: ProgramKind,
) -> Result<BoundProgram, ResourceError> {
    BoundProgram::new(device, library.build(device, kind)?)
}

/// Stages the composite uniforms shared by the lit tiers.
pub(crate) fn stage_composite(composite: &mut BoundProgram, frame: &FrameContext<'_>) {
    let camera = frame.camera;
    let size = camera.viewport.as_vec2();
    let clear = frame.clear_color;
    composite.set("inverse_projection", &camera.inverse_projection.to_cols_array());
    composite.set("screen_size", &[size.x, size.y, 0.0, 0.0]);
    composite.set(
        "clear_color",
        &[clear.r as f32, clear.g as f32, clear.b as f32, 1.0],
    );
    composite.set(
        "params",
        &[frame.debug_view.index() as f32, camera.near, camera.far, 0.0],
    );
    composite.set(
        "light_dir",
        &Vec4::from((frame.sun.view_direction(&camera.view), 0.0)).to_array(),
    );
}

/// Records the full-screen composite into the frame target.
pub(crate) fn record_composite(
    encoder: &mut dyn CommandEncoder,
    frame: &FrameContext<'_>,
    pipeline: RenderPipelineId,
    bind_group: BindGroupId,
) {
    let color_attachments = [RenderPassColorAttachment {
        view: frame.target,
        ops: Operations::clear(frame.clear_color),
    }];
    let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
        label: Some("composite"),
        color_attachments: &color_attachments,
        depth_stencil_attachment: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group);
    pass.draw(0..3, 0..1);
}

/// Fails with [`LaneError::MissingTargets`] for an empty viewport.
pub(crate) fn require_extent(lane: &'static str, extent: Extent2D) -> Result<(), LaneError> {
    if extent.is_empty() {
        Err(LaneError::MissingTargets(lane))
    } else {
        Ok(())
    }
}
