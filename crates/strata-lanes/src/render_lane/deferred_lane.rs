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

//! The deferred tier.
//!
//! 1. Geometry into the G-buffer: albedo + metallic, view normal + roughness,
//!    linear depth and a depth-stencil attachment.
//! 2. Lighting into an HDR target cleared to black: a full-screen directional
//!    light, then one instanced light-volume draw per [`VolumeBatch`], all
//!    blended additively and depth-tested against the G-buffer depth.
//! 3. A composite that tonemaps or shows a debug view.
//!
//! Shadow maps are rendered before the geometry pass.

use super::arena::{LightArena, VolumeBatch};
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
    CommandEncoder, Framebuffer, FramebufferDescriptor, GpuBindGroup, GpuRenderPipeline,
    GraphicsDevice, LightKind, MeshBuffer, MeshData, RendererPath, Vertex,
};

/// Albedo + metallic, view normal + roughness, linear depth.
pub const GBUFFER_FORMATS: [TextureFormat; 3] = [
    TextureFormat::Rgba8Unorm,
    TextureFormat::Rgba16Float,
    TextureFormat::R32Float,
];
/// The G-buffer's depth-stencil attachment.
pub const GBUFFER_DEPTH_FORMAT: TextureFormat = TextureFormat::Depth24PlusStencil8;
/// The lighting accumulation target.
pub const HDR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

const SPHERE_STACKS: u32 = 16;
const SPHERE_SLICES: u32 = 24;
const CONE_SLICES: u32 = 24;

#[derive(Debug)]
struct DeferredTargets {
    gbuffer: Framebuffer,
    hdr: Framebuffer,
}

impl DeferredTargets {
    fn allocate(device: &Arc<dyn GraphicsDevice>, extent: Extent2D) -> Result<Self, LaneError> {
        let gbuffer = Framebuffer::new(
            device,
            &FramebufferDescriptor {
                label: "gbuffer",
                extent,
                color_formats: &GBUFFER_FORMATS,
                depth_format: Some(GBUFFER_DEPTH_FORMAT),
            },
        )?;
        let hdr = Framebuffer::new(
            device,
            &FramebufferDescriptor {
                label: "hdr",
                extent,
                color_formats: &[HDR_FORMAT],
                depth_format: None,
            },
        )?;
        Ok(Self { gbuffer, hdr })
    }

    fn view(framebuffer: &Framebuffer, index: usize) -> Result<TextureViewId, LaneError> {
        framebuffer
            .color(index)
            .map(|attachment| attachment.view())
            .ok_or(LaneError::MissingTargets("Deferred"))
    }

    /// Bindings 2, 3 and 4.
    fn gbuffer_entries(&self) -> Result<[BindGroupEntry; 3], LaneError> {
        Ok([
            BindGroupEntry::texture(2, Self::view(&self.gbuffer, 0)?),
            BindGroupEntry::texture(3, Self::view(&self.gbuffer, 1)?),
            BindGroupEntry::texture(4, Self::view(&self.gbuffer, 2)?),
        ])
    }

    fn release(&mut self) {
        self.gbuffer.release();
        self.hdr.release();
    }
}

#[derive(Debug)]
struct DeferredBindings {
    lights: BufferId,
    gbuffer: GpuBindGroup,
    dir_light: GpuBindGroup,
    volume: GpuBindGroup,
    composite: GpuBindGroup,
}

/// G-buffer deferred shading with light-volume accumulation.
#[derive(Debug)]
pub struct DeferredLane {
    device: Arc<dyn GraphicsDevice>,
    shadows: ShadowSystem,
    arena: LightArena,

    gbuffer: BoundProgram,
    gbuffer_pipelines: ScenePipelines,
    dir_light: BoundProgram,
    dir_light_pipeline: GpuRenderPipeline,
    volume: BoundProgram,
    volume_outside: GpuRenderPipeline,
    volume_inside: GpuRenderPipeline,
    composite: BoundProgram,
    composite_pipeline: GpuRenderPipeline,

    sphere: MeshBuffer,
    cone: MeshBuffer,

    targets: Option<DeferredTargets>,
    bindings: Option<DeferredBindings>,
}

impl DeferredLane {
    /// Builds every program, pipeline and volume mesh, and allocates the shadow maps.
    pub fn new(device: &Arc<dyn GraphicsDevice>, settings: &LaneSettings) -> Result<Self, LaneError> {
        log::info!("DeferredLane: initializing GPU resources");
        let library = &settings.shaders;
        let shadows = ShadowSystem::new(device, library, settings.shadows)?;

        let gbuffer = bound_program(device, library, ProgramKind::GBuffer)?;
        let gbuffer_targets: Vec<_> = GBUFFER_FORMATS
            .iter()
            .map(|&format| ColorTargetState::replace(format))
            .collect();
        let gbuffer_pipelines =
            ScenePipelines::new(device, &gbuffer, GBUFFER_DEPTH_FORMAT, &gbuffer_targets)?;

        let dir_light = bound_program(device, library, ProgramKind::DirLight)?;
        let dir_light_pipeline = fullscreen_pipeline(
            device,
            &dir_light,
            Some(depth_state(GBUFFER_DEPTH_FORMAT, false, CompareFunction::Always)),
            ColorTargetState::additive(HDR_FORMAT),
        )?;

        let volume = bound_program(device, library, ProgramKind::LightVolume)?;
        let volume_pipeline = |inside: bool| {
            let (cull_mode, compare, suffix) = if inside {
                (CullMode::Front, CompareFunction::GreaterEqual, "inside")
            } else {
                (CullMode::Back, CompareFunction::LessEqual, "outside")
            };
            GpuRenderPipeline::create(
                device,
                &RenderPipelineDescriptor {
                    label: Some(format!("light_volume_{suffix}").into()),
                    program: volume.id(),
                    vertex_buffers: vec![Vertex::buffer_layout()].into(),
                    cull_mode,
                    depth_stencil: Some(depth_state(GBUFFER_DEPTH_FORMAT, false, compare)),
                    color_targets: vec![ColorTargetState::additive(HDR_FORMAT)].into(),
                },
            )
        };
        let volume_outside = volume_pipeline(false)?;
        let volume_inside = volume_pipeline(true)?;

        let composite = bound_program(device, library, ProgramKind::Composite)?;
        let composite_pipeline = fullscreen_pipeline(
            device,
            &composite,
            None,
            ColorTargetState::replace(settings.target_format),
        )?;

        let sphere = MeshBuffer::from_data(
            device,
            "light_volume_sphere",
            &MeshData::sphere(SPHERE_STACKS, SPHERE_SLICES),
        )?;
        let cone = MeshBuffer::from_data(device, "light_volume_cone", &MeshData::cone(CONE_SLICES))?;

        Ok(Self {
            device: device.clone(),
            shadows,
            arena: LightArena::new(),
            gbuffer,
            gbuffer_pipelines,
            dir_light,
            dir_light_pipeline,
            volume,
            volume_outside,
            volume_inside,
            composite,
            composite_pipeline,
            sphere,
            cone,
            targets: None,
            bindings: None,
        })
    }

    /// The lane's shadow maps.
    pub fn shadows(&self) -> &ShadowSystem {
        &self.shadows
    }

    /// This frame's light list and volume batches.
    pub fn arena(&self) -> &LightArena {
        &self.arena
    }

    fn ensure_targets(&mut self, extent: Extent2D) -> Result<(), LaneError> {
        require_extent("Deferred", extent)?;
        if self
            .targets
            .as_ref()
            .is_some_and(|t| t.gbuffer.extent() == extent)
        {
            return Ok(());
        }
        log::debug!(
            "DeferredLane: allocating targets {}x{}",
            extent.width,
            extent.height
        );
        self.bindings = None;
        self.targets = Some(DeferredTargets::allocate(&self.device, extent)?);
        Ok(())
    }

    fn ensure_bindings(&mut self) -> Result<(), LaneError> {
        let lights = self
            .arena
            .buffer_id()
            .ok_or(LaneError::MissingTargets("Deferred"))?;
        if self.bindings.as_ref().is_some_and(|b| b.lights == lights) {
            return Ok(());
        }
        let targets = self
            .targets
            .as_ref()
            .ok_or(LaneError::MissingTargets("Deferred"))?;
        let gbuffer = targets.gbuffer_entries()?;
        let shadows = self.shadows.bind_entries()?;
        let hdr = DeferredTargets::view(&targets.hdr, 0)?;

        let device = &self.device;
        let lit = [gbuffer.as_slice(), shadows.as_slice()].concat();
        let mut with_lights = vec![BindGroupEntry::buffer(1, lights)];
        with_lights.extend_from_slice(&lit);
        let mut composite_entries = lit.clone();
        composite_entries.push(BindGroupEntry::texture(7, hdr));

        self.bindings = Some(DeferredBindings {
            lights,
            gbuffer: self.gbuffer.bind(device, &[])?,
            dir_light: self.dir_light.bind(device, &lit)?,
            volume: self.volume.bind(device, &with_lights)?,
            composite: self.composite.bind(device, &composite_entries)?,
        });
        log::debug!("DeferredLane: bind groups rebuilt");
        Ok(())
    }

    fn stage_uniforms(&mut self, frame: &FrameContext<'_>) -> Result<(), LaneError> {
        let camera = frame.camera;
        let sun = frame.sun;
        let size = camera.viewport.as_vec2();
        let screen_size = [size.x, size.y, 0.0, 0.0];

        self.gbuffer
            .set("mvp", &camera.view_projection().to_cols_array());
        self.gbuffer.set("view", &camera.view.to_cols_array());
        self.gbuffer.set("material", &frame.material.to_uniform());
        self.gbuffer.upload()?;

        let dir_light = &mut self.dir_light;
        dir_light.set("inverse_projection", &camera.inverse_projection.to_cols_array());
        dir_light.set(
            "light_dir",
            &Vec4::from((sun.view_direction(&camera.view), 0.0)).to_array(),
        );
        dir_light.set(
            "light_color",
            &Vec4::from((sun.color, sun.intensity)).to_array(),
        );
        dir_light.set("ambient", &Vec4::from((sun.ambient, 1.0)).to_array());
        dir_light.set("screen_size", &screen_size);
        dir_light.upload()?;

        self.volume
            .set("projection", &camera.projection.to_cols_array());
        self.volume
            .set("inverse_projection", &camera.inverse_projection.to_cols_array());
        self.volume.set("screen_size", &screen_size);
        self.volume.upload()?;

        stage_composite(&mut self.composite, frame);
        self.composite.upload()?;
        Ok(())
    }

    fn volume_mesh(&self, batch: &VolumeBatch) -> &MeshBuffer {
        match batch.kind {
            LightKind::Point => &self.sphere,
            LightKind::Spot => &self.cone,
        }
    }

    fn volume_pipeline(&self, batch: &VolumeBatch) -> RenderPipelineId {
        if batch.camera_inside {
            self.volume_inside.id()
        } else {
            self.volume_outside.id()
        }
    }
}

impl RenderLane for DeferredLane {
    fn strategy_name(&self) -> &'static str {
        "Deferred"
    }

    fn path(&self) -> RendererPath {
        RendererPath::Deferred
    }

    fn resize(&mut self, extent: Extent2D) {
        if self
            .targets
            .as_ref()
            .is_some_and(|t| t.gbuffer.extent() != extent)
        {
            log::debug!("DeferredLane: viewport resized, targets invalidated");
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

        let (Some(targets), Some(bindings)) = (self.targets.as_ref(), self.bindings.as_ref()) else {
            return Err(LaneError::MissingTargets("Deferred"));
        };

        {
            let colors = targets
                .gbuffer
                .color_attachments(Operations::clear(Color::TRANSPARENT));
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("gbuffer"),
                color_attachments: &colors,
                depth_stencil_attachment: targets.gbuffer.depth_attachment(Operations::clear(1.0)),
            });
            pass.set_bind_group(0, bindings.gbuffer.id());
            for item in frame.draws {
                pass.set_pipeline(self.gbuffer_pipelines.select(item));
                item.mesh.draw(pass.as_mut());
            }
        }

        {
            let colors = targets.hdr.color_attachments(Operations::clear(Color::BLACK));
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("lighting"),
                color_attachments: &colors,
                depth_stencil_attachment: targets.gbuffer.depth_attachment(Operations::load()),
            });
            pass.set_pipeline(self.dir_light_pipeline.id());
            pass.set_bind_group(0, bindings.dir_light.id());
            pass.draw(0..3, 0..1);

            pass.set_bind_group(0, bindings.volume.id());
            for batch in self.arena.batches() {
                pass.set_pipeline(self.volume_pipeline(batch));
                self.volume_mesh(batch)
                    .draw_instanced(pass.as_mut(), batch.instances.clone());
            }
        }

        record_composite(
            encoder,
            frame,
            self.composite_pipeline.id(),
            bindings.composite.id(),
        );

        log::trace!(
            "DeferredLane: frame {} gbuffer -> lighting ({} volume batches) -> composite",
            frame.frame,
            self.arena.batches().len()
        );

        let shadow_stats = self.shadows.stats();
        Ok(FrameStats {
            frame: frame.frame,
            path: RendererPath::Deferred,
            lights: self.arena.len() as u32,
            spot_shadows: shadow_stats.spot_registrations,
            point_shadows: shadow_stats.point_registrations,
            cascades_updated: shadow_stats.cascades_rendered,
            dropped_tile_lights: None,
        })
    }

    fn release(&mut self) {
        self.bindings = None;
        if let Some(mut targets) = self.targets.take() {
            targets.release();
        }
        self.shadows.release();
        self.gbuffer_pipelines.release();
        self.dir_light_pipeline.release();
        self.volume_outside.release();
        self.volume_inside.release();
        self.composite_pipeline.release();
        log::debug!("DeferredLane: released GPU resources");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::testing::MockGraphicsDevice;

    #[test]
    fn volume_pipelines_flip_culling_inside() {
        let mock = Arc::new(MockGraphicsDevice::new());
        let device: Arc<dyn GraphicsDevice> = mock.clone();
        let _lane = DeferredLane::new(&device, &LaneSettings::default()).unwrap();

        let outside = &mock.render_pipelines_labeled("light_volume_outside")[0];
        assert_eq!(outside.cull_mode, CullMode::Back);
        let outside_depth = outside.depth_stencil.unwrap();
        assert_eq!(outside_depth.depth_compare, CompareFunction::LessEqual);
        assert!(!outside_depth.depth_write_enabled);

        let inside = &mock.render_pipelines_labeled("light_volume_inside")[0];
        assert_eq!(inside.cull_mode, CullMode::Front);
        let inside_depth = inside.depth_stencil.unwrap();
        // Only back faces behind the stored depth enclose visible geometry.
        assert_eq!(inside_depth.depth_compare, CompareFunction::GreaterEqual);
        assert!(!inside_depth.depth_write_enabled);
        assert_eq!(inside.color_targets[0].blend, Some(BlendMode::Additive));
    }

    #[test]
    fn ground_pipeline_does_not_write_depth() {
        let mock = Arc::new(MockGraphicsDevice::new());
        let device: Arc<dyn GraphicsDevice> = mock.clone();
        let _lane = DeferredLane::new(&device, &LaneSettings::default()).unwrap();

        let test_only = &mock.render_pipelines_labeled("gbuffer_test")[0];
        assert!(!test_only.depth_stencil.unwrap().depth_write_enabled);
        assert_eq!(test_only.color_targets.len(), 3);
        let writing = &mock.render_pipelines_labeled("gbuffer_write")[0];
        assert!(writing.depth_stencil.unwrap().depth_write_enabled);
    }
}
