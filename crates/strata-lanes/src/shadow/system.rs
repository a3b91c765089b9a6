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

//! Shadow map resources and depth passes.
//!
//! The system owns three depth arrays: one layer per cascade, one per spot
//! shadow and six per point shadow. Each layer has its own attachment view,
//! uniform buffer and bind group, so every layer is one render pass with no
//! dynamic offsets.
//!
//! Matrices go through two stages. Registration and cascade fitting produce
//! *pending* world-space matrices for this frame; a kind that is due renders
//! them and promotes them to *rendered*. Shading always samples with the
//! rendered set, so a throttled map and its matrices stay consistent.

use super::cascade::{compute_cascades, Cascade};
use super::projection::{point_face_view_projections, point_layer, spot_view_projection, CUBE_FACE_COUNT};
use super::schedule::{ShadowKind, ShadowScheduler, MAX_POINT_SHADOWS, MAX_SPOT_SHADOWS};
use crate::error::ShadowError;
use crate::render_lane::shaders::{ProgramKind, ShaderLibrary};
use crate::render_lane::DrawItem;
use bytemuck::{Pod, Zeroable};
use std::sync::Arc;
use strata_core::config::{ShadowSettings, MAX_CASCADES};
use strata_core::math::{Mat4, Vec3};
use strata_core::renderer::api::*;
use strata_core::renderer::{
    CameraView, CommandEncoder, GpuBindGroup, GpuBuffer, GpuRenderPipeline, GpuTexture,
    GpuTextureView, GraphicsDevice, Light, LightKind, ShaderProgram, ShadowSlot, UniformBlock,
    Vertex,
};

/// Constant depth bias applied while rasterizing casters.
pub const CASTER_DEPTH_BIAS: i32 = 2;
/// Slope-scaled depth bias applied while rasterizing casters.
pub const CASTER_SLOPE_BIAS: f32 = 2.0;
/// Point shadow filter disk, in texels of a map of this resolution.
const POINT_FILTER_TEXELS: f32 = 2.5;

const POINT_LAYERS: usize = (MAX_POINT_SHADOWS * CUBE_FACE_COUNT) as usize;

/// The uniform block bound at binding 8 of every lit program.
///
/// Every matrix maps camera view space to a shadow map's clip space.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShadowUniforms {
    /// One per cascade.
    pub cascade_matrices: [[f32; 16]; 4],
    /// One per spot slot.
    pub spot_matrices: [[f32; 16]; 4],
    /// Six per point slot, in cube face order.
    pub point_matrices: [[f32; 16]; 12],
    /// View to world, used to pick a point shadow face.
    pub inverse_view: [f32; 16],
    /// Far linear depth of each cascade.
    pub cascade_splits: [f32; 4],
    /// Cascade count, enabled flag, PCF radius, point filter radius in UV units.
    pub params: [f32; 4],
    /// Cascade, spot and point map resolutions.
    pub resolutions: [f32; 4],
    /// Directional receiver bias: minimum, slope.
    pub bias: [f32; 4],
}

/// What the shadow system did this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShadowFrameStats {
    /// Spot shadows granted this frame.
    pub spot_registrations: u32,
    /// Point shadows granted this frame.
    pub point_registrations: u32,
    /// Whether the cascades were re-rendered.
    pub cascades_rendered: bool,
    /// Whether spot maps were re-rendered.
    pub spots_rendered: bool,
    /// Whether point maps were re-rendered.
    pub points_rendered: bool,
}

#[derive(Debug)]
struct Layer {
    view: GpuTextureView,
    uniforms: GpuBuffer,
    bind_group: GpuBindGroup,
}

#[derive(Debug)]
struct ShadowMap {
    label: &'static str,
    texture: GpuTexture,
    sampled: GpuTextureView,
    layers: Vec<Layer>,
    resolution: u32,
}

impl ShadowMap {
    fn allocate(
        device: &Arc<dyn GraphicsDevice>,
        program: &ShaderProgram,
        block_size: usize,
        label: &'static str,
        resolution: u32,
        layer_count: u32,
    ) -> Result<Self, ShadowError> {
        let texture = GpuTexture::create(
            device,
            &TextureDescriptor {
                label: Some(label.into()),
                width: resolution,
                height: resolution,
                array_layers: layer_count,
                format: TextureFormat::Depth32Float,
                usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
            },
        )?;
        let sampled = texture.create_view(&TextureViewDescriptor::all_layers(format!("{label}_array")))?;
        let layers = (0..layer_count)
            .map(|layer| {
                let view = texture
                    .create_view(&TextureViewDescriptor::single_layer(format!("{label}_{layer}"), layer))?;
                let uniforms = GpuBuffer::create(
                    device,
                    &BufferDescriptor {
                        label: Some(format!("{label}_{layer}_uniforms").into()),
                        size: block_size.max(64) as u64,
                        usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
                    },
                )?;
                let bind_group = GpuBindGroup::create(
                    device,
                    &BindGroupDescriptor {
                        label: Some(format!("{label}_{layer}_bindings").into()),
                        program: program.id(),
                        entries: &[BindGroupEntry::buffer(UNIFORM_BLOCK_BINDING, uniforms.id())],
                    },
                )?;
                Ok(Layer {
                    view,
                    uniforms,
                    bind_group,
                })
            })
            .collect::<Result<Vec<_>, ShadowError>>()?;
        log::debug!("ShadowSystem: allocated '{label}' {resolution}x{resolution}x{layer_count}");
        Ok(Self {
            label,
            texture,
            sampled,
            layers,
            resolution,
        })
    }

    fn release(&mut self) {
        for layer in &mut self.layers {
            layer.bind_group.release();
            layer.uniforms.release();
            layer.view.release();
        }
        self.sampled.release();
        self.texture.release();
    }
}

#[derive(Debug)]
struct ShadowMaps {
    cascades: ShadowMap,
    spots: ShadowMap,
    points: ShadowMap,
    uniforms: GpuBuffer,
}

/// Directional, spot and point shadow maps.
#[derive(Debug)]
pub struct ShadowSystem {
    settings: ShadowSettings,
    scheduler: ShadowScheduler,
    program: ShaderProgram,
    pipeline: GpuRenderPipeline,
    matrix_block: UniformBlock,
    maps: Option<ShadowMaps>,

    cascades: Vec<Cascade>,
    pending_spots: Vec<Mat4>,
    pending_points: Vec<[Mat4; 6]>,

    rendered_cascades: Vec<Cascade>,
    rendered_spots: [Mat4; MAX_SPOT_SHADOWS as usize],
    rendered_points: [Mat4; POINT_LAYERS],

    stats: ShadowFrameStats,
}

impl ShadowSystem {
    /// Builds the depth program and allocates every map.
    ///
    /// With shadows disabled the maps shrink to a single texel so the lit
    /// programs still have something bound.
    pub fn new(
        device: &Arc<dyn GraphicsDevice>,
        library: &ShaderLibrary,
        settings: ShadowSettings,
    ) -> Result<Self, ShadowError> {
        let settings = settings.sanitized();
        let program = library.build(device, ProgramKind::ShadowDepth)?;
        let pipeline = GpuRenderPipeline::create(
            device,
            &RenderPipelineDescriptor {
                label: Some("shadow_depth".into()),
                program: program.id(),
                vertex_buffers: vec![Vertex::buffer_layout()].into(),
                cull_mode: CullMode::None,
                depth_stencil: Some(DepthStencilState {
                    format: TextureFormat::Depth32Float,
                    depth_write_enabled: true,
                    depth_compare: CompareFunction::LessEqual,
                    bias: DepthBias {
                        constant: CASTER_DEPTH_BIAS,
                        slope_scale: CASTER_SLOPE_BIAS,
                    },
                }),
                color_targets: Vec::new().into(),
            },
        )?;
        let matrix_block = program.uniform_block();

        let mut system = Self {
            settings,
            scheduler: ShadowScheduler::new(&settings),
            program,
            pipeline,
            matrix_block,
            maps: None,
            cascades: Vec::new(),
            pending_spots: Vec::new(),
            pending_points: Vec::new(),
            rendered_cascades: Vec::new(),
            rendered_spots: [Mat4::IDENTITY; MAX_SPOT_SHADOWS as usize],
            rendered_points: [Mat4::IDENTITY; POINT_LAYERS],
            stats: ShadowFrameStats::default(),
        };
        system.maps = Some(system.allocate(device)?);
        log::info!(
            "ShadowSystem: {} ({} cascades at {}, spots at {}, points at {})",
            if settings.enabled { "enabled" } else { "disabled" },
            settings.cascade_count,
            settings.cascade_resolution,
            settings.spot_resolution,
            settings.point_resolution
        );
        Ok(system)
    }

    fn allocate(&self, device: &Arc<dyn GraphicsDevice>) -> Result<ShadowMaps, ShadowError> {
        let size = |resolution: u32| if self.settings.enabled { resolution } else { 1 };
        let block = self.matrix_block.len();
        let cascades = ShadowMap::allocate(
            device,
            &self.program,
            block,
            "shadow_cascades",
            size(self.settings.cascade_resolution),
            self.settings.cascade_count,
        )?;
        let spots = ShadowMap::allocate(
            device,
            &self.program,
            block,
            "shadow_spots",
            size(self.settings.spot_resolution),
            MAX_SPOT_SHADOWS,
        )?;
        let points = ShadowMap::allocate(
            device,
            &self.program,
            block,
            "shadow_points",
            size(self.settings.point_resolution),
            MAX_POINT_SHADOWS * CUBE_FACE_COUNT,
        )?;
        let uniforms = GpuBuffer::create(
            device,
            &BufferDescriptor {
                label: Some("shadow_uniforms".into()),
                size: std::mem::size_of::<ShadowUniforms>() as u64,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            },
        )?;
        Ok(ShadowMaps {
            cascades,
            spots,
            points,
            uniforms,
        })
    }

    /// The sanitized settings in use.
    pub fn settings(&self) -> &ShadowSettings {
        &self.settings
    }

    /// The re-render scheduler.
    pub fn scheduler(&self) -> &ShadowScheduler {
        &self.scheduler
    }

    /// This frame's pending cascades.
    pub fn cascades(&self) -> &[Cascade] {
        &self.cascades
    }

    /// What happened so far this frame.
    pub fn stats(&self) -> ShadowFrameStats {
        self.stats
    }

    /// Starts a frame: advances the frame counter and forgets last frame's registrations.
    pub fn begin_frame(&mut self) {
        self.scheduler.begin_frame();
        self.pending_spots.clear();
        self.pending_points.clear();
        self.stats = ShadowFrameStats::default();
    }

    /// Forces every kind to re-render on its next frame.
    pub fn invalidate(&mut self) {
        self.scheduler.invalidate();
    }

    /// Grants a shadow slot to a light at `world_position`, if one is left.
    ///
    /// Slots are handed out first come, first served and are only valid this frame.
    pub fn register(&mut self, light: &Light, world_position: Vec3) -> ShadowSlot {
        if !self.settings.enabled {
            return ShadowSlot::None;
        }
        match light.kind {
            LightKind::Spot => match self.scheduler.register_spot() {
                Some(index) => {
                    self.pending_spots.push(spot_view_projection(
                        world_position,
                        light.direction_from(world_position),
                        light.outer_angle(),
                        light.radius,
                    ));
                    self.stats.spot_registrations += 1;
                    ShadowSlot::Spot(index)
                }
                None => {
                    log::trace!("ShadowSystem: spot shadow cap reached");
                    ShadowSlot::None
                }
            },
            LightKind::Point => match self.scheduler.register_point() {
                Some(index) => {
                    self.pending_points
                        .push(point_face_view_projections(world_position, light.radius));
                    self.stats.point_registrations += 1;
                    ShadowSlot::Point(index)
                }
                None => {
                    log::trace!("ShadowSystem: point shadow cap reached");
                    ShadowSlot::None
                }
            },
        }
    }

    /// Fits this frame's cascades to the camera.
    pub fn update_cascades(&mut self, camera: &CameraView, light_direction: Vec3) {
        if self.settings.enabled {
            self.cascades = compute_cascades(camera, light_direction, &self.settings);
        }
    }

    /// Renders every kind that is due and has something to render.
    pub fn render(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        casters: &[DrawItem<'_>],
    ) -> Result<(), ShadowError> {
        if !self.settings.enabled {
            return Ok(());
        }
        let maps = self.maps.as_ref().ok_or(ShadowError::NotAllocated)?;
        let pipeline = self.pipeline.id();
        let location = self.program.uniform_location("light_view_projection");
        let block = &mut self.matrix_block;
        let mut render_layer = |map: &ShadowMap, layer: usize, matrix: &Mat4| -> Result<(), ShadowError> {
            let Some(target) = map.layers.get(layer) else {
                return Ok(());
            };
            block.set(location, &matrix.to_cols_array());
            target.uniforms.write(0, block.as_bytes())?;
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some(map.label),
                color_attachments: &[],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: target.view.id(),
                    depth_ops: Some(Operations::clear(1.0)),
                    stencil_ops: None,
                }),
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, target.bind_group.id());
            for item in casters.iter().filter(|item| item.casts_shadow) {
                item.mesh.draw(pass.as_mut());
            }
            Ok(())
        };

        if self.scheduler.is_due(ShadowKind::Cascades) && !self.cascades.is_empty() {
            for (layer, cascade) in self.cascades.iter().enumerate() {
                render_layer(&maps.cascades, layer, &cascade.view_projection)?;
            }
            self.rendered_cascades.clone_from(&self.cascades);
            self.scheduler.mark_rendered(ShadowKind::Cascades);
            self.stats.cascades_rendered = true;
        }

        if self.scheduler.is_due(ShadowKind::Spot) && !self.pending_spots.is_empty() {
            for (layer, matrix) in self.pending_spots.iter().enumerate() {
                render_layer(&maps.spots, layer, matrix)?;
                self.rendered_spots[layer] = *matrix;
            }
            self.scheduler.mark_rendered(ShadowKind::Spot);
            self.stats.spots_rendered = true;
        }

        if self.scheduler.is_due(ShadowKind::Point) && !self.pending_points.is_empty() {
            for (index, faces) in self.pending_points.iter().enumerate() {
                for (face, matrix) in faces.iter().enumerate() {
                    let layer = point_layer(index as u32, face as u32) as usize;
                    render_layer(&maps.points, layer, matrix)?;
                    self.rendered_points[layer] = *matrix;
                }
            }
            self.scheduler.mark_rendered(ShadowKind::Point);
            self.stats.points_rendered = true;
        }

        log::trace!(
            "ShadowSystem: frame {} rendered cascades={} spots={} points={}",
            self.scheduler.frame_index(),
            self.stats.cascades_rendered,
            self.stats.spots_rendered,
            self.stats.points_rendered
        );
        Ok(())
    }

    /// The sampling uniforms for a camera, built from the last rendered matrices.
    pub fn uniforms(&self, camera: &CameraView) -> ShadowUniforms {
        let to_view = |world: &Mat4| (*world * camera.inverse_view).to_cols_array();
        let mut uniforms = ShadowUniforms::zeroed();
        let count = self.rendered_cascades.len().min(MAX_CASCADES as usize);
        for (i, cascade) in self.rendered_cascades.iter().take(count).enumerate() {
            uniforms.cascade_matrices[i] = to_view(&cascade.view_projection);
            uniforms.cascade_splits[i] = cascade.split_depth;
        }
        for (dst, src) in uniforms.spot_matrices.iter_mut().zip(&self.rendered_spots) {
            *dst = to_view(src);
        }
        for (dst, src) in uniforms.point_matrices.iter_mut().zip(&self.rendered_points) {
            *dst = to_view(src);
        }
        uniforms.inverse_view = camera.inverse_view.to_cols_array();

        let point_resolution = self.settings.point_resolution.max(1) as f32;
        let enabled = self.settings.enabled && count > 0;
        uniforms.params = [
            count as f32,
            if enabled { 1.0 } else { 0.0 },
            self.settings.pcf_radius as f32,
            POINT_FILTER_TEXELS / point_resolution,
        ];
        uniforms.resolutions = [
            self.settings.cascade_resolution as f32,
            self.settings.spot_resolution as f32,
            point_resolution,
            0.0,
        ];
        uniforms.bias = [self.settings.bias_min, self.settings.bias_slope, 0.0, 0.0];
        uniforms
    }

    /// Writes [`Self::uniforms`] to the buffer bound at binding 8.
    pub fn upload(&self, camera: &CameraView) -> Result<(), ShadowError> {
        let maps = self.maps.as_ref().ok_or(ShadowError::NotAllocated)?;
        maps.uniforms
            .write(0, bytemuck::bytes_of(&self.uniforms(camera)))?;
        Ok(())
    }

    /// Bindings 8 to 11 for a lit program's bind group.
    pub fn bind_entries(&self) -> Result<[BindGroupEntry; 4], ShadowError> {
        let maps = self.maps.as_ref().ok_or(ShadowError::NotAllocated)?;
        Ok([
            BindGroupEntry::buffer(8, maps.uniforms.id()),
            BindGroupEntry::texture(9, maps.cascades.sampled.id()),
            BindGroupEntry::texture(10, maps.spots.sampled.id()),
            BindGroupEntry::texture(11, maps.points.sampled.id()),
        ])
    }

    /// Resolution of the cascade map actually allocated.
    pub fn cascade_map_resolution(&self) -> Option<u32> {
        self.maps.as_ref().map(|maps| maps.cascades.resolution)
    }

    /// Destroys every map. Later calls do nothing.
    pub fn release(&mut self) {
        if let Some(mut maps) = self.maps.take() {
            maps.cascades.release();
            maps.spots.release();
            maps.points.release();
            maps.uniforms.release();
            log::debug!("ShadowSystem: released shadow maps");
        }
        self.pipeline.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::math::Extent2D;
    use strata_core::renderer::{MeshBuffer, MeshData};
    use strata_core::testing::{MockGraphicsDevice, RecordedCommand};

    fn setup(settings: ShadowSettings) -> (Arc<MockGraphicsDevice>, Arc<dyn GraphicsDevice>, ShadowSystem) {
        let mock = Arc::new(MockGraphicsDevice::new());
        let device: Arc<dyn GraphicsDevice> = mock.clone();
        let system = ShadowSystem::new(&device, &ShaderLibrary::embedded(), settings).unwrap();
        (mock, device, system)
    }

    fn camera() -> CameraView {
        let view = Mat4::look_at_rh(Vec3::new(8.0, 8.0, 8.0), Vec3::ZERO, Vec3::Y);
        CameraView::new(
            view,
            Mat4::orthographic_rh(-10.0, 10.0, -10.0, 10.0, 1.0, 100.0),
            1.0,
            100.0,
            Extent2D::new(128, 128),
        )
    }

    fn spot() -> Light {
        Light::spot(Vec3::new(0.0, 4.0, 0.0), Vec3::ZERO, 8.0, Vec3::ONE, 1.4, 15.0, 25.0, 0.0)
            .with_shadow(true)
    }

    fn point() -> Light {
        Light::point(Vec3::new(1.0, 1.0, 1.0), 6.0, Vec3::ONE, 1.0, 0.0).with_shadow(true)
    }

    fn pass_labels(mock: &MockGraphicsDevice) -> Vec<String> {
        mock.submitted_commands()
            .into_iter()
            .filter_map(|c| match c {
                RecordedCommand::BeginRenderPass { label, .. } => label,
                _ => None,
            })
            .collect()
    }

    fn run_frame(
        device: &Arc<dyn GraphicsDevice>,
        system: &mut ShadowSystem,
        casters: &[DrawItem<'_>],
        spots: usize,
        points: usize,
    ) -> Vec<ShadowSlot> {
        system.begin_frame();
        let mut slots = Vec::new();
        for _ in 0..spots {
            let light = spot();
            slots.push(system.register(&light, light.base_position));
        }
        for _ in 0..points {
            let light = point();
            slots.push(system.register(&light, light.base_position));
        }
        system.update_cascades(&camera(), Vec3::new(-0.3, -1.0, -0.4));
        let mut encoder = device.create_command_encoder(Some("shadows"));
        system.render(encoder.as_mut(), casters).unwrap();
        device.submit_command_buffer(encoder.finish());
        slots
    }

    #[test]
    fn allocates_one_layer_per_slot() {
        let (mock, _device, _system) = setup(ShadowSettings::default());
        let cascades = mock.textures_labeled("shadow_cascades");
        assert_eq!(cascades.len(), 1);
        assert_eq!(cascades[0].array_layers, 3);
        assert_eq!(cascades[0].width, 2048);
        assert_eq!(mock.textures_labeled("shadow_spots")[0].array_layers, 4);
        assert_eq!(mock.textures_labeled("shadow_points")[0].array_layers, 12);
    }

    #[test]
    fn registrations_are_capped_and_restart_every_frame() {
        let (_mock, device, mut system) = setup(ShadowSettings::default());
        let slots = run_frame(&device, &mut system, &[], 0, 0);
        assert!(slots.is_empty());
        let slots = run_frame(&device, &mut system, &[], 3, 0);
        assert_eq!(slots, vec![ShadowSlot::Spot(0), ShadowSlot::Spot(1), ShadowSlot::Spot(2)]);
        let slots = run_frame(&device, &mut system, &[], 6, 3);
        assert_eq!(slots[4], ShadowSlot::None);
        assert_eq!(slots[5], ShadowSlot::None);
        assert_eq!(&slots[6..], &[ShadowSlot::Point(0), ShadowSlot::Point(1), ShadowSlot::None]);
        assert_eq!(system.stats().spot_registrations, 4);
        assert_eq!(system.stats().point_registrations, 2);
    }

    #[test]
    fn casters_are_drawn_into_every_due_layer() {
        let (mock, device, mut system) = setup(ShadowSettings::default());
        let wall = MeshBuffer::from_data(&device, "wall", &MeshData::sphere(4, 4)).unwrap();
        let ground = MeshBuffer::from_data(&device, "ground", &MeshData::sphere(4, 4)).unwrap();
        let casters = [
            DrawItem { mesh: &ground, writes_depth: false, casts_shadow: false },
            DrawItem { mesh: &wall, writes_depth: true, casts_shadow: true },
        ];
        run_frame(&device, &mut system, &casters, 1, 1);

        let labels = pass_labels(&mock);
        assert_eq!(labels.iter().filter(|l| *l == "shadow_cascades").count(), 3);
        assert_eq!(labels.iter().filter(|l| *l == "shadow_spots").count(), 1);
        assert_eq!(labels.iter().filter(|l| *l == "shadow_points").count(), 6);
        let draws = mock
            .submitted_commands()
            .into_iter()
            .filter(|c| matches!(c, RecordedCommand::DrawIndexed { .. }))
            .count();
        assert_eq!(draws, 10);
    }

    #[test]
    fn throttled_kinds_skip_frames() {
        let settings = ShadowSettings {
            cascade_update_every: 2,
            spot_update_every: 3,
            ..ShadowSettings::default()
        };
        let (mock, device, mut system) = setup(settings);
        let mut cascade_frames = Vec::new();
        let mut spot_frames = Vec::new();
        for frame in 1..=6 {
            mock.clear_submissions();
            run_frame(&device, &mut system, &[], 1, 0);
            if system.stats().cascades_rendered {
                cascade_frames.push(frame);
            }
            if system.stats().spots_rendered {
                spot_frames.push(frame);
            }
        }
        // The first frame always renders, then every Nth frame.
        assert_eq!(cascade_frames, vec![1, 2, 4, 6]);
        assert_eq!(spot_frames, vec![1, 3, 6]);
    }

    #[test]
    fn uniforms_follow_rendered_matrices() {
        let settings = ShadowSettings {
            cascade_update_every: 2,
            ..ShadowSettings::default()
        };
        let (_mock, device, mut system) = setup(settings);
        run_frame(&device, &mut system, &[], 0, 0);
        let first = system.uniforms(&camera());
        assert_eq!(first.params[0], 3.0);
        assert_eq!(first.params[1], 1.0);
        assert_eq!(first.cascade_splits[2], 100.0);

        // Frame 2 is due; frame 3 is throttled and must keep frame 2's matrices.
        run_frame(&device, &mut system, &[], 0, 0);
        let rendered = system.uniforms(&camera());
        run_frame(&device, &mut system, &[], 0, 0);
        assert!(!system.stats().cascades_rendered);
        assert_eq!(system.uniforms(&camera()), rendered);
    }

    #[test]
    fn disabled_shadows_bind_placeholders() {
        let settings = ShadowSettings {
            enabled: false,
            ..ShadowSettings::default()
        };
        let (mock, device, mut system) = setup(settings);
        assert_eq!(mock.textures_labeled("shadow_cascades")[0].width, 1);
        let slots = run_frame(&device, &mut system, &[], 2, 2);
        assert!(slots.iter().all(|s| *s == ShadowSlot::None));
        assert!(pass_labels(&mock).is_empty());
        assert_eq!(system.uniforms(&camera()).params[1], 0.0);
        assert!(system.bind_entries().is_ok());
    }

    #[test]
    fn release_frees_maps_once() {
        let (mock, _device, mut system) = setup(ShadowSettings::default());
        assert_eq!(mock.live_textures(), 3);
        system.release();
        system.release();
        assert_eq!(mock.live_textures(), 0);
        assert!(matches!(system.bind_entries(), Err(ShadowError::NotAllocated)));
        drop(system);
        assert_eq!(mock.failed_destroys(), 0);
    }
}
