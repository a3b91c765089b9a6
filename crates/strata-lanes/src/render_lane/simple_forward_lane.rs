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

//! The fallback tier: one forward pass with the directional light only.
//!
//! Local lights and shadows are ignored. The pass renders straight into the
//! frame target with a private depth buffer.

use super::{
    bound_program, require_extent, BoundProgram, DrawItem, FrameContext, FrameStats,
    LaneSettings, ProgramKind, RenderLane, ScenePipelines,
};
use crate::error::LaneError;
use std::sync::Arc;
use strata_core::math::{Extent2D, Vec4};
use strata_core::renderer::api::*;
use strata_core::renderer::{
    CommandEncoder, Framebuffer, FramebufferDescriptor, GpuBindGroup, GraphicsDevice, RenderPass,
    RendererPath,
};

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// Lambert forward shading straight to the surface.
#[derive(Debug)]
pub struct SimpleForwardLane {
    device: Arc<dyn GraphicsDevice>,
    program: BoundProgram,
    pipelines: ScenePipelines,
    bind_group: GpuBindGroup,
    depth: Option<Framebuffer>,
}

impl SimpleForwardLane {
    /// Builds the program and pipelines. The depth buffer is allocated on first use.
    pub fn new(device: &Arc<dyn GraphicsDevice>, settings: &LaneSettings) -> Result<Self, LaneError> {
        log::info!("SimpleForwardLane: initializing GPU resources");
        let program = bound_program(device, &settings.shaders, ProgramKind::Simple)?;
        let pipelines = ScenePipelines::new(
            device,
            &program,
            DEPTH_FORMAT,
            &[ColorTargetState::replace(settings.target_format)],
        )?;
        let bind_group = program.bind(device, &[])?;
        Ok(Self {
            device: device.clone(),
            program,
            pipelines,
            bind_group,
            depth: None,
        })
    }

    fn ensure_depth(&mut self, extent: Extent2D) -> Result<&Framebuffer, LaneError> {
        require_extent("SimpleForward", extent)?;
        if self.depth.as_ref().is_some_and(|fb| fb.extent() != extent) {
            self.depth = None;
        }
        let depth = match self.depth.take() {
            Some(depth) => depth,
            None => {
                log::debug!(
                    "SimpleForwardLane: allocating depth {}x{}",
                    extent.width,
                    extent.height
                );
                Framebuffer::new(
                    &self.device,
                    &FramebufferDescriptor {
                        label: "simple_depth",
                        extent,
                        color_formats: &[],
                        depth_format: Some(DEPTH_FORMAT),
                    },
                )?
            }
        };
        Ok(self.depth.insert(depth))
    }
}

impl RenderLane for SimpleForwardLane {
    fn strategy_name(&self) -> &'static str {
        "SimpleForward"
    }

    fn path(&self) -> RendererPath {
        RendererPath::SimpleForward
    }

    fn resize(&mut self, extent: Extent2D) {
        if self.depth.as_ref().is_some_and(|fb| fb.extent() != extent) {
            log::debug!("SimpleForwardLane: viewport resized, depth buffer invalidated");
            self.depth = None;
        }
    }

    fn render(
        &mut self,
        frame: &FrameContext<'_>,
        encoder: &mut dyn CommandEncoder,
    ) -> Result<FrameStats, LaneError> {
        let camera = frame.camera;
        let depth_attachment = self
            .ensure_depth(camera.viewport)?
            .depth_attachment(Operations::clear(1.0));

        let sun = frame.sun;
        self.program.set("mvp", &camera.view_projection().to_cols_array());
        self.program.set(
            "light_dir",
            &Vec4::from((sun.direction, sun.intensity)).to_array(),
        );
        self.program
            .set("ambient", &Vec4::from((sun.ambient, 1.0)).to_array());
        self.program.upload()?;

        {
            let color_attachments = [RenderPassColorAttachment {
                view: frame.target,
                ops: Operations::clear(frame.clear_color),
            }];
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("simple_forward"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: depth_attachment,
            });
            pass.set_bind_group(0, self.bind_group.id());
            for item in frame.draws {
                draw(pass.as_mut(), &self.pipelines, item);
            }
        }
        log::trace!("SimpleForwardLane: frame {} simple_forward", frame.frame);

        Ok(FrameStats {
            frame: frame.frame,
            path: RendererPath::SimpleForward,
            ..FrameStats::default()
        })
    }

    fn release(&mut self) {
        if let Some(mut depth) = self.depth.take() {
            depth.release();
        }
        self.bind_group.release();
        self.pipelines.release();
    }
}

fn draw(pass: &mut dyn RenderPass<'_>, pipelines: &ScenePipelines, item: &DrawItem<'_>) {
    pass.set_pipeline(pipelines.select(item));
    item.mesh.draw(pass);
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::math::{Mat4, Vec3};
    use strata_core::renderer::{CameraView, DebugView, DirectionalLight, MeshBuffer, MeshData};
    use strata_core::testing::{MockGraphicsDevice, RecordedCommand};

    fn camera(width: u32, height: u32) -> CameraView {
        CameraView::new(
            Mat4::look_at_rh(Vec3::new(5.0, 5.0, 5.0), Vec3::ZERO, Vec3::Y),
            Mat4::orthographic_rh(-10.0, 10.0, -10.0, 10.0, 1.0, 100.0),
            1.0,
            100.0,
            Extent2D::new(width, height),
        )
    }

    #[test]
    fn one_pass_into_the_target() {
        let mock = Arc::new(MockGraphicsDevice::new());
        let device: Arc<dyn GraphicsDevice> = mock.clone();
        let mut lane = SimpleForwardLane::new(&device, &LaneSettings::default()).unwrap();
        let mesh = MeshBuffer::from_data(&device, "sphere", &MeshData::sphere(4, 4)).unwrap();
        let draws = [DrawItem {
            mesh: &mesh,
            writes_depth: true,
            casts_shadow: true,
        }];
        let camera = camera(64, 32);
        let sun = DirectionalLight::default();
        let frame = FrameContext {
            frame: 1,
            time: 0.0,
            camera: &camera,
            lights: &[],
            sun: &sun,
            material: Default::default(),
            draws: &draws,
            target: TextureViewId(9999),
            clear_color: Color::BLACK,
            debug_view: DebugView::Final,
        };

        let mut encoder = device.create_command_encoder(None);
        let stats = lane.render(&frame, encoder.as_mut()).unwrap();
        device.submit_command_buffer(encoder.finish());

        assert_eq!(stats.path, RendererPath::SimpleForward);
        let passes: Vec<_> = mock
            .submitted_commands()
            .into_iter()
            .filter_map(|c| match c {
                RecordedCommand::BeginRenderPass {
                    label,
                    color_attachments,
                    ..
                } => Some((label, color_attachments)),
                _ => None,
            })
            .collect();
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].1, vec![TextureViewId(9999)]);
        assert_eq!(mock.textures_labeled("simple_depth")[0].width, 64);
    }

    #[test]
    fn empty_viewport_is_reported() {
        let device: Arc<dyn GraphicsDevice> = Arc::new(MockGraphicsDevice::new());
        let mut lane = SimpleForwardLane::new(&device, &LaneSettings::default()).unwrap();
        let camera = camera(0, 0);
        let sun = DirectionalLight::default();
        let frame = FrameContext {
            frame: 1,
            time: 0.0,
            camera: &camera,
            lights: &[],
            sun: &sun,
            material: Default::default(),
            draws: &[],
            target: TextureViewId(1),
            clear_color: Color::BLACK,
            debug_view: DebugView::Final,
        };
        let mut encoder = device.create_command_encoder(None);
        assert!(matches!(
            lane.render(&frame, encoder.as_mut()),
            Err(LaneError::MissingTargets("SimpleForward"))
        ));
    }
}
