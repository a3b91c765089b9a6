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

//! Defines the RenderEngine, which owns the chosen lighting tier and drives it
//! once per frame.

use super::camera::IsometricCamera;
use super::controls::{CameraControls, ControlAction};
use crate::error::SceneError;
use crate::scene::DemoScene;
use std::sync::Arc;
use strata_core::config::EngineConfig;
use strata_core::math::Extent2D;
use strata_core::platform::input::InputEvent;
use strata_core::renderer::api::{Color, TextureFormat, TextureViewId};
use strata_core::renderer::{
    select_renderer_path, DebugView, DirectionalLight, GraphicsDevice, RendererPath,
};
use strata_lanes::{FrameContext, FrameStats, LaneSettings, LightingEngine, Material, RenderLane};

/// Background color behind the scene.
const CLEAR_COLOR: [f32; 3] = [0.10, 0.10, 0.12];

/// The top-level renderer.
///
/// The tier is chosen once from the device's capabilities. If the lane or the
/// scene cannot be built the engine stays alive but not ready, and every
/// frame is skipped.
pub struct RenderEngine {
    device: Arc<dyn GraphicsDevice>,
    path: RendererPath,
    // Dropped before `device` so lanes can release their resources.
    lanes: Option<LightingEngine>,
    scene: Option<DemoScene>,
    camera: IsometricCamera,
    controls: CameraControls,
    sun: DirectionalLight,
    material: Material,
    debug_view: DebugView,
    clear_color: Color,
    animate: bool,
    frame: u64,
    log_stats_every: Option<u32>,
    last_stats: Option<FrameStats>,
}

impl RenderEngine {
    /// Selects the tier, builds its lane and uploads the demo scene.
    pub fn new(device: Arc<dyn GraphicsDevice>, config: &EngineConfig, viewport: Extent2D) -> Self {
        let config = config.clone().sanitized();
        let path = select_renderer_path(&device.capabilities(), config.renderer.force_path);
        let target_format = device.surface_format().unwrap_or(TextureFormat::Bgra8Unorm);
        let settings = LaneSettings::from_config(&config, target_format);

        let (lanes, scene) = match Self::build(&device, path, &settings, &config) {
            Ok((lanes, scene)) => (Some(lanes), Some(scene)),
            Err(e) => {
                log::error!("RenderEngine: {path} setup failed, frames will be skipped: {e}");
                (None, None)
            }
        };

        let mut engine = Self {
            device,
            path,
            lanes,
            scene,
            camera: IsometricCamera::new(&config.camera, viewport),
            controls: CameraControls::new(),
            sun: DirectionalLight::default(),
            material: Material::default(),
            debug_view: config.renderer.debug_view,
            clear_color: Color::from_rgb(CLEAR_COLOR),
            animate: config.scene.animate,
            frame: 0,
            log_stats_every: config.log_stats_every,
            last_stats: None,
        };
        engine.resize(viewport);
        engine
    }

    fn build(
        device: &Arc<dyn GraphicsDevice>,
        path: RendererPath,
        settings: &LaneSettings,
        config: &EngineConfig,
    ) -> Result<(LightingEngine, DemoScene), SceneError> {
        let mut lanes = LightingEngine::new(device, path, settings)?;
        match DemoScene::new(device, &config.scene) {
            Ok(scene) => Ok((lanes, scene)),
            Err(e) => {
                lanes.release();
                Err(e)
            }
        }
    }

    /// Whether the lane and scene were built.
    pub fn is_ready(&self) -> bool {
        self.lanes.is_some() && self.scene.is_some()
    }

    /// The selected tier.
    pub fn path(&self) -> RendererPath {
        self.path
    }

    /// The camera.
    pub fn camera(&self) -> &IsometricCamera {
        &self.camera
    }

    /// The camera, mutably.
    pub fn camera_mut(&mut self) -> &mut IsometricCamera {
        &mut self.camera
    }

    /// The view the composite pass shows.
    pub fn debug_view(&self) -> DebugView {
        self.debug_view
    }

    /// Switches the composite debug view.
    pub fn set_debug_view(&mut self, view: DebugView) {
        if view != self.debug_view {
            log::info!("RenderEngine: debug view {:?} -> {view:?}", self.debug_view);
            self.debug_view = view;
        }
    }

    /// The running lane, if setup succeeded.
    pub fn lighting(&self) -> Option<&LightingEngine> {
        self.lanes.as_ref()
    }

    /// Statistics of the most recent frame.
    pub fn last_stats(&self) -> Option<&FrameStats> {
        self.last_stats.as_ref()
    }

    /// Frames rendered so far.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Applies one input event. Returns `false` when the user asked to quit.
    pub fn handle_input(&mut self, event: &InputEvent) -> bool {
        match self.controls.handle(event, &mut self.camera) {
            ControlAction::Quit => return false,
            ControlAction::SelectDebugView(view) => self.set_debug_view(view),
            ControlAction::CameraChanged => log::trace!(
                "RenderEngine: camera zoom {:.2} pan {:?}",
                self.camera.zoom(),
                self.camera.pan()
            ),
            ControlAction::None => {}
        }
        true
    }

    /// Updates the projection and invalidates size-dependent targets.
    pub fn resize(&mut self, extent: Extent2D) {
        self.camera.resize(extent);
        if let Some(lanes) = self.lanes.as_mut() {
            lanes.resize(extent);
        }
    }

    /// Renders one frame into `target` and submits it.
    ///
    /// Returns `Ok(None)` when the engine is not ready or the viewport is
    /// empty; nothing is recorded in that case.
    pub fn render_frame(
        &mut self,
        target: TextureViewId,
        elapsed_seconds: f32,
    ) -> Result<Option<FrameStats>, SceneError> {
        let (Some(lanes), Some(scene)) = (self.lanes.as_mut(), self.scene.as_ref()) else {
            return Ok(None);
        };
        if self.camera.viewport().is_empty() {
            return Ok(None);
        }

        self.frame += 1;
        let camera = self.camera.camera_view();
        let draws = scene.draws();
        let context = FrameContext {
            frame: self.frame,
            time: if self.animate { elapsed_seconds } else { 0.0 },
            camera: &camera,
            lights: scene.lights(),
            sun: &self.sun,
            material: self.material,
            draws: &draws,
            target,
            clear_color: self.clear_color,
            debug_view: self.debug_view,
        };

        let mut encoder = self.device.create_command_encoder(Some("frame"));
        let mut stats = lanes.render(&context, encoder.as_mut())?;
        self.device.submit_command_buffer(encoder.finish());
        lanes.resolve_stats(&mut stats)?;

        if let Some(every) = self.log_stats_every {
            if self.frame % every as u64 == 0 {
                log::info!("RenderEngine: {stats}");
            }
        }
        self.last_stats = Some(stats);
        Ok(Some(stats))
    }

    /// Releases the lane and scene. Later frames are skipped.
    pub fn release(&mut self) {
        if let Some(mut lanes) = self.lanes.take() {
            log::info!("RenderEngine: releasing {}", lanes.strategy_name());
            lanes.release();
        }
        self.scene = None;
    }
}

impl Drop for RenderEngine {
    fn drop(&mut self) {
        self.release();
    }
}
