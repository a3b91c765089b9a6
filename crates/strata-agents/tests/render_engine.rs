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

//! The render engine against the recording mock device.

use std::sync::Arc;
use strata_agents::RenderEngine;
use strata_core::config::EngineConfig;
use strata_core::math::Extent2D;
use strata_core::platform::input::InputEvent;
use strata_core::renderer::api::*;
use strata_core::renderer::{
    ApiVersion, ContextCapabilities, DebugView, GraphicsDevice, RendererPath,
};
use strata_core::testing::{MockGraphicsDevice, RecordedCommand};

const VIEWPORT: Extent2D = Extent2D::new(64, 48);

fn swapchain_view(device: &Arc<dyn GraphicsDevice>) -> TextureViewId {
    let texture = device
        .create_texture(&TextureDescriptor {
            label: Some("swapchain".into()),
            width: VIEWPORT.width,
            height: VIEWPORT.height,
            array_layers: 1,
            format: TextureFormat::Bgra8Unorm,
            usage: TextureUsage::RENDER_ATTACHMENT,
        })
        .unwrap();
    device
        .create_texture_view(texture, &TextureViewDescriptor::default())
        .unwrap()
}

fn engine_on(mock: MockGraphicsDevice, config: &EngineConfig) -> (Arc<MockGraphicsDevice>, RenderEngine, TextureViewId) {
    let mock = Arc::new(mock);
    let device: Arc<dyn GraphicsDevice> = mock.clone();
    let target = swapchain_view(&device);
    let engine = RenderEngine::new(device, config, VIEWPORT);
    (mock, engine, target)
}

fn key(code: &str) -> InputEvent {
    InputEvent::KeyPressed {
        key_code: code.to_string(),
    }
}

#[test]
fn full_context_renders_the_demo_with_tiled_culling() {
    let (mock, mut engine, target) = engine_on(MockGraphicsDevice::new(), &EngineConfig::default());
    assert!(engine.is_ready());
    assert_eq!(engine.path(), RendererPath::TiledCompute);

    let stats = engine.render_frame(target, 0.5).unwrap().unwrap();
    assert_eq!(stats.frame, 1);
    assert_eq!(stats.path, RendererPath::TiledCompute);
    assert_eq!(stats.lights, 40);
    assert_eq!(stats.spot_shadows, 4);
    assert_eq!(stats.point_shadows, 2);
    assert_eq!(engine.last_stats(), Some(&stats));
    assert_eq!(engine.frame_count(), 1);

    assert_eq!(mock.submissions().len(), 1);
    assert!(mock
        .submitted_commands()
        .iter()
        .any(|c| matches!(c, RecordedCommand::Dispatch { .. })));
}

#[test]
fn configured_path_can_only_downgrade() {
    let mut config = EngineConfig::default();
    config.renderer.force_path = Some(RendererPath::Deferred);
    let (mock, mut engine, target) = engine_on(MockGraphicsDevice::new(), &config);
    assert_eq!(engine.path(), RendererPath::Deferred);
    engine.render_frame(target, 0.0).unwrap();
    assert!(!mock
        .submitted_commands()
        .iter()
        .any(|c| matches!(c, RecordedCommand::Dispatch { .. })));

    let low = MockGraphicsDevice::with_capabilities(ContextCapabilities {
        version: ApiVersion::new(4, 1),
        compute_dispatch: false,
        memory_barrier: false,
    });
    config.renderer.force_path = Some(RendererPath::TiledCompute);
    let (_mock, engine, _target) = engine_on(low, &config);
    assert_eq!(engine.path(), RendererPath::Deferred);
}

#[test]
fn old_context_falls_back_to_simple_forward() {
    let low = MockGraphicsDevice::with_capabilities(ContextCapabilities {
        version: ApiVersion::new(3, 3),
        compute_dispatch: false,
        memory_barrier: false,
    });
    let (_mock, mut engine, target) = engine_on(low, &EngineConfig::default());
    assert_eq!(engine.path(), RendererPath::SimpleForward);
    assert!(engine.lighting().map_or(false, |l| l.shadows().is_none()));
    let stats = engine.render_frame(target, 0.0).unwrap().unwrap();
    assert_eq!(stats.path, RendererPath::SimpleForward);
    assert_eq!(stats.spot_shadows, 0);
}

#[test]
fn failed_setup_skips_every_frame() {
    let mock = MockGraphicsDevice::new();
    mock.fail_shaders_containing("cs_main");
    let (mock, mut engine, target) = engine_on(mock, &EngineConfig::default());
    assert_eq!(engine.path(), RendererPath::TiledCompute);
    assert!(!engine.is_ready());
    assert!(engine.render_frame(target, 0.0).unwrap().is_none());
    assert!(engine.render_frame(target, 0.1).unwrap().is_none());
    assert!(mock.submissions().is_empty());
    assert_eq!(engine.frame_count(), 0);
}

#[test]
fn hotkeys_select_views_and_quit() {
    let (_mock, mut engine, _target) = engine_on(MockGraphicsDevice::new(), &EngineConfig::default());
    assert_eq!(engine.debug_view(), DebugView::Final);
    assert!(engine.handle_input(&key("Digit5")));
    assert_eq!(engine.debug_view(), DebugView::Light);
    assert!(engine.handle_input(&InputEvent::MouseWheelScrolled {
        delta_x: 0.0,
        delta_y: -1.0,
    }));
    assert!((engine.camera().zoom() - 1.1).abs() < 1e-6);
    assert!(!engine.handle_input(&key("Escape")));
}

#[test]
fn empty_viewport_skips_the_frame() {
    let (mock, mut engine, target) = engine_on(MockGraphicsDevice::new(), &EngineConfig::default());
    engine.resize(Extent2D::new(0, 0));
    assert!(engine.render_frame(target, 0.0).unwrap().is_none());
    assert!(mock.submissions().is_empty());

    engine.resize(VIEWPORT);
    assert!(engine.render_frame(target, 0.0).unwrap().is_some());
    assert_eq!(mock.submissions().len(), 1);
}

#[test]
fn release_frees_lane_targets() {
    let (mock, mut engine, target) = engine_on(MockGraphicsDevice::new(), &EngineConfig::default());
    engine.render_frame(target, 0.0).unwrap();
    assert!(mock.live_textures() > 1);
    engine.release();
    assert!(!engine.is_ready());
    assert_eq!(mock.live_textures(), 1);
    assert_eq!(mock.live_buffers(), 0);
    assert_eq!(mock.failed_destroys(), 0);
}
