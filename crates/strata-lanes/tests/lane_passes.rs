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

//! Pass structure of the lit tiers, recorded through the mock device.

use std::sync::Arc;
use strata_core::math::{Extent2D, Mat4, Vec3};
use strata_core::renderer::api::*;
use strata_core::renderer::{
    CameraView, DebugView, DirectionalLight, GpuLight, GraphicsDevice, Light, MeshBuffer,
    MeshData, RendererPath, TileCullStats,
};
use strata_core::testing::{MockGraphicsDevice, RecordedCommand};
use strata_lanes::{
    DeferredLane, DrawItem, FrameContext, FrameStats, LaneError, LaneSettings, LightingEngine,
    Material, RenderLane, TiledComputeLane,
};

struct Harness {
    mock: Arc<MockGraphicsDevice>,
    device: Arc<dyn GraphicsDevice>,
    target: TextureViewId,
    mesh: MeshBuffer,
    sun: DirectionalLight,
}

impl Harness {
    fn new() -> Self {
        let mock = Arc::new(MockGraphicsDevice::new());
        let device: Arc<dyn GraphicsDevice> = mock.clone();
        let texture = device
            .create_texture(&TextureDescriptor {
                label: Some("swapchain".into()),
                width: 64,
                height: 48,
                array_layers: 1,
                format: TextureFormat::Bgra8Unorm,
                usage: TextureUsage::RENDER_ATTACHMENT,
            })
            .unwrap();
        let target = device
            .create_texture_view(texture, &TextureViewDescriptor::default())
            .unwrap();
        let mesh = MeshBuffer::from_data(&device, "caster", &MeshData::sphere(4, 6)).unwrap();
        Self {
            mock,
            device,
            target,
            mesh,
            sun: DirectionalLight::default(),
        }
    }

    fn draws(&self) -> [DrawItem<'_>; 2] {
        [
            DrawItem {
                mesh: &self.mesh,
                writes_depth: false,
                casts_shadow: false,
            },
            DrawItem {
                mesh: &self.mesh,
                writes_depth: true,
                casts_shadow: true,
            },
        ]
    }

    fn frame<'a>(
        &'a self,
        frame: u64,
        camera: &'a CameraView,
        lights: &'a [Light],
        draws: &'a [DrawItem<'a>],
    ) -> FrameContext<'a> {
        FrameContext {
            frame,
            time: 0.0,
            camera,
            lights,
            sun: &self.sun,
            material: Material::default(),
            draws,
            target: self.target,
            clear_color: Color::BLACK,
            debug_view: DebugView::Final,
        }
    }

    fn run(&self, lane: &mut dyn RenderLane, frame: &FrameContext<'_>) -> FrameStats {
        let mut encoder = self.device.create_command_encoder(Some("frame"));
        let mut stats = lane.render(frame, encoder.as_mut()).unwrap();
        self.device.submit_command_buffer(encoder.finish());
        lane.resolve_stats(&mut stats).unwrap();
        stats
    }
}

fn camera(width: u32, height: u32) -> CameraView {
    let view = Mat4::look_at_rh(Vec3::splat(10.0), Vec3::ZERO, Vec3::Y);
    let projection = Mat4::orthographic_rh(-8.0, 8.0, -6.0, 6.0, 0.1, 100.0);
    CameraView::new(view, projection, 0.1, 100.0, Extent2D::new(width, height))
}

fn point(position: Vec3, radius: f32) -> Light {
    Light::point(position, radius, Vec3::ONE, 1.0, 0.0)
}

fn spot(position: Vec3, radius: f32) -> Light {
    Light::spot(position, Vec3::ZERO, radius, Vec3::ONE, 2.0, 20.0, 30.0, 0.0)
}

/// Passes, barriers and copies in recording order.
fn pass_log(commands: &[RecordedCommand]) -> Vec<String> {
    commands
        .iter()
        .filter_map(|command| match command {
            RecordedCommand::BeginRenderPass { label, .. } => {
                Some(format!("render {}", label.as_deref().unwrap_or("?")))
            }
            RecordedCommand::BeginComputePass { label } => {
                Some(format!("compute {}", label.as_deref().unwrap_or("?")))
            }
            RecordedCommand::MemoryBarrier(flags) if *flags == BarrierFlags::TEXTURE_FETCH => {
                Some("barrier texture".to_string())
            }
            RecordedCommand::MemoryBarrier(flags) if *flags == BarrierFlags::SHADER_STORAGE => {
                Some("barrier storage".to_string())
            }
            RecordedCommand::CopyBufferToBuffer { .. } => Some("copy".to_string()),
            _ => None,
        })
        .collect()
}

/// The commands recorded inside the first render pass labelled `label`.
fn pass_commands(commands: &[RecordedCommand], label: &str) -> Vec<RecordedCommand> {
    let start = commands
        .iter()
        .position(|c| {
            matches!(c, RecordedCommand::BeginRenderPass { label: Some(l), .. } if l == label)
        })
        .unwrap_or_else(|| panic!("no '{label}' pass"));
    commands[start + 1..]
        .iter()
        .take_while(|c| !matches!(c, RecordedCommand::EndRenderPass))
        .cloned()
        .collect()
}

#[test]
fn tiled_frame_orders_passes_and_barriers() {
    let harness = Harness::new();
    let mut lane = TiledComputeLane::new(&harness.device, &LaneSettings::default()).unwrap();
    let camera = camera(64, 48);
    let lights = [point(Vec3::ZERO, 2.0), point(Vec3::new(2.0, 0.0, 0.0), 2.0)];
    let draws = harness.draws();

    let stats = harness.run(&mut lane, &harness.frame(1, &camera, &lights, &draws));

    let expected = [
        "render shadow_cascades",
        "render shadow_cascades",
        "render shadow_cascades",
        "render depth_prepass",
        "barrier texture",
        "compute tile_depth_reduce",
        "barrier storage",
        "compute tile_light_cull",
        "barrier storage",
        "render tiled_shading",
        "render composite",
    ];
    assert_eq!(pass_log(&harness.mock.submitted_commands()), expected);
    assert_eq!(stats.path, RendererPath::TiledCompute);
    assert_eq!(stats.lights, 2);
    assert!(stats.cascades_updated);
    assert_eq!(stats.dropped_tile_lights, None);
}

#[test]
fn tiled_dispatches_cover_the_tile_grid() {
    let harness = Harness::new();
    let mut lane = TiledComputeLane::new(&harness.device, &LaneSettings::default()).unwrap();
    let camera = camera(64, 48);
    let draws = harness.draws();
    harness.run(&mut lane, &harness.frame(1, &camera, &[], &draws));

    let dispatches: Vec<_> = harness
        .mock
        .submitted_commands()
        .into_iter()
        .filter(|c| matches!(c, RecordedCommand::Dispatch { .. }))
        .collect();
    assert_eq!(
        dispatches,
        vec![
            RecordedCommand::Dispatch { x: 4, y: 3, z: 1 },
            RecordedCommand::Dispatch { x: 1, y: 1, z: 1 },
        ]
    );
    assert_eq!(lane.tile_grid(), Some((4, 3)));
}

#[test]
fn tiled_readback_reports_dropped_lights() {
    let harness = Harness::new();
    let settings = LaneSettings {
        stats_readback_every: 2,
        ..LaneSettings::default()
    };
    let mut lane = TiledComputeLane::new(&harness.device, &settings).unwrap();
    let camera = camera(64, 48);
    let draws = harness.draws();

    let stats = harness.run(&mut lane, &harness.frame(1, &camera, &[], &draws));
    assert_eq!(stats.dropped_tile_lights, None);
    assert!(!pass_log(&harness.mock.submitted_commands()).contains(&"copy".to_string()));

    // Stand in for the culling shader's atomics before the copy executes.
    let frame = harness.frame(2, &camera, &[], &draws);
    let mut encoder = harness.device.create_command_encoder(Some("frame"));
    let mut stats = lane.render(&frame, encoder.as_mut()).unwrap();
    let counters = TileCullStats {
        dropped: 7,
        accepted: 3,
    };
    harness
        .device
        .write_buffer(lane.cull_stats_buffer(), 0, bytemuck::bytes_of(&counters))
        .unwrap();
    harness.device.submit_command_buffer(encoder.finish());
    lane.resolve_stats(&mut stats).unwrap();

    assert_eq!(stats.dropped_tile_lights, Some(7));
    assert_eq!(pass_log(&harness.mock.submitted_commands()).last().map(String::as_str), Some("copy"));
}

#[test]
fn tiled_resize_reallocates_targets() {
    let harness = Harness::new();
    let mut lane = TiledComputeLane::new(&harness.device, &LaneSettings::default()).unwrap();
    let draws = harness.draws();

    let large = camera(64, 48);
    harness.run(&mut lane, &harness.frame(1, &large, &[], &draws));
    assert_eq!(lane.tile_grid(), Some((4, 3)));

    lane.resize(Extent2D::new(32, 32));
    assert_eq!(lane.tile_grid(), None);

    let small = camera(32, 32);
    harness.run(&mut lane, &harness.frame(2, &small, &[], &draws));
    assert_eq!(lane.tile_grid(), Some((2, 2)));
    let prepass = harness.mock.textures_labeled("prepass");
    assert_eq!(prepass.len(), 2);
    assert!(prepass.iter().all(|t| t.width == 32 && t.height == 32));
}

#[test]
fn empty_viewport_reports_missing_targets() {
    let harness = Harness::new();
    let mut lane = TiledComputeLane::new(&harness.device, &LaneSettings::default()).unwrap();
    let camera = camera(0, 0);
    let draws = harness.draws();
    let frame = harness.frame(1, &camera, &[], &draws);
    let mut encoder = harness.device.create_command_encoder(None);
    let result = lane.render(&frame, encoder.as_mut());
    assert!(matches!(result, Err(LaneError::MissingTargets("TiledCompute"))));
}

#[test]
fn deferred_frame_draws_one_batch_per_volume_group() {
    let harness = Harness::new();
    let mut lane = DeferredLane::new(&harness.device, &LaneSettings::default()).unwrap();
    let camera = camera(64, 48);
    let lights = [
        point(Vec3::ZERO, 1.0),
        spot(Vec3::new(3.0, 4.0, -3.0), 5.0),
        // Around the eye, so the camera is inside its volume.
        point(Vec3::splat(10.0), 6.0),
        point(Vec3::new(1.0, 0.0, 1.0), 1.5),
    ];
    let draws = harness.draws();
    let stats = harness.run(&mut lane, &harness.frame(1, &camera, &lights, &draws));
    assert_eq!(stats.lights, 4);

    let commands = harness.mock.submitted_commands();
    assert_eq!(
        pass_log(&commands),
        [
            "render shadow_cascades",
            "render shadow_cascades",
            "render shadow_cascades",
            "render gbuffer",
            "render lighting",
            "render composite",
        ]
    );

    let sphere = MeshData::sphere(16, 24).indices.len() as u32;
    let cone = MeshData::cone(24).indices.len() as u32;
    let lighting = pass_commands(&commands, "lighting");
    let draws: Vec<_> = lighting
        .iter()
        .filter(|c| {
            matches!(
                c,
                RecordedCommand::Draw { .. } | RecordedCommand::DrawIndexed { .. }
            )
        })
        .cloned()
        .collect();
    assert_eq!(
        draws,
        vec![
            RecordedCommand::Draw {
                vertices: 0..3,
                instances: 0..1
            },
            RecordedCommand::DrawIndexed {
                indices: 0..sphere,
                instances: 0..2
            },
            RecordedCommand::DrawIndexed {
                indices: 0..sphere,
                instances: 2..3
            },
            RecordedCommand::DrawIndexed {
                indices: 0..cone,
                instances: 3..4
            },
        ]
    );

    let volume_pipelines: Vec<String> = lighting
        .iter()
        .filter_map(|c| match c {
            RecordedCommand::SetRenderPipeline(id) => harness.mock.render_pipeline(*id),
            _ => None,
        })
        .filter_map(|p| p.label)
        .skip(1)
        .collect();
    assert_eq!(
        volume_pipelines,
        ["light_volume_outside", "light_volume_inside", "light_volume_outside"]
    );
}

#[test]
fn shadow_slots_restart_every_frame() {
    let harness = Harness::new();
    let mut lane = DeferredLane::new(&harness.device, &LaneSettings::default()).unwrap();
    let camera = camera(64, 48);
    let draws = harness.draws();
    let a = spot(Vec3::new(-4.0, 3.0, 0.0), 4.0).with_shadow(true);
    let b = spot(Vec3::new(0.0, 3.0, -4.0), 4.0).with_shadow(true);
    let c = spot(Vec3::new(4.0, 3.0, 0.0), 4.0).with_shadow(true);
    let slot = |light: &GpuLight| (light.shadow_info[0], light.shadow_info[1]);

    let first = [a, b];
    let stats = harness.run(&mut lane, &harness.frame(1, &camera, &first, &draws));
    assert_eq!(stats.spot_shadows, 2);
    let slots: Vec<_> = lane.arena().lights().iter().map(slot).collect();
    assert_eq!(slots, [(GpuLight::SHADOW_SPOT, 0.0), (GpuLight::SHADOW_SPOT, 1.0)]);

    let second = [c, a, b];
    let stats = harness.run(&mut lane, &harness.frame(2, &camera, &second, &draws));
    assert_eq!(stats.spot_shadows, 3);
    let slots: Vec<_> = lane.arena().lights().iter().map(slot).collect();
    assert_eq!(
        slots,
        [
            (GpuLight::SHADOW_SPOT, 0.0),
            (GpuLight::SHADOW_SPOT, 1.0),
            (GpuLight::SHADOW_SPOT, 2.0),
        ]
    );
}

#[test]
fn spot_shadows_are_capped_per_frame() {
    let harness = Harness::new();
    let mut lane = DeferredLane::new(&harness.device, &LaneSettings::default()).unwrap();
    let camera = camera(64, 48);
    let draws = harness.draws();
    let lights: Vec<Light> = (0..6)
        .map(|i| spot(Vec3::new(i as f32 - 3.0, 3.0, -4.0), 4.0).with_shadow(true))
        .collect();

    let stats = harness.run(&mut lane, &harness.frame(1, &camera, &lights, &draws));
    assert_eq!(stats.spot_shadows, 4);
    let tags: Vec<f32> = lane
        .arena()
        .lights()
        .iter()
        .map(|light| light.shadow_info[0])
        .collect();
    assert_eq!(&tags[..4], &[GpuLight::SHADOW_SPOT; 4]);
    assert_eq!(&tags[4..], &[GpuLight::SHADOW_NONE; 2]);
    let spot_passes = pass_log(&harness.mock.submitted_commands())
        .iter()
        .filter(|entry| entry.as_str() == "render shadow_spots")
        .count();
    assert_eq!(spot_passes, 4);
}

#[test]
fn engine_dispatches_to_the_requested_tier() {
    let harness = Harness::new();
    let settings = LaneSettings::default();
    for path in [
        RendererPath::SimpleForward,
        RendererPath::Deferred,
        RendererPath::TiledCompute,
    ] {
        let mut engine = LightingEngine::new(&harness.device, path, &settings).unwrap();
        assert_eq!(engine.path(), path);
        assert_eq!(engine.shadows().is_some(), path != RendererPath::SimpleForward);

        let camera = camera(64, 48);
        let draws = harness.draws();
        let stats = harness.run(&mut engine, &harness.frame(1, &camera, &[], &draws));
        assert_eq!(stats.path, path);
        engine.release();
    }
}

#[test]
fn failed_compute_shader_aborts_only_the_tiled_tier() {
    let harness = Harness::new();
    harness.mock.fail_shaders_containing("cs_main");
    let settings = LaneSettings::default();
    assert!(LightingEngine::new(&harness.device, RendererPath::TiledCompute, &settings).is_err());
    assert!(LightingEngine::new(&harness.device, RendererPath::Deferred, &settings).is_ok());
}

#[test]
fn release_destroys_every_target() {
    let harness = Harness::new();
    let mut lane = DeferredLane::new(&harness.device, &LaneSettings::default()).unwrap();
    let camera = camera(64, 48);
    let draws = harness.draws();
    harness.run(&mut lane, &harness.frame(1, &camera, &[], &draws));
    assert!(harness.mock.live_textures() > 1);

    lane.release();
    lane.release();
    drop(lane);
    // Only the swapchain stand-in remains.
    assert_eq!(harness.mock.live_textures(), 1);
    assert_eq!(harness.mock.failed_destroys(), 0);
}
