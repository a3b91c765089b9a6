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

//! The demonstration scene: a ground quad, two walls and a ring of animated
//! point and spot lights.
//!
//! Geometry is generated in world space, so every mesh is drawn with the
//! camera's view-projection alone.

use crate::error::SceneError;
use std::f32::consts::TAU;
use std::sync::Arc;
use strata_core::config::SceneConfig;
use strata_core::math::Vec3;
use strata_core::renderer::{GraphicsDevice, Light, MeshBuffer, MeshData, Vertex};
use strata_lanes::DrawItem;

/// Half the side of the square ground quad.
pub const GROUND_HALF_EXTENT: f32 = 5.0;
/// Distance of each wall from the origin along x.
pub const WALL_OFFSET: f32 = 3.0;
/// Height of the walls.
pub const WALL_HEIGHT: f32 = 2.5;
/// Half the length of the walls along z.
pub const WALL_HALF_LENGTH: f32 = 5.0;

const GROUND_COLOR: Vec3 = Vec3::new(0.18, 0.36, 0.20);
const WALL_A_COLOR: Vec3 = Vec3::new(0.70, 0.25, 0.25);
const WALL_B_COLOR: Vec3 = Vec3::new(0.25, 0.45, 0.70);

const POINT_RING_RADIUS: f32 = 4.5;
const POINT_HEIGHT: f32 = 1.2;
const POINT_RADIUS: f32 = 6.0;
const SPOT_RING_RADIUS: f32 = 2.5;
const SPOT_HEIGHT: f32 = 4.0;
const SPOT_RADIUS: f32 = 8.0;
const SPOT_COLOR: Vec3 = Vec3::new(0.55, 0.70, 0.95);
const SPOT_INTENSITY: f32 = 1.4;
const SPOT_INNER_DEG: f32 = 15.0;
const SPOT_OUTER_DEG: f32 = 25.0;

/// Every n-th point light requests a shadow map.
const POINT_SHADOW_STRIDE: u32 = 16;
/// Every n-th spot light requests a shadow map.
const SPOT_SHADOW_STRIDE: u32 = 2;

/// The ground quad at y = 0, facing up.
pub fn ground_mesh() -> MeshData {
    let g = GROUND_HALF_EXTENT;
    let corner = |x: f32, z: f32| Vertex::new(Vec3::new(x, 0.0, z), Vec3::Y, GROUND_COLOR);
    let mut mesh = MeshData::default();
    mesh.push_quad([corner(-g, -g), corner(g, -g), corner(g, g), corner(-g, g)]);
    mesh
}

/// A vertical wall in the plane `x = x`, with its normal along `normal_x`.
pub fn wall_mesh(x: f32, normal_x: f32, color: Vec3) -> MeshData {
    let normal = Vec3::new(normal_x, 0.0, 0.0);
    let corner = |y: f32, z: f32| Vertex::new(Vec3::new(x, y, z), normal, color);
    let (h, l) = (WALL_HEIGHT, WALL_HALF_LENGTH);
    let mut mesh = MeshData::default();
    mesh.push_quad([corner(0.0, -l), corner(0.0, l), corner(h, l), corner(h, -l)]);
    mesh
}

/// The procedural light set: a ring of colored points below a ring of
/// spots aimed at the origin.
///
/// Every 16th point and every other spot request a shadow; the shadow
/// system still applies its own caps.
pub fn demo_lights(config: &SceneConfig) -> Vec<Light> {
    let points = (0..config.point_lights).map(|i| {
        let angle = TAU * i as f32 / config.point_lights as f32;
        let color = Vec3::new(
            0.4 + 0.6 * angle.sin(),
            0.4 + 0.6 * (angle + 2.1).sin(),
            0.4 + 0.6 * (angle + 4.2).sin(),
        );
        let base = Vec3::new(
            angle.cos() * POINT_RING_RADIUS,
            POINT_HEIGHT,
            angle.sin() * POINT_RING_RADIUS,
        );
        Light::point(base, POINT_RADIUS, color, 1.0, angle)
            .with_shadow(i % POINT_SHADOW_STRIDE == 0)
    });
    let spots = (0..config.spot_lights).map(|i| {
        let angle = TAU * i as f32 / config.spot_lights as f32;
        let base = Vec3::new(
            angle.cos() * SPOT_RING_RADIUS,
            SPOT_HEIGHT,
            angle.sin() * SPOT_RING_RADIUS,
        );
        Light::spot(
            base,
            Vec3::ZERO,
            SPOT_RADIUS,
            SPOT_COLOR,
            SPOT_INTENSITY,
            SPOT_INNER_DEG,
            SPOT_OUTER_DEG,
            angle,
        )
        .with_shadow(i % SPOT_SHADOW_STRIDE == 0)
    });
    points.chain(spots).collect()
}

/// The uploaded scene geometry and its light set.
#[derive(Debug)]
pub struct DemoScene {
    ground: MeshBuffer,
    walls: [MeshBuffer; 2],
    lights: Vec<Light>,
}

impl DemoScene {
    /// Uploads the geometry and generates the lights.
    pub fn new(device: &Arc<dyn GraphicsDevice>, config: &SceneConfig) -> Result<Self, SceneError> {
        let ground = MeshBuffer::from_data(device, "ground", &ground_mesh())?;
        let wall_a = MeshBuffer::from_data(
            device,
            "wall_a",
            &wall_mesh(-WALL_OFFSET, 1.0, WALL_A_COLOR),
        )?;
        let wall_b = MeshBuffer::from_data(
            device,
            "wall_b",
            &wall_mesh(WALL_OFFSET, -1.0, WALL_B_COLOR),
        )?;
        let lights = demo_lights(config);
        log::info!(
            "DemoScene: built ground, 2 walls and {} lights ({} points, {} spots)",
            lights.len(),
            config.point_lights,
            config.spot_lights
        );
        Ok(Self {
            ground,
            walls: [wall_a, wall_b],
            lights,
        })
    }

    /// The scene's lights in generation order.
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// This frame's draw list.
    ///
    /// The ground goes first and does not write depth, so the walls are never
    /// hidden by it in the isometric view.
    pub fn draws(&self) -> [DrawItem<'_>; 3] {
        let [wall_a, wall_b] = &self.walls;
        [
            DrawItem {
                mesh: &self.ground,
                writes_depth: false,
                casts_shadow: false,
            },
            DrawItem {
                mesh: wall_a,
                writes_depth: true,
                casts_shadow: true,
            },
            DrawItem {
                mesh: wall_b,
                writes_depth: true,
                casts_shadow: true,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strata_core::renderer::LightKind;

    #[test]
    fn default_light_set_matches_the_demo() {
        let lights = demo_lights(&SceneConfig::default());
        assert_eq!(lights.len(), 40);
        let points: Vec<_> = lights.iter().filter(|l| l.kind == LightKind::Point).collect();
        let spots: Vec<_> = lights.iter().filter(|l| l.kind == LightKind::Spot).collect();
        assert_eq!(points.len(), 32);
        assert_eq!(spots.len(), 8);

        assert_eq!(points.iter().filter(|l| l.casts_shadow).count(), 2);
        assert_eq!(spots.iter().filter(|l| l.casts_shadow).count(), 4);

        let first = points[0];
        assert_relative_eq!(first.base_position.x, 4.5);
        assert_relative_eq!(first.base_position.y, 1.2);
        assert_relative_eq!(first.color.x, 0.4);
        assert_eq!(first.radius, 6.0);

        let spot = spots[0];
        assert_eq!(spot.target, Vec3::ZERO);
        assert_eq!((spot.inner_angle_deg, spot.outer_angle_deg), (15.0, 25.0));
        assert_relative_eq!(spot.base_position.x, 2.5);
    }

    #[test]
    fn empty_light_counts_give_no_lights() {
        let config = SceneConfig {
            point_lights: 0,
            spot_lights: 0,
            ..SceneConfig::default()
        };
        assert!(demo_lights(&config).is_empty());
    }

    #[test]
    fn walls_stand_on_the_ground() {
        let ground = ground_mesh();
        assert_eq!(ground.indices.len(), 6);
        assert!(ground.vertices.iter().all(|v| v.position[1] == 0.0));

        let wall = wall_mesh(-WALL_OFFSET, 1.0, WALL_A_COLOR);
        let heights: Vec<f32> = wall.vertices.iter().map(|v| v.position[1]).collect();
        assert_eq!(heights, [0.0, 0.0, WALL_HEIGHT, WALL_HEIGHT]);
        assert!(wall.vertices.iter().all(|v| v.position[0] == -WALL_OFFSET));
        assert!(wall.vertices.iter().all(|v| v.normal == [1.0, 0.0, 0.0]));
    }
}
