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

//! Host-side tile culling over a demo-sized light set.

use std::f32::consts::TAU;
use strata_core::math::{Extent2D, Mat4, Vec3};
use strata_core::renderer::{CameraView, GpuLight, Light, TileSize, TiledCullingConfig};
use strata_lanes::render_lane::host_culler::{
    cull_lights, reconstruct_view_position, reduce_tile_depths, DepthImage,
};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;
const GROUND_DEPTH: f32 = 17.3;

fn camera() -> CameraView {
    let view = Mat4::look_at_rh(Vec3::splat(10.0), Vec3::ZERO, Vec3::Y);
    let projection = Mat4::orthographic_rh(-10.0, 10.0, -7.5, 7.5, 0.1, 100.0);
    CameraView::new(view, projection, 0.1, 100.0, Extent2D::new(WIDTH, HEIGHT))
}

/// 40 orbiting points and 9 spots aimed at the origin.
fn scene_lights(camera: &CameraView) -> Vec<GpuLight> {
    let points = (0..40).map(|i| {
        let angle = i as f32 / 40.0 * TAU;
        let base = Vec3::new(angle.cos() * 4.5, 0.6, angle.sin() * 4.5);
        Light::point(base, 2.5, Vec3::ONE, 2.0, angle)
    });
    let spots = (0..9).map(|i| {
        let angle = i as f32 / 9.0 * TAU;
        let base = Vec3::new(angle.cos() * 3.0, 4.0, angle.sin() * 3.0);
        Light::spot(base, Vec3::ZERO, 8.0, Vec3::ONE, 4.0, 20.0, 30.0, angle)
    });
    points
        .chain(spots)
        .map(|light| GpuLight::from_light(&light, light.base_position, &camera.view))
        .collect()
}

/// Geometry covers the middle of the screen; the border shows background.
fn depth_image() -> DepthImage {
    let mut image = DepthImage::new(WIDTH, HEIGHT);
    image.fill_rect(64, 48, 192, 144, GROUND_DEPTH);
    image
}

#[test]
fn tiles_never_exceed_capacity_and_slices_are_disjoint() {
    let camera = camera();
    let config = TiledCullingConfig::default();
    let lights = scene_lights(&camera);
    let ranges = reduce_tile_depths(&depth_image(), &config);
    assert_eq!(ranges.len(), 20 * 15);

    let result = cull_lights(&lights, &ranges, &config, &camera);
    let mut accepted = 0;
    for (tile, meta) in result.meta.iter().enumerate() {
        assert!(meta.count <= config.max_lights_per_tile);
        assert_eq!(meta.offset, tile as u32 * config.max_lights_per_tile);
        if let Some(next) = result.meta.get(tile + 1) {
            assert!(meta.offset + meta.count <= next.offset);
        }
        let listed = result.tile_lights(tile);
        assert!(listed.iter().all(|&i| (i as usize) < lights.len()));
        let mut unique = listed.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), listed.len(), "tile {tile} lists a light twice");
        accepted += meta.count;
    }
    assert_eq!(result.stats.dropped, 0);
    assert_eq!(result.stats.accepted, accepted);
    assert!(accepted > 0);
}

#[test]
fn background_tiles_receive_no_lights() {
    let camera = camera();
    let config = TiledCullingConfig::default();
    let ranges = reduce_tile_depths(&depth_image(), &config);
    let result = cull_lights(&scene_lights(&camera), &ranges, &config, &camera);

    // The top-left tile and the bottom-right tile see only background.
    assert!(ranges[0].is_empty());
    assert_eq!(result.meta[0].count, 0);
    let last = result.meta.len() - 1;
    assert!(ranges[last].is_empty());
    assert_eq!(result.meta[last].count, 0);
}

#[test]
fn covered_tiles_out_of_every_light_reach_receive_no_lights() {
    let camera = camera();
    let config = TiledCullingConfig::default();
    let tile_size = config.tile_size.pixels();
    let (tiles_x, tiles_y) = config.tile_dimensions(WIDTH, HEIGHT);

    // Every tile holds geometry; one small light sits on the surface of the top-left tile.
    let ranges = reduce_tile_depths(&DepthImage::filled(WIDTH, HEIGHT, GROUND_DEPTH), &config);
    assert!(ranges.iter().all(|range| !range.is_empty()));
    let center = tile_size as f32 / 2.0;
    let surface = reconstruct_view_position(&camera, center, center, GROUND_DEPTH);
    let world = camera.inverse_view.transform_point3(surface);
    let light = Light::point(world, 1.0, Vec3::ONE, 1.0, 0.0);
    let lights = [GpuLight::from_light(&light, world, &camera.view)];

    let result = cull_lights(&lights, &ranges, &config, &camera);
    assert_eq!(result.tile_lights(0), &[0]);
    let far_corner = (tiles_x * tiles_y - 1) as usize;
    assert_eq!(result.meta[far_corner].count, 0);
    let middle = ((tiles_y / 2) * tiles_x + tiles_x / 2) as usize;
    assert_eq!(result.meta[middle].count, 0);
    assert_eq!(result.stats.accepted, result.meta.iter().map(|meta| meta.count).sum::<u32>());
    assert_eq!(result.stats.dropped, 0);
}

#[test]
fn lights_touching_a_visible_surface_are_never_culled() {
    let camera = camera();
    let config = TiledCullingConfig::default();
    let lights = scene_lights(&camera);
    let ranges = reduce_tile_depths(&depth_image(), &config);
    let result = cull_lights(&lights, &ranges, &config, &camera);
    let tile_size = config.tile_size.pixels();
    let (tiles_x, _) = config.tile_dimensions(WIDTH, HEIGHT);

    for (tile, range) in ranges.iter().enumerate() {
        if range.is_empty() {
            continue;
        }
        let tile = tile as u32;
        let x = (tile % tiles_x) * tile_size + tile_size / 2;
        let y = (tile / tiles_x) * tile_size + tile_size / 2;
        let surface =
            reconstruct_view_position(&camera, x as f32 + 0.5, y as f32 + 0.5, GROUND_DEPTH);
        let listed = result.tile_lights(tile as usize);
        for (index, light) in lights.iter().enumerate() {
            if surface.distance(light.view_position()) <= light.radius() {
                assert!(
                    listed.contains(&(index as u32)),
                    "light {index} reaches tile {tile} but was culled"
                );
            }
        }
    }
}

#[test]
fn small_budgets_drop_the_overflow() {
    let camera = camera();
    let lights = scene_lights(&camera);
    let image = depth_image();

    let roomy = TiledCullingConfig::default();
    let full = cull_lights(&lights, &reduce_tile_depths(&image, &roomy), &roomy, &camera);

    let tight = TiledCullingConfig {
        tile_size: TileSize::X16,
        max_lights_per_tile: 4,
    };
    let capped = cull_lights(&lights, &reduce_tile_depths(&image, &tight), &tight, &camera);

    assert!(capped.meta.iter().all(|meta| meta.count <= 4));
    assert!(capped.stats.dropped > 0);
    assert_eq!(
        capped.stats.accepted + capped.stats.dropped,
        full.stats.accepted
    );
    // Overflow keeps the lowest indices, in light order.
    for (tile, meta) in full.meta.iter().enumerate() {
        let expected = &full.tile_lights(tile)[..meta.count.min(4) as usize];
        assert_eq!(capped.tile_lights(tile), expected);
    }
}
