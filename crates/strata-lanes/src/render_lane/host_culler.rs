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

//! A host-side mirror of the two tiled culling dispatches.
//!
//! [`reduce_tile_depths`] follows `tile_depth_reduce.wgsl` step for step: a
//! 16x16 group folds its strided share of the tile into a 256-entry scratch
//! array, then halves the active range until entry 0 holds the result.
//! [`cull_lights`] follows `tile_light_cull.wgsl`. Both work on a
//! [`DepthImage`] holding the same linear depth the pre-pass writes, where
//! `0.0` marks background.

use strata_core::math::{Aabb, Vec2, Vec3};
use strata_core::renderer::{
    CameraView, GpuLight, TileCullStats, TileDepthRange, TileMeta, TiledCullingConfig,
};

/// Invocations along one side of a reduction workgroup.
pub const REDUCE_GROUP_EDGE: u32 = 16;
/// Invocations in one reduction workgroup.
pub const REDUCE_GROUP_SIZE: usize = (REDUCE_GROUP_EDGE * REDUCE_GROUP_EDGE) as usize;
/// Invocations in one culling workgroup.
pub const CULL_GROUP_SIZE: u32 = 64;

/// A linear depth image, row-major, origin at the top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthImage {
    width: u32,
    height: u32,
    texels: Vec<f32>,
}

impl DepthImage {
    /// An all-background image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            texels: vec![0.0; width as usize * height as usize],
        }
    }

    /// An image with every pixel at `depth`.
    pub fn filled(width: u32, height: u32, depth: f32) -> Self {
        Self {
            width,
            height,
            texels: vec![depth; width as usize * height as usize],
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Depth at a pixel; out-of-range pixels read as background.
    pub fn get(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.texels[(y * self.width + x) as usize]
    }

    /// Sets the depth at a pixel. Out-of-range writes are ignored.
    pub fn set(&mut self, x: u32, y: u32, depth: f32) {
        if x < self.width && y < self.height {
            self.texels[(y * self.width + x) as usize] = depth;
        }
    }

    /// Fills a pixel rectangle, clipped to the image.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, depth: f32) {
        for py in y..(y + height).min(self.height) {
            for px in x..(x + width).min(self.width) {
                self.set(px, py, depth);
            }
        }
    }
}

/// Per-tile depth ranges, in tile order (row-major).
pub fn reduce_tile_depths(image: &DepthImage, config: &TiledCullingConfig) -> Vec<TileDepthRange> {
    let tile_size = config.tile_size.pixels();
    let (tiles_x, tiles_y) = config.tile_dimensions(image.width, image.height);
    let mut ranges = Vec::with_capacity((tiles_x * tiles_y) as usize);
    let mut shared = [TileDepthRange::EMPTY; REDUCE_GROUP_SIZE];

    for tile_y in 0..tiles_y {
        for tile_x in 0..tiles_x {
            let origin_x = tile_x * tile_size;
            let origin_y = tile_y * tile_size;
            for (local_index, slot) in shared.iter_mut().enumerate() {
                let local_x = local_index as u32 % REDUCE_GROUP_EDGE;
                let local_y = local_index as u32 / REDUCE_GROUP_EDGE;
                let mut folded = TileDepthRange::EMPTY;
                for y in (local_y..tile_size).step_by(REDUCE_GROUP_EDGE as usize) {
                    for x in (local_x..tile_size).step_by(REDUCE_GROUP_EDGE as usize) {
                        let depth = image.get(origin_x + x, origin_y + y);
                        if depth > 0.0 {
                            folded.include(depth);
                        }
                    }
                }
                *slot = folded;
            }

            let mut stride = REDUCE_GROUP_SIZE / 2;
            while stride > 0 {
                for i in 0..stride {
                    shared[i] = shared[i].merge(shared[i + stride]);
                }
                stride /= 2;
            }
            ranges.push(shared[0]);
        }
    }
    ranges
}

/// The view-space box enclosing tile `tile` between its depth bounds.
///
/// Returns `None` for an empty range.
pub fn tile_view_bounds(
    tile: u32,
    range: TileDepthRange,
    config: &TiledCullingConfig,
    camera: &CameraView,
) -> Option<Aabb> {
    if range.is_empty() {
        return None;
    }
    let screen = camera.viewport.as_vec2();
    let tile_size = config.tile_size.pixels() as f32;
    let (tiles_x, _) = config.tile_dimensions(camera.viewport.width, camera.viewport.height);
    let tiles_x = tiles_x.max(1);
    let pixel_min = Vec2::new((tile % tiles_x) as f32, (tile / tiles_x) as f32) * tile_size;
    let pixel_max = (pixel_min + Vec2::splat(tile_size)).min(screen);

    let mut bounds = Aabb::EMPTY;
    for corner in 0..8u32 {
        let x = if corner & 1 != 0 { pixel_max.x } else { pixel_min.x };
        let y = if corner & 2 != 0 { pixel_max.y } else { pixel_min.y };
        let depth = if corner & 4 != 0 { range.max } else { range.min };
        bounds.include(reconstruct_view_position(camera, x, y, depth));
    }
    Some(bounds)
}

/// The point on a pixel's view ray at the given linear depth.
pub fn reconstruct_view_position(camera: &CameraView, x: f32, y: f32, linear_depth: f32) -> Vec3 {
    let (ndc_x, ndc_y) = camera.pixel_to_ndc(x, y);
    let near = camera.unproject(Vec3::new(ndc_x, ndc_y, 0.0));
    let far = camera.unproject(Vec3::new(ndc_x, ndc_y, 1.0));
    let span = near.z - far.z;
    let t = if span.abs() > 1e-6 {
        (linear_depth + near.z) / span
    } else {
        0.0
    };
    near.lerp(far, t)
}

/// The outputs of one culling dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct CullResult {
    /// One entry per tile.
    pub meta: Vec<TileMeta>,
    /// The shared index buffer; only `offset..offset + count` of each tile is meaningful.
    pub indices: Vec<u32>,
    /// Accepted and dropped totals.
    pub stats: TileCullStats,
}

impl CullResult {
    /// The light indices assigned to `tile`.
    pub fn tile_lights(&self, tile: usize) -> &[u32] {
        let meta = self.meta[tile];
        &self.indices[meta.offset as usize..(meta.offset + meta.count) as usize]
    }
}

/// Assigns lights to tiles, dropping any past the per-tile capacity.
pub fn cull_lights(
    lights: &[GpuLight],
    ranges: &[TileDepthRange],
    config: &TiledCullingConfig,
    camera: &CameraView,
) -> CullResult {
    let capacity = config.max_lights_per_tile;
    let mut meta = Vec::with_capacity(ranges.len());
    let mut indices = vec![0u32; ranges.len() * capacity as usize];
    let mut stats = TileCullStats::default();

    for (tile, range) in ranges.iter().enumerate() {
        let offset = config.tile_offset(tile as u32);
        let mut count = 0u32;
        if let Some(bounds) = tile_view_bounds(tile as u32, *range, config, camera) {
            for (i, light) in lights.iter().enumerate() {
                if !bounds.intersects_sphere(light.view_position(), light.radius()) {
                    continue;
                }
                if count < capacity {
                    indices[(offset + count) as usize] = i as u32;
                    count += 1;
                } else {
                    stats.dropped += 1;
                }
            }
        }
        stats.accepted += count;
        meta.push(TileMeta { offset, count });
    }

    CullResult {
        meta,
        indices,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strata_core::math::{Extent2D, Mat4};
    use strata_core::renderer::{Light, TileSize};

    fn ortho_camera(width: u32, height: u32) -> CameraView {
        CameraView::new(
            Mat4::IDENTITY,
            Mat4::orthographic_rh(-8.0, 8.0, -8.0, 8.0, 1.0, 100.0),
            1.0,
            100.0,
            Extent2D::new(width, height),
        )
    }

    fn light_at(position: Vec3, radius: f32) -> GpuLight {
        let light = Light::point(position, radius, Vec3::ONE, 1.0, 0.0);
        GpuLight::from_light(&light, position, &Mat4::IDENTITY)
    }

    #[test]
    fn reduction_ignores_background_and_flags_empty_tiles() {
        let config = TiledCullingConfig::default();
        let mut image = DepthImage::new(40, 20);
        image.set(3, 4, 12.0);
        image.set(15, 15, 7.5);
        image.set(17, 2, 30.0);
        let ranges = reduce_tile_depths(&image, &config);

        assert_eq!(ranges.len(), 3 * 2);
        assert_eq!(ranges[0], TileDepthRange { min: 7.5, max: 12.0 });
        assert_eq!(ranges[1], TileDepthRange { min: 30.0, max: 30.0 });
        assert!(ranges[2].is_empty());
        assert!(ranges[3].is_empty());
    }

    #[test]
    fn reduction_folds_tiles_larger_than_the_group() {
        let config = TiledCullingConfig {
            tile_size: TileSize::X32,
            max_lights_per_tile: 8,
        };
        let mut image = DepthImage::filled(32, 32, 20.0);
        image.set(31, 31, 50.0);
        image.set(17, 0, 2.0);
        let ranges = reduce_tile_depths(&image, &config);
        assert_eq!(ranges, vec![TileDepthRange { min: 2.0, max: 50.0 }]);
    }

    #[test]
    fn tile_bounds_span_the_depth_range() {
        let config = TiledCullingConfig::default();
        let camera = ortho_camera(32, 32);
        let range = TileDepthRange { min: 10.0, max: 20.0 };
        let bounds = tile_view_bounds(0, range, &config, &camera).unwrap();
        assert_relative_eq!(bounds.min.x, -8.0, epsilon = 1e-3);
        assert_relative_eq!(bounds.max.x, 0.0, epsilon = 1e-3);
        assert_relative_eq!(bounds.min.y, 0.0, epsilon = 1e-3);
        assert_relative_eq!(bounds.max.y, 8.0, epsilon = 1e-3);
        assert_relative_eq!(bounds.min.z, -20.0, epsilon = 1e-3);
        assert_relative_eq!(bounds.max.z, -10.0, epsilon = 1e-3);
        assert!(tile_view_bounds(0, TileDepthRange::EMPTY, &config, &camera).is_none());
    }

    #[test]
    fn overflow_is_dropped_and_counted() {
        let config = TiledCullingConfig {
            tile_size: TileSize::X16,
            max_lights_per_tile: 2,
        };
        let camera = ortho_camera(16, 16);
        let image = DepthImage::filled(16, 16, 10.0);
        let ranges = reduce_tile_depths(&image, &config);
        let lights: Vec<GpuLight> = (0..5)
            .map(|i| light_at(Vec3::new(i as f32 * 0.1, 0.0, -10.0), 2.0))
            .collect();
        let result = cull_lights(&lights, &ranges, &config, &camera);

        assert_eq!(result.tile_lights(0), &[0, 1]);
        assert_eq!(result.stats, TileCullStats { dropped: 3, accepted: 2 });
    }

    #[test]
    fn lights_off_the_tile_are_rejected() {
        let config = TiledCullingConfig::default();
        let camera = ortho_camera(32, 16);
        let image = DepthImage::filled(32, 16, 10.0);
        let ranges = reduce_tile_depths(&image, &config);
        // Tile 0 covers x in [-8, 0], tile 1 covers [0, 8].
        let lights = [light_at(Vec3::new(-4.0, 0.0, -10.0), 1.0), light_at(Vec3::new(4.0, 0.0, -10.0), 1.0)];
        let result = cull_lights(&lights, &ranges, &config, &camera);
        assert_eq!(result.tile_lights(0), &[0]);
        assert_eq!(result.tile_lights(1), &[1]);

        // Too deep to reach the depth range.
        let deep = [light_at(Vec3::new(-4.0, 0.0, -40.0), 5.0)];
        let result = cull_lights(&deep, &ranges, &config, &camera);
        assert_eq!(result.meta[0].count, 0);
    }
}
