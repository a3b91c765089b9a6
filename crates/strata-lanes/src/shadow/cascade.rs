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

//! Cascaded shadow map fitting for the directional light.
//!
//! The camera frustum is sliced along its depth into `N` ranges whose far
//! distances blend a logarithmic and a uniform distribution. Each slice is
//! bounded in light space by an orthographic box whose X/Y center is snapped
//! to the shadow map's texel grid, so the rasterized shadow does not shimmer
//! while the box stays the same size.

use strata_core::config::{ShadowSettings, MAX_CASCADES};
use strata_core::math::{stable_up, Aabb, Mat4, Vec3, Vec4};
use strata_core::renderer::CameraView;

/// How far the light-view eye is pulled back from a slice's centroid.
pub const LIGHT_EYE_DISTANCE: f32 = 50.0;

/// One directional shadow cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cascade {
    /// World to light clip space, used to render the cascade.
    pub view_projection: Mat4,
    /// Camera view space to light clip space, used to sample the cascade.
    pub view_space_matrix: Mat4,
    /// Far distance of the slice, in camera view-space depth.
    pub split_depth: f32,
}

/// The light-space box fitted around one slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeFit {
    /// World to light view.
    pub light_view: Mat4,
    /// Minimum corner in light view space, padded and snapped.
    pub min: Vec3,
    /// Maximum corner in light view space, padded and snapped.
    pub max: Vec3,
}

impl CascadeFit {
    /// The orthographic projection enclosing the box.
    ///
    /// The light looks down its -Z axis, so the nearest point has the largest Z.
    pub fn projection(&self) -> Mat4 {
        Mat4::orthographic_rh(
            self.min.x,
            self.max.x,
            self.min.y,
            self.max.y,
            -self.max.z,
            -self.min.z,
        )
    }

    /// Size of one shadow map texel in light view units.
    pub fn texel_size(&self, resolution: u32) -> f32 {
        (self.max.x - self.min.x) / resolution.max(1) as f32
    }
}

/// Far distances of `count` slices between `near` and `far`.
///
/// `lambda` blends the logarithmic (1.0) and uniform (0.0) schemes. The last
/// split is always exactly `far`.
pub fn split_depths(near: f32, far: f32, count: u32, lambda: f32) -> Vec<f32> {
    let count = count.clamp(1, MAX_CASCADES);
    let near = near.max(f32::EPSILON);
    (1..=count)
        .map(|i| {
            if i == count {
                return far;
            }
            let p = i as f32 / count as f32;
            let log = near * (far / near).powf(p);
            let uniform = near + (far - near) * p;
            lambda * (log - uniform) + uniform
        })
        .collect()
}

/// The 8 world-space corners of a frustum, near plane first.
///
/// Each near corner `i` shares its edge ray with far corner `i + 4`.
pub fn frustum_corners(inverse_view_projection: Mat4) -> [Vec3; 8] {
    const NDC: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
    let mut corners = [Vec3::ZERO; 8];
    for (plane, z) in [0.0f32, 1.0].into_iter().enumerate() {
        for (i, (x, y)) in NDC.into_iter().enumerate() {
            let p = inverse_view_projection * Vec4::new(x, y, z, 1.0);
            corners[plane * 4 + i] = p.truncate() / p.w;
        }
    }
    corners
}

/// Cuts the part of a frustum between two depth fractions.
pub fn slice_corners(corners: &[Vec3; 8], from: f32, to: f32) -> [Vec3; 8] {
    let mut slice = [Vec3::ZERO; 8];
    for i in 0..4 {
        let ray = corners[i + 4] - corners[i];
        slice[i] = corners[i] + ray * from;
        slice[i + 4] = corners[i] + ray * to;
    }
    slice
}

/// Fits a light-space orthographic box around `corners`.
pub fn fit_light_space(
    corners: &[Vec3; 8],
    light_direction: Vec3,
    resolution: u32,
    z_padding: f32,
) -> CascadeFit {
    let direction = light_direction.try_normalize().unwrap_or(Vec3::NEG_Y);
    let center = corners.iter().copied().sum::<Vec3>() / corners.len() as f32;
    let light_view = Mat4::look_at_rh(
        center - direction * LIGHT_EYE_DISTANCE,
        center,
        stable_up(direction),
    );

    let light_space = corners.map(|c| light_view.transform_point3(c));
    let mut bounds = Aabb::from_points(&light_space);
    bounds.min.z -= z_padding;
    bounds.max.z += z_padding;

    let extent = (bounds.max - bounds.min) * 0.5;
    let mut center_ls = (bounds.max + bounds.min) * 0.5;
    let texel = extent * 2.0 / resolution.max(1) as f32;
    if texel.x > 0.0 {
        center_ls.x = (center_ls.x / texel.x).floor() * texel.x;
    }
    if texel.y > 0.0 {
        center_ls.y = (center_ls.y / texel.y).floor() * texel.y;
    }

    CascadeFit {
        light_view,
        min: center_ls - extent,
        max: center_ls + extent,
    }
}

/// Computes every cascade for the current camera and light.
pub fn compute_cascades(
    camera: &CameraView,
    light_direction: Vec3,
    settings: &ShadowSettings,
) -> Vec<Cascade> {
    let near = camera.near;
    let far = camera.far;
    let range = (far - near).max(f32::EPSILON);
    let corners = frustum_corners(camera.view_projection().inverse());
    let splits = split_depths(near, far, settings.cascade_count, settings.split_lambda);

    let mut previous = 0.0;
    splits
        .iter()
        .map(|&split| {
            let fraction = (split - near) / range;
            let slice = slice_corners(&corners, previous, fraction);
            previous = fraction;

            let fit = fit_light_space(
                &slice,
                light_direction,
                settings.cascade_resolution,
                settings.z_padding,
            );
            let view_projection = fit.projection() * fit.light_view;
            Cascade {
                view_projection,
                view_space_matrix: view_projection * camera.inverse_view,
                split_depth: split,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strata_core::math::Extent2D;

    fn iso_camera() -> CameraView {
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -15.0))
            * Mat4::from_rotation_x((-35.264f32).to_radians())
            * Mat4::from_rotation_y(45f32.to_radians());
        let aspect = 1280.0 / 720.0;
        let projection = Mat4::orthographic_rh(-10.0 * aspect, 10.0 * aspect, -10.0, 10.0, 1.0, 100.0);
        CameraView::new(view, projection, 1.0, 100.0, Extent2D::new(1280, 720))
    }

    #[test]
    fn three_splits_lie_between_uniform_and_log() {
        let splits = split_depths(1.0, 100.0, 3, 0.6);
        assert_eq!(splits.len(), 3);
        assert!(splits[0] < splits[1] && splits[1] < splits[2]);
        assert_eq!(splits[2], 100.0);
        for (i, split) in splits.iter().take(2).enumerate() {
            let p = (i + 1) as f32 / 3.0;
            let log = 100f32.powf(p);
            let uniform = 1.0 + 99.0 * p;
            assert!(*split >= log.min(uniform) && *split <= log.max(uniform));
        }
        assert_relative_eq!(splits[0], 16.385, epsilon = 1e-2);
    }

    #[test]
    fn splits_increase_for_every_count_and_lambda() {
        for count in 1..=MAX_CASCADES {
            for lambda in [0.0, 0.25, 0.6, 1.0] {
                let splits = split_depths(0.5, 250.0, count, lambda);
                assert_eq!(splits.len(), count as usize);
                assert!(splits.windows(2).all(|w| w[0] < w[1]), "{splits:?}");
                assert_eq!(*splits.last().unwrap(), 250.0);
            }
        }
    }

    #[test]
    fn split_count_is_clamped() {
        assert_eq!(split_depths(1.0, 10.0, 0, 0.5).len(), 1);
        assert_eq!(split_depths(1.0, 10.0, 9, 0.5).len(), MAX_CASCADES as usize);
    }

    #[test]
    fn fit_is_deterministic_for_an_unchanged_camera() {
        let camera = iso_camera();
        let settings = ShadowSettings::default();
        let direction = Vec3::new(-0.3, -1.0, -0.4);
        let a = compute_cascades(&camera, direction, &settings);
        let b = compute_cascades(&camera, direction, &settings);
        assert_eq!(a, b);
    }

    #[test]
    fn snapped_center_sits_on_the_texel_grid() {
        let corners = frustum_corners(iso_camera().view_projection().inverse());
        let fit = fit_light_space(&corners, Vec3::new(-0.3, -1.0, -0.4), 2048, 10.0);
        let texel = fit.texel_size(2048);
        let center = (fit.min + fit.max) * 0.5;
        let cells = center.x / texel;
        assert_relative_eq!(cells, cells.round(), epsilon = 1e-2);
    }

    #[test]
    fn cascades_enclose_their_slices() {
        let camera = iso_camera();
        let settings = ShadowSettings::default();
        let direction = Vec3::new(-0.3, -1.0, -0.4);
        let cascades = compute_cascades(&camera, direction, &settings);
        let corners = frustum_corners(camera.view_projection().inverse());
        let tolerance = 2.0 / settings.cascade_resolution as f32 + 1e-3;

        let mut previous = 0.0;
        for cascade in &cascades {
            let fraction = (cascade.split_depth - 1.0) / 99.0;
            for corner in slice_corners(&corners, previous, fraction) {
                let clip = cascade.view_projection * corner.extend(1.0);
                let ndc = clip.truncate() / clip.w;
                assert!(ndc.x.abs() <= 1.0 + tolerance, "x {ndc}");
                assert!(ndc.y.abs() <= 1.0 + tolerance, "y {ndc}");
                assert!((0.0..=1.0).contains(&ndc.z), "z {ndc}");
            }
            previous = fraction;
        }
    }

    #[test]
    fn vertical_light_uses_secondary_up() {
        let corners = frustum_corners(iso_camera().view_projection().inverse());
        let fit = fit_light_space(&corners, Vec3::NEG_Y, 1024, 10.0);
        assert!(fit.light_view.is_finite());
        assert!(fit.projection().is_finite());
    }

    #[test]
    fn view_space_matrix_matches_world_path() {
        let camera = iso_camera();
        let cascades = compute_cascades(&camera, Vec3::new(-0.3, -1.0, -0.4), &ShadowSettings::default());
        let world = Vec3::new(1.0, 0.5, -2.0);
        let view_pos = camera.view.transform_point3(world);
        let a = cascades[0].view_projection.project_point3(world);
        let b = cascades[0].view_space_matrix.project_point3(view_pos);
        assert_relative_eq!(a.x, b.x, epsilon = 1e-4);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-4);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-4);
    }
}
