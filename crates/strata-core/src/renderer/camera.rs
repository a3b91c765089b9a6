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

//! Per-frame camera matrices shared by every pass.

use crate::math::{Extent2D, Mat4, Vec3, Vec4};

/// The camera state a frame is rendered with.
///
/// Projections use a `[0, 1]` clip-space depth range. Linear depth is the
/// distance along the view direction, `-view_pos.z`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    /// World to view.
    pub view: Mat4,
    /// View to clip.
    pub projection: Mat4,
    /// View to world.
    pub inverse_view: Mat4,
    /// Clip to view.
    pub inverse_projection: Mat4,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
    /// Viewport size in pixels.
    pub viewport: Extent2D,
}

impl CameraView {
    /// Builds a camera view, deriving both inverses.
    pub fn new(view: Mat4, projection: Mat4, near: f32, far: f32, viewport: Extent2D) -> Self {
        Self {
            view,
            projection,
            inverse_view: view.inverse(),
            inverse_projection: projection.inverse(),
            near,
            far,
            viewport,
        }
    }

    /// View-projection matrix.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Unprojects a normalized device coordinate (`z` in `[0, 1]`) to view space.
    pub fn unproject(&self, ndc: Vec3) -> Vec3 {
        let p = self.inverse_projection * Vec4::new(ndc.x, ndc.y, ndc.z, 1.0);
        p.truncate() / p.w
    }

    /// Linear depth of a view-space point.
    #[inline]
    pub fn linear_depth(view_pos: Vec3) -> f32 {
        -view_pos.z
    }

    /// Converts a pixel position (origin top-left) to normalized device x/y.
    pub fn pixel_to_ndc(&self, x: f32, y: f32) -> (f32, f32) {
        let size = self.viewport.as_vec2().max(crate::math::Vec2::ONE);
        (x / size.x * 2.0 - 1.0, 1.0 - y / size.y * 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn unproject_inverts_orthographic_projection() {
        let projection = Mat4::orthographic_rh(-10.0, 10.0, -5.0, 5.0, 1.0, 100.0);
        let camera = CameraView::new(
            Mat4::IDENTITY,
            projection,
            1.0,
            100.0,
            Extent2D::new(200, 100),
        );
        let near = camera.unproject(Vec3::new(1.0, 1.0, 0.0));
        assert_relative_eq!(near.x, 10.0, epsilon = 1e-4);
        assert_relative_eq!(near.y, 5.0, epsilon = 1e-4);
        assert_relative_eq!(CameraView::linear_depth(near), 1.0, epsilon = 1e-4);
        let far = camera.unproject(Vec3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(CameraView::linear_depth(far), 100.0, epsilon = 1e-3);
    }

    #[test]
    fn pixel_origin_is_top_left() {
        let camera = CameraView::new(
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            1.0,
            100.0,
            Extent2D::new(200, 100),
        );
        assert_eq!(camera.pixel_to_ndc(0.0, 0.0), (-1.0, 1.0));
        assert_eq!(camera.pixel_to_ndc(200.0, 100.0), (1.0, -1.0));
    }
}
