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

//! The fixed-angle isometric camera of the demo.

use strata_core::config::CameraConfig;
use strata_core::math::{Extent2D, Mat4, Vec2, Vec3};
use strata_core::renderer::CameraView;

/// Tilt about the x axis, `atan(sqrt(1/2))` in degrees.
pub const ISO_ANGLE_X_DEG: f32 = 35.264;
/// Rotation about the y axis in degrees.
pub const ISO_ANGLE_Y_DEG: f32 = 45.0;
/// Vertical half-size of the orthographic volume at zoom 1.
pub const BASE_ORTHO_HALF_SIZE: f32 = 10.0;
/// Near plane distance.
pub const NEAR: f32 = 1.0;
/// Far plane distance.
pub const FAR: f32 = 100.0;
/// Smallest zoom factor.
pub const MIN_ZOOM: f32 = 0.2;
/// Largest zoom factor.
pub const MAX_ZOOM: f32 = 5.0;
/// World units panned per dragged pixel at zoom 1.
pub const PAN_SPEED: f32 = 0.01;

const ZOOM_IN_FACTOR: f32 = 0.9;
const ZOOM_OUT_FACTOR: f32 = 1.1;

/// An orthographic camera with a fixed isometric orientation, a zoom factor
/// and a screen-space pan.
#[derive(Debug, Clone, PartialEq)]
pub struct IsometricCamera {
    zoom: f32,
    pan: Vec2,
    distance: f32,
    viewport: Extent2D,
}

impl IsometricCamera {
    /// Creates a camera for the given viewport.
    pub fn new(config: &CameraConfig, viewport: Extent2D) -> Self {
        Self {
            zoom: config.zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            pan: Vec2::ZERO,
            distance: config.distance,
            viewport,
        }
    }

    /// Current zoom factor.
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Current pan offset in view units.
    pub fn pan(&self) -> Vec2 {
        self.pan
    }

    /// Viewport the projection is built for.
    pub fn viewport(&self) -> Extent2D {
        self.viewport
    }

    /// Applies one wheel step. Positive deltas shrink the zoom factor.
    pub fn scroll(&mut self, delta_y: f32) {
        if delta_y == 0.0 {
            return;
        }
        let factor = if delta_y > 0.0 {
            ZOOM_IN_FACTOR
        } else {
            ZOOM_OUT_FACTOR
        };
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Pans by a cursor motion in pixels.
    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.pan.x -= dx * PAN_SPEED / self.zoom;
        self.pan.y += dy * PAN_SPEED / self.zoom;
    }

    /// Rebuilds the projection for a new viewport.
    pub fn resize(&mut self, viewport: Extent2D) {
        self.viewport = viewport;
    }

    /// World to view: the isometric rotation followed by pan and distance.
    pub fn view_matrix(&self) -> Mat4 {
        let rx = Mat4::from_rotation_x((-ISO_ANGLE_X_DEG).to_radians());
        let ry = Mat4::from_rotation_y(ISO_ANGLE_Y_DEG.to_radians());
        let t = Mat4::from_translation(Vec3::new(-self.pan.x, -self.pan.y, -self.distance));
        t * rx * ry
    }

    /// View to clip, an orthographic volume whose height shrinks with zoom.
    pub fn projection_matrix(&self) -> Mat4 {
        let half = BASE_ORTHO_HALF_SIZE / self.zoom;
        let aspect = self.viewport.aspect_ratio();
        Mat4::orthographic_rh(-half * aspect, half * aspect, -half, half, NEAR, FAR)
    }

    /// The matrices a frame is rendered with.
    pub fn camera_view(&self) -> CameraView {
        CameraView::new(
            self.view_matrix(),
            self.projection_matrix(),
            NEAR,
            FAR,
            self.viewport,
        )
    }
}
