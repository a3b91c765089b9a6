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

//! Math types used throughout the renderer.
//!
//! Vector and matrix types come from `glam`. Projections follow the
//! right-handed, zero-to-one depth convention (`*_rh` constructors), which is
//! what the wgpu backend expects.

pub use glam::{Mat3, Mat4, Quat, UVec2, Vec2, Vec3, Vec4};

use serde::{Deserialize, Serialize};

/// Threshold above which a direction is considered parallel to +Y when
/// choosing an up vector for a look-at matrix.
pub const UP_PARALLEL_THRESHOLD: f32 = 0.95;

/// Returns an up vector that is never near-parallel to `direction`.
///
/// +Y is used unless `|direction · Y|` exceeds [`UP_PARALLEL_THRESHOLD`], in
/// which case +Z is substituted so the look-at cross product stays well
/// conditioned.
pub fn stable_up(direction: Vec3) -> Vec3 {
    if direction.dot(Vec3::Y).abs() > UP_PARALLEL_THRESHOLD {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

/// A two-dimensional size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent2D {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Extent2D {
    /// Creates a new extent.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either side is zero.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width divided by height, with a zero height treated as one.
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Returns the extent as a float vector.
    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// An inverted box that any `include` call will overwrite.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    /// Builds the tightest box around `points`.
    pub fn from_points(points: &[Vec3]) -> Self {
        points.iter().fold(Self::EMPTY, |mut aabb, p| {
            aabb.include(*p);
            aabb
        })
    }

    /// Grows the box to contain `point`.
    pub fn include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Returns the point of the box closest to `point`.
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        point.clamp(self.min, self.max)
    }

    /// Returns `true` if the sphere touches or overlaps the box.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let closest = self.closest_point(center);
        closest.distance_squared(center) <= radius * radius
    }
}
