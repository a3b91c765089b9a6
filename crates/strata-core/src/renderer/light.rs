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

//! Light descriptions and their GPU layout.
//!
//! A [`Light`] is authored once when the scene is built and never mutated;
//! its animated position is a pure function of elapsed time. Every frame the
//! lighting engine derives a view-space [`GpuLight`] from it.

use crate::math::{Mat4, Vec3, Vec4};
use bytemuck::{Pod, Zeroable};

/// The kind of a local light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    /// Omnidirectional light bounded by a sphere.
    Point,
    /// Cone-shaped light aimed at a target.
    Spot,
}

impl LightKind {
    fn orbit_scale(self) -> f32 {
        match self {
            LightKind::Point => 0.55,
            LightKind::Spot => 2.25,
        }
    }

    fn bob_scale(self) -> f32 {
        match self {
            LightKind::Point => 0.35,
            LightKind::Spot => 2.15,
        }
    }
}

/// A local light as authored in the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    /// Point or spot.
    pub kind: LightKind,
    /// World-space rest position the animation orbits around.
    pub base_position: Vec3,
    /// Influence radius in world units.
    pub radius: f32,
    /// Linear RGB color.
    pub color: Vec3,
    /// Intensity multiplier.
    pub intensity: f32,
    /// World-space point a spot light aims at.
    pub target: Vec3,
    /// Spot inner cone half-angle, in degrees.
    pub inner_angle_deg: f32,
    /// Spot outer cone half-angle, in degrees.
    pub outer_angle_deg: f32,
    /// Animation phase offset, in seconds.
    pub phase: f32,
    /// Whether the light asks for a shadow map.
    pub casts_shadow: bool,
    /// Minimum receiver-side depth bias.
    pub shadow_bias_min: f32,
    /// Slope-scaled receiver-side depth bias.
    pub shadow_bias_slope: f32,
}

impl Light {
    /// Default receiver-side bias applied by local lights.
    pub const DEFAULT_BIAS_MIN: f32 = 0.0015;
    /// Default slope bias applied by local lights.
    pub const DEFAULT_BIAS_SLOPE: f32 = 0.0045;

    /// Creates a point light.
    pub fn point(base_position: Vec3, radius: f32, color: Vec3, intensity: f32, phase: f32) -> Self {
        Self {
            kind: LightKind::Point,
            base_position,
            radius,
            color,
            intensity,
            target: Vec3::ZERO,
            inner_angle_deg: 0.0,
            outer_angle_deg: 0.0,
            phase,
            casts_shadow: false,
            shadow_bias_min: Self::DEFAULT_BIAS_MIN,
            shadow_bias_slope: Self::DEFAULT_BIAS_SLOPE,
        }
    }

    /// Creates a spot light aimed at `target`.
    #[allow(clippy::too_many_arguments)]
    pub fn spot(
        base_position: Vec3,
        target: Vec3,
        radius: f32,
        color: Vec3,
        intensity: f32,
        inner_angle_deg: f32,
        outer_angle_deg: f32,
        phase: f32,
    ) -> Self {
        Self {
            kind: LightKind::Spot,
            base_position,
            radius,
            color,
            intensity,
            target,
            inner_angle_deg,
            outer_angle_deg,
            phase,
            casts_shadow: false,
            shadow_bias_min: Self::DEFAULT_BIAS_MIN,
            shadow_bias_slope: Self::DEFAULT_BIAS_SLOPE,
        }
    }

    /// Marks the light as a shadow caster.
    pub fn with_shadow(mut self, casts_shadow: bool) -> Self {
        self.casts_shadow = casts_shadow;
        self
    }

    /// World-space position at `time` seconds.
    pub fn animated_position(&self, time: f32) -> Vec3 {
        let p = self.phase + time;
        let orbit = self.kind.orbit_scale();
        let bob = self.kind.bob_scale();
        self.base_position
            + Vec3::new(
                orbit * (p * 0.7).cos(),
                bob * (p * 1.3).sin(),
                orbit * (p * 0.9).sin(),
            )
    }

    /// World-space direction from `position` towards the spot target.
    ///
    /// Falls back to straight down when the light sits on its target.
    pub fn direction_from(&self, position: Vec3) -> Vec3 {
        (self.target - position).try_normalize().unwrap_or(Vec3::NEG_Y)
    }

    /// Outer cone half-angle in radians.
    pub fn outer_angle(&self) -> f32 {
        self.outer_angle_deg.to_radians()
    }
}

/// Which shadow map, if any, a [`GpuLight`] samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShadowSlot {
    /// No shadow map this frame.
    #[default]
    None,
    /// Layer `index` of the spot shadow array.
    Spot(u32),
    /// Layers `index * 6 .. index * 6 + 6` of the point shadow array.
    Point(u32),
}

/// GPU representation of one local light, in view space.
///
/// # Memory Layout
///
/// Five `vec4<f32>` rows, 80 bytes, matching `struct Light` in the shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    /// View-space position (xyz) and radius (w).
    pub position_radius: [f32; 4],
    /// Linear color (rgb) and intensity (a).
    pub color_intensity: [f32; 4],
    /// View-space direction (xyz) and type tag (w): 0 point, 1 spot.
    pub direction_type: [f32; 4],
    /// Cos inner, cos outer, radius, tan outer. Zero for point lights.
    pub spot_params: [f32; 4],
    /// Shadow type (0 none, 1 spot, 2 point), index, bias min, bias slope.
    pub shadow_info: [f32; 4],
}

impl GpuLight {
    /// Type tag of point lights.
    pub const TYPE_POINT: f32 = 0.0;
    /// Type tag of spot lights.
    pub const TYPE_SPOT: f32 = 1.0;
    /// Shadow tag for lights without a map.
    pub const SHADOW_NONE: f32 = 0.0;
    /// Shadow tag for spot maps.
    pub const SHADOW_SPOT: f32 = 1.0;
    /// Shadow tag for point maps.
    pub const SHADOW_POINT: f32 = 2.0;

    /// Derives the view-space record of `light` positioned at `world_position`.
    pub fn from_light(light: &Light, world_position: Vec3, view: &Mat4) -> Self {
        let view_pos = view.transform_point3(world_position);
        let (type_tag, view_dir, spot_params) = match light.kind {
            LightKind::Point => (Self::TYPE_POINT, Vec3::ZERO, [0.0; 4]),
            LightKind::Spot => {
                let dir = light.direction_from(world_position);
                let view_dir = view.transform_vector3(dir).normalize_or_zero();
                let outer = light.outer_angle();
                (
                    Self::TYPE_SPOT,
                    view_dir,
                    [
                        light.inner_angle_deg.to_radians().cos(),
                        outer.cos(),
                        light.radius,
                        outer.tan(),
                    ],
                )
            }
        };
        Self {
            position_radius: Vec4::from((view_pos, light.radius)).to_array(),
            color_intensity: Vec4::from((light.color, light.intensity)).to_array(),
            direction_type: Vec4::from((view_dir, type_tag)).to_array(),
            spot_params,
            shadow_info: [
                Self::SHADOW_NONE,
                0.0,
                light.shadow_bias_min,
                light.shadow_bias_slope,
            ],
        }
    }

    /// Attaches a shadow map slot.
    pub fn with_shadow_slot(mut self, slot: ShadowSlot) -> Self {
        let (tag, index) = match slot {
            ShadowSlot::None => (Self::SHADOW_NONE, 0),
            ShadowSlot::Spot(i) => (Self::SHADOW_SPOT, i),
            ShadowSlot::Point(i) => (Self::SHADOW_POINT, i),
        };
        self.shadow_info[0] = tag;
        self.shadow_info[1] = index as f32;
        self
    }

    /// View-space position.
    pub fn view_position(&self) -> Vec3 {
        Vec3::new(
            self.position_radius[0],
            self.position_radius[1],
            self.position_radius[2],
        )
    }

    /// Influence radius.
    pub fn radius(&self) -> f32 {
        self.position_radius[3]
    }

    /// Returns `true` for spot lights.
    pub fn is_spot(&self) -> bool {
        self.direction_type[3] == Self::TYPE_SPOT
    }
}

/// The single directional light, plus the scene ambient term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// World-space direction the light travels in.
    pub direction: Vec3,
    /// Linear color.
    pub color: Vec3,
    /// Intensity multiplier.
    pub intensity: f32,
    /// Ambient color added everywhere.
    pub ambient: Vec3,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.3, -1.0, -0.4).normalize(),
            color: Vec3::ONE,
            intensity: 0.7,
            ambient: Vec3::new(0.06, 0.06, 0.07),
        }
    }
}

impl DirectionalLight {
    /// Direction in view space, normalized.
    pub fn view_direction(&self, view: &Mat4) -> Vec3 {
        view.transform_vector3(self.direction).normalize_or_zero()
    }
}
