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

//! Engine configuration.
//!
//! Every struct deserializes with `#[serde(default)]`, so a configuration file
//! only needs the fields it changes. Values are clamped into their valid
//! ranges by [`EngineConfig::sanitized`].

use crate::math::Extent2D;
use crate::renderer::{DebugView, RendererPath, TiledCullingConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Largest number of directional cascades.
pub const MAX_CASCADES: u32 = 4;

/// Window parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Title bar text.
    pub title: String,
    /// Initial inner size.
    pub size: Extent2D,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Strata - Render Preview".to_string(),
            size: Extent2D::new(1280, 720),
        }
    }
}

/// Renderer tier and presentation options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Caps the detected tier. Can only downgrade.
    pub force_path: Option<RendererPath>,
    /// Directory with `<name>.wgsl` overrides of the embedded shaders.
    pub shader_root: Option<PathBuf>,
    /// The view shown at startup.
    pub debug_view: DebugView,
    /// Frames between dropped-light counter readbacks. `0` disables them.
    pub stats_readback_every: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            force_path: None,
            shader_root: None,
            debug_view: DebugView::Final,
            stats_readback_every: 60,
        }
    }
}

/// Shadow map sizes, filtering, biasing and update cadence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    /// Master switch. Disabled shadows leave every light unshadowed.
    pub enabled: bool,
    /// Directional cascade count, `1..=4`.
    pub cascade_count: u32,
    /// Resolution of each cascade layer.
    pub cascade_resolution: u32,
    /// Blend between uniform (0) and logarithmic (1) split placement.
    pub split_lambda: f32,
    /// Minimum receiver-side depth bias.
    pub bias_min: f32,
    /// Slope-scaled receiver-side depth bias.
    pub bias_slope: f32,
    /// PCF kernel radius in texels.
    pub pcf_radius: u32,
    /// Extra light-space depth added in front of and behind each cascade.
    pub z_padding: f32,
    /// Resolution of each spot shadow layer.
    pub spot_resolution: u32,
    /// Resolution of each point shadow face.
    pub point_resolution: u32,
    /// Frames between cascade re-renders.
    pub cascade_update_every: u32,
    /// Frames between spot shadow re-renders.
    pub spot_update_every: u32,
    /// Frames between point shadow re-renders.
    pub point_update_every: u32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cascade_count: 3,
            cascade_resolution: 2048,
            split_lambda: 0.6,
            bias_min: 0.0015,
            bias_slope: 0.0045,
            pcf_radius: 1,
            z_padding: 10.0,
            spot_resolution: 1024,
            point_resolution: 512,
            cascade_update_every: 1,
            spot_update_every: 1,
            point_update_every: 1,
        }
    }
}

impl ShadowSettings {
    /// Clamps counts, intervals and resolutions into their valid ranges.
    pub fn sanitized(mut self) -> Self {
        self.cascade_count = self.cascade_count.clamp(1, MAX_CASCADES);
        self.split_lambda = self.split_lambda.clamp(0.0, 1.0);
        self.cascade_resolution = self.cascade_resolution.max(1);
        self.spot_resolution = self.spot_resolution.max(1);
        self.point_resolution = self.point_resolution.max(1);
        self.cascade_update_every = self.cascade_update_every.max(1);
        self.spot_update_every = self.spot_update_every.max(1);
        self.point_update_every = self.point_update_every.max(1);
        self
    }
}

/// Demo scene population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Number of orbiting point lights.
    pub point_lights: u32,
    /// Number of orbiting spot lights.
    pub spot_lights: u32,
    /// Whether lights move over time.
    pub animate: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            point_lights: 32,
            spot_lights: 8,
            animate: true,
        }
    }
}

/// Initial isometric camera state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Zoom factor, `0.2..=5`.
    pub zoom: f32,
    /// Distance from the pivot along the view axis.
    pub distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            distance: 15.0,
        }
    }
}

/// The whole engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window parameters.
    pub window: WindowConfig,
    /// Renderer options.
    pub renderer: RendererConfig,
    /// Tiled culling options.
    pub tiled: TiledCullingConfig,
    /// Shadow options.
    pub shadows: ShadowSettings,
    /// Scene population.
    pub scene: SceneConfig,
    /// Camera options.
    pub camera: CameraConfig,
    /// Frames between frame-statistics log lines. `None` disables them.
    pub log_stats_every: Option<u32>,
    /// Also write log output to this file.
    pub log_file: Option<PathBuf>,
}

impl EngineConfig {
    /// Clamps every value into its valid range.
    pub fn sanitized(mut self) -> Self {
        self.tiled = self.tiled.sanitized();
        self.shadows = self.shadows.sanitized();
        self.camera.zoom = self.camera.zoom.clamp(0.2, 5.0);
        self.log_stats_every = self.log_stats_every.filter(|&n| n > 0);
        self
    }
}
