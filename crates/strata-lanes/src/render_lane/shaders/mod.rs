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

//! WGSL sources of the lighting tiers.
//!
//! Programs are composed from named parts: shared snippets (`common`,
//! `lighting`, `shadow_common`, ...) followed by the program body. Every
//! part is embedded at compile time; a [`ShaderLibrary`] with a root
//! directory prefers `<root>/<name>.wgsl` when that file exists, so shaders
//! can be iterated on without rebuilding.
//!
//! # Bindings
//!
//! All programs use bind group 0 with one shared numbering:
//!
//! | binding | resource |
//! |---------|----------|
//! | 0 | the program's uniform block |
//! | 1 | light storage buffer |
//! | 2, 3, 4 | albedo + metallic, normal + roughness, linear depth |
//! | 5, 6 | tile meta, light indices |
//! | 7 | tile depth ranges, or the HDR target in the composite |
//! | 8 | shadow uniforms |
//! | 9, 10, 11 | cascade, spot and point shadow arrays |
//! | 12 | tile culling counters |

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;
use strata_core::renderer::error::{ResourceError, ShaderError};
use strata_core::renderer::program::read_source;
use strata_core::renderer::{GraphicsDevice, ShaderProgram};

/// Light, tile and view reconstruction helpers.
pub const COMMON_WGSL: &str = include_str!("common.wgsl");
/// A vertex stage emitting one full-screen triangle.
pub const FULLSCREEN_WGSL: &str = include_str!("fullscreen.wgsl");
/// Shadow uniforms, maps and PCF lookups.
pub const SHADOW_COMMON_WGSL: &str = include_str!("shadow_common.wgsl");
/// Blinn-Phong shading of directional and local lights.
pub const LIGHTING_WGSL: &str = include_str!("lighting.wgsl");
/// G-buffer texture bindings.
pub const GBUFFER_READ_WGSL: &str = include_str!("gbuffer_read.wgsl");
/// The simple forward program.
pub const SIMPLE_WGSL: &str = include_str!("simple.wgsl");
/// The geometry pass.
pub const GBUFFER_WGSL: &str = include_str!("gbuffer.wgsl");
/// The full-screen directional light.
pub const DIR_LIGHT_WGSL: &str = include_str!("dir_light.wgsl");
/// Instanced sphere and cone light volumes.
pub const LIGHT_VOLUME_WGSL: &str = include_str!("light_volume.wgsl");
/// Tonemapping and debug views.
pub const COMPOSITE_WGSL: &str = include_str!("composite.wgsl");
/// Depth-only shadow map rendering.
pub const SHADOW_DEPTH_WGSL: &str = include_str!("shadow_depth.wgsl");
/// Depth pre-pass of the tiled tier.
pub const DEPTH_PREPASS_WGSL: &str = include_str!("depth_prepass.wgsl");
/// Per-tile depth min/max reduction.
pub const TILE_DEPTH_REDUCE_WGSL: &str = include_str!("tile_depth_reduce.wgsl");
/// Per-tile light culling.
pub const TILE_LIGHT_CULL_WGSL: &str = include_str!("tile_light_cull.wgsl");
/// Forward shading over culled tile lights.
pub const TILED_SHADING_WGSL: &str = include_str!("tiled_shading.wgsl");

const EMBEDDED: [(&str, &str); 15] = [
    ("common", COMMON_WGSL),
    ("fullscreen", FULLSCREEN_WGSL),
    ("shadow_common", SHADOW_COMMON_WGSL),
    ("lighting", LIGHTING_WGSL),
    ("gbuffer_read", GBUFFER_READ_WGSL),
    ("simple", SIMPLE_WGSL),
    ("gbuffer", GBUFFER_WGSL),
    ("dir_light", DIR_LIGHT_WGSL),
    ("light_volume", LIGHT_VOLUME_WGSL),
    ("composite", COMPOSITE_WGSL),
    ("shadow_depth", SHADOW_DEPTH_WGSL),
    ("depth_prepass", DEPTH_PREPASS_WGSL),
    ("tile_depth_reduce", TILE_DEPTH_REDUCE_WGSL),
    ("tile_light_cull", TILE_LIGHT_CULL_WGSL),
    ("tiled_shading", TILED_SHADING_WGSL),
];

/// Returns the embedded source of a part.
pub fn embedded_source(name: &str) -> Option<&'static str> {
    EMBEDDED
        .iter()
        .find(|(part, _)| *part == name)
        .map(|(_, source)| *source)
}

/// Every program a lane can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// Lambert forward shading to the surface.
    Simple,
    /// Geometry pass into the G-buffer.
    GBuffer,
    /// Full-screen directional light.
    DirLight,
    /// Point and spot light volumes.
    LightVolume,
    /// Tonemapping and debug views.
    Composite,
    /// Shadow map depth.
    ShadowDepth,
    /// Tiled depth pre-pass.
    DepthPrepass,
    /// Tile depth reduction.
    TileDepthReduce,
    /// Tile light culling.
    TileLightCull,
    /// Tiled forward shading.
    TiledShading,
}

/// The stages a program links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramShape {
    /// A vertex stage plus, if `fragment`, a fragment stage.
    Raster {
        /// Whether the program has a fragment stage.
        fragment: bool,
    },
    /// A compute stage.
    Compute,
}

impl ProgramKind {
    /// Every program, in build order.
    pub const ALL: [ProgramKind; 10] = [
        ProgramKind::Simple,
        ProgramKind::GBuffer,
        ProgramKind::DirLight,
        ProgramKind::LightVolume,
        ProgramKind::Composite,
        ProgramKind::ShadowDepth,
        ProgramKind::DepthPrepass,
        ProgramKind::TileDepthReduce,
        ProgramKind::TileLightCull,
        ProgramKind::TiledShading,
    ];

    /// Debug label of the program.
    pub const fn label(self) -> &'static str {
        match self {
            ProgramKind::Simple => "simple",
            ProgramKind::GBuffer => "gbuffer",
            ProgramKind::DirLight => "dir_light",
            ProgramKind::LightVolume => "light_volume",
            ProgramKind::Composite => "composite",
            ProgramKind::ShadowDepth => "shadow_depth",
            ProgramKind::DepthPrepass => "depth_prepass",
            ProgramKind::TileDepthReduce => "tile_depth_reduce",
            ProgramKind::TileLightCull => "tile_light_cull",
            ProgramKind::TiledShading => "tiled_shading",
        }
    }

    /// The parts the program is composed from, in order.
    pub const fn parts(self) -> &'static [&'static str] {
        match self {
            ProgramKind::Simple => &["simple"],
            ProgramKind::GBuffer => &["gbuffer"],
            ProgramKind::DirLight => &[
                "common",
                "shadow_common",
                "lighting",
                "gbuffer_read",
                "fullscreen",
                "dir_light",
            ],
            ProgramKind::LightVolume => &[
                "common",
                "shadow_common",
                "lighting",
                "gbuffer_read",
                "light_volume",
            ],
            ProgramKind::Composite => &[
                "common",
                "shadow_common",
                "gbuffer_read",
                "fullscreen",
                "composite",
            ],
            ProgramKind::ShadowDepth => &["shadow_depth"],
            ProgramKind::DepthPrepass => &["depth_prepass"],
            ProgramKind::TileDepthReduce => &["common", "tile_depth_reduce"],
            ProgramKind::TileLightCull => &["common", "tile_light_cull"],
            ProgramKind::TiledShading => &["common", "shadow_common", "lighting", "tiled_shading"],
        }
    }

    /// The stages the program links.
    pub const fn shape(self) -> ProgramShape {
        match self {
            ProgramKind::ShadowDepth => ProgramShape::Raster { fragment: false },
            ProgramKind::TileDepthReduce | ProgramKind::TileLightCull => ProgramShape::Compute,
            _ => ProgramShape::Raster { fragment: true },
        }
    }
}

/// Resolves shader parts and builds programs from them.
#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    root: Option<PathBuf>,
}

impl ShaderLibrary {
    /// A library using only the embedded sources.
    pub fn embedded() -> Self {
        Self { root: None }
    }

    /// A library that prefers files under `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// A library for an optional override directory.
    pub fn from_root(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    /// The override directory, if any.
    pub fn root(&self) -> Option<&PathBuf> {
        self.root.as_ref()
    }

    /// Source of one part: the override file if present, else the embedded copy.
    pub fn source(&self, name: &str) -> Result<Cow<'static, str>, ResourceError> {
        if let Some(root) = &self.root {
            let path = root.join(format!("{name}.wgsl"));
            if path.is_file() {
                log::debug!("ShaderLibrary: loading '{}'", path.display());
                return read_source(&path).map(Cow::Owned);
            }
        }
        embedded_source(name).map(Cow::Borrowed).ok_or_else(|| {
            ShaderError::LoadError {
                path: format!("{name}.wgsl"),
                source_error: "no embedded shader with this name".to_string(),
            }
            .into()
        })
    }

    /// Concatenates parts into one module.
    pub fn compose(&self, parts: &[&str]) -> Result<String, ResourceError> {
        let mut module = String::new();
        for part in parts {
            module.push_str(&self.source(part)?);
            module.push('\n');
        }
        Ok(module)
    }

    /// Composes and builds one program.
    pub fn build(
        &self,
        device: &Arc<dyn GraphicsDevice>,
        kind: ProgramKind,
    ) -> Result<ShaderProgram, ResourceError> {
        let source = self.compose(kind.parts())?;
        let program = match kind.shape() {
            ProgramShape::Raster { fragment } => {
                ShaderProgram::build(device, kind.label(), &source, fragment.then_some(source.as_str()))
            }
            ProgramShape::Compute => ShaderProgram::build_compute(device, kind.label(), &source),
        };
        program.inspect_err(|e| log::error!("ShaderLibrary: '{}' failed: {e}", kind.label()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::testing::MockGraphicsDevice;

    #[test]
    fn every_part_is_embedded() {
        for kind in ProgramKind::ALL {
            for part in kind.parts() {
                assert!(embedded_source(part).is_some(), "missing part {part}");
            }
        }
    }

    #[test]
    fn volume_scale_matches_inside_test() {
        let declared = LIGHT_VOLUME_WGSL
            .lines()
            .find_map(|line| line.trim().strip_prefix("const VOLUME_SCALE: f32 = "))
            .and_then(|rest| rest.trim_end_matches(';').parse::<f32>().ok())
            .unwrap();
        assert_eq!(declared, crate::render_lane::VOLUME_SCALE);
    }

    #[test]
    fn entry_points_match_shapes() {
        let library = ShaderLibrary::embedded();
        for kind in ProgramKind::ALL {
            let source = library.compose(kind.parts()).unwrap();
            match kind.shape() {
                ProgramShape::Raster { fragment } => {
                    assert!(source.contains("fn vs_main"), "{}", kind.label());
                    assert_eq!(source.contains("fn fs_main"), fragment, "{}", kind.label());
                }
                ProgramShape::Compute => assert!(source.contains("fn cs_main")),
            }
        }
    }

    #[test]
    fn unknown_part_is_a_load_error() {
        let err = ShaderLibrary::embedded().source("does_not_exist").unwrap_err();
        assert!(matches!(err, ResourceError::Shader(ShaderError::LoadError { .. })));
    }

    #[test]
    fn root_overrides_embedded_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("simple.wgsl"), "// replaced").unwrap();
        let library = ShaderLibrary::with_root(dir.path());
        assert_eq!(library.source("simple").unwrap(), "// replaced");
        assert_eq!(library.source("gbuffer").unwrap(), GBUFFER_WGSL);
    }

    #[test]
    fn build_failure_is_returned() {
        let mock = Arc::new(MockGraphicsDevice::new());
        mock.fail_shaders_containing("tile_meta");
        let device: Arc<dyn GraphicsDevice> = mock.clone();
        let library = ShaderLibrary::embedded();
        assert!(library.build(&device, ProgramKind::TileLightCull).is_err());
        assert!(library.build(&device, ProgramKind::GBuffer).is_ok());
        assert_eq!(mock.live_programs(), 1);
    }
}
