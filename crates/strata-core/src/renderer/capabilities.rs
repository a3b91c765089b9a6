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

//! Renderer tier selection.
//!
//! The tier is a pure function of the context version and of whether the
//! compute-dispatch and memory-barrier entry points exist. It is decided once
//! per context and never changes afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A graphics context feature level, compared lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApiVersion {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
}

impl ApiVersion {
    /// Creates a version.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// The lowest version that runs the deferred tier.
pub const DEFERRED_MIN_VERSION: ApiVersion = ApiVersion::new(4, 1);
/// The lowest version that runs the tiled compute tier.
pub const TILED_COMPUTE_MIN_VERSION: ApiVersion = ApiVersion::new(4, 3);

/// What the active graphics context offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextCapabilities {
    /// The context feature level.
    pub version: ApiVersion,
    /// Whether compute dispatch is available.
    pub compute_dispatch: bool,
    /// Whether explicit memory barriers are available.
    pub memory_barrier: bool,
}

/// The three mutually exclusive lighting strategies, ordered by richness.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum RendererPath {
    /// One forward pass with the directional light only.
    #[default]
    SimpleForward,
    /// G-buffer plus per-light volume accumulation.
    Deferred,
    /// G-buffer-less tiled shading with compute light culling.
    TiledCompute,
}

impl fmt::Display for RendererPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RendererPath::SimpleForward => "SimpleForward",
            RendererPath::Deferred => "Deferred",
            RendererPath::TiledCompute => "TiledCompute",
        };
        f.write_str(name)
    }
}

/// Picks the richest tier the context supports.
pub fn detect_renderer_path(caps: &ContextCapabilities) -> RendererPath {
    if caps.compute_dispatch && caps.memory_barrier && caps.version >= TILED_COMPUTE_MIN_VERSION {
        RendererPath::TiledCompute
    } else if caps.version >= DEFERRED_MIN_VERSION {
        RendererPath::Deferred
    } else {
        RendererPath::SimpleForward
    }
}

fn tiled_rejection(caps: &ContextCapabilities) -> String {
    let mut missing = Vec::new();
    if !caps.compute_dispatch {
        missing.push("compute dispatch".to_string());
    }
    if !caps.memory_barrier {
        missing.push("memory barriers".to_string());
    }
    if caps.version < TILED_COMPUTE_MIN_VERSION {
        missing.push(format!("version {} < {}", caps.version, TILED_COMPUTE_MIN_VERSION));
    }
    missing.join(", ")
}

/// Detects the tier, applies an optional downgrade, and logs exactly one line.
///
/// `force` can only lower the tier; a forced tier richer than the detected one
/// is ignored.
pub fn select_renderer_path(
    caps: &ContextCapabilities,
    force: Option<RendererPath>,
) -> RendererPath {
    let detected = detect_renderer_path(caps);
    match force {
        Some(forced) if forced > detected => {
            log::warn!(
                "RendererPath: forced {forced} is not supported by context {} ({}), using {detected}",
                caps.version,
                tiled_rejection(caps)
            );
            detected
        }
        Some(forced) if forced < detected => {
            log::warn!("RendererPath: {detected} available, downgraded to {forced} by configuration");
            forced
        }
        _ => {
            match detected {
                RendererPath::TiledCompute => {
                    log::info!("RendererPath: TiledCompute (context {})", caps.version)
                }
                RendererPath::Deferred => log::warn!(
                    "RendererPath: Deferred, TiledCompute rejected ({})",
                    tiled_rejection(caps)
                ),
                RendererPath::SimpleForward => log::warn!(
                    "RendererPath: SimpleForward, Deferred rejected (version {} < {})",
                    caps.version,
                    DEFERRED_MIN_VERSION
                ),
            }
            detected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(major: u32, minor: u32, compute: bool, barrier: bool) -> ContextCapabilities {
        ContextCapabilities {
            version: ApiVersion::new(major, minor),
            compute_dispatch: compute,
            memory_barrier: barrier,
        }
    }

    #[test]
    fn full_feature_set_selects_tiled() {
        assert_eq!(detect_renderer_path(&caps(4, 5, true, true)), RendererPath::TiledCompute);
        assert_eq!(detect_renderer_path(&caps(4, 3, true, true)), RendererPath::TiledCompute);
    }

    #[test]
    fn missing_entry_point_falls_back_to_deferred() {
        assert_eq!(detect_renderer_path(&caps(4, 6, false, true)), RendererPath::Deferred);
        assert_eq!(detect_renderer_path(&caps(4, 6, true, false)), RendererPath::Deferred);
        assert_eq!(detect_renderer_path(&caps(4, 2, true, true)), RendererPath::Deferred);
        assert_eq!(detect_renderer_path(&caps(4, 1, false, false)), RendererPath::Deferred);
    }

    #[test]
    fn old_context_selects_simple_forward() {
        assert_eq!(detect_renderer_path(&caps(4, 0, true, true)), RendererPath::SimpleForward);
        assert_eq!(detect_renderer_path(&caps(3, 3, false, false)), RendererPath::SimpleForward);
    }

    #[test]
    fn detection_is_deterministic() {
        for major in 2..=4 {
            for minor in 0..=6 {
                for compute in [false, true] {
                    for barrier in [false, true] {
                        let c = caps(major, minor, compute, barrier);
                        assert_eq!(detect_renderer_path(&c), detect_renderer_path(&c));
                    }
                }
            }
        }
    }

    #[test]
    fn force_only_downgrades() {
        let deferred_only = caps(4, 1, false, false);
        assert_eq!(
            select_renderer_path(&deferred_only, Some(RendererPath::TiledCompute)),
            RendererPath::Deferred
        );
        assert_eq!(
            select_renderer_path(&caps(4, 5, true, true), Some(RendererPath::SimpleForward)),
            RendererPath::SimpleForward
        );
        assert_eq!(select_renderer_path(&deferred_only, None), RendererPath::Deferred);
    }

    #[test]
    fn paths_are_ordered_by_richness() {
        assert!(RendererPath::SimpleForward < RendererPath::Deferred);
        assert!(RendererPath::Deferred < RendererPath::TiledCompute);
    }
}
