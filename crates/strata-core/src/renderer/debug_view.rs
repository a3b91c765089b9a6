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

//! Composite debug views.

use serde::{Deserialize, Serialize};

/// What the composite pass writes to the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DebugView {
    /// Tonemapped, gamma-corrected lighting.
    #[default]
    Final,
    /// G-buffer albedo.
    Albedo,
    /// View-space normals remapped to `[0, 1]`.
    Normal,
    /// Roughness in red, metallic in green.
    RoughMetal,
    /// Linear depth over the far plane.
    Depth,
    /// Accumulated lighting without tonemapping.
    Light,
    /// The first cascade's shadow map.
    ShadowMap,
    /// Directional shadow visibility.
    ShadowFactor,
    /// The cascade each pixel samples, color-coded.
    CascadeIndex,
}

impl DebugView {
    /// Every view, in selector order.
    pub const ALL: [DebugView; 9] = [
        DebugView::Final,
        DebugView::Albedo,
        DebugView::Normal,
        DebugView::RoughMetal,
        DebugView::Depth,
        DebugView::Light,
        DebugView::ShadowMap,
        DebugView::ShadowFactor,
        DebugView::CascadeIndex,
    ];

    /// Maps a selector index to a view. Out-of-range values select [`DebugView::Final`].
    pub fn from_index(index: u32) -> Self {
        Self::ALL
            .get(index as usize)
            .copied()
            .unwrap_or(DebugView::Final)
    }

    /// The selector index passed to the composite shader.
    pub fn index(self) -> u32 {
        self as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trips() {
        for (i, view) in DebugView::ALL.iter().enumerate() {
            assert_eq!(view.index(), i as u32);
            assert_eq!(DebugView::from_index(i as u32), *view);
        }
    }

    #[test]
    fn out_of_range_falls_back_to_final() {
        assert_eq!(DebugView::from_index(9), DebugView::Final);
        assert_eq!(DebugView::from_index(u32::MAX), DebugView::Final);
    }
}
