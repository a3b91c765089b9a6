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

//! Data structures for tiled light culling.
//!
//! The screen is split into square tiles. A compute pass reduces each tile's
//! linear depth to a `[min, max]` range, and a second pass writes the indices
//! of the lights touching that range into the tile's reserved slice of a
//! shared index buffer.
//!
//! # Layout
//!
//! Tile `t` owns indices `t * max_lights_per_tile .. (t + 1) * max_lights_per_tile`.
//! Slices never overlap, and [`TileMeta::count`] never exceeds the slice length.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// The tile size for light culling.
///
/// Smaller tiles provide more precise culling but increase compute overhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TileSize {
    /// 16×16 pixel tiles.
    #[default]
    X16,
    /// 32×32 pixel tiles.
    X32,
}

impl TileSize {
    /// Returns the tile size in pixels.
    #[inline]
    pub const fn pixels(&self) -> u32 {
        match self {
            TileSize::X16 => 16,
            TileSize::X32 => 32,
        }
    }

    /// Calculates the number of tiles needed for a given screen dimension.
    #[inline]
    pub const fn tile_count(&self, screen_size: u32) -> u32 {
        screen_size.div_ceil(self.pixels())
    }
}

/// Configuration for tiled light culling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TiledCullingConfig {
    /// The tile size for light culling.
    pub tile_size: TileSize,
    /// Maximum number of lights per tile. Further lights are dropped.
    pub max_lights_per_tile: u32,
}

impl Default for TiledCullingConfig {
    fn default() -> Self {
        Self {
            tile_size: TileSize::X16,
            max_lights_per_tile: 128,
        }
    }
}

impl TiledCullingConfig {
    /// Returns a copy with `max_lights_per_tile` clamped to at least one.
    pub fn sanitized(mut self) -> Self {
        self.max_lights_per_tile = self.max_lights_per_tile.max(1);
        self
    }

    /// Calculates the tile grid dimensions for a given screen size.
    #[inline]
    pub const fn tile_dimensions(&self, screen_width: u32, screen_height: u32) -> (u32, u32) {
        (
            self.tile_size.tile_count(screen_width),
            self.tile_size.tile_count(screen_height),
        )
    }

    /// Calculates the total number of tiles for a given screen size.
    #[inline]
    pub fn total_tiles(&self, screen_width: u32, screen_height: u32) -> u32 {
        let (tiles_x, tiles_y) = self.tile_dimensions(screen_width, screen_height);
        tiles_x * tiles_y
    }

    /// Calculates the required light index buffer size in bytes.
    pub fn light_index_buffer_size(&self, screen_width: u32, screen_height: u32) -> u64 {
        let total_tiles = self.total_tiles(screen_width, screen_height) as u64;
        total_tiles * self.max_lights_per_tile as u64 * std::mem::size_of::<u32>() as u64
    }

    /// Calculates the required tile meta buffer size in bytes.
    pub fn tile_meta_buffer_size(&self, screen_width: u32, screen_height: u32) -> u64 {
        self.total_tiles(screen_width, screen_height) as u64
            * std::mem::size_of::<TileMeta>() as u64
    }

    /// Calculates the required depth range buffer size in bytes.
    pub fn depth_range_buffer_size(&self, screen_width: u32, screen_height: u32) -> u64 {
        self.total_tiles(screen_width, screen_height) as u64
            * std::mem::size_of::<TileDepthRange>() as u64
    }

    /// First index slot reserved for `tile_index`.
    #[inline]
    pub const fn tile_offset(&self, tile_index: u32) -> u32 {
        tile_index * self.max_lights_per_tile
    }
}

/// Where a tile's light indices live in the shared index buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct TileMeta {
    /// First index slot of the tile.
    pub offset: u32,
    /// Number of valid indices starting at `offset`.
    pub count: u32,
}

/// A tile's linear depth bounds.
///
/// An empty tile keeps `min > max`, which makes it reject every light.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TileDepthRange {
    /// Nearest linear depth of any covered pixel.
    pub min: f32,
    /// Farthest linear depth of any covered pixel.
    pub max: f32,
}

impl TileDepthRange {
    /// The range of a tile with no geometry.
    pub const EMPTY: Self = Self {
        min: f32::MAX,
        max: 0.0,
    };

    /// Returns `true` if no geometry contributed to the range.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Widens the range to include `depth`.
    pub fn include(&mut self, depth: f32) {
        self.min = self.min.min(depth);
        self.max = self.max.max(depth);
    }

    /// Merges two ranges.
    pub fn merge(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

impl Default for TileDepthRange {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Culling counters copied back from the GPU.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct TileCullStats {
    /// Light-tile pairs dropped because a tile was full.
    pub dropped: u32,
    /// Light-tile pairs accepted.
    pub accepted: u32,
}
