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

//! Shadow maps shared by the lit tiers.
//!
//! - [`cascade`]: cascaded directional shadow fitting with texel snapping.
//! - [`projection`]: spot and point light shadow matrices.
//! - [`schedule`]: per-frame registration caps and re-render throttling.
//! - [`system`]: the maps themselves and the depth passes that fill them.

pub mod cascade;
pub mod projection;
pub mod schedule;
pub mod system;

pub use cascade::{compute_cascades, split_depths, Cascade, CascadeFit};
pub use projection::{point_face_view_projections, spot_view_projection, CUBE_FACE_COUNT};
pub use schedule::{ShadowKind, ShadowScheduler, MAX_POINT_SHADOWS, MAX_SPOT_SHADOWS};
pub use system::{ShadowFrameStats, ShadowSystem, ShadowUniforms};
