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

//! Error types of the lighting lanes.

use strata_core::renderer::ResourceError;
use thiserror::Error;

/// Failures of the shadow system.
#[derive(Debug, Error)]
pub enum ShadowError {
    /// A shadow map, view, buffer or the depth program could not be built.
    #[error("shadow resource allocation failed: {0}")]
    Resource(#[from] ResourceError),
    /// The system was used after [`ShadowSystem::release`](crate::ShadowSystem::release).
    #[error("shadow maps are not allocated")]
    NotAllocated,
}

/// Failures of a lighting lane.
#[derive(Debug, Error)]
pub enum LaneError {
    /// A GPU resource could not be created or written.
    #[error("lane resource failure: {0}")]
    Resource(#[from] ResourceError),
    /// The shadow system failed.
    #[error(transparent)]
    Shadow(#[from] ShadowError),
    /// A frame was requested before the lane's targets were allocated.
    #[error("lane '{0}' has no render targets; resize it first")]
    MissingTargets(&'static str),
}
