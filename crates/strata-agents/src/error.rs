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

//! Error types of the render engine.

use strata_core::renderer::ResourceError;
use strata_lanes::LaneError;
use thiserror::Error;

/// Failures while building or rendering the scene.
#[derive(Debug, Error)]
pub enum SceneError {
    /// Scene geometry could not be uploaded.
    #[error("scene geometry upload failed: {0}")]
    Resource(#[from] ResourceError),
    /// The lighting lane could not be built or failed while recording a frame.
    #[error(transparent)]
    Lane(#[from] LaneError),
}
