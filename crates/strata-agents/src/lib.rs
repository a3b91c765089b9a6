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

//! # Strata Agents
//!
//! The layer that drives the lanes. [`RenderEngine`] picks the lighting tier
//! once, owns the isometric camera and the demo scene, and runs one frame per
//! call; the windowing backend only hands it input events and a target view.

#![warn(missing_docs)]

pub mod error;
pub mod render_agent;
pub mod scene;

pub use error::SceneError;
pub use render_agent::{CameraControls, ControlAction, IsometricCamera, RenderEngine};
pub use scene::DemoScene;
