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

//! Backend-agnostic rendering contracts.
//!
//! This module holds the traits a graphics backend implements
//! ([`GraphicsDevice`], [`CommandEncoder`]), the plain handles and descriptors
//! they exchange, the owning wrappers built on top of them, and the data every
//! lighting tier shares: lights, tiles, cameras and debug views.

pub mod api;
pub mod camera;
pub mod capabilities;
pub mod debug_view;
pub mod error;
pub mod light;
pub mod mesh;
pub mod program;
pub mod resources;
pub mod tiled;
pub mod traits;

pub use self::api::*;
pub use self::camera::CameraView;
pub use self::capabilities::{
    detect_renderer_path, select_renderer_path, ApiVersion, ContextCapabilities, RendererPath,
};
pub use self::debug_view::DebugView;
pub use self::error::{PipelineError, RenderError, ResourceError, ShaderError};
pub use self::light::{DirectionalLight, GpuLight, Light, LightKind, ShadowSlot};
pub use self::mesh::{MeshBuffer, MeshData, Vertex};
pub use self::program::{ShaderProgram, UniformBlock};
pub use self::resources::{
    Framebuffer, FramebufferDescriptor, GpuBindGroup, GpuBuffer, GpuComputePipeline,
    GpuRenderPipeline, GpuResource, GpuTexture, GpuTextureView, GrowableBuffer,
};
pub use self::tiled::{TileCullStats, TileDepthRange, TileMeta, TileSize, TiledCullingConfig};
pub use self::traits::{CommandEncoder, ComputePass, GraphicsDevice, RenderPass};
