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

use crate::renderer::api::*;
use crate::renderer::capabilities::ContextCapabilities;
use crate::renderer::error::ResourceError;
use crate::renderer::traits::CommandEncoder;
use std::fmt::Debug;

/// The graphics context: program service, resource factory and queue.
///
/// Every creation returns an opaque id; every id must eventually be handed back
/// to the matching `destroy_*` call. Destroying an unknown id returns
/// [`ResourceError::NotFound`] and is otherwise harmless.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Compiles one shader stage from WGSL source.
    /// ## Errors
    /// * `ResourceError::Shader` - If the source fails to parse or validate, or
    ///   does not define the stage's entry point.
    fn compile_shader(
        &self,
        stage: ShaderStage,
        source: &ShaderSource,
    ) -> Result<ShaderModuleId, ResourceError>;

    /// Destroys a compiled shader stage.
    fn destroy_shader(&self, id: ShaderModuleId) -> Result<(), ResourceError>;

    /// Links compiled stages into a program.
    /// ## Errors
    /// * `ResourceError::Shader` - If the stages are unknown, of the wrong kind,
    ///   or declare the same binding with incompatible types.
    fn link_program(&self, descriptor: &ProgramDescriptor) -> Result<ProgramId, ResourceError>;

    /// Destroys a linked program.
    fn destroy_program(&self, id: ProgramId) -> Result<(), ResourceError>;

    /// Looks up a member of the program's binding-0 uniform block by name.
    ///
    /// Returns `None` when the program has no such member.
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    /// Returns the byte size of the program's binding-0 uniform block, if any.
    fn uniform_block_size(&self, program: ProgramId) -> Option<u64>;

    /// Creates a render pipeline from the provided descriptor.
    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError>;

    /// Destroys a render pipeline.
    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError>;

    /// Creates a compute pipeline from the provided descriptor.
    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError>;

    /// Destroys a compute pipeline.
    fn destroy_compute_pipeline(&self, id: ComputePipelineId) -> Result<(), ResourceError>;

    /// Creates a bind group whose layout is derived from the program's bindings.
    fn create_bind_group(
        &self,
        descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError>;

    /// Destroys a bind group.
    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError>;

    /// Creates a new GPU buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Creates a new GPU buffer and initializes it with the provided data.
    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError>;

    /// Destroys a GPU buffer.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Writes data to a GPU buffer through the queue.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Reads back a range of a `MAP_READ` buffer, blocking until the GPU is done.
    fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, ResourceError>;

    /// Creates a new GPU texture.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Destroys a GPU texture.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Creates a new texture view for a given texture.
    fn create_texture_view(
        &self,
        texture_id: TextureId,
        descriptor: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError>;

    /// Destroys a texture view.
    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError>;

    /// Creates a new command encoder to record GPU commands.
    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder>;

    /// Submits a previously recorded command buffer to the GPU for execution.
    fn submit_command_buffer(&self, command_buffer: CommandBufferId);

    /// Reports what the context can do, for renderer path selection.
    fn capabilities(&self) -> ContextCapabilities;

    /// Gets the surface format of the rendering system.
    fn surface_format(&self) -> Option<TextureFormat>;

    /// Gets the adapter information of the rendering system.
    fn adapter_info(&self) -> GraphicsAdapterInfo;
}
