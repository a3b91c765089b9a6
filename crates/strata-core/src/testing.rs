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

//! A recording graphics device for tests.
//!
//! [`MockGraphicsDevice`] hands out unique ids, tracks which handles are
//! alive, keeps buffer contents in memory and logs every encoder command of
//! every submitted command buffer, so pass order and barrier placement can be
//! asserted without a GPU.

use crate::renderer::api::*;
use crate::renderer::capabilities::{ApiVersion, ContextCapabilities};
use crate::renderer::error::{ResourceError, ShaderError};
use crate::renderer::traits::{CommandEncoder, ComputePass, GraphicsDevice, RenderPass};
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Size the mock reports for every program's uniform block.
pub const MOCK_UNIFORM_BLOCK_SIZE: u64 = 4096;
const MOCK_UNIFORM_SLOT: u32 = 64;

/// One command recorded by a mock encoder.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// A render pass started.
    BeginRenderPass {
        /// The pass label.
        label: Option<String>,
        /// Color attachment views, in order.
        color_attachments: Vec<TextureViewId>,
        /// Clear values of the color attachments, `None` for loads.
        color_clears: Vec<Option<Color>>,
        /// The depth attachment view.
        depth_attachment: Option<TextureViewId>,
    },
    /// The current render pass ended.
    EndRenderPass,
    /// A compute pass started.
    BeginComputePass {
        /// The pass label.
        label: Option<String>,
    },
    /// The current compute pass ended.
    EndComputePass,
    /// A render pipeline was bound.
    SetRenderPipeline(RenderPipelineId),
    /// A compute pipeline was bound.
    SetComputePipeline(ComputePipelineId),
    /// A bind group was bound.
    SetBindGroup {
        /// Group index.
        index: u32,
        /// The bind group.
        bind_group: BindGroupId,
    },
    /// A vertex buffer was bound.
    SetVertexBuffer {
        /// Slot.
        slot: u32,
        /// The buffer.
        buffer: BufferId,
    },
    /// An index buffer was bound.
    SetIndexBuffer {
        /// The buffer.
        buffer: BufferId,
    },
    /// A non-indexed draw.
    Draw {
        /// Vertex range.
        vertices: Range<u32>,
        /// Instance range.
        instances: Range<u32>,
    },
    /// An indexed draw.
    DrawIndexed {
        /// Index range.
        indices: Range<u32>,
        /// Instance range.
        instances: Range<u32>,
    },
    /// A compute dispatch.
    Dispatch {
        /// Workgroups along x.
        x: u32,
        /// Workgroups along y.
        y: u32,
        /// Workgroups along z.
        z: u32,
    },
    /// A memory barrier.
    MemoryBarrier(BarrierFlags),
    /// A buffer-to-buffer copy.
    CopyBufferToBuffer {
        /// Source buffer.
        source: BufferId,
        /// Destination buffer.
        destination: BufferId,
        /// Bytes copied.
        size: u64,
    },
}

/// The state a render pipeline was created with.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPipeline {
    /// The pipeline label.
    pub label: Option<String>,
    /// The linked program.
    pub program: ProgramId,
    /// Face culling.
    pub cull_mode: CullMode,
    /// Depth state.
    pub depth_stencil: Option<DepthStencilState>,
    /// Color targets.
    pub color_targets: Vec<ColorTargetState>,
}

/// The parameters a texture was created with.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTexture {
    /// The texture label.
    pub label: Option<String>,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Array layers.
    pub array_layers: u32,
    /// Format.
    pub format: TextureFormat,
}

#[derive(Debug, Default)]
struct MockState {
    buffers: HashMap<usize, Vec<u8>>,
    textures: HashMap<usize, RecordedTexture>,
    views: HashSet<usize>,
    shaders: HashSet<usize>,
    programs: HashMap<usize, HashMap<String, UniformLocation>>,
    render_pipelines: HashMap<usize, RecordedPipeline>,
    compute_pipelines: HashMap<usize, Option<String>>,
    bind_groups: HashMap<usize, Vec<BindGroupEntry>>,
    pending: HashMap<u64, Vec<RecordedCommand>>,
    submissions: Vec<Vec<RecordedCommand>>,
    failed_destroys: usize,
    fail_patterns: Vec<String>,
}

/// A recording, GPU-less [`GraphicsDevice`].
#[derive(Debug)]
pub struct MockGraphicsDevice {
    next_id: AtomicUsize,
    next_command_buffer: AtomicU64,
    capabilities: ContextCapabilities,
    state: Arc<Mutex<MockState>>,
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGraphicsDevice {
    /// A device reporting a full feature set.
    pub fn new() -> Self {
        Self::with_capabilities(ContextCapabilities {
            version: ApiVersion::new(4, 5),
            compute_dispatch: true,
            memory_barrier: true,
        })
    }

    /// A device reporting the given capabilities.
    pub fn with_capabilities(capabilities: ContextCapabilities) -> Self {
        Self {
            next_id: AtomicUsize::new(1),
            next_command_buffer: AtomicU64::new(1),
            capabilities,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn next(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Makes every shader compile whose source contains `pattern` fail.
    pub fn fail_shaders_containing(&self, pattern: &str) {
        self.state().fail_patterns.push(pattern.to_string());
    }

    /// Every command of every submitted command buffer, in submission order.
    pub fn submitted_commands(&self) -> Vec<RecordedCommand> {
        self.state().submissions.iter().flatten().cloned().collect()
    }

    /// The commands of each submission.
    pub fn submissions(&self) -> Vec<Vec<RecordedCommand>> {
        self.state().submissions.clone()
    }

    /// Forgets every recorded submission.
    pub fn clear_submissions(&self) {
        self.state().submissions.clear();
    }

    /// The creation state of a render pipeline.
    pub fn render_pipeline(&self, id: RenderPipelineId) -> Option<RecordedPipeline> {
        self.state().render_pipelines.get(&id.0).cloned()
    }

    /// Every live render pipeline whose label contains `fragment`.
    pub fn render_pipelines_labeled(&self, fragment: &str) -> Vec<RecordedPipeline> {
        let mut found: Vec<_> = self
            .state()
            .render_pipelines
            .values()
            .filter(|p| p.label.as_deref().is_some_and(|l| l.contains(fragment)))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.label.cmp(&b.label));
        found
    }

    /// Every live texture whose label contains `fragment`.
    pub fn textures_labeled(&self, fragment: &str) -> Vec<RecordedTexture> {
        self.state()
            .textures
            .values()
            .filter(|t| t.label.as_deref().is_some_and(|l| l.contains(fragment)))
            .cloned()
            .collect()
    }

    /// The entries a bind group was created with.
    pub fn bind_group_entries(&self, id: BindGroupId) -> Option<Vec<BindGroupEntry>> {
        self.state().bind_groups.get(&id.0).cloned()
    }

    /// Current contents of a buffer.
    pub fn buffer_contents(&self, id: BufferId) -> Option<Vec<u8>> {
        self.state().buffers.get(&id.0).cloned()
    }

    /// Number of live buffers.
    pub fn live_buffers(&self) -> usize {
        self.state().buffers.len()
    }

    /// Number of live textures.
    pub fn live_textures(&self) -> usize {
        self.state().textures.len()
    }

    /// Number of live texture views.
    pub fn live_views(&self) -> usize {
        self.state().views.len()
    }

    /// Number of live shader modules.
    pub fn live_shaders(&self) -> usize {
        self.state().shaders.len()
    }

    /// Number of live programs.
    pub fn live_programs(&self) -> usize {
        self.state().programs.len()
    }

    /// Number of destroy calls made with an unknown id.
    pub fn failed_destroys(&self) -> usize {
        self.state().failed_destroys
    }

    fn remove<V>(
        map: &mut HashMap<usize, V>,
        failed: &mut usize,
        key: usize,
    ) -> Result<(), ResourceError> {
        if map.remove(&key).is_some() {
            Ok(())
        } else {
            *failed += 1;
            Err(ResourceError::NotFound)
        }
    }

    fn remove_from_set(
        set: &mut HashSet<usize>,
        failed: &mut usize,
        key: usize,
    ) -> Result<(), ResourceError> {
        if set.remove(&key) {
            Ok(())
        } else {
            *failed += 1;
            Err(ResourceError::NotFound)
        }
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn compile_shader(
        &self,
        _stage: ShaderStage,
        source: &ShaderSource,
    ) -> Result<ShaderModuleId, ResourceError> {
        let mut state = self.state();
        if state.fail_patterns.iter().any(|p| source.code.contains(p.as_str())) {
            return Err(ShaderError::CompilationError {
                label: source.label.to_string(),
                details: "rejected by mock".to_string(),
            }
            .into());
        }
        let id = self.next();
        state.shaders.insert(id);
        Ok(ShaderModuleId(id))
    }

    fn destroy_shader(&self, id: ShaderModuleId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let state = &mut *state;
        Self::remove_from_set(&mut state.shaders, &mut state.failed_destroys, id.0)
    }

    fn link_program(&self, descriptor: &ProgramDescriptor) -> Result<ProgramId, ResourceError> {
        let mut state = self.state();
        let modules = match descriptor.stages {
            ProgramStages::Graphics { vertex, fragment } => {
                let mut m = vec![vertex];
                m.extend(fragment);
                m
            }
            ProgramStages::Compute { compute } => vec![compute],
        };
        if let Some(missing) = modules.iter().find(|m| !state.shaders.contains(&m.0)) {
            return Err(ShaderError::NotFound { id: *missing }.into());
        }
        let id = self.next();
        state.programs.insert(id, HashMap::new());
        Ok(ProgramId(id))
    }

    fn destroy_program(&self, id: ProgramId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let state = &mut *state;
        Self::remove(&mut state.programs, &mut state.failed_destroys, id.0)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let mut state = self.state();
        let members = state.programs.get_mut(&program.0)?;
        let slot = members.len() as u32;
        let location = *members
            .entry(name.to_string())
            .or_insert(UniformLocation {
                offset: slot * MOCK_UNIFORM_SLOT,
                size: MOCK_UNIFORM_SLOT,
            });
        Some(location)
    }

    fn uniform_block_size(&self, program: ProgramId) -> Option<u64> {
        self.state()
            .programs
            .contains_key(&program.0)
            .then_some(MOCK_UNIFORM_BLOCK_SIZE)
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError> {
        let mut state = self.state();
        if !state.programs.contains_key(&descriptor.program.0) {
            return Err(crate::renderer::error::PipelineError::InvalidProgram {
                id: descriptor.program,
                pipeline_label: descriptor.label.as_ref().map(|l| l.to_string()),
            }
            .into());
        }
        let id = self.next();
        state.render_pipelines.insert(
            id,
            RecordedPipeline {
                label: descriptor.label.as_ref().map(|l| l.to_string()),
                program: descriptor.program,
                cull_mode: descriptor.cull_mode,
                depth_stencil: descriptor.depth_stencil,
                color_targets: descriptor.color_targets.to_vec(),
            },
        );
        Ok(RenderPipelineId(id))
    }

    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let state = &mut *state;
        Self::remove(&mut state.render_pipelines, &mut state.failed_destroys, id.0)
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError> {
        let id = self.next();
        self.state()
            .compute_pipelines
            .insert(id, descriptor.label.as_ref().map(|l| l.to_string()));
        Ok(ComputePipelineId(id))
    }

    fn destroy_compute_pipeline(&self, id: ComputePipelineId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let state = &mut *state;
        Self::remove(&mut state.compute_pipelines, &mut state.failed_destroys, id.0)
    }

    fn create_bind_group(
        &self,
        descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError> {
        let id = self.next();
        self.state()
            .bind_groups
            .insert(id, descriptor.entries.to_vec());
        Ok(BindGroupId(id))
    }

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let state = &mut *state;
        Self::remove(&mut state.bind_groups, &mut state.failed_destroys, id.0)
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let id = self.next();
        self.state()
            .buffers
            .insert(id, vec![0; descriptor.size as usize]);
        Ok(BufferId(id))
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        let id = self.next();
        let mut contents = vec![0; descriptor.size as usize];
        let len = data.len().min(contents.len());
        contents[..len].copy_from_slice(&data[..len]);
        self.state().buffers.insert(id, contents);
        Ok(BufferId(id))
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let state = &mut *state;
        Self::remove(&mut state.buffers, &mut state.failed_destroys, id.0)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut state = self.state();
        let contents = state.buffers.get_mut(&id.0).ok_or(ResourceError::NotFound)?;
        let start = offset as usize;
        let dst = contents
            .get_mut(start..start + data.len())
            .ok_or(ResourceError::OutOfBounds)?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, ResourceError> {
        let state = self.state();
        let contents = state.buffers.get(&id.0).ok_or(ResourceError::NotFound)?;
        contents
            .get(offset as usize..(offset + size) as usize)
            .map(<[u8]>::to_vec)
            .ok_or(ResourceError::OutOfBounds)
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let id = self.next();
        self.state().textures.insert(
            id,
            RecordedTexture {
                label: descriptor.label.as_ref().map(|l| l.to_string()),
                width: descriptor.width,
                height: descriptor.height,
                array_layers: descriptor.array_layers,
                format: descriptor.format,
            },
        );
        Ok(TextureId(id))
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let state = &mut *state;
        Self::remove(&mut state.textures, &mut state.failed_destroys, id.0)
    }

    fn create_texture_view(
        &self,
        texture_id: TextureId,
        _descriptor: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError> {
        let mut state = self.state();
        if !state.textures.contains_key(&texture_id.0) {
            return Err(ResourceError::NotFound);
        }
        let id = self.next();
        state.views.insert(id);
        Ok(TextureViewId(id))
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let state = &mut *state;
        Self::remove_from_set(&mut state.views, &mut state.failed_destroys, id.0)
    }

    fn create_command_encoder(&self, _label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(MockCommandEncoder {
            id: self.next_command_buffer.fetch_add(1, Ordering::Relaxed),
            commands: Vec::new(),
            state: self.state.clone(),
        })
    }

    fn submit_command_buffer(&self, command_buffer: CommandBufferId) {
        let mut state = self.state();
        let Some(commands) = state.pending.remove(&command_buffer.0) else {
            return;
        };
        for command in &commands {
            if let RecordedCommand::CopyBufferToBuffer {
                source,
                destination,
                size,
            } = command
            {
                let bytes = state
                    .buffers
                    .get(&source.0)
                    .and_then(|b| b.get(..*size as usize))
                    .map(<[u8]>::to_vec);
                if let (Some(bytes), Some(dst)) = (bytes, state.buffers.get_mut(&destination.0)) {
                    let len = bytes.len().min(dst.len());
                    dst[..len].copy_from_slice(&bytes[..len]);
                }
            }
        }
        state.submissions.push(commands);
    }

    fn capabilities(&self) -> ContextCapabilities {
        self.capabilities
    }

    fn surface_format(&self) -> Option<TextureFormat> {
        Some(TextureFormat::Bgra8Unorm)
    }

    fn adapter_info(&self) -> GraphicsAdapterInfo {
        GraphicsAdapterInfo {
            name: "Mock Adapter".to_string(),
            backend: "Mock".to_string(),
            device_type: AdapterDeviceType::Cpu,
        }
    }
}

struct MockCommandEncoder {
    id: u64,
    commands: Vec<RecordedCommand>,
    state: Arc<Mutex<MockState>>,
}

struct MockRenderPass<'a> {
    commands: &'a mut Vec<RecordedCommand>,
}

struct MockComputePass<'a> {
    commands: &'a mut Vec<RecordedCommand>,
}

impl Drop for MockRenderPass<'_> {
    fn drop(&mut self) {
        self.commands.push(RecordedCommand::EndRenderPass);
    }
}

impl Drop for MockComputePass<'_> {
    fn drop(&mut self) {
        self.commands.push(RecordedCommand::EndComputePass);
    }
}

impl<'a> RenderPass<'a> for MockRenderPass<'a> {
    fn set_pipeline(&mut self, pipeline: RenderPipelineId) {
        self.commands.push(RecordedCommand::SetRenderPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId) {
        self.commands
            .push(RecordedCommand::SetBindGroup { index, bind_group });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, _offset: u64) {
        self.commands
            .push(RecordedCommand::SetVertexBuffer { slot, buffer });
    }

    fn set_index_buffer(&mut self, buffer: BufferId, _offset: u64, _index_format: IndexFormat) {
        self.commands.push(RecordedCommand::SetIndexBuffer { buffer });
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.commands
            .push(RecordedCommand::Draw { vertices, instances });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, _base_vertex: i32, instances: Range<u32>) {
        self.commands
            .push(RecordedCommand::DrawIndexed { indices, instances });
    }
}

impl<'a> ComputePass<'a> for MockComputePass<'a> {
    fn set_pipeline(&mut self, pipeline: ComputePipelineId) {
        self.commands
            .push(RecordedCommand::SetComputePipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId) {
        self.commands
            .push(RecordedCommand::SetBindGroup { index, bind_group });
    }

    fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32) {
        self.commands.push(RecordedCommand::Dispatch { x, y, z });
    }
}

impl CommandEncoder for MockCommandEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'encoder>,
    ) -> Box<dyn RenderPass<'encoder> + 'encoder> {
        self.commands.push(RecordedCommand::BeginRenderPass {
            label: descriptor.label.map(str::to_string),
            color_attachments: descriptor.color_attachments.iter().map(|a| a.view).collect(),
            color_clears: descriptor
                .color_attachments
                .iter()
                .map(|a| match a.ops.load {
                    LoadOp::Clear(color) => Some(color),
                    LoadOp::Load => None,
                })
                .collect(),
            depth_attachment: descriptor.depth_stencil_attachment.map(|d| d.view),
        });
        Box::new(MockRenderPass {
            commands: &mut self.commands,
        })
    }

    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        descriptor: &ComputePassDescriptor<'encoder>,
    ) -> Box<dyn ComputePass<'encoder> + 'encoder> {
        self.commands.push(RecordedCommand::BeginComputePass {
            label: descriptor.label.map(str::to_string),
        });
        Box::new(MockComputePass {
            commands: &mut self.commands,
        })
    }

    fn memory_barrier(&mut self, flags: BarrierFlags) {
        self.commands.push(RecordedCommand::MemoryBarrier(flags));
    }

    fn copy_buffer_to_buffer(
        &mut self,
        source: BufferId,
        _source_offset: u64,
        destination: BufferId,
        _destination_offset: u64,
        size: u64,
    ) {
        self.commands.push(RecordedCommand::CopyBufferToBuffer {
            source,
            destination,
            size,
        });
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        let this = *self;
        let mut state = match this.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.pending.insert(this.id, this.commands);
        CommandBufferId(this.id)
    }
}
