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

use crate::renderer::api::{
    BarrierFlags, BindGroupId, BufferId, CommandBufferId, ComputePassDescriptor,
    ComputePipelineId, IndexFormat, RenderPassDescriptor, RenderPipelineId,
};
use std::ops::Range;

/// A trait representing an active render pass, used for recording drawing commands.
///
/// A `RenderPass` object is obtained from a [`CommandEncoder`] and provides methods
/// to set pipeline state and issue draw calls. The `'pass` lifetime ties it to the
/// encoder that created it; the pass ends when the object is dropped.
pub trait RenderPass<'pass> {
    /// Sets the active render pipeline for subsequent draw calls.
    fn set_pipeline(&mut self, pipeline: RenderPipelineId);

    /// Binds a bind group at group index `index`.
    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId);

    /// Binds a vertex buffer to a specific slot.
    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64);

    /// Binds an index buffer for indexed drawing.
    fn set_index_buffer(&mut self, buffer: BufferId, offset: u64, index_format: IndexFormat);

    /// Records a non-indexed draw call.
    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>);

    /// Records an indexed draw call.
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);
}

/// A trait representing an active compute pass, used for recording dispatch commands.
pub trait ComputePass<'pass> {
    /// Sets the active compute pipeline for subsequent dispatches.
    fn set_pipeline(&mut self, pipeline: ComputePipelineId);

    /// Binds a bind group at group index `index`.
    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId);

    /// Dispatches `x * y * z` workgroups.
    fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32);
}

/// A trait for an object that records a sequence of GPU commands.
///
/// A `CommandEncoder` is the main tool for building a [`CommandBufferId`]. It creates
/// render and compute passes, and records commands that happen between passes,
/// such as buffer copies and memory barriers.
pub trait CommandEncoder {
    /// Begins a new render pass. Only one pass can be active at a time.
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'encoder>,
    ) -> Box<dyn RenderPass<'encoder> + 'encoder>;

    /// Begins a new compute pass.
    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        descriptor: &ComputePassDescriptor<'encoder>,
    ) -> Box<dyn ComputePass<'encoder> + 'encoder>;

    /// Makes writes of the previous passes visible to the reads named by `flags`.
    ///
    /// Backends that track hazards automatically may treat this as a marker, but
    /// callers must still record it between every producer and consumer pass.
    fn memory_barrier(&mut self, flags: BarrierFlags);

    /// Records a command to copy data from one buffer to another on the GPU.
    fn copy_buffer_to_buffer(
        &mut self,
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    );

    /// Finalizes the command recording and returns a handle to the resulting command buffer.
    fn finish(self: Box<Self>) -> CommandBufferId;
}
