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

use std::ops::Range;
use strata_core::renderer::api::{
    BarrierFlags, BindGroupId, BufferId, CommandBufferId, ComputePassDescriptor,
    ComputePipelineId, IndexFormat, RenderPassDescriptor, RenderPipelineId,
};
use strata_core::renderer::traits::{CommandEncoder, ComputePass, RenderPass};

use super::conversions::IntoWgpu;
use super::device::WgpuDevice;

pub struct WgpuRenderPass<'a> {
    pass: wgpu::RenderPass<'a>,
    device: &'a WgpuDevice,
}

impl<'pass> RenderPass<'pass> for WgpuRenderPass<'pass> {
    fn set_pipeline(&mut self, pipeline_id: RenderPipelineId) {
        if let Some(pipeline) = self.device.wgpu_render_pipeline(pipeline_id) {
            self.pass.set_pipeline(&pipeline);
        } else {
            log::warn!("WgpuRenderPass: RenderPipelineId {pipeline_id:?} not found.");
        }
    }

    fn set_bind_group(&mut self, index: u32, bind_group_id: BindGroupId) {
        if let Some(bind_group) = self.device.wgpu_bind_group(bind_group_id) {
            self.pass.set_bind_group(index, bind_group.as_ref(), &[]);
        } else {
            log::warn!("WgpuRenderPass: BindGroupId {bind_group_id:?} not found.");
        }
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer_id: BufferId, offset: u64) {
        if let Some(buffer) = self.device.wgpu_buffer(buffer_id) {
            self.pass.set_vertex_buffer(slot, buffer.slice(offset..));
        } else {
            log::warn!("WgpuRenderPass: Vertex BufferId {buffer_id:?} not found.");
        }
    }

    fn set_index_buffer(&mut self, buffer_id: BufferId, offset: u64, index_format: IndexFormat) {
        if let Some(buffer) = self.device.wgpu_buffer(buffer_id) {
            self.pass
                .set_index_buffer(buffer.slice(offset..), index_format.into_wgpu());
        } else {
            log::warn!("WgpuRenderPass: Index BufferId {buffer_id:?} not found.");
        }
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.pass.draw(vertices, instances);
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.pass.draw_indexed(indices, base_vertex, instances);
    }
}

pub struct WgpuComputePass<'a> {
    pass: wgpu::ComputePass<'a>,
    device: &'a WgpuDevice,
}

impl<'pass> ComputePass<'pass> for WgpuComputePass<'pass> {
    fn set_pipeline(&mut self, pipeline_id: ComputePipelineId) {
        if let Some(pipeline) = self.device.wgpu_compute_pipeline(pipeline_id) {
            self.pass.set_pipeline(&pipeline);
        } else {
            log::warn!("WgpuComputePass: ComputePipelineId {pipeline_id:?} not found.");
        }
    }

    fn set_bind_group(&mut self, index: u32, bind_group_id: BindGroupId) {
        if let Some(bind_group) = self.device.wgpu_bind_group(bind_group_id) {
            self.pass.set_bind_group(index, bind_group.as_ref(), &[]);
        } else {
            log::warn!("WgpuComputePass: BindGroupId {bind_group_id:?} not found.");
        }
    }

    fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32) {
        self.pass.dispatch_workgroups(x, y, z);
    }
}

/// Records passes into a `wgpu::CommandEncoder`.
///
/// wgpu tracks hazards between passes itself, so barriers are only logged.
pub struct WgpuCommandEncoder {
    encoder: wgpu::CommandEncoder,
    device: WgpuDevice,
}

impl WgpuCommandEncoder {
    pub(crate) fn new(device: WgpuDevice, label: Option<&str>) -> Self {
        Self {
            encoder: device.create_wgpu_encoder(label),
            device,
        }
    }
}

impl CommandEncoder for WgpuCommandEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'encoder>,
    ) -> Box<dyn RenderPass<'encoder> + 'encoder> {
        // Views are resolved up front so the attachments can borrow them.
        let color_views: Vec<Option<wgpu::TextureView>> = descriptor
            .color_attachments
            .iter()
            .map(|att| {
                let view = self.device.wgpu_texture_view(att.view).map(|v| (*v).clone());
                if view.is_none() {
                    log::warn!(
                        "WgpuCommandEncoder: Color attachment view {:?} not found, skipping it.",
                        att.view
                    );
                }
                view
            })
            .collect();

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = descriptor
            .color_attachments
            .iter()
            .zip(color_views.iter())
            .map(|(att, view)| {
                view.as_ref().map(|view| wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: att.ops.into_wgpu(),
                    depth_slice: None,
                })
            })
            .collect();

        let depth_view: Option<wgpu::TextureView> = descriptor
            .depth_stencil_attachment
            .as_ref()
            .and_then(|ds| self.device.wgpu_texture_view(ds.view))
            .map(|v| (*v).clone());

        let depth_stencil_attachment = match (&descriptor.depth_stencil_attachment, &depth_view) {
            (Some(ds), Some(view)) => Some(wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: ds.depth_ops.map(IntoWgpu::into_wgpu),
                stencil_ops: ds.stencil_ops.map(IntoWgpu::into_wgpu),
            }),
            (Some(ds), None) => {
                log::warn!(
                    "WgpuCommandEncoder: Depth attachment view {:?} not found, skipping it.",
                    ds.view
                );
                None
            }
            _ => None,
        };

        let pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: descriptor.label,
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        Box::new(WgpuRenderPass {
            pass,
            device: &self.device,
        })
    }

    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        descriptor: &ComputePassDescriptor<'encoder>,
    ) -> Box<dyn ComputePass<'encoder> + 'encoder> {
        let pass = self
            .encoder
            .begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: descriptor.label,
                timestamp_writes: None,
            });

        Box::new(WgpuComputePass {
            pass,
            device: &self.device,
        })
    }

    fn memory_barrier(&mut self, flags: BarrierFlags) {
        log::trace!("WgpuCommandEncoder: memory barrier {flags:?}");
    }

    fn copy_buffer_to_buffer(
        &mut self,
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    ) {
        match (
            self.device.wgpu_buffer(source),
            self.device.wgpu_buffer(destination),
        ) {
            (Some(source_buffer), Some(destination_buffer)) => {
                self.encoder.copy_buffer_to_buffer(
                    &source_buffer,
                    source_offset,
                    &destination_buffer,
                    destination_offset,
                    size,
                );
            }
            _ => log::warn!(
                "WgpuCommandEncoder: Copy between {source:?} and {destination:?} skipped, buffer not found."
            ),
        }
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        let WgpuCommandEncoder { encoder, device } = *self;
        device.register_command_buffer(encoder.finish())
    }
}
