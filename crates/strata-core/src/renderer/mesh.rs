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

//! Interleaved triangle meshes.
//!
//! [`MeshData`] builds geometry on the CPU; [`MeshBuffer`] owns its GPU copy.

use crate::math::Vec3;
use crate::renderer::api::*;
use crate::renderer::error::ResourceError;
use crate::renderer::resources::GpuBuffer;
use crate::renderer::traits::{GraphicsDevice, RenderPass};
use bytemuck::{Pod, Zeroable};
use std::borrow::Cow;
use std::f32::consts::{PI, TAU};
use std::ops::Range;
use std::sync::Arc;

/// One interleaved vertex: position, normal and color, nine floats.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position.
    pub position: [f32; 3],
    /// Object-space normal.
    pub normal: [f32; 3],
    /// Linear vertex color.
    pub color: [f32; 3],
}

const VERTEX_ATTRIBUTES: [VertexAttributeDescriptor; 3] = [
    VertexAttributeDescriptor {
        format: VertexFormat::Float32x3,
        offset: 0,
        shader_location: 0,
    },
    VertexAttributeDescriptor {
        format: VertexFormat::Float32x3,
        offset: 12,
        shader_location: 1,
    },
    VertexAttributeDescriptor {
        format: VertexFormat::Float32x3,
        offset: 24,
        shader_location: 2,
    },
];

impl Vertex {
    /// Creates a vertex.
    pub fn new(position: Vec3, normal: Vec3, color: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            color: color.to_array(),
        }
    }

    /// The vertex buffer layout, attributes at locations 0, 1 and 2.
    pub fn buffer_layout() -> VertexBufferLayoutDescriptor<'static> {
        VertexBufferLayoutDescriptor {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: VertexStepMode::Vertex,
            attributes: Cow::Borrowed(&VERTEX_ATTRIBUTES),
        }
    }
}

/// CPU-side geometry with 32-bit indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Vertices.
    pub vertices: Vec<Vertex>,
    /// Triangle list indices.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Appends a quad from four corners in counter-clockwise order.
    pub fn push_quad(&mut self, corners: [Vertex; 4]) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&corners);
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// A unit sphere centered on the origin, wound counter-clockwise seen
    /// from outside.
    pub fn sphere(stacks: u32, slices: u32) -> Self {
        let mut mesh = Self::default();
        for stack in 0..=stacks {
            let phi = stack as f32 / stacks as f32 * PI;
            let (r, y) = phi.sin_cos();
            for slice in 0..=slices {
                let theta = slice as f32 / slices as f32 * TAU;
                let p = Vec3::new(r * theta.cos(), y, r * theta.sin());
                mesh.vertices.push(Vertex::new(p, p, Vec3::ONE));
            }
        }
        let stride = slices + 1;
        for stack in 0..stacks {
            for slice in 0..slices {
                let a = stack * stride + slice;
                let b = (stack + 1) * stride + slice;
                let c = b + 1;
                let d = a + 1;
                mesh.indices.extend_from_slice(&[a, c, b, a, d, c]);
            }
        }
        mesh
    }

    /// A unit cone with its apex at the origin and a unit-radius base at `z = 1`.
    pub fn cone(slices: u32) -> Self {
        let mut mesh = Self::default();
        mesh.vertices
            .push(Vertex::new(Vec3::ZERO, Vec3::NEG_Z, Vec3::ONE));
        for i in 0..=slices {
            let theta = i as f32 / slices as f32 * TAU;
            let (y, x) = theta.sin_cos();
            mesh.vertices.push(Vertex::new(
                Vec3::new(x, y, 1.0),
                Vec3::new(x, y, 0.0),
                Vec3::ONE,
            ));
        }
        let center = mesh.vertices.len() as u32;
        mesh.vertices
            .push(Vertex::new(Vec3::Z, Vec3::Z, Vec3::ONE));
        for i in 0..slices {
            mesh.indices.extend_from_slice(&[0, i + 2, i + 1]);
        }
        for i in 0..slices {
            mesh.indices.extend_from_slice(&[center, i + 1, i + 2]);
        }
        mesh
    }
}

/// An uploaded, immutable mesh.
#[derive(Debug)]
pub struct MeshBuffer {
    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
    index_count: u32,
}

impl MeshBuffer {
    /// Uploads interleaved vertices and indices.
    ///
    /// # Errors
    /// [`ResourceError::EmptyMesh`] if either slice is empty.
    pub fn upload(
        device: &Arc<dyn GraphicsDevice>,
        label: &str,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<Self, ResourceError> {
        if vertices.is_empty() || indices.is_empty() {
            log::error!("MeshBuffer: '{label}' upload with empty data");
            return Err(ResourceError::EmptyMesh);
        }
        let vertex_buffer = GpuBuffer::create_with_data(
            device,
            &BufferDescriptor {
                label: Some(format!("{label}_vertices").into()),
                size: std::mem::size_of_val(vertices) as u64,
                usage: BufferUsage::VERTEX,
            },
            bytemuck::cast_slice(vertices),
        )?;
        let index_buffer = GpuBuffer::create_with_data(
            device,
            &BufferDescriptor {
                label: Some(format!("{label}_indices").into()),
                size: std::mem::size_of_val(indices) as u64,
                usage: BufferUsage::INDEX,
            },
            bytemuck::cast_slice(indices),
        )?;
        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        })
    }

    /// Uploads a [`MeshData`].
    pub fn from_data(
        device: &Arc<dyn GraphicsDevice>,
        label: &str,
        data: &MeshData,
    ) -> Result<Self, ResourceError> {
        Self::upload(device, label, &data.vertices, &data.indices)
    }

    /// Number of indices drawn.
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Draws the mesh once.
    pub fn draw(&self, pass: &mut dyn RenderPass<'_>) {
        self.draw_instanced(pass, 0..1);
    }

    /// Draws the mesh for every instance in `instances`.
    ///
    /// Shaders see the absolute instance index, so `instances.start` doubles
    /// as an offset into per-instance data.
    pub fn draw_instanced(&self, pass: &mut dyn RenderPass<'_>, instances: Range<u32>) {
        if instances.is_empty() {
            return;
        }
        pass.set_vertex_buffer(0, self.vertex_buffer.id(), 0);
        pass.set_index_buffer(self.index_buffer.id(), 0, IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, instances);
    }
}
