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

//! A program bundled with its CPU uniform block and the buffer it is uploaded to.

use bytemuck::Pod;
use std::collections::HashMap;
use std::sync::Arc;
use strata_core::renderer::api::{
    BindGroupDescriptor, BindGroupEntry, BufferDescriptor, BufferId, BufferUsage, ProgramId,
    UniformLocation, UNIFORM_BLOCK_BINDING,
};
use strata_core::renderer::{
    GpuBindGroup, GpuBuffer, GraphicsDevice, ResourceError, ShaderProgram, UniformBlock,
};

/// Uniform blocks are never smaller than one `vec4`.
const MIN_UNIFORM_SIZE: u64 = 16;

/// A linked program plus the uniform buffer bound at binding 0.
#[derive(Debug)]
pub struct BoundProgram {
    program: ShaderProgram,
    block: UniformBlock,
    buffer: GpuBuffer,
    locations: HashMap<&'static str, Option<UniformLocation>>,
}

impl BoundProgram {
    /// Allocates the uniform buffer for `program`.
    pub fn new(
        device: &Arc<dyn GraphicsDevice>,
        program: ShaderProgram,
    ) -> Result<Self, ResourceError> {
        let block = program.uniform_block();
        let buffer = GpuBuffer::create(
            device,
            &BufferDescriptor {
                label: Some(format!("{}_uniforms", program.label()).into()),
                size: (block.len() as u64).max(MIN_UNIFORM_SIZE),
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            },
        )?;
        Ok(Self {
            program,
            block,
            buffer,
            locations: HashMap::new(),
        })
    }

    /// Stages a uniform member. Names the program does not use are ignored.
    pub fn set<T: Pod>(&mut self, name: &'static str, value: &T) {
        let program = &self.program;
        let location = *self
            .locations
            .entry(name)
            .or_insert_with(|| program.uniform_location(name));
        self.block.set(location, value);
    }

    /// Writes the staged block to the uniform buffer.
    pub fn upload(&self) -> Result<(), ResourceError> {
        if self.block.is_empty() {
            return Ok(());
        }
        self.buffer.write(0, self.block.as_bytes())
    }

    /// The program handle.
    pub fn id(&self) -> ProgramId {
        self.program.id()
    }

    /// The program's label.
    pub fn label(&self) -> &str {
        self.program.label()
    }

    /// The buffer to bind at binding 0.
    pub fn uniform_buffer(&self) -> BufferId {
        self.buffer.id()
    }

    /// Creates a bind group with the uniform buffer at binding 0 followed by `entries`.
    pub fn bind(
        &self,
        device: &Arc<dyn GraphicsDevice>,
        entries: &[BindGroupEntry],
    ) -> Result<GpuBindGroup, ResourceError> {
        let mut all = Vec::with_capacity(entries.len() + 1);
        all.push(BindGroupEntry::buffer(UNIFORM_BLOCK_BINDING, self.buffer.id()));
        all.extend_from_slice(entries);
        GpuBindGroup::create(
            device,
            &BindGroupDescriptor {
                label: Some(format!("{}_bindings", self.program.label()).into()),
                program: self.program.id(),
                entries: &all,
            },
        )
    }

    /// The staged bytes.
    pub fn staged(&self) -> &[u8] {
        self.block.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::testing::MockGraphicsDevice;

    #[test]
    fn upload_writes_staged_members() {
        let mock = Arc::new(MockGraphicsDevice::new());
        let device: Arc<dyn GraphicsDevice> = mock.clone();
        let program = ShaderProgram::build(&device, "simple", "vs", Some("fs")).unwrap();
        let mut bound = BoundProgram::new(&device, program).unwrap();
        bound.set("ambient", &[0.5f32, 0.25, 0.125, 1.0]);
        bound.upload().unwrap();

        let location = device.uniform_location(bound.id(), "ambient").unwrap();
        let contents = mock.buffer_contents(bound.uniform_buffer()).unwrap();
        let start = location.offset as usize;
        let value: [f32; 4] = bytemuck::pod_read_unaligned(&contents[start..start + 16]);
        assert_eq!(value, [0.5, 0.25, 0.125, 1.0]);
    }
}
