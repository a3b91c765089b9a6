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

//! Linked GPU programs and their uniform blocks.
//!
//! A [`ShaderProgram`] is built from WGSL sources in one call; a build or link
//! failure is returned as an error and the caller abandons whatever it was
//! constructing. Uniform members are addressed by name. A name the program
//! does not use yields no location, and writes through a missing location are
//! silently ignored.

use crate::renderer::api::*;
use crate::renderer::error::{ResourceError, ShaderError};
use crate::renderer::resources::GpuResource;
use crate::renderer::traits::GraphicsDevice;
use bytemuck::Pod;
use std::path::Path;
use std::sync::Arc;

/// An owned, linked program.
#[derive(Debug)]
pub struct ShaderProgram {
    program: GpuResource<ProgramId>,
    label: String,
}

impl ShaderProgram {
    fn compile(
        device: &Arc<dyn GraphicsDevice>,
        stage: ShaderStage,
        label: &str,
        code: &str,
    ) -> Result<GpuResource<ShaderModuleId>, ResourceError> {
        let id = device.compile_shader(stage, &ShaderSource::new(label, code))?;
        Ok(GpuResource::from_raw(device.clone(), id))
    }

    fn link(
        device: &Arc<dyn GraphicsDevice>,
        label: &str,
        stages: ProgramStages,
    ) -> Result<Self, ResourceError> {
        let id = device.link_program(&ProgramDescriptor {
            label: Some(label.into()),
            stages,
        })?;
        log::debug!("ShaderProgram: linked '{label}'");
        Ok(Self {
            program: GpuResource::from_raw(device.clone(), id),
            label: label.to_string(),
        })
    }

    /// Compiles and links a raster program.
    ///
    /// `fragment` may be `None` for depth-only programs. Both stages may live
    /// in the same source string.
    pub fn build(
        device: &Arc<dyn GraphicsDevice>,
        label: &str,
        vertex: &str,
        fragment: Option<&str>,
    ) -> Result<Self, ResourceError> {
        let vs = Self::compile(device, ShaderStage::Vertex, label, vertex)?;
        let fs = fragment
            .map(|code| Self::compile(device, ShaderStage::Fragment, label, code))
            .transpose()?;
        Self::link(
            device,
            label,
            ProgramStages::Graphics {
                vertex: vs.id(),
                fragment: fs.as_ref().map(GpuResource::id),
            },
        )
    }

    /// Compiles and links a compute program.
    pub fn build_compute(
        device: &Arc<dyn GraphicsDevice>,
        label: &str,
        source: &str,
    ) -> Result<Self, ResourceError> {
        let cs = Self::compile(device, ShaderStage::Compute, label, source)?;
        Self::link(device, label, ProgramStages::Compute { compute: cs.id() })
    }

    /// Reads both stages from disk and builds a raster program.
    pub fn build_from_files(
        device: &Arc<dyn GraphicsDevice>,
        label: &str,
        vertex_path: &Path,
        fragment_path: Option<&Path>,
    ) -> Result<Self, ResourceError> {
        let vertex = read_source(vertex_path)?;
        let fragment = fragment_path.map(read_source).transpose()?;
        Self::build(device, label, &vertex, fragment.as_deref())
    }

    /// The program handle, used when creating pipelines and bind groups.
    pub fn id(&self) -> ProgramId {
        self.program.id()
    }

    /// The label the program was built with.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Looks up a uniform block member.
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        let location = self.program.device().uniform_location(self.id(), name);
        if location.is_none() {
            log::debug!("ShaderProgram: '{}' has no uniform '{name}'", self.label);
        }
        location
    }

    /// A zeroed CPU staging block sized to the program's uniform block.
    pub fn uniform_block(&self) -> UniformBlock {
        let size = self
            .program
            .device()
            .uniform_block_size(self.id())
            .unwrap_or(0);
        UniformBlock::new(size as usize)
    }
}

/// Reads a WGSL file into a string.
pub fn read_source(path: &Path) -> Result<String, ResourceError> {
    std::fs::read_to_string(path).map_err(|e| {
        ShaderError::LoadError {
            path: path.display().to_string(),
            source_error: e.to_string(),
        }
        .into()
    })
}

/// CPU staging bytes for one uniform block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UniformBlock {
    data: Vec<u8>,
}

impl UniformBlock {
    /// A zeroed block of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    /// Writes `value` at `location`.
    ///
    /// A missing location does nothing. Writes are truncated to the member
    /// size, and writes past the end of the block are skipped.
    pub fn set<T: Pod>(&mut self, location: Option<UniformLocation>, value: &T) {
        let Some(location) = location else {
            return;
        };
        let bytes = bytemuck::bytes_of(value);
        let len = bytes.len().min(location.size as usize);
        let start = location.offset as usize;
        let Some(dst) = self.data.get_mut(start..start + len) else {
            log::trace!("UniformBlock: write at {start}+{len} outside block");
            return;
        };
        dst.copy_from_slice(&bytes[..len]);
    }

    /// The staged bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` for a zero-sized block.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
