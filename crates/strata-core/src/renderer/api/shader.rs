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

//! Types of the shader/program service.
//!
//! Shaders are compiled one stage at a time into a [`ShaderModuleId`] and then
//! linked into a [`ProgramId`]. A linked program exposes its binding-0 uniform
//! block through name-based [`UniformLocation`] lookups.

use std::borrow::Cow;

/// The conventional entry point name for vertex stages.
pub const VERTEX_ENTRY_POINT: &str = "vs_main";
/// The conventional entry point name for fragment stages.
pub const FRAGMENT_ENTRY_POINT: &str = "fs_main";
/// The conventional entry point name for compute stages.
pub const COMPUTE_ENTRY_POINT: &str = "cs_main";

/// The binding index reserved for a program's named uniform block.
pub const UNIFORM_BLOCK_BINDING: u32 = 0;

/// An opaque handle to a compiled shader stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderModuleId(pub usize);

/// An opaque handle to a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub usize);

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// The vertex stage.
    Vertex,
    /// The fragment stage.
    Fragment,
    /// The compute stage.
    Compute,
}

impl ShaderStage {
    /// Returns the conventional entry point name for this stage.
    pub const fn entry_point(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => VERTEX_ENTRY_POINT,
            ShaderStage::Fragment => FRAGMENT_ENTRY_POINT,
            ShaderStage::Compute => COMPUTE_ENTRY_POINT,
        }
    }
}

/// WGSL source text for one compilation.
#[derive(Debug, Clone)]
pub struct ShaderSource<'a> {
    /// A debug label, used in error messages.
    pub label: Cow<'a, str>,
    /// The WGSL code.
    pub code: Cow<'a, str>,
}

impl<'a> ShaderSource<'a> {
    /// Creates a source from a label and code.
    pub fn new(label: impl Into<Cow<'a, str>>, code: impl Into<Cow<'a, str>>) -> Self {
        Self {
            label: label.into(),
            code: code.into(),
        }
    }
}

/// The stages linked into a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramStages {
    /// A raster program: a vertex stage and an optional fragment stage.
    Graphics {
        /// The compiled vertex stage.
        vertex: ShaderModuleId,
        /// The compiled fragment stage, absent for depth-only programs.
        fragment: Option<ShaderModuleId>,
    },
    /// A compute program.
    Compute {
        /// The compiled compute stage.
        compute: ShaderModuleId,
    },
}

/// A descriptor for [`GraphicsDevice::link_program`](crate::renderer::GraphicsDevice::link_program).
#[derive(Debug, Clone)]
pub struct ProgramDescriptor<'a> {
    /// A debug label.
    pub label: Option<Cow<'a, str>>,
    /// The stages to link.
    pub stages: ProgramStages,
}

/// The byte range of a named member inside a program's uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    /// Byte offset from the start of the block.
    pub offset: u32,
    /// Size in bytes of the member.
    pub size: u32,
}
