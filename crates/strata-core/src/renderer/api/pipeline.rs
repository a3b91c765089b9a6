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

//! Pipeline state objects.
//!
//! A render pipeline bakes a linked program together with the fixed-function
//! state a pass needs: culling, depth test and write, depth bias, blending
//! and color write masks.

use super::shader::ProgramId;
use super::texture::TextureFormat;
use crate::strata_bitflags;
use std::borrow::Cow;

/// An opaque handle to a render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPipelineId(pub usize);

/// An opaque handle to a compute pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComputePipelineId(pub usize);

/// The data type of one vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// Two 32-bit floats.
    Float32x2,
    /// Three 32-bit floats.
    Float32x3,
    /// Four 32-bit floats.
    Float32x4,
}

/// Whether a vertex buffer advances per vertex or per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexStepMode {
    /// Advance once per vertex.
    #[default]
    Vertex,
    /// Advance once per instance.
    Instance,
}

/// One attribute inside a vertex buffer layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttributeDescriptor {
    /// The attribute's data type.
    pub format: VertexFormat,
    /// Byte offset from the start of the vertex.
    pub offset: u64,
    /// The `@location` the attribute feeds.
    pub shader_location: u32,
}

/// The memory layout of one vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexBufferLayoutDescriptor<'a> {
    /// Distance in bytes between consecutive elements.
    pub array_stride: u64,
    /// Step mode of the buffer.
    pub step_mode: VertexStepMode,
    /// The attributes read from each element.
    pub attributes: Cow<'a, [VertexAttributeDescriptor]>,
}

/// Which triangle faces are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Draw both faces.
    #[default]
    None,
    /// Discard front faces.
    Front,
    /// Discard back faces.
    Back,
}

/// The comparison used by the depth test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// Passes if the incoming value is less than the stored one.
    Less,
    /// Passes if the incoming value is less than or equal to the stored one.
    LessEqual,
    /// Passes if the incoming value is greater than the stored one.
    Greater,
    /// Passes if the incoming value is greater than or equal to the stored one.
    GreaterEqual,
    /// Always passes.
    Always,
}

/// A constant plus slope-scaled depth offset applied while rasterizing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DepthBias {
    /// Constant offset in depth units.
    pub constant: i32,
    /// Offset scaled by the polygon's depth slope.
    pub slope_scale: f32,
}

/// Depth attachment state of a render pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilState {
    /// Format of the attached depth texture.
    pub format: TextureFormat,
    /// Whether passing fragments write their depth.
    pub depth_write_enabled: bool,
    /// The depth comparison.
    pub depth_compare: CompareFunction,
    /// Rasterization depth bias.
    pub bias: DepthBias,
}

/// A blend equation preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// `src * 1 + dst * 1` on color and alpha.
    Additive,
}

strata_bitflags! {
    /// Which color channels a target writes.
    pub struct ColorWrites: u32 {
        /// Red.
        const RED = 1 << 0;
        /// Green.
        const GREEN = 1 << 1;
        /// Blue.
        const BLUE = 1 << 2;
        /// Alpha.
        const ALPHA = 1 << 3;
        /// All channels.
        const ALL = 0b1111;
    }
}

/// One color target of a render pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTargetState {
    /// The target's texel format.
    pub format: TextureFormat,
    /// Optional blending. `None` replaces the destination.
    pub blend: Option<BlendMode>,
    /// Channel write mask.
    pub write_mask: ColorWrites,
}

impl ColorTargetState {
    /// A target written without blending.
    pub const fn replace(format: TextureFormat) -> Self {
        Self {
            format,
            blend: None,
            write_mask: ColorWrites::ALL,
        }
    }

    /// A target accumulated with `one + one` blending.
    pub const fn additive(format: TextureFormat) -> Self {
        Self {
            format,
            blend: Some(BlendMode::Additive),
            write_mask: ColorWrites::ALL,
        }
    }
}

/// A descriptor for a render pipeline.
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The linked graphics program.
    pub program: ProgramId,
    /// Vertex buffer layouts. Empty for full-screen passes that synthesize
    /// their vertices from the vertex index.
    pub vertex_buffers: Cow<'a, [VertexBufferLayoutDescriptor<'a>]>,
    /// Face culling.
    pub cull_mode: CullMode,
    /// Depth attachment state, if the pass has a depth attachment.
    pub depth_stencil: Option<DepthStencilState>,
    /// Color targets, one per color attachment of the pass.
    pub color_targets: Cow<'a, [ColorTargetState]>,
}

/// A descriptor for a compute pipeline.
#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The linked compute program.
    pub program: ProgramId,
}
