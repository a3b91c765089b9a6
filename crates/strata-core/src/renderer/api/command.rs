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

//! Descriptors for recording render and compute passes.

use super::texture::TextureViewId;
use crate::strata_bitflags;

/// An opaque handle to a finished, not yet submitted command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBufferId(pub u64);

/// A linear RGBA color with `f64` channels, used for clears.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    /// Red.
    pub r: f64,
    /// Green.
    pub g: f64,
    /// Blue.
    pub b: f64,
    /// Alpha.
    pub a: f64,
}

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    /// Builds an opaque color from three `f32` channels.
    pub fn from_rgb(rgb: [f32; 3]) -> Self {
        Self {
            r: rgb[0] as f64,
            g: rgb[1] as f64,
            b: rgb[2] as f64,
            a: 1.0,
        }
    }
}

/// What happens to an attachment at the start of a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp<V> {
    /// Keep the previous contents.
    Load,
    /// Clear to the given value.
    Clear(V),
}

/// What happens to an attachment at the end of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreOp {
    /// Keep the rendered contents.
    #[default]
    Store,
    /// Contents may be discarded.
    Discard,
}

/// Load and store operations for one attachment aspect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Operations<V> {
    /// Load operation.
    pub load: LoadOp<V>,
    /// Store operation.
    pub store: StoreOp,
}

impl<V> Operations<V> {
    /// Clears then stores.
    pub const fn clear(value: V) -> Self {
        Self {
            load: LoadOp::Clear(value),
            store: StoreOp::Store,
        }
    }

    /// Loads then stores.
    pub const fn load() -> Self {
        Self {
            load: LoadOp::Load,
            store: StoreOp::Store,
        }
    }
}

/// A color attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassColorAttachment {
    /// The view rendered into.
    pub view: TextureViewId,
    /// Load/store operations.
    pub ops: Operations<Color>,
}

/// The depth-stencil attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassDepthStencilAttachment {
    /// The view rendered into.
    pub view: TextureViewId,
    /// Depth operations, `None` if the depth aspect is untouched.
    pub depth_ops: Option<Operations<f32>>,
    /// Stencil operations, `None` if the stencil aspect is untouched.
    pub stencil_ops: Option<Operations<u32>>,
}

/// A descriptor for beginning a render pass.
#[derive(Debug, Clone, Default)]
pub struct RenderPassDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<&'a str>,
    /// Color attachments, in `@location` order.
    pub color_attachments: &'a [RenderPassColorAttachment],
    /// The optional depth-stencil attachment.
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment>,
}

/// A descriptor for beginning a compute pass.
#[derive(Debug, Clone, Default)]
pub struct ComputePassDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<&'a str>,
}

strata_bitflags! {
    /// Which later reads a memory barrier makes earlier writes visible to.
    pub struct BarrierFlags: u32 {
        /// Texture fetches of previously rendered attachments.
        const TEXTURE_FETCH = 1 << 0;
        /// Shader-storage buffer reads of previous compute writes.
        const SHADER_STORAGE = 1 << 1;
    }
}
