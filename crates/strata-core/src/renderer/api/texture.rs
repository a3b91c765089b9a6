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

//! Defines data structures for texture and texture view resources.

use crate::strata_bitflags;
use std::borrow::Cow;

/// An opaque handle to a GPU texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub usize);

/// An opaque handle to a view over a texture (or over the swapchain image).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureViewId(pub usize);

/// The texel formats the renderer allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA, linear. Used for albedo + metallic.
    Rgba8Unorm,
    /// 8-bit RGBA, sRGB-encoded.
    Rgba8UnormSrgb,
    /// 8-bit BGRA, linear. A common swapchain format.
    Bgra8Unorm,
    /// 8-bit BGRA, sRGB-encoded. A common swapchain format.
    Bgra8UnormSrgb,
    /// 16-bit float RGBA. Used for normals and HDR accumulation.
    Rgba16Float,
    /// 32-bit float single channel. Used for linear depth copies.
    R32Float,
    /// 32-bit float depth. Used for shadow maps.
    Depth32Float,
    /// Combined 24-bit depth and 8-bit stencil.
    Depth24PlusStencil8,
}

impl TextureFormat {
    /// Returns `true` for depth or depth-stencil formats.
    pub const fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::Depth32Float | TextureFormat::Depth24PlusStencil8
        )
    }

    /// Returns `true` if the format carries a stencil aspect.
    pub const fn has_stencil(&self) -> bool {
        matches!(self, TextureFormat::Depth24PlusStencil8)
    }

    /// Returns `true` if the format can be used as a color attachment.
    pub const fn is_color_renderable(&self) -> bool {
        !self.is_depth()
    }

    /// Size of one texel in bytes, used for memory accounting.
    pub const fn bytes_per_texel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::R32Float
            | TextureFormat::Depth32Float
            | TextureFormat::Depth24PlusStencil8 => 4,
            TextureFormat::Rgba16Float => 8,
        }
    }
}

strata_bitflags! {
    /// How a texture will be used.
    pub struct TextureUsage: u32 {
        /// The texture can be the source of a copy.
        const COPY_SRC = 1 << 0;
        /// The texture can be the destination of a copy.
        const COPY_DST = 1 << 1;
        /// The texture can be bound for shader reads.
        const TEXTURE_BINDING = 1 << 2;
        /// The texture can be attached to a render pass.
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

/// A descriptor used to create a [`TextureId`].
///
/// All textures are two-dimensional; `array_layers` greater than one creates
/// a layered texture (shadow cascades, spot maps, cube faces).
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Number of array layers.
    pub array_layers: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Allowed usages.
    pub usage: TextureUsage,
}

impl TextureDescriptor<'_> {
    /// Approximate size of the allocation in bytes.
    pub fn size_in_bytes(&self) -> u64 {
        self.width as u64
            * self.height as u64
            * self.array_layers.max(1) as u64
            * self.format.bytes_per_texel() as u64
    }
}

/// The dimensionality a texture view exposes to shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureViewDimension {
    /// A single 2D layer.
    D2,
    /// A range of 2D layers addressed by index.
    D2Array,
}

/// A descriptor used to create a [`TextureViewId`].
#[derive(Debug, Clone, Default)]
pub struct TextureViewDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The view dimension. `None` lets the backend infer it.
    pub dimension: Option<TextureViewDimension>,
    /// First array layer visible through the view.
    pub base_array_layer: u32,
    /// Number of visible layers. `None` means all remaining layers.
    pub array_layer_count: Option<u32>,
}

impl<'a> TextureViewDescriptor<'a> {
    /// A view over a single layer, suitable as a render attachment.
    pub fn single_layer(label: impl Into<Cow<'a, str>>, layer: u32) -> Self {
        Self {
            label: Some(label.into()),
            dimension: Some(TextureViewDimension::D2),
            base_array_layer: layer,
            array_layer_count: Some(1),
        }
    }

    /// A view over every layer, suitable for array sampling.
    pub fn all_layers(label: impl Into<Cow<'a, str>>) -> Self {
        Self {
            label: Some(label.into()),
            dimension: Some(TextureViewDimension::D2Array),
            base_array_layer: 0,
            array_layer_count: None,
        }
    }
}
