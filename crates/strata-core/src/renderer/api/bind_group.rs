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

//! Resource bindings.
//!
//! A bind group is created against a linked program; the backend derives the
//! layout from the program's reflected bindings, so every binding the
//! program's stages use must be supplied.

use super::buffer::BufferId;
use super::shader::ProgramId;
use super::texture::TextureViewId;
use std::borrow::Cow;

/// An opaque handle to a bind group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupId(pub usize);

/// A resource bound at one binding index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingResource {
    /// A whole uniform or storage buffer.
    Buffer(BufferId),
    /// A sampled texture view, read with integer texel loads.
    TextureView(TextureViewId),
}

/// One entry of a bind group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindGroupEntry {
    /// The `@binding` index in group 0.
    pub binding: u32,
    /// The bound resource.
    pub resource: BindingResource,
}

impl BindGroupEntry {
    /// Binds a buffer.
    pub const fn buffer(binding: u32, buffer: BufferId) -> Self {
        Self {
            binding,
            resource: BindingResource::Buffer(buffer),
        }
    }

    /// Binds a texture view.
    pub const fn texture(binding: u32, view: TextureViewId) -> Self {
        Self {
            binding,
            resource: BindingResource::TextureView(view),
        }
    }
}

/// A descriptor for a bind group.
#[derive(Debug, Clone)]
pub struct BindGroupDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The program whose reflected layout the group conforms to.
    pub program: ProgramId,
    /// The bound resources.
    pub entries: &'a [BindGroupEntry],
}
