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

//! Conversions from the engine's renderer types to wgpu types.

use strata_core::renderer::api::{
    AdapterDeviceType, BlendMode, BufferUsage, Color, ColorWrites, CompareFunction, CullMode,
    IndexFormat, LoadOp, Operations, ShaderStage, StoreOp, TextureFormat, TextureUsage,
    TextureViewDimension, VertexFormat, VertexStepMode,
};

/// A local extension trait to convert engine types into wgpu types.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_wgpu()` syntax.
pub trait IntoWgpu<T> {
    /// Consumes self and converts it into a wgpu type.
    fn into_wgpu(self) -> T;
}

impl IntoWgpu<wgpu::TextureFormat> for TextureFormat {
    fn into_wgpu(self) -> wgpu::TextureFormat {
        match self {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
            TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
            TextureFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
        }
    }
}

/// Maps a surface format back to the engine's format, if the engine knows it.
pub fn from_wgpu_texture_format(format: wgpu::TextureFormat) -> Option<TextureFormat> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm => Some(TextureFormat::Rgba8Unorm),
        wgpu::TextureFormat::Rgba8UnormSrgb => Some(TextureFormat::Rgba8UnormSrgb),
        wgpu::TextureFormat::Bgra8Unorm => Some(TextureFormat::Bgra8Unorm),
        wgpu::TextureFormat::Bgra8UnormSrgb => Some(TextureFormat::Bgra8UnormSrgb),
        wgpu::TextureFormat::Rgba16Float => Some(TextureFormat::Rgba16Float),
        wgpu::TextureFormat::R32Float => Some(TextureFormat::R32Float),
        wgpu::TextureFormat::Depth32Float => Some(TextureFormat::Depth32Float),
        wgpu::TextureFormat::Depth24PlusStencil8 => Some(TextureFormat::Depth24PlusStencil8),
        _ => None,
    }
}

impl IntoWgpu<wgpu::TextureUsages> for TextureUsage {
    fn into_wgpu(self) -> wgpu::TextureUsages {
        let mut usages = wgpu::TextureUsages::empty();
        for (ours, theirs) in [
            (TextureUsage::COPY_SRC, wgpu::TextureUsages::COPY_SRC),
            (TextureUsage::COPY_DST, wgpu::TextureUsages::COPY_DST),
            (TextureUsage::TEXTURE_BINDING, wgpu::TextureUsages::TEXTURE_BINDING),
            (TextureUsage::RENDER_ATTACHMENT, wgpu::TextureUsages::RENDER_ATTACHMENT),
        ] {
            if self.contains(ours) {
                usages |= theirs;
            }
        }
        usages
    }
}

impl IntoWgpu<wgpu::BufferUsages> for BufferUsage {
    fn into_wgpu(self) -> wgpu::BufferUsages {
        let mut usages = wgpu::BufferUsages::empty();
        for (ours, theirs) in [
            (BufferUsage::MAP_READ, wgpu::BufferUsages::MAP_READ),
            (BufferUsage::COPY_SRC, wgpu::BufferUsages::COPY_SRC),
            (BufferUsage::COPY_DST, wgpu::BufferUsages::COPY_DST),
            (BufferUsage::VERTEX, wgpu::BufferUsages::VERTEX),
            (BufferUsage::INDEX, wgpu::BufferUsages::INDEX),
            (BufferUsage::UNIFORM, wgpu::BufferUsages::UNIFORM),
            (BufferUsage::STORAGE, wgpu::BufferUsages::STORAGE),
        ] {
            if self.contains(ours) {
                usages |= theirs;
            }
        }
        usages
    }
}

impl IntoWgpu<wgpu::TextureViewDimension> for TextureViewDimension {
    fn into_wgpu(self) -> wgpu::TextureViewDimension {
        match self {
            TextureViewDimension::D2 => wgpu::TextureViewDimension::D2,
            TextureViewDimension::D2Array => wgpu::TextureViewDimension::D2Array,
        }
    }
}

impl IntoWgpu<wgpu::VertexFormat> for VertexFormat {
    fn into_wgpu(self) -> wgpu::VertexFormat {
        match self {
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
        }
    }
}

impl IntoWgpu<wgpu::VertexStepMode> for VertexStepMode {
    fn into_wgpu(self) -> wgpu::VertexStepMode {
        match self {
            VertexStepMode::Vertex => wgpu::VertexStepMode::Vertex,
            VertexStepMode::Instance => wgpu::VertexStepMode::Instance,
        }
    }
}

impl IntoWgpu<Option<wgpu::Face>> for CullMode {
    fn into_wgpu(self) -> Option<wgpu::Face> {
        match self {
            CullMode::None => None,
            CullMode::Front => Some(wgpu::Face::Front),
            CullMode::Back => Some(wgpu::Face::Back),
        }
    }
}

impl IntoWgpu<wgpu::CompareFunction> for CompareFunction {
    fn into_wgpu(self) -> wgpu::CompareFunction {
        match self {
            CompareFunction::Never => wgpu::CompareFunction::Never,
            CompareFunction::Less => wgpu::CompareFunction::Less,
            CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
            CompareFunction::Greater => wgpu::CompareFunction::Greater,
            CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            CompareFunction::Always => wgpu::CompareFunction::Always,
        }
    }
}

impl IntoWgpu<wgpu::BlendState> for BlendMode {
    fn into_wgpu(self) -> wgpu::BlendState {
        match self {
            BlendMode::Additive => {
                let add = wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                };
                wgpu::BlendState {
                    color: add,
                    alpha: add,
                }
            }
        }
    }
}

impl IntoWgpu<wgpu::ColorWrites> for ColorWrites {
    fn into_wgpu(self) -> wgpu::ColorWrites {
        let mut writes = wgpu::ColorWrites::empty();
        for (ours, theirs) in [
            (ColorWrites::RED, wgpu::ColorWrites::RED),
            (ColorWrites::GREEN, wgpu::ColorWrites::GREEN),
            (ColorWrites::BLUE, wgpu::ColorWrites::BLUE),
            (ColorWrites::ALPHA, wgpu::ColorWrites::ALPHA),
        ] {
            if self.contains(ours) {
                writes |= theirs;
            }
        }
        writes
    }
}

impl IntoWgpu<wgpu::IndexFormat> for IndexFormat {
    fn into_wgpu(self) -> wgpu::IndexFormat {
        match self {
            IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
            IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
        }
    }
}

impl IntoWgpu<wgpu::ShaderStages> for ShaderStage {
    fn into_wgpu(self) -> wgpu::ShaderStages {
        match self {
            ShaderStage::Vertex => wgpu::ShaderStages::VERTEX,
            ShaderStage::Fragment => wgpu::ShaderStages::FRAGMENT,
            ShaderStage::Compute => wgpu::ShaderStages::COMPUTE,
        }
    }
}

impl IntoWgpu<naga::ShaderStage> for ShaderStage {
    fn into_wgpu(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
            ShaderStage::Compute => naga::ShaderStage::Compute,
        }
    }
}

// --- Pass operations ---

impl IntoWgpu<wgpu::Color> for Color {
    fn into_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r,
            g: self.g,
            b: self.b,
            a: self.a,
        }
    }
}

impl IntoWgpu<f32> for f32 {
    fn into_wgpu(self) -> f32 {
        self
    }
}

impl IntoWgpu<u32> for u32 {
    fn into_wgpu(self) -> u32 {
        self
    }
}

impl<V: IntoWgpu<W>, W> IntoWgpu<wgpu::Operations<W>> for Operations<V> {
    fn into_wgpu(self) -> wgpu::Operations<W> {
        wgpu::Operations {
            load: match self.load {
                LoadOp::Load => wgpu::LoadOp::Load,
                LoadOp::Clear(value) => wgpu::LoadOp::Clear(value.into_wgpu()),
            },
            store: match self.store {
                StoreOp::Store => wgpu::StoreOp::Store,
                StoreOp::Discard => wgpu::StoreOp::Discard,
            },
        }
    }
}

/// Maps wgpu's adapter type to the engine's.
pub fn from_wgpu_device_type(device_type: wgpu::DeviceType) -> AdapterDeviceType {
    match device_type {
        wgpu::DeviceType::IntegratedGpu => AdapterDeviceType::IntegratedGpu,
        wgpu::DeviceType::DiscreteGpu => AdapterDeviceType::DiscreteGpu,
        wgpu::DeviceType::VirtualGpu => AdapterDeviceType::VirtualGpu,
        wgpu::DeviceType::Cpu => AdapterDeviceType::Cpu,
        _ => AdapterDeviceType::Unknown,
    }
}

/// Returns a human-readable name for a backend.
pub fn backend_name(backend: wgpu::Backend) -> &'static str {
    match backend {
        wgpu::Backend::Vulkan => "Vulkan",
        wgpu::Backend::Metal => "Metal",
        wgpu::Backend::Dx12 => "DirectX 12",
        wgpu::Backend::Gl => "OpenGL",
        wgpu::Backend::BrowserWebGpu => "WebGPU",
        _ => "No-op",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_formats_round_trip() {
        for format in [
            TextureFormat::Rgba8Unorm,
            TextureFormat::Bgra8Unorm,
            TextureFormat::Rgba16Float,
            TextureFormat::R32Float,
            TextureFormat::Depth32Float,
            TextureFormat::Depth24PlusStencil8,
        ] {
            assert_eq!(from_wgpu_texture_format(format.into_wgpu()), Some(format));
        }
        assert_eq!(from_wgpu_texture_format(wgpu::TextureFormat::Rg8Unorm), None);
    }

    #[test]
    fn usage_flags_map_bit_by_bit() {
        let usage: wgpu::BufferUsages = (BufferUsage::STORAGE | BufferUsage::COPY_SRC).into_wgpu();
        assert_eq!(usage, wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC);

        let usage: wgpu::TextureUsages =
            (TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING).into_wgpu();
        assert_eq!(
            usage,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        );
    }

    #[test]
    fn culling_and_blending() {
        let none: Option<wgpu::Face> = CullMode::None.into_wgpu();
        assert_eq!(none, None);
        let front: Option<wgpu::Face> = CullMode::Front.into_wgpu();
        assert_eq!(front, Some(wgpu::Face::Front));

        let blend: wgpu::BlendState = BlendMode::Additive.into_wgpu();
        assert_eq!(blend.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(blend.alpha.dst_factor, wgpu::BlendFactor::One);
    }

    #[test]
    fn clear_operations_carry_their_value() {
        let ops: wgpu::Operations<f32> = Operations::clear(1.0f32).into_wgpu();
        assert!(matches!(ops.load, wgpu::LoadOp::Clear(v) if v == 1.0));
        assert!(matches!(ops.store, wgpu::StoreOp::Store));

        let ops: wgpu::Operations<wgpu::Color> = Operations::<Color>::load().into_wgpu();
        assert!(matches!(ops.load, wgpu::LoadOp::Load));
    }
}
