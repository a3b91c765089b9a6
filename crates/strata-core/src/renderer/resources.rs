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

//! Owning wrappers around device handles.
//!
//! Every wrapper holds the device it was created on and destroys its handle
//! exactly once, either through an explicit [`GpuResource::release`] or when
//! dropped. Releasing twice is a no-op.

use crate::math::Extent2D;
use crate::renderer::api::*;
use crate::renderer::error::ResourceError;
use crate::renderer::traits::GraphicsDevice;
use bytemuck::Pod;
use std::fmt;
use std::sync::Arc;

/// A handle type that knows how to destroy itself on a device.
pub trait GpuResourceId: Copy + fmt::Debug {
    /// A short name used in log messages.
    const KIND: &'static str;

    /// Hands the handle back to the device.
    fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError>;
}

macro_rules! impl_resource_id {
    ($($id:ty => $kind:literal, $destroy:ident;)*) => {
        $(
            impl GpuResourceId for $id {
                const KIND: &'static str = $kind;

                fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
                    device.$destroy(self)
                }
            }
        )*
    };
}

impl_resource_id! {
    BufferId => "buffer", destroy_buffer;
    TextureId => "texture", destroy_texture;
    TextureViewId => "texture view", destroy_texture_view;
    ShaderModuleId => "shader", destroy_shader;
    ProgramId => "program", destroy_program;
    RenderPipelineId => "render pipeline", destroy_render_pipeline;
    ComputePipelineId => "compute pipeline", destroy_compute_pipeline;
    BindGroupId => "bind group", destroy_bind_group;
}

/// Sole owner of one device handle.
pub struct GpuResource<I: GpuResourceId> {
    device: Arc<dyn GraphicsDevice>,
    id: I,
    live: bool,
}

/// An owned buffer.
pub type GpuBuffer = GpuResource<BufferId>;
/// An owned texture.
pub type GpuTexture = GpuResource<TextureId>;
/// An owned texture view.
pub type GpuTextureView = GpuResource<TextureViewId>;
/// An owned render pipeline.
pub type GpuRenderPipeline = GpuResource<RenderPipelineId>;
/// An owned compute pipeline.
pub type GpuComputePipeline = GpuResource<ComputePipelineId>;
/// An owned bind group.
pub type GpuBindGroup = GpuResource<BindGroupId>;

impl<I: GpuResourceId> GpuResource<I> {
    /// Takes ownership of a handle created on `device`.
    pub fn from_raw(device: Arc<dyn GraphicsDevice>, id: I) -> Self {
        Self {
            device,
            id,
            live: true,
        }
    }

    /// The wrapped handle. Stale after [`Self::release`].
    #[inline]
    pub fn id(&self) -> I {
        self.id
    }

    /// Returns `false` once the handle has been released.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// The device the handle belongs to.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// Destroys the handle now. Later calls do nothing.
    pub fn release(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        if let Err(e) = self.id.destroy(self.device.as_ref()) {
            log::warn!("GpuResource: failed to destroy {} {:?}: {}", I::KIND, self.id, e);
        }
    }
}

impl<I: GpuResourceId> Drop for GpuResource<I> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<I: GpuResourceId> fmt::Debug for GpuResource<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuResource")
            .field("kind", &I::KIND)
            .field("id", &self.id)
            .field("live", &self.live)
            .finish()
    }
}

impl GpuResource<BufferId> {
    /// Creates an uninitialized buffer.
    pub fn create(
        device: &Arc<dyn GraphicsDevice>,
        descriptor: &BufferDescriptor,
    ) -> Result<Self, ResourceError> {
        let id = device.create_buffer(descriptor)?;
        Ok(Self::from_raw(device.clone(), id))
    }

    /// Creates a buffer holding `data`.
    pub fn create_with_data(
        device: &Arc<dyn GraphicsDevice>,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<Self, ResourceError> {
        let id = device.create_buffer_with_data(descriptor, data)?;
        Ok(Self::from_raw(device.clone(), id))
    }

    /// Queues a write of `data` at `offset`.
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        self.device.write_buffer(self.id, offset, data)
    }
}

impl GpuResource<TextureId> {
    /// Creates a texture.
    pub fn create(
        device: &Arc<dyn GraphicsDevice>,
        descriptor: &TextureDescriptor,
    ) -> Result<Self, ResourceError> {
        let id = device.create_texture(descriptor)?;
        Ok(Self::from_raw(device.clone(), id))
    }

    /// Creates a view over this texture.
    pub fn create_view(
        &self,
        descriptor: &TextureViewDescriptor,
    ) -> Result<GpuTextureView, ResourceError> {
        let id = self.device.create_texture_view(self.id, descriptor)?;
        Ok(GpuResource::from_raw(self.device.clone(), id))
    }
}

impl GpuResource<RenderPipelineId> {
    /// Creates a render pipeline.
    pub fn create(
        device: &Arc<dyn GraphicsDevice>,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<Self, ResourceError> {
        let id = device.create_render_pipeline(descriptor)?;
        Ok(Self::from_raw(device.clone(), id))
    }
}

impl GpuResource<ComputePipelineId> {
    /// Creates a compute pipeline.
    pub fn create(
        device: &Arc<dyn GraphicsDevice>,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<Self, ResourceError> {
        let id = device.create_compute_pipeline(descriptor)?;
        Ok(Self::from_raw(device.clone(), id))
    }
}

impl GpuResource<BindGroupId> {
    /// Creates a bind group.
    pub fn create(
        device: &Arc<dyn GraphicsDevice>,
        descriptor: &BindGroupDescriptor,
    ) -> Result<Self, ResourceError> {
        let id = device.create_bind_group(descriptor)?;
        Ok(Self::from_raw(device.clone(), id))
    }
}

/// The attachments a framebuffer is built from.
#[derive(Debug, Clone)]
pub struct FramebufferDescriptor<'a> {
    /// Label prefix for the attachment textures.
    pub label: &'a str,
    /// Size of every attachment.
    pub extent: Extent2D,
    /// Color attachment formats, in `@location` order.
    pub color_formats: &'a [TextureFormat],
    /// Depth attachment format, if any.
    pub depth_format: Option<TextureFormat>,
}

impl FramebufferDescriptor<'_> {
    /// Rejects zero extents, empty attachment sets and misplaced formats.
    pub fn check_complete(&self) -> Result<(), ResourceError> {
        if self.extent.is_empty() {
            return Err(ResourceError::IncompleteFramebuffer(format!(
                "'{}' has a zero-sized extent",
                self.label
            )));
        }
        if self.color_formats.is_empty() && self.depth_format.is_none() {
            return Err(ResourceError::IncompleteFramebuffer(format!(
                "'{}' has no attachments",
                self.label
            )));
        }
        if let Some(format) = self.color_formats.iter().find(|f| !f.is_color_renderable()) {
            return Err(ResourceError::IncompleteFramebuffer(format!(
                "'{}' uses {format:?} as a color attachment",
                self.label
            )));
        }
        if let Some(format) = self.depth_format.filter(|f| !f.is_depth()) {
            return Err(ResourceError::IncompleteFramebuffer(format!(
                "'{}' uses {format:?} as a depth attachment",
                self.label
            )));
        }
        Ok(())
    }
}

/// One texture of a framebuffer with its single-layer view.
#[derive(Debug)]
pub struct Attachment {
    texture: GpuTexture,
    view: GpuTextureView,
    format: TextureFormat,
}

impl Attachment {
    /// The view used both as attachment and as shader input.
    pub fn view(&self) -> TextureViewId {
        self.view.id()
    }

    /// The attachment's format.
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    fn is_live(&self) -> bool {
        self.texture.is_live() && self.view.is_live()
    }

    fn release(&mut self) {
        self.view.release();
        self.texture.release();
    }
}

/// A set of same-sized render targets written by one pass.
#[derive(Debug)]
pub struct Framebuffer {
    extent: Extent2D,
    colors: Vec<Attachment>,
    depth: Option<Attachment>,
}

impl Framebuffer {
    /// Validates the descriptor and allocates every attachment.
    pub fn new(
        device: &Arc<dyn GraphicsDevice>,
        descriptor: &FramebufferDescriptor,
    ) -> Result<Self, ResourceError> {
        descriptor.check_complete()?;
        let make = |suffix: String, format: TextureFormat, usage: TextureUsage| {
            let label = format!("{}_{}", descriptor.label, suffix);
            let texture = GpuTexture::create(
                device,
                &TextureDescriptor {
                    label: Some(label.as_str().into()),
                    width: descriptor.extent.width,
                    height: descriptor.extent.height,
                    array_layers: 1,
                    format,
                    usage,
                },
            )?;
            let view = texture.create_view(&TextureViewDescriptor::single_layer(label, 0))?;
            Ok::<_, ResourceError>(Attachment {
                texture,
                view,
                format,
            })
        };

        let colors = descriptor
            .color_formats
            .iter()
            .enumerate()
            .map(|(i, &format)| {
                make(
                    format!("color{i}"),
                    format,
                    TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let depth = descriptor
            .depth_format
            .map(|format| {
                let usage = if format.has_stencil() {
                    TextureUsage::RENDER_ATTACHMENT
                } else {
                    TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING
                };
                make("depth".to_string(), format, usage)
            })
            .transpose()?;

        let framebuffer = Self {
            extent: descriptor.extent,
            colors,
            depth,
        };
        framebuffer.check_complete()?;
        Ok(framebuffer)
    }

    /// Fails if any attachment has been released.
    pub fn check_complete(&self) -> Result<(), ResourceError> {
        let all_live = self.colors.iter().all(Attachment::is_live)
            && self.depth.as_ref().is_none_or(Attachment::is_live);
        if all_live {
            Ok(())
        } else {
            Err(ResourceError::IncompleteFramebuffer(
                "an attachment was released".to_string(),
            ))
        }
    }

    /// Size of every attachment.
    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    /// Color attachment `index`.
    pub fn color(&self, index: usize) -> Option<&Attachment> {
        self.colors.get(index)
    }

    /// The depth attachment.
    pub fn depth(&self) -> Option<&Attachment> {
        self.depth.as_ref()
    }

    /// Color attachments for a pass, every target using the same operations.
    pub fn color_attachments(&self, ops: Operations<Color>) -> Vec<RenderPassColorAttachment> {
        self.colors
            .iter()
            .map(|a| RenderPassColorAttachment {
                view: a.view(),
                ops,
            })
            .collect()
    }

    /// The depth attachment for a pass, if any.
    pub fn depth_attachment(
        &self,
        depth_ops: Operations<f32>,
    ) -> Option<RenderPassDepthStencilAttachment> {
        self.depth.as_ref().map(|a| RenderPassDepthStencilAttachment {
            view: a.view(),
            depth_ops: Some(depth_ops),
            stencil_ops: a.format.has_stencil().then_some(Operations::clear(0)),
        })
    }

    /// Destroys every attachment. Later calls do nothing.
    pub fn release(&mut self) {
        for attachment in &mut self.colors {
            attachment.release();
        }
        if let Some(depth) = &mut self.depth {
            depth.release();
        }
    }
}

/// A storage buffer that grows to fit its contents and never shrinks.
#[derive(Debug)]
pub struct GrowableBuffer {
    label: String,
    usage: BufferUsage,
    element_size: u64,
    min_elements: u64,
    buffer: Option<GpuBuffer>,
    capacity: u64,
}

impl GrowableBuffer {
    /// Creates an empty buffer description; nothing is allocated yet.
    pub fn new(
        label: impl Into<String>,
        usage: BufferUsage,
        element_size: u64,
        min_elements: u64,
    ) -> Self {
        Self {
            label: label.into(),
            usage: usage | BufferUsage::COPY_DST,
            element_size: element_size.max(1),
            min_elements: min_elements.max(1),
            buffer: None,
            capacity: 0,
        }
    }

    /// Number of elements the current allocation holds.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// The current allocation, if any.
    pub fn id(&self) -> Option<BufferId> {
        self.buffer.as_ref().map(GpuBuffer::id)
    }

    /// Makes room for `count` elements.
    ///
    /// Returns `true` if a new allocation was made, in which case every bind
    /// group referencing the old one must be rebuilt.
    pub fn reserve(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        count: u64,
    ) -> Result<bool, ResourceError> {
        if self.buffer.is_some() && count <= self.capacity {
            return Ok(false);
        }
        let capacity = count.max(self.min_elements).next_power_of_two();
        let buffer = GpuBuffer::create(
            device,
            &BufferDescriptor {
                label: Some(self.label.as_str().into()),
                size: capacity * self.element_size,
                usage: self.usage,
            },
        )?;
        log::debug!(
            "GrowableBuffer: '{}' grown from {} to {} elements",
            self.label,
            self.capacity,
            capacity
        );
        self.buffer = Some(buffer);
        self.capacity = capacity;
        Ok(true)
    }

    /// Uploads `items`, growing first if needed. Returns whether it reallocated.
    pub fn write<T: Pod>(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        items: &[T],
    ) -> Result<bool, ResourceError> {
        let grown = self.reserve(device, items.len() as u64)?;
        if let Some(buffer) = &self.buffer {
            if !items.is_empty() {
                buffer.write(0, bytemuck::cast_slice(items))?;
            }
        }
        Ok(grown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockGraphicsDevice;

    fn device() -> (Arc<MockGraphicsDevice>, Arc<dyn GraphicsDevice>) {
        let mock = Arc::new(MockGraphicsDevice::new());
        let device: Arc<dyn GraphicsDevice> = mock.clone();
        (mock, device)
    }

    #[test]
    fn release_is_idempotent_and_drop_does_not_double_free() {
        let (mock, device) = device();
        let mut buffer = GpuBuffer::create(
            &device,
            &BufferDescriptor {
                label: None,
                size: 16,
                usage: BufferUsage::UNIFORM,
            },
        )
        .unwrap();
        buffer.release();
        buffer.release();
        drop(buffer);
        assert_eq!(mock.live_buffers(), 0);
        assert_eq!(mock.failed_destroys(), 0);
    }

    #[test]
    fn framebuffer_rejects_bad_descriptors() {
        let desc = FramebufferDescriptor {
            label: "gbuffer",
            extent: Extent2D::new(0, 10),
            color_formats: &[TextureFormat::Rgba8Unorm],
            depth_format: None,
        };
        assert!(matches!(
            desc.check_complete(),
            Err(ResourceError::IncompleteFramebuffer(_))
        ));

        let desc = FramebufferDescriptor {
            label: "gbuffer",
            extent: Extent2D::new(4, 4),
            color_formats: &[TextureFormat::Depth32Float],
            depth_format: None,
        };
        assert!(desc.check_complete().is_err());

        let desc = FramebufferDescriptor {
            label: "gbuffer",
            extent: Extent2D::new(4, 4),
            color_formats: &[],
            depth_format: Some(TextureFormat::R32Float),
        };
        assert!(desc.check_complete().is_err());
    }

    #[test]
    fn framebuffer_release_frees_all_attachments() {
        let (mock, device) = device();
        let mut fb = Framebuffer::new(
            &device,
            &FramebufferDescriptor {
                label: "gbuffer",
                extent: Extent2D::new(8, 8),
                color_formats: &[
                    TextureFormat::Rgba8Unorm,
                    TextureFormat::Rgba16Float,
                    TextureFormat::R32Float,
                ],
                depth_format: Some(TextureFormat::Depth24PlusStencil8),
            },
        )
        .unwrap();
        assert!(fb.check_complete().is_ok());
        assert_eq!(mock.live_textures(), 4);
        assert!(fb.depth_attachment(Operations::clear(1.0)).unwrap().stencil_ops.is_some());
        fb.release();
        assert!(fb.check_complete().is_err());
        assert_eq!(mock.live_textures(), 0);
        fb.release();
        drop(fb);
        assert_eq!(mock.failed_destroys(), 0);
    }

    #[test]
    fn growable_buffer_grows_but_never_shrinks() {
        let (_mock, device) = device();
        let mut lights = GrowableBuffer::new("lights", BufferUsage::STORAGE, 80, 64);
        assert!(lights.reserve(&device, 10).unwrap());
        assert_eq!(lights.capacity(), 64);
        assert!(!lights.reserve(&device, 64).unwrap());
        assert!(lights.reserve(&device, 65).unwrap());
        assert_eq!(lights.capacity(), 128);
        assert!(!lights.write(&device, &[0u32; 4]).unwrap());
        assert_eq!(lights.capacity(), 128);
    }
}
