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

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use wgpu::util::DeviceExt;
use winit::window::Window;

use strata_core::renderer::api::*;
use strata_core::renderer::traits::CommandEncoder;
use strata_core::renderer::{
    ContextCapabilities, GraphicsDevice, PipelineError, RenderError, ResourceError, ShaderError,
};

use super::command::WgpuCommandEncoder;
use super::context::WgpuGraphicsContext;
use super::conversions::{backend_name, from_wgpu_device_type, from_wgpu_texture_format, IntoWgpu};
use super::reflection::{ProgramReflection, StageReflection};

/// Locks a resource table. A panic on another thread never leaves a table
/// half-updated, so the poisoned guard is still usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct ShaderModuleEntry {
    module: Arc<wgpu::ShaderModule>,
    stage: ShaderStage,
    reflection: StageReflection,
}

#[derive(Debug)]
struct ProgramEntry {
    label: String,
    vertex: Option<Arc<wgpu::ShaderModule>>,
    fragment: Option<Arc<wgpu::ShaderModule>>,
    compute: Option<Arc<wgpu::ShaderModule>>,
    reflection: ProgramReflection,
    bind_group_layout: Arc<wgpu::BindGroupLayout>,
    pipeline_layout: Arc<wgpu::PipelineLayout>,
}

#[derive(Debug)]
struct BufferEntry {
    buffer: Arc<wgpu::Buffer>,
    size: u64,
}

/// A swapchain image acquired for one frame.
#[derive(Debug)]
pub struct SurfaceFrame {
    texture: wgpu::SurfaceTexture,
    view: TextureViewId,
}

impl SurfaceFrame {
    /// The view lanes render the final image into.
    pub fn view(&self) -> TextureViewId {
        self.view
    }

    /// The size of the swapchain image.
    pub fn size(&self) -> (u32, u32) {
        (self.texture.texture.width(), self.texture.texture.height())
    }
}

/// The internal, non-clonable state of the WgpuDevice.
#[derive(Debug)]
struct WgpuDeviceInternal {
    context: Mutex<WgpuGraphicsContext>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    capabilities: ContextCapabilities,
    adapter_info: GraphicsAdapterInfo,
    surface_format: Option<TextureFormat>,

    shader_modules: Mutex<HashMap<ShaderModuleId, ShaderModuleEntry>>,
    programs: Mutex<HashMap<ProgramId, ProgramEntry>>,
    render_pipelines: Mutex<HashMap<RenderPipelineId, Arc<wgpu::RenderPipeline>>>,
    compute_pipelines: Mutex<HashMap<ComputePipelineId, Arc<wgpu::ComputePipeline>>>,
    bind_groups: Mutex<HashMap<BindGroupId, Arc<wgpu::BindGroup>>>,
    buffers: Mutex<HashMap<BufferId, BufferEntry>>,
    textures: Mutex<HashMap<TextureId, Arc<wgpu::Texture>>>,
    texture_views: Mutex<HashMap<TextureViewId, Arc<wgpu::TextureView>>>,

    next_handle: AtomicUsize,

    /// Command buffers that have been finished but not yet submitted.
    pending_command_buffers: Mutex<HashMap<CommandBufferId, wgpu::CommandBuffer>>,
    command_buffer_id_counter: AtomicU64,
}

/// A clonable, thread-safe handle to the WGPU graphics device.
///
/// Command encoders hold a clone so passes can resolve handles while recording.
#[derive(Clone, Debug)]
pub struct WgpuDevice {
    internal: Arc<WgpuDeviceInternal>,
}

impl WgpuDevice {
    /// Wraps an initialized context.
    pub fn new(context: WgpuGraphicsContext) -> Self {
        let adapter_info = GraphicsAdapterInfo {
            name: context.adapter_info.name.clone(),
            backend: backend_name(context.adapter_info.backend).to_string(),
            device_type: from_wgpu_device_type(context.adapter_info.device_type),
        };
        let surface_format = from_wgpu_texture_format(context.surface_config.format);
        if surface_format.is_none() {
            log::warn!(
                "WgpuDevice: Surface format {:?} has no engine equivalent",
                context.surface_config.format
            );
        }

        Self {
            internal: Arc::new(WgpuDeviceInternal {
                device: context.device.clone(),
                queue: context.queue.clone(),
                capabilities: context.capabilities,
                adapter_info,
                surface_format,
                context: Mutex::new(context),
                shader_modules: Mutex::new(HashMap::new()),
                programs: Mutex::new(HashMap::new()),
                render_pipelines: Mutex::new(HashMap::new()),
                compute_pipelines: Mutex::new(HashMap::new()),
                bind_groups: Mutex::new(HashMap::new()),
                buffers: Mutex::new(HashMap::new()),
                textures: Mutex::new(HashMap::new()),
                texture_views: Mutex::new(HashMap::new()),
                next_handle: AtomicUsize::new(1),
                pending_command_buffers: Mutex::new(HashMap::new()),
                command_buffer_id_counter: AtomicU64::new(0),
            }),
        }
    }

    /// Initializes a context for `window` and wraps it, blocking until the
    /// adapter and device are ready.
    pub fn from_window(window: Arc<Window>) -> anyhow::Result<Self> {
        let context = pollster::block_on(WgpuGraphicsContext::new(window))?;
        Ok(Self::new(context))
    }

    fn next_handle(&self) -> usize {
        self.internal.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn wgpu_render_pipeline(
        &self,
        id: RenderPipelineId,
    ) -> Option<Arc<wgpu::RenderPipeline>> {
        lock(&self.internal.render_pipelines).get(&id).cloned()
    }

    pub(crate) fn wgpu_compute_pipeline(
        &self,
        id: ComputePipelineId,
    ) -> Option<Arc<wgpu::ComputePipeline>> {
        lock(&self.internal.compute_pipelines).get(&id).cloned()
    }

    pub(crate) fn wgpu_bind_group(&self, id: BindGroupId) -> Option<Arc<wgpu::BindGroup>> {
        lock(&self.internal.bind_groups).get(&id).cloned()
    }

    pub(crate) fn wgpu_buffer(&self, id: BufferId) -> Option<Arc<wgpu::Buffer>> {
        lock(&self.internal.buffers)
            .get(&id)
            .map(|entry| entry.buffer.clone())
    }

    pub(crate) fn wgpu_texture_view(&self, id: TextureViewId) -> Option<Arc<wgpu::TextureView>> {
        lock(&self.internal.texture_views).get(&id).cloned()
    }

    pub(crate) fn create_wgpu_encoder(&self, label: Option<&str>) -> wgpu::CommandEncoder {
        self.internal
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label })
    }

    /// Stores a finished command buffer until it is submitted.
    pub(crate) fn register_command_buffer(&self, buffer: wgpu::CommandBuffer) -> CommandBufferId {
        let id = CommandBufferId(
            self.internal
                .command_buffer_id_counter
                .fetch_add(1, Ordering::SeqCst),
        );
        lock(&self.internal.pending_command_buffers).insert(id, buffer);
        id
    }

    /// Polls the device until all submitted work has completed.
    pub fn poll_device_blocking(&self) {
        if let Err(e) = self.internal.device.poll(wgpu::PollType::wait_indefinitely()) {
            log::warn!("Failed to poll device (blocking): {e:?}");
        }
    }

    /// Reconfigures the swapchain for a new window size.
    pub fn resize_surface(&self, width: u32, height: u32) {
        lock(&self.internal.context).resize(width, height);
    }

    /// Acquires the next swapchain image and registers a view over it.
    ///
    /// Returns `Ok(None)` when the frame should be skipped: the surface was
    /// lost or outdated (it is reconfigured) or acquisition timed out.
    ///
    /// ## Errors
    /// * `RenderError::SurfaceAcquisitionFailed` - If the surface cannot
    ///   provide images anymore.
    pub fn acquire_frame(&self) -> Result<Option<SurfaceFrame>, RenderError> {
        let context = lock(&self.internal.context);
        let texture = match context.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(texture)
            | wgpu::CurrentSurfaceTexture::Suboptimal(texture) => texture,
            wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                log::debug!("WgpuDevice: Surface lost or outdated, reconfiguring");
                context.reconfigure();
                return Ok(None);
            }
            wgpu::CurrentSurfaceTexture::Timeout => {
                log::warn!("WgpuDevice: Timed out acquiring a surface texture");
                return Ok(None);
            }
            e => return Err(RenderError::SurfaceAcquisitionFailed(format!("{e:?}"))),
        };
        drop(context);

        let view = texture.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Swapchain View"),
            ..Default::default()
        });
        let id = TextureViewId(self.next_handle());
        lock(&self.internal.texture_views).insert(id, Arc::new(view));
        Ok(Some(SurfaceFrame { texture, view: id }))
    }

    /// Releases the frame's view and presents the image.
    pub fn present(&self, frame: SurfaceFrame) {
        lock(&self.internal.texture_views).remove(&frame.view);
        frame.texture.present();
    }

    fn program_modules(
        &self,
        label: &str,
        stages: &ProgramStages,
    ) -> Result<Vec<(ShaderStage, Arc<wgpu::ShaderModule>, StageReflection)>, ShaderError> {
        let modules = lock(&self.internal.shader_modules);
        let wanted: Vec<(ShaderModuleId, ShaderStage)> = match *stages {
            ProgramStages::Graphics { vertex, fragment } => std::iter::once((vertex, ShaderStage::Vertex))
                .chain(fragment.map(|f| (f, ShaderStage::Fragment)))
                .collect(),
            ProgramStages::Compute { compute } => vec![(compute, ShaderStage::Compute)],
        };

        wanted
            .into_iter()
            .map(|(id, stage)| {
                let entry = modules.get(&id).ok_or(ShaderError::NotFound { id })?;
                if entry.stage != stage {
                    return Err(ShaderError::LinkError {
                        label: label.to_string(),
                        details: format!(
                            "module {id:?} is a {:?} stage, expected {stage:?}",
                            entry.stage
                        ),
                    });
                }
                Ok((stage, entry.module.clone(), entry.reflection.clone()))
            })
            .collect()
    }
}

enum ResolvedResource {
    Buffer(Arc<wgpu::Buffer>),
    View(Arc<wgpu::TextureView>),
}

impl GraphicsDevice for WgpuDevice {
    fn compile_shader(
        &self,
        stage: ShaderStage,
        source: &ShaderSource,
    ) -> Result<ShaderModuleId, ResourceError> {
        let reflection = StageReflection::reflect(stage, source)?;
        let module = self
            .internal
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(source.label.as_ref()),
                source: wgpu::ShaderSource::Wgsl(source.code.clone()),
            });

        let id = ShaderModuleId(self.next_handle());
        lock(&self.internal.shader_modules).insert(
            id,
            ShaderModuleEntry {
                module: Arc::new(module),
                stage,
                reflection,
            },
        );
        log::debug!(
            "WgpuDevice: Compiled {stage:?} stage of '{}' with ID: {id:?}",
            source.label
        );
        Ok(id)
    }

    fn destroy_shader(&self, id: ShaderModuleId) -> Result<(), ResourceError> {
        lock(&self.internal.shader_modules)
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ShaderError::NotFound { id }.into())
    }

    fn link_program(&self, descriptor: &ProgramDescriptor) -> Result<ProgramId, ResourceError> {
        let label = descriptor.label.as_deref().unwrap_or("program").to_string();
        let modules = self.program_modules(&label, &descriptor.stages)?;
        let stages: Vec<(ShaderStage, &StageReflection)> = modules
            .iter()
            .map(|(stage, _, reflection)| (*stage, reflection))
            .collect();
        let reflection = ProgramReflection::link(&label, &stages)?;

        let device = &self.internal.device;
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label}_BindGroupLayout")),
            entries: &reflection.layout_entries(),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label}_Layout")),
            bind_group_layouts: &[Some(&bind_group_layout)],
            immediate_size: 0,
        });

        let module_for = |wanted: ShaderStage| {
            modules
                .iter()
                .find(|(stage, _, _)| *stage == wanted)
                .map(|(_, module, _)| module.clone())
        };
        let entry = ProgramEntry {
            vertex: module_for(ShaderStage::Vertex),
            fragment: module_for(ShaderStage::Fragment),
            compute: module_for(ShaderStage::Compute),
            label,
            reflection,
            bind_group_layout: Arc::new(bind_group_layout),
            pipeline_layout: Arc::new(pipeline_layout),
        };

        let id = ProgramId(self.next_handle());
        log::debug!(
            "WgpuDevice: Linked program '{}' with {} bindings, ID: {id:?}",
            entry.label,
            entry.reflection.bindings.len()
        );
        lock(&self.internal.programs).insert(id, entry);
        Ok(id)
    }

    fn destroy_program(&self, id: ProgramId) -> Result<(), ResourceError> {
        lock(&self.internal.programs)
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        lock(&self.internal.programs)
            .get(&program)?
            .reflection
            .uniform_block
            .as_ref()?
            .members
            .get(name)
            .copied()
    }

    fn uniform_block_size(&self, program: ProgramId) -> Option<u64> {
        lock(&self.internal.programs)
            .get(&program)?
            .reflection
            .uniform_block
            .as_ref()
            .map(|block| block.size)
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError> {
        let pipeline_label = descriptor.label.as_deref().map(String::from);
        let (vertex, fragment, layout) = {
            let programs = lock(&self.internal.programs);
            let program = programs.get(&descriptor.program);
            match program.and_then(|p| p.vertex.clone().map(|vs| (vs, p))) {
                Some((vertex, program)) => (
                    vertex,
                    program.fragment.clone(),
                    program.pipeline_layout.clone(),
                ),
                None => {
                    return Err(PipelineError::InvalidProgram {
                        id: descriptor.program,
                        pipeline_label,
                    }
                    .into())
                }
            }
        };
        if fragment.is_none() && !descriptor.color_targets.is_empty() {
            return Err(PipelineError::IncompatibleColorTarget(format!(
                "pipeline '{}' has color targets but its program has no fragment stage",
                pipeline_label.as_deref().unwrap_or("Unknown")
            ))
            .into());
        }

        let attributes: Vec<Vec<wgpu::VertexAttribute>> = descriptor
            .vertex_buffers
            .iter()
            .map(|layout| {
                layout
                    .attributes
                    .iter()
                    .map(|attr| wgpu::VertexAttribute {
                        format: attr.format.into_wgpu(),
                        offset: attr.offset,
                        shader_location: attr.shader_location,
                    })
                    .collect()
            })
            .collect();
        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = descriptor
            .vertex_buffers
            .iter()
            .zip(attributes.iter())
            .map(|(layout, attributes)| wgpu::VertexBufferLayout {
                array_stride: layout.array_stride,
                step_mode: layout.step_mode.into_wgpu(),
                attributes,
            })
            .collect();

        let color_targets: Vec<Option<wgpu::ColorTargetState>> = descriptor
            .color_targets
            .iter()
            .map(|target| {
                Some(wgpu::ColorTargetState {
                    format: target.format.into_wgpu(),
                    blend: target.blend.map(IntoWgpu::into_wgpu),
                    write_mask: target.write_mask.into_wgpu(),
                })
            })
            .collect();

        let depth_stencil = descriptor.depth_stencil.map(|ds| wgpu::DepthStencilState {
            format: ds.format.into_wgpu(),
            depth_write_enabled: Some(ds.depth_write_enabled),
            depth_compare: Some(ds.depth_compare.into_wgpu()),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState {
                constant: ds.bias.constant,
                slope_scale: ds.bias.slope_scale,
                clamp: 0.0,
            },
        });

        let pipeline = self
            .internal
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: descriptor.label.as_deref(),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &vertex,
                    entry_point: Some(VERTEX_ENTRY_POINT),
                    buffers: &vertex_buffers,
                    compilation_options: Default::default(),
                },
                fragment: fragment.as_ref().map(|module| wgpu::FragmentState {
                    module,
                    entry_point: Some(FRAGMENT_ENTRY_POINT),
                    targets: &color_targets,
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: descriptor.cull_mode.into_wgpu(),
                    ..Default::default()
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        let id = RenderPipelineId(self.next_handle());
        lock(&self.internal.render_pipelines).insert(id, Arc::new(pipeline));
        log::debug!(
            "WgpuDevice: Created render pipeline '{}' with ID: {id:?}",
            pipeline_label.as_deref().unwrap_or_default()
        );
        Ok(id)
    }

    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError> {
        lock(&self.internal.render_pipelines)
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError> {
        let (module, layout) = {
            let programs = lock(&self.internal.programs);
            match programs
                .get(&descriptor.program)
                .and_then(|p| p.compute.clone().map(|cs| (cs, p.pipeline_layout.clone())))
            {
                Some(found) => found,
                None => {
                    return Err(PipelineError::InvalidProgram {
                        id: descriptor.program,
                        pipeline_label: descriptor.label.as_deref().map(String::from),
                    }
                    .into())
                }
            }
        };

        let pipeline = self
            .internal
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: descriptor.label.as_deref(),
                layout: Some(&layout),
                module: &module,
                entry_point: Some(COMPUTE_ENTRY_POINT),
                compilation_options: Default::default(),
                cache: None,
            });

        let id = ComputePipelineId(self.next_handle());
        lock(&self.internal.compute_pipelines).insert(id, Arc::new(pipeline));
        log::debug!(
            "WgpuDevice: Created compute pipeline '{}' with ID: {id:?}",
            descriptor.label.as_deref().unwrap_or_default()
        );
        Ok(id)
    }

    fn destroy_compute_pipeline(&self, id: ComputePipelineId) -> Result<(), ResourceError> {
        lock(&self.internal.compute_pipelines)
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_bind_group(
        &self,
        descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError> {
        let label = descriptor.label.as_deref().map(String::from);
        let (layout, expected) = {
            let programs = lock(&self.internal.programs);
            let program = programs.get(&descriptor.program).ok_or_else(|| {
                PipelineError::InvalidProgram {
                    id: descriptor.program,
                    pipeline_label: label.clone(),
                }
            })?;
            let expected: Vec<u32> = program.reflection.bindings.keys().copied().collect();
            (program.bind_group_layout.clone(), expected)
        };

        for entry in descriptor.entries {
            if !expected.contains(&entry.binding) {
                log::trace!(
                    "WgpuDevice: Skipping binding {} of '{}', unused by the program",
                    entry.binding,
                    label.as_deref().unwrap_or_default()
                );
            }
        }

        let mut resolved = Vec::with_capacity(expected.len());
        for binding in expected {
            let entry = descriptor
                .entries
                .iter()
                .find(|e| e.binding == binding)
                .ok_or_else(|| PipelineError::MissingBinding {
                    label: label.clone(),
                    binding,
                })?;
            let resource = match entry.resource {
                BindingResource::Buffer(id) => {
                    ResolvedResource::Buffer(self.wgpu_buffer(id).ok_or(ResourceError::NotFound)?)
                }
                BindingResource::TextureView(id) => ResolvedResource::View(
                    self.wgpu_texture_view(id).ok_or(ResourceError::NotFound)?,
                ),
            };
            resolved.push((binding, resource));
        }

        let entries: Vec<wgpu::BindGroupEntry> = resolved
            .iter()
            .map(|(binding, resource)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: match resource {
                    ResolvedResource::Buffer(buffer) => buffer.as_entire_binding(),
                    ResolvedResource::View(view) => wgpu::BindingResource::TextureView(view),
                },
            })
            .collect();

        let bind_group = self
            .internal
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: label.as_deref(),
                layout: &layout,
                entries: &entries,
            });
        let id = BindGroupId(self.next_handle());
        lock(&self.internal.bind_groups).insert(id, Arc::new(bind_group));
        Ok(id)
    }

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError> {
        lock(&self.internal.bind_groups)
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let buffer = self.internal.device.create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size: descriptor.size,
            usage: descriptor.usage.into_wgpu(),
            mapped_at_creation: false,
        });
        let id = BufferId(self.next_handle());
        lock(&self.internal.buffers).insert(
            id,
            BufferEntry {
                buffer: Arc::new(buffer),
                size: descriptor.size,
            },
        );
        log::trace!(
            "WgpuDevice: Created buffer '{}' ({} bytes) with ID: {id:?}",
            descriptor.label.as_deref().unwrap_or_default(),
            descriptor.size
        );
        Ok(id)
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        let size = descriptor.size.max(data.len() as u64);
        let mut contents = data.to_vec();
        contents.resize(size as usize, 0);

        let buffer = self
            .internal
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: descriptor.label.as_deref(),
                contents: &contents,
                usage: descriptor.usage.into_wgpu(),
            });
        let id = BufferId(self.next_handle());
        lock(&self.internal.buffers).insert(
            id,
            BufferEntry {
                buffer: Arc::new(buffer),
                size,
            },
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let entry = lock(&self.internal.buffers)
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        entry.buffer.destroy();
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let (buffer, size) = {
            let buffers = lock(&self.internal.buffers);
            let entry = buffers.get(&id).ok_or(ResourceError::NotFound)?;
            (entry.buffer.clone(), entry.size)
        };
        if offset + data.len() as u64 > size {
            return Err(ResourceError::OutOfBounds);
        }
        self.internal.queue.write_buffer(&buffer, offset, data);
        Ok(())
    }

    fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, ResourceError> {
        let (buffer, buffer_size) = {
            let buffers = lock(&self.internal.buffers);
            let entry = buffers.get(&id).ok_or(ResourceError::NotFound)?;
            (entry.buffer.clone(), entry.size)
        };
        if offset + size > buffer_size {
            return Err(ResourceError::OutOfBounds);
        }

        let slice = buffer.slice(offset..offset + size);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.poll_device_blocking();

        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ResourceError::BackendError(format!("Buffer map failed: {e}"))),
            Err(e) => {
                return Err(ResourceError::BackendError(format!(
                    "Buffer map callback dropped: {e}"
                )))
            }
        }
        let bytes = slice.get_mapped_range().to_vec();
        buffer.unmap();
        Ok(bytes)
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let texture = self.internal.device.create_texture(&wgpu::TextureDescriptor {
            label: descriptor.label.as_deref(),
            size: wgpu::Extent3d {
                width: descriptor.width.max(1),
                height: descriptor.height.max(1),
                depth_or_array_layers: descriptor.array_layers.max(1),
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: descriptor.format.into_wgpu(),
            usage: descriptor.usage.into_wgpu(),
            view_formats: &[],
        });
        let id = TextureId(self.next_handle());
        lock(&self.internal.textures).insert(id, Arc::new(texture));
        log::debug!(
            "WgpuDevice: Created texture '{}' ({}x{}x{}, {} bytes) with ID: {id:?}",
            descriptor.label.as_deref().unwrap_or_default(),
            descriptor.width,
            descriptor.height,
            descriptor.array_layers,
            descriptor.size_in_bytes()
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        let texture = lock(&self.internal.textures)
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        texture.destroy();
        Ok(())
    }

    fn create_texture_view(
        &self,
        texture_id: TextureId,
        descriptor: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError> {
        let texture = lock(&self.internal.textures)
            .get(&texture_id)
            .cloned()
            .ok_or(ResourceError::NotFound)?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: descriptor.label.as_deref(),
            format: None,
            dimension: descriptor.dimension.map(IntoWgpu::into_wgpu),
            usage: None,
            aspect: wgpu::TextureAspect::All,
            base_mip_level: 0,
            mip_level_count: None,
            base_array_layer: descriptor.base_array_layer,
            array_layer_count: descriptor.array_layer_count,
        });
        let id = TextureViewId(self.next_handle());
        lock(&self.internal.texture_views).insert(id, Arc::new(view));
        Ok(id)
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError> {
        lock(&self.internal.texture_views)
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(WgpuCommandEncoder::new(self.clone(), label))
    }

    fn submit_command_buffer(&self, command_buffer: CommandBufferId) {
        match lock(&self.internal.pending_command_buffers).remove(&command_buffer) {
            Some(buffer) => {
                self.internal.queue.submit(std::iter::once(buffer));
            }
            None => log::warn!(
                "WgpuDevice: Attempted to submit unknown command buffer {command_buffer:?}"
            ),
        }
    }

    fn capabilities(&self) -> ContextCapabilities {
        self.internal.capabilities
    }

    fn surface_format(&self) -> Option<TextureFormat> {
        self.internal.surface_format
    }

    fn adapter_info(&self) -> GraphicsAdapterInfo {
        self.internal.adapter_info.clone()
    }
}
