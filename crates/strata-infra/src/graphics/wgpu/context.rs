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

use anyhow::{anyhow, Result};
use std::sync::Arc;
use strata_core::renderer::{ApiVersion, ContextCapabilities};
use winit::window::Window;

/// Holds the core WGPU state objects required for rendering.
/// This structure manages the connection to the graphics API for one window surface.
#[derive(Debug)]
pub struct WgpuGraphicsContext {
    pub surface: wgpu::Surface<'static>,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,

    // Configuration for the surface's swapchain behavior
    pub surface_config: wgpu::SurfaceConfiguration,

    pub adapter_info: wgpu::AdapterInfo,
    pub capabilities: ContextCapabilities,
}

impl WgpuGraphicsContext {
    /// Asynchronously initializes the graphics context for a window.
    ///
    /// ## Arguments
    /// * `window` - The window whose surface is rendered to. The context keeps it alive.
    ///
    /// ## Returns
    /// * `Result<Self>` - The initialized context, or an error if no adapter,
    ///   device or surface format is available.
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        log::info!("Initializing WGPU Graphics Context...");
        let window_size = window.inner_size();

        // --- 1. Instance, surface and adapter ---
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::new_without_display_handle());
        let surface = instance
            .create_surface(window)
            .map_err(|e| anyhow!("Failed to create surface: {e}"))?;
        log::debug!("WGPU surface created for the window.");

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await
            .map_err(|e| anyhow!("No compatible graphics adapter: {e}"))?;
        let adapter_info = adapter.get_info();
        log::info!(
            "Using graphics adapter: \"{}\" (Backend: {:?})",
            adapter_info.name,
            adapter_info.backend
        );

        // --- 2. Logical device and queue ---
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Strata Logical Device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                trace: wgpu::Trace::default(),
            })
            .await
            .map_err(|e| anyhow!("Failed to create logical device: {e}"))?;
        log::info!("Logical device and command queue created.");

        device.on_uncaptured_error(Arc::new(|e| {
            log::error!("WGPU Uncaptured Error: {e:?}");
        }));

        let capabilities =
            context_capabilities(&adapter.get_downlevel_capabilities(), &device.limits());
        log::info!(
            "Context capabilities: version {}, compute dispatch {}, memory barrier {}",
            capabilities.version,
            capabilities.compute_dispatch,
            capabilities.memory_barrier
        );

        // --- 3. Configure surface ---
        let surface_caps = surface.get_capabilities(&adapter);
        // Lighting is accumulated in linear space and written as-is.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("Surface reports no supported formats"))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: window_size.width.max(1),
            height: window_size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        Ok(WgpuGraphicsContext {
            surface,
            adapter,
            device,
            queue,
            surface_config,
            adapter_info,
            capabilities,
        })
    }

    /// Reconfigures the surface (swapchain) when the window is resized.
    pub fn resize(&mut self, new_width: u32, new_height: u32) {
        if new_width > 0 && new_height > 0 {
            log::info!(
                "WgpuGraphicsContext: Resizing surface configuration to {new_width}x{new_height}"
            );
            self.surface_config.width = new_width;
            self.surface_config.height = new_height;
            self.surface.configure(&self.device, &self.surface_config);
        } else {
            log::warn!(
                "WgpuGraphicsContext: Ignoring resize request to zero dimensions: {new_width}x{new_height}"
            );
        }
    }

    /// Reapplies the current configuration after the surface was lost.
    pub fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.surface_config);
    }

    /// Returns the size of the swapchain surface.
    pub fn size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }
}

/// Maps what the adapter can do onto the version and feature levels renderer
/// path selection works with.
///
/// Shader model 5 reports 4.5, shader model 4 reports 3.3 and anything older
/// reports 2.1. Without storage buffers in vertex shaders the version is
/// capped at 4.0, below the deferred tier.
pub fn context_capabilities(
    downlevel: &wgpu::DownlevelCapabilities,
    limits: &wgpu::Limits,
) -> ContextCapabilities {
    let mut version = match downlevel.shader_model {
        wgpu::ShaderModel::Sm5 => ApiVersion::new(4, 5),
        wgpu::ShaderModel::Sm4 => ApiVersion::new(3, 3),
        _ => ApiVersion::new(2, 1),
    };
    if !downlevel
        .flags
        .contains(wgpu::DownlevelFlags::VERTEX_STORAGE)
        && version > ApiVersion::new(4, 0)
    {
        version = ApiVersion::new(4, 0);
    }

    ContextCapabilities {
        version,
        compute_dispatch: downlevel
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS),
        memory_barrier: limits.max_storage_buffers_per_shader_stage >= 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compliant_adapter_reports_full_capabilities() {
        let caps = context_capabilities(
            &wgpu::DownlevelCapabilities::default(),
            &wgpu::Limits::default(),
        );
        assert_eq!(caps.version, ApiVersion::new(4, 5));
        assert!(caps.compute_dispatch);
        assert!(caps.memory_barrier);
    }

    #[test]
    fn missing_vertex_storage_caps_the_version() {
        let downlevel = wgpu::DownlevelCapabilities {
            flags: wgpu::DownlevelFlags::all() - wgpu::DownlevelFlags::VERTEX_STORAGE,
            ..Default::default()
        };
        let caps = context_capabilities(&downlevel, &wgpu::Limits::default());
        assert_eq!(caps.version, ApiVersion::new(4, 0));
    }

    #[test]
    fn webgl2_class_adapter_is_a_legacy_context() {
        let downlevel = wgpu::DownlevelCapabilities {
            flags: wgpu::DownlevelFlags::empty(),
            shader_model: wgpu::ShaderModel::Sm2,
            ..Default::default()
        };
        let caps = context_capabilities(&downlevel, &wgpu::Limits::downlevel_webgl2_defaults());
        assert_eq!(caps.version, ApiVersion::new(2, 1));
        assert!(!caps.compute_dispatch);
        assert!(!caps.memory_barrier);
    }
}
