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

//! Opens a window and renders the demo scene with the best lighting path the
//! adapter supports.
//!
//! Usage: `sandbox [config.ron]`. Without an argument `strata.ron` in the
//! working directory is used when present.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use strata_agents::RenderEngine;
use strata_core::math::Extent2D;
use strata_core::renderer::GraphicsDevice;
use strata_core::EngineConfig;
use strata_infra::{translate_winit_input, WgpuDevice};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowId};

const DEFAULT_CONFIG_PATH: &str = "strata.ron";

/// Loads the configuration. A missing file means defaults; a malformed one is an error.
fn load_config(path: &Path) -> Result<(EngineConfig, bool)> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let config: EngineConfig = ron::from_str(&text)
                .with_context(|| format!("Malformed configuration in {}", path.display()))?;
            Ok((config.sanitized(), true))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok((EngineConfig::default(), false)),
        Err(e) => Err(e).with_context(|| format!("Cannot read {}", path.display())),
    }
}

/// Writes log records to stderr and to a file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    use env_logger::{Builder, Env, Target};

    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder
        .filter_module("wgpu_hal", log::LevelFilter::Error)
        .filter_module("naga", log::LevelFilter::Warn);
    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("Cannot create log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(Tee { file })));
    }
    builder.init();
    Ok(())
}

struct Sandbox {
    config: EngineConfig,
    window: Option<Arc<Window>>,
    device: Option<WgpuDevice>,
    engine: Option<RenderEngine>,
    started: Instant,
    failure: Option<anyhow::Error>,
}

impl Sandbox {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            window: None,
            device: None,
            engine: None,
            started: Instant::now(),
            failure: None,
        }
    }

    fn initialize(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let size = self.config.window.size;
        let attributes = Window::default_attributes()
            .with_title(self.config.window.title.clone())
            .with_inner_size(PhysicalSize::new(size.width, size.height));
        let window = Arc::new(event_loop.create_window(attributes)?);

        let device = WgpuDevice::from_window(window.clone())?;
        let info = device.adapter_info();
        log::info!(
            "Sandbox: adapter \"{}\" ({}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        let inner = window.inner_size();
        let shared: Arc<dyn GraphicsDevice> = Arc::new(device.clone());
        let engine = RenderEngine::new(
            shared,
            &self.config,
            Extent2D::new(inner.width, inner.height),
        );
        if !engine.is_ready() {
            log::error!("Sandbox: renderer setup failed, frames will be skipped");
        }

        self.window = Some(window);
        self.device = Some(device);
        self.engine = Some(engine);
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(device), Some(engine)) = (self.device.as_ref(), self.engine.as_mut()) else {
            return;
        };
        let frame = match device.acquire_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(e) => {
                log::error!("Sandbox: {e}");
                event_loop.exit();
                return;
            }
        };

        let elapsed = self.started.elapsed().as_secs_f32();
        if let Err(e) = engine.render_frame(frame.view(), elapsed) {
            log::error!("Sandbox: frame {} failed: {e}", engine.frame_count());
        }
        device.present(frame);
    }
}

impl ApplicationHandler for Sandbox {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.initialize(event_loop) {
            self.failure = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Sandbox: close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(device) = self.device.as_ref() {
                    device.resize_surface(size.width, size.height);
                }
                if let Some(engine) = self.engine.as_mut() {
                    engine.resize(Extent2D::new(size.width, size.height));
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            other => {
                let Some(input) = translate_winit_input(&other) else {
                    return;
                };
                if let Some(engine) = self.engine.as_mut() {
                    if !engine.handle_input(&input) {
                        event_loop.exit();
                    }
                }
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut engine) = self.engine.take() {
            engine.release();
        }
        if let Some(device) = self.device.as_ref() {
            device.poll_device_blocking();
        }
    }
}

fn main() -> Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let (config, from_file) = load_config(&config_path)?;
    init_logging(config.log_file.as_deref())?;
    if from_file {
        log::info!("Sandbox: configuration loaded from {}", config_path.display());
    } else {
        log::info!("Sandbox: {} not found, using defaults", config_path.display());
    }

    let event_loop = EventLoop::new()?;
    let mut app = Sandbox::new(config);
    event_loop.run_app(&mut app)?;

    match app.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
