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

//! Defines the hierarchy of error types for the rendering subsystem.

use crate::renderer::api::{ProgramId, ShaderModuleId};
use std::fmt;

/// An error related to loading, compiling or linking a GPU program.
#[derive(Debug)]
pub enum ShaderError {
    /// An error occurred while trying to load the shader source from a path.
    LoadError {
        /// The path of the file that failed to load.
        path: String,
        /// The underlying I/O or source error.
        source_error: String,
    },
    /// The shader source failed to parse or validate.
    CompilationError {
        /// A descriptive label for the shader.
        label: String,
        /// Detailed error messages from the shader compiler.
        details: String,
    },
    /// Compiled stages could not be linked into a program.
    LinkError {
        /// A descriptive label for the program.
        label: String,
        /// What made the stages incompatible.
        details: String,
    },
    /// The requested shader module could not be found.
    NotFound {
        /// The ID of the shader module that was not found.
        id: ShaderModuleId,
    },
    /// The source does not define the entry point its stage requires.
    InvalidEntryPoint {
        /// A descriptive label for the shader.
        label: String,
        /// The entry point name that was not found.
        entry_point: String,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::LoadError { path, source_error } => {
                write!(
                    f,
                    "Failed to load shader source from '{path}': {source_error}"
                )
            }
            ShaderError::CompilationError { label, details } => {
                write!(f, "Shader compilation failed for '{label}': {details}")
            }
            ShaderError::LinkError { label, details } => {
                write!(f, "Program link failed for '{label}': {details}")
            }
            ShaderError::NotFound { id } => {
                write!(f, "Shader module not found for ID: {id:?}")
            }
            ShaderError::InvalidEntryPoint { label, entry_point } => {
                write!(f, "Missing entry point '{entry_point}' in shader '{label}'")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the creation of a render or compute pipeline.
#[derive(Debug)]
pub enum PipelineError {
    /// The graphics backend failed to build the pipeline state object.
    CompilationFailed {
        /// A descriptive label for the pipeline, if available.
        label: Option<String>,
        /// Detailed error messages from the backend.
        details: String,
    },
    /// The program referenced by the pipeline is unknown or of the wrong kind.
    InvalidProgram {
        /// The ID of the offending program.
        id: ProgramId,
        /// The label of the pipeline being created.
        pipeline_label: Option<String>,
    },
    /// A bind group did not supply a binding the program uses.
    MissingBinding {
        /// The label of the bind group being created.
        label: Option<String>,
        /// The binding index that was not supplied.
        binding: u32,
    },
    /// The color target format is not compatible with the pipeline or device.
    IncompatibleColorTarget(String),
    /// A required graphics feature is not supported by the device.
    FeatureNotSupported(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::CompilationFailed { label, details } => {
                write!(
                    f,
                    "Pipeline compilation failed for '{}': {}",
                    label.as_deref().unwrap_or("Unknown"),
                    details
                )
            }
            PipelineError::InvalidProgram { id, pipeline_label } => {
                write!(
                    f,
                    "Invalid program {:?} for pipeline '{}'",
                    id,
                    pipeline_label.as_deref().unwrap_or("Unknown")
                )
            }
            PipelineError::MissingBinding { label, binding } => {
                write!(
                    f,
                    "Bind group '{}' is missing binding {}",
                    label.as_deref().unwrap_or("Unknown"),
                    binding
                )
            }
            PipelineError::IncompatibleColorTarget(msg) => {
                write!(f, "Incompatible color target format: {msg}")
            }
            PipelineError::FeatureNotSupported(msg) => {
                write!(f, "Feature not supported: {msg}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// An error related to the creation or use of a GPU resource.
#[derive(Debug)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    Shader(ShaderError),
    /// A pipeline-specific error occurred.
    Pipeline(PipelineError),
    /// A generic resource could not be found.
    NotFound,
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
    /// A mesh upload was given no vertices or no indices.
    EmptyMesh,
    /// A framebuffer is missing attachments or mixes incompatible ones.
    IncompleteFramebuffer(String),
    /// An attempt was made to access a resource out of its bounds.
    OutOfBounds,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
            ResourceError::EmptyMesh => write!(f, "Mesh upload with empty vertex or index data."),
            ResourceError::IncompleteFramebuffer(msg) => {
                write!(f, "Framebuffer incomplete: {msg}")
            }
            ResourceError::OutOfBounds => {
                write!(f, "Resource access out of bounds.")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            ResourceError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

/// A high-level error raised by the render loop or the graphics backend.
#[derive(Debug)]
pub enum RenderError {
    /// A failure occurred during the initialization of the graphics backend.
    InitializationFailed(String),
    /// The scene failed to build; nothing is drawn until it is rebuilt.
    NotReady,
    /// Failed to acquire the next frame from the swapchain/surface for rendering.
    SurfaceAcquisitionFailed(String),
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
    /// The graphics device was lost and must be reinitialized.
    DeviceLost,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize graphics backend: {msg}")
            }
            RenderError::NotReady => write!(f, "The scene is not built."),
            RenderError::SurfaceAcquisitionFailed(msg) => {
                write!(f, "Failed to acquire surface for rendering: {msg}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::DeviceLost => write!(
                f,
                "The graphics device was lost and needs to be reinitialized."
            ),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::LoadError {
            path: "shaders/gbuffer.wgsl".to_string(),
            source_error: "File not found".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Failed to load shader source from 'shaders/gbuffer.wgsl': File not found"
        );

        let err_link = ShaderError::LinkError {
            label: "light_volume".to_string(),
            details: "binding 0 size mismatch".to_string(),
        };
        assert_eq!(
            format!("{err_link}"),
            "Program link failed for 'light_volume': binding 0 size mismatch"
        );
    }

    #[test]
    fn render_error_chains_to_shader_error() {
        let shader_err = ShaderError::NotFound {
            id: ShaderModuleId(101),
        };
        let res_err: ResourceError = shader_err.into();
        let render_err: RenderError = res_err.into();
        assert_eq!(
            format!("{render_err}"),
            "Graphics resource operation failed: Shader resource error: Shader module not found for ID: ShaderModuleId(101)"
        );
        assert!(render_err.source().is_some());
        assert!(render_err.source().unwrap().source().is_some());
    }

    #[test]
    fn missing_binding_names_the_group() {
        let err: ResourceError = PipelineError::MissingBinding {
            label: Some("composite".to_string()),
            binding: 3,
        }
        .into();
        assert_eq!(
            format!("{err}"),
            "Pipeline resource error: Bind group 'composite' is missing binding 3"
        );
    }
}
