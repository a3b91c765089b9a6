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

//! WGSL reflection.
//!
//! Every stage is parsed and validated with naga before wgpu sees it. The
//! globals an entry point actually uses become its binding layout, and the
//! struct bound at binding 0 becomes the program's named uniform block.
//! Linking merges the stages' layouts and widens visibility.

use super::conversions::IntoWgpu;
use std::collections::{BTreeMap, HashMap};
use strata_core::renderer::api::{ShaderSource, ShaderStage, UniformLocation, UNIFORM_BLOCK_BINDING};
use strata_core::renderer::ShaderError;

/// What is bound at one binding index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// A uniform buffer.
    Uniform,
    /// A storage buffer.
    Storage {
        /// Whether the shader never writes it.
        read_only: bool,
    },
    /// A texture read with integer texel loads.
    Texture {
        /// A depth texture rather than an unfilterable float one.
        depth: bool,
        /// A layered texture.
        arrayed: bool,
    },
}

impl BindingKind {
    fn binding_type(self) -> wgpu::BindingType {
        match self {
            BindingKind::Uniform => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BindingKind::Storage { read_only } => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BindingKind::Texture { depth, arrayed } => wgpu::BindingType::Texture {
                sample_type: if depth {
                    wgpu::TextureSampleType::Depth
                } else {
                    wgpu::TextureSampleType::Float { filterable: false }
                },
                view_dimension: if arrayed {
                    wgpu::TextureViewDimension::D2Array
                } else {
                    wgpu::TextureViewDimension::D2
                },
                multisampled: false,
            },
        }
    }
}

/// Byte layout of the struct bound at binding 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformBlockLayout {
    /// Size of the struct, including trailing padding.
    pub size: u64,
    /// Named members and their byte ranges.
    pub members: HashMap<String, UniformLocation>,
}

/// The bindings one compiled stage uses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageReflection {
    /// Group-0 bindings the entry point touches.
    pub bindings: BTreeMap<u32, BindingKind>,
    /// The uniform block, if the entry point reads it.
    pub uniform_block: Option<UniformBlockLayout>,
}

impl StageReflection {
    /// Parses, validates and reflects one stage of `source`.
    ///
    /// ## Errors
    /// * `ShaderError::CompilationError` - On a parse or validation failure, or
    ///   a binding outside group 0, or a sampler.
    /// * `ShaderError::InvalidEntryPoint` - If the stage's entry point is missing.
    pub fn reflect(stage: ShaderStage, source: &ShaderSource) -> Result<Self, ShaderError> {
        let label = source.label.to_string();
        let compilation_error = |details: String| ShaderError::CompilationError {
            label: label.clone(),
            details,
        };

        let module = naga::front::wgsl::parse_str(&source.code)
            .map_err(|e| compilation_error(e.emit_to_string(&source.code)))?;
        let info = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::default(),
        )
        .validate(&module)
        .map_err(|e| compilation_error(e.as_inner().to_string()))?;

        let naga_stage: naga::ShaderStage = stage.into_wgpu();
        let entry_point = stage.entry_point();
        let index = module
            .entry_points
            .iter()
            .position(|ep| ep.name == entry_point && ep.stage == naga_stage)
            .ok_or_else(|| ShaderError::InvalidEntryPoint {
                label: label.clone(),
                entry_point: entry_point.to_string(),
            })?;
        let usage = info.get_entry_point(index);

        let mut reflection = StageReflection::default();
        for (handle, global) in module.global_variables.iter() {
            if usage[handle].is_empty() {
                continue;
            }
            let Some(binding) = &global.binding else {
                continue;
            };
            if binding.group != 0 {
                return Err(compilation_error(format!(
                    "binding {} uses group {}, only group 0 is supported",
                    binding.binding, binding.group
                )));
            }
            let kind = match global.space {
                naga::AddressSpace::Uniform => BindingKind::Uniform,
                naga::AddressSpace::Storage { access } => BindingKind::Storage {
                    read_only: !access.contains(naga::StorageAccess::STORE),
                },
                naga::AddressSpace::Handle => match &module.types[global.ty].inner {
                    naga::TypeInner::Image { arrayed, class, .. } => BindingKind::Texture {
                        depth: matches!(class, naga::ImageClass::Depth { .. }),
                        arrayed: *arrayed,
                    },
                    _ => {
                        return Err(compilation_error(format!(
                            "binding {} is not a texture; samplers are not supported",
                            binding.binding
                        )))
                    }
                },
                _ => continue,
            };
            if kind == BindingKind::Uniform && binding.binding == UNIFORM_BLOCK_BINDING {
                reflection.uniform_block = Some(uniform_layout(&module, global.ty));
            }
            reflection.bindings.insert(binding.binding, kind);
        }
        Ok(reflection)
    }
}

fn uniform_layout(module: &naga::Module, ty: naga::Handle<naga::Type>) -> UniformBlockLayout {
    let ctx = module.to_ctx();
    match &module.types[ty].inner {
        naga::TypeInner::Struct { members, span } => UniformBlockLayout {
            size: *span as u64,
            members: members
                .iter()
                .filter_map(|member| {
                    let name = member.name.clone()?;
                    let size = module.types[member.ty].inner.size(ctx);
                    Some((
                        name,
                        UniformLocation {
                            offset: member.offset,
                            size,
                        },
                    ))
                })
                .collect(),
        },
        other => UniformBlockLayout {
            size: other.size(ctx) as u64,
            members: HashMap::new(),
        },
    }
}

/// The merged bindings of a linked program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramReflection {
    /// Group-0 bindings with the stages that use them.
    pub bindings: BTreeMap<u32, (BindingKind, wgpu::ShaderStages)>,
    /// The uniform block shared by the stages.
    pub uniform_block: Option<UniformBlockLayout>,
}

impl ProgramReflection {
    /// Merges the stages of a program.
    ///
    /// ## Errors
    /// * `ShaderError::LinkError` - If two stages declare the same binding
    ///   with different kinds.
    pub fn link(label: &str, stages: &[(ShaderStage, &StageReflection)]) -> Result<Self, ShaderError> {
        let mut program = ProgramReflection::default();
        for (stage, reflection) in stages {
            let visibility: wgpu::ShaderStages = (*stage).into_wgpu();
            for (&binding, &kind) in &reflection.bindings {
                match program.bindings.get_mut(&binding) {
                    Some((existing, stages)) if *existing == kind => *stages |= visibility,
                    Some((existing, _)) => {
                        return Err(ShaderError::LinkError {
                            label: label.to_string(),
                            details: format!(
                                "binding {binding} is {existing:?} in one stage and {kind:?} in another"
                            ),
                        })
                    }
                    None => {
                        program.bindings.insert(binding, (kind, visibility));
                    }
                }
            }
            if let Some(block) = &reflection.uniform_block {
                let merged = program.uniform_block.get_or_insert_with(Default::default);
                merged.size = merged.size.max(block.size);
                for (name, location) in &block.members {
                    merged.members.entry(name.clone()).or_insert(*location);
                }
            }
        }
        Ok(program)
    }

    /// Layout entries for the program's single bind group.
    pub fn layout_entries(&self) -> Vec<wgpu::BindGroupLayoutEntry> {
        self.bindings
            .iter()
            .map(|(&binding, &(kind, visibility))| wgpu::BindGroupLayoutEntry {
                binding,
                visibility,
                ty: kind.binding_type(),
                count: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    tint: vec3<f32>,
    strength: f32,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(0) @binding(1) var<storage, read> positions: array<vec4<f32>>;
@group(0) @binding(2) var albedo: texture_2d<f32>;
@group(0) @binding(3) var shadow: texture_depth_2d_array;
@group(0) @binding(4) var<storage, read_write> counter: array<atomic<u32>>;

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    return u.view_proj * positions[index];
}

@fragment
fn fs_main(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {
    let texel = vec2<i32>(frag.xy);
    let base = textureLoad(albedo, texel, 0).rgb * u.tint;
    let depth = textureLoad(shadow, texel, 0, 0);
    return vec4<f32>(base * u.strength * depth, 1.0);
}

@compute @workgroup_size(1)
fn cs_main() {
    atomicAdd(&counter[0], 1u);
}
"#;

    fn reflect(stage: ShaderStage) -> Result<StageReflection, ShaderError> {
        StageReflection::reflect(stage, &ShaderSource::new("test", SOURCE))
    }

    #[test]
    fn only_used_globals_are_reflected() {
        let vs = reflect(ShaderStage::Vertex).unwrap();
        assert_eq!(
            vs.bindings.keys().copied().collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert_eq!(vs.bindings[&1], BindingKind::Storage { read_only: true });

        let fs = reflect(ShaderStage::Fragment).unwrap();
        assert_eq!(fs.bindings.keys().copied().collect::<Vec<_>>(), vec![0, 2, 3]);
        assert_eq!(
            fs.bindings[&3],
            BindingKind::Texture {
                depth: true,
                arrayed: true
            }
        );

        let cs = reflect(ShaderStage::Compute).unwrap();
        assert_eq!(cs.bindings[&4], BindingKind::Storage { read_only: false });
        assert!(cs.uniform_block.is_none());
    }

    #[test]
    fn uniform_members_follow_wgsl_layout() {
        let vs = reflect(ShaderStage::Vertex).unwrap();
        let block = vs.uniform_block.unwrap();
        assert_eq!(block.size, 80);
        assert_eq!(
            block.members["view_proj"],
            UniformLocation { offset: 0, size: 64 }
        );
        assert_eq!(block.members["tint"], UniformLocation { offset: 64, size: 12 });
        assert_eq!(
            block.members["strength"],
            UniformLocation { offset: 76, size: 4 }
        );
    }

    #[test]
    fn missing_entry_point_is_reported() {
        let source = ShaderSource::new("compute_only", "@compute @workgroup_size(1) fn cs_main() {}");
        let err = StageReflection::reflect(ShaderStage::Vertex, &source).unwrap_err();
        assert!(matches!(err, ShaderError::InvalidEntryPoint { entry_point, .. } if entry_point == "vs_main"));
    }

    #[test]
    fn syntax_errors_are_compilation_errors() {
        let source = ShaderSource::new("broken", "fn vs_main( {");
        let err = StageReflection::reflect(ShaderStage::Vertex, &source).unwrap_err();
        assert!(matches!(err, ShaderError::CompilationError { label, .. } if label == "broken"));
    }

    #[test]
    fn linking_widens_visibility() {
        let vs = reflect(ShaderStage::Vertex).unwrap();
        let fs = reflect(ShaderStage::Fragment).unwrap();
        let program =
            ProgramReflection::link("test", &[(ShaderStage::Vertex, &vs), (ShaderStage::Fragment, &fs)])
                .unwrap();
        assert_eq!(
            program.bindings[&0].1,
            wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT
        );
        assert_eq!(program.bindings[&2].1, wgpu::ShaderStages::FRAGMENT);
        assert_eq!(program.layout_entries().len(), 4);
        assert_eq!(program.uniform_block.unwrap().members.len(), 3);
    }

    #[test]
    fn conflicting_bindings_fail_to_link() {
        let mut vs = StageReflection::default();
        vs.bindings.insert(1, BindingKind::Uniform);
        let mut fs = StageReflection::default();
        fs.bindings.insert(1, BindingKind::Storage { read_only: true });
        let err = ProgramReflection::link("clash", &[(ShaderStage::Vertex, &vs), (ShaderStage::Fragment, &fs)])
            .unwrap_err();
        assert!(matches!(err, ShaderError::LinkError { .. }));
    }
}
