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

//! Every composed program must parse and validate as WGSL, expose the
//! entry points its shape promises and keep its uniform block at binding 0.

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, ShaderStage};
use strata_lanes::render_lane::shaders::ProgramShape;
use strata_lanes::render_lane::ProgramKind;
use strata_lanes::ShaderLibrary;

fn parse(kind: ProgramKind) -> naga::Module {
    let source = ShaderLibrary::embedded()
        .compose(kind.parts())
        .expect("embedded parts compose");
    match naga::front::wgsl::parse_str(&source) {
        Ok(module) => module,
        Err(err) => panic!("{}: {}", kind.label(), err.emit_to_string(&source)),
    }
}

#[test]
fn every_program_validates() {
    for kind in ProgramKind::ALL {
        let module = parse(kind);
        let mut validator = Validator::new(ValidationFlags::all(), Capabilities::default());
        if let Err(err) = validator.validate(&module) {
            panic!("{} failed validation: {err:?}", kind.label());
        }
    }
}

#[test]
fn entry_points_follow_the_program_shape() {
    for kind in ProgramKind::ALL {
        let module = parse(kind);
        let stages: Vec<(String, ShaderStage)> = module
            .entry_points
            .iter()
            .map(|ep| (ep.name.clone(), ep.stage))
            .collect();
        let has = |name: &str, stage: ShaderStage| {
            stages.iter().any(|(n, s)| n == name && *s == stage)
        };
        match kind.shape() {
            ProgramShape::Raster { fragment } => {
                assert!(has("vs_main", ShaderStage::Vertex), "{}", kind.label());
                assert_eq!(has("fs_main", ShaderStage::Fragment), fragment, "{}", kind.label());
            }
            ProgramShape::Compute => {
                assert!(has("cs_main", ShaderStage::Compute), "{}", kind.label());
            }
        }
    }
}

#[test]
fn uniform_block_sits_at_binding_zero() {
    for kind in ProgramKind::ALL {
        let module = parse(kind);
        let block = module.global_variables.iter().find(|(_, var)| {
            var.binding
                .as_ref()
                .is_some_and(|b| b.group == 0 && b.binding == 0)
        });
        let (_, var) = block.unwrap_or_else(|| panic!("{} has no binding 0", kind.label()));
        assert_eq!(var.space, AddressSpace::Uniform, "{}", kind.label());
    }
}
