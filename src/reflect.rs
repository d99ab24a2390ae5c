// Visual Simulations - GPU Compute Canvas Orchestrator
// Copyright (c) 2025 Visual Simulations contributors
// Licensed under MIT License

//! Reads the `Params` uniform block out of a compute shader with naga, so uniform
//! offsets follow what the shader actually declares.

use crate::uniforms::{UniformField, UniformKind, UniformLayout};

// Every compute pass takes its parameter block at @group(0) @binding(1).
pub const PARAMS_GROUP: u32 = 0;
pub const PARAMS_BINDING: u32 = 1;

/// Layout of the shader's parameter block, checked against the inputs the host knows.
///
/// Members the shader leaves out are simply absent from the layout. Members the host
/// doesn't know (other than `_`-prefixed padding) or members of the wrong type fail.
/// A shader without a parameter block gets an empty layout.
pub fn params_layout(source: &str, known: &[UniformField]) -> Result<UniformLayout, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|err| err.emit_to_string(source))?;

    let params = module.global_variables.iter().find_map(|(_, var)| {
        let binding = var.binding.as_ref()?;
        (var.space == naga::AddressSpace::Uniform
            && binding.group == PARAMS_GROUP
            && binding.binding == PARAMS_BINDING)
            .then_some(var)
    });
    let Some(params) = params else {
        return Ok(UniformLayout::from_offsets(Vec::new(), 0));
    };

    let naga::TypeInner::Struct { members, span } = &module.types[params.ty].inner else {
        return Err(format!(
            "uniform at @group({PARAMS_GROUP}) @binding({PARAMS_BINDING}) is not a struct"
        ));
    };

    let mut fields = Vec::with_capacity(members.len());
    for member in members {
        let Some(name) = member.name.as_deref() else {
            continue;
        };
        if name.starts_with('_') {
            continue;
        }
        let field = known
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| format!("uniform '{name}' is not an input of this pass"))?;
        let kind = uniform_kind(&module.types[member.ty].inner)
            .ok_or_else(|| format!("uniform '{name}' has an unsupported type"))?;
        if kind != field.kind {
            return Err(format!(
                "uniform '{name}' is {}, expected {}",
                kind.wgsl_name(),
                field.kind.wgsl_name()
            ));
        }
        fields.push((*field, member.offset as usize));
    }
    Ok(UniformLayout::from_offsets(fields, *span as usize))
}

fn uniform_kind(inner: &naga::TypeInner) -> Option<UniformKind> {
    match *inner {
        naga::TypeInner::Scalar(scalar) => {
            if scalar == naga::Scalar::F32 {
                Some(UniformKind::F32)
            } else if scalar == naga::Scalar::I32 {
                Some(UniformKind::I32)
            } else if scalar == naga::Scalar::U32 {
                Some(UniformKind::U32)
            } else {
                None
            }
        }
        naga::TypeInner::Vector { size, scalar } if scalar == naga::Scalar::F32 => match size {
            naga::VectorSize::Bi => Some(UniformKind::Vec2),
            naga::VectorSize::Tri => Some(UniformKind::Vec3),
            naga::VectorSize::Quad => None,
        },
        _ => None,
    }
}
