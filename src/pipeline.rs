// Visual Simulations - GPU Compute Canvas Orchestrator
// Copyright (c) 2025 Visual Simulations contributors
// Licensed under MIT License

use std::collections::HashSet;

use crate::backend::{Backend, ComputeProgramDescriptor};
use crate::error::{ShaderCompileError, UniformBindError};
use crate::params::{ParamId, ParameterState};
use crate::reflect;
use crate::registry::ShaderSetRegistry;
use crate::simulation::{BindDiscipline, PassSpec, Simulation};
use crate::uniforms::{UniformBlock, UniformKind, UniformValue};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTiming {
    pub time: f32,
    pub frame_time: f32,
}

pub struct ComputePass<B: Backend> {
    spec: &'static PassSpec,
    program: B::ComputeProgram,
    uniforms: UniformBlock,
    // per-frame inputs already reported missing
    reported: HashSet<&'static str>,
}

impl<B: Backend> ComputePass<B> {
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn program(&self) -> &B::ComputeProgram {
        &self.program
    }

    pub fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), UniformBindError> {
        self.uniforms.set(name, value)
    }

    fn set_frame_input(&mut self, name: &'static str, value: f32) {
        if let Err(err) = self.uniforms.set(name, UniformValue::F32(value)) {
            if self.reported.insert(name) {
                log::warn!("{err}; frame continues without it");
            }
        }
    }

    pub fn flush(&self, backend: &B) {
        backend.write_uniforms(&self.program, self.uniforms.bytes());
    }
}

// Passes are kept in dispatch order.
pub struct ShaderSet<B: Backend> {
    id: String,
    display: B::DisplayProgram,
    passes: Vec<ComputePass<B>>,
}

impl<B: Backend> ShaderSet<B> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn passes(&self) -> &[ComputePass<B>] {
        &self.passes
    }

    pub fn bind(&mut self, backend: &B, canvas: &B::Canvas, agents: Option<&B::AgentBuffer>) {
        for pass in &mut self.passes {
            backend.bind_compute(&mut pass.program, canvas, agents);
        }
        backend.bind_display(&mut self.display, canvas);
    }

    /// Copy parameter values into the uniform blocks of the passes they feed and
    /// upload the touched blocks.
    ///
    /// `only` restricts the push to one parameter's on-change bindings; `None` pushes
    /// every binding regardless of discipline. Bind failures are logged and skipped.
    pub fn push_bindings(
        &mut self,
        backend: &B,
        simulation: Simulation,
        params: &ParameterState,
        only: Option<ParamId>,
    ) -> Vec<UniformBindError> {
        let mut errors = Vec::new();
        let mut touched = vec![false; self.passes.len()];

        for binding in simulation.bindings() {
            if let Some(id) = only {
                if binding.param != id || binding.discipline != BindDiscipline::OnChange {
                    continue;
                }
            }
            let Some(value) = params.get(binding.param) else {
                continue;
            };
            let Some(index) = self.passes.iter().position(|p| p.name() == binding.pass) else {
                continue;
            };
            let pass = &mut self.passes[index];
            let kind = pass
                .uniforms
                .layout()
                .kind_of(binding.uniform)
                .unwrap_or(UniformKind::F32);
            match pass.set_uniform(binding.uniform, value.to_uniform(kind)) {
                Ok(()) => touched[index] = true,
                Err(err) => {
                    log::warn!("Skipping {}: {err}", binding.param.name());
                    errors.push(err);
                }
            }
        }

        for (pass, touched) in self.passes.iter().zip(touched) {
            if touched {
                pass.flush(backend);
            }
        }
        errors
    }

    pub fn encode(
        &mut self,
        backend: &B,
        frame: &mut B::Frame,
        timing: FrameTiming,
        canvas: (u32, u32),
        agent_count: usize,
        clear: [f32; 3],
    ) {
        for pass in &mut self.passes {
            pass.set_frame_input("time", timing.time);
            pass.set_frame_input("frame_time", timing.frame_time);
            pass.flush(backend);
            let groups = pass.spec.dispatch.workgroups(canvas, agent_count);
            backend.dispatch(frame, &pass.program, groups);
        }
        backend.draw(frame, &self.display, clear);
    }
}

/// Compiles every program of one shader set; yields nothing unless all succeed.
pub struct ShaderSetBuilder<'a> {
    simulation: Simulation,
    registry: &'a ShaderSetRegistry,
    id: &'a str,
}

impl<'a> ShaderSetBuilder<'a> {
    pub fn new(simulation: Simulation, registry: &'a ShaderSetRegistry, id: &'a str) -> Self {
        Self {
            simulation,
            registry,
            id,
        }
    }

    pub fn build<B: Backend>(self, backend: &B) -> Result<ShaderSet<B>, ShaderCompileError> {
        let sources = self.registry.read_sources(self.simulation, self.id)?;
        let compile_err = |program: String, message: String| ShaderCompileError::Compile {
            set: self.id.to_string(),
            program,
            message,
        };

        let display_label = format!("{}/display", self.id);
        let display = backend
            .compile_display(&display_label, &sources.vertex, &sources.fragment)
            .map_err(|message| compile_err(display_label.clone(), message))?;

        let mut passes = Vec::with_capacity(sources.compute.len());
        for (spec, source) in &sources.compute {
            let label = format!("{}/{}", self.id, spec.file);
            let layout = reflect::params_layout(source, spec.uniforms)
                .map_err(|message| compile_err(label.clone(), message))?;
            let program = backend
                .compile_compute(&ComputeProgramDescriptor {
                    label: &label,
                    source,
                    uniform_size: layout.buffer_size(),
                    uses_agents: self.simulation.uses_agents(),
                })
                .map_err(|message| compile_err(label.clone(), message))?;
            passes.push(ComputePass {
                spec: *spec,
                program,
                uniforms: UniformBlock::new(label, layout),
                reported: HashSet::new(),
            });
        }

        log::debug!("Compiled shader set '{}' ({} compute passes)", self.id, passes.len());
        Ok(ShaderSet {
            id: sources.id,
            display,
            passes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigRecord;
    use crate::mock_backend::{fixtures, FrameOp, MockBackend, MockFrame};
    use crate::uniforms::{UniformField, UniformLayout};

    fn slime_params() -> ParameterState {
        ParameterState::from_config(
            Simulation::SlimeMold,
            &ConfigRecord::defaults(Simulation::SlimeMold),
        )
        .unwrap()
    }

    #[test]
    fn builds_every_program_with_set_labels() {
        let root = fixtures::shader_root("builder_labels", Simulation::SlimeMold, &["classic"]);
        let registry = ShaderSetRegistry::scan(&root).unwrap();
        let backend = MockBackend::default();
        let set = ShaderSetBuilder::new(Simulation::SlimeMold, &registry, "classic")
            .build(&backend)
            .unwrap();
        assert_eq!(set.id(), "classic");
        assert_eq!(
            *backend.compiled.borrow(),
            [
                "classic/display",
                "classic/blur_compute_shader.wgsl",
                "classic/slime_compute_shader.wgsl"
            ]
        );
        assert_eq!(set.passes()[1].program().uniform_size, 48);
    }

    #[test]
    fn one_broken_program_fails_the_build() {
        let root = fixtures::shader_root("builder_broken", Simulation::SlimeMold, &["bad"]);
        fixtures::break_file(&root, "bad", "blur_compute_shader.wgsl");
        let registry = ShaderSetRegistry::scan(&root).unwrap();
        let err = ShaderSetBuilder::new(Simulation::SlimeMold, &registry, "bad")
            .build(&MockBackend::default())
            .err()
            .unwrap();
        match err {
            ShaderCompileError::Compile { set, program, .. } => {
                assert_eq!(set, "bad");
                assert_eq!(program, "bad/blur_compute_shader.wgsl");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn on_change_push_skips_load_once_bindings() {
        let root = fixtures::shader_root("push_filter", Simulation::SlimeMold, &["classic"]);
        let registry = ShaderSetRegistry::scan(&root).unwrap();
        let backend = MockBackend::default();
        let mut set = ShaderSetBuilder::new(Simulation::SlimeMold, &registry, "classic")
            .build(&backend)
            .unwrap();
        let params = slime_params();

        let errors = set.push_bindings(&backend, Simulation::SlimeMold, &params, Some(ParamId::MovementSpeed));
        assert!(errors.is_empty());
        assert!(set.passes().iter().all(|p| p.program().writes.get() == 0));

        set.push_bindings(&backend, Simulation::SlimeMold, &params, Some(ParamId::DiffusionSpeed));
        assert_eq!(set.passes()[0].program().writes.get(), 1);
        assert_eq!(set.passes()[1].program().writes.get(), 0);
    }

    #[test]
    fn encode_dispatches_in_order_then_draws() {
        let root = fixtures::shader_root("encode_order", Simulation::SlimeMold, &["classic"]);
        let registry = ShaderSetRegistry::scan(&root).unwrap();
        let backend = MockBackend::default();
        let mut set = ShaderSetBuilder::new(Simulation::SlimeMold, &registry, "classic")
            .build(&backend)
            .unwrap();
        let mut frame = MockFrame::default();
        let timing = FrameTiming {
            time: 2.0,
            frame_time: 0.016,
        };
        set.encode(&backend, &mut frame, timing, (720, 360), 100, [0.1, 0.2, 0.3]);

        let labels: Vec<_> = frame
            .ops
            .iter()
            .map(|op| match op {
                FrameOp::Dispatch { label, workgroups, .. } => format!("{label} {workgroups:?}"),
                FrameOp::Draw { label, .. } => label.clone(),
            })
            .collect();
        assert_eq!(
            labels,
            [
                "classic/blur_compute_shader.wgsl [45, 23, 1]",
                "classic/slime_compute_shader.wgsl [2, 1, 1]",
                "classic/display"
            ]
        );
        // blur block: diffusion, evaporation, frame_time, time
        let FrameOp::Dispatch { uniforms, .. } = &frame.ops[0] else {
            panic!("expected dispatch");
        };
        let floats: [f32; 4] = bytemuck::pod_read_unaligned(&uniforms[..16]);
        assert_eq!(floats[2], 0.016);
        assert_eq!(floats[3], 2.0);
    }

    #[test]
    fn pass_without_frame_inputs_still_runs() {
        let root = fixtures::shader_root("lean_blur", Simulation::SlimeMold, &["lean"]);
        let lean = fixtures::compute_source(
            "lean/blur",
            &[UniformField::new("diffusion_speed", UniformKind::F32)],
        );
        fixtures::overwrite(&root, "lean", "blur_compute_shader.wgsl", &lean);
        let registry = ShaderSetRegistry::scan(&root).unwrap();
        let backend = MockBackend::default();
        let mut set = ShaderSetBuilder::new(Simulation::SlimeMold, &registry, "lean")
            .build(&backend)
            .unwrap();
        assert_eq!(set.passes()[0].program().uniform_size, 16);

        let errors = set.push_bindings(&backend, Simulation::SlimeMold, &slime_params(), None);
        assert_eq!(
            errors,
            [UniformBindError::Missing {
                program: "lean/blur_compute_shader.wgsl".into(),
                name: "evaporation_speed".into(),
            }]
        );

        let mut frame = MockFrame::default();
        for _ in 0..3 {
            set.encode(&backend, &mut frame, FrameTiming::default(), (720, 360), 100, [0.0; 3]);
        }
        let dispatches = frame
            .ops
            .iter()
            .filter(|op| matches!(op, FrameOp::Dispatch { .. }))
            .count();
        let draws = frame.ops.len() - dispatches;
        assert_eq!((dispatches, draws), (6, 3));

        // reported once per input, not once per frame
        let blur = &set.passes[0];
        assert_eq!(blur.reported.len(), 2);
        assert!(blur.reported.contains("time") && blur.reported.contains("frame_time"));
        assert!(set.passes[1].reported.is_empty());

        let err = set.passes[0]
            .set_uniform("time", UniformValue::F32(1.0))
            .unwrap_err();
        assert!(matches!(err, UniformBindError::Missing { ref name, .. } if name == "time"));
    }

    #[test]
    fn params_block_mismatch_fails_the_set() {
        let root = fixtures::shader_root("params_mismatch", Simulation::SlimeMold, &["typed", "extra"]);
        let wrong_type = fixtures::compute_source(
            "typed/slime",
            &[UniformField::new("sensor_size", UniformKind::F32)],
        );
        fixtures::overwrite(&root, "typed", "slime_compute_shader.wgsl", &wrong_type);
        let unknown = fixtures::compute_source(
            "extra/blur",
            &[
                UniformField::new("diffusion_speed", UniformKind::F32),
                UniformField::new("gravity", UniformKind::F32),
            ],
        );
        fixtures::overwrite(&root, "extra", "blur_compute_shader.wgsl", &unknown);
        let registry = ShaderSetRegistry::scan(&root).unwrap();
        let backend = MockBackend::default();

        for (set, file) in [("typed", "slime_compute_shader.wgsl"), ("extra", "blur_compute_shader.wgsl")] {
            let err = ShaderSetBuilder::new(Simulation::SlimeMold, &registry, set)
                .build(&backend)
                .err()
                .unwrap();
            match err {
                ShaderCompileError::Compile { program, .. } => {
                    assert_eq!(program, format!("{set}/{file}"))
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn shipped_sets_declare_every_host_uniform() {
        let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
        let backend = MockBackend::default();
        for sim in Simulation::ALL {
            let registry = ShaderSetRegistry::scan(sim.resource_dir(root)).unwrap();
            assert!(!registry.sets().is_empty(), "{} ships no sets", sim.name());
            for id in registry.sets() {
                let set = ShaderSetBuilder::new(sim, &registry, id).build(&backend).unwrap();
                for pass in set.passes() {
                    let packed = UniformLayout::new(pass.spec.uniforms);
                    let reflected = pass.uniforms.layout();
                    for field in pass.spec.uniforms {
                        assert_eq!(
                            reflected.offset_of(field.name),
                            packed.offset_of(field.name),
                            "{}/{id}/{}",
                            sim.name(),
                            field.name
                        );
                    }
                    assert_eq!(reflected.size(), packed.size());
                }
            }
        }
    }
}
