// Visual Simulations - GPU Compute Canvas Orchestrator
// Copyright (c) 2025 Visual Simulations contributors
// Licensed under MIT License

//! Recording backend for orchestrator tests. No GPU involved.

use std::cell::{Cell, RefCell};

use crate::agents::AgentRecord;
use crate::backend::{Backend, BackendLimits, CanvasDescriptor, ComputeProgramDescriptor};

/// Sources containing this marker fail to compile.
pub const COMPILE_FAILURE_MARKER: &str = "syntax error";

#[derive(Debug, Clone, PartialEq)]
pub struct MockCanvas {
    pub id: u32,
    pub desc: CanvasDescriptor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockAgentBuffer {
    pub id: u32,
    pub agents: Vec<AgentRecord>,
}

#[derive(Debug)]
pub struct MockComputeProgram {
    pub label: String,
    pub uniform_size: u64,
    pub canvas: Option<u32>,
    pub agents: Option<u32>,
    pub uniforms: RefCell<Vec<u8>>,
    pub writes: Cell<usize>,
}

#[derive(Debug)]
pub struct MockDisplayProgram {
    pub label: String,
    pub canvas: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOp {
    Dispatch {
        label: String,
        workgroups: [u32; 3],
        canvas: Option<u32>,
        agents: Option<u32>,
        uniforms: Vec<u8>,
    },
    Draw {
        label: String,
        canvas: Option<u32>,
        clear: [f32; 3],
    },
}

#[derive(Debug, Default)]
pub struct MockFrame {
    pub ops: Vec<FrameOp>,
}

#[derive(Debug)]
pub struct MockBackend {
    pub limits: BackendLimits,
    next_id: Cell<u32>,
    pub compiled: RefCell<Vec<String>>,
    pub canvases_created: Cell<usize>,
    pub agent_buffers_created: Cell<usize>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            limits: BackendLimits {
                max_texture_dimension_2d: 8192,
                max_storage_buffer_binding_size: 128 << 20,
            },
            next_id: Cell::new(1),
            compiled: RefCell::new(Vec::new()),
            canvases_created: Cell::new(0),
            agent_buffers_created: Cell::new(0),
        }
    }
}

impl MockBackend {
    fn next_id(&self) -> u32 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }
}

impl Backend for MockBackend {
    type Canvas = MockCanvas;
    type AgentBuffer = MockAgentBuffer;
    type ComputeProgram = MockComputeProgram;
    type DisplayProgram = MockDisplayProgram;
    type Frame = MockFrame;

    fn limits(&self) -> BackendLimits {
        self.limits
    }

    fn create_canvas(&self, desc: &CanvasDescriptor) -> MockCanvas {
        self.canvases_created.set(self.canvases_created.get() + 1);
        MockCanvas {
            id: self.next_id(),
            desc: *desc,
        }
    }

    fn create_agent_buffer(&self, agents: &[AgentRecord]) -> MockAgentBuffer {
        self.agent_buffers_created
            .set(self.agent_buffers_created.get() + 1);
        MockAgentBuffer {
            id: self.next_id(),
            agents: agents.to_vec(),
        }
    }

    fn compile_compute(
        &self,
        desc: &ComputeProgramDescriptor<'_>,
    ) -> Result<MockComputeProgram, String> {
        if desc.source.contains(COMPILE_FAILURE_MARKER) {
            return Err(format!("{}: {}", desc.label, COMPILE_FAILURE_MARKER));
        }
        self.compiled.borrow_mut().push(desc.label.to_string());
        Ok(MockComputeProgram {
            label: desc.label.to_string(),
            uniform_size: desc.uniform_size,
            canvas: None,
            agents: None,
            uniforms: RefCell::new(vec![0; desc.uniform_size as usize]),
            writes: Cell::new(0),
        })
    }

    fn compile_display(
        &self,
        label: &str,
        vertex: &str,
        fragment: &str,
    ) -> Result<MockDisplayProgram, String> {
        if vertex.contains(COMPILE_FAILURE_MARKER) || fragment.contains(COMPILE_FAILURE_MARKER) {
            return Err(format!("{label}: {COMPILE_FAILURE_MARKER}"));
        }
        self.compiled.borrow_mut().push(label.to_string());
        Ok(MockDisplayProgram {
            label: label.to_string(),
            canvas: None,
        })
    }

    fn bind_compute(
        &self,
        program: &mut MockComputeProgram,
        canvas: &MockCanvas,
        agents: Option<&MockAgentBuffer>,
    ) {
        program.canvas = Some(canvas.id);
        program.agents = agents.map(|a| a.id);
    }

    fn bind_display(&self, program: &mut MockDisplayProgram, canvas: &MockCanvas) {
        program.canvas = Some(canvas.id);
    }

    fn write_uniforms(&self, program: &MockComputeProgram, bytes: &[u8]) {
        assert!(bytes.len() as u64 <= program.uniform_size);
        program.uniforms.borrow_mut()[..bytes.len()].copy_from_slice(bytes);
        program.writes.set(program.writes.get() + 1);
    }

    fn dispatch(&self, frame: &mut MockFrame, program: &MockComputeProgram, workgroups: [u32; 3]) {
        frame.ops.push(FrameOp::Dispatch {
            label: program.label.clone(),
            workgroups,
            canvas: program.canvas,
            agents: program.agents,
            uniforms: program.uniforms.borrow().clone(),
        });
    }

    fn draw(&self, frame: &mut MockFrame, program: &MockDisplayProgram, clear: [f32; 3]) {
        frame.ops.push(FrameOp::Draw {
            label: program.label.clone(),
            canvas: program.canvas,
            clear,
        });
    }
}

/// Shader-set directories on disk for registry and orchestrator tests.
pub mod fixtures {
    use std::fs;
    use std::path::PathBuf;

    use crate::simulation::{Simulation, FRAGMENT_SHADER_FILE, VERTEX_SHADER_FILE};
    use crate::uniforms::UniformField;

    /// Fresh resource root `<tmp>/.../<name>` containing `sets`, each with every file
    /// `simulation` expects.
    pub fn shader_root(name: &str, simulation: Simulation, sets: &[&str]) -> PathBuf {
        let root = std::env::temp_dir()
            .join(format!("visual-simulations-fixtures-{}", std::process::id()))
            .join(name);
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        for set in sets {
            write_set(&root, simulation, set);
        }
        root
    }

    pub fn write_set(root: &std::path::Path, simulation: Simulation, set: &str) {
        let dir = root.join(set);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(VERTEX_SHADER_FILE), "@vertex fn vs_main() {}").unwrap();
        fs::write(dir.join(FRAGMENT_SHADER_FILE), "@fragment fn fs_main() {}").unwrap();
        for pass in simulation.passes() {
            let source = compute_source(&format!("{set}/{}", pass.name), pass.uniforms);
            fs::write(dir.join(pass.file), source).unwrap();
        }
    }

    /// Minimal compute shader whose `Params` block declares `fields` in order.
    pub fn compute_source(tag: &str, fields: &[UniformField]) -> String {
        let members: String = fields
            .iter()
            .map(|f| format!("    {}: {},\n", f.name, f.kind.wgsl_name()))
            .collect();
        format!(
            "// {tag}\n\
             struct Params {{\n{members}}};\n\
             @group(0) @binding(1) var<uniform> params: Params;\n\
             @compute @workgroup_size(16) fn main() {{}}\n"
        )
    }

    pub fn overwrite(root: &std::path::Path, set: &str, file: &str, contents: &str) {
        fs::write(root.join(set).join(file), contents).unwrap();
    }

    /// Overwrite one file of a set with something that won't compile.
    pub fn break_file(root: &std::path::Path, set: &str, file: &str) {
        overwrite(root, set, file, super::COMPILE_FAILURE_MARKER);
    }
}
