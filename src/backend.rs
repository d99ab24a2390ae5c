// Visual Simulations - GPU Compute Canvas Orchestrator
// Copyright (c) 2025 Visual Simulations contributors
// Licensed under MIT License

//! The graphics operations the orchestrator drives. `gpu::WgpuBackend` is the real
//! implementation; tests run against a recording mock.

use crate::agents::AgentRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasFormat {
    Rgba32Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasFilter {
    Nearest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: CanvasFormat,
    pub filter: CanvasFilter,
}

impl CanvasDescriptor {
    pub fn new((width, height): (u32, u32)) -> Self {
        Self {
            width,
            height,
            format: CanvasFormat::Rgba32Float,
            filter: CanvasFilter::Nearest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendLimits {
    pub max_texture_dimension_2d: u32,
    pub max_storage_buffer_binding_size: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct ComputeProgramDescriptor<'a> {
    pub label: &'a str,
    pub source: &'a str,
    /// Bytes to reserve for the pass's uniform buffer.
    pub uniform_size: u64,
    pub uses_agents: bool,
}

pub trait Backend {
    type Canvas;
    type AgentBuffer;
    type ComputeProgram;
    type DisplayProgram;
    type Frame;

    fn limits(&self) -> BackendLimits;

    fn create_canvas(&self, desc: &CanvasDescriptor) -> Self::Canvas;

    /// Allocate a storage buffer holding exactly `agents` and upload them.
    fn create_agent_buffer(&self, agents: &[AgentRecord]) -> Self::AgentBuffer;

    /// Compile a compute program. The error is the compiler's message.
    fn compile_compute(
        &self,
        desc: &ComputeProgramDescriptor<'_>,
    ) -> Result<Self::ComputeProgram, String>;

    fn compile_display(
        &self,
        label: &str,
        vertex: &str,
        fragment: &str,
    ) -> Result<Self::DisplayProgram, String>;

    /// (Re)attach canvas and agent storage to the program's binding points.
    fn bind_compute(
        &self,
        program: &mut Self::ComputeProgram,
        canvas: &Self::Canvas,
        agents: Option<&Self::AgentBuffer>,
    );

    fn bind_display(&self, program: &mut Self::DisplayProgram, canvas: &Self::Canvas);

    fn write_uniforms(&self, program: &Self::ComputeProgram, bytes: &[u8]);

    fn dispatch(&self, frame: &mut Self::Frame, program: &Self::ComputeProgram, workgroups: [u32; 3]);

    /// Clear the color target to `clear` and draw the canvas over it.
    fn draw(&self, frame: &mut Self::Frame, program: &Self::DisplayProgram, clear: [f32; 3]);
}
