// Visual Simulations - GPU Compute Canvas Orchestrator
// Copyright (c) 2025 Visual Simulations contributors
// Licensed under MIT License

//! Owns the canvas, the agent buffer and the active shader set of one simulation
//! window, and applies parameter changes, hot-reloads and resets to them.

use std::path::Path;

use crate::agents::{generate_agents, AgentRecord, AGENT_STRIDE};
use crate::backend::{Backend, BackendLimits, CanvasDescriptor};
use crate::error::SimError;
use crate::params::{ParamId, ParamValue, ParameterState};
use crate::pipeline::{FrameTiming, ShaderSet, ShaderSetBuilder};
use crate::registry::ShaderSetRegistry;
use crate::simulation::Simulation;

pub struct CanvasState<B: Backend> {
    desc: CanvasDescriptor,
    texture: B::Canvas,
}

impl<B: Backend> CanvasState<B> {
    fn create(backend: &B, desc: CanvasDescriptor) -> Self {
        Self {
            desc,
            texture: backend.create_canvas(&desc),
        }
    }

    pub fn descriptor(&self) -> &CanvasDescriptor {
        &self.desc
    }

    pub fn size(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }

    pub fn texture(&self) -> &B::Canvas {
        &self.texture
    }
}

/// Live agent storage. `count` is the *active* count; the pending one lives in
/// [`ParameterState`] until the next reset.
pub struct AgentBufferState<B: Backend> {
    count: usize,
    buffer: B::AgentBuffer,
}

impl<B: Backend> AgentBufferState<B> {
    fn create(backend: &B, agents: &[AgentRecord]) -> Self {
        Self {
            count: agents.len(),
            buffer: backend.create_agent_buffer(agents),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn byte_size(&self) -> u64 {
        self.count as u64 * AGENT_STRIDE
    }

    pub fn buffer(&self) -> &B::AgentBuffer {
        &self.buffer
    }
}

pub struct Orchestrator<B: Backend> {
    backend: B,
    simulation: Simulation,
    registry: ShaderSetRegistry,
    params: ParameterState,
    canvas: CanvasState<B>,
    agents: Option<AgentBufferState<B>>,
    active: ShaderSet<B>,
    last_error: Option<String>,
}

fn validate_canvas(desc: &CanvasDescriptor, limits: &BackendLimits) -> Result<(), SimError> {
    let max = limits.max_texture_dimension_2d;
    if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
        return Err(SimError::invalid(
            "canvas",
            format!("{}x{} outside 1..={max}", desc.width, desc.height),
        ));
    }
    Ok(())
}

// Pending agent count, checked against its range and the device buffer limit.
fn validate_agent_count(
    simulation: Simulation,
    params: &ParameterState,
    limits: &BackendLimits,
) -> Result<Option<i64>, SimError> {
    if !simulation.uses_agents() {
        return Ok(None);
    }
    let name = ParamId::AgentCount.name();
    let count = params
        .pending_agent_count()
        .ok_or_else(|| SimError::invalid(name, "not set"))?;
    if !ParamId::AgentCount.range().contains(&(count as f64)) {
        return Err(SimError::invalid(name, format!("{count} out of range")));
    }
    let bytes = count as u64 * AGENT_STRIDE;
    if bytes > limits.max_storage_buffer_binding_size {
        return Err(SimError::invalid(
            name,
            format!(
                "{count} agents need {bytes} bytes, device allows {}",
                limits.max_storage_buffer_binding_size
            ),
        ));
    }
    Ok(Some(count))
}

impl<B: Backend> Orchestrator<B> {
    /// Allocate the canvas (and agents), then load the most recently used shader set,
    /// falling back to the other registered sets in order.
    pub fn new(
        backend: B,
        simulation: Simulation,
        registry: ShaderSetRegistry,
        mut params: ParameterState,
    ) -> Result<Self, SimError> {
        let limits = backend.limits();
        let desc = CanvasDescriptor::new(simulation.canvas_size());
        validate_canvas(&desc, &limits)?;
        let dataset = match validate_agent_count(simulation, &params, &limits)? {
            Some(count) => Some(generate_agents(count, simulation.canvas_size())?),
            None => None,
        };

        let canvas = CanvasState::create(&backend, desc);
        let agents = dataset.map(|d| AgentBufferState::create(&backend, &d));

        let mru = params.shader_set().to_string();
        let candidates = std::iter::once(mru.as_str())
            .filter(|id| registry.contains(id))
            .chain(registry.sets().iter().map(String::as_str).filter(|id| *id != mru));

        let mut active = None;
        for id in candidates {
            match ShaderSetBuilder::new(simulation, &registry, id).build(&backend) {
                Ok(set) => {
                    active = Some(set);
                    break;
                }
                Err(err) => log::error!("{err}"),
            }
        }
        let Some(mut active) = active else {
            return Err(SimError::NoShaderSet {
                root: registry.root().to_path_buf(),
            });
        };
        if active.id() != mru {
            log::warn!("Shader set '{mru}' unavailable, using '{}'", active.id());
            params.set_shader_set(active.id());
        }

        active.bind(&backend, &canvas.texture, agents.as_ref().map(|a| &a.buffer));
        active.push_bindings(&backend, simulation, &params, None);

        log::info!(
            "{} ready: canvas {}x{}, {} agents, shader set '{}'",
            simulation.name(),
            desc.width,
            desc.height,
            agents.as_ref().map_or(0, |a| a.count),
            active.id()
        );

        Ok(Self {
            backend,
            simulation,
            registry,
            params,
            canvas,
            agents,
            active,
            last_error: None,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn simulation(&self) -> Simulation {
        self.simulation
    }

    pub fn params(&self) -> &ParameterState {
        &self.params
    }

    pub fn canvas(&self) -> &CanvasState<B> {
        &self.canvas
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        self.canvas.size()
    }

    pub fn agent_buffer(&self) -> Option<&AgentBufferState<B>> {
        self.agents.as_ref()
    }

    pub fn active_agent_count(&self) -> usize {
        self.agents.as_ref().map_or(0, |a| a.count)
    }

    pub fn agent_buffer_size(&self) -> u64 {
        self.agents.as_ref().map_or(0, |a| a.byte_size())
    }

    pub fn shader_sets(&self) -> &[String] {
        self.registry.sets()
    }

    pub fn active_shader_set(&self) -> &str {
        self.active.id()
    }

    pub fn active(&self) -> &ShaderSet<B> {
        &self.active
    }

    // Most recent failed edit, reload or reset; any later success clears it.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn record<T>(&mut self, result: Result<T, SimError>) -> Result<T, SimError> {
        self.last_error = result.as_ref().err().map(ToString::to_string);
        result
    }

    pub fn set_param(&mut self, id: ParamId, value: ParamValue) -> Result<(), SimError> {
        let result = self.params.set(id, value);
        self.record(result)?;
        if id.needs_reset() {
            log::info!("{} change takes effect on next reset", id.name());
        }
        self.active
            .push_bindings(&self.backend, self.simulation, &self.params, Some(id));
        Ok(())
    }

    pub fn select_shader_set(&mut self, id: &str) -> Result<(), SimError> {
        let built = ShaderSetBuilder::new(self.simulation, &self.registry, id).build(&self.backend);
        let mut candidate = match built {
            Ok(set) => set,
            Err(err) => {
                log::error!("{err}; keeping '{}'", self.active.id());
                return self.record(Err(err.into()));
            }
        };

        candidate.bind(
            &self.backend,
            &self.canvas.texture,
            self.agents.as_ref().map(|a| &a.buffer),
        );
        candidate.push_bindings(&self.backend, self.simulation, &self.params, None);

        self.active = candidate;
        self.params.set_shader_set(id);
        self.last_error = None;
        log::info!("Switched to shader set '{id}'");
        Ok(())
    }

    /// Recreate canvas and agent buffer from the current parameters.
    ///
    /// Everything that can fail runs before any resource is replaced.
    pub fn reset(&mut self) -> Result<(), SimError> {
        let limits = self.backend.limits();
        let desc = self.canvas.desc;
        let prepared = validate_canvas(&desc, &limits)
            .and_then(|_| validate_agent_count(self.simulation, &self.params, &limits))
            .and_then(|count| match count {
                Some(count) => Ok(Some(generate_agents(count, (desc.width, desc.height))?)),
                None => Ok(None),
            });
        let dataset = self.record(prepared)?;

        let canvas = CanvasState::create(&self.backend, desc);
        let agents = dataset.map(|d| AgentBufferState::create(&self.backend, &d));

        self.active.bind(
            &self.backend,
            &canvas.texture,
            agents.as_ref().map(|a| &a.buffer),
        );
        self.active
            .push_bindings(&self.backend, self.simulation, &self.params, None);

        // old storage is released here
        self.canvas = canvas;
        self.agents = agents;
        self.last_error = None;

        log::info!(
            "Reset {}: {} agents ({} bytes)",
            self.simulation.name(),
            self.active_agent_count(),
            self.agent_buffer_size()
        );
        Ok(())
    }

    pub fn render_frame(&mut self, frame: &mut B::Frame, timing: FrameTiming) {
        let agent_count = self.active_agent_count();
        self.active.encode(
            &self.backend,
            frame,
            timing,
            self.canvas.size(),
            agent_count,
            self.params.background(),
        );
    }

    // Called before the window closes.
    pub fn shutdown(&self, path: &Path) -> Result<(), SimError> {
        log::info!("Saving {} config to {}", self.simulation.name(), path.display());
        self.params.to_config().save_to_disk(path)
    }
}
