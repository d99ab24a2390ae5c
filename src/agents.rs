// Visual Simulations - GPU Compute Canvas Orchestrator
// Copyright (c) 2025 Visual Simulations contributors
// Licensed under MIT License

use bytemuck::{Pod, Zeroable};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

use crate::error::SimError;

/// One slime agent as laid out in the WGSL `array<Agent>` (std430, 16-byte stride).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct AgentRecord {
    pub position: [f32; 2],
    pub heading: f32, // radians
    pub _pad: f32,
}

// Keep host layout in sync with `struct Agent` in slime_compute_shader.wgsl.
const _: [(); 16] = [(); std::mem::size_of::<AgentRecord>()];

pub const AGENT_STRIDE: u64 = std::mem::size_of::<AgentRecord>() as u64;

impl AgentRecord {
    pub fn new(position: [f32; 2], heading: f32) -> Self {
        Self {
            position,
            heading,
            _pad: 0.0,
        }
    }
}

/// Spawn `count` agents at the canvas centre with random headings.
///
/// Negative counts are rejected; zero yields an empty dataset.
pub fn generate_agents(count: i64, dimensions: (u32, u32)) -> Result<Vec<AgentRecord>, SimError> {
    let count = usize::try_from(count)
        .map_err(|_| SimError::invalid("number_of_agents", format!("{count} is negative")))?;
    Ok(generate_agents_with(count, dimensions, &mut rand::thread_rng()))
}

/// Deterministic variant for reproducible runs.
pub fn generate_agents_seeded(count: usize, dimensions: (u32, u32), seed: u64) -> Vec<AgentRecord> {
    generate_agents_with(count, dimensions, &mut StdRng::seed_from_u64(seed))
}

pub fn generate_agents_with<R: Rng + ?Sized>(
    count: usize,
    dimensions: (u32, u32),
    rng: &mut R,
) -> Vec<AgentRecord> {
    // All agents start in the middle; there is no spatial distribution.
    let centre = [dimensions.0 as f32 / 2.0, dimensions.1 as f32 / 2.0];
    (0..count)
        .map(|_| AgentRecord::new(centre, rng.gen_range(0.0..TAU)))
        .collect()
}
