// Visual Simulations - GPU Compute Canvas Orchestrator
// Copyright (c) 2025 Visual Simulations contributors
// Licensed under MIT License

//! Static description of each simulation variant: canvas size, compute passes in
//! dispatch order, the uniforms each pass declares and which parameters feed them.

use std::path::{Path, PathBuf};

use crate::params::ParamId;
use crate::uniforms::{UniformField, UniformKind};

pub const VERTEX_SHADER_FILE: &str = "vertex_shader.wgsl";
pub const FRAGMENT_SHADER_FILE: &str = "fragment_shader.wgsl";

// Must match @workgroup_size in the compute shaders.
pub const CANVAS_WG_SIZE_X: u32 = 16;
pub const CANVAS_WG_SIZE_Y: u32 = 16;
pub const AGENT_WG_SIZE: u32 = 64;

pub const WINDOW_SIZE: (u32, u32) = (1440, 720);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Simulation {
    TextureShader,
    SlimeMold,
    Mandelbrot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// One invocation per canvas pixel.
    Canvas,
    /// One invocation per agent.
    Agents,
}

impl Dispatch {
    pub fn workgroups(self, canvas: (u32, u32), agent_count: usize) -> [u32; 3] {
        match self {
            Dispatch::Canvas => [
                canvas.0.div_ceil(CANVAS_WG_SIZE_X),
                canvas.1.div_ceil(CANVAS_WG_SIZE_Y),
                1,
            ],
            Dispatch::Agents => {
                let groups = (agent_count as u64).div_ceil(AGENT_WG_SIZE as u64);
                [u32::try_from(groups).unwrap_or(u32::MAX), 1, 1]
            }
        }
    }
}

#[derive(Debug)]
pub struct PassSpec {
    pub name: &'static str,
    pub file: &'static str,
    pub dispatch: Dispatch,
    pub uniforms: &'static [UniformField],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindDiscipline {
    /// Pushed when a program is (re)loaded or the simulation is reset.
    LoadOnce,
    /// Additionally pushed every time the UI changes the value.
    OnChange,
}

#[derive(Debug)]
pub struct ParamBinding {
    pub param: ParamId,
    pub pass: &'static str,
    pub uniform: &'static str,
    pub discipline: BindDiscipline,
}

const fn bind(
    param: ParamId,
    pass: &'static str,
    uniform: &'static str,
    discipline: BindDiscipline,
) -> ParamBinding {
    ParamBinding {
        param,
        pass,
        uniform,
        discipline,
    }
}

const TEXTURE_PASSES: &[PassSpec] = &[PassSpec {
    name: "compute",
    file: "compute_shader.wgsl",
    dispatch: Dispatch::Canvas,
    uniforms: &[
        UniformField::new("clr_fg", UniformKind::Vec3),
        UniformField::new("time", UniformKind::F32),
        UniformField::new("frame_time", UniformKind::F32),
    ],
}];

// Blur runs first so freshly drawn agents stay at full brightness.
const SLIME_PASSES: &[PassSpec] = &[
    PassSpec {
        name: "blur",
        file: "blur_compute_shader.wgsl",
        dispatch: Dispatch::Canvas,
        uniforms: &[
            UniformField::new("diffusion_speed", UniformKind::F32),
            UniformField::new("evaporation_speed", UniformKind::F32),
            UniformField::new("frame_time", UniformKind::F32),
            UniformField::new("time", UniformKind::F32),
        ],
    },
    PassSpec {
        name: "slime",
        file: "slime_compute_shader.wgsl",
        dispatch: Dispatch::Agents,
        uniforms: &[
            UniformField::new("clr_fg", UniformKind::Vec3),
            UniformField::new("movement_speed", UniformKind::F32),
            UniformField::new("rotation_speed", UniformKind::F32),
            UniformField::new("sensor_angle", UniformKind::F32),
            UniformField::new("sensor_distance", UniformKind::I32),
            UniformField::new("sensor_size", UniformKind::I32),
            UniformField::new("frame_time", UniformKind::F32),
            UniformField::new("time", UniformKind::F32),
        ],
    },
];

const MANDELBROT_PASSES: &[PassSpec] = &[PassSpec {
    name: "compute",
    file: "compute_shader.wgsl",
    dispatch: Dispatch::Canvas,
    uniforms: &[
        UniformField::new("clr_fg", UniformKind::Vec3),
        UniformField::new("time", UniformKind::F32),
        UniformField::new("center_x", UniformKind::F32),
        UniformField::new("center_y", UniformKind::F32),
        UniformField::new("zoom", UniformKind::F32),
        UniformField::new("max_iterations", UniformKind::U32),
        UniformField::new("frame_time", UniformKind::F32),
    ],
}];

const TEXTURE_BINDINGS: &[ParamBinding] = &[bind(
    ParamId::ForegroundColor,
    "compute",
    "clr_fg",
    BindDiscipline::OnChange,
)];

const SLIME_BINDINGS: &[ParamBinding] = &[
    bind(ParamId::ForegroundColor, "slime", "clr_fg", BindDiscipline::OnChange),
    bind(ParamId::DiffusionSpeed, "blur", "diffusion_speed", BindDiscipline::OnChange),
    bind(ParamId::EvaporationSpeed, "blur", "evaporation_speed", BindDiscipline::OnChange),
    bind(ParamId::MovementSpeed, "slime", "movement_speed", BindDiscipline::LoadOnce),
    bind(ParamId::RotationSpeed, "slime", "rotation_speed", BindDiscipline::LoadOnce),
    bind(ParamId::SensorAngle, "slime", "sensor_angle", BindDiscipline::LoadOnce),
    bind(ParamId::SensorDistance, "slime", "sensor_distance", BindDiscipline::LoadOnce),
    bind(ParamId::SensorSize, "slime", "sensor_size", BindDiscipline::LoadOnce),
];

const MANDELBROT_BINDINGS: &[ParamBinding] = &[
    bind(ParamId::ForegroundColor, "compute", "clr_fg", BindDiscipline::OnChange),
    bind(ParamId::CenterX, "compute", "center_x", BindDiscipline::OnChange),
    bind(ParamId::CenterY, "compute", "center_y", BindDiscipline::OnChange),
    bind(ParamId::Zoom, "compute", "zoom", BindDiscipline::OnChange),
    bind(ParamId::MaxIterations, "compute", "max_iterations", BindDiscipline::OnChange),
];

impl Simulation {
    pub const ALL: [Simulation; 3] = [
        Simulation::TextureShader,
        Simulation::SlimeMold,
        Simulation::Mandelbrot,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|sim| sim.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Simulation::TextureShader => "texture_shader",
            Simulation::SlimeMold => "slime_mold",
            Simulation::Mandelbrot => "mandelbrot",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Simulation::TextureShader => "Visual Simulations - Texture Shaders",
            Simulation::SlimeMold => "Visual Simulations - Slime Mold Simulations",
            Simulation::Mandelbrot => "Visual Simulations - Mandelbrot Set",
        }
    }

    pub fn canvas_size(self) -> (u32, u32) {
        match self {
            Simulation::TextureShader => (1920, 1080),
            Simulation::SlimeMold => (720, 360),
            Simulation::Mandelbrot => (1440, 720),
        }
    }

    pub fn uses_agents(self) -> bool {
        matches!(self, Simulation::SlimeMold)
    }

    pub fn passes(self) -> &'static [PassSpec] {
        match self {
            Simulation::TextureShader => TEXTURE_PASSES,
            Simulation::SlimeMold => SLIME_PASSES,
            Simulation::Mandelbrot => MANDELBROT_PASSES,
        }
    }

    pub fn bindings(self) -> &'static [ParamBinding] {
        match self {
            Simulation::TextureShader => TEXTURE_BINDINGS,
            Simulation::SlimeMold => SLIME_BINDINGS,
            Simulation::Mandelbrot => MANDELBROT_BINDINGS,
        }
    }

    /// Parameters tracked for this variant, in UI order.
    pub fn tunables(self) -> &'static [ParamId] {
        match self {
            Simulation::TextureShader => &[ParamId::ForegroundColor, ParamId::BackgroundColor],
            Simulation::SlimeMold => &[
                ParamId::ForegroundColor,
                ParamId::BackgroundColor,
                ParamId::AgentCount,
                ParamId::MovementSpeed,
                ParamId::RotationSpeed,
                ParamId::SensorAngle,
                ParamId::SensorDistance,
                ParamId::SensorSize,
                ParamId::DiffusionSpeed,
                ParamId::EvaporationSpeed,
            ],
            Simulation::Mandelbrot => &[
                ParamId::ForegroundColor,
                ParamId::BackgroundColor,
                ParamId::CenterX,
                ParamId::CenterY,
                ParamId::Zoom,
                ParamId::MaxIterations,
            ],
        }
    }

    pub fn resource_dir(self, root: &Path) -> PathBuf {
        root.join("resources").join(self.name())
    }

    pub fn config_path(self, root: &Path) -> PathBuf {
        root.join("config").join(format!("{}.json", self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uniforms::UniformLayout;

    #[test]
    fn names_round_trip() {
        for sim in Simulation::ALL {
            assert_eq!(Simulation::from_name(sim.name()), Some(sim));
        }
        assert_eq!(Simulation::from_name("game_of_life"), None);
    }

    #[test]
    fn canvas_dispatch_rounds_up() {
        assert_eq!(Dispatch::Canvas.workgroups((720, 360), 0), [45, 23, 1]);
        assert_eq!(Dispatch::Canvas.workgroups((1, 1), 0), [1, 1, 1]);
    }

    #[test]
    fn agent_dispatch_sized_from_count() {
        assert_eq!(Dispatch::Agents.workgroups((720, 360), 100), [2, 1, 1]);
        assert_eq!(Dispatch::Agents.workgroups((720, 360), 128), [2, 1, 1]);
        assert_eq!(Dispatch::Agents.workgroups((720, 360), 0), [0, 1, 1]);
    }

    #[test]
    fn blur_precedes_agent_update() {
        let names: Vec<_> = Simulation::SlimeMold.passes().iter().map(|p| p.name).collect();
        assert_eq!(names, ["blur", "slime"]);
    }

    #[test]
    fn every_binding_targets_a_declared_uniform() {
        for sim in Simulation::ALL {
            for binding in sim.bindings() {
                let pass = sim
                    .passes()
                    .iter()
                    .find(|p| p.name == binding.pass)
                    .unwrap_or_else(|| panic!("{}: no pass {}", sim.name(), binding.pass));
                let layout = UniformLayout::new(pass.uniforms);
                assert!(
                    layout.offset_of(binding.uniform).is_some(),
                    "{}: {} does not declare {}",
                    sim.name(),
                    pass.name,
                    binding.uniform
                );
                assert!(sim.tunables().contains(&binding.param));
            }
        }
    }
}
