// Visual Simulations - GPU Compute Canvas Orchestrator
// Copyright (c) 2025 Visual Simulations contributors
// Licensed under MIT License

//! Live parameter values shared between the overlay, the orchestrator and the config file.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::ops::RangeInclusive;

use crate::config::{
    BlurSection, ColorSection, ConfigRecord, MandelbrotSection, ShaderSection, SlimeSection,
};
use crate::error::SimError;
use crate::simulation::Simulation;
use crate::uniforms::{UniformKind, UniformValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParamId {
    ForegroundColor,
    BackgroundColor,
    AgentCount,
    MovementSpeed,
    RotationSpeed,
    SensorAngle,
    SensorDistance,
    SensorSize,
    DiffusionSpeed,
    EvaporationSpeed,
    CenterX,
    CenterY,
    Zoom,
    MaxIterations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Scalar,
    Integer,
    Color,
}

impl ParamId {
    pub fn name(self) -> &'static str {
        match self {
            ParamId::ForegroundColor => "color_fg",
            ParamId::BackgroundColor => "color_bg",
            ParamId::AgentCount => "number_of_agents",
            ParamId::MovementSpeed => "movement_speed",
            ParamId::RotationSpeed => "rotation_speed",
            ParamId::SensorAngle => "sensor_angle",
            ParamId::SensorDistance => "sensor_distance",
            ParamId::SensorSize => "sensor_size",
            ParamId::DiffusionSpeed => "diffusion_speed",
            ParamId::EvaporationSpeed => "evaporation_speed",
            ParamId::CenterX => "center_x",
            ParamId::CenterY => "center_y",
            ParamId::Zoom => "zoom",
            ParamId::MaxIterations => "max_iterations",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ParamId::ForegroundColor => "Foreground",
            ParamId::BackgroundColor => "Background",
            ParamId::AgentCount => "Number of agents",
            ParamId::MovementSpeed => "Movement speed",
            ParamId::RotationSpeed => "Rotation speed",
            ParamId::SensorAngle => "Sensor angle",
            ParamId::SensorDistance => "Sensor distance",
            ParamId::SensorSize => "Sensor size",
            ParamId::DiffusionSpeed => "Diffusion speed",
            ParamId::EvaporationSpeed => "Evaporation speed",
            ParamId::CenterX => "Center X",
            ParamId::CenterY => "Center Y",
            ParamId::Zoom => "Zoom",
            ParamId::MaxIterations => "Max iterations",
        }
    }

    pub fn kind(self) -> ParamKind {
        match self {
            ParamId::ForegroundColor | ParamId::BackgroundColor => ParamKind::Color,
            ParamId::AgentCount
            | ParamId::SensorDistance
            | ParamId::SensorSize
            | ParamId::MaxIterations => ParamKind::Integer,
            _ => ParamKind::Scalar,
        }
    }

    /// Accepted range; for colors it applies to each channel.
    pub fn range(self) -> RangeInclusive<f64> {
        match self {
            ParamId::ForegroundColor | ParamId::BackgroundColor => 0.0..=1.0,
            ParamId::AgentCount => 1.0..=1_000_000.0,
            ParamId::MovementSpeed => 0.0..=500.0,
            ParamId::RotationSpeed => 0.0..=50.0,
            ParamId::SensorAngle => 0.0..=PI,
            ParamId::SensorDistance => 0.0..=100.0,
            ParamId::SensorSize => 0.0..=10.0,
            ParamId::DiffusionSpeed | ParamId::EvaporationSpeed => 0.0..=100.0,
            ParamId::CenterX | ParamId::CenterY => -2.5..=2.5,
            ParamId::Zoom => 0.1..=100_000.0,
            ParamId::MaxIterations => 1.0..=10_000.0,
        }
    }

    pub fn needs_reset(self) -> bool {
        matches!(self, ParamId::AgentCount)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Scalar(f32),
    Integer(i64),
    Color([f32; 3]),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Scalar(_) => ParamKind::Scalar,
            ParamValue::Integer(_) => ParamKind::Integer,
            ParamValue::Color(_) => ParamKind::Color,
        }
    }

    /// Convert for a uniform slot of `kind`.
    ///
    /// Integers follow the slot's signedness and saturate; anything else keeps its
    /// natural representation and is rejected by the uniform block if it doesn't fit.
    pub fn to_uniform(self, kind: UniformKind) -> UniformValue {
        match self {
            ParamValue::Scalar(v) => UniformValue::F32(v),
            ParamValue::Integer(v) => match kind {
                UniformKind::U32 => UniformValue::U32(v.clamp(0, u32::MAX as i64) as u32),
                UniformKind::F32 => UniformValue::F32(v as f32),
                _ => UniformValue::I32(v.clamp(i32::MIN as i64, i32::MAX as i64) as i32),
            },
            ParamValue::Color(rgb) => UniformValue::Vec3(rgb),
        }
    }

    fn in_range(&self, range: &RangeInclusive<f64>) -> bool {
        match self {
            ParamValue::Scalar(v) => v.is_finite() && range.contains(&(*v as f64)),
            ParamValue::Integer(v) => range.contains(&(*v as f64)),
            ParamValue::Color(rgb) => rgb
                .iter()
                .all(|c| c.is_finite() && range.contains(&(*c as f64))),
        }
    }

    fn clamped(self, range: &RangeInclusive<f64>) -> Self {
        let clamp = |v: f32| {
            if v.is_finite() {
                (v as f64).clamp(*range.start(), *range.end()) as f32
            } else {
                *range.start() as f32
            }
        };
        match self {
            ParamValue::Scalar(v) => ParamValue::Scalar(clamp(v)),
            ParamValue::Integer(v) => {
                ParamValue::Integer(v.clamp(*range.start() as i64, *range.end() as i64))
            }
            ParamValue::Color(rgb) => ParamValue::Color(rgb.map(clamp)),
        }
    }
}

/// Current value of every tunable parameter of one simulation, plus the MRU shader set.
///
/// Values always lie inside [`ParamId::range`]: loading clamps, [`ParameterState::set`]
/// rejects.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterState {
    simulation: Simulation,
    shader_set: String,
    values: BTreeMap<ParamId, ParamValue>,
}

impl ParameterState {
    pub fn from_config(simulation: Simulation, record: &ConfigRecord) -> Result<Self, SimError> {
        let mut state = Self {
            simulation,
            shader_set: record.compute_shader.directory.clone(),
            values: BTreeMap::new(),
        };
        state.load(ParamId::ForegroundColor, ParamValue::Color(record.color_fg.rgb()));
        state.load(ParamId::BackgroundColor, ParamValue::Color(record.color_bg.rgb()));

        match simulation {
            Simulation::TextureShader => {}
            Simulation::SlimeMold => {
                let slime = record
                    .slime
                    .as_ref()
                    .ok_or_else(|| SimError::invalid("slime", "section missing from config"))?;
                let blur = record
                    .blur
                    .as_ref()
                    .ok_or_else(|| SimError::invalid("blur", "section missing from config"))?;
                state.load(ParamId::AgentCount, ParamValue::Integer(slime.number_of_agents));
                state.load(ParamId::MovementSpeed, ParamValue::Scalar(slime.movement_speed));
                state.load(ParamId::RotationSpeed, ParamValue::Scalar(slime.rotation_speed));
                state.load(ParamId::SensorAngle, ParamValue::Scalar(slime.sensor_angle));
                state.load(ParamId::SensorDistance, ParamValue::Integer(slime.sensor_distance));
                state.load(ParamId::SensorSize, ParamValue::Integer(slime.sensor_size));
                state.load(ParamId::DiffusionSpeed, ParamValue::Scalar(blur.diffusion_speed));
                state.load(ParamId::EvaporationSpeed, ParamValue::Scalar(blur.evaporation_speed));
            }
            Simulation::Mandelbrot => {
                let m = record
                    .mandelbrot
                    .as_ref()
                    .ok_or_else(|| SimError::invalid("mandelbrot", "section missing from config"))?;
                state.load(ParamId::CenterX, ParamValue::Scalar(m.center_x));
                state.load(ParamId::CenterY, ParamValue::Scalar(m.center_y));
                state.load(ParamId::Zoom, ParamValue::Scalar(m.zoom));
                state.load(ParamId::MaxIterations, ParamValue::Integer(m.max_iterations));
            }
        }
        Ok(state)
    }

    // Config values outside the accepted range are clamped rather than refused.
    fn load(&mut self, id: ParamId, value: ParamValue) {
        let range = id.range();
        let clamped = value.clamped(&range);
        if clamped != value {
            log::warn!(
                "Config value {} = {:?} outside {:?}, clamped to {:?}",
                id.name(),
                value,
                range,
                clamped
            );
        }
        self.values.insert(id, clamped);
    }

    pub fn to_config(&self) -> ConfigRecord {
        let scalar = |id| self.scalar(id).unwrap_or_default();
        let integer = |id| self.integer(id).unwrap_or_default();

        let (slime, blur) = match self.simulation {
            Simulation::SlimeMold => (
                Some(SlimeSection {
                    number_of_agents: integer(ParamId::AgentCount),
                    movement_speed: scalar(ParamId::MovementSpeed),
                    rotation_speed: scalar(ParamId::RotationSpeed),
                    sensor_angle: scalar(ParamId::SensorAngle),
                    sensor_distance: integer(ParamId::SensorDistance),
                    sensor_size: integer(ParamId::SensorSize),
                }),
                Some(BlurSection {
                    diffusion_speed: scalar(ParamId::DiffusionSpeed),
                    evaporation_speed: scalar(ParamId::EvaporationSpeed),
                }),
            ),
            _ => (None, None),
        };
        let mandelbrot = match self.simulation {
            Simulation::Mandelbrot => Some(MandelbrotSection {
                center_x: scalar(ParamId::CenterX),
                center_y: scalar(ParamId::CenterY),
                zoom: scalar(ParamId::Zoom),
                max_iterations: integer(ParamId::MaxIterations),
            }),
            _ => None,
        };

        ConfigRecord {
            compute_shader: ShaderSection {
                directory: self.shader_set.clone(),
            },
            color_fg: ColorSection::from_rgb(self.foreground()),
            color_bg: ColorSection::from_rgb(self.background()),
            slime,
            blur,
            mandelbrot,
        }
    }

    pub fn simulation(&self) -> Simulation {
        self.simulation
    }

    pub fn get(&self, id: ParamId) -> Option<ParamValue> {
        self.values.get(&id).copied()
    }

    pub fn scalar(&self, id: ParamId) -> Option<f32> {
        match self.get(id)? {
            ParamValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn integer(&self, id: ParamId) -> Option<i64> {
        match self.get(id)? {
            ParamValue::Integer(v) => Some(v),
            _ => None,
        }
    }

    pub fn color(&self, id: ParamId) -> Option<[f32; 3]> {
        match self.get(id)? {
            ParamValue::Color(v) => Some(v),
            _ => None,
        }
    }

    // On error nothing changes.
    pub fn set(&mut self, id: ParamId, value: ParamValue) -> Result<(), SimError> {
        if !self.simulation.tunables().contains(&id) {
            return Err(SimError::invalid(
                id.name(),
                format!("not a parameter of {}", self.simulation.name()),
            ));
        }
        if value.kind() != id.kind() {
            return Err(SimError::invalid(
                id.name(),
                format!("expected {:?}, got {:?}", id.kind(), value.kind()),
            ));
        }
        let range = id.range();
        if !value.in_range(&range) {
            return Err(SimError::invalid(
                id.name(),
                format!("{value:?} outside {range:?}"),
            ));
        }
        self.values.insert(id, value);
        Ok(())
    }

    pub fn shader_set(&self) -> &str {
        &self.shader_set
    }

    pub fn set_shader_set(&mut self, id: impl Into<String>) {
        self.shader_set = id.into();
    }

    pub fn foreground(&self) -> [f32; 3] {
        self.color(ParamId::ForegroundColor).unwrap_or([1.0; 3])
    }

    pub fn background(&self) -> [f32; 3] {
        self.color(ParamId::BackgroundColor).unwrap_or([0.0; 3])
    }

    /// Agent count that the next reset will allocate. Not the live buffer size.
    pub fn pending_agent_count(&self) -> Option<i64> {
        self.integer(ParamId::AgentCount)
    }
}
