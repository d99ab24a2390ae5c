// Visual Simulations - GPU Compute Canvas Orchestrator
// Copyright (c) 2025 Visual Simulations contributors
// Licensed under MIT License

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::{ConfigLoadError, SimError};
use crate::simulation::Simulation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderSection {
    /// Most recently used shader set (directory name under the variant's resources).
    pub directory: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorSection {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl ColorSection {
    pub fn rgb(&self) -> [f32; 3] {
        [self.red, self.green, self.blue]
    }

    pub fn from_rgb([red, green, blue]: [f32; 3]) -> Self {
        Self { red, green, blue }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlimeSection {
    pub number_of_agents: i64,
    pub movement_speed: f32,
    pub rotation_speed: f32,
    pub sensor_angle: f32, // radians
    pub sensor_distance: i64,
    pub sensor_size: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlurSection {
    pub diffusion_speed: f32,
    pub evaporation_speed: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MandelbrotSection {
    pub center_x: f32,
    pub center_y: f32,
    pub zoom: f32,
    pub max_iterations: i64,
}

/// Everything a simulation window persists between runs.
///
/// Every key of a present section is required; variant-specific sections are
/// checked by [`ConfigRecord::load_for`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub compute_shader: ShaderSection,
    pub color_fg: ColorSection,
    pub color_bg: ColorSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slime: Option<SlimeSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur: Option<BlurSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mandelbrot: Option<MandelbrotSection>,
}

impl ConfigRecord {
    pub fn load_from_disk(path: &Path) -> Result<Self, ConfigLoadError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_for(simulation: Simulation, path: &Path) -> Result<Self, ConfigLoadError> {
        log::info!("Reading config {}", path.display());
        let record = Self::load_from_disk(path)?;
        if let Some(section) = record.missing_section(simulation) {
            return Err(ConfigLoadError::MissingSection {
                path: path.to_path_buf(),
                section,
            });
        }
        Ok(record)
    }

    pub fn missing_section(&self, simulation: Simulation) -> Option<&'static str> {
        match simulation {
            Simulation::TextureShader => None,
            Simulation::SlimeMold if self.slime.is_none() => Some("slime"),
            Simulation::SlimeMold if self.blur.is_none() => Some("blur"),
            Simulation::SlimeMold => None,
            Simulation::Mandelbrot if self.mandelbrot.is_none() => Some("mandelbrot"),
            Simulation::Mandelbrot => None,
        }
    }

    pub fn save_to_disk(&self, path: &Path) -> Result<(), SimError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| SimError::ConfigSave {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| SimError::ConfigSave {
            path: path.to_path_buf(),
            source,
        })
    }

    #[cfg(test)]
    pub fn defaults(simulation: Simulation) -> Self {
        let mut record = Self {
            compute_shader: ShaderSection {
                directory: "classic".to_string(),
            },
            color_fg: ColorSection::from_rgb([1.0, 1.0, 1.0]),
            color_bg: ColorSection::from_rgb([0.0, 0.0, 0.0]),
            slime: None,
            blur: None,
            mandelbrot: None,
        };
        match simulation {
            Simulation::TextureShader => {}
            Simulation::SlimeMold => {
                record.slime = Some(SlimeSection {
                    number_of_agents: 1000,
                    movement_speed: 40.0,
                    rotation_speed: 6.0,
                    sensor_angle: 0.5,
                    sensor_distance: 9,
                    sensor_size: 1,
                });
                record.blur = Some(BlurSection {
                    diffusion_speed: 10.0,
                    evaporation_speed: 0.5,
                });
            }
            Simulation::Mandelbrot => {
                record.mandelbrot = Some(MandelbrotSection {
                    center_x: -0.5,
                    center_y: 0.0,
                    zoom: 1.0,
                    max_iterations: 256,
                });
            }
        }
        record
    }
}
