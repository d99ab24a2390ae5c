// Visual Simulations - GPU Compute Canvas Orchestrator
// Copyright (c) 2025 Visual Simulations contributors
// Licensed under MIT License

use std::path::PathBuf;

// Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("config {path} is missing the [{section}] section")]
    MissingSection { path: PathBuf, section: &'static str },
}

/// A requested shader set could not be built. The previously active set stays in force.
#[derive(Debug, thiserror::Error)]
pub enum ShaderCompileError {
    #[error("shader set '{set}' is not registered")]
    UnknownSet { set: String },

    #[error("shader set '{set}' is missing {}: {source}", file.display())]
    MissingSource {
        set: String,
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} in shader set '{set}' failed to compile: {message}")]
    Compile {
        set: String,
        program: String,
        message: String,
    },
}

/// A program does not accept a uniform input. Logged, never fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniformBindError {
    #[error("{program} does not declare uniform '{name}'")]
    Missing { program: String, name: String },

    #[error("uniform '{name}' of {program} is {expected}, got {got}")]
    TypeMismatch {
        program: String,
        name: String,
        expected: &'static str,
        got: &'static str,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    ConfigLoad(#[from] ConfigLoadError),

    #[error(transparent)]
    ShaderCompile(#[from] ShaderCompileError),

    #[error(transparent)]
    UniformBind(#[from] UniformBindError),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("failed to write config {path}: {source}")]
    ConfigSave {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize config: {0}")]
    ConfigSerialize(#[from] serde_json::Error),

    #[error("failed to scan shader sets under {root}: {source}")]
    ShaderSetScan {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no shader set under {root} could be loaded")]
    NoShaderSet { root: PathBuf },
}

impl SimError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        SimError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GpuInitError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Failed to create window surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("Failed to request GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("Adapter does not support read-write {0:?} storage textures")]
    MissingFeature(wgpu::TextureFormat),
}
