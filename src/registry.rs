// Visual Simulations - GPU Compute Canvas Orchestrator
// Copyright (c) 2025 Visual Simulations contributors
// Licensed under MIT License

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ShaderCompileError, SimError};
use crate::simulation::{PassSpec, Simulation, FRAGMENT_SHADER_FILE, VERTEX_SHADER_FILE};

/// Shader sets available for one simulation: every subdirectory of its resource root.
#[derive(Debug, Clone)]
pub struct ShaderSetRegistry {
    root: PathBuf,
    sets: Vec<String>,
}

/// Raw sources of one shader set, compute sources in pass order.
#[derive(Debug)]
pub struct ShaderSetSources {
    pub id: String,
    pub vertex: String,
    pub fragment: String,
    pub compute: Vec<(&'static PassSpec, String)>,
}

impl ShaderSetRegistry {
    pub fn scan(root: impl Into<PathBuf>) -> Result<Self, SimError> {
        let root = root.into();
        let scan_err = |source| SimError::ShaderSetScan {
            root: root.clone(),
            source,
        };

        let mut sets = Vec::new();
        for entry in fs::read_dir(&root).map_err(scan_err)? {
            let entry = entry.map_err(scan_err)?;
            if !entry.file_type().map_err(scan_err)?.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => sets.push(name),
                Err(name) => log::warn!("Skipping non UTF-8 shader set {:?}", name),
            }
        }
        sets.sort();

        log::info!("Found {} shader set(s) in {}: {:?}", sets.len(), root.display(), sets);
        Ok(Self { root, sets })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sets(&self) -> &[String] {
        &self.sets
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sets.iter().any(|s| s == id)
    }

    /// Read every file `simulation` expects from set `id`. Any missing file fails the set.
    pub fn read_sources(
        &self,
        simulation: Simulation,
        id: &str,
    ) -> Result<ShaderSetSources, ShaderCompileError> {
        if !self.contains(id) {
            return Err(ShaderCompileError::UnknownSet { set: id.to_string() });
        }
        let dir = self.root.join(id);
        let read = |file: &str| {
            let path = dir.join(file);
            fs::read_to_string(&path).map_err(|source| ShaderCompileError::MissingSource {
                set: id.to_string(),
                file: path,
                source,
            })
        };

        let vertex = read(VERTEX_SHADER_FILE)?;
        let fragment = read(FRAGMENT_SHADER_FILE)?;
        let compute = simulation
            .passes()
            .iter()
            .map(|pass| Ok((pass, read(pass.file)?)))
            .collect::<Result<Vec<_>, ShaderCompileError>>()?;

        Ok(ShaderSetSources {
            id: id.to_string(),
            vertex,
            fragment,
            compute,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_backend::fixtures;

    #[test]
    fn scan_lists_directories_sorted() {
        let root = fixtures::shader_root("scan_sorted", Simulation::SlimeMold, &["glow", "classic"]);
        fs::write(root.join("README.txt"), "not a set").unwrap();
        let registry = ShaderSetRegistry::scan(&root).unwrap();
        assert_eq!(registry.sets(), ["classic", "glow"]);
        assert!(registry.contains("glow"));
        assert!(!registry.contains("README.txt"));
    }

    #[test]
    fn scan_of_missing_root_fails() {
        let root = std::env::temp_dir().join("visual-simulations-no-such-root");
        assert!(matches!(
            ShaderSetRegistry::scan(root),
            Err(SimError::ShaderSetScan { .. })
        ));
    }

    #[test]
    fn sources_follow_pass_order() {
        let root = fixtures::shader_root("pass_order", Simulation::SlimeMold, &["classic"]);
        let registry = ShaderSetRegistry::scan(&root).unwrap();
        let sources = registry.read_sources(Simulation::SlimeMold, "classic").unwrap();
        let files: Vec<_> = sources.compute.iter().map(|(pass, _)| pass.file).collect();
        assert_eq!(files, ["blur_compute_shader.wgsl", "slime_compute_shader.wgsl"]);
        assert!(sources.vertex.contains("vs_main"));
    }

    #[test]
    fn missing_file_fails_the_set() {
        let root = fixtures::shader_root("missing_file", Simulation::SlimeMold, &["broken"]);
        fs::remove_file(root.join("broken").join("slime_compute_shader.wgsl")).unwrap();
        let registry = ShaderSetRegistry::scan(&root).unwrap();
        let err = registry.read_sources(Simulation::SlimeMold, "broken").unwrap_err();
        assert!(matches!(err, ShaderCompileError::MissingSource { .. }));
    }

    #[test]
    fn unknown_set_is_rejected() {
        let root = fixtures::shader_root("unknown_set", Simulation::TextureShader, &["waves"]);
        let registry = ShaderSetRegistry::scan(&root).unwrap();
        assert!(matches!(
            registry.read_sources(Simulation::TextureShader, "plasma"),
            Err(ShaderCompileError::UnknownSet { .. })
        ));
    }
}
