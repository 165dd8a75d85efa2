//! Generator Configuration
//!
//! Everything a run needs is carried in one [`GeneratorConfig`] value and
//! threaded explicitly into the agents; nothing is read from process-wide
//! state once the config is built.

use std::path::{Path, PathBuf};

use agent_core::GenerationOptions;
use serde::{Deserialize, Serialize};

use crate::error::{GeneratorError, Result};

/// How source and destination directories relate
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationLayout {
    /// Read from `source_dir`, write only under `dest_dir`
    #[default]
    Separate,
    /// One root for both; Terraform lands in `<source_dir>/<output_subdir>`
    Shared,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Project to analyze (read-only)
    pub source_dir: PathBuf,
    
    /// Only directory the write tool may touch
    pub dest_dir: PathBuf,
    
    pub layout: DestinationLayout,
    
    /// Folder under the destination that receives the Terraform tree
    pub output_subdir: String,
    
    /// Global agent step budget
    pub max_rounds: usize,
    
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    
    /// Prompt size estimate above which old turns are dropped
    pub max_context_tokens: Option<u32>,
    
    /// Route generated scripts to the script runner
    pub execute_scripts: bool,
    pub script_timeout_secs: u64,
    
    /// How often a failed execution goes back to the generator
    pub execution_retries: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            dest_dir: PathBuf::from("."),
            layout: DestinationLayout::Separate,
            output_subdir: "terraform".into(),
            max_rounds: 100,
            model: "llama3.2".into(),
            temperature: 0.0,
            max_tokens: 16000,
            max_context_tokens: None,
            execute_scripts: false,
            script_timeout_secs: 120,
            execution_retries: 3,
        }
    }
}

/// Canonical, existing directories a run operates on
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedDirs {
    pub source: PathBuf,
    pub dest: PathBuf,
}

impl GeneratorConfig {
    pub fn new(source_dir: impl Into<PathBuf>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            dest_dir: dest_dir.into(),
            ..Default::default()
        }
    }
    
    /// Defaults overridden by `SOURCE_REPO_DIR`, `DEST_REPO_DIR`, `MODEL_NAME`
    /// and `MAX_ROUNDS`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("SOURCE_REPO_DIR") {
            config.source_dir = dir.into();
        }
        if let Ok(dir) = std::env::var("DEST_REPO_DIR") {
            config.dest_dir = dir.into();
        }
        if let Ok(model) = std::env::var("MODEL_NAME") {
            config.model = model;
        }
        if let Some(rounds) = std::env::var("MAX_ROUNDS").ok().and_then(|r| r.parse().ok()) {
            config.max_rounds = rounds;
        }
        config
    }
    
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
    
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            GeneratorError::Configuration(format!("Cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&text)
    }
    
    /// Options shared by every generative agent of a run
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions::default()
            .with_model(self.model.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }
    
    /// Check both directories exist and canonicalize them
    pub fn resolve_dirs(&self) -> Result<ResolvedDirs> {
        let source = existing_dir("source", &self.source_dir)?;
        let dest = match self.layout {
            DestinationLayout::Separate => existing_dir("destination", &self.dest_dir)?,
            DestinationLayout::Shared => source.clone(),
        };
        
        if self.max_rounds == 0 {
            return Err(GeneratorError::Configuration("max_rounds must be at least 1".into()));
        }
        if self.output_subdir.contains("..") || Path::new(&self.output_subdir).is_absolute() {
            return Err(GeneratorError::Configuration(format!(
                "output_subdir must be a relative folder name, got '{}'",
                self.output_subdir
            )));
        }
        
        Ok(ResolvedDirs { source, dest })
    }
}

fn existing_dir(kind: &str, path: &Path) -> Result<PathBuf> {
    let canonical = path.canonicalize().map_err(|e| {
        GeneratorError::Configuration(format!("{} directory {} is not accessible: {}", kind, path.display(), e))
    })?;
    if !canonical.is_dir() {
        return Err(GeneratorError::Configuration(format!(
            "{} path {} is not a directory",
            kind,
            path.display()
        )));
    }
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GeneratorConfig::default();
        assert_eq!(config.max_rounds, 100);
        assert_eq!(config.output_subdir, "terraform");
        let options = config.generation_options();
        assert_eq!(options.temperature, 0.0);
        assert_eq!(options.max_tokens, 16000);
    }

    #[test]
    fn test_toml_overrides() {
        let config = GeneratorConfig::from_toml_str(
            r#"
            source_dir = "/src"
            dest_dir = "/out"
            layout = "shared"
            max_rounds = 40
            execute_scripts = true
            "#,
        )
        .unwrap();
        assert_eq!(config.layout, DestinationLayout::Shared);
        assert_eq!(config.max_rounds, 40);
        assert!(config.execute_scripts);
        assert_eq!(config.script_timeout_secs, 120);

        assert!(GeneratorConfig::from_toml_str("max_rounds = \"many\"").unwrap_err().is_configuration());
    }

    #[test]
    fn test_resolve_dirs() {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();

        let dirs = GeneratorConfig::new(source.path(), dest.path()).resolve_dirs().unwrap();
        assert_eq!(dirs.source, source.path().canonicalize().unwrap());
        assert_eq!(dirs.dest, dest.path().canonicalize().unwrap());

        let mut shared = GeneratorConfig::new(source.path(), "/does/not/matter");
        shared.layout = DestinationLayout::Shared;
        assert_eq!(shared.resolve_dirs().unwrap().dest, dirs.source);

        let missing = GeneratorConfig::new(source.path(), dest.path().join("nope"));
        assert!(matches!(missing.resolve_dirs(), Err(GeneratorError::Configuration(_))));

        let file = source.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(GeneratorConfig::new(&file, dest.path()).resolve_dirs().is_err());

        let mut escaping = GeneratorConfig::new(source.path(), dest.path());
        escaping.output_subdir = "../elsewhere".into();
        assert!(escaping.resolve_dirs().is_err());
    }
}
