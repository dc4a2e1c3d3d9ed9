//! Solver Configuration
//!
//! Model, preprocessing and decoding settings stored in TOML format.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SolverError;
use crate::vision::alphabet::Alphabet;
use crate::vision::decode::DecodeOptions;
use crate::vision::engine::EngineConfig;
use crate::vision::models::ModelVariant;
use crate::vision::preprocess::PreprocessProfile;

/// Solver settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Model settings
    pub model: ModelSettings,
    /// Explicit preprocessing profile, overriding the variant preset
    pub preprocess: Option<PreprocessProfile>,
    /// Decoding settings
    pub decoding: DecodingSettings,
    /// Inference runtime settings
    pub runtime: RuntimeSettings,
}

/// Model-related settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Path to the ONNX model file
    pub path: Option<PathBuf>,
    /// Model variant (`stop_token`, `v1`..`v8`). Detected from the file name
    /// when unset.
    pub variant: Option<ModelVariant>,
    /// Model input name, when the model's declared name should not be used
    pub input_name: Option<String>,
}

/// Decoding-related settings. Unset values come from the model variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodingSettings {
    /// Symbols indexed by model class
    pub alphabet: Option<String>,
    /// Maximum characters kept from a greedy decode
    pub max_greedy_len: Option<usize>,
}

/// Inference runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self { intra_threads: 1 }
    }
}

impl SolverConfig {
    /// Model variant in effect: the configured one, else the one named by the
    /// model file, else the stop-token model
    pub fn variant(&self) -> ModelVariant {
        self.model
            .variant
            .or_else(|| {
                self.model
                    .path
                    .as_deref()
                    .and_then(ModelVariant::from_file_name)
            })
            .unwrap_or_default()
    }

    /// Preprocessing profile in effect: the explicit one, else the variant preset
    pub fn profile(&self) -> PreprocessProfile {
        self.preprocess.unwrap_or_else(|| self.variant().profile())
    }

    /// Alphabet in effect: the configured one, else the variant's
    pub fn alphabet(&self) -> Result<Alphabet, SolverError> {
        match &self.decoding.alphabet {
            Some(symbols) => Alphabet::new(symbols),
            None => Ok(self.variant().alphabet()),
        }
    }

    /// Greedy bound in effect: the configured one, else the variant's length
    pub fn max_greedy_len(&self) -> usize {
        self.decoding
            .max_greedy_len
            .unwrap_or_else(|| self.variant().sequence_len())
    }

    /// Check values that would make the engine unusable
    pub fn validate(&self) -> Result<(), SolverError> {
        self.profile()
            .validate()
            .map_err(|e| SolverError::Config(e.to_string()))?;
        self.alphabet()?;
        if self.max_greedy_len() == 0 {
            return Err(SolverError::Config("max_greedy_len must be at least 1".into()));
        }
        if self.runtime.intra_threads == 0 {
            return Err(SolverError::Config("intra_threads must be at least 1".into()));
        }
        Ok(())
    }

    /// Build the engine configuration
    pub fn engine_config(&self) -> Result<EngineConfig, SolverError> {
        self.validate()?;
        Ok(EngineConfig {
            profile: self.profile(),
            decode: DecodeOptions {
                alphabet: self.alphabet()?,
                max_greedy_len: self.max_greedy_len(),
            },
            input_name: self.model.input_name.clone(),
        })
    }
}

/// Default location of the configuration file
pub fn default_config_path() -> Result<PathBuf, SolverError> {
    let proj_dirs = directories::ProjectDirs::from("com", "captchasolver", "CaptchaSolver")
        .ok_or_else(|| SolverError::Config("could not determine config directory".into()))?;

    Ok(proj_dirs.config_dir().join("config.toml"))
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<SolverConfig, SolverError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| SolverError::Config(format!("cannot read {:?}: {}", path, e)))?;
    let config: SolverConfig =
        toml::from_str(&content).map_err(|e| SolverError::Config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &SolverConfig, path: &Path) -> Result<(), SolverError> {
    let content =
        toml::to_string_pretty(config).map_err(|e| SolverError::Config(e.to_string()))?;
    std::fs::write(path, content)
        .map_err(|e| SolverError::Config(format!("cannot write {:?}: {}", path, e)))?;
    Ok(())
}
