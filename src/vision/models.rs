//! Model handling for ONNX Runtime
//!
//! Model variant presets, model byte sources, and the ONNX Runtime backed
//! implementation of the inference contract.

use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{DynValue, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::SolverError;
use crate::vision::alphabet::Alphabet;
use crate::vision::decode::greedy::DEFAULT_MAX_GREEDY_LEN;
use crate::vision::preprocess::PreprocessProfile;
use crate::vision::runtime::{InferenceRuntime, InferenceSession, InputTensor, OutputTensor, TensorData};

/// Known captcha models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelVariant {
    /// Tokenizer-style model emitting [1, 26, 95] scores with a stop class
    #[default]
    StopToken,
    /// CRNN family model by version (v1-v8), emitting per-timestep class scores
    Classic(u8),
}

/// Highest known classic model version
pub const MAX_CLASSIC_VERSION: u8 = 8;

impl ModelVariant {
    /// Classic model by version, `None` for versions outside v1-v8
    pub fn classic(version: u8) -> Option<Self> {
        (1..=MAX_CLASSIC_VERSION)
            .contains(&version)
            .then_some(ModelVariant::Classic(version))
    }

    /// Preprocessing profile the variant was trained with
    pub fn profile(&self) -> PreprocessProfile {
        match self {
            ModelVariant::StopToken => PreprocessProfile::stop_token(),
            ModelVariant::Classic(_) => PreprocessProfile::classic(),
        }
    }

    /// Symbols the model was trained on. The CTC blank follows the last symbol.
    pub fn alphabet(&self) -> Alphabet {
        match self {
            ModelVariant::StopToken => Alphabet::alphanumeric(),
            ModelVariant::Classic(1 | 3 | 6) => Alphabet::letters_then_digits(),
            ModelVariant::Classic(2 | 7) => Alphabet::digits(),
            ModelVariant::Classic(4) => Alphabet::lowercase_digits(),
            ModelVariant::Classic(5 | 8) => Alphabet::uppercase_digits(),
            ModelVariant::Classic(_) => Alphabet::default(),
        }
    }

    /// Number of characters the model reads
    pub fn sequence_len(&self) -> usize {
        match self {
            ModelVariant::StopToken => DEFAULT_MAX_GREEDY_LEN,
            ModelVariant::Classic(6) => 4,
            ModelVariant::Classic(3 | 5 | 8) => 5,
            ModelVariant::Classic(_) => 6,
        }
    }

    /// Display name for logging
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelVariant::StopToken => "stop-token",
            ModelVariant::Classic(_) => "classic",
        }
    }

    /// Guess the variant from a model file name.
    ///
    /// `model.onnx` / `captcha.onnx` are stop-token models; names carrying a
    /// known version tag such as `captcha_model_v3.onnx` are classic models.
    pub fn from_file_name(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name == "model.onnx" || name == "captcha.onnx" {
            return Some(ModelVariant::StopToken);
        }

        let stem = name.strip_suffix(".onnx").unwrap_or(&name);
        stem.char_indices()
            .filter(|&(_, c)| c == 'v')
            .find_map(|(i, _)| {
                let digits: String = stem[i + 1..]
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                digits.parse::<u8>().ok()
            })
            .and_then(ModelVariant::classic)
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelVariant::StopToken => f.write_str("stop_token"),
            ModelVariant::Classic(version) => write!(f, "v{}", version),
        }
    }
}

impl FromStr for ModelVariant {
    type Err = SolverError;

    /// Parses `stop_token` or a classic version tag `v1`..`v8`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s == "stop_token" || s == "stop-token" {
            return Ok(ModelVariant::StopToken);
        }
        s.strip_prefix('v')
            .and_then(|version| version.parse::<u8>().ok())
            .and_then(ModelVariant::classic)
            .ok_or_else(|| {
                SolverError::Config(format!(
                    "unknown model variant '{}' (expected stop_token or v1-v{})",
                    s, MAX_CLASSIC_VERSION
                ))
            })
    }
}

impl TryFrom<String> for ModelVariant {
    type Error = SolverError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModelVariant> for String {
    fn from(variant: ModelVariant) -> Self {
        variant.to_string()
    }
}

/// Where the engine gets serialized model bytes from
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// Bytes already in memory (bundled asset)
    Bytes(Vec<u8>),
    /// Model file on disk
    File(PathBuf),
}

impl ModelSource {
    /// Load the model bytes. Missing, unreadable or empty models are a
    /// [`SolverError::ModelLoad`].
    pub fn load(&self) -> Result<Vec<u8>, SolverError> {
        let bytes = match self {
            ModelSource::Bytes(bytes) => bytes.clone(),
            ModelSource::File(path) => std::fs::read(path).map_err(|e| {
                SolverError::ModelLoad(format!("cannot read {:?}: {}", path, e))
            })?,
        };

        if bytes.is_empty() {
            return Err(SolverError::ModelLoad("model bytes are empty".into()));
        }

        debug!("Loaded {} model bytes from {}", bytes.len(), self.describe());
        Ok(bytes)
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            ModelSource::Bytes(bytes) => format!("memory ({} bytes)", bytes.len()),
            ModelSource::File(path) => format!("{:?}", path),
        }
    }
}

/// ONNX Runtime session factory
#[derive(Debug, Clone)]
pub struct OnnxRuntime {
    intra_threads: usize,
}

impl Default for OnnxRuntime {
    fn default() -> Self {
        Self { intra_threads: 1 }
    }
}

impl OnnxRuntime {
    /// Create a runtime using the given number of intra-op threads
    pub fn new(intra_threads: usize) -> Self {
        Self {
            intra_threads: intra_threads.max(1),
        }
    }
}

impl InferenceRuntime for OnnxRuntime {
    type Session = OnnxSession;

    fn create_session(&self, model_bytes: &[u8]) -> Result<OnnxSession, SolverError> {
        OnnxSession::from_memory(model_bytes, self.intra_threads)
    }

    fn close(&self, session: OnnxSession) {
        info!("Closing ONNX session (outputs: {:?})", session.output_names);
        drop(session);
    }
}

/// ONNX Runtime session wrapper
pub struct OnnxSession {
    session: Session,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl OnnxSession {
    /// Create a new ONNX session from serialized model bytes
    pub fn from_memory(model_bytes: &[u8], intra_threads: usize) -> Result<Self, SolverError> {
        info!("Loading ONNX model from memory ({} bytes)", model_bytes.len());

        let session = Session::builder()
            .map_err(init_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(init_err)?
            .with_intra_threads(intra_threads)
            .map_err(init_err)?
            .commit_from_memory(model_bytes)
            .map_err(init_err)?;

        let input_names: Vec<String> = session
            .inputs
            .iter()
            .map(|input| input.name.clone())
            .collect();

        let output_names: Vec<String> = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();

        info!(
            "Model loaded. Inputs: {:?}, Outputs: {:?}",
            input_names, output_names
        );

        Ok(Self {
            session,
            input_names,
            output_names,
        })
    }

    /// Get output names
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }
}

impl InferenceSession for OnnxSession {
    fn input_names(&self) -> Vec<String> {
        self.input_names.clone()
    }

    fn run(&mut self, input: InputTensor) -> Result<Vec<OutputTensor>, SolverError> {
        let tensor = Tensor::from_array(input.values)
            .map_err(|e| SolverError::Inference(format!("cannot build input tensor: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![input.name.as_str() => tensor])
            .map_err(|e| SolverError::Inference(e.to_string()))?;

        let mut tensors = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let data = extract_output(&outputs[name.as_str()])?;
            tensors.push(OutputTensor {
                name: name.clone(),
                data,
            });
        }

        Ok(tensors)
    }
}

/// Copy an output value out of the runtime, keeping floats as scores and
/// integers as indices
fn extract_output(value: &DynValue) -> Result<TensorData, SolverError> {
    if let Ok(view) = value.try_extract_array::<f32>() {
        return Ok(TensorData::Float(view.to_owned()));
    }
    if let Ok(view) = value.try_extract_array::<i64>() {
        return Ok(TensorData::Int(view.to_owned()));
    }
    if let Ok(view) = value.try_extract_array::<i32>() {
        return Ok(TensorData::Int(view.mapv(i64::from)));
    }
    if let Ok(view) = value.try_extract_array::<f64>() {
        return Ok(TensorData::Float(view.mapv(|v| v as f32)));
    }
    Err(SolverError::Inference(
        "output is not a float or integer tensor".into(),
    ))
}

fn init_err<E: std::fmt::Display>(e: E) -> SolverError {
    SolverError::InferenceInit(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_variant_profiles() {
        assert_eq!(ModelVariant::StopToken.profile(), PreprocessProfile::stop_token());
        assert_eq!(ModelVariant::Classic(3).profile(), PreprocessProfile::classic());
    }

    #[test]
    fn test_variant_from_file_name() {
        assert_eq!(
            ModelVariant::from_file_name(Path::new("assets/captcha.onnx")),
            Some(ModelVariant::StopToken)
        );
        assert_eq!(
            ModelVariant::from_file_name(Path::new("model.onnx")),
            Some(ModelVariant::StopToken)
        );
        assert_eq!(
            ModelVariant::from_file_name(Path::new("captcha_model_v5.onnx")),
            Some(ModelVariant::Classic(5))
        );
        assert_eq!(
            ModelVariant::from_file_name(Path::new("models/model_v2.onnx")),
            Some(ModelVariant::Classic(2))
        );
        assert_eq!(ModelVariant::from_file_name(Path::new("captcha_model_v9.onnx")), None);
        assert_eq!(ModelVariant::from_file_name(Path::new("solver.onnx")), None);
    }

    #[test]
    fn test_classic_alphabets_and_lengths() {
        let v1 = ModelVariant::Classic(1);
        assert_eq!(v1.alphabet(), Alphabet::letters_then_digits());
        assert_eq!(v1.alphabet().blank_index(), 62);
        assert_eq!(v1.sequence_len(), 6);

        let v2 = ModelVariant::Classic(2);
        assert_eq!(v2.alphabet(), Alphabet::digits());
        assert_eq!(v2.alphabet().blank_index(), 10);

        let v4 = ModelVariant::Classic(4);
        assert_eq!(v4.alphabet(), Alphabet::lowercase_digits());
        assert_eq!(v4.alphabet().blank_index(), 36);

        assert_eq!(ModelVariant::Classic(5).alphabet(), Alphabet::uppercase_digits());
        assert_eq!(ModelVariant::Classic(5).sequence_len(), 5);
        assert_eq!(ModelVariant::Classic(6).sequence_len(), 4);
        assert_eq!(ModelVariant::StopToken.alphabet(), Alphabet::default());
    }

    #[test]
    fn test_variant_parse_and_display() {
        assert_eq!("stop_token".parse::<ModelVariant>().unwrap(), ModelVariant::StopToken);
        assert_eq!("V7".parse::<ModelVariant>().unwrap(), ModelVariant::Classic(7));
        assert_eq!(ModelVariant::Classic(4).to_string(), "v4");
        assert!("v0".parse::<ModelVariant>().is_err());
        assert!("classic".parse::<ModelVariant>().is_err());
        assert_eq!(ModelVariant::classic(9), None);
    }

    #[test]
    fn test_model_source_bytes() {
        let source = ModelSource::Bytes(vec![1, 2, 3]);
        assert_eq!(source.load().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_model_source_empty_bytes() {
        let result = ModelSource::Bytes(Vec::new()).load();
        assert!(matches!(result, Err(SolverError::ModelLoad(_))));
    }

    #[test]
    fn test_model_source_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"onnx").unwrap();

        let source = ModelSource::File(file.path().to_path_buf());
        assert_eq!(source.load().unwrap(), b"onnx".to_vec());
    }

    #[test]
    fn test_model_source_missing_file() {
        let source = ModelSource::File(PathBuf::from("/nonexistent/captcha.onnx"));
        let err = source.load().unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_garbage_model_fails_session_creation() {
        let result = OnnxRuntime::default().create_session(b"definitely not onnx");
        assert!(matches!(result, Err(SolverError::InferenceInit(_))));
    }
}
