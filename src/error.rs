//! Error types for the captcha recognition engine

use thiserror::Error;

/// Element kind of a raw model output, used for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Floating point scores (logits or probabilities)
    Float,
    /// Integer class indices
    Int,
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementKind::Float => f.write_str("float"),
            ElementKind::Int => f.write_str("int"),
        }
    }
}

/// Failure reported by the recognition engine
#[derive(Debug, Error)]
pub enum SolverError {
    /// Malformed or empty image, or an unusable preprocessing profile
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Model bytes missing or unreadable
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The inference runtime could not create a session
    #[error("failed to initialize inference session: {0}")]
    InferenceInit(String),

    /// The model output matched none of the known layouts
    #[error("unrecognized output format: {kind} tensor with shape {shape:?}")]
    UnrecognizedOutputFormat { shape: Vec<usize>, kind: ElementKind },

    /// Every fallback class count failed to produce text
    #[error("could not decode flat output of length {len}: no candidate class count produced text")]
    DecodeAmbiguous { len: usize },

    /// Failure raised by the inference runtime while running the model
    #[error("inference failed: {0}")]
    Inference(String),

    /// Invalid configuration file or values
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SolverError {
    /// Errors that mean solving is unavailable until the engine is re-initialized
    /// with corrected inputs
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SolverError::ModelLoad(_) | SolverError::InferenceInit(_))
    }

    /// Errors that mean the model ran but its output could not be turned into text
    pub fn is_decode_failure(&self) -> bool {
        matches!(
            self,
            SolverError::UnrecognizedOutputFormat { .. } | SolverError::DecodeAmbiguous { .. }
        )
    }
}
