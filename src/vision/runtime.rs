//! Contract with the model executor
//!
//! The engine only depends on these traits. [`crate::vision::models::OnnxRuntime`]
//! implements them with ONNX Runtime; tests use in-memory fakes.

use ndarray::{Array4, ArrayD};

use crate::error::{ElementKind, SolverError};

/// Named model input, shaped [1, channels, height, width]
#[derive(Debug, Clone)]
pub struct InputTensor {
    pub name: String,
    pub values: Array4<f32>,
}

/// Raw output values, typed by element kind
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    /// Scores: logits or probabilities
    Float(ArrayD<f32>),
    /// Class indices
    Int(ArrayD<i64>),
}

impl TensorData {
    pub fn shape(&self) -> &[usize] {
        match self {
            TensorData::Float(a) => a.shape(),
            TensorData::Int(a) => a.shape(),
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            TensorData::Float(_) => ElementKind::Float,
            TensorData::Int(_) => ElementKind::Int,
        }
    }
}

/// Named model output
#[derive(Debug, Clone)]
pub struct OutputTensor {
    pub name: String,
    pub data: TensorData,
}

/// A loaded model ready to run
pub trait InferenceSession: Send {
    /// Declared input names, in model order
    fn input_names(&self) -> Vec<String>;

    /// Run the model on one input. Runtime failures come back as
    /// [`SolverError::Inference`].
    fn run(&mut self, input: InputTensor) -> Result<Vec<OutputTensor>, SolverError>;
}

/// Factory for sessions
pub trait InferenceRuntime: Send + Sync {
    type Session: InferenceSession;

    /// Create a session from serialized model bytes. Failures come back as
    /// [`SolverError::InferenceInit`].
    fn create_session(&self, model_bytes: &[u8]) -> Result<Self::Session, SolverError>;

    /// Close a session, releasing everything it holds
    fn close(&self, session: Self::Session) {
        drop(session);
    }
}
