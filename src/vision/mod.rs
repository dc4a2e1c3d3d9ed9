//! Vision Layer
//!
//! Turns a captcha image into text by running it through a trained sequence
//! model and decoding whatever output layout that model uses:
//! - stop-token models ([1, 26, 95] scores)
//! - CTC-style models, time-major or batch-major
//! - models emitting class indices directly
//! - flat score vectors of unknown layout

pub mod alphabet;
pub mod decode;
pub mod engine;
pub mod frame;
pub mod models;
pub mod preprocess;
pub mod runtime;

pub use alphabet::Alphabet;
pub use decode::{DecodeOptions, OutputFormat};
pub use engine::{CaptchaEngine, EngineConfig, EngineState};
pub use frame::CaptchaImage;
pub use models::{ModelSource, ModelVariant, OnnxRuntime, OnnxSession};
pub use preprocess::{ColorMode, Normalization, PreprocessProfile};
pub use runtime::{InferenceRuntime, InferenceSession, InputTensor, OutputTensor, TensorData};

/// Engine backed by ONNX Runtime
pub type OnnxCaptchaEngine = CaptchaEngine<OnnxRuntime>;
