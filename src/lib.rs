//! Captcha Solver - captcha recognition with trained sequence models
//!
//! Preprocesses a captcha image for a given model variant, runs it through an
//! inference runtime, detects the output layout and decodes it to text.

pub mod config;
pub mod error;
pub mod vision;

pub use config::SolverConfig;
pub use error::SolverError;
pub use vision::{CaptchaEngine, CaptchaImage, ModelSource, OnnxCaptchaEngine, OnnxRuntime};
