//! Captcha recognition engine
//!
//! Sequences preprocessing, inference, output classification and decoding,
//! and owns the inference session for its whole life.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::SolverError;
use crate::vision::decode::{decode_output, DecodeOptions};
use crate::vision::frame::CaptchaImage;
use crate::vision::models::ModelSource;
use crate::vision::preprocess::{preprocess, PreprocessProfile};
use crate::vision::runtime::{InferenceRuntime, InferenceSession, InputTensor};

/// Input name used when neither the configuration nor the model declares one
const FALLBACK_INPUT_NAME: &str = "input";

/// Lifecycle state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No session; the next call initializes lazily
    Uninitialized,
    /// Session loaded and idle
    Ready,
    /// A recognition call is running the session
    Busy,
}

/// Engine settings fixed at construction
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Preprocessing profile of the loaded model
    pub profile: PreprocessProfile,
    /// Decoding settings
    pub decode: DecodeOptions,
    /// Explicit model input name, overriding the one declared by the model
    pub input_name: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profile: PreprocessProfile::stop_token(),
            decode: DecodeOptions::default(),
            input_name: None,
        }
    }
}

/// Captcha recognition engine over an inference runtime
pub struct CaptchaEngine<R: InferenceRuntime> {
    runtime: R,
    model: ModelSource,
    config: EngineConfig,
    session: Mutex<Option<R::Session>>,
    loaded: AtomicBool,
    running: AtomicBool,
}

impl<R: InferenceRuntime> CaptchaEngine<R> {
    /// Create an uninitialized engine. No model bytes are read until
    /// [`initialize`](Self::initialize) or the first recognition.
    pub fn new(runtime: R, model: ModelSource, config: EngineConfig) -> Self {
        Self {
            runtime,
            model,
            config,
            session: Mutex::new(None),
            loaded: AtomicBool::new(false),
            running: AtomicBool::new(false),
        }
    }

    /// Get the engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current lifecycle state. Never blocks; initialization and release in
    /// progress are reported by the state they started from.
    pub fn state(&self) -> EngineState {
        if self.running.load(Ordering::Acquire) {
            EngineState::Busy
        } else if self.loaded.load(Ordering::Acquire) {
            EngineState::Ready
        } else {
            EngineState::Uninitialized
        }
    }

    /// Load the model and create the session. A no-op when already ready.
    /// On failure the engine stays uninitialized and may be retried.
    pub fn initialize(&self) -> Result<(), SolverError> {
        let mut slot = self.session.lock();
        self.ensure_session(&mut slot)?;
        Ok(())
    }

    /// Close the session. A no-op when uninitialized.
    pub fn release(&self) {
        let session = {
            let mut slot = self.session.lock();
            self.loaded.store(false, Ordering::Release);
            slot.take()
        };
        if let Some(session) = session {
            info!("Releasing captcha model session");
            self.runtime.close(session);
        }
    }

    /// Recognize the text in a captcha image.
    ///
    /// An empty string is a valid answer meaning the model had no confident
    /// reading.
    pub fn recognize(&self, image: &CaptchaImage) -> Result<String, SolverError> {
        let start = Instant::now();

        let values = preprocess(image, &self.config.profile)?;

        let mut slot = self.session.lock();
        let session = self.ensure_session(&mut slot)?;

        let name = self.resolve_input_name(session);
        self.running.store(true, Ordering::Release);
        let outputs = session.run(InputTensor { name, values });
        self.running.store(false, Ordering::Release);
        drop(slot);
        let outputs = outputs?;

        let Some(output) = outputs.first() else {
            return Err(SolverError::Inference("model produced no outputs".into()));
        };
        debug!(
            "Model returned {} output(s); decoding {:?} with shape {:?}",
            outputs.len(),
            output.name,
            output.data.shape()
        );

        let text = decode_output(&output.data, &self.config.decode)?;

        debug!("Recognized {:?} in {:?}", text, start.elapsed());
        Ok(text)
    }

    fn ensure_session<'a>(
        &self,
        slot: &'a mut Option<R::Session>,
    ) -> Result<&'a mut R::Session, SolverError> {
        if slot.is_none() {
            info!("Initializing captcha model from {}", self.model.describe());
            let bytes = self.model.load()?;
            let session = self.runtime.create_session(&bytes).map_err(|e| {
                warn!("Captcha model session creation failed: {}", e);
                e
            })?;
            *slot = Some(session);
            self.loaded.store(true, Ordering::Release);
        }

        slot.as_mut()
            .ok_or_else(|| SolverError::InferenceInit("session unavailable".into()))
    }

    fn resolve_input_name(&self, session: &R::Session) -> String {
        if let Some(name) = &self.config.input_name {
            return name.clone();
        }
        session
            .input_names()
            .into_iter()
            .next()
            .unwrap_or_else(|| FALLBACK_INPUT_NAME.to_string())
    }
}

impl<R: InferenceRuntime> Drop for CaptchaEngine<R> {
    fn drop(&mut self) {
        self.release();
    }
}
