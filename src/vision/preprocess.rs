//! Image preprocessing for captcha models
//!
//! Handles resizing, channel selection, normalization, and tensor conversion.
//! Every model variant is described by a [`PreprocessProfile`]; the profile alone
//! decides the tensor shape, never the source image.

use image::imageops::FilterType;
use ndarray::{Array3, Array4};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SolverError;
use crate::vision::frame::CaptchaImage;

/// Channel layout expected by a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    /// Single luma channel
    Grayscale,
    /// Three channels, R G B order
    Rgb,
}

impl ColorMode {
    /// Number of tensor channels for this mode
    pub fn channels(&self) -> usize {
        match self {
            ColorMode::Grayscale => 1,
            ColorMode::Rgb => 3,
        }
    }
}

/// Value range the model was trained on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// pixel / 255
    ZeroToOne,
    /// (pixel / 255 - 0.5) / 0.5
    MinusOneToOne,
}

impl Normalization {
    /// Inclusive bounds of normalized values
    pub fn range(&self) -> (f32, f32) {
        match self {
            Normalization::ZeroToOne => (0.0, 1.0),
            Normalization::MinusOneToOne => (-1.0, 1.0),
        }
    }

    /// Mean and std applied after scaling to [0, 1]
    fn mean_std(&self) -> (f32, f32) {
        match self {
            Normalization::ZeroToOne => (0.0, 1.0),
            Normalization::MinusOneToOne => (0.5, 0.5),
        }
    }
}

/// Preprocessing configuration for one model variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessProfile {
    /// Target tensor width
    pub width: u32,
    /// Target tensor height
    pub height: u32,
    /// Grayscale or RGB input
    pub color: ColorMode,
    /// Normalization range
    pub normalization: Normalization,
}

impl PreprocessProfile {
    /// Tokenizer-style models with a stop class: 128x32 RGB mapped to [-1, 1]
    pub fn stop_token() -> Self {
        Self {
            width: 128,
            height: 32,
            color: ColorMode::Rgb,
            normalization: Normalization::MinusOneToOne,
        }
    }

    /// CRNN family models: 200x50 grayscale in [0, 1]
    pub fn classic() -> Self {
        Self {
            width: 200,
            height: 50,
            color: ColorMode::Grayscale,
            normalization: Normalization::ZeroToOne,
        }
    }

    /// Tensor shape produced by this profile: [1, channels, height, width]
    pub fn tensor_shape(&self) -> [usize; 4] {
        [
            1,
            self.color.channels(),
            self.height as usize,
            self.width as usize,
        ]
    }

    /// Reject profiles that would produce an empty tensor
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.width == 0 || self.height == 0 {
            return Err(SolverError::InvalidInput(format!(
                "preprocessing profile declares a zero-sized tensor ({}x{})",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Resample to the profile size and convert to an HWC array scaled to [0, 1]
fn resample_to_hwc(image: &CaptchaImage, profile: &PreprocessProfile) -> Result<Array3<f32>, SolverError> {
    let source = image.to_dynamic()?;
    let (w, h) = (profile.width, profile.height);

    let (samples, channels) = match profile.color {
        ColorMode::Grayscale => {
            // Collapse to luma before sampling
            let gray = image::DynamicImage::ImageLuma8(source.to_luma8());
            let resized = gray.resize_exact(w, h, FilterType::Triangle).to_luma8();
            (resized.into_raw(), 1)
        }
        ColorMode::Rgb => {
            let resized = source.resize_exact(w, h, FilterType::Triangle).to_rgb8();
            (resized.into_raw(), 3)
        }
    };

    let hwc = Array3::from_shape_vec((h as usize, w as usize, channels), samples)
        .map_err(|e| SolverError::InvalidInput(format!("resampled buffer has wrong size: {}", e)))?;

    Ok(hwc.mapv(|v| v as f32 / 255.0))
}

/// Normalize image with a single mean and std shared by all channels
pub fn normalize(image: &Array3<f32>, normalization: Normalization) -> Array3<f32> {
    let (mean, std) = normalization.mean_std();
    image.mapv(|v| (v - mean) / std)
}

/// Convert HWC image to NCHW tensor (batch size 1)
pub fn hwc_to_nchw(image: &Array3<f32>) -> Array4<f32> {
    let (h, w, c) = image.dim();
    let mut tensor = Array4::<f32>::zeros((1, c, h, w));

    for y in 0..h {
        for x in 0..w {
            for ch in 0..c {
                tensor[[0, ch, y, x]] = image[[y, x, ch]];
            }
        }
    }

    tensor
}

/// Full preprocessing pipeline: resize, select channels, normalize, NCHW
pub fn preprocess(image: &CaptchaImage, profile: &PreprocessProfile) -> Result<Array4<f32>, SolverError> {
    profile.validate()?;
    image.validate()?;

    let hwc = resample_to_hwc(image, profile)?;
    let normalized = normalize(&hwc, profile.normalization);
    let tensor = hwc_to_nchw(&normalized);

    debug!(
        "Preprocessed {}x{}x{} image into tensor {:?}",
        image.width,
        image.height,
        image.channels,
        tensor.shape()
    );

    Ok(tensor)
}
