//! Pixel buffer handed to the engine by the calling workflow

use image::DynamicImage;

use crate::error::SolverError;

/// A decoded captcha image
///
/// Samples are 8-bit and interleaved, row-major. One channel means grayscale,
/// three channels means RGB.
#[derive(Debug, Clone)]
pub struct CaptchaImage {
    /// Raw pixel data
    pub data: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Samples per pixel (1 or 3)
    pub channels: u8,
}

impl CaptchaImage {
    /// Wrap raw grayscale or RGB samples, checking that the buffer matches the
    /// declared dimensions
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Result<Self, SolverError> {
        let image = Self {
            data,
            width,
            height,
            channels,
        };
        image.validate()?;
        Ok(image)
    }

    /// Build from an already decoded image. Images with an alpha channel or
    /// 16-bit samples are flattened to 8-bit RGB; luma images stay single-channel.
    pub fn from_dynamic(img: &DynamicImage) -> Result<Self, SolverError> {
        match img {
            DynamicImage::ImageLuma8(gray) => {
                Self::new(gray.as_raw().clone(), gray.width(), gray.height(), 1)
            }
            other => {
                let rgb = other.to_rgb8();
                let (width, height) = rgb.dimensions();
                Self::new(rgb.into_raw(), width, height, 3)
            }
        }
    }

    /// Get image dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Check the preconditions preprocessing relies on
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.width == 0 || self.height == 0 {
            return Err(SolverError::InvalidInput(format!(
                "image has zero size ({}x{})",
                self.width, self.height
            )));
        }
        if self.channels != 1 && self.channels != 3 {
            return Err(SolverError::InvalidInput(format!(
                "unsupported channel count {} (expected 1 or 3)",
                self.channels
            )));
        }
        let expected = self.width as usize * self.height as usize * self.channels as usize;
        if self.data.len() != expected {
            return Err(SolverError::InvalidInput(format!(
                "pixel buffer holds {} bytes, expected {} for {}x{}x{}",
                self.data.len(),
                expected,
                self.width,
                self.height,
                self.channels
            )));
        }
        Ok(())
    }

    /// Convert into an `image` crate buffer for resampling
    pub(crate) fn to_dynamic(&self) -> Result<DynamicImage, SolverError> {
        self.validate()?;
        let converted = match self.channels {
            1 => image::GrayImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageLuma8),
            _ => image::RgbImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageRgb8),
        };
        converted.ok_or_else(|| SolverError::InvalidInput("pixel buffer does not fit image".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_valid_rgb() {
        let img = CaptchaImage::new(vec![0; 4 * 2 * 3], 4, 2, 3).unwrap();
        assert_eq!(img.dimensions(), (4, 2));
    }

    #[test]
    fn test_zero_size_rejected() {
        let result = CaptchaImage::new(vec![], 0, 10, 1);
        assert!(matches!(result, Err(SolverError::InvalidInput(_))));
    }

    #[test]
    fn test_buffer_mismatch_rejected() {
        let result = CaptchaImage::new(vec![0; 5], 2, 2, 1);
        assert!(matches!(result, Err(SolverError::InvalidInput(_))));
    }

    #[test]
    fn test_unsupported_channels_rejected() {
        let result = CaptchaImage::new(vec![0; 16], 2, 2, 4);
        assert!(matches!(result, Err(SolverError::InvalidInput(_))));
    }

    #[test]
    fn test_from_dynamic_keeps_luma() {
        let gray = image::GrayImage::from_pixel(3, 2, image::Luma([200]));
        let img = CaptchaImage::from_dynamic(&DynamicImage::ImageLuma8(gray)).unwrap();
        assert_eq!(img.channels, 1);
        assert_eq!(img.data, vec![200; 6]);
    }

    #[test]
    fn test_from_dynamic_drops_alpha() {
        let rgba = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]));
        let img = CaptchaImage::from_dynamic(&DynamicImage::ImageRgba8(rgba)).unwrap();
        assert_eq!(img.channels, 3);
        assert_eq!(&img.data[..3], &[10, 20, 30]);
    }
}
