//! Output decoding
//!
//! Model variants disagree on output layout, so the raw output tensor is first
//! classified into one of a closed set of formats by its shape and element
//! kind, then handed to the decoder for that format.

pub mod direct_index;
pub mod fallback;
pub mod greedy;
pub mod stop_token;

use ndarray::{ArrayView1, ArrayView2, ArrayView3, Axis, Ix1, Ix2, Ix3};
use tracing::{debug, warn};

use crate::error::{ElementKind, SolverError};
use crate::vision::alphabet::Alphabet;
use crate::vision::runtime::TensorData;

use self::stop_token::{STOP_TOKEN_CLASSES, STOP_TOKEN_STEPS};

/// Known output layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// [1, 26, 95] float scores, class 0 = stop
    StopToken,
    /// [T, 1, C] float scores, time leading
    TimeMajor,
    /// [B, T, C] float scores, batch leading
    BatchMajor,
    /// [B, T] integer class indices
    DirectIndex,
    /// Flat float vector of unknown layout
    Flat,
}

impl OutputFormat {
    /// Pick the layout for a shape and element kind.
    ///
    /// Rules are checked in priority order so shapes matching several loose
    /// patterns always resolve the same way. `None` means no known layout.
    pub fn from_shape(shape: &[usize], kind: ElementKind) -> Option<Self> {
        match (kind, shape) {
            (ElementKind::Float, [_, _, 0]) => None,
            (ElementKind::Float, &[1, STOP_TOKEN_STEPS, STOP_TOKEN_CLASSES]) => {
                Some(OutputFormat::StopToken)
            }
            (ElementKind::Float, &[t, 1, _]) if t > 1 => Some(OutputFormat::TimeMajor),
            (ElementKind::Float, &[b, _, _]) if b > 0 => Some(OutputFormat::BatchMajor),
            (ElementKind::Int, &[b, _]) if b > 0 => Some(OutputFormat::DirectIndex),
            (ElementKind::Float, [_]) => Some(OutputFormat::Flat),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::StopToken => "stop-token",
            OutputFormat::TimeMajor => "time-major",
            OutputFormat::BatchMajor => "batch-major",
            OutputFormat::DirectIndex => "direct-index",
            OutputFormat::Flat => "flat",
        }
    }
}

/// An output tensor viewed through its classified layout
#[derive(Debug)]
pub enum ClassifiedOutput<'a> {
    StopToken(ArrayView2<'a, f32>),
    TimeMajor(ArrayView3<'a, f32>),
    BatchMajor(ArrayView3<'a, f32>),
    DirectIndex(ArrayView1<'a, i64>),
    Flat(ArrayView1<'a, f32>),
}

impl ClassifiedOutput<'_> {
    pub fn format(&self) -> OutputFormat {
        match self {
            ClassifiedOutput::StopToken(_) => OutputFormat::StopToken,
            ClassifiedOutput::TimeMajor(_) => OutputFormat::TimeMajor,
            ClassifiedOutput::BatchMajor(_) => OutputFormat::BatchMajor,
            ClassifiedOutput::DirectIndex(_) => OutputFormat::DirectIndex,
            ClassifiedOutput::Flat(_) => OutputFormat::Flat,
        }
    }
}

/// Classify a raw output once, producing typed views for the decoders
pub fn classify(data: &TensorData) -> Result<ClassifiedOutput<'_>, SolverError> {
    let unrecognized = || {
        warn!(
            "Unrecognized output format: {} tensor with shape {:?}",
            data.kind(),
            data.shape()
        );
        SolverError::UnrecognizedOutputFormat {
            shape: data.shape().to_vec(),
            kind: data.kind(),
        }
    };

    let Some(format) = OutputFormat::from_shape(data.shape(), data.kind()) else {
        return Err(unrecognized());
    };

    let classified = match (format, data) {
        (OutputFormat::StopToken, TensorData::Float(a)) => a
            .view()
            .into_dimensionality::<Ix3>()
            .map(|v| ClassifiedOutput::StopToken(v.index_axis_move(Axis(0), 0))),
        (OutputFormat::TimeMajor, TensorData::Float(a)) => a
            .view()
            .into_dimensionality::<Ix3>()
            .map(ClassifiedOutput::TimeMajor),
        (OutputFormat::BatchMajor, TensorData::Float(a)) => a
            .view()
            .into_dimensionality::<Ix3>()
            .map(ClassifiedOutput::BatchMajor),
        (OutputFormat::DirectIndex, TensorData::Int(a)) => a
            .view()
            .into_dimensionality::<Ix2>()
            .map(|v| ClassifiedOutput::DirectIndex(v.index_axis_move(Axis(0), 0))),
        (OutputFormat::Flat, TensorData::Float(a)) => a
            .view()
            .into_dimensionality::<Ix1>()
            .map(ClassifiedOutput::Flat),
        _ => return Err(unrecognized()),
    };

    classified.map_err(|_| unrecognized())
}

/// Decoding settings shared by every format
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Symbol set for class indices
    pub alphabet: Alphabet,
    /// Cap applied to greedy decodes
    pub max_greedy_len: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            alphabet: Alphabet::default(),
            max_greedy_len: greedy::DEFAULT_MAX_GREEDY_LEN,
        }
    }
}

/// Decode a classified output into text
pub fn decode_classified(output: ClassifiedOutput<'_>, options: &DecodeOptions) -> Result<String, SolverError> {
    let alphabet = &options.alphabet;
    let max_len = options.max_greedy_len;

    let text = match output {
        ClassifiedOutput::StopToken(scores) => stop_token::decode(scores, alphabet),
        ClassifiedOutput::TimeMajor(scores) => greedy::decode_time_major(scores, alphabet, max_len),
        ClassifiedOutput::BatchMajor(scores) => greedy::decode_batch_major(scores, alphabet, max_len),
        ClassifiedOutput::DirectIndex(indices) => direct_index::decode(indices, alphabet),
        ClassifiedOutput::Flat(flat) => fallback::decode(flat, alphabet, max_len)?,
    };

    Ok(text)
}

/// Classify and decode a raw output tensor
pub fn decode_output(data: &TensorData, options: &DecodeOptions) -> Result<String, SolverError> {
    log_output_stats(data);

    let classified = classify(data)?;
    let format = classified.format();
    let text = decode_classified(classified, options)?;

    debug!("Decoded {} output {:?} to {:?}", format.name(), data.shape(), text);
    Ok(text)
}

/// Log value statistics of float outputs
fn log_output_stats(data: &TensorData) {
    let TensorData::Float(values) = data else {
        return;
    };
    if values.is_empty() {
        return;
    }

    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mean = values.iter().sum::<f32>() / values.len() as f32;

    debug!(
        "Output stats: min={:.4}, max={:.4}, mean={:.4} ({})",
        min,
        max,
        mean,
        if min < 0.0 { "logits" } else { "probabilities" }
    );
}

/// One-hot [T, C] scores for an arg-max sequence
#[cfg(test)]
pub(crate) fn one_hot(classes: &[usize], num_classes: usize) -> ndarray::Array2<f32> {
    let mut scores = ndarray::Array2::<f32>::zeros((classes.len(), num_classes));
    for (t, &c) in classes.iter().enumerate() {
        scores[[t, c]] = 1.0;
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2, Array3, ArrayD, IxDyn};

    fn float(shape: &[usize]) -> TensorData {
        TensorData::Float(ArrayD::zeros(IxDyn(shape)))
    }

    #[test]
    fn test_from_shape_priority() {
        use ElementKind::{Float, Int};

        assert_eq!(OutputFormat::from_shape(&[1, 26, 95], Float), Some(OutputFormat::StopToken));
        assert_eq!(OutputFormat::from_shape(&[26, 1, 95], Float), Some(OutputFormat::TimeMajor));
        assert_eq!(OutputFormat::from_shape(&[8, 1, 63], Float), Some(OutputFormat::TimeMajor));
        assert_eq!(OutputFormat::from_shape(&[1, 8, 63], Float), Some(OutputFormat::BatchMajor));
        // A single timestep is batch-major, not time-major
        assert_eq!(OutputFormat::from_shape(&[1, 1, 63], Float), Some(OutputFormat::BatchMajor));
        assert_eq!(OutputFormat::from_shape(&[1, 26, 96], Float), Some(OutputFormat::BatchMajor));
        assert_eq!(OutputFormat::from_shape(&[1, 6], Int), Some(OutputFormat::DirectIndex));
        assert_eq!(OutputFormat::from_shape(&[378], Float), Some(OutputFormat::Flat));
    }

    #[test]
    fn test_from_shape_rejects_unknown() {
        use ElementKind::{Float, Int};

        assert_eq!(OutputFormat::from_shape(&[1, 378], Float), None);
        assert_eq!(OutputFormat::from_shape(&[6], Int), None);
        assert_eq!(OutputFormat::from_shape(&[1, 1, 6, 63], Float), None);
        assert_eq!(OutputFormat::from_shape(&[1, 26, 95], Int), None);
        assert_eq!(OutputFormat::from_shape(&[1, 8, 0], Float), None);
        assert_eq!(OutputFormat::from_shape(&[0, 6], Int), None);
        assert_eq!(OutputFormat::from_shape(&[], Float), None);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let shapes: [&[usize]; 5] = [&[1, 26, 95], &[7, 1, 11], &[1, 7, 11], &[42], &[3, 3, 3]];
        for shape in shapes {
            let first = OutputFormat::from_shape(shape, ElementKind::Float);
            for _ in 0..3 {
                assert_eq!(OutputFormat::from_shape(shape, ElementKind::Float), first);
            }
        }
    }

    #[test]
    fn test_classify_produces_views() {
        let data = float(&[1, 26, 95]);
        match classify(&data).unwrap() {
            ClassifiedOutput::StopToken(view) => assert_eq!(view.shape(), &[26, 95]),
            other => panic!("unexpected format {:?}", other.format()),
        }

        let data = TensorData::Int(ArrayD::zeros(IxDyn(&[2, 5])));
        match classify(&data).unwrap() {
            ClassifiedOutput::DirectIndex(view) => assert_eq!(view.len(), 5),
            other => panic!("unexpected format {:?}", other.format()),
        }
    }

    #[test]
    fn test_classify_unrecognized_reports_shape() {
        let err = classify(&float(&[2, 3])).unwrap_err();
        match err {
            SolverError::UnrecognizedOutputFormat { shape, kind } => {
                assert_eq!(shape, vec![2, 3]);
                assert_eq!(kind, ElementKind::Float);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_decode_stop_token_output() {
        let mut classes = vec![11, 20, 0];
        classes.resize(26, 0);
        let scores = one_hot(&classes, 95).insert_axis(Axis(0)).into_dyn();

        let text = decode_output(&TensorData::Float(scores), &DecodeOptions::default()).unwrap();
        assert_eq!(text, "aj");
    }

    #[test]
    fn test_decode_time_major_output() {
        let scores = one_hot(&[62, 1, 1, 62, 2, 62, 3, 62], 63)
            .insert_axis(Axis(1))
            .into_dyn();

        let text = decode_output(&TensorData::Float(scores), &DecodeOptions::default()).unwrap();
        assert_eq!(text, "123");
    }

    #[test]
    fn test_decode_batch_major_output() {
        let scores: Array3<f32> = one_hot(&[62, 10, 10, 62, 11, 62, 12, 62], 63).insert_axis(Axis(0));

        let text = decode_output(&TensorData::Float(scores.into_dyn()), &DecodeOptions::default()).unwrap();
        assert_eq!(text, "abc");
    }

    #[test]
    fn test_decode_direct_index_output() {
        let indices = Array2::from_shape_vec((1, 4), vec![36i64, 37, 1, 2]).unwrap();
        let text = decode_output(&TensorData::Int(indices.into_dyn()), &DecodeOptions::default()).unwrap();
        assert_eq!(text, "AB12");
    }

    #[test]
    fn test_decode_flat_output() {
        let flat: Array1<f32> = one_hot(&[3, 62, 4], 63).iter().copied().collect();
        let text = decode_output(&TensorData::Float(flat.into_dyn()), &DecodeOptions::default()).unwrap();
        assert_eq!(text, "34");
    }

    #[test]
    fn test_decode_respects_configured_bound() {
        let classes: Vec<usize> = (0..10).collect();
        let scores = one_hot(&classes, 63).insert_axis(Axis(0)).into_dyn();
        let options = DecodeOptions {
            max_greedy_len: 4,
            ..DecodeOptions::default()
        };

        let text = decode_output(&TensorData::Float(scores), &options).unwrap();
        assert_eq!(text, "0123");
    }
}
