//! Last-resort decoding for flat, unstructured outputs
//!
//! The flat array is reshaped against a fixed list of plausible per-timestep
//! class counts and greedily decoded until one of them yields text.

use ndarray::{ArrayView1, ArrayView2};
use std::borrow::Cow;
use tracing::debug;

use crate::error::SolverError;
use crate::vision::alphabet::Alphabet;
use crate::vision::decode::greedy;

/// A per-timestep class count to try, with the alphabet it implies. The last
/// class of each candidate is the blank.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub classes: usize,
    pub alphabet: Alphabet,
}

/// Candidates in the order they are tried: the configured alphabet plus blank,
/// then 37, 63 and 11 classes
pub fn candidates(alphabet: &Alphabet) -> Vec<Candidate> {
    vec![
        Candidate {
            classes: alphabet.len() + 1,
            alphabet: alphabet.clone(),
        },
        Candidate {
            classes: 37,
            alphabet: Alphabet::uppercase_digits(),
        },
        Candidate {
            classes: 63,
            alphabet: Alphabet::letters_then_digits(),
        },
        Candidate {
            classes: 11,
            alphabet: Alphabet::digits(),
        },
    ]
}

/// Decode a flat score array, returning the first non-empty candidate decode
pub fn decode(flat: ArrayView1<f32>, alphabet: &Alphabet, max_len: usize) -> Result<String, SolverError> {
    let len = flat.len();
    let values: Cow<'_, [f32]> = match flat.as_slice() {
        Some(slice) => Cow::Borrowed(slice),
        None => Cow::Owned(flat.to_vec()),
    };

    for candidate in candidates(alphabet) {
        let classes = candidate.classes;
        if classes == 0 || len % classes != 0 {
            continue;
        }

        let steps = len / classes;
        let scores = match ArrayView2::from_shape((steps, classes), &*values) {
            Ok(view) => view,
            Err(_) => continue,
        };

        let text = greedy::decode(scores, classes - 1, &candidate.alphabet, max_len);
        debug!(
            "Flat output of length {} as [{}, {}] decoded to {:?}",
            len, steps, classes, text
        );
        if !text.is_empty() {
            return Ok(text);
        }
    }

    Err(SolverError::DecodeAmbiguous { len })
}
