//! Decoding for tokenizer-style models with an explicit end-of-sequence class

use ndarray::{ArrayView2, Axis};

use crate::vision::alphabet::Alphabet;
use crate::vision::decode::greedy::argmax;

/// Class index reserved for end-of-sequence
pub const STOP_INDEX: usize = 0;

/// Timesteps emitted by stop-token models
pub const STOP_TOKEN_STEPS: usize = 26;

/// Classes emitted by stop-token models
pub const STOP_TOKEN_CLASSES: usize = 95;

/// Longest text a stop-token decode can yield
pub const MAX_STOP_TOKEN_LEN: usize = STOP_TOKEN_STEPS - 1;

/// Decode a [T, C] score matrix where class 0 ends the sequence and class
/// `k > 0` maps to `alphabet[k - 1]`.
///
/// No repeat collapsing. Classes past the alphabet (unknown, begin and
/// padding tokens) are skipped.
pub fn decode(scores: ArrayView2<f32>, alphabet: &Alphabet) -> String {
    let mut text = String::new();
    let mut emitted = 0usize;

    for row in scores.axis_iter(Axis(0)) {
        if emitted == MAX_STOP_TOKEN_LEN {
            break;
        }
        let Some(class) = argmax(row) else {
            continue;
        };
        if class == STOP_INDEX {
            break;
        }
        if let Some(symbol) = alphabet.get(class - 1) {
            text.push(symbol);
            emitted += 1;
        }
    }

    text
}
