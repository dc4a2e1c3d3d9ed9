//! Greedy CTC-style decoding of per-timestep class scores

use ndarray::{ArrayView1, ArrayView2, ArrayView3, Axis};

use crate::vision::alphabet::Alphabet;

/// Default cap on greedy decodes; captchas in this domain are short
pub const DEFAULT_MAX_GREEDY_LEN: usize = 6;

/// Index of the highest score, first occurrence wins ties
pub fn argmax(scores: ArrayView1<f32>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in scores.iter().enumerate() {
        match best {
            Some((_, max)) if v <= max => {}
            // NaN never beats a real score
            _ if v.is_nan() => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i).or(if scores.is_empty() { None } else { Some(0) })
}

/// Decode a [T, C] score matrix.
///
/// A symbol is emitted when the arg-max class is neither the blank nor equal
/// to the previous timestep's arg-max. Classes outside the alphabet are
/// skipped. Output is clipped to `max_len` characters.
pub fn decode(scores: ArrayView2<f32>, blank: usize, alphabet: &Alphabet, max_len: usize) -> String {
    let mut text = String::new();
    let mut emitted = 0usize;
    let mut prev: Option<usize> = None;

    for row in scores.axis_iter(Axis(0)) {
        let Some(class) = argmax(row) else {
            continue;
        };

        if class != blank && Some(class) != prev && emitted < max_len {
            if let Some(symbol) = alphabet.get(class) {
                text.push(symbol);
                emitted += 1;
            }
        }
        prev = Some(class);
    }

    text
}

/// Decode a [T, 1, C] tensor by swapping the time and batch axes
pub fn decode_time_major(scores: ArrayView3<f32>, alphabet: &Alphabet, max_len: usize) -> String {
    let batch_major = scores.permuted_axes([1, 0, 2]);
    decode_batch_major(batch_major, alphabet, max_len)
}

/// Decode batch element 0 of a [B, T, C] tensor
pub fn decode_batch_major(scores: ArrayView3<f32>, alphabet: &Alphabet, max_len: usize) -> String {
    if scores.len_of(Axis(0)) == 0 {
        return String::new();
    }
    decode(
        scores.index_axis(Axis(0), 0),
        alphabet.blank_index(),
        alphabet,
        max_len,
    )
}
