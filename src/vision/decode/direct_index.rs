//! Decoding for models that already emit one class index per character

use ndarray::ArrayView1;

use crate::vision::alphabet::Alphabet;

/// Map each index through the alphabet, skipping indices outside it
pub fn decode(indices: ArrayView1<i64>, alphabet: &Alphabet) -> String {
    indices
        .iter()
        .filter_map(|&i| usize::try_from(i).ok())
        .filter_map(|i| alphabet.get(i))
        .collect()
}
