// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use ms_core::{MsError, TrainingData};
use rand::SeedableRng;
use rand::seq::index;
use rand_chacha::ChaCha8Rng;

/// Portable seeded generator; identical streams on every platform.
pub(crate) fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Picks `k` training rows with pairwise-distinct values in random order.
///
/// Callers must have checked that at least `k` distinct rows exist.
pub(crate) fn sample_distinct_rows(
    data: &TrainingData,
    k: usize,
    rng: &mut ChaCha8Rng,
) -> Result<Vec<usize>, MsError> {
    let order = index::sample(rng, data.n_rows(), data.n_rows());
    let mut picked: Vec<usize> = Vec::with_capacity(k);
    for idx in order.iter() {
        if picked.iter().any(|&p| data.row(p) == data.row(idx)) {
            continue;
        }
        picked.push(idx);
        if picked.len() == k {
            return Ok(picked);
        }
    }
    Err(MsError::degenerate_input(format!(
        "could not draw {k} distinct initial rows from {} training samples",
        data.n_rows()
    )))
}

#[cfg(test)]
mod tests {
    use super::{sample_distinct_rows, seeded_rng};
    use ms_core::TrainingData;

    #[test]
    fn draws_are_distinct_and_reproducible() {
        let data = TrainingData::from_rows(
            vec![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 0.0],
            5,
            2,
        )
        .expect("rows should be valid");

        let first = sample_distinct_rows(&data, 3, &mut seeded_rng(9)).expect("draw succeeds");
        let second = sample_distinct_rows(&data, 3, &mut seeded_rng(9)).expect("draw succeeds");
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        for (i, &a) in first.iter().enumerate() {
            for &b in &first[i + 1..] {
                assert_ne!(data.row(a), data.row(b));
            }
        }
    }

    #[test]
    fn errors_when_not_enough_distinct_rows() {
        let data = TrainingData::from_rows(vec![1.0, 1.0, 1.0, 1.0], 2, 2)
            .expect("rows should be valid");
        let err = sample_distinct_rows(&data, 2, &mut seeded_rng(0)).expect_err("must fail");
        assert!(err.to_string().contains("could not draw 2 distinct"));
    }
}
