//! Seeded train/test split

use super::ModelError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of the two partitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n` with `seed`; the first `ceil(n * test_fraction)` indices
/// form the test set and the rest the training set. Both sides are kept
/// non-empty.
pub fn train_test_split(
    n: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<TrainTestSplit, ModelError> {
    if n < 2 {
        return Err(ModelError::TooFewRows(n));
    }

    let mut permutation: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    permutation.shuffle(&mut rng);

    let n_test = ((n as f64) * test_fraction).ceil() as usize;
    let n_test = n_test.clamp(1, n - 1);

    let train = permutation.split_off(n_test);
    Ok(TrainTestSplit {
        train,
        test: permutation,
    })
}
