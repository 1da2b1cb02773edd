//! Hold-out splitting

use crate::error::{PipelineError, Result};
use crate::estimator::check_xy;
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Train and test partitions: `(x_train, x_test, y_train, y_test)`
pub type TrainTestSplit = (Array2<f64>, Array2<f64>, Array1<f64>, Array1<f64>);

/// Shuffle the rows and hold out `ceil(test_size * n)` of them for testing.
///
/// `test_size` must lie strictly between 0 and 1 and both partitions must
/// end up non-empty. Without a `random_state` the shuffle is seeded from
/// entropy.
pub fn train_test_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_size: f64,
    random_state: Option<u64>,
) -> Result<TrainTestSplit> {
    check_xy(x, y)?;
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(PipelineError::invalid_param(
            "test_size",
            test_size,
            "must be in the open interval (0, 1)",
        ));
    }

    let n_samples = x.nrows();
    let n_test = (test_size * n_samples as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(PipelineError::InvalidInput(format!(
            "test_size = {} with {} samples leaves an empty train or test set",
            test_size, n_samples
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = match random_state {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);
    tracing::debug!(
        n_train = train_idx.len(),
        n_test = test_idx.len(),
        "Train/test split"
    );

    Ok((
        x.select(Axis(0), train_idx),
        x.select(Axis(0), test_idx),
        y.select(Axis(0), train_idx),
        y.select(Axis(0), test_idx),
    ))
}
