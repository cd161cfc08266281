//! Seeded train/test splitting.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::ModelError;

/// Shuffle `0..n_rows` and cut it into train and test indices.
///
/// The test side receives `ceil(n_rows * (1 - train_fraction))` rows. Both
/// sides need at least two rows for a score to be defined.
pub fn train_test_split(
    n_rows: usize,
    train_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), ModelError> {
    let n_test = ((n_rows as f64) * (1.0 - train_fraction)).ceil() as usize;
    let n_test = n_test.min(n_rows);
    let n_train = n_rows - n_test;

    if n_train < 2 || n_test < 2 {
        return Err(ModelError::NotEnoughRows {
            train: n_train,
            test: n_test,
        });
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test = indices.split_off(n_train);
    Ok((indices, test))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_eighty_twenty() {
        let (train, test) = train_test_split(100, 0.8, 1).unwrap();
        assert_eq!(train.len(), 80);
        assert_eq!(test.len(), 20);

        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn same_seed_same_split() {
        assert_eq!(train_test_split(50, 0.8, 7), train_test_split(50, 0.8, 7));
    }

    #[test]
    fn rounds_test_side_up() {
        let (train, test) = train_test_split(11, 0.8, 1).unwrap();
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 8);
    }

    #[test]
    fn tiny_inputs_are_rejected() {
        assert_eq!(
            train_test_split(3, 0.8, 1),
            Err(ModelError::NotEnoughRows { train: 2, test: 1 })
        );
    }
}
