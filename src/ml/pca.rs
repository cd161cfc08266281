//! Principal component analysis over every component of a feature matrix.

use linfa::prelude::{DatasetBase, Fit, Predict};
use linfa_reduction::Pca;
use ndarray::{Array1, Array2, Axis};

use super::ModelError;

/// Samples projected onto all `min(n_rows, n_features)` components.
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    /// Ordered from the largest component down.
    pub explained_variance_ratio: Array1<f64>,
    /// `n_rows × n_components`.
    pub components: Array2<f64>,
}

/// Fit a PCA on `x` and project `x` onto it.
pub fn project(x: &Array2<f64>) -> Result<Projection, ModelError> {
    let (n_rows, n_features) = x.dim();
    if n_rows < 2 {
        return Err(ModelError::TooFewSamples(n_rows));
    }
    let total_variance: f64 = x.var_axis(Axis(0), 1.0).sum();
    if n_features == 0 || total_variance <= 0.0 {
        return Err(ModelError::NoVariance);
    }

    let embedding_size = n_rows.min(n_features);
    let pca = Pca::params(embedding_size).fit(&DatasetBase::from(x.clone()))?;
    let components: Array2<f64> = pca.predict(x);

    Ok(Projection {
        explained_variance_ratio: pca.explained_variance_ratio(),
        components,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn collinear_data_has_one_dominant_component() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0]];
        let projection = project(&x).unwrap();

        assert_eq!(projection.components.dim(), (4, 2));
        assert_abs_diff_eq!(projection.explained_variance_ratio[0], 1.0, epsilon = 1e-9);
        // Sign of a component is arbitrary, its spread is not.
        let first = projection.components.column(0);
        assert_abs_diff_eq!((first[3] - first[0]).abs(), 45f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn ratios_cover_all_variance() {
        let x = array![
            [1.0, 0.0, 3.0],
            [0.0, 2.0, 1.0],
            [2.0, 1.0, 0.0],
            [4.0, 3.0, 2.0],
            [1.0, 5.0, 1.0],
        ];
        let projection = project(&x).unwrap();

        assert_eq!(projection.components.dim(), (5, 3));
        assert_abs_diff_eq!(projection.explained_variance_ratio.sum(), 1.0, epsilon = 1e-9);
        let ratios = projection.explained_variance_ratio.to_vec();
        assert!(ratios.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn single_row_is_too_few_samples() {
        let x = array![[1.0, 2.0, 3.0]];
        assert_eq!(project(&x), Err(ModelError::TooFewSamples(1)));

        let empty = Array2::<f64>::zeros((0, 3));
        assert_eq!(project(&empty), Err(ModelError::TooFewSamples(0)));
    }

    #[test]
    fn constant_input_has_no_variance() {
        let x = array![[1.0, 1.0], [1.0, 1.0]];
        assert_eq!(project(&x), Err(ModelError::NoVariance));
    }
}
