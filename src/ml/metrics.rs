//! Scoring metrics and descriptive statistics.

use ndarray::Array1;

/// Coefficient of determination: `1 - SS_res / SS_tot`.
///
/// A constant target scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(y: &Array1<f64>, y_hat: &Array1<f64>) -> f64 {
    let Some(mean) = y.mean() else {
        return 0.0;
    };
    let ss_res: f64 = y.iter().zip(y_hat.iter()).map(|(a, b)| (a - b).powi(2)).sum();
    let ss_tot: f64 = y.iter().map(|a| (a - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median, `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Quantile with linear interpolation between closest ranks.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// Pearson correlation coefficient.
///
/// `None` when fewer than two pairs exist or either side is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;

    let (mut cov, mut vx, mut vy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        cov += (a - mx) * (b - my);
        vx += (a - mx).powi(2);
        vy += (b - my).powi(2);
    }

    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    Some(cov / (vx.sqrt() * vy.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn r2_of_perfect_fit_is_one() {
        let y = array![1.0, 2.0, 3.0];
        assert_abs_diff_eq!(r2_score(&y, &y), 1.0);
    }

    #[test]
    fn r2_of_mean_prediction_is_zero() {
        let y = array![1.0, 2.0, 3.0];
        let y_hat = array![2.0, 2.0, 2.0];
        assert_abs_diff_eq!(r2_score(&y, &y_hat), 0.0);
    }

    #[test]
    fn r2_can_be_negative() {
        let y = array![1.0, 2.0, 3.0];
        let y_hat = array![3.0, 2.0, 1.0];
        assert_abs_diff_eq!(r2_score(&y, &y_hat), -3.0);
    }

    #[test]
    fn r2_of_constant_target() {
        let y = array![4.0, 4.0];
        assert_abs_diff_eq!(r2_score(&y, &array![4.0, 4.0]), 1.0);
        assert_abs_diff_eq!(r2_score(&y, &array![4.0, 5.0]), 0.0);
    }

    #[test]
    fn quantile_interpolates_linearly() {
        let scores = [0.9, 0.8, 0.3];
        assert_abs_diff_eq!(quantile(&scores, 0.7).unwrap(), 0.84, epsilon = 1e-12);
        assert_abs_diff_eq!(median(&scores).unwrap(), 0.8);
        assert_abs_diff_eq!(median(&[1.0, 2.0, 3.0, 4.0]).unwrap(), 2.5);
        assert!(quantile(&[], 0.5).is_none());
    }

    #[test]
    fn pearson_handles_degenerate_input() {
        assert_abs_diff_eq!(pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap(), -1.0, epsilon = 1e-12);
        assert!(pearson(&[1.0], &[1.0]).is_none());
        assert!(pearson(&[1.0, 1.0], &[1.0, 2.0]).is_none());
    }
}
