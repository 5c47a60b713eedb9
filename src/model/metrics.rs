/// Coefficient of determination. `None` for mismatched inputs or fewer than
/// two samples, where the score is undefined.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> Option<f64> {
    if y_true.len() != y_pred.len() || y_true.len() < 2 {
        return None;
    }
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return Some(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Some(1.0 - ss_res / ss_tot)
}

#[cfg(test)]
mod tests {
    use super::r2_score;

    #[test]
    fn perfect_and_mean_predictions() {
        let y = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(r2_score(&y, &y), Some(1.0));
        assert_eq!(r2_score(&y, &[2.5; 4]), Some(0.0));
    }

    #[test]
    fn worse_than_mean_is_negative() {
        let score = r2_score(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).expect("defined");
        assert!((score + 3.0).abs() < 1e-12);
    }

    #[test]
    fn undefined_inputs() {
        assert_eq!(r2_score(&[1.0], &[1.0]), None);
        assert_eq!(r2_score(&[1.0, 2.0], &[1.0]), None);
        assert_eq!(r2_score(&[5.0, 5.0], &[5.0, 4.0]), Some(0.0));
    }
}
