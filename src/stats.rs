/// Average of `values`, or 0.0 when there are none.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Divides `part` by `total`, returning 0.0 when `total` is zero.
pub fn ratio(part: f64, total: f64) -> f64 {
    if total == 0.0 { 0.0 } else { part / total }
}
