/// Fraction of predictions equal to the observed outcome, NaN when there is
/// nothing to score.
pub fn accuracy(y: &[bool], yhat: &[bool]) -> f64 {
    if y.is_empty() || y.len() != yhat.len() {
        return f64::NAN;
    }
    let correct = y.iter().zip(yhat).filter(|(a, b)| a == b).count();
    correct as f64 / y.len() as f64
}

/// Fraction of satisfied outcomes, zero for an empty slice.
pub fn positive_rate(y: &[bool]) -> f64 {
    if y.is_empty() {
        0.0
    } else {
        y.iter().filter(|v| **v).count() as f64 / y.len() as f64
    }
}
