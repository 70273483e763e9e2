use crate::constants::DISPLAY_LABEL_MAX_CHARS;
use crate::errors::{truncate_message, AttributionError};
use std::cmp::Ordering;

/// Short labels for the long survey column names.
const DISPLAY_NAMES: [(&str, &str); 9] = [
    ("Departure/Arrival time convenient", "DEP/ARR time convenient"),
    ("Ease of Online booking", "Online booking"),
    ("Inflight wifi service", "Inflight wifi"),
    ("Inflight entertainment", "Inflight media"),
    ("On-board service", "On-board"),
    ("Leg room service", "Leg room"),
    ("Baggage handling", "Baggage"),
    ("Departure Delay in Minutes", "DEP Delay (min)"),
    ("Arrival Delay in Minutes", "ARR Delay (min)"),
];

/// Display name of a column, the column itself when no short name exists.
pub fn display_name(column: &str) -> &str {
    DISPLAY_NAMES
        .iter()
        .find(|(long, _)| *long == column)
        .map(|(_, short)| *short)
        .unwrap_or(column)
}

/// Truncate a chart label, appending `...` when shortened.
pub fn truncate_label(label: &str) -> String {
    truncate_message(label, DISPLAY_LABEL_MAX_CHARS)
}

/// Mean of the non-NaN values, `None` when there are none.
pub fn nan_mean(values: &[f64]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// Indices ordering `values` descending. The sort is stable, so ties keep
/// their input order. NaN sorts last.
pub fn argsort_desc(values: &[f64]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| match (values[a].is_nan(), values[b].is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => values[b].partial_cmp(&values[a]).unwrap_or(Ordering::Equal),
    });
    idx
}

// Validation
pub fn validate_positive_parameter(value: usize, parameter: &str) -> Result<(), AttributionError> {
    if value == 0 {
        Err(AttributionError::InvalidParameter(
            parameter.to_string(),
            "a positive integer".to_string(),
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// A fraction strictly between zero and one.
pub fn validate_fraction_parameter(value: f64, parameter: &str) -> Result<(), AttributionError> {
    if value.is_nan() || value <= 0.0 || value >= 1.0 {
        Err(AttributionError::InvalidParameter(
            parameter.to_string(),
            "real value within range 0 and 1 (exclusive)".to_string(),
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("Inflight wifi service"), "Inflight wifi");
        assert_eq!(display_name("Seat comfort"), "Seat comfort");
    }

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("Cleanliness"), "Cleanliness");
        assert_eq!(
            truncate_label("Departure/Arrival time convenient"),
            "Departure/Arrival time co..."
        );
    }

    #[test]
    fn test_nan_mean() {
        assert_eq!(nan_mean(&[1.0, f64::NAN, 3.0]), Some(2.0));
        assert_eq!(nan_mean(&[f64::NAN]), None);
        assert_eq!(nan_mean(&[]), None);
    }

    #[test]
    fn test_argsort_desc_stable() {
        assert_eq!(argsort_desc(&[0.3, 0.5, 0.1]), vec![1, 0, 2]);
        assert_eq!(argsort_desc(&[0.2, 0.4, 0.2, 0.4]), vec![1, 3, 0, 2]);
        assert_eq!(argsort_desc(&[f64::NAN, 0.1]), vec![1, 0]);
    }

    #[test]
    fn test_validation() {
        assert!(validate_positive_parameter(1, "n").is_ok());
        assert!(validate_positive_parameter(0, "n").is_err());
        assert!(validate_fraction_parameter(0.3, "f").is_ok());
        assert!(validate_fraction_parameter(f64::NAN, "f").is_err());
        assert!(validate_fraction_parameter(1.0, "f").is_err());
    }
}
