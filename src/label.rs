//! Binary satisfaction target.
use crate::config::LabelConfig;
use crate::data::Subset;
use crate::errors::AttributionError;

/// Binarize the satisfaction outcome for every subset row (`true` = satisfied).
///
/// A pre-binarized numeric column wins when present (non-zero is satisfied).
/// Otherwise the categorical label is compared with the positive label; a
/// missing label counts as not satisfied.
pub fn binary_labels(subset: &Subset, label: &LabelConfig) -> Result<Vec<bool>, AttributionError> {
    if let Some(values) = label.binary_col.as_deref().and_then(|c| subset.numeric(c)) {
        return Ok(values.into_iter().map(|v| !v.is_nan() && v != 0.0).collect());
    }
    match subset.categorical(&label.label_col) {
        Some(values) => Ok(values
            .into_iter()
            .map(|v| v == Some(label.positive_label.as_str()))
            .collect()),
        None => Err(AttributionError::missing_column(&label.label_col)),
    }
}

/// Number of distinct outcomes in `labels` (0, 1 or 2).
pub fn n_classes(labels: &[bool]) -> usize {
    let positives = labels.iter().filter(|l| **l).count();
    usize::from(positives > 0) + usize::from(positives < labels.len())
}
