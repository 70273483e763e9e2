//! Sample sufficiency gate
//!
//! A subgroup is only handed to the trainer when it has enough rows and both
//! satisfaction outcomes are present.
use crate::errors::{InsufficientData, ReasonCode};
use crate::label::n_classes;
use log::warn;

/// Check that `labels` are usable for training and held-out evaluation.
pub fn check(labels: &[bool], min_rows: usize) -> Result<(), InsufficientData> {
    let n_rows = labels.len();
    let n_classes = n_classes(labels);
    let code = if n_rows < min_rows {
        ReasonCode::TooFewRows
    } else if n_classes < 2 {
        ReasonCode::SingleClass
    } else {
        return Ok(());
    };
    let rejection = InsufficientData {
        code,
        n_rows,
        min_rows,
        n_classes,
    };
    warn!("{}", rejection);
    Err(rejection)
}
