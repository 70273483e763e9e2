//! Errors
//!
//! Error and reason types used throughout the `satisfaction_attribution` crate.
//! Every failure is request scoped: nothing here is fatal to the caller and
//! nothing is retried.
use crate::constants::ERROR_MESSAGE_MAX_CHARS;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Machine readable reason why a ranking could not be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReasonCode {
    /// The explainer is not compiled in or was not supplied.
    MissingDependency,
    /// Fewer rows than the sufficiency threshold.
    TooFewRows,
    /// Every row carries the same satisfaction outcome.
    SingleClass,
    /// No feature survived schema filtering or shape reconciliation.
    NoFeatures,
    /// The explainer output could not be reconciled to the feature list.
    ShapeMismatch,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ReasonCode::MissingDependency => "missing dependency",
            ReasonCode::TooFewRows => "too few rows",
            ReasonCode::SingleClass => "single-class data",
            ReasonCode::NoFeatures => "no features",
            ReasonCode::ShapeMismatch => "shape mismatch",
        };
        write!(f, "{}", s)
    }
}

/// A sample sufficiency rejection, carrying the numbers a user needs to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsufficientData {
    /// Either [`ReasonCode::TooFewRows`] or [`ReasonCode::SingleClass`].
    pub code: ReasonCode,
    /// Rows in the subset.
    pub n_rows: usize,
    /// Threshold the subset was checked against.
    pub min_rows: usize,
    /// Distinct binarized outcomes observed.
    pub n_classes: usize,
}

impl fmt::Display for InsufficientData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Insufficient data for model analysis: need ≥{} samples with both satisfied and dissatisfied customers; current: {} samples, {} outcome types",
            self.min_rows, self.n_rows, self.n_classes
        )
    }
}

/// Why the explanation step produced nothing, although the model trained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableReason {
    pub code: ReasonCode,
    pub detail: String,
}

impl UnavailableReason {
    pub fn new(code: ReasonCode, detail: impl Into<String>) -> Self {
        UnavailableReason {
            code,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.detail, self.code)
    }
}

/// Errors that can occur while attributing satisfaction to service factors.
#[derive(Debug, Error)]
pub enum AttributionError {
    /// A requested column is absent, or has the wrong kind.
    #[error("Column {0} {1}.")]
    Schema(String, String),
    /// The grouping column holds no usable group value.
    #[error("Column {0} has no valid group values.")]
    EmptySubgroup(String),
    /// The subset failed the sample sufficiency gate.
    #[error("{0}")]
    InsufficientData(InsufficientData),
    /// Fitting the model failed.
    #[error("Model training failed: {0}")]
    Training(String),
    /// The model trained, but attribution could not be computed. Produced by
    /// `AttributionOutcome::into_report`.
    #[error("Attribution unavailable: {0}")]
    AttributionUnavailable(UnavailableReason),
    /// Unable to write configuration to file.
    #[error("Unable to write config to file: {0}")]
    UnableToWrite(String),
    /// Unable to read configuration from file.
    #[error("Unable to read config from a file {0}")]
    UnableToRead(String),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
}

impl AttributionError {
    pub(crate) fn missing_column(column: &str) -> Self {
        AttributionError::Schema(column.to_string(), "is not present in the dataset".to_string())
    }

    /// The reason code, for the variants that carry one.
    pub fn reason_code(&self) -> Option<ReasonCode> {
        match self {
            AttributionError::InsufficientData(i) => Some(i.code),
            AttributionError::AttributionUnavailable(u) => Some(u.code),
            _ => None,
        }
    }

    /// The message truncated for inline display.
    pub fn short_message(&self) -> String {
        truncate_message(&self.to_string(), ERROR_MESSAGE_MAX_CHARS)
    }
}

pub(crate) fn truncate_message(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        message.to_string()
    } else {
        let head: String = message.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}
