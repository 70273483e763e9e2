//! Importance extraction
//!
//! Turns a trained model into one non-negative magnitude per feature, either
//! from the forest's impurity importances or from mean absolute SHAP values.
use crate::data::RowMajorMatrix;
use crate::errors::{ReasonCode, UnavailableReason};
use crate::shap::{reconcile, DirectionalImpact, Explainer};
#[cfg(feature = "shap")]
use crate::shap::TreeExplainer;
use crate::trainer::TrainedModel;
use log::warn;
use serde::{Deserialize, Serialize};

/// Where an attribution comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportanceKind {
    /// Mean decrease in impurity.
    Native,
    /// Mean absolute SHAP value over the held-out rows.
    Shap,
}

/// Per-feature magnitudes, in feature list order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAttribution {
    pub kind: ImportanceKind,
    pub entries: Vec<(String, f64)>,
    /// Sign counts of the mean SHAP values, SHAP attributions only.
    pub directional: Option<DirectionalImpact>,
}

impl FeatureAttribution {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, feature: &str) -> Option<f64> {
        self.entries.iter().find(|(name, _)| name == feature).map(|(_, v)| *v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, v)| *v).collect()
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v).sum()
    }
}

/// Result of an extraction. `Unavailable` means the model trained but could
/// not be explained.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Attributed(FeatureAttribution),
    Unavailable(UnavailableReason),
}

impl Extraction {
    pub fn attribution(&self) -> Option<&FeatureAttribution> {
        match self {
            Extraction::Attributed(a) => Some(a),
            Extraction::Unavailable(_) => None,
        }
    }
}

/// The forest's impurity importances keyed by the model's feature names.
pub fn native(model: &TrainedModel) -> FeatureAttribution {
    let importances = model.forest.feature_importances();
    let entries = model
        .feature_names
        .iter()
        .cloned()
        .zip(importances)
        .filter(|(_, v)| v.is_finite())
        .collect();
    FeatureAttribution {
        kind: ImportanceKind::Native,
        entries,
        directional: None,
    }
}

/// Extract an attribution of `kind` from `model`.
///
/// SHAP values are computed on `x_test` with the built-in [`TreeExplainer`].
/// Without the `shap` feature the SHAP path reports
/// [`ReasonCode::MissingDependency`].
pub fn extract<S: AsRef<str>>(
    model: &TrainedModel,
    feature_cols: &[S],
    x_test: &RowMajorMatrix<f64>,
    kind: ImportanceKind,
) -> Extraction {
    match kind {
        ImportanceKind::Native => finish(native(model)),
        ImportanceKind::Shap => {
            #[cfg(feature = "shap")]
            {
                extract_with(&TreeExplainer::new(&model.forest), feature_cols, x_test)
            }
            #[cfg(not(feature = "shap"))]
            {
                let _ = (feature_cols, x_test);
                Extraction::Unavailable(UnavailableReason::new(
                    ReasonCode::MissingDependency,
                    "SHAP support is not compiled in",
                ))
            }
        }
    }
}

/// SHAP attribution from any [`Explainer`].
pub fn extract_with<S: AsRef<str>>(
    explainer: &dyn Explainer,
    feature_cols: &[S],
    x_test: &RowMajorMatrix<f64>,
) -> Extraction {
    if feature_cols.is_empty() {
        return Extraction::Unavailable(UnavailableReason::new(ReasonCode::NoFeatures, "no features to explain"));
    }
    if x_test.rows == 0 {
        return Extraction::Unavailable(UnavailableReason::new(
            ReasonCode::NoFeatures,
            "no held-out rows to explain",
        ));
    }
    let reconciled = match reconcile(explainer.shap_values(x_test), feature_cols.len()) {
        Ok(r) => r,
        Err(reason) => return Extraction::Unavailable(reason),
    };

    let entries = feature_cols
        .iter()
        .zip(reconciled.mean_abs())
        .filter_map(|(name, v)| match v {
            Some(v) => Some((name.as_ref().to_string(), v)),
            None => {
                warn!("Dropping feature {} with non-finite SHAP values.", name.as_ref());
                None
            }
        })
        .collect();
    finish(FeatureAttribution {
        kind: ImportanceKind::Shap,
        entries,
        directional: Some(reconciled.directional_impact()),
    })
}

fn finish(attribution: FeatureAttribution) -> Extraction {
    if attribution.is_empty() {
        Extraction::Unavailable(UnavailableReason::new(
            ReasonCode::NoFeatures,
            "no feature survived attribution",
        ))
    } else {
        Extraction::Attributed(attribution)
    }
}
