//! Subgroup analysis
//!
//! Entry points that take a dataset and a request, select the subgroup, gate
//! it, train a forest and hand back a ranked report. Every call is a pure
//! function of its inputs; repeated requests can go through
//! [`crate::cache::ModelCache`] instead.
use crate::config::{AttributionConfig, ForestConfig, GateConfig, LabelConfig};
use crate::constants::SUMMARY_TOP_N;
use crate::data::{Dataset, Subset};
use crate::errors::{AttributionError, InsufficientData, ReasonCode, UnavailableReason};
use crate::gate;
use crate::importance::{extract, Extraction, ImportanceKind};
use crate::label::binary_labels;
use crate::metric::positive_rate;
use crate::ranking::{rank, rank_entries, summarize, summarize_ratings, ImportanceInsight, RankedFactor, RatingInsight, Scale};
use crate::shap::Waterfall;
#[cfg(feature = "shap")]
use crate::shap::{waterfall, TreeExplainer};
use crate::subgroup::{group_values, resolve};
use crate::trainer::{available_features, train, TrainedModel};
use crate::utils::nan_mean;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How factors are scored for a subgroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Mean rating of every service attribute, no model.
    AverageRating,
    /// Impurity importances of the default forest.
    NativeImportance,
    /// Mean absolute SHAP values of the explainable forest.
    ShapSummary,
    /// SHAP summary plus the explanation of one held-out row.
    ShapWaterfall { sample_index: usize },
}

impl Strategy {
    /// Whether the strategy trains a model.
    pub fn needs_model(&self) -> bool {
        !matches!(self, Strategy::AverageRating)
    }

    /// The forest settings this strategy trains with.
    pub fn forest_config<'a>(&self, config: &'a AttributionConfig) -> &'a ForestConfig {
        match self {
            Strategy::ShapSummary | Strategy::ShapWaterfall { .. } => &config.explainable_forest,
            _ => &config.forest,
        }
    }

    /// Rows a subgroup needs before this strategy trains.
    pub fn min_rows(&self, config: &AttributionConfig) -> usize {
        match self {
            Strategy::ShapSummary | Strategy::ShapWaterfall { .. } => config.gate.explainable_min_rows,
            _ => config.gate.min_rows,
        }
    }
}

/// One attribution request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionRequest {
    pub group_col: String,
    /// Requested group, `None` selects the first valid group.
    pub group_value: Option<String>,
    pub strategy: Strategy,
    /// Candidate service attributes, in presentation order.
    pub features: Vec<String>,
}

impl AttributionRequest {
    pub fn new<S: AsRef<str>>(group_col: &str, strategy: Strategy, features: &[S]) -> Self {
        AttributionRequest {
            group_col: group_col.to_string(),
            group_value: None,
            strategy,
            features: features.iter().map(|f| f.as_ref().to_string()).collect(),
        }
    }

    pub fn set_group_value(mut self, group_value: &str) -> Self {
        self.group_value = Some(group_value.to_string());
        self
    }
}

/// Insight payload attached to a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Insight {
    Importance(ImportanceInsight),
    Rating(RatingInsight),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionReport {
    /// The group actually analyzed, after any fallback.
    pub group_value: String,
    pub strategy: Strategy,
    pub n_rows: usize,
    pub factors: Vec<RankedFactor>,
    /// Held-out accuracy, model strategies only.
    pub accuracy: Option<f64>,
    pub insight: Option<Insight>,
    pub waterfall: Option<Waterfall>,
}

impl AttributionReport {
    /// `(display name, magnitude, colour)` triples in rank order.
    pub fn display_rows(&self) -> Vec<(&str, f64, &str)> {
        self.factors
            .iter()
            .map(|f| (f.display_name.as_str(), f.magnitude, f.color.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributionOutcome {
    Ranked(AttributionReport),
    Insufficient(InsufficientData),
    Unavailable(UnavailableReason),
}

impl AttributionOutcome {
    pub fn report(&self) -> Option<&AttributionReport> {
        match self {
            AttributionOutcome::Ranked(r) => Some(r),
            _ => None,
        }
    }

    pub fn reason_code(&self) -> Option<ReasonCode> {
        match self {
            AttributionOutcome::Ranked(_) => None,
            AttributionOutcome::Insufficient(i) => Some(i.code),
            AttributionOutcome::Unavailable(u) => Some(u.code),
        }
    }

    /// The report, with a rejection or an unavailable attribution turned
    /// into the matching error.
    pub fn into_report(self) -> Result<AttributionReport, AttributionError> {
        match self {
            AttributionOutcome::Ranked(r) => Ok(r),
            AttributionOutcome::Insufficient(i) => Err(AttributionError::InsufficientData(i)),
            AttributionOutcome::Unavailable(u) => Err(AttributionError::AttributionUnavailable(u)),
        }
    }
}

/// Run one attribution request end to end.
pub fn analyze(
    dataset: &Dataset,
    request: &AttributionRequest,
    config: &AttributionConfig,
) -> Result<AttributionOutcome, AttributionError> {
    analyze_with(dataset, request, config, |subset, features, forest_cfg| {
        train(subset, features, &config.label, forest_cfg, &config.split).map(Arc::new)
    })
}

/// [`analyze`] with the model supplied by `fit`, called only once the subgroup
/// has passed the gate.
pub(crate) fn analyze_with<F>(
    dataset: &Dataset,
    request: &AttributionRequest,
    config: &AttributionConfig,
    fit: F,
) -> Result<AttributionOutcome, AttributionError>
where
    F: FnOnce(&Subset, &[String], &ForestConfig) -> Result<Arc<TrainedModel>, AttributionError>,
{
    config.validate()?;
    let (group_value, subset) = resolve(dataset, &request.group_col, request.group_value.as_deref())?;
    let features = available_features(dataset, &request.features);
    if features.is_empty() {
        return Ok(no_features(&request.group_col));
    }

    if !request.strategy.needs_model() {
        return Ok(average_ratings(&subset, &features, group_value));
    }

    let labels = binary_labels(&subset, &config.label)?;
    if let Err(rejection) = gate::check(&labels, request.strategy.min_rows(config)) {
        return Ok(AttributionOutcome::Insufficient(rejection));
    }
    let model = fit(&subset, &features, request.strategy.forest_config(config))?;
    Ok(explain(&model, group_value, subset.len(), request.strategy))
}

fn no_features(group_col: &str) -> AttributionOutcome {
    warn!("No requested feature is a numeric column, nothing to rank for {}.", group_col);
    AttributionOutcome::Unavailable(UnavailableReason::new(
        ReasonCode::NoFeatures,
        "no requested feature is available",
    ))
}

fn average_ratings(subset: &Subset, features: &[String], group_value: String) -> AttributionOutcome {
    let entries: Vec<(String, f64)> = features
        .iter()
        .filter_map(|name| {
            let values = subset.numeric(name)?;
            nan_mean(&values).map(|m| (name.clone(), m))
        })
        .collect();
    if entries.is_empty() {
        return AttributionOutcome::Unavailable(UnavailableReason::new(
            ReasonCode::NoFeatures,
            "no feature has a rating in this group",
        ));
    }
    let factors = rank_entries(&entries, Scale::Rating);
    let insight = summarize_ratings(&factors).map(Insight::Rating);
    AttributionOutcome::Ranked(AttributionReport {
        group_value,
        strategy: Strategy::AverageRating,
        n_rows: subset.len(),
        factors,
        accuracy: None,
        insight,
        waterfall: None,
    })
}

/// Build a report for `strategy` from an already trained model.
pub fn explain(model: &TrainedModel, group_value: String, n_rows: usize, strategy: Strategy) -> AttributionOutcome {
    let (kind, scale) = match strategy {
        Strategy::AverageRating | Strategy::NativeImportance => (ImportanceKind::Native, Scale::Absolute),
        Strategy::ShapSummary | Strategy::ShapWaterfall { .. } => (ImportanceKind::Shap, Scale::Relative),
    };
    let attribution = match extract(model, &model.feature_names, &model.held_out, kind) {
        Extraction::Attributed(a) => a,
        Extraction::Unavailable(reason) => {
            warn!("Attribution unavailable for {}: {}", group_value, reason);
            return AttributionOutcome::Unavailable(reason);
        }
    };

    let waterfall = match strategy {
        Strategy::ShapWaterfall { sample_index } => match explain_row(model, sample_index) {
            Ok(w) => Some(w),
            Err(reason) => return AttributionOutcome::Unavailable(reason),
        },
        _ => None,
    };

    let factors = rank(&attribution, scale);
    let insight = summarize(&factors, model.accuracy)
        .map(|i| i.with_directional(attribution.directional))
        .map(Insight::Importance);
    AttributionOutcome::Ranked(AttributionReport {
        group_value,
        strategy,
        n_rows,
        factors,
        accuracy: Some(model.accuracy),
        insight,
        waterfall,
    })
}

#[cfg(feature = "shap")]
fn explain_row(model: &TrainedModel, sample_index: usize) -> Result<Waterfall, UnavailableReason> {
    waterfall(
        &TreeExplainer::new(&model.forest),
        &model.feature_names,
        &model.held_out,
        sample_index,
    )
}

#[cfg(not(feature = "shap"))]
fn explain_row(_model: &TrainedModel, _sample_index: usize) -> Result<Waterfall, UnavailableReason> {
    Err(UnavailableReason::new(
        ReasonCode::MissingDependency,
        "SHAP support is not compiled in",
    ))
}

/// Headline numbers for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgroupProfile {
    pub group_value: String,
    pub passengers: usize,
    /// Percentage of satisfied passengers, `None` without a label column.
    pub satisfaction_rate: Option<f64>,
    /// Mean over passengers of their average service rating.
    pub service_score: Option<f64>,
}

pub fn profile<S: AsRef<str>>(
    dataset: &Dataset,
    group_col: &str,
    value: Option<&str>,
    features: &[S],
    label: &LabelConfig,
) -> Result<SubgroupProfile, AttributionError> {
    let (group_value, subset) = resolve(dataset, group_col, value)?;
    let satisfaction_rate = binary_labels(&subset, label)
        .ok()
        .map(|labels| positive_rate(&labels) * 100.0);

    let columns: Vec<Vec<f64>> = available_features(dataset, features)
        .iter()
        .filter_map(|name| subset.numeric(name))
        .collect();
    let service_score = if columns.is_empty() {
        None
    } else {
        let row_means: Vec<f64> = (0..subset.len())
            .map(|i| {
                let row: Vec<f64> = columns.iter().map(|c| c[i]).collect();
                nan_mean(&row).unwrap_or(f64::NAN)
            })
            .collect();
        nan_mean(&row_means)
    };

    Ok(SubgroupProfile {
        group_value,
        passengers: subset.len(),
        satisfaction_rate,
        service_score,
    })
}

/// Mean ratings of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRatings {
    pub group_value: String,
    pub n_rows: usize,
    /// One entry per available feature, `None` when the group has no rating.
    pub ratings: Vec<(String, Option<f64>)>,
}

/// Mean rating of every feature for every group, in group order.
pub fn compare_average_ratings<S: AsRef<str>>(
    dataset: &Dataset,
    group_col: &str,
    features: &[S],
) -> Result<Vec<GroupRatings>, AttributionError> {
    let features = available_features(dataset, features);
    group_values(dataset, group_col)?
        .into_iter()
        .map(|group| {
            let (group_value, subset) = resolve(dataset, group_col, Some(&group))?;
            let ratings = features
                .iter()
                .map(|name| (name.clone(), subset.numeric(name).and_then(|v| nan_mean(&v))))
                .collect();
            Ok(GroupRatings {
                group_value,
                n_rows: subset.len(),
                ratings,
            })
        })
        .collect()
}

/// Native importance headline of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group_value: String,
    pub n_rows: usize,
    pub accuracy: f64,
    pub top_factor: String,
    pub top_importance: f64,
    pub high_impact_count: usize,
    pub n_factors: usize,
    /// Leading factors, at most [`SUMMARY_TOP_N`].
    pub top_factors: Vec<RankedFactor>,
}

/// Native importance summary of every group that passes the gate.
///
/// Every group is fitted with the explainable forest and gated at
/// `gate.explainable_min_rows`. Groups that are rejected, fail to train or
/// cannot be attributed are skipped with a warning.
pub fn summarize_all<S: AsRef<str>>(
    dataset: &Dataset,
    group_col: &str,
    features: &[S],
    config: &AttributionConfig,
) -> Result<Vec<GroupSummary>, AttributionError> {
    config.validate()?;
    let summary_config = AttributionConfig {
        forest: config.explainable_forest.clone(),
        gate: GateConfig {
            min_rows: config.gate.explainable_min_rows,
            ..config.gate.clone()
        },
        ..config.clone()
    };
    let features = available_features(dataset, features);
    let mut summaries = Vec::new();
    for group in group_values(dataset, group_col)? {
        let request = AttributionRequest {
            group_col: group_col.to_string(),
            group_value: Some(group.clone()),
            strategy: Strategy::NativeImportance,
            features: features.clone(),
        };
        let report = match analyze(dataset, &request, &summary_config).and_then(AttributionOutcome::into_report) {
            Ok(report) => report,
            Err(
                e @ (AttributionError::InsufficientData(_)
                | AttributionError::AttributionUnavailable(_)
                | AttributionError::Training(_)),
            ) => {
                warn!("Skipping {}: {}", group, e);
                continue;
            }
            Err(e) => return Err(e),
        };
        if let Some(Insight::Importance(insight)) = report.insight {
            let mut top_factors = report.factors.clone();
            top_factors.truncate(SUMMARY_TOP_N);
            summaries.push(GroupSummary {
                group_value: report.group_value,
                n_rows: report.n_rows,
                accuracy: insight.accuracy,
                top_factor: insight.top_factor,
                top_importance: insight.top_magnitude,
                high_impact_count: insight.high_impact_count,
                n_factors: report.factors.len(),
                top_factors,
            });
        }
    }
    info!("Summarized {} groups of {}.", summaries.len(), group_col);
    Ok(summaries)
}
