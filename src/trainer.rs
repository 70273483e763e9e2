//! Attribution model trainer
//!
//! Builds the feature matrix for a subset, splits it into train and held-out
//! partitions, fits the forest and scores it on the held-out rows.
use crate::config::{ForestConfig, LabelConfig, SplitConfig};
use crate::data::{Dataset, Matrix, RowMajorMatrix, Subset};
use crate::errors::AttributionError;
use crate::forest::RandomForest;
use crate::label::binary_labels;
use crate::metric::accuracy;
use crate::split::train_test_split;
use hashbrown::HashSet;
use log::{debug, info};

/// A forest fitted on one subgroup, with its fixed feature order and the
/// held-out rows it was scored on.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub forest: RandomForest,
    /// Feature order of every matrix handed to `forest`.
    pub feature_names: Vec<String>,
    /// Fraction of correctly classified held-out rows.
    pub accuracy: f64,
    /// Held-out feature rows, one column per entry of `feature_names`.
    pub held_out: RowMajorMatrix<f64>,
    pub held_out_labels: Vec<bool>,
    /// Whether the split preserved class proportions.
    pub stratified: bool,
    pub n_train: usize,
}

/// The requested features that are numeric columns of `dataset`, in request
/// order and without repeats. Anything else is silently dropped.
pub fn available_features<S: AsRef<str>>(dataset: &Dataset, feature_cols: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut available = Vec::with_capacity(feature_cols.len());
    for name in feature_cols.iter().map(AsRef::as_ref) {
        if dataset.numeric(name).is_none() {
            debug!("Feature {} is not a numeric column, skipping it.", name);
            continue;
        }
        if seen.insert(name) {
            available.push(name.to_string());
        }
    }
    available
}

/// Fit a forest on `subset` and score it on a held-out partition.
///
/// The label is built with [`binary_labels`]. Any failure is reported as
/// [`AttributionError::Training`], except a missing label column, which is a
/// schema error.
pub fn train<S: AsRef<str>>(
    subset: &Subset,
    feature_cols: &[S],
    label: &LabelConfig,
    forest_cfg: &ForestConfig,
    split_cfg: &SplitConfig,
) -> Result<TrainedModel, AttributionError> {
    let feature_names = available_features(subset.dataset(), feature_cols);
    if feature_names.is_empty() {
        return Err(AttributionError::Training("no usable feature columns".to_string()));
    }
    let labels = binary_labels(subset, label)?;

    let mut columns = Vec::with_capacity(feature_names.len());
    for name in &feature_names {
        let values = subset
            .numeric(name)
            .ok_or_else(|| AttributionError::missing_column(name))?;
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AttributionError::Training(format!(
                "feature {} contains missing or non-finite values",
                name
            )));
        }
        columns.push(values);
    }

    let split = train_test_split(&labels, split_cfg.test_fraction, split_cfg.seed)?;

    let train_data: Vec<f64> = columns
        .iter()
        .flat_map(|col| split.train.iter().map(move |&r| col[r]))
        .collect();
    let train_labels: Vec<bool> = split.train.iter().map(|&r| labels[r]).collect();
    let train_matrix = Matrix::new(&train_data, split.train.len(), feature_names.len());

    let mut forest = RandomForest::new(forest_cfg.clone());
    forest.fit(&train_matrix, &train_labels)?;

    let held_out_data: Vec<f64> = split
        .test
        .iter()
        .flat_map(|&r| columns.iter().map(move |col| col[r]))
        .collect();
    let held_out = RowMajorMatrix::new(held_out_data, split.test.len(), feature_names.len());
    let held_out_labels: Vec<bool> = split.test.iter().map(|&r| labels[r]).collect();

    let test_data = held_out.to_column_major();
    let test_matrix = Matrix::new(&test_data, held_out.rows, held_out.cols);
    let accuracy = accuracy(&held_out_labels, &forest.predict(&test_matrix, true));

    info!(
        "Trained {} on {} rows with {} features, held-out accuracy {:.3}.",
        subset.key(),
        split.train.len(),
        feature_names.len(),
        accuracy
    );

    Ok(TrainedModel {
        forest,
        feature_names,
        accuracy,
        held_out,
        held_out_labels,
        stratified: split.stratified,
        n_train: split.train.len(),
    })
}
