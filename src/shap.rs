//! SHAP attribution
//!
//! Explainers report raw Shapley values in whatever layout they produce. The
//! reconciliation here turns that layout into one `(rows, features)` matrix
//! for the positive class, aligned with the requested feature list.
//!
//! Reconciliation, in order:
//! 1. A per-class list of two yields the positive class (element 1), a list of
//!    one yields element 0, any other list is stacked as is.
//! 2. Scalars become a 1x1 matrix, vectors a single row. Trailing axes of
//!    length one (wrapped scalars) are squeezed. A 3-D array whose last axis
//!    has length two is read as `(rows, features, classes)` and the positive
//!    class is taken. Anything else above two dimensions, or ragged nesting,
//!    cannot be reconciled.
//! 3. Exactly twice as many columns as features keeps the first half.
//! 4. Extra columns are truncated; too few columns keep the leading features.
//! 5. Each feature is reduced to its mean absolute value across rows. A
//!    feature with any non-finite value is dropped.
use crate::constants::WATERFALL_TOP_N;
use crate::data::RowMajorMatrix;
#[cfg(feature = "shap")]
use crate::data::Matrix;
use crate::errors::{ReasonCode, UnavailableReason};
#[cfg(feature = "shap")]
use crate::forest::RandomForest;
use crate::utils::{argsort_desc, display_name, truncate_label};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// A nested array of Shapley values, as produced by an explainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShapTensor {
    Scalar(f64),
    Array(Vec<ShapTensor>),
}

impl ShapTensor {
    /// A `(rows, cols)` tensor from a row major buffer.
    pub fn from_rows(data: &[f64], rows: usize, cols: usize) -> Self {
        ShapTensor::Array(
            (0..rows)
                .map(|i| {
                    ShapTensor::Array(
                        data[i * cols..(i + 1) * cols]
                            .iter()
                            .map(|v| ShapTensor::Scalar(*v))
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    /// The value of a number or of a number wrapped in one-element arrays.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ShapTensor::Scalar(v) => Some(*v),
            ShapTensor::Array(items) if items.len() == 1 => items[0].as_scalar(),
            ShapTensor::Array(_) => None,
        }
    }

    /// Dimensions of a regular tensor, `None` for ragged nesting.
    ///
    /// A level mixing numbers with wrapped numbers counts as a level of
    /// numbers. Sibling shapes that differ only in trailing axes of length
    /// one agree, and the longer shape is kept.
    pub fn shape(&self) -> Option<Vec<usize>> {
        match self {
            ShapTensor::Scalar(_) => Some(vec![]),
            ShapTensor::Array(items) => {
                if items.is_empty() {
                    return Some(vec![0]);
                }
                if items.iter().any(|i| matches!(i, ShapTensor::Scalar(_))) {
                    return if items.iter().all(|i| i.as_scalar().is_some()) {
                        Some(vec![items.len()])
                    } else {
                        None
                    };
                }
                let mut first = items[0].shape()?;
                for item in &items[1..] {
                    let shape = item.shape()?;
                    if shape == first {
                        continue;
                    }
                    if squeeze_trailing(&shape) != squeeze_trailing(&first) {
                        return None;
                    }
                    if shape.len() > first.len() {
                        first = shape;
                    }
                }
                let mut dims = vec![items.len()];
                dims.extend(first);
                Some(dims)
            }
        }
    }

    fn flatten_into(&self, rank: usize, out: &mut Vec<f64>) {
        match self {
            ShapTensor::Array(items) if rank > 0 => items.iter().for_each(|i| i.flatten_into(rank - 1, out)),
            // Unconvertible values become NaN and drop their feature.
            _ => out.push(self.as_scalar().unwrap_or(f64::NAN)),
        }
    }
}

fn squeeze_trailing(dims: &[usize]) -> &[usize] {
    let end = dims.iter().rposition(|d| *d != 1).map_or(0, |i| i + 1);
    &dims[..end]
}

/// Raw explainer output for a binary classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawShapOutput {
    /// One tensor per class.
    PerClass(Vec<ShapTensor>),
    Single(ShapTensor),
}

/// Produces Shapley values for the rows of a feature matrix.
pub trait Explainer {
    /// Raw Shapley values for every row of `x`.
    fn shap_values(&self, x: &RowMajorMatrix<f64>) -> RawShapOutput;
    /// Base value of the positive class.
    fn expected_value(&self) -> f64;
}

/// Exact TreeSHAP on the forest's probability output.
#[cfg(feature = "shap")]
pub struct TreeExplainer<'a> {
    forest: &'a RandomForest,
}

#[cfg(feature = "shap")]
impl<'a> TreeExplainer<'a> {
    pub fn new(forest: &'a RandomForest) -> Self {
        TreeExplainer { forest }
    }
}

#[cfg(feature = "shap")]
impl<'a> Explainer for TreeExplainer<'a> {
    /// Emits the two-class list. The negative class values are the negated
    /// positive class values, as the two probabilities sum to one.
    fn shap_values(&self, x: &RowMajorMatrix<f64>) -> RawShapOutput {
        let data = x.to_column_major();
        let matrix = Matrix::new(&data, x.rows, x.cols);
        let contribs = self.forest.predict_contributions(&matrix, true);
        let positive: Vec<f64> = contribs
            .chunks(x.cols + 1)
            .flat_map(|row| row[..x.cols].iter().copied())
            .collect();
        let negative: Vec<f64> = positive.iter().map(|v| -v).collect();
        RawShapOutput::PerClass(vec![
            ShapTensor::from_rows(&negative, x.rows, x.cols),
            ShapTensor::from_rows(&positive, x.rows, x.cols),
        ])
    }

    fn expected_value(&self) -> f64 {
        self.forest.expected_value()
    }
}

/// Shapley values aligned with the leading `values.cols` requested features.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledShap {
    pub values: RowMajorMatrix<f64>,
}

fn mismatch(detail: String) -> UnavailableReason {
    warn!("{}", detail);
    UnavailableReason::new(ReasonCode::ShapeMismatch, detail)
}

/// Reconcile raw explainer output with `n_features` requested features.
pub fn reconcile(raw: RawShapOutput, n_features: usize) -> Result<ReconciledShap, UnavailableReason> {
    if n_features == 0 {
        return Err(UnavailableReason::new(ReasonCode::NoFeatures, "no features to explain"));
    }

    let tensor = match raw {
        RawShapOutput::PerClass(mut classes) => match classes.len() {
            2 => classes.swap_remove(1),
            1 => classes.swap_remove(0),
            _ => ShapTensor::Array(classes),
        },
        RawShapOutput::Single(t) => t,
    };

    let mut dims = tensor
        .shape()
        .ok_or_else(|| mismatch("SHAP values are ragged and cannot be reshaped".to_string()))?;
    let mut flat = Vec::new();
    tensor.flatten_into(dims.len(), &mut flat);
    while dims.len() > 2 && dims.last() == Some(&1) {
        dims.pop();
    }

    let (rows, cols, data) = match dims.as_slice() {
        [] => (1, 1, flat),
        [c] => (1, *c, flat),
        [r, c] => (*r, *c, flat),
        [r, c, 2] => {
            debug!("Taking the positive class slice of a {}x{}x2 SHAP array.", r, c);
            let positive = flat.iter().skip(1).step_by(2).copied().collect();
            (*r, *c, positive)
        }
        other => {
            return Err(mismatch(format!(
                "SHAP values of shape {:?} cannot be reconciled with {} features",
                other, n_features
            )))
        }
    };
    let values = RowMajorMatrix::new(data, rows, cols);

    let values = if cols == 2 * n_features {
        info!(
            "SHAP values have {} columns for {} features, keeping the first {}.",
            cols, n_features, n_features
        );
        values.leading_columns(n_features)
    } else if cols > n_features {
        warn!(
            "SHAP values have {} columns for {} features, truncating to {}.",
            cols, n_features, n_features
        );
        values.leading_columns(n_features)
    } else {
        if cols < n_features {
            warn!(
                "SHAP values have {} columns for {} features, using the leading {} features.",
                cols, n_features, cols
            );
        }
        values
    };
    Ok(ReconciledShap { values })
}

impl ReconciledShap {
    fn column_reduce<F: Fn(f64) -> f64>(&self, f: F) -> Vec<Option<f64>> {
        let m = &self.values;
        (0..m.cols)
            .map(|j| {
                let col: Vec<f64> = (0..m.rows).map(|i| *m.get(i, j)).collect();
                if m.rows == 0 || col.iter().any(|v| !v.is_finite()) {
                    None
                } else {
                    Some(col.iter().map(|v| f(*v)).sum::<f64>() / m.rows as f64)
                }
            })
            .collect()
    }

    /// Mean absolute value per column, `None` for a column with a
    /// non-finite value or when there are no rows.
    pub fn mean_abs(&self) -> Vec<Option<f64>> {
        self.column_reduce(f64::abs)
    }

    /// Mean signed value per column, `None` as in [`ReconciledShap::mean_abs`].
    pub fn mean_signed(&self) -> Vec<Option<f64>> {
        self.column_reduce(|v| v)
    }

    /// How many features push towards and away from satisfaction on average.
    pub fn directional_impact(&self) -> DirectionalImpact {
        let means = self.mean_signed();
        DirectionalImpact {
            positive: means.iter().flatten().filter(|v| **v > 0.0).count(),
            negative: means.iter().flatten().filter(|v| **v < 0.0).count(),
        }
    }
}

/// Counts of features by the sign of their mean Shapley value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectionalImpact {
    pub positive: usize,
    pub negative: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallStep {
    pub feature: String,
    pub display_name: String,
    pub value: f64,
    /// Base value plus this and every earlier step.
    pub cumulative: f64,
}

/// Explanation of one held-out prediction, largest contributions first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waterfall {
    /// Row actually explained.
    pub sample_index: usize,
    pub base_value: f64,
    pub steps: Vec<WaterfallStep>,
    /// Running total after the last step.
    pub final_value: f64,
}

/// Explain row `sample_index` of `x`, falling back to the first row when the
/// index is out of range. At most [`WATERFALL_TOP_N`] features are kept,
/// ordered by absolute contribution.
pub fn waterfall<S: AsRef<str>>(
    explainer: &dyn Explainer,
    feature_cols: &[S],
    x: &RowMajorMatrix<f64>,
    sample_index: usize,
) -> Result<Waterfall, UnavailableReason> {
    if x.rows == 0 {
        return Err(UnavailableReason::new(ReasonCode::NoFeatures, "no held-out rows to explain"));
    }
    let sample_index = if sample_index < x.rows {
        sample_index
    } else {
        debug!("Sample {} out of range for {} rows, explaining row 0.", sample_index, x.rows);
        0
    };
    let row = RowMajorMatrix::new(x.row(sample_index).to_vec(), 1, x.cols);
    let reconciled = reconcile(explainer.shap_values(&row), feature_cols.len())?;

    let contributions: Vec<(usize, f64)> = (0..reconciled.values.cols)
        .map(|j| (j, *reconciled.values.get(0, j)))
        .filter(|(_, v)| v.is_finite())
        .collect();
    if contributions.is_empty() {
        return Err(UnavailableReason::new(
            ReasonCode::NoFeatures,
            "no feature has a finite SHAP value",
        ));
    }
    let magnitudes: Vec<f64> = contributions.iter().map(|(_, v)| v.abs()).collect();

    let base_value = explainer.expected_value();
    let mut running = base_value;
    let steps = argsort_desc(&magnitudes)
        .into_iter()
        .take(WATERFALL_TOP_N)
        .map(|k| {
            let (j, value) = contributions[k];
            running += value;
            let feature = feature_cols[j].as_ref();
            WaterfallStep {
                feature: feature.to_string(),
                display_name: truncate_label(display_name(feature)),
                value,
                cumulative: running,
            }
        })
        .collect();
    Ok(Waterfall {
        sample_index,
        base_value,
        steps,
        final_value: running,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn t(rows: &[&[f64]]) -> ShapTensor {
        ShapTensor::Array(
            rows.iter()
                .map(|r| ShapTensor::Array(r.iter().map(|v| ShapTensor::Scalar(*v)).collect()))
                .collect(),
        )
    }

    fn mean_abs(raw: RawShapOutput, k: usize) -> Result<Vec<Option<f64>>, UnavailableReason> {
        reconcile(raw, k).map(|r| r.mean_abs())
    }

    #[test]
    fn test_per_class_list_of_two() {
        let neg = t(&[&[0.1, -0.2, 0.3], &[0.1, 0.2, -0.3]]);
        let pos = t(&[&[-0.1, 0.2, -0.3], &[-0.3, -0.2, 0.5]]);
        let res = mean_abs(RawShapOutput::PerClass(vec![neg, pos]), 3).unwrap();
        assert_relative_eq!(res[0].unwrap(), 0.2);
        assert_relative_eq!(res[1].unwrap(), 0.2);
        assert_relative_eq!(res[2].unwrap(), 0.4);
    }

    #[test]
    fn test_per_class_list_of_one() {
        let only = t(&[&[1.0, -2.0]]);
        let res = mean_abs(RawShapOutput::PerClass(vec![only]), 2).unwrap();
        assert_eq!(res, vec![Some(1.0), Some(2.0)]);
    }

    #[test]
    fn test_doubled_width_keeps_first_half() {
        let raw = RawShapOutput::Single(t(&[&[0.5, -0.5, 9.0, 9.0], &[-0.5, 0.1, 9.0, 9.0]]));
        let res = mean_abs(raw, 2).unwrap();
        assert_eq!(res.len(), 2);
        assert_relative_eq!(res[0].unwrap(), 0.5);
        assert_relative_eq!(res[1].unwrap(), 0.3);
    }

    #[test]
    fn test_column_count_mismatch_degrades() {
        let raw = RawShapOutput::Single(t(&[&[0.1, 0.2, 0.3]]));
        assert_eq!(mean_abs(raw.clone(), 2).unwrap().len(), 2);
        assert_eq!(mean_abs(raw, 5).unwrap().len(), 3);
    }

    #[test]
    fn test_low_rank_inputs() {
        let res = mean_abs(RawShapOutput::Single(ShapTensor::Scalar(-0.4)), 1).unwrap();
        assert_eq!(res, vec![Some(0.4)]);
        let vector = ShapTensor::Array(vec![ShapTensor::Scalar(0.1), ShapTensor::Scalar(-0.2)]);
        let reconciled = reconcile(RawShapOutput::Single(vector), 2).unwrap();
        assert_eq!(reconciled.values.rows, 1);
        assert_eq!(reconciled.values.cols, 2);
    }

    #[test]
    fn test_wrapped_scalars() {
        let wrapped = |v: f64| ShapTensor::Array(vec![ShapTensor::Scalar(v)]);
        // Every cell wrapped: an (n, k, 1) array.
        let raw = ShapTensor::Array(vec![
            ShapTensor::Array(vec![wrapped(0.2), wrapped(-0.4)]),
            ShapTensor::Array(vec![wrapped(0.4), wrapped(0.0)]),
        ]);
        let res = mean_abs(RawShapOutput::Single(raw), 2).unwrap();
        assert_relative_eq!(res[0].unwrap(), 0.3);
        assert_relative_eq!(res[1].unwrap(), 0.2);
        // Wrapped and native numbers mixed in one row.
        let raw = ShapTensor::Array(vec![ShapTensor::Array(vec![wrapped(0.2), ShapTensor::Scalar(-0.4)])]);
        assert_eq!(mean_abs(RawShapOutput::Single(raw), 2).unwrap(), vec![Some(0.2), Some(0.4)]);
    }

    #[test]
    fn test_wrapped_rows_next_to_plain_rows() {
        let plain = |v: f64| ShapTensor::Scalar(v);
        let wrapped = |v: f64| ShapTensor::Array(vec![ShapTensor::Scalar(v)]);
        let raw = ShapTensor::Array(vec![
            ShapTensor::Array(vec![plain(0.1), plain(0.2)]),
            ShapTensor::Array(vec![wrapped(0.3), wrapped(0.4)]),
        ]);
        assert_eq!(raw.shape(), Some(vec![2, 2, 1]));
        let res = mean_abs(RawShapOutput::Single(raw), 2).unwrap();
        assert_relative_eq!(res[0].unwrap(), 0.2);
        assert_relative_eq!(res[1].unwrap(), 0.3);

        let raw = ShapTensor::Array(vec![
            ShapTensor::Array(vec![plain(0.1), wrapped(0.2)]),
            ShapTensor::Array(vec![wrapped(0.3), wrapped(0.4)]),
        ]);
        let reconciled = reconcile(RawShapOutput::Single(raw), 2).unwrap();
        assert_eq!((reconciled.values.rows, reconciled.values.cols), (2, 2));
        assert_eq!(reconciled.values.row(1), &[0.3, 0.4]);

        // A genuine column vector keeps its rows.
        let column = ShapTensor::Array(vec![wrapped(0.5), wrapped(-0.5), wrapped(0.2)]);
        let reconciled = reconcile(RawShapOutput::Single(column), 1).unwrap();
        assert_eq!((reconciled.values.rows, reconciled.values.cols), (3, 1));
    }

    #[test]
    fn test_three_dimensional_class_axis() {
        // (rows, features, classes)
        let cell = |neg: f64, pos: f64| ShapTensor::Array(vec![ShapTensor::Scalar(neg), ShapTensor::Scalar(pos)]);
        let raw = ShapTensor::Array(vec![
            ShapTensor::Array(vec![cell(-0.1, 0.1), cell(0.3, -0.3)]),
            ShapTensor::Array(vec![cell(-0.3, 0.3), cell(0.1, -0.1)]),
        ]);
        let res = mean_abs(RawShapOutput::Single(raw), 2).unwrap();
        assert_relative_eq!(res[0].unwrap(), 0.2);
        assert_relative_eq!(res[1].unwrap(), 0.2);
    }

    #[test]
    fn test_unrecoverable_shapes() {
        // A list of three per-class arrays stacks to (3, n, k).
        let m = t(&[&[0.1, 0.2, 0.3]]);
        let res = reconcile(RawShapOutput::PerClass(vec![m.clone(), m.clone(), m]), 3);
        assert_eq!(res.unwrap_err().code, ReasonCode::ShapeMismatch);
        // Ragged rows.
        let ragged = ShapTensor::Array(vec![
            ShapTensor::Array(vec![ShapTensor::Scalar(0.1)]),
            ShapTensor::Array(vec![ShapTensor::Scalar(0.1), ShapTensor::Scalar(0.2)]),
        ]);
        let res = reconcile(RawShapOutput::Single(ragged), 2);
        assert_eq!(res.unwrap_err().code, ReasonCode::ShapeMismatch);
        let res = reconcile(RawShapOutput::Single(ShapTensor::Scalar(1.0)), 0);
        assert_eq!(res.unwrap_err().code, ReasonCode::NoFeatures);
    }

    #[test]
    fn test_non_finite_drops_feature() {
        let raw = RawShapOutput::Single(t(&[&[0.1, f64::NAN], &[0.3, 0.2]]));
        let reconciled = reconcile(raw, 2).unwrap();
        assert_eq!(reconciled.mean_abs()[1], None);
        assert!(reconciled.mean_abs()[0].is_some());
    }

    #[test]
    fn test_directional_impact() {
        let raw = RawShapOutput::Single(t(&[&[0.1, -0.2, 0.0], &[0.3, -0.1, 0.0]]));
        let impact = reconcile(raw, 3).unwrap().directional_impact();
        assert_eq!(impact, DirectionalImpact { positive: 1, negative: 1 });
    }

    #[test]
    fn test_shap_tensor_from_json() {
        let tensor: ShapTensor = serde_json::from_str("[[0.5, [-0.25]], [1.0, 2.0]]").unwrap();
        assert_eq!(tensor.shape(), Some(vec![2, 2]));
    }

    struct FixedExplainer(RawShapOutput);

    impl Explainer for FixedExplainer {
        fn shap_values(&self, _x: &RowMajorMatrix<f64>) -> RawShapOutput {
            self.0.clone()
        }
        fn expected_value(&self) -> f64 {
            0.5
        }
    }

    #[test]
    fn test_waterfall() {
        let features: Vec<String> = (0..10).map(|i| format!("f{}", i)).collect();
        let values = [0.01, -0.3, 0.02, 0.2, -0.05, 0.0, 0.04, -0.03, 0.06, 0.1];
        let explainer = FixedExplainer(RawShapOutput::Single(t(&[&values])));
        let x = RowMajorMatrix::new(vec![0.0; 20], 2, 10);

        let w = waterfall(&explainer, &features, &x, 7).unwrap();
        // Out of range, so the first row is explained.
        assert_eq!(w.sample_index, 0);
        assert_eq!(w.steps.len(), WATERFALL_TOP_N);
        let order: Vec<&str> = w.steps.iter().map(|s| s.feature.as_str()).collect();
        assert_eq!(order, vec!["f1", "f3", "f9", "f8", "f4", "f6", "f7", "f2"]);
        assert_relative_eq!(w.steps[0].cumulative, 0.2);
        let total: f64 = w.steps.iter().map(|s| s.value).sum();
        assert_relative_eq!(w.final_value, 0.5 + total);
        assert_relative_eq!(w.final_value, w.steps[7].cumulative);
    }

    #[test]
    fn test_waterfall_without_rows() {
        let explainer = FixedExplainer(RawShapOutput::Single(ShapTensor::Scalar(0.0)));
        let x = RowMajorMatrix::new(vec![], 0, 2);
        assert_eq!(
            waterfall(&explainer, &["a", "b"], &x, 0).unwrap_err().code,
            ReasonCode::NoFeatures
        );
    }

    #[cfg(feature = "shap")]
    #[test]
    fn test_tree_explainer_matches_forest() {
        use crate::config::ForestConfig;

        let n = 60;
        let mut data = vec![0.0; n * 2];
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            data[i] = (i % 5) as f64;
            data[n + i] = ((i / 5) % 3) as f64;
            y.push(i % 5 >= 2);
        }
        let matrix = Matrix::new(&data, n, 2);
        let mut forest = RandomForest::new(ForestConfig {
            n_trees: 10,
            ..ForestConfig::explainable()
        });
        forest.fit(&matrix, &y).unwrap();

        let rows: Vec<f64> = (0..n).flat_map(|i| vec![data[i], data[n + i]]).collect();
        let x = RowMajorMatrix::new(rows, n, 2);
        let explainer = TreeExplainer::new(&forest);
        let raw = explainer.shap_values(&x);
        match &raw {
            RawShapOutput::PerClass(classes) => {
                assert_eq!(classes.len(), 2);
                assert_eq!(classes[1].shape(), Some(vec![n, 2]));
            }
            other => panic!("expected a per-class list, got {:?}", other),
        }
        let reconciled = reconcile(raw, 2).unwrap();
        for i in 0..n {
            let p = forest.predict_proba_row(x.row(i));
            let sum: f64 = reconciled.values.row(i).iter().sum();
            assert_relative_eq!(explainer.expected_value() + sum, p, epsilon = 1e-9);
        }
    }
}
