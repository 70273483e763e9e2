use crate::data::Matrix;

#[inline]
fn gini(cover: f64, positives: f64) -> f64 {
    if cover <= 0.0 {
        return 0.0;
    }
    let p = positives / cover;
    2.0 * p * (1.0 - p)
}

/// Summary statistics of the rows reaching a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeInfo {
    pub cover: f64,
    pub positives: f64,
    /// Positive class fraction.
    pub value: f64,
    pub impurity: f64,
}

impl NodeInfo {
    pub fn from_counts(cover: f64, positives: f64) -> Self {
        NodeInfo {
            cover,
            positives,
            value: if cover > 0.0 { positives / cover } else { 0.0 },
            impurity: gini(cover, positives),
        }
    }

    pub fn from_index(y: &[bool], index: &[usize]) -> Self {
        let positives = index.iter().filter(|&&i| y[i]).count();
        NodeInfo::from_counts(index.len() as f64, positives as f64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitInfo {
    pub split_feature: usize,
    /// Rows with `x <= split_value` go left.
    pub split_value: f64,
    /// `cover * impurity` of the parent minus that of both children.
    pub split_gain: f64,
    pub left_node: NodeInfo,
    pub right_node: NodeInfo,
    pub n_left: usize,
}

/// Outcome of searching a single feature.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureSplit {
    /// Every row in the node has the same value for the feature.
    Constant,
    /// The feature varies but no threshold respects the leaf size limit.
    Infeasible,
    Split(SplitInfo),
}

pub trait Splitter {
    /// Best threshold on one feature for the rows in `index`.
    fn feature_split(&self, data: &Matrix<f64>, y: &[bool], index: &[usize], feature: usize) -> FeatureSplit;

    /// Search the features in `features` order, stopping once `max_features`
    /// non-constant features were examined. Constant features do not count
    /// against the budget. Ties keep the earlier feature.
    fn best_split(
        &self,
        data: &Matrix<f64>,
        y: &[bool],
        index: &[usize],
        features: &[usize],
        max_features: usize,
    ) -> Option<SplitInfo> {
        let mut best: Option<SplitInfo> = None;
        let mut visited = 0;
        for &feature in features {
            if visited >= max_features {
                break;
            }
            match self.feature_split(data, y, index, feature) {
                FeatureSplit::Constant => continue,
                FeatureSplit::Infeasible => visited += 1,
                FeatureSplit::Split(info) => {
                    visited += 1;
                    if best.as_ref().map_or(true, |b| info.split_gain > b.split_gain) {
                        best = Some(info);
                    }
                }
            }
        }
        best
    }
}

/// Exhaustive Gini splitter over sorted feature values.
pub struct GiniSplitter {
    pub min_samples_leaf: usize,
}

impl GiniSplitter {
    pub fn new(min_samples_leaf: usize) -> Self {
        GiniSplitter {
            min_samples_leaf: min_samples_leaf.max(1),
        }
    }
}

impl Splitter for GiniSplitter {
    fn feature_split(&self, data: &Matrix<f64>, y: &[bool], index: &[usize], feature: usize) -> FeatureSplit {
        let col = data.get_col(feature);
        let mut pairs: Vec<(f64, bool)> = index.iter().map(|&i| (col[i], y[i])).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = pairs.len();
        match (pairs.first(), pairs.last()) {
            (Some(first), Some(last)) if first.0 < last.0 => {}
            _ => return FeatureSplit::Constant,
        }

        let parent = NodeInfo::from_counts(n as f64, pairs.iter().filter(|p| p.1).count() as f64);
        let parent_cost = parent.cover * parent.impurity;

        let mut best: Option<SplitInfo> = None;
        let mut left_pos = 0.0;
        for pos in 0..n - 1 {
            if pairs[pos].1 {
                left_pos += 1.0;
            }
            let n_left = pos + 1;
            let n_right = n - n_left;
            if pairs[pos].0 >= pairs[pos + 1].0 {
                continue;
            }
            if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                continue;
            }
            let left = NodeInfo::from_counts(n_left as f64, left_pos);
            let right = NodeInfo::from_counts(n_right as f64, parent.positives - left_pos);
            let split_gain = parent_cost - left.cover * left.impurity - right.cover * right.impurity;
            if best.as_ref().map_or(true, |b| split_gain > b.split_gain) {
                let (lo, hi) = (pairs[pos].0, pairs[pos + 1].0);
                let mut split_value = lo / 2.0 + hi / 2.0;
                if split_value >= hi || !split_value.is_finite() {
                    split_value = lo;
                }
                best = Some(SplitInfo {
                    split_feature: feature,
                    split_value,
                    split_gain,
                    left_node: left,
                    right_node: right,
                    n_left,
                });
            }
        }
        match best {
            Some(info) => FeatureSplit::Split(info),
            None => FeatureSplit::Infeasible,
        }
    }
}
