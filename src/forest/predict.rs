use super::core::RandomForest;
use crate::data::Matrix;
use crate::shapley::predict_contributions_row_shapley;
use rayon::prelude::*;

impl RandomForest {
    /// Probability of satisfaction for a single row, averaged over trees.
    pub fn predict_proba_row(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict_row_from_row_slice(row)).sum::<f64>() / self.trees.len() as f64
    }

    /// Probability of satisfaction for every row of `data`.
    pub fn predict_proba(&self, data: &Matrix<f64>, parallel: bool) -> Vec<f64> {
        if parallel {
            data.index
                .par_iter()
                .map(|i| self.predict_proba_row(&data.get_row(*i)))
                .collect()
        } else {
            data.index
                .iter()
                .map(|i| self.predict_proba_row(&data.get_row(*i)))
                .collect()
        }
    }

    /// Predicted satisfaction, a row is satisfied when its probability
    /// exceeds one half.
    pub fn predict(&self, data: &Matrix<f64>, parallel: bool) -> Vec<bool> {
        self.predict_proba(data, parallel).into_iter().map(|p| p > 0.5).collect()
    }

    /// Exact Shapley values of the predicted probability.
    ///
    /// Returns a row major buffer with `data.cols + 1` entries per row, the
    /// last entry of each row being the bias term. Values sum to the
    /// predicted probability of the row.
    pub fn predict_contributions(&self, data: &Matrix<f64>, parallel: bool) -> Vec<f64> {
        let mut contribs = vec![0.; (data.cols + 1) * data.index.len()];
        if self.trees.is_empty() {
            return contribs;
        }
        let n_trees = self.trees.len() as f64;
        let row_fn = |row: usize, c: &mut [f64]| {
            let r_ = data.get_row(row);
            self.trees.iter().for_each(|t| predict_contributions_row_shapley(t, &r_, c));
            c.iter_mut().for_each(|v| *v /= n_trees);
        };
        if parallel {
            data.index
                .par_iter()
                .zip(contribs.par_chunks_mut(data.cols + 1))
                .for_each(|(row, c)| row_fn(*row, c));
        } else {
            data.index
                .iter()
                .zip(contribs.chunks_mut(data.cols + 1))
                .for_each(|(row, c)| row_fn(*row, c));
        }
        contribs
    }
}
