use super::tree::Tree;
use crate::data::Matrix;
use rayon::prelude::*;

impl Tree {
    fn predict_row(&self, data: &Matrix<f64>, row: usize) -> f64 {
        let mut node_idx = 0;
        loop {
            let node = &self.nodes[node_idx];
            if node.is_leaf {
                return node.value;
            } else {
                node_idx = node.get_child_idx(data.get(row, node.split_feature));
            }
        }
    }

    /// Probability of satisfaction for a single row.
    pub fn predict_row_from_row_slice(&self, row: &[f64]) -> f64 {
        let mut node_idx = 0;
        loop {
            let node = match self.nodes.get(node_idx) {
                Some(node) => node,
                None => return 0.0,
            };
            if node.is_leaf {
                return node.value;
            } else {
                node_idx = node.get_child_idx(&row[node.split_feature]);
            }
        }
    }

    fn predict_single_threaded(&self, data: &Matrix<f64>) -> Vec<f64> {
        data.index.iter().map(|i| self.predict_row(data, *i)).collect()
    }

    fn predict_parallel(&self, data: &Matrix<f64>) -> Vec<f64> {
        data.index.par_iter().map(|i| self.predict_row(data, *i)).collect()
    }

    pub fn predict(&self, data: &Matrix<f64>, parallel: bool) -> Vec<f64> {
        if self.nodes.is_empty() {
            return vec![0.0; data.index.len()];
        }
        if parallel {
            self.predict_parallel(data)
        } else {
            self.predict_single_threaded(data)
        }
    }
}
