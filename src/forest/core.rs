use crate::config::ForestConfig;
use crate::data::Matrix;
use crate::errors::AttributionError;
use crate::sampler::{BootstrapSampler, Sampler};
use crate::splitter::GiniSplitter;
use crate::tree::tree::{Tree, TreeLimits};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Bagged ensemble of Gini classification trees predicting the probability
/// that a passenger is satisfied.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct RandomForest {
    pub cfg: ForestConfig,
    pub trees: Vec<Tree>,
    /// Number of features the forest was fitted on.
    pub n_features: usize,
}

impl RandomForest {
    pub fn new(cfg: ForestConfig) -> Self {
        RandomForest {
            cfg,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    /// Fit the forest.
    ///
    /// Every tree gets its own seed, drawn up front from the forest seed, so
    /// the fitted forest does not depend on the number of threads.
    ///
    /// * `data` - Column major feature matrix, every value finite.
    /// * `y` - Satisfaction outcome per row.
    pub fn fit(&mut self, data: &Matrix<f64>, y: &[bool]) -> Result<(), AttributionError> {
        self.cfg
            .validate()
            .map_err(|e| AttributionError::Training(e.to_string()))?;
        if data.rows == 0 || data.cols == 0 {
            return Err(AttributionError::Training(format!(
                "cannot fit on a {}x{} feature matrix",
                data.rows, data.cols
            )));
        }
        if y.len() != data.rows {
            return Err(AttributionError::Training(format!(
                "{} labels provided for {} rows",
                y.len(),
                data.rows
            )));
        }
        if data.data.iter().any(|v| !v.is_finite()) {
            return Err(AttributionError::Training(
                "feature matrix contains non-finite values".to_string(),
            ));
        }

        let start = Instant::now();
        let num_threads = match self.cfg.num_threads {
            Some(num_threads) => num_threads,
            None => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| AttributionError::Training(e.to_string()))?;

        let mut rng = StdRng::seed_from_u64(self.cfg.seed);
        let seeds: Vec<u64> = (0..self.cfg.n_trees).map(|_| rng.gen()).collect();
        let limits = TreeLimits {
            max_depth: self.cfg.max_depth,
            min_samples_split: self.cfg.min_samples_split,
            max_features: self.cfg.max_features.resolve(data.cols),
        };
        let splitter = GiniSplitter::new(self.cfg.min_samples_leaf);

        let trees: Vec<Tree> = pool.install(|| {
            seeds
                .par_iter()
                .map(|seed| {
                    let mut tree_rng = StdRng::seed_from_u64(*seed);
                    let (chosen, _) = BootstrapSampler.sample(&mut tree_rng, &data.index);
                    let mut tree = Tree::new();
                    tree.fit(data, y, chosen, &splitter, &limits, &mut tree_rng);
                    tree
                })
                .collect()
        });
        if trees.is_empty() {
            return Err(AttributionError::Training("no trees were grown".to_string()));
        }

        self.trees = trees;
        self.n_features = data.cols;
        info!(
            "Fitted {} trees on {} rows and {} features in {:.3} seconds.",
            self.trees.len(),
            data.rows,
            data.cols,
            start.elapsed().as_secs_f32()
        );
        Ok(())
    }

    /// Impurity based feature importance.
    ///
    /// Each tree's mean decrease in impurity is normalized, averaged over the
    /// trees that split at least once, and normalized again. All zeros when
    /// no tree split.
    pub fn feature_importances(&self) -> Vec<f64> {
        let per_tree: Vec<Vec<f64>> = self
            .trees
            .iter()
            .filter(|t| t.nodes.len() > 1)
            .map(|t| t.feature_importance(self.n_features))
            .collect();
        let mut importance = vec![0.0; self.n_features];
        if per_tree.is_empty() {
            return importance;
        }
        for tree_importance in &per_tree {
            importance.iter_mut().zip(tree_importance).for_each(|(a, v)| *a += v);
        }
        importance.iter_mut().for_each(|v| *v /= per_tree.len() as f64);
        let total: f64 = importance.iter().sum();
        if total > 0.0 {
            importance.iter_mut().for_each(|v| *v /= total);
        }
        importance
    }

    /// Mean predicted probability over the bootstrap samples.
    pub fn expected_value(&self) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(Tree::expected_value).sum::<f64>() / self.trees.len() as f64
    }
}
