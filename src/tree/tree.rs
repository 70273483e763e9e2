use crate::data::Matrix;
use crate::node::{Node, NodeType, SplittableNode};
use crate::splitter::{NodeInfo, Splitter};
use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::cmp::max;
use std::fmt::{self, Display};

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeLimits {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Candidate features examined per split.
    pub max_features: usize,
}

/// A binary classification tree. Nodes are stored in creation order, so a
/// node's `num` is its position and the root is node 0.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Tree {
    pub nodes: Vec<Node>,
    pub depth: usize,
    pub n_leaves: usize,
}

impl Tree {
    pub fn new() -> Self {
        Tree::default()
    }

    /// Grow the tree depth first on the rows in `index`, which may repeat.
    ///
    /// A node stays a leaf when it is pure, when it is at `max_depth`, when it
    /// holds fewer than `min_samples_split` rows, or when no candidate feature
    /// has a threshold leaving enough rows on both sides.
    pub fn fit<T: Splitter>(
        &mut self,
        data: &Matrix<f64>,
        y: &[bool],
        index: Vec<usize>,
        splitter: &T,
        limits: &TreeLimits,
        rng: &mut StdRng,
    ) {
        self.nodes.clear();
        self.depth = 0;
        self.n_leaves = 1;

        let root = SplittableNode::new(0, NodeInfo::from_index(y, &index), 0, NodeType::Root, 0, index);
        self.nodes.push(root.as_node());

        let mut features: Vec<usize> = (0..data.cols).collect();
        let mut growable = vec![root];
        while let Some(node) = growable.pop() {
            let at_max_depth = limits.max_depth.map_or(false, |d| node.depth >= d);
            if at_max_depth || node.index.len() < limits.min_samples_split || node.info.impurity <= 0.0 {
                continue;
            }

            features.shuffle(rng);
            let split = match splitter.best_split(data, y, &node.index, &features, limits.max_features) {
                Some(split) => split,
                None => continue,
            };

            let (left_index, right_index): (Vec<usize>, Vec<usize>) = node
                .index
                .iter()
                .partition(|&&i| *data.get(i, split.split_feature) <= split.split_value);

            let left_num = self.nodes.len();
            let right_num = left_num + 1;
            self.nodes[node.num].make_parent_node(&split, left_num, right_num);

            let left = SplittableNode::new(
                left_num,
                split.left_node,
                node.depth + 1,
                NodeType::Left,
                node.num,
                left_index,
            );
            let right = SplittableNode::new(
                right_num,
                split.right_node,
                node.depth + 1,
                NodeType::Right,
                node.num,
                right_index,
            );
            self.nodes.push(left.as_node());
            self.nodes.push(right.as_node());
            self.n_leaves += 1;
            self.depth = max(self.depth, node.depth + 1);

            // Left subtree is grown first.
            growable.push(right);
            growable.push(left);
        }
    }

    /// Cover weighted average of the leaf values below node `i`.
    pub fn get_average_leaf_weights(&self, i: usize) -> f64 {
        let node = &self.nodes[i];
        if node.is_leaf {
            node.value
        } else {
            let left_node = &self.nodes[node.left_child];
            let right_node = &self.nodes[node.right_child];
            let mut w = left_node.cover * self.get_average_leaf_weights(node.left_child);
            w += right_node.cover * self.get_average_leaf_weights(node.right_child);
            w / node.cover
        }
    }

    /// Mean prediction over the training rows, the base value of the
    /// tree's Shapley values.
    pub fn expected_value(&self) -> f64 {
        if self.nodes.is_empty() {
            0.0
        } else {
            self.get_average_leaf_weights(0)
        }
    }

    fn calc_feature_node_stats<F>(&self, calc_stat: &F, node: &Node, stats: &mut HashMap<usize, f64>)
    where
        F: Fn(&Node) -> f64,
    {
        if node.is_leaf {
            return;
        }
        *stats.entry(node.split_feature).or_insert(0.0) += calc_stat(node);
        self.calc_feature_node_stats(calc_stat, &self.nodes[node.left_child], stats);
        self.calc_feature_node_stats(calc_stat, &self.nodes[node.right_child], stats);
    }

    /// Total weighted impurity decrease per feature.
    pub fn calculate_importance_gain(&self, stats: &mut HashMap<usize, f64>) {
        if let Some(root) = self.nodes.first() {
            self.calc_feature_node_stats(&|n: &Node| n.split_gain, root, stats);
        }
    }

    /// Mean decrease in impurity per feature, normalized to sum to one.
    /// All zeros for a tree that never split.
    pub fn feature_importance(&self, n_features: usize) -> Vec<f64> {
        let mut importance = vec![0.0; n_features];
        let root_cover = match self.nodes.first() {
            Some(root) if root.cover > 0.0 => root.cover,
            _ => return importance,
        };
        let mut stats = HashMap::new();
        self.calculate_importance_gain(&mut stats);
        for (feature, gain) in stats {
            if feature < n_features {
                importance[feature] = gain / root_cover;
            }
        }
        let total: f64 = importance.iter().sum();
        if total > 0.0 {
            importance.iter_mut().for_each(|v| *v /= total);
        }
        importance
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut print_buffer: Vec<usize> = if self.nodes.is_empty() { vec![] } else { vec![0] };
        let mut r = String::new();
        while let Some(idx) = print_buffer.pop() {
            let node = &self.nodes[idx];
            r += format!("{}{}\n", "      ".repeat(node.depth).as_str(), node).as_str();
            if !node.is_leaf {
                print_buffer.push(node.right_child);
                print_buffer.push(node.left_child);
            }
        }
        write!(f, "{}", r)
    }
}
