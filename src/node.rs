use crate::splitter::{NodeInfo, SplitInfo};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A node still waiting to be split while a tree is grown.
#[derive(Debug)]
pub struct SplittableNode {
    pub num: usize,
    pub info: NodeInfo,
    pub depth: usize,
    pub node_type: NodeType,
    pub parent_node: usize,
    /// Positions into the bootstrap index, repeated rows included.
    pub index: Vec<usize>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Node {
    pub num: usize,
    /// Fraction of satisfied passengers reaching this node.
    pub value: f64,
    /// Number of bootstrap rows reaching this node.
    pub cover: f64,
    /// Gini impurity of the node.
    pub impurity: f64,
    pub depth: usize,
    pub split_value: f64,
    pub split_feature: usize,
    /// Weighted impurity decrease of the split, zero for leaves.
    pub split_gain: f64,
    pub left_child: usize,
    pub right_child: usize,
    pub is_leaf: bool,
    pub node_type: NodeType,
    pub parent_node: usize,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum NodeType {
    Root,
    Left,
    Right,
}

impl SplittableNode {
    pub fn new(
        num: usize,
        info: NodeInfo,
        depth: usize,
        node_type: NodeType,
        parent_node: usize,
        index: Vec<usize>,
    ) -> Self {
        SplittableNode {
            num,
            info,
            depth,
            node_type,
            parent_node,
            index,
        }
    }

    /// Freeze into a leaf node. Parents are updated through
    /// [`Node::make_parent_node`].
    pub fn as_node(&self) -> Node {
        Node {
            num: self.num,
            value: self.info.value,
            cover: self.info.cover,
            impurity: self.info.impurity,
            depth: self.depth,
            split_value: 0.0,
            split_feature: 0,
            split_gain: 0.0,
            left_child: 0,
            right_child: 0,
            is_leaf: true,
            node_type: self.node_type,
            parent_node: self.parent_node,
        }
    }
}

impl Node {
    /// Update all the info that is needed if this node becomes a parent.
    pub fn make_parent_node(&mut self, split_info: &SplitInfo, left_child: usize, right_child: usize) {
        self.is_leaf = false;
        self.split_value = split_info.split_value;
        self.split_feature = split_info.split_feature;
        self.split_gain = split_info.split_gain;
        self.left_child = left_child;
        self.right_child = right_child;
    }

    /// Get the path that should be traveled down, given a value.
    /// Values equal to the threshold go left.
    pub fn get_child_idx(&self, v: &f64) -> usize {
        if v <= &self.split_value {
            self.left_child
        } else {
            self.right_child
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_leaf {
            write!(f, "{}:leaf={},cover={}", self.num, self.value, self.cover)
        } else {
            write!(
                f,
                "{}:[{} <= {}] yes={},no={},gain={},cover={}",
                self.num,
                self.split_feature,
                self.split_value,
                self.left_child,
                self.right_child,
                self.split_gain,
                self.cover
            )
        }
    }
}
