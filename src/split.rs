//! Train/test split
//!
//! Seeded hold-out partitioning. A stratified split is attempted first and a
//! plain shuffled split with the same seed is used when the classes are too
//! small to stratify.
use crate::errors::AttributionError;
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;

/// Row positions (into the labels slice) of each partition, sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    /// Whether class proportions were preserved.
    pub stratified: bool,
}

/// Why stratification was not possible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StratifyError {
    /// The least populated class has fewer than two members.
    ClassTooSmall { class: bool, count: usize },
    /// A partition would hold fewer rows than there are classes.
    PartitionTooSmall { partition: &'static str, size: usize, n_classes: usize },
}

impl fmt::Display for StratifyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StratifyError::ClassTooSmall { class, count } => write!(
                f,
                "the least populated class ({}) has only {} member(s), which is too few",
                class, count
            ),
            StratifyError::PartitionTooSmall {
                partition,
                size,
                n_classes,
            } => write!(
                f,
                "the {} size {} should be greater or equal to the number of classes {}",
                partition, size, n_classes
            ),
        }
    }
}

/// Number of held-out rows, rounded up.
pub fn test_size(n: usize, test_fraction: f64) -> usize {
    (test_fraction * n as f64).ceil() as usize
}

/// Stratified hold-out split.
///
/// Each class contributes to the test partition in proportion to its size,
/// with leftover rows assigned by largest remainder.
pub fn stratified_split(labels: &[bool], test_fraction: f64, seed: u64) -> Result<TrainTestSplit, StratifyError> {
    let n = labels.len();
    let n_test = test_size(n, test_fraction);
    let n_train = n.saturating_sub(n_test);

    let members: Vec<Vec<usize>> = [false, true]
        .iter()
        .map(|class| (0..n).filter(|&i| labels[i] == *class).collect())
        .collect();
    let present: Vec<usize> = (0..2).filter(|&c| !members[c].is_empty()).collect();
    let n_classes = present.len();

    for &c in &present {
        if members[c].len() < 2 {
            return Err(StratifyError::ClassTooSmall {
                class: c == 1,
                count: members[c].len(),
            });
        }
    }
    if n_train < n_classes {
        return Err(StratifyError::PartitionTooSmall {
            partition: "train_size",
            size: n_train,
            n_classes,
        });
    }
    if n_test < n_classes {
        return Err(StratifyError::PartitionTooSmall {
            partition: "test_size",
            size: n_test,
            n_classes,
        });
    }

    // Proportional allocation of the test rows.
    let exact: Vec<f64> = members
        .iter()
        .map(|m| n_test as f64 * m.len() as f64 / n as f64)
        .collect();
    let mut alloc: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();
    let mut remaining = n_test - alloc.iter().sum::<usize>();
    let mut by_remainder: Vec<usize> = present.clone();
    by_remainder.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
    });
    for &c in by_remainder.iter().cycle().take(by_remainder.len() * 2) {
        if remaining == 0 {
            break;
        }
        if alloc[c] < members[c].len() - 1 {
            alloc[c] += 1;
            remaining -= 1;
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);
    for (c, class_members) in members.into_iter().enumerate() {
        let mut shuffled = class_members;
        shuffled.shuffle(&mut rng);
        let (t, r) = shuffled.split_at(alloc[c]);
        test.extend_from_slice(t);
        train.extend_from_slice(r);
    }
    train.sort_unstable();
    test.sort_unstable();
    Ok(TrainTestSplit {
        train,
        test,
        stratified: true,
    })
}

/// Plain shuffled hold-out split.
pub fn shuffle_split(n: usize, test_fraction: f64, seed: u64) -> TrainTestSplit {
    let n_test = test_size(n, test_fraction).min(n);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut rng);
    let mut test = order[..n_test].to_vec();
    let mut train = order[n_test..].to_vec();
    train.sort_unstable();
    test.sort_unstable();
    TrainTestSplit {
        train,
        test,
        stratified: false,
    }
}

/// Stratified split, falling back to a shuffled split with the same seed.
///
/// Fails only when either partition would be empty.
pub fn train_test_split(labels: &[bool], test_fraction: f64, seed: u64) -> Result<TrainTestSplit, AttributionError> {
    let split = match stratified_split(labels, test_fraction, seed) {
        Ok(split) => split,
        Err(e) => {
            warn!("Stratified split failed ({}), using a shuffled split instead.", e);
            shuffle_split(labels.len(), test_fraction, seed)
        }
    };
    if split.train.is_empty() || split.test.is_empty() {
        return Err(AttributionError::Training(format!(
            "cannot split {} rows into non-empty train and test partitions",
            labels.len()
        )));
    }
    debug!(
        "Split {} rows into {} train and {} test rows (stratified: {}).",
        labels.len(),
        split.train.len(),
        split.test.len(),
        split.stratified
    );
    Ok(split)
}
