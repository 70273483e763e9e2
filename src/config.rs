//! Configuration
//!
//! Serde-backed configuration for the forest, the train/test split, the
//! sufficiency gate and label resolution, plus JSON IO and `set_*` builders.
use crate::constants::{
    BINARY_LABEL_COLUMN, CACHE_CAPACITY, EXPLAINABLE_MAX_DEPTH, EXPLAINABLE_MIN_ROWS, EXPLAINABLE_MIN_SAMPLES_LEAF,
    EXPLAINABLE_MIN_SAMPLES_SPLIT, LABEL_COLUMN, MIN_ROWS, N_TREES, POSITIVE_LABEL, SEED, TEST_FRACTION,
};
use crate::errors::AttributionError;
use crate::utils::{validate_fraction_parameter, validate_positive_parameter};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Number of features considered at each split.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`, at least one.
    #[default]
    Sqrt,
    /// Every feature.
    All,
    /// A fixed count, clamped to the number of features.
    Count(usize),
}

impl MaxFeatures {
    /// Resolve against the number of available features.
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(c) => *c,
        };
        n.clamp(1, n_features.max(1))
    }
}

fn default_n_trees() -> usize {
    N_TREES
}
fn default_max_depth() -> Option<usize> {
    None
}
fn default_min_samples_split() -> usize {
    2
}
fn default_min_samples_leaf() -> usize {
    1
}
fn default_seed() -> u64 {
    SEED
}
fn default_test_fraction() -> f64 {
    TEST_FRACTION
}
fn default_min_rows() -> usize {
    MIN_ROWS
}
fn default_explainable_min_rows() -> usize {
    EXPLAINABLE_MIN_ROWS
}
fn default_label_col() -> String {
    LABEL_COLUMN.to_string()
}
fn default_binary_col() -> Option<String> {
    Some(BINARY_LABEL_COLUMN.to_string())
}
fn default_positive_label() -> String {
    POSITIVE_LABEL.to_string()
}
fn default_cache_capacity() -> usize {
    CACHE_CAPACITY
}
fn default_explainable_forest() -> ForestConfig {
    ForestConfig::explainable()
}

/// Configuration for the bagged decision-tree ensemble.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Hash)]
pub struct ForestConfig {
    /// Number of trees.
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,
    /// Maximum tree depth, `None` grows until leaves are pure.
    #[serde(default = "default_max_depth")]
    pub max_depth: Option<usize>,
    /// Minimum rows a node needs to be split.
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    /// Minimum rows on each side of a split.
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    /// Candidate features per split.
    #[serde(default)]
    pub max_features: MaxFeatures,
    /// Seed for bootstrap sampling and feature selection.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Number of threads used to grow trees, defaults to available parallelism.
    #[serde(default)]
    pub num_threads: Option<usize>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        ForestConfig {
            n_trees: N_TREES,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            seed: SEED,
            num_threads: None,
        }
    }
}

impl ForestConfig {
    /// The shallower forest used when per-row explanations are wanted.
    pub fn explainable() -> Self {
        ForestConfig {
            max_depth: Some(EXPLAINABLE_MAX_DEPTH),
            min_samples_split: EXPLAINABLE_MIN_SAMPLES_SPLIT,
            min_samples_leaf: EXPLAINABLE_MIN_SAMPLES_LEAF,
            ..ForestConfig::default()
        }
    }

    pub fn validate(&self) -> Result<(), AttributionError> {
        validate_positive_parameter(self.n_trees, "n_trees")?;
        validate_positive_parameter(self.min_samples_leaf, "min_samples_leaf")?;
        if self.min_samples_split < 2 {
            return Err(AttributionError::InvalidParameter(
                "min_samples_split".to_string(),
                "an integer of at least 2".to_string(),
                self.min_samples_split.to_string(),
            ));
        }
        if let Some(depth) = self.max_depth {
            validate_positive_parameter(depth, "max_depth")?;
        }
        if let Some(threads) = self.num_threads {
            validate_positive_parameter(threads, "num_threads")?;
        }
        Ok(())
    }
}

/// Train/test split settings.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct SplitConfig {
    /// Fraction of rows held out for accuracy.
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        SplitConfig {
            test_fraction: TEST_FRACTION,
            seed: SEED,
        }
    }
}

/// Sample sufficiency settings.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct GateConfig {
    /// Rows needed before the default forest is trained.
    #[serde(default = "default_min_rows")]
    pub min_rows: usize,
    /// Rows needed before the explainable forest is trained, for SHAP
    /// strategies and the cross-group summary.
    #[serde(default = "default_explainable_min_rows")]
    pub explainable_min_rows: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            min_rows: MIN_ROWS,
            explainable_min_rows: EXPLAINABLE_MIN_ROWS,
        }
    }
}

/// How the binary satisfaction target is resolved.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct LabelConfig {
    /// Categorical satisfaction column.
    #[serde(default = "default_label_col")]
    pub label_col: String,
    /// Pre-binarized numeric column, preferred when present.
    #[serde(default = "default_binary_col")]
    pub binary_col: Option<String>,
    /// Label value meaning "satisfied".
    #[serde(default = "default_positive_label")]
    pub positive_label: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        LabelConfig {
            label_col: LABEL_COLUMN.to_string(),
            binary_col: Some(BINARY_LABEL_COLUMN.to_string()),
            positive_label: POSITIVE_LABEL.to_string(),
        }
    }
}

/// Configuration for the attribution pipeline.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct AttributionConfig {
    /// Forest used for native importances.
    #[serde(default)]
    pub forest: ForestConfig,
    /// Forest used for SHAP explanations.
    #[serde(default = "default_explainable_forest")]
    pub explainable_forest: ForestConfig,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub label: LabelConfig,
    /// Entries kept by a [`crate::cache::ModelCache`] built from this config.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        AttributionConfig {
            forest: ForestConfig::default(),
            explainable_forest: ForestConfig::explainable(),
            split: SplitConfig::default(),
            gate: GateConfig::default(),
            label: LabelConfig::default(),
            cache_capacity: CACHE_CAPACITY,
        }
    }
}

impl AttributionConfig {
    pub fn new() -> Self {
        AttributionConfig::default()
    }

    /// Check every parameter, before any training is attempted.
    pub fn validate(&self) -> Result<(), AttributionError> {
        self.forest.validate()?;
        self.explainable_forest.validate()?;
        validate_fraction_parameter(self.split.test_fraction, "test_fraction")?;
        validate_positive_parameter(self.gate.min_rows, "min_rows")?;
        validate_positive_parameter(self.gate.explainable_min_rows, "explainable_min_rows")?;
        validate_positive_parameter(self.cache_capacity, "cache_capacity")?;
        Ok(())
    }

    // Set methods for parameters

    /// Set the number of trees in both forests.
    pub fn set_n_trees(mut self, n_trees: usize) -> Self {
        self.forest.n_trees = n_trees;
        self.explainable_forest.n_trees = n_trees;
        self
    }

    /// Set the seed used for the split and both forests.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.forest.seed = seed;
        self.explainable_forest.seed = seed;
        self.split.seed = seed;
        self
    }

    /// Set the number of threads used to grow trees.
    pub fn set_num_threads(mut self, num_threads: Option<usize>) -> Self {
        self.forest.num_threads = num_threads;
        self.explainable_forest.num_threads = num_threads;
        self
    }

    /// Set the minimum number of rows a subgroup needs.
    pub fn set_min_rows(mut self, min_rows: usize) -> Self {
        self.gate.min_rows = min_rows;
        self
    }

    /// Set the minimum number of rows a subgroup needs for the explainable forest.
    pub fn set_explainable_min_rows(mut self, explainable_min_rows: usize) -> Self {
        self.gate.explainable_min_rows = explainable_min_rows;
        self
    }

    /// Set the held-out fraction.
    pub fn set_test_fraction(mut self, test_fraction: f64) -> Self {
        self.split.test_fraction = test_fraction;
        self
    }

    /// Set the label resolution.
    pub fn set_label(mut self, label: LabelConfig) -> Self {
        self.label = label;
        self
    }

    /// Set the model cache capacity.
    pub fn set_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }
}

/// IO
pub trait ConfigIO: Serialize + DeserializeOwned + Sized {
    /// Save a config as a json object to a file.
    ///
    /// * `path` - Path to save config.
    fn save_config<P: AsRef<Path>>(&self, path: P) -> Result<(), AttributionError> {
        fs::write(path, self.json_dump()?).map_err(|e| AttributionError::UnableToWrite(e.to_string()))
    }

    /// Dump a config as a json object
    fn json_dump(&self) -> Result<String, AttributionError> {
        serde_json::to_string(self).map_err(|e| AttributionError::UnableToWrite(e.to_string()))
    }

    /// Load a config from Json string
    ///
    /// * `json_str` - String object, which can be serialized to json.
    fn from_json(json_str: &str) -> Result<Self, AttributionError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| AttributionError::UnableToRead(e.to_string()))
    }

    /// Load a config from a path to a json object.
    ///
    /// * `path` - Path to load config from.
    fn load_config<P: AsRef<Path>>(path: P) -> Result<Self, AttributionError> {
        let json_str = fs::read_to_string(path).map_err(|e| AttributionError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}

impl ConfigIO for AttributionConfig {}
