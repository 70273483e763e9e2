mod node;
mod shapley;

// Modules
pub mod analysis;
pub mod cache;
pub mod config;
pub mod constants;
pub mod data;
pub mod errors;
pub mod forest;
pub mod gate;
pub mod importance;
pub mod label;
pub mod metric;
pub mod ranking;
pub mod sampler;
pub mod shap;
pub mod split;
pub mod splitter;
pub mod subgroup;
pub mod trainer;
pub mod tree;
pub mod utils;

// Individual classes, and functions
pub use analysis::{
    analyze, compare_average_ratings, profile, summarize_all, AttributionOutcome, AttributionReport,
    AttributionRequest, Insight, Strategy,
};
pub use cache::{analyze_cached, ModelCache};
pub use config::{AttributionConfig, ConfigIO, ForestConfig};
pub use data::{Dataset, Matrix};
pub use errors::{AttributionError, InsufficientData, ReasonCode, UnavailableReason};
pub use forest::RandomForest;
pub use ranking::{RankedFactor, Scale};
