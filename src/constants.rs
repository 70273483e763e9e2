pub const LABEL_COLUMN: &str = "satisfaction";
pub const BINARY_LABEL_COLUMN: &str = "satisfaction_binary";
pub const POSITIVE_LABEL: &str = "satisfied";
pub const MIN_ROWS: usize = 30;
pub const EXPLAINABLE_MIN_ROWS: usize = 50;
pub const TEST_FRACTION: f64 = 0.3;
pub const SEED: u64 = 42;
pub const N_TREES: usize = 100;
pub const EXPLAINABLE_MAX_DEPTH: usize = 10;
pub const EXPLAINABLE_MIN_SAMPLES_SPLIT: usize = 5;
pub const EXPLAINABLE_MIN_SAMPLES_LEAF: usize = 2;
pub const WATERFALL_TOP_N: usize = 8;
pub const SUMMARY_TOP_N: usize = 8;
pub const DISPLAY_LABEL_MAX_CHARS: usize = 25;
pub const ERROR_MESSAGE_MAX_CHARS: usize = 50;
pub const CACHE_CAPACITY: usize = 16;
