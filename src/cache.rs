//! Model cache
//!
//! Trained models keyed by subgroup, feature list and training settings, so
//! that switching strategies or revisiting a group does not retrain. The cache
//! is bound to one dataset fingerprint and empties itself when a different
//! dataset is seen.
use crate::analysis::{analyze_with, AttributionOutcome, AttributionRequest};
use crate::config::{AttributionConfig, ForestConfig, LabelConfig, SplitConfig};
use crate::data::Dataset;
use crate::errors::AttributionError;
use crate::trainer::{train, TrainedModel};
use hashbrown::HashMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub group_col: String,
    pub group_value: String,
    /// Hash of the feature list and every setting that changes the model.
    pub features_hash: u64,
}

/// Hash of an ordered feature list together with the training settings.
pub fn feature_list_hash<S: AsRef<str>>(
    features: &[S],
    forest: &ForestConfig,
    split: &SplitConfig,
    label: &LabelConfig,
) -> u64 {
    let mut hasher = DefaultHasher::new();
    for f in features {
        f.as_ref().hash(&mut hasher);
    }
    forest.hash(&mut hasher);
    split.test_fraction.to_bits().hash(&mut hasher);
    split.seed.hash(&mut hasher);
    label.label_col.hash(&mut hasher);
    label.binary_col.hash(&mut hasher);
    label.positive_label.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Times the cache was emptied for a new dataset.
    pub invalidations: u64,
}

impl CacheStats {
    /// Hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct CachedModel {
    model: Arc<TrainedModel>,
    last_access: u64,
}

/// Bounded least-recently-used store of trained models.
#[derive(Debug)]
pub struct ModelCache {
    entries: HashMap<CacheKey, CachedModel>,
    capacity: usize,
    fingerprint: Option<u64>,
    access_counter: u64,
    stats: CacheStats,
}

impl ModelCache {
    /// A cache holding at most `capacity` models, at least one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        ModelCache {
            entries: HashMap::with_capacity(capacity),
            capacity,
            fingerprint: None,
            access_counter: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn from_config(config: &AttributionConfig) -> Self {
        ModelCache::new(config.cache_capacity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Bind the cache to `dataset`, dropping every entry if it was built
    /// from different data.
    pub fn bind(&mut self, dataset: &Dataset) {
        let fingerprint = dataset.fingerprint();
        match self.fingerprint {
            Some(f) if f == fingerprint => {}
            Some(_) => {
                info!("Dataset changed, dropping {} cached models.", self.entries.len());
                self.entries.clear();
                self.stats.invalidations += 1;
                self.fingerprint = Some(fingerprint);
            }
            None => self.fingerprint = Some(fingerprint),
        }
    }

    /// The cached model for `key`, refreshing its recency.
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<TrainedModel>> {
        match self.entries.get_mut(key) {
            Some(entry) => {
                self.access_counter += 1;
                entry.last_access = self.access_counter;
                self.stats.hits += 1;
                debug!("Model cache hit for {}={}.", key.group_col, key.group_value);
                Some(Arc::clone(&entry.model))
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: CacheKey, model: Arc<TrainedModel>) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.evict_lru();
        }
        self.access_counter += 1;
        self.entries.insert(
            key,
            CachedModel {
                model,
                last_access: self.access_counter,
            },
        );
    }

    /// The cached model for `key`, or the result of `fit`, which is cached
    /// when it succeeds.
    pub fn get_or_train<F>(&mut self, dataset: &Dataset, key: CacheKey, fit: F) -> Result<Arc<TrainedModel>, AttributionError>
    where
        F: FnOnce() -> Result<TrainedModel, AttributionError>,
    {
        self.bind(dataset);
        if let Some(model) = self.get(&key) {
            return Ok(model);
        }
        let model = Arc::new(fit()?);
        self.insert(key, Arc::clone(&model));
        Ok(model)
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, v)| v.last_access)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            debug!("Evicting cached model for {}={}.", key.group_col, key.group_value);
            self.entries.remove(&key);
            self.stats.evictions += 1;
        }
    }
}

/// [`crate::analysis::analyze`] backed by `cache`.
pub fn analyze_cached(
    cache: &mut ModelCache,
    dataset: &Dataset,
    request: &AttributionRequest,
    config: &AttributionConfig,
) -> Result<AttributionOutcome, AttributionError> {
    analyze_with(dataset, request, config, |subset, features, forest_cfg| {
        let key = CacheKey {
            group_col: subset.key().group_col.clone(),
            group_value: subset.key().group_value.clone(),
            features_hash: feature_list_hash(features, forest_cfg, &config.split, &config.label),
        };
        cache.get_or_train(dataset, key, || {
            train(subset, features, &config.label, forest_cfg, &config.split)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Strategy;

    fn survey(n: usize, shift: f64) -> Dataset {
        let class: Vec<Option<&str>> = (0..n).map(|i| Some(if i % 2 == 0 { "Eco" } else { "Business" })).collect();
        let wifi: Vec<f64> = (0..n).map(|i| ((i / 2) % 6) as f64 + shift).collect();
        let seat: Vec<f64> = (0..n).map(|i| (i % 5) as f64).collect();
        let label: Vec<Option<&str>> = (0..n)
            .map(|i| Some(if (i / 2) % 6 >= 3 { "satisfied" } else { "neutral or dissatisfied" }))
            .collect();
        Dataset::new()
            .with_categorical("Class", class)
            .unwrap()
            .with_numeric("Inflight wifi service", wifi)
            .unwrap()
            .with_numeric("Seat comfort", seat)
            .unwrap()
            .with_categorical("satisfaction", label)
            .unwrap()
    }

    fn config() -> AttributionConfig {
        AttributionConfig::new().set_n_trees(10)
    }

    fn key(group: &str, hash: u64) -> CacheKey {
        CacheKey {
            group_col: "Class".to_string(),
            group_value: group.to_string(),
            features_hash: hash,
        }
    }

    fn model(ds: &Dataset) -> TrainedModel {
        let (_, subset) = crate::subgroup::resolve(ds, "Class", Some("Eco")).unwrap();
        let cfg = config();
        train(&subset, &["Inflight wifi service"], &cfg.label, &cfg.forest, &cfg.split).unwrap()
    }

    #[test]
    fn test_feature_list_hash() {
        let cfg = config();
        let a = feature_list_hash(&["Seat comfort", "Inflight wifi service"], &cfg.forest, &cfg.split, &cfg.label);
        let b = feature_list_hash(&["Inflight wifi service", "Seat comfort"], &cfg.forest, &cfg.split, &cfg.label);
        let c = feature_list_hash(&["Seat comfort", "Inflight wifi service"], &cfg.explainable_forest, &cfg.split, &cfg.label);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(
            a,
            feature_list_hash(&["Seat comfort", "Inflight wifi service"], &cfg.forest, &cfg.split, &cfg.label)
        );
    }

    #[test]
    fn test_lru_eviction() {
        let ds = survey(60, 0.0);
        let m = Arc::new(model(&ds));
        let mut cache = ModelCache::new(2);
        cache.insert(key("Eco", 1), Arc::clone(&m));
        cache.insert(key("Business", 1), Arc::clone(&m));
        assert!(cache.get(&key("Eco", 1)).is_some());
        cache.insert(key("Eco", 2), Arc::clone(&m));
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&key("Eco", 1)));
        assert!(!cache.contains(&key("Business", 1)));
        assert_eq!(cache.stats().evictions, 1);
        assert!(cache.get(&key("Business", 1)).is_none());
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_get_or_train_reuses_model() {
        let ds = survey(60, 0.0);
        let mut cache = ModelCache::new(4);
        let mut fits = 0;
        let a = cache
            .get_or_train(&ds, key("Eco", 1), || {
                fits += 1;
                Ok(model(&ds))
            })
            .unwrap();
        let b = cache
            .get_or_train(&ds, key("Eco", 1), || {
                fits += 1;
                Ok(model(&ds))
            })
            .unwrap();
        assert_eq!(fits, 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.stats().hit_rate(), 0.5);
    }

    #[test]
    fn test_failed_training_is_not_cached() {
        let ds = survey(60, 0.0);
        let mut cache = ModelCache::new(4);
        let res = cache.get_or_train(&ds, key("Eco", 1), || Err(AttributionError::Training("boom".to_string())));
        assert!(res.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_dataset_change_invalidates() {
        let ds = survey(60, 0.0);
        let mut cache = ModelCache::new(4);
        cache.get_or_train(&ds, key("Eco", 1), || Ok(model(&ds))).unwrap();
        cache.bind(&ds);
        assert_eq!(cache.len(), 1);

        let reloaded = survey(60, 0.5);
        cache.bind(&reloaded);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn test_analyze_cached_matches_analyze() {
        let ds = survey(120, 0.0);
        let cfg = config();
        let mut cache = ModelCache::from_config(&cfg);
        let req = AttributionRequest::new("Class", Strategy::NativeImportance, &["Inflight wifi service", "Seat comfort"])
            .set_group_value("Business");
        let direct = crate::analysis::analyze(&ds, &req, &cfg).unwrap();
        let first = analyze_cached(&mut cache, &ds, &req, &cfg).unwrap();
        let second = analyze_cached(&mut cache, &ds, &req, &cfg).unwrap();
        assert_eq!(direct, first);
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().hits, 1);

        // The average rating strategy never trains.
        let req = AttributionRequest::new("Class", Strategy::AverageRating, &["Seat comfort"]);
        analyze_cached(&mut cache, &ds, &req, &cfg).unwrap();
        assert_eq!(cache.len(), 1);
    }
}
