use satisfaction_attribution::importance::{extract_with, Extraction};
use satisfaction_attribution::ranking::{rank_entries, ColorBand, ModelQuality};
use satisfaction_attribution::shap::{Explainer, RawShapOutput, ShapTensor};
use satisfaction_attribution::data::RowMajorMatrix;
use satisfaction_attribution::subgroup::group_values;
use satisfaction_attribution::{
    analyze, analyze_cached, AttributionConfig, AttributionOutcome, AttributionRequest, ConfigIO, Dataset,
    ModelCache, ReasonCode, Scale, Strategy,
};
use std::error::Error;
use std::fs::File;
use std::io::BufReader;

const FEATURES: [&str; 3] = ["Inflight wifi service", "Seat comfort", "Food and drink"];
const CATEGORICAL: [&str; 3] = ["Class", "Customer Type", "satisfaction"];

fn load_survey(path: &str) -> Result<Dataset, Box<dyn Error>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let mut columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for result in csv_reader.records() {
        let record = result?;
        for (i, value) in record.iter().enumerate() {
            columns[i].push(value.to_string());
        }
    }

    let mut dataset = Dataset::new();
    for (name, values) in headers.iter().zip(columns) {
        dataset = if CATEGORICAL.contains(&name) {
            dataset.with_categorical(name, values.into_iter().map(|v| if v.is_empty() { None } else { Some(v) }))?
        } else {
            let parsed = values.iter().map(|v| v.parse::<f64>().unwrap_or(f64::NAN)).collect();
            dataset.with_numeric(name, parsed)?
        };
    }
    Ok(dataset)
}

fn survey() -> Dataset {
    load_survey("resources/airline_survey_sample.csv").unwrap()
}

fn config() -> AttributionConfig {
    AttributionConfig::new().set_n_trees(50)
}

/// `n` rows of one group, satisfied when `satisfied(i)`.
fn synthetic(n: usize, satisfied: impl Fn(usize) -> bool) -> Dataset {
    let label: Vec<Option<&str>> = (0..n)
        .map(|i| Some(if satisfied(i) { "satisfied" } else { "neutral or dissatisfied" }))
        .collect();
    Dataset::new()
        .with_categorical("Class", vec![Some("Eco"); n])
        .unwrap()
        .with_numeric("Inflight wifi service", (0..n).map(|i| (i % 6) as f64).collect())
        .unwrap()
        .with_numeric("Seat comfort", (0..n).map(|i| (i % 5) as f64).collect())
        .unwrap()
        .with_categorical("satisfaction", label)
        .unwrap()
}

#[test]
fn test_fixture_shape() {
    let ds = survey();
    assert_eq!(ds.n_rows(), 200);
    assert_eq!(group_values(&ds, "Class").unwrap(), vec!["Eco", "Business"]);
}

#[test]
fn test_end_to_end_native_importance() {
    let ds = survey();
    let req = AttributionRequest::new("Class", Strategy::NativeImportance, &FEATURES).set_group_value("Eco");
    let outcome = analyze(&ds, &req, &config()).unwrap();
    let report = outcome.report().expect("Eco passes the gate");
    assert_eq!(report.group_value, "Eco");
    assert_eq!(report.n_rows, 90);
    assert_eq!(report.factors.len(), 3);
    let total: f64 = report.factors.iter().map(|f| f.magnitude).sum();
    assert!((total - 1.0).abs() < 1e-9);
    let accuracy = report.accuracy.unwrap();
    assert!((0.0..=1.0).contains(&accuracy));
    // Wifi separates satisfied passengers in the fixture.
    assert_eq!(report.factors[0].name, "Inflight wifi service");
}

#[test]
fn test_unknown_group_falls_back() {
    let ds = survey();
    let req = AttributionRequest::new("Class", Strategy::NativeImportance, &FEATURES).set_group_value("Premium");
    let outcome = analyze(&ds, &req, &config()).unwrap();
    assert_eq!(outcome.report().unwrap().group_value, "Eco");
}

#[test]
fn test_repeated_runs_are_identical() {
    let ds = survey();
    for strategy in [Strategy::NativeImportance, Strategy::ShapSummary] {
        let req = AttributionRequest::new("Class", strategy, &FEATURES).set_group_value("Business");
        let a = analyze(&ds, &req, &config()).unwrap();
        let b = analyze(&ds, &req, &config().set_num_threads(Some(1))).unwrap();
        match (a, b) {
            (AttributionOutcome::Ranked(a), AttributionOutcome::Ranked(b)) => {
                assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
            }
            (AttributionOutcome::Unavailable(a), AttributionOutcome::Unavailable(b)) => {
                assert_eq!(a.code, ReasonCode::MissingDependency);
                assert_eq!(a, b);
            }
            other => panic!("unexpected outcomes {:?}", other),
        }
    }
}

#[test]
fn test_gate_boundary() {
    let req = AttributionRequest::new("Class", Strategy::NativeImportance, &["Inflight wifi service", "Seat comfort"]);
    let outcome = analyze(&synthetic(29, |i| i % 2 == 0), &req, &config()).unwrap();
    match outcome {
        AttributionOutcome::Insufficient(i) => {
            assert_eq!(i.code, ReasonCode::TooFewRows);
            assert_eq!((i.n_rows, i.min_rows), (29, 30));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    let outcome = analyze(&synthetic(30, |i| i % 2 == 0), &req, &config()).unwrap();
    assert!(outcome.report().is_some());

    let outcome = analyze(&synthetic(50, |_| true), &req, &config()).unwrap();
    assert_eq!(outcome.reason_code(), Some(ReasonCode::SingleClass));
}

struct FixedExplainer(RawShapOutput);

impl Explainer for FixedExplainer {
    fn shap_values(&self, _x: &RowMajorMatrix<f64>) -> RawShapOutput {
        self.0.clone()
    }
    fn expected_value(&self) -> f64 {
        0.5
    }
}

#[test]
fn test_shap_shape_reconciliation() {
    let (n, k) = (5, 3);
    let x = RowMajorMatrix::new(vec![0.0; n * k], n, k);
    let grid = |width: usize| {
        let data: Vec<f64> = (0..n * width).map(|i| (i % width) as f64 + 1.0).collect();
        ShapTensor::from_rows(&data, n, width)
    };

    let list_of_two = FixedExplainer(RawShapOutput::PerClass(vec![grid(k), grid(k)]));
    let attribution = extract_with(&list_of_two, &FEATURES, &x).attribution().cloned().unwrap();
    assert_eq!(attribution.names().collect::<Vec<_>>(), FEATURES.to_vec());

    let doubled = FixedExplainer(RawShapOutput::Single(grid(2 * k)));
    let attribution = extract_with(&doubled, &FEATURES, &x).attribution().cloned().unwrap();
    assert_eq!(attribution.values(), vec![1.0, 2.0, 3.0]);

    let malformed = FixedExplainer(RawShapOutput::Single(ShapTensor::Array(vec![grid(k), grid(k), grid(k)])));
    match extract_with(&malformed, &FEATURES, &x) {
        Extraction::Unavailable(reason) => assert_eq!(reason.code, ReasonCode::ShapeMismatch),
        other => panic!("expected unavailable, got {:?}", other),
    }
}

#[test]
fn test_ranking_order_and_bands() {
    let entries = vec![
        ("A".to_string(), 0.3),
        ("B".to_string(), 0.5),
        ("C".to_string(), 0.1),
        ("D".to_string(), 0.3),
    ];
    let ranked = rank_entries(&entries, Scale::Absolute);
    let names: Vec<&str> = ranked.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["B", "A", "D", "C"]);

    assert_eq!(ColorBand::classify(0.15, Scale::Absolute, 1.0), ColorBand::Highest);
    assert_eq!(ColorBand::classify(0.149999, Scale::Absolute, 1.0), ColorBand::High);

    assert_eq!(ModelQuality::from_accuracy(0.85), ModelQuality::Excellent);
    assert_eq!(ModelQuality::from_accuracy(0.849999), ModelQuality::Good);
    assert_eq!(ModelQuality::from_accuracy(0.75), ModelQuality::Good);
    assert_eq!(ModelQuality::from_accuracy(0.749999), ModelQuality::Fair);
}

#[test]
fn test_cache_follows_dataset_reload() {
    let ds = survey();
    let cfg = config();
    let mut cache = ModelCache::from_config(&cfg);
    let req = AttributionRequest::new("Class", Strategy::NativeImportance, &FEATURES).set_group_value("Business");
    analyze_cached(&mut cache, &ds, &req, &cfg).unwrap();
    analyze_cached(&mut cache, &ds, &req.clone().set_group_value("Eco"), &cfg).unwrap();
    assert_eq!(cache.len(), 2);

    let reloaded = synthetic(60, |i| i % 6 >= 3);
    let req = AttributionRequest::new("Class", Strategy::NativeImportance, &["Inflight wifi service"]);
    analyze_cached(&mut cache, &reloaded, &req, &cfg).unwrap();
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.stats().invalidations, 1);
}

#[test]
fn test_config_file_drives_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("attribution.json");
    config().set_min_rows(100).save_config(&path).unwrap();
    let loaded = AttributionConfig::load_config(&path).unwrap();

    let req = AttributionRequest::new("Class", Strategy::NativeImportance, &FEATURES).set_group_value("Eco");
    match analyze(&survey(), &req, &loaded).unwrap() {
        AttributionOutcome::Insufficient(i) => assert_eq!((i.n_rows, i.min_rows), (90, 100)),
        other => panic!("expected rejection, got {:?}", other),
    }
}
