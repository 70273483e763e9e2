pub mod core;
pub mod predict;

pub use self::core::RandomForest;

#[cfg(test)]
mod forest_test {
    use super::RandomForest;
    use crate::config::ForestConfig;
    use crate::data::Matrix;
    use crate::errors::AttributionError;
    use approx::assert_relative_eq;

    // Column 0 drives satisfaction, column 1 weakly, column 2 is noise.
    fn synthetic(n: usize) -> (Vec<f64>, Vec<bool>) {
        let mut data = vec![0.0; n * 3];
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let a = (i % 6) as f64;
            let b = ((i / 3) % 4) as f64;
            let c = ((i * 13) % 5) as f64;
            data[i] = a;
            data[n + i] = b;
            data[2 * n + i] = c;
            y.push(a >= 3.0 || (b == 3.0 && i % 2 == 0));
        }
        (data, y)
    }

    fn config(n_trees: usize, num_threads: Option<usize>) -> ForestConfig {
        ForestConfig {
            n_trees,
            num_threads,
            ..ForestConfig::default()
        }
    }

    #[test]
    fn test_forest_fit_predict() {
        let (data_vec, y) = synthetic(120);
        let data = Matrix::new(&data_vec, 120, 3);
        let mut forest = RandomForest::new(config(25, Some(2)));
        forest.fit(&data, &y).unwrap();
        assert_eq!(forest.trees.len(), 25);
        assert_eq!(forest.n_features, 3);

        let preds = forest.predict(&data, true);
        let correct = preds.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct as f64 / y.len() as f64 > 0.9);
        assert_eq!(forest.predict_proba(&data, true), forest.predict_proba(&data, false));
    }

    #[test]
    fn test_forest_is_thread_count_independent() {
        let (data_vec, y) = synthetic(90);
        let data = Matrix::new(&data_vec, 90, 3);
        let mut one = RandomForest::new(config(10, Some(1)));
        one.fit(&data, &y).unwrap();
        let mut four = RandomForest::new(config(10, Some(4)));
        four.fit(&data, &y).unwrap();
        assert_eq!(one.trees, four.trees);
    }

    #[test]
    fn test_forest_importance() {
        let (data_vec, y) = synthetic(120);
        let data = Matrix::new(&data_vec, 120, 3);
        let mut forest = RandomForest::new(config(30, None));
        forest.fit(&data, &y).unwrap();
        let importance = forest.feature_importances();
        assert_relative_eq!(importance.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert!(importance[0] > importance[2]);
        assert!(importance.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn test_forest_contributions_are_additive() {
        let (data_vec, y) = synthetic(60);
        let data = Matrix::new(&data_vec, 60, 3);
        let mut forest = RandomForest::new(ForestConfig {
            n_trees: 8,
            ..ForestConfig::explainable()
        });
        forest.fit(&data, &y).unwrap();
        let contribs = forest.predict_contributions(&data, true);
        let proba = forest.predict_proba(&data, false);
        assert_eq!(contribs.len(), 60 * 4);
        for (row, p) in contribs.chunks(4).zip(proba.iter()) {
            assert_relative_eq!(row[3], forest.expected_value(), epsilon = 1e-9);
            assert_relative_eq!(row.iter().sum::<f64>(), *p, epsilon = 1e-9);
        }
        assert_eq!(contribs, forest.predict_contributions(&data, false));
    }

    #[test]
    fn test_forest_single_class_does_not_split() {
        let data_vec = vec![1.0, 2.0, 3.0, 4.0];
        let data = Matrix::new(&data_vec, 4, 1);
        let mut forest = RandomForest::new(config(5, Some(1)));
        forest.fit(&data, &[true; 4]).unwrap();
        assert!(forest.trees.iter().all(|t| t.nodes.len() == 1));
        assert_eq!(forest.feature_importances(), vec![0.0]);
        assert_relative_eq!(forest.predict_proba_row(&[2.0]), 1.0);
    }

    #[test]
    fn test_forest_fit_errors() {
        let data_vec = vec![1.0, f64::NAN];
        let data = Matrix::new(&data_vec, 2, 1);
        let mut forest = RandomForest::new(config(5, Some(1)));
        assert!(matches!(forest.fit(&data, &[true, false]), Err(AttributionError::Training(_))));

        let data_vec = vec![1.0, 2.0];
        let data = Matrix::new(&data_vec, 2, 1);
        assert!(matches!(forest.fit(&data, &[true]), Err(AttributionError::Training(_))));

        let empty: Vec<f64> = Vec::new();
        let data = Matrix::new(&empty, 0, 1);
        assert!(matches!(forest.fit(&data, &[]), Err(AttributionError::Training(_))));

        let mut no_trees = RandomForest::new(config(0, Some(1)));
        let data = Matrix::new(&data_vec, 2, 1);
        assert!(matches!(no_trees.fit(&data, &[true, false]), Err(AttributionError::Training(_))));
    }
}
