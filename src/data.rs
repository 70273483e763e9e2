//! Data
//!
//! The survey [`Dataset`], its borrowed row-filtered [`Subset`] view, and the
//! dense matrices handed to the forest.
use crate::errors::AttributionError;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A categorical column, optionally carrying an explicit category ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    /// One entry per row, `None` for a missing value.
    pub values: Vec<Option<String>>,
    /// Explicit category order. When absent, order of first appearance applies.
    pub categories: Option<Vec<String>>,
}

/// A single dataset column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    /// Ratings, delays, or a pre-binarized label. Missing values are NaN.
    Numeric(Vec<f64>),
    Categorical(CategoricalColumn),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Categorical(c) => c.values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Column oriented table of passenger records.
///
/// Columns are added through the `with_*` builders, which check that every
/// column has the same number of rows. Adding a column under an existing name
/// replaces it. Once built, the dataset is only ever read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    names: Vec<String>,
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    pub fn new() -> Self {
        Dataset::default()
    }

    /// Add a numeric column.
    pub fn with_numeric(self, name: impl Into<String>, values: Vec<f64>) -> Result<Self, AttributionError> {
        self.push_column(name.into(), Column::Numeric(values))
    }

    /// Add a categorical column without an explicit category order.
    pub fn with_categorical<I, S>(self, name: impl Into<String>, values: I) -> Result<Self, AttributionError>
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let values = values.into_iter().map(|v| v.map(Into::into)).collect();
        self.push_column(
            name.into(),
            Column::Categorical(CategoricalColumn {
                values,
                categories: None,
            }),
        )
    }

    /// Add a categorical column with an explicit category order, e.g. ordinal
    /// delay buckets.
    pub fn with_ordered_categorical<I, S, C>(
        self,
        name: impl Into<String>,
        values: I,
        categories: C,
    ) -> Result<Self, AttributionError>
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
        C: IntoIterator<Item = S>,
    {
        let values = values.into_iter().map(|v| v.map(Into::into)).collect();
        let categories = categories.into_iter().map(Into::into).collect();
        self.push_column(
            name.into(),
            Column::Categorical(CategoricalColumn {
                values,
                categories: Some(categories),
            }),
        )
    }

    fn push_column(mut self, name: String, column: Column) -> Result<Self, AttributionError> {
        let is_only_column = self.names.len() == 1 && self.names[0] == name;
        if !self.columns.is_empty() && !is_only_column && column.len() != self.rows {
            return Err(AttributionError::InvalidParameter(
                format!("column {}", name),
                format!("{} rows", self.rows),
                column.len().to_string(),
            ));
        }
        self.rows = column.len();
        match self.names.iter().position(|n| *n == name) {
            Some(i) => self.columns[i] = column,
            None => {
                self.names.push(name);
                self.columns.push(column);
            }
        }
        Ok(self)
    }

    pub fn n_rows(&self) -> usize {
        self.rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names.iter().position(|n| n == name).map(|i| &self.columns[i])
    }

    /// The values of a numeric column, `None` if absent or categorical.
    pub fn numeric(&self, name: &str) -> Option<&[f64]> {
        match self.column(name) {
            Some(Column::Numeric(v)) => Some(v),
            _ => None,
        }
    }

    /// A categorical column, `None` if absent or numeric.
    pub fn categorical(&self, name: &str) -> Option<&CategoricalColumn> {
        match self.column(name) {
            Some(Column::Categorical(c)) => Some(c),
            _ => None,
        }
    }

    /// Content hash used to tell two datasets apart, e.g. to invalidate
    /// cached models after a reload.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.rows.hash(&mut hasher);
        for (name, column) in self.names.iter().zip(self.columns.iter()) {
            name.hash(&mut hasher);
            match column {
                Column::Numeric(v) => {
                    0u8.hash(&mut hasher);
                    for x in v {
                        x.to_bits().hash(&mut hasher);
                    }
                }
                Column::Categorical(c) => {
                    1u8.hash(&mut hasher);
                    c.values.hash(&mut hasher);
                    c.categories.hash(&mut hasher);
                }
            }
        }
        hasher.finish()
    }
}

/// A `(grouping column, group value)` pair selected for one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubgroupKey {
    pub group_col: String,
    pub group_value: String,
}

impl fmt::Display for SubgroupKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}={}", self.group_col, self.group_value)
    }
}

/// Row-filtered view of a [`Dataset`] for one [`SubgroupKey`].
#[derive(Debug, Clone)]
pub struct Subset<'a> {
    dataset: &'a Dataset,
    rows: Vec<usize>,
    key: SubgroupKey,
}

impl<'a> Subset<'a> {
    pub(crate) fn new(dataset: &'a Dataset, rows: Vec<usize>, key: SubgroupKey) -> Self {
        Subset { dataset, rows, key }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Indices of the subset rows in the full dataset.
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn key(&self) -> &SubgroupKey {
        &self.key
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    /// Values of a numeric column restricted to the subset rows.
    pub fn numeric(&self, name: &str) -> Option<Vec<f64>> {
        self.dataset
            .numeric(name)
            .map(|col| self.rows.iter().map(|&r| col[r]).collect())
    }

    /// Values of a categorical column restricted to the subset rows.
    pub fn categorical(&self, name: &str) -> Option<Vec<Option<&'a str>>> {
        self.dataset
            .categorical(name)
            .map(|col| self.rows.iter().map(|&r| col.values[r].as_deref()).collect())
    }
}

/// Contiguous Column Major Matrix data container.
///
/// Holds a dense matrix of values in a single contiguous memory block, in
/// column-major order, which allows for efficient column slicing.
///
/// # Type Parameters
/// * `T` - The numeric type of the data (e.g., `f32`, `f64`).
pub struct Matrix<'a, T> {
    /// The raw data stored in a single slice.
    pub data: &'a [T],
    /// Indices into the data row-wise.
    pub index: Vec<usize>,
    /// Number of rows in the matrix.
    pub rows: usize,
    /// Number of columns in the matrix.
    pub cols: usize,
}

impl<'a, T> Matrix<'a, T> {
    /// Create a new Matrix.
    pub fn new(data: &'a [T], rows: usize, cols: usize) -> Self {
        Matrix {
            data,
            index: (0..rows).collect(),
            rows,
            cols,
        }
    }

    /// Get a single reference to an item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.data[j * self.rows + i]
    }

    /// Get an entire column in the matrix.
    ///
    /// * `col` - The index of the column to get.
    pub fn get_col(&self, col: usize) -> &[T] {
        &self.data[col * self.rows..(col + 1) * self.rows]
    }
}

impl<'a, T> Matrix<'a, T>
where
    T: Copy,
{
    /// Get a row of the data as a vector.
    pub fn get_row(&self, row: usize) -> Vec<T> {
        self.data.iter().skip(row).step_by(self.rows).copied().collect()
    }
}

/// A lightweight row major matrix that owns its data. Used for held-out
/// feature rows and per-row attribution values handed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowMajorMatrix<T> {
    /// The raw data in row-major order.
    pub data: Vec<T>,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl<T> RowMajorMatrix<T> {
    /// Create a new RowMajorMatrix.
    pub fn new(data: Vec<T>, rows: usize, cols: usize) -> Self {
        assert_eq!(data.len(), rows * cols, "data length must equal rows * cols");
        RowMajorMatrix { data, rows, cols }
    }

    /// Get a single reference to an item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.data[i * self.cols + j]
    }

    /// Borrow a full row.
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }
}

impl<T: Copy> RowMajorMatrix<T> {
    /// Keep only the first `cols` columns.
    pub fn leading_columns(&self, cols: usize) -> RowMajorMatrix<T> {
        let cols = cols.min(self.cols);
        let data = (0..self.rows)
            .flat_map(|i| self.row(i)[..cols].iter().copied())
            .collect();
        RowMajorMatrix::new(data, self.rows, cols)
    }

    /// Copy into a column-major buffer suitable for [`Matrix::new`].
    pub fn to_column_major(&self) -> Vec<T> {
        (0..self.cols)
            .flat_map(|j| (0..self.rows).map(move |i| *self.get(i, j)))
            .collect()
    }
}
