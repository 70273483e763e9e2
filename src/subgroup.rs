//! Subgroup selection
//!
//! Resolves a user's group selection against a categorical column and returns
//! the matching rows as a [`Subset`].
use crate::data::{Dataset, SubgroupKey, Subset};
use crate::errors::AttributionError;
use hashbrown::HashSet;
use log::debug;

/// Valid group values of `group_col`, in presentation order.
///
/// An explicit category order wins (restricted to categories that occur);
/// otherwise values are listed in order of first appearance. Values are never
/// sorted, so ordinal buckets such as delay categories keep their meaning.
pub fn group_values(dataset: &Dataset, group_col: &str) -> Result<Vec<String>, AttributionError> {
    let column = match dataset.column(group_col) {
        None => return Err(AttributionError::missing_column(group_col)),
        Some(_) => dataset.categorical(group_col).ok_or_else(|| {
            AttributionError::Schema(group_col.to_string(), "is not categorical".to_string())
        })?,
    };

    let present: HashSet<&str> = column.values.iter().flatten().map(String::as_str).collect();
    let values = match &column.categories {
        Some(categories) => categories
            .iter()
            .filter(|c| present.contains(c.as_str()))
            .cloned()
            .collect(),
        None => {
            let mut seen = HashSet::new();
            column
                .values
                .iter()
                .flatten()
                .filter(|v| seen.insert(v.as_str()))
                .cloned()
                .collect()
        }
    };
    Ok(values)
}

/// Resolve the effective group value and its rows.
///
/// A missing or unknown `requested` value falls back to the first valid group.
pub fn resolve<'a>(
    dataset: &'a Dataset,
    group_col: &str,
    requested: Option<&str>,
) -> Result<(String, Subset<'a>), AttributionError> {
    let groups = group_values(dataset, group_col)?;
    let effective = match requested {
        Some(r) if groups.iter().any(|g| g == r) => r.to_string(),
        _ => match groups.into_iter().next() {
            Some(first) => {
                if let Some(r) = requested {
                    debug!("Group {} not found in {}, falling back to {}.", r, group_col, first);
                }
                first
            }
            None => return Err(AttributionError::EmptySubgroup(group_col.to_string())),
        },
    };

    let rows = subset_rows(dataset, group_col, &effective)?;
    let key = SubgroupKey {
        group_col: group_col.to_string(),
        group_value: effective.clone(),
    };
    Ok((effective, Subset::new(dataset, rows, key)))
}

/// Rows of `group_col` equal to `value`.
pub(crate) fn subset_rows(dataset: &Dataset, group_col: &str, value: &str) -> Result<Vec<usize>, AttributionError> {
    let column = dataset
        .categorical(group_col)
        .ok_or_else(|| AttributionError::missing_column(group_col))?;
    Ok(column
        .values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.as_deref() == Some(value))
        .map(|(i, _)| i)
        .collect())
}
