//! Missingness injection
//!
//! Applies a [`CauseMapping`] to a complete dataset. Each partially observed
//! column loses cells through independent Bernoulli draws:
//!
//! - without causes the per-row probability is the error rate itself
//! - with causes it is the error rate scaled by the mean cause score of the
//!   row, where a numeric cause scores by its empirical CDF and a categorical
//!   cause by the rank of its label among the sorted labels
//!
//! Scores lie in (0, 1], so the error rate is a target under MCAR and a
//! ceiling under MAR and MNAR. Cause scores are computed on the complete
//! data, which is what makes MNAR depend on unobserved values.

use std::collections::{BTreeSet, HashMap};

use log::debug;
use rand::Rng;

use crate::data::dataset::{ColumnValues, Dataset, IncompleteDataset};
use crate::data::mask::MissingnessMask;
use crate::error::{ImputeBenchError, Result};
use crate::missingness::mechanism::CauseMapping;

/// Per-row score of a cause column in (0, 1]
fn cause_scores(values: &ColumnValues) -> Vec<f64> {
    match values {
        ColumnValues::Numeric(v) => {
            let n = v.len() as f64;
            let mut sorted = v.clone();
            sorted.sort_by(|a, b| a.total_cmp(b));
            v.iter()
                .map(|x| sorted.partition_point(|s| s <= x) as f64 / n)
                .collect()
        }
        ColumnValues::Categorical(v) => {
            let labels: BTreeSet<&str> = v.iter().map(String::as_str).collect();
            let levels = labels.len() as f64;
            let rank: HashMap<&str, f64> = labels
                .into_iter()
                .enumerate()
                .map(|(k, label)| (label, (k + 1) as f64 / levels))
                .collect();
            v.iter().map(|x| rank[x.as_str()]).collect()
        }
    }
}

/// Suppresses cells of `dataset` according to `mapping`
///
/// Returns the incomplete dataset together with the exact mask of suppressed
/// cells. Columns absent from the mapping are never touched.
pub fn inject<R: Rng + ?Sized>(
    dataset: &Dataset,
    mapping: &CauseMapping,
    max_error_rate: f64,
    rng: &mut R,
) -> Result<(IncompleteDataset, MissingnessMask)> {
    if !(max_error_rate > 0.0 && max_error_rate <= 1.0) {
        return Err(ImputeBenchError::InvalidRate {
            name: "max_error_rate",
            value: max_error_rate,
            expected: "(0, 1]",
        });
    }
    let names = dataset.names();
    mapping.validate_against(&names)?;

    let rows = dataset.n_rows();
    let mut mask = MissingnessMask::new(names, rows);
    let mut scores: HashMap<&str, Vec<f64>> = HashMap::new();

    for (variable, causes) in mapping.iter() {
        let col = dataset
            .column_index(variable)
            .ok_or_else(|| ImputeBenchError::UnknownVariable(variable.clone()))?;

        for cause in causes {
            if !scores.contains_key(cause.as_str()) {
                let column = dataset
                    .column(cause)
                    .ok_or_else(|| ImputeBenchError::UnknownVariable(cause.clone()))?;
                scores.insert(cause.as_str(), cause_scores(&column.values));
            }
        }

        for row in 0..rows {
            let p = if causes.is_empty() {
                max_error_rate
            } else {
                let total: f64 = causes.iter().map(|c| scores[c.as_str()][row]).sum();
                max_error_rate * total / causes.len() as f64
            };
            if rng.gen_bool(p.clamp(0.0, 1.0)) {
                mask.mark(row, col);
            }
        }
        debug!(
            "Injected {} of {} cells into {} (causes: {:?})",
            mask.column_count(col),
            rows,
            variable,
            causes
        );
    }

    let incomplete = IncompleteDataset::from_mask(dataset, &mask)?;
    Ok((incomplete, mask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::Column;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn numeric_dataset(rows: usize) -> Dataset {
        Dataset::new(
            (0..4)
                .map(|c| Column::numeric(format!("X{}", c), (0..rows).map(|r| (r * (c + 1)) as f64).collect()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_mcar_rate_close_to_target() {
        let data = numeric_dataset(4000);
        let mut mapping = CauseMapping::new();
        mapping.insert("X1", vec![]);
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        let (incomplete, mask) = inject(&data, &mapping, 0.3, &mut rng).unwrap();
        assert_abs_diff_eq!(mask.column_rate(1), 0.3, epsilon = 0.03);
        assert_eq!(mask.column_count(0), 0);
        assert_eq!(incomplete.absent_mask(), mask);
    }

    #[test]
    fn test_caused_rate_bounded_by_ceiling() {
        let data = numeric_dataset(4000);
        let mut mapping = CauseMapping::new();
        mapping.insert("X0", vec!["X3".to_string()]);
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let (_, mask) = inject(&data, &mapping, 0.4, &mut rng).unwrap();
        // Mean ECDF score over distinct values is (n + 1) / 2n.
        assert_abs_diff_eq!(mask.column_rate(0), 0.2, epsilon = 0.03);
    }

    #[test]
    fn test_missingness_tracks_cause_values() {
        let data = numeric_dataset(4000);
        let mut mapping = CauseMapping::new();
        mapping.insert("X0", vec!["X1".to_string()]);
        let mut rng = ChaCha20Rng::seed_from_u64(12);
        let (_, mask) = inject(&data, &mapping, 1.0, &mut rng).unwrap();
        let column = mask.column(0);
        let low = column[..2000].iter().filter(|&&m| m).count();
        let high = column[2000..].iter().filter(|&&m| m).count();
        assert!(high > low);
    }

    #[test]
    fn test_categorical_cause_scores_by_rank() {
        let values = ColumnValues::Categorical(vec!["b".into(), "a".into(), "c".into(), "a".into()]);
        let scores = cause_scores(&values);
        assert_abs_diff_eq!(scores[0], 2.0 / 3.0);
        assert_abs_diff_eq!(scores[1], 1.0 / 3.0);
        assert_abs_diff_eq!(scores[2], 1.0);
    }

    #[test]
    fn test_invalid_rate_rejected() {
        let data = numeric_dataset(10);
        let mapping = CauseMapping::new();
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        for rate in [0.0, -0.5, 1.5] {
            let err = inject(&data, &mapping, rate, &mut rng).unwrap_err();
            assert!(matches!(err, ImputeBenchError::InvalidRate { .. }));
        }
    }

    #[test]
    fn test_unknown_variable_rejected() {
        let data = numeric_dataset(10);
        let mut mapping = CauseMapping::new();
        mapping.insert("X0", vec!["nope".to_string()]);
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let err = inject(&data, &mapping, 0.5, &mut rng).unwrap_err();
        assert!(matches!(err, ImputeBenchError::UnknownVariable(_)));
    }

    #[test]
    fn test_empty_mapping_leaves_data_complete() {
        let data = numeric_dataset(50);
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let (incomplete, mask) = inject(&data, &CauseMapping::new(), 0.5, &mut rng).unwrap();
        assert!(!mask.any());
        assert_eq!(incomplete, IncompleteDataset::from_complete(&data));
    }
}
