//! Property-based tests for mechanisms, injection, imputation and metrics

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use imputebench_core::data::dataset::{Column, ColumnValues, Dataset};
use imputebench_core::imputation::{ImputerOptions, ImputerRegistry};
use imputebench_core::metrics::MetricEngine;
use imputebench_core::missingness::{
    derive_cause_mapping, inject, partially_observed_count, MechanismClass,
};
use imputebench_core::{ImputeBenchError, MissingnessMask};

fn variable_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("V{}", i)).collect()
}

/// Mixed dataset: numeric columns plus one categorical column
fn arb_dataset() -> impl Strategy<Value = Dataset> {
    (2usize..6, 4usize..30).prop_flat_map(|(cols, rows)| {
        (
            prop::collection::vec(prop::collection::vec(-100.0f64..100.0, rows), cols),
            prop::collection::vec(prop::sample::select(vec!["lo", "mid", "hi"]), rows),
        )
            .prop_map(|(numeric, labels)| {
                let mut columns: Vec<Column> = numeric
                    .into_iter()
                    .enumerate()
                    .map(|(i, values)| Column::numeric(format!("N{}", i), values))
                    .collect();
                columns.push(Column::categorical("C", labels));
                Dataset::new(columns).unwrap()
            })
    })
}

proptest! {
    #[test]
    fn mcar_mapping_has_rounded_size_and_no_causes(n in 1usize..25, pct in 0u32..=100, seed: u64) {
        let ratio = pct as f64 / 100.0;
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mapping = derive_cause_mapping(&variable_names(n), MechanismClass::Mcar, ratio, None, &mut rng).unwrap();
        prop_assert_eq!(mapping.len(), partially_observed_count(n, ratio));
        prop_assert!(mapping.iter().all(|(_, causes)| causes.is_empty()));
    }

    #[test]
    fn mar_causes_are_never_partially_observed(n in 1usize..25, pct in 0u32..=100, seed: u64) {
        let ratio = pct as f64 / 100.0;
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        match derive_cause_mapping(&variable_names(n), MechanismClass::Mar, ratio, None, &mut rng) {
            Ok(mapping) => {
                for (_, causes) in mapping.iter() {
                    prop_assert_eq!(causes.len(), 1);
                    prop_assert!(!mapping.contains(&causes[0]));
                }
            }
            Err(err) => {
                prop_assert!(matches!(err, ImputeBenchError::InsufficientComplement { .. }), "expected InsufficientComplement");
                prop_assert_eq!(partially_observed_count(n, ratio), n);
            }
        }
    }

    #[test]
    fn mnar_causes_are_partially_observed_peers(n in 1usize..25, pct in 0u32..=100, seed: u64) {
        let ratio = pct as f64 / 100.0;
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        match derive_cause_mapping(&variable_names(n), MechanismClass::Mnar, ratio, None, &mut rng) {
            Ok(mapping) => {
                for (variable, causes) in mapping.iter() {
                    prop_assert_eq!(causes.len(), 1);
                    prop_assert!(mapping.contains(&causes[0]));
                    prop_assert_ne!(&causes[0], variable);
                }
            }
            Err(err) => {
                prop_assert!(matches!(err, ImputeBenchError::InsufficientComplement { .. }), "expected InsufficientComplement");
                let count = partially_observed_count(n, ratio);
                prop_assert!(count == 1 || count == n);
            }
        }
    }

    #[test]
    fn mask_stays_inside_mapped_columns(data in arb_dataset(), mech in 0usize..3, rate in 0.05f64..=1.0, seed: u64) {
        let mechanism = MechanismClass::ALL[mech];
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        if let Ok(mapping) = derive_cause_mapping(&data.names(), mechanism, 0.5, None, &mut rng) {
            let (incomplete, mask) = inject(&data, &mapping, rate, &mut rng).unwrap();
            for (col, name) in data.names().iter().enumerate() {
                if !mapping.contains(name) {
                    prop_assert_eq!(mask.column_count(col), 0);
                }
            }
            prop_assert_eq!(incomplete.absent_mask(), mask);
        }
    }

    #[test]
    fn imputation_preserves_observed_cells(data in arb_dataset(), seed: u64) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mapping = derive_cause_mapping(&data.names(), MechanismClass::Mcar, 0.5, None, &mut rng).unwrap();
        let (incomplete, mask) = inject(&data, &mapping, 0.4, &mut rng).unwrap();
        let registry = ImputerRegistry::with_defaults();
        for id in registry.ids() {
            let imputed = match registry.impute(&incomplete, &id, &ImputerOptions::new()) {
                Ok(imputed) => imputed,
                // A column with every cell suppressed has nothing to impute from.
                Err(err) => {
                    prop_assert_eq!(err.kind(), "external-collaborator");
                    continue;
                }
            };
            for (col, (truth, filled)) in data.columns().iter().zip(imputed.columns()).enumerate() {
                for row in 0..data.n_rows() {
                    if mask.is_missing(row, col) {
                        continue;
                    }
                    match (&truth.values, &filled.values) {
                        (ColumnValues::Numeric(t), ColumnValues::Numeric(f)) => prop_assert_eq!(t[row], f[row]),
                        (ColumnValues::Categorical(t), ColumnValues::Categorical(f)) => prop_assert_eq!(&t[row], &f[row]),
                        _ => prop_assert!(false, "column kind changed"),
                    }
                }
            }
        }
    }

    #[test]
    fn exact_reconstruction_scores_zero(data in arb_dataset(), row_pick in any::<prop::sample::Index>()) {
        let mut mask = MissingnessMask::new(data.names(), data.n_rows());
        mask.mark(row_pick.index(data.n_rows()), 0);
        let report = MetricEngine::default().reconstruction_error(&data, &data, &mask).unwrap();
        prop_assert_eq!(report.summary(), 0.0);
    }
}

#[test]
fn all_false_mask_is_rejected() {
    let data = Dataset::new(vec![Column::numeric("x", vec![1.0, 2.0])]).unwrap();
    let mask = MissingnessMask::new(data.names(), 2);
    let err = MetricEngine::default().reconstruction_error(&data, &data, &mask).unwrap_err();
    assert!(matches!(err, ImputeBenchError::EmptyMask));
}
