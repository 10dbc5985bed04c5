//! Missingness mechanisms
//!
//! A mechanism decides which variables become partially observed and, for each
//! of them, which variable drives whether a given cell goes missing:
//!
//! - **MCAR**: no cause; missingness is independent of every value
//! - **MAR**: one cause drawn from the fully observed variables
//! - **MNAR**: one cause drawn from the other partially observed variables,
//!   so missingness depends on values that may themselves be unobserved

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::causal::graph::CausalGraph;
use crate::error::{ImputeBenchError, Result};

/// Mechanism class of a missingness pattern
///
/// Serialized by name; deserialization accepts any case, like [`FromStr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MechanismClass {
    Mcar,
    Mar,
    Mnar,
}

impl MechanismClass {
    pub const ALL: [MechanismClass; 3] = [Self::Mcar, Self::Mar, Self::Mnar];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mcar => "MCAR",
            Self::Mar => "MAR",
            Self::Mnar => "MNAR",
        }
    }
}

impl FromStr for MechanismClass {
    type Err = ImputeBenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MCAR" => Ok(Self::Mcar),
            "MAR" => Ok(Self::Mar),
            "MNAR" => Ok(Self::Mnar),
            _ => Err(ImputeBenchError::UnsupportedMechanism(s.to_string())),
        }
    }
}

impl TryFrom<String> for MechanismClass {
    type Error = ImputeBenchError;

    fn try_from(name: String) -> Result<Self> {
        name.parse()
    }
}

impl From<MechanismClass> for String {
    fn from(mechanism: MechanismClass) -> Self {
        mechanism.as_str().to_string()
    }
}

impl fmt::Display for MechanismClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partially observed variable → variables driving its missingness
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CauseMapping {
    causes: BTreeMap<String, Vec<String>>,
}

impl CauseMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, variable: impl Into<String>, causes: Vec<String>) {
        self.causes.insert(variable.into(), causes);
    }

    pub fn causes(&self, variable: &str) -> Option<&[String]> {
        self.causes.get(variable).map(Vec::as_slice)
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.causes.contains_key(variable)
    }

    pub fn partially_observed(&self) -> impl Iterator<Item = &String> {
        self.causes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.causes.iter()
    }

    pub fn len(&self) -> usize {
        self.causes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }

    /// Checks that every key and every cause names one of `columns`
    pub fn validate_against(&self, columns: &[String]) -> Result<()> {
        let known: HashSet<&str> = columns.iter().map(String::as_str).collect();
        for (variable, causes) in &self.causes {
            if !known.contains(variable.as_str()) {
                return Err(ImputeBenchError::UnknownVariable(variable.clone()));
            }
            if let Some(cause) = causes.iter().find(|c| !known.contains(c.as_str())) {
                return Err(ImputeBenchError::UnknownVariable(cause.clone()));
            }
        }
        Ok(())
    }
}

/// Number of partially observed variables, rounding half up
pub fn partially_observed_count(variables: usize, ratio: f64) -> usize {
    ((variables as f64 * ratio) + 0.5).floor().min(variables as f64) as usize
}

/// Draws a cause mapping for `variable_names` under `mechanism`
///
/// When `causal_graph` is given it is parsed first; its nodes, in declaration
/// order, become the candidate variables.
pub fn derive_cause_mapping<R: Rng + ?Sized>(
    variable_names: &[String],
    mechanism: MechanismClass,
    partially_observed_ratio: f64,
    causal_graph: Option<&str>,
    rng: &mut R,
) -> Result<CauseMapping> {
    if variable_names.is_empty() {
        return Err(ImputeBenchError::InvalidDataset("no variables to select from".into()));
    }
    if !(0.0..=1.0).contains(&partially_observed_ratio) {
        return Err(ImputeBenchError::InvalidRate {
            name: "partially_observed_ratio",
            value: partially_observed_ratio,
            expected: "[0, 1]",
        });
    }
    let known: HashSet<&str> = variable_names.iter().map(String::as_str).collect();
    if known.len() != variable_names.len() {
        return Err(ImputeBenchError::InvalidDataset("duplicate variable names".into()));
    }

    let candidates: Vec<String> = match causal_graph {
        Some(description) => {
            let graph = CausalGraph::parse(description)?;
            if let Some(stray) = graph.nodes().iter().find(|n| !known.contains(n.as_str())) {
                return Err(ImputeBenchError::Format(format!(
                    "structure node {} is not a dataset variable",
                    stray
                )));
            }
            graph.nodes().to_vec()
        }
        None => variable_names.to_vec(),
    };

    let count = partially_observed_count(candidates.len(), partially_observed_ratio);
    let selected: Vec<String> = candidates.choose_multiple(rng, count).cloned().collect();
    let complement: Vec<String> = candidates
        .iter()
        .filter(|v| !selected.contains(v))
        .cloned()
        .collect();

    let mut mapping = CauseMapping::new();
    match mechanism {
        MechanismClass::Mcar => {
            for variable in &selected {
                mapping.insert(variable.clone(), Vec::new());
            }
        }
        MechanismClass::Mar => {
            if !selected.is_empty() && complement.is_empty() {
                return Err(ImputeBenchError::InsufficientComplement {
                    mechanism: mechanism.to_string(),
                    reason: "every variable is partially observed, none can cause missingness".into(),
                });
            }
            for variable in &selected {
                if let Some(cause) = complement.choose(rng) {
                    mapping.insert(variable.clone(), vec![cause.clone()]);
                }
            }
        }
        MechanismClass::Mnar => {
            if !selected.is_empty() && selected.len() < 2 {
                return Err(ImputeBenchError::InsufficientComplement {
                    mechanism: mechanism.to_string(),
                    reason: "a single partially observed variable has no peer to depend on".into(),
                });
            }
            if !selected.is_empty() && complement.is_empty() {
                return Err(ImputeBenchError::InsufficientComplement {
                    mechanism: mechanism.to_string(),
                    reason: "no fully observed variable would remain".into(),
                });
            }
            for variable in &selected {
                let peers: Vec<&String> = selected.iter().filter(|p| *p != variable).collect();
                if let Some(cause) = peers.choose(rng) {
                    mapping.insert(variable.clone(), vec![(*cause).clone()]);
                }
            }
        }
    }

    debug!(
        "{} mapping over {} candidates: {} partially observed",
        mechanism,
        candidates.len(),
        mapping.len()
    );
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("V{}", i)).collect()
    }

    #[test]
    fn test_parse_mechanism_names() {
        assert_eq!("MCAR".parse::<MechanismClass>().unwrap(), MechanismClass::Mcar);
        assert_eq!("mnar".parse::<MechanismClass>().unwrap(), MechanismClass::Mnar);
        let err = "MARX".parse::<MechanismClass>().unwrap_err();
        assert!(matches!(err, ImputeBenchError::UnsupportedMechanism(ref m) if m == "MARX"));
    }

    #[test]
    fn test_serde_uses_mechanism_names() {
        let parsed: Vec<MechanismClass> = serde_json::from_str(r#"["MCAR", "mar", "Mnar"]"#).unwrap();
        assert_eq!(parsed, MechanismClass::ALL.to_vec());
        assert_eq!(serde_json::to_string(&MechanismClass::Mnar).unwrap(), r#""MNAR""#);

        let err = serde_json::from_str::<MechanismClass>(r#""MARX""#).unwrap_err();
        assert!(err.to_string().contains("Unsupported missingness mechanism: MARX"));
    }

    #[test]
    fn test_rounding_is_half_up() {
        assert_eq!(partially_observed_count(3, 0.5), 2);
        assert_eq!(partially_observed_count(5, 0.5), 3);
        assert_eq!(partially_observed_count(4, 0.5), 2);
        assert_eq!(partially_observed_count(7, 0.0), 0);
        assert_eq!(partially_observed_count(7, 1.0), 7);
    }

    #[test]
    fn test_mcar_mapping_has_no_causes() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let mapping = derive_cause_mapping(&names(10), MechanismClass::Mcar, 0.3, None, &mut rng)
            .unwrap();
        assert_eq!(mapping.len(), 3);
        assert!(mapping.iter().all(|(_, causes)| causes.is_empty()));
    }

    #[test]
    fn test_mar_causes_are_fully_observed() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let mapping = derive_cause_mapping(&names(8), MechanismClass::Mar, 0.5, None, &mut rng)
            .unwrap();
        assert_eq!(mapping.len(), 4);
        for (_, causes) in mapping.iter() {
            assert_eq!(causes.len(), 1);
            assert!(!mapping.contains(&causes[0]));
        }
    }

    #[test]
    fn test_mnar_causes_are_partially_observed_peers() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let mapping = derive_cause_mapping(&names(8), MechanismClass::Mnar, 0.5, None, &mut rng)
            .unwrap();
        for (variable, causes) in mapping.iter() {
            assert_eq!(causes.len(), 1);
            assert!(mapping.contains(&causes[0]));
            assert_ne!(&causes[0], variable);
        }
    }

    #[test]
    fn test_mar_without_complement_fails() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let err = derive_cause_mapping(&names(4), MechanismClass::Mar, 1.0, None, &mut rng)
            .unwrap_err();
        assert!(matches!(err, ImputeBenchError::InsufficientComplement { .. }));
    }

    #[test]
    fn test_mnar_with_single_selection_fails() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let err = derive_cause_mapping(&names(4), MechanismClass::Mnar, 0.25, None, &mut rng)
            .unwrap_err();
        assert!(matches!(err, ImputeBenchError::InsufficientComplement { .. }));
    }

    #[test]
    fn test_mnar_with_every_variable_selected_fails() {
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let err = derive_cause_mapping(&names(3), MechanismClass::Mnar, 1.0, None, &mut rng)
            .unwrap_err();
        assert!(matches!(err, ImputeBenchError::InsufficientComplement { .. }));
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        for ratio in [-0.1, 1.1, f64::NAN] {
            let err = derive_cause_mapping(&names(4), MechanismClass::Mcar, ratio, None, &mut rng)
                .unwrap_err();
            assert!(matches!(err, ImputeBenchError::InvalidRate { .. }));
        }
    }

    #[test]
    fn test_graph_restricts_candidates() {
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let vars = vec!["A".to_string(), "B".to_string(), "C".to_string(), "D".to_string()];
        let mapping =
            derive_cause_mapping(&vars, MechanismClass::Mar, 0.5, Some("[A][B|A]"), &mut rng)
                .unwrap();
        assert_eq!(mapping.len(), 1);
        let (variable, causes) = mapping.iter().next().unwrap();
        assert!(variable == "A" || variable == "B");
        assert!(causes[0] == "A" || causes[0] == "B");
        assert_ne!(variable, &causes[0]);
    }

    #[test]
    fn test_bad_graph_is_format_error() {
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let vars = names(3);
        let err = derive_cause_mapping(&vars, MechanismClass::Mcar, 0.5, Some("[V0][V1|"), &mut rng)
            .unwrap_err();
        assert!(matches!(err, ImputeBenchError::Format(_)));

        let err = derive_cause_mapping(&vars, MechanismClass::Mcar, 0.5, Some("[V0][Z]"), &mut rng)
            .unwrap_err();
        assert!(matches!(err, ImputeBenchError::Format(_)));
    }

    #[test]
    fn test_same_seed_same_mapping() {
        let a = derive_cause_mapping(
            &names(12),
            MechanismClass::Mnar,
            0.5,
            None,
            &mut ChaCha20Rng::seed_from_u64(42),
        )
        .unwrap();
        let b = derive_cause_mapping(
            &names(12),
            MechanismClass::Mnar,
            0.5,
            None,
            &mut ChaCha20Rng::seed_from_u64(42),
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_mapping_validation_against_columns() {
        let mut mapping = CauseMapping::new();
        mapping.insert("A", vec!["B".to_string()]);
        assert!(mapping.validate_against(&["A".into(), "B".into()]).is_ok());
        let err = mapping.validate_against(&["A".into()]).unwrap_err();
        assert!(matches!(err, ImputeBenchError::UnknownVariable(ref v) if v == "B"));
    }
}
