//! Missingness mechanisms and injection

pub mod injector;
pub mod mechanism;

pub use self::injector::inject;
pub use self::mechanism::{
    derive_cause_mapping, partially_observed_count, CauseMapping, MechanismClass,
};
