//! Incomplete-dataset cache
//!
//! An incomplete dataset is generated once per (dataset, mechanism, rate) on
//! the full data; every sample size and algorithm reuses it. Each key owns its
//! own slot lock, so concurrent combinations wait only for the key they need.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::data::dataset::IncompleteDataset;
use crate::data::mask::MissingnessMask;
use crate::error::Result;
use crate::missingness::{CauseMapping, MechanismClass};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub dataset: String,
    pub mechanism: MechanismClass,
    rate_bits: u64,
}

impl CacheKey {
    pub fn new(dataset: &str, mechanism: MechanismClass, error_rate: f64) -> Self {
        Self {
            dataset: dataset.to_string(),
            mechanism,
            rate_bits: error_rate.to_bits(),
        }
    }

    pub fn error_rate(&self) -> f64 {
        f64::from_bits(self.rate_bits)
    }
}

/// Injection outcome shared by every combination with the same key
#[derive(Debug, Clone)]
pub struct Injection {
    pub mapping: CauseMapping,
    pub incomplete: IncompleteDataset,
    pub mask: MissingnessMask,
}

type Slot = Arc<Mutex<Option<Arc<Injection>>>>;

#[derive(Debug, Default)]
pub struct IncompleteCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl IncompleteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached injection for `key`, building it on first use
    ///
    /// Failed builds are not cached.
    pub fn get_or_try_insert_with<F>(&self, key: CacheKey, build: F) -> Result<Arc<Injection>>
    where
        F: FnOnce() -> Result<Injection>,
    {
        let slot = Arc::clone(self.slots.lock().entry(key).or_default());
        let mut guard = slot.lock();
        if let Some(hit) = guard.as_ref() {
            return Ok(Arc::clone(hit));
        }
        let built = Arc::new(build()?);
        *guard = Some(Arc::clone(&built));
        Ok(built)
    }

    /// Number of keys with a built injection
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.lock().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
