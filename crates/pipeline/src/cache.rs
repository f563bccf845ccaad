//! Single-slot memoization of pipeline artifacts.
//!
//! Each artifact class keeps at most one live entry. A lookup with the
//! stored key returns the stored artifact; any other key drops it and
//! recomputes.

use std::sync::Arc;

use tracing::debug;

use crate::classifier::{ClassifiedRaster, ModelKey, TrainedModel};
use crate::compositor::{CompositeImage, CompositeKey};
use crate::error::Result;
use crate::training::TrainingSet;

/// One memoized artifact and the key it was computed for.
#[derive(Debug)]
pub struct Slot<K, V> {
    name: &'static str,
    entry: Option<(K, Arc<V>)>,
}

impl<K: PartialEq, V> Slot<K, V> {
    pub fn new(name: &'static str) -> Self {
        Self { name, entry: None }
    }

    /// The stored artifact if it was computed for `key`.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        match &self.entry {
            Some((k, v)) if k == key => Some(Arc::clone(v)),
            _ => None,
        }
    }

    /// Key of the live entry
    pub fn key(&self) -> Option<&K> {
        self.entry.as_ref().map(|(k, _)| k)
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    /// Store `value` under `key`, replacing whatever was there.
    pub fn insert(&mut self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.entry = Some((key, Arc::clone(&value)));
        value
    }

    /// Return the stored artifact for `key`, or compute and store it.
    ///
    /// On error the slot is left empty.
    pub fn get_or_try_insert_with<F>(&mut self, key: K, compute: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(hit) = self.get(&key) {
            debug!(slot = self.name, "cache hit");
            return Ok(hit);
        }
        debug!(slot = self.name, replaced = self.entry.is_some(), "cache miss");
        self.entry = None;
        let value = compute()?;
        Ok(self.insert(key, value))
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

/// Names of the labeled sources a training set was built from
pub type TrainingKey = Vec<String>;

/// Key of a classified raster: the model and the composite it was applied to
pub type ClassificationKey = (ModelKey, CompositeKey);

/// One slot per artifact class of an interactive session.
#[derive(Debug)]
pub struct PipelineCache {
    pub training: Slot<TrainingKey, TrainingSet>,
    pub composites: Slot<CompositeKey, CompositeImage>,
    pub models: Slot<ModelKey, TrainedModel>,
    pub classified: Slot<ClassificationKey, ClassifiedRaster>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self {
            training: Slot::new("training"),
            composites: Slot::new("composite"),
            models: Slot::new("model"),
            classified: Slot::new("classified"),
        }
    }

    /// Drop every artifact.
    pub fn clear(&mut self) {
        self.training.invalidate();
        self.composites.invalidate();
        self.models.invalidate();
        self.classified.invalidate();
    }
}

impl Default for PipelineCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use std::cell::Cell;

    #[test]
    fn test_same_key_returns_same_artifact() {
        let mut slot: Slot<u32, String> = Slot::new("test");
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok("a".to_string())
        };
        let a = slot.get_or_try_insert_with(1, compute).unwrap();
        let b = slot.get_or_try_insert_with(1, compute).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_key_change_recomputes() {
        let mut slot: Slot<u32, String> = Slot::new("test");
        let a = slot.get_or_try_insert_with(1, || Ok("a".into())).unwrap();
        let b = slot.get_or_try_insert_with(2, || Ok("b".into())).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(slot.get(&1).is_none());
        assert_eq!(slot.key(), Some(&2));

        // going back is a miss too: one entry only
        let c = slot.get_or_try_insert_with(1, || Ok("a".into())).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_failed_compute_leaves_slot_empty() {
        let mut slot: Slot<u32, String> = Slot::new("test");
        slot.insert(1, "a".into());
        let err = slot.get_or_try_insert_with(2, || Err(PipelineError::Config("boom".into())));
        assert!(err.is_err());
        assert!(slot.is_empty());
    }

    #[test]
    fn test_invalidate() {
        let mut slot: Slot<u32, String> = Slot::new("test");
        slot.insert(1, "a".into());
        slot.invalidate();
        assert!(slot.get(&1).is_none());
    }
}
