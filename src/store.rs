//! Result store collaborators.
//!
//! The library never persists anything on its own. A [`ResultStore`] keyed by
//! normalized address and a [`CatchAllStore`] keyed by domain let callers
//! plug in whatever backing they have; [`MemoryStore`] covers both for a
//! single process.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::catchall::CatchAllResult;
use crate::pipeline::{Validator, Verdict};

pub trait ResultStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Verdict>;
    fn upsert(&self, key: &str, verdict: Verdict);
}

pub trait CatchAllStore: Send + Sync {
    fn get(&self, domain: &str) -> Option<CatchAllResult>;
    fn upsert(&self, domain: &str, result: CatchAllResult);
}

/// Key under which a verdict for `email` is stored.
pub fn store_key(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    verdicts: RwLock<HashMap<String, Verdict>>,
    catch_all: RwLock<HashMap<String, CatchAllResult>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.verdicts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.read().is_empty()
    }
}

impl ResultStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Verdict> {
        self.verdicts.read().get(key).cloned()
    }

    fn upsert(&self, key: &str, verdict: Verdict) {
        self.verdicts.write().insert(key.to_string(), verdict);
    }
}

impl CatchAllStore for MemoryStore {
    fn get(&self, domain: &str) -> Option<CatchAllResult> {
        self.catch_all.read().get(domain).copied()
    }

    fn upsert(&self, domain: &str, result: CatchAllResult) {
        self.catch_all.write().insert(domain.to_string(), result);
    }
}

/// A [`Validator`] that answers from `store` when it can and records every
/// fresh verdict.
#[derive(Clone)]
pub struct CachedValidator {
    validator: Arc<Validator>,
    store: Arc<dyn ResultStore>,
}

impl CachedValidator {
    pub fn new(validator: Arc<Validator>, store: Arc<dyn ResultStore>) -> Self {
        Self { validator, store }
    }

    pub fn validator(&self) -> &Arc<Validator> {
        &self.validator
    }

    pub fn validate_blocking(&self, email: &str) -> Verdict {
        let key = store_key(email);
        if let Some(hit) = self.store.get(&key) {
            tracing::debug!(key = %key, "verdict served from store");
            return hit;
        }
        let verdict = self.validator.validate_blocking(email);
        self.store.upsert(&key, verdict.clone());
        verdict
    }

    pub async fn validate(&self, email: &str) -> Verdict {
        let key = store_key(email);
        if let Some(hit) = self.store.get(&key) {
            tracing::debug!(key = %key, "verdict served from store");
            return hit;
        }
        let verdict = self.validator.validate(email).await;
        self.store.upsert(&key, verdict.clone());
        verdict
    }
}
