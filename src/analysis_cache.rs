use std::collections::HashMap;
use std::sync::Arc;

use crate::team_canon::CanonicalTeam;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub dataset_id: String,
    pub dataset_version: u64,
    pub team: CanonicalTeam,
    pub window: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Memoized analyses for one dataset identity and version. Any change of
/// identity or version drops every entry.
#[derive(Debug)]
pub struct AnalysisCache<V> {
    dataset_id: String,
    version: u64,
    entries: HashMap<CacheKey, Arc<V>>,
    hits: u64,
    misses: u64,
}

impl<V> AnalysisCache<V> {
    pub fn new(dataset_id: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            version: 0,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn key(&self, team: CanonicalTeam, window: usize) -> CacheKey {
        CacheKey {
            dataset_id: self.dataset_id.clone(),
            dataset_version: self.version,
            team,
            window,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<V>> {
        self.entries.get(key).cloned()
    }

    pub fn get_or_compute<F, E>(&mut self, key: CacheKey, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if key.dataset_id != self.dataset_id || key.dataset_version != self.version {
            tracing::info!(
                from_version = self.version,
                to_version = key.dataset_version,
                "dataset identity changed, dropping cached analyses"
            );
            self.entries.clear();
            self.dataset_id = key.dataset_id.clone();
            self.version = key.dataset_version;
        }
        if let Some(hit) = self.entries.get(&key) {
            self.hits += 1;
            tracing::debug!(team = %key.team, window = key.window, "analysis cache hit");
            return Ok(Arc::clone(hit));
        }
        self.misses += 1;
        let value = Arc::new(compute()?);
        self.entries.insert(key, Arc::clone(&value));
        Ok(value)
    }

    /// Advances the dataset version and drops every entry in one step.
    pub fn bump_version(&mut self) -> u64 {
        self.version += 1;
        self.entries.clear();
        tracing::info!(version = self.version, "dataset version bumped, cache cleared");
        self.version
    }

    pub fn set_dataset_id(&mut self, dataset_id: impl Into<String>) {
        let dataset_id = dataset_id.into();
        if dataset_id != self.dataset_id {
            self.dataset_id = dataset_id;
            self.entries.clear();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }
}
