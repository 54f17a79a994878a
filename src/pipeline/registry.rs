//! Source identity cache
//!
//! Maps source codes to their persisted identity within one snapshot, so a
//! run asks the store for each distinct code only once. Identities resolved
//! inside a file transaction stay pending until that transaction commits; a
//! rollback discards them, since the rows they point to no longer exist.

use crate::database::AnnouncementStore;
use crate::error::IngestResult;
use std::collections::HashMap;
use tracing::debug;

/// Storage operation the registry falls back to on a cache miss
pub trait SourceStore {
    /// Insert the source if absent, else fetch the existing identity.
    fn get_or_create_source(
        &self,
        snapshot_id: i64,
        source_code: &str,
        source_type: &str,
    ) -> IngestResult<i64>;
}

impl SourceStore for AnnouncementStore<'_> {
    fn get_or_create_source(
        &self,
        snapshot_id: i64,
        source_code: &str,
        source_type: &str,
    ) -> IngestResult<i64> {
        AnnouncementStore::get_or_create_source(self, snapshot_id, source_code, source_type)
    }
}

/// Per-snapshot cache of resolved source identities
#[derive(Debug)]
pub struct SourceRegistry {
    snapshot_id: i64,
    committed: HashMap<String, i64>,
    pending: HashMap<String, i64>,
}

impl SourceRegistry {
    pub fn new(snapshot_id: i64) -> Self {
        Self {
            snapshot_id,
            committed: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    pub fn snapshot_id(&self) -> i64 {
        self.snapshot_id
    }

    /// Resolve a source code, creating the source through `store` on first sight.
    ///
    /// `source_type` only matters when the source is created.
    pub fn resolve<S: SourceStore + ?Sized>(
        &mut self,
        store: &S,
        source_code: &str,
        source_type: &str,
    ) -> IngestResult<i64> {
        if let Some(id) = self
            .committed
            .get(source_code)
            .or_else(|| self.pending.get(source_code))
        {
            return Ok(*id);
        }

        let id = store.get_or_create_source(self.snapshot_id, source_code, source_type)?;
        debug!("Resolved source {} to {}", source_code, id);
        self.pending.insert(source_code.to_string(), id);
        Ok(id)
    }

    /// Keep identities resolved since the last commit or rollback.
    pub fn commit(&mut self) {
        self.committed.extend(self.pending.drain());
    }

    /// Forget identities resolved since the last commit or rollback.
    pub fn rollback(&mut self) {
        self.pending.clear();
    }

    /// Number of cached source codes, pending ones included
    pub fn len(&self) -> usize {
        self.committed.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
