use crate::error::{EngineError, EngineResult};
use crate::models::{CatalogEntry, NextItemResponse, ProgressResponse};
use crate::storage::Storage;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Per-process warm-state cache for catalog batches (§4.4's "optional
/// warm-state"). CatalogEntries are immutable once a room's catalog is
/// built, so a batch, once fetched, never needs invalidating — only
/// eviction on room deletion would ever be correctness-relevant, and
/// rooms are never deleted except on the insufficient-content rollback
/// path, before any batch could have been cached.
#[derive(Default, Clone)]
pub struct BatchCache {
    inner: Arc<RwLock<HashMap<(String, i64), Vec<CatalogEntry>>>>,
}

impl BatchCache {
    fn get(&self, room_id: &str, batch_index: i64) -> Option<Vec<CatalogEntry>> {
        self.inner
            .read()
            .unwrap()
            .get(&(room_id.to_string(), batch_index))
            .cloned()
    }

    fn insert(&self, room_id: &str, batch_index: i64, batch: Vec<CatalogEntry>) {
        self.inner
            .write()
            .unwrap()
            .insert((room_id.to_string(), batch_index), batch);
    }

    fn load_batch(
        &self,
        storage: &Storage,
        room_id: &str,
        batch_size: i64,
        batch_index: i64,
    ) -> EngineResult<Vec<CatalogEntry>> {
        if let Some(batch) = self.get(room_id, batch_index) {
            return Ok(batch);
        }
        let batch = storage.range_get_catalog(room_id, batch_index * batch_size, batch_size)?;
        if !batch.is_empty() {
            self.insert(room_id, batch_index, batch.clone());
        }
        Ok(batch)
    }
}

/// The cursor is derived, not stored: it's just how many items this
/// user has voted on in this room. `nextFor` hands back whichever
/// catalog entry sits at that index, or `EXHAUSTED` once the user has
/// voted through the whole fixed-size catalog. When the cache is
/// supplied, the entry is served out of its batch; once the cursor
/// crosses 80% of the current batch, the next batch is eagerly warmed
/// so the following call doesn't pay a storage read on the boundary.
pub fn next_for(
    storage: &Storage,
    cache: &BatchCache,
    batch_size: i64,
    room_id: &str,
    user_id: &str,
) -> EngineResult<NextItemResponse> {
    if !storage.is_member(room_id, user_id)? {
        return Err(EngineError::NotMember);
    }
    let voted = storage.votes_cast_count(room_id, user_id)?;
    let batch_index = voted / batch_size;
    let offset_in_batch = voted % batch_size;

    let batch = cache.load_batch(storage, room_id, batch_size, batch_index)?;
    let entry = batch.into_iter().find(|e| e.sequence_index == voted);

    if offset_in_batch * 10 >= batch_size * 8 {
        cache.load_batch(storage, room_id, batch_size, batch_index + 1).ok();
    }

    match entry {
        Some(entry) => Ok(NextItemResponse::Item { entry }),
        None => Ok(NextItemResponse::Exhausted),
    }
}

pub fn progress(storage: &Storage, room_id: &str, user_id: &str) -> EngineResult<ProgressResponse> {
    if !storage.is_member(room_id, user_id)? {
        return Err(EngineError::NotMember);
    }
    let voted_count = storage.votes_cast_count(room_id, user_id)?;
    let total = storage.catalog_count(room_id)?;
    Ok(ProgressResponse {
        room_id: room_id.to_string(),
        user_id: user_id.to_string(),
        voted_count,
        total,
        remaining: (total - voted_count).max(0),
    })
}
