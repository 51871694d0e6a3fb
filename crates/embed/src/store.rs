//! Cold-tier vector store on redb, using the `HEV1` record layout.
//!
//! Redb gives ACID transactions and MVCC in pure Rust: a batch of vector
//! rows written by one session either commits as a whole or not at all, and
//! readers never observe a partial vector.
//!
//! # Layout
//!
//! Per-model header (key: `model_id`):
//!
//! ```text
//! magic "HEV1" | model_id_len u8 | model_id UTF-8 | dim u16 LE | vector_format u8
//! ```
//!
//! Vector rows (key: `model_id_len u8 | model_id | content_hash[20]`):
//!
//! ```text
//! version u8 | vector f32-LE * dim | last_used_ns u64 LE
//! ```
//!
//! Rows are fixed-size for a given dimension. A row of the wrong length, a
//! version byte other than [`ROW_VERSION`], or an unknown `vector_format`
//! in the header is a cache miss, not an error; that is what makes layout
//! upgrades a cold start instead of a crash.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use canonical::Digest160;

use crate::error::CacheError;

const HEADERS: TableDefinition<&str, &[u8]> = TableDefinition::new("embedding_headers");
const ROWS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("embedding_rows");

const MAGIC: &[u8; 4] = b"HEV1";
/// Bump when the row payload layout changes.
pub const ROW_VERSION: u8 = 1;
/// Little-endian IEEE-754 float32, the only format this build writes.
pub const VECTOR_FORMAT_F32LE: u8 = 0;

/// Durable `(model_id, content_hash) → vector` store.
///
/// Single-writer many-reader: redb serializes write transactions internally
/// and readers run on MVCC snapshots.
pub struct ColdStore {
    db: Arc<Database>,
    row_budget: usize,
}

impl ColdStore {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P, row_budget: usize) -> Result<Self, CacheError> {
        let db = Database::create(path).map_err(cold)?;
        let txn = db.begin_write().map_err(cold)?;
        {
            let _ = txn.open_table(HEADERS).map_err(cold)?;
            let _ = txn.open_table(ROWS).map_err(cold)?;
        }
        txn.commit().map_err(cold)?;
        Ok(Self {
            db: Arc::new(db),
            row_budget,
        })
    }

    /// Fetch every present, well-formed vector among `hashes`.
    ///
    /// A missing or malformed header for `model_id` makes every key a miss.
    pub fn get_many(
        &self,
        model_id: &str,
        dim: usize,
        hashes: &[Digest160],
    ) -> Result<HashMap<Digest160, Vec<f32>>, CacheError> {
        let txn = self.db.begin_read().map_err(cold)?;
        let headers = txn.open_table(HEADERS).map_err(cold)?;
        match headers.get(model_id).map_err(cold)? {
            Some(raw) if header_accepts(raw.value(), model_id, dim) => {}
            _ => return Ok(HashMap::new()),
        }

        let rows = txn.open_table(ROWS).map_err(cold)?;
        let mut found = HashMap::new();
        for &hash in hashes {
            let key = row_key(model_id, &hash);
            if let Some(raw) = rows.get(key.as_slice()).map_err(cold)? {
                if let Some(vector) = decode_row(raw.value(), dim) {
                    found.insert(hash, vector);
                }
            }
        }
        Ok(found)
    }

    /// Write a batch of vectors in one transaction, creating the model
    /// header on first contact and evicting past the row budget.
    pub fn put_many(
        &self,
        model_id: &str,
        dim: usize,
        entries: &[(Digest160, Vec<f32>)],
        now_ns: u64,
    ) -> Result<(), CacheError> {
        if entries.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin_write().map_err(cold)?;
        {
            let mut headers = txn.open_table(HEADERS).map_err(cold)?;
            let needs_header = match headers.get(model_id).map_err(cold)? {
                Some(raw) => !header_accepts(raw.value(), model_id, dim),
                None => true,
            };
            if needs_header {
                headers
                    .insert(model_id, encode_header(model_id, dim).as_slice())
                    .map_err(cold)?;
            }

            let mut rows = txn.open_table(ROWS).map_err(cold)?;
            for (hash, vector) in entries {
                if vector.len() != dim {
                    continue;
                }
                rows.insert(
                    row_key(model_id, hash).as_slice(),
                    encode_row(vector, now_ns).as_slice(),
                )
                .map_err(cold)?;
            }
            self.evict_locked(&mut rows, model_id, dim)?;
        }
        txn.commit().map_err(cold)?;
        Ok(())
    }

    /// Refresh `last_used_ns` on recently read rows (approximate LRU).
    pub fn touch_many(
        &self,
        model_id: &str,
        dim: usize,
        hashes: &[Digest160],
        now_ns: u64,
    ) -> Result<(), CacheError> {
        if hashes.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin_write().map_err(cold)?;
        {
            let mut rows = txn.open_table(ROWS).map_err(cold)?;
            for hash in hashes {
                let key = row_key(model_id, hash);
                let existing = rows
                    .get(key.as_slice())
                    .map_err(cold)?
                    .and_then(|raw| decode_row(raw.value(), dim));
                if let Some(vector) = existing {
                    rows.insert(key.as_slice(), encode_row(&vector, now_ns).as_slice())
                        .map_err(cold)?;
                }
            }
        }
        txn.commit().map_err(cold)?;
        Ok(())
    }

    /// Number of rows stored for one model.
    pub fn row_count(&self, model_id: &str) -> Result<usize, CacheError> {
        let txn = self.db.begin_read().map_err(cold)?;
        let rows = txn.open_table(ROWS).map_err(cold)?;
        let prefix = key_prefix(model_id);
        let mut count = 0;
        for item in rows.iter().map_err(cold)? {
            let (key, _) = item.map_err(cold)?;
            if key.value().starts_with(&prefix) {
                count += 1;
            }
        }
        Ok(count)
    }

    fn evict_locked(
        &self,
        rows: &mut redb::Table<'_, &'static [u8], &'static [u8]>,
        model_id: &str,
        dim: usize,
    ) -> Result<(), CacheError> {
        let prefix = key_prefix(model_id);
        let mut stamped: Vec<(Vec<u8>, u64)> = Vec::new();
        for item in rows.iter().map_err(cold)? {
            let (key, value) = item.map_err(cold)?;
            if key.value().starts_with(&prefix) {
                stamped.push((key.value().to_vec(), row_last_used(value.value(), dim)));
            }
        }
        if stamped.len() <= self.row_budget {
            return Ok(());
        }
        stamped.sort_by_key(|(_, last_used)| *last_used);
        let excess = stamped.len() - self.row_budget;
        for (key, _) in stamped.into_iter().take(excess) {
            rows.remove(key.as_slice()).map_err(cold)?;
        }
        debug!(model = model_id, evicted = excess, "cold tier eviction");
        Ok(())
    }
}

fn cold(e: impl ToString) -> CacheError {
    CacheError::ColdTier(e.to_string())
}

fn key_prefix(model_id: &str) -> Vec<u8> {
    let bytes = model_id.as_bytes();
    let mut key = Vec::with_capacity(1 + bytes.len());
    key.push(bytes.len() as u8);
    key.extend_from_slice(bytes);
    key
}

fn row_key(model_id: &str, hash: &Digest160) -> Vec<u8> {
    let mut key = key_prefix(model_id);
    key.extend_from_slice(hash.as_bytes());
    key
}

fn encode_header(model_id: &str, dim: usize) -> Vec<u8> {
    let bytes = model_id.as_bytes();
    let mut header = Vec::with_capacity(4 + 1 + bytes.len() + 3);
    header.extend_from_slice(MAGIC);
    header.push(bytes.len() as u8);
    header.extend_from_slice(bytes);
    header.extend_from_slice(&(dim as u16).to_le_bytes());
    header.push(VECTOR_FORMAT_F32LE);
    header
}

fn header_accepts(raw: &[u8], model_id: &str, dim: usize) -> bool {
    let id = model_id.as_bytes();
    let expected_len = 4 + 1 + id.len() + 2 + 1;
    if raw.len() != expected_len || &raw[..4] != MAGIC {
        return false;
    }
    if raw[4] as usize != id.len() || &raw[5..5 + id.len()] != id {
        return false;
    }
    let dim_at = 5 + id.len();
    let stored_dim = u16::from_le_bytes([raw[dim_at], raw[dim_at + 1]]) as usize;
    stored_dim == dim && raw[dim_at + 2] == VECTOR_FORMAT_F32LE
}

fn row_len(dim: usize) -> usize {
    1 + dim * 4 + 8
}

fn encode_row(vector: &[f32], now_ns: u64) -> Vec<u8> {
    let mut row = Vec::with_capacity(row_len(vector.len()));
    row.push(ROW_VERSION);
    for value in vector {
        row.extend_from_slice(&value.to_le_bytes());
    }
    row.extend_from_slice(&now_ns.to_le_bytes());
    row
}

/// Decode a row; `None` on any length or version mismatch (miss semantics).
fn decode_row(raw: &[u8], dim: usize) -> Option<Vec<f32>> {
    if raw.len() != row_len(dim) || raw[0] != ROW_VERSION {
        return None;
    }
    let mut vector = Vec::with_capacity(dim);
    for chunk in raw[1..1 + dim * 4].chunks_exact(4) {
        vector.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Some(vector)
}

fn row_last_used(raw: &[u8], dim: usize) -> u64 {
    if raw.len() != row_len(dim) {
        return 0;
    }
    let at = 1 + dim * 4;
    u64::from_le_bytes(raw[at..at + 8].try_into().unwrap_or_default())
}
