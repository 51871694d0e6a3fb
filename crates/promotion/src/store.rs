use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

use canonical::Digest160;
use synth::Strategy;

const PROMOTIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("promotions");

/// A winner becomes failure-dominant (and demoted) once
/// `failure > success + DEMOTION_MARGIN`.
pub const DEMOTION_MARGIN: u32 = 3;

/// Primary key of one promotion row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PromotionKey {
    pub page_signature: Digest160,
    pub frame_hash: Digest160,
    pub label_key: Digest160,
}

impl PromotionKey {
    fn encode(&self) -> [u8; 60] {
        let mut key = [0u8; 60];
        key[..20].copy_from_slice(self.page_signature.as_bytes());
        key[20..40].copy_from_slice(self.frame_hash.as_bytes());
        key[40..].copy_from_slice(self.label_key.as_bytes());
        key
    }
}

/// One stored winner with its outcome history.
#[derive(Debug, Clone, PartialEq)]
pub struct Promotion {
    pub xpath: String,
    pub strategy: Strategy,
    pub success: u32,
    pub failure: u32,
    pub demoted: bool,
    pub last_used_ns: u64,
}

impl Promotion {
    /// Boost contributed to fusion: the success ratio, zero when demoted.
    pub fn boost(&self) -> f32 {
        if self.demoted {
            return 0.0;
        }
        let total = self.success + self.failure;
        if total == 0 {
            0.0
        } else {
            self.success as f32 / total as f32
        }
    }
}

/// Errors from the promotion store. The orchestrator treats write errors
/// as recoverable (degraded reason), never as retrieval failures.
#[derive(Debug, Error)]
pub enum PromotionError {
    #[error("promotion storage error: {0}")]
    Storage(String),
    #[error("corrupt promotion row for key {0}")]
    CorruptRow(String),
}

fn storage(e: impl ToString) -> PromotionError {
    PromotionError::Storage(e.to_string())
}

/// Durable `(page, frame, label) → winning selector` store.
pub struct PromotionStore {
    db: Arc<Database>,
    row_budget: usize,
}

impl PromotionStore {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P, row_budget: usize) -> Result<Self, PromotionError> {
        let db = Database::create(path).map_err(storage)?;
        Self::init(db, row_budget)
    }

    /// Ephemeral store for tests and cache-less deployments.
    pub fn in_memory(row_budget: usize) -> Result<Self, PromotionError> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(storage)?;
        Self::init(db, row_budget)
    }

    fn init(db: Database, row_budget: usize) -> Result<Self, PromotionError> {
        let txn = db.begin_write().map_err(storage)?;
        {
            let _ = txn.open_table(PROMOTIONS).map_err(storage)?;
        }
        txn.commit().map_err(storage)?;
        Ok(Self {
            db: Arc::new(db),
            row_budget,
        })
    }

    /// Fetch the stored winner for a key.
    pub fn lookup(&self, key: &PromotionKey) -> Result<Option<Promotion>, PromotionError> {
        let txn = self.db.begin_read().map_err(storage)?;
        let table = txn.open_table(PROMOTIONS).map_err(storage)?;
        match table.get(key.encode().as_slice()).map_err(storage)? {
            Some(raw) => decode_row(raw.value())
                .map(Some)
                .ok_or_else(|| PromotionError::CorruptRow(hex_key(key))),
            None => Ok(None),
        }
    }

    /// Record a successful action with `xpath`.
    ///
    /// Same winner: success counter increments. Different winner: the old
    /// row is retired and the new selector starts a fresh history — one
    /// row per key, per the schema.
    pub fn record_success(
        &self,
        key: &PromotionKey,
        xpath: &str,
        strategy: Strategy,
    ) -> Result<(), PromotionError> {
        let now = now_ns();
        self.mutate(key, |existing| {
            let promotion = match existing {
                Some(mut row) if row.xpath == xpath => {
                    row.success += 1;
                    row.demoted = row.failure > row.success + DEMOTION_MARGIN;
                    row.last_used_ns = now;
                    row
                }
                prior => {
                    if let Some(old) = prior {
                        debug!(
                            old = %old.xpath,
                            new = %xpath,
                            "promotion winner replaced"
                        );
                    }
                    Promotion {
                        xpath: xpath.to_string(),
                        strategy,
                        success: 1,
                        failure: 0,
                        demoted: false,
                        last_used_ns: now,
                    }
                }
            };
            Some(promotion)
        })
    }

    /// Record a failed action for the stored winner (or open a
    /// failure-only history when no row exists yet).
    pub fn record_failure(
        &self,
        key: &PromotionKey,
        xpath: &str,
        strategy: Strategy,
    ) -> Result<(), PromotionError> {
        let now = now_ns();
        self.mutate(key, |existing| {
            let mut row = match existing {
                Some(row) if row.xpath == xpath => row,
                Some(row) => row, // failure reported for a non-stored xpath: count against the key
                None => Promotion {
                    xpath: xpath.to_string(),
                    strategy,
                    success: 0,
                    failure: 0,
                    demoted: false,
                    last_used_ns: now,
                },
            };
            row.failure += 1;
            row.last_used_ns = now;
            if row.failure > row.success + DEMOTION_MARGIN {
                if !row.demoted {
                    warn!(xpath = %row.xpath, "promotion demoted (failure-dominant)");
                }
                row.demoted = true;
            }
            Some(row)
        })
    }

    /// Demote a winner that no longer resolves in the current snapshot.
    pub fn demote(&self, key: &PromotionKey) -> Result<(), PromotionError> {
        self.mutate(key, |existing| {
            existing.map(|mut row| {
                row.demoted = true;
                row
            })
        })
    }

    /// Remove a row outright (diagnostics cleanup).
    pub fn delete(&self, key: &PromotionKey) -> Result<(), PromotionError> {
        let txn = self.db.begin_write().map_err(storage)?;
        {
            let mut table = txn.open_table(PROMOTIONS).map_err(storage)?;
            table.remove(key.encode().as_slice()).map_err(storage)?;
        }
        txn.commit().map_err(storage)?;
        Ok(())
    }

    /// Total rows stored.
    pub fn len(&self) -> Result<usize, PromotionError> {
        let txn = self.db.begin_read().map_err(storage)?;
        let table = txn.open_table(PROMOTIONS).map_err(storage)?;
        let mut count = 0;
        for item in table.iter().map_err(storage)? {
            item.map_err(storage)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool, PromotionError> {
        Ok(self.len()? == 0)
    }

    fn mutate(
        &self,
        key: &PromotionKey,
        update: impl FnOnce(Option<Promotion>) -> Option<Promotion>,
    ) -> Result<(), PromotionError> {
        let txn = self.db.begin_write().map_err(storage)?;
        {
            let mut table = txn.open_table(PROMOTIONS).map_err(storage)?;
            let encoded = key.encode();
            let existing = table
                .get(encoded.as_slice())
                .map_err(storage)?
                .and_then(|raw| decode_row(raw.value()));
            match update(existing) {
                Some(row) => {
                    table
                        .insert(encoded.as_slice(), encode_row(&row).as_slice())
                        .map_err(storage)?;
                }
                None => {
                    table.remove(encoded.as_slice()).map_err(storage)?;
                }
            }
            self.evict_locked(&mut table)?;
        }
        txn.commit().map_err(storage)?;
        Ok(())
    }

    fn evict_locked(
        &self,
        table: &mut redb::Table<'_, &'static [u8], &'static [u8]>,
    ) -> Result<(), PromotionError> {
        let mut stamped: Vec<(Vec<u8>, u64)> = Vec::new();
        for item in table.iter().map_err(storage)? {
            let (key, value) = item.map_err(storage)?;
            let last_used = decode_row(value.value())
                .map(|row| row.last_used_ns)
                .unwrap_or(0);
            stamped.push((key.value().to_vec(), last_used));
        }
        if stamped.len() <= self.row_budget {
            return Ok(());
        }
        stamped.sort_by_key(|(_, last_used)| *last_used);
        let excess = stamped.len() - self.row_budget;
        for (key, _) in stamped.into_iter().take(excess) {
            table.remove(key.as_slice()).map_err(storage)?;
        }
        debug!(evicted = excess, "promotion store eviction");
        Ok(())
    }
}

/// Row layout: `xpath_len u16 LE | xpath | strategy u8 | success u32 LE |
/// failure u32 LE | demoted u8 | last_used_ns u64 LE`.
fn encode_row(row: &Promotion) -> Vec<u8> {
    let xpath = row.xpath.as_bytes();
    let mut out = Vec::with_capacity(2 + xpath.len() + 1 + 4 + 4 + 1 + 8);
    out.extend_from_slice(&(xpath.len() as u16).to_le_bytes());
    out.extend_from_slice(xpath);
    out.push(row.strategy.code());
    out.extend_from_slice(&row.success.to_le_bytes());
    out.extend_from_slice(&row.failure.to_le_bytes());
    out.push(row.demoted as u8);
    out.extend_from_slice(&row.last_used_ns.to_le_bytes());
    out
}

fn decode_row(raw: &[u8]) -> Option<Promotion> {
    if raw.len() < 2 {
        return None;
    }
    let xpath_len = u16::from_le_bytes([raw[0], raw[1]]) as usize;
    let expected = 2 + xpath_len + 1 + 4 + 4 + 1 + 8;
    if raw.len() != expected {
        return None;
    }
    let xpath = String::from_utf8(raw[2..2 + xpath_len].to_vec()).ok()?;
    let mut at = 2 + xpath_len;
    let strategy = Strategy::from_code(raw[at])?;
    at += 1;
    let success = u32::from_le_bytes(raw[at..at + 4].try_into().ok()?);
    at += 4;
    let failure = u32::from_le_bytes(raw[at..at + 4].try_into().ok()?);
    at += 4;
    let demoted = raw[at] != 0;
    at += 1;
    let last_used_ns = u64::from_le_bytes(raw[at..at + 8].try_into().ok()?);
    Some(Promotion {
        xpath,
        strategy,
        success,
        failure,
        demoted,
        last_used_ns,
    })
}

fn hex_key(key: &PromotionKey) -> String {
    format!(
        "{}/{}/{}",
        key.page_signature, key.frame_hash, key.label_key
    )
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
