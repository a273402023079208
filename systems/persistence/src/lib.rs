#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Tamper-evident persistence of the visited-tile set.
//!
//! The set is stored as three string values in a [`KeyValueStore`]: the
//! encoded tiles, a salted digest, and the tile count at save time. Loads
//! verify the digest and count and erase the keys when either disagrees.
//! Saves remove the previous keys before writing fresh ones and are
//! serialised behind a single lock so concurrent flushes never interleave.

pub mod codec;
pub mod integrity;

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use thiserror::Error;
use tile_collector_core::{KeyValueStore, StoreError, WorldPoint};
use tracing::{debug, error, info, warn};

use crate::{
    codec::{decode_tiles, encode_tiles},
    integrity::{integrity_digest, verify_digest},
};

/// Key holding the encoded visited tiles.
pub const DATA_KEY: &str = "visitedTilesData";
/// Key holding the hex-encoded integrity digest.
pub const HASH_KEY: &str = "integrityHash";
/// Key holding the decimal tile count recorded at save time.
pub const COUNT_KEY: &str = "tileCount";

/// Errors raised while reading or writing persisted tiles.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PersistError {
    /// The underlying store rejected an operation.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The data read back after a save differs in length from what was written.
    #[error("write verification failed: wrote {expected} bytes, read back {found}")]
    WriteVerification {
        /// Byte length of the encoded data that was written.
        expected: usize,
        /// Byte length of the value read back, zero when absent.
        found: usize,
    },
}

/// Why persisted data was judged to have been tampered with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TamperReason {
    /// The stored digest does not match the re-encoded data.
    DigestMismatch,
    /// The stored count differs from the number of parsed tiles.
    CountMismatch {
        /// Count read from the store.
        stored: usize,
        /// Distinct tiles recovered from the data.
        parsed: usize,
    },
}

/// Result of loading the persisted visited set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing was stored.
    Empty,
    /// Data was stored without a digest and accepted as is.
    Unverified {
        /// Recovered tiles.
        tiles: HashSet<WorldPoint>,
        /// Malformed records that were dropped.
        skipped: usize,
    },
    /// Data passed digest and count verification.
    Verified {
        /// Recovered tiles.
        tiles: HashSet<WorldPoint>,
        /// Malformed records that were dropped.
        skipped: usize,
    },
    /// Data failed verification; the persisted keys have been erased.
    Tampered {
        /// Which check failed.
        reason: TamperReason,
    },
}

impl LoadOutcome {
    /// Tiles to restore, empty unless the data was accepted.
    #[must_use]
    pub fn into_tiles(self) -> HashSet<WorldPoint> {
        match self {
            Self::Unverified { tiles, .. } | Self::Verified { tiles, .. } => tiles,
            Self::Empty | Self::Tampered { .. } => HashSet::new(),
        }
    }
}

/// Result of a save request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The set was empty so nothing was written.
    Skipped,
    /// The set was written and verified.
    Written {
        /// Number of tiles persisted.
        tiles: usize,
    },
}

/// Lock-guarded owner of the persistence store.
#[derive(Debug, Default)]
pub struct Vault<S> {
    store: Mutex<S>,
}

impl<S: KeyValueStore> Vault<S> {
    /// Wraps `store` so that every write sequence runs under one lock.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    /// Reads and verifies the persisted visited set.
    ///
    /// A missing digest is accepted without verification. A digest or count
    /// mismatch erases all three keys and yields [`LoadOutcome::Tampered`].
    pub fn load(&self) -> Result<LoadOutcome, PersistError> {
        let mut store = self.lock();
        let Some(data) = non_empty(store.get(DATA_KEY)) else {
            debug!("no persisted tiles");
            return Ok(LoadOutcome::Empty);
        };

        let decoded = decode_tiles(&data);
        if decoded.skipped > 0 {
            warn!(skipped = decoded.skipped, "skipped malformed tile records");
        }

        let Some(stored_hash) = non_empty(store.get(HASH_KEY)) else {
            info!(
                tiles = decoded.tiles.len(),
                "loaded tiles without integrity digest"
            );
            return Ok(LoadOutcome::Unverified {
                tiles: decoded.tiles,
                skipped: decoded.skipped,
            });
        };

        let stored_count = store
            .get(COUNT_KEY)
            .and_then(|count| count.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let parsed = decoded.tiles.len();
        let canonical = encode_tiles(&decoded.tiles);

        let tampered = if !verify_digest(&canonical, &stored_hash, stored_count) {
            Some(TamperReason::DigestMismatch)
        } else if stored_count != parsed {
            Some(TamperReason::CountMismatch {
                stored: stored_count,
                parsed,
            })
        } else {
            None
        };

        if let Some(reason) = tampered {
            error!(?reason, "persisted tiles failed verification, discarding");
            erase_keys(&mut *store)?;
            return Ok(LoadOutcome::Tampered { reason });
        }

        info!(tiles = parsed, "loaded verified tiles");
        Ok(LoadOutcome::Verified {
            tiles: decoded.tiles,
            skipped: decoded.skipped,
        })
    }

    /// Replaces the persisted set with `tiles`.
    ///
    /// Prior keys are removed before the new values are written, then the data
    /// key is read back and its length compared with what was written.
    pub fn save(&self, tiles: &[WorldPoint]) -> Result<SaveOutcome, PersistError> {
        let unique: HashSet<WorldPoint> = tiles.iter().copied().collect();
        if unique.is_empty() {
            debug!("visited set empty, skipping save");
            return Ok(SaveOutcome::Skipped);
        }

        let data = encode_tiles(&unique);
        let count = unique.len();
        let digest = integrity_digest(&data, count);

        let mut store = self.lock();
        erase_keys(&mut *store)?;
        store.set(DATA_KEY, &data)?;
        store.set(HASH_KEY, &digest)?;
        store.set(COUNT_KEY, &count.to_string())?;

        let found = store.get(DATA_KEY).map_or(0, |value| value.len());
        if found != data.len() {
            error!(
                expected = data.len(),
                found, "persisted tile data does not match what was written"
            );
            return Err(PersistError::WriteVerification {
                expected: data.len(),
                found,
            });
        }

        info!(tiles = count, "saved visited tiles");
        Ok(SaveOutcome::Written { tiles: count })
    }

    /// Removes every persisted key.
    pub fn erase(&self) -> Result<(), PersistError> {
        let mut store = self.lock();
        erase_keys(&mut *store)?;
        info!("erased persisted tiles");
        Ok(())
    }

    /// Runs `f` with exclusive access to the underlying store.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn erase_keys<S: KeyValueStore>(store: &mut S) -> Result<(), StoreError> {
    store.unset(DATA_KEY)?;
    store.unset(HASH_KEY)?;
    store.unset(COUNT_KEY)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// In-memory store, useful for sessions that need no durability.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Reports whether the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let _ = self.values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn unset(&mut self, key: &str) -> Result<(), StoreError> {
        let _ = self.values.remove(key);
        Ok(())
    }
}
