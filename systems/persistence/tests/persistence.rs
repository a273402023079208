use std::collections::HashSet;

use tile_collector_core::{KeyValueStore, StoreError, WorldPoint};
use tile_collector_system_persistence::{
    codec::encode_tiles, integrity::integrity_digest, LoadOutcome, MemoryStore, PersistError,
    SaveOutcome, TamperReason, Vault, COUNT_KEY, DATA_KEY, HASH_KEY,
};

fn sample_tiles() -> Vec<WorldPoint> {
    vec![
        WorldPoint::new(3200, 3200, 0),
        WorldPoint::new(3201, 3200, 0),
        WorldPoint::new(-14, 7, 0),
        WorldPoint::new(3200, 3200, 1),
        WorldPoint::new(2900, 3501, 3),
    ]
}

fn saved_vault() -> Vault<MemoryStore> {
    let vault = Vault::new(MemoryStore::new());
    let outcome = vault.save(&sample_tiles()).expect("save succeeds");
    assert_eq!(outcome, SaveOutcome::Written { tiles: 5 });
    vault
}

fn assert_keys_erased(vault: &Vault<MemoryStore>) {
    vault.with_store(|store| {
        assert_eq!(store.get(DATA_KEY), None);
        assert_eq!(store.get(HASH_KEY), None);
        assert_eq!(store.get(COUNT_KEY), None);
    });
}

#[test]
fn round_trip_restores_the_same_set() {
    let vault = saved_vault();

    let outcome = vault.load().expect("load succeeds");

    let expected: HashSet<WorldPoint> = sample_tiles().into_iter().collect();
    assert_eq!(
        outcome,
        LoadOutcome::Verified {
            tiles: expected,
            skipped: 0,
        }
    );
}

#[test]
fn saved_layout_uses_three_keys() {
    let vault = saved_vault();

    vault.with_store(|store| {
        let data = store.get(DATA_KEY).expect("data stored");
        assert_eq!(store.get(COUNT_KEY).as_deref(), Some("5"));
        assert_eq!(store.get(HASH_KEY), Some(integrity_digest(&data, 5)));
        assert_eq!(store.len(), 3);
    });
}

#[test]
fn flipping_one_character_discards_everything() {
    let vault = saved_vault();
    vault.with_store(|store| {
        let data = store.get(DATA_KEY).expect("data stored");
        let tampered = data.replacen("3201", "3209", 1);
        assert_ne!(tampered, data);
        store.set(DATA_KEY, &tampered).expect("memory store accepts writes");
    });

    let outcome = vault.load().expect("load succeeds");

    assert_eq!(
        outcome,
        LoadOutcome::Tampered {
            reason: TamperReason::DigestMismatch,
        }
    );
    assert!(outcome.into_tiles().is_empty());
    assert_keys_erased(&vault);
}

#[test]
fn count_mismatch_is_tampering() {
    let tiles = [WorldPoint::new(1, 1, 0), WorldPoint::new(2, 1, 0)];
    let data = encode_tiles(&tiles);
    let mut store = MemoryStore::new();
    store.set(DATA_KEY, &data).expect("memory store accepts writes");
    store
        .set(HASH_KEY, &integrity_digest(&data, 3))
        .expect("memory store accepts writes");
    store.set(COUNT_KEY, "3").expect("memory store accepts writes");
    let vault = Vault::new(store);

    let outcome = vault.load().expect("load succeeds");

    assert_eq!(
        outcome,
        LoadOutcome::Tampered {
            reason: TamperReason::CountMismatch {
                stored: 3,
                parsed: 2,
            },
        }
    );
    assert_keys_erased(&vault);
}

#[test]
fn data_without_digest_is_accepted_unverified() {
    let mut store = MemoryStore::new();
    store
        .set(DATA_KEY, "5,5,0;6,5,0;bogus")
        .expect("memory store accepts writes");
    let vault = Vault::new(store);

    let outcome = vault.load().expect("load succeeds");

    assert_eq!(
        outcome,
        LoadOutcome::Unverified {
            tiles: HashSet::from([WorldPoint::new(5, 5, 0), WorldPoint::new(6, 5, 0)]),
            skipped: 1,
        }
    );
}

#[test]
fn records_in_foreign_order_still_verify() {
    let tiles = [WorldPoint::new(9, 2, 1), WorldPoint::new(4, 8, 0)];
    let canonical = encode_tiles(&tiles);
    let mut store = MemoryStore::new();
    store
        .set(DATA_KEY, "9,2,1;4,8,0")
        .expect("memory store accepts writes");
    store
        .set(HASH_KEY, &integrity_digest(&canonical, 2))
        .expect("memory store accepts writes");
    store.set(COUNT_KEY, "2").expect("memory store accepts writes");
    let vault = Vault::new(store);

    let outcome = vault.load().expect("load succeeds");

    assert!(matches!(outcome, LoadOutcome::Verified { .. }));
    assert_eq!(outcome.into_tiles().len(), 2);
}

#[test]
fn nothing_stored_loads_empty() {
    let vault = Vault::new(MemoryStore::new());

    assert_eq!(vault.load(), Ok(LoadOutcome::Empty));
}

#[test]
fn empty_set_is_not_written() {
    let vault = saved_vault();

    assert_eq!(vault.save(&[]), Ok(SaveOutcome::Skipped));
    assert!(matches!(vault.load(), Ok(LoadOutcome::Verified { .. })));
}

#[test]
fn save_replaces_previous_contents() {
    let vault = saved_vault();

    let _ = vault
        .save(&[WorldPoint::new(1, 2, 0)])
        .expect("second save succeeds");

    assert_eq!(
        vault.load().map(LoadOutcome::into_tiles),
        Ok(HashSet::from([WorldPoint::new(1, 2, 0)]))
    );
}

#[test]
fn erase_removes_all_keys() {
    let vault = saved_vault();

    vault.erase().expect("erase succeeds");

    assert_keys_erased(&vault);
    assert_eq!(vault.load(), Ok(LoadOutcome::Empty));
}

#[derive(Default)]
struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Backend("disk full".to_owned()))
    }

    fn unset(&mut self, _key: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

#[test]
fn store_failure_is_reported_not_panicked() {
    let vault = Vault::new(FailingStore);

    let result = vault.save(&sample_tiles());

    assert_eq!(
        result,
        Err(PersistError::Store(StoreError::Backend("disk full".to_owned())))
    );
}

/// Store that silently truncates every value it is handed.
#[derive(Default)]
struct TruncatingStore {
    inner: MemoryStore,
}

impl KeyValueStore for TruncatingStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let cut = value.len().min(4);
        self.inner.set(key, &value[..cut])
    }

    fn unset(&mut self, key: &str) -> Result<(), StoreError> {
        self.inner.unset(key)
    }
}

#[test]
fn short_read_back_fails_write_verification() {
    let vault = Vault::new(TruncatingStore::default());
    let tiles = sample_tiles();
    let expected = encode_tiles(&tiles).len();

    let result = vault.save(&tiles);

    assert_eq!(
        result,
        Err(PersistError::WriteVerification { expected, found: 4 })
    );
}
