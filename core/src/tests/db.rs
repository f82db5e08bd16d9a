use std::sync::Arc;
use tempfile::TempDir;

use mix_config::PoolConfig;
use mix_privacy::{FieldElement, NoteHash, Nullifier, OperationKind};

use super::fixtures::*;
use crate::pool::{Action, ShieldedPool};
use crate::registry::{KeyKind, KeyRegistry};
use crate::storage::{DbBatch, KeyVersionRecord, LeafRecord, PoolStore, RocksDbStore, SpendTag};
use crate::tree::CommitTree;

fn open(dir: &TempDir) -> Arc<RocksDbStore> {
    Arc::new(RocksDbStore::open(dir.path()).unwrap())
}

#[test]
fn empty_store_loads_nothing() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);

    assert!(db.load_leaves().unwrap().records.is_empty());
    assert!(db.load_spend_tags().unwrap().is_empty());
    assert!(db.load_key_versions().unwrap().is_empty());
    assert!(db.load_active_keys().unwrap().is_empty());
    assert_eq!(db.leaf_count().unwrap(), 0);
}

#[test]
fn batch_roundtrip() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);

    let leaf = |index: u64| LeafRecord {
        index,
        note_hash: NoteHash::from(index + 100),
        root: mix_privacy::TreeRoot(FieldElement::from(index + 200)),
    };
    let tag = SpendTag::Nullifier(Nullifier(FieldElement::from(9u64)));
    let kind = KeyKind::Verify(OperationKind::TransferInput);

    db.apply_batch(DbBatch {
        leaves: vec![leaf(0), leaf(1), leaf(256)],
        spend_tags: vec![tag],
        key_versions: vec![KeyVersionRecord {
            kind,
            version: 3,
            data: b"vk".to_vec(),
        }],
        key_active: vec![(kind, 3)],
    })
    .unwrap();

    // big-endian keys keep leaves in index order
    assert_eq!(db.load_leaves().unwrap().records, vec![leaf(0), leaf(1), leaf(256)]);
    assert_eq!(db.leaf_count().unwrap(), 257);
    assert_eq!(db.load_spend_tags().unwrap(), vec![tag]);
    assert_eq!(db.load_key_versions().unwrap()[0].data, b"vk");
    assert_eq!(db.load_active_keys().unwrap(), vec![(kind, 3)]);
}

#[test]
fn tree_survives_restart() {
    let dir = TempDir::new().unwrap();

    let history = {
        let tree = CommitTree::open(open(&dir)).unwrap();
        for i in 0..12u64 {
            tree.append_leaf(NoteHash::from(i * 3)).unwrap();
        }
        tree.root_history()
    };

    let tree = CommitTree::open(open(&dir)).unwrap();
    assert!(!tree.is_halted());
    assert_eq!(tree.root_history(), history);
    assert_eq!(tree.append_leaf(NoteHash::from(99u64)).unwrap().0, 12);
}

#[test]
fn unreadable_leaf_opens_halted_on_prefix() {
    let dir = TempDir::new().unwrap();

    let history = {
        let tree = CommitTree::open(open(&dir)).unwrap();
        for i in 1..=3u64 {
            tree.append_leaf(NoteHash::from(i)).unwrap();
        }
        tree.root_history()
    };

    {
        let raw = rocksdb::DB::open_cf(
            &rocksdb::Options::default(),
            dir.path(),
            ["commit_leaves", "spend_tags", "key_versions", "key_active"],
        )
        .unwrap();
        let cf = raw.cf_handle("commit_leaves").unwrap();
        raw.put_cf(cf, 1u64.to_be_bytes(), [0u8; 40]).unwrap();
    }

    let store = open(&dir);
    let log = store.load_leaves().unwrap();
    assert_eq!(log.records.len(), 1);
    assert!(log.unreadable.is_some());

    let tree = CommitTree::open(store.clone()).unwrap();
    assert!(tree.is_halted());
    assert!(tree.halt_reason().unwrap().contains("unreadable"));
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.root_at(0).unwrap(), history[0]);
    assert!(matches!(
        tree.append_leaf(NoteHash::from(9u64)),
        Err(crate::error::PoolError::TreeCorruption(_))
    ));
    assert!(matches!(tree.recover(), Err(crate::error::PoolError::TreeCorruption(_))));

    // the pool still opens, refusing commits
    let pool = ShieldedPool::open(
        store,
        Arc::new(RecordingVerifier::default()),
        PoolConfig::default(),
    )
    .unwrap();
    assert!(pool.tree().is_halted());
}

#[test]
fn registry_survives_restart() {
    let dir = TempDir::new().unwrap();
    let kind = KeyKind::Verify(OperationKind::Authorize);

    {
        let registry = KeyRegistry::open(open(&dir)).unwrap();
        registry.set_active(kind, 1, b"first".to_vec()).unwrap();
        registry.set_active(kind, 2, b"second".to_vec()).unwrap();
        registry.set_active(KeyKind::PaymentKey, 1, b"view".to_vec()).unwrap();
    }

    let registry = KeyRegistry::open(open(&dir)).unwrap();
    assert_eq!(registry.versions(kind), vec![1, 2]);
    assert_eq!(registry.get_active(kind).unwrap().data, b"second");
    assert_eq!(registry.get_version(kind, 1).unwrap().data, b"first");
    assert_eq!(registry.get_active(KeyKind::PaymentKey).unwrap().data, b"view");
}

#[test]
fn pool_survives_restart() {
    let dir = TempDir::new().unwrap();

    let root = {
        let store = open(&dir);
        let pool = ShieldedPool::open(
            store,
            Arc::new(RecordingVerifier::default()),
            PoolConfig::default(),
        )
        .unwrap();
        configure_keys(&pool);

        let root = deposit(&pool, 1, 50);
        pool.process(&record(
            Action::Withdraw,
            50,
            vec![envelope(withdraw_input(root, 31, 50))],
        ))
        .unwrap();
        root
    };

    let pool = ShieldedPool::open(
        open(&dir),
        Arc::new(RecordingVerifier::default()),
        PoolConfig::default(),
    )
    .unwrap();
    assert_eq!(pool.tree().current_root(), root);
    assert!(pool.is_spent(&SpendTag::Nullifier(Nullifier(FieldElement::from(31u64)))));

    let replay = pool
        .process(&record(
            Action::Withdraw,
            50,
            vec![envelope(withdraw_input(root, 31, 50))],
        ))
        .unwrap_err();
    assert!(matches!(
        replay.root_cause(),
        crate::error::PoolError::NullifierSpent(_)
    ));
}
