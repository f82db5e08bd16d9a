use std::sync::Arc;
use std::thread;

use mix_config::PoolConfig;
use mix_privacy::{MerkleHasher, NoteHash};

use super::fixtures::*;
use crate::error::PoolError;
use crate::pool::Action;
use crate::storage::MemoryStore;
use crate::tree::CommitTree;

const WRITERS: u64 = 8;
const APPENDS_PER_WRITER: u64 = 40;

#[test]
fn concurrent_appends_are_gap_free() {
    let tree = Arc::new(CommitTree::open(Arc::new(MemoryStore::new())).unwrap());

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let tree = tree.clone();
            thread::spawn(move || {
                (0..APPENDS_PER_WRITER)
                    .map(|i| {
                        let note = NoteHash::from(writer * 1_000 + i);
                        tree.append_leaf(note).unwrap().0
                    })
                    .collect::<Vec<u64>>()
            })
        })
        .collect();

    let mut indices: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    indices.sort_unstable();

    let total = WRITERS * APPENDS_PER_WRITER;
    assert_eq!(indices, (0..total).collect::<Vec<_>>());
    assert_eq!(tree.len(), total);
    assert_eq!(tree.root_history().len() as u64, total);

    // the history matches a sequential replay of the leaves in index order
    let leaves: Vec<NoteHash> = (0..total).map(|i| tree.leaf_at(i).unwrap()).collect();
    assert_eq!(
        tree.root_history(),
        MerkleHasher::shared().compute_roots(&leaves)
    );
}

#[test]
fn readers_see_whole_appends() {
    let tree = Arc::new(CommitTree::open(Arc::new(MemoryStore::new())).unwrap());

    let writer = {
        let tree = tree.clone();
        thread::spawn(move || {
            for i in 0..200u64 {
                tree.append_leaf(NoteHash::from(i)).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let tree = tree.clone();
            thread::spawn(move || {
                let mut last_len = 0;
                for _ in 0..500 {
                    let history = tree.root_history();
                    let len = history.len() as u64;
                    assert!(len >= last_len, "history must only grow");
                    if let Some(latest) = history.last() {
                        assert_eq!(tree.root_at(len - 1).unwrap(), *latest);
                        assert!(tree.is_known_root(latest, None));
                    }
                    last_len = len;
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(tree.len(), 200);
}

#[test]
fn racing_spends_of_one_note() {
    let fx = fixture_with(PoolConfig::default());
    let root = deposit(&fx.pool, 1, 50);
    let pool = Arc::new(fx.pool);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            thread::spawn(move || {
                pool.process(&record(
                    Action::Withdraw,
                    50,
                    vec![envelope(withdraw_input(root, 4242, 50))],
                ))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 1, "exactly one spend of a nullifier may succeed");
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(err.root_cause(), PoolError::NullifierSpent(_)));
    }
}
