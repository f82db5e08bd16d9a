//! Commitment Tree Bookkeeper
//!
//! Process-wide append-only tree of accepted note hashes plus the full root
//! history, so proofs built against an older root stay verifiable.
//!
//! ```text
//!   leaves:  N0    N1    N2    ...
//!   roots:   R0    R1    R2    ...     R(i) covers leaves[0..=i]
//! ```
//!
//! Appends are single-writer and persisted before they become visible.
//! Readers always see a whole append or none of it.
//!
//! Uses frontier-based appends: only the rightmost node per level is kept,
//! so an append costs O(depth) hashes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use log::{debug, error, info};
use mix_privacy::{MerkleHasher, NoteHash, TREE_CAPACITY, TreeFrontier, TreeRoot};

use crate::error::PoolError;
use crate::storage::{DbBatch, LeafLog, LeafRecord, PoolStore};

#[derive(Clone, Default)]
struct TreeState {
    leaves: Vec<NoteHash>,
    roots: Vec<TreeRoot>,
    /// root -> latest position that produced it
    root_index: HashMap<TreeRoot, u64>,
    frontier: TreeFrontier,
}

impl TreeState {
    fn push(&mut self, record: &LeafRecord) {
        self.leaves.push(record.note_hash);
        self.roots.push(record.root);
        self.root_index.insert(record.root, record.index);
    }

    fn len(&self) -> u64 {
        self.leaves.len() as u64
    }

    /// Replay a persisted log. Stops at the first inconsistent or unreadable
    /// record and returns the consistent prefix along with the reason.
    fn replay(hasher: &MerkleHasher, log: &LeafLog) -> (Self, Option<String>) {
        let mut state = Self::default();

        for (expected, record) in (0u64..).zip(&log.records) {
            if record.index != expected {
                let reason = format!(
                    "leaf index gap: expected {expected}, found {}",
                    record.index
                );
                return (state, Some(reason));
            }
            if expected >= TREE_CAPACITY {
                return (state, Some(format!("leaf {expected} exceeds tree capacity")));
            }

            let mut frontier = state.frontier.clone();
            let root = frontier.insert(&record.note_hash, hasher);
            if root != record.root {
                let reason = format!(
                    "root mismatch at leaf {expected}: persisted {}, recomputed {root}",
                    record.root
                );
                return (state, Some(reason));
            }

            state.frontier = frontier;
            state.push(record);
        }

        (state, log.unreadable.clone())
    }
}

pub struct CommitTree {
    state: RwLock<TreeState>,
    /// Set once corruption is detected; cleared only by `recover`
    halted: RwLock<Option<String>>,
    /// Serializes appends and recovery
    writer: Mutex<()>,
    hasher: &'static MerkleHasher,
    store: Arc<dyn PoolStore>,
}

impl CommitTree {
    /// Rebuild the tree from the persisted leaf log.
    ///
    /// An inconsistent log does not fail the open: the tree comes up halted
    /// on its longest consistent prefix so reads keep working.
    pub fn open(store: Arc<dyn PoolStore>) -> Result<Self, PoolError> {
        let hasher = MerkleHasher::shared();
        let log = store.load_leaves()?;
        let (state, corruption) = TreeState::replay(hasher, &log);

        match &corruption {
            Some(reason) => error!("Commitment tree halted on open: {reason}"),
            None => info!(
                "Loaded commitment tree: {} leaves, root {}",
                state.len(),
                state.roots.last().copied().unwrap_or(hasher.empty_tree_root())
            ),
        }

        Ok(Self {
            state: RwLock::new(state),
            halted: RwLock::new(corruption),
            writer: Mutex::new(()),
            hasher,
            store,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, TreeState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn halt(&self, reason: String) -> PoolError {
        error!("Commitment tree halted: {reason}");
        *self.halted.write().unwrap_or_else(PoisonError::into_inner) = Some(reason.clone());
        PoolError::TreeCorruption(reason)
    }

    /// Why appends are refused, if they are
    pub fn halt_reason(&self) -> Option<String> {
        self.halted
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_halted(&self) -> bool {
        self.halt_reason().is_some()
    }

    /// Append one note hash, returning its index and the new root
    pub fn append_leaf(&self, note_hash: NoteHash) -> Result<(u64, TreeRoot), PoolError> {
        let appended = self.append_leaves(&[note_hash], DbBatch::default())?;
        appended
            .first()
            .copied()
            .ok_or_else(|| PoolError::TreeCorruption("append produced no leaf".into()))
    }

    /// Append `note_hashes` in order and persist them together with `batch`.
    ///
    /// Either every leaf and every write in `batch` lands, or none does. An
    /// empty `note_hashes` still commits `batch` under the writer lock, and
    /// is refused like any append while the tree is halted.
    pub fn append_leaves(
        &self,
        note_hashes: &[NoteHash],
        mut batch: DbBatch,
    ) -> Result<Vec<(u64, TreeRoot)>, PoolError> {
        let _writer = self.lock_writer();

        if let Some(reason) = self.halt_reason() {
            return Err(PoolError::TreeCorruption(reason));
        }

        let (start, mut frontier) = {
            let state = self.read();
            let consistent = state.roots.len() == state.leaves.len()
                && state.frontier.next_position() == state.len();
            if !consistent {
                drop(state);
                return Err(self.halt(format!(
                    "leaf/root sequence out of step before append ({} leaves)",
                    self.len()
                )));
            }
            (state.len(), state.frontier.clone())
        };

        if start + note_hashes.len() as u64 > TREE_CAPACITY {
            return Err(PoolError::TreeFull);
        }

        let records: Vec<LeafRecord> = (start..)
            .zip(note_hashes)
            .map(|(index, note_hash)| LeafRecord {
                index,
                note_hash: *note_hash,
                root: frontier.insert(note_hash, self.hasher),
            })
            .collect();

        batch.leaves.extend_from_slice(&records);
        if !batch.is_empty() {
            self.store.apply_batch(batch)?;
        }

        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            for record in &records {
                state.push(record);
            }
            state.frontier = frontier;
        }

        for record in &records {
            debug!("Appended leaf {} -> root {}", record.index, record.root);
        }
        Ok(records.iter().map(|r| (r.index, r.root)).collect())
    }

    /// Number of leaves
    pub fn len(&self) -> u64 {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Root after the latest append, or the empty-tree root
    pub fn current_root(&self) -> TreeRoot {
        self.read()
            .roots
            .last()
            .copied()
            .unwrap_or_else(|| self.hasher.empty_tree_root())
    }

    /// Root recorded right after leaf `index` was appended
    pub fn root_at(&self, index: u64) -> Result<TreeRoot, PoolError> {
        let state = self.read();
        usize::try_from(index)
            .ok()
            .and_then(|i| state.roots.get(i).copied())
            .ok_or_else(|| PoolError::NotFound(format!("tree root at position {index}")))
    }

    pub fn leaf_at(&self, index: u64) -> Result<NoteHash, PoolError> {
        let state = self.read();
        usize::try_from(index)
            .ok()
            .and_then(|i| state.leaves.get(i).copied())
            .ok_or_else(|| PoolError::NotFound(format!("leaf at position {index}")))
    }

    /// Snapshot of the full root history
    pub fn root_history(&self) -> Vec<TreeRoot> {
        self.read().roots.clone()
    }

    /// Whether `root` may anchor a spend.
    ///
    /// The empty-tree root never does. With a `window`, only the `window`
    /// most recent roots are accepted.
    pub fn is_known_root(&self, root: &TreeRoot, window: Option<u64>) -> bool {
        let state = self.read();
        let Some(&position) = state.root_index.get(root) else {
            return false;
        };
        match window {
            Some(window) => state.len().saturating_sub(window) <= position,
            None => true,
        }
    }

    /// Rebuild from the persisted log and lift the halt if it is consistent
    pub fn recover(&self) -> Result<(), PoolError> {
        let _writer = self.lock_writer();

        let log = self.store.load_leaves()?;
        let (state, corruption) = TreeState::replay(self.hasher, &log);
        if let Some(reason) = corruption {
            return Err(self.halt(reason));
        }

        let leaves = state.len();
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
        *self.halted.write().unwrap_or_else(PoisonError::into_inner) = None;

        info!("Commitment tree recovered: {leaves} leaves, root {}", self.current_root());
        Ok(())
    }
}
