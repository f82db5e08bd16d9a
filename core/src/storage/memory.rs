use anyhow::Result;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use super::{DbBatch, KeyVersionRecord, LeafLog, LeafRecord, PoolStore, SpendTag};
use crate::registry::KeyKind;

/// In-process store for tests and embedded use. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    leaves: BTreeMap<u64, LeafRecord>,
    spend_tags: HashSet<SpendTag>,
    key_versions: HashMap<(KeyKind, u64), Vec<u8>>,
    key_active: HashMap<KeyKind, u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PoolStore for MemoryStore {
    fn apply_batch(&self, batch: DbBatch) -> Result<()> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);

        for leaf in batch.leaves {
            tables.leaves.insert(leaf.index, leaf);
        }
        tables.spend_tags.extend(batch.spend_tags);
        for record in batch.key_versions {
            tables
                .key_versions
                .insert((record.kind, record.version), record.data);
        }
        tables.key_active.extend(batch.key_active);
        Ok(())
    }

    fn load_leaves(&self) -> Result<LeafLog> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(LeafLog {
            records: tables.leaves.values().copied().collect(),
            unreadable: None,
        })
    }

    fn load_spend_tags(&self) -> Result<Vec<SpendTag>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.spend_tags.iter().copied().collect())
    }

    fn load_key_versions(&self) -> Result<Vec<KeyVersionRecord>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables
            .key_versions
            .iter()
            .map(|(&(kind, version), data)| KeyVersionRecord {
                kind,
                version,
                data: data.clone(),
            })
            .collect())
    }

    fn load_active_keys(&self) -> Result<Vec<(KeyKind, u64)>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.key_active.iter().map(|(&k, &v)| (k, v)).collect())
    }
}
