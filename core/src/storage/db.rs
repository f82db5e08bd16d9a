use anyhow::{Context, Result};
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;

use super::{DbBatch, KeyVersionRecord, LeafLog, PoolStore, SpendTag, decode_version_key};
use crate::registry::KeyKind;

const CF_COMMIT_LEAVES: &str = "commit_leaves";
const CF_SPEND_TAGS: &str = "spend_tags";
const CF_KEY_VERSIONS: &str = "key_versions";
const CF_KEY_ACTIVE: &str = "key_active";

/// A thread-safe wrapper around RocksDB.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
}

impl RocksDbStore {
    /// Opens the database at the specified path, creating it if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = vec![
            ColumnFamilyDescriptor::new(CF_COMMIT_LEAVES, Options::default()),
            ColumnFamilyDescriptor::new(CF_SPEND_TAGS, Options::default()),
            ColumnFamilyDescriptor::new(CF_KEY_VERSIONS, Options::default()),
            ColumnFamilyDescriptor::new(CF_KEY_ACTIVE, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, families)
            .map_err(|e| anyhow::anyhow!("Failed to open RocksDB: {}", e))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Number of persisted leaves, without decoding them
    pub fn leaf_count(&self) -> Result<u64> {
        let cf = self
            .db
            .cf_handle(CF_COMMIT_LEAVES)
            .context("commit_leaves CF missing")?;

        let mut iter = self.db.iterator_cf(cf, IteratorMode::End);
        match iter.next() {
            Some(item) => {
                let (key, _) = item?;
                let last = u64::from_be_bytes(
                    key.as_ref().try_into().context("invalid leaf key length")?,
                );
                Ok(last + 1)
            }
            None => Ok(0),
        }
    }
}

impl PoolStore for RocksDbStore {
    /// Atomically apply a batch of operations
    fn apply_batch(&self, operations: DbBatch) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_leaves = self
            .db
            .cf_handle(CF_COMMIT_LEAVES)
            .context("commit_leaves CF missing")?;
        let cf_tags = self
            .db
            .cf_handle(CF_SPEND_TAGS)
            .context("spend_tags CF missing")?;
        let cf_versions = self
            .db
            .cf_handle(CF_KEY_VERSIONS)
            .context("key_versions CF missing")?;
        let cf_active = self
            .db
            .cf_handle(CF_KEY_ACTIVE)
            .context("key_active CF missing")?;

        for leaf in &operations.leaves {
            batch.put_cf(cf_leaves, leaf.key(), leaf.value());
        }

        for tag in &operations.spend_tags {
            batch.put_cf(cf_tags, tag.key(), b"");
        }

        for record in &operations.key_versions {
            batch.put_cf(cf_versions, record.key(), &record.data);
        }

        for (kind, version) in &operations.key_active {
            batch.put_cf(cf_active, [kind.code()], version.to_be_bytes());
        }

        self.db.write(batch).context("Failed to write pool batch")?;
        Ok(())
    }

    fn load_leaves(&self) -> Result<LeafLog> {
        let cf = self
            .db
            .cf_handle(CF_COMMIT_LEAVES)
            .context("commit_leaves CF missing")?;

        let raw = self
            .db
            .iterator_cf(cf, IteratorMode::Start)
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read commit_leaves")?;
        Ok(LeafLog::decode_from(raw))
    }

    fn load_spend_tags(&self) -> Result<Vec<SpendTag>> {
        let cf = self
            .db
            .cf_handle(CF_SPEND_TAGS)
            .context("spend_tags CF missing")?;

        let mut tags = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            tags.push(SpendTag::decode(&key)?);
        }
        Ok(tags)
    }

    fn load_key_versions(&self) -> Result<Vec<KeyVersionRecord>> {
        let cf = self
            .db
            .cf_handle(CF_KEY_VERSIONS)
            .context("key_versions CF missing")?;

        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            let (kind, version) = decode_version_key(&key)?;
            records.push(KeyVersionRecord {
                kind,
                version,
                data: value.to_vec(),
            });
        }
        Ok(records)
    }

    fn load_active_keys(&self) -> Result<Vec<(KeyKind, u64)>> {
        let cf = self
            .db
            .cf_handle(CF_KEY_ACTIVE)
            .context("key_active CF missing")?;

        let mut active = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            let code = *key.first().context("empty key_active key")?;
            let kind =
                KeyKind::from_code(code).with_context(|| format!("unknown key kind {code}"))?;
            let version = u64::from_be_bytes(
                value
                    .as_ref()
                    .try_into()
                    .context("invalid active version length")?,
            );
            active.push((kind, version));
        }
        Ok(active)
    }
}
