//! Pool Persistence
//!
//! Everything the pool must survive a restart with:
//!
//! ```text
//! commit_leaves  index(be u64)        -> noteHash || root
//! spend_tags     tag || value         -> ()
//! key_versions   kind || version      -> key blob
//! key_active     kind                 -> version
//! ```
//!
//! All four tables are append-only from the pool's point of view. Writes go
//! through [`DbBatch`] so one operation lands atomically.

pub mod db;
pub mod memory;

pub use db::RocksDbStore;
pub use memory::MemoryStore;

use anyhow::{Context, Result, bail};
use mix_privacy::{AuthorizeHash, NoteHash, Nullifier, TreeRoot};

use crate::registry::KeyKind;

/// decoupling pool logic from the db
pub trait PoolStore: Send + Sync {
    /// Atomically apply a batch of writes
    fn apply_batch(&self, batch: DbBatch) -> Result<()>;

    /// Persisted leaves ordered by index, up to the first unreadable record.
    ///
    /// Only I/O failures are errors; a record that does not decode ends the
    /// log and is reported in [`LeafLog::unreadable`].
    fn load_leaves(&self) -> Result<LeafLog>;

    /// Every recorded spend tag
    fn load_spend_tags(&self) -> Result<Vec<SpendTag>>;

    /// Every registered key version
    fn load_key_versions(&self) -> Result<Vec<KeyVersionRecord>>;

    /// Activation pointer per key kind
    fn load_active_keys(&self) -> Result<Vec<(KeyKind, u64)>>;
}

/// One appended leaf and the root it produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafRecord {
    pub index: u64,
    pub note_hash: NoteHash,
    pub root: TreeRoot,
}

impl LeafRecord {
    pub fn key(&self) -> [u8; 8] {
        self.index.to_be_bytes()
    }

    /// `noteHash || root`, both canonical little-endian
    pub fn value(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.note_hash.to_bytes());
        out[32..].copy_from_slice(&self.root.to_bytes());
        out
    }

    pub fn decode(key: &[u8], value: &[u8]) -> Result<Self> {
        let index = u64::from_be_bytes(key.try_into().context("invalid leaf key length")?);
        if value.len() != 64 {
            bail!("invalid leaf record length {} at index {}", value.len(), index);
        }
        let note_hash = NoteHash::from_canonical_bytes(&value[..32])
            .with_context(|| format!("non-canonical note hash at leaf {index}"))?;
        let root = TreeRoot::from_canonical_bytes(&value[32..])
            .with_context(|| format!("non-canonical root at leaf {index}"))?;
        Ok(Self {
            index,
            note_hash,
            root,
        })
    }
}

/// The leaf log as read back from a store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafLog {
    pub records: Vec<LeafRecord>,
    /// Why reading stopped before the end of the table
    pub unreadable: Option<String>,
}

impl LeafLog {
    /// Decode raw `(key, value)` pairs, stopping at the first bad one
    pub fn decode_from<K, V>(raw: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut log = Self::default();
        for (key, value) in raw {
            match LeafRecord::decode(key.as_ref(), value.as_ref()) {
                Ok(record) => log.records.push(record),
                Err(e) => {
                    log.unreadable = Some(format!("unreadable leaf record: {e:#}"));
                    break;
                }
            }
        }
        log
    }
}

/// A tag that may be recorded only once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpendTag {
    Nullifier(Nullifier),
    /// `authorizeHash` published by an authorize operation
    Authorize(AuthorizeHash),
    /// `authorizeSpendHash` granted by an authorize operation
    AuthorizeSpend(AuthorizeHash),
}

impl SpendTag {
    const NULLIFIER: u8 = 0;
    const AUTHORIZE: u8 = 1;
    const AUTHORIZE_SPEND: u8 = 2;

    pub fn key(&self) -> [u8; 33] {
        let (prefix, bytes) = match self {
            SpendTag::Nullifier(n) => (Self::NULLIFIER, n.to_bytes()),
            SpendTag::Authorize(h) => (Self::AUTHORIZE, h.to_bytes()),
            SpendTag::AuthorizeSpend(h) => (Self::AUTHORIZE_SPEND, h.to_bytes()),
        };
        let mut key = [0u8; 33];
        key[0] = prefix;
        key[1..].copy_from_slice(&bytes);
        key
    }

    pub fn decode(key: &[u8]) -> Result<Self> {
        let Some((&prefix, bytes)) = key.split_first() else {
            bail!("empty spend tag key");
        };
        Ok(match prefix {
            Self::NULLIFIER => {
                SpendTag::Nullifier(Nullifier::from_canonical_bytes(bytes).context("bad nullifier")?)
            }
            Self::AUTHORIZE => SpendTag::Authorize(
                AuthorizeHash::from_canonical_bytes(bytes).context("bad authorize hash")?,
            ),
            Self::AUTHORIZE_SPEND => SpendTag::AuthorizeSpend(
                AuthorizeHash::from_canonical_bytes(bytes).context("bad authorize spend hash")?,
            ),
            other => bail!("unknown spend tag prefix {other}"),
        })
    }
}

/// A persisted key version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVersionRecord {
    pub kind: KeyKind,
    pub version: u64,
    pub data: Vec<u8>,
}

impl KeyVersionRecord {
    pub fn key(&self) -> [u8; 9] {
        version_key(self.kind, self.version)
    }
}

pub(crate) fn version_key(kind: KeyKind, version: u64) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[0] = kind.code();
    key[1..].copy_from_slice(&version.to_be_bytes());
    key
}

pub(crate) fn decode_version_key(key: &[u8]) -> Result<(KeyKind, u64)> {
    if key.len() != 9 {
        bail!("invalid key version key length {}", key.len());
    }
    let kind = KeyKind::from_code(key[0]).with_context(|| format!("unknown key kind {}", key[0]))?;
    let version = u64::from_be_bytes(key[1..].try_into().context("invalid version bytes")?);
    Ok((kind, version))
}

/// Batch of database operations for atomic commit
#[derive(Debug, Default)]
pub struct DbBatch {
    pub leaves: Vec<LeafRecord>,
    pub spend_tags: Vec<SpendTag>,
    pub key_versions: Vec<KeyVersionRecord>,
    pub key_active: Vec<(KeyKind, u64)>,
}

impl DbBatch {
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
            && self.spend_tags.is_empty()
            && self.key_versions.is_empty()
            && self.key_active.is_empty()
    }
}
