//! Key/Config Registry
//!
//! Versioned verification keys, authorized public keys and payment keys.
//! Each kind keeps its whole version history plus an activation pointer;
//! past versions are never overwritten.
//!
//! ```text
//! Verify(deposit)   v1 ── v2 ── v3*        (* = active)
//! AuthPubKey        v1*
//! PaymentKey        (not configured)
//! ```

use core::fmt;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use log::info;
use mix_privacy::OperationKind;

use crate::error::PoolError;
use crate::storage::{DbBatch, KeyVersionRecord, PoolStore};

/// What a key is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Verification key of the circuit for one proof kind
    Verify(OperationKind),
    /// JSON array of decimal public keys allowed to authorize spends
    AuthPubKey,
    /// Viewing key material handed to wallets
    PaymentKey,
}

impl KeyKind {
    const AUTH_PUB_KEY: u8 = 0x10;
    const PAYMENT_KEY: u8 = 0x11;

    /// Storage code
    pub fn code(&self) -> u8 {
        match self {
            KeyKind::Verify(kind) => kind.tag(),
            KeyKind::AuthPubKey => Self::AUTH_PUB_KEY,
            KeyKind::PaymentKey => Self::PAYMENT_KEY,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            Self::AUTH_PUB_KEY => Some(KeyKind::AuthPubKey),
            Self::PAYMENT_KEY => Some(KeyKind::PaymentKey),
            tag => OperationKind::try_from(i64::from(tag))
                .ok()
                .map(KeyKind::Verify),
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Verify(kind) => write!(f, "verify/{kind}"),
            KeyKind::AuthPubKey => f.write_str("authPubKey"),
            KeyKind::PaymentKey => f.write_str("paymentKey"),
        }
    }
}

/// One registered key version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBlob {
    pub kind: KeyKind,
    pub version: u64,
    pub data: Vec<u8>,
    /// blake3 of `data`
    pub fingerprint: [u8; 32],
}

impl KeyBlob {
    pub fn new(kind: KeyKind, version: u64, data: Vec<u8>) -> Self {
        let fingerprint = blake3::hash(&data).into();
        Self {
            kind,
            version,
            data,
            fingerprint,
        }
    }

    /// First 8 fingerprint bytes in hex, for log lines
    pub fn short_fingerprint(&self) -> String {
        hex::encode(&self.fingerprint[..8])
    }
}

#[derive(Default)]
struct KindHistory {
    versions: BTreeMap<u64, Arc<KeyBlob>>,
    active: Option<u64>,
}

impl KindHistory {
    fn active(&self) -> Option<&Arc<KeyBlob>> {
        self.active.and_then(|v| self.versions.get(&v))
    }
}

pub struct KeyRegistry {
    kinds: RwLock<HashMap<KeyKind, KindHistory>>,
    store: Arc<dyn PoolStore>,
}

impl KeyRegistry {
    /// Rebuild the registry from its persisted history
    pub fn open(store: Arc<dyn PoolStore>) -> Result<Self, PoolError> {
        let mut kinds: HashMap<KeyKind, KindHistory> = HashMap::new();

        for record in store.load_key_versions()? {
            let blob = KeyBlob::new(record.kind, record.version, record.data);
            kinds
                .entry(record.kind)
                .or_default()
                .versions
                .insert(record.version, Arc::new(blob));
        }

        for (kind, version) in store.load_active_keys()? {
            let history = kinds.entry(kind).or_default();
            if !history.versions.contains_key(&version) {
                return Err(PoolError::Storage(anyhow::anyhow!(
                    "active {kind} key points at unregistered version {version}"
                )));
            }
            history.active = Some(version);
        }

        let registry = Self {
            kinds: RwLock::new(kinds),
            store,
        };
        for blob in registry.active_keys() {
            info!(
                "Loaded {} key v{} ({})",
                blob.kind,
                blob.version,
                blob.short_fingerprint()
            );
        }
        Ok(registry)
    }

    /// Register `version` for `kind` and make it the active one.
    ///
    /// Older versions stay retrievable. Versions must strictly increase.
    pub fn set_active(
        &self,
        kind: KeyKind,
        version: u64,
        data: Vec<u8>,
    ) -> Result<Arc<KeyBlob>, PoolError> {
        let mut kinds = self.kinds.write().unwrap_or_else(PoisonError::into_inner);
        let history = kinds.entry(kind).or_default();

        if let Some(&latest) = history.versions.keys().next_back()
            && version <= latest
        {
            return Err(PoolError::StaleKeyVersion {
                kind,
                version,
                latest,
            });
        }

        let blob = Arc::new(KeyBlob::new(kind, version, data));
        self.store.apply_batch(DbBatch {
            key_versions: vec![KeyVersionRecord {
                kind,
                version,
                data: blob.data.clone(),
            }],
            key_active: vec![(kind, version)],
            ..Default::default()
        })?;

        history.versions.insert(version, blob.clone());
        history.active = Some(version);

        info!(
            "Activated {} key v{} ({})",
            kind,
            version,
            blob.short_fingerprint()
        );
        Ok(blob)
    }

    pub fn get_active(&self, kind: KeyKind) -> Result<Arc<KeyBlob>, PoolError> {
        let kinds = self.kinds.read().unwrap_or_else(PoisonError::into_inner);
        kinds
            .get(&kind)
            .and_then(KindHistory::active)
            .cloned()
            .ok_or(PoolError::NotConfigured(kind))
    }

    pub fn get_version(&self, kind: KeyKind, version: u64) -> Result<Arc<KeyBlob>, PoolError> {
        let kinds = self.kinds.read().unwrap_or_else(PoisonError::into_inner);
        kinds
            .get(&kind)
            .and_then(|h| h.versions.get(&version))
            .cloned()
            .ok_or_else(|| PoolError::NotFound(format!("{kind} key version {version}")))
    }

    /// Pick the key a proof is verified against.
    ///
    /// Without a pin this is the active version. A pin is honoured when it
    /// names the active version or one of the `grace` versions registered
    /// right before it. The returned blob is a snapshot: a later
    /// `set_active` does not affect it.
    pub fn resolve(
        &self,
        kind: KeyKind,
        pinned: Option<u64>,
        grace: u64,
    ) -> Result<Arc<KeyBlob>, PoolError> {
        let kinds = self.kinds.read().unwrap_or_else(PoisonError::into_inner);
        let history = kinds.get(&kind).ok_or(PoolError::NotConfigured(kind))?;
        let active = history.active().ok_or(PoolError::NotConfigured(kind))?;

        let Some(version) = pinned else {
            return Ok(active.clone());
        };
        if version == active.version {
            return Ok(active.clone());
        }

        let blob = history
            .versions
            .get(&version)
            .ok_or_else(|| PoolError::NotFound(format!("{kind} key version {version}")))?;

        let within_grace = history
            .versions
            .range(..active.version)
            .rev()
            .take(usize::try_from(grace).unwrap_or(usize::MAX))
            .any(|(&v, _)| v == version);

        if within_grace {
            Ok(blob.clone())
        } else {
            Err(PoolError::KeyVersionExpired {
                kind,
                version,
                active: active.version,
            })
        }
    }

    /// All registered versions of `kind`, oldest first
    pub fn versions(&self, kind: KeyKind) -> Vec<u64> {
        let kinds = self.kinds.read().unwrap_or_else(PoisonError::into_inner);
        kinds
            .get(&kind)
            .map(|h| h.versions.keys().copied().collect())
            .unwrap_or_default()
    }

    /// The active blob of every configured kind
    pub fn active_keys(&self) -> Vec<Arc<KeyBlob>> {
        let kinds = self.kinds.read().unwrap_or_else(PoisonError::into_inner);
        let mut active: Vec<_> = kinds.values().filter_map(|h| h.active().cloned()).collect();
        active.sort_by_key(|blob| blob.kind.code());
        active
    }
}
