//! Pool Errors
//!
//! Every rejection the pool can report. Errors raised while handling a single
//! proof are wrapped in [`PoolError::Envelope`] so the caller can tell which
//! proof and which field caused them.

use mix_privacy::{
    AuthorizeHash, CodecError, CurveError, FieldElement, Nullifier, OperationKind, TreeRoot,
};
use thiserror::Error;

use crate::pool::Action;
use crate::registry::KeyKind;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Curve(#[from] CurveError),

    #[error("no {0} key configured")]
    NotConfigured(KeyKind),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{kind} key version {version} is not newer than version {latest}")]
    StaleKeyVersion {
        kind: KeyKind,
        version: u64,
        latest: u64,
    },

    #[error("{kind} key version {version} is no longer accepted (active version {active})")]
    KeyVersionExpired {
        kind: KeyKind,
        version: u64,
        active: u64,
    },

    #[error("{kind} key blob is invalid: {reason}")]
    InvalidKeyBlob { kind: KeyKind, reason: String },

    #[error("proof rejected by verifier")]
    ProofRejected,

    #[error("verifier failure: {0}")]
    Verifier(String),

    #[error("{kind} proof is not allowed in a {action} operation")]
    KindNotAllowed { action: Action, kind: OperationKind },

    #[error("tree root {0} is not a known anchor")]
    UnknownRoot(TreeRoot),

    #[error("nullifier {0} already spent")]
    NullifierSpent(Nullifier),

    #[error("authorization {0} already recorded")]
    DuplicateAuthorization(AuthorizeHash),

    #[error("authorize key {0} is not in the authorized key set")]
    UnauthorizedKey(FieldElement),

    #[error("spend authorization {0} was never granted")]
    AuthorizationMissing(AuthorizeHash),

    #[error("commitment balance mismatch in {0} operation")]
    BalanceMismatch(Action),

    #[error("transfer fee {fee} is below the minimum {min}")]
    FeeTooLow { fee: u64, min: u64 },

    #[error("transfer needs at least one input and one output (got {inputs} in, {outputs} out)")]
    IncompleteTransfer { inputs: usize, outputs: usize },

    #[error("operation carries no proofs")]
    EmptyOperation,

    #[error("operation carries {count} proofs, limit is {max}")]
    TooManyProofs { count: usize, max: usize },

    #[error("commitment tree is full")]
    TreeFull,

    #[error("commitment tree corrupted: {0}")]
    TreeCorruption(String),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),

    #[error("proof {index} ({kind}): {source}")]
    Envelope {
        index: usize,
        kind: String,
        #[source]
        source: Box<PoolError>,
    },
}

impl PoolError {
    /// Attribute this error to the proof at `index`
    pub fn in_envelope(self, index: usize, kind: &str) -> Self {
        PoolError::Envelope {
            index,
            kind: kind.to_string(),
            source: Box::new(self),
        }
    }

    /// The underlying error, looking through envelope attribution
    pub fn root_cause(&self) -> &PoolError {
        match self {
            PoolError::Envelope { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
