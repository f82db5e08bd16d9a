//! Shielded Pool
//!
//! Entry point for the host executor. An [`OperationRecord`] carries one or
//! more proofs; the pool decodes each public input, hands it to the external
//! [`ProofVerifier`], runs the checks that live outside the proof, and then
//! commits the result in one batch.
//!
//! ```text
//! OperationRecord
//!   │
//!   ├─ per proof: decode ─▶ kind allowed? ─▶ resolve verify key ─▶ verifier
//!   │
//!   ├─ roots known, nullifiers unspent, authorizations present
//!   ├─ balance: deposit/withdraw  amount·G = Σ amountᵢ·G
//!   │           transfer          Σ in = Σ out + fee·G
//!   │
//!   └─ commit: new leaves + spend tags, atomically
//! ```

use core::fmt;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info, warn};
use mix_config::PoolConfig;
use mix_privacy::{
    AuthorizeHash, CurvePoint, FieldElement, NoteHash, Nullifier, OperationKind, PublicInput,
    Scalar, TreeRoot, check_sum_equal, decode_public_input, mul_base_g,
};
use serde::{Deserialize, Serialize};

use crate::error::PoolError;
use crate::registry::{KeyBlob, KeyKind, KeyRegistry};
use crate::storage::{DbBatch, PoolStore, SpendTag};
use crate::tree::CommitTree;

/// What an operation does to the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Deposit,
    Withdraw,
    Transfer,
    Authorize,
}

impl Action {
    /// Proof kinds an operation of this action may carry
    pub fn allows(&self, kind: OperationKind) -> bool {
        matches!(
            (self, kind),
            (Action::Deposit, OperationKind::Deposit)
                | (Action::Withdraw, OperationKind::Withdraw)
                | (
                    Action::Transfer,
                    OperationKind::TransferInput | OperationKind::TransferOutput
                )
                | (Action::Authorize, OperationKind::Authorize)
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Deposit => "deposit",
            Action::Withdraw => "withdraw",
            Action::Transfer => "transfer",
            Action::Authorize => "authorize",
        })
    }
}

/// One proof and the public input it was generated for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofEnvelope {
    /// Kind tag: camelCase name or numeric tag
    pub kind: String,
    /// hex(JSON) public input
    pub public_input: String,
    #[serde(with = "hex::serde")]
    pub proof: Vec<u8>,
    /// Verify key version the proof was built for; the active one if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_version: Option<u64>,
}

/// An operation as dispatched by the host executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    pub action: Action,
    /// Public deposit/withdraw total, or the transfer fee
    #[serde(default)]
    pub amount: u64,
    pub proofs: Vec<ProofEnvelope>,
}

/// External SNARK verifier
pub trait ProofVerifier: Send + Sync {
    /// `Ok(false)` rejects the proof; `Err` means verification could not run
    fn verify(&self, key: &KeyBlob, input: &PublicInput, proof: &[u8]) -> anyhow::Result<bool>;
}

/// Accepted operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub action: Action,
    /// Indices of the leaves this operation appended
    pub leaf_indices: Vec<u64>,
    pub new_root: TreeRoot,
}

/// Wire result returned to the host executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Decimal root after the operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_root: Option<String>,
}

impl From<Result<Receipt, PoolError>> for Outcome {
    fn from(result: Result<Receipt, PoolError>) -> Self {
        match result {
            Ok(receipt) => Outcome {
                accepted: true,
                error: None,
                new_root: Some(receipt.new_root.to_string()),
            },
            Err(e) => Outcome {
                accepted: false,
                error: Some(e.to_string()),
                new_root: None,
            },
        }
    }
}

/// Changes an operation will commit once every check has passed
#[derive(Default)]
struct Staged {
    notes: Vec<NoteHash>,
    tags: Vec<SpendTag>,
    inputs: Vec<CurvePoint>,
    outputs: Vec<CurvePoint>,
}

impl Staged {
    fn has_tag(&self, tag: &SpendTag) -> bool {
        self.tags.contains(tag)
    }
}

pub struct ShieldedPool {
    tree: CommitTree,
    registry: KeyRegistry,
    verifier: Arc<dyn ProofVerifier>,
    /// Recorded spend tags; held across check-then-commit (lock order:
    /// spent, then the tree writer)
    spent: Mutex<HashSet<SpendTag>>,
    policy: PoolConfig,
}

impl ShieldedPool {
    pub fn open(
        store: Arc<dyn PoolStore>,
        verifier: Arc<dyn ProofVerifier>,
        policy: PoolConfig,
    ) -> Result<Self, PoolError> {
        let tree = CommitTree::open(store.clone())?;
        let registry = KeyRegistry::open(store.clone())?;
        let spent: HashSet<SpendTag> = store.load_spend_tags()?.into_iter().collect();

        info!(
            "Shielded pool ready: {} leaves, {} spend tags, {} active keys",
            tree.len(),
            spent.len(),
            registry.active_keys().len()
        );

        Ok(Self {
            tree,
            registry,
            verifier,
            spent: Mutex::new(spent),
            policy,
        })
    }

    pub fn tree(&self) -> &CommitTree {
        &self.tree
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &PoolConfig {
        &self.policy
    }

    /// Governance entry point; the caller is trusted
    pub fn set_active_key(
        &self,
        kind: KeyKind,
        version: u64,
        data: Vec<u8>,
    ) -> Result<Arc<KeyBlob>, PoolError> {
        self.registry.set_active(kind, version, data)
    }

    pub fn is_spent(&self, tag: &SpendTag) -> bool {
        self.spent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(tag)
    }

    /// Process a record and report the wire outcome
    pub fn execute(&self, record: &OperationRecord) -> Outcome {
        let result = self.process(record);
        match &result {
            Ok(receipt) => info!(
                "Accepted {} operation: {} new leaves, root {}",
                receipt.action,
                receipt.leaf_indices.len(),
                receipt.new_root
            ),
            Err(e) => warn!("Rejected {} operation: {}", record.action, e),
        }
        Outcome::from(result)
    }

    /// Validate and commit one operation. Nothing is written unless every
    /// check passes.
    pub fn process(&self, record: &OperationRecord) -> Result<Receipt, PoolError> {
        let count = record.proofs.len();
        if count == 0 {
            return Err(PoolError::EmptyOperation);
        }
        if count > self.policy.max_proofs_per_operation {
            return Err(PoolError::TooManyProofs {
                count,
                max: self.policy.max_proofs_per_operation,
            });
        }
        if record.action == Action::Transfer && record.amount < self.policy.min_transfer_fee {
            return Err(PoolError::FeeTooLow {
                fee: record.amount,
                min: self.policy.min_transfer_fee,
            });
        }

        let inputs = record
            .proofs
            .iter()
            .enumerate()
            .map(|(index, envelope)| {
                self.verify_envelope(record.action, envelope)
                    .map_err(|e| e.in_envelope(index, &envelope.kind))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut spent = self.spent.lock().unwrap_or_else(PoisonError::into_inner);

        let mut staged = Staged::default();
        let mut authorized_keys = None;
        for (index, input) in inputs.iter().enumerate() {
            self.stage_input(input, &spent, &mut staged, &mut authorized_keys)
                .map_err(|e| e.in_envelope(index, input.kind().as_str()))?;
        }

        self.check_balance(record, &staged)?;

        let appended = self.tree.append_leaves(
            &staged.notes,
            DbBatch {
                spend_tags: staged.tags.clone(),
                ..Default::default()
            },
        )?;
        spent.extend(staged.tags);

        let new_root = match appended.last() {
            Some(&(_, root)) => root,
            None => self.tree.current_root(),
        };
        Ok(Receipt {
            action: record.action,
            leaf_indices: appended.iter().map(|&(index, _)| index).collect(),
            new_root,
        })
    }

    fn verify_envelope(
        &self,
        action: Action,
        envelope: &ProofEnvelope,
    ) -> Result<PublicInput, PoolError> {
        let input = decode_public_input(&envelope.kind, &envelope.public_input)?;
        let kind = input.kind();
        if !action.allows(kind) {
            return Err(PoolError::KindNotAllowed { action, kind });
        }

        let key = self.registry.resolve(
            KeyKind::Verify(kind),
            envelope.key_version,
            self.policy.key_grace_versions,
        )?;

        match self.verifier.verify(&key, &input, &envelope.proof) {
            Ok(true) => {
                debug!(
                    "Verified {} proof against key v{} ({})",
                    kind,
                    key.version,
                    key.short_fingerprint()
                );
                Ok(input)
            }
            Ok(false) => Err(PoolError::ProofRejected),
            Err(e) => Err(PoolError::Verifier(format!("{e:#}"))),
        }
    }

    fn stage_input(
        &self,
        input: &PublicInput,
        spent: &HashSet<SpendTag>,
        staged: &mut Staged,
        authorized_keys: &mut Option<HashSet<FieldElement>>,
    ) -> Result<(), PoolError> {
        match input {
            PublicInput::Deposit(deposit) => {
                staged.notes.push(deposit.note_hash()?);
                staged.inputs.push(*deposit.amount_commitment()?.point());
            }
            PublicInput::Withdraw(withdraw) => {
                self.check_root(withdraw.tree_root()?)?;
                self.stage_spend(
                    spent,
                    staged,
                    withdraw.nullifier()?,
                    withdraw.authorize_spend_hash()?,
                )?;
                withdraw.note_hash()?;
                staged.inputs.push(*withdraw.amount_commitment()?.point());
            }
            PublicInput::TransferInput(transfer) => {
                self.check_root(transfer.tree_root()?)?;
                self.stage_spend(
                    spent,
                    staged,
                    transfer.nullifier()?,
                    transfer.authorize_spend_hash()?,
                )?;
                transfer.note_hash()?;
                staged.inputs.push(*transfer.shield_amount()?.point());
            }
            PublicInput::TransferOutput(output) => {
                staged.notes.push(output.note_hash()?);
                staged.outputs.push(*output.shield_amount()?.point());
            }
            PublicInput::Authorize(authorize) => {
                self.check_root(authorize.tree_root()?)?;
                authorize.note_hash()?;

                let pub_key = authorize.authorize_pub_key()?;
                if authorized_keys.is_none() {
                    *authorized_keys = Some(self.authorized_keys()?);
                }
                if !authorized_keys
                    .as_ref()
                    .is_some_and(|keys| keys.contains(&pub_key))
                {
                    return Err(PoolError::UnauthorizedKey(pub_key));
                }

                let authorize_hash = authorize.authorize_hash()?;
                let spend_hash = authorize.authorize_spend_hash()?;
                // a zero spend hash authorizes nothing, so it leaves no tag
                let spend_tag = spend_hash
                    .is_required()
                    .then_some((SpendTag::AuthorizeSpend(spend_hash), spend_hash));
                for (tag, hash) in
                    std::iter::once((SpendTag::Authorize(authorize_hash), authorize_hash)).chain(spend_tag)
                {
                    if spent.contains(&tag) || staged.has_tag(&tag) {
                        return Err(PoolError::DuplicateAuthorization(hash));
                    }
                    staged.tags.push(tag);
                }
            }
        }
        Ok(())
    }

    fn check_root(&self, root: TreeRoot) -> Result<(), PoolError> {
        if self.tree.is_known_root(&root, self.policy.root_window) {
            Ok(())
        } else {
            Err(PoolError::UnknownRoot(root))
        }
    }

    fn stage_spend(
        &self,
        spent: &HashSet<SpendTag>,
        staged: &mut Staged,
        nullifier: Nullifier,
        authorize_spend: AuthorizeHash,
    ) -> Result<(), PoolError> {
        let tag = SpendTag::Nullifier(nullifier);
        if spent.contains(&tag) || staged.has_tag(&tag) {
            return Err(PoolError::NullifierSpent(nullifier));
        }
        if authorize_spend.is_required()
            && !spent.contains(&SpendTag::AuthorizeSpend(authorize_spend))
        {
            return Err(PoolError::AuthorizationMissing(authorize_spend));
        }
        staged.tags.push(tag);
        Ok(())
    }

    /// Active AuthPubKey blob: a JSON array of decimal public keys
    fn authorized_keys(&self) -> Result<HashSet<FieldElement>, PoolError> {
        let blob = self.registry.get_active(KeyKind::AuthPubKey)?;
        let invalid = |reason: String| PoolError::InvalidKeyBlob {
            kind: KeyKind::AuthPubKey,
            reason,
        };

        let keys: Vec<String> =
            serde_json::from_slice(&blob.data).map_err(|e| invalid(e.to_string()))?;
        keys.iter()
            .map(|key| {
                FieldElement::from_decimal("authorizePubKey", key)
                    .map_err(|e| invalid(e.to_string()))
            })
            .collect()
    }

    fn check_balance(&self, record: &OperationRecord, staged: &Staged) -> Result<(), PoolError> {
        let balanced = match record.action {
            Action::Deposit | Action::Withdraw => {
                let total = mul_base_g(&Scalar::from_value(record.amount)?);
                let mut points = Vec::with_capacity(staged.inputs.len() + 1);
                points.push(total);
                points.extend_from_slice(&staged.inputs);
                check_sum_equal(&points)
            }
            Action::Transfer => {
                let total_in =
                    CurvePoint::sum(&staged.inputs).filter(|_| !staged.outputs.is_empty());
                let Some(total_in) = total_in else {
                    return Err(PoolError::IncompleteTransfer {
                        inputs: staged.inputs.len(),
                        outputs: staged.outputs.len(),
                    });
                };
                let mut points = Vec::with_capacity(staged.outputs.len() + 2);
                points.push(total_in);
                points.extend_from_slice(&staged.outputs);
                if record.amount > 0 {
                    points.push(mul_base_g(&Scalar::from_value(record.amount)?));
                }
                check_sum_equal(&points)
            }
            Action::Authorize => true,
        };

        if balanced {
            Ok(())
        } else {
            Err(PoolError::BalanceMismatch(record.action))
        }
    }
}
