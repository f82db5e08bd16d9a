//! Builders shared by the pool scenarios

use std::sync::{Arc, Mutex};

use mix_config::PoolConfig;
use mix_privacy::{
    AuthorizePublicInput, Commitment, DepositPublicInput, DhSecretGroup, OperationKind,
    PublicInput, Scalar, TransferInputPublicInput, TransferOutputPublicInput, TreeRoot,
    WithdrawPublicInput,
};

use crate::pool::{Action, OperationRecord, ProofEnvelope, ProofVerifier, ShieldedPool};
use crate::registry::{KeyBlob, KeyKind};
use crate::storage::{MemoryStore, PoolStore};

/// Accepts proofs spelled `ok`, fails on `err`, rejects anything else.
/// Remembers which key version each call used.
#[derive(Default)]
pub struct RecordingVerifier {
    pub seen: Mutex<Vec<(KeyKind, u64)>>,
}

impl ProofVerifier for RecordingVerifier {
    fn verify(&self, key: &KeyBlob, _input: &PublicInput, proof: &[u8]) -> anyhow::Result<bool> {
        self.seen.lock().unwrap().push((key.kind, key.version));
        if proof == b"err" {
            anyhow::bail!("verifier backend unavailable");
        }
        Ok(proof == b"ok")
    }
}

pub const AUTHORIZED_KEY: &str = "777";

pub struct Fixture {
    pub pool: ShieldedPool,
    pub store: Arc<MemoryStore>,
    pub verifier: Arc<RecordingVerifier>,
}

/// Pool with version 1 of every key configured
pub fn fixture() -> Fixture {
    fixture_with(PoolConfig::default())
}

pub fn fixture_with(policy: PoolConfig) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let fixture = open_unconfigured(store, policy);
    configure_keys(&fixture.pool);
    fixture
}

pub fn open_unconfigured(store: Arc<MemoryStore>, policy: PoolConfig) -> Fixture {
    let verifier = Arc::new(RecordingVerifier::default());
    let pool = ShieldedPool::open(
        store.clone() as Arc<dyn PoolStore>,
        verifier.clone(),
        policy,
    )
    .unwrap();
    Fixture {
        pool,
        store,
        verifier,
    }
}

pub fn configure_keys(pool: &ShieldedPool) {
    for kind in OperationKind::ALL {
        pool.set_active_key(KeyKind::Verify(kind), 1, format!("vk-{kind}").into_bytes())
            .unwrap();
    }
    pool.set_active_key(
        KeyKind::AuthPubKey,
        1,
        format!(r#"["{AUTHORIZED_KEY}"]"#).into_bytes(),
    )
    .unwrap();
}

pub fn s(v: u64) -> Scalar {
    Scalar::from_value(v).unwrap()
}

pub fn envelope(input: impl Into<PublicInput>) -> ProofEnvelope {
    let input = input.into();
    ProofEnvelope {
        kind: input.kind().as_str().to_string(),
        public_input: input.encode(),
        proof: b"ok".to_vec(),
        key_version: None,
    }
}

pub fn record(action: Action, amount: u64, proofs: Vec<ProofEnvelope>) -> OperationRecord {
    OperationRecord {
        action,
        amount,
        proofs,
    }
}

pub fn deposit_input(note: u64, amount: u64) -> DepositPublicInput {
    DepositPublicInput {
        note_hash: note.to_string(),
        amount: amount.to_string(),
    }
}

/// Deposit a single note and return the root it produced
pub fn deposit(pool: &ShieldedPool, note: u64, amount: u64) -> TreeRoot {
    pool.process(&record(
        Action::Deposit,
        amount,
        vec![envelope(deposit_input(note, amount))],
    ))
    .unwrap()
    .new_root
}

pub fn withdraw_input(root: TreeRoot, nullifier: u64, amount: u64) -> WithdrawPublicInput {
    WithdrawPublicInput {
        tree_root_hash: root.to_string(),
        nullifier_hash: nullifier.to_string(),
        authorize_spend_hash: "0".into(),
        amount: amount.to_string(),
        note_hash: "1".into(),
    }
}

pub fn transfer_input(
    root: TreeRoot,
    nullifier: u64,
    value: u64,
    blinding: u64,
) -> TransferInputPublicInput {
    transfer_input_blinded(root, nullifier, value, s(blinding))
}

pub fn transfer_input_blinded(
    root: TreeRoot,
    nullifier: u64,
    value: u64,
    blinding: Scalar,
) -> TransferInputPublicInput {
    let shield = Commitment::pedersen(&s(value), &blinding);
    TransferInputPublicInput {
        tree_root_hash: root.to_string(),
        nullifier_hash: nullifier.to_string(),
        authorize_spend_hash: "0".into(),
        shield_amount_x: shield.point().x().to_decimal(),
        shield_amount_y: shield.point().y().to_decimal(),
        note_hash: "1".into(),
    }
}

pub fn transfer_output(note: u64, value: u64, blinding: u64) -> TransferOutputPublicInput {
    transfer_output_blinded(note, value, s(blinding))
}

pub fn transfer_output_blinded(note: u64, value: u64, blinding: Scalar) -> TransferOutputPublicInput {
    let shield = Commitment::pedersen(&s(value), &blinding);
    TransferOutputPublicInput {
        note_hash: note.to_string(),
        shield_amount_x: shield.point().x().to_decimal(),
        shield_amount_y: shield.point().y().to_decimal(),
        output: DhSecretGroup {
            receiver: "receiver-secret".into(),
            returner: "returner-secret".into(),
            authorize: "authorize-secret".into(),
        },
    }
}

pub fn authorize_input(
    root: TreeRoot,
    pub_key: &str,
    authorize_hash: u64,
    spend_hash: u64,
) -> AuthorizePublicInput {
    AuthorizePublicInput {
        tree_root_hash: root.to_string(),
        authorize_pub_key: pub_key.to_string(),
        authorize_hash: authorize_hash.to_string(),
        authorize_spend_hash: spend_hash.to_string(),
        note_hash: "1".into(),
    }
}
