//! Public Inputs
//!
//! Every proof submitted to the pool comes with a public input: a JSON object
//! of decimal field elements, hex-encoded for transport.
//!
//! ```text
//! hex(JSON) ──decode──▶ PublicInput::{Deposit, Withdraw, TransferInput,
//!                                     TransferOutput, Authorize}
//! ```
//!
//! Decoding is a format and schema gate only. Range and semantic checks are
//! done by the typed accessors and by the pool that consumes the result.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::commitment::Commitment;
use crate::curve::{CurveError, CurvePoint, Scalar};
use crate::field::{FieldElement, NoteHash};
use crate::merkle::TreeRoot;
use crate::nullifier::{AuthorizeHash, Nullifier};

/// Public-input decoding errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed hex encoding: {0}")]
    MalformedEncoding(#[from] hex::FromHexError),

    #[error("malformed {kind} payload: {source}")]
    MalformedPayload {
        kind: OperationKind,
        source: serde_json::Error,
    },

    #[error("unsupported operation kind `{0}`")]
    UnsupportedOperation(String),
}

/// The five proof kinds the pool accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    Deposit,
    Withdraw,
    TransferInput,
    TransferOutput,
    Authorize,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Deposit,
        OperationKind::Withdraw,
        OperationKind::TransferInput,
        OperationKind::TransferOutput,
        OperationKind::Authorize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Deposit => "deposit",
            OperationKind::Withdraw => "withdraw",
            OperationKind::TransferInput => "transferInput",
            OperationKind::TransferOutput => "transferOutput",
            OperationKind::Authorize => "authorize",
        }
    }

    /// Numeric wire tag
    pub fn tag(&self) -> u8 {
        match self {
            OperationKind::Deposit => 0,
            OperationKind::Withdraw => 1,
            OperationKind::TransferInput => 2,
            OperationKind::TransferOutput => 3,
            OperationKind::Authorize => 4,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the camelCase name (any case) or the bare numeric tag `0`..`4`
impl FromStr for OperationKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s) || s.as_bytes() == [b'0' + kind.tag()])
            .ok_or_else(|| CodecError::UnsupportedOperation(s.to_string()))
    }
}

impl TryFrom<i64> for OperationKind {
    type Error = CodecError;

    fn try_from(tag: i64) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|kind| i64::from(kind.tag()) == tag)
            .ok_or_else(|| CodecError::UnsupportedOperation(tag.to_string()))
    }
}

/// Deposit of a public amount into a new note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DepositPublicInput {
    pub note_hash: String,
    pub amount: String,
}

impl DepositPublicInput {
    pub fn note_hash(&self) -> Result<NoteHash, CurveError> {
        NoteHash::from_decimal("noteHash", &self.note_hash)
    }

    pub fn amount(&self) -> Result<Scalar, CurveError> {
        Scalar::from_field_value("amount", self.amount.as_str())
    }

    /// `amount·G`
    pub fn amount_commitment(&self) -> Result<Commitment, CurveError> {
        Commitment::to_amount("amount", &self.amount)
    }
}

/// Spend of a note to a public amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WithdrawPublicInput {
    pub tree_root_hash: String,
    pub nullifier_hash: String,
    pub authorize_spend_hash: String,
    pub amount: String,
    pub note_hash: String,
}

impl WithdrawPublicInput {
    pub fn tree_root(&self) -> Result<TreeRoot, CurveError> {
        TreeRoot::from_decimal("treeRootHash", &self.tree_root_hash)
    }

    pub fn nullifier(&self) -> Result<Nullifier, CurveError> {
        Nullifier::from_decimal("nullifierHash", &self.nullifier_hash)
    }

    pub fn authorize_spend_hash(&self) -> Result<AuthorizeHash, CurveError> {
        AuthorizeHash::from_decimal("authorizeSpendHash", &self.authorize_spend_hash)
    }

    pub fn amount(&self) -> Result<Scalar, CurveError> {
        Scalar::from_field_value("amount", self.amount.as_str())
    }

    /// `amount·G`
    pub fn amount_commitment(&self) -> Result<Commitment, CurveError> {
        Commitment::to_amount("amount", &self.amount)
    }

    pub fn note_hash(&self) -> Result<NoteHash, CurveError> {
        NoteHash::from_decimal("noteHash", &self.note_hash)
    }
}

/// One spent note of a shielded transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransferInputPublicInput {
    pub tree_root_hash: String,
    pub nullifier_hash: String,
    pub authorize_spend_hash: String,
    pub shield_amount_x: String,
    pub shield_amount_y: String,
    pub note_hash: String,
}

impl TransferInputPublicInput {
    pub fn tree_root(&self) -> Result<TreeRoot, CurveError> {
        TreeRoot::from_decimal("treeRootHash", &self.tree_root_hash)
    }

    pub fn nullifier(&self) -> Result<Nullifier, CurveError> {
        Nullifier::from_decimal("nullifierHash", &self.nullifier_hash)
    }

    pub fn authorize_spend_hash(&self) -> Result<AuthorizeHash, CurveError> {
        AuthorizeHash::from_decimal("authorizeSpendHash", &self.authorize_spend_hash)
    }

    /// Pedersen commitment to the spent value
    pub fn shield_amount(&self) -> Result<Commitment, CurveError> {
        shield_point(&self.shield_amount_x, &self.shield_amount_y)
    }

    pub fn note_hash(&self) -> Result<NoteHash, CurveError> {
        NoteHash::from_decimal("noteHash", &self.note_hash)
    }
}

/// Encrypted note secrets for the parties of a transfer output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DhSecretGroup {
    pub receiver: String,
    pub returner: String,
    pub authorize: String,
}

/// One new note created by a shielded transfer (payee or change)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransferOutputPublicInput {
    pub note_hash: String,
    pub shield_amount_x: String,
    pub shield_amount_y: String,
    pub output: DhSecretGroup,
}

impl TransferOutputPublicInput {
    pub fn note_hash(&self) -> Result<NoteHash, CurveError> {
        NoteHash::from_decimal("noteHash", &self.note_hash)
    }

    /// Pedersen commitment to the created value
    pub fn shield_amount(&self) -> Result<Commitment, CurveError> {
        shield_point(&self.shield_amount_x, &self.shield_amount_y)
    }
}

/// Grant of spend authority over a note to an authorized key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuthorizePublicInput {
    pub tree_root_hash: String,
    pub authorize_pub_key: String,
    pub authorize_hash: String,
    pub authorize_spend_hash: String,
    pub note_hash: String,
}

impl AuthorizePublicInput {
    pub fn tree_root(&self) -> Result<TreeRoot, CurveError> {
        TreeRoot::from_decimal("treeRootHash", &self.tree_root_hash)
    }

    pub fn authorize_pub_key(&self) -> Result<FieldElement, CurveError> {
        FieldElement::from_decimal("authorizePubKey", &self.authorize_pub_key)
    }

    pub fn authorize_hash(&self) -> Result<AuthorizeHash, CurveError> {
        AuthorizeHash::from_decimal("authorizeHash", &self.authorize_hash)
    }

    pub fn authorize_spend_hash(&self) -> Result<AuthorizeHash, CurveError> {
        AuthorizeHash::from_decimal("authorizeSpendHash", &self.authorize_spend_hash)
    }

    pub fn note_hash(&self) -> Result<NoteHash, CurveError> {
        NoteHash::from_decimal("noteHash", &self.note_hash)
    }
}

fn shield_point(x: &str, y: &str) -> Result<Commitment, CurveError> {
    CurvePoint::from_decimal("shieldAmountX", x, "shieldAmountY", y).map(Commitment)
}

/// A decoded public input, tagged by proof kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicInput {
    Deposit(DepositPublicInput),
    Withdraw(WithdrawPublicInput),
    TransferInput(TransferInputPublicInput),
    TransferOutput(TransferOutputPublicInput),
    Authorize(AuthorizePublicInput),
}

impl PublicInput {
    /// Hex-decode `hex_input` and parse it as the schema for `kind`
    pub fn decode(kind: OperationKind, hex_input: &str) -> Result<Self, CodecError> {
        let data = hex::decode(hex_input)?;
        Self::from_json(kind, &data)
    }

    fn from_json(kind: OperationKind, data: &[u8]) -> Result<Self, CodecError> {
        Ok(match kind {
            OperationKind::Deposit => Self::Deposit(parse(kind, data)?),
            OperationKind::Withdraw => Self::Withdraw(parse(kind, data)?),
            OperationKind::TransferInput => Self::TransferInput(parse(kind, data)?),
            OperationKind::TransferOutput => Self::TransferOutput(parse(kind, data)?),
            OperationKind::Authorize => Self::Authorize(parse(kind, data)?),
        })
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Deposit(_) => OperationKind::Deposit,
            Self::Withdraw(_) => OperationKind::Withdraw,
            Self::TransferInput(_) => OperationKind::TransferInput,
            Self::TransferOutput(_) => OperationKind::TransferOutput,
            Self::Authorize(_) => OperationKind::Authorize,
        }
    }

    /// Compact JSON in field order
    pub fn to_json(&self) -> Vec<u8> {
        let json = match self {
            Self::Deposit(v) => serde_json::to_vec(v),
            Self::Withdraw(v) => serde_json::to_vec(v),
            Self::TransferInput(v) => serde_json::to_vec(v),
            Self::TransferOutput(v) => serde_json::to_vec(v),
            Self::Authorize(v) => serde_json::to_vec(v),
        };
        json.expect("public input serialization failed")
    }

    /// Lowercase hex of [`Self::to_json`]
    ///
    /// This is the canonical form. [`Self::decode`] also accepts uppercase
    /// hex and any JSON whitespace or key order, so `decode(h).encode()`
    /// equals `h` only when `h` was already canonical.
    pub fn encode(&self) -> String {
        hex::encode(self.to_json())
    }

    /// The note hash every variant carries
    pub fn note_hash(&self) -> Result<NoteHash, CurveError> {
        match self {
            Self::Deposit(v) => v.note_hash(),
            Self::Withdraw(v) => v.note_hash(),
            Self::TransferInput(v) => v.note_hash(),
            Self::TransferOutput(v) => v.note_hash(),
            Self::Authorize(v) => v.note_hash(),
        }
    }
}

fn parse<T: DeserializeOwned>(kind: OperationKind, data: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(data).map_err(|source| CodecError::MalformedPayload { kind, source })
}

/// Decode a public input whose kind arrives as a wire tag.
///
/// The hex is checked first; an unknown tag is reported only for well-formed
/// hex.
pub fn decode_public_input(kind: &str, hex_input: &str) -> Result<PublicInput, CodecError> {
    let data = hex::decode(hex_input)?;
    let kind: OperationKind = kind.parse()?;
    PublicInput::from_json(kind, &data)
}

impl From<DepositPublicInput> for PublicInput {
    fn from(v: DepositPublicInput) -> Self {
        Self::Deposit(v)
    }
}

impl From<WithdrawPublicInput> for PublicInput {
    fn from(v: WithdrawPublicInput) -> Self {
        Self::Withdraw(v)
    }
}

impl From<TransferInputPublicInput> for PublicInput {
    fn from(v: TransferInputPublicInput) -> Self {
        Self::TransferInput(v)
    }
}

impl From<TransferOutputPublicInput> for PublicInput {
    fn from(v: TransferOutputPublicInput) -> Self {
        Self::TransferOutput(v)
    }
}

impl From<AuthorizePublicInput> for PublicInput {
    fn from(v: AuthorizePublicInput) -> Self {
        Self::Authorize(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("deposit".parse::<OperationKind>().unwrap(), OperationKind::Deposit);
        assert_eq!(
            "TRANSFERINPUT".parse::<OperationKind>().unwrap(),
            OperationKind::TransferInput
        );
        assert_eq!("4".parse::<OperationKind>().unwrap(), OperationKind::Authorize);

        for bad in ["collateralize", "5", "-1", "", "+4", "04", "0004", "+0", " 1"] {
            assert!(matches!(
                bad.parse::<OperationKind>(),
                Err(CodecError::UnsupportedOperation(_))
            ));
        }
    }

    #[test]
    fn test_kind_tags_roundtrip() {
        for kind in OperationKind::ALL {
            assert_eq!(OperationKind::try_from(i64::from(kind.tag())).unwrap(), kind);
            assert_eq!(kind.as_str().parse::<OperationKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_deposit_accessors() {
        let input = DepositPublicInput {
            note_hash: "123".into(),
            amount: "10".into(),
        };
        assert_eq!(input.note_hash().unwrap(), NoteHash::from(123u64));
        assert_eq!(input.amount().unwrap(), Scalar::from_value(10u64).unwrap());
    }

    #[test]
    fn test_accessor_errors_name_the_field() {
        let input = WithdrawPublicInput {
            tree_root_hash: "1".into(),
            nullifier_hash: "oops".into(),
            authorize_spend_hash: "0".into(),
            amount: "5".into(),
            note_hash: "2".into(),
        };
        match input.nullifier().unwrap_err() {
            CurveError::InvalidScalarEncoding { field, .. } => assert_eq!(field, "nullifierHash"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_shield_amount_must_be_on_curve() {
        let input = TransferOutputPublicInput {
            note_hash: "1".into(),
            shield_amount_x: "1".into(),
            shield_amount_y: "1".into(),
            output: DhSecretGroup {
                receiver: String::new(),
                returner: String::new(),
                authorize: String::new(),
            },
        };
        assert_eq!(
            input.shield_amount().unwrap_err(),
            CurveError::InvalidCurvePoint {
                field: "shieldAmountX"
            }
        );
    }
}
