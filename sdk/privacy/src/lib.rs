//! Mix Privacy SDK
//!
//! Confidentiality primitives for the mix shielded pool.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Shielded Operation                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────────┐ │
//! │  │ Public input │  │ Value commit │  │    Commitment tree    │ │
//! │  │ (hex JSON)   │  │ v·G + r·H    │  │  (note hash leaves)   │ │
//! │  └──────────────┘  └──────────────┘  └───────────────────────┘ │
//! │         │                 │                     │               │
//! │         ▼                 ▼                     ▼               │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │  • typed decode per proof kind                           │   │
//! │  │  • balance: Σ inputs = Σ outputs + fee·G                 │   │
//! │  │  • Poseidon root history anchoring spends                │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod balance;
pub mod commitment;
pub mod curve;
pub mod field;
pub mod merkle;
pub mod nullifier;
pub mod public_input;

pub use balance::check_sum_equal;
pub use commitment::Commitment;
pub use curve::{
    CurveError, CurvePoint, Scalar, ScalarValue, mul_base_g, mul_base_h, scalar_from_value,
};
pub use field::{FieldElement, NoteHash};
pub use merkle::{MerkleHasher, TREE_CAPACITY, TREE_DEPTH, TreeFrontier, TreeRoot};
pub use nullifier::{AuthorizeHash, Nullifier};
pub use public_input::{
    AuthorizePublicInput, CodecError, DepositPublicInput, DhSecretGroup, OperationKind,
    PublicInput, TransferInputPublicInput, TransferOutputPublicInput, WithdrawPublicInput,
    decode_public_input,
};
