//! Nullifiers and Authorization Tags
//!
//! Spend-side tags carried by public inputs. The circuits derive them; the
//! pool only records them so each can be consumed once.
//!
//! ```text
//! nullifierHash       - published when a note is spent
//! authorizeHash       - published by an authorize operation
//! authorizeSpendHash  - lets a later spend prove it was authorized
//! ```

use core::fmt;

use crate::curve::CurveError;
use crate::field::FieldElement;

/// A nullifier - unique tag for a spent note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nullifier(pub FieldElement);

impl Nullifier {
    pub fn from_decimal(field: &'static str, text: &str) -> Result<Self, CurveError> {
        FieldElement::from_decimal(field, text).map(Self)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn from_canonical_bytes(bytes: &[u8]) -> Option<Self> {
        FieldElement::from_canonical_bytes(bytes).map(Self)
    }
}

impl fmt::Display for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Authorization tag (`authorizeHash` or `authorizeSpendHash`)
///
/// Zero is reserved to mean "no authorization required".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthorizeHash(pub FieldElement);

impl AuthorizeHash {
    pub fn from_decimal(field: &'static str, text: &str) -> Result<Self, CurveError> {
        FieldElement::from_decimal(field, text).map(Self)
    }

    /// Whether this tag asks for a prior authorization
    pub fn is_required(&self) -> bool {
        !self.0.is_zero()
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn from_canonical_bytes(bytes: &[u8]) -> Option<Self> {
        FieldElement::from_canonical_bytes(bytes).map(Self)
    }
}

impl fmt::Display for AuthorizeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
