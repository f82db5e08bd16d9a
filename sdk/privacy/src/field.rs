//! Field Elements
//!
//! Every hash, root and coordinate carried by a public input is an element of
//! the BN254 scalar field, which is also the base field of Baby Jubjub. On the
//! wire these travel as decimal strings.

use core::fmt;

use ark_ed_on_bn254::Fq;
use ark_ff::{BigInteger, PrimeField, Zero};
use num_bigint::BigUint;

use crate::curve::CurveError;

/// An element of the BN254 scalar field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldElement(pub Fq);

impl FieldElement {
    /// Parse a decimal string, reducing it into the field.
    ///
    /// A leading `-` negates the value. `field` names the public-input field
    /// the string came from and ends up in the error.
    pub fn from_decimal(field: &'static str, text: &str) -> Result<Self, CurveError> {
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        if digits.is_empty() {
            return Err(CurveError::InvalidScalarEncoding {
                field,
                reason: "empty decimal string".into(),
            });
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CurveError::InvalidScalarEncoding {
                field,
                reason: format!("`{text}` is not a decimal integer"),
            });
        }

        let magnitude = BigUint::parse_bytes(digits.as_bytes(), 10).ok_or_else(|| {
            CurveError::InvalidScalarEncoding {
                field,
                reason: format!("`{text}` is not a decimal integer"),
            }
        })?;

        let value = Fq::from_le_bytes_mod_order(&magnitude.to_bytes_le());
        Ok(Self(if negative { -value } else { value }))
    }

    /// Reduce a big-endian byte string into the field
    pub fn from_be_bytes_mod_order(bytes: &[u8]) -> Self {
        Self(Fq::from_be_bytes_mod_order(bytes))
    }

    /// Decode the 32-byte little-endian form produced by [`Self::to_bytes`].
    ///
    /// Returns `None` for values that are not canonical (>= modulus).
    pub fn from_canonical_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 32 {
            return None;
        }
        let value = Fq::from_le_bytes_mod_order(bytes);
        if value.into_bigint().to_bytes_le() == bytes {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Canonical 32-byte little-endian encoding
    pub fn to_bytes(&self) -> [u8; 32] {
        let bytes = self.0.into_bigint().to_bytes_le();
        let mut arr = [0u8; 32];
        arr[..bytes.len()].copy_from_slice(&bytes);
        arr
    }

    /// Canonical decimal form (no sign, no leading zeros)
    pub fn to_decimal(&self) -> String {
        BigUint::from_bytes_le(&self.0.into_bigint().to_bytes_le()).to_string()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn inner(&self) -> Fq {
        self.0
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        Self(Fq::from(value))
    }
}

impl From<Fq> for FieldElement {
    fn from(value: Fq) -> Self {
        Self(value)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal())
    }
}

/// Hash of a shielded note; the value stored as a commitment tree leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NoteHash(pub FieldElement);

impl NoteHash {
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

impl From<u64> for NoteHash {
    fn from(value: u64) -> Self {
        Self(FieldElement::from(value))
    }
}

impl fmt::Display for NoteHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
