//! Value Commitments
//!
//! Pedersen commitments over Baby Jubjub.
//!
//! ```text
//! Commitment = value·G + blinding·H     (transfer notes)
//! Commitment = value·G                  (public deposit / withdraw amounts)
//! ```
//!
//! Commitments are additively homomorphic, which is what lets the balance
//! checker compare sums of hidden amounts.

use ark_ed_on_bn254::Fr;
use ark_std::{UniformRand, rand::Rng};

use crate::curve::{CurveError, CurvePoint, Scalar, mul_base_g, mul_base_h};

/// A value commitment (a curve point)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Commitment(pub CurvePoint);

impl Commitment {
    /// Dual-base commitment: `value·G + blinding·H`
    pub fn pedersen(value: &Scalar, blinding: &Scalar) -> Self {
        Self(mul_base_g(value).add(&mul_base_h(blinding)))
    }

    /// Single-base commitment: `value·G`
    pub fn single_base(value: &Scalar) -> Self {
        Self(mul_base_g(value))
    }

    /// Single-base commitment to a public amount given as a decimal string
    pub fn to_amount(field: &'static str, amount: &str) -> Result<Self, CurveError> {
        Scalar::from_field_value(field, amount).map(|v| Self::single_base(&v))
    }

    pub fn point(&self) -> &CurvePoint {
        &self.0
    }

    /// Generate a random blinding factor
    pub fn random_blinding<R: Rng>(rng: &mut R) -> Scalar {
        Scalar::from(Fr::rand(rng))
    }
}

impl From<CurvePoint> for Commitment {
    fn from(point: CurvePoint) -> Self {
        Self(point)
    }
}
