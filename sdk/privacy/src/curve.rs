//! Curve Arithmetic
//!
//! Scalar multiplication and point addition on Baby Jubjub, the twisted
//! Edwards curve over the BN254 scalar field.
//!
//! ```text
//! a·x² + y² = 1 + d·x²·y²     a = 1, d = 168696/168700 mod q
//! ```
//!
//! Two independent base points are used for Pedersen commitments: `G` is the
//! generator of the prime-order subgroup, `H` is a compiled-in point whose
//! discrete log relative to `G` is unknown.

use ark_ec::{AffineRepr, CurveGroup};
use ark_ed_on_bn254::{EdwardsAffine, Fq, Fr};
use ark_ff::{BigInteger, MontFp, PrimeField, Zero};
use core::ops::{Add, Neg};
use thiserror::Error;

use crate::field::FieldElement;

/// `H = 8 · map(SHA-256("shielded-pool/pedersen-H" || ctr))`, first counter
/// yielding a curve point (ctr = 6)
const H_X: Fq =
    MontFp!("21242118983984760858148094112997288186400093129117214376789705458836305775902");
const H_Y: Fq =
    MontFp!("2119875895800713034009658424496377306483956154519104348317654612496853700347");

/// Curve arithmetic errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurveError {
    #[error("invalid scalar encoding in `{field}`: {reason}")]
    InvalidScalarEncoding { field: &'static str, reason: String },

    #[error("`{field}` is not a point of the prime-order subgroup")]
    InvalidCurvePoint { field: &'static str },
}

/// Raw representations a scalar can be built from
#[derive(Debug, Clone, Copy)]
pub enum ScalarValue<'a> {
    Int(u64),
    /// Decimal string, optionally negative
    Decimal(&'a str),
    /// Big-endian bytes
    Bytes(&'a [u8]),
}

impl From<u64> for ScalarValue<'_> {
    fn from(value: u64) -> Self {
        ScalarValue::Int(value)
    }
}

impl<'a> From<&'a str> for ScalarValue<'a> {
    fn from(value: &'a str) -> Self {
        ScalarValue::Decimal(value)
    }
}

impl<'a> From<&'a [u8]> for ScalarValue<'a> {
    fn from(value: &'a [u8]) -> Self {
        ScalarValue::Bytes(value)
    }
}

/// A multiplier for curve points, reduced into the prime-order subgroup's
/// scalar field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Scalar(Fr);

impl Scalar {
    /// Build the canonical scalar for a raw value
    pub fn from_value<'a>(value: impl Into<ScalarValue<'a>>) -> Result<Self, CurveError> {
        Self::from_field_value("scalar", value)
    }

    /// Same as [`Self::from_value`], attributing failures to `field`
    pub fn from_field_value<'a>(
        field: &'static str,
        value: impl Into<ScalarValue<'a>>,
    ) -> Result<Self, CurveError> {
        match value.into() {
            ScalarValue::Int(v) => Ok(Self(Fr::from(v))),
            ScalarValue::Decimal(text) => {
                FieldElement::from_decimal(field, text).map(Self::from_field_element)
            }
            ScalarValue::Bytes(bytes) => {
                if bytes.is_empty() {
                    return Err(CurveError::InvalidScalarEncoding {
                        field,
                        reason: "empty byte string".into(),
                    });
                }
                Ok(Self::from_field_element(
                    FieldElement::from_be_bytes_mod_order(bytes),
                ))
            }
        }
    }

    /// Reinterpret a base-field element as a multiplier.
    ///
    /// Points have prime order `r`, so reducing the integer mod `r` leaves
    /// every product unchanged.
    pub fn from_field_element(value: FieldElement) -> Self {
        Self(Fr::from_le_bytes_mod_order(
            &value.inner().into_bigint().to_bytes_le(),
        ))
    }

    pub fn zero() -> Self {
        Self(Fr::zero())
    }

    pub fn inner(&self) -> Fr {
        self.0
    }
}

impl From<Fr> for Scalar {
    fn from(value: Fr) -> Self {
        Self(value)
    }
}

impl Add for Scalar {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Neg for Scalar {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

/// A point of the prime-order subgroup of Baby Jubjub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurvePoint(EdwardsAffine);

impl CurvePoint {
    /// The group identity `(0, 1)`
    pub fn identity() -> Self {
        Self(EdwardsAffine::zero())
    }

    /// Base point `G`
    pub fn base_g() -> Self {
        Self(EdwardsAffine::generator())
    }

    /// Base point `H`
    pub fn base_h() -> Self {
        Self(EdwardsAffine::new_unchecked(H_X, H_Y))
    }

    /// Build a point from affine coordinates, rejecting anything outside the
    /// prime-order subgroup
    pub fn from_coordinates(
        field: &'static str,
        x: FieldElement,
        y: FieldElement,
    ) -> Result<Self, CurveError> {
        let point = EdwardsAffine::new_unchecked(x.inner(), y.inner());
        if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
            return Err(CurveError::InvalidCurvePoint { field });
        }
        Ok(Self(point))
    }

    /// Parse decimal coordinates as carried by public inputs
    pub fn from_decimal(
        field_x: &'static str,
        x: &str,
        field_y: &'static str,
        y: &str,
    ) -> Result<Self, CurveError> {
        let x = FieldElement::from_decimal(field_x, x)?;
        let y = FieldElement::from_decimal(field_y, y)?;
        Self::from_coordinates(field_x, x, y)
    }

    pub fn x(&self) -> FieldElement {
        FieldElement(self.0.x)
    }

    pub fn y(&self) -> FieldElement {
        FieldElement(self.0.y)
    }

    pub fn is_identity(&self) -> bool {
        self.0.is_zero()
    }

    /// Group addition
    pub fn add(&self, other: &Self) -> Self {
        Self((self.0.into_group() + other.0).into_affine())
    }

    /// Scalar multiplication
    pub fn mul(&self, scalar: &Scalar) -> Self {
        Self((self.0 * scalar.inner()).into_affine())
    }

    /// Coordinate-wise equality of both affine coordinates
    pub fn equal(&self, other: &Self) -> bool {
        self.0.x == other.0.x && self.0.y == other.0.y
    }

    /// Sum a sequence of points, seeding the accumulator from the first term.
    ///
    /// Returns `None` for an empty sequence.
    pub fn sum<'a>(points: impl IntoIterator<Item = &'a CurvePoint>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(first, |acc, p| acc.add(p)))
    }

    pub fn inner(&self) -> EdwardsAffine {
        self.0
    }

    /// Copy with `coord` (0 = x, 1 = y) incremented by one, skipping curve checks
    #[cfg(test)]
    pub(crate) fn perturbed(&self, coord: usize) -> Self {
        let one = Fq::from(1u64);
        if coord == 0 {
            Self(EdwardsAffine::new_unchecked(self.0.x + one, self.0.y))
        } else {
            Self(EdwardsAffine::new_unchecked(self.0.x, self.0.y + one))
        }
    }
}

/// `v` reduced to its canonical scalar
pub fn scalar_from_value<'a>(value: impl Into<ScalarValue<'a>>) -> Result<Scalar, CurveError> {
    Scalar::from_value(value)
}

/// `scalar · G`
pub fn mul_base_g(scalar: &Scalar) -> CurvePoint {
    CurvePoint::base_g().mul(scalar)
}

/// `scalar · H`
pub fn mul_base_h(scalar: &Scalar) -> CurvePoint {
    CurvePoint::base_h().mul(scalar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_std::{UniformRand, test_rng};

    fn random_scalar() -> Scalar {
        Scalar(Fr::rand(&mut test_rng()))
    }

    #[test]
    fn test_base_points_are_valid() {
        let g = CurvePoint::base_g();
        let h = CurvePoint::base_h();

        assert!(g.inner().is_on_curve());
        assert!(h.inner().is_on_curve(), "H must lie on the curve");
        assert!(h.inner().is_in_correct_subgroup_assuming_on_curve());
        assert!(!h.is_identity());
        assert_ne!(g, h, "G and H must be distinct generators");
    }

    #[test]
    fn test_homomorphism_over_g_and_h() {
        let mut rng = test_rng();
        for _ in 0..8 {
            let a = Scalar(Fr::rand(&mut rng));
            let b = Scalar(Fr::rand(&mut rng));

            let lhs = mul_base_g(&(a + b));
            let rhs = mul_base_g(&a).add(&mul_base_g(&b));
            assert!(lhs.equal(&rhs), "(a+b)G must equal aG + bG");

            let lhs = mul_base_h(&(a + b));
            let rhs = mul_base_h(&a).add(&mul_base_h(&b));
            assert!(lhs.equal(&rhs), "(a+b)H must equal aH + bH");
        }
    }

    #[test]
    fn test_identity_is_neutral() {
        let p = mul_base_g(&random_scalar());
        let id = CurvePoint::identity();

        assert_eq!(p.add(&id), p);
        assert_eq!(id.add(&p), p);
        assert_eq!(mul_base_g(&Scalar::zero()), id);
        assert_eq!(id.x(), FieldElement::default());
        assert_eq!(id.y(), FieldElement::from(1u64));
    }

    #[test]
    fn test_sum_seeds_from_first_term() {
        assert_eq!(CurvePoint::sum(&[]), None);

        let p = mul_base_g(&Scalar::from_value(7u64).unwrap());
        assert_eq!(CurvePoint::sum(&[p]), Some(p));

        let q = mul_base_h(&Scalar::from_value(5u64).unwrap());
        assert_eq!(CurvePoint::sum(&[p, q]), Some(p.add(&q)));
    }

    #[test]
    fn test_scalar_representations_agree() {
        let from_int = Scalar::from_value(1_000u64).unwrap();
        let from_dec = Scalar::from_value("1000").unwrap();
        let from_bytes = Scalar::from_value(&[0x03u8, 0xe8][..]).unwrap();

        assert_eq!(from_int, from_dec);
        assert_eq!(from_int, from_bytes);
        assert_eq!(
            Scalar::from_value("-1000").unwrap() + from_int,
            Scalar::zero()
        );
    }

    #[test]
    fn test_scalar_encoding_errors() {
        assert!(matches!(
            Scalar::from_field_value("amount", "ten"),
            Err(CurveError::InvalidScalarEncoding { field: "amount", .. })
        ));
        assert!(matches!(
            Scalar::from_value(&[0u8; 0][..]),
            Err(CurveError::InvalidScalarEncoding { .. })
        ));
    }

    #[test]
    fn test_point_from_decimal() {
        let p = mul_base_g(&Scalar::from_value(42u64).unwrap());
        let parsed = CurvePoint::from_decimal(
            "shieldAmountX",
            &p.x().to_decimal(),
            "shieldAmountY",
            &p.y().to_decimal(),
        )
        .unwrap();
        assert_eq!(parsed, p);

        // (1, 1) does not satisfy the curve equation
        let err = CurvePoint::from_decimal("shieldAmountX", "1", "shieldAmountY", "1").unwrap_err();
        assert_eq!(
            err,
            CurveError::InvalidCurvePoint {
                field: "shieldAmountX"
            }
        );
    }

    #[test]
    fn test_small_order_point_rejected() {
        // (0, -1) has order two
        let err = CurvePoint::from_coordinates(
            "shieldAmountX",
            FieldElement::default(),
            FieldElement(-Fq::from(1u64)),
        )
        .unwrap_err();
        assert_eq!(
            err,
            CurveError::InvalidCurvePoint {
                field: "shieldAmountX"
            }
        );
    }
}
