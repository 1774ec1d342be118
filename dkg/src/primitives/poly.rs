//! Polynomial operations over the Ed25519 scalar field.
//!
//! # Warning
//!
//! The security of the polynomial operations is critical for the overall
//! security of the threshold schemes. Ensure that the scalar field operations
//! are performed over the correct field and that all elements are valid.

use super::{group::evaluation_point, Error};
use curve25519_dalek::{traits::Identity, EdwardsPoint, Scalar};
use rand::{CryptoRng, RngCore};
use std::{
    collections::BTreeSet,
    ops::{Add, Mul},
};

/// Private polynomials are used to generate secret shares.
pub type Private = Poly<Scalar>;

/// Public polynomials represent commitments to secrets on a private polynomial.
pub type Public = Poly<EdwardsPoint>;

/// Element of a polynomial: either a scalar or a point it commits to.
pub trait Element: Copy + Add<Output = Self> + Mul<Scalar, Output = Self> {
    fn zero() -> Self;
}

impl Element for Scalar {
    fn zero() -> Self {
        Scalar::ZERO
    }
}

impl Element for EdwardsPoint {
    fn zero() -> Self {
        EdwardsPoint::identity()
    }
}

/// A polynomial evaluation at a specific index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eval<C> {
    pub index: u32,
    pub value: C,
}

/// A polynomial that is using a scalar for the variable x and a generic
/// element for the coefficients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poly<C>(Vec<C>);

/// Returns a new scalar polynomial of the given degree where each coefficient is
/// sampled at random from the provided RNG.
///
/// In the context of secret sharing, the threshold is the degree + 1.
pub fn new_from<R: RngCore + CryptoRng>(degree: u32, rng: &mut R) -> Private {
    let coeffs = (0..=degree).map(|_| Scalar::random(rng)).collect::<Vec<_>>();
    Poly(coeffs)
}

impl<C> Poly<C> {
    /// Creates a new polynomial from the given coefficients.
    pub fn from(c: Vec<C>) -> Self {
        Self(c)
    }

    /// Returns the constant term of the polynomial.
    pub fn constant(&self) -> &C {
        &self.0[0]
    }

    /// Returns the number of required shares to reconstruct the polynomial.
    ///
    /// This will be the threshold.
    pub fn required(&self) -> u32 {
        self.0.len() as u32
    }

    /// Returns the coefficients of the polynomial, constant term first.
    pub fn coefficients(&self) -> &[C] {
        &self.0
    }
}

impl Private {
    /// Commits to every coefficient of the polynomial.
    pub fn commit(&self) -> Public {
        Poly(self.0.iter().map(EdwardsPoint::mul_base).collect())
    }
}

impl<C: Element> Poly<C> {
    /// Adds the coefficients of `other` to this polynomial.
    pub fn add(&mut self, other: &Self) {
        if other.0.len() > self.0.len() {
            self.0.resize(other.0.len(), C::zero());
        }
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a = *a + *b;
        }
    }

    /// Evaluates the polynomial at the specified index.
    pub fn evaluate(&self, i: u32) -> Eval<C> {
        // We add +1 because we must never evaluate the polynomial at its first point
        // otherwise it reveals the "secret" value.
        let xi = evaluation_point(i);

        // Use Horner's method to evaluate the polynomial
        let value = self
            .0
            .iter()
            .rev()
            .fold(C::zero(), |sum, coeff| sum * xi + *coeff);
        Eval { index: i, value }
    }
}

/// Recovers the constant term of a polynomial of degree `t - 1` from at least `t` evaluations.
///
/// The evaluations are sorted by index and the first `t` are used, so two calls over the same
/// set select the same evaluations.
pub fn recover<'a, C, I>(t: u32, evals: I) -> Result<C, Error>
where
    C: Element + 'a,
    I: IntoIterator<Item = &'a Eval<C>>,
{
    let t = t as usize;
    let mut evals = evals.into_iter().collect::<Vec<_>>();
    if evals.len() < t {
        return Err(Error::NotEnoughEvaluations(evals.len(), t));
    }
    evals.sort_by_key(|e| e.index);
    let evals = &evals[..t];

    // A repeated index would zero a denominator
    let mut seen = BTreeSet::new();
    for eval in evals {
        if !seen.insert(eval.index) {
            return Err(Error::DuplicateEval);
        }
    }

    // The constant term is `sum_{i} yi * l_i(0)`, where `l_i(0) = product_{j != i} (xj / (xj - xi))`
    let xs = evals
        .iter()
        .map(|e| evaluation_point(e.index))
        .collect::<Vec<_>>();
    let result = evals
        .iter()
        .zip(xs.iter())
        .fold(C::zero(), |acc, (eval, xi)| {
            let (num, den) = xs.iter().filter(|xj| *xj != xi).fold(
                (Scalar::ONE, Scalar::ONE),
                |(num, den), xj| (num * xj, den * (xj - xi)),
            );
            acc + eval.value * (num * den.invert())
        });
    Ok(result)
}
