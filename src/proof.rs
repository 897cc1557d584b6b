//! Exact-arithmetic derivation of the optimal split.
//!
//! # Why a second derivation
//!
//! [`crate::model::CostModel`] computes the optimum from a hard-coded closed
//! form in f64. A wrong sign or a dropped factor of 2 in that formula would
//! still produce plausible-looking numbers, so this module re-derives the
//! result by a different route: the objective is built as a polynomial in
//! `x` over exact rational coefficients, differentiated by the power rule,
//! and the critical point solved from the linear first derivative. The two
//! paths share no arithmetic; tests hold them in agreement for all
//! parameter values, so neither formula has to be trusted alone.
//!
//! # The derivation
//!
//! ```text
//!   f(x)  = C1*x + alpha*x^2 + K*(N - x) + beta*(N - x)^2
//!   f'(x) = C1 - K + 2*alpha*x - 2*beta*(N - x)
//!   f''(x) = 2*alpha + 2*beta
//!   f'(x) = 0  =>  x* = (2*beta*N - C1 + K) / (2*(alpha + beta))
//! ```
//!
//! `f''` is a positive constant whenever `alpha, beta > 0`, so `x*` is the
//! unique global minimum, not merely a stationary point.
//!
//! # Scope of the kernel
//!
//! The objective is fixed at design time, so no runtime symbolic
//! manipulation is needed -- only reduced `i128` fractions ([`Ratio`]) and
//! dense univariate polynomials ([`Poly`]) with addition, multiplication,
//! and the power rule. That is small enough to keep in-crate and avoids a
//! computer-algebra or rational-arithmetic dependency.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// A reduced fraction over `i128`.
///
/// Invariant: the denominator is positive and the fraction is in lowest
/// terms, so derived equality is exact value equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratio {
    num: i128,
    den: i128,
}

impl Ratio {
    pub const ZERO: Ratio = Ratio { num: 0, den: 1 };
    pub const ONE: Ratio = Ratio { num: 1, den: 1 };

    /// Construct and normalize `num/den`.
    pub fn new(num: i128, den: i128) -> Self {
        debug_assert!(den != 0, "denominator must be nonzero");
        let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
        let g = gcd(num, den);
        Self {
            num: num / g,
            den: den / g,
        }
    }

    pub fn from_integer(n: i128) -> Self {
        Self { num: n, den: 1 }
    }

    pub fn numer(self) -> i128 {
        self.num
    }

    pub fn denom(self) -> i128 {
        self.den
    }

    pub fn is_zero(self) -> bool {
        self.num == 0
    }

    pub fn is_positive(self) -> bool {
        self.num > 0
    }

    /// Exact division; `None` when the divisor is zero.
    pub fn checked_div(self, rhs: Ratio) -> Option<Ratio> {
        if rhs.num == 0 {
            return None;
        }
        Some(Ratio::new(self.num * rhs.den, self.den * rhs.num))
    }

    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

fn gcd(a: i128, b: i128) -> i128 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    // gcd(0, 0) cannot occur: the denominator is nonzero.
    a
}

impl Add for Ratio {
    type Output = Ratio;
    fn add(self, rhs: Ratio) -> Ratio {
        Ratio::new(self.num * rhs.den + rhs.num * self.den, self.den * rhs.den)
    }
}

impl Sub for Ratio {
    type Output = Ratio;
    fn sub(self, rhs: Ratio) -> Ratio {
        Ratio::new(self.num * rhs.den - rhs.num * self.den, self.den * rhs.den)
    }
}

impl Mul for Ratio {
    type Output = Ratio;
    fn mul(self, rhs: Ratio) -> Ratio {
        Ratio::new(self.num * rhs.num, self.den * rhs.den)
    }
}

impl Neg for Ratio {
    type Output = Ratio;
    fn neg(self) -> Ratio {
        Ratio {
            num: -self.num,
            den: self.den,
        }
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

/// Dense univariate polynomial over [`Ratio`]: `coeffs[i]` is the
/// coefficient of `x^i`. Trailing zero coefficients are trimmed, so the
/// zero polynomial has no coefficients at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poly {
    coeffs: Vec<Ratio>,
}

impl Poly {
    pub fn zero() -> Self {
        Self { coeffs: Vec::new() }
    }

    pub fn constant(c: Ratio) -> Self {
        Self::from_coeffs(vec![c])
    }

    /// The monomial `x`.
    pub fn x() -> Self {
        Self::from_coeffs(vec![Ratio::ZERO, Ratio::ONE])
    }

    fn from_coeffs(coeffs: Vec<Ratio>) -> Self {
        let mut p = Self { coeffs };
        p.trim();
        p
    }

    fn trim(&mut self) {
        while matches!(self.coeffs.last(), Some(c) if c.is_zero()) {
            self.coeffs.pop();
        }
    }

    /// Degree of the polynomial; 0 for constants and for the zero polynomial.
    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    /// Coefficient of `x^i` (zero beyond the degree).
    pub fn coeff(&self, i: usize) -> Ratio {
        self.coeffs.get(i).copied().unwrap_or(Ratio::ZERO)
    }

    /// Multiply every coefficient by a constant.
    pub fn scale(mut self, c: Ratio) -> Self {
        for v in &mut self.coeffs {
            *v = *v * c;
        }
        self.trim();
        self
    }

    /// The power rule: `d/dx coeff*x^i = i*coeff*x^(i-1)`.
    pub fn derivative(&self) -> Poly {
        let coeffs = self
            .coeffs
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, &c)| c * Ratio::from_integer(i as i128))
            .collect();
        Self::from_coeffs(coeffs)
    }

    /// Horner evaluation at an exact point.
    pub fn eval(&self, x: Ratio) -> Ratio {
        self.coeffs
            .iter()
            .rev()
            .fold(Ratio::ZERO, |acc, &c| acc * x + c)
    }
}

impl Add for Poly {
    type Output = Poly;
    fn add(self, rhs: Poly) -> Poly {
        let (mut long, short) = if self.coeffs.len() >= rhs.coeffs.len() {
            (self.coeffs, rhs.coeffs)
        } else {
            (rhs.coeffs, self.coeffs)
        };
        for (i, c) in short.into_iter().enumerate() {
            long[i] = long[i] + c;
        }
        Poly::from_coeffs(long)
    }
}

impl Sub for Poly {
    type Output = Poly;
    fn sub(self, rhs: Poly) -> Poly {
        self + rhs.scale(Ratio::from_integer(-1))
    }
}

impl Mul for Poly {
    type Output = Poly;
    fn mul(self, rhs: Poly) -> Poly {
        if self.coeffs.is_empty() || rhs.coeffs.is_empty() {
            return Poly::zero();
        }
        let mut coeffs = vec![Ratio::ZERO; self.coeffs.len() + rhs.coeffs.len() - 1];
        for (i, &a) in self.coeffs.iter().enumerate() {
            for (j, &b) in rhs.coeffs.iter().enumerate() {
                coeffs[i + j] = coeffs[i + j] + a * b;
            }
        }
        Poly::from_coeffs(coeffs)
    }
}

/// The objective instantiated at exact parameter values.
///
/// Built term by term from the model's definition -- NOT from the expanded
/// closed form -- so its derivatives and critical point constitute an
/// independent check on [`crate::model::CostModel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactObjective {
    poly: Poly,
}

impl ExactObjective {
    pub fn new(n: i128, c1: Ratio, k: Ratio, alpha: Ratio, beta: Ratio) -> Self {
        let x = Poly::x();
        // N - x, the calls remaining for the secondary pool.
        let remaining = Poly::constant(Ratio::from_integer(n)) - x.clone();
        let poly = x.clone().scale(c1)
            + (x.clone() * x).scale(alpha)
            + remaining.clone().scale(k)
            + (remaining.clone() * remaining).scale(beta);
        Self { poly }
    }

    /// The expanded objective polynomial.
    pub fn poly(&self) -> &Poly {
        &self.poly
    }

    /// `f'`, a polynomial of degree at most 1.
    pub fn first_derivative(&self) -> Poly {
        self.poly.derivative()
    }

    /// `f''`, a constant.
    pub fn second_derivative(&self) -> Ratio {
        self.poly.derivative().derivative().coeff(0)
    }

    /// Solve `f'(x) = 0` exactly; `None` when `f'` has no root in `x`
    /// (that is, when `alpha + beta == 0` and the slope vanishes).
    pub fn critical_point(&self) -> Option<Ratio> {
        let fp = self.first_derivative();
        (-fp.coeff(0)).checked_div(fp.coeff(1))
    }

    /// True iff the constant curvature is strictly positive.
    pub fn is_minimum(&self) -> bool {
        self.second_derivative().is_positive()
    }

    /// Exact objective value at a point.
    pub fn value_at(&self, x: Ratio) -> Ratio {
        self.poly.eval(x)
    }
}

/// Exact critical point for concrete rational parameters.
pub fn critical_point_exact(
    n: i128,
    c1: Ratio,
    k: Ratio,
    alpha: Ratio,
    beta: Ratio,
) -> Option<Ratio> {
    ExactObjective::new(n, c1, k, alpha, beta).critical_point()
}

/// Exact curvature `2*(alpha + beta)`; independent of `N`, `C1`, and `K`.
pub fn second_derivative_exact(alpha: Ratio, beta: Ratio) -> Ratio {
    ExactObjective::new(0, Ratio::ZERO, Ratio::ZERO, alpha, beta).second_derivative()
}

/// The derivation in displayable form, attached to every result for
/// verification by the caller.
///
/// The objective never varies at runtime, so the record is a fixed,
/// tested constant rather than the output of a general symbolic engine;
/// the serialized field names are the wire contract of the original
/// consumer of this payload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SymbolicProof {
    #[cfg_attr(feature = "serde", serde(rename = "funcao"))]
    pub objective: String,
    #[cfg_attr(feature = "serde", serde(rename = "primeira_derivada"))]
    pub first_derivative: String,
    #[cfg_attr(feature = "serde", serde(rename = "segunda_derivada"))]
    pub second_derivative: String,
    #[cfg_attr(feature = "serde", serde(rename = "ponto_critico"))]
    pub critical_point: String,
    #[cfg_attr(feature = "serde", serde(rename = "eh_minimo"))]
    pub minimality: String,
}

impl SymbolicProof {
    /// The derivation for the fixed objective.
    ///
    /// Unit tests pin each formula to the machine derivation above, so the
    /// strings cannot drift from what the crate actually computes.
    pub fn derive() -> Self {
        Self {
            objective: "C1*x + alpha*x^2 + K*(N - x) + beta*(N - x)^2".to_owned(),
            first_derivative: "C1 - K + 2*alpha*x - 2*beta*(N - x)".to_owned(),
            second_derivative: "2*alpha + 2*beta".to_owned(),
            critical_point: "(2*beta*N - C1 + K)/(2*(alpha + beta))".to_owned(),
            minimality: "2*alpha + 2*beta > 0".to_owned(),
        }
    }
}
