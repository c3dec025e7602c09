use crate::error::{AdError, Result};
use nalgebra::DVector;
use std::fmt;

/// Derivative information carried alongside a node's value.
///
/// `Scalar` is the single-input mode: one derivative with respect to the one
/// independent variable. `Vector` is the multi-input mode: the gradient with
/// respect to all `m` declared inputs, seeded one-hot on each leaf.
///
/// `Zero` is the tangent of a constant. It has no shape of its own and
/// combines with either mode, so a literal or a constant-only subexpression
/// such as `sin(2)` can be cached once and reused everywhere.
///
/// Scalar and vector tangents never combine with each other, nor vectors of
/// different length; every binary operation checks shapes first and fails
/// with [`AdError::Shape`].
#[derive(Debug, Clone, PartialEq)]
pub enum Tangent {
    Zero,
    Scalar(f64),
    Vector(DVector<f64>),
}

impl Tangent {
    /// A seed `scale * e_i` of length `dim`.
    pub fn one_hot(scale: f64, index: usize, dim: usize) -> Result<Self> {
        if index >= dim {
            return Err(AdError::shape(
                "one-hot seed",
                format!("index {index}"),
                format!("vector({dim})"),
            ));
        }
        let mut seed = DVector::zeros(dim);
        seed[index] = scale;
        Ok(Tangent::Vector(seed))
    }

    /// A seed `scale * seed`, the multi-input leaf form.
    pub fn seeded(scale: f64, seed: &[f64]) -> Self {
        Tangent::Vector(DVector::from_iterator(
            seed.len(),
            seed.iter().map(|s| scale * s),
        ))
    }

    /// The zero tangent with the same shape as `self`.
    pub fn zero_like(&self) -> Self {
        match self {
            Tangent::Zero => Tangent::Zero,
            Tangent::Scalar(_) => Tangent::Scalar(0.0),
            Tangent::Vector(v) => Tangent::Vector(DVector::zeros(v.len())),
        }
    }

    /// Number of derivative components: 1 for scalar mode, 0 for a constant.
    pub fn dim(&self) -> usize {
        match self {
            Tangent::Zero => 0,
            Tangent::Scalar(_) => 1,
            Tangent::Vector(v) => v.len(),
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Tangent::Vector(_))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Tangent::Zero)
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Tangent::Zero => true,
            Tangent::Scalar(d) => *d == 0.0,
            Tangent::Vector(v) => v.iter().all(|d| *d == 0.0),
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            Tangent::Zero => true,
            Tangent::Scalar(d) => d.is_finite(),
            Tangent::Vector(v) => v.iter().all(|d| d.is_finite()),
        }
    }

    /// A constant reads as `0.0` in scalar mode.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Tangent::Zero => Some(0.0),
            Tangent::Scalar(d) => Some(*d),
            Tangent::Vector(_) => None,
        }
    }

    pub fn as_vector(&self) -> Option<&DVector<f64>> {
        match self {
            Tangent::Zero | Tangent::Scalar(_) => None,
            Tangent::Vector(v) => Some(v),
        }
    }

    /// Components as a slice, scalar mode and constants yielding a single
    /// entry.
    pub fn as_slice(&self) -> &[f64] {
        match self {
            Tangent::Zero => &[0.0],
            Tangent::Scalar(d) => std::slice::from_ref(d),
            Tangent::Vector(v) => v.as_slice(),
        }
    }

    /// Partial `j`; constants are zero in every direction.
    pub fn component(&self, j: usize) -> f64 {
        match self {
            Tangent::Zero => 0.0,
            Tangent::Scalar(d) if j == 0 => *d,
            Tangent::Scalar(_) => 0.0,
            Tangent::Vector(v) => v.get(j).copied().unwrap_or(0.0),
        }
    }

    pub fn scale(&self, k: f64) -> Self {
        match self {
            Tangent::Zero => Tangent::Zero,
            Tangent::Scalar(d) => Tangent::Scalar(k * d),
            Tangent::Vector(v) => Tangent::Vector(v * k),
        }
    }

    /// Chain rule for a unary function with local derivative `slope`.
    /// Components that are exactly zero stay zero, so an unbounded `slope`
    /// only poisons the directions the operand actually moves in.
    pub fn chain(&self, slope: f64) -> Self {
        let apply = |d: f64| if d == 0.0 { 0.0 } else { d * slope };
        match self {
            Tangent::Zero => Tangent::Zero,
            Tangent::Scalar(d) => Tangent::Scalar(apply(*d)),
            Tangent::Vector(v) => Tangent::Vector(v.map(apply)),
        }
    }

    /// `a * ta + b * tb`, the shape every chain-rule combination reduces to.
    pub fn linear(a: f64, ta: &Tangent, b: f64, tb: &Tangent, context: &str) -> Result<Self> {
        match (ta, tb) {
            (Tangent::Zero, t) => Ok(t.chain(b)),
            (t, Tangent::Zero) => Ok(t.chain(a)),
            (Tangent::Scalar(x), Tangent::Scalar(y)) => Ok(Tangent::Scalar(a * x + b * y)),
            (Tangent::Vector(x), Tangent::Vector(y)) if x.len() == y.len() => {
                Ok(Tangent::Vector(x * a + y * b))
            }
            _ => Err(AdError::shape(context, ta.to_string(), tb.to_string())),
        }
    }

    /// Fails unless `self` and `other` have the same shape class and length.
    /// A constant is compatible with everything.
    pub fn check_compatible(&self, other: &Tangent, context: &str) -> Result<()> {
        let compatible = match (self, other) {
            (Tangent::Zero, _) | (_, Tangent::Zero) => true,
            (Tangent::Scalar(_), Tangent::Scalar(_)) => true,
            (Tangent::Vector(x), Tangent::Vector(y)) => x.len() == y.len(),
            _ => false,
        };
        if compatible {
            Ok(())
        } else {
            Err(AdError::shape(context, self.to_string(), other.to_string()))
        }
    }
}

impl fmt::Display for Tangent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tangent::Zero => write!(f, "constant"),
            Tangent::Scalar(_) => write!(f, "scalar"),
            Tangent::Vector(v) => write!(f, "vector({})", v.len()),
        }
    }
}

impl From<f64> for Tangent {
    fn from(value: f64) -> Self {
        Tangent::Scalar(value)
    }
}

impl From<Vec<f64>> for Tangent {
    fn from(value: Vec<f64>) -> Self {
        Tangent::Vector(DVector::from_vec(value))
    }
}
