use crate::error::{AdError, Result};
use crate::tangent::Tangent;
use serde::{Deserialize, Serialize};

/// A numeric input handed to a leaf constructor.
///
/// Leaf specifications often arrive from outside the type system (JSON
/// configs, bindings), so the constructor takes this loosely typed form and
/// validates it. Values accept `Int` and `Real`; tangents additionally
/// accept `Array`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Int(i64),
    Real(f64),
    Array(Vec<f64>),
}

impl Numeric {
    fn kind(&self) -> &'static str {
        match self {
            Numeric::Int(_) => "int",
            Numeric::Real(_) => "real",
            Numeric::Array(_) => "array",
        }
    }

    /// Validates `self` as a node value.
    pub fn into_value(self) -> Result<f64> {
        match self {
            Numeric::Int(i) => Ok(i as f64),
            Numeric::Real(r) if r.is_nan() => Err(AdError::TypeKind {
                field: "value",
                found: "NaN".to_string(),
            }),
            Numeric::Real(r) => Ok(r),
            other => Err(AdError::TypeKind {
                field: "value",
                found: other.kind().to_string(),
            }),
        }
    }

    /// Validates `self` as a tangent. An optional seed scales a scalar
    /// derivative into a multi-input tangent.
    pub fn into_tangent(self, seed: Option<&[f64]>) -> Result<Tangent> {
        let tangent = match self {
            Numeric::Int(i) => Tangent::Scalar(i as f64),
            Numeric::Real(r) if r.is_nan() => {
                return Err(AdError::TypeKind {
                    field: "tangent",
                    found: "NaN".to_string(),
                })
            }
            Numeric::Real(r) => Tangent::Scalar(r),
            Numeric::Array(a) if a.is_empty() => {
                return Err(AdError::TypeKind {
                    field: "tangent",
                    found: "empty array".to_string(),
                })
            }
            Numeric::Array(a) => Tangent::from(a),
        };

        match (seed, tangent) {
            (None, tangent) => Ok(tangent),
            (Some(seed), Tangent::Scalar(scale)) if !seed.is_empty() => {
                Ok(Tangent::seeded(scale, seed))
            }
            (Some(seed), tangent) => Err(AdError::shape(
                "seed vector",
                tangent.to_string(),
                format!("seed of length {}", seed.len()),
            )),
        }
    }
}

macro_rules! numeric_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Numeric {
            fn from(value: $t) -> Self {
                Numeric::Int(i64::from(value))
            }
        })*
    };
}

numeric_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for Numeric {
    fn from(value: f64) -> Self {
        Numeric::Real(value)
    }
}

impl From<f32> for Numeric {
    fn from(value: f32) -> Self {
        Numeric::Real(f64::from(value))
    }
}

impl From<Vec<f64>> for Numeric {
    fn from(value: Vec<f64>) -> Self {
        Numeric::Array(value)
    }
}

impl From<&[f64]> for Numeric {
    fn from(value: &[f64]) -> Self {
        Numeric::Array(value.to_vec())
    }
}
