use crate::numeric::Numeric;
use crate::tangent::Tangent;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// The atomic unit of the computation: a value, its tangent, and the
/// canonical symbol naming the expression it came from.
///
/// Nodes are immutable once built and never point at their operands; the
/// expression graph lives only in the symbol strings, which is what lets the
/// registry hand out one shared instance per distinct subexpression.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    symbol: String,
    value: f64,
    tangent: Tangent,
}

/// Shared handle to a registered node. Identity comparisons use
/// [`Rc::ptr_eq`].
pub type NodeRef = Rc<Node>;

impl Node {
    pub(crate) fn new(symbol: String, value: f64, tangent: Tangent) -> Self {
        Self {
            symbol,
            value,
            tangent,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn tangent(&self) -> &Tangent {
        &self.tangent
    }

    /// The scalar derivative, if this node runs in single-input mode.
    pub fn derivative(&self) -> Option<f64> {
        self.tangent.as_scalar()
    }

    /// Partial derivatives; a single entry in single-input mode.
    pub fn gradient(&self) -> &[f64] {
        self.tangent.as_slice()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}

/// Declarative description of an independent-variable leaf.
///
/// `derivative` is applied as-is unless `seed_vector` is present, in which
/// case it scales the seed into a multi-input tangent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafSpec {
    pub symbol: String,
    pub value: Numeric,
    #[serde(default = "LeafSpec::unit_derivative")]
    pub derivative: Numeric,
    #[serde(default)]
    pub seed_vector: Option<Vec<f64>>,
}

impl LeafSpec {
    fn unit_derivative() -> Numeric {
        Numeric::Int(1)
    }
}
