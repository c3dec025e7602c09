//! The `tandem_core` crate is a forward-mode automatic differentiation engine.
//! Every intermediate result is a [`Node`] carrying its value and tangent,
//! registered under a canonical symbol so that repeated sub-expressions are
//! evaluated once.
//!
//! Key components:
//! - **Registry**: symbol-keyed node cache with an overwrite toggle and hit statistics.
//! - **Operand**: nodes and bare numbers in operand position; numbers become constant leaves.
//! - **Elementary**: `sqrt`, logarithms, `exp` and the (inverse) trigonometric functions.
//! - **VectorFunction**: stacks scalar outputs into a value vector and Jacobian.
//! - **Graph / Var**: operator syntax over a shared registry.
//! - **Expression**: a small parser building nodes from text such as `"x*y + sin(x)"`.

pub mod elementary;
pub mod error;
pub mod expression;
pub mod graph;
pub mod node;
pub mod numeric;
pub mod ops;
pub mod registry;
pub mod tangent;
pub mod traits;
pub mod vector_function;

pub use error::{AdError, Result};
pub use expression::{evaluate, parse, Expr};
pub use graph::{Graph, Var};
pub use node::{LeafSpec, Node, NodeRef};
pub use numeric::Numeric;
pub use ops::BinaryOp;
pub use registry::{Registry, RegistryConfig, RegistryStats};
pub use tangent::Tangent;
pub use traits::Operand;
pub use vector_function::{jacobian, VectorFunction};
