use crate::elementary;
use crate::error::{AdError, Result};
use crate::node::{LeafSpec, NodeRef};
use crate::ops::BinaryOp;
use crate::registry::{Registry, RegistryConfig, RegistryStats};
use crate::vector_function::VectorFunction;
use std::cell::RefCell;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

/// A shared registry handle for operator-style construction.
///
/// A `Graph` shares one registry between many [`Var`] handles so that
/// `&x * &y + x.sin()` reads like the math. Rust operators cannot return
/// `Result`, so a `Var` latches the first error of the computation that
/// produced it and every value derived from it carries that error on.
///
/// ```
/// use tandem_core::Graph;
///
/// let graph = Graph::new();
/// let x = graph.variable("x", 2.0, 1.0);
/// let f = &x * &x + 3.0 * &x;
/// assert_eq!(f.value().unwrap(), 10.0);
/// assert_eq!(f.derivative().unwrap(), Some(7.0));
/// ```
#[derive(Clone, Default)]
pub struct Graph {
    registry: Rc<RefCell<Registry>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self::from_registry(Registry::with_config(config))
    }

    pub fn from_registry(registry: Registry) -> Self {
        Self {
            registry: Rc::new(RefCell::new(registry)),
        }
    }

    // Inspection returns snapshots; a borrow held across a `Var` operator
    // would make it panic.
    pub fn len(&self) -> usize {
        self.registry.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.borrow().is_empty()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.registry.borrow().contains(symbol)
    }

    pub fn stats(&self) -> RegistryStats {
        self.registry.borrow().stats()
    }

    /// The registered node for `symbol`, bound to this graph.
    pub fn get(&self, symbol: &str) -> Option<Var> {
        let node = self.registry.borrow().get(symbol)?;
        Some(self.wrap(Ok(node)))
    }

    pub fn clear(&self) {
        self.registry.borrow_mut().clear();
    }

    pub fn set_overwrite_mode(&self, enabled: bool) {
        self.registry.borrow_mut().set_overwrite_mode(enabled);
    }

    /// Single-input leaf.
    pub fn variable(&self, symbol: &str, value: f64, derivative: f64) -> Var {
        let node = self.registry.borrow_mut().leaf(symbol, value, derivative);
        self.wrap(node)
    }

    /// Multi-input leaf with tangent `seed`.
    pub fn seeded(&self, symbol: &str, value: f64, seed: &[f64]) -> Var {
        let node = self
            .registry
            .borrow_mut()
            .make_seeded_node(symbol, value, 1, seed, false);
        self.wrap(node)
    }

    pub fn declare(&self, spec: &LeafSpec) -> Var {
        let node = self.registry.borrow_mut().declare(spec);
        self.wrap(node)
    }

    /// One-hot seeded inputs, see [`Registry::variables`].
    pub fn variables(&self, inputs: &[(&str, f64)]) -> Result<Vec<Var>> {
        let nodes = self.registry.borrow_mut().variables(inputs)?;
        Ok(nodes.into_iter().map(|n| self.wrap(Ok(n))).collect())
    }

    /// Wraps an already registered node.
    pub fn var(&self, node: NodeRef) -> Var {
        self.wrap(Ok(node))
    }

    pub fn vector_function(&self, outputs: &[Var]) -> Result<VectorFunction> {
        let nodes = outputs.iter().map(Var::node).collect::<Result<Vec<_>>>()?;
        VectorFunction::new(nodes)
    }

    fn wrap(&self, node: Result<NodeRef>) -> Var {
        Var {
            registry: Rc::clone(&self.registry),
            node,
        }
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.registry.borrow().len())
            .finish()
    }
}

/// A node bound to the graph it was built in, or the error that prevented
/// it from being built.
#[derive(Clone)]
pub struct Var {
    registry: Rc<RefCell<Registry>>,
    node: Result<NodeRef>,
}

impl Var {
    pub fn node(&self) -> Result<NodeRef> {
        self.node.clone()
    }

    pub fn error(&self) -> Option<&AdError> {
        self.node.as_ref().err()
    }

    pub fn value(&self) -> Result<f64> {
        self.node.as_ref().map(|n| n.value()).map_err(Clone::clone)
    }

    pub fn derivative(&self) -> Result<Option<f64>> {
        self.node.as_ref().map(|n| n.derivative()).map_err(Clone::clone)
    }

    pub fn gradient(&self) -> Result<Vec<f64>> {
        self.node
            .as_ref()
            .map(|n| n.gradient().to_vec())
            .map_err(Clone::clone)
    }

    pub fn symbol(&self) -> Result<String> {
        self.node
            .as_ref()
            .map(|n| n.symbol().to_string())
            .map_err(Clone::clone)
    }

    /// Identity, not structural, equality.
    pub fn same_node(&self, other: &Var) -> bool {
        match (&self.node, &other.node) {
            (Ok(a), Ok(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn lift<F>(&self, f: F) -> Var
    where
        F: FnOnce(&mut Registry, &NodeRef) -> Result<NodeRef>,
    {
        let node = match &self.node {
            Ok(n) => f(&mut *self.registry.borrow_mut(), n),
            Err(e) => Err(e.clone()),
        };
        Var {
            registry: Rc::clone(&self.registry),
            node,
        }
    }

    fn combine(&self, op: BinaryOp, other: &Var) -> Var {
        self.lift(|registry, lhs| match &other.node {
            Ok(rhs) => registry.binary(op, lhs, rhs),
            Err(e) => Err(e.clone()),
        })
    }

    fn combine_literal(&self, op: BinaryOp, literal: f64, literal_on_left: bool) -> Var {
        self.lift(|registry, node| {
            if literal_on_left {
                registry.binary(op, literal, node)
            } else {
                registry.binary(op, node, literal)
            }
        })
    }

    pub fn pow(&self, exponent: &Var) -> Var {
        self.combine(BinaryOp::Pow, exponent)
    }

    pub fn powf(&self, exponent: f64) -> Var {
        self.combine_literal(BinaryOp::Pow, exponent, false)
    }

    pub fn sqrt(&self) -> Var {
        self.lift(|r, x| elementary::sqrt(r, x))
    }

    pub fn ln(&self) -> Var {
        self.lift(|r, x| elementary::ln(r, x))
    }

    pub fn log(&self, base: f64) -> Var {
        self.lift(|r, x| elementary::log(r, x, base))
    }

    pub fn exp(&self) -> Var {
        self.lift(|r, x| elementary::exp(r, x))
    }

    pub fn sin(&self) -> Var {
        self.lift(|r, x| elementary::sin(r, x))
    }

    pub fn cos(&self) -> Var {
        self.lift(|r, x| elementary::cos(r, x))
    }

    pub fn tan(&self) -> Var {
        self.lift(|r, x| elementary::tan(r, x))
    }

    pub fn arcsin(&self) -> Var {
        self.lift(|r, x| elementary::arcsin(r, x))
    }

    pub fn arccos(&self) -> Var {
        self.lift(|r, x| elementary::arccos(r, x))
    }

    pub fn arctan(&self) -> Var {
        self.lift(|r, x| elementary::arctan(r, x))
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Ok(n) => write!(f, "Var({}, {}, {})", n.symbol(), n.value(), n.tangent()),
            Err(e) => write!(f, "Var(error: {e})"),
        }
    }
}

macro_rules! var_binary_op {
    ($tr:ident, $method:ident, $op:expr) => {
        impl $tr<Var> for Var {
            type Output = Var;
            fn $method(self, rhs: Var) -> Var {
                self.combine($op, &rhs)
            }
        }

        impl $tr<&Var> for Var {
            type Output = Var;
            fn $method(self, rhs: &Var) -> Var {
                self.combine($op, rhs)
            }
        }

        impl $tr<Var> for &Var {
            type Output = Var;
            fn $method(self, rhs: Var) -> Var {
                self.combine($op, &rhs)
            }
        }

        impl<'a, 'b> $tr<&'b Var> for &'a Var {
            type Output = Var;
            fn $method(self, rhs: &'b Var) -> Var {
                self.combine($op, rhs)
            }
        }

        impl $tr<f64> for Var {
            type Output = Var;
            fn $method(self, rhs: f64) -> Var {
                self.combine_literal($op, rhs, false)
            }
        }

        impl $tr<f64> for &Var {
            type Output = Var;
            fn $method(self, rhs: f64) -> Var {
                self.combine_literal($op, rhs, false)
            }
        }

        impl $tr<Var> for f64 {
            type Output = Var;
            fn $method(self, rhs: Var) -> Var {
                rhs.combine_literal($op, self, true)
            }
        }

        impl $tr<&Var> for f64 {
            type Output = Var;
            fn $method(self, rhs: &Var) -> Var {
                rhs.combine_literal($op, self, true)
            }
        }
    };
}

var_binary_op!(Add, add, BinaryOp::Add);
var_binary_op!(Sub, sub, BinaryOp::Sub);
var_binary_op!(Mul, mul, BinaryOp::Mul);
var_binary_op!(Div, div, BinaryOp::Div);

impl Neg for Var {
    type Output = Var;
    fn neg(self) -> Var {
        self.lift(|r, x| r.neg(x))
    }
}

impl Neg for &Var {
    type Output = Var;
    fn neg(self) -> Var {
        self.lift(|r, x| r.neg(x))
    }
}

#[cfg(test)]
mod tests {
    use super::Graph;
    use crate::error::AdError;
    use crate::node::LeafSpec;
    use std::f64::consts::PI;

    #[test]
    fn operators_build_the_same_nodes_as_named_calls() {
        let graph = Graph::new();
        let x = graph.variable("x", 3.0, 1.0);
        let y = graph.variable("y", 4.0, 0.0);

        let f = &x * &y + &x;
        assert_eq!(f.symbol().unwrap(), "((x*y)+x)");
        assert_eq!(f.value().unwrap(), 15.0);
        assert_eq!(f.derivative().unwrap(), Some(5.0));

        let g = &y * &x + &x;
        assert!(f.same_node(&g));
    }

    #[test]
    fn scalar_on_either_side() {
        let graph = Graph::new();
        let x = graph.variable("x", 2.0, 1.0);
        let left = 1.0 - &x;
        let right = &x - 1.0;
        assert_eq!(left.symbol().unwrap(), "(1-x)");
        assert_eq!(right.symbol().unwrap(), "(x-1)");
        assert!((2.0 * &x).same_node(&(&x * 2.0)));
        assert_eq!((1.0 / &x).derivative().unwrap(), Some(-0.25));
    }

    #[test]
    fn errors_latch_through_later_operations() {
        let graph = Graph::new();
        let x = graph.variable("x", -1.0, 1.0);
        let f = x.sqrt() + &x * 2.0;
        assert!(matches!(f.error(), Some(AdError::Domain { .. })));
        assert!(f.value().is_err());
        assert!(!graph.contains("(sqrt(x)+(2*x))"));
    }

    #[test]
    fn seeded_inputs_produce_a_jacobian() {
        let graph = Graph::new();
        let vars = graph
            .variables(&[("x1", PI), ("x2", PI / 2.0)])
            .expect("variables");
        let (x1, x2) = (&vars[0], &vars[1]);

        let f1 = x1 * x2 + x1.sin();
        let f2 = x1 + x2 + (x1 * x2).sin();
        let f = graph.vector_function(&[f1, f2]).expect("assembled");

        let j = f.jacobian();
        let c = (PI * PI / 2.0).cos();
        assert!((j[(0, 0)] - (PI / 2.0 + PI.cos())).abs() < 1e-9);
        assert!((j[(0, 1)] - PI).abs() < 1e-9);
        assert!((j[(1, 0)] - (1.0 + PI / 2.0 * c)).abs() < 1e-9);
        assert!((j[(1, 1)] - (1.0 + PI * c)).abs() < 1e-9);
    }

    #[test]
    fn power_and_logs() {
        let graph = Graph::new();
        let x = graph.variable("x", 8.0, 1.0);
        let cube_root = x.powf(1.0 / 3.0);
        assert!((cube_root.value().unwrap() - 2.0).abs() < 1e-12);

        let l = x.log(2.0);
        assert_eq!(l.symbol().unwrap(), "log2(x)");
        assert!((l.value().unwrap() - 3.0).abs() < 1e-12);

        let p = x.pow(&x.ln());
        assert!(p.value().is_ok());
    }

    #[test]
    fn inspection_between_operations() {
        let graph = Graph::new();
        let x = graph.variable("x", 2.0, 1.0);
        let before = graph.stats();
        assert!(graph.contains("x"));

        let doubled = &x + &x;
        assert_eq!(doubled.value().unwrap(), 4.0);
        assert_eq!(graph.stats().evaluations, before.evaluations + 1);

        let again = graph.get("(x+x)").expect("registered");
        assert!(again.same_node(&doubled));
        assert!(graph.get("(x*x)").is_none());
    }

    #[test]
    fn declared_leaves_join_the_graph() {
        let graph = Graph::new();
        let spec: LeafSpec =
            serde_json::from_str(r#"{"symbol": "a", "value": 2, "seed_vector": [1, 0]}"#)
                .expect("leaf spec");
        let a = graph.declare(&spec);
        let f = 3.0 * &a;
        assert_eq!(f.gradient().unwrap(), vec![3.0, 0.0]);
    }

    #[test]
    fn clear_through_graph() {
        let graph = Graph::new();
        let x = graph.variable("x", 1.0, 1.0);
        graph.clear();
        let again = graph.variable("x", 1.0, 1.0);
        assert!(!x.same_node(&again));
        assert_eq!(graph.len(), 1);
    }
}
