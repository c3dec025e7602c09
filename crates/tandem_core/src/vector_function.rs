use crate::error::{AdError, Result};
use crate::node::NodeRef;
use crate::registry::Registry;
use nalgebra::{DMatrix, DVector};
use std::fmt;

/// Stacks scalar outputs into `F: R^m -> R^n`.
///
/// `value` holds the n outputs and `jacobian` the n x m matrix whose i-th row
/// is the tangent of output i. Both are computed once at construction; the
/// assembler never touches a registry.
#[derive(Debug, Clone)]
pub struct VectorFunction {
    components: Vec<NodeRef>,
    value: DVector<f64>,
    jacobian: DMatrix<f64>,
}

impl VectorFunction {
    /// Fails with [`AdError::Shape`] when `components` is empty or when the
    /// tangents do not all share one shape. Constant components fit any
    /// shape and give a zero row. Scalar-mode or all-constant components
    /// give an n x 1 Jacobian.
    pub fn new(components: Vec<NodeRef>) -> Result<Self> {
        if components.is_empty() {
            return Err(AdError::shape(
                "vector function",
                "0 components",
                "at least one component",
            ));
        }
        let reference = components
            .iter()
            .map(|c| c.tangent())
            .find(|t| !t.is_constant());
        if let Some(reference) = reference {
            for component in &components {
                reference.check_compatible(
                    component.tangent(),
                    &format!("vector function component {}", component.symbol()),
                )?;
            }
        }

        let n = components.len();
        let m = reference.map_or(1, |t| t.dim());
        let value = DVector::from_iterator(n, components.iter().map(|c| c.value()));
        let jacobian = DMatrix::from_fn(n, m, |i, j| components[i].tangent().component(j));

        Ok(Self {
            components,
            value,
            jacobian,
        })
    }

    pub fn components(&self) -> &[NodeRef] {
        &self.components
    }

    pub fn value(&self) -> &DVector<f64> {
        &self.value
    }

    pub fn jacobian(&self) -> &DMatrix<f64> {
        &self.jacobian
    }

    pub fn outputs(&self) -> usize {
        self.jacobian.nrows()
    }

    pub fn inputs(&self) -> usize {
        self.jacobian.ncols()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.symbol()).collect()
    }
}

impl fmt::Display for VectorFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.symbols().join(", "))
    }
}

/// Declares `inputs` as one-hot seeded variables, evaluates `f` on them in a
/// single forward pass and assembles the outputs.
pub fn jacobian<F>(registry: &mut Registry, inputs: &[(&str, f64)], f: F) -> Result<VectorFunction>
where
    F: FnOnce(&mut Registry, &[NodeRef]) -> Result<Vec<NodeRef>>,
{
    let vars = registry.variables(inputs)?;
    let outputs = f(registry, &vars)?;
    VectorFunction::new(outputs)
}
