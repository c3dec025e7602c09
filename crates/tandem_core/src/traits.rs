use crate::error::{AdError, Result};
use crate::node::NodeRef;
use crate::registry::{literal_symbol, Registry};
use num_traits::ToPrimitive;
use std::borrow::Cow;

/// Anything that can stand in an operand position: a registered node or a
/// bare numeric literal.
///
/// The symbol is available before resolution so that composite symbols can
/// be formed, and looked up, without touching the operand's value.
pub trait Operand {
    /// Text this operand contributes to a composite symbol.
    fn symbol(&self) -> Cow<'_, str>;

    /// Resolves to a registered node. Literals become constant leaves
    /// whose tangent fits either mode.
    fn resolve(&self, registry: &mut Registry) -> Result<NodeRef>;
}

impl Operand for NodeRef {
    fn symbol(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_ref().symbol())
    }

    fn resolve(&self, _registry: &mut Registry) -> Result<NodeRef> {
        Ok(NodeRef::clone(self))
    }
}

impl<T: Operand + ?Sized> Operand for &T {
    fn symbol(&self) -> Cow<'_, str> {
        (**self).symbol()
    }

    fn resolve(&self, registry: &mut Registry) -> Result<NodeRef> {
        (**self).resolve(registry)
    }
}

macro_rules! literal_operand {
    ($($t:ty),*) => {
        $(impl Operand for $t {
            // Keyed by the widened value so that `0.1_f32` and `0.1_f64`
            // stay distinct.
            fn symbol(&self) -> Cow<'_, str> {
                match self.to_f64() {
                    Some(value) => Cow::Owned(literal_symbol(value)),
                    None => Cow::Owned(self.to_string()),
                }
            }

            fn resolve(&self, registry: &mut Registry) -> Result<NodeRef> {
                let value = self.to_f64().ok_or_else(|| AdError::TypeKind {
                    field: "value",
                    found: stringify!($t).to_string(),
                })?;
                registry.literal(value)
            }
        })*
    };
}

literal_operand!(f64, f32, i32, i64, u32, u64, usize);
