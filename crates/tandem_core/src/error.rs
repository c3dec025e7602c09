use thiserror::Error;

/// Errors raised while constructing nodes or assembling vector functions.
///
/// Every failure aborts only the construction it belongs to; nodes that were
/// already registered stay valid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdError {
    /// A value or tangent was supplied in a numeric kind the node cannot hold.
    #[error("unsupported type '{found}' for {field} attribute of a node")]
    TypeKind { field: &'static str, found: String },

    /// An input lies outside the mathematical domain of a function, or a
    /// derivative rule hit a singular denominator.
    #[error("value {value} is not within the domain {domain} of {function}")]
    Domain {
        function: String,
        value: f64,
        domain: &'static str,
    },

    /// Two tangents with different shapes met in one operation.
    #[error("tangent shape mismatch in {context}: {left} vs {right}")]
    Shape {
        context: String,
        left: String,
        right: String,
    },

    /// An expression referenced a name that is neither in scope nor registered.
    #[error("unknown symbol '{symbol}'")]
    UnknownSymbol { symbol: String },

    /// An expression string could not be parsed.
    #[error("parse error at position {position}: {message}")]
    Parse { message: String, position: usize },
}

impl AdError {
    pub(crate) fn domain(function: impl Into<String>, value: f64, domain: &'static str) -> Self {
        AdError::Domain {
            function: function.into(),
            value,
            domain,
        }
    }

    pub(crate) fn shape(
        context: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        AdError::Shape {
            context: context.into(),
            left: left.into(),
            right: right.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AdError>;
