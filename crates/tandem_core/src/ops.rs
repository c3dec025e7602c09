use crate::error::{AdError, Result};
use crate::node::NodeRef;
use crate::registry::Registry;
use crate::tangent::Tangent;
use crate::traits::Operand;
use std::fmt;

/// Arithmetic on nodes.
///
/// Each operation forms a canonical symbol from its operands, consults the
/// registry, and only on a miss evaluates the value and tangent with the
/// chain rule. Commutative operators sort their operand symbols, so `a+b`
/// and `b+a` resolve to one cached node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn is_commutative(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Mul)
    }

    fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Pow => "pow",
        }
    }

    /// Canonical symbol for `lhs <op> rhs`.
    pub fn symbol(self, lhs: &str, rhs: &str) -> String {
        if self.is_commutative() && rhs < lhs {
            format!("({rhs}{self}{lhs})")
        } else {
            format!("({lhs}{self}{rhs})")
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "**",
        };
        f.write_str(token)
    }
}

impl Registry {
    pub fn add(&mut self, lhs: impl Operand, rhs: impl Operand) -> Result<NodeRef> {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn sub(&mut self, lhs: impl Operand, rhs: impl Operand) -> Result<NodeRef> {
        self.binary(BinaryOp::Sub, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: impl Operand, rhs: impl Operand) -> Result<NodeRef> {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    pub fn div(&mut self, lhs: impl Operand, rhs: impl Operand) -> Result<NodeRef> {
        self.binary(BinaryOp::Div, lhs, rhs)
    }

    /// `base ** exponent`, with the exponent treated as a node.
    pub fn pow(&mut self, base: impl Operand, exponent: impl Operand) -> Result<NodeRef> {
        self.binary(BinaryOp::Pow, base, exponent)
    }

    pub fn neg(&mut self, operand: impl Operand) -> Result<NodeRef> {
        let symbol = format!("-{}", operand.symbol());
        self.memoize(symbol, "neg", |registry| {
            let a = operand.resolve(registry)?;
            Ok((-a.value(), a.tangent().scale(-1.0)))
        })
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: impl Operand, rhs: impl Operand) -> Result<NodeRef> {
        let symbol = op.symbol(&lhs.symbol(), &rhs.symbol());
        self.memoize(symbol, op.name(), |registry| {
            let a = lhs.resolve(registry)?;
            let b = rhs.resolve(registry)?;
            a.tangent().check_compatible(b.tangent(), op.name())?;
            evaluate(op, a.value(), a.tangent(), b.value(), b.tangent())
        })
    }
}

fn evaluate(op: BinaryOp, a: f64, ta: &Tangent, b: f64, tb: &Tangent) -> Result<(f64, Tangent)> {
    let name = op.name();
    match op {
        BinaryOp::Add => Ok((a + b, Tangent::linear(1.0, ta, 1.0, tb, name)?)),
        BinaryOp::Sub => Ok((a - b, Tangent::linear(1.0, ta, -1.0, tb, name)?)),
        BinaryOp::Mul => Ok((a * b, Tangent::linear(b, ta, a, tb, name)?)),
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(AdError::domain("division", b, "divisors other than 0"));
            }
            let tangent = Tangent::linear(1.0 / b, ta, -a / (b * b), tb, name)?;
            Ok((a / b, tangent))
        }
        BinaryOp::Pow => power(a, ta, b, tb),
    }
}

/// `d(a^b) = a^b * (b' ln a + a' b / a)`, reduced to the classical power
/// rule `b a^(b-1) a'` when the exponent is constant.
fn power(a: f64, ta: &Tangent, b: f64, tb: &Tangent) -> Result<(f64, Tangent)> {
    let value = a.powf(b);
    if value.is_nan() {
        return Err(AdError::domain(
            "pow",
            a,
            "non-negative bases for fractional exponents",
        ));
    }
    if a == 0.0 && value.is_infinite() {
        return Err(AdError::domain("pow", a, "nonzero bases for negative exponents"));
    }

    if tb.is_zero() {
        if ta.is_zero() || b == 0.0 {
            return Ok((value, ta.zero_like()));
        }
        let slope = b * a.powf(b - 1.0);
        if !slope.is_finite() {
            return Err(AdError::domain(
                "pow",
                a,
                "bases with a finite power-rule derivative",
            ));
        }
        return Ok((value, ta.scale(slope)));
    }

    if a <= 0.0 {
        return Err(AdError::domain("pow", a, "(0, inf) for a variable exponent"));
    }
    let tangent = Tangent::linear(value * b / a, ta, value * a.ln(), tb, "pow")?;
    Ok((value, tangent))
}
