use crate::error::{AdError, Result};
use crate::node::NodeRef;
use crate::registry::Registry;
use crate::traits::Operand;

/// Protocol shared by every elementary function: form `"name(operand)"`,
/// return the cached node on a hit, otherwise resolve the operand (a bare
/// number becomes a constant leaf), check the domain, and register the value
/// together with `f'(x) * x'`. `rule` maps the operand value to
/// `(f(x), f'(x))`.
fn unary<F>(registry: &mut Registry, name: &str, symbol: String, x: impl Operand, rule: F) -> Result<NodeRef>
where
    F: FnOnce(f64) -> Result<(f64, f64)>,
{
    registry.memoize(symbol, name, |registry| {
        let x = x.resolve(registry)?;
        let (value, slope) = rule(x.value())?;
        // A constant direction stays constant even where f' is unbounded.
        let tangent = x.tangent().chain(slope);
        if !tangent.is_finite() {
            return Err(AdError::domain(
                name,
                x.value(),
                "points with a finite derivative",
            ));
        }
        Ok((value, tangent))
    })
}

fn call_symbol(name: &str, x: &impl Operand) -> String {
    format!("{name}({})", x.symbol())
}

pub fn sqrt(registry: &mut Registry, x: impl Operand) -> Result<NodeRef> {
    let symbol = call_symbol("sqrt", &x);
    unary(registry, "sqrt", symbol, x, |v| {
        if v < 0.0 {
            return Err(AdError::domain("sqrt", v, "[0, inf)"));
        }
        let root = v.sqrt();
        Ok((root, 1.0 / (2.0 * root)))
    })
}

pub fn ln(registry: &mut Registry, x: impl Operand) -> Result<NodeRef> {
    let symbol = call_symbol("ln", &x);
    unary(registry, "ln", symbol, x, |v| {
        if v <= 0.0 {
            return Err(AdError::domain("ln", v, "(0, inf)"));
        }
        Ok((v.ln(), 1.0 / v))
    })
}

/// Logarithm to `base`, registered as `"log{base}(operand)"`.
pub fn log(registry: &mut Registry, x: impl Operand, base: f64) -> Result<NodeRef> {
    if !(base > 1.0) || !base.is_finite() {
        return Err(AdError::domain("log base", base, "(1, inf)"));
    }
    let name = format!("log{base}");
    let symbol = call_symbol(&name, &x);
    unary(registry, &name, symbol, x, |v| {
        if v <= 0.0 {
            return Err(AdError::domain(format!("log{base}"), v, "(0, inf)"));
        }
        Ok((v.log(base), 1.0 / (v * base.ln())))
    })
}

pub fn log2(registry: &mut Registry, x: impl Operand) -> Result<NodeRef> {
    log(registry, x, 2.0)
}

pub fn log10(registry: &mut Registry, x: impl Operand) -> Result<NodeRef> {
    log(registry, x, 10.0)
}

pub fn exp(registry: &mut Registry, x: impl Operand) -> Result<NodeRef> {
    let symbol = call_symbol("exp", &x);
    unary(registry, "exp", symbol, x, |v| {
        let e = v.exp();
        Ok((e, e))
    })
}

pub fn sin(registry: &mut Registry, x: impl Operand) -> Result<NodeRef> {
    let symbol = call_symbol("sin", &x);
    unary(registry, "sin", symbol, x, |v| Ok((v.sin(), v.cos())))
}

pub fn cos(registry: &mut Registry, x: impl Operand) -> Result<NodeRef> {
    let symbol = call_symbol("cos", &x);
    unary(registry, "cos", symbol, x, |v| Ok((v.cos(), -v.sin())))
}

pub fn tan(registry: &mut Registry, x: impl Operand) -> Result<NodeRef> {
    let symbol = call_symbol("tan", &x);
    unary(registry, "tan", symbol, x, |v| {
        let c = v.cos();
        if c == 0.0 {
            return Err(AdError::domain("tan", v, "points where cos(x) != 0"));
        }
        Ok((v.tan(), 1.0 / (c * c)))
    })
}

pub fn arcsin(registry: &mut Registry, x: impl Operand) -> Result<NodeRef> {
    let symbol = call_symbol("arcsin", &x);
    unary(registry, "arcsin", symbol, x, |v| {
        if v.abs() > 1.0 {
            return Err(AdError::domain("arcsin", v, "[-1, 1]"));
        }
        Ok((v.asin(), 1.0 / (1.0 - v * v).sqrt()))
    })
}

pub fn arccos(registry: &mut Registry, x: impl Operand) -> Result<NodeRef> {
    let symbol = call_symbol("arccos", &x);
    unary(registry, "arccos", symbol, x, |v| {
        if v.abs() > 1.0 {
            return Err(AdError::domain("arccos", v, "[-1, 1]"));
        }
        Ok((v.acos(), -1.0 / (1.0 - v * v).sqrt()))
    })
}

pub fn arctan(registry: &mut Registry, x: impl Operand) -> Result<NodeRef> {
    let symbol = call_symbol("arctan", &x);
    unary(registry, "arctan", symbol, x, |v| Ok((v.atan(), 1.0 / (1.0 + v * v))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tangent::Tangent;
    use std::f64::consts::{E, FRAC_PI_2, FRAC_PI_4, PI};
    use std::rc::Rc;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-12,
            "expected {expected}, got {actual}"
        );
    }

    fn assert_domain_err(result: Result<NodeRef>, needle: &str) {
        let err = result.expect_err("expected domain error");
        assert!(matches!(err, AdError::Domain { .. }), "got {err:?}");
        let message = err.to_string();
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn sqrt_of_literals_and_nodes() {
        let mut registry = Registry::new();
        let four = sqrt(&mut registry, 4).expect("sqrt");
        assert_eq!(four.symbol(), "sqrt(4)");
        assert_eq!(four.value(), 2.0);
        assert_eq!(four.derivative(), Some(0.0));

        let x = registry.leaf("x", 9.0, 1.0).expect("leaf");
        let root = sqrt(&mut registry, &x).expect("sqrt");
        assert_eq!(root.value(), 3.0);
        assert_close(root.derivative().unwrap(), 1.0 / 6.0);
    }

    #[test]
    fn domain_boundaries() {
        let mut registry = Registry::new();
        let neg = registry.leaf("neg", -1.0, 0.0).expect("leaf");
        let zero = registry.leaf("zero", 0.0, 0.0).expect("leaf");
        let one = registry.leaf("one", 1.0, 0.0).expect("leaf");
        let two = registry.leaf("two", 2.0, 0.0).expect("leaf");

        assert_domain_err(sqrt(&mut registry, &neg), "[0, inf)");
        assert_domain_err(ln(&mut registry, &zero), "(0, inf)");
        assert_domain_err(arcsin(&mut registry, &two), "[-1, 1]");
        assert_domain_err(arccos(&mut registry, &two), "[-1, 1]");

        assert_eq!(sqrt(&mut registry, &zero).expect("sqrt(0)").value(), 0.0);
        assert_close(arcsin(&mut registry, &one).expect("arcsin(1)").value(), FRAC_PI_2);
        assert_close(arccos(&mut registry, &one).expect("arccos(1)").value(), 0.0);
    }

    #[test]
    fn failed_call_registers_nothing() {
        let mut registry = Registry::new();
        let neg = registry.leaf("neg", -1.0, 1.0).expect("leaf");
        let before = registry.len();
        assert!(sqrt(&mut registry, &neg).is_err());
        assert_eq!(registry.len(), before);
        assert!(!registry.contains("sqrt(neg)"));
    }

    #[test]
    fn unbounded_derivative_with_moving_operand_is_rejected() {
        let mut registry = Registry::new();
        let x = registry.leaf("x", 1.0, 1.0).expect("leaf");
        assert_domain_err(arcsin(&mut registry, &x), "finite derivative");
    }

    #[test]
    fn logarithms() {
        let mut registry = Registry::new();
        let x = registry.leaf("x", 10.0, 1.0).expect("leaf");

        let natural = ln(&mut registry, &x).expect("ln");
        assert_close(natural.value(), 10.0_f64.ln());
        assert_close(natural.derivative().unwrap(), 0.1);

        let common = log10(&mut registry, &x).expect("log10");
        assert_eq!(common.symbol(), "log10(x)");
        assert_close(common.value(), 1.0);
        assert_close(common.derivative().unwrap(), 0.043429448190325175);

        let binary = log2(&mut registry, 1).expect("log2");
        assert_eq!(binary.symbol(), "log2(1)");
        assert_eq!(binary.value(), 0.0);
    }

    #[test]
    fn log_base_must_exceed_one() {
        let mut registry = Registry::new();
        assert_domain_err(log(&mut registry, 4.0, 1.0), "(1, inf)");
        assert_domain_err(log(&mut registry, 4.0, 0.5), "(1, inf)");
        assert_domain_err(log(&mut registry, -4.0, 2.0), "(0, inf)");
        assert!(log(&mut registry, 4.0, 1.5).is_ok());
    }

    #[test]
    fn exp_and_trig_derivatives() {
        let mut registry = Registry::new();
        let x = registry.leaf("x", FRAC_PI_4, 1.0).expect("leaf");

        let e = exp(&mut registry, 1).expect("exp");
        assert_close(e.value(), E);

        let s = sin(&mut registry, &x).expect("sin");
        assert_close(s.derivative().unwrap(), FRAC_PI_4.cos());

        let c = cos(&mut registry, &x).expect("cos");
        assert_close(c.derivative().unwrap(), -FRAC_PI_4.sin());

        let t = tan(&mut registry, &x).expect("tan");
        assert_close(t.value(), 1.0);
        assert_close(t.derivative().unwrap(), 2.0);

        let a = arctan(&mut registry, 1).expect("arctan");
        assert_close(a.value(), FRAC_PI_4);
    }

    #[test]
    fn inverse_trig_derivatives() {
        let mut registry = Registry::new();
        let x = registry.leaf("x", 0.5, 1.0).expect("leaf");
        let slope = 1.0 / (1.0 - 0.25_f64).sqrt();
        assert_close(arcsin(&mut registry, &x).unwrap().derivative().unwrap(), slope);
        assert_close(arccos(&mut registry, &x).unwrap().derivative().unwrap(), -slope);
        assert_close(arctan(&mut registry, &x).unwrap().derivative().unwrap(), 0.8);
    }

    #[test]
    fn chain_rule_through_sin() {
        let mut registry = Registry::new();
        let x = registry.leaf("x", PI, 1.0).expect("leaf");
        let s = sin(&mut registry, &x).expect("sin");
        let f = registry.add(&s, &x).expect("add");
        assert_close(f.value(), PI.sin() + PI);
        assert_close(f.derivative().unwrap(), 0.0);
    }

    #[test]
    fn repeated_calls_hit_the_cache() {
        let mut registry = Registry::new();
        let x = registry.leaf("x", 0.3, 1.0).expect("leaf");
        let first = exp(&mut registry, &x).expect("exp");
        let evaluations = registry.stats().evaluations;
        let second = exp(&mut registry, &x).expect("exp");
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(registry.stats().evaluations, evaluations);
    }

    #[test]
    fn vector_tangents_are_scaled_elementwise() {
        let mut registry = Registry::new();
        let x = registry
            .make_seeded_node("x", 0.0, 1, &[1.0, 0.0], false)
            .expect("leaf");
        let e = exp(&mut registry, &x).expect("exp");
        assert_eq!(e.tangent(), &Tangent::from(vec![1.0, 0.0]));
    }
}
