use crate::elementary;
use crate::error::{AdError, Result};
use crate::node::NodeRef;
use crate::ops::BinaryOp;
use crate::registry::Registry;
use crate::traits::Operand;
use std::borrow::Cow;
use std::collections::HashMap;

/// Abstract Syntax Tree for expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Neg(Box<Expr>),
    Call(String, Vec<Expr>),
}

/// Functions callable from expression text, with their arity.
const FUNCTIONS: &[(&str, usize)] = &[
    ("sqrt", 1),
    ("ln", 1),
    ("exp", 1),
    ("sin", 1),
    ("cos", 1),
    ("tan", 1),
    ("arcsin", 1),
    ("arccos", 1),
    ("arctan", 1),
    ("log2", 1),
    ("log10", 1),
];

/// An evaluated sub-expression. Bare numbers stay literals so that they keep
/// their own text in composite symbols and can serve as a `log` base.
enum Term {
    Node(NodeRef),
    Literal(f64),
}

impl Operand for Term {
    fn symbol(&self) -> Cow<'_, str> {
        match self {
            Term::Node(n) => Operand::symbol(n),
            Term::Literal(v) => Operand::symbol(v),
        }
    }

    fn resolve(&self, registry: &mut Registry) -> Result<NodeRef> {
        match self {
            Term::Node(n) => n.resolve(registry),
            Term::Literal(v) => v.resolve(registry),
        }
    }
}

impl Expr {
    /// Evaluates the tree into registered nodes.
    ///
    /// Names resolve against `scope` first and then against registered
    /// symbols. Structurally identical sub-trees hit the registry cache.
    pub fn build(&self, registry: &mut Registry, scope: &HashMap<String, NodeRef>) -> Result<NodeRef> {
        let term = self.term(registry, scope)?;
        term.resolve(registry)
    }

    fn term(&self, registry: &mut Registry, scope: &HashMap<String, NodeRef>) -> Result<Term> {
        match self {
            Expr::Number(n) => Ok(Term::Literal(*n)),
            Expr::Variable(name) => scope
                .get(name)
                .cloned()
                .or_else(|| registry.get(name))
                .map(Term::Node)
                .ok_or_else(|| AdError::UnknownSymbol {
                    symbol: name.clone(),
                }),
            Expr::Neg(inner) => match inner.as_ref() {
                Expr::Number(n) => Ok(Term::Literal(-n)),
                other => {
                    let operand = other.term(registry, scope)?;
                    registry.neg(operand).map(Term::Node)
                }
            },
            Expr::Binary(left, op, right) => {
                let lhs = left.term(registry, scope)?;
                let rhs = right.term(registry, scope)?;
                registry.binary(*op, lhs, rhs).map(Term::Node)
            }
            Expr::Call(func, args) => call(func, args, registry, scope).map(Term::Node),
        }
    }
}

fn call(
    func: &str,
    args: &[Expr],
    registry: &mut Registry,
    scope: &HashMap<String, NodeRef>,
) -> Result<NodeRef> {
    if func == "log" {
        return match args {
            [x] => {
                let x = x.term(registry, scope)?;
                elementary::ln(registry, x)
            }
            [x, base] => {
                let base = match base.term(registry, scope)? {
                    Term::Literal(b) => b,
                    Term::Node(_) => {
                        return Err(AdError::TypeKind {
                            field: "log base",
                            found: "node".to_string(),
                        })
                    }
                };
                let x = x.term(registry, scope)?;
                elementary::log(registry, x, base)
            }
            _ => Err(AdError::UnknownSymbol {
                symbol: format!("log/{}", args.len()),
            }),
        };
    }

    let [arg] = args else {
        return Err(AdError::UnknownSymbol {
            symbol: format!("{func}/{}", args.len()),
        });
    };
    let x = arg.term(registry, scope)?;
    match func {
        "sqrt" => elementary::sqrt(registry, x),
        "ln" => elementary::ln(registry, x),
        "exp" => elementary::exp(registry, x),
        "sin" => elementary::sin(registry, x),
        "cos" => elementary::cos(registry, x),
        "tan" => elementary::tan(registry, x),
        "arcsin" => elementary::arcsin(registry, x),
        "arccos" => elementary::arccos(registry, x),
        "arctan" => elementary::arctan(registry, x),
        "log2" => elementary::log2(registry, x),
        "log10" => elementary::log10(registry, x),
        _ => Err(AdError::UnknownSymbol {
            symbol: func.to_string(),
        }),
    }
}

/// Parses and builds `source` in one step.
pub fn evaluate(
    registry: &mut Registry,
    source: &str,
    scope: &HashMap<String, NodeRef>,
) -> Result<NodeRef> {
    parse(source)?.build(registry, scope)
}

// --- Parser ---

/// Parses a string expression into an AST.
pub fn parse(input: &str) -> Result<Expr> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
    };
    let expr = parser.parse_expression()?;
    match parser.peek() {
        None => Ok(expr),
        Some(_) => Err(parser.error("unexpected trailing input")),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Comma,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut num_str = String::new();
            while let Some(&(_, d)) = chars.peek() {
                let exponent_sign = (d == '+' || d == '-') && num_str.ends_with(['e', 'E']);
                if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exponent_sign {
                    num_str.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            let value = num_str.parse::<f64>().map_err(|_| AdError::Parse {
                message: format!("invalid number '{num_str}'"),
                position: pos,
            })?;
            tokens.push((Token::Number(value), pos));
        } else if c.is_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push((Token::Identifier(ident), pos));
        } else {
            chars.next();
            let token = match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => {
                    if let Some(&(_, '*')) = chars.peek() {
                        chars.next();
                        Token::Caret
                    } else {
                        Token::Star
                    }
                }
                '/' => Token::Slash,
                '^' => Token::Caret,
                ',' => Token::Comma,
                '(' => Token::LParen,
                ')' => Token::RParen,
                other => {
                    return Err(AdError::Parse {
                        message: format!("unexpected character '{other}'"),
                        position: pos,
                    })
                }
            };
            tokens.push((token, pos));
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(_, p)| *p)
    }

    fn error(&self, message: &str) -> AdError {
        AdError::Parse {
            message: message.to_string(),
            position: self.position(),
        }
    }

    fn expect(&mut self, token: Token, message: &str) -> Result<()> {
        if self.peek() == Some(&token) {
            self.consume();
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    fn parse_expression(&mut self) -> Result<Expr> {
        let mut left = self.parse_term()?;

        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.consume();
            let right = self.parse_term()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            let expr = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(expr)));
        }
        self.parse_power()
    }

    // Right-associative; the exponent may carry its own sign.
    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(Box::new(base), BinaryOp::Pow, Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let start = self.position();
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume();
                    let args = self.parse_arguments()?;
                    check_arity(&name, args.len(), start)?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                self.expect(Token::RParen, "expected ')'")?;
                Ok(expr)
            }
            _ => Err(AdError::Parse {
                message: "unexpected token".to_string(),
                position: start,
            }),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = vec![self.parse_expression()?];
        while let Some(Token::Comma) = self.peek() {
            self.consume();
            args.push(self.parse_expression()?);
        }
        self.expect(Token::RParen, "expected ')'")?;
        Ok(args)
    }
}

fn check_arity(name: &str, given: usize, position: usize) -> Result<()> {
    let accepted = if name == "log" {
        given == 1 || given == 2
    } else {
        match FUNCTIONS.iter().find(|(f, _)| *f == name) {
            Some((_, arity)) => given == *arity,
            None => {
                return Err(AdError::Parse {
                    message: format!("unknown function '{name}'"),
                    position,
                })
            }
        }
    };
    if accepted {
        Ok(())
    } else {
        Err(AdError::Parse {
            message: format!("wrong number of arguments ({given}) for '{name}'"),
            position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{evaluate, parse, Expr};
    use crate::error::AdError;
    use crate::ops::BinaryOp;
    use crate::registry::Registry;
    use std::collections::HashMap;
    use std::rc::Rc;

    fn assert_err_contains<T: std::fmt::Debug>(result: crate::error::Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn precedence_and_associativity() {
        let expr = parse("-x^2").expect("parse");
        assert_eq!(
            expr,
            Expr::Neg(Box::new(Expr::Binary(
                Box::new(Expr::Variable("x".into())),
                BinaryOp::Pow,
                Box::new(Expr::Number(2.0)),
            )))
        );

        let expr = parse("2 ** 3 ^ 2").expect("parse");
        let Expr::Binary(_, BinaryOp::Pow, exponent) = expr else {
            panic!("expected power");
        };
        assert!(matches!(*exponent, Expr::Binary(_, BinaryOp::Pow, _)));
    }

    #[test]
    fn builds_nodes_from_registered_leaves() {
        let mut registry = Registry::new();
        registry.leaf("x", 2.0, 1.0).expect("leaf");
        let scope = HashMap::new();

        let f = evaluate(&mut registry, "x*x + 3*x - 1", &scope).expect("evaluate");
        assert_eq!(f.value(), 9.0);
        assert_eq!(f.derivative(), Some(7.0));

        let again = evaluate(&mut registry, "x*x + 3*x - 1", &scope).expect("evaluate");
        assert!(Rc::ptr_eq(&f, &again));
    }

    #[test]
    fn scope_takes_precedence_over_registry() {
        let mut registry = Registry::new();
        registry.leaf("x", 2.0, 1.0).expect("leaf");
        let y = registry.leaf("y", 5.0, 0.0).expect("leaf");
        let scope = HashMap::from([("x".to_string(), y)]);
        let f = evaluate(&mut registry, "sin(x)", &scope).expect("evaluate");
        assert_eq!(f.symbol(), "sin(y)");
    }

    #[test]
    fn function_calls_and_log_bases() {
        let mut registry = Registry::new();
        registry.leaf("x", 100.0, 1.0).expect("leaf");
        let scope = HashMap::new();

        let common = evaluate(&mut registry, "log(x, 10)", &scope).expect("log");
        assert_eq!(common.symbol(), "log10(x)");
        assert!((common.value() - 2.0).abs() < 1e-12);

        let natural = evaluate(&mut registry, "log(x)", &scope).expect("ln");
        assert_eq!(natural.symbol(), "ln(x)");

        let root = evaluate(&mut registry, "sqrt(x) / 2e1", &scope).expect("sqrt");
        assert!((root.value() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn errors_carry_positions_and_names() {
        assert_err_contains(parse("x + $"), "position 4");
        assert_err_contains(parse("sin(x"), "expected ')'");
        assert_err_contains(parse("foo(x)"), "unknown function 'foo'");
        assert_err_contains(parse("sin(x, y)"), "wrong number of arguments");
        assert_err_contains(parse("x y"), "trailing input");

        let mut registry = Registry::new();
        let err = evaluate(&mut registry, "z + 1", &HashMap::new()).expect_err("unknown");
        assert_eq!(
            err,
            AdError::UnknownSymbol {
                symbol: "z".to_string()
            }
        );
    }

    #[test]
    fn literals_combine_with_vector_operands() {
        let mut registry = Registry::new();
        registry
            .variables(&[("a", 1.0), ("b", 2.0)])
            .expect("variables");
        registry.leaf("x", 3.0, 1.0).expect("leaf");
        let scope = HashMap::new();

        let scalar = evaluate(&mut registry, "x*2 + sin(2)", &scope).expect("scalar mode");
        assert_eq!(scalar.derivative(), Some(2.0));

        let f = evaluate(&mut registry, "2*a + b^2 + sin(2)", &scope).expect("vector mode");
        assert_eq!(f.gradient(), &[2.0, 4.0]);
    }

    #[test]
    fn domain_errors_surface_from_build() {
        let mut registry = Registry::new();
        registry.leaf("x", -4.0, 1.0).expect("leaf");
        let err = evaluate(&mut registry, "sqrt(x)", &HashMap::new()).expect_err("domain");
        assert!(matches!(err, AdError::Domain { .. }));
    }
}
