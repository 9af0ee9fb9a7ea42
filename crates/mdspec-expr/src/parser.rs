//! Recursive-descent parser producing [`Expr`] trees.
//!
//! Precedence, loosest first: `?:`, `||`, `&&`, relations (`== != < <= > >= in`),
//! additive, multiplicative, unary, postfix (member, index, call).

use serde_json::{Number, Value};

use crate::ast::{BinaryOp, Expr, MacroKind, UnaryOp};
use crate::error::{ExprError, Result};
use crate::lexer::{Spanned, Token, tokenize};

/// Deepest expression tree the parser accepts.
const MAX_DEPTH: usize = 256;

/// Parse a complete expression.
///
/// # Errors
/// Returns a lex or parse error describing the first problem found.
pub fn parse(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        len: source.len(),
        depth: 0,
    };
    let expr = parser.parse_expr()?;
    if let Some(extra) = parser.tokens.get(parser.pos) {
        return Err(ExprError::Parse {
            offset: extra.offset,
            message: format!("unexpected trailing token {:?}", extra.token),
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    len: usize,
    depth: usize,
}

impl Parser {
    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|spanned| &spanned.token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.len, |spanned| spanned.offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|spanned| spanned.token.clone());
        self.pos += 1;
        token
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(ExprError::Parse {
            offset: self.offset(),
            message: message.into(),
        })
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<()> {
        if self.current() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            self.error(format!("expected {what}"))
        }
    }

    /// Go one level deeper into the tree, failing past [`MAX_DEPTH`].
    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return self.error("expression nested too deeply");
        }
        Ok(())
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        let base = self.depth;
        self.descend()?;
        let expr = self.parse_conditional();
        self.depth = base;
        expr
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        let cond = self.parse_or()?;
        if self.current() != Some(&Token::Question) {
            return Ok(cond);
        }
        self.pos += 1;
        let then = self.parse_or()?;
        self.expect(&Token::Colon, "':' in conditional")?;
        let otherwise = self.parse_expr()?;
        Ok(Expr::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut left = self.parse_and()?;
        while self.current() == Some(&Token::OrOr) {
            self.pos += 1;
            self.descend()?;
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut left = self.parse_relation()?;
        while self.current() == Some(&Token::AndAnd) {
            self.pos += 1;
            self.descend()?;
            let right = self.parse_relation()?;
            left = binary(BinaryOp::And, left, right);
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_relation(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::LtEq) => BinaryOp::LtEq,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::GtEq) => BinaryOp::GtEq,
                Some(Token::In) => BinaryOp::In,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.current() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Neg,
            _ => return self.parse_postfix(),
        };
        self.pos += 1;
        let base = self.depth;
        self.descend()?;
        let operand = self.parse_unary()?;
        self.depth = base;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut expr = self.parse_primary()?;
        loop {
            match self.current() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    self.descend()?;
                    let Some(Token::Ident(name)) = self.advance() else {
                        self.pos -= 1;
                        return self.error("expected field or method name after '.'");
                    };
                    if self.current() == Some(&Token::LParen) {
                        self.pos += 1;
                        expr = self.parse_method(expr, name)?;
                    } else {
                        expr = Expr::Member {
                            target: Box::new(expr),
                            field: name,
                        };
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    self.descend()?;
                    let index = self.parse_expr()?;
                    self.expect(&Token::RBracket, "']'")?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => {
                    self.depth = base;
                    return Ok(expr);
                }
            }
        }
    }

    fn parse_method(&mut self, target: Expr, method: String) -> Result<Expr> {
        if let Some(kind) = MacroKind::from_name(&method) {
            let Some(Token::Ident(var)) = self.advance() else {
                self.pos -= 1;
                return self.error(format!("{method}() expects a loop variable"));
            };
            self.expect(&Token::Comma, "',' after loop variable")?;
            let body = self.parse_expr()?;
            self.expect(&Token::RParen, "')'")?;
            return Ok(Expr::Comprehension {
                target: Box::new(target),
                kind,
                var,
                body: Box::new(body),
            });
        }

        let args = self.parse_args(&Token::RParen)?;
        Ok(Expr::Method {
            target: Box::new(target),
            method,
            args,
        })
    }

    /// Parse a comma-separated list up to and including `close`.
    fn parse_args(&mut self, close: &Token) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.current() == Some(close) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match self.current() {
                Some(Token::Comma) => self.pos += 1,
                Some(token) if token == close => {
                    self.pos += 1;
                    return Ok(args);
                }
                _ => return self.error(format!("expected ',' or {close:?}")),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let Some(token) = self.advance() else {
            return self.error("unexpected end of expression");
        };
        match token {
            Token::Int(value) => Ok(Expr::Literal(Value::from(value))),
            Token::Float(value) => Number::from_f64(value).map_or_else(
                || self.error("non-finite float literal"),
                |number| Ok(Expr::Literal(Value::Number(number))),
            ),
            Token::Str(text) => Ok(Expr::Literal(Value::String(text))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::Ident(name) => {
                if self.current() == Some(&Token::LParen) {
                    self.pos += 1;
                    let args = self.parse_args(&Token::RParen)?;
                    Ok(Expr::Call {
                        function: name,
                        args,
                    })
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::LBracket => Ok(Expr::List(self.parse_args(&Token::RBracket)?)),
            Token::LBrace => self.parse_map(),
            other => {
                self.pos -= 1;
                self.error(format!("unexpected token {other:?}"))
            }
        }
    }

    fn parse_map(&mut self) -> Result<Expr> {
        let mut entries = Vec::new();
        if self.current() == Some(&Token::RBrace) {
            self.pos += 1;
            return Ok(Expr::Map(entries));
        }
        loop {
            let key = self.parse_expr()?;
            self.expect(&Token::Colon, "':' in map literal")?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            match self.current() {
                Some(Token::Comma) => self.pos += 1,
                Some(Token::RBrace) => {
                    self.pos += 1;
                    return Ok(Expr::Map(entries));
                }
                _ => return self.error("expected ',' or '}' in map literal"),
            }
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Expr {
        match parse(source) {
            Ok(expr) => expr,
            Err(error) => panic!("parse of {source:?} failed: {error}"),
        }
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = parse_ok("a || b && c");
        let Expr::Binary { op, right, .. } = expr else {
            panic!("expected binary expression");
        };
        assert_eq!(op, BinaryOp::Or);
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn test_method_call_on_member() {
        let expr = parse_ok(r#"json.items.contains("x")"#);
        let Expr::Method { target, method, args } = expr else {
            panic!("expected method call");
        };
        assert_eq!(method, "contains");
        assert_eq!(args.len(), 1);
        assert!(matches!(*target, Expr::Member { .. }));
    }

    #[test]
    fn test_comprehension() {
        let expr = parse_ok("json.all(item, item.ok)");
        assert!(matches!(
            expr,
            Expr::Comprehension {
                kind: MacroKind::All,
                ..
            }
        ));
    }

    #[test]
    fn test_negated_group() {
        let expr = parse_ok(r#"!(stdout.contains("error"))"#);
        assert!(matches!(expr, Expr::Unary { op: UnaryOp::Not, .. }));
    }

    #[test]
    fn test_conditional_and_literals() {
        let expr = parse_ok(r#"exitCode == 0 ? [1, 2.5, "x"] : {"k": null}"#);
        assert!(matches!(expr, Expr::Conditional { .. }));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(matches!(parse("a b"), Err(ExprError::Parse { offset: 2, .. })));
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let too_deep = [
            format!("{}true", "!".repeat(200_000)),
            format!("{}1", "(".repeat(100_000)),
            format!("{}1", "[".repeat(100_000)),
            format!("a{}", ".b".repeat(100_000)),
            vec!["true"; 100_000].join(" && "),
        ];
        for source in &too_deep {
            match parse(source) {
                Err(ExprError::Parse { message, .. }) => {
                    assert_eq!(message, "expression nested too deeply");
                }
                other => panic!("expected nesting error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_moderate_nesting_accepted() {
        parse_ok(&format!("{}true{}", "(".repeat(40), ")".repeat(40)));
        parse_ok(&format!("{}true", "!".repeat(MAX_DEPTH / 2)));
        parse_ok(&vec!["exitCode == 0"; 50].join(" && "));
    }

    #[test]
    fn test_unclosed_call_rejected() {
        assert!(parse("size(stdout").is_err());
    }
}
