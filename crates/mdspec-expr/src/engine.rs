//! The narrow seam between callers and the expression language.
//!
//! Callers compile once against a [`BindingSchema`] and evaluate the
//! resulting [`Program`] against concrete [`Bindings`]. Swapping the
//! expression language means providing another [`ExpressionEngine`].

use std::collections::BTreeSet;
use std::fmt::Debug;

use serde_json::Value;

use crate::ast::Expr;
use crate::error::{ExprError, Result};
use crate::eval::{Bindings, evaluate};
use crate::parser::parse;

/// Names an expression is allowed to reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingSchema {
    names: Option<BTreeSet<String>>,
}

impl BindingSchema {
    /// Schema that only admits the given names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    /// Schema that admits any name; unbound names fail at evaluation instead.
    #[must_use]
    pub fn open() -> Self {
        Self { names: None }
    }

    /// Schema admitting exactly the keys of `bindings`.
    #[must_use]
    pub fn from_bindings(bindings: &Bindings) -> Self {
        Self::new(bindings.keys().cloned())
    }

    /// Whether `name` may be referenced.
    #[must_use]
    pub fn admits(&self, name: &str) -> bool {
        self.names.as_ref().is_none_or(|names| names.contains(name))
    }
}

/// A compiled expression ready for repeated evaluation.
pub trait Program: Send + Sync + Debug {
    /// Source text the program was compiled from.
    fn source(&self) -> &str;

    /// Evaluate against concrete bindings.
    ///
    /// # Errors
    /// Returns an error when evaluation fails (missing keys, type errors, ...).
    fn eval(&self, bindings: &Bindings) -> Result<Value>;
}

/// An expression language implementation.
pub trait ExpressionEngine: Send + Sync + Debug {
    /// Short identifier of the language.
    fn name(&self) -> &'static str;

    /// Compile `source`, rejecting references outside `schema`.
    ///
    /// # Errors
    /// Returns a lex, parse or undeclared-variable error.
    fn compile(&self, source: &str, schema: &BindingSchema) -> Result<Box<dyn Program>>;
}

/// The built-in CEL-flavoured engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct CelEngine;

impl CelEngine {
    /// Create the engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ExpressionEngine for CelEngine {
    fn name(&self) -> &'static str {
        "cel"
    }

    fn compile(&self, source: &str, schema: &BindingSchema) -> Result<Box<dyn Program>> {
        let expr = parse(source)?;
        let mut bound = Vec::new();
        check_free_variables(&expr, schema, &mut bound)?;
        Ok(Box::new(CelProgram {
            source: source.to_owned(),
            expr,
        }))
    }
}

#[derive(Debug)]
struct CelProgram {
    source: String,
    expr: Expr,
}

impl Program for CelProgram {
    fn source(&self) -> &str {
        &self.source
    }

    fn eval(&self, bindings: &Bindings) -> Result<Value> {
        evaluate(&self.expr, bindings)
    }
}

/// Walk `expr` and fail on the first identifier neither bound by an
/// enclosing comprehension nor admitted by `schema`.
fn check_free_variables(
    expr: &Expr,
    schema: &BindingSchema,
    bound: &mut Vec<String>,
) -> Result<()> {
    match expr {
        Expr::Literal(_) => Ok(()),
        Expr::Ident(name) => {
            if bound.iter().any(|local| local == name) || schema.admits(name) {
                Ok(())
            } else {
                Err(ExprError::UndeclaredVariable(name.clone()))
            }
        }
        Expr::List(items) => items
            .iter()
            .try_for_each(|item| check_free_variables(item, schema, bound)),
        Expr::Map(entries) => entries.iter().try_for_each(|(key, value)| {
            check_free_variables(key, schema, bound)?;
            check_free_variables(value, schema, bound)
        }),
        Expr::Member { target, .. } => check_free_variables(target, schema, bound),
        Expr::Index { target, index } => {
            check_free_variables(target, schema, bound)?;
            check_free_variables(index, schema, bound)
        }
        Expr::Call { args, .. } => args
            .iter()
            .try_for_each(|arg| check_free_variables(arg, schema, bound)),
        Expr::Method { target, args, .. } => {
            check_free_variables(target, schema, bound)?;
            args.iter()
                .try_for_each(|arg| check_free_variables(arg, schema, bound))
        }
        Expr::Comprehension {
            target, var, body, ..
        } => {
            check_free_variables(target, schema, bound)?;
            bound.push(var.clone());
            let outcome = check_free_variables(body, schema, bound);
            bound.pop();
            outcome
        }
        Expr::Unary { operand, .. } => check_free_variables(operand, schema, bound),
        Expr::Binary { left, right, .. } => {
            check_free_variables(left, schema, bound)?;
            check_free_variables(right, schema, bound)
        }
        Expr::Conditional {
            cond,
            then,
            otherwise,
        } => {
            check_free_variables(cond, schema, bound)?;
            check_free_variables(then, schema, bound)?;
            check_free_variables(otherwise, schema, bound)
        }
    }
}
