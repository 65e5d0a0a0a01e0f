//! The embedded expression language used in directives, interpolations
//! and action calls.
//!
//! Expressions are code: they can read everything in their `Scope`
//! and call methods. There is no sandboxing beyond that closed set of
//! bindings, so markup containing expressions must be trusted.

pub mod lexer;
pub mod parser;
pub mod value;
pub mod eval;

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use chj_util::nodt as dt;

use crate::error::EvaluationError;

pub use parser::{Expr, parse};
pub use value::Value;
pub use eval::Scope;

/// Parses each distinct source string once.
#[derive(Default)]
pub struct Evaluator {
    cache: RefCell<HashMap<String, Rc<Expr>>>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(&self, source: &str) -> Result<Rc<Expr>, EvaluationError> {
        if let Some(e) = self.cache.borrow().get(source) {
            return Ok(e.clone())
        }
        let e = Rc::new(parse(source)?);
        dt!("parsed {:?}: {:?}", source, e);
        self.cache.borrow_mut().insert(source.into(), e.clone());
        Ok(e)
    }

    pub fn evaluate(&self, source: &str, scope: &Scope) -> Result<Value, EvaluationError> {
        eval::eval(&*self.parse(source)?, scope)
    }

    pub fn evaluate_expr(&self, expr: &Expr, scope: &Scope) -> Result<Value, EvaluationError> {
        eval::eval(expr, scope)
    }

    pub fn cached_count(&self) -> usize {
        self.cache.borrow().len()
    }
}
