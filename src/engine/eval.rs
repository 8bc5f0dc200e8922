//! Evaluator core: the recursive AST interpreter.
//!
//! Evaluation is synchronous and CPU-only. All data arrives through the
//! caller-built `FetchMap`; the evaluator performs no I/O. Function
//! implementations re-enter `eval_expr` for their series arguments, so the
//! evaluator and the function modules recurse through each other, bounded
//! by the context's depth limit.

use std::cell::Cell;

use tracing::{debug, trace};

use crate::ast::{Expr, MetricRequest};
use crate::engine::registry::Registry;
use crate::errors::EngineError;
use crate::series::{FetchMap, Series};

/// Depth bound applied when the caller does not configure one.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Per-evaluation state: the registry to dispatch through and the recursion
/// guard. Cheap to construct, one per query.
pub struct EvalContext<'a> {
    registry: &'a Registry,
    max_depth: usize,
    depth: Cell<usize>,
}

impl<'a> EvalContext<'a> {
    pub fn new(registry: &'a Registry) -> EvalContext<'a> {
        EvalContext::with_max_depth(registry, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(registry: &'a Registry, max_depth: usize) -> EvalContext<'a> {
        EvalContext {
            registry,
            max_depth,
            depth: Cell::new(0),
        }
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// Evaluates `expr` over `[from, until)` against caller-fetched data.
    ///
    /// - Name leaf: looked up in the fetch map under exactly these bounds;
    ///   a miss yields an empty list, not an error.
    /// - Const leaf: synthesized one-point series carrying the literal.
    /// - Bool/QuotedString: have no series value, evaluation error.
    /// - Func: dispatched through the registry.
    pub fn eval_expr(
        &self,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        let depth = self.depth.get();
        if depth >= self.max_depth {
            return Err(EngineError::Eval(format!(
                "expression nesting exceeds depth limit {}",
                self.max_depth
            )));
        }
        self.depth.set(depth + 1);
        let result = self.eval_inner(expr, from, until, fetched);
        self.depth.set(depth);
        result
    }

    fn eval_inner(
        &self,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        match expr {
            Expr::Name { target } => {
                let key = MetricRequest::new(target.clone(), from, until);
                match fetched.get(&key) {
                    Some(series) => Ok(series.clone()),
                    None => {
                        trace!(metric = %target, from, until, "fetch map miss");
                        Ok(Vec::new())
                    }
                }
            }
            Expr::Const { value, literal } => {
                let step = (until - from).max(1);
                Ok(vec![Series::new(literal.clone(), from, step, vec![*value])])
            }
            Expr::QuotedString { .. } | Expr::Bool { .. } => Err(EngineError::Eval(format!(
                "literal {expr} cannot be evaluated as a series"
            ))),
            Expr::Func { name, args, .. } => {
                if args.is_empty() {
                    return Err(EngineError::MissingArgument {
                        function: name.clone(),
                        index: 0,
                    });
                }
                let function = self
                    .registry
                    .series_function(name)
                    .ok_or_else(|| EngineError::UnknownFunction(name.clone()))?;
                function.eval(self, expr, from, until, fetched)
            }
        }
    }

    /// Evaluates positional argument `n` of a call as a series list. The
    /// standard entry point for function implementations.
    pub fn eval_series_arg(
        &self,
        expr: &Expr,
        n: usize,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        let arg = expr.arg(n).ok_or_else(|| EngineError::MissingArgument {
            function: expr.target().to_string(),
            index: n,
        })?;
        self.eval_expr(arg, from, until, fetched)
    }

    /// Checks the outermost call against the rewrite map. A match returns
    /// `(true, targets)`; each target string re-enters the whole pipeline
    /// independently. Anything else returns `(false, [])` and the caller
    /// evaluates the expression normally.
    pub fn rewrite_expr(
        &self,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<(bool, Vec<String>), EngineError> {
        if let Expr::Func { name, .. } = expr {
            if let Some(function) = self.registry.rewrite_function(name) {
                let targets = function.rewrite(self, expr, from, until, fetched)?;
                debug!(function = %name, fanout = targets.len(), "rewrite fan-out");
                return Ok((true, targets));
            }
        }
        Ok((false, Vec::new()))
    }
}
