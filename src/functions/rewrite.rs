//! Rewrite-function exemplar: `applyByNode`.
//!
//! `applyByNode(seriesList, nodeNum, templateFunction, newName=None)`
//! evaluates its series argument, takes the first `nodeNum + 1`
//! dot-separated nodes of each series name, and substitutes that prefix
//! for every `%` in the template, producing new target strings. Each
//! target re-enters the whole pipeline (parse, plan, fetch, evaluate)
//! independently. Duplicate targets are emitted once, first occurrence
//! order kept.

use std::collections::HashSet;
use std::sync::Arc;

use crate::ast::Expr;
use crate::engine::eval::EvalContext;
use crate::engine::registry::{ParamKind, ParamMeta, Registration, RewriteFunction};
use crate::errors::EngineError;
use crate::series::FetchMap;

fn node_prefix(name: &str, node: usize) -> String {
    name.split('.')
        .take(node + 1)
        .collect::<Vec<&str>>()
        .join(".")
}

struct ApplyByNode;

impl RewriteFunction for ApplyByNode {
    fn rewrite(
        &self,
        ctx: &EvalContext<'_>,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<String>, EngineError> {
        let node = expr.int_arg(1)?;
        if node < 0 {
            return Err(EngineError::Eval(format!(
                "applyByNode: nodeNum must be non-negative, got {node}"
            )));
        }
        let template = expr.string_arg(2)?.to_string();
        let new_name = expr
            .named_or_pos_arg("newName", 3)
            .map(|_| expr.string_named_or_pos("newName", 3, ""))
            .transpose()?;

        let inputs = ctx.eval_series_arg(expr, 0, from, until, fetched)?;
        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        for series in &inputs {
            let prefix = node_prefix(&series.name, node as usize);
            let mut target = template.replace('%', &prefix);
            if let Some(new_name) = new_name {
                let alias = new_name.replace('%', &prefix);
                target = format!("alias({target},'{alias}')");
            }
            if seen.insert(target.clone()) {
                targets.push(target);
            }
        }
        Ok(targets)
    }
}

pub fn new() -> Vec<Registration> {
    vec![Registration::rewrite(
        "applyByNode",
        Arc::new(ApplyByNode),
        vec![
            ParamMeta::required("seriesList", ParamKind::Series),
            ParamMeta::required("nodeNum", ParamKind::Integer),
            ParamMeta::required("templateFunction", ParamKind::String),
            ParamMeta::optional("newName", ParamKind::String),
        ],
    )]
}
