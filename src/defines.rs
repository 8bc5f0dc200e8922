//! User-defined function templates ("defines").
//!
//! A define maps a function name to a textual template. When an expanded
//! query calls that name, the call's arguments are rendered into the
//! template, the result is re-parsed, and expansion recurses into the
//! spliced subtree. Expansion is textual on purpose: templates may build
//! names out of argument fragments ("servers.%{0}.cpu"), which no
//! tree-level substitution could express.
//!
//! Placeholders:
//! - `%{0}`, `%{1}`, ... : positional argument, canonical text
//! - `%{key}`            : named argument value
//! - `%{*}`              : the whole argument list, comma-joined

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::ast::{build_arg_text, Expr};
use crate::errors::EngineError;
use crate::syntax::{parse_with_options, ParserOptions};

/// Ceiling on nested expansions; mutually recursive defines hit this
/// instead of looping forever.
pub const MAX_EXPANSION_DEPTH: usize = 256;

/// Registry of define templates. Re-registering a name replaces the
/// previous template.
#[derive(Debug, Clone, Default)]
pub struct DefineRegistry {
    templates: HashMap<String, String>,
}

impl DefineRegistry {
    pub fn new() -> DefineRegistry {
        DefineRegistry::default()
    }

    pub fn define(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(name.into(), template.into());
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Expands every define call in `expr`, top-down, to a fixpoint bounded
    /// by `MAX_EXPANSION_DEPTH`. Non-call nodes and calls to names with no
    /// template pass through unchanged (children still expand).
    pub fn expand(&self, expr: &Expr, options: &ParserOptions) -> Result<Expr, EngineError> {
        if self.templates.is_empty() {
            return Ok(expr.clone());
        }
        self.expand_at(expr, options, 0)
    }

    fn expand_at(
        &self,
        expr: &Expr,
        options: &ParserOptions,
        depth: usize,
    ) -> Result<Expr, EngineError> {
        if depth > MAX_EXPANSION_DEPTH {
            return Err(EngineError::Eval(format!(
                "define expansion exceeded depth {MAX_EXPANSION_DEPTH} (recursive define?)"
            )));
        }
        let (name, args, named_args) = match expr {
            Expr::Func {
                name,
                args,
                named_args,
                ..
            } => (name, args, named_args),
            _ => return Ok(expr.clone()),
        };

        if let Some(template) = self.templates.get(name) {
            let rendered = render(template, name, args, named_args)?;
            debug!(define = %name, rendered = %rendered, "expanded define");
            let (parsed, rest) = parse_with_options(&rendered, options)?;
            if !rest.trim().is_empty() {
                return Err(EngineError::Eval(format!(
                    "define {name:?} rendered trailing garbage: {rest:?}"
                )));
            }
            return self.expand_at(&parsed, options, depth + 1);
        }

        // Not a define: expand the children. Named values are literals and
        // cannot contain calls, so only positional args recurse.
        let mut new_args = Vec::with_capacity(args.len());
        let mut changed = false;
        for arg in args {
            let expanded = self.expand_at(arg, options, depth + 1)?;
            changed |= expanded != *arg;
            new_args.push(expanded);
        }
        if !changed {
            return Ok(expr.clone());
        }
        Ok(Expr::func_named(name.clone(), new_args, named_args.clone()))
    }
}

fn render(
    template: &str,
    func_name: &str,
    args: &[Expr],
    named_args: &BTreeMap<String, Expr>,
) -> Result<String, EngineError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(i) = rest.find("%{") {
        out.push_str(&rest[..i]);
        let after = &rest[i + 2..];
        let close = after.find('}').ok_or_else(|| {
            EngineError::Eval(format!("define {func_name:?}: unterminated placeholder"))
        })?;
        let key = &after[..close];
        rest = &after[close + 1..];

        if key == "*" {
            out.push_str(&build_arg_text(args, named_args));
        } else if let Ok(index) = key.parse::<usize>() {
            let arg = args.get(index).ok_or_else(|| {
                EngineError::Eval(format!(
                    "define {func_name:?}: no argument for placeholder %{{{index}}}"
                ))
            })?;
            out.push_str(&arg.to_string());
        } else {
            let arg = named_args.get(key).ok_or_else(|| {
                EngineError::Eval(format!(
                    "define {func_name:?}: no argument for placeholder %{{{key}}}"
                ))
            })?;
            out.push_str(&arg.to_string());
        }
    }
    out.push_str(rest);
    Ok(out)
}
