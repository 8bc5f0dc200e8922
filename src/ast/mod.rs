//! AST module for the Anthracite expression language.
//!
//! Provides the core expression tree produced by the parser, constructors
//! for building trees programmatically, canonical string reconstruction,
//! and the `MetricRequest` key that correlates AST leaves with fetched
//! series data.

use std::collections::BTreeMap;
use std::fmt;

pub mod accessors;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// A parsed expression node.
///
/// Trees are exclusively owned: every child lives inside its parent, there
/// is no sharing and no cycles. Nodes are created per query and discarded
/// after evaluation.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A metric pattern reference requiring externally fetched data,
    /// e.g. `servers.*.cpu.load` or an opaque `seriesByTag(...)` capture.
    Name { target: String },
    /// A numeric literal. The original text is kept so canonical printing
    /// round-trips (`1e3` stays `1e3`).
    Const { value: f64, literal: String },
    /// A quoted string literal (interval specs, reducer names, aliases).
    QuotedString { value: String },
    /// A bare `true`/`false` literal (any case).
    Bool { value: bool },
    /// A function call with positional and named arguments.
    Func {
        name: String,
        args: Vec<Expr>,
        named_args: BTreeMap<String, Expr>,
        /// Raw source substring between the parentheses, used for
        /// canonical-name reconstruction. A printing cache, not semantics:
        /// structural equality ignores it.
        arg_text: String,
    },
}

/// The fetch key correlating an AST leaf with externally fetched data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricRequest {
    pub metric: String,
    pub from: i64,
    pub until: i64,
}

impl MetricRequest {
    pub fn new(metric: impl Into<String>, from: i64, until: i64) -> Self {
        MetricRequest {
            metric: metric.into(),
            from,
            until,
        }
    }
}

// ============================================================================
// CONSTRUCTORS
// ============================================================================

impl Expr {
    pub fn name(target: impl Into<String>) -> Expr {
        Expr::Name {
            target: target.into(),
        }
    }

    pub fn constant(value: f64) -> Expr {
        Expr::Const {
            value,
            literal: format_const(value),
        }
    }

    pub fn string(value: impl Into<String>) -> Expr {
        Expr::QuotedString {
            value: value.into(),
        }
    }

    pub fn boolean(value: bool) -> Expr {
        Expr::Bool { value }
    }

    pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::func_named(name, args, BTreeMap::new())
    }

    pub fn func_named(
        name: impl Into<String>,
        args: Vec<Expr>,
        named_args: BTreeMap<String, Expr>,
    ) -> Expr {
        let arg_text = build_arg_text(&args, &named_args);
        Expr::Func {
            name: name.into(),
            args,
            named_args,
            arg_text,
        }
    }

    /// The metric pattern of a Name leaf or the function name of a call.
    /// Literals have no target and return the empty string.
    pub fn target(&self) -> &str {
        match self {
            Expr::Name { target } => target,
            Expr::Func { name, .. } => name,
            Expr::Const { .. } | Expr::QuotedString { .. } | Expr::Bool { .. } => "",
        }
    }

    pub fn is_name(&self) -> bool {
        matches!(self, Expr::Name { .. })
    }

    pub fn is_func(&self) -> bool {
        matches!(self, Expr::Func { .. })
    }
}

/// Joins positional and named arguments into a canonical argument string.
/// Used when a Func node is built programmatically (pipe desugaring, macro
/// expansion, constructors) rather than parsed from source.
pub(crate) fn build_arg_text(args: &[Expr], named_args: &BTreeMap<String, Expr>) -> String {
    let mut parts: Vec<String> = args.iter().map(Expr::to_string).collect();
    for (key, value) in named_args {
        parts.push(format!("{key}={value}"));
    }
    parts.join(",")
}

fn format_const(value: f64) -> String {
    // Rust's Display for f64 already prints the shortest round-trip form.
    format!("{value}")
}

// ============================================================================
// EQUALITY AND PRINTING
// ============================================================================

// Structural equality: `arg_text` is excluded so that e.g. "a|b(1)" and
// "b(a,1)" compare equal, as do trees parsed from differently-spaced source.
impl PartialEq for Expr {
    fn eq(&self, other: &Expr) -> bool {
        match (self, other) {
            (Expr::Name { target: a }, Expr::Name { target: b }) => a == b,
            (Expr::Const { value: a, .. }, Expr::Const { value: b, .. }) => a == b,
            (Expr::QuotedString { value: a }, Expr::QuotedString { value: b }) => a == b,
            (Expr::Bool { value: a }, Expr::Bool { value: b }) => a == b,
            (
                Expr::Func {
                    name: an,
                    args: aa,
                    named_args: ana,
                    ..
                },
                Expr::Func {
                    name: bn,
                    args: ba,
                    named_args: bna,
                    ..
                },
            ) => an == bn && aa == ba && ana == bna,
            _ => false,
        }
    }
}

impl fmt::Display for Expr {
    /// Canonical reconstruction. For any macro-free tree, reparsing the
    /// canonical string yields a structurally equal tree.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Name { target } => f.write_str(target),
            Expr::Const { literal, .. } => f.write_str(literal),
            Expr::QuotedString { value } => write!(f, "'{value}'"),
            Expr::Bool { value } => write!(f, "{value}"),
            Expr::Func { name, arg_text, .. } => write!(f, "{name}({arg_text})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructed_func_prints_canonically() {
        let e = Expr::func(
            "sumSeries",
            vec![Expr::name("a.b"), Expr::constant(2.0), Expr::string("5min")],
        );
        assert_eq!(e.to_string(), "sumSeries(a.b,2,'5min')");
    }

    #[test]
    fn named_args_print_after_positional() {
        let mut named = BTreeMap::new();
        named.insert("alignToFrom".to_string(), Expr::boolean(true));
        let e = Expr::func_named(
            "summarize",
            vec![Expr::name("m"), Expr::string("1h")],
            named,
        );
        assert_eq!(e.to_string(), "summarize(m,'1h',alignToFrom=true)");
    }

    #[test]
    fn equality_ignores_arg_text() {
        let a = Expr::Func {
            name: "f".into(),
            args: vec![Expr::name("m")],
            named_args: BTreeMap::new(),
            arg_text: "m".into(),
        };
        let b = Expr::Func {
            name: "f".into(),
            args: vec![Expr::name("m")],
            named_args: BTreeMap::new(),
            arg_text: " m ".into(),
        };
        assert_eq!(a, b);
    }
}
