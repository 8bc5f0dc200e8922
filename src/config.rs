//! Engine configuration and the top-level `Engine` facade.
//!
//! Configuration is YAML:
//!
//! ```yaml
//! defines:
//!   - name: perMinute
//!     template: "scale(%{0},0.016666666666666666)"
//! unicode_ranges: [greek, cyrillic]
//! max_depth: 256
//! ```
//!
//! `Engine::new` assembles parser options, the define registry, and a
//! fully-registered function registry from one config value, so callers
//! hold a single object for the whole parse → plan → evaluate pipeline.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::ast::{Expr, MetricRequest};
use crate::defines::DefineRegistry;
use crate::engine::eval::{EvalContext, DEFAULT_MAX_DEPTH};
use crate::engine::plan;
use crate::engine::registry::Registry;
use crate::errors::EngineError;
use crate::functions;
use crate::series::{FetchMap, Series};
use crate::syntax::{parse_with_options, ParserOptions};

#[derive(Debug, Clone, Deserialize)]
pub struct DefineEntry {
    pub name: String,
    pub template: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub defines: Vec<DefineEntry>,
    pub unicode_ranges: Vec<String>,
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            defines: Vec::new(),
            unicode_ranges: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(text: &str) -> Result<EngineConfig, EngineError> {
        serde_yaml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<EngineConfig, EngineError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.as_ref().display())))?;
        EngineConfig::from_yaml_str(&text)
    }
}

/// The assembled query engine: parser options, defines, and the function
/// registry, with the standard pipeline as methods.
pub struct Engine {
    options: ParserOptions,
    defines: DefineRegistry,
    registry: Registry,
    max_depth: usize,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Engine, EngineError> {
        let options = ParserOptions::with_named_ranges(&config.unicode_ranges)?;
        let mut defines = DefineRegistry::new();
        for entry in &config.defines {
            debug!(define = %entry.name, "loaded define");
            defines.define(&entry.name, &entry.template);
        }
        let registry = Registry::new();
        functions::register_all(&registry);
        Ok(Engine {
            options,
            defines,
            registry,
            max_depth: config.max_depth,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn parser_options(&self) -> &ParserOptions {
        &self.options
    }

    /// Parses one complete query target and expands its defines. Trailing
    /// input after the expression is an error here, unlike the raw parser
    /// which returns the remainder.
    pub fn parse_target(&self, target: &str) -> Result<Expr, EngineError> {
        let (expr, rest) = parse_with_options(target, &self.options)?;
        let rest = rest.trim_start_matches(' ');
        if let Some(found) = rest.chars().next() {
            let at = target.len() - rest.len();
            return Err(EngineError::UnexpectedChar {
                found,
                at: (at, found.len_utf8()).into(),
            });
        }
        self.defines.expand(&expr, &self.options)
    }

    /// The fetches the expression needs over `[from, until)`.
    pub fn metrics(
        &self,
        expr: &Expr,
        from: i64,
        until: i64,
    ) -> Result<Vec<MetricRequest>, EngineError> {
        plan::metrics(expr, from, until)
    }

    pub fn eval(
        &self,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        EvalContext::with_max_depth(&self.registry, self.max_depth)
            .eval_expr(expr, from, until, fetched)
    }

    pub fn rewrite(
        &self,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<(bool, Vec<String>), EngineError> {
        EvalContext::with_max_depth(&self.registry, self.max_depth)
            .rewrite_expr(expr, from, until, fetched)
    }
}

impl Default for Engine {
    fn default() -> Engine {
        // the default config has no unicode ranges to fail on
        Engine::new(EngineConfig::default()).unwrap_or_else(|_| unreachable!())
    }
}
