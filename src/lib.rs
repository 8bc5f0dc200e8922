//! # Anthracite
//!
//! A Graphite-compatible time-series query engine: it parses the
//! function-call expression DSL, plans which `(pattern, from, until)`
//! fetches an expression needs, and evaluates the expression tree over
//! caller-fetched series data. It performs no I/O of its own; the fetch
//! layer and any rendering sit outside.
//!
//! ## Pipeline
//!
//! 1. **Parse** — `syntax::parse` turns query text into an [`Expr`] tree,
//!    with pipe desugaring (`a|b(1)` ≡ `b(a,1)`).
//! 2. **Expand** — [`DefineRegistry`] rewrites user-defined macro calls.
//! 3. **Plan** — [`metrics`] walks the tree and reports every
//!    [`MetricRequest`] the caller must fetch, with per-function time
//!    adjustments (moving windows, forecasting bootstrap, time shifts).
//! 4. **Fetch** — the caller populates a [`FetchMap`] from storage.
//! 5. **Evaluate** — [`EvalContext::eval_expr`] interprets the tree,
//!    dispatching calls through the [`Registry`]; or
//!    [`EvalContext::rewrite_expr`] fans a rewrite call out into new
//!    target strings that re-enter the pipeline.
//!
//! [`Engine`] bundles steps 1–3 and 5 behind one configured object.
//!
//! ## Example
//!
//! ```
//! use anthracite::{Engine, FetchMap, Series};
//!
//! let engine = Engine::default();
//! let expr = engine.parse_target("scale(app.requests,2)")?;
//!
//! let mut fetched = FetchMap::new();
//! for request in engine.metrics(&expr, 0, 60)? {
//!     fetched.insert(request, vec![Series::new("app.requests", 0, 60, vec![21.0])]);
//! }
//!
//! let out = engine.eval(&expr, 0, 60, &fetched)?;
//! assert_eq!(out[0].values, vec![42.0]);
//! # Ok::<(), anthracite::EngineError>(())
//! ```

pub mod ast;
pub mod config;
pub mod consolidation;
pub mod defines;
pub mod engine;
pub mod errors;
pub mod functions;
pub mod series;
pub mod syntax;

pub use ast::{Expr, MetricRequest};
pub use config::{Engine, EngineConfig};
pub use defines::DefineRegistry;
pub use engine::{
    metrics, EvalContext, ParamKind, ParamMeta, RegisterOrder, Registration, Registry,
    RewriteFunction, SeriesFunction,
};
pub use errors::EngineError;
pub use functions::register_all;
pub use series::{FetchMap, Series};
pub use syntax::{parse, parse_interval, parse_with_options, ParserOptions};
