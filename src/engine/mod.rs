//! Engine layer: function registry, evaluator core, and the fetch planner.

pub mod eval;
pub mod plan;
pub mod registry;

pub use eval::{EvalContext, DEFAULT_MAX_DEPTH};
pub use plan::metrics;
pub use registry::{
    FunctionImpl, ParamKind, ParamMeta, RegisterOrder, Registration, Registry, RewriteFunction,
    SeriesFunction,
};
