//! Function registry: name -> implementation maps for value functions and
//! rewrite functions.
//!
//! The registry is a plain value constructed once at startup and passed by
//! reference; there is no process-global singleton. Writes happen during
//! boot registration, reads happen on the query path, so both maps sit
//! behind a `RwLock` that is effectively write-once, read-hot.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::ast::Expr;
use crate::engine::eval::EvalContext;
use crate::errors::EngineError;
use crate::series::{FetchMap, Series};

// ============================================================================
// FUNCTION TRAITS
// ============================================================================

/// A value function: evaluates a call node to output series. The
/// implementation receives the whole call node (for argument access), the
/// display bounds, and the full fetch map, and re-enters
/// `EvalContext::eval_expr` for its series arguments.
pub trait SeriesFunction: Send + Sync {
    fn eval(
        &self,
        ctx: &EvalContext<'_>,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError>;
}

/// A rewrite function: expands a call node into new query target strings,
/// each of which re-enters the whole pipeline independently.
pub trait RewriteFunction: Send + Sync {
    fn rewrite(
        &self,
        ctx: &EvalContext<'_>,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<String>, EngineError>;
}

// ============================================================================
// REGISTRATION RECORDS
// ============================================================================

/// Which map a registration lands in.
#[derive(Clone)]
pub enum FunctionImpl {
    Series(Arc<dyn SeriesFunction>),
    Rewrite(Arc<dyn RewriteFunction>),
}

/// Ordering hint for duplicate names. `Any` replaces an existing entry;
/// `Last` defers to one, filling the name only when still vacant (used by
/// fallback providers that must not shadow native implementations).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOrder {
    Any,
    Last,
}

/// Parameter kinds, for introspection and function listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Series,
    String,
    Float,
    Integer,
    Boolean,
    Interval,
}

/// Declared parameter of a registered function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamMeta {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamMeta {
    pub const fn required(name: &'static str, kind: ParamKind) -> ParamMeta {
        ParamMeta {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind) -> ParamMeta {
        ParamMeta {
            name,
            kind,
            required: false,
        }
    }
}

/// One name -> implementation binding produced by a function module's
/// `new()`. Aliases share the implementation via the `Arc`.
#[derive(Clone)]
pub struct Registration {
    pub name: String,
    pub implementation: FunctionImpl,
    pub order: RegisterOrder,
    pub params: Vec<ParamMeta>,
}

impl Registration {
    pub fn series(
        name: impl Into<String>,
        implementation: Arc<dyn SeriesFunction>,
        params: Vec<ParamMeta>,
    ) -> Registration {
        Registration {
            name: name.into(),
            implementation: FunctionImpl::Series(implementation),
            order: RegisterOrder::Any,
            params,
        }
    }

    pub fn rewrite(
        name: impl Into<String>,
        implementation: Arc<dyn RewriteFunction>,
        params: Vec<ParamMeta>,
    ) -> Registration {
        Registration {
            name: name.into(),
            implementation: FunctionImpl::Rewrite(implementation),
            order: RegisterOrder::Any,
            params,
        }
    }

    pub fn with_order(mut self, order: RegisterOrder) -> Registration {
        self.order = order;
        self
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Default)]
pub struct Registry {
    series: RwLock<HashMap<String, Arc<dyn SeriesFunction>>>,
    rewrites: RwLock<HashMap<String, Arc<dyn RewriteFunction>>>,
    params: RwLock<HashMap<String, Vec<ParamMeta>>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Applies one registration, honoring its ordering hint.
    pub fn register(&self, registration: Registration) {
        let Registration {
            name,
            implementation,
            order,
            params,
        } = registration;

        let inserted = match implementation {
            FunctionImpl::Series(f) => {
                let mut map = write(&self.series);
                if order == RegisterOrder::Last && map.contains_key(&name) {
                    false
                } else {
                    map.insert(name.clone(), f);
                    true
                }
            }
            FunctionImpl::Rewrite(f) => {
                let mut map = write(&self.rewrites);
                if order == RegisterOrder::Last && map.contains_key(&name) {
                    false
                } else {
                    map.insert(name.clone(), f);
                    true
                }
            }
        };

        if inserted {
            write(&self.params).insert(name.clone(), params);
            debug!(function = %name, "registered function");
        } else {
            debug!(function = %name, "registration deferred to existing entry");
        }
    }

    pub fn register_all(&self, registrations: Vec<Registration>) {
        for registration in registrations {
            self.register(registration);
        }
    }

    pub fn series_function(&self, name: &str) -> Option<Arc<dyn SeriesFunction>> {
        read(&self.series).get(name).cloned()
    }

    pub fn rewrite_function(&self, name: &str) -> Option<Arc<dyn RewriteFunction>> {
        read(&self.rewrites).get(name).cloned()
    }

    /// Declared parameters of a registered function, for introspection.
    pub fn params(&self, name: &str) -> Option<Vec<ParamMeta>> {
        read(&self.params).get(name).cloned()
    }

    /// All registered names (value and rewrite), sorted.
    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.series).keys().cloned().collect();
        names.extend(read(&self.rewrites).keys().cloned());
        names.sort();
        names.dedup();
        names
    }
}

// Registration is infallible and the guarded data cannot be left in a torn
// state, so a poisoned lock just yields its inner value.
fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
