//! Built-in function modules.
//!
//! Each module is a self-contained plug-in exposing `new() ->
//! Vec<Registration>`; `register_all` wires every module into a registry at
//! boot. Adding a function means adding a module (or extending one) and
//! listing it here — nothing else in the engine changes.
//!
//! Function modules that read history beyond the display window (moving
//! windows, the forecast family, time shifting, hit counting) export the
//! constants the planner uses for its matching time adjustments; see
//! `engine::plan`.

pub mod holtwinters;
pub mod moving;
pub mod polyfit;
pub mod rewrite;
pub mod slo;
pub mod summarize;
pub mod timeshift;
pub mod transform;
pub mod tukey;

use crate::engine::registry::Registry;

/// Registers every built-in function module into `registry`.
pub fn register_all(registry: &Registry) {
    registry.register_all(moving::new());
    registry.register_all(summarize::new());
    registry.register_all(holtwinters::new());
    registry.register_all(tukey::new());
    registry.register_all(polyfit::new());
    registry.register_all(slo::new());
    registry.register_all(timeshift::new());
    registry.register_all(transform::new());
    registry.register_all(rewrite::new());
}
