//! Typed argument accessors for Func nodes.
//!
//! Function implementations never pattern-match their argument lists by
//! hand; they go through these tolerant getters, which check the named map,
//! then the positional slot, then an optional default. Type mismatches
//! return `EngineError::ArgumentType` rather than panicking.
//!
//! One deliberate coercion: a quoted string is accepted wherever a float or
//! int is requested, because a bare digit sequence can mis-lex as a name
//! (names may start with digits) and users quote numerics to disambiguate.

use crate::ast::Expr;
use crate::errors::EngineError;
use crate::syntax::interval::parse_interval;

impl Expr {
    // ------------------------------------------------------------------
    // Raw access
    // ------------------------------------------------------------------

    /// Positional argument `n`, if this is a Func node that has one.
    pub fn arg(&self, n: usize) -> Option<&Expr> {
        match self {
            Expr::Func { args, .. } => args.get(n),
            _ => None,
        }
    }

    /// All positional arguments (empty for non-Func nodes).
    pub fn args(&self) -> &[Expr] {
        match self {
            Expr::Func { args, .. } => args,
            _ => &[],
        }
    }

    /// Named argument by key, if present.
    pub fn named_arg(&self, key: &str) -> Option<&Expr> {
        match self {
            Expr::Func { named_args, .. } => named_args.get(key),
            _ => None,
        }
    }

    /// Named argument first, then the positional slot.
    pub fn named_or_pos_arg(&self, key: &str, n: usize) -> Option<&Expr> {
        self.named_arg(key).or_else(|| self.arg(n))
    }

    fn missing(&self, n: usize) -> EngineError {
        EngineError::MissingArgument {
            function: self.target().to_string(),
            index: n,
        }
    }

    // ------------------------------------------------------------------
    // String arguments
    // ------------------------------------------------------------------

    pub fn string_arg(&self, n: usize) -> Result<&str, EngineError> {
        let arg = self.arg(n).ok_or_else(|| self.missing(n))?;
        coerce_string(arg, self.target(), n)
    }

    pub fn string_arg_default<'a>(&'a self, n: usize, default: &'a str) -> Result<&'a str, EngineError> {
        match self.arg(n) {
            Some(arg) => coerce_string(arg, self.target(), n),
            None => Ok(default),
        }
    }

    pub fn string_named_or_pos<'a>(
        &'a self,
        key: &str,
        n: usize,
        default: &'a str,
    ) -> Result<&'a str, EngineError> {
        match self.named_or_pos_arg(key, n) {
            Some(arg) => coerce_string(arg, self.target(), n),
            None => Ok(default),
        }
    }

    // ------------------------------------------------------------------
    // Float arguments
    // ------------------------------------------------------------------

    pub fn float_arg(&self, n: usize) -> Result<f64, EngineError> {
        let arg = self.arg(n).ok_or_else(|| self.missing(n))?;
        coerce_float(arg, self.target(), n)
    }

    pub fn float_arg_default(&self, n: usize, default: f64) -> Result<f64, EngineError> {
        match self.arg(n) {
            Some(arg) => coerce_float(arg, self.target(), n),
            None => Ok(default),
        }
    }

    pub fn float_named_or_pos(&self, key: &str, n: usize, default: f64) -> Result<f64, EngineError> {
        match self.named_or_pos_arg(key, n) {
            Some(arg) => coerce_float(arg, self.target(), n),
            None => Ok(default),
        }
    }

    // ------------------------------------------------------------------
    // Integer arguments
    // ------------------------------------------------------------------

    pub fn int_arg(&self, n: usize) -> Result<i64, EngineError> {
        let arg = self.arg(n).ok_or_else(|| self.missing(n))?;
        coerce_int(arg, self.target(), n)
    }

    pub fn int_arg_default(&self, n: usize, default: i64) -> Result<i64, EngineError> {
        match self.arg(n) {
            Some(arg) => coerce_int(arg, self.target(), n),
            None => Ok(default),
        }
    }

    pub fn int_named_or_pos(&self, key: &str, n: usize, default: i64) -> Result<i64, EngineError> {
        match self.named_or_pos_arg(key, n) {
            Some(arg) => coerce_int(arg, self.target(), n),
            None => Ok(default),
        }
    }

    // ------------------------------------------------------------------
    // Boolean arguments
    // ------------------------------------------------------------------

    pub fn bool_arg(&self, n: usize) -> Result<bool, EngineError> {
        let arg = self.arg(n).ok_or_else(|| self.missing(n))?;
        coerce_bool(arg, self.target(), n)
    }

    pub fn bool_arg_default(&self, n: usize, default: bool) -> Result<bool, EngineError> {
        match self.arg(n) {
            Some(arg) => coerce_bool(arg, self.target(), n),
            None => Ok(default),
        }
    }

    pub fn bool_named_or_pos(&self, key: &str, n: usize, default: bool) -> Result<bool, EngineError> {
        match self.named_or_pos_arg(key, n) {
            Some(arg) => coerce_bool(arg, self.target(), n),
            None => Ok(default),
        }
    }

    // ------------------------------------------------------------------
    // Interval arguments
    // ------------------------------------------------------------------

    /// Parses a quoted interval argument ("5min", "-1h") into signed
    /// seconds. `default_sign` applies when the string carries no explicit
    /// sign: a look-back window passes -1, an offset may pass +1.
    pub fn interval_arg(&self, n: usize, default_sign: i64) -> Result<i64, EngineError> {
        let text = self.string_arg(n)?;
        parse_interval(text, default_sign)
    }

    /// Named-or-positional interval with a default interval string.
    pub fn interval_named_or_pos(
        &self,
        key: &str,
        n: usize,
        default: &str,
        default_sign: i64,
    ) -> Result<i64, EngineError> {
        let text = self.string_named_or_pos(key, n, default)?;
        parse_interval(text, default_sign)
    }
}

// ============================================================================
// COERCION HELPERS
// ============================================================================

fn coerce_string<'a>(arg: &'a Expr, function: &str, n: usize) -> Result<&'a str, EngineError> {
    match arg {
        Expr::QuotedString { value } => Ok(value),
        _ => Err(type_error(function, n, "a string")),
    }
}

fn coerce_float(arg: &Expr, function: &str, n: usize) -> Result<f64, EngineError> {
    match arg {
        Expr::Const { value, .. } => Ok(*value),
        // Quoted numeric literal, e.g. scale(m,'0.5').
        Expr::QuotedString { value } => value
            .trim()
            .parse::<f64>()
            .map_err(|_| type_error(function, n, "a number")),
        _ => Err(type_error(function, n, "a number")),
    }
}

fn coerce_int(arg: &Expr, function: &str, n: usize) -> Result<i64, EngineError> {
    let value = coerce_float(arg, function, n).map_err(|_| type_error(function, n, "an integer"))?;
    if value.fract() != 0.0 {
        return Err(type_error(function, n, "an integer"));
    }
    Ok(value as i64)
}

// Accepts Bool nodes and the numeric constants 0/1; quoted strings are NOT
// coerced to bools even though they are coerced to numbers (see DESIGN.md).
fn coerce_bool(arg: &Expr, function: &str, n: usize) -> Result<bool, EngineError> {
    match arg {
        Expr::Bool { value } => Ok(*value),
        Expr::Const { value, .. } if *value == 0.0 => Ok(false),
        Expr::Const { value, .. } if *value == 1.0 => Ok(true),
        _ => Err(type_error(function, n, "a boolean")),
    }
}

fn type_error(function: &str, n: usize, expected: &'static str) -> EngineError {
    EngineError::ArgumentType {
        function: function.to_string(),
        index: n,
        expected,
    }
}
