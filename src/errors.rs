//! Unified diagnostic error type for the Anthracite engine.
//!
//! Every stage of the pipeline (parsing, define expansion, planning,
//! evaluation, configuration loading) reports failures through a single
//! `EngineError` enum built on `thiserror` + `miette`. Parse-time variants
//! carry a byte-offset label into the query text so callers can render a
//! pointed diagnostic.
//!
//! Error discipline:
//! - Parse errors abort the whole query before any evaluation.
//! - One subtree's evaluation error aborts that whole evaluation; there is
//!   no partial-result-with-warnings mode.
//! - A metric leaf missing from the fetch map is NOT an error; the
//!   evaluator yields an empty series list for it.

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// The unified error type for all engine operations.
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum EngineError {
    // ------------------------------------------------------------------
    // Parse errors
    // ------------------------------------------------------------------
    /// An expression was required and none was found.
    #[error("missing expression")]
    #[diagnostic(code(anthracite::parse::missing_expr))]
    MissingExpr {
        #[label("expected an expression here")]
        at: SourceSpan,
    },

    /// An argument list continued without a separating comma.
    #[error("missing comma in argument list")]
    #[diagnostic(code(anthracite::parse::missing_comma))]
    MissingComma {
        #[label("expected ',' or ')' here")]
        at: SourceSpan,
    },

    /// A string literal was never closed.
    #[error("missing closing quote")]
    #[diagnostic(code(anthracite::parse::missing_quote))]
    MissingQuote {
        #[label("string opened here is never closed")]
        at: SourceSpan,
    },

    /// A character that cannot start or continue any production.
    #[error("unexpected character {found:?}")]
    #[diagnostic(code(anthracite::parse::unexpected_char))]
    UnexpectedChar {
        found: char,
        #[label("cannot be parsed here")]
        at: SourceSpan,
    },

    /// An interval string ("5min", "-1h") that does not scan.
    #[error("invalid interval {text:?}")]
    #[diagnostic(code(anthracite::parse::invalid_interval))]
    InvalidInterval { text: String },

    // ------------------------------------------------------------------
    // Argument errors
    // ------------------------------------------------------------------
    /// A function call is missing a required argument.
    #[error("{function}: missing argument {index}")]
    #[diagnostic(code(anthracite::args::missing))]
    MissingArgument { function: String, index: usize },

    /// An argument is present but of the wrong kind.
    #[error("{function}: argument {index} must be {expected}")]
    #[diagnostic(code(anthracite::args::type_mismatch))]
    ArgumentType {
        function: String,
        index: usize,
        expected: &'static str,
    },

    // ------------------------------------------------------------------
    // Evaluation errors
    // ------------------------------------------------------------------
    /// The expression names a function no module registered.
    #[error("unknown function {0:?}")]
    #[diagnostic(code(anthracite::eval::unknown_function))]
    UnknownFunction(String),

    /// A function-specific hard failure during evaluation.
    #[error("{0}")]
    #[diagnostic(code(anthracite::eval::failed))]
    Eval(String),

    // ------------------------------------------------------------------
    // Configuration errors
    // ------------------------------------------------------------------
    /// Engine configuration could not be loaded or applied.
    #[error("configuration error: {0}")]
    #[diagnostic(code(anthracite::config))]
    Config(String),
}

impl EngineError {
    /// True for the parse-time family of errors.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            EngineError::MissingExpr { .. }
                | EngineError::MissingComma { .. }
                | EngineError::MissingQuote { .. }
                | EngineError::UnexpectedChar { .. }
                | EngineError::InvalidInterval { .. }
        )
    }
}
