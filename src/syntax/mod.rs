//! Syntax layer: the recursive-descent expression parser and interval
//! string parsing.

pub mod interval;
pub mod parser;

pub use interval::parse_interval;
pub use parser::{parse, parse_with_options, ParserOptions};
