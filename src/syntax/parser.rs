//! Recursive-descent parser for the Graphite-compatible expression DSL.
//!
//! Converts query text into `Expr` trees. Purely syntactic: no function
//! names are resolved and no semantic checks run here.
//!
//! Grammar sketch:
//!
//! ```text
//! expr    := single ('|' NAME ('(' argList ')')?)*
//! single  := STRING | NUMBER | NAME ('(' argList ')')?
//! argList := (arg (',' arg)*)?
//! arg     := expr | NAME '=' literal
//! ```
//!
//! Ambiguities resolved the way the dashboards expect:
//! - A leading sign/digit sequence is a numeric constant only when the
//!   token is not immediately followed by a name character; otherwise the
//!   whole token re-parses as a name, so names may start with digits
//!   ("5xx.count").
//! - `=` is a name character ("a.b=c" is one name). Inside an argument
//!   list, a scanned token with a top-level `=` splits at the first one
//!   into a named argument instead.
//! - Pipe segments splice the preceding expression in as the first
//!   positional argument, left-to-right: `a|b(1)|c(2)` == `c(b(a,1),2)`.
//! - `seriesByTag(...)` is captured whole as an opaque Name; its tag-match
//!   grammar belongs to the storage layer, not this DSL.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;

use crate::ast::Expr;
use crate::errors::EngineError;

// ============================================================================
// PARSER OPTIONS
// ============================================================================

/// Unicode letter blocks that may appear in metric names, selected by name
/// in the engine configuration. ASCII letters are always allowed.
static UNICODE_BLOCKS: Lazy<HashMap<&'static str, (char, char)>> = Lazy::new(|| {
    HashMap::from([
        ("latin-1", ('\u{00C0}', '\u{00FF}')),
        ("latin-extended", ('\u{0100}', '\u{024F}')),
        ("greek", ('\u{0370}', '\u{03FF}')),
        ("cyrillic", ('\u{0400}', '\u{04FF}')),
        ("hebrew", ('\u{0590}', '\u{05FF}')),
        ("arabic", ('\u{0600}', '\u{06FF}')),
        ("devanagari", ('\u{0900}', '\u{097F}')),
        ("thai", ('\u{0E00}', '\u{0E7F}')),
        ("hiragana", ('\u{3040}', '\u{309F}')),
        ("katakana", ('\u{30A0}', '\u{30FF}')),
        ("han", ('\u{4E00}', '\u{9FFF}')),
        ("hangul", ('\u{AC00}', '\u{D7AF}')),
    ])
});

/// Parser configuration. The default allows ASCII-only names.
#[derive(Debug, Clone, Default)]
pub struct ParserOptions {
    /// Inclusive Unicode letter ranges allowed in names.
    pub unicode_ranges: Vec<(char, char)>,
}

impl ParserOptions {
    /// Builds options from configured block names ("greek", "han", ...).
    pub fn with_named_ranges<S: AsRef<str>>(names: &[S]) -> Result<ParserOptions, EngineError> {
        let mut unicode_ranges = Vec::with_capacity(names.len());
        for name in names {
            let key = name.as_ref().to_ascii_lowercase();
            let range = UNICODE_BLOCKS.get(key.as_str()).copied().ok_or_else(|| {
                EngineError::Config(format!("unknown unicode range {:?}", name.as_ref()))
            })?;
            unicode_ranges.push(range);
        }
        Ok(ParserOptions { unicode_ranges })
    }

    fn allows(&self, c: char) -> bool {
        self.unicode_ranges
            .iter()
            .any(|(lo, hi)| (*lo..=*hi).contains(&c))
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parses one expression from the front of `input`, returning the node and
/// the unconsumed remainder. Uses default (ASCII-only) name options.
pub fn parse(input: &str) -> Result<(Expr, &str), EngineError> {
    parse_with_options(input, &ParserOptions::default())
}

/// Parses one expression with explicit parser options.
pub fn parse_with_options<'a>(
    input: &'a str,
    options: &ParserOptions,
) -> Result<(Expr, &'a str), EngineError> {
    let mut scanner = Scanner {
        input,
        pos: 0,
        options,
    };
    let expr = scanner.parse_expr()?;
    Ok((expr, &input[scanner.pos..]))
}

// ============================================================================
// SCANNER
// ============================================================================

struct Scanner<'a, 'o> {
    input: &'a str,
    pos: usize,
    options: &'o ParserOptions,
}

impl<'a> Scanner<'a, '_> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(' ') {
            self.pos += 1;
        }
    }

    fn here(&self) -> miette::SourceSpan {
        (self.pos, 0).into()
    }

    fn is_name_char(&self, c: char) -> bool {
        c.is_ascii_alphanumeric()
            || matches!(
                c,
                '.' | '_'
                    | '-'
                    | '*'
                    | '?'
                    | ':'
                    | '['
                    | ']'
                    | '^'
                    | '$'
                    | '<'
                    | '>'
                    | '&'
                    | '#'
                    | '/'
                    | '%'
                    | '@'
                    | '+'
                    | '~'
                    | '='
            )
            || (!c.is_ascii() && c.is_alphabetic() && self.options.allows(c))
    }

    fn starts_name(&self, c: char) -> bool {
        self.is_name_char(c) || c == '{' || c == '\\'
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_expr(&mut self) -> Result<Expr, EngineError> {
        let mut expr = self.parse_single()?;
        loop {
            let save = self.pos;
            self.skip_spaces();
            if !self.eat('|') {
                self.pos = save;
                break;
            }
            self.skip_spaces();
            expr = self.parse_pipe_segment(expr)?;
        }
        Ok(expr)
    }

    fn parse_single(&mut self) -> Result<Expr, EngineError> {
        match self.peek() {
            None => Err(EngineError::MissingExpr { at: self.here() }),
            Some('\'') | Some('"') => self.parse_string(),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => self.parse_number_or_name(),
            Some(',') | Some(')') => Err(EngineError::MissingExpr { at: self.here() }),
            Some(c) if self.starts_name(c) => self.parse_name_or_call(),
            Some(c) => Err(EngineError::UnexpectedChar {
                found: c,
                at: (self.pos, c.len_utf8()).into(),
            }),
        }
    }

    fn parse_string(&mut self) -> Result<Expr, EngineError> {
        let open = self.pos;
        let quote = match self.bump() {
            Some(q) => q,
            None => return Err(EngineError::MissingExpr { at: self.here() }),
        };
        let start = self.pos;
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    let value = self.input[start..self.pos].to_string();
                    self.bump();
                    return Ok(Expr::QuotedString { value });
                }
                Some(_) => {
                    self.bump();
                }
                None => return Err(EngineError::MissingQuote { at: (open, 1).into() }),
            }
        }
    }

    // A numeric constant, unless the token runs into name characters, in
    // which case the whole token re-parses as a name.
    fn parse_number_or_name(&mut self) -> Result<Expr, EngineError> {
        let start = self.pos;
        if matches!(self.peek(), Some('+') | Some('-')) {
            self.bump();
        }
        let mut saw_digit = false;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
            saw_digit = true;
        }
        if self.peek() == Some('.') {
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
                saw_digit = true;
            }
        }
        if saw_digit && matches!(self.peek(), Some('e') | Some('E')) {
            let save = self.pos;
            self.bump();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.bump();
            }
            let mut exponent_digits = false;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
                exponent_digits = true;
            }
            if !exponent_digits {
                self.pos = save;
            }
        }

        let next_is_name = matches!(self.peek(), Some(c) if self.starts_name(c));
        if !saw_digit || next_is_name {
            self.pos = start;
            return self.parse_name_or_call();
        }

        let token = &self.input[start..self.pos];
        match token.parse::<f64>() {
            Ok(value) => Ok(Expr::Const {
                value,
                literal: token.to_string(),
            }),
            Err(_) => {
                self.pos = start;
                self.parse_name_or_call()
            }
        }
    }

    fn parse_name_or_call(&mut self) -> Result<Expr, EngineError> {
        let start = self.pos;
        let name = self.scan_name();
        if name.is_empty() {
            return match self.peek() {
                Some(c) => Err(EngineError::UnexpectedChar {
                    found: c,
                    at: (self.pos, c.len_utf8()).into(),
                }),
                None => Err(EngineError::MissingExpr { at: self.here() }),
            };
        }

        if self.peek() == Some('(') {
            // Tag-selector grammar is opaque to this DSL; capture verbatim.
            if name == "seriesByTag" {
                return self.capture_series_by_tag(start);
            }
            self.bump();
            let (args, named_args, arg_text) = self.parse_arg_list()?;
            return Ok(Expr::Func {
                name,
                args,
                named_args,
                arg_text,
            });
        }

        if name.eq_ignore_ascii_case("true") {
            return Ok(Expr::Bool { value: true });
        }
        if name.eq_ignore_ascii_case("false") {
            return Ok(Expr::Bool { value: false });
        }
        Ok(Expr::Name { target: name })
    }

    // Consumes name characters, verbatim brace groups and backslash
    // escapes, returning the raw slice (escapes kept as written so the
    // storage layer sees the original pattern).
    fn scan_name(&mut self) -> String {
        let start = self.pos;
        loop {
            match self.peek() {
                Some('\\') => {
                    self.bump();
                    if self.peek().is_some() {
                        self.bump();
                    }
                }
                Some('{') => {
                    self.bump();
                    let mut depth = 1usize;
                    while depth > 0 {
                        match self.bump() {
                            Some('{') => depth += 1,
                            Some('}') => depth -= 1,
                            Some(_) => {}
                            None => break,
                        }
                    }
                }
                Some(c) if self.is_name_char(c) => {
                    self.bump();
                }
                _ => break,
            }
        }
        self.input[start..self.pos].to_string()
    }

    // `seriesByTag('name=cpu','host=~web.*')` becomes a single Name node
    // spanning the whole call, quotes and parens included.
    fn capture_series_by_tag(&mut self, start: usize) -> Result<Expr, EngineError> {
        self.bump(); // consume '('
        let mut depth = 1usize;
        while depth > 0 {
            match self.bump() {
                Some('(') => depth += 1,
                Some(')') => depth -= 1,
                Some(q @ ('\'' | '"')) => {
                    let open = self.pos - 1;
                    loop {
                        match self.bump() {
                            Some(c) if c == q => break,
                            Some(_) => {}
                            None => {
                                return Err(EngineError::MissingQuote { at: (open, 1).into() })
                            }
                        }
                    }
                }
                Some(_) => {}
                None => return Err(EngineError::MissingComma { at: self.here() }),
            }
        }
        Ok(Expr::Name {
            target: self.input[start..self.pos].to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Argument lists
    // ------------------------------------------------------------------

    // Called with the scanner just past '('. Splits on top-level commas
    // only; nesting is handled by the recursive expression calls. Records
    // the raw substring between the parens for canonical reconstruction.
    fn parse_arg_list(
        &mut self,
    ) -> Result<(Vec<Expr>, BTreeMap<String, Expr>, String), EngineError> {
        let list_start = self.pos;
        let mut args = Vec::new();
        let mut named_args = BTreeMap::new();

        if self.eat(')') {
            return Ok((args, named_args, String::new()));
        }

        loop {
            self.skip_spaces();

            // '=' is a name character, so a named argument arrives glued to
            // its key ("alignToFrom=true" scans as one token). Tentatively
            // scan a name and split it at a top-level '='; anything else
            // rewinds and parses as a positional expression.
            let save = self.pos;
            let token = self.scan_name();
            match top_level_eq(&token) {
                Some(0) => {
                    return Err(EngineError::UnexpectedChar {
                        found: '=',
                        at: (save, 1).into(),
                    })
                }
                Some(eq) => {
                    let key = token[..eq].to_string();
                    self.pos = save + eq + 1;
                    let value_pos = self.pos;
                    let value = self.parse_single()?;
                    // Named values are literals only, never nested calls.
                    if value.is_func() {
                        return Err(EngineError::UnexpectedChar {
                            found: '(',
                            at: (value_pos, 1).into(),
                        });
                    }
                    named_args.insert(key, value);
                }
                None => {
                    self.pos = save;
                    args.push(self.parse_expr()?);
                }
            }

            self.skip_spaces();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(')') => {
                    let arg_text = self.input[list_start..self.pos].to_string();
                    self.bump();
                    return Ok((args, named_args, arg_text));
                }
                _ => return Err(EngineError::MissingComma { at: self.here() }),
            }
        }
    }

    // ------------------------------------------------------------------
    // Pipes
    // ------------------------------------------------------------------

    // `head | name(rest...)` desugars to `name(head, rest...)`; the parens
    // are optional for single-argument calls.
    fn parse_pipe_segment(&mut self, head: Expr) -> Result<Expr, EngineError> {
        let name = self.scan_name();
        if name.is_empty() {
            return Err(EngineError::MissingExpr { at: self.here() });
        }

        if self.eat('(') {
            let (mut args, named_args, inner_text) = self.parse_arg_list()?;
            let arg_text = if inner_text.trim().is_empty() {
                head.to_string()
            } else {
                format!("{head},{inner_text}")
            };
            args.insert(0, head);
            Ok(Expr::Func {
                name,
                args,
                named_args,
                arg_text,
            })
        } else {
            let arg_text = head.to_string();
            Ok(Expr::Func {
                name,
                args: vec![head],
                named_args: BTreeMap::new(),
                arg_text,
            })
        }
    }
}

// Byte offset of the first '=' in a scanned name token, ignoring any inside
// brace groups or behind a backslash escape.
fn top_level_eq(token: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut chars = token.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '=' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(input: &str) -> Expr {
        let (expr, rest) = parse(input).unwrap();
        assert_eq!(rest, "", "unparsed trailing input");
        expr
    }

    #[test]
    fn bare_name() {
        assert_eq!(parse_all("servers.web01.cpu"), Expr::name("servers.web01.cpu"));
    }

    #[test]
    fn name_may_start_with_digits() {
        assert_eq!(parse_all("5xx.count"), Expr::name("5xx.count"));
    }

    #[test]
    fn numeric_constants() {
        assert_eq!(parse_all("42"), Expr::constant(42.0));
        assert_eq!(parse_all("-1.5"), Expr::constant(-1.5));
        assert_eq!(parse_all("1e3"), Expr::constant(1000.0));
    }

    #[test]
    fn brace_group_is_verbatim() {
        assert_eq!(parse_all("host.{a,b}.cpu"), Expr::name("host.{a,b}.cpu"));
    }

    #[test]
    fn backslash_overrides_stop_characters() {
        assert_eq!(parse_all(r"host.a\(b"), Expr::name(r"host.a\(b"));
    }

    #[test]
    fn simple_call() {
        assert_eq!(
            parse_all("scale(m,2)"),
            Expr::func("scale", vec![Expr::name("m"), Expr::constant(2.0)])
        );
    }

    #[test]
    fn pipe_desugars_left_to_right() {
        assert_eq!(parse_all("a|b(1)|c(2)"), parse_all("c(b(a,1),2)"));
        assert_eq!(parse_all("a|b"), parse_all("b(a)"));
    }

    #[test]
    fn plus_tilde_and_equals_are_name_characters() {
        assert_eq!(parse_all("metric.a+b"), Expr::name("metric.a+b"));
        assert_eq!(parse_all("load~p95"), Expr::name("load~p95"));
        assert_eq!(parse_all("a.b=c"), Expr::name("a.b=c"));
    }

    #[test]
    fn equals_in_an_argument_token_marks_a_named_argument() {
        let expr = parse_all("f(m,key=value.x,flag=true)");
        assert_eq!(expr.args().len(), 1);
        assert_eq!(expr.named_arg("key"), Some(&Expr::name("value.x")));
        assert_eq!(expr.named_arg("flag"), Some(&Expr::boolean(true)));
    }

    #[test]
    fn series_by_tag_is_opaque() {
        let expr = parse_all("seriesByTag('name=cpu','host=~web.*')");
        assert_eq!(expr, Expr::name("seriesByTag('name=cpu','host=~web.*')"));
    }

    #[test]
    fn booleans_any_case() {
        assert_eq!(parse_all("true"), Expr::boolean(true));
        assert_eq!(parse_all("FALSE"), Expr::boolean(false));
    }

    #[test]
    fn remainder_is_returned() {
        let (expr, rest) = parse("a.b remainder").unwrap();
        assert_eq!(expr, Expr::name("a.b"));
        assert_eq!(rest, " remainder");
    }

    #[test]
    fn missing_quote() {
        assert!(matches!(
            parse("alias(m,'oops)").map(|_| ()),
            Err(EngineError::MissingQuote { .. })
        ));
    }

    #[test]
    fn missing_comma() {
        assert!(matches!(
            parse("f(a b)").map(|_| ()),
            Err(EngineError::MissingComma { .. })
        ));
    }

    #[test]
    fn missing_expression_in_arg_list() {
        assert!(matches!(
            parse("f(,1)").map(|_| ()),
            Err(EngineError::MissingExpr { .. })
        ));
    }

    #[test]
    fn unicode_names_need_an_allow_list() {
        assert!(parse("σφάλμα.count").is_err() || parse("σφάλμα.count").unwrap().1 != "");
        let options = ParserOptions::with_named_ranges(&["greek"]).unwrap();
        let (expr, rest) = parse_with_options("σφάλμα.count", &options).unwrap();
        assert_eq!(rest, "");
        assert_eq!(expr, Expr::name("σφάλμα.count"));
    }
}
