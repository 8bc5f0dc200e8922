//! End-to-end parser behavior: canonical round-trips, pipe desugaring,
//! grammar corners, and error positions.

use anthracite::{parse, parse_with_options, EngineError, Expr, ParserOptions};

fn parse_all(input: &str) -> Expr {
    let (expr, rest) = parse(input).unwrap();
    assert_eq!(rest, "", "unparsed trailing input for {input:?}");
    expr
}

// ----------------------------------------------------------------------------
// Canonical reconstruction
// ----------------------------------------------------------------------------

#[test]
fn canonical_string_reparses_to_an_equal_tree() {
    let cases = [
        "a.b.c",
        "scale(servers.*.cpu,0.5)",
        "summarize(m,'1h','avg',true)",
        "movingAverage(timeShift(m,'-1d'),'5min')",
        "groupByNode(servers.{a,b}.cpu,1,'sumSeries')",
        "f(a,b,c,key='v')",
        "1e3",
        "-1.5",
    ];
    for case in cases {
        let expr = parse_all(case);
        let reparsed = parse_all(&expr.to_string());
        assert_eq!(expr, reparsed, "round-trip failed for {case:?}");
    }
}

#[test]
fn constructed_trees_reparse_to_equal_trees() {
    let expr = Expr::func(
        "summarize",
        vec![
            Expr::func("scale", vec![Expr::name("a.b"), Expr::constant(2.0)]),
            Expr::string("1h"),
        ],
    );
    assert_eq!(parse_all(&expr.to_string()), expr);
}

#[test]
fn const_literals_keep_their_spelling() {
    let expr = parse_all("scale(m,1e3)");
    assert_eq!(expr.to_string(), "scale(m,1e3)");
}

// ----------------------------------------------------------------------------
// Pipe desugaring
// ----------------------------------------------------------------------------

#[test]
fn pipe_equals_explicit_call() {
    assert_eq!(parse_all("a|b(1)"), parse_all("b(a,1)"));
}

#[test]
fn pipe_chain_nests_left_to_right() {
    assert_eq!(parse_all("a|b(1)|c(2)"), parse_all("c(b(a,1),2)"));
}

#[test]
fn parenless_pipe_is_a_unary_call() {
    assert_eq!(parse_all("a.b|absolute"), parse_all("absolute(a.b)"));
}

#[test]
fn piped_tree_prints_canonically() {
    assert_eq!(parse_all("a|b(1)").to_string(), "b(a,1)");
}

// ----------------------------------------------------------------------------
// Grammar corners
// ----------------------------------------------------------------------------

#[test]
fn names_may_start_with_digits() {
    assert_eq!(parse_all("5xx.count"), Expr::name("5xx.count"));
    assert_eq!(parse_all("scale(5xx.count,2)").args()[0], Expr::name("5xx.count"));
}

#[test]
fn number_then_dot_name_is_a_name() {
    assert_eq!(parse_all("1.5.3"), Expr::name("1.5.3"));
}

#[test]
fn brace_groups_and_escapes_are_verbatim() {
    assert_eq!(parse_all("host.{a,b}.cpu"), Expr::name("host.{a,b}.cpu"));
    assert_eq!(parse_all(r"weird\(name"), Expr::name(r"weird\(name"));
    // braces swallow commas even inside argument lists
    let expr = parse_all("sum(host.{a,b}.cpu)");
    assert_eq!(expr.args().len(), 1);
}

#[test]
fn arithmetic_looking_names_parse_whole() {
    assert_eq!(parse_all("metric.a+b"), Expr::name("metric.a+b"));
    assert_eq!(parse_all("load~p95"), Expr::name("load~p95"));
    // no remainder left behind the '+'
    let (expr, rest) = parse("metric.a+b").unwrap();
    assert_eq!(rest, "");
    assert_eq!(expr, Expr::name("metric.a+b"));
    // and as an argument
    let expr = parse_all("scale(metric.a+b,2)");
    assert_eq!(expr.args()[0], Expr::name("metric.a+b"));
}

#[test]
fn equals_is_a_name_character_outside_argument_keys() {
    // a top-level '=' is just part of the name
    assert_eq!(parse_all("a.b=c"), Expr::name("a.b=c"));
    // inside an argument list the first '=' splits off the key
    let expr = parse_all("f(m,key=a=b)");
    assert_eq!(expr.named_arg("key"), Some(&Expr::name("a=b")));
}

#[test]
fn series_by_tag_is_captured_whole() {
    let expr = parse_all("seriesByTag('name=cpu','host=~web.*')");
    assert!(expr.is_name());
    assert_eq!(expr.target(), "seriesByTag('name=cpu','host=~web.*')");
    // also inside an enclosing call
    let outer = parse_all("sum(seriesByTag('name=cpu'))");
    assert!(outer.args()[0].is_name());
}

#[test]
fn named_arguments_take_literals_only() {
    let expr = parse_all("summarize(m,'1h',func='avg',alignToFrom=true)");
    assert_eq!(expr.named_arg("func"), Some(&Expr::string("avg")));
    assert_eq!(expr.named_arg("alignToFrom"), Some(&Expr::boolean(true)));
    assert!(parse("f(key=g(x))").is_err());
}

#[test]
fn booleans_in_any_case() {
    assert_eq!(parse_all("f(m,True)").args()[1], Expr::boolean(true));
    assert_eq!(parse_all("f(m,false)").args()[1], Expr::boolean(false));
}

#[test]
fn spaces_between_arguments_are_tolerated() {
    assert_eq!(parse_all("f(a, b, 1)"), parse_all("f(a,b,1)"));
}

#[test]
fn remainder_comes_back_to_the_caller() {
    let (expr, rest) = parse("a.b,c.d").unwrap();
    assert_eq!(expr, Expr::name("a.b"));
    assert_eq!(rest, ",c.d");
}

#[test]
fn unicode_names_are_opt_in() {
    let options = ParserOptions::with_named_ranges(&["cyrillic"]).unwrap();
    let (expr, rest) = parse_with_options("сервер.нагрузка", &options).unwrap();
    assert_eq!(rest, "");
    assert_eq!(expr, Expr::name("сервер.нагрузка"));

    // without the allow-list a non-ASCII letter cannot start a name
    assert!(matches!(
        parse("сервер.нагрузка"),
        Err(EngineError::UnexpectedChar { found: 'с', .. })
    ));
}

#[test]
fn unknown_range_name_is_a_config_error() {
    assert!(matches!(
        ParserOptions::with_named_ranges(&["klingon"]),
        Err(EngineError::Config(_))
    ));
}

// ----------------------------------------------------------------------------
// Errors carry positions
// ----------------------------------------------------------------------------

#[test]
fn missing_quote_points_at_the_opening_quote() {
    match parse("alias(m,'oops)") {
        Err(EngineError::MissingQuote { at }) => assert_eq!(at.offset(), 8),
        other => panic!("expected MissingQuote, got {other:?}"),
    }
}

#[test]
fn unexpected_character_reports_the_character() {
    match parse(";") {
        Err(EngineError::UnexpectedChar { found, .. }) => assert_eq!(found, ';'),
        other => panic!("expected UnexpectedChar, got {other:?}"),
    }
}

#[test]
fn missing_comma_between_arguments() {
    assert!(matches!(
        parse("f(a b)"),
        Err(EngineError::MissingComma { .. })
    ));
}

#[test]
fn empty_input_is_missing_expression() {
    assert!(matches!(parse(""), Err(EngineError::MissingExpr { .. })));
    assert!(matches!(parse("f(,a)"), Err(EngineError::MissingExpr { .. })));
}

#[test]
fn unterminated_argument_list() {
    assert!(matches!(
        parse("f(a,b"),
        Err(EngineError::MissingComma { .. })
    ));
}

#[test]
fn parse_errors_classify_as_parse_errors() {
    for input in ["", ";", "f(a b)", "alias(m,'oops)", "f(,a)"] {
        let err = parse(input).unwrap_err();
        assert!(err.is_parse_error(), "{input:?} -> {err:?}");
    }
    assert!(!EngineError::UnknownFunction("f".to_string()).is_parse_error());
    assert!(!EngineError::Eval("boom".to_string()).is_parse_error());
}
