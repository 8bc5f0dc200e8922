//! Planner behavior: which fetches an expression demands, including the
//! per-function time adjustments and how they compose through nesting.

use anthracite::{metrics, parse, MetricRequest};

fn plan(target: &str, from: i64, until: i64) -> Vec<MetricRequest> {
    let (expr, _) = parse(target).unwrap();
    metrics(&expr, from, until).unwrap()
}

#[test]
fn plain_functions_pass_bounds_through() {
    assert_eq!(
        plan("scale(summarize(m,'1h'),2)", 100, 200),
        vec![MetricRequest::new("m", 100, 200)]
    );
}

#[test]
fn multiple_leaves_union() {
    let requests = plan("asPercent(a.b,c.d)", 0, 60);
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], MetricRequest::new("a.b", 0, 60));
    assert_eq!(requests[1], MetricRequest::new("c.d", 0, 60));
}

#[test]
fn hitcount_extends_from_to_the_enclosing_bucket() {
    // a sub-hour window still fetches from the top of the hour
    let from = 5 * 3600 + 1200;
    let until = 5 * 3600 + 1800;
    assert_eq!(
        plan("hitcount(metric1,'1h')", from, until),
        vec![MetricRequest::new("metric1", 5 * 3600, until)]
    );
}

#[test]
fn time_shift_translates_and_composes_with_moving_windows() {
    // inner shift applies on top of the outer window extension
    let requests = plan("movingAverage(timeShift(m,'1h'),'5min')", 7200, 10800);
    assert_eq!(
        requests,
        vec![MetricRequest::new("m", 7200 - 300 - 3600, 10800 - 3600)]
    );
}

#[test]
fn moving_point_count_windows_do_not_extend() {
    assert_eq!(
        plan("movingMedian(m,10)", 500, 900),
        vec![MetricRequest::new("m", 500, 900)]
    );
}

#[test]
fn forecast_family_bootstraps_seven_days() {
    let week = 7 * 86_400;
    for function in [
        "holtWintersForecast",
        "holtWintersConfidenceBands",
        "holtWintersConfidenceArea",
        "holtWintersAberration",
    ] {
        assert_eq!(
            plan(&format!("{function}(m)"), week + 50, week + 150),
            vec![MetricRequest::new("m", 50, week + 150)],
            "{function}"
        );
    }
}

#[test]
fn time_stack_fans_out_every_index() {
    let day = 86_400;
    let requests = plan("timeStack(m,'1d',1,3)", 10 * day, 10 * day + 60);
    assert_eq!(
        requests,
        vec![
            MetricRequest::new("m", 9 * day, 9 * day + 60),
            MetricRequest::new("m", 8 * day, 8 * day + 60),
            MetricRequest::new("m", 7 * day, 7 * day + 60),
        ]
    );
}

#[test]
fn time_stack_defaults_cover_a_week() {
    let day = 86_400;
    let requests = plan("timeStack(m)", 30 * day, 30 * day + 60);
    // indices 0..=7 inclusive
    assert_eq!(requests.len(), 8);
    assert_eq!(requests[0].from, 30 * day);
    assert_eq!(requests[7].from, 23 * day);
}

#[test]
fn transform_null_reference_series_is_fetched_too() {
    let requests = plan("transformNull(m,default=0,referenceSeries=live.requests)", 0, 60);
    assert!(requests.contains(&MetricRequest::new("m", 0, 60)));
    assert!(requests.contains(&MetricRequest::new("live.requests", 0, 60)));
}

#[test]
fn literals_produce_no_fetches() {
    assert!(plan("42", 0, 60).is_empty());
    let requests = plan("scale(m,2)", 0, 60);
    assert_eq!(requests, vec![MetricRequest::new("m", 0, 60)]);
}

#[test]
fn series_by_tag_is_one_opaque_fetch() {
    let requests = plan("sum(seriesByTag('name=cpu'))", 0, 60);
    assert_eq!(
        requests,
        vec![MetricRequest::new("seriesByTag('name=cpu')", 0, 60)]
    );
}

#[test]
fn adjustments_apply_at_any_depth() {
    // the moving window extension nests inside an unknown outer function
    let requests = plan("someFutureFunction(movingSum(m,'10min'),5)", 1000, 2000);
    assert_eq!(requests, vec![MetricRequest::new("m", 400, 2000)]);
}
