//! End-to-end evaluation through the `Engine` facade: the planner decides
//! what to fetch, a synthetic storage layer fills the fetch map, and the
//! evaluator runs over it. Exercises the planner/evaluator bound-matching
//! invariant that module-level unit tests cannot see.

use anthracite::{Engine, EngineError, FetchMap, MetricRequest, Series};

/// Plans the target, serves every planned request from `storage`, then
/// evaluates. `storage` maps a request to the series a backend would
/// return for it.
fn run(
    engine: &Engine,
    target: &str,
    from: i64,
    until: i64,
    storage: impl Fn(&MetricRequest) -> Vec<Series>,
) -> Result<Vec<Series>, EngineError> {
    let expr = engine.parse_target(target)?;
    let mut fetched = FetchMap::new();
    for request in engine.metrics(&expr, from, until)? {
        let series = storage(&request);
        fetched.insert(request, series);
    }
    engine.eval(&expr, from, until, &fetched)
}

/// Storage stub: one series per request, covering exactly the requested
/// window at `step`, with values produced per timestamp.
fn dense(step: i64, value_at: impl Fn(i64) -> f64 + Copy) -> impl Fn(&MetricRequest) -> Vec<Series> {
    move |request: &MetricRequest| {
        let n = ((request.until - request.from) / step).max(0) as usize;
        let values = (0..n)
            .map(|i| value_at(request.from + i as i64 * step))
            .collect();
        vec![Series::new(&request.metric, request.from, step, values)]
    }
}

#[test]
fn moving_average_warm_up_property() {
    let engine = Engine::default();
    let samples = [1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 4.0, 6.0, 4.0, 6.0, 8.0];
    let out = run(&engine, "movingAverage(metric,4)", 0, 12, |request| {
        vec![Series::new(
            &request.metric,
            request.from,
            1,
            samples.to_vec(),
        )]
    })
    .unwrap();
    let s = &out[0];
    assert_eq!(&s.absent[..5], &[true, true, true, true, false]);
    assert_eq!(s.value_at(4), Some(1.0));
}

#[test]
fn moving_average_interval_window_lines_up_with_the_plan() {
    // the planner requests [from-300, until); the evaluator fetches the
    // same key, so the output covers the display window with no misses
    let engine = Engine::default();
    let out = run(&engine, "movingAverage(m,'5min')", 3000, 3600, dense(60, |_| 7.0)).unwrap();
    let s = &out[0];
    assert_eq!(s.start, 3000);
    assert_eq!(s.len(), 10);
    assert!(s.absent.iter().all(|a| !a));
    assert!(s.values.iter().all(|v| *v == 7.0));
}

#[test]
fn summarize_bucket_sum_property() {
    let engine = Engine::default();
    // five-per-bucket runs of 1,2,3,...
    let out = run(&engine, "summarize(metric1,'5s')", 0, 25, |request| {
        let values = (0..25).map(|i| (i / 5 + 1) as f64).collect();
        vec![Series::new(&request.metric, request.from, 1, values)]
    })
    .unwrap();
    assert_eq!(out[0].values, vec![5.0, 10.0, 15.0, 20.0, 25.0]);
}

#[test]
fn hitcount_plan_and_eval_agree_on_alignment() {
    let engine = Engine::default();
    let from = 3600 + 1800;
    let until = 3600 + 2700;
    let out = run(&engine, "hitcount(m,'1h')", from, until, dense(60, |_| 1.0)).unwrap();
    let s = &out[0];
    // the first bucket starts at the hour, not at `from`
    assert_eq!(s.start, 3600);
    assert_eq!(s.step, 3600);
}

#[test]
fn holt_winters_aberration_is_zero_on_flat_input() {
    let engine = Engine::default();
    let week = 7 * 86_400;
    let out = run(
        &engine,
        "holtWintersAberration(metric.flat)",
        week,
        week + 86_400,
        dense(600, |_| 42.0),
    )
    .unwrap();
    let s = &out[0];
    assert!(!s.is_empty());
    for i in 0..s.len() {
        assert_eq!(s.value_at(i), Some(0.0), "aberration leaked at slot {i}");
    }
}

#[test]
fn tukey_above_selects_exactly_the_outliers() {
    let engine = Engine::default();
    let out = run(&engine, "tukeyAbove(metric.*,1.5,5)", 0, 6, |request| {
        let rows: Vec<(&str, Vec<f64>)> = vec![
            ("metric.a", vec![1.0, 2.0, 1.0, 2.0, 100.0, 1.0]),
            ("metric.b", vec![2.0, 1.0, 2.0, 1.0, 2.0, 1.0]),
            ("metric.c", vec![1.0, 2.0, 1.0, 90.0, 95.0, 2.0]),
            ("metric.d", vec![2.0, 2.0, 1.0, 1.0, 2.0, 2.0]),
            ("metric.e", vec![1.0, 120.0, 1.0, 2.0, 1.0, 1.0]),
        ];
        rows.into_iter()
            .map(|(name, values)| Series::new(name, request.from, 1, values))
            .collect()
    })
    .unwrap();
    let names: Vec<&str> = out.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["metric.a", "metric.c", "metric.e"]);
}

#[test]
fn unknown_function_is_an_error_not_a_crash() {
    let engine = Engine::default();
    let result = run(&engine, "definitelyNotAFunction(m)", 0, 60, dense(60, |_| 1.0));
    assert_eq!(
        result,
        Err(EngineError::UnknownFunction(
            "definitelyNotAFunction".to_string()
        ))
    );
}

#[test]
fn missing_leaf_data_is_empty_not_an_error() {
    let engine = Engine::default();
    let expr = engine.parse_target("scale(no.such.metric,2)").unwrap();
    let out = engine.eval(&expr, 0, 60, &FetchMap::new()).unwrap();
    assert!(out.is_empty());
}

#[test]
fn nested_pipeline_composes() {
    let engine = Engine::default();
    let out = run(
        &engine,
        "offset(scale(transformNull(m,1),2),-2)",
        0,
        4,
        |request| {
            vec![Series::with_absent(
                &request.metric,
                request.from,
                1,
                vec![1.0, 0.0, 3.0, 0.0],
                vec![false, true, false, true],
            )]
        },
    )
    .unwrap();
    // fill 1, double, subtract 2
    assert_eq!(out[0].values, vec![0.0, 0.0, 4.0, 0.0]);
    assert!(out[0].absent.iter().all(|a| !a));
}

#[test]
fn rewrite_fans_out_and_reenters() {
    let engine = Engine::default();
    let expr = engine
        .parse_target("applyByNode(servers.*.cpu,1,'sumSeries(%.cpu)')")
        .unwrap();

    let mut fetched = FetchMap::new();
    for request in engine.metrics(&expr, 0, 60).unwrap() {
        fetched.insert(
            request.clone(),
            vec![
                Series::new("servers.web01.cpu", request.from, 60, vec![1.0]),
                Series::new("servers.web02.cpu", request.from, 60, vec![2.0]),
            ],
        );
    }
    let (rewritten, targets) = engine.rewrite(&expr, 0, 60, &fetched).unwrap();
    assert!(rewritten);
    assert_eq!(
        targets,
        vec![
            "sumSeries(servers.web01.cpu)",
            "sumSeries(servers.web02.cpu)",
        ]
    );
    // each target parses cleanly for pipeline re-entry
    for target in &targets {
        assert!(engine.parse_target(target).is_ok());
    }
}

#[test]
fn time_shift_round_trip_through_storage() {
    let engine = Engine::default();
    // storage labels each window with its own from, proving the planner
    // asked for the shifted window and the evaluator relabeled it back
    let out = run(&engine, "timeShift(m,'1h')", 7200, 10800, |request| {
        vec![Series::new(
            &request.metric,
            request.from,
            3600,
            vec![request.from as f64],
        )]
    })
    .unwrap();
    let s = &out[0];
    assert_eq!(s.start, 7200);
    assert_eq!(s.values, vec![3600.0]);
}
