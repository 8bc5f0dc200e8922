//! Tukey outlier selection: `tukeyAbove` and `tukeyBelow`.
//!
//! `tukeyAbove(seriesList, basis, n, interval=0)` pools every present
//! sample of every input series (optionally only a trailing sub-interval),
//! takes the interquartile range, and returns the top `n` series ranked by
//! how many of their samples land beyond `Q3 + basis*IQR` (`tukeyBelow`
//! uses `Q1 - basis*IQR`). Series with no outlying samples never qualify.
//!
//! Selection runs through a bounded min-heap keyed on (count, scan order):
//! when counts tie, the series scanned earlier stays. The tie order is
//! observed behavior, pinned by test, not a promised contract.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::ast::Expr;
use crate::consolidation::percentile;
use crate::engine::eval::EvalContext;
use crate::engine::registry::{ParamKind, ParamMeta, Registration, SeriesFunction};
use crate::errors::EngineError;
use crate::series::{FetchMap, Series};

struct Tukey {
    above: bool,
}

impl SeriesFunction for Tukey {
    fn eval(
        &self,
        ctx: &EvalContext<'_>,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        let function = expr.target().to_string();
        let basis = expr.float_arg(1)?;
        if basis <= 0.0 {
            return Err(EngineError::Eval(format!(
                "{function}: basis must be positive, got {basis}"
            )));
        }
        let n = expr.int_arg(2)?;
        if n < 1 {
            return Err(EngineError::Eval(format!(
                "{function}: n must be at least 1, got {n}"
            )));
        }
        let interval = match expr.arg(3) {
            Some(_) => expr.interval_arg(3, 1)?.abs(),
            None => 0,
        };

        let inputs = ctx.eval_series_arg(expr, 0, from, until, fetched)?;

        // Only the trailing `interval` seconds of each series contribute
        // when an interval is given.
        let begin_index = |series: &Series| -> usize {
            if interval > 0 {
                let points = (interval / series.step.max(1)) as usize;
                series.len().saturating_sub(points)
            } else {
                0
            }
        };

        let mut pool: Vec<f64> = Vec::new();
        for series in &inputs {
            for i in begin_index(series)..series.len() {
                if let Some(v) = series.value_at(i) {
                    pool.push(v);
                }
            }
        }
        let (q1, q3) = match (
            percentile(&mut pool.clone(), 25.0, true),
            percentile(&mut pool, 75.0, true),
        ) {
            (Some(q1), Some(q3)) => (q1, q3),
            _ => return Ok(Vec::new()),
        };
        let iqr = q3 - q1;

        // Bounded selection: the heap root is the weakest keeper. A
        // challenger must strictly beat it, so equal-count incumbents
        // (scanned earlier) survive.
        let mut heap: BinaryHeap<Reverse<(usize, Reverse<usize>)>> = BinaryHeap::new();
        for (index, series) in inputs.iter().enumerate() {
            let count = (begin_index(series)..series.len())
                .filter_map(|i| series.value_at(i))
                .filter(|v| {
                    if self.above {
                        *v > q3 + basis * iqr
                    } else {
                        *v < q1 - basis * iqr
                    }
                })
                .count();
            if count == 0 {
                continue;
            }
            let entry = Reverse((count, Reverse(index)));
            if heap.len() < n as usize {
                heap.push(entry);
            } else if let Some(weakest) = heap.peek() {
                if entry < *weakest {
                    heap.pop();
                    heap.push(entry);
                }
            }
        }

        let mut indices: Vec<usize> = heap
            .into_iter()
            .map(|Reverse((_, Reverse(index)))| index)
            .collect();
        indices.sort_unstable();
        Ok(indices.into_iter().map(|i| inputs[i].clone()).collect())
    }
}

pub fn new() -> Vec<Registration> {
    let params = vec![
        ParamMeta::required("seriesList", ParamKind::Series),
        ParamMeta::required("basis", ParamKind::Float),
        ParamMeta::required("n", ParamKind::Integer),
        ParamMeta::optional("interval", ParamKind::Interval),
    ];
    vec![
        Registration::series("tukeyAbove", Arc::new(Tukey { above: true }), params.clone()),
        Registration::series("tukeyBelow", Arc::new(Tukey { above: false }), params),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::MetricRequest;
    use crate::engine::registry::Registry;
    use crate::syntax::parse;

    fn eval(input: &str, fetched: &FetchMap, from: i64, until: i64) -> Vec<Series> {
        let registry = Registry::new();
        registry.register_all(new());
        let ctx = EvalContext::new(&registry);
        let (expr, _) = parse(input).unwrap();
        ctx.eval_expr(&expr, from, until, fetched).unwrap()
    }

    fn five_series_fetch() -> FetchMap {
        // three of the five carry values far above the pack
        let rows: Vec<(&str, Vec<f64>)> = vec![
            ("metric.a", vec![1.0, 2.0, 1.0, 2.0, 100.0, 1.0]),
            ("metric.b", vec![2.0, 1.0, 2.0, 1.0, 2.0, 1.0]),
            ("metric.c", vec![1.0, 2.0, 1.0, 90.0, 95.0, 2.0]),
            ("metric.d", vec![2.0, 2.0, 1.0, 1.0, 2.0, 2.0]),
            ("metric.e", vec![1.0, 120.0, 1.0, 2.0, 1.0, 1.0]),
        ];
        let series = rows
            .into_iter()
            .map(|(name, values)| Series::new(name, 0, 1, values))
            .collect();
        let mut fetched = FetchMap::new();
        fetched.insert(MetricRequest::new("metric.*", 0, 6), series);
        fetched
    }

    #[test]
    fn above_selects_exactly_the_outlying_series() {
        let out = eval("tukeyAbove(metric.*,1.5,5)", &five_series_fetch(), 0, 6);
        let names: Vec<&str> = out.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["metric.a", "metric.c", "metric.e"]);
    }

    #[test]
    fn n_caps_the_selection_by_count() {
        // metric.c has two outliers, the others one each
        let out = eval("tukeyAbove(metric.*,1.5,1)", &five_series_fetch(), 0, 6);
        let names: Vec<&str> = out.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["metric.c"]);
    }

    #[test]
    fn count_ties_keep_scan_order() {
        // a and e tie at one outlier each; a was scanned first
        let out = eval("tukeyAbove(metric.*,1.5,2)", &five_series_fetch(), 0, 6);
        let names: Vec<&str> = out.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["metric.a", "metric.c"]);
    }

    #[test]
    fn below_uses_the_lower_fence() {
        let mut fetched = FetchMap::new();
        fetched.insert(
            MetricRequest::new("m.*", 0, 4),
            vec![
                Series::new("m.low", 0, 1, vec![10.0, 10.0, -50.0, 10.0]),
                Series::new("m.flat", 0, 1, vec![10.0, 11.0, 10.0, 11.0]),
            ],
        );
        let out = eval("tukeyBelow(m.*,1.5,2)", &fetched, 0, 4);
        let names: Vec<&str> = out.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["m.low"]);
    }

    #[test]
    fn empty_pool_returns_nothing() {
        let out = eval("tukeyAbove(m.*,1.5,3)", &FetchMap::new(), 0, 4);
        assert!(out.is_empty());
    }
}
