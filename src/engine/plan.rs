//! The fetch planner: computes which `(pattern, from, until)` requests an
//! expression needs before it can be evaluated.
//!
//! A miniature query planner. Name leaves yield themselves at the given
//! bounds; literals yield nothing; calls union their positional children
//! and then apply function-specific time adjustments for functions that
//! read history beyond the display window.
//!
//! Consistency invariant: every adjustment here has a matching fetch in the
//! function's evaluator, at the same adjusted bounds, or fetch-map keys
//! will not line up and the evaluator will see empty data. The shared
//! constants (bootstrap window, stack defaults, window preview) live in the
//! function modules and are imported here for exactly that reason.

use crate::ast::{Expr, MetricRequest};
use crate::errors::EngineError;
use crate::functions::holtwinters::BOOTSTRAP_SECONDS;
use crate::functions::moving::window_preview_seconds;
use crate::functions::timeshift::{DEFAULT_STACK_END, DEFAULT_STACK_START, DEFAULT_STACK_UNIT};

/// Collects every fetch the expression requires over `[from, until)`.
pub fn metrics(expr: &Expr, from: i64, until: i64) -> Result<Vec<MetricRequest>, EngineError> {
    match expr {
        Expr::Name { target } => Ok(vec![MetricRequest::new(target.clone(), from, until)]),
        Expr::Const { .. } | Expr::QuotedString { .. } | Expr::Bool { .. } => Ok(Vec::new()),
        Expr::Func { name, args, .. } => match name.as_str() {
            // Both bounds translate by the (default-negative) offset.
            "timeShift" => {
                let offset = expr.interval_arg(1, -1)?;
                union(args, from + offset, until + offset)
            }

            // One request fans into copies at offset multiples between the
            // start and end indices, inclusive.
            "timeStack" => {
                let offset =
                    expr.interval_named_or_pos("timeShiftUnit", 1, DEFAULT_STACK_UNIT, -1)?;
                let start = expr.int_named_or_pos("timeShiftStart", 2, DEFAULT_STACK_START)?;
                let end = expr.int_named_or_pos("timeShiftEnd", 3, DEFAULT_STACK_END)?;
                let mut requests = Vec::new();
                for i in start..=end {
                    requests.extend(union(args, from + offset * i, until + offset * i)?);
                }
                Ok(requests)
            }

            // The forecast family bootstraps on a fixed week of history.
            "holtWintersForecast"
            | "holtWintersConfidenceBands"
            | "holtWintersConfidenceArea"
            | "holtWintersAberration" => union(args, from - BOOTSTRAP_SECONDS, until),

            // Interval windows need leading history; bare point counts
            // leave the bounds unchanged.
            "movingAverage" | "movingSum" | "movingMin" | "movingMax" | "movingMedian"
            | "exponentialMovingAverage" => {
                let preview = window_preview_seconds(expr)?;
                union(args, from - preview, until)
            }

            // A named reference series is a literal to the argument walk,
            // so its own metrics are unioned in explicitly. A positional
            // reference is already covered by the child recursion.
            "transformNull" => {
                let mut requests = union(args, from, until)?;
                if let Some(reference) = expr.named_arg("referenceSeries") {
                    requests.extend(metrics(reference, from, until)?);
                }
                Ok(requests)
            }

            // Hit counting aligns the window down to the enclosing bucket
            // so the first bucket is complete.
            "hitcount" => {
                let bucket = expr.interval_arg(1, 1)?;
                let aligned = if bucket > 0 {
                    from - from.rem_euclid(bucket)
                } else {
                    from
                };
                union(args, aligned, until)
            }

            _ => union(args, from, until),
        },
    }
}

fn union(args: &[Expr], from: i64, until: i64) -> Result<Vec<MetricRequest>, EngineError> {
    let mut requests = Vec::new();
    for arg in args {
        requests.extend(metrics(arg, from, until)?);
    }
    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse;

    fn plan(input: &str, from: i64, until: i64) -> Vec<MetricRequest> {
        let (expr, _) = parse(input).unwrap();
        metrics(&expr, from, until).unwrap()
    }

    #[test]
    fn name_leaf_uses_given_bounds() {
        assert_eq!(
            plan("a.b.c", 100, 200),
            vec![MetricRequest::new("a.b.c", 100, 200)]
        );
    }

    #[test]
    fn literals_need_no_fetch() {
        assert!(plan("scale(m,2)", 0, 60)
            .iter()
            .all(|r| r.metric == "m"));
    }

    #[test]
    fn time_shift_translates_both_bounds() {
        assert_eq!(
            plan("timeShift(m,'1h')", 7200, 10800),
            vec![MetricRequest::new("m", 3600, 7200)]
        );
    }

    #[test]
    fn moving_interval_window_extends_from() {
        assert_eq!(
            plan("movingAverage(m,'5min')", 1000, 2000),
            vec![MetricRequest::new("m", 700, 2000)]
        );
        // point-count windows leave the bounds alone
        assert_eq!(
            plan("movingAverage(m,4)", 1000, 2000),
            vec![MetricRequest::new("m", 1000, 2000)]
        );
    }

    #[test]
    fn hitcount_aligns_from_to_bucket_start() {
        // 10:30..10:45 with 1h buckets extends back to 10:00
        let from = 10 * 3600 + 1800;
        let until = 10 * 3600 + 2700;
        assert_eq!(
            plan("hitcount(m,'1h')", from, until),
            vec![MetricRequest::new("m", 10 * 3600, until)]
        );
    }

    #[test]
    fn holt_winters_bootstraps_a_week() {
        let week = 7 * 86_400;
        assert_eq!(
            plan("holtWintersForecast(m)", week + 100, week + 200),
            vec![MetricRequest::new("m", 100, week + 200)]
        );
    }

    #[test]
    fn transform_null_unions_named_reference() {
        let requests = plan("transformNull(m,default=0,referenceSeries=other.m)", 0, 60);
        assert!(requests.contains(&MetricRequest::new("m", 0, 60)));
        assert!(requests.contains(&MetricRequest::new("other.m", 0, 60)));
    }

    #[test]
    fn time_stack_fans_out_inclusively() {
        let requests = plan("timeStack(m,'1d',0,2)", 86_400 * 10, 86_400 * 10 + 60);
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].from, 86_400 * 10);
        assert_eq!(requests[1].from, 86_400 * 9);
        assert_eq!(requests[2].from, 86_400 * 8);
    }
}
