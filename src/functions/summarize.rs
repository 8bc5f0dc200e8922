//! Interval bucketing: `summarize` and `hitcount`.
//!
//! `summarize(seriesList, interval, func='sum', alignToFrom=false)` folds
//! samples into fixed buckets with a pluggable reducer. Buckets align to
//! absolute interval boundaries unless `alignToFrom` pins them to the
//! series start. An empty bucket is absent with value 0, never a NaN.
//!
//! `hitcount(seriesList, interval, alignToInterval=false)` estimates hits
//! per bucket as the sum of value×step, converting a rate series back into
//! a count. The planner extends `from` down to the enclosing bucket start
//! so the first bucket is complete; the evaluator re-fetches at the same
//! aligned bound.

use std::sync::Arc;

use crate::ast::Expr;
use crate::consolidation::Reducer;
use crate::engine::eval::EvalContext;
use crate::engine::registry::{ParamKind, ParamMeta, Registration, SeriesFunction};
use crate::errors::EngineError;
use crate::series::{FetchMap, Series};

fn bucket_seconds(expr: &Expr) -> Result<i64, EngineError> {
    let bucket = expr.interval_arg(1, 1)?;
    if bucket <= 0 {
        return Err(EngineError::Eval(format!(
            "{}: bucket interval must be positive",
            expr.target()
        )));
    }
    Ok(bucket)
}

// Gathers present samples into buckets of `bucket` seconds anchored at
// `bucket_start`. Returns one Vec per bucket.
fn fill_buckets(series: &Series, bucket_start: i64, bucket: i64, n_buckets: usize) -> Vec<Vec<f64>> {
    let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); n_buckets];
    for i in 0..series.len() {
        if let Some(v) = series.value_at(i) {
            let t = series.start + i as i64 * series.step;
            let index = (t - bucket_start).div_euclid(bucket);
            if (0..n_buckets as i64).contains(&index) {
                buckets[index as usize].push(v);
            }
        }
    }
    buckets
}

struct Summarize;

impl SeriesFunction for Summarize {
    fn eval(
        &self,
        ctx: &EvalContext<'_>,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        let bucket = bucket_seconds(expr)?;
        let interval_text = expr.string_arg(1)?.to_string();
        let func = expr.string_named_or_pos("func", 2, "sum")?.to_string();
        let reducer = Reducer::from_name(&func).ok_or(EngineError::ArgumentType {
            function: "summarize".to_string(),
            index: 2,
            expected: "a reducer name",
        })?;
        let align_to_from = expr.bool_named_or_pos("alignToFrom", 3, false)?;

        let inputs = ctx.eval_series_arg(expr, 0, from, until, fetched)?;
        let mut out = Vec::with_capacity(inputs.len());
        for series in &inputs {
            if series.is_empty() {
                continue;
            }
            let bucket_start = if align_to_from {
                series.start
            } else {
                series.start - series.start.rem_euclid(bucket)
            };
            let span = series.stop - bucket_start;
            let n_buckets = (span.div_euclid(bucket)
                + if span.rem_euclid(bucket) > 0 { 1 } else { 0 }) as usize;

            let mut values = vec![0.0; n_buckets];
            let mut absent = vec![true; n_buckets];
            for (index, samples) in fill_buckets(series, bucket_start, bucket, n_buckets)
                .iter()
                .enumerate()
            {
                if let Some(v) = reducer.apply(samples) {
                    values[index] = v;
                    absent[index] = false;
                }
            }

            let name = format!("summarize({},'{}','{}')", series.name, interval_text, func);
            out.push(series.derived(
                name,
                bucket_start,
                bucket_start + n_buckets as i64 * bucket,
                bucket,
                values,
                absent,
            ));
        }
        Ok(out)
    }
}

struct Hitcount;

impl SeriesFunction for Hitcount {
    fn eval(
        &self,
        ctx: &EvalContext<'_>,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        let bucket = bucket_seconds(expr)?;
        let interval_text = expr.string_arg(1)?.to_string();
        let align_to_interval = expr.bool_named_or_pos("alignToInterval", 2, false)?;

        // Must match the planner's alignment or the fetch key misses.
        let aligned_from = from - from.rem_euclid(bucket);
        let inputs = ctx.eval_series_arg(expr, 0, aligned_from, until, fetched)?;

        let mut out = Vec::with_capacity(inputs.len());
        for series in &inputs {
            if series.is_empty() {
                continue;
            }
            let bucket_start = if align_to_interval {
                series.start - series.start.rem_euclid(bucket)
            } else {
                series.start
            };
            let span = series.stop - bucket_start;
            let n_buckets = (span.div_euclid(bucket)
                + if span.rem_euclid(bucket) > 0 { 1 } else { 0 }) as usize;

            let mut values = vec![0.0; n_buckets];
            let mut absent = vec![true; n_buckets];
            for i in 0..series.len() {
                if let Some(v) = series.value_at(i) {
                    let t = series.start + i as i64 * series.step;
                    let index = (t - bucket_start).div_euclid(bucket);
                    if (0..n_buckets as i64).contains(&index) {
                        values[index as usize] += v * series.step as f64;
                        absent[index as usize] = false;
                    }
                }
            }

            let name = if align_to_interval {
                format!("hitcount({},'{}',true)", series.name, interval_text)
            } else {
                format!("hitcount({},'{}')", series.name, interval_text)
            };
            out.push(series.derived(
                name,
                bucket_start,
                bucket_start + n_buckets as i64 * bucket,
                bucket,
                values,
                absent,
            ));
        }
        Ok(out)
    }
}

pub fn new() -> Vec<Registration> {
    vec![
        Registration::series(
            "summarize",
            Arc::new(Summarize),
            vec![
                ParamMeta::required("seriesList", ParamKind::Series),
                ParamMeta::required("intervalString", ParamKind::Interval),
                ParamMeta::optional("func", ParamKind::String),
                ParamMeta::optional("alignToFrom", ParamKind::Boolean),
            ],
        ),
        Registration::series(
            "hitcount",
            Arc::new(Hitcount),
            vec![
                ParamMeta::required("seriesList", ParamKind::Series),
                ParamMeta::required("intervalString", ParamKind::Interval),
                ParamMeta::optional("alignToInterval", ParamKind::Boolean),
            ],
        ),
    ]
}
