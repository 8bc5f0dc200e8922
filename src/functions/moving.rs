//! Moving-window statistics: `movingAverage`, `movingSum`, `movingMin`,
//! `movingMax`, `movingMedian`, and `exponentialMovingAverage`.
//!
//! The window argument is either a bare point count or a quoted wall-clock
//! interval ("5min"). Interval windows fetch leading history (the planner
//! applies the same extension) and the warm-up points are trimmed from the
//! output, so the result still covers the display window.
//!
//! Each output point is the statistic of the window of samples strictly
//! before it. While the window has not yet filled, or when the statistic is
//! NaN, the output is absent, unless an `xFilesFactor` argument permits
//! partial windows.

use std::sync::Arc;

use crate::ast::Expr;
use crate::consolidation::Windowed;
use crate::engine::eval::EvalContext;
use crate::engine::registry::{ParamKind, ParamMeta, Registration, SeriesFunction};
use crate::errors::EngineError;
use crate::series::{FetchMap, Series};

/// Seconds of leading history an interval window needs, 0 for point-count
/// windows. Shared with the planner so fetch keys line up.
pub(crate) fn window_preview_seconds(expr: &Expr) -> Result<i64, EngineError> {
    match expr.arg(1) {
        Some(Expr::QuotedString { .. }) => Ok(expr.interval_arg(1, 1)?.abs()),
        _ => Ok(0),
    }
}

#[derive(Debug, Clone, Copy)]
enum Stat {
    Average,
    Sum,
    Min,
    Max,
    Median,
}

impl Stat {
    fn label(self) -> &'static str {
        match self {
            Stat::Average => "movingAverage",
            Stat::Sum => "movingSum",
            Stat::Min => "movingMin",
            Stat::Max => "movingMax",
            Stat::Median => "movingMedian",
        }
    }

    fn of(self, window: &Windowed) -> f64 {
        match self {
            Stat::Average => window.mean(),
            Stat::Sum => window.sum(),
            Stat::Min => window.min(),
            Stat::Max => window.max(),
            Stat::Median => window.median(),
        }
    }
}

// Resolves the window to points for one series, plus the display label for
// the window argument ('5min' keeps its quotes, counts print bare).
fn window_points(expr: &Expr, series: &Series, preview: i64) -> Result<(usize, String), EngineError> {
    if preview > 0 {
        let text = expr.string_arg(1)?;
        let points = (preview / series.step.max(1)).max(1) as usize;
        return Ok((points, format!("'{text}'")));
    }
    let count = expr.int_arg(1)?;
    if count < 1 {
        return Err(EngineError::Eval(format!(
            "{}: window size must be at least 1, got {count}",
            expr.target()
        )));
    }
    Ok((count as usize, count.to_string()))
}

fn x_files_factor(expr: &Expr) -> Result<Option<f64>, EngineError> {
    if expr.named_or_pos_arg("xFilesFactor", 2).is_none() {
        return Ok(None);
    }
    Ok(Some(expr.float_named_or_pos("xFilesFactor", 2, 0.0)?))
}

struct Moving {
    stat: Stat,
}

impl SeriesFunction for Moving {
    fn eval(
        &self,
        ctx: &EvalContext<'_>,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        let preview = window_preview_seconds(expr)?;
        let inputs = ctx.eval_series_arg(expr, 0, from - preview, until, fetched)?;
        let xff = x_files_factor(expr)?;

        let mut out = Vec::with_capacity(inputs.len());
        for series in &inputs {
            if series.is_empty() {
                continue;
            }
            let (points, window_label) = window_points(expr, series, preview)?;
            let warmup = if preview > 0 {
                ((preview / series.step.max(1)) as usize).min(series.len())
            } else {
                0
            };

            let mut window = Windowed::new(points);
            for i in 0..warmup {
                window.push(series.value_at(i).unwrap_or(f64::NAN));
            }

            let n = series.len() - warmup;
            let mut values = Vec::with_capacity(n);
            let mut absent = Vec::with_capacity(n);
            for i in warmup..series.len() {
                let stat = self.stat.of(&window);
                let permitted = match xff {
                    Some(f) => {
                        window.count() > 0 && window.count() as f64 >= f * points as f64
                    }
                    None => window.is_full(),
                };
                if permitted && !stat.is_nan() {
                    values.push(stat);
                    absent.push(false);
                } else {
                    values.push(0.0);
                    absent.push(true);
                }
                window.push(series.value_at(i).unwrap_or(f64::NAN));
            }

            let start = series.start + warmup as i64 * series.step;
            let name = format!("{}({},{})", self.stat.label(), series.name, window_label);
            out.push(series.derived(name, start, series.stop, series.step, values, absent));
        }
        Ok(out)
    }
}

struct ExponentialMovingAverage;

impl SeriesFunction for ExponentialMovingAverage {
    fn eval(
        &self,
        ctx: &EvalContext<'_>,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        let preview = window_preview_seconds(expr)?;
        let inputs = ctx.eval_series_arg(expr, 0, from - preview, until, fetched)?;

        let mut out = Vec::with_capacity(inputs.len());
        for series in &inputs {
            if series.is_empty() {
                continue;
            }
            let (points, window_label) = window_points(expr, series, preview)?;
            let constant = 2.0 / (points as f64 + 1.0);

            // The EMA seeds with the plain average of the first window.
            let mut seed = Windowed::new(points);
            let warmup = points.min(series.len());
            for i in 0..warmup {
                seed.push(series.value_at(i).unwrap_or(f64::NAN));
            }
            let mut ema = seed.mean();

            let n = series.len() - warmup;
            let mut values = Vec::with_capacity(n);
            let mut absent = Vec::with_capacity(n);
            for i in warmup..series.len() {
                match series.value_at(i) {
                    Some(v) if !ema.is_nan() => {
                        ema = constant * v + (1.0 - constant) * ema;
                        values.push(ema);
                        absent.push(false);
                    }
                    Some(v) => {
                        // seed window held no valid sample; restart from here
                        ema = v;
                        values.push(ema);
                        absent.push(false);
                    }
                    None => {
                        values.push(0.0);
                        absent.push(true);
                    }
                }
            }

            let start = series.start + warmup as i64 * series.step;
            let name = format!(
                "exponentialMovingAverage({},{})",
                series.name, window_label
            );
            out.push(series.derived(name, start, series.stop, series.step, values, absent));
        }
        Ok(out)
    }
}

pub fn new() -> Vec<Registration> {
    let params = vec![
        ParamMeta::required("seriesList", ParamKind::Series),
        ParamMeta::required("windowSize", ParamKind::Interval),
        ParamMeta::optional("xFilesFactor", ParamKind::Float),
    ];
    let stats = [
        Stat::Average,
        Stat::Sum,
        Stat::Min,
        Stat::Max,
        Stat::Median,
    ];
    let mut registrations: Vec<Registration> = stats
        .into_iter()
        .map(|stat| {
            Registration::series(stat.label(), Arc::new(Moving { stat }), params.clone())
        })
        .collect();
    registrations.push(Registration::series(
        "exponentialMovingAverage",
        Arc::new(ExponentialMovingAverage),
        params[..2].to_vec(),
    ));
    registrations
}
