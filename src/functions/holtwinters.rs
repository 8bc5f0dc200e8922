//! Holt-Winters triple exponential smoothing: `holtWintersForecast`,
//! `holtWintersConfidenceBands`, `holtWintersConfidenceArea`, and
//! `holtWintersAberration`.
//!
//! The model runs level, trend, and a fixed 24-hour seasonal component
//! with the classic Graphite constants (alpha=0.1, beta=0.0035,
//! gamma=0.1). Every variant fetches a week of leading history to
//! bootstrap the seasonal terms, then trims it from the output; the
//! planner applies the same extension.

use std::sync::Arc;

use crate::ast::Expr;
use crate::engine::eval::EvalContext;
use crate::engine::registry::{ParamKind, ParamMeta, Registration, SeriesFunction};
use crate::errors::EngineError;
use crate::series::{FetchMap, Series};

/// Leading history fetched for the seasonal bootstrap. Shared with the
/// planner so fetch keys line up.
pub const BOOTSTRAP_SECONDS: i64 = 7 * 86_400;

const SEASON_SECONDS: i64 = 86_400;
const ALPHA: f64 = 0.1;
const BETA: f64 = 0.0035;
const GAMMA: f64 = 0.1;

// ============================================================================
// MODEL
// ============================================================================

// One pass over the samples producing the one-step-ahead prediction and the
// rolling seasonal deviation at every slot. A prediction is None at slot 0
// and directly after an absent sample.
fn analyze(series: &Series) -> (Vec<Option<f64>>, Vec<f64>) {
    let season = (SEASON_SECONDS / series.step.max(1)).max(1) as usize;
    let n = series.len();

    let mut intercepts: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut slopes: Vec<f64> = Vec::with_capacity(n);
    let mut seasonals: Vec<f64> = Vec::with_capacity(n);
    let mut predictions: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut deviations: Vec<f64> = Vec::with_capacity(n);

    let seasonal_at = |seasonals: &[f64], i: usize| -> f64 {
        if i >= season {
            seasonals[i - season]
        } else {
            0.0
        }
    };
    let deviation_at = |deviations: &[f64], i: usize| -> f64 {
        if i >= season {
            deviations[i - season]
        } else {
            0.0
        }
    };

    let mut next_prediction: Option<f64> = None;
    for i in 0..n {
        let actual = match series.value_at(i) {
            Some(v) => v,
            None => {
                intercepts.push(None);
                slopes.push(0.0);
                seasonals.push(0.0);
                predictions.push(next_prediction);
                deviations.push(0.0);
                next_prediction = None;
                continue;
            }
        };

        let (last_intercept, last_slope, prediction) = if i == 0 {
            (actual, 0.0, Some(actual))
        } else {
            let last_intercept = intercepts[i - 1].unwrap_or(actual);
            (last_intercept, slopes[i - 1], next_prediction)
        };

        let last_seasonal = seasonal_at(&seasonals, i);
        let last_seasonal_dev = deviation_at(&deviations, i);

        let intercept =
            ALPHA * (actual - last_seasonal) + (1.0 - ALPHA) * (last_intercept + last_slope);
        let slope = BETA * (intercept - last_intercept) + (1.0 - BETA) * last_slope;
        let seasonal = GAMMA * (actual - intercept) + (1.0 - GAMMA) * last_seasonal;

        let deviation = match prediction {
            Some(p) => GAMMA * (actual - p).abs() + (1.0 - GAMMA) * last_seasonal_dev,
            None => 0.0,
        };

        intercepts.push(Some(intercept));
        slopes.push(slope);
        seasonals.push(seasonal);
        predictions.push(prediction);
        deviations.push(deviation);

        // Pushed first: a one-slot season reads the seasonal just computed.
        next_prediction = Some(intercept + slope + seasonal_at(&seasonals, i + 1));
    }

    (predictions, deviations)
}

// Bootstrapped inputs plus the number of leading warm-up slots to trim.
fn bootstrapped_inputs(
    ctx: &EvalContext<'_>,
    expr: &Expr,
    from: i64,
    until: i64,
    fetched: &FetchMap,
) -> Result<Vec<(Series, usize)>, EngineError> {
    let inputs = ctx.eval_series_arg(expr, 0, from - BOOTSTRAP_SECONDS, until, fetched)?;
    Ok(inputs
        .into_iter()
        .filter_map(|series| {
            let warmup = (BOOTSTRAP_SECONDS / series.step.max(1)) as usize;
            if series.len() > warmup {
                Some((series, warmup))
            } else {
                None
            }
        })
        .collect())
}

fn trimmed(
    series: &Series,
    name: String,
    warmup: usize,
    points: Vec<Option<f64>>,
) -> Series {
    let n = points.len();
    let mut values = Vec::with_capacity(n);
    let mut absent = Vec::with_capacity(n);
    for point in points {
        match point {
            Some(v) => {
                values.push(v);
                absent.push(false);
            }
            None => {
                values.push(0.0);
                absent.push(true);
            }
        }
    }
    let start = series.start + warmup as i64 * series.step;
    series.derived(name, start, series.stop, series.step, values, absent)
}

// ============================================================================
// FUNCTIONS
// ============================================================================

struct Forecast;

impl SeriesFunction for Forecast {
    fn eval(
        &self,
        ctx: &EvalContext<'_>,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        let mut out = Vec::new();
        for (series, warmup) in bootstrapped_inputs(ctx, expr, from, until, fetched)? {
            let (predictions, _) = analyze(&series);
            let name = format!("holtWintersForecast({})", series.name);
            out.push(trimmed(&series, name, warmup, predictions[warmup..].to_vec()));
        }
        Ok(out)
    }
}

/// Emits the lower band then the upper band per input series. Also serves
/// the confidence-area variant, which differs only in how a renderer draws
/// the pair.
struct ConfidenceBands;

impl SeriesFunction for ConfidenceBands {
    fn eval(
        &self,
        ctx: &EvalContext<'_>,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        let delta = expr.float_named_or_pos("delta", 1, 3.0)?;
        let mut out = Vec::new();
        for (series, warmup) in bootstrapped_inputs(ctx, expr, from, until, fetched)? {
            let (lower, upper) = bands(&series, warmup, delta);
            out.push(trimmed(
                &series,
                format!("holtWintersConfidenceLower({})", series.name),
                warmup,
                lower,
            ));
            out.push(trimmed(
                &series,
                format!("holtWintersConfidenceUpper({})", series.name),
                warmup,
                upper,
            ));
        }
        Ok(out)
    }
}

fn bands(series: &Series, warmup: usize, delta: f64) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let (predictions, deviations) = analyze(series);
    let mut lower = Vec::with_capacity(series.len() - warmup);
    let mut upper = Vec::with_capacity(series.len() - warmup);
    for i in warmup..series.len() {
        match predictions[i] {
            Some(p) => {
                lower.push(Some(p - delta * deviations[i]));
                upper.push(Some(p + delta * deviations[i]));
            }
            None => {
                lower.push(None);
                upper.push(None);
            }
        }
    }
    (lower, upper)
}

struct Aberration;

impl SeriesFunction for Aberration {
    fn eval(
        &self,
        ctx: &EvalContext<'_>,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        let delta = expr.float_named_or_pos("delta", 1, 3.0)?;
        let mut out = Vec::new();
        for (series, warmup) in bootstrapped_inputs(ctx, expr, from, until, fetched)? {
            let (lower, upper) = bands(&series, warmup, delta);
            let n = series.len() - warmup;
            let mut values = Vec::with_capacity(n);
            for i in 0..n {
                let aberration = match (series.value_at(warmup + i), lower[i], upper[i]) {
                    (Some(actual), _, Some(up)) if actual > up => actual - up,
                    (Some(actual), Some(low), _) if actual < low => actual - low,
                    _ => 0.0,
                };
                values.push(Some(aberration));
            }
            let name = format!("holtWintersAberration({})", series.name);
            out.push(trimmed(&series, name, warmup, values));
        }
        Ok(out)
    }
}

pub fn new() -> Vec<Registration> {
    let series_only = vec![ParamMeta::required("seriesList", ParamKind::Series)];
    let with_delta = vec![
        ParamMeta::required("seriesList", ParamKind::Series),
        ParamMeta::optional("delta", ParamKind::Float),
    ];
    vec![
        Registration::series("holtWintersForecast", Arc::new(Forecast), series_only),
        Registration::series(
            "holtWintersConfidenceBands",
            Arc::new(ConfidenceBands),
            with_delta.clone(),
        ),
        Registration::series(
            "holtWintersConfidenceArea",
            Arc::new(ConfidenceBands),
            with_delta.clone(),
        ),
        Registration::series("holtWintersAberration", Arc::new(Aberration), with_delta),
    ]
}
