//! Pointwise value transforms: `transformNull`, `absolute`, `scale`,
//! `offset`.
//!
//! The structurally simplest plug-ins: each derives a fresh series per
//! input and maps the samples. `transformNull` is the interesting one,
//! filling absent slots with a default, optionally only where a reference
//! series has data.

use std::sync::Arc;

use crate::ast::Expr;
use crate::engine::eval::EvalContext;
use crate::engine::registry::{ParamKind, ParamMeta, Registration, SeriesFunction};
use crate::errors::EngineError;
use crate::series::{FetchMap, Series};

struct TransformNull;

impl SeriesFunction for TransformNull {
    fn eval(
        &self,
        ctx: &EvalContext<'_>,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        let default = expr.float_named_or_pos("default", 1, 0.0)?;
        let reference = match expr.named_or_pos_arg("referenceSeries", 2) {
            Some(arg) => Some(ctx.eval_expr(arg, from, until, fetched)?),
            None => None,
        };

        // A slot is fillable when no reference was given, or when any
        // reference series has data at that timestamp.
        let fillable = |t: i64| -> bool {
            match &reference {
                None => true,
                Some(reference) => reference.iter().any(|r| {
                    if r.step <= 0 || t < r.start || t >= r.stop {
                        return false;
                    }
                    let index = ((t - r.start) / r.step) as usize;
                    r.value_at(index).is_some()
                }),
            }
        };

        let inputs = ctx.eval_series_arg(expr, 0, from, until, fetched)?;
        let mut out = Vec::with_capacity(inputs.len());
        for series in &inputs {
            let mut values = series.values.clone();
            let mut absent = series.absent.clone();
            for i in 0..series.len() {
                if absent[i] && fillable(series.start + i as i64 * series.step) {
                    values[i] = default;
                    absent[i] = false;
                }
            }
            let name = format!("transformNull({},{})", series.name, default);
            out.push(series.derived_values(name, values, absent));
        }
        Ok(out)
    }
}

struct Absolute;

impl SeriesFunction for Absolute {
    fn eval(
        &self,
        ctx: &EvalContext<'_>,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        let inputs = ctx.eval_series_arg(expr, 0, from, until, fetched)?;
        Ok(inputs
            .iter()
            .map(|series| {
                let values = series.values.iter().map(|v| v.abs()).collect();
                let name = format!("absolute({})", series.name);
                series.derived_values(name, values, series.absent.clone())
            })
            .collect())
    }
}

struct Scale;

impl SeriesFunction for Scale {
    fn eval(
        &self,
        ctx: &EvalContext<'_>,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        let factor = expr.float_arg(1)?;
        let inputs = ctx.eval_series_arg(expr, 0, from, until, fetched)?;
        Ok(inputs
            .iter()
            .map(|series| {
                let values = series.values.iter().map(|v| v * factor).collect();
                let name = format!("scale({},{})", series.name, factor);
                series.derived_values(name, values, series.absent.clone())
            })
            .collect())
    }
}

struct Offset;

impl SeriesFunction for Offset {
    fn eval(
        &self,
        ctx: &EvalContext<'_>,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        let amount = expr.float_arg(1)?;
        let inputs = ctx.eval_series_arg(expr, 0, from, until, fetched)?;
        Ok(inputs
            .iter()
            .map(|series| {
                let values = series.values.iter().map(|v| v + amount).collect();
                let name = format!("offset({},{})", series.name, amount);
                series.derived_values(name, values, series.absent.clone())
            })
            .collect())
    }
}

pub fn new() -> Vec<Registration> {
    let series_and_factor = vec![
        ParamMeta::required("seriesList", ParamKind::Series),
        ParamMeta::required("factor", ParamKind::Float),
    ];
    vec![
        Registration::series(
            "transformNull",
            Arc::new(TransformNull),
            vec![
                ParamMeta::required("seriesList", ParamKind::Series),
                ParamMeta::optional("default", ParamKind::Float),
                ParamMeta::optional("referenceSeries", ParamKind::Series),
            ],
        ),
        Registration::series(
            "absolute",
            Arc::new(Absolute),
            vec![ParamMeta::required("seriesList", ParamKind::Series)],
        ),
        Registration::series("scale", Arc::new(Scale), series_and_factor.clone()),
        Registration::series("offset", Arc::new(Offset), series_and_factor),
    ]
}
