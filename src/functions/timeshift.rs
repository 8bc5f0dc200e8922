//! Time translation: `timeShift` and `timeStack`.
//!
//! Both evaluate their series argument at shifted bounds (the planner
//! requests the same shifted windows) and then relabel the timestamps back
//! into the display window so shifted data overlays the current data.
//! `timeStack` fans one series into a copy per offset multiple between the
//! start and end indices, inclusive, for week-over-week style views.

use std::sync::Arc;

use crate::ast::Expr;
use crate::engine::eval::EvalContext;
use crate::engine::registry::{ParamKind, ParamMeta, Registration, SeriesFunction};
use crate::errors::EngineError;
use crate::series::{FetchMap, Series};

/// `timeStack` defaults, shared with the planner.
pub const DEFAULT_STACK_UNIT: &str = "1d";
pub const DEFAULT_STACK_START: i64 = 0;
pub const DEFAULT_STACK_END: i64 = 7;

fn relabel(series: &Series, name: String, shift: i64) -> Series {
    series.derived(
        name,
        series.start - shift,
        series.stop - shift,
        series.step,
        series.values.clone(),
        series.absent.clone(),
    )
}

struct TimeShift;

impl SeriesFunction for TimeShift {
    fn eval(
        &self,
        ctx: &EvalContext<'_>,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        let offset = expr.interval_arg(1, -1)?;
        let shift_text = expr.string_arg(1)?.to_string();
        let inputs = ctx.eval_series_arg(expr, 0, from + offset, until + offset, fetched)?;
        Ok(inputs
            .iter()
            .map(|series| {
                let name = format!("timeShift({},'{}')", series.name, shift_text);
                relabel(series, name, offset)
            })
            .collect())
    }
}

struct TimeStack;

impl SeriesFunction for TimeStack {
    fn eval(
        &self,
        ctx: &EvalContext<'_>,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        let offset = expr.interval_named_or_pos("timeShiftUnit", 1, DEFAULT_STACK_UNIT, -1)?;
        let unit_text = expr
            .string_named_or_pos("timeShiftUnit", 1, DEFAULT_STACK_UNIT)?
            .to_string();
        let start = expr.int_named_or_pos("timeShiftStart", 2, DEFAULT_STACK_START)?;
        let end = expr.int_named_or_pos("timeShiftEnd", 3, DEFAULT_STACK_END)?;
        if start > end {
            return Err(EngineError::Eval(format!(
                "timeStack: start index {start} is past end index {end}"
            )));
        }

        let mut out = Vec::new();
        for i in start..=end {
            let shift = offset * i;
            let inputs = ctx.eval_series_arg(expr, 0, from + shift, until + shift, fetched)?;
            for series in &inputs {
                let name = format!("timeStack({},'{}',{})", series.name, unit_text, i);
                out.push(relabel(series, name, shift));
            }
        }
        Ok(out)
    }
}

pub fn new() -> Vec<Registration> {
    vec![
        Registration::series(
            "timeShift",
            Arc::new(TimeShift),
            vec![
                ParamMeta::required("seriesList", ParamKind::Series),
                ParamMeta::required("timeShift", ParamKind::Interval),
            ],
        ),
        Registration::series(
            "timeStack",
            Arc::new(TimeStack),
            vec![
                ParamMeta::required("seriesList", ParamKind::Series),
                ParamMeta::optional("timeShiftUnit", ParamKind::Interval),
                ParamMeta::optional("timeShiftStart", ParamKind::Integer),
                ParamMeta::optional("timeShiftEnd", ParamKind::Integer),
            ],
        ),
    ]
}
