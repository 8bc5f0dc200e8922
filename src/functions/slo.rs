//! Service-level objective bucketing: `slo` and `errorBudget`.
//!
//! `slo(seriesList, interval, method, value)` reports, per fixed bucket,
//! the fraction of present samples satisfying the comparator against the
//! threshold. `errorBudget(seriesList, interval, method, value, target)`
//! rescales that fraction to seconds of budget: `(fraction - target) *
//! bucket_seconds`, signed, negative meaning the budget is exceeded.
//! Buckets with no present samples are absent.

use std::sync::Arc;

use crate::ast::Expr;
use crate::engine::eval::EvalContext;
use crate::engine::registry::{ParamKind, ParamMeta, Registration, SeriesFunction};
use crate::errors::EngineError;
use crate::series::{FetchMap, Series};

#[derive(Debug, Clone, Copy)]
enum Method {
    Above,
    AboveOrEqual,
    Below,
    BelowOrEqual,
}

impl Method {
    fn from_name(name: &str) -> Option<Method> {
        match name {
            "above" => Some(Method::Above),
            "aboveOrEqual" => Some(Method::AboveOrEqual),
            "below" => Some(Method::Below),
            "belowOrEqual" => Some(Method::BelowOrEqual),
            _ => None,
        }
    }

    fn matches(self, sample: f64, threshold: f64) -> bool {
        match self {
            Method::Above => sample > threshold,
            Method::AboveOrEqual => sample >= threshold,
            Method::Below => sample < threshold,
            Method::BelowOrEqual => sample <= threshold,
        }
    }
}

struct Slo {
    budget: bool,
}

impl Slo {
    fn fractions(
        &self,
        series: &Series,
        bucket: i64,
        method: Method,
        threshold: f64,
    ) -> Vec<Option<f64>> {
        let span = series.stop - series.start;
        let n_buckets =
            (span.div_euclid(bucket) + if span.rem_euclid(bucket) > 0 { 1 } else { 0 }) as usize;
        let mut matched = vec![0usize; n_buckets];
        let mut total = vec![0usize; n_buckets];
        for i in 0..series.len() {
            if let Some(v) = series.value_at(i) {
                let t = series.start + i as i64 * series.step;
                let index = ((t - series.start) / bucket) as usize;
                if index < n_buckets {
                    total[index] += 1;
                    if method.matches(v, threshold) {
                        matched[index] += 1;
                    }
                }
            }
        }
        (0..n_buckets)
            .map(|i| {
                if total[i] == 0 {
                    None
                } else {
                    Some(matched[i] as f64 / total[i] as f64)
                }
            })
            .collect()
    }
}

impl SeriesFunction for Slo {
    fn eval(
        &self,
        ctx: &EvalContext<'_>,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        let function = expr.target().to_string();
        let bucket = expr.interval_arg(1, 1)?;
        if bucket <= 0 {
            return Err(EngineError::Eval(format!(
                "{function}: bucket interval must be positive"
            )));
        }
        let interval_text = expr.string_arg(1)?.to_string();
        let method_name = expr.string_arg(2)?.to_string();
        let method = Method::from_name(&method_name).ok_or(EngineError::ArgumentType {
            function: function.clone(),
            index: 2,
            expected: "one of above/aboveOrEqual/below/belowOrEqual",
        })?;
        let threshold = expr.float_arg(3)?;
        let target = if self.budget { expr.float_arg(4)? } else { 0.0 };

        let inputs = ctx.eval_series_arg(expr, 0, from, until, fetched)?;
        let mut out = Vec::with_capacity(inputs.len());
        for series in &inputs {
            if series.is_empty() {
                continue;
            }
            let fractions = self.fractions(series, bucket, method, threshold);
            let n = fractions.len();
            let mut values = Vec::with_capacity(n);
            let mut absent = Vec::with_capacity(n);
            for fraction in fractions {
                match fraction {
                    Some(f) => {
                        let v = if self.budget {
                            (f - target) * bucket as f64
                        } else {
                            f
                        };
                        values.push(v);
                        absent.push(false);
                    }
                    None => {
                        values.push(0.0);
                        absent.push(true);
                    }
                }
            }

            let name = if self.budget {
                format!(
                    "errorBudget({},'{}','{}',{},{})",
                    series.name, interval_text, method_name, threshold, target
                )
            } else {
                format!(
                    "slo({},'{}','{}',{})",
                    series.name, interval_text, method_name, threshold
                )
            };
            out.push(series.derived(
                name,
                series.start,
                series.start + n as i64 * bucket,
                bucket,
                values,
                absent,
            ));
        }
        Ok(out)
    }
}

pub fn new() -> Vec<Registration> {
    let slo_params = vec![
        ParamMeta::required("seriesList", ParamKind::Series),
        ParamMeta::required("interval", ParamKind::Interval),
        ParamMeta::required("method", ParamKind::String),
        ParamMeta::required("value", ParamKind::Float),
    ];
    let mut budget_params = slo_params.clone();
    budget_params.push(ParamMeta::required("target", ParamKind::Float));
    vec![
        Registration::series("slo", Arc::new(Slo { budget: false }), slo_params),
        Registration::series("errorBudget", Arc::new(Slo { budget: true }), budget_params),
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

    fn latency_fetch() -> FetchMap {
        // two 5-sample buckets: 4/5 then 2/5 below 100
        let values = vec![50.0, 60.0, 150.0, 70.0, 80.0, 120.0, 90.0, 130.0, 140.0, 95.0];
        let mut fetched = FetchMap::new();
        fetched.insert(
            MetricRequest::new("latency", 0, 10),
            vec![Series::new("latency", 0, 1, values)],
        );
        fetched
    }

    #[test]
    fn slo_reports_per_bucket_fractions() {
        let out = eval("slo(latency,'5s','below',100)", &latency_fetch(), 0, 10);
        let s = &out[0];
        assert_eq!(s.step, 5);
        assert_eq!(s.values, vec![0.8, 0.4]);
    }

    #[test]
    fn error_budget_scales_and_signs() {
        let out = eval(
            "errorBudget(latency,'5s','below',100,0.5)",
            &latency_fetch(),
            0,
            10,
        );
        let s = &out[0];
        // (0.8-0.5)*5 = 1.5 in budget, (0.4-0.5)*5 = -0.5 exceeded
        assert_eq!(s.values, vec![1.5, -0.5]);
    }

    #[test]
    fn empty_bucket_is_absent() {
        let mut fetched = FetchMap::new();
        fetched.insert(
            MetricRequest::new("m", 0, 10),
            vec![Series::with_absent(
                "m",
                0,
                1,
                vec![1.0; 10],
                vec![false, false, false, false, false, true, true, true, true, true],
            )],
        );
        let out = eval("slo(m,'5s','above',0)", &fetched, 0, 10);
        assert_eq!(out[0].absent, vec![false, true]);
    }

    #[test]
    fn unknown_method_is_a_typed_error() {
        let registry = Registry::new();
        registry.register_all(new());
        let ctx = EvalContext::new(&registry);
        let (expr, _) = parse("slo(m,'5s','around',10)").unwrap();
        assert!(matches!(
            ctx.eval_expr(&expr, 0, 10, &FetchMap::new()),
            Err(EngineError::ArgumentType { .. })
        ));
    }
}
