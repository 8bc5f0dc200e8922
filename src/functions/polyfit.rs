//! Least-squares polynomial regression: `polyfit`.
//!
//! `polyfit(seriesList, degree=1, offset="0d")` fits a degree-`d`
//! polynomial to each series' present samples (sample index as x) by
//! solving the normal equations of the Vandermonde system with Gaussian
//! elimination, then emits the fitted curve over the original window plus
//! `offset` seconds of extrapolation. Series with fewer present samples
//! than coefficients, or a singular system, are skipped.

use std::sync::Arc;

use crate::ast::Expr;
use crate::engine::eval::EvalContext;
use crate::engine::registry::{ParamKind, ParamMeta, Registration, SeriesFunction};
use crate::errors::EngineError;
use crate::series::{FetchMap, Series};

const PIVOT_EPSILON: f64 = 1e-12;

// Solves the (degree+1)-coefficient least-squares system for samples
// (x, y). The normal-equation matrix A[j][k] = Σ x^(j+k) with right-hand
// side b[j] = Σ x^j·y. None when the pivoting degenerates.
fn fit(samples: &[(f64, f64)], degree: usize) -> Option<Vec<f64>> {
    let m = degree + 1;
    if samples.len() < m {
        return None;
    }

    // augmented matrix [A | b]
    let mut matrix = vec![vec![0.0f64; m + 1]; m];
    for &(x, y) in samples {
        let mut x_pow = vec![1.0; 2 * degree + 1];
        for p in 1..x_pow.len() {
            x_pow[p] = x_pow[p - 1] * x;
        }
        for j in 0..m {
            for k in 0..m {
                matrix[j][k] += x_pow[j + k];
            }
            matrix[j][m] += x_pow[j] * y;
        }
    }

    // Gaussian elimination with partial pivoting.
    for col in 0..m {
        let pivot_row = (col..m)
            .max_by(|&a, &b| matrix[a][col].abs().total_cmp(&matrix[b][col].abs()))?;
        if matrix[pivot_row][col].abs() < PIVOT_EPSILON {
            return None;
        }
        matrix.swap(col, pivot_row);
        for row in col + 1..m {
            let factor = matrix[row][col] / matrix[col][col];
            for k in col..=m {
                matrix[row][k] -= factor * matrix[col][k];
            }
        }
    }

    // back-substitution
    let mut coefficients = vec![0.0; m];
    for row in (0..m).rev() {
        let mut acc = matrix[row][m];
        for k in row + 1..m {
            acc -= matrix[row][k] * coefficients[k];
        }
        coefficients[row] = acc / matrix[row][row];
    }
    Some(coefficients)
}

fn evaluate_poly(coefficients: &[f64], x: f64) -> f64 {
    coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, c| acc * x + c)
}

struct Polyfit;

impl SeriesFunction for Polyfit {
    fn eval(
        &self,
        ctx: &EvalContext<'_>,
        expr: &Expr,
        from: i64,
        until: i64,
        fetched: &FetchMap,
    ) -> Result<Vec<Series>, EngineError> {
        let degree = expr.int_named_or_pos("degree", 1, 1)?;
        if degree < 1 {
            return Err(EngineError::Eval(format!(
                "polyfit: degree must be at least 1, got {degree}"
            )));
        }
        let offset_text = expr.string_named_or_pos("offset", 2, "0d")?.to_string();
        let offset = crate::syntax::parse_interval(&offset_text, 1)?.max(0);

        let inputs = ctx.eval_series_arg(expr, 0, from, until, fetched)?;
        let mut out = Vec::with_capacity(inputs.len());
        for series in &inputs {
            if series.is_empty() {
                continue;
            }
            let samples: Vec<(f64, f64)> = (0..series.len())
                .filter_map(|i| series.value_at(i).map(|v| (i as f64, v)))
                .collect();
            let coefficients = match fit(&samples, degree as usize) {
                Some(c) => c,
                None => continue,
            };

            let extra = (offset / series.step.max(1)) as usize;
            let n = series.len() + extra;
            let values: Vec<f64> = (0..n).map(|i| evaluate_poly(&coefficients, i as f64)).collect();
            let absent = vec![false; n];

            let name = if expr.arg(2).is_some() || expr.named_arg("offset").is_some() {
                format!("polyfit({},{},'{}')", series.name, degree, offset_text)
            } else {
                format!("polyfit({},{})", series.name, degree)
            };
            out.push(series.derived(
                name,
                series.start,
                series.start + n as i64 * series.step,
                series.step,
                values,
                absent,
            ));
        }
        Ok(out)
    }
}

pub fn new() -> Vec<Registration> {
    vec![Registration::series(
        "polyfit",
        Arc::new(Polyfit),
        vec![
            ParamMeta::required("seriesList", ParamKind::Series),
            ParamMeta::optional("degree", ParamKind::Integer),
            ParamMeta::optional("offset", ParamKind::Interval),
        ],
    )]
}
