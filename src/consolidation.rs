//! Numeric consolidation primitives shared by the function modules.
//!
//! Three pieces live here:
//! - `Reducer`, the named aggregation applied to a bucket of samples
//!   (the summarize family);
//! - `percentile`, the fractional-rank percentile used both by the
//!   `pNN` reducers and by the quartile math in the outlier filter;
//! - `Windowed`, a fixed-capacity ring buffer with incremental NaN
//!   accounting, used by the moving-window functions.
//!
//! Absent samples are represented as NaN inside these primitives; the
//! series layer's `absent` mask is translated at the call boundary.

// ============================================================================
// REDUCERS
// ============================================================================

/// A named bucket aggregation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reducer {
    Average,
    Sum,
    Min,
    Max,
    Median,
    StdDev,
    Count,
    First,
    Last,
    Range,
    Multiply,
    Diff,
    Percentile(f64),
}

impl Reducer {
    /// Resolves a reducer name as written in query text. Accepts the usual
    /// aliases ("avg", "total", "current") and `pNN` percentiles
    /// ("p50", "p99.9"). Unknown names return None so callers can raise a
    /// typed argument error.
    pub fn from_name(name: &str) -> Option<Reducer> {
        match name {
            "average" | "avg" | "mean" => Some(Reducer::Average),
            "sum" | "total" => Some(Reducer::Sum),
            "min" => Some(Reducer::Min),
            "max" => Some(Reducer::Max),
            "median" => Some(Reducer::Median),
            "stddev" | "stdev" => Some(Reducer::StdDev),
            "count" => Some(Reducer::Count),
            "first" => Some(Reducer::First),
            "last" | "current" => Some(Reducer::Last),
            "range" | "rangeOf" => Some(Reducer::Range),
            "multiply" => Some(Reducer::Multiply),
            "diff" => Some(Reducer::Diff),
            _ => {
                let digits = name.strip_prefix('p')?;
                let n: f64 = digits.parse().ok()?;
                if (0.0..=100.0).contains(&n) {
                    Some(Reducer::Percentile(n))
                } else {
                    None
                }
            }
        }
    }

    /// Applies the reducer to the present samples of one bucket. Returns
    /// None for an empty bucket (even Count: an all-absent bucket stays
    /// absent rather than reading as zero).
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let sum: f64 = values.iter().sum();
        Some(match self {
            Reducer::Average => sum / values.len() as f64,
            Reducer::Sum => sum,
            Reducer::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Reducer::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Reducer::Median => {
                let mut sorted = values.to_vec();
                percentile(&mut sorted, 50.0, true)?
            }
            Reducer::StdDev => {
                let mean = sum / values.len() as f64;
                let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>()
                    / values.len() as f64;
                variance.sqrt()
            }
            Reducer::Count => values.len() as f64,
            Reducer::First => values[0],
            Reducer::Last => values[values.len() - 1],
            Reducer::Range => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                max - min
            }
            Reducer::Multiply => values.iter().product(),
            Reducer::Diff => values[0] - values[1..].iter().sum::<f64>(),
            Reducer::Percentile(n) => {
                let mut sorted = values.to_vec();
                percentile(&mut sorted, *n, false)?
            }
        })
    }
}

/// Convenience wrapper: applies the reducer named `name` to the present
/// samples of a value/absent pair. None when the name is unknown or no
/// sample is present. Callers that need to distinguish the two resolve the
/// `Reducer` themselves.
pub fn aggregate_values(name: &str, values: &[f64], absent: &[bool]) -> Option<f64> {
    let reducer = Reducer::from_name(name)?;
    let present: Vec<f64> = values
        .iter()
        .zip(absent)
        .filter(|(_, absent)| !**absent)
        .map(|(v, _)| *v)
        .collect();
    reducer.apply(&present)
}

// ============================================================================
// PERCENTILE
// ============================================================================

/// Fractional-rank percentile over an unsorted sample buffer (the buffer is
/// sorted in place). Rank is `(percent/100) * (n+1)`; without interpolation
/// the rank rounds up, with interpolation the value is taken linearly
/// between the two neighboring order statistics. Returns None for an empty
/// buffer.
pub fn percentile(values: &mut [f64], percent: f64, interpolate: bool) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);

    let fractional_rank = (percent / 100.0) * (values.len() as f64 + 1.0);
    let mut rank = fractional_rank.floor() as i64;
    let rank_fraction = fractional_rank - rank as f64;
    if !interpolate {
        rank += rank_fraction.ceil() as i64;
    }

    let mut value = if rank <= 0 {
        values[0]
    } else if rank as usize >= values.len() + 1 {
        values[values.len() - 1]
    } else {
        values[rank as usize - 1]
    };

    if interpolate && rank > 0 && (rank as usize) < values.len() {
        let next = values[rank as usize];
        value += rank_fraction * (next - value);
    }
    Some(value)
}

// ============================================================================
// WINDOWED RING BUFFER
// ============================================================================

/// Fixed-capacity ring buffer over the most recent samples, with absent
/// samples stored as NaN and counted incrementally. The buffer is allocated
/// once per series, never per step.
#[derive(Debug, Clone)]
pub struct Windowed {
    data: Vec<f64>,
    head: usize,
    length: usize,
    nans: usize,
}

impl Windowed {
    /// `capacity` must be at least 1; callers validate window sizes before
    /// constructing.
    pub fn new(capacity: usize) -> Windowed {
        debug_assert!(capacity > 0);
        Windowed {
            data: vec![f64::NAN; capacity],
            head: 0,
            length: 0,
            nans: 0,
        }
    }

    /// Pushes one sample, evicting the oldest once full. NaN marks an
    /// absent slot.
    pub fn push(&mut self, value: f64) {
        if self.length == self.data.len() {
            if self.data[self.head].is_nan() {
                self.nans -= 1;
            }
        } else {
            self.length += 1;
        }
        if value.is_nan() {
            self.nans += 1;
        }
        self.data[self.head] = value;
        self.head = (self.head + 1) % self.data.len();
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Samples currently held, absent ones included.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_full(&self) -> bool {
        self.length == self.data.len()
    }

    /// Present (non-NaN) samples currently held.
    pub fn count(&self) -> usize {
        self.length - self.nans
    }

    fn present(&self) -> impl Iterator<Item = f64> + '_ {
        self.data[..self.length]
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
    }

    pub fn sum(&self) -> f64 {
        if self.count() == 0 {
            return f64::NAN;
        }
        self.present().sum()
    }

    pub fn mean(&self) -> f64 {
        let n = self.count();
        if n == 0 {
            return f64::NAN;
        }
        self.present().sum::<f64>() / n as f64
    }

    pub fn min(&self) -> f64 {
        if self.count() == 0 {
            return f64::NAN;
        }
        self.present().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        if self.count() == 0 {
            return f64::NAN;
        }
        self.present().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn stdev(&self) -> f64 {
        let n = self.count();
        if n == 0 {
            return f64::NAN;
        }
        let mean = self.mean();
        let variance =
            self.present().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
        variance.sqrt()
    }

    pub fn median(&self) -> f64 {
        let mut present: Vec<f64> = self.present().collect();
        percentile(&mut present, 50.0, true).unwrap_or(f64::NAN)
    }
}
