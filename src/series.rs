//! Time-series values flowing through the evaluator.

use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::ast::MetricRequest;

/// Map from metric request to the series fetched for it. Populated by the
/// caller (from whatever storage backend) before evaluation; the evaluator
/// only reads it.
pub type FetchMap = HashMap<MetricRequest, Vec<Series>>;

/// One fetched or derived time series.
///
/// Samples are a dense grid: `values[i]` holds the sample at
/// `start + i * step`, and `absent[i]` marks grid slots with no data. The
/// two vectors are always the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Display name, rewritten by functions ("movingAverage(m,4)").
    pub name: String,
    /// Timestamp of the first sample, seconds.
    pub start: i64,
    /// Timestamp one step past the last sample, seconds.
    pub stop: i64,
    /// Seconds between samples; always positive.
    pub step: i64,
    pub values: Vec<f64>,
    pub absent: Vec<bool>,
    /// Storage tags ("name" -> metric, plus any tagged-series tags).
    pub tags: BTreeMap<String, String>,
    /// The expression text this series was fetched or computed for.
    pub path_expression: String,
    /// Minimum fraction of present points a consolidation window needs
    /// before it may emit a value. 0 disables the check.
    pub x_files_factor: f64,
}

impl Series {
    /// A fetched series over a dense grid, all slots present.
    pub fn new(name: impl Into<String>, start: i64, step: i64, values: Vec<f64>) -> Series {
        let name = name.into();
        let absent = vec![false; values.len()];
        let stop = start + step * values.len() as i64;
        let mut tags = BTreeMap::new();
        tags.insert("name".to_string(), name.clone());
        Series {
            path_expression: name.clone(),
            name,
            start,
            stop,
            step,
            values,
            absent,
            tags,
            x_files_factor: 0.0,
        }
    }

    /// As `new`, but with explicit absent slots.
    pub fn with_absent(
        name: impl Into<String>,
        start: i64,
        step: i64,
        values: Vec<f64>,
        absent: Vec<bool>,
    ) -> Series {
        debug_assert_eq!(values.len(), absent.len());
        let mut series = Series::new(name, start, step, values);
        series.absent = absent;
        series
    }

    /// Copy-at-mutation-boundary constructor: every function that produces
    /// a modified series goes through here so the input series is never
    /// mutated in place. Carries tags and x_files_factor over from the
    /// input; the caller sets the rest.
    pub fn derived(
        &self,
        name: impl Into<String>,
        start: i64,
        stop: i64,
        step: i64,
        values: Vec<f64>,
        absent: Vec<bool>,
    ) -> Series {
        debug_assert_eq!(values.len(), absent.len());
        let name = name.into();
        let mut tags = self.tags.clone();
        tags.insert("name".to_string(), name.clone());
        Series {
            name,
            start,
            stop,
            step,
            values,
            absent,
            tags,
            path_expression: self.path_expression.clone(),
            x_files_factor: self.x_files_factor,
        }
    }

    /// Same grid as the input, new name and samples.
    pub fn derived_values(
        &self,
        name: impl Into<String>,
        values: Vec<f64>,
        absent: Vec<bool>,
    ) -> Series {
        self.derived(name, self.start, self.stop, self.step, values, absent)
    }

    /// Number of grid slots.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The sample at slot `i`, or None when absent or out of range.
    pub fn value_at(&self, i: usize) -> Option<f64> {
        if i < self.len() && !self.absent[i] {
            Some(self.values[i])
        } else {
            None
        }
    }

    /// Iterator over present samples only.
    pub fn present_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values
            .iter()
            .zip(&self.absent)
            .filter(|(_, absent)| !**absent)
            .map(|(v, _)| *v)
    }
}
