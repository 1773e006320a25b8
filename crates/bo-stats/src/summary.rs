//! Descriptive statistics of a convergence quantity per (setup, strategy) group.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use bo_types::{Setup, Strategy};

use crate::table::{ConvergenceTable, Quantity};

/// Count, mean, sample standard deviation and quantiles of a set of values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (ddof 1); needs at least two values.
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub median: Option<f64>,
    pub max: Option<f64>,
}

impl SummaryStats {
    pub fn describe(values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self {
                count,
                mean: None,
                std: None,
                min: None,
                median: None,
                max: None,
            };
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = count as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let std = (count > 1).then(|| {
            let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1.0)).sqrt()
        });
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Self {
            count,
            mean: Some(mean),
            std,
            min: sorted.first().copied(),
            median: Some(median),
            max: sorted.last().copied(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub setup: Setup,
    pub strategy: Strategy,
    pub stats: SummaryStats,
}

/// Summarize `quantity` per (setup, strategy). Groups whose runs never
/// converged are kept with a count of zero.
pub fn summarize(table: &ConvergenceTable, quantity: Quantity) -> Vec<GroupSummary> {
    let mut groups: BTreeMap<(Setup, Strategy), Vec<f64>> = BTreeMap::new();
    for row in &table.rows {
        let values = groups.entry((row.setup(), row.strategy())).or_default();
        if let Some(value) = row.value(quantity) {
            values.push(value);
        }
    }

    groups
        .into_iter()
        .map(|((setup, strategy), values)| GroupSummary {
            setup,
            strategy,
            stats: SummaryStats::describe(&values),
        })
        .collect()
}

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| "NaN".to_string(), |v| format!("{v:.2}"))
}

/// Plain-text table of summaries, values rounded to two decimals.
pub fn render_summary(summaries: &[GroupSummary], quantity: Quantity) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", quantity.label());
    let _ = writeln!(
        out,
        "{:<10} {:<18} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "setup", "strategy", "count", "mean", "std", "min", "50%", "max"
    );
    for s in summaries {
        let _ = writeln!(
            out,
            "{:<10} {:<18} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10}",
            s.setup.to_string(),
            s.strategy.to_string(),
            s.stats.count,
            cell(s.stats.mean),
            cell(s.stats.std),
            cell(s.stats.min),
            cell(s.stats.median),
            cell(s.stats.max)
        );
    }
    out
}
