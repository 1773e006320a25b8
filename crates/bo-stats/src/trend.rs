//! How convergence depends on the amount of secondary-source initial data.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::table::{ConvergenceTable, Quantity};

/// Least-squares line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    /// Fit to `(x, y)` points; `None` with fewer than two distinct x values.
    pub fn fit(points: &[(f64, f64)]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        let n = points.len() as f64;
        let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
        let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

        let sxx: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
        if sxx == 0.0 {
            return None;
        }
        let sxy: f64 = points.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();

        let slope = sxy / sxx;
        Some(Self {
            slope,
            intercept: mean_y - slope * mean_x,
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMean {
    pub x: f64,
    pub mean: f64,
    pub count: usize,
}

/// Mean y per distinct x, ascending in x.
pub fn group_means(points: &[(f64, f64)]) -> Vec<GroupMean> {
    // f64 has no Ord; group on x rounded to 1e-6.
    let mut groups: BTreeMap<i64, (f64, f64, usize)> = BTreeMap::new();
    for &(x, y) in points {
        let key = (x * 1e6).round() as i64;
        let entry = groups.entry(key).or_insert((x, 0.0, 0));
        entry.1 += y;
        entry.2 += 1;
    }
    groups
        .into_values()
        .map(|(x, sum, count)| GroupMean {
            x,
            mean: sum / count as f64,
            count,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceTrend {
    pub quantity: Quantity,
    pub points: Vec<(f64, f64)>,
    pub fit: Option<LinearFit>,
    pub means: Vec<GroupMean>,
}

/// Trend of a quantity against secondary initpts. Points with missing
/// values must already be dropped.
pub fn convergence_trend(points: Vec<(f64, f64)>, quantity: Quantity) -> ConvergenceTrend {
    ConvergenceTrend {
        quantity,
        fit: LinearFit::fit(&points),
        means: group_means(&points),
        points,
    }
}

impl ConvergenceTable {
    pub fn trend(&self, quantity: Quantity) -> ConvergenceTrend {
        convergence_trend(self.points(quantity), quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_line() {
        let fit = LinearFit::fit(&[(0.0, 10.0), (10.0, 6.0), (20.0, 2.0)]).unwrap();
        assert!((fit.slope + 0.4).abs() < 1e-12);
        assert!((fit.intercept - 10.0).abs() < 1e-12);
        assert!((fit.predict(5.0) - 8.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_inputs_have_no_line() {
        assert!(LinearFit::fit(&[]).is_none());
        assert!(LinearFit::fit(&[(1.0, 2.0)]).is_none());
        assert!(LinearFit::fit(&[(5.0, 2.0), (5.0, 4.0)]).is_none());
    }

    #[test]
    fn means_per_initpts() {
        let points = vec![(10.0, 4.0), (0.0, 9.0), (10.0, 2.0), (0.0, 11.0), (20.0, 1.0)];
        let trend = convergence_trend(points, Quantity::Iterations);

        assert_eq!(
            trend.means,
            vec![
                GroupMean {
                    x: 0.0,
                    mean: 10.0,
                    count: 2,
                },
                GroupMean {
                    x: 10.0,
                    mean: 3.0,
                    count: 2,
                },
                GroupMean {
                    x: 20.0,
                    mean: 1.0,
                    count: 1,
                },
            ]
        );
        let fit = trend.fit.unwrap();
        assert!(fit.slope < 0.0);
    }
}
