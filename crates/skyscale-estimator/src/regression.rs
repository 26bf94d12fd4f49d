//! Ordinary least squares on standardized features.
//!
//! Features are centered and scaled before solving the normal equations, so
//! data sizes in the gigabytes and bitmasks below 128 end up on the same
//! footing. Columns with no variance carry no information and get a zero
//! coefficient. The intercept is the target mean.

use serde::{Deserialize, Serialize};

use crate::error::{EstimatorError, EstimatorResult};

/// Relative size below which a pivot counts as zero.
const PIVOT_TOLERANCE: f64 = 1e-9;

/// Diagonal loading used when the plain system is singular (collinear features).
const RIDGE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    intercept: f64,
    coefficients: Vec<f64>,
    means: Vec<f64>,
    scales: Vec<f64>,
    samples: usize,
}

impl LinearModel {
    /// Fit `targets ≈ intercept + Σ coefficient · standardized(feature)`.
    pub fn fit(rows: &[Vec<f64>], targets: &[f64]) -> EstimatorResult<Self> {
        if rows.is_empty() {
            return Err(EstimatorError::NoTrainingData);
        }
        if rows.len() != targets.len() {
            return Err(EstimatorError::Dimension {
                expected: rows.len(),
                got: targets.len(),
            });
        }
        let width = rows[0].len();
        if let Some(row) = rows.iter().find(|r| r.len() != width) {
            return Err(EstimatorError::Dimension {
                expected: width,
                got: row.len(),
            });
        }

        let n = rows.len() as f64;
        let means: Vec<f64> = (0..width)
            .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / n)
            .collect();
        let spreads: Vec<f64> = (0..width)
            .map(|j| {
                let var = rows.iter().map(|r| (r[j] - means[j]).powi(2)).sum::<f64>() / n;
                var.sqrt()
            })
            .collect();
        let kept: Vec<usize> = (0..width)
            .filter(|&j| spreads[j] > PIVOT_TOLERANCE * (1.0 + means[j].abs()))
            .collect();
        let y_mean = targets.iter().sum::<f64>() / n;

        let k = kept.len();
        let mut xtx = vec![vec![0.0; k]; k];
        let mut xty = vec![0.0; k];
        for (row, &y) in rows.iter().zip(targets) {
            let z: Vec<f64> = kept
                .iter()
                .map(|&j| (row[j] - means[j]) / spreads[j])
                .collect();
            for a in 0..k {
                xty[a] += z[a] * (y - y_mean);
                for b in 0..k {
                    xtx[a][b] += z[a] * z[b];
                }
            }
        }

        let tolerance = PIVOT_TOLERANCE * n;
        let solved = match solve(xtx.clone(), xty.clone(), tolerance) {
            Some(beta) => beta,
            None => {
                for (a, row) in xtx.iter_mut().enumerate() {
                    row[a] += RIDGE * n;
                }
                solve(xtx, xty, tolerance).ok_or(EstimatorError::Singular)?
            }
        };

        let mut coefficients = vec![0.0; width];
        let mut scales = vec![1.0; width];
        for (&j, beta) in kept.iter().zip(solved) {
            coefficients[j] = beta;
            scales[j] = spreads[j];
        }

        Ok(Self {
            intercept: y_mean,
            coefficients,
            means,
            scales,
            samples: rows.len(),
        })
    }

    pub fn predict(&self, features: &[f64]) -> EstimatorResult<f64> {
        if features.len() != self.coefficients.len() {
            return Err(EstimatorError::Dimension {
                expected: self.coefficients.len(),
                got: features.len(),
            });
        }
        let offset: f64 = features
            .iter()
            .enumerate()
            .map(|(j, x)| self.coefficients[j] * (x - self.means[j]) / self.scales[j])
            .sum();
        Ok(self.intercept + offset)
    }

    /// Number of training samples.
    pub fn samples(&self) -> usize {
        self.samples
    }
}

/// Gaussian elimination with partial pivoting. `None` if singular.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>, tolerance: f64) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < tolerance {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        let pivot_row = a[col].clone();
        for row in col + 1..n {
            let factor = a[row][col] / pivot_row[col];
            for (k, value) in pivot_row.iter().enumerate().skip(col) {
                a[row][k] -= factor * value;
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}
