//! # Offline Review Module
//!
//! Savitzky-Golay smoothing of a finished session's SpO2 history for the
//! review chart. Each output point is the value, at that position, of a
//! least-squares polynomial of degree `order` fitted over `window` neighbours.
//! Points within half a window of either end are evaluated on the first or
//! last full window's polynomial instead of a truncated one.

pub trait SeriesExt {
    fn min_max(&self) -> Option<(f64, f64)>;
}

impl SeriesExt for &[f64] {
    fn min_max(&self) -> Option<(f64, f64)> {
        self.iter().fold(None, |acc, v| match acc {
            None => Some((*v, *v)),
            Some((min, max)) => Some((min.min(*v), max.max(*v))),
        })
    }
}

/// Smooth `values` with a Savitzky-Golay filter.
///
/// The window is forced odd and shrunk to the series length when needed.
/// Series too short to fit the polynomial are returned unchanged.
pub fn smooth(values: &[f64], window: usize, order: usize) -> Vec<f64> {
    let len = values.len();
    let mut window = window.min(len);
    if window % 2 == 0 {
        window = window.saturating_sub(1);
    }
    if window <= order || window < 3 {
        return values.to_vec();
    }

    let half = window / 2;
    let center = savgol_weights(half, order, 0.0);

    (0..len)
        .map(|i| {
            if i < half {
                let weights = savgol_weights(half, order, i as f64 - half as f64);
                dot(&weights, &values[..window])
            } else if i + half >= len {
                let start = len - window;
                let offset = (i - start) as f64 - half as f64;
                let weights = savgol_weights(half, order, offset);
                dot(&weights, &values[start..])
            } else {
                dot(&center, &values[i - half..=i + half])
            }
        })
        .collect()
}

fn dot(weights: &[f64], values: &[f64]) -> f64 {
    weights.iter().zip(values).map(|(w, v)| w * v).sum()
}

/// Weights that evaluate the fitted polynomial at `at` (relative to the
/// window centre) for sample offsets `-half..=half`.
///
/// Solves (AᵀA) z = [1, at, at², ...] with A[j][k] = jᵏ, then wⱼ = Σ zₖ jᵏ.
fn savgol_weights(half: usize, order: usize, at: f64) -> Vec<f64> {
    let n = order + 1;
    let offsets: Vec<f64> = (-(half as i64)..=half as i64).map(|j| j as f64).collect();

    let mut normal = vec![vec![0.0; n]; n];
    for (row, normal_row) in normal.iter_mut().enumerate() {
        for (col, cell) in normal_row.iter_mut().enumerate() {
            *cell = offsets.iter().map(|j| j.powi((row + col) as i32)).sum();
        }
    }
    let rhs: Vec<f64> = (0..n).map(|k| at.powi(k as i32)).collect();
    let z = solve(normal, rhs);

    offsets
        .iter()
        .map(|j| z.iter().enumerate().map(|(k, zk)| zk * j.powi(k as i32)).sum())
        .collect()
}

/// Gaussian elimination with partial pivoting on a small dense system
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Vec<f64> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))
            .unwrap_or(col);
        a.swap(col, pivot);
        b.swap(col, pivot);

        let diag = a[col][col];
        if diag.abs() < f64::EPSILON {
            continue;
        }
        for row in col + 1..n {
            let factor = a[row][col] / diag;
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        let diag = a[row][row];
        x[row] = if diag.abs() < f64::EPSILON { 0.0 } else { (b[row] - tail) / diag };
    }
    x
}
