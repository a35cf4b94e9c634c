//! Numeric helpers shared by the analytics components.
//!
//! Bounded scalar minimisation (Brent's method with golden-section
//! fallback), weighted and ordinary least-squares slopes, and small
//! aggregate helpers. Everything here is pure and allocation-light so it
//! can run inside a request without blocking.

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Median of a slice, averaging the two middle values for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Upper median: the element at index `len / 2` after sorting.
pub fn upper_median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(sorted[sorted.len() / 2])
}

/// Population variance.
pub fn variance(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    Some(values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64)
}

// ---------------------------------------------------------------------------
// Regression
// ---------------------------------------------------------------------------

/// Slope of a weighted least-squares line through `(x, y)` points.
///
/// Weights need not be normalised. Returns 0.0 when fewer than two points
/// are given or when all `x` coincide.
pub fn weighted_slope(points: &[(f64, f64)], weights: &[f64]) -> f64 {
    if points.len() < 2 || points.len() != weights.len() {
        return 0.0;
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return 0.0;
    }

    let x_bar = points
        .iter()
        .zip(weights)
        .map(|((x, _), w)| x * w)
        .sum::<f64>()
        / total;
    let y_bar = points
        .iter()
        .zip(weights)
        .map(|((_, y), w)| y * w)
        .sum::<f64>()
        / total;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for ((x, y), w) in points.iter().zip(weights) {
        sxy += w * (x - x_bar) * (y - y_bar);
        sxx += w * (x - x_bar).powi(2);
    }

    if sxx.abs() < f64::EPSILON {
        0.0
    } else {
        sxy / sxx
    }
}

/// Recency-weighted trend: each point is weighted by
/// `exp(-decay * (max_x - x))` so the newest observations dominate.
pub fn decayed_slope(points: &[(f64, f64)], decay: f64) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let max_x = points
        .iter()
        .map(|(x, _)| *x)
        .fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = points
        .iter()
        .map(|(x, _)| (-decay * (max_x - x)).exp())
        .collect();
    weighted_slope(points, &weights)
}

/// Fit an ordinary least-squares line to `values` indexed `0..n` and
/// extrapolate it to index `n`.
pub fn extrapolate_next(values: &[f64]) -> Option<f64> {
    match values.len() {
        0 => None,
        1 => Some(values[0]),
        n => {
            let points: Vec<(f64, f64)> = values
                .iter()
                .enumerate()
                .map(|(i, v)| (i as f64, *v))
                .collect();
            let weights = vec![1.0; n];
            let slope = weighted_slope(&points, &weights);
            let x_bar = (n as f64 - 1.0) / 2.0;
            let y_bar = mean(values)?;
            Some(y_bar + slope * (n as f64 - x_bar))
        }
    }
}

// ---------------------------------------------------------------------------
// Bounded minimisation
// ---------------------------------------------------------------------------

/// Result of a bounded scalar minimisation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Minimum {
    pub x: f64,
    pub fx: f64,
    pub evaluations: usize,
    pub converged: bool,
}

/// Minimise `f` over `[lower, upper]` with Brent's method.
///
/// Parabolic interpolation steps are taken when they stay inside the
/// bracket and shrink fast enough; otherwise a golden-section step is used.
/// Stops when the bracket is within `xatol` of the current best point or
/// after `max_iter` evaluations.
pub fn minimize_bounded<F>(mut f: F, lower: f64, upper: f64, xatol: f64, max_iter: usize) -> Minimum
where
    F: FnMut(f64) -> f64,
{
    let sqrt_eps = f64::EPSILON.sqrt();
    let golden_mean = 0.5 * (3.0 - 5f64.sqrt());

    let (mut a, mut b) = if lower <= upper {
        (lower, upper)
    } else {
        (upper, lower)
    };

    let mut fulc = a + golden_mean * (b - a);
    let mut nfc = fulc;
    let mut xf = fulc;
    let mut rat = 0.0f64;
    let mut e = 0.0f64;

    let mut fx = f(xf);
    let mut evaluations = 1;
    let mut ffulc = fx;
    let mut fnfc = fx;

    let mut xm = 0.5 * (a + b);
    let mut tol1 = sqrt_eps * xf.abs() + xatol / 3.0;
    let mut tol2 = 2.0 * tol1;
    let mut converged = true;

    while (xf - xm).abs() > tol2 - 0.5 * (b - a) {
        let mut golden = true;

        if e.abs() > tol1 {
            golden = false;
            let mut r = (xf - nfc) * (fx - ffulc);
            let mut q = (xf - fulc) * (fx - fnfc);
            let mut p = (xf - fulc) * q - (xf - nfc) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            r = e;
            e = rat;

            if p.abs() < (0.5 * q * r).abs() && p > q * (a - xf) && p < q * (b - xf) {
                rat = p / q;
                let x = xf + rat;
                if (x - a) < tol2 || (b - x) < tol2 {
                    rat = tol1 * step_sign(xm - xf);
                }
            } else {
                golden = true;
            }
        }

        if golden {
            e = if xf >= xm { a - xf } else { b - xf };
            rat = golden_mean * e;
        }

        let x = xf + step_sign(rat) * rat.abs().max(tol1);
        let fu = f(x);
        evaluations += 1;

        if fu <= fx {
            if x >= xf {
                a = xf;
            } else {
                b = xf;
            }
            fulc = nfc;
            ffulc = fnfc;
            nfc = xf;
            fnfc = fx;
            xf = x;
            fx = fu;
        } else {
            if x < xf {
                a = x;
            } else {
                b = x;
            }
            if fu <= fnfc || nfc == xf {
                fulc = nfc;
                ffulc = fnfc;
                nfc = x;
                fnfc = fu;
            } else if fu <= ffulc || fulc == xf || fulc == nfc {
                fulc = x;
                ffulc = fu;
            }
        }

        xm = 0.5 * (a + b);
        tol1 = sqrt_eps * xf.abs() + xatol / 3.0;
        tol2 = 2.0 * tol1;

        if evaluations >= max_iter {
            converged = false;
            break;
        }
    }

    Minimum {
        x: xf,
        fx,
        evaluations,
        converged,
    }
}

/// Sign of a step; zero counts as positive.
fn step_sign(v: f64) -> f64 {
    if v < 0.0 {
        -1.0
    } else {
        1.0
    }
}
