use nalgebra::{DMatrix, SymmetricEigen};
use std::sync::OnceLock;

/// Largest Gauss-Legendre rule available through [glq_rule]
pub const MAX_GLQ_POINTS: usize = 64;

static GLQ_TABLE: OnceLock<Vec<(Vec<f64>, Vec<f64>)>> = OnceLock::new();

/// 1D Gauss Legendre Quadrature integral of some function F sampled at the quadrature points
/// ```
/// use fem_1d::fem_problem::integration::glq::*;
///
/// let (points, weights) = gauss_quadrature_points(10);
///
/// // compute the integral of x^4 over (-1, 1)
/// let solution = real_gauss_quad(&weights, |m| points[m].powi(4));
///
/// assert!((solution - 2.0 / 5.0).abs() < 1e-12);
/// ```
pub fn real_gauss_quad<F>(weights: &[f64], integrand: F) -> f64
where
    F: Fn(usize) -> f64,
{
    weights
        .iter()
        .enumerate()
        .map(|(m, w)| integrand(m) * w)
        .sum()
}

/// Get a set of n Gauss-Legendre-Quadrature Integration points and weights over `(-1, 1)`
///
/// A rule with `n` points integrates polynomials of degree `2n - 1` exactly.
///
/// ```
/// use fem_1d::fem_problem::integration::glq::*;
///
/// let (points, weights) = gauss_quadrature_points(10);
/// assert_eq!(points.len(), 10);
/// assert_eq!(weights.len(), 10);
/// assert!(points.iter().sum::<f64>().abs() < 1e-12);
/// assert!((weights.iter().sum::<f64>() - 2.0).abs() < 1e-12);
/// ```
// https://en.wikipedia.org/wiki/Gaussian_quadrature#Gauss%E2%80%93Legendre_quadrature
pub fn gauss_quadrature_points(n: usize) -> (Vec<f64>, Vec<f64>) {
    assert!(n > 0, "Cannot build a Gauss-Legendre rule with zero points!");

    let betas: Vec<f64> = (1..n)
        .map(|i| 0.5 / (1.0 - (2.0 * i as f64).powi(-2)).sqrt())
        .collect();

    let polymat: DMatrix<f64> = DMatrix::from_fn(n, n, |r, c| {
        if r == c + 1 {
            betas[r - 1]
        } else if c == r + 1 {
            betas[c - 1]
        } else {
            0.0
        }
    });

    let eigen_decomp = SymmetricEigen::new(polymat);

    let mut xw: Vec<(f64, f64)> = eigen_decomp
        .eigenvalues
        .iter()
        .cloned()
        .zip(
            eigen_decomp
                .eigenvectors
                .row(0)
                .iter()
                .map(|weight| (*weight).powi(2) * 2.0),
        )
        .collect();

    xw.sort_by(|a, b| a.0.total_cmp(&b.0));

    xw.drain(0..).unzip()
}

/// A cached Gauss-Legendre rule with `n` points (`1 <= n <= MAX_GLQ_POINTS`)
pub fn glq_rule(n: usize) -> (&'static [f64], &'static [f64]) {
    assert!(
        (1..=MAX_GLQ_POINTS).contains(&n),
        "GLQ rules are only available with 1 to {} points; requested {}!",
        MAX_GLQ_POINTS,
        n
    );

    let table = GLQ_TABLE.get_or_init(|| {
        (0..=MAX_GLQ_POINTS)
            .map(|n| {
                if n == 0 {
                    (Vec::new(), Vec::new())
                } else {
                    gauss_quadrature_points(n)
                }
            })
            .collect()
    });

    (&table[n].0, &table[n].1)
}

/// Number of points needed to integrate a polynomial of degree `degree` exactly (capped at [MAX_GLQ_POINTS])
pub fn points_for_degree(degree: usize) -> usize {
    (degree / 2 + 1).min(MAX_GLQ_POINTS)
}

/// Scale a set of Gauss-Legendre-Quadrature Integration points to fall within a specific range
///
/// ```
/// use fem_1d::fem_problem::integration::glq::*;
/// let (points, _) = gauss_quadrature_points(2);
///
/// // scale the points to the range `(-0.75, 0.25)`
/// let (scale, points_scaled) = scale_gauss_quad_points(&points, -0.75, 0.25);
///
/// assert!((points_scaled[0] + points_scaled[1] + 0.5).abs() < 1e-12);
/// assert!((0.5 - scale).abs() < 1e-12);
/// ```
pub fn scale_gauss_quad_points(points: &[f64], min: f64, max: f64) -> (f64, Vec<f64>) {
    let scale_factor = (max - min) / 2.0;
    let offset = (max + min) / 2.0;

    (
        scale_factor,
        points
            .iter()
            .map(|x| x * scale_factor + offset)
            .collect::<Vec<f64>>(),
    )
}
