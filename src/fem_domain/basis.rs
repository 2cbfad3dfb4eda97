/// Lobatto (integrated Legendre) Shape Functions
pub mod shape_fns;

pub use shape_fns::{LegendrePoly, LobattoShapeFn};

/// A trait to describe a set of hierarchic 1D Shape Functions sampled over a fixed set of points in `[-1, 1]`
///
/// Index `0` and `1` are the vertex functions (left and right respectively), indices `2..` are bubble functions which vanish at both end-points.
pub trait ShapeFn: Clone + Send + Sync {
    /// Sample all Shape Functions up to degree `n_max` over a set of points
    fn with(n_max: usize, points: &[f64]) -> Self;

    /// Value of the `n`th Shape Function at the `p`th point
    fn value(&self, n: usize, p: usize) -> f64;

    /// Derivative (with respect to the parametric coordinate) of the `n`th Shape Function at the `p`th point
    fn d1(&self, n: usize, p: usize) -> f64;

    /// The maximum degree which was sampled
    fn max_n(&self) -> usize;

    /// Number of sample points
    fn num_points(&self) -> usize;
}

/// Evaluate a hierarchic Lobatto expansion `sum_k c_k l_k(xi)` and its parametric derivative at a single point
///
/// ```
/// use fem_1d::fem_domain::basis::eval_expansion;
///
/// // 1 - x^2 in terms of the vertex and first bubble function
/// let coeffs = [0.0, 0.0, -(8.0_f64 / 3.0).sqrt()];
/// let (u, du) = eval_expansion(&coeffs, 0.5);
/// assert!((u - 0.75).abs() < 1e-14);
/// assert!((du + 1.0).abs() < 1e-14);
/// ```
pub fn eval_expansion(coeffs: &[f64], xi: f64) -> (f64, f64) {
    let mut val = 0.0;
    let mut der = 0.0;

    if let Some(c0) = coeffs.first() {
        val += c0 * (1.0 - xi) / 2.0;
        der -= c0 / 2.0;
    }
    if let Some(c1) = coeffs.get(1) {
        val += c1 * (1.0 + xi) / 2.0;
        der += c1 / 2.0;
    }

    let mut p_km2 = 1.0;
    let mut p_km1 = xi;
    for (k, c) in coeffs.iter().enumerate().skip(2) {
        let k_f = k as f64;
        let p_k = ((2.0 * k_f - 1.0) * xi * p_km1 - (k_f - 1.0) * p_km2) / k_f;

        val += c * (p_k - p_km2) / (2.0 * (2.0 * k_f - 1.0)).sqrt();
        der += c * ((2.0 * k_f - 1.0) / 2.0).sqrt() * p_km1;

        p_km2 = p_km1;
        p_km1 = p_k;
    }

    (val, der)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fem_problem::integration::glq::gauss_quadrature_points;

    #[test]
    fn expansion_matches_sampled_shape_fns() {
        let points = [-1.0, -0.3, 0.0, 0.42, 1.0];
        let sampler = LobattoShapeFn::with(6, &points);
        let coeffs = [0.3, -1.2, 0.5, 0.25, -0.125, 2.0, 0.0625];

        for (p, xi) in points.iter().enumerate() {
            let (u, du) = eval_expansion(&coeffs, *xi);
            let u_s: f64 = (0..=6).map(|n| coeffs[n] * sampler.value(n, p)).sum();
            let du_s: f64 = (0..=6).map(|n| coeffs[n] * sampler.d1(n, p)).sum();

            assert!((u - u_s).abs() < 1e-13);
            assert!((du - du_s).abs() < 1e-13);
        }
    }

    #[test]
    fn bubble_derivatives_are_orthonormal() {
        let (points, weights) = gauss_quadrature_points(12);
        let sampler = LobattoShapeFn::with(8, &points);

        for m in 2..=8 {
            for n in 2..=8 {
                let inner: f64 = weights
                    .iter()
                    .enumerate()
                    .map(|(p, w)| sampler.d1(m, p) * sampler.d1(n, p) * w)
                    .sum();
                let expected = if m == n { 1.0 } else { 0.0 };
                assert!((inner - expected).abs() < 1e-12);
            }
        }
    }
}
