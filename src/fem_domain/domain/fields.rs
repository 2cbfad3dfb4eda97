use super::Space;
use crate::fem_domain::basis::{eval_expansion, LobattoShapeFn, ShapeFn};
use crate::fem_problem::integration::glq::{glq_rule, points_for_degree, scale_gauss_quad_points};

use smallvec::{smallvec, SmallVec};

/// Overlaps shorter than this fraction of the target interval are ignored
const OVERLAP_TOLERANCE: f64 = 1e-12;

/// A polynomial over an interval, described by Lobatto coefficients
#[derive(Debug, Clone, Copy)]
pub struct PolyPiece<'a> {
    pub x: [f64; 2],
    pub coeffs: &'a [f64],
}

impl<'a> PolyPiece<'a> {
    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    /// Value and `x`-derivative at a real coordinate
    pub fn eval(&self, x: f64) -> (f64, f64) {
        let jac = (self.x[1] - self.x[0]) / 2.0;
        let xi = (2.0 * x - self.x[0] - self.x[1]) / (self.x[1] - self.x[0]);
        let (u, du_dxi) = eval_expansion(self.coeffs, xi);
        (u, du_dxi / jac)
    }

    /// The sub-interval shared with `[a, b]` (if it has positive length)
    pub fn overlap(&self, [a, b]: [f64; 2]) -> Option<[f64; 2]> {
        let lo = a.max(self.x[0]);
        let hi = b.min(self.x[1]);
        if hi - lo > OVERLAP_TOLERANCE * (b - a) {
            Some([lo, hi])
        } else {
            None
        }
    }
}

/// Projection-based interpolation of a piecewise polynomial onto a single polynomial of degree `p` over `[a, b]`
///
/// The vertex coefficients interpolate the end-point values; the bubble coefficients are the H1-seminorm projection of the remainder.
/// The result is exact whenever the piecewise function is a single polynomial of degree `p` or less over `[a, b]`.
///
/// `pieces` must cover `[a, b]`; pieces (or parts of pieces) outside of the interval are ignored.
///
/// ```
/// use fem_1d::fem_domain::domain::fields::{project_pieces, PolyPiece};
///
/// // a quadratic bubble over (0, 2) ...
/// let coeffs = [1.0, 2.0, 0.5];
/// let parent = PolyPiece { x: [0.0, 2.0], coeffs: &coeffs };
///
/// // ... restricted to (0, 1)
/// let child_coeffs = project_pieces(&[parent], [0.0, 1.0], 2);
/// let child = PolyPiece { x: [0.0, 1.0], coeffs: &child_coeffs };
///
/// for x in [0.0, 0.25, 0.6, 1.0] {
///     assert!((parent.eval(x).0 - child.eval(x).0).abs() < 1e-13);
/// }
/// ```
pub fn project_pieces(pieces: &[PolyPiece], [a, b]: [f64; 2], p: u8) -> SmallVec<[f64; 8]> {
    let p = p as usize;
    let mut coeffs: SmallVec<[f64; 8]> = smallvec![0.0; p + 1];

    let overlapping: Vec<(&PolyPiece, [f64; 2])> = pieces
        .iter()
        .filter_map(|piece| piece.overlap([a, b]).map(|range| (piece, range)))
        .collect();

    let (first, last) = match (overlapping.first(), overlapping.last()) {
        (Some(first), Some(last)) => (first.0, last.0),
        _ => return coeffs,
    };

    let u_a = first.eval(a).0;
    let u_b = last.eval(b).0;
    coeffs[0] = u_a;
    coeffs[1] = u_b;

    if p < 2 {
        return coeffs;
    }

    let jac = (b - a) / 2.0;
    let linear_slope = (u_b - u_a) / 2.0;

    for (piece, [lo, hi]) in overlapping {
        let (points, weights) = glq_rule(points_for_degree(piece.degree() + p));
        let (scale, x_pts) = scale_gauss_quad_points(points, lo, hi);
        let xi_pts: Vec<f64> = x_pts.iter().map(|x| (2.0 * x - a - b) / (b - a)).collect();
        let shape_fns = LobattoShapeFn::with(p, &xi_pts);

        for (q, (x, w)) in x_pts.iter().zip(weights.iter()).enumerate() {
            // d/dxi of the remainder (the function minus its vertex interpolant)
            let remainder_d = piece.eval(*x).1 * jac - linear_slope;
            let w_xi = w * scale / jac;
            for (k, c) in coeffs.iter_mut().enumerate().skip(2) {
                *c += remainder_d * shape_fns.d1(k, q) * w_xi;
            }
        }
    }

    coeffs
}

/// The solution of one equation sampled at uniformly spaced points over every active Elem
#[derive(Debug, Clone)]
pub struct SolutionSamples {
    pub x: Vec<f64>,
    pub u: Vec<f64>,
    pub dudx: Vec<f64>,
}

impl SolutionSamples {
    /// Sample equation `eq` of `space` using `density` points per Elem (end-points included)
    pub fn new(space: &Space, eq: usize, density: usize) -> Self {
        let density = density.max(2);
        let mut samples = Self {
            x: Vec::new(),
            u: Vec::new(),
            dudx: Vec::new(),
        };

        for elem in space.mesh.active_elems() {
            for i in 0..density {
                let xi = -1.0 + 2.0 * i as f64 / (density - 1) as f64;
                let (u, dudx) = elem.eval_parametric(eq, xi);
                samples.x.push(elem.to_real(xi));
                samples.u.push(u);
                samples.dudx.push(dudx);
            }
        }

        samples
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}
