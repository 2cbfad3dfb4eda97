use super::integration::glq::{glq_rule, points_for_degree, scale_gauss_quad_points, MAX_GLQ_POINTS};
use crate::error::ConfigurationError;
use crate::fem_domain::domain::{fields::PolyPiece, Space};
use rayon::prelude::*;
use std::fmt;

/// Norm used to measure errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NormKind {
    /// `int (u - w)^2`
    L2,
    /// `int (u - w)^2 + (u' - w')^2`
    H1,
}

impl Default for NormKind {
    fn default() -> Self {
        Self::H1
    }
}

impl fmt::Display for NormKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::L2 => write!(f, "L2"),
            Self::H1 => write!(f, "H1"),
        }
    }
}

impl std::str::FromStr for NormKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l2" => Ok(Self::L2),
            "h1" => Ok(Self::H1),
            _ => Err(ConfigurationError::InvalidSetting("norm", s.to_string())),
        }
    }
}

impl NormKind {
    fn pointwise(&self, (u, du): (f64, f64)) -> f64 {
        match self {
            Self::L2 => u * u,
            Self::H1 => u * u + du * du,
        }
    }
}

/// Error contribution of one active coarse Elem
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElemError {
    pub elem_id: usize,
    /// Absolute error over the Elem (summed over all equations)
    pub error: f64,
    /// Norm of the reference (or exact) solution over the Elem
    pub ref_norm: f64,
}

/// Per-Elem errors (ordered like the active Elems, from left to right) and the global relative error
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorEstimate {
    pub norm: NormKind,
    pub elems: Vec<ElemError>,
    /// `sqrt(sum error^2)`
    pub abs_error: f64,
    /// `sqrt(sum ref_norm^2)`
    pub ref_norm: f64,
}

impl ErrorEstimate {
    fn from_elems(norm: NormKind, elems: Vec<ElemError>) -> Self {
        let abs_error = elems.iter().map(|e| e.error.powi(2)).sum::<f64>().sqrt();
        let ref_norm = elems.iter().map(|e| e.ref_norm.powi(2)).sum::<f64>().sqrt();
        Self {
            norm,
            elems,
            abs_error,
            ref_norm,
        }
    }

    /// Global relative error as a fraction
    ///
    /// Falls back to the absolute error when the reference solution vanishes
    pub fn rel_error(&self) -> f64 {
        if self.ref_norm > 0.0 {
            self.abs_error / self.ref_norm
        } else {
            self.abs_error
        }
    }

    /// Largest error among the Elems (zero if there are none)
    pub fn max_error(&self) -> f64 {
        self.elems.iter().map(|e| e.error).fold(0.0, f64::max)
    }

    pub fn error_of(&self, elem_id: usize) -> Option<f64> {
        self.elems
            .iter()
            .find(|e| e.elem_id == elem_id)
            .map(|e| e.error)
    }
}

/// Squared norms `(|w - u|^2, |u|^2)` of a single polynomial `w` against a piecewise polynomial `u`, over the span of `w`
pub(crate) fn sq_diff_over(norm: NormKind, candidate: &PolyPiece, reference: &[PolyPiece]) -> (f64, f64) {
    let mut err_sq = 0.0;
    let mut norm_sq = 0.0;

    for piece in reference {
        if let Some([lo, hi]) = piece.overlap(candidate.x) {
            let degree = 2 * candidate.degree().max(piece.degree());
            let (points, weights) = glq_rule(points_for_degree(degree));
            let (scale, x_pts) = scale_gauss_quad_points(points, lo, hi);

            for (x, w) in x_pts.iter().zip(weights.iter()) {
                let (u_c, du_c) = candidate.eval(*x);
                let (u_r, du_r) = piece.eval(*x);
                err_sq += norm.pointwise((u_c - u_r, du_c - du_r)) * w * scale;
                norm_sq += norm.pointwise((u_r, du_r)) * w * scale;
            }
        }
    }

    (err_sq, norm_sq)
}

/// Estimate the error of the `coarse` solution by comparing it against the `reference` solution
///
/// Each active coarse Elem receives the norm of `u_coarse - u_ref` over its interval (summed over all equations).
/// The relative error is `sqrt(sum err^2) / sqrt(sum |u_ref|^2)`, returned as a fraction through [ErrorEstimate::rel_error].
pub fn calc_err_est(
    norm: NormKind,
    coarse: &Space,
    reference: &Space,
) -> Result<ErrorEstimate, ConfigurationError> {
    if coarse.domain() != reference.domain()
        || coarse.num_equations() != reference.num_equations()
    {
        return Err(ConfigurationError::MismatchedSpaces);
    }

    let elems: Vec<ElemError> = coarse
        .mesh
        .active_elem_ids()
        .par_iter()
        .map(|elem_id| {
            let elem = &coarse.mesh.elems[*elem_id];
            let (err_sq, norm_sq) = (0..coarse.num_equations())
                .map(|eq| sq_diff_over(norm, &elem.piece(eq), &reference.pieces_over(eq, elem.x)))
                .fold((0.0, 0.0), |acc, (e, n)| (acc.0 + e, acc.1 + n));

            ElemError {
                elem_id: *elem_id,
                error: err_sq.sqrt(),
                ref_norm: norm_sq.sqrt(),
            }
        })
        .collect();

    Ok(ErrorEstimate::from_elems(norm, elems))
}

/// Compute the true error of the solution in `space` against an exact solution
///
/// `exact(x, eq)` returns the value and derivative of equation `eq`'s exact solution at `x`.
/// This is a diagnostic only; the adaptivity engine never consumes it.
pub fn calc_err_exact<F>(norm: NormKind, space: &Space, exact: &F) -> ErrorEstimate
where
    F: Fn(f64, usize) -> (f64, f64) + Sync + ?Sized,
{
    let elems: Vec<ElemError> = space
        .mesh
        .active_elem_ids()
        .par_iter()
        .map(|elem_id| {
            let elem = &space.mesh.elems[*elem_id];
            // the exact solution is not polynomial in general
            let (points, weights) = glq_rule((elem.p as usize + 8).min(MAX_GLQ_POINTS));
            let (scale, x_pts) = scale_gauss_quad_points(points, elem.x[0], elem.x[1]);

            let mut err_sq = 0.0;
            let mut norm_sq = 0.0;
            for eq in 0..space.num_equations() {
                for (x, w) in x_pts.iter().zip(weights.iter()) {
                    let (u, du) = elem.eval(eq, *x);
                    let (u_e, du_e) = exact(*x, eq);
                    err_sq += norm.pointwise((u - u_e, du - du_e)) * w * scale;
                    norm_sq += norm.pointwise((u_e, du_e)) * w * scale;
                }
            }

            ElemError {
                elem_id: *elem_id,
                error: err_sq.sqrt(),
                ref_norm: norm_sq.sqrt(),
            }
        })
        .collect();

    ErrorEstimate::from_elems(norm, elems)
}
