use super::error_estimation::{sq_diff_over, ErrorEstimate, NormKind};
use crate::error::{ConfigurationError, FemError};
use crate::fem_domain::domain::{
    fields::{project_pieces, PolyPiece},
    mesh::p_refinement::PRef,
    Space,
};
use log::{debug, info, warn};
use std::fmt;

/// Errors below this fraction of an Elem's reference norm are treated as zero when comparing refinements
const ERROR_FLOOR: f64 = 1e-12;

/// Kind of adaptivity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdaptType {
    /// Choose between splitting and raising the degree for each Elem
    Hp,
    /// Only split Elems
    H,
    /// Only raise degrees
    P,
}

impl Default for AdaptType {
    fn default() -> Self {
        Self::Hp
    }
}

impl fmt::Display for AdaptType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Hp => write!(f, "hp"),
            Self::H => write!(f, "h"),
            Self::P => write!(f, "p"),
        }
    }
}

impl std::str::FromStr for AdaptType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hp" => Ok(Self::Hp),
            "h" => Ok(Self::H),
            "p" => Ok(Self::P),
            _ => Err(ConfigurationError::InvalidSetting("adapt_type", s.to_string())),
        }
    }
}

/// Refinement applied to a single Elem
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refinement {
    /// Split into two children of the same degree
    Split,
    /// Raise the degree by one
    RaiseDegree,
}

/// Record of the refinements applied by one call to [adapt]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AdaptReport {
    pub max_error: f64,
    /// `(Elem id, refinement)` for every candidate, ordered from left to right
    pub refinements: Vec<(usize, Refinement)>,
}

impl AdaptReport {
    pub fn num_split(&self) -> usize {
        self.refinements
            .iter()
            .filter(|(_, r)| *r == Refinement::Split)
            .count()
    }

    pub fn num_raised(&self) -> usize {
        self.refinements.len() - self.num_split()
    }
}

/// Refine the coarse Space where its error is largest
///
/// Every active Elem whose error is at least `threshold * max_error` is refined according to `adapt_type`.
/// For [AdaptType::Hp] the reference solution is used to compare the two options (see [choose_hp_refinement]).
/// Elems which cannot be refined as requested fall back to the other kind of refinement.
///
/// Afterwards the reference solution is projected onto the new coarse Space and its dofs are reassigned.
pub fn adapt(
    norm: NormKind,
    adapt_type: AdaptType,
    threshold: f64,
    errors: &ErrorEstimate,
    coarse: &mut Space,
    reference: &Space,
) -> Result<AdaptReport, FemError> {
    let max_error = errors.max_error();
    let mut report = AdaptReport {
        max_error,
        refinements: Vec::new(),
    };

    if max_error <= 0.0 {
        debug!("all Elems have zero error; nothing to refine");
        return Ok(report);
    }

    for elem_error in errors.elems.iter() {
        if elem_error.error < threshold * max_error {
            continue;
        }

        let elem_id = elem_error.elem_id;
        let can_split = coarse.mesh.elem_is_h_refineable(elem_id)?;
        let can_raise = coarse.mesh.elem_is_p_refineable(elem_id)?;

        let refinement = match adapt_type {
            _ if !can_split && !can_raise => {
                warn!("Elem {} cannot be refined any further", elem_id);
                continue;
            }
            AdaptType::Hp if can_split && can_raise => choose_hp_refinement(
                norm,
                elem_error.error,
                elem_error.ref_norm,
                &coarse.mesh.elems[elem_id].x,
                coarse.mesh.elems[elem_id].p,
                reference,
            ),
            AdaptType::H if can_split => Refinement::Split,
            AdaptType::H => {
                warn!("Elem {} is too short to split; raising its degree instead", elem_id);
                Refinement::RaiseDegree
            }
            AdaptType::P | AdaptType::Hp if can_raise => Refinement::RaiseDegree,
            AdaptType::P | AdaptType::Hp => {
                warn!("Elem {} is at the maximum degree; splitting instead", elem_id);
                Refinement::Split
            }
        };

        debug!("Elem {} (error: {:e}): {:?}", elem_id, elem_error.error, refinement);
        report.refinements.push((elem_id, refinement));
    }

    let (split, raise): (Vec<_>, Vec<_>) = report
        .refinements
        .iter()
        .partition(|(_, r)| *r == Refinement::Split);

    coarse
        .mesh
        .p_refine_elems(raise.iter().map(|(id, _)| *id).collect(), PRef::raise(1))?;
    coarse
        .mesh
        .execute_h_refinements(split.iter().map(|(id, _)| *id).collect())?;

    coarse.project_from(reference)?;

    info!(
        "adapted {} Elem(s) ({} split, {} raised); {} active Elems, {} dofs",
        report.refinements.len(),
        report.num_split(),
        report.num_raised(),
        coarse.get_n_active_elem(),
        coarse.get_num_dofs()
    );

    Ok(report)
}

/// Compare the two refinements of an Elem over `[a, b]` with degree `p`
///
/// Each candidate is the projection of the reference solution onto the refined Elem:
/// * raising the degree adds one dof per equation
/// * splitting adds `p` dofs per equation (a new vertex and `p - 1` bubbles)
///
/// The candidate with the larger error reduction per added dof, `(ln e_0 - ln e_candidate) / added_dofs`, is selected. Ties favor raising the degree.
pub fn choose_hp_refinement(
    norm: NormKind,
    error: f64,
    ref_norm: f64,
    &[a, b]: &[f64; 2],
    p: u8,
    reference: &Space,
) -> Refinement {
    let mid = (a + b) / 2.0;
    let mut p_err_sq = 0.0;
    let mut h_err_sq = 0.0;

    for eq in 0..reference.num_equations() {
        let pieces = reference.pieces_over(eq, [a, b]);

        let raised = project_pieces(&pieces, [a, b], p + 1);
        p_err_sq += sq_diff_over(
            norm,
            &PolyPiece {
                x: [a, b],
                coeffs: &raised,
            },
            &pieces,
        )
        .0;

        for half in [[a, mid], [mid, b]] {
            let child = project_pieces(&pieces, half, p);
            h_err_sq += sq_diff_over(
                norm,
                &PolyPiece {
                    x: half,
                    coeffs: &child,
                },
                &pieces,
            )
            .0;
        }
    }

    let floor = (ERROR_FLOOR * ref_norm).max(f64::MIN_POSITIVE);
    let ln_err = error.max(floor).ln();
    let rate = |err: f64, added: f64| (ln_err - err.max(floor).ln()) / added;

    let p_rate = rate(p_err_sq.sqrt(), 1.0);
    let h_rate = rate(h_err_sq.sqrt(), p as f64);

    debug!(
        "[{}, {}]: p-candidate error {:e} (rate {:.3}), h-candidate error {:e} (rate {:.3})",
        a,
        b,
        p_err_sq.sqrt(),
        p_rate,
        h_err_sq.sqrt(),
        h_rate
    );

    if p_rate >= h_rate {
        Refinement::RaiseDegree
    } else {
        Refinement::Split
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fem_domain::domain::mesh::MAX_POLYNOMIAL_ORDER;
    use crate::fem_problem::error_estimation::calc_err_est;

    /// Coarse Space with a zero solution, and a reference Space holding `f` (projected)
    fn spaces_for(
        num_elems: usize,
        p: u8,
        ref_type: AdaptType,
        f: impl Fn(f64) -> f64,
    ) -> (Space, Space) {
        let mut coarse = Space::new(0.0, 1.0, num_elems, p, 1).unwrap();
        coarse.assign_dofs();
        let mut reference = coarse.construct_refined_space(ref_type).unwrap();

        let mut sampled = Space::new(0.0, 1.0, 64, 1, 1).unwrap();
        sampled.assign_dofs();
        let values: Vec<f64> = (0..=64).map(|i| f(i as f64 / 64.0)).collect();
        sampled.vector_to_solution(&values);
        reference.project_from(&sampled).unwrap();

        (coarse, reference)
    }

    #[test]
    fn smooth_error_prefers_raising_the_degree() {
        let (coarse, reference) = spaces_for(1, 1, AdaptType::P, |x| x * (1.0 - x));
        let estimate = calc_err_est(NormKind::H1, &coarse, &reference).unwrap();

        // the p-candidate reproduces the reference exactly
        assert_eq!(
            choose_hp_refinement(
                NormKind::H1,
                estimate.elems[0].error,
                estimate.elems[0].ref_norm,
                &[0.0, 1.0],
                1,
                &reference
            ),
            Refinement::RaiseDegree
        );
    }

    #[test]
    fn kink_prefers_splitting() {
        // the reference has a kink at the midpoint which only a split can capture
        let (coarse, reference) = spaces_for(1, 2, AdaptType::H, |x| (x - 0.5).abs());
        let estimate = calc_err_est(NormKind::H1, &coarse, &reference).unwrap();

        assert_eq!(
            choose_hp_refinement(
                NormKind::H1,
                estimate.elems[0].error,
                estimate.elems[0].ref_norm,
                &[0.0, 1.0],
                2,
                &reference
            ),
            Refinement::Split
        );
    }

    #[test]
    fn only_the_worst_elem_is_refined_with_unit_threshold() {
        let (mut coarse, reference) =
            spaces_for(4, 1, AdaptType::Hp, |x| (x - 0.9).powi(2) * 3.0);
        let estimate = calc_err_est(NormKind::H1, &coarse, &reference).unwrap();

        let report = adapt(NormKind::H1, AdaptType::H, 1.0, &estimate, &mut coarse, &reference).unwrap();

        assert_eq!(report.refinements.len(), 1);
        assert_eq!(report.num_split(), 1);
        assert_eq!(coarse.get_n_active_elem(), 5);
    }

    #[test]
    fn p_adaptivity_raises_candidates() {
        let (mut coarse, reference) = spaces_for(3, 1, AdaptType::P, |x| x * x);
        let estimate = calc_err_est(NormKind::L2, &coarse, &reference).unwrap();

        let report = adapt(NormKind::L2, AdaptType::P, 0.0, &estimate, &mut coarse, &reference).unwrap();
        assert_eq!(report.num_raised(), 3);
        assert_eq!(coarse.get_n_active_elem(), 3);
        assert!(coarse.active_elems().all(|e| e.p == 2));

        // the new coarse Space holds the projected reference solution
        let after = calc_err_est(NormKind::L2, &coarse, &reference).unwrap();
        assert!(after.abs_error < 1e-12);
    }

    #[test]
    fn degree_limit_falls_back_to_splitting() {
        let (mut coarse, reference) = spaces_for(1, MAX_POLYNOMIAL_ORDER, AdaptType::P, |x| x.sin());
        let estimate = calc_err_est(NormKind::H1, &coarse, &reference).unwrap();

        let report = adapt(NormKind::H1, AdaptType::P, 0.5, &estimate, &mut coarse, &reference).unwrap();
        assert_eq!(report.refinements, vec![(0, Refinement::Split)]);
        assert_eq!(coarse.get_n_active_elem(), 2);
    }

    #[test]
    fn zero_error_refines_nothing() {
        let mut coarse = Space::new(0.0, 1.0, 2, 1, 1).unwrap();
        coarse.assign_dofs();
        let reference = coarse.construct_refined_space(AdaptType::Hp).unwrap();
        let estimate = calc_err_est(NormKind::H1, &coarse, &reference).unwrap();

        let report = adapt(NormKind::H1, AdaptType::Hp, 0.7, &estimate, &mut coarse, &reference).unwrap();
        assert!(report.refinements.is_empty());
        assert_eq!(coarse.get_n_active_elem(), 2);
    }

    #[test]
    fn adapt_type_parsing() {
        assert_eq!("hp".parse::<AdaptType>().unwrap(), AdaptType::Hp);
        assert_eq!("H".parse::<AdaptType>().unwrap(), AdaptType::H);
        assert!("q".parse::<AdaptType>().is_err());
    }
}
