/// A Finite Element: a sub-interval of the domain with a polynomial degree
pub mod elem;
/// Structures and Functions to facilitate h-refinement (Elem bisection)
pub mod h_refinement;
/// Structures and Functions to facilitate p-refinement
pub mod p_refinement;

use elem::Elem;
use h_refinement::HRefError;
use p_refinement::{PRef, PRefError};

use std::collections::BTreeSet;

/// Minimum Elem length. h-Refinements will fail after Elems are smaller than this value.
pub const MIN_ELEM_LENGTH: f64 = 1e-10;

/// Maximum Polynomial degree. p-Refinements will fail when an Elem's degree exceeds this value.
pub const MAX_POLYNOMIAL_ORDER: u8 = 20;

/// An arena of [Elem]s describing the geometric structure and refinement state of an interval
///
/// Elems are never removed: h-refined Elems stay in the arena (inactive) and keep links to their children.
/// The active Elems partition the interval without gaps or overlaps.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub elems: Vec<Elem>,
    /// IDs of the base layer Elems, ordered from left to right
    base_elems: Vec<usize>,
}

impl Mesh {
    /// Construct a Mesh of `num_elems` equally sized Elems of degree `p` over `[a, b]`
    pub fn uniform(a: f64, b: f64, num_elems: usize, p: u8, neq: usize) -> Self {
        let h = (b - a) / num_elems as f64;
        let elems: Vec<Elem> = (0..num_elems)
            .map(|i| {
                let x_right = if i + 1 == num_elems {
                    b
                } else {
                    a + h * (i + 1) as f64
                };
                Elem::new(i, [a + h * i as f64, x_right], p, neq)
            })
            .collect();

        Self {
            base_elems: (0..num_elems).collect(),
            elems,
        }
    }

    /// Construct a Mesh whose base layer is a copy of `other`'s active Elems (without their refinement history)
    pub fn from_active_elems(other: &Self) -> Self {
        let elems: Vec<Elem> = other
            .active_elems()
            .enumerate()
            .map(|(id, elem)| {
                let mut copy = Elem::new(id, elem.x, elem.p, elem.num_equations());
                for eq in 0..elem.num_equations() {
                    copy.set_coeffs(eq, elem.coeffs(eq).iter().cloned().collect());
                }
                copy
            })
            .collect();

        Self {
            base_elems: (0..elems.len()).collect(),
            elems,
        }
    }

    /// IDs of the active Elems, ordered from left to right
    pub fn active_elem_ids(&self) -> Vec<usize> {
        let mut ids = Vec::with_capacity(self.elems.len());
        for base_id in self.base_elems.iter() {
            self.rec_active_elems(*base_id, &mut ids);
        }
        ids
    }

    fn rec_active_elems(&self, elem_id: usize, ids: &mut Vec<usize>) {
        match self.elems[elem_id].child_ids() {
            Some(child_ids) => {
                for cid in child_ids {
                    self.rec_active_elems(cid, ids);
                }
            }
            None => ids.push(elem_id),
        }
    }

    /// Iterate over the active Elems from left to right
    pub fn active_elems(&self) -> impl Iterator<Item = &Elem> + '_ {
        self.active_elem_ids()
            .into_iter()
            .map(move |id| &self.elems[id])
    }

    pub fn num_active_elems(&self) -> usize {
        self.elems.iter().filter(|elem| elem.is_active()).count()
    }

    /// Determine if this Elem can be h-refined
    /// * returns false if the Elem already has children
    /// * returns false if the Elem's children would be shorter than [MIN_ELEM_LENGTH]
    /// * returns an `Err` if the Mesh doesn't have `elem_id`
    pub fn elem_is_h_refineable(&self, elem_id: usize) -> Result<bool, HRefError> {
        self.elems
            .get(elem_id)
            .map(|elem| elem.is_h_refineable())
            .ok_or(HRefError::ElemDoesntExist(elem_id))
    }

    /// Determine if this Elem's degree can be increased
    /// * returns false if the Elem has children
    /// * returns false if the Elem's degree has reached [MAX_POLYNOMIAL_ORDER]
    /// * returns an `Err` if the Mesh doesn't have `elem_id`
    pub fn elem_is_p_refineable(&self, elem_id: usize) -> Result<bool, PRefError> {
        self.elems
            .get(elem_id)
            .map(|elem| elem.is_active() && elem.p < MAX_POLYNOMIAL_ORDER)
            .ok_or(PRefError::ElemDoesntExist(elem_id))
    }

    // ----------------------------------------------------------------------------------------------------
    // h-refinement methods
    // ----------------------------------------------------------------------------------------------------

    /// Split a list of [Elem]s specified by their id
    pub fn execute_h_refinements(&mut self, elem_ids: Vec<usize>) -> Result<(), HRefError> {
        let mut refinements: BTreeSet<usize> = BTreeSet::new();
        for elem_id in elem_ids {
            if elem_id >= self.elems.len() {
                return Err(HRefError::ElemDoesntExist(elem_id));
            }
            if !refinements.insert(elem_id) {
                return Err(HRefError::DoubleRefinement(elem_id));
            }
            // validate everything up front so a failure leaves the Mesh untouched
            let elem = &self.elems[elem_id];
            if elem.has_children() {
                return Err(HRefError::ElemHasChildren(elem_id));
            }
            if !elem.is_h_refineable() {
                return Err(HRefError::MinLengthExceeded(elem_id));
            }
        }

        let mut elem_id_tracker = self.elems.len();
        for elem_id in refinements {
            let children = self.elems[elem_id].h_refine(&mut elem_id_tracker)?;
            self.elems.extend(children);
        }

        Ok(())
    }

    // ----------------------------------------------------------------------------------------------------
    // p-refinement methods
    // ----------------------------------------------------------------------------------------------------

    /// Apply a [PRef] to a list of [Elem]s by their ID
    pub fn p_refine_elems(&mut self, elems: Vec<usize>, refinement: PRef) -> Result<(), PRefError> {
        self.execute_p_refinements(elems.iter().map(|elem_id| (*elem_id, refinement)).collect())
    }

    /// Execute a series of [PRef]s on [Elem]s specified by their id
    pub fn execute_p_refinements(
        &mut self,
        refinements: Vec<(usize, PRef)>,
    ) -> Result<(), PRefError> {
        let mut checked: Vec<(usize, PRef)> = Vec::with_capacity(refinements.len());
        let mut seen: BTreeSet<usize> = BTreeSet::new();
        for (elem_id, p_ref) in refinements {
            if elem_id >= self.elems.len() {
                return Err(PRefError::ElemDoesntExist(elem_id));
            }
            if !seen.insert(elem_id) {
                return Err(PRefError::DoubleRefinement(elem_id));
            }
            if self.elems[elem_id].has_children() {
                return Err(PRefError::ElemHasChildren(elem_id));
            }
            p_ref.refine(self.elems[elem_id].p)?;
            checked.push((elem_id, p_ref));
        }

        for (elem_id, refinement) in checked {
            self.elems[elem_id].p_refine(refinement)?;
        }

        Ok(())
    }
}
