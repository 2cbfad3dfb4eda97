/// Boundary Conditions and Degree of Freedom bookkeeping
pub mod dof;
/// Evaluation, sampling and projection of discrete solutions
pub mod fields;
/// The hierarchical Elem arena. This is modified by hp-refinements.
pub mod mesh;

use crate::error::{ConfigurationError, FemError};
use crate::fem_problem::adapt::AdaptType;
use dof::{Boundary, BoundaryCondition, DofTracker};
use fields::{project_pieces, PolyPiece, SolutionSamples};
use mesh::{elem::Elem, p_refinement::PRef, Mesh, MAX_POLYNOMIAL_ORDER};

#[cfg(feature = "json_export")]
use json::{array, object, JsonValue};
use log::{debug, warn};
#[cfg(feature = "json_export")]
use std::fs::File;
#[cfg(feature = "json_export")]
use std::io::BufWriter;

/// Maximum number of equations in a system
pub const MAX_EQN_NUM: usize = 10;

/// A Finite Element Space over the interval `[A, B]`
///
/// This struct contains:
/// * The [Mesh] - an arena of hierarchical [Elem]s whose active members partition the domain
/// * The number of equations in the system and their [BoundaryCondition]s at both end-points
/// * The number of free Degrees of Freedom (as of the last call to [Space::assign_dofs])
///
/// Vertex functions are shared between neighboring Elems, so the discrete solution is continuous.
#[derive(Debug, Clone)]
pub struct Space {
    pub mesh: Mesh,
    domain: [f64; 2],
    neq: usize,
    bcs: Vec<[BoundaryCondition; 2]>,
    num_dofs: usize,
}

impl Space {
    /// Construct a Space of `num_elems` equally sized Elems of degree `p_init` over `[a, b]`, for a system of `neq` equations
    ///
    /// All Boundary Conditions start out as [BoundaryCondition::Natural]
    ///
    /// ```
    /// use fem_1d::prelude::*;
    ///
    /// let mut space = Space::new(0.0, 1.0, 4, 2, 1).unwrap();
    /// assert_eq!(space.assign_dofs(), 9);
    ///
    /// space.set_bc_left_dirichlet(0, 1.0).unwrap();
    /// assert_eq!(space.assign_dofs(), 8);
    ///
    /// assert!(Space::new(0.0, 1.0, 4, 2, 11).is_err());
    /// ```
    pub fn new(
        a: f64,
        b: f64,
        num_elems: usize,
        p_init: u8,
        neq: usize,
    ) -> Result<Self, ConfigurationError> {
        if !(a.is_finite() && b.is_finite() && a < b) {
            return Err(ConfigurationError::InvalidDomain(a, b));
        }
        if num_elems == 0 {
            return Err(ConfigurationError::NoElements);
        }
        if p_init < 1 || p_init > MAX_POLYNOMIAL_ORDER {
            return Err(ConfigurationError::InvalidDegree(
                p_init,
                MAX_POLYNOMIAL_ORDER,
            ));
        }
        if neq < 1 || neq > MAX_EQN_NUM {
            return Err(ConfigurationError::InvalidEquationCount(neq, MAX_EQN_NUM));
        }

        Ok(Self {
            mesh: Mesh::uniform(a, b, num_elems, p_init, neq),
            domain: [a, b],
            neq,
            bcs: vec![[BoundaryCondition::Natural; 2]; neq],
            num_dofs: 0,
        })
    }

    // ----------------------------------------------------------------------------------------------------
    // Boundary Conditions
    // ----------------------------------------------------------------------------------------------------

    /// Set the Boundary Condition of equation `eq` on one end of the domain
    ///
    /// Takes effect on the next call to [Space::assign_dofs]
    pub fn set_bc(
        &mut self,
        eq: usize,
        boundary: Boundary,
        bc: BoundaryCondition,
    ) -> Result<(), ConfigurationError> {
        self.check_equation(eq)?;
        if let BoundaryCondition::Dirichlet(value) = bc {
            if !value.is_finite() {
                return Err(ConfigurationError::NonFiniteDirichletValue(eq));
            }
        }
        self.bcs[eq][boundary.index()] = bc;
        Ok(())
    }

    pub fn set_bc_left_dirichlet(&mut self, eq: usize, value: f64) -> Result<(), ConfigurationError> {
        self.set_bc(eq, Boundary::Left, BoundaryCondition::Dirichlet(value))
    }

    pub fn set_bc_right_dirichlet(&mut self, eq: usize, value: f64) -> Result<(), ConfigurationError> {
        self.set_bc(eq, Boundary::Right, BoundaryCondition::Dirichlet(value))
    }

    pub fn set_bc_left_natural(&mut self, eq: usize) -> Result<(), ConfigurationError> {
        self.set_bc(eq, Boundary::Left, BoundaryCondition::Natural)
    }

    pub fn set_bc_right_natural(&mut self, eq: usize) -> Result<(), ConfigurationError> {
        self.set_bc(eq, Boundary::Right, BoundaryCondition::Natural)
    }

    /// Boundary Condition of equation `eq` on one end of the domain
    pub fn bc(&self, eq: usize, boundary: Boundary) -> BoundaryCondition {
        self.bcs[eq][boundary.index()]
    }

    pub(crate) fn check_equation(&self, eq: usize) -> Result<(), ConfigurationError> {
        if eq >= self.neq {
            Err(ConfigurationError::EquationOutOfRange(eq, self.neq))
        } else {
            Ok(())
        }
    }

    // ----------------------------------------------------------------------------------------------------
    // Degrees of Freedom
    // ----------------------------------------------------------------------------------------------------

    /// Enumerate the free coefficients of all active Elems and return the number of Degrees of Freedom
    ///
    /// Active Elems are visited from left to right (one pass per equation). Each Elem's left vertex is shared with its left neighbor,
    /// then its bubbles and its right vertex receive new indices. Vertex coefficients constrained by a Dirichlet condition receive no index;
    /// they hold the Dirichlet value instead.
    ///
    /// Repeated calls without structural changes produce identical numberings.
    pub fn assign_dofs(&mut self) -> usize {
        let mut tracker = DofTracker::new();
        let active_ids = self.mesh.active_elem_ids();
        let last = active_ids.len() - 1;

        for eq in 0..self.neq {
            let mut shared_vertex: Option<usize> = None;

            for (i, elem_id) in active_ids.iter().enumerate() {
                let elem = &mut self.mesh.elems[*elem_id];
                let num_local = elem.p as usize + 1;
                let mut dofs: mesh::elem::LocalDofs = smallvec::smallvec![None; num_local];

                dofs[0] = if i == 0 {
                    match self.bcs[eq][Boundary::Left.index()] {
                        BoundaryCondition::Dirichlet(value) => {
                            elem.coeffs_mut(eq)[0] = value;
                            None
                        }
                        BoundaryCondition::Natural => Some(tracker.next_id()),
                    }
                } else {
                    shared_vertex
                };

                for dof in dofs.iter_mut().skip(2) {
                    *dof = Some(tracker.next_id());
                }

                dofs[1] = match (i == last, self.bcs[eq][Boundary::Right.index()]) {
                    (true, BoundaryCondition::Dirichlet(value)) => {
                        elem.coeffs_mut(eq)[1] = value;
                        None
                    }
                    _ => Some(tracker.next_id()),
                };

                shared_vertex = dofs[1];
                elem.dofs[eq] = dofs;
            }
        }

        self.num_dofs = tracker.count();
        debug!(
            "assigned {} dofs over {} active elems",
            self.num_dofs,
            active_ids.len()
        );
        self.num_dofs
    }

    /// Number of Degrees of Freedom as of the last call to [Space::assign_dofs]
    pub fn get_num_dofs(&self) -> usize {
        self.num_dofs
    }

    pub fn num_equations(&self) -> usize {
        self.neq
    }

    /// End-points of the domain
    pub fn domain(&self) -> [f64; 2] {
        self.domain
    }

    pub fn get_n_active_elem(&self) -> usize {
        self.mesh.num_active_elems()
    }

    pub fn first_active_element(&self) -> &Elem {
        let ids = self.mesh.active_elem_ids();
        &self.mesh.elems[ids[0]]
    }

    pub fn last_active_element(&self) -> &Elem {
        let ids = self.mesh.active_elem_ids();
        &self.mesh.elems[ids[ids.len() - 1]]
    }

    /// Iterate over the active Elems from left to right
    pub fn active_elems(&self) -> impl Iterator<Item = &Elem> + '_ {
        self.mesh.active_elems()
    }

    // ----------------------------------------------------------------------------------------------------
    // Coefficient vectors
    // ----------------------------------------------------------------------------------------------------

    /// Gather the free coefficients of all active Elems into a vector indexed by global dof
    pub fn solution_to_vector(&self) -> Vec<f64> {
        let mut vector = vec![0.0; self.num_dofs];
        for elem in self.active_elems() {
            for eq in 0..self.neq {
                for (dof, coeff) in elem.dofs(eq).iter().zip(elem.coeffs(eq).iter()) {
                    if let Some(dof_id) = dof {
                        vector[*dof_id] = *coeff;
                    }
                }
            }
        }
        vector
    }

    /// Scatter a vector indexed by global dof into the local coefficients of all active Elems
    ///
    /// Dirichlet-constrained coefficients are left untouched.
    pub fn vector_to_solution(&mut self, vector: &[f64]) {
        assert_eq!(
            vector.len(),
            self.num_dofs,
            "Coefficient vector length does not match the number of dofs; cannot copy solution into Space!"
        );

        for elem_id in self.mesh.active_elem_ids() {
            let elem = &mut self.mesh.elems[elem_id];
            for eq in 0..self.neq {
                let dofs = elem.dofs[eq].clone();
                for (coeff, dof) in elem.coeffs_mut(eq).iter_mut().zip(dofs.iter()) {
                    if let Some(dof_id) = dof {
                        *coeff = vector[*dof_id];
                    }
                }
            }
        }
    }

    // ----------------------------------------------------------------------------------------------------
    // Solution evaluation and transfer
    // ----------------------------------------------------------------------------------------------------

    /// Active Elems which overlap `[a, b]` (with positive length), ordered from left to right
    pub fn overlapping_elems(&self, range: [f64; 2]) -> impl Iterator<Item = &Elem> + '_ {
        self.active_elems()
            .filter(move |elem| elem.piece(0).overlap(range).is_some())
    }

    /// The solution of equation `eq` over `[a, b]` as a list of [PolyPiece]s
    pub fn pieces_over(&self, eq: usize, range: [f64; 2]) -> Vec<PolyPiece<'_>> {
        self.overlapping_elems(range)
            .map(|elem| elem.piece(eq))
            .collect()
    }

    /// Evaluate the solution of equation `eq` and its derivative at a real coordinate
    ///
    /// Returns `None` if `x` is outside of the domain
    pub fn eval(&self, eq: usize, x: f64) -> Option<(f64, f64)> {
        self.active_elems()
            .find(|elem| elem.contains(x))
            .map(|elem| elem.eval(eq, x))
    }

    /// Transfer the solution of `source` onto this Space's active Elems (by projection-based interpolation)
    ///
    /// `source` must cover the same domain. Dirichlet values are re-applied afterwards through [Space::assign_dofs].
    pub fn project_from(&mut self, source: &Space) -> Result<(), ConfigurationError> {
        if source.domain != self.domain || source.neq != self.neq {
            return Err(ConfigurationError::MismatchedSpaces);
        }

        for elem_id in self.mesh.active_elem_ids() {
            let (x, p) = (self.mesh.elems[elem_id].x, self.mesh.elems[elem_id].p);
            for eq in 0..self.neq {
                let coeffs = project_pieces(&source.pieces_over(eq, x), x, p);
                self.mesh.elems[elem_id].set_coeffs(eq, coeffs);
            }
        }

        self.assign_dofs();
        Ok(())
    }

    /// Sample the solution of equation `eq` at `density` uniformly spaced points per active Elem
    pub fn sample_solution(&self, eq: usize, density: usize) -> SolutionSamples {
        SolutionSamples::new(self, eq, density)
    }

    // ----------------------------------------------------------------------------------------------------
    // Reference Space
    // ----------------------------------------------------------------------------------------------------

    /// Construct a uniformly refined copy of this Space
    ///
    /// Every active Elem is refined according to `refinement`:
    /// * [AdaptType::Hp]: split into two halves, each with the degree increased by one
    /// * [AdaptType::H]: split into two halves with the same degree
    /// * [AdaptType::P]: degree increased by one
    ///
    /// Elems which cannot be refined in the requested way fall back to the other kind of refinement.
    /// The new Space starts out with an exact copy of this Space's solution and always has more Degrees of Freedom.
    /// This Space is not modified.
    pub fn construct_refined_space(&self, refinement: AdaptType) -> Result<Space, FemError> {
        let mut ref_space = Space {
            mesh: Mesh::from_active_elems(&self.mesh),
            domain: self.domain,
            neq: self.neq,
            bcs: self.bcs.clone(),
            num_dofs: 0,
        };

        let base_ids = ref_space.mesh.active_elem_ids();
        let mut split_ids = Vec::new();
        let mut raise_ids = Vec::new();

        for id in base_ids {
            let can_split = ref_space.mesh.elem_is_h_refineable(id)?;
            let can_raise = ref_space.mesh.elem_is_p_refineable(id)?;

            let (split, raise) = match refinement {
                AdaptType::Hp => (can_split, can_raise),
                AdaptType::H => (can_split, !can_split && can_raise),
                AdaptType::P => (!can_raise && can_split, can_raise),
            };
            if !split && !raise {
                let [a, b] = ref_space.mesh.elems[id].x;
                warn!("Elem at [{}, {}] cannot be refined any further", a, b);
            }
            if split {
                split_ids.push(id);
            }
            if raise {
                raise_ids.push(id);
            }
        }

        // raising the degree first keeps the children's degrees in sync with their parent
        ref_space.mesh.p_refine_elems(raise_ids, PRef::raise(1))?;
        ref_space.mesh.execute_h_refinements(split_ids)?;

        let ref_dofs = ref_space.assign_dofs();
        if ref_dofs <= self.num_dofs {
            return Err(FemError::ReferenceNotRefined(self.num_dofs));
        }

        Ok(ref_space)
    }

    // ----------------------------------------------------------------------------------------------------
    // Export
    // ----------------------------------------------------------------------------------------------------

    /// Print the Space (Elems, degrees, coefficients and boundary conditions) to a JSON file specified by path.
    #[cfg(feature = "json_export")]
    pub fn export_to_json(&self, path: impl AsRef<str>) -> std::io::Result<()> {
        let f = File::create(path.as_ref())?;
        let mut w = BufWriter::new(&f);

        let space_object = object! {
            "domain": array![self.domain[0], self.domain[1]],
            "neq": self.neq,
            "num_dofs": self.num_dofs,
            "bcs": JsonValue::from(self.bcs.iter().map(|[left, right]| object! {
                "left": left.to_string(),
                "right": right.to_string(),
            }).collect::<Vec<_>>()),
            "active_elems": JsonValue::from(self.mesh.active_elem_ids()),
            "Elems": JsonValue::from(self.mesh.elems.iter().map(|elem| elem.to_json()).collect::<Vec<_>>()),
        };

        space_object.write_pretty(&mut w, 4)?;

        Ok(())
    }
}
