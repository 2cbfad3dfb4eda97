use super::{
    h_refinement::{Bisection, HRefError},
    p_refinement::{PRef, PRefError},
    MIN_ELEM_LENGTH,
};
use crate::fem_domain::basis::eval_expansion;
use crate::fem_domain::domain::fields::{project_pieces, PolyPiece};

#[cfg(feature = "json_export")]
use json::{array, object, JsonValue};
use smallvec::{smallvec, SmallVec};

/// Storage for the coefficients (or dof indices) of one equation on one Elem
pub type LocalCoeffs = SmallVec<[f64; 8]>;
/// Global dof indices of one equation on one Elem (`None` for Dirichlet-constrained coefficients)
pub type LocalDofs = SmallVec<[Option<usize>; 8]>;

/// `Elem`s are the basic unit of the `Mesh`: a sub-interval of the domain with a polynomial degree
///
/// `Elem`s are responsible for keeping track of:
/// * Their bounds in real space
/// * Connections to their parent `Elem` (and their own h-refinement state)
/// * Connections to their child `Elem`s (if h-refined)
/// * Polynomial degree (p-refinement state)
/// * The local solution coefficients of every equation, and the global dof indices those coefficients map to
///
/// ## Local Layout
/// Local coefficient `0` multiplies the left vertex function, `1` the right vertex function, and `2..=p` the bubble functions
///
/// ```text
///    l_0             l_1
///     *---------------*
///     x[0]  bubbles  x[1]
/// ```
#[derive(Debug, Clone)]
pub struct Elem {
    pub id: usize,
    /// Left and right end-points
    pub x: [f64; 2],
    /// Polynomial degree
    pub p: u8,
    coeffs: Vec<LocalCoeffs>,
    pub(crate) dofs: Vec<LocalDofs>,
    children: Option<[usize; 2]>,
    parent: Option<usize>,
}

impl Elem {
    /// Construct a new Elem with zeroed coefficients for `neq` equations
    pub fn new(id: usize, x: [f64; 2], p: u8, neq: usize) -> Self {
        Self {
            id,
            x,
            p,
            coeffs: vec![smallvec![0.0; p as usize + 1]; neq],
            dofs: vec![smallvec![None; p as usize + 1]; neq],
            children: None,
            parent: None,
        }
    }

    /// An Elem is active if it has not been h-refined
    pub fn is_active(&self) -> bool {
        self.children.is_none()
    }

    pub fn has_children(&self) -> bool {
        self.children.is_some()
    }

    /// IDs of the two child Elems (if this Elem was h-refined)
    pub fn child_ids(&self) -> Option<[usize; 2]> {
        self.children
    }

    /// Id of the Parent Elem if this Elem has a parent
    pub fn parent_id(&self) -> Option<usize> {
        self.parent
    }

    pub fn num_equations(&self) -> usize {
        self.coeffs.len()
    }

    pub fn length(&self) -> f64 {
        self.x[1] - self.x[0]
    }

    /// Derivative of the real coordinate with respect to the parametric coordinate
    pub fn jacobian(&self) -> f64 {
        (self.x[1] - self.x[0]) / 2.0
    }

    pub fn midpoint(&self) -> f64 {
        (self.x[0] + self.x[1]) / 2.0
    }

    /// Map a real coordinate into `[-1, 1]`
    pub fn to_parametric(&self, x: f64) -> f64 {
        (2.0 * x - self.x[0] - self.x[1]) / (self.x[1] - self.x[0])
    }

    /// Map a parametric coordinate into `[x0, x1]`
    pub fn to_real(&self, xi: f64) -> f64 {
        self.midpoint() + xi * self.jacobian()
    }

    /// Determine if a real coordinate is within this Elem's bounds
    pub fn contains(&self, x: f64) -> bool {
        x >= self.x[0] && x <= self.x[1]
    }

    /// Local coefficients of equation `eq`
    pub fn coeffs(&self, eq: usize) -> &[f64] {
        &self.coeffs[eq]
    }

    pub(crate) fn coeffs_mut(&mut self, eq: usize) -> &mut LocalCoeffs {
        &mut self.coeffs[eq]
    }

    /// Global dof indices of equation `eq`'s local coefficients
    pub fn dofs(&self, eq: usize) -> &[Option<usize>] {
        &self.dofs[eq]
    }

    /// Replace the local coefficients of equation `eq`. The number of coefficients must be `p + 1`
    pub fn set_coeffs(&mut self, eq: usize, coeffs: LocalCoeffs) {
        assert_eq!(
            coeffs.len(),
            self.p as usize + 1,
            "Wrong number of coefficients for Elem {} (degree {}); cannot set coefficients!",
            self.id,
            self.p
        );
        self.coeffs[eq] = coeffs;
    }

    /// Evaluate the solution of equation `eq` and its derivative (with respect to `x`) at a parametric coordinate
    pub fn eval_parametric(&self, eq: usize, xi: f64) -> (f64, f64) {
        let (u, du_dxi) = eval_expansion(&self.coeffs[eq], xi);
        (u, du_dxi / self.jacobian())
    }

    /// Evaluate the solution of equation `eq` and its derivative at a real coordinate
    pub fn eval(&self, eq: usize, x: f64) -> (f64, f64) {
        self.eval_parametric(eq, self.to_parametric(x))
    }

    /// The local solution of equation `eq` as a [PolyPiece]
    pub fn piece(&self, eq: usize) -> PolyPiece<'_> {
        PolyPiece {
            x: self.x,
            coeffs: &self.coeffs[eq],
        }
    }

    /// Determine if this Elem can be split
    pub fn is_h_refineable(&self) -> bool {
        self.is_active() && self.length() / 2.0 > MIN_ELEM_LENGTH
    }

    /// Construct two new child Elems from an h-Refinement of this Elem
    ///
    /// The children keep this Elem's degree and receive an exact copy of its solution
    pub(crate) fn h_refine(&mut self, id_counter: &mut usize) -> Result<[Elem; 2], HRefError> {
        if self.has_children() {
            return Err(HRefError::ElemHasChildren(self.id));
        }
        if !self.is_h_refineable() {
            return Err(HRefError::MinLengthExceeded(self.id));
        }

        let children = Bisection::both().map(|loc| {
            let id = *id_counter;
            *id_counter += 1;

            let x = loc.sub_range(self.x);
            let mut child = Elem::new(id, x, self.p, self.num_equations());
            child.parent = Some(self.id);
            for eq in 0..self.num_equations() {
                child.coeffs[eq] = project_pieces(&[self.piece(eq)], x, self.p);
            }
            child
        });

        self.children = Some([children[0].id, children[1].id]);
        Ok(children)
    }

    /// Raise this Elem's polynomial degree
    ///
    /// The new bubbles start at zero, so the represented solution is unchanged.
    pub(crate) fn p_refine(&mut self, refinement: PRef) -> Result<(), PRefError> {
        if self.has_children() {
            return Err(PRefError::ElemHasChildren(self.id));
        }
        self.set_degree(refinement.refine(self.p)?);
        Ok(())
    }

    pub(crate) fn set_degree(&mut self, p: u8) {
        self.p = p;
        for (coeffs, dofs) in self.coeffs.iter_mut().zip(self.dofs.iter_mut()) {
            coeffs.resize(p as usize + 1, 0.0);
            dofs.clear();
            dofs.resize(p as usize + 1, None);
        }
    }

    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "id": self.id,
            "parent": self.parent_id(),
            "active": self.children.is_none(),
            "x": array![self.x[0], self.x[1]],
            "p": self.p,
            "children": JsonValue::from(
                match &self.children {
                    Some(ids) => ids.to_vec(),
                    None => Vec::new(),
                }
            ),
            "coeffs": JsonValue::from(
                self.coeffs
                    .iter()
                    .map(|c| c.to_vec())
                    .collect::<Vec<Vec<f64>>>()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn h_refinement_preserves_solution() {
        let mut elem = Elem::new(0, [0.0, 2.0], 3, 1);
        elem.set_coeffs(0, smallvec![1.0, -0.5, 0.75, 0.3]);

        let mut id_counter = 1;
        let children = elem.h_refine(&mut id_counter).unwrap();

        assert_eq!(id_counter, 3);
        assert_eq!(elem.child_ids(), Some([1, 2]));
        assert!(!elem.is_active());

        for child in children.iter() {
            assert_eq!(child.p, 3);
            assert_eq!(child.parent_id(), Some(0));
            for x in [child.x[0], 0.3 * child.x[0] + 0.7 * child.x[1], child.x[1]] {
                let (u_p, du_p) = elem.eval(0, x);
                let (u_c, du_c) = child.eval(0, x);
                assert!((u_p - u_c).abs() < 1e-13);
                assert!((du_p - du_c).abs() < 1e-12);
            }
        }

        assert_eq!(children[1].x, [1.0, 2.0]);
    }

    #[test]
    fn double_h_refinement() {
        let mut elem = Elem::new(0, [0.0, 1.0], 1, 1);
        let mut id_counter = 1;
        elem.h_refine(&mut id_counter).unwrap();
        assert_eq!(
            elem.h_refine(&mut id_counter).unwrap_err(),
            HRefError::ElemHasChildren(0)
        );
    }

    #[test]
    fn p_refinement_preserves_solution() {
        let mut elem = Elem::new(0, [-1.0, 0.0], 2, 2);
        elem.set_coeffs(1, smallvec![0.5, 1.5, -2.0]);
        let before = elem.eval(1, -0.25);

        elem.p_refine(PRef::raise(2)).unwrap();
        assert_eq!(elem.p, 4);
        assert_eq!(elem.coeffs(1).len(), 5);
        assert_eq!(elem.dofs(0).len(), 5);

        let after = elem.eval(1, -0.25);
        assert!((before.0 - after.0).abs() < 1e-15);
        assert!((before.1 - after.1).abs() < 1e-15);
    }
}
