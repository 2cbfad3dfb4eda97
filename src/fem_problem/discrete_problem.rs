use super::{
    integration::glq::{glq_rule, scale_gauss_quad_points, MAX_GLQ_POINTS},
    linalg::{sparse_matrix::SparseMatrix, LinearSystem},
    weak_form::{ElemData, FnSample, Form, PointData, PointSample, WeakForm},
};
use crate::error::{AssemblyError, ConfigurationError};
use crate::fem_domain::{
    basis::{LobattoShapeFn, ShapeFn},
    domain::{dof::Boundary, mesh::elem::Elem, Space},
};
use rayon::prelude::*;
use std::sync::Mutex;

/// Local Jacobian entries and residual entries produced by one Elem
type LocalContribution = (Vec<([usize; 2], f64)>, Vec<(usize, f64)>);

/// Couples a [Space] with a [WeakForm] to produce Jacobian matrices and residual vectors
///
/// The Space is only read during assembly. Local contributions are computed in parallel over the Rayon Global Threadpool
/// and merged into a single [LinearSystem] behind one lock per accumulator.
pub struct DiscreteProblem<'a> {
    space: &'a Space,
    wf: &'a WeakForm,
}

impl<'a> DiscreteProblem<'a> {
    pub fn new(space: &'a Space, wf: &'a WeakForm) -> Result<Self, ConfigurationError> {
        if wf.num_equations() != space.num_equations() {
            return Err(ConfigurationError::InvalidEquationCount(
                wf.num_equations(),
                space.num_equations(),
            ));
        }
        Ok(Self { space, wf })
    }

    pub fn num_dofs(&self) -> usize {
        self.space.get_num_dofs()
    }

    /// Assemble the Jacobian and residual about the solution described by `coeffs`
    ///
    /// `coeffs` is indexed by global dof; Dirichlet-constrained coefficients are taken from the Space's Elems.
    ///
    /// # Returns
    /// * An `Err` if the Space has no Degrees of Freedom
    /// * An `Err` if `coeffs` does not have one entry per Degree of Freedom
    /// * An `Err` if any form produces a non-finite value
    pub fn assemble(&self, coeffs: &[f64]) -> Result<LinearSystem, AssemblyError> {
        let num_dofs = self.num_dofs();
        if num_dofs == 0 {
            return Err(AssemblyError::EmptyDofSet);
        }
        if coeffs.len() != num_dofs {
            return Err(AssemblyError::CoefficientLengthMismatch(
                coeffs.len(),
                num_dofs,
            ));
        }

        let active_ids = self.space.mesh.active_elem_ids();
        let first_id = active_ids[0];
        let last_id = active_ids[active_ids.len() - 1];

        let jacobian = Mutex::new(SparseMatrix::new(num_dofs));
        let residual = Mutex::new(vec![0.0; num_dofs]);

        active_ids.par_iter().try_for_each(|elem_id| {
            let elem = &self.space.mesh.elems[*elem_id];
            let (mut matrix_entries, mut vector_entries) = self.local_volume(elem, coeffs)?;

            let endpoints = [
                (Boundary::Left, *elem_id == first_id),
                (Boundary::Right, *elem_id == last_id),
            ];
            for (boundary, is_boundary) in endpoints {
                if is_boundary {
                    let (m, v) = self.local_surface(elem, boundary, coeffs)?;
                    matrix_entries.extend(m);
                    vector_entries.extend(v);
                }
            }

            jacobian
                .lock()
                .expect("Jacobian lock was poisoned; cannot assemble!")
                .insert_group(matrix_entries);

            let mut residual_guard = residual
                .lock()
                .expect("Residual lock was poisoned; cannot assemble!");
            for (row, value) in vector_entries {
                residual_guard[row] += value;
            }

            Ok(())
        })?;

        Ok(LinearSystem {
            jacobian: jacobian
                .into_inner()
                .expect("Jacobian lock was poisoned; cannot assemble!"),
            residual: residual
                .into_inner()
                .expect("Residual lock was poisoned; cannot assemble!"),
        })
    }

    /// Local coefficients of the current iterate (free entries from `coeffs`, constrained entries from the Elem)
    fn local_coeffs(&self, elem: &Elem, eq: usize, coeffs: &[f64]) -> Vec<f64> {
        elem.dofs(eq)
            .iter()
            .zip(elem.coeffs(eq).iter())
            .map(|(dof, fixed)| match dof {
                Some(dof_id) => coeffs[*dof_id],
                None => *fixed,
            })
            .collect()
    }

    fn local_volume(&self, elem: &Elem, coeffs: &[f64]) -> Result<LocalContribution, AssemblyError> {
        let p = elem.p as usize;
        let n_points = (p + 1 + self.wf.extra_quad_points()).min(MAX_GLQ_POINTS);
        let (points, weights) = glq_rule(n_points);
        let (scale, x) = scale_gauss_quad_points(points, elem.x[0], elem.x[1]);
        let jac = elem.jacobian();

        let shape_fns = LobattoShapeFn::with(p, points);
        let basis: Vec<FnSample> = (0..=p)
            .map(|k| FnSample {
                val: (0..n_points).map(|q| shape_fns.value(k, q)).collect(),
                dx: (0..n_points).map(|q| shape_fns.d1(k, q) / jac).collect(),
            })
            .collect();

        let prev: Vec<FnSample> = (0..self.space.num_equations())
            .map(|eq| {
                let local = self.local_coeffs(elem, eq, coeffs);
                FnSample {
                    val: (0..n_points)
                        .map(|q| local.iter().zip(basis.iter()).map(|(c, b)| c * b.val[q]).sum())
                        .collect(),
                    dx: (0..n_points)
                        .map(|q| local.iter().zip(basis.iter()).map(|(c, b)| c * b.dx[q]).sum())
                        .collect(),
                }
            })
            .collect();

        let data = ElemData::new(
            elem.id,
            elem.x,
            x,
            weights.iter().map(|w| w * scale).collect(),
            prev,
        );

        let mut matrix_entries = Vec::new();
        let mut vector_entries = Vec::new();

        for form in self.wf.forms() {
            match form {
                Form::Matrix { i, j, f } => {
                    for (row, v) in free_dofs(elem, *i).map(|(k, row)| (row, &basis[k])) {
                        for (col, u) in free_dofs(elem, *j).map(|(l, col)| (col, &basis[l])) {
                            let value = f(&data, u, v);
                            check_finite(value, form, elem.id, *i, *j)?;
                            matrix_entries.push(([row, col], value));
                        }
                    }
                }
                Form::Vector { i, f } => {
                    for (row, v) in free_dofs(elem, *i).map(|(k, row)| (row, &basis[k])) {
                        let value = f(&data, v);
                        check_finite(value, form, elem.id, *i, *i)?;
                        vector_entries.push((row, value));
                    }
                }
                _ => (),
            }
        }

        Ok((matrix_entries, vector_entries))
    }

    fn local_surface(
        &self,
        elem: &Elem,
        boundary: Boundary,
        coeffs: &[f64],
    ) -> Result<LocalContribution, AssemblyError> {
        let p = elem.p as usize;
        let xi = match boundary {
            Boundary::Left => -1.0,
            Boundary::Right => 1.0,
        };
        let jac = elem.jacobian();
        let shape_fns = LobattoShapeFn::with(p, &[xi]);
        let basis: Vec<PointSample> = (0..=p)
            .map(|k| PointSample {
                val: shape_fns.value(k, 0),
                dx: shape_fns.d1(k, 0) / jac,
            })
            .collect();

        let prev: Vec<PointSample> = (0..self.space.num_equations())
            .map(|eq| {
                let local = self.local_coeffs(elem, eq, coeffs);
                local.iter().zip(basis.iter()).fold(PointSample::default(), |acc, (c, b)| PointSample {
                    val: acc.val + c * b.val,
                    dx: acc.dx + c * b.dx,
                })
            })
            .collect();

        let data = PointData::new(elem.id, boundary, elem.to_real(xi), prev);

        let mut matrix_entries = Vec::new();
        let mut vector_entries = Vec::new();

        for form in self.wf.forms() {
            match form {
                Form::SurfMatrix { i, j, boundary: b, f } if *b == boundary => {
                    for (row, v) in free_dofs(elem, *i).map(|(k, row)| (row, &basis[k])) {
                        for (col, u) in free_dofs(elem, *j).map(|(l, col)| (col, &basis[l])) {
                            let value = f(&data, u, v);
                            check_finite(value, form, elem.id, *i, *j)?;
                            matrix_entries.push(([row, col], value));
                        }
                    }
                }
                Form::SurfVector { i, boundary: b, f } if *b == boundary => {
                    for (row, v) in free_dofs(elem, *i).map(|(k, row)| (row, &basis[k])) {
                        let value = f(&data, v);
                        check_finite(value, form, elem.id, *i, *i)?;
                        vector_entries.push((row, value));
                    }
                }
                _ => (),
            }
        }

        Ok((matrix_entries, vector_entries))
    }
}

/// Local indices and global dof ids of the free coefficients of equation `eq`
fn free_dofs(elem: &Elem, eq: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
    elem.dofs(eq)
        .iter()
        .enumerate()
        .filter_map(|(k, dof)| dof.map(|dof_id| (k, dof_id)))
}

fn check_finite(value: f64, form: &Form, elem_id: usize, eq_i: usize, eq_j: usize) -> Result<(), AssemblyError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AssemblyError::NonFiniteIntegrand {
            form: form.kind(),
            elem_id,
            eq_i,
            eq_j,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laplace_form() -> WeakForm {
        let mut wf = WeakForm::new(1);
        wf.add_matrix_form(0, 0, |data, u, v| data.integrate(|q| u.dx[q] * v.dx[q]));
        wf.add_vector_form(0, |data, v| data.integrate(|q| data.du_prev(0)[q] * v.dx[q]));
        wf
    }

    #[test]
    fn stiffness_matrix_linear_elems() {
        let mut space = Space::new(0.0, 2.0, 2, 1, 1).unwrap();
        assert_eq!(space.assign_dofs(), 3);
        let wf = laplace_form();
        let dp = DiscreteProblem::new(&space, &wf).unwrap();

        let system = dp.assemble(&[0.0; 3]).unwrap();

        // h = 1: [1 -1 0; -1 2 -1; 0 -1 1]
        let expected = [[1.0, -1.0, 0.0], [-1.0, 2.0, -1.0], [0.0, -1.0, 1.0]];
        for (r, row) in expected.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                assert!((system.jacobian.get([r, c]) - value).abs() < 1e-14);
            }
        }
        assert!(system.residual_norm() < 1e-15);
    }

    #[test]
    fn residual_is_jacobian_times_coeffs_for_linear_forms() {
        let mut space = Space::new(-1.0, 1.0, 3, 3, 1).unwrap();
        let ndof = space.assign_dofs();
        let wf = laplace_form();
        let dp = DiscreteProblem::new(&space, &wf).unwrap();

        let coeffs: Vec<f64> = (0..ndof).map(|i| (i as f64 * 0.7).cos()).collect();
        let system = dp.assemble(&coeffs).unwrap();
        let product = system.jacobian.mul_vec(&coeffs);

        for (r, jc) in system.residual.iter().zip(product.iter()) {
            assert!((r - jc).abs() < 1e-12);
        }
    }

    #[test]
    fn dirichlet_values_enter_the_residual() {
        let mut space = Space::new(0.0, 1.0, 1, 2, 1).unwrap();
        space.set_bc_left_dirichlet(0, 1.0).unwrap();
        space.set_bc_right_dirichlet(0, 3.0).unwrap();
        assert_eq!(space.assign_dofs(), 1);

        // the bubble is orthogonal to the linear lift in the H1-seminorm
        let wf = laplace_form();
        let system = DiscreteProblem::new(&space, &wf).unwrap().assemble(&[0.0]).unwrap();
        assert!(system.residual[0].abs() < 1e-14);
        assert!((system.jacobian.get([0, 0]) - 2.0).abs() < 1e-13);
    }

    #[test]
    fn surface_forms_act_on_boundary_elems() {
        let mut space = Space::new(0.0, 1.0, 3, 1, 1).unwrap();
        space.assign_dofs();

        let mut wf = WeakForm::new(1);
        wf.add_matrix_form_surf(0, 0, Boundary::Right, |_, u, v| u.val * v.val);
        wf.add_vector_form_surf(0, Boundary::Left, |pt, v| pt.normal() * v.val);

        let system = DiscreteProblem::new(&space, &wf).unwrap().assemble(&[0.0; 4]).unwrap();
        assert!((system.jacobian.get([3, 3]) - 1.0).abs() < 1e-15);
        assert!(system.jacobian.get([2, 2]).abs() < 1e-15);
        assert!(system.jacobian.get([0, 0]).abs() < 1e-15);
        assert!((system.residual[0] + 1.0).abs() < 1e-15);
        assert!(system.residual[1..].iter().all(|r| *r == 0.0));
    }

    #[test]
    fn assembly_errors() {
        let mut space = Space::new(0.0, 1.0, 2, 1, 1).unwrap();
        space.assign_dofs();

        let mut wf = WeakForm::new(1);
        wf.add_vector_form(0, |_, _| f64::NAN);
        let dp = DiscreteProblem::new(&space, &wf).unwrap();

        assert_eq!(
            dp.assemble(&[0.0; 2]).unwrap_err(),
            AssemblyError::CoefficientLengthMismatch(2, 3)
        );
        assert!(matches!(
            dp.assemble(&[0.0; 3]).unwrap_err(),
            AssemblyError::NonFiniteIntegrand { form: "vector", .. }
        ));

        assert!(DiscreteProblem::new(&space, &WeakForm::new(2)).is_err());
    }
}
