use super::{
    discrete_problem::DiscreteProblem,
    linalg::{LinearSolver, LinearSystem},
    weak_form::WeakForm,
};
use crate::config::NewtonConfig;
use crate::error::FemError;
use crate::fem_domain::domain::Space;
use log::{debug, info};

/// Stages of Newton's method
///
/// ```text
/// Initializing -> Assembling -> CheckConverged -> LinearSolve -> Update -> Assembling ...
///                                     |                |
///                                 Converged          Failed
/// ```
#[derive(Debug)]
pub enum NewtonState {
    /// Seed the coefficient vector from the Space
    Initializing,
    /// Assemble the Jacobian and residual about the current iterate
    Assembling,
    CheckConverged(LinearSystem),
    /// Solve `J d = -F`
    LinearSolve(LinearSystem),
    /// Add the correction to the current iterate
    Update(Vec<f64>),
    Converged(f64),
    Failed(FemError),
}

/// Summary of a converged Newton solve
#[derive(Clone, Debug, PartialEq)]
pub struct NewtonReport {
    /// Number of completed updates
    pub iterations: usize,
    /// Euclidean norm of the final residual
    pub residual_norm: f64,
    /// Residual norm after each assembly
    pub residual_history: Vec<f64>,
}

/// Newton's method for the discrete system defined by a [Space] and a [WeakForm]
///
/// Convergence is only declared once at least one update has been applied, so a coincidentally small initial residual is never trusted.
#[derive(Clone, Copy, Debug)]
pub struct NewtonSolver {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for NewtonSolver {
    fn default() -> Self {
        Self::from(&NewtonConfig::default())
    }
}

impl From<&NewtonConfig> for NewtonSolver {
    fn from(config: &NewtonConfig) -> Self {
        Self {
            tolerance: config.tolerance,
            max_iterations: config.max_iterations,
        }
    }
}

impl NewtonSolver {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }

    /// Iterate until the residual norm drops below the tolerance
    ///
    /// The Space's Elems hold the final iterate on return (also on failure, they hold the last update).
    /// The dof numbering of the Space is not modified.
    ///
    /// # Returns
    /// * [FemError::Assembly] if a form fails
    /// * [FemError::SolverFailure] if the linear solver fails
    /// * [FemError::Divergence] if the residual is not finite, or is above the tolerance after `max_iterations` updates
    pub fn solve(
        &self,
        space: &mut Space,
        wf: &WeakForm,
        linear_solver: &mut dyn LinearSolver,
    ) -> Result<NewtonReport, FemError> {
        // validate before touching the Space
        DiscreteProblem::new(space, wf)?;

        if space.get_num_dofs() == 0 {
            debug!("no free degrees of freedom; nothing to solve");
            return Ok(NewtonReport {
                iterations: 0,
                residual_norm: 0.0,
                residual_history: Vec::new(),
            });
        }

        let mut coeffs: Vec<f64> = Vec::new();
        let mut completed = 0;
        let mut residual_history = Vec::new();
        let mut state = NewtonState::Initializing;

        loop {
            state = match state {
                NewtonState::Initializing => {
                    coeffs = space.solution_to_vector();
                    NewtonState::Assembling
                }
                NewtonState::Assembling => match DiscreteProblem::new(space, wf)
                    .map_err(FemError::from)
                    .and_then(|dp| dp.assemble(&coeffs).map_err(FemError::from))
                {
                    Ok(system) => NewtonState::CheckConverged(system),
                    Err(err) => NewtonState::Failed(err),
                },
                NewtonState::CheckConverged(system) => {
                    let residual_norm = system.residual_norm();
                    residual_history.push(residual_norm);
                    debug!(
                        "newton iteration {}: residual norm = {:e}",
                        completed, residual_norm
                    );

                    if !residual_norm.is_finite() {
                        NewtonState::Failed(FemError::Divergence {
                            iterations: completed,
                            residual_norm,
                        })
                    } else if completed >= 1 && residual_norm.powi(2) < self.tolerance.powi(2) {
                        NewtonState::Converged(residual_norm)
                    } else if completed >= self.max_iterations {
                        NewtonState::Failed(FemError::Divergence {
                            iterations: completed,
                            residual_norm,
                        })
                    } else {
                        NewtonState::LinearSolve(system)
                    }
                }
                NewtonState::LinearSolve(mut system) => {
                    system.residual.iter_mut().for_each(|r| *r = -*r);
                    match linear_solver.solve(&system.jacobian, &system.residual) {
                        Ok(correction) => NewtonState::Update(correction),
                        Err(err) => NewtonState::Failed(err.into()),
                    }
                }
                NewtonState::Update(correction) => {
                    coeffs
                        .iter_mut()
                        .zip(correction.iter())
                        .for_each(|(c, d)| *c += d);
                    space.vector_to_solution(&coeffs);
                    completed += 1;
                    NewtonState::Assembling
                }
                NewtonState::Converged(residual_norm) => {
                    info!(
                        "newton converged after {} iteration(s) (residual norm: {:e}, ndof: {})",
                        completed,
                        residual_norm,
                        space.get_num_dofs()
                    );
                    return Ok(NewtonReport {
                        iterations: completed,
                        residual_norm,
                        residual_history,
                    });
                }
                NewtonState::Failed(err) => return Err(err),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssemblyError;
    use crate::fem_problem::linalg::{
        nalgebra_solve::NalgebraLU, sparse_matrix::SparseMatrix, LinearSolveError,
    };

    fn poisson(source: f64) -> WeakForm {
        let mut wf = WeakForm::new(1);
        wf.add_matrix_form(0, 0, |data, u, v| data.integrate(|q| u.dx[q] * v.dx[q]));
        wf.add_vector_form(0, move |data, v| {
            data.integrate(|q| data.du_prev(0)[q] * v.dx[q] - source * v.val[q])
        });
        wf
    }

    #[test]
    fn linear_problem_converges_in_one_update() {
        let mut space = Space::new(-1.0, 1.0, 2, 2, 1).unwrap();
        space.set_bc_left_dirichlet(0, 0.0).unwrap();
        space.set_bc_right_dirichlet(0, 0.0).unwrap();
        space.assign_dofs();

        let report = NewtonSolver::new(1e-10, 10)
            .solve(&mut space, &poisson(2.0), &mut NalgebraLU::default())
            .unwrap();

        assert_eq!(report.iterations, 1);
        assert_eq!(report.residual_history.len(), 2);
        assert!(report.residual_history[1] <= report.residual_history[0]);

        // exact: 1 - x^2
        for x in [-0.8, -0.1, 0.0, 0.5] {
            let (u, du) = space.eval(0, x).unwrap();
            assert!((u - (1.0 - x * x)).abs() < 1e-12);
            assert!((du + 2.0 * x).abs() < 1e-11);
        }
    }

    #[test]
    fn small_initial_residual_is_not_trusted() {
        // the zero initial guess is already the solution
        let mut space = Space::new(0.0, 1.0, 2, 1, 1).unwrap();
        space.set_bc_left_dirichlet(0, 0.0).unwrap();
        space.assign_dofs();

        let report = NewtonSolver::new(1e-8, 5)
            .solve(&mut space, &poisson(0.0), &mut NalgebraLU::default())
            .unwrap();
        assert_eq!(report.iterations, 1);
    }

    #[test]
    fn nonlinear_problem() {
        // -(u u')' = 0 with u(0) = 1, u(1) = 2  =>  u^2 = 1 + 3x
        let mut space = Space::new(0.0, 1.0, 4, 4, 1).unwrap();
        space.set_bc_left_dirichlet(0, 1.0).unwrap();
        space.set_bc_right_dirichlet(0, 2.0).unwrap();

        // start from the linear lift of the boundary values
        let mut lift = Space::new(0.0, 1.0, 1, 1, 1).unwrap();
        lift.set_bc_left_dirichlet(0, 1.0).unwrap();
        lift.set_bc_right_dirichlet(0, 2.0).unwrap();
        lift.assign_dofs();
        space.project_from(&lift).unwrap();

        let mut wf = WeakForm::new(1);
        wf.add_matrix_form(0, 0, |data, u, v| {
            data.integrate(|q| {
                (u.val[q] * data.du_prev(0)[q] + data.u_prev(0)[q] * u.dx[q]) * v.dx[q]
            })
        });
        wf.add_vector_form(0, |data, v| {
            data.integrate(|q| data.u_prev(0)[q] * data.du_prev(0)[q] * v.dx[q])
        });
        wf.set_extra_quad_points(4);

        let report = NewtonSolver::new(1e-10, 20)
            .solve(&mut space, &wf, &mut NalgebraLU::default())
            .unwrap();
        assert!(report.iterations > 1);

        let (u, _) = space.eval(0, 0.5).unwrap();
        assert!((u - 2.5_f64.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn divergence_after_max_iterations() {
        let mut space = Space::new(-1.0, 1.0, 2, 2, 1).unwrap();
        space.set_bc_left_dirichlet(0, 0.0).unwrap();
        space.set_bc_right_dirichlet(0, 0.0).unwrap();
        space.assign_dofs();

        // an inconsistent Jacobian stalls the iteration
        let mut wf = WeakForm::new(1);
        wf.add_matrix_form(0, 0, |data, u, v| 1e3 * data.integrate(|q| u.dx[q] * v.dx[q]));
        wf.add_vector_form(0, |data, v| {
            data.integrate(|q| data.du_prev(0)[q] * v.dx[q] - 2.0 * v.val[q])
        });

        let err = NewtonSolver::new(1e-12, 3)
            .solve(&mut space, &wf, &mut NalgebraLU::default())
            .unwrap_err();
        assert!(matches!(err, FemError::Divergence { iterations: 3, .. }));
    }

    struct FailingSolver;

    impl LinearSolver for FailingSolver {
        fn solve(&mut self, _: &SparseMatrix, _: &[f64]) -> Result<Vec<f64>, LinearSolveError> {
            Err(LinearSolveError::Singular)
        }
    }

    #[test]
    fn solver_failure_is_fatal() {
        let mut space = Space::new(0.0, 1.0, 2, 1, 1).unwrap();
        space.assign_dofs();

        let err = NewtonSolver::default()
            .solve(&mut space, &poisson(1.0), &mut FailingSolver)
            .unwrap_err();
        assert!(matches!(
            err,
            FemError::SolverFailure(LinearSolveError::Singular)
        ));
    }

    #[test]
    fn non_finite_integrand_is_fatal() {
        let mut space = Space::new(0.0, 1.0, 2, 2, 1).unwrap();
        space.set_bc_left_dirichlet(0, 0.0).unwrap();
        space.assign_dofs();

        let mut wf = poisson(1.0);
        wf.add_vector_form(0, |_, _| f64::INFINITY);

        let err = NewtonSolver::default()
            .solve(&mut space, &wf, &mut NalgebraLU::default())
            .unwrap_err();
        assert!(matches!(
            err,
            FemError::Assembly(AssemblyError::NonFiniteIntegrand { form: "vector", .. })
        ));
    }

    #[test]
    fn overflowing_residual_diverges() {
        let mut space = Space::new(0.0, 1.0, 2, 1, 1).unwrap();
        space.assign_dofs();

        // every entry is finite, but the residual norm overflows
        let mut wf = WeakForm::new(1);
        wf.add_matrix_form(0, 0, |data, u, v| data.integrate(|q| u.dx[q] * v.dx[q]));
        wf.add_vector_form(0, |_, _| f64::MAX);

        let err = NewtonSolver::default()
            .solve(&mut space, &wf, &mut NalgebraLU::default())
            .unwrap_err();
        match err {
            FemError::Divergence {
                iterations,
                residual_norm,
            } => {
                assert_eq!(iterations, 0);
                assert!(!residual_norm.is_finite());
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
