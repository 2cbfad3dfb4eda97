//! # fem_1d
//!
//! hp-adaptive Finite Element solver for (systems of) nonlinear boundary value problems over an interval.
//!
//! The crate is split into two halves:
//! * [fem_domain]: the hierarchical element arena, Lobatto shape functions and the [Space](fem_domain::domain::Space) of degrees of freedom
//! * [fem_problem]: Weak Forms, assembly, Newton's method, error estimation and the hp-adaptivity engine
//!
//! ```
//! use fem_1d::prelude::*;
//!
//! // -u'' = 2 over (-1, 1) with u(-1) = u(1) = 0
//! let mut space = Space::new(-1.0, 1.0, 2, 1, 1).unwrap();
//! space.set_bc_left_dirichlet(0, 0.0).unwrap();
//! space.set_bc_right_dirichlet(0, 0.0).unwrap();
//! space.assign_dofs();
//!
//! let mut wf = WeakForm::new(1);
//! wf.add_matrix_form(0, 0, |data, u, v| data.integrate(|q| u.dx[q] * v.dx[q]));
//! wf.add_vector_form(0, |data, v| {
//!     data.integrate(|q| data.du_prev(0)[q] * v.dx[q] - 2.0 * v.val[q])
//! });
//!
//! let mut solver = NalgebraLU::default();
//! let summary = solve_adaptive(&mut space, &wf, &AdaptConfig::default(), &mut solver).unwrap();
//! assert_eq!(summary.stop_reason, StopReason::Converged);
//! ```

/// Settings for Newton's method, the adaptivity loop and problem setup
pub mod config;
/// Error types shared across the crate
pub mod error;
/// Structures to describe the discretization of the computational domain
pub mod fem_domain;
/// Structures and functions to assemble and solve problems over a [Space](fem_domain::domain::Space)
pub mod fem_problem;

/// Commonly used items
pub mod prelude {
    pub use crate::config::{AdaptConfig, NewtonConfig, ProblemConfig};
    pub use crate::error::{AssemblyError, ConfigurationError, FemError};
    pub use crate::fem_domain::domain::{
        dof::{Boundary, BoundaryCondition},
        Space,
    };
    pub use crate::fem_problem::{
        adapt::{adapt, AdaptType},
        adapt_loop::{solve_adaptive, solve_adaptive_with_exact, AdaptSummary, StopReason},
        discrete_problem::DiscreteProblem,
        error_estimation::{calc_err_est, calc_err_exact, NormKind},
        linalg::{nalgebra_solve::NalgebraLU, LinearSolver},
        newton::NewtonSolver,
        weak_form::{ElemData, FnSample, PointData, PointSample, WeakForm},
    };
}
