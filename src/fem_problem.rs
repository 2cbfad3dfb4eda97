/// Gauss-Legendre quadrature
pub mod integration;

/// Sparse matrices, linear solver backends and PETSc export
pub mod linalg;

/// Registration of the forms which define a (nonlinear) variational problem
pub mod weak_form;

/// Assembly of Jacobian matrices and residual vectors over a `Space`
pub mod discrete_problem;

/// Newton's method
pub mod newton;

/// Reference-solution based error estimation
pub mod error_estimation;

/// h, p and hp refinement selection
pub mod adapt;

/// The adaptivity driver loop and its diagnostics
pub mod adapt_loop;
