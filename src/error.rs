use crate::fem_domain::domain::mesh::{h_refinement::HRefError, p_refinement::PRefError};
use crate::fem_problem::linalg::LinearSolveError;
use thiserror::Error;

/// Result type used throughout the solve/adapt loop
pub type Result<T> = std::result::Result<T, FemError>;

/// Top level Error type. Every variant is fatal to the current run.
#[derive(Error, Debug)]
pub enum FemError {
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Linear solver failed: {0}")]
    SolverFailure(#[from] LinearSolveError),

    #[error("Newton's method did not converge after {iterations} iterations (residual norm: {residual_norm:e})")]
    Divergence { iterations: usize, residual_norm: f64 },

    #[error("h-Refinement failed: {0}")]
    HRefinement(#[from] HRefError),

    #[error("p-Refinement failed: {0}")]
    PRefinement(#[from] PRefError),

    #[error("Reference Space has no more degrees of freedom than the coarse Space ({0}); no Elem can be refined further")]
    ReferenceNotRefined(usize),
}

/// Problems with the setup of a `Space`, `WeakForm` or adaptivity settings. Detected before any solve.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Domain [{0}, {1}] is empty or not finite")]
    InvalidDomain(f64, f64),

    #[error("At least one Element is required")]
    NoElements,

    #[error("Polynomial degree {0} is outside of [1, {1}]")]
    InvalidDegree(u8, u8),

    #[error("Number of equations {0} is outside of [1, {1}]")]
    InvalidEquationCount(usize, usize),

    #[error("Equation index {0} exceeds the number of equations ({1})")]
    EquationOutOfRange(usize, usize),

    #[error("Dirichlet value for equation {0} is not finite")]
    NonFiniteDirichletValue(usize),

    #[error("Setting '{0}' has an invalid value ({1})")]
    InvalidSetting(&'static str, String),

    #[error("Reference Space does not cover the coarse Space")]
    MismatchedSpaces,

    #[error("Unable to parse configuration: {0}")]
    Parse(String),

    #[error("Unable to read configuration file: {0}")]
    Io(String),
}

/// Failures during the assembly of a Jacobian matrix and residual vector
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssemblyError {
    #[error("{form} form ({eq_i}, {eq_j}) produced a non-finite value on Elem {elem_id}")]
    NonFiniteIntegrand {
        form: &'static str,
        elem_id: usize,
        eq_i: usize,
        eq_j: usize,
    },

    #[error("Coefficient vector has length {0}, but the Space has {1} degrees of freedom")]
    CoefficientLengthMismatch(usize, usize),

    #[error("Space has no degrees of freedom")]
    EmptyDofSet,
}
