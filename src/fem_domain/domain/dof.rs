use std::fmt;

/// One of the two end-points of the domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Left,
    Right,
}

impl Boundary {
    pub fn index(&self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}

/// Boundary Condition imposed on one equation at one end-point of the domain
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryCondition {
    /// The solution takes a fixed value. The associated vertex coefficient is excluded from the free unknowns.
    Dirichlet(f64),
    /// No constraint on the solution. Boundary fluxes enter through surface forms.
    Natural,
}

impl Default for BoundaryCondition {
    fn default() -> Self {
        Self::Natural
    }
}

impl fmt::Display for BoundaryCondition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Dirichlet(value) => write!(f, "Dirichlet({})", value),
            Self::Natural => write!(f, "Natural"),
        }
    }
}

/// Hands out consecutive global dof indices
pub(crate) struct DofTracker {
    next: usize,
}

impl DofTracker {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn next_id(&mut self) -> usize {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn count(&self) -> usize {
        self.next
    }
}
