use thiserror::Error;

/// Location of a child Elem following an h-Refinement (from the parent Elem's perspective)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bisection {
    /// Lower half of the parent
    Left,
    /// Upper half of the parent
    Right,
}

impl Bisection {
    /// Both child locations in order
    pub const fn both() -> [Self; 2] {
        [Self::Left, Self::Right]
    }

    /// The portion of some parametric range covered by this child
    ///
    /// ```
    /// use fem_1d::fem_domain::domain::mesh::h_refinement::Bisection;
    ///
    /// assert_eq!(Bisection::Left.sub_range([-1.0, 1.0]), [-1.0, 0.0]);
    /// assert_eq!(Bisection::Right.sub_range([0.0, 1.0]), [0.5, 1.0]);
    /// ```
    pub fn sub_range(&self, [min, max]: [f64; 2]) -> [f64; 2] {
        let mid = (min + max) / 2.0;
        match self {
            Self::Left => [min, mid],
            Self::Right => [mid, max],
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HRefError {
    #[error("Elem {0} does not exist; Cannot apply h-Refinement!")]
    ElemDoesntExist(usize),
    #[error("Elem {0} already has children; Cannot apply h-Refinement!")]
    ElemHasChildren(usize),
    #[error("Multiple h-Refinements were specified for Elem {0}; Cannot apply h-Refinements!")]
    DoubleRefinement(usize),
    #[error("Children of Elem {0} would be shorter than the minimum Elem length; Cannot apply h-Refinement!")]
    MinLengthExceeded(usize),
}
