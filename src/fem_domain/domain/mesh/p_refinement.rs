use super::MAX_POLYNOMIAL_ORDER;
use thiserror::Error;

/// Description of a p-Refinement: raise an Elem's polynomial degree by a fixed amount
///
/// The hierarchic basis only ever grows, so degrees are never lowered.
///
/// ```
/// use fem_1d::fem_domain::domain::mesh::p_refinement::PRef;
///
/// assert_eq!(PRef::raise(2).refine(3).unwrap(), 5);
/// assert_eq!(PRef::raise(0).refine(3).unwrap(), 3);
/// assert!(PRef::raise(1).refine(20).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PRef {
    dp: u8,
}

impl PRef {
    pub const fn raise(dp: u8) -> Self {
        Self { dp }
    }

    /// New degree after applying this refinement to `p_current`
    pub fn refine(&self, p_current: u8) -> Result<u8, PRefError> {
        match p_current.checked_add(self.dp) {
            Some(p) if p <= MAX_POLYNOMIAL_ORDER => Ok(p),
            _ => Err(PRefError::ExceededMaxExpansion),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PRefError {
    #[error("p-Refinement would raise the degree above {}; Cannot p-Refine!", MAX_POLYNOMIAL_ORDER)]
    ExceededMaxExpansion,
    #[error("Elem {0} does not exist; Cannot apply p-Refinement!")]
    ElemDoesntExist(usize),
    #[error("Elem {0} has children; Cannot apply p-Refinement!")]
    ElemHasChildren(usize),
    #[error("Multiple p-refinements were specified for Elem {0}; Cannot apply p-Refinements")]
    DoubleRefinement(usize),
}
