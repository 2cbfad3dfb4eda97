/// Hierarchic Shape Functions
pub mod basis;
/// The Finite Element Space: hierarchical Elements, Boundary Conditions and Degrees of Freedom
pub mod domain;
