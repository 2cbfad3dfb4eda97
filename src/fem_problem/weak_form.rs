use crate::fem_domain::domain::dof::Boundary;

/// A Shape Function sampled at an Elem's quadrature points: values and `x`-derivatives
#[derive(Clone, Debug)]
pub struct FnSample {
    pub val: Vec<f64>,
    pub dx: Vec<f64>,
}

/// A Shape Function sampled at one end-point of the domain
#[derive(Clone, Copy, Debug, Default)]
pub struct PointSample {
    pub val: f64,
    pub dx: f64,
}

/// Integration data for one active Elem, handed to volumetric forms
///
/// Holds the quadrature points (in real coordinates), the weights (scaled by the Jacobian)
/// and the previous Newton iterate of every equation sampled at those points.
#[derive(Clone, Debug)]
pub struct ElemData {
    pub elem_id: usize,
    /// Bounds of the Elem
    pub bounds: [f64; 2],
    /// Quadrature points in real coordinates
    pub x: Vec<f64>,
    /// Quadrature weights (such that `sum_q w[q] f(x[q])` approximates the integral over the Elem)
    pub weights: Vec<f64>,
    prev: Vec<FnSample>,
}

impl ElemData {
    pub(crate) fn new(
        elem_id: usize,
        bounds: [f64; 2],
        x: Vec<f64>,
        weights: Vec<f64>,
        prev: Vec<FnSample>,
    ) -> Self {
        Self {
            elem_id,
            bounds,
            x,
            weights,
            prev,
        }
    }

    pub fn num_points(&self) -> usize {
        self.weights.len()
    }

    /// Integrate a function sampled at the quadrature points over the Elem
    pub fn integrate<F>(&self, integrand: F) -> f64
    where
        F: Fn(usize) -> f64,
    {
        self.weights
            .iter()
            .enumerate()
            .map(|(q, w)| integrand(q) * w)
            .sum()
    }

    /// Previous iterate of equation `eq` at the quadrature points
    pub fn u_prev(&self, eq: usize) -> &[f64] {
        &self.prev[eq].val
    }

    /// `x`-derivative of the previous iterate of equation `eq` at the quadrature points
    pub fn du_prev(&self, eq: usize) -> &[f64] {
        &self.prev[eq].dx
    }
}

/// Data for one end-point of the domain, handed to surface forms
#[derive(Clone, Debug)]
pub struct PointData {
    pub elem_id: usize,
    pub boundary: Boundary,
    pub x: f64,
    prev: Vec<PointSample>,
}

impl PointData {
    pub(crate) fn new(elem_id: usize, boundary: Boundary, x: f64, prev: Vec<PointSample>) -> Self {
        Self {
            elem_id,
            boundary,
            x,
            prev,
        }
    }

    pub fn u_prev(&self, eq: usize) -> f64 {
        self.prev[eq].val
    }

    pub fn du_prev(&self, eq: usize) -> f64 {
        self.prev[eq].dx
    }

    /// Outward unit normal: `-1` on the left end, `+1` on the right end
    pub fn normal(&self) -> f64 {
        match self.boundary {
            Boundary::Left => -1.0,
            Boundary::Right => 1.0,
        }
    }
}

/// Volumetric Jacobian contribution: `(data, u, v)` for trial function `u` and test function `v`
pub type MatrixFormFn = dyn Fn(&ElemData, &FnSample, &FnSample) -> f64 + Send + Sync;
/// Volumetric residual contribution: `(data, v)` for test function `v`
pub type VectorFormFn = dyn Fn(&ElemData, &FnSample) -> f64 + Send + Sync;
/// Jacobian contribution at an end-point of the domain
pub type SurfMatrixFormFn = dyn Fn(&PointData, &PointSample, &PointSample) -> f64 + Send + Sync;
/// Residual contribution at an end-point of the domain
pub type SurfVectorFormFn = dyn Fn(&PointData, &PointSample) -> f64 + Send + Sync;

/// One term of a [WeakForm]
///
/// Matrix forms `(i, j)` are the derivative of residual `i` with respect to the solution of equation `j`.
pub enum Form {
    Matrix {
        i: usize,
        j: usize,
        f: Box<MatrixFormFn>,
    },
    Vector {
        i: usize,
        f: Box<VectorFormFn>,
    },
    SurfMatrix {
        i: usize,
        j: usize,
        boundary: Boundary,
        f: Box<SurfMatrixFormFn>,
    },
    SurfVector {
        i: usize,
        boundary: Boundary,
        f: Box<SurfVectorFormFn>,
    },
}

impl Form {
    /// Name used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Matrix { .. } => "matrix",
            Self::Vector { .. } => "vector",
            Self::SurfMatrix { .. } => "surface matrix",
            Self::SurfVector { .. } => "surface vector",
        }
    }
}

impl std::fmt::Debug for Form {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Matrix { i, j, .. } => write!(f, "Matrix({}, {})", i, j),
            Self::Vector { i, .. } => write!(f, "Vector({})", i),
            Self::SurfMatrix { i, j, boundary, .. } => {
                write!(f, "SurfMatrix({}, {}, {})", i, j, boundary)
            }
            Self::SurfVector { i, boundary, .. } => write!(f, "SurfVector({}, {})", i, boundary),
        }
    }
}

/// The variational formulation of a system of `neq` equations
///
/// The residual of equation `i` is the sum of its vector forms; the Jacobian block `(i, j)` is the sum of its matrix forms.
/// Forms are pure functions of their arguments, and may be called from multiple threads.
#[derive(Debug)]
pub struct WeakForm {
    neq: usize,
    extra_quad_points: usize,
    forms: Vec<Form>,
}

impl WeakForm {
    pub fn new(neq: usize) -> Self {
        Self {
            neq,
            extra_quad_points: 1,
            forms: Vec::new(),
        }
    }

    pub fn num_equations(&self) -> usize {
        self.neq
    }

    /// Number of quadrature points used beyond `p + 1` on an Elem of degree `p`
    ///
    /// Increase this for strongly nonlinear or non-polynomial integrands
    pub fn set_extra_quad_points(&mut self, n: usize) -> &mut Self {
        self.extra_quad_points = n;
        self
    }

    pub fn extra_quad_points(&self) -> usize {
        self.extra_quad_points
    }

    pub fn forms(&self) -> &[Form] {
        &self.forms
    }

    fn check_eq(&self, eq: usize) {
        assert!(
            eq < self.neq,
            "Equation index {} exceeds the number of equations ({}); cannot add form!",
            eq,
            self.neq
        );
    }

    pub fn add_matrix_form<F>(&mut self, i: usize, j: usize, f: F) -> &mut Self
    where
        F: Fn(&ElemData, &FnSample, &FnSample) -> f64 + Send + Sync + 'static,
    {
        self.check_eq(i);
        self.check_eq(j);
        self.forms.push(Form::Matrix { i, j, f: Box::new(f) });
        self
    }

    pub fn add_vector_form<F>(&mut self, i: usize, f: F) -> &mut Self
    where
        F: Fn(&ElemData, &FnSample) -> f64 + Send + Sync + 'static,
    {
        self.check_eq(i);
        self.forms.push(Form::Vector { i, f: Box::new(f) });
        self
    }

    pub fn add_matrix_form_surf<F>(&mut self, i: usize, j: usize, boundary: Boundary, f: F) -> &mut Self
    where
        F: Fn(&PointData, &PointSample, &PointSample) -> f64 + Send + Sync + 'static,
    {
        self.check_eq(i);
        self.check_eq(j);
        self.forms.push(Form::SurfMatrix {
            i,
            j,
            boundary,
            f: Box::new(f),
        });
        self
    }

    pub fn add_vector_form_surf<F>(&mut self, i: usize, boundary: Boundary, f: F) -> &mut Self
    where
        F: Fn(&PointData, &PointSample) -> f64 + Send + Sync + 'static,
    {
        self.check_eq(i);
        self.forms.push(Form::SurfVector {
            i,
            boundary,
            f: Box::new(f),
        });
        self
    }
}
