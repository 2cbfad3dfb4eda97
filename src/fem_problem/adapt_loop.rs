use super::{
    adapt::{adapt, AdaptReport},
    discrete_problem::DiscreteProblem,
    error_estimation::{calc_err_est, calc_err_exact},
    linalg::LinearSolver,
    newton::NewtonSolver,
    weak_form::WeakForm,
};
use crate::config::AdaptConfig;
use crate::error::FemError;
use crate::fem_domain::domain::Space;

#[cfg(feature = "json_export")]
use json::{array, object, JsonValue};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Instant;

type ExactSolution<'a> = &'a (dyn Fn(f64, usize) -> (f64, f64) + Sync);

/// Why the adaptivity loop stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The relative error estimate dropped below the tolerance
    Converged,
    /// The maximum number of adaptivity steps was reached first
    MaxStepsReached,
}

/// Diagnostics of one adaptivity step
#[derive(Clone, Debug, PartialEq)]
pub struct StepRecord {
    pub step: usize,
    pub num_active_elems: usize,
    pub ndof_coarse: usize,
    pub ndof_ref: usize,
    /// Relative error estimate (a fraction)
    pub err_est_rel: f64,
    /// Relative error against the exact solution (if one was supplied)
    pub err_exact_rel: Option<f64>,
    pub newton_iterations_coarse: usize,
    pub newton_iterations_ref: usize,
    /// Seconds since the start of the loop
    pub cpu_time: f64,
    /// Refinements applied at the end of this step (`None` on the last step)
    pub adaptation: Option<AdaptReport>,
}

/// A sequence of `(x, y)` points, such as "number of dofs vs. error"
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConvergenceGraph {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

impl ConvergenceGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
        }
    }

    pub fn add_value(&mut self, x: f64, y: f64) {
        self.points.push((x, y));
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Write the points as whitespace separated columns (one point per line)
    pub fn write_dat(&self, path: impl AsRef<str>) -> std::io::Result<()> {
        let f = File::create(path.as_ref())?;
        let mut w = BufWriter::new(&f);
        for (x, y) in self.points.iter() {
            writeln!(w, "{} {:e}", x, y)?;
        }
        w.flush()
    }

    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "name": self.name.clone(),
            "points": JsonValue::from(
                self.points.iter().map(|(x, y)| array![*x, *y]).collect::<Vec<_>>()
            ),
        }
    }
}

/// Result of [solve_adaptive]
#[derive(Clone, Debug, PartialEq)]
pub struct AdaptSummary {
    pub stop_reason: StopReason,
    pub steps: Vec<StepRecord>,
    /// Number of coarse dofs vs. relative error estimate
    pub graph_dof_est: ConvergenceGraph,
    /// CPU time vs. relative error estimate
    pub graph_cpu_est: ConvergenceGraph,
    /// Number of coarse dofs vs. exact relative error (empty without an exact solution)
    pub graph_dof_exact: ConvergenceGraph,
    /// CPU time vs. exact relative error (empty without an exact solution)
    pub graph_cpu_exact: ConvergenceGraph,
}

impl AdaptSummary {
    fn new() -> Self {
        Self {
            stop_reason: StopReason::MaxStepsReached,
            steps: Vec::new(),
            graph_dof_est: ConvergenceGraph::new("conv_dof_est"),
            graph_cpu_est: ConvergenceGraph::new("conv_cpu_est"),
            graph_dof_exact: ConvergenceGraph::new("conv_dof_exact"),
            graph_cpu_exact: ConvergenceGraph::new("conv_cpu_exact"),
        }
    }

    pub fn last_step(&self) -> Option<&StepRecord> {
        self.steps.last()
    }

    fn graphs(&self) -> [&ConvergenceGraph; 4] {
        [
            &self.graph_dof_est,
            &self.graph_cpu_est,
            &self.graph_dof_exact,
            &self.graph_cpu_exact,
        ]
    }

    /// Write every non-empty graph to `{dir}/{name}.dat`
    pub fn write_graphs(&self, dir: impl AsRef<str>) -> std::io::Result<()> {
        for graph in self.graphs() {
            if !graph.is_empty() {
                graph.write_dat(format!("{}/{}.dat", dir.as_ref(), graph.name))?;
            }
        }
        Ok(())
    }

    /// Print the step records and graphs to a JSON file specified by path.
    #[cfg(feature = "json_export")]
    pub fn export_to_json(&self, path: impl AsRef<str>) -> std::io::Result<()> {
        let f = File::create(path.as_ref())?;
        let mut w = BufWriter::new(&f);

        let summary_object = object! {
            "stop_reason": format!("{:?}", self.stop_reason),
            "steps": JsonValue::from(self.steps.iter().map(|step| object! {
                "step": step.step,
                "num_active_elems": step.num_active_elems,
                "ndof_coarse": step.ndof_coarse,
                "ndof_ref": step.ndof_ref,
                "err_est_rel": step.err_est_rel,
                "err_exact_rel": step.err_exact_rel,
                "newton_iterations_coarse": step.newton_iterations_coarse,
                "newton_iterations_ref": step.newton_iterations_ref,
                "cpu_time": step.cpu_time,
            }).collect::<Vec<_>>()),
            "graphs": JsonValue::from(self.graphs().iter().map(|graph| graph.to_json()).collect::<Vec<_>>()),
        };

        summary_object.write_pretty(&mut w, 4)?;

        Ok(())
    }
}

/// Solve a (nonlinear) problem with automatic hp-adaptivity
///
/// 1. The problem is solved on the coarse `space` with Newton's method
/// 2. Each step then:
///     * constructs a uniformly refined reference Space and solves the problem on it
///     * re-solves the coarse problem (from the second step onward)
///     * estimates the error of the coarse solution against the reference solution
///     * stops if the relative error estimate is below `config.tol_err_rel`, or if `config.max_steps` was reached
///     * otherwise refines the coarse Space where the error is largest (see [adapt])
///
/// On return, `space` holds the final coarse Mesh and solution.
pub fn solve_adaptive(
    space: &mut Space,
    wf: &WeakForm,
    config: &AdaptConfig,
    linear_solver: &mut dyn LinearSolver,
) -> Result<AdaptSummary, FemError> {
    run_adaptivity(space, wf, config, linear_solver, None)
}

/// [solve_adaptive] which also records the error against an exact solution `exact(x, eq) -> (u, du/dx)` at every step
///
/// The exact error is a diagnostic only; it never influences refinement decisions.
pub fn solve_adaptive_with_exact<F>(
    space: &mut Space,
    wf: &WeakForm,
    config: &AdaptConfig,
    linear_solver: &mut dyn LinearSolver,
    exact: &F,
) -> Result<AdaptSummary, FemError>
where
    F: Fn(f64, usize) -> (f64, f64) + Sync,
{
    run_adaptivity(space, wf, config, linear_solver, Some(exact))
}

fn run_adaptivity(
    space: &mut Space,
    wf: &WeakForm,
    config: &AdaptConfig,
    linear_solver: &mut dyn LinearSolver,
    exact: Option<ExactSolution>,
) -> Result<AdaptSummary, FemError> {
    config.validate()?;
    DiscreteProblem::new(space, wf)?;

    let newton_coarse = NewtonSolver::from(&config.newton_coarse);
    let newton_ref = NewtonSolver::from(&config.newton_ref);
    let start = Instant::now();
    let mut summary = AdaptSummary::new();

    let ndof = space.assign_dofs();
    info!("solving coarse problem ({} dofs)", ndof);
    let mut coarse_report = newton_coarse.solve(space, wf, linear_solver)?;

    let mut step = 1;
    loop {
        info!("---- adaptivity step {} ----", step);

        let mut ref_space = space.construct_refined_space(config.adapt_type)?;
        info!("solving reference problem ({} dofs)", ref_space.get_num_dofs());
        let ref_report = newton_ref.solve(&mut ref_space, wf, linear_solver)?;

        if step > 1 {
            info!("solving coarse problem ({} dofs)", space.get_num_dofs());
            coarse_report = newton_coarse.solve(space, wf, linear_solver)?;
        }

        let estimate = calc_err_est(config.norm, space, &ref_space)?;
        let err_est_rel = estimate.rel_error();
        let err_exact_rel = exact.map(|f| calc_err_exact(config.norm, space, f).rel_error());
        let cpu_time = start.elapsed().as_secs_f64();
        let ndof_coarse = space.get_num_dofs();

        info!(
            "ndof_coarse: {}, ndof_ref: {}, err_est_rel: {:e}",
            ndof_coarse,
            ref_space.get_num_dofs(),
            err_est_rel
        );
        summary.graph_dof_est.add_value(ndof_coarse as f64, err_est_rel);
        summary.graph_cpu_est.add_value(cpu_time, err_est_rel);
        if let Some(err_exact) = err_exact_rel {
            info!("err_exact_rel: {:e}", err_exact);
            summary.graph_dof_exact.add_value(ndof_coarse as f64, err_exact);
            summary.graph_cpu_exact.add_value(cpu_time, err_exact);
        }

        let mut record = StepRecord {
            step,
            num_active_elems: space.get_n_active_elem(),
            ndof_coarse,
            ndof_ref: ref_space.get_num_dofs(),
            err_est_rel,
            err_exact_rel,
            newton_iterations_coarse: coarse_report.iterations,
            newton_iterations_ref: ref_report.iterations,
            cpu_time,
            adaptation: None,
        };

        if err_est_rel < config.tol_err_rel {
            summary.stop_reason = StopReason::Converged;
            summary.steps.push(record);
            break;
        }
        if step >= config.max_steps {
            summary.stop_reason = StopReason::MaxStepsReached;
            summary.steps.push(record);
            break;
        }

        record.adaptation = Some(adapt(
            config.norm,
            config.adapt_type,
            config.threshold,
            &estimate,
            space,
            &ref_space,
        )?);
        summary.steps.push(record);

        step += 1;
    }

    info!(
        "adaptivity finished after {} step(s): {:?} (ndof: {}, err_est_rel: {:e})",
        summary.steps.len(),
        summary.stop_reason,
        space.get_num_dofs(),
        summary.last_step().map_or(f64::NAN, |s| s.err_est_rel)
    );

    Ok(summary)
}
