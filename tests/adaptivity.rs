use fem_1d::prelude::*;
use simplelog::{Config, LevelFilter, TestLogger};
use std::f64::consts::PI;

fn init_logging() {
    // repeated initialization (one per test) fails harmlessly
    let _ = TestLogger::init(LevelFilter::Info, Config::default());
}

fn poisson(source: f64) -> WeakForm {
    let mut wf = WeakForm::new(1);
    wf.add_matrix_form(0, 0, |data, u, v| data.integrate(|q| u.dx[q] * v.dx[q]));
    wf.add_vector_form(0, move |data, v| {
        data.integrate(|q| data.du_prev(0)[q] * v.dx[q] - source * v.val[q])
    });
    wf
}

#[test]
fn quadratic_solution_is_found_by_p_refinement() {
    init_logging();

    let mut space = Space::new(-1.0, 1.0, 2, 1, 1).unwrap();
    space.set_bc_left_dirichlet(0, 0.0).unwrap();
    space.set_bc_right_dirichlet(0, 0.0).unwrap();
    space.assign_dofs();

    let exact = |x: f64, _: usize| (1.0 - x * x, -2.0 * x);
    let summary = solve_adaptive_with_exact(
        &mut space,
        &poisson(2.0),
        &AdaptConfig::default(),
        &mut NalgebraLU::default(),
        &exact,
    )
    .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Converged);

    // first step: both Elems raised to degree 2, none split
    let adaptation = summary.steps[0].adaptation.as_ref().unwrap();
    assert_eq!(adaptation.num_raised(), 2);
    assert_eq!(adaptation.num_split(), 0);
    assert_eq!(space.get_n_active_elem(), 2);
    assert!(space.active_elems().all(|elem| elem.p == 2));

    let last = summary.last_step().unwrap();
    assert!(last.err_exact_rel.unwrap() < 1e-10);
    assert!(last.err_est_rel < 1e-10);

    let final_err = calc_err_exact(NormKind::H1, &space, &exact);
    assert!(final_err.abs_error < 1e-10);
}

#[test]
fn single_largest_error_with_unit_threshold() {
    init_logging();

    // the source is concentrated in the right-most Elem
    let mut space = Space::new(0.0, 1.0, 4, 1, 1).unwrap();
    space.set_bc_left_dirichlet(0, 0.0).unwrap();
    space.set_bc_right_dirichlet(0, 0.0).unwrap();
    space.assign_dofs();

    let mut wf = WeakForm::new(1);
    wf.add_matrix_form(0, 0, |data, u, v| data.integrate(|q| u.dx[q] * v.dx[q]));
    wf.add_vector_form(0, |data, v| {
        data.integrate(|q| {
            let f = if data.x[q] > 0.75 { 100.0 * data.x[q] } else { 0.0 };
            data.du_prev(0)[q] * v.dx[q] - f * v.val[q]
        })
    });
    wf.set_extra_quad_points(4);

    let mut solver = NalgebraLU::default();
    NewtonSolver::default().solve(&mut space, &wf, &mut solver).unwrap();

    let mut reference = space.construct_refined_space(AdaptType::Hp).unwrap();
    NewtonSolver::default().solve(&mut reference, &wf, &mut solver).unwrap();

    let estimate = calc_err_est(NormKind::H1, &space, &reference).unwrap();
    let worst = estimate
        .elems
        .iter()
        .max_by(|a, b| a.error.total_cmp(&b.error))
        .unwrap()
        .elem_id;

    let report = adapt(NormKind::H1, AdaptType::Hp, 1.0, &estimate, &mut space, &reference).unwrap();
    assert_eq!(report.refinements.len(), 1);
    assert_eq!(report.refinements[0].0, worst);
}

#[test]
fn nonlinear_reaction_diffusion() {
    init_logging();

    // -u'' + u^3 = f over (0, 1), u(0) = u(1) = 0, with u = sin(pi x)
    let mut space = Space::new(0.0, 1.0, 2, 1, 1).unwrap();
    space.set_bc_left_dirichlet(0, 0.0).unwrap();
    space.set_bc_right_dirichlet(0, 0.0).unwrap();
    space.assign_dofs();

    let source = |x: f64| PI * PI * (PI * x).sin() + (PI * x).sin().powi(3);

    let mut wf = WeakForm::new(1);
    wf.add_matrix_form(0, 0, |data, u, v| {
        data.integrate(|q| u.dx[q] * v.dx[q] + 3.0 * data.u_prev(0)[q].powi(2) * u.val[q] * v.val[q])
    });
    wf.add_vector_form(0, move |data, v| {
        data.integrate(|q| {
            data.du_prev(0)[q] * v.dx[q]
                + (data.u_prev(0)[q].powi(3) - source(data.x[q])) * v.val[q]
        })
    });
    wf.set_extra_quad_points(6);

    let config = AdaptConfig {
        newton_coarse: NewtonConfig {
            tolerance: 1e-10,
            max_iterations: 50,
        },
        newton_ref: NewtonConfig {
            tolerance: 1e-10,
            max_iterations: 50,
        },
        tol_err_rel: 1e-4,
        ..Default::default()
    };

    let exact = |x: f64, _: usize| ((PI * x).sin(), PI * (PI * x).cos());
    let summary = solve_adaptive_with_exact(
        &mut space,
        &wf,
        &config,
        &mut NalgebraLU::default(),
        &exact,
    )
    .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Converged);
    assert!(summary.steps.len() > 1);
    assert!(summary.last_step().unwrap().err_exact_rel.unwrap() < 1e-3);

    // the estimate decreases while refining
    let first = summary.steps[0].err_est_rel;
    let last = summary.last_step().unwrap().err_est_rel;
    assert!(last < first);

    let (u_mid, _) = space.eval(0, 0.5).unwrap();
    assert!((u_mid - 1.0).abs() < 1e-3);
}

#[test]
fn natural_boundary_condition() {
    init_logging();

    // -u'' = 0, u(0) = 0, u'(1) = 1  =>  u = x
    let mut space = Space::new(0.0, 1.0, 3, 1, 1).unwrap();
    space.set_bc_left_dirichlet(0, 0.0).unwrap();
    space.assign_dofs();

    let mut wf = poisson(0.0);
    wf.add_vector_form_surf(0, Boundary::Right, |_, v| -v.val);

    let summary = solve_adaptive(
        &mut space,
        &wf,
        &AdaptConfig::default(),
        &mut NalgebraLU::default(),
    )
    .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Converged);
    assert_eq!(summary.steps.len(), 1);

    let (u, du) = space.eval(0, 1.0).unwrap();
    assert!((u - 1.0).abs() < 1e-12);
    assert!((du - 1.0).abs() < 1e-12);
}

#[test]
fn coupled_system() {
    init_logging();

    // -u0'' = 2 with u0(-1) = u0(1) = 0, and u1 = u0 (natural boundaries)
    let mut space = Space::new(-1.0, 1.0, 2, 1, 2).unwrap();
    space.set_bc_left_dirichlet(0, 0.0).unwrap();
    space.set_bc_right_dirichlet(0, 0.0).unwrap();
    space.assign_dofs();

    let mut wf = poisson_system();
    wf.set_extra_quad_points(2);

    let exact = |x: f64, _: usize| (1.0 - x * x, -2.0 * x);
    let summary = solve_adaptive_with_exact(
        &mut space,
        &wf,
        &AdaptConfig::default(),
        &mut NalgebraLU::default(),
        &exact,
    )
    .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Converged);
    assert!(summary.last_step().unwrap().err_exact_rel.unwrap() < 1e-8);

    for x in [-0.7, 0.2, 0.9] {
        let (u0, _) = space.eval(0, x).unwrap();
        let (u1, _) = space.eval(1, x).unwrap();
        assert!((u0 - u1).abs() < 1e-8);
    }
}

fn poisson_system() -> WeakForm {
    let mut wf = WeakForm::new(2);
    wf.add_matrix_form(0, 0, |data, u, v| data.integrate(|q| u.dx[q] * v.dx[q]));
    wf.add_vector_form(0, |data, v| {
        data.integrate(|q| data.du_prev(0)[q] * v.dx[q] - 2.0 * v.val[q])
    });
    wf.add_matrix_form(1, 1, |data, u, v| data.integrate(|q| u.val[q] * v.val[q]));
    wf.add_matrix_form(1, 0, |data, u, v| -data.integrate(|q| u.val[q] * v.val[q]));
    wf.add_vector_form(1, |data, v| {
        data.integrate(|q| (data.u_prev(1)[q] - data.u_prev(0)[q]) * v.val[q])
    });
    wf
}

#[test]
fn assembly_failure_stops_the_loop() {
    init_logging();

    let mut space = Space::new(-1.0, 1.0, 2, 1, 1).unwrap();
    space.set_bc_left_dirichlet(0, 0.0).unwrap();
    space.set_bc_right_dirichlet(0, 0.0).unwrap();

    let mut wf = poisson(2.0);
    wf.add_vector_form(0, |_, _| f64::NAN);

    let result = solve_adaptive(
        &mut space,
        &wf,
        &AdaptConfig::default(),
        &mut NalgebraLU::default(),
    );
    assert!(matches!(
        result,
        Err(FemError::Assembly(AssemblyError::NonFiniteIntegrand { .. }))
    ));
}

#[test]
fn mismatched_weak_form_is_rejected() {
    init_logging();

    let mut space = Space::new(0.0, 1.0, 2, 1, 1).unwrap();
    space.assign_dofs();

    let wf = WeakForm::new(2);
    let result = solve_adaptive(
        &mut space,
        &wf,
        &AdaptConfig::default(),
        &mut NalgebraLU::default(),
    );
    assert!(matches!(
        result,
        Err(FemError::Configuration(ConfigurationError::InvalidEquationCount(2, 1)))
    ));
}

#[cfg(feature = "json_export")]
#[test]
fn export_results() {
    init_logging();

    let mut space = Space::new(-1.0, 1.0, 2, 1, 1).unwrap();
    space.set_bc_left_dirichlet(0, 0.0).unwrap();
    space.set_bc_right_dirichlet(0, 0.0).unwrap();
    space.assign_dofs();

    let summary = solve_adaptive(
        &mut space,
        &poisson(2.0),
        &AdaptConfig::default(),
        &mut NalgebraLU::default(),
    )
    .unwrap();

    let dir = std::env::temp_dir();
    let space_path = dir.join("fem_1d_space.json");
    let summary_path = dir.join("fem_1d_summary.json");

    space.export_to_json(space_path.to_string_lossy()).unwrap();
    summary.export_to_json(summary_path.to_string_lossy()).unwrap();
    summary.write_graphs(dir.to_string_lossy()).unwrap();

    let space_json = json::parse(&std::fs::read_to_string(&space_path).unwrap()).unwrap();
    assert_eq!(space_json["active_elems"].members().count(), 2);

    let summary_json = json::parse(&std::fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(summary_json["stop_reason"], "Converged");
    assert_eq!(summary_json["steps"].members().count(), summary.steps.len());

    let samples = space.sample_solution(0, 5);
    assert_eq!(samples.len(), 10);
    assert!(samples.u.iter().all(|u| (-1e-12..=1.0 + 1e-12).contains(u)));
}
