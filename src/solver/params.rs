use serde::Deserialize;

use crate::interp::Kernel;

/// Time integration scheme for the backward characteristic trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntegrationScheme {
    #[default]
    Euler,
    Verlet,
    RungeKutta2,
    RungeKutta4,
}

impl std::str::FromStr for IntegrationScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "euler" => Ok(IntegrationScheme::Euler),
            "verlet" => Ok(IntegrationScheme::Verlet),
            "runge-kutta2" | "rk2" => Ok(IntegrationScheme::RungeKutta2),
            "runge-kutta4" | "rk4" => Ok(IntegrationScheme::RungeKutta4),
            other => Err(format!(
                "unknown integration scheme '{other}' (expected euler | verlet | runge-kutta2 | runge-kutta4)"
            )),
        }
    }
}

/// Pressure solver selector. Only conjugate gradient is implemented; the
/// other selectors are accepted as configuration and fall back to CG with a
/// warning. The historical `ocl_*` GPU variants are rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureSolverKind {
    #[default]
    Cg,
    Pcg,
    Jacobi,
}

impl std::str::FromStr for PressureSolverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cg" => Ok(PressureSolverKind::Cg),
            "pcg" => Ok(PressureSolverKind::Pcg),
            "jacobi" => Ok(PressureSolverKind::Jacobi),
            "ocl_cg" | "ocl_jacobi" => {
                Err(format!("solver '{s}' requires GPU support, which is not built in"))
            }
            other => Err(format!(
                "unknown pressure solver '{other}' (expected cg | pcg | jacobi)"
            )),
        }
    }
}

/// Solver parameters for one simulation run.
#[derive(Debug, Clone)]
pub struct SolverParams {
    /// Relative residual threshold for the pressure solve.
    pub tolerance: f64,
    /// Iteration cap for the pressure solve. Exhausting it is not an error;
    /// the step proceeds with the best available pressure.
    pub max_iterations: usize,
    /// Time step handed to `step` by the runner.
    pub dt: f64,
    pub integration: IntegrationScheme,
    pub interpolation: Kernel,
    pub pressure_solver: PressureSolverKind,
    /// Gravitational acceleration along Y. Negative pulls down.
    pub gravity: f64,
    /// Smoke buoyancy: dv = dt * (-alpha * rho + beta * (T - T_ambient)).
    pub buoyancy_alpha: f64,
    pub buoyancy_beta: f64,
    pub ambient_temperature: f64,
    /// Vorticity confinement strength; 0 disables the pass.
    pub confinement: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            tolerance: f64::EPSILON.sqrt(),
            max_iterations: 100,
            dt: 0.1,
            integration: IntegrationScheme::Euler,
            interpolation: Kernel::Lerp,
            pressure_solver: PressureSolverKind::Cg,
            gravity: -9.81,
            buoyancy_alpha: 0.08,
            buoyancy_beta: 0.97,
            ambient_temperature: 0.0,
            confinement: 0.0,
        }
    }
}

impl SolverParams {
    /// Parameters with every external force switched off. Useful for tests
    /// that need a quiescent field to stay quiescent.
    pub fn force_free() -> Self {
        Self {
            gravity: 0.0,
            buoyancy_alpha: 0.0,
            buoyancy_beta: 0.0,
            confinement: 0.0,
            ..Self::default()
        }
    }
}
