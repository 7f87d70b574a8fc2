mod config;
mod grid;
mod interp;
mod io;
mod runner;
mod solver;

use std::path::PathBuf;
use std::process::ExitCode;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use config::Config;
use grid::Grid;
use interp::Kernel;
use io::png::PngExporter;
use io::scene::SceneImporter;
use io::Importer;
use runner::Simulation;
use solver::{FluidSolver, IntegrationScheme, PressureSolverKind, SolverParams};

const USAGE: &str = "\
Usage: fumarole [options]

Options:
      --config PATH        config file (default: fumarole.yaml if present)
  -G, --grid X Y Z         grid dimensions in cells
  -D, --cell-width W       width of a single cell
  -T, --timestep DT        timestep update
      --solver-tol TOL     linear solver convergence tolerance
      --max-iter N         linear solver iteration cap
  -A, --integration S      euler | verlet | runge-kutta2 | runge-kutta4
      --interp K           lerp | hat | gaussian | catmull-rom
  -L, --solver KIND        cg | pcg | jacobi
      --vorticity EPS      vorticity confinement strength (0 disables)
  -N, --output-name PREFIX output file name prefix
  -O, --output-dir DIR     output directory
  -F, --frames N           number of frames to simulate
  -I, --input-file SCENE   input scene file
  -V, --verbose            raise the logging level (repeatable)
  -h, --help               produce this help message";

/// Flags collected from the command line; `None` keeps the config value.
#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    grid: Option<(usize, usize, usize)>,
    cell_width: Option<f64>,
    timestep: Option<f64>,
    tolerance: Option<f64>,
    max_iterations: Option<usize>,
    integration: Option<IntegrationScheme>,
    interpolation: Option<Kernel>,
    solver: Option<PressureSolverKind>,
    vorticity: Option<f64>,
    output_name: Option<String>,
    output_dir: Option<PathBuf>,
    frames: Option<usize>,
    scene: Option<PathBuf>,
    verbose: u8,
    help: bool,
}

fn value<'a>(argv: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
    *i += 1;
    argv.get(*i)
        .map(|s| s.as_str())
        .ok_or_else(|| format!("option '{flag}' expects a value"))
}

fn parsed<T>(argv: &[String], i: &mut usize, flag: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = value(argv, i, flag)?;
    raw.parse().map_err(|e| format!("invalid value '{raw}' for '{flag}': {e}"))
}

fn parse_args(argv: &[String]) -> Result<Args, String> {
    let mut args = Args::default();
    let mut i = 0;
    while i < argv.len() {
        let flag = argv[i].as_str();
        match flag {
            "-h" | "--help" => args.help = true,
            "-V" | "--verbose" => args.verbose += 1,
            "--config" => args.config = Some(parsed(argv, &mut i, flag)?),
            "-G" | "--grid" => {
                let x = parsed(argv, &mut i, flag)?;
                let y = parsed(argv, &mut i, flag)?;
                let z = parsed(argv, &mut i, flag)?;
                args.grid = Some((x, y, z));
            }
            "-D" | "--cell-width" => args.cell_width = Some(parsed(argv, &mut i, flag)?),
            "-T" | "--timestep" => args.timestep = Some(parsed(argv, &mut i, flag)?),
            "--solver-tol" => args.tolerance = Some(parsed(argv, &mut i, flag)?),
            "--max-iter" => args.max_iterations = Some(parsed(argv, &mut i, flag)?),
            "-A" | "--integration" => args.integration = Some(parsed(argv, &mut i, flag)?),
            "--interp" => args.interpolation = Some(parsed(argv, &mut i, flag)?),
            "-L" | "--solver" => args.solver = Some(parsed(argv, &mut i, flag)?),
            "--vorticity" => args.vorticity = Some(parsed(argv, &mut i, flag)?),
            "-N" | "--output-name" => args.output_name = Some(parsed(argv, &mut i, flag)?),
            "-O" | "--output-dir" => args.output_dir = Some(parsed(argv, &mut i, flag)?),
            "-F" | "--frames" => args.frames = Some(parsed(argv, &mut i, flag)?),
            "-I" | "--input-file" => args.scene = Some(parsed(argv, &mut i, flag)?),
            other => return Err(format!("unknown option '{other}'")),
        }
        i += 1;
    }
    Ok(args)
}

fn apply_overrides(cfg: &mut Config, args: &Args) {
    if let Some((x, y, z)) = args.grid {
        cfg.grid.nx = x;
        cfg.grid.ny = y;
        cfg.grid.nz = z;
    }
    if let Some(w) = args.cell_width {
        cfg.grid.cell_width = w;
    }
    if let Some(dt) = args.timestep {
        cfg.solver.dt = dt;
    }
    if let Some(tol) = args.tolerance {
        cfg.solver.tolerance = tol;
    }
    if let Some(n) = args.max_iterations {
        cfg.solver.max_iterations = n;
    }
    if let Some(s) = args.integration {
        cfg.solver.integration = s;
    }
    if let Some(k) = args.interpolation {
        cfg.solver.interpolation = k;
    }
    if let Some(l) = args.solver {
        cfg.solver.pressure_solver = l;
    }
    if let Some(eps) = args.vorticity {
        cfg.solver.confinement = eps;
    }
    if let Some(name) = &args.output_name {
        cfg.output.prefix = name.clone();
    }
    if let Some(dir) = &args.output_dir {
        cfg.output.directory = dir.clone();
    }
    if let Some(n) = args.frames {
        cfg.output.frames = n;
    }
    if let Some(scene) = &args.scene {
        cfg.scene = Some(scene.clone());
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _ = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

fn build_and_run(cfg: &Config) -> Result<usize, Box<dyn std::error::Error>> {
    let mut grid = Grid::new(cfg.grid.nx, cfg.grid.ny, cfg.grid.nz, cfg.grid.cell_width)?;
    if let Some(path) = &cfg.scene {
        let scene = SceneImporter.load(path)?;
        scene.apply(&mut grid);
    }

    let params = SolverParams {
        tolerance: cfg.solver.tolerance,
        max_iterations: cfg.solver.max_iterations,
        dt: cfg.solver.dt,
        integration: cfg.solver.integration,
        interpolation: cfg.solver.interpolation,
        pressure_solver: cfg.solver.pressure_solver,
        gravity: cfg.solver.gravity,
        buoyancy_alpha: cfg.solver.buoyancy_alpha,
        buoyancy_beta: cfg.solver.buoyancy_beta,
        ambient_temperature: cfg.solver.ambient_temperature,
        confinement: cfg.solver.confinement,
    };
    let solver = FluidSolver::new(params);
    let exporter = PngExporter::new(&cfg.output.directory, cfg.output.prefix.clone());

    let mut sim = Simulation::new(grid, solver).with_exporter(Box::new(exporter));
    sim.run(cfg.output.frames);
    Ok(sim.frames_completed())
}

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };
    if args.help {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    init_logging(args.verbose);
    println!("fumarole {}", env!("CARGO_PKG_VERSION"));

    let mut cfg = match &args.config {
        Some(path) => match Config::from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => Config::load_or_default(),
    };
    apply_overrides(&mut cfg, &args);
    if let Err(e) = cfg.validate() {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    let start = std::time::Instant::now();
    match build_and_run(&cfg) {
        Ok(frames) => {
            println!("finished {frames} frames in {} ms", start.elapsed().as_millis());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
