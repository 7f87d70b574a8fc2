use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::grid::Grid;
use crate::io::Exporter;
use crate::solver::{diagnostics, FluidSolver, StepReport};

/// One simulation run: the grid, the solver advancing it and the exporter
/// receiving each completed frame. Constructed explicitly and handed to
/// whichever caller drives it; nothing global.
pub struct Simulation {
    grid: Grid,
    solver: FluidSolver,
    exporter: Option<Box<dyn Exporter + Send>>,
    frame: usize,
}

impl Simulation {
    pub fn new(grid: Grid, solver: FluidSolver) -> Self {
        info!(
            nx = grid.nx(),
            ny = grid.ny(),
            nz = grid.nz(),
            dx = grid.dx(),
            fluid_cells = grid.fluid_cell_count(),
            "simulation ready"
        );
        Self { grid, solver, exporter: None, frame: 0 }
    }

    pub fn with_exporter(mut self, exporter: Box<dyn Exporter + Send>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Mutable grid access for seeding before the run starts. Steps and
    /// grid reads never overlap in time; the loop serializes them.
    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    pub fn frames_completed(&self) -> usize {
        self.frame
    }

    /// Advance one step, export the frame, log diagnostics.
    pub fn advance(&mut self) -> StepReport {
        let dt = self.solver.params().dt;
        let report = self.solver.step(&mut self.grid, dt);

        if !report.pressure.converged {
            // Accepted as an approximation; the run keeps going.
            warn!(
                frame = self.frame,
                iterations = report.pressure.iterations,
                residual = report.pressure.residual,
                "pressure solve stopped at the iteration cap"
            );
        }
        debug!(
            frame = self.frame,
            iterations = report.pressure.iterations,
            max_divergence = report.max_divergence,
            residual_divergence = diagnostics::divergence_l2(&self.grid),
            kinetic_energy = diagnostics::kinetic_energy(&self.grid),
            cfl = dt * diagnostics::max_velocity(&self.grid) / self.grid.dx(),
            "step complete"
        );

        if let Some(exporter) = &mut self.exporter {
            match exporter.save(&self.grid, self.frame) {
                Ok(path) => debug!(frame = self.frame, path = %path.display(), "frame written"),
                Err(e) => error!(frame = self.frame, "frame export failed: {e}"),
            }
        }

        self.frame += 1;
        report
    }

    /// Step synchronously on the calling thread until `frames` steps have
    /// completed.
    pub fn run(&mut self, frames: usize) {
        let start = Instant::now();
        for _ in 0..frames {
            self.advance();
        }
        info!(
            frames = self.frame,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "run finished"
        );
    }

    /// Step on a dedicated background thread instead. Consumes the
    /// simulation, so a run is driven either synchronously or in the
    /// background, never both. The stop token is polled once per completed
    /// step; cancellation takes effect at step boundaries only.
    pub fn spawn(mut self, frames: usize) -> RunHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let token = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            let start = Instant::now();
            for _ in 0..frames {
                if token.load(Ordering::SeqCst) {
                    break;
                }
                self.advance();
            }
            info!(
                frames = self.frame,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "background run finished"
            );
            self
        });
        RunHandle { stop, handle }
    }
}

/// Handle to a background run. Dropping it without calling `stop` or `join`
/// detaches the thread, which then runs to its frame cap.
pub struct RunHandle {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Simulation>,
}

impl RunHandle {
    /// Ask the run to stop at the next step boundary without waiting.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Stop cooperatively and take the simulation back.
    pub fn stop(self) -> Simulation {
        self.request_stop();
        self.join()
    }

    /// Wait for the run to finish its frames.
    pub fn join(self) -> Simulation {
        match self.handle.join() {
            Ok(sim) => sim,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}
