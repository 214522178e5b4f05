use clap::Parser;
use pbl_mix_core::{
    AirMass, GridDims, GridGeometry, LevelBudget, PblConfig, PblContext, PblError, PblMixer,
    SpeciesField, SpeciesId, TracerMassUnits,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Standard gravity (m/s²)
const GRAVITY: f64 = 9.80665;
/// Model lid (hPa)
const MODEL_TOP_HPA: f64 = 10.0;

/// Headless PBL mixing driver on a synthetic grid
#[derive(Parser, Debug)]
#[command(name = "pbl-mix-demo")]
#[command(about = "Boundary-layer diagnosis and tracer mixing demo", long_about = None)]
struct Args {
    /// Columns in x
    #[arg(long, default_value_t = 72)]
    nx: usize,

    /// Columns in y
    #[arg(long, default_value_t = 46)]
    ny: usize,

    /// Vertical levels
    #[arg(long, default_value_t = 47)]
    nz: usize,

    /// Levels that may hold the PBL top (0 = all)
    #[arg(long, default_value_t = 0)]
    active_levels: usize,

    /// Number of advected tracers
    #[arg(short, long, default_value_t = 4)]
    species: u32,

    /// Number of timesteps
    #[arg(short = 'n', long, default_value_t = 24)]
    steps: usize,

    /// Timestep in hours, drives the diurnal PBL cycle
    #[arg(long, default_value_t = 1.0)]
    dt_hours: f64,

    /// Random seed for the synthetic meteorology
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// JSON file with a `PblConfig`; missing fields take defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Report interval in steps
    #[arg(short, long, default_value_t = 6)]
    report_interval: usize,

    /// Diagnose PBL heights only
    #[arg(long)]
    no_mixing: bool,
}

/// Synthetic grid: hybrid-like levels over a random surface pressure field
struct SyntheticGrid {
    dims: GridDims,
    geometry: GridGeometry,
    air: AirMass,
    /// Daytime PBL depth scale per column (m)
    depth_scale: Vec<f64>,
}

fn build_grid(args: &Args, rng: &mut StdRng) -> Result<SyntheticGrid, PblError> {
    let active = if args.active_levels == 0 {
        args.nz
    } else {
        args.active_levels
    };
    let dims = GridDims::new(args.nx, args.ny, args.nz, active)?;
    let columns = dims.columns();
    let nz = dims.nz();

    // Fraction of the column mass above each edge, denser near the surface
    let sigma: Vec<f64> = (0..=nz)
        .map(|k| {
            let x = k as f64 / nz as f64;
            (1.0 - x).powf(1.8)
        })
        .collect();

    let mut edges = Vec::with_capacity(columns * (nz + 1));
    let mut heights = Vec::with_capacity(columns * nz);
    let mut air = Vec::with_capacity(columns * nz);
    let mut depth_scale = Vec::with_capacity(columns);
    for column in 0..columns {
        let (_, j) = dims.column_coords(column);
        let latitude = -90.0 + 180.0 * (j as f64 + 0.5) / dims.ny() as f64;
        let surface = rng.random_range(960.0..1030.0);
        // Grid boxes shrink toward the poles
        let area = 4.0e10 * latitude.to_radians().cos().max(0.05);

        for s in &sigma {
            edges.push(MODEL_TOP_HPA + s * (surface - MODEL_TOP_HPA));
        }
        let column_edges = &edges[column * (nz + 1)..];
        for level in 0..nz {
            let (bottom, top) = (column_edges[level], column_edges[level + 1]);
            let temperature = 288.0 - 40.0 * (1.0 - top / surface);
            heights.push(287.05 * temperature / GRAVITY * (bottom / top).ln());
            air.push((bottom - top) * 100.0 / GRAVITY * area);
        }
        depth_scale.push(rng.random_range(400.0..2500.0));
    }

    Ok(SyntheticGrid {
        dims,
        geometry: GridGeometry::new(dims, edges, heights)?,
        air: AirMass::new(dims, air)?,
        depth_scale,
    })
}

/// Tracer mass (kg) decaying with height with a random surface loading
fn build_species(
    grid: &SyntheticGrid,
    ids: &[SpeciesId],
    rng: &mut StdRng,
) -> Result<SpeciesField, PblError> {
    let nz = grid.dims.nz();
    let mut values = Vec::with_capacity(grid.dims.columns() * ids.len() * nz);
    for column in 0..grid.dims.columns() {
        let air = grid.air.column(column);
        for _ in ids {
            let surface_ratio = rng.random_range(1.0e-9..1.0e-7);
            let decay = rng.random_range(2.0..10.0);
            for (level, mass) in air.iter().enumerate() {
                let ratio = surface_ratio * (-(level as f64) / decay).exp();
                values.push(ratio * mass);
            }
        }
    }
    SpeciesField::from_vec(grid.dims, ids.to_vec(), values)
}

/// PBL height (m) at local solar `hour`, with random jitter
fn pbl_heights(grid: &SyntheticGrid, hour: f64, rng: &mut StdRng) -> Vec<f64> {
    (0..grid.dims.columns())
        .map(|column| {
            let (i, _) = grid.dims.column_coords(column);
            let local = hour + 24.0 * i as f64 / grid.dims.nx() as f64;
            let sun = (2.0 * PI * (local - 6.0) / 24.0).sin().max(0.0);
            let jitter = rng.random_range(0.9..1.1);
            (100.0 + grid.depth_scale[column] * sun) * jitter
        })
        .collect()
}

fn species_totals(species: &SpeciesField) -> Vec<f64> {
    let nz = species.dims().nz();
    let mut totals = vec![0.0; species.species().len()];
    for block in species.as_slice().chunks(species.column_len()) {
        for (total, profile) in totals.iter_mut().zip(block.chunks(nz)) {
            *total += profile.iter().sum::<f64>();
        }
    }
    totals
}

fn load_config(path: Option<&PathBuf>) -> Result<PblConfig, String> {
    let Some(path) = path else {
        return Ok(PblConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("cannot parse {}: {e}", path.display()))
}

fn run(args: &Args) -> Result<(), String> {
    let config = load_config(args.config.as_ref())?;
    let mut rng = StdRng::seed_from_u64(args.seed);

    println!("=== PBL Mixing Demo ===\n");
    let grid = build_grid(args, &mut rng).map_err(|e| e.to_string())?;
    println!(
        "Grid: {}x{} columns, {} levels ({} active)",
        grid.dims.nx(),
        grid.dims.ny(),
        grid.dims.nz(),
        grid.dims.active_levels()
    );
    println!(
        "Config: scale height {:.0} m, tolerance {:e}, floor {:?}, parallel {}\n",
        config.scale_height_m, config.fraction_tolerance, config.min_pbl_height_m, config.parallel
    );

    let ids: Vec<SpeciesId> = (1..=args.species).map(SpeciesId).collect();
    let mut species = build_species(&grid, &ids, &mut rng).map_err(|e| e.to_string())?;
    let initial = species_totals(&species);

    let context = PblContext::new(grid.dims, config).map_err(|e| e.to_string())?;
    let mut mixer = PblMixer::new(context, TracerMassUnits, LevelBudget::new())
        .with_mixing(!args.no_mixing);

    println!("Step | Hour | Max top level | Mean depth(m) | Max depth(m) | Worst mass error");
    println!("-----|------|---------------|---------------|--------------|-----------------");

    let mut worst_error: f64 = 0.0;
    let mut highest_level = 0;
    for step in 1..=args.steps {
        let hour = (step as f64 * args.dt_hours) % 24.0;
        let heights = pbl_heights(&grid, hour, &mut rng);
        let before = species_totals(&species);

        let summary = mixer
            .step(&grid.geometry, &heights, &mut species, &grid.air, &ids)
            .map_err(|e| e.to_string())?;

        let after = species_totals(&species);
        let step_error = before
            .iter()
            .zip(&after)
            .map(|(b, a)| ((a - b) / b).abs())
            .fold(0.0, f64::max);
        worst_error = worst_error.max(step_error);
        highest_level = highest_level.max(summary.max_top_level);

        if step % args.report_interval.max(1) == 0 || step == args.steps {
            let depths: Vec<f64> = mixer
                .context()
                .states()
                .map(|states| states.iter().map(|s| s.top_height.value()).collect())
                .unwrap_or_default();
            let mean = depths.iter().sum::<f64>() / depths.len().max(1) as f64;
            let max = depths.iter().copied().fold(0.0, f64::max);
            println!(
                "{:4} | {:4.1} | {:13} | {:13.1} | {:12.1} | {:16.3e}",
                step, hour, summary.max_top_level, mean, max, step_error
            );
        }
    }

    let total_error = initial
        .iter()
        .zip(species_totals(&species))
        .map(|(b, a)| ((a - b) / b).abs())
        .fold(0.0, f64::max);

    println!("\n=== Run Complete ===");
    println!("Steps: {}", args.steps);
    println!("Highest PBL top level: {}", highest_level);
    println!("Worst per-step relative mass error: {:.3e}", worst_error);
    println!("Relative mass drift over run: {:.3e}", total_error);
    println!(
        "Largest net level-budget change: {:.3e} kg",
        mixer.diagnostics().max_net_change()
    );
    info!(
        "Completed {} steps, worst relative mass error {:e}",
        args.steps, worst_error
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("PBL demo aborted: {}", message);
            ExitCode::FAILURE
        }
    }
}
