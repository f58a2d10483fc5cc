//! Generate a simulated observed-magnitude catalog from visit and star tables
//!
//! Visits and stars are read as JSON arrays of records using OpSim-style
//! column names. The resulting observations are written as a JSON array.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin generate_catalog -- \
//!     --visits visits.json --stars stars.json --output observations.json \
//!     --offset zp:0.01 --offset sys --offset snr
//!
//! # Same run driven by a config file, overriding the seed
//! cargo run --release --bin generate_catalog -- \
//!     --visits visits.json --stars stars.json --output observations.json \
//!     --config selfcal.json --seed 7
//! ```
//!
//! Offsets given on the command line replace any listed in the config file.
//! Set `RUST_LOG=debug` for per-visit logging.

use clap::Parser;
use log::{debug, info, warn};
use selfcal::{
    catalog::{Band, StarRecord, VisitRecord},
    generate_catalog, OffsetSpec, SelfcalConfigFile,
};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "generate_catalog",
    about = "Generates a simulated catalog of observed stellar magnitudes",
    long_about = None
)]
struct Args {
    /// JSON array of visit records
    #[arg(long)]
    visits: PathBuf,

    /// JSON array of star records
    #[arg(long)]
    stars: PathBuf,

    /// Where to write the observation records
    #[arg(long, default_value = "observations.json")]
    output: PathBuf,

    /// JSON run configuration (catalog settings and offsets)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Magnitude band to observe in (u, g, r, i, z, y)
    #[arg(long)]
    band: Option<Band>,

    /// Patches per field of view (perfect square)
    #[arg(long)]
    n_patches: Option<usize>,

    /// Field-of-view radius in degrees
    #[arg(long)]
    fov_radius: Option<f64>,

    /// Random seed for stochastic offsets
    #[arg(long)]
    seed: Option<u64>,

    /// Uncertainty floor added in quadrature (magnitudes)
    #[arg(long)]
    uncert_floor: Option<f64>,

    /// Offset model, repeatable and applied in order:
    /// zero, fixed:<key>:<delta>, sys[:sigma], zp[:sigma], snr[:key,...]
    #[arg(long = "offset")]
    offsets: Vec<OffsetSpec>,

    /// Process visits in parallel
    #[arg(long)]
    parallel: bool,

    /// Show a progress bar
    #[arg(long)]
    verbose: bool,
}

fn load_records<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Vec<T>, Box<dyn std::error::Error>> {
    let file = File::open(path)
        .map_err(|e| format!("Failed to open '{}': {}", path.display(), e))?;
    let records: Vec<T> = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| format!("Failed to parse '{}': {}", path.display(), e))?;
    Ok(records)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut run = match &args.config {
        Some(path) => SelfcalConfigFile::from_json_file(path)?,
        None => SelfcalConfigFile::default(),
    };

    let config = &mut run.catalog;
    if let Some(band) = args.band {
        config.band = band;
    }
    if let Some(n_patches) = args.n_patches {
        config.n_patches = n_patches;
    }
    if let Some(fov_radius) = args.fov_radius {
        config.fov_radius_deg = fov_radius;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(floor) = args.uncert_floor {
        config.uncert_floor = floor;
    }
    config.parallel |= args.parallel;
    config.verbose |= args.verbose;

    if !args.offsets.is_empty() {
        run.offsets = args.offsets.clone();
    }
    debug!("Run configuration: {:?}", run);

    let raw_stars: Vec<StarRecord> = load_records(&args.stars)?;
    let raw_visits: Vec<VisitRecord> = load_records(&args.visits)?;

    let stars: Vec<StarRecord> = raw_stars.iter().map(StarRecord::sanitized).collect();
    let visits: Vec<VisitRecord> = raw_visits.iter().map(VisitRecord::sanitized).collect();
    let adjusted = raw_stars.iter().zip(&stars).filter(|(a, b)| a != b).count()
        + raw_visits.iter().zip(&visits).filter(|(a, b)| a != b).count();
    if adjusted > 0 {
        info!("Wrapped RA / capped Dec on {} input rows", adjusted);
    }
    info!("Loaded {} stars and {} visits", stars.len(), visits.len());

    let offsets = OffsetSpec::build_all(&run.offsets);
    match generate_catalog(&visits, &stars, Some(&offsets), &run.catalog)? {
        Some(observations) => {
            let writer = BufWriter::new(File::create(&args.output)?);
            serde_json::to_writer(writer, &observations)?;
            println!(
                "Wrote {} observations to {}",
                observations.len(),
                args.output.display()
            );
        }
        None => {
            warn!("No offsets configured; pass --offset or list offsets in --config");
        }
    }

    Ok(())
}
