//! Catalog generation entry point.
//!
//! The star index is built once over the full catalog. Each visit then runs
//! independently: query candidates, project them onto the focal plane, assign
//! patches, run the offset chain, and assemble the output records. Per-visit
//! results are concatenated in input order whether visits ran sequentially or
//! on the rayon pool.

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::assemble::{assemble_records, concatenate};
use crate::catalog::{CandidateStar, ObservationRecord, StarRecord, VisitRecord};
use crate::compose::{apply_offsets, validate_offset_keys};
use crate::config::CatalogConfig;
use crate::coords::to_unit_vector;
use crate::error::{Result, SelfcalError};
use crate::offsets::Offset;
use crate::projection::{GnomonicProjector, GridPatchAssigner, PatchAssigner, Projector};
use crate::spatial::{chord_radius, StarIndex, DEFAULT_LEAF_SIZE};
use crate::uncertainty::{SnrUncertainty, UncertaintyModel};

/// Shared, read-only state for one run.
struct RunContext<'a> {
    stars: &'a [StarRecord],
    index: StarIndex,
    chord_radius: f64,
    offsets: &'a [Box<dyn Offset>],
    progress: ProgressBar,
}

/// Catalog generator holding the configuration and geometry/uncertainty collaborators.
pub struct CatalogGenerator {
    config: CatalogConfig,
    projector: Box<dyn Projector>,
    patch_assigner: Box<dyn PatchAssigner>,
    uncertainty: Box<dyn UncertaintyModel>,
    leaf_size: usize,
}

impl CatalogGenerator {
    /// Generator with the default collaborators: gnomonic projection, a square
    /// patch grid sized to the configured field of view, and the SNR error
    /// model for the configured band.
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            projector: Box::new(GnomonicProjector),
            patch_assigner: Box::new(GridPatchAssigner::new(config.fov_radius_deg)),
            uncertainty: Box::new(SnrUncertainty::for_band(config.band)),
            leaf_size: DEFAULT_LEAF_SIZE,
            config,
        }
    }

    pub fn with_projector(mut self, projector: impl Projector + 'static) -> Self {
        self.projector = Box::new(projector);
        self
    }

    pub fn with_patch_assigner(mut self, assigner: impl PatchAssigner + 'static) -> Self {
        self.patch_assigner = Box::new(assigner);
        self
    }

    pub fn with_uncertainty_model(mut self, model: impl UncertaintyModel + 'static) -> Self {
        self.uncertainty = Box::new(model);
        self
    }

    pub fn with_leaf_size(mut self, leaf_size: usize) -> Self {
        self.leaf_size = leaf_size;
        self
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Generate the observation catalog.
    ///
    /// Returns `Ok(None)` with a warning when no offsets are configured, since
    /// an observation without any photometric model applied is meaningless.
    ///
    /// # Errors
    /// * `InvalidInput` - empty visits or stars, angles not convertible to radians,
    ///   or an invalid configuration
    /// * `DuplicateOffsetKey` - two offsets share a key
    /// * `Offset` / `OffsetLengthMismatch` - an offset model failed; the whole run aborts
    pub fn generate(
        &self,
        visits: &[VisitRecord],
        stars: &[StarRecord],
        offsets: Option<&[Box<dyn Offset>]>,
    ) -> Result<Option<Vec<ObservationRecord>>> {
        let offsets = match offsets {
            Some(offsets) if !offsets.is_empty() => offsets,
            _ => {
                warn!("No offsets configured, returning without generating a catalog");
                return Ok(None);
            }
        };

        self.config.validate()?;
        validate_offset_keys(offsets)?;
        validate_visits(visits, self.config.n_patches)?;

        let ra: Vec<f64> = stars.iter().map(|s| s.ra.to_radians()).collect();
        let dec: Vec<f64> = stars.iter().map(|s| s.dec.to_radians()).collect();
        let index = StarIndex::build(&ra, &dec, self.leaf_size)?;

        let progress = if self.config.verbose {
            ProgressBar::new(visits.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        let template = "{bar:40.cyan/blue} {pos}/{len} visits ({percent}%) eta {eta}";
        if let Ok(style) = ProgressStyle::with_template(template) {
            progress.set_style(style);
        }

        let run = RunContext {
            stars,
            index,
            chord_radius: chord_radius(self.config.fov_radius_deg.to_radians()),
            offsets,
            progress,
        };

        info!(
            "Generating {} band catalog: {} stars, {} visits, {} offsets, fov radius {:.3} deg",
            self.config.band,
            stars.len(),
            visits.len(),
            offsets.len(),
            self.config.fov_radius_deg
        );

        let per_visit: Vec<Vec<ObservationRecord>> = if self.config.parallel {
            visits
                .par_iter()
                .enumerate()
                .map(|(i, visit)| self.process_visit(&run, i, visit))
                .collect::<Result<_>>()?
        } else {
            visits
                .iter()
                .enumerate()
                .map(|(i, visit)| self.process_visit(&run, i, visit))
                .collect::<Result<_>>()?
        };
        run.progress.finish_and_clear();

        let catalog = concatenate(per_visit);
        info!("Generated {} observations", catalog.len());
        Ok(Some(catalog))
    }

    fn process_visit(
        &self,
        run: &RunContext<'_>,
        visit_index: usize,
        visit: &VisitRecord,
    ) -> Result<Vec<ObservationRecord>> {
        let direction = to_unit_vector(visit.ra.to_radians(), visit.dec.to_radians());
        let mut indices = run.index.query_candidates(&direction, run.chord_radius);

        if indices.is_empty() {
            debug!("Visit {} sees no stars", visit.observation_id);
            run.progress.inc(1);
            return Ok(Vec::new());
        }
        // Catalog order keeps output independent of the tree layout
        indices.sort_unstable();

        let mut candidates = CandidateStar::slice_catalog(run.stars, &indices);
        self.projector.project(&mut candidates, visit);
        self.patch_assigner
            .assign(&mut candidates, visit, self.config.n_patches);

        let mut rng = visit_rng(self.config.seed, visit_index);
        let deltas = apply_offsets(
            &mut candidates,
            visit,
            self.config.band,
            run.offsets,
            self.uncertainty.as_ref(),
            self.config.uncert_floor,
            &mut rng,
        )?;

        debug!(
            "Visit {}: {} candidates, offsets [{}]",
            visit.observation_id,
            candidates.len(),
            deltas.keys().collect::<Vec<_>>().join(", ")
        );
        run.progress.inc(1);

        Ok(assemble_records(&candidates, self.config.band))
    }
}

/// Independent random stream for one visit.
///
/// Every visit draws from stream `visit_index` of the run seed, so results do
/// not depend on the order visits are processed in.
pub fn visit_rng(seed: u64, visit_index: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(visit_index as u64);
    rng
}

fn validate_visits(visits: &[VisitRecord], n_patches: usize) -> Result<()> {
    if visits.is_empty() {
        return Err(SelfcalError::InvalidInput(
            "visit list must contain at least one visit".to_string(),
        ));
    }
    if let Some(bad) = visits.iter().find(|v| {
        !v.ra.is_finite() || !v.dec.is_finite() || !v.five_sigma_depth.is_finite()
    }) {
        return Err(SelfcalError::InvalidInput(format!(
            "visit {} has non-finite pointing or depth",
            bad.observation_id
        )));
    }
    // Patch ids are `sub_patch + observation_id * n_patches`
    let n = n_patches as u64;
    if let Some(bad) = visits.iter().find(|v| {
        v.observation_id
            .checked_mul(n)
            .and_then(|base| base.checked_add(n.saturating_sub(1)))
            .is_none()
    }) {
        return Err(SelfcalError::InvalidInput(format!(
            "observation id {} is too large to encode patch ids for {} patches",
            bad.observation_id, n_patches
        )));
    }
    Ok(())
}

/// Generate an observed-magnitude catalog with the default collaborators.
///
/// See [`CatalogGenerator::generate`].
pub fn generate_catalog(
    visits: &[VisitRecord],
    stars: &[StarRecord],
    offsets: Option<&[Box<dyn Offset>]>,
    config: &CatalogConfig,
) -> Result<Option<Vec<ObservationRecord>>> {
    CatalogGenerator::new(config.clone()).generate(visits, stars, offsets)
}
