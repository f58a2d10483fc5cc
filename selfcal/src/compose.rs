//! Offset composition: run the offset chain for one visit and fold the
//! results into modeled magnitudes and uncertainties.

use std::collections::HashSet;

use rand::RngCore;

use crate::catalog::{Band, CandidateStar, VisitRecord};
use crate::error::{Result, SelfcalError};
use crate::offsets::{Offset, OffsetContext, OffsetDeltas};
use crate::uncertainty::{combine_uncertainty, UncertaintyModel};

/// Reject offset chains in which two models share a result key.
pub fn validate_offset_keys(offsets: &[Box<dyn Offset>]) -> Result<()> {
    let mut seen = HashSet::new();
    for offset in offsets {
        if !seen.insert(offset.key()) {
            return Err(SelfcalError::DuplicateOffsetKey(offset.key().to_string()));
        }
    }
    Ok(())
}

/// Apply `offsets` in order to the candidates of one visit.
///
/// Each offset sees the deltas of every offset before it. A failing offset
/// aborts composition and the error is returned tagged with its key.
pub fn compose_offsets(
    candidates: &[CandidateStar],
    visit: &VisitRecord,
    band: Band,
    offsets: &[Box<dyn Offset>],
    rng: &mut dyn RngCore,
) -> Result<OffsetDeltas> {
    let mut deltas = OffsetDeltas::new();

    for offset in offsets {
        let key = offset.key();
        let values = {
            let mut ctx = OffsetContext::new(candidates, visit, band, &deltas, &mut *rng);
            offset.apply(&mut ctx).map_err(|source| SelfcalError::Offset {
                key: key.to_string(),
                source,
            })?
        };

        if values.len() != candidates.len() {
            return Err(SelfcalError::OffsetLengthMismatch {
                key: key.to_string(),
                expected: candidates.len(),
                actual: values.len(),
            });
        }

        deltas
            .insert(key, values)
            .map_err(SelfcalError::DuplicateOffsetKey)?;
    }

    Ok(deltas)
}

/// True band magnitude plus every delta, summed in offset declaration order.
pub fn modeled_magnitudes(
    candidates: &[CandidateStar],
    band: Band,
    deltas: &OffsetDeltas,
) -> Vec<f64> {
    let mut mags: Vec<f64> = candidates.iter().map(|c| c.star.magnitude(band)).collect();
    deltas.accumulate_into(&mut mags);
    mags
}

/// Compose offsets for one visit and write `observed_mag` / `mag_uncert` back onto the candidates.
///
/// Returns the per-key deltas so callers can inspect individual contributions.
pub fn apply_offsets(
    candidates: &mut [CandidateStar],
    visit: &VisitRecord,
    band: Band,
    offsets: &[Box<dyn Offset>],
    uncertainty: &dyn UncertaintyModel,
    uncert_floor: f64,
    rng: &mut dyn RngCore,
) -> Result<OffsetDeltas> {
    let deltas = compose_offsets(candidates, visit, band, offsets, rng)?;
    let observed = modeled_magnitudes(candidates, band, &deltas);
    let base_errors = uncertainty.mag_errors(&observed, visit.five_sigma_depth);

    for ((candidate, mag), err) in candidates.iter_mut().zip(observed).zip(base_errors) {
        candidate.observed_mag = mag;
        candidate.mag_uncert = combine_uncertainty(err, uncert_floor);
    }

    Ok(deltas)
}
