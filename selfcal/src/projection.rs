//! Focal-plane geometry for candidate stars.
//!
//! Two collaborators sit between candidate selection and the offset chain:
//! a [`Projector`] that places each candidate on the visit's tangent plane, and
//! a [`PatchAssigner`] that labels those positions with a spatial patch used
//! downstream for calibration grouping.

use crate::catalog::{CandidateStar, VisitRecord};

/// Maps candidate sky positions onto visit-local `(x, y, radius)`.
pub trait Projector: Send + Sync {
    fn project(&self, stars: &mut [CandidateStar], visit: &VisitRecord);
}

/// Labels candidates with `patch_id` and `sub_patch` within the field of view.
pub trait PatchAssigner: Send + Sync {
    fn assign(&self, stars: &mut [CandidateStar], visit: &VisitRecord, n_patches: usize);
}

/// Gnomonic (tangent-plane) projection of `(ra, dec)` about `(ra0, dec0)`, all in radians.
///
/// Returns `(x, y)` in tangent-plane units; a point at angular distance θ from
/// the center lands at radius `tan θ`.
pub fn gnomonic_project(ra: f64, dec: f64, ra0: f64, dec0: f64) -> (f64, f64) {
    let (sin_dec, cos_dec) = dec.sin_cos();
    let (sin_dec0, cos_dec0) = dec0.sin_cos();
    let (sin_dra, cos_dra) = (ra - ra0).sin_cos();

    let cos_c = sin_dec0 * sin_dec + cos_dec0 * cos_dec * cos_dra;
    let x = cos_dec * sin_dra / cos_c;
    let y = (cos_dec0 * sin_dec - sin_dec0 * cos_dec * cos_dra) / cos_c;
    (x, y)
}

/// Default projector: gnomonic about the pointing, rotated by `rotSkyPos`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GnomonicProjector;

impl Projector for GnomonicProjector {
    fn project(&self, stars: &mut [CandidateStar], visit: &VisitRecord) {
        let ra0 = visit.ra.to_radians();
        let dec0 = visit.dec.to_radians();
        let (sin_rot, cos_rot) = visit.rot_sky_pos.to_radians().sin_cos();

        for candidate in stars.iter_mut() {
            let (xt, yt) = gnomonic_project(
                candidate.star.ra.to_radians(),
                candidate.star.dec.to_radians(),
                ra0,
                dec0,
            );
            candidate.x = cos_rot * xt + sin_rot * yt;
            candidate.y = -sin_rot * xt + cos_rot * yt;
            candidate.radius = candidate.x.hypot(candidate.y);
        }
    }
}

/// Divides the square circumscribing the field of view into an
/// `nsides x nsides` grid, `nsides = sqrt(n_patches)`.
///
/// Patch ids are unique across visits: `patch_id = sub_patch + observation_id * n_patches`.
#[derive(Debug, Clone, Copy)]
pub struct GridPatchAssigner {
    pub fov_radius_deg: f64,
}

impl GridPatchAssigner {
    pub fn new(fov_radius_deg: f64) -> Self {
        Self { fov_radius_deg }
    }

    /// Half-width of the grid in tangent-plane units.
    pub fn half_width(&self) -> f64 {
        gnomonic_project(0.0, self.fov_radius_deg.to_radians(), 0.0, 0.0).1
    }
}

/// Integer square root of a perfect square, `None` otherwise.
pub fn patch_grid_side(n_patches: usize) -> Option<usize> {
    let side = (n_patches as f64).sqrt().round() as usize;
    (side * side == n_patches && side > 0).then_some(side)
}

impl PatchAssigner for GridPatchAssigner {
    fn assign(&self, stars: &mut [CandidateStar], visit: &VisitRecord, n_patches: usize) {
        // Non-square counts are rejected by CatalogConfig::validate; fall back
        // to the nearest grid rather than panic.
        let nsides = patch_grid_side(n_patches)
            .unwrap_or_else(|| ((n_patches as f64).sqrt().floor() as usize).max(1));
        let max_y = self.half_width();
        let cell = |coord: f64| -> u64 {
            let px = ((coord + max_y) / (2.0 * max_y) * nsides as f64).floor();
            px.clamp(0.0, (nsides - 1) as f64) as u64
        };

        for candidate in stars.iter_mut() {
            let px = cell(candidate.x);
            let py = cell(candidate.y);
            candidate.sub_patch = px + py * nsides as u64;
            candidate.patch_id = candidate.sub_patch + visit.observation_id * n_patches as u64;
        }
    }
}
