//! Built-in offset models.
//!
//! | model               | key         | delta                                        |
//! |---------------------|-------------|----------------------------------------------|
//! | [`NoOffset`]        | `dmag_zero` | 0                                            |
//! | [`FixedOffset`]     | caller      | constant                                     |
//! | [`SystematicOffset`]| `dmag_sys`  | N(0, σ) independently per star               |
//! | [`ZeroPointOffset`] | `dmag_zp`   | N(0, σ), one draw shared by the whole visit  |
//! | [`SnrOffset`]       | `dmag_snr`  | N(0, 1) · σ_phot(current mag, m5)            |

use rand_distr::{Distribution, Normal, StandardNormal};

use super::{Offset, OffsetContext};
use crate::error::OffsetError;
use crate::uncertainty::SnrUncertainty;

/// Default per-star systematic scatter in magnitudes.
pub const DEFAULT_SYSTEMATIC_SIGMA: f64 = 0.003;

fn normal(sigma: f64) -> Result<Normal<f64>, OffsetError> {
    if !(sigma.is_finite() && sigma >= 0.0) {
        return Err(OffsetError::InvalidParameter(format!(
            "sigma must be finite and non-negative, got {sigma}"
        )));
    }
    Normal::new(0.0, sigma)
        .map_err(|e| OffsetError::InvalidParameter(format!("sigma {sigma}: {e}")))
}

/// Contributes nothing. Useful as a baseline so a run carries at least one offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOffset;

impl Offset for NoOffset {
    fn key(&self) -> &str {
        "dmag_zero"
    }

    fn apply(&self, ctx: &mut OffsetContext<'_>) -> Result<Vec<f64>, OffsetError> {
        Ok(vec![0.0; ctx.n_stars()])
    }
}

/// Adds the same delta to every star, e.g. a known zero-point shift.
#[derive(Debug, Clone)]
pub struct FixedOffset {
    key: String,
    delta: f64,
}

impl FixedOffset {
    pub fn new(key: impl Into<String>, delta: f64) -> Self {
        Self {
            key: key.into(),
            delta,
        }
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }
}

impl Offset for FixedOffset {
    fn key(&self) -> &str {
        &self.key
    }

    fn apply(&self, ctx: &mut OffsetContext<'_>) -> Result<Vec<f64>, OffsetError> {
        if !self.delta.is_finite() {
            return Err(OffsetError::InvalidParameter(format!(
                "fixed delta must be finite, got {}",
                self.delta
            )));
        }
        Ok(vec![self.delta; ctx.n_stars()])
    }
}

/// Uncorrelated Gaussian systematic error on every individual measurement.
#[derive(Debug, Clone, Copy)]
pub struct SystematicOffset {
    pub sigma: f64,
}

impl SystematicOffset {
    pub fn new(sigma: f64) -> Self {
        Self { sigma }
    }
}

impl Default for SystematicOffset {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEMATIC_SIGMA)
    }
}

impl Offset for SystematicOffset {
    fn key(&self) -> &str {
        "dmag_sys"
    }

    fn apply(&self, ctx: &mut OffsetContext<'_>) -> Result<Vec<f64>, OffsetError> {
        let dist = normal(self.sigma)?;
        let n = ctx.n_stars();
        let rng = ctx.rng();
        Ok((0..n).map(|_| dist.sample(&mut *rng)).collect())
    }
}

/// Grey, visit-wide zero-point error: one draw per visit applied to all its stars.
#[derive(Debug, Clone, Copy)]
pub struct ZeroPointOffset {
    pub sigma: f64,
}

impl ZeroPointOffset {
    pub fn new(sigma: f64) -> Self {
        Self { sigma }
    }
}

impl Offset for ZeroPointOffset {
    fn key(&self) -> &str {
        "dmag_zp"
    }

    fn apply(&self, ctx: &mut OffsetContext<'_>) -> Result<Vec<f64>, OffsetError> {
        let dist = normal(self.sigma)?;
        // Draw even for empty visits so the stream position is independent of star count
        let shift = dist.sample(ctx.rng());
        Ok(vec![shift; ctx.n_stars()])
    }
}

/// Photometric noise from the visit's five-sigma depth.
///
/// The noise amplitude is evaluated at the magnitude the star has when it
/// reaches the detector, i.e. after the deltas of earlier offsets (clouds,
/// vignetting, ...). So place it after those in the chain.
#[derive(Debug, Clone, Default)]
pub struct SnrOffset {
    /// Restrict which prior deltas are folded into the detector magnitude.
    /// `None` uses all of them.
    after: Option<Vec<String>>,
    /// Override the band gamma; `None` picks it from the configured band.
    gamma: Option<f64>,
}

impl SnrOffset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only fold in the named prior deltas. Fails at apply time if any are missing.
    pub fn after(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            after: Some(keys.into_iter().map(Into::into).collect()),
            gamma: None,
        }
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = Some(gamma);
        self
    }
}

impl Offset for SnrOffset {
    fn key(&self) -> &str {
        "dmag_snr"
    }

    fn apply(&self, ctx: &mut OffsetContext<'_>) -> Result<Vec<f64>, OffsetError> {
        let model = match self.gamma {
            Some(gamma) => SnrUncertainty::with_gamma(gamma),
            None => SnrUncertainty::for_band(ctx.band),
        };

        let mags = match &self.after {
            None => ctx.current_magnitudes(),
            Some(keys) => {
                let mut mags = ctx.true_magnitudes();
                ctx.deltas.accumulate_keys_into(keys, &mut mags)?;
                mags
            }
        };

        let m5 = ctx.visit.five_sigma_depth;
        let rng = ctx.rng();
        Ok(mags
            .iter()
            .map(|&m| {
                let z: f64 = StandardNormal.sample(&mut *rng);
                z * model.mag_error(m, m5)
            })
            .collect())
    }
}
