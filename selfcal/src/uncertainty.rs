//! Photometric uncertainty models.
//!
//! The default model is the LSST random photometric error parameterization
//! (Ivezić et al. 2019, eq. 5):
//!
//! ```text
//! x        = 10^(0.4 (m - m5))
//! σ_rand²  = (0.04 - γ) x + γ x²
//! ```
//!
//! where `m5` is the five-sigma depth of the visit and `γ` depends weakly on band.

use crate::catalog::Band;

/// Base photometric error as a function of magnitude and visit depth.
pub trait UncertaintyModel: Send + Sync {
    fn mag_errors(&self, magnitudes: &[f64], five_sigma_depth: f64) -> Vec<f64>;
}

/// SNR-driven error model keyed on the five-sigma depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnrUncertainty {
    gamma: f64,
}

impl SnrUncertainty {
    pub fn for_band(band: Band) -> Self {
        Self {
            gamma: Self::band_gamma(band),
        }
    }

    pub fn with_gamma(gamma: f64) -> Self {
        Self { gamma }
    }

    pub fn band_gamma(band: Band) -> f64 {
        match band {
            Band::U => 0.037,
            Band::G => 0.038,
            Band::R | Band::I => 0.039,
            Band::Z | Band::Y => 0.040,
        }
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Random error for a single magnitude.
    pub fn mag_error(&self, magnitude: f64, five_sigma_depth: f64) -> f64 {
        let x = 10f64.powf(0.4 * (magnitude - five_sigma_depth));
        ((0.04 - self.gamma) * x + self.gamma * x * x).sqrt()
    }
}

impl UncertaintyModel for SnrUncertainty {
    fn mag_errors(&self, magnitudes: &[f64], five_sigma_depth: f64) -> Vec<f64> {
        magnitudes
            .iter()
            .map(|&m| self.mag_error(m, five_sigma_depth))
            .collect()
    }
}

/// Combine a base error with a fixed floor in quadrature.
pub fn combine_uncertainty(base_error: f64, floor: f64) -> f64 {
    base_error.hypot(floor)
}
