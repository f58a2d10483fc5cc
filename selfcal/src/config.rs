//! Run configuration.
//!
//! A run is described by a [`CatalogConfig`] plus an ordered list of offsets.
//! Both can be loaded from one JSON file:
//!
//! ```json
//! {
//!   "catalog": { "band": "g", "n_patches": 16, "fov_radius_deg": 1.75 },
//!   "offsets": [
//!     { "type": "zero_point", "sigma": 0.01 },
//!     { "type": "systematic" },
//!     { "type": "snr" }
//!   ]
//! }
//! ```
//!
//! Missing fields take their defaults.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::Band;
use crate::error::{Result, SelfcalError};
use crate::offsets::models::DEFAULT_SYSTEMATIC_SIGMA;
use crate::offsets::{FixedOffset, NoOffset, Offset, SnrOffset, SystematicOffset, ZeroPointOffset};
use crate::projection::patch_grid_side;

/// Default per-visit zero-point scatter in magnitudes.
pub const DEFAULT_ZERO_POINT_SIGMA: f64 = 0.01;

/// Parameters of a catalog generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Which magnitude column the observations are drawn from
    pub band: Band,
    /// Patches per field of view; must be a perfect square
    pub n_patches: usize,
    /// Field-of-view radius in degrees
    pub fov_radius_deg: f64,
    /// Seed for stochastic offset models
    pub seed: u64,
    /// Uncertainty added in quadrature to every modeled error
    pub uncert_floor: f64,
    /// Show a progress bar while visits are processed
    pub verbose: bool,
    /// Process visits on the rayon thread pool
    pub parallel: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            band: Band::R,
            n_patches: 16,
            fov_radius_deg: 1.8,
            seed: 42,
            uncert_floor: 0.005,
            verbose: false,
            parallel: false,
        }
    }
}

impl CatalogConfig {
    pub fn validate(&self) -> Result<()> {
        if patch_grid_side(self.n_patches).is_none() {
            return Err(SelfcalError::InvalidInput(format!(
                "n_patches must be a non-zero perfect square, got {}",
                self.n_patches
            )));
        }
        // The tangent-plane grid only covers the hemisphere around the pointing
        if !self.fov_radius_deg.is_finite()
            || self.fov_radius_deg <= 0.0
            || self.fov_radius_deg >= 90.0
        {
            return Err(SelfcalError::InvalidInput(format!(
                "field of view radius must be in (0, 90) degrees, got {}",
                self.fov_radius_deg
            )));
        }
        if !self.uncert_floor.is_finite() || self.uncert_floor < 0.0 {
            return Err(SelfcalError::InvalidInput(format!(
                "uncertainty floor must be non-negative, got {}",
                self.uncert_floor
            )));
        }
        Ok(())
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Serializable description of an offset model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OffsetSpec {
    Zero,
    Fixed {
        key: String,
        delta: f64,
    },
    Systematic {
        #[serde(default = "default_systematic_sigma")]
        sigma: f64,
    },
    ZeroPoint {
        #[serde(default = "default_zero_point_sigma")]
        sigma: f64,
    },
    Snr {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        after: Option<Vec<String>>,
    },
}

fn default_systematic_sigma() -> f64 {
    DEFAULT_SYSTEMATIC_SIGMA
}

fn default_zero_point_sigma() -> f64 {
    DEFAULT_ZERO_POINT_SIGMA
}

impl OffsetSpec {
    pub fn build(&self) -> Box<dyn Offset> {
        match self {
            OffsetSpec::Zero => Box::new(NoOffset),
            OffsetSpec::Fixed { key, delta } => Box::new(FixedOffset::new(key.clone(), *delta)),
            OffsetSpec::Systematic { sigma } => Box::new(SystematicOffset::new(*sigma)),
            OffsetSpec::ZeroPoint { sigma } => Box::new(ZeroPointOffset::new(*sigma)),
            OffsetSpec::Snr { after: None } => Box::new(SnrOffset::new()),
            OffsetSpec::Snr { after: Some(keys) } => Box::new(SnrOffset::after(keys.clone())),
        }
    }

    pub fn build_all(specs: &[OffsetSpec]) -> Vec<Box<dyn Offset>> {
        specs.iter().map(OffsetSpec::build).collect()
    }
}

fn parse_sigma(arg: Option<&str>, default: f64) -> std::result::Result<f64, String> {
    match arg {
        None => Ok(default),
        Some(s) => {
            let sigma = s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("Invalid sigma value: {s}"))?;
            if !(sigma.is_finite() && sigma >= 0.0) {
                return Err(format!("Sigma must be finite and non-negative: {s}"));
            }
            Ok(sigma)
        }
    }
}

/// Parse the compact command-line form:
/// `zero`, `fixed:<key>:<delta>`, `sys[:sigma]`, `zp[:sigma]`, `snr[:key,key...]`.
impl FromStr for OffsetSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(2, ':');
        let kind = parts.next().unwrap_or_default();
        let rest = parts.next();

        match kind {
            "zero" | "none" => Ok(OffsetSpec::Zero),
            "fixed" => {
                let (key, delta) = rest
                    .and_then(|r| r.rsplit_once(':'))
                    .ok_or_else(|| {
                        "Fixed offsets must be in format 'fixed:<key>:<delta>'".to_string()
                    })?;
                let delta = delta
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| format!("Invalid delta value: {delta}"))?;
                Ok(OffsetSpec::Fixed {
                    key: key.to_string(),
                    delta,
                })
            }
            "sys" | "systematic" => Ok(OffsetSpec::Systematic {
                sigma: parse_sigma(rest, DEFAULT_SYSTEMATIC_SIGMA)?,
            }),
            "zp" | "zero_point" => Ok(OffsetSpec::ZeroPoint {
                sigma: parse_sigma(rest, DEFAULT_ZERO_POINT_SIGMA)?,
            }),
            "snr" => Ok(OffsetSpec::Snr {
                after: rest.map(|r| r.split(',').map(|k| k.trim().to_string()).collect()),
            }),
            other => Err(format!("Unknown offset type '{other}'")),
        }
    }
}

/// Top-level layout of a JSON run configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfcalConfigFile {
    pub catalog: CatalogConfig,
    pub offsets: Vec<OffsetSpec>,
}

impl SelfcalConfigFile {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            SelfcalError::Config(format!("failed to parse '{}': {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = CatalogConfig::default();
        assert_eq!(config.band, Band::R);
        assert_eq!(config.n_patches, 16);
        assert_eq!(config.fov_radius_deg, 1.8);
        assert_eq!(config.seed, 42);
        assert_eq!(config.uncert_floor, 0.005);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_patches = CatalogConfig {
            n_patches: 15,
            ..Default::default()
        };
        assert!(bad_patches.validate().is_err());

        let bad_fov = CatalogConfig {
            fov_radius_deg: 0.0,
            ..Default::default()
        };
        assert!(bad_fov.validate().is_err());

        for fov in [90.0, 150.0] {
            let wide = CatalogConfig {
                fov_radius_deg: fov,
                ..Default::default()
            };
            assert!(matches!(wide.validate(), Err(SelfcalError::InvalidInput(_))));
        }
        let just_under = CatalogConfig {
            fov_radius_deg: 89.9,
            ..Default::default()
        };
        just_under.validate().unwrap();

        let bad_floor = CatalogConfig {
            uncert_floor: -0.1,
            ..Default::default()
        };
        assert!(bad_floor.validate().is_err());
    }

    #[test]
    fn test_offset_spec_parsing() {
        assert_eq!("zero".parse::<OffsetSpec>().unwrap(), OffsetSpec::Zero);
        assert_eq!(
            "fixed:zp:-0.1".parse::<OffsetSpec>().unwrap(),
            OffsetSpec::Fixed {
                key: "zp".into(),
                delta: -0.1
            }
        );
        assert_eq!(
            "sys".parse::<OffsetSpec>().unwrap(),
            OffsetSpec::Systematic { sigma: 0.003 }
        );
        assert_eq!(
            "zp:0.02".parse::<OffsetSpec>().unwrap(),
            OffsetSpec::ZeroPoint { sigma: 0.02 }
        );
        assert_eq!(
            "snr:dmag_zp,dmag_sys".parse::<OffsetSpec>().unwrap(),
            OffsetSpec::Snr {
                after: Some(vec!["dmag_zp".into(), "dmag_sys".into()])
            }
        );
        assert!("fixed:zp".parse::<OffsetSpec>().is_err());
        assert!("sys:abc".parse::<OffsetSpec>().is_err());
        assert!("sys:-0.01".parse::<OffsetSpec>().is_err());
        assert!("zp:inf".parse::<OffsetSpec>().is_err());
        assert!("clouds".parse::<OffsetSpec>().is_err());
    }

    #[test]
    fn test_built_offsets_carry_expected_keys() {
        let specs = vec![
            OffsetSpec::Zero,
            OffsetSpec::Fixed {
                key: "zp".into(),
                delta: 0.0,
            },
            OffsetSpec::Systematic { sigma: 0.1 },
            OffsetSpec::ZeroPoint { sigma: 0.1 },
            OffsetSpec::Snr { after: None },
        ];
        let keys: Vec<String> = OffsetSpec::build_all(&specs)
            .iter()
            .map(|o| o.key().to_string())
            .collect();
        assert_eq!(keys, vec!["dmag_zero", "zp", "dmag_sys", "dmag_zp", "dmag_snr"]);
    }

    #[test]
    fn test_config_file_roundtrip_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"catalog": {{"band": "g", "fov_radius_deg": 1.75}},
                "offsets": [{{"type": "zero_point", "sigma": 0.02}}, {{"type": "snr"}}]}}"#
        )
        .unwrap();

        let loaded = SelfcalConfigFile::from_json_file(file.path()).unwrap();
        assert_eq!(loaded.catalog.band, Band::G);
        assert_eq!(loaded.catalog.fov_radius_deg, 1.75);
        assert_eq!(loaded.catalog.n_patches, 16);
        assert_eq!(
            loaded.offsets,
            vec![
                OffsetSpec::ZeroPoint { sigma: 0.02 },
                OffsetSpec::Snr { after: None }
            ]
        );
    }

    #[test]
    fn test_catalog_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"seed": 7, "parallel": true}}"#).unwrap();
        let config = CatalogConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.seed, 7);
        assert!(config.parallel);
        assert_eq!(config.band, Band::R);
    }

    #[test]
    fn test_malformed_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            SelfcalConfigFile::from_json_file(file.path()),
            Err(SelfcalError::Config(_))
        ));
    }
}
