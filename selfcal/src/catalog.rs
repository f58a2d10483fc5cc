//! Catalog, visit and observation record types.
//!
//! Field names on the wire follow OpSim conventions (`fiveSigmaDepth`,
//! `rotSkyPos`, `observationId`, `rmag`, ...) so visit and star tables produced
//! by survey tooling deserialize without remapping.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::coords::{clamp_latitude, normalize_longitude};

/// Photometric band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    U,
    G,
    R,
    I,
    Z,
    Y,
}

impl Band {
    pub const ALL: [Band; 6] = [Band::U, Band::G, Band::R, Band::I, Band::Z, Band::Y];

    pub fn as_str(&self) -> &'static str {
        match self {
            Band::U => "u",
            Band::G => "g",
            Band::R => "r",
            Band::I => "i",
            Band::Z => "z",
            Band::Y => "y",
        }
    }

    /// Name of the catalog magnitude column for this band (e.g. `rmag`).
    pub fn magnitude_column(&self) -> String {
        format!("{}mag", self.as_str())
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Band {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "u" => Ok(Band::U),
            "g" => Ok(Band::G),
            "r" => Ok(Band::R),
            "i" => Ok(Band::I),
            "z" => Ok(Band::Z),
            "y" => Ok(Band::Y),
            other => Err(format!("Unknown band '{other}', expected one of ugrizy")),
        }
    }
}

/// True magnitudes of a star in every band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandMagnitudes {
    #[serde(rename = "umag")]
    pub u: f64,
    #[serde(rename = "gmag")]
    pub g: f64,
    #[serde(rename = "rmag")]
    pub r: f64,
    #[serde(rename = "imag")]
    pub i: f64,
    #[serde(rename = "zmag")]
    pub z: f64,
    #[serde(rename = "ymag")]
    pub y: f64,
}

impl BandMagnitudes {
    /// Same magnitude in all bands; handy for flat-spectrum test stars.
    pub fn uniform(mag: f64) -> Self {
        Self {
            u: mag,
            g: mag,
            r: mag,
            i: mag,
            z: mag,
            y: mag,
        }
    }

    pub fn get(&self, band: Band) -> f64 {
        match band {
            Band::U => self.u,
            Band::G => self.g,
            Band::R => self.r,
            Band::I => self.i,
            Band::Z => self.z,
            Band::Y => self.y,
        }
    }
}

/// Reference catalog entry holding the true properties of a star.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarRecord {
    pub id: u64,
    /// Right ascension in degrees
    pub ra: f64,
    /// Declination in degrees
    #[serde(alias = "decl")]
    pub dec: f64,
    #[serde(flatten)]
    pub magnitudes: BandMagnitudes,
}

impl StarRecord {
    pub fn new(id: u64, ra: f64, dec: f64, magnitudes: BandMagnitudes) -> Self {
        Self {
            id,
            ra,
            dec,
            magnitudes,
        }
    }

    pub fn magnitude(&self, band: Band) -> f64 {
        self.magnitudes.get(band)
    }

    /// Copy with RA wrapped into [0, 360) and Dec saturated to [-90, 90].
    pub fn sanitized(&self) -> Self {
        Self {
            ra: normalize_longitude(self.ra),
            dec: clamp_latitude(self.dec),
            ..self.clone()
        }
    }
}

/// A single telescope pointing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    #[serde(rename = "observationId", default)]
    pub observation_id: u64,
    /// Pointing right ascension in degrees
    pub ra: f64,
    /// Pointing declination in degrees
    pub dec: f64,
    /// Five-sigma limiting magnitude of the exposure
    #[serde(rename = "fiveSigmaDepth")]
    pub five_sigma_depth: f64,
    /// Sky rotation angle of the focal plane in degrees
    #[serde(rename = "rotSkyPos", default)]
    pub rot_sky_pos: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Band>,
    /// Any other survey columns carried along untouched
    #[serde(flatten)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl VisitRecord {
    pub fn new(observation_id: u64, ra: f64, dec: f64, five_sigma_depth: f64) -> Self {
        Self {
            observation_id,
            ra,
            dec,
            five_sigma_depth,
            rot_sky_pos: 0.0,
            filter: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_rotation(mut self, rot_sky_pos: f64) -> Self {
        self.rot_sky_pos = rot_sky_pos;
        self
    }

    pub fn with_filter(mut self, filter: Band) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sanitized(&self) -> Self {
        Self {
            ra: normalize_longitude(self.ra),
            dec: clamp_latitude(self.dec),
            ..self.clone()
        }
    }
}

/// Working copy of a star that fell inside a visit's field of view.
///
/// Derived fields start at zero and are filled by the projection, patch
/// assignment and offset stages for this one visit only.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateStar {
    pub star: StarRecord,
    /// Index of the star in the input catalog
    pub catalog_index: usize,
    /// Focal-plane tangent coordinates
    pub x: f64,
    pub y: f64,
    /// Distance from the field center in tangent-plane units
    pub radius: f64,
    pub patch_id: u64,
    pub sub_patch: u64,
    pub observed_mag: f64,
    pub mag_uncert: f64,
}

impl CandidateStar {
    pub fn new(star: StarRecord, catalog_index: usize) -> Self {
        Self {
            star,
            catalog_index,
            x: 0.0,
            y: 0.0,
            radius: 0.0,
            patch_id: 0,
            sub_patch: 0,
            observed_mag: 0.0,
            mag_uncert: 0.0,
        }
    }

    /// Slice the catalog at `indices` into fresh candidate records.
    pub fn slice_catalog(stars: &[StarRecord], indices: &[usize]) -> Vec<CandidateStar> {
        indices
            .iter()
            .map(|&idx| CandidateStar::new(stars[idx].clone(), idx))
            .collect()
    }
}

/// One modeled observation of one star in one visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub id: u64,
    pub patch_id: u64,
    pub observed_mag: f64,
    pub mag_uncert: f64,
    /// True magnitude in the configured band
    pub true_mag: f64,
    pub ra: f64,
    #[serde(rename = "decl")]
    pub dec: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_parse_roundtrip() {
        for band in Band::ALL {
            assert_eq!(band.as_str().parse::<Band>().unwrap(), band);
        }
        assert_eq!(" R ".parse::<Band>().unwrap(), Band::R);
        assert!("q".parse::<Band>().is_err());
        assert_eq!(Band::I.magnitude_column(), "imag");
    }

    #[test]
    fn test_star_deserializes_from_catalog_columns() {
        let json = r#"{"id": 7, "ra": 10.5, "decl": -3.0, "umag": 17.0, "gmag": 16.0,
                       "rmag": 15.0, "imag": 14.5, "zmag": 14.2, "ymag": 14.1}"#;
        let star: StarRecord = serde_json::from_str(json).unwrap();
        assert_eq!(star.id, 7);
        assert_eq!(star.dec, -3.0);
        assert_eq!(star.magnitude(Band::R), 15.0);
        assert_eq!(star.magnitude(Band::Y), 14.1);
    }

    #[test]
    fn test_visit_keeps_extra_metadata() {
        let json = r#"{"observationId": 12, "ra": 1.0, "dec": 2.0, "fiveSigmaDepth": 24.3,
                       "filter": "g", "night": 3, "note": "wfd"}"#;
        let visit: VisitRecord = serde_json::from_str(json).unwrap();
        assert_eq!(visit.observation_id, 12);
        assert_eq!(visit.rot_sky_pos, 0.0);
        assert_eq!(visit.filter, Some(Band::G));
        assert_eq!(visit.metadata["night"], serde_json::json!(3));
        assert_eq!(visit.metadata["note"], serde_json::json!("wfd"));
    }

    #[test]
    fn test_sanitized_positions() {
        let star = StarRecord::new(1, -30.0, 95.0, BandMagnitudes::uniform(20.0)).sanitized();
        assert_eq!(star.ra, 330.0);
        assert_eq!(star.dec, 90.0);

        let visit = VisitRecord::new(0, 370.0, -91.0, 24.0).sanitized();
        assert_eq!(visit.ra, 10.0);
        assert_eq!(visit.dec, -90.0);
    }

    #[test]
    fn test_slice_catalog_is_zero_initialized_copy() {
        let stars = vec![
            StarRecord::new(10, 0.0, 0.0, BandMagnitudes::uniform(15.0)),
            StarRecord::new(11, 1.0, 1.0, BandMagnitudes::uniform(16.0)),
        ];
        let candidates = CandidateStar::slice_catalog(&stars, &[1]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].catalog_index, 1);
        assert_eq!(candidates[0].star.id, 11);
        assert_eq!(candidates[0].observed_mag, 0.0);
        assert_eq!(candidates[0].patch_id, 0);
    }
}
