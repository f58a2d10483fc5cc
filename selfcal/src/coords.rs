//! Spherical coordinate helpers.
//!
//! Longitudes/latitudes here are right ascension and declination. The
//! normalization helpers work in degrees; the unit-vector conversion expects
//! radians, matching what the spatial index consumes.

use nalgebra::Vector3;

/// Wrap a longitude in degrees into `[0, 360)`.
pub fn normalize_longitude(lon_deg: f64) -> f64 {
    let wrapped = lon_deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Saturate a latitude in degrees to `[-90, 90]`.
pub fn clamp_latitude(lat_deg: f64) -> f64 {
    lat_deg.clamp(-90.0, 90.0)
}

/// Convert spherical angles (radians) to a Cartesian unit vector.
///
/// ```text
/// x = cos(lat) cos(lon)
/// y = cos(lat) sin(lon)
/// z = sin(lat)
/// ```
pub fn to_unit_vector(lon_rad: f64, lat_rad: f64) -> Vector3<f64> {
    let (sin_lat, cos_lat) = lat_rad.sin_cos();
    let (sin_lon, cos_lon) = lon_rad.sin_cos();
    Vector3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
}

pub fn normalize_longitudes(lon_deg: &[f64]) -> Vec<f64> {
    lon_deg.iter().map(|&lon| normalize_longitude(lon)).collect()
}

pub fn clamp_latitudes(lat_deg: &[f64]) -> Vec<f64> {
    lat_deg.iter().map(|&lat| clamp_latitude(lat)).collect()
}

/// Vectorized [`to_unit_vector`]. Both slices must have the same length.
pub fn to_unit_vectors(lon_rad: &[f64], lat_rad: &[f64]) -> Vec<Vector3<f64>> {
    debug_assert_eq!(
        lon_rad.len(),
        lat_rad.len(),
        "longitude and latitude slices differ in length"
    );
    lon_rad
        .iter()
        .zip(lat_rad)
        .map(|(&lon, &lat)| to_unit_vector(lon, lat))
        .collect()
}
