//! Pluggable photometric offset models.
//!
//! Each visit runs an ordered chain of [`Offset`] implementations. Every offset
//! contributes one named array of magnitude deltas, aligned one-to-one with the
//! candidate stars of that visit. Later offsets can read the deltas produced
//! earlier in the chain through [`OffsetContext::deltas`] but cannot modify
//! them.

pub mod models;

pub use models::{FixedOffset, NoOffset, SnrOffset, SystematicOffset, ZeroPointOffset};

use rand::RngCore;

use crate::catalog::{Band, CandidateStar, VisitRecord};
use crate::error::OffsetError;

/// A photometric perturbation applied to every candidate star of a visit.
pub trait Offset: Send + Sync {
    /// Unique name under which this offset's deltas are recorded.
    fn key(&self) -> &str;

    /// Compute one magnitude delta per candidate star.
    fn apply(&self, ctx: &mut OffsetContext<'_>) -> Result<Vec<f64>, OffsetError>;
}

/// Everything an offset may look at while computing its deltas.
pub struct OffsetContext<'a> {
    pub stars: &'a [CandidateStar],
    pub visit: &'a VisitRecord,
    pub band: Band,
    pub deltas: &'a OffsetDeltas,
    rng: &'a mut dyn RngCore,
}

impl<'a> OffsetContext<'a> {
    pub fn new(
        stars: &'a [CandidateStar],
        visit: &'a VisitRecord,
        band: Band,
        deltas: &'a OffsetDeltas,
        rng: &'a mut dyn RngCore,
    ) -> Self {
        Self {
            stars,
            visit,
            band,
            deltas,
            rng,
        }
    }

    /// Random stream for this visit. Seeded per visit, so draws never leak between visits.
    pub fn rng(&mut self) -> &mut dyn RngCore {
        &mut *self.rng
    }

    pub fn n_stars(&self) -> usize {
        self.stars.len()
    }

    /// True magnitudes of the candidates in the configured band.
    pub fn true_magnitudes(&self) -> Vec<f64> {
        self.stars
            .iter()
            .map(|c| c.star.magnitude(self.band))
            .collect()
    }

    /// True magnitudes plus every delta produced so far.
    pub fn current_magnitudes(&self) -> Vec<f64> {
        let mut mags = self.true_magnitudes();
        self.deltas.accumulate_into(&mut mags);
        mags
    }
}

/// Named per-star magnitude deltas, kept in the order they were produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OffsetDeltas {
    entries: Vec<(String, Vec<f64>)>,
}

impl OffsetDeltas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a new delta array. Returns the rejected key if it is already present.
    pub(crate) fn insert(&mut self, key: &str, values: Vec<f64>) -> Result<(), String> {
        if self.contains_key(key) {
            return Err(key.to_string());
        }
        self.entries.push((key.to_string(), values));
        Ok(())
    }

    /// Add every delta array onto `mags`, in insertion order.
    pub fn accumulate_into(&self, mags: &mut [f64]) {
        for (_, values) in &self.entries {
            for (m, d) in mags.iter_mut().zip(values) {
                *m += d;
            }
        }
    }

    /// Add only the named delta arrays onto `mags`.
    pub fn accumulate_keys_into(
        &self,
        keys: &[String],
        mags: &mut [f64],
    ) -> Result<(), OffsetError> {
        for key in keys {
            let values = self
                .get(key)
                .ok_or_else(|| OffsetError::MissingDelta(key.clone()))?;
            for (m, d) in mags.iter_mut().zip(values) {
                *m += d;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deltas_preserve_order_and_reject_duplicates() {
        let mut deltas = OffsetDeltas::new();
        deltas.insert("b", vec![1.0]).unwrap();
        deltas.insert("a", vec![2.0]).unwrap();
        assert_eq!(deltas.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(deltas.insert("b", vec![3.0]), Err("b".to_string()));
        assert_eq!(deltas.get("b"), Some(&[1.0][..]));
        assert_eq!(deltas.len(), 2);
    }

    #[test]
    fn test_accumulate() {
        let mut deltas = OffsetDeltas::new();
        deltas.insert("x", vec![0.1, 0.2]).unwrap();
        deltas.insert("y", vec![-0.05, 0.0]).unwrap();

        let mut mags = vec![10.0, 11.0];
        deltas.accumulate_into(&mut mags);
        assert_eq!(mags, vec![10.0 + 0.1 + -0.05, 11.0 + 0.2 + 0.0]);

        let mut only_y = vec![10.0, 11.0];
        deltas
            .accumulate_keys_into(&["y".to_string()], &mut only_y)
            .unwrap();
        assert_eq!(only_y, vec![10.0 - 0.05, 11.0]);

        let missing = deltas.accumulate_keys_into(&["z".to_string()], &mut only_y);
        assert!(matches!(missing, Err(OffsetError::MissingDelta(k)) if k == "z"));
    }
}
