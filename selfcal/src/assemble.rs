//! Reduce working candidate records to the output observation schema.

use crate::catalog::{Band, CandidateStar, ObservationRecord};

/// Project candidates down to `ObservationRecord`s, dropping the working
/// columns (`x`, `y`, `radius`, `sub_patch`).
pub fn assemble_records(candidates: &[CandidateStar], band: Band) -> Vec<ObservationRecord> {
    candidates
        .iter()
        .map(|c| ObservationRecord {
            id: c.star.id,
            patch_id: c.patch_id,
            observed_mag: c.observed_mag,
            mag_uncert: c.mag_uncert,
            true_mag: c.star.magnitude(band),
            ra: c.star.ra,
            dec: c.star.dec,
        })
        .collect()
}

/// Append per-visit record sets in visit order. No deduplication or sorting.
pub fn concatenate(per_visit: Vec<Vec<ObservationRecord>>) -> Vec<ObservationRecord> {
    let total = per_visit.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(total);
    for records in per_visit {
        out.extend(records);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BandMagnitudes, StarRecord};

    #[test]
    fn test_assemble_keeps_output_schema() {
        let mags = BandMagnitudes {
            u: 18.0,
            g: 17.0,
            r: 16.0,
            i: 15.5,
            z: 15.2,
            y: 15.0,
        };
        let mut c = CandidateStar::new(StarRecord::new(42, 10.0, -5.0, mags), 3);
        c.x = 0.01;
        c.patch_id = 17;
        c.sub_patch = 1;
        c.observed_mag = 15.9;
        c.mag_uncert = 0.006;

        let records = assemble_records(&[c], Band::G);
        assert_eq!(
            records,
            vec![ObservationRecord {
                id: 42,
                patch_id: 17,
                observed_mag: 15.9,
                mag_uncert: 0.006,
                true_mag: 17.0,
                ra: 10.0,
                dec: -5.0,
            }]
        );
    }

    #[test]
    fn test_concatenate_preserves_visit_order_and_duplicates() {
        let rec = |id: u64| ObservationRecord {
            id,
            patch_id: 0,
            observed_mag: 0.0,
            mag_uncert: 0.0,
            true_mag: 0.0,
            ra: 0.0,
            dec: 0.0,
        };
        let joined = concatenate(vec![vec![rec(3), rec(1)], vec![], vec![rec(3)]]);
        let ids: Vec<u64> = joined.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1, 3]);
    }
}
