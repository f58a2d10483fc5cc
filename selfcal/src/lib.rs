//! Simulated observed-magnitude catalogs for photometric self-calibration.
//!
//! Given a list of telescope visits and a reference catalog of true stellar
//! properties, this crate finds which stars fall within each visit's field of
//! view, applies an ordered chain of photometric offset models to their true
//! magnitudes, and emits one modeled observation per (star, visit) pair.
//!
//! # Pipeline
//!
//! ```text
//! stars ──► StarIndex (built once)
//!                │
//! visits ──► query_candidates ─► Projector ─► PatchAssigner
//!                                                 │
//!                     compose_offsets ◄───────────┘
//!                           │
//!              UncertaintyModel + floor ─► assemble_records ─► concatenate
//! ```
//!
//! # Example
//!
//! ```rust
//! use selfcal::catalog::{BandMagnitudes, StarRecord, VisitRecord};
//! use selfcal::offsets::{FixedOffset, Offset};
//! use selfcal::{generate_catalog, CatalogConfig};
//!
//! let stars = vec![StarRecord::new(1, 0.0, 0.0, BandMagnitudes::uniform(15.0))];
//! let visits = vec![VisitRecord::new(0, 0.0, 0.0, 24.0)];
//! let offsets: Vec<Box<dyn Offset>> = vec![Box::new(FixedOffset::new("zp", -0.1))];
//!
//! let observations = generate_catalog(&visits, &stars, Some(&offsets), &CatalogConfig::default())
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(observations.len(), 1);
//! assert!((observations[0].observed_mag - 14.9).abs() < 1e-12);
//! ```

pub mod assemble;
pub mod catalog;
pub mod compose;
pub mod config;
pub mod coords;
pub mod error;
pub mod offsets;
pub mod pipeline;
pub mod projection;
pub mod spatial;
pub mod uncertainty;

pub use catalog::{Band, CandidateStar, ObservationRecord, StarRecord, VisitRecord};
pub use config::{CatalogConfig, OffsetSpec, SelfcalConfigFile};
pub use error::{OffsetError, SelfcalError};
pub use offsets::{Offset, OffsetContext, OffsetDeltas};
pub use pipeline::{generate_catalog, CatalogGenerator};
pub use spatial::StarIndex;
