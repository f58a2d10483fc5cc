//! A run without offsets returns nothing and says so through the log.
//!
//! Lives in its own test binary because it installs a process-wide logger.

use std::sync::Mutex;

use log::{Level, LevelFilter, Log, Metadata, Record};
use selfcal::catalog::{BandMagnitudes, StarRecord, VisitRecord};
use selfcal::offsets::Offset;
use selfcal::{generate_catalog, CatalogConfig};

struct CaptureLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(mut records) = self.records.lock() {
            records.push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger {
    records: Mutex::new(Vec::new()),
};

fn warnings() -> Vec<String> {
    LOGGER
        .records
        .lock()
        .unwrap()
        .iter()
        .filter(|(level, _)| *level == Level::Warn)
        .map(|(_, msg)| msg.clone())
        .collect()
}

#[test]
fn test_missing_offsets_warn_and_return_none() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let stars = vec![StarRecord::new(1, 0.0, 0.0, BandMagnitudes::uniform(15.0))];
    let visits = vec![VisitRecord::new(0, 0.0, 0.0, 24.0)];
    let config = CatalogConfig::default();

    let result = generate_catalog(&visits, &stars, None, &config).unwrap();
    assert!(result.is_none());
    let after_none = warnings();
    assert_eq!(after_none.len(), 1);
    assert!(after_none[0].contains("No offsets configured"));

    let empty: Vec<Box<dyn Offset>> = Vec::new();
    let result = generate_catalog(&visits, &stars, Some(&empty), &config).unwrap();
    assert!(result.is_none());
    assert_eq!(warnings().len(), 2);
}
