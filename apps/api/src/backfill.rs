//! Offline neighborhood backfill.
//!
//! Reverse-geocodes records missing a neighborhood or borough and fills only
//! the empty labels. One record failing never stops the run.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::memories::store::RecordStore;
use crate::services::geocode::ReverseGeocoder;

pub const DEFAULT_BATCH: i64 = 200;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub scanned: usize,
    pub updated: usize,
    pub skipped: usize,
}

pub async fn run_backfill(
    store: &dyn RecordStore,
    geocoder: &dyn ReverseGeocoder,
    limit: i64,
    dry_run: bool,
) -> Result<BackfillReport> {
    let records = store.missing_locality(limit).await?;
    let mut report = BackfillReport {
        scanned: records.len(),
        ..Default::default()
    };
    info!("Backfill: {} records missing locality labels", records.len());

    for record in &records {
        let labels = match geocoder.locality(record.coordinate()).await {
            Ok(labels) => labels,
            Err(e) => {
                warn!("Backfill: geocoding memory {} failed: {e}", record.id);
                report.skipped += 1;
                continue;
            }
        };

        if labels.is_empty() {
            debug!("Backfill: no labels for memory {}", record.id);
            report.skipped += 1;
            continue;
        }

        if dry_run {
            info!(
                "Backfill (dry run): memory {} -> {:?} / {:?}",
                record.id, labels.neighborhood, labels.borough
            );
            report.updated += 1;
            continue;
        }

        match store.merge_locality(record.id, &labels).await {
            Ok(true) => report.updated += 1,
            Ok(false) => report.skipped += 1,
            Err(e) => {
                warn!("Backfill: writing memory {} failed: {e}", record.id);
                report.skipped += 1;
            }
        }
    }

    info!(
        "Backfill done: scanned {}, updated {}, skipped {}",
        report.scanned, report.updated, report.skipped
    );
    Ok(report)
}
