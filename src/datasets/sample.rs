//! Demonstration collector
//!
//! Writes a small set of built-in announcements as raw batch files, one per
//! requested source, laid out as `{raw_dir}/{YYYY-MM-DD}/bgp_{source}.json`.
//! Stands in for a real collector when exercising the pipeline end to end.

use crate::pipeline::RawAnnouncement;
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::info;

/// Source name that selects every sample announcement
pub const ALL_SOURCES: &str = "all";

/// Built-in announcements
pub fn sample_announcements() -> Vec<RawAnnouncement> {
    let sample = |prefix: &str, as_path: &str, origin_asn: u32, source_code: &str| {
        RawAnnouncement {
            prefix: prefix.to_string(),
            as_path: as_path.to_string(),
            origin_asn,
            source_code: Some(source_code.to_string()),
            source_type: Some("ixp".to_string()),
        }
    };

    vec![
        sample("200.160.0.0/16", "65001 65002 65003", 65003, "ixp_df"),
        sample("187.16.0.0/20", "65010 65020", 65020, "global"),
        RawAnnouncement {
            source_type: Some("global".to_string()),
            ..sample("2804:10::/32", "64512 64513", 64513, "ixp_sp")
        },
    ]
}

/// Path of the raw file for `source` on `snapshot_date`
pub fn raw_file_path(raw_dir: &Path, snapshot_date: NaiveDate, source: &str) -> PathBuf {
    raw_dir
        .join(snapshot_date.format("%Y-%m-%d").to_string())
        .join(format!("bgp_{}.json", source))
}

/// Announcements written for `source`
///
/// A source that matches nothing gets every announcement, as does [`ALL_SOURCES`].
fn payload_for(source: &str) -> Vec<RawAnnouncement> {
    let all = sample_announcements();
    let matching: Vec<RawAnnouncement> = all
        .iter()
        .filter(|a| source == ALL_SOURCES || a.source_code.as_deref() == Some(source))
        .cloned()
        .collect();

    if matching.is_empty() {
        all
    } else {
        matching
    }
}

/// Write one raw file per source and return the paths, in source order.
///
/// An existing file is reused as is unless `force` is set.
pub fn collect_sample(
    raw_dir: &Path,
    snapshot_date: NaiveDate,
    sources: &[String],
    force: bool,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(sources.len());

    for source in sources {
        let raw_path = raw_file_path(raw_dir, snapshot_date, source);
        if raw_path.exists() && !force {
            info!("Reusing raw file {}", raw_path.display());
            written.push(raw_path);
            continue;
        }

        if let Some(parent) = raw_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow!("Unable to create raw directory {}: {}", parent.display(), e)
            })?;
        }

        let payload = payload_for(source);
        let content = serde_json::to_string_pretty(&payload)?;
        std::fs::write(&raw_path, content)
            .map_err(|e| anyhow!("Unable to write raw file {}: {}", raw_path.display(), e))?;
        info!(
            "Wrote {} announcement(s) to {}",
            payload.len(),
            raw_path.display()
        );
        written.push(raw_path);
    }

    Ok(written)
}
