//! Writers for cascade results.

use super::tsv_writer;
use crate::error::Result;
use crate::optimize::PcrErrorRatio;
use crate::pipeline::{CascadeSummary, DecisionLog};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes one row per log entry, `filter_delete` being 1 for deleted.
pub fn write_decisions<P: AsRef<Path>>(log: &DecisionLog, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut writer = tsv_writer(path)?;
    writer.write_record([
        "run",
        "marker",
        "biosample",
        "replicate",
        "variant",
        "read_count",
        "filter_name",
        "filter_delete",
    ])?;
    for decision in log.iter() {
        let key = decision.key;
        writer.write_record([
            key.run.to_string(),
            key.marker.to_string(),
            key.biosample.to_string(),
            key.replicate.to_string(),
            key.variant.to_string(),
            decision.read_count.to_string(),
            decision.filter.name().to_string(),
            u8::from(decision.deleted).to_string(),
        ])?;
    }
    writer.flush()?;
    info!("Wrote {} decisions to {}", log.len(), path.display());
    Ok(())
}

pub fn write_pcr_error_ratios<P: AsRef<Path>>(rows: &[PcrErrorRatio], path: P) -> Result<()> {
    let mut writer = tsv_writer(path.as_ref())?;
    writer.write_record([
        "run",
        "marker",
        "biosample",
        "variant_expected",
        "N_ij_expected",
        "variant_unexpected",
        "N_ij_unexpected",
        "N_ij_unexpected_to_expected_ratio",
    ])?;
    for row in rows {
        writer.write_record([
            row.run.to_string(),
            row.marker.to_string(),
            row.biosample.to_string(),
            row.variant_expected.to_string(),
            row.n_ij_expected.to_string(),
            row.variant_unexpected.to_string(),
            row.n_ij_unexpected.to_string(),
            format!("{:.8}", row.ratio),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary_json<P: AsRef<Path>>(summary: &CascadeSummary, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writer.flush()?;
    Ok(())
}
