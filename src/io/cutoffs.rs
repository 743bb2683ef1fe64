//! Cutoff overrides, known occurrences and precomputed neighbor pairs.

use super::read_rows;
use crate::count_table::{MarkerId, RunId, SeriesKey, VariantId};
use crate::error::Result;
use crate::neighbor::NeighborPair;
use crate::optimize::KnownOccurrence;
use crate::threshold::{insert_cutoff, Overrides};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct VariantCutoffRow {
    variant: VariantId,
    lfn_variant_cutoff: f64,
}

#[derive(Debug, Deserialize)]
struct SeriesCutoffRow {
    run: RunId,
    marker: MarkerId,
    variant: VariantId,
    lfn_variant_replicate_cutoff: f64,
}

/// Reads per-variant cutoffs (`variant, lfn_variant_cutoff`). Other columns
/// such as `run` and `marker` are ignored.
pub fn read_variant_cutoffs<P: AsRef<Path>>(path: P) -> Result<Overrides<VariantId>> {
    let rows: Vec<VariantCutoffRow> = read_rows(path)?;
    let mut map = Overrides::with_capacity(rows.len());
    for row in rows {
        insert_cutoff(&mut map, row.variant, row.lfn_variant_cutoff)?;
    }
    Ok(map)
}

/// Reads per-series cutoffs (`run, marker, variant, lfn_variant_replicate_cutoff`).
pub fn read_series_cutoffs<P: AsRef<Path>>(path: P) -> Result<Overrides<SeriesKey>> {
    let rows: Vec<SeriesCutoffRow> = read_rows(path)?;
    let mut map = Overrides::with_capacity(rows.len());
    for row in rows {
        insert_cutoff(
            &mut map,
            SeriesKey::new(row.run, row.marker, row.variant),
            row.lfn_variant_replicate_cutoff,
        )?;
    }
    Ok(map)
}

/// Reads `run, marker, biosample, mock, variant, action` rows.
pub fn read_known_occurrences<P: AsRef<Path>>(path: P) -> Result<Vec<KnownOccurrence>> {
    read_rows(path)
}

/// Reads `expected, unexpected` variant pairs.
pub fn read_neighbor_pairs<P: AsRef<Path>>(path: P) -> Result<Vec<NeighborPair>> {
    read_rows(path)
}
