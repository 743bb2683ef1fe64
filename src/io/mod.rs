//! TSV input and output.
//!
//! Every table is tab-separated with a header row. Inputs whose name ends in
//! `.gz` are decompressed on the fly.

pub mod cutoffs;
pub mod reports;

pub use cutoffs::{read_known_occurrences, read_neighbor_pairs, read_series_cutoffs, read_variant_cutoffs};
pub use reports::{write_decisions, write_pcr_error_ratios, write_summary_json};

use crate::count_table::{ReadCountRecord, ReadCountTable, Variant, VariantCatalog};
use crate::error::Result;
use flate2::read::MultiGzDecoder;
use log::{debug, info};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    if path.extension().map_or(false, |ext| ext == "gz") {
        debug!("Reading gzip-compressed {}", path.display());
        Ok(Box::new(MultiGzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

pub(crate) fn tsv_reader(path: &Path) -> Result<csv::Reader<Box<dyn Read>>> {
    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(open_input(path)?))
}

pub(crate) fn tsv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    let file = File::create(path)?;
    Ok(csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(BufWriter::new(file)))
}

/// Deserializes every row of a TSV file.
pub(crate) fn read_rows<T, P>(path: P) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let mut reader = tsv_reader(path)?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, csv::Error>>()?;
    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Reads a `run, marker, biosample, replicate, variant, read_count` table.
pub fn read_read_counts<P: AsRef<Path>>(path: P) -> Result<ReadCountTable> {
    let path = path.as_ref();
    let records: Vec<ReadCountRecord> = read_rows(path)?;
    let table = ReadCountTable::from_records(records)?;
    info!(
        "Loaded {} occurrences ({} reads) from {}",
        table.len(),
        table.total_reads(),
        path.display()
    );
    Ok(table)
}

/// Reads an `id, sequence` table.
pub fn read_variants<P: AsRef<Path>>(path: P) -> Result<VariantCatalog> {
    let path = path.as_ref();
    let variants: Vec<Variant> = read_rows(path)?;
    let catalog = VariantCatalog::from_variants(variants)?;
    info!("Loaded {} variants from {}", catalog.len(), path.display());
    Ok(catalog)
}

/// Writes a table in the format read by [`read_read_counts`].
pub fn write_read_counts<P: AsRef<Path>>(table: &ReadCountTable, path: P) -> Result<()> {
    let mut writer = tsv_writer(path.as_ref())?;
    for occurrence in table.occurrences() {
        writer.serialize(ReadCountRecord::from(occurrence))?;
    }
    writer.flush()?;
    Ok(())
}
