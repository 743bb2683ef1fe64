//! The read-count table: occurrences of variants across runs, markers,
//! biosamples and PCR replicates.
//!
//! Occurrences live in a flat arena (`Vec<Occurrence>`) addressed by index.
//! Filter stages never mutate the table; cascade state is kept alongside it
//! as a status vector indexed the same way.

use crate::error::{FilterError, Result};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub type RunId = u64;
pub type MarkerId = u64;
pub type BiosampleId = u64;
pub type ReplicateId = u64;
pub type VariantId = u64;

/// Unique identity of one occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OccurrenceKey {
    pub run: RunId,
    pub marker: MarkerId,
    pub biosample: BiosampleId,
    pub replicate: ReplicateId,
    pub variant: VariantId,
}

impl OccurrenceKey {
    pub fn new(
        run: RunId,
        marker: MarkerId,
        biosample: BiosampleId,
        replicate: ReplicateId,
        variant: VariantId,
    ) -> Self {
        OccurrenceKey {
            run,
            marker,
            biosample,
            replicate,
            variant,
        }
    }

    /// The replicate series this occurrence belongs to.
    pub fn series(&self) -> SeriesKey {
        SeriesKey {
            run: self.run,
            marker: self.marker,
            variant: self.variant,
        }
    }

    /// The PCR replicate this occurrence was counted in.
    pub fn replicate_key(&self) -> ReplicateKey {
        ReplicateKey {
            run: self.run,
            marker: self.marker,
            biosample: self.biosample,
            replicate: self.replicate,
        }
    }

    pub fn biosample_key(&self) -> BiosampleKey {
        BiosampleKey {
            run: self.run,
            marker: self.marker,
            biosample: self.biosample,
        }
    }
}

impl fmt::Display for OccurrenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(run {}, marker {}, biosample {}, replicate {}, variant {})",
            self.run, self.marker, self.biosample, self.replicate, self.variant
        )
    }
}

/// A variant within one run and marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub run: RunId,
    pub marker: MarkerId,
    pub variant: VariantId,
}

impl SeriesKey {
    pub fn new(run: RunId, marker: MarkerId, variant: VariantId) -> Self {
        SeriesKey {
            run,
            marker,
            variant,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(run {}, marker {}, variant {})",
            self.run, self.marker, self.variant
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplicateKey {
    pub run: RunId,
    pub marker: MarkerId,
    pub biosample: BiosampleId,
    pub replicate: ReplicateId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BiosampleKey {
    pub run: RunId,
    pub marker: MarkerId,
    pub biosample: BiosampleId,
}

impl fmt::Display for BiosampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(run {}, marker {}, biosample {})",
            self.run, self.marker, self.biosample
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub key: OccurrenceKey,
    pub read_count: u64,
}

/// One row as delivered by an external read-count source, before validation.
///
/// The count is signed so that a negative value can be reported as a data
/// error instead of failing to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadCountRecord {
    pub run: RunId,
    pub marker: MarkerId,
    pub biosample: BiosampleId,
    pub replicate: ReplicateId,
    pub variant: VariantId,
    pub read_count: i64,
}

impl ReadCountRecord {
    pub fn key(&self) -> OccurrenceKey {
        OccurrenceKey::new(
            self.run,
            self.marker,
            self.biosample,
            self.replicate,
            self.variant,
        )
    }
}

impl From<&Occurrence> for ReadCountRecord {
    fn from(occurrence: &Occurrence) -> Self {
        let key = occurrence.key;
        ReadCountRecord {
            run: key.run,
            marker: key.marker,
            biosample: key.biosample,
            replicate: key.replicate,
            variant: key.variant,
            read_count: occurrence.read_count as i64,
        }
    }
}

/// Arena of occurrences with a key index.
#[derive(Debug, Clone, Default)]
pub struct ReadCountTable {
    occurrences: Vec<Occurrence>,
    index: HashMap<OccurrenceKey, usize>,
}

impl ReadCountTable {
    /// Creates a new, empty table.
    pub fn new() -> Self {
        ReadCountTable {
            occurrences: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Builds a table from raw records, rejecting duplicate keys and negative counts.
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = ReadCountRecord>,
    {
        let mut table = ReadCountTable::new();
        for record in records {
            table.push(record)?;
        }
        Ok(table)
    }

    pub fn from_occurrences<I>(occurrences: I) -> Result<Self>
    where
        I: IntoIterator<Item = Occurrence>,
    {
        let mut table = ReadCountTable::new();
        for occurrence in occurrences {
            table.insert(occurrence)?;
        }
        Ok(table)
    }

    /// Validates and appends one record, returning its arena index.
    pub fn push(&mut self, record: ReadCountRecord) -> Result<usize> {
        let key = record.key();
        if record.read_count < 0 {
            return Err(FilterError::NegativeReadCount {
                key,
                value: record.read_count,
            });
        }
        self.insert(Occurrence {
            key,
            read_count: record.read_count as u64,
        })
    }

    fn insert(&mut self, occurrence: Occurrence) -> Result<usize> {
        if self.index.contains_key(&occurrence.key) {
            return Err(FilterError::DuplicateOccurrence(occurrence.key));
        }
        let idx = self.occurrences.len();
        self.index.insert(occurrence.key, idx);
        self.occurrences.push(occurrence);
        Ok(idx)
    }

    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }

    pub fn occurrences(&self) -> &[Occurrence] {
        &self.occurrences
    }

    /// Arena index of the occurrence with this key.
    pub fn position(&self, key: &OccurrenceKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn read_count(&self, key: &OccurrenceKey) -> Option<u64> {
        self.position(key).map(|idx| self.occurrences[idx].read_count)
    }

    /// Sorted, de-duplicated variant ids present in the table.
    pub fn variant_ids(&self) -> Vec<VariantId> {
        self.occurrences
            .iter()
            .map(|o| o.key.variant)
            .sorted_unstable()
            .dedup()
            .collect()
    }

    pub fn total_reads(&self) -> u64 {
        self.occurrences.iter().map(|o| o.read_count).sum()
    }
}

/// A candidate sequence variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub sequence: String,
}

/// Variant sequences keyed by id, in load order.
#[derive(Debug, Clone, Default)]
pub struct VariantCatalog {
    variants: IndexMap<VariantId, Variant>,
}

impl VariantCatalog {
    pub fn new() -> Self {
        VariantCatalog {
            variants: IndexMap::new(),
        }
    }

    pub fn from_variants<I>(variants: I) -> Result<Self>
    where
        I: IntoIterator<Item = Variant>,
    {
        let mut catalog = VariantCatalog::new();
        for variant in variants {
            if catalog.variants.contains_key(&variant.id) {
                return Err(FilterError::DuplicateVariant(variant.id));
            }
            catalog.variants.insert(variant.id, variant);
        }
        Ok(catalog)
    }

    /// Looks up the sequence of a variant that must be known.
    pub fn sequence(&self, id: VariantId) -> Result<&str> {
        self.variants
            .get(&id)
            .map(|v| v.sequence.as_str())
            .ok_or(FilterError::MissingSequence(id))
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}
