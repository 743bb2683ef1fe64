//! Filter rules applied by the cascade.
//!
//! Every rule is a pure function of the occurrences still alive at the start
//! of its stage and returns one [`Verdict`] per alive occurrence.

pub mod lfn;
pub mod pcr_error;
pub mod replicate;

pub use lfn::{
    below_cutoff, lfn_absolute_read_count, lfn_biosample_replicate, lfn_per_variant,
    lfn_per_variant_replicate_series, lfn_variant_dependent,
    lfn_variant_replicate_series_dependent,
};
pub use pcr_error::pcr_error_neighbor_ratio;
pub use replicate::min_replicate_number;

use crate::count_table::{Occurrence, ReadCountTable};
use crate::error::FilterError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies a filter stage. The names are written to the decision log and
/// must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FilterKind {
    #[serde(rename = "lfn_per_variant")]
    PerVariant,
    #[serde(rename = "lfn_per_variant_replicate_series")]
    PerVariantReplicateSeries,
    #[serde(rename = "lfn_absolute_read_count")]
    AbsoluteReadCount,
    #[serde(rename = "lfn_variant_dependent")]
    VariantDependent,
    #[serde(rename = "lfn_variant_replicate_series_dependent")]
    VariantReplicateSeriesDependent,
    #[serde(rename = "lfn_biosample_replicate")]
    BiosampleReplicate,
    #[serde(rename = "min_replicate_number")]
    MinReplicateNumber,
    #[serde(rename = "pcr_error_neighbor_ratio")]
    PcrErrorNeighborRatio,
}

/// Every filter, in the only order a cascade may run them.
pub const CANONICAL_ORDER: [FilterKind; 8] = [
    FilterKind::PerVariant,
    FilterKind::PerVariantReplicateSeries,
    FilterKind::AbsoluteReadCount,
    FilterKind::VariantDependent,
    FilterKind::VariantReplicateSeriesDependent,
    FilterKind::BiosampleReplicate,
    FilterKind::MinReplicateNumber,
    FilterKind::PcrErrorNeighborRatio,
];

/// The cascade run when no order is configured.
pub const DEFAULT_ORDER: [FilterKind; 5] = [
    FilterKind::PerVariant,
    FilterKind::PerVariantReplicateSeries,
    FilterKind::AbsoluteReadCount,
    FilterKind::BiosampleReplicate,
    FilterKind::PcrErrorNeighborRatio,
];

impl FilterKind {
    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::PerVariant => "lfn_per_variant",
            FilterKind::PerVariantReplicateSeries => "lfn_per_variant_replicate_series",
            FilterKind::AbsoluteReadCount => "lfn_absolute_read_count",
            FilterKind::VariantDependent => "lfn_variant_dependent",
            FilterKind::VariantReplicateSeriesDependent => {
                "lfn_variant_replicate_series_dependent"
            }
            FilterKind::BiosampleReplicate => "lfn_biosample_replicate",
            FilterKind::MinReplicateNumber => "min_replicate_number",
            FilterKind::PcrErrorNeighborRatio => "pcr_error_neighbor_ratio",
        }
    }

    /// Position in [`CANONICAL_ORDER`].
    pub fn rank(&self) -> usize {
        CANONICAL_ORDER
            .iter()
            .position(|kind| kind == self)
            .unwrap_or(CANONICAL_ORDER.len())
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterKind {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        CANONICAL_ORDER
            .iter()
            .copied()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| FilterError::UnknownFilter(name.to_string()))
    }
}

/// Outcome of one filter for one occurrence, addressed by arena index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub index: usize,
    pub deleted: bool,
}

impl Verdict {
    pub fn new(index: usize, deleted: bool) -> Self {
        Verdict { index, deleted }
    }
}

/// The occurrences alive at the start of a stage.
///
/// Group sums computed through this view only ever see these occurrences.
#[derive(Debug, Clone)]
pub struct Surviving<'a> {
    table: &'a ReadCountTable,
    indices: Vec<usize>,
}

impl<'a> Surviving<'a> {
    pub fn new(table: &'a ReadCountTable, indices: Vec<usize>) -> Self {
        Surviving { table, indices }
    }

    /// A view over the whole table.
    pub fn all(table: &'a ReadCountTable) -> Self {
        Surviving::new(table, (0..table.len()).collect())
    }

    pub fn table(&self) -> &'a ReadCountTable {
        self.table
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &'a Occurrence)> + '_ {
        let occurrences = self.table.occurrences();
        self.indices.iter().map(move |&idx| (idx, &occurrences[idx]))
    }
}
