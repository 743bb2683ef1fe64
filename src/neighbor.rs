//! Near-neighbor variant pairs for the PCR-error filter.
//!
//! The cascade only needs one capability from an alignment engine: given the
//! variants observed in a biosample, list the pairs that differ by a single
//! nucleotide. [`NeighborFinder`] is that seam.

use crate::count_table::{Variant, VariantId};
use crate::error::Result;
use bio::alignment::distance::levenshtein;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An ordered pair: `unexpected` is tested as a PCR error of `expected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NeighborPair {
    pub expected: VariantId,
    pub unexpected: VariantId,
}

impl NeighborPair {
    pub fn new(expected: VariantId, unexpected: VariantId) -> Self {
        NeighborPair {
            expected,
            unexpected,
        }
    }
}

pub trait NeighborFinder: Send + Sync {
    /// Returns the pairs of `variants` that are one nucleotide apart.
    ///
    /// Failures must be reported as `FilterError::UpstreamUnavailable`.
    fn find_pairs(&self, variants: &[Variant]) -> Result<Vec<NeighborPair>>;
}

/// Edit-distance neighbors: one substitution, insertion or deletion.
///
/// Both orientations of every pair are returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevenshteinNeighborFinder;

impl NeighborFinder for LevenshteinNeighborFinder {
    fn find_pairs(&self, variants: &[Variant]) -> Result<Vec<NeighborPair>> {
        let upper: Vec<(VariantId, Vec<u8>)> = variants
            .iter()
            .map(|v| (v.id, v.sequence.to_ascii_uppercase().into_bytes()))
            .collect();
        let pairs = upper
            .iter()
            .tuple_combinations()
            .filter(|((_, a), (_, b))| a.len().abs_diff(b.len()) <= 1 && levenshtein(a, b) == 1)
            .flat_map(|((id_a, _), (id_b, _))| {
                [NeighborPair::new(*id_a, *id_b), NeighborPair::new(*id_b, *id_a)]
            })
            .collect();
        Ok(pairs)
    }
}

/// Pairs computed ahead of time, e.g. loaded from a file.
///
/// Returns the subset of its pairs whose variants are both in the query.
#[derive(Debug, Clone, Default)]
pub struct PrecomputedNeighbors {
    pairs: Vec<NeighborPair>,
}

impl PrecomputedNeighbors {
    pub fn new(pairs: Vec<NeighborPair>) -> Self {
        PrecomputedNeighbors { pairs }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl NeighborFinder for PrecomputedNeighbors {
    fn find_pairs(&self, variants: &[Variant]) -> Result<Vec<NeighborPair>> {
        let present: HashSet<VariantId> = variants.iter().map(|v| v.id).collect();
        Ok(self
            .pairs
            .iter()
            .filter(|p| present.contains(&p.expected) && present.contains(&p.unexpected))
            .copied()
            .collect())
    }
}
