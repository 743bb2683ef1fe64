//! Calibration table for the PCR-error cutoff.
//!
//! Mock biosamples have a known composition. For each mock biosample, every
//! one-mismatch pair of a known (`keep`) variant and an unknown variant is
//! listed with the ratio of their read totals. The largest ratios in the
//! table give an upper bound for `pcr_error_var_prop` that still removes the
//! unknown variants.

use crate::count_table::{
    BiosampleId, BiosampleKey, MarkerId, ReadCountTable, RunId, VariantCatalog, VariantId,
};
use crate::error::Result;
use crate::filter::pcr_error::{candidates, check_pairs, variant_totals};
use crate::filter::Surviving;
use crate::neighbor::NeighborFinder;
use crate::utils::parallel::{partition_by, try_map_partitions};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnownAction {
    Keep,
    Delete,
    Tolerate,
}

/// One row of the known-occurrences file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownOccurrence {
    pub run: RunId,
    pub marker: MarkerId,
    pub biosample: BiosampleId,
    /// 1 for mock biosamples.
    pub mock: u8,
    pub variant: VariantId,
    pub action: KnownAction,
}

impl KnownOccurrence {
    pub fn is_mock(&self) -> bool {
        self.mock == 1
    }

    pub fn biosample_key(&self) -> BiosampleKey {
        BiosampleKey {
            run: self.run,
            marker: self.marker,
            biosample: self.biosample,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PcrErrorRatio {
    pub run: RunId,
    pub marker: MarkerId,
    pub biosample: BiosampleId,
    pub variant_expected: VariantId,
    pub n_ij_expected: u64,
    pub variant_unexpected: VariantId,
    pub n_ij_unexpected: u64,
    pub ratio: f64,
}

/// Expected variants of every mock biosample.
fn expected_variants(known: &[KnownOccurrence]) -> HashMap<BiosampleKey, BTreeSet<VariantId>> {
    let mut expected: HashMap<BiosampleKey, BTreeSet<VariantId>> = HashMap::new();
    for occurrence in known
        .iter()
        .filter(|o| o.is_mock() && o.action == KnownAction::Keep)
    {
        expected
            .entry(occurrence.biosample_key())
            .or_default()
            .insert(occurrence.variant);
    }
    expected
}

pub fn pcr_error_ratios(
    table: &ReadCountTable,
    known: &[KnownOccurrence],
    catalog: &VariantCatalog,
    finder: &dyn NeighborFinder,
) -> Result<Vec<PcrErrorRatio>> {
    let expected = expected_variants(known);
    let all = Surviving::all(table);
    let mut partitions = partition_by(&all, |o| o.key.biosample_key());
    partitions.retain(|biosample, _| expected.contains_key(biosample));
    info!(
        "Computing PCR-error ratios for {} mock biosamples",
        partitions.len()
    );

    let per_biosample = try_map_partitions(&partitions, |biosample, indices| -> Result<Vec<PcrErrorRatio>> {
        let keep = &expected[biosample];
        let totals = variant_totals(table, indices);
        let variants = candidates(catalog, totals.keys())?;
        let pairs = finder.find_pairs(&variants)?;
        check_pairs(biosample, &pairs, &totals)?;

        let mut rows = Vec::new();
        for pair in pairs {
            if !keep.contains(&pair.expected) || keep.contains(&pair.unexpected) {
                continue;
            }
            let n_expected = totals[&pair.expected];
            let n_unexpected = totals[&pair.unexpected];
            if n_expected == 0 {
                debug!(
                    "Biosample {}: expected variant {} has no reads, no ratio for {}",
                    biosample, pair.expected, pair.unexpected
                );
                continue;
            }
            rows.push(PcrErrorRatio {
                run: biosample.run,
                marker: biosample.marker,
                biosample: biosample.biosample,
                variant_expected: pair.expected,
                n_ij_expected: n_expected,
                variant_unexpected: pair.unexpected,
                n_ij_unexpected: n_unexpected,
                ratio: n_unexpected as f64 / n_expected as f64,
            });
        }
        Ok(rows)
    })?;

    let mut rows: Vec<PcrErrorRatio> = per_biosample.into_iter().flatten().collect();
    rows.sort_by(|a, b| {
        (a.run, a.marker)
            .cmp(&(b.run, b.marker))
            .then(b.ratio.total_cmp(&a.ratio))
            .then(a.variant_expected.cmp(&b.variant_expected))
            .then(a.variant_unexpected.cmp(&b.variant_unexpected))
    });
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::count_table::Variant;
    use crate::neighbor::{NeighborPair, PrecomputedNeighbors};
    use crate::test_fixtures::record;
    use approx::assert_relative_eq;

    fn known(biosample: BiosampleId, mock: u8, variant: VariantId, action: KnownAction) -> KnownOccurrence {
        KnownOccurrence {
            run: 1,
            marker: 1,
            biosample,
            mock,
            variant,
            action,
        }
    }

    fn catalog() -> VariantCatalog {
        VariantCatalog::from_variants((1..=5).map(|id| Variant {
            id,
            sequence: format!("ACGT{}", id),
        }))
        .unwrap()
    }

    #[test]
    fn test_ratios_for_mock_biosamples() {
        let table = ReadCountTable::from_records(vec![
            // mock biosample 1: 1 and 2 expected, 3 and 4 unknown
            record(1, 1, 1, 1, 400),
            record(1, 1, 2, 1, 600),
            record(1, 1, 1, 2, 200),
            record(1, 1, 1, 3, 30),
            record(1, 1, 2, 3, 20),
            record(1, 1, 1, 4, 2),
            // biosample 2 is not a mock
            record(1, 2, 1, 1, 100),
            record(1, 2, 1, 3, 90),
        ])
        .unwrap();
        let known = vec![
            known(1, 1, 1, KnownAction::Keep),
            known(1, 1, 2, KnownAction::Keep),
            known(1, 1, 5, KnownAction::Delete),
            known(2, 0, 1, KnownAction::Keep),
        ];
        let finder = PrecomputedNeighbors::new(vec![
            NeighborPair::new(1, 3),
            NeighborPair::new(3, 1),
            NeighborPair::new(2, 4),
            NeighborPair::new(1, 2),
        ]);

        let rows = pcr_error_ratios(&table, &known, &catalog(), &finder).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].variant_expected, rows[0].variant_unexpected), (1, 3));
        assert_eq!((rows[0].n_ij_expected, rows[0].n_ij_unexpected), (1000, 50));
        assert_relative_eq!(rows[0].ratio, 0.05);
        assert_eq!((rows[1].variant_expected, rows[1].variant_unexpected), (2, 4));
        assert_relative_eq!(rows[1].ratio, 0.01);
        assert!(rows.iter().all(|r| r.biosample == 1));
    }

    #[test]
    fn test_zero_expected_total_is_omitted() {
        let table =
            ReadCountTable::from_records(vec![record(1, 1, 1, 1, 0), record(1, 1, 1, 2, 7)]).unwrap();
        let known = vec![known(1, 1, 1, KnownAction::Keep)];
        let finder = PrecomputedNeighbors::new(vec![NeighborPair::new(1, 2)]);
        let rows = pcr_error_ratios(&table, &known, &catalog(), &finder).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_action_names() {
        let action: KnownAction = serde_json::from_str("\"tolerate\"").unwrap();
        assert_eq!(action, KnownAction::Tolerate);
    }
}
