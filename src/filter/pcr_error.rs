//! PCR-error filter.
//!
//! Within each (run, marker, biosample), `N_ij` is the read total of variant
//! `i` over the surviving replicates of biosample `j`. For every neighbor pair
//! reported by the collaborator, the unexpected variant is deleted from the
//! biosample when `N_ij(unexpected) / N_ij(expected) < cutoff`.

use super::{below_cutoff, Surviving, Verdict};
use crate::count_table::{BiosampleKey, ReadCountTable, Variant, VariantCatalog, VariantId};
use crate::error::{FilterError, Result};
use crate::neighbor::{NeighborFinder, NeighborPair};
use crate::utils::parallel::{partition_by, try_map_partitions};
use indexmap::IndexMap;
use log::debug;
use std::collections::{BTreeMap, HashSet};

pub fn pcr_error_neighbor_ratio(
    surviving: &Surviving<'_>,
    catalog: &VariantCatalog,
    finder: &dyn NeighborFinder,
    cutoff: f64,
) -> Result<Vec<Verdict>> {
    let partitions = partition_by(surviving, |o| o.key.biosample_key());
    debug!(
        "pcr_error_neighbor_ratio: {} biosample partitions",
        partitions.len()
    );
    let per_biosample = try_map_partitions(&partitions, |biosample, indices| {
        evaluate_biosample(surviving.table(), biosample, indices, catalog, finder, cutoff)
    })?;
    Ok(per_biosample.into_iter().flatten().collect())
}

/// Per-variant read totals over the given occurrences, ordered by variant id.
pub(crate) fn variant_totals(table: &ReadCountTable, indices: &[usize]) -> BTreeMap<VariantId, u64> {
    let occurrences = table.occurrences();
    let mut totals = BTreeMap::new();
    for &idx in indices {
        let occurrence = &occurrences[idx];
        *totals.entry(occurrence.key.variant).or_insert(0) += occurrence.read_count;
    }
    totals
}

/// Looks up the sequences of `ids`, in order.
pub(crate) fn candidates<'a, I>(catalog: &VariantCatalog, ids: I) -> Result<Vec<Variant>>
where
    I: IntoIterator<Item = &'a VariantId>,
{
    ids.into_iter()
        .map(|&id| {
            catalog.sequence(id).map(|sequence| Variant {
                id,
                sequence: sequence.to_string(),
            })
        })
        .collect()
}

/// Rejects pairs that name variants outside the query or pair a variant with itself.
pub(crate) fn check_pairs<T>(
    biosample: &BiosampleKey,
    pairs: &[NeighborPair],
    known: &BTreeMap<VariantId, T>,
) -> Result<()> {
    for pair in pairs {
        if pair.expected == pair.unexpected {
            return Err(FilterError::UpstreamUnavailable(format!(
                "self-pair for variant {} in biosample {}",
                pair.expected, biosample
            )));
        }
        for id in [pair.expected, pair.unexpected] {
            if !known.contains_key(&id) {
                return Err(FilterError::UpstreamUnavailable(format!(
                    "pair names variant {} which is not in biosample {}",
                    id, biosample
                )));
            }
        }
    }
    Ok(())
}

fn evaluate_biosample(
    table: &ReadCountTable,
    biosample: &BiosampleKey,
    indices: &[usize],
    catalog: &VariantCatalog,
    finder: &dyn NeighborFinder,
    cutoff: f64,
) -> Result<Vec<Verdict>> {
    let totals = variant_totals(table, indices);
    let variants = candidates(catalog, totals.keys())?;
    let pairs = finder.find_pairs(&variants)?;
    check_pairs(biosample, &pairs, &totals)?;

    let mut deleted: IndexMap<VariantId, NeighborPair> = IndexMap::new();
    for pair in &pairs {
        let n_expected = totals[&pair.expected];
        let n_unexpected = totals[&pair.unexpected];
        if below_cutoff(n_unexpected, n_expected, cutoff) {
            deleted.entry(pair.unexpected).or_insert(*pair);
        }
    }
    for (variant, pair) in &deleted {
        debug!(
            "Biosample {}: variant {} ({} reads) is a PCR error of variant {} ({} reads)",
            biosample, variant, totals[variant], pair.expected, totals[&pair.expected]
        );
    }

    let deleted: HashSet<VariantId> = deleted.into_keys().collect();
    let occurrences = table.occurrences();
    Ok(indices
        .iter()
        .map(|&idx| Verdict::new(idx, deleted.contains(&occurrences[idx].key.variant)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::neighbor::PrecomputedNeighbors;
    use crate::test_fixtures::record;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn catalog(ids: &[VariantId]) -> VariantCatalog {
        VariantCatalog::from_variants(ids.iter().map(|&id| Variant {
            id,
            sequence: format!("ACGT{}", id),
        }))
        .unwrap()
    }

    fn table() -> ReadCountTable {
        ReadCountTable::from_records(vec![
            // biosample 1: variant 1 abundant, 2 a rare neighbor, 3 unrelated
            record(1, 1, 1, 1, 500),
            record(1, 1, 2, 1, 500),
            record(1, 1, 1, 2, 20),
            record(1, 1, 2, 2, 30),
            record(1, 1, 1, 3, 5),
            // biosample 2: variant 2 is comparable to variant 1
            record(1, 2, 1, 1, 100),
            record(1, 2, 1, 2, 40),
        ])
        .unwrap()
    }

    struct CountingFinder {
        inner: PrecomputedNeighbors,
        calls: AtomicUsize,
    }

    impl NeighborFinder for CountingFinder {
        fn find_pairs(&self, variants: &[Variant]) -> Result<Vec<NeighborPair>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.find_pairs(variants)
        }
    }

    struct FailingFinder;

    impl NeighborFinder for FailingFinder {
        fn find_pairs(&self, _variants: &[Variant]) -> Result<Vec<NeighborPair>> {
            Err(FilterError::UpstreamUnavailable("aligner crashed".to_string()))
        }
    }

    struct BogusFinder;

    impl NeighborFinder for BogusFinder {
        fn find_pairs(&self, _variants: &[Variant]) -> Result<Vec<NeighborPair>> {
            Ok(vec![NeighborPair::new(1, 99)])
        }
    }

    #[test]
    fn test_deletes_rare_neighbor_per_biosample() {
        let table = table();
        let surviving = Surviving::all(&table);
        let finder = CountingFinder {
            inner: PrecomputedNeighbors::new(vec![NeighborPair::new(1, 2), NeighborPair::new(2, 1)]),
            calls: AtomicUsize::new(0),
        };
        let verdicts =
            pcr_error_neighbor_ratio(&surviving, &catalog(&[1, 2, 3]), &finder, 0.1).unwrap();
        assert_eq!(verdicts.len(), table.len());
        assert_eq!(finder.calls.load(Ordering::SeqCst), 2);

        let mut deleted: Vec<bool> = vec![false; table.len()];
        for v in &verdicts {
            deleted[v.index] = v.deleted;
        }
        // 50 / 1000 < 0.1 in biosample 1, 40 / 100 passes in biosample 2
        assert_eq!(deleted, vec![false, false, true, true, false, false, false]);
    }

    #[test]
    fn test_ratio_equal_to_cutoff_passes() {
        let table = ReadCountTable::from_records(vec![record(1, 1, 1, 1, 100), record(1, 1, 1, 2, 10)])
            .unwrap();
        let surviving = Surviving::all(&table);
        let finder = PrecomputedNeighbors::new(vec![NeighborPair::new(1, 2)]);
        let verdicts = pcr_error_neighbor_ratio(&surviving, &catalog(&[1, 2]), &finder, 0.1).unwrap();
        assert!(verdicts.iter().all(|v| !v.deleted));
    }

    #[test]
    fn test_zero_expected_total_deletes_unexpected() {
        let table = ReadCountTable::from_records(vec![record(1, 1, 1, 1, 0), record(1, 1, 1, 2, 3)])
            .unwrap();
        let surviving = Surviving::all(&table);
        let finder = PrecomputedNeighbors::new(vec![NeighborPair::new(1, 2)]);
        let verdicts = pcr_error_neighbor_ratio(&surviving, &catalog(&[1, 2]), &finder, 0.1).unwrap();
        assert!(!verdicts[0].deleted);
        assert!(verdicts[1].deleted);
    }

    #[test]
    fn test_collaborator_failures() {
        let table = table();
        let surviving = Surviving::all(&table);
        let err = pcr_error_neighbor_ratio(&surviving, &catalog(&[1, 2, 3]), &FailingFinder, 0.1)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);

        let err = pcr_error_neighbor_ratio(&surviving, &catalog(&[1, 2, 3]), &BogusFinder, 0.1)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    }

    #[test]
    fn test_missing_sequence() {
        let table = table();
        let surviving = Surviving::all(&table);
        let finder = PrecomputedNeighbors::default();
        let err = pcr_error_neighbor_ratio(&surviving, &catalog(&[1, 2]), &finder, 0.1).unwrap_err();
        assert!(matches!(err, FilterError::MissingSequence(3)));
    }
}
