//! The filter cascade.
//!
//! Occurrences live in the [`ReadCountTable`] arena; the cascade keeps one
//! [`OccurrenceStatus`] per arena slot. Each stage only sees the occurrences
//! that are still alive, and an occurrence deleted by one stage is never
//! evaluated again. Every stage appends one [`FilterDecision`] per occurrence
//! of the table to the [`DecisionLog`], so the log shows the full history of
//! each occurrence.

use super::report::{CascadeSummary, StageSummary};
use crate::config::CascadeConfig;
use crate::count_table::{Occurrence, OccurrenceKey, ReadCountTable, VariantCatalog};
use crate::error::{ErrorKind, FilterError, Result};
use crate::filter::{
    lfn_absolute_read_count, lfn_biosample_replicate, lfn_per_variant,
    lfn_per_variant_replicate_series, lfn_variant_dependent,
    lfn_variant_replicate_series_dependent, min_replicate_number, pcr_error_neighbor_ratio,
    FilterKind, Surviving, Verdict,
};
use crate::neighbor::NeighborFinder;
use log::{debug, info, warn};
use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OccurrenceStatus {
    Alive,
    Deleted(FilterKind),
}

impl OccurrenceStatus {
    pub fn is_alive(&self) -> bool {
        matches!(self, OccurrenceStatus::Alive)
    }
}

/// Status of an occurrence once the cascade has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FinalStatus {
    Kept,
    Deleted(FilterKind),
}

impl From<OccurrenceStatus> for FinalStatus {
    fn from(status: OccurrenceStatus) -> Self {
        match status {
            OccurrenceStatus::Alive => FinalStatus::Kept,
            OccurrenceStatus::Deleted(filter) => FinalStatus::Deleted(filter),
        }
    }
}

/// One row of the decision log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilterDecision {
    pub key: OccurrenceKey,
    pub read_count: u64,
    pub filter: FilterKind,
    pub deleted: bool,
}

/// Append-only record of every stage's outcome for every occurrence.
#[derive(Debug, Clone, Default)]
pub struct DecisionLog {
    entries: Vec<FilterDecision>,
}

impl DecisionLog {
    pub fn new() -> Self {
        DecisionLog::default()
    }

    pub fn push(&mut self, decision: FilterDecision) {
        self.entries.push(decision);
    }

    pub fn extend<I: IntoIterator<Item = FilterDecision>>(&mut self, decisions: I) {
        self.entries.extend(decisions);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FilterDecision] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterDecision> {
        self.entries.iter()
    }

    /// Entries written by `filter`, in arena order.
    pub fn for_filter(&self, filter: FilterKind) -> impl Iterator<Item = &FilterDecision> {
        self.entries.iter().filter(move |d| d.filter == filter)
    }
}

/// Runs the configured filters, in order, over a read-count table.
pub struct Cascade<'a> {
    config: CascadeConfig,
    neighbors: Option<(&'a VariantCatalog, &'a dyn NeighborFinder)>,
}

impl<'a> Cascade<'a> {
    pub fn new(config: CascadeConfig) -> Self {
        Cascade {
            config,
            neighbors: None,
        }
    }

    /// Attaches the variant sequences and the neighbor collaborator used by
    /// the PCR-error stage.
    pub fn with_neighbors(mut self, catalog: &'a VariantCatalog, finder: &'a dyn NeighborFinder) -> Self {
        self.neighbors = Some((catalog, finder));
        self
    }

    pub fn run<'t>(&self, table: &'t ReadCountTable) -> Result<CascadeOutcome<'t>> {
        self.config.validate()?;
        let start = Instant::now();
        info!(
            "Running cascade [{}] over {} occurrences",
            self.config
                .order
                .iter()
                .map(FilterKind::name)
                .collect::<Vec<_>>()
                .join(" -> "),
            table.len()
        );

        let mut status = vec![OccurrenceStatus::Alive; table.len()];
        let mut log = DecisionLog::new();
        let mut summary = CascadeSummary::new(table.len(), table.total_reads());

        for &filter in &self.config.order {
            let alive: Vec<usize> = status
                .iter()
                .enumerate()
                .filter(|(_, s)| s.is_alive())
                .map(|(idx, _)| idx)
                .collect();
            let surviving = Surviving::new(table, alive);

            let verdicts = match self.evaluate(filter, &surviving) {
                Ok(verdicts) => verdicts,
                Err(err) if self.skippable(filter, &err) => {
                    warn!("Skipping optional filter '{}': {}", filter, err);
                    summary.skipped.push(filter);
                    continue;
                }
                Err(err) => return Err(err),
            };
            debug_assert_eq!(verdicts.len(), surviving.len());

            let mut deleted = 0;
            for verdict in verdicts.iter().filter(|v| v.deleted) {
                status[verdict.index] = OccurrenceStatus::Deleted(filter);
                deleted += 1;
            }
            log.extend(
                table
                    .occurrences()
                    .iter()
                    .zip(&status)
                    .map(|(occurrence, s)| FilterDecision {
                        key: occurrence.key,
                        read_count: occurrence.read_count,
                        filter,
                        deleted: !s.is_alive(),
                    }),
            );

            let stage = StageSummary::new(
                filter,
                surviving.len(),
                deleted,
                table
                    .occurrences()
                    .iter()
                    .zip(&status)
                    .filter(|(_, s)| s.is_alive())
                    .map(|(o, _)| o.read_count),
            );
            info!(
                "{}: evaluated {}, deleted {}, {} occurrences remain",
                filter, stage.evaluated, stage.deleted, stage.surviving
            );
            if stage.surviving == 0 && stage.evaluated > 0 {
                warn!("{} deleted every remaining occurrence", filter);
            }
            summary.stages.push(stage);
        }

        summary.kept_occurrences = status.iter().filter(|s| s.is_alive()).count();
        summary.kept_reads = table
            .occurrences()
            .iter()
            .zip(&status)
            .filter(|(_, s)| s.is_alive())
            .map(|(o, _)| o.read_count)
            .sum();
        info!(
            "Cascade finished in {:.2?}: kept {} of {} occurrences",
            start.elapsed(),
            summary.kept_occurrences,
            table.len()
        );

        Ok(CascadeOutcome {
            table,
            status,
            log,
            summary,
        })
    }

    fn skippable(&self, filter: FilterKind, err: &FilterError) -> bool {
        filter == FilterKind::PcrErrorNeighborRatio
            && !self.config.pcr_error_required
            && err.kind() == ErrorKind::UpstreamUnavailable
    }

    fn evaluate(&self, filter: FilterKind, surviving: &Surviving<'_>) -> Result<Vec<Verdict>> {
        debug!("{}: evaluating {} occurrences", filter, surviving.len());
        let config = &self.config;
        let verdicts = match filter {
            FilterKind::PerVariant => lfn_per_variant(surviving, &config.lfn_variant),
            FilterKind::PerVariantReplicateSeries => {
                lfn_per_variant_replicate_series(surviving, &config.lfn_variant_replicate)
            }
            FilterKind::AbsoluteReadCount => {
                lfn_absolute_read_count(surviving, config.lfn_read_count_cutoff)
            }
            FilterKind::VariantDependent => {
                let cutoffs = config
                    .lfn_variant_dependent
                    .as_ref()
                    .ok_or(FilterError::MissingFilterParams(filter))?;
                lfn_variant_dependent(surviving, cutoffs)?
            }
            FilterKind::VariantReplicateSeriesDependent => {
                let cutoffs = config
                    .lfn_variant_replicate_dependent
                    .as_ref()
                    .ok_or(FilterError::MissingFilterParams(filter))?;
                lfn_variant_replicate_series_dependent(surviving, cutoffs)?
            }
            FilterKind::BiosampleReplicate => {
                lfn_biosample_replicate(surviving, config.lfn_biosample_replicate_cutoff)
            }
            FilterKind::MinReplicateNumber => {
                min_replicate_number(surviving, config.min_replicate_number)
            }
            FilterKind::PcrErrorNeighborRatio => {
                let (catalog, finder) = self.neighbors.ok_or_else(|| {
                    FilterError::UpstreamUnavailable(
                        "no neighbor collaborator is attached".to_string(),
                    )
                })?;
                pcr_error_neighbor_ratio(surviving, catalog, finder, config.pcr_error_var_prop)?
            }
        };
        Ok(verdicts)
    }
}

/// Final state of a cascade run.
#[derive(Debug, Clone)]
pub struct CascadeOutcome<'t> {
    table: &'t ReadCountTable,
    status: Vec<OccurrenceStatus>,
    log: DecisionLog,
    summary: CascadeSummary,
}

impl<'t> CascadeOutcome<'t> {
    pub fn table(&self) -> &'t ReadCountTable {
        self.table
    }

    /// `None` if `key` is not in the table.
    pub fn status(&self, key: &OccurrenceKey) -> Option<FinalStatus> {
        self.table
            .position(key)
            .map(|idx| FinalStatus::from(self.status[idx]))
    }

    pub fn first_deleting_filter(&self, key: &OccurrenceKey) -> Option<FilterKind> {
        match self.status(key)? {
            FinalStatus::Deleted(filter) => Some(filter),
            FinalStatus::Kept => None,
        }
    }

    /// Every executed stage's outcome for `key`, in cascade order.
    pub fn history(&self, key: &OccurrenceKey) -> Vec<(FilterKind, bool)> {
        self.log
            .iter()
            .filter(|d| d.key == *key)
            .map(|d| (d.filter, d.deleted))
            .collect()
    }

    pub fn statuses(&self) -> impl Iterator<Item = (&'t Occurrence, FinalStatus)> + '_ {
        self.table
            .occurrences()
            .iter()
            .zip(&self.status)
            .map(|(o, &s)| (o, FinalStatus::from(s)))
    }

    /// Occurrences that passed every executed stage, in table order.
    pub fn surviving(&self) -> impl Iterator<Item = &'t Occurrence> + '_ {
        self.table
            .occurrences()
            .iter()
            .zip(&self.status)
            .filter(|(_, s)| s.is_alive())
            .map(|(o, _)| o)
    }

    pub fn surviving_table(&self) -> Result<ReadCountTable> {
        ReadCountTable::from_occurrences(self.surviving().copied())
    }

    pub fn decision_log(&self) -> &DecisionLog {
        &self.log
    }

    pub fn skipped_filters(&self) -> &[FilterKind] {
        &self.summary.skipped
    }

    pub fn summary(&self) -> &CascadeSummary {
        &self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::count_table::{SeriesKey, Variant};
    use crate::neighbor::{NeighborPair, PrecomputedNeighbors};
    use crate::test_fixtures::{key, lfn_table, record};
    use crate::threshold::CutoffSpec;

    fn lfn_config() -> CascadeConfig {
        CascadeConfig::default().with_order(vec![
            FilterKind::PerVariant,
            FilterKind::PerVariantReplicateSeries,
            FilterKind::AbsoluteReadCount,
            FilterKind::BiosampleReplicate,
        ])
    }

    fn fixture_catalog(table: &ReadCountTable) -> VariantCatalog {
        VariantCatalog::from_variants(table.variant_ids().into_iter().map(|id| Variant {
            id,
            sequence: format!("ACGT{}", id),
        }))
        .unwrap()
    }

    struct Unavailable;

    impl NeighborFinder for Unavailable {
        fn find_pairs(&self, _variants: &[Variant]) -> Result<Vec<NeighborPair>> {
            Err(FilterError::UpstreamUnavailable("service down".to_string()))
        }
    }

    #[test]
    fn test_default_lfn_cascade_on_fixture() {
        let table = lfn_table();
        let outcome = Cascade::new(lfn_config()).run(&table).unwrap();

        assert_eq!(outcome.surviving().count(), 44);
        let stages = &outcome.summary().stages;
        let deleted: Vec<usize> = stages.iter().map(|s| s.deleted).collect();
        assert_eq!(deleted, vec![75, 0, 30, 1]);
        assert_eq!(outcome.decision_log().len(), 4 * table.len());

        // variant 22 in biosample 1: 25, 58 and 23 reads out of 33899
        assert_eq!(
            outcome.first_deleting_filter(&key(1, 1, 22)),
            Some(FilterKind::PerVariant)
        );
        assert_eq!(outcome.status(&key(1, 2, 22)), Some(FinalStatus::Kept));
        assert_eq!(
            outcome.first_deleting_filter(&key(1, 3, 22)),
            Some(FilterKind::PerVariant)
        );
        assert_eq!(
            outcome.first_deleting_filter(&key(1, 3, 24)),
            Some(FilterKind::AbsoluteReadCount)
        );
        // 10 reads, but the replicate still holds more than 10000 after the earlier stages
        assert_eq!(
            outcome.first_deleting_filter(&key(2, 3, 21)),
            Some(FilterKind::BiosampleReplicate)
        );
        assert_eq!(outcome.status(&key(2, 3, 24)), Some(FinalStatus::Kept));
        assert_eq!(outcome.status(&OccurrenceKey::new(9, 9, 9, 9, 9)), None);
    }

    #[test]
    fn test_history_propagates_deletion() {
        let table = lfn_table();
        let outcome = Cascade::new(lfn_config()).run(&table).unwrap();
        let history = outcome.history(&key(1, 1, 22));
        assert_eq!(
            history,
            vec![
                (FilterKind::PerVariant, true),
                (FilterKind::PerVariantReplicateSeries, true),
                (FilterKind::AbsoluteReadCount, true),
                (FilterKind::BiosampleReplicate, true),
            ]
        );
        assert!(outcome.history(&key(2, 1, 9)).iter().all(|(_, d)| !d));
    }

    #[test]
    fn test_monotonic_deletion() {
        let table = lfn_table();
        let outcome = Cascade::new(lfn_config()).run(&table).unwrap();
        for occurrence in table.occurrences() {
            let history = outcome.history(&occurrence.key);
            let first = history.iter().position(|(_, d)| *d);
            if let Some(first) = first {
                assert!(history[first..].iter().all(|(_, d)| *d));
            }
        }
    }

    #[test]
    fn test_later_stage_uses_surviving_denominator() {
        // v2 survives the absolute stage; v1 does not
        let table = ReadCountTable::from_records(vec![
            record(1, 1, 1, 1, 5),
            record(1, 1, 1, 2, 95),
            record(1, 2, 1, 1, 5),
        ])
        .unwrap();
        let config = CascadeConfig {
            lfn_read_count_cutoff: 10,
            lfn_biosample_replicate_cutoff: 1.0,
            ..CascadeConfig::default()
        }
        .with_order(vec![
            FilterKind::AbsoluteReadCount,
            FilterKind::BiosampleReplicate,
        ]);
        let outcome = Cascade::new(config).run(&table).unwrap();
        // 95 / 95 == 1.0 passes; with the deleted 5 reads it would be 0.95
        assert_eq!(outcome.status(&key(1, 1, 2)), Some(FinalStatus::Kept));
    }

    #[test]
    fn test_strict_stage_aborts_without_partial_commit() {
        let table = lfn_table();
        let config = CascadeConfig {
            lfn_variant_dependent: Some([(1, 0.01)].into_iter().collect()),
            ..CascadeConfig::default()
        }
        .with_order(vec![FilterKind::PerVariant, FilterKind::VariantDependent]);
        let err = Cascade::new(config).run(&table).unwrap_err();
        assert!(matches!(
            err,
            FilterError::MissingOverride {
                filter: FilterKind::VariantDependent,
                ..
            }
        ));
    }

    #[test]
    fn test_series_dependent_stage() {
        let table = lfn_table();
        let cutoffs = table
            .variant_ids()
            .into_iter()
            .map(|variant| (SeriesKey::new(1, 1, variant), 0.5))
            .collect();
        let config = CascadeConfig {
            lfn_variant_replicate_dependent: Some(cutoffs),
            ..CascadeConfig::default()
        }
        .with_order(vec![FilterKind::VariantReplicateSeriesDependent]);
        let outcome = Cascade::new(config).run(&table).unwrap();
        // variant 7 has a single read
        assert_eq!(
            outcome.first_deleting_filter(&key(1, 1, 1)),
            Some(FilterKind::VariantReplicateSeriesDependent)
        );
        assert_eq!(outcome.status(&key(1, 1, 7)), Some(FinalStatus::Kept));
    }

    #[test]
    fn test_invalid_config_runs_nothing() {
        let table = lfn_table();
        let config = CascadeConfig {
            lfn_variant: CutoffSpec::global(-1.0),
            ..CascadeConfig::default()
        };
        let err = Cascade::new(config).run(&table).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_optional_pcr_stage_is_skipped() {
        let table = lfn_table();
        let catalog = fixture_catalog(&table);
        let finder = Unavailable;
        let outcome = Cascade::new(CascadeConfig::default())
            .with_neighbors(&catalog, &finder)
            .run(&table)
            .unwrap();
        assert_eq!(outcome.skipped_filters(), &[FilterKind::PcrErrorNeighborRatio]);
        assert_eq!(outcome.surviving().count(), 44);
        assert_eq!(
            outcome
                .decision_log()
                .for_filter(FilterKind::PcrErrorNeighborRatio)
                .count(),
            0
        );

        // nothing attached at all
        let outcome = Cascade::new(CascadeConfig::default()).run(&table).unwrap();
        assert_eq!(outcome.skipped_filters(), &[FilterKind::PcrErrorNeighborRatio]);
    }

    #[test]
    fn test_required_pcr_stage_fails() {
        let table = lfn_table();
        let catalog = fixture_catalog(&table);
        let finder = Unavailable;
        let config = CascadeConfig {
            pcr_error_required: true,
            ..CascadeConfig::default()
        };
        let err = Cascade::new(config)
            .with_neighbors(&catalog, &finder)
            .run(&table)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    }

    #[test]
    fn test_pcr_stage_runs_after_lfn() {
        let table = ReadCountTable::from_records(vec![
            record(1, 1, 1, 1, 900),
            record(1, 1, 2, 1, 800),
            record(1, 1, 1, 2, 50),
            record(1, 1, 2, 2, 60),
        ])
        .unwrap();
        let catalog = VariantCatalog::from_variants(vec![
            Variant {
                id: 1,
                sequence: "ACGTACGT".to_string(),
            },
            Variant {
                id: 2,
                sequence: "ACGTACGA".to_string(),
            },
        ])
        .unwrap();
        let finder = PrecomputedNeighbors::new(vec![NeighborPair::new(1, 2)]);
        let outcome = Cascade::new(CascadeConfig::default())
            .with_neighbors(&catalog, &finder)
            .run(&table)
            .unwrap();
        assert!(outcome.skipped_filters().is_empty());
        // 110 / 1700 < 0.1
        assert_eq!(
            outcome.first_deleting_filter(&key(1, 1, 2)),
            Some(FilterKind::PcrErrorNeighborRatio)
        );
        assert_eq!(outcome.surviving_table().unwrap().len(), 2);
    }
}
