//! Low-frequency-noise rules.
//!
//! Ratio rules divide an occurrence's read count by the total of its group
//! over the surviving occurrences and delete it when the ratio falls strictly
//! below the resolved cutoff. A group total of zero always deletes.
//!
//! | rule | group total |
//! |---|---|
//! | [`lfn_per_variant`], [`lfn_variant_dependent`] | variant |
//! | [`lfn_per_variant_replicate_series`], [`lfn_variant_replicate_series_dependent`] | run, marker, variant |
//! | [`lfn_biosample_replicate`] | run, marker, biosample, replicate |

use super::{FilterKind, Surviving, Verdict};
use crate::count_table::{OccurrenceKey, SeriesKey, VariantId};
use crate::error::{FilterError, Result};
use crate::threshold::{resolve_required, CutoffSpec, Overrides};
use crate::utils::parallel::grouped_sums;
use rayon::prelude::*;
use std::hash::Hash;

/// Deletion test shared by every ratio rule.
///
/// Equality passes; an empty group (`total == 0`) fails.
pub fn below_cutoff(read_count: u64, total: u64, cutoff: f64) -> bool {
    if total == 0 {
        return true;
    }
    (read_count as f64 / total as f64) < cutoff
}

fn ratio_rule<K, G, C>(surviving: &Surviving<'_>, group: G, cutoff: C) -> Vec<Verdict>
where
    K: Hash + Eq + Send + Sync,
    G: Fn(&OccurrenceKey) -> K + Send + Sync,
    C: Fn(&OccurrenceKey) -> f64 + Send + Sync,
{
    let totals = grouped_sums(surviving, |o| group(&o.key));
    let occurrences = surviving.table().occurrences();
    surviving
        .indices()
        .par_iter()
        .map(|&idx| {
            let occurrence = &occurrences[idx];
            let total = totals.get(&group(&occurrence.key)).copied().unwrap_or(0);
            Verdict::new(
                idx,
                below_cutoff(occurrence.read_count, total, cutoff(&occurrence.key)),
            )
        })
        .collect()
}

/// Like [`ratio_rule`], for cutoffs that may fail to resolve.
fn try_ratio_rule<K, G, C>(surviving: &Surviving<'_>, group: G, cutoff: C) -> Result<Vec<Verdict>>
where
    K: Hash + Eq + Send + Sync,
    G: Fn(&OccurrenceKey) -> K + Send + Sync,
    C: Fn(&OccurrenceKey) -> Result<f64> + Send + Sync,
{
    let totals = grouped_sums(surviving, |o| group(&o.key));
    let occurrences = surviving.table().occurrences();
    surviving
        .indices()
        .par_iter()
        .map(|&idx| {
            let occurrence = &occurrences[idx];
            let total = totals.get(&group(&occurrence.key)).copied().unwrap_or(0);
            let cutoff = cutoff(&occurrence.key)?;
            Ok(Verdict::new(
                idx,
                below_cutoff(occurrence.read_count, total, cutoff),
            ))
        })
        .collect()
}

/// F2: `N_ijk / N_i < cutoff`, with optional per-variant overrides.
pub fn lfn_per_variant(surviving: &Surviving<'_>, cutoff: &CutoffSpec<VariantId>) -> Vec<Verdict> {
    ratio_rule(
        surviving,
        |key| key.variant,
        |key| cutoff.resolve(FilterKind::PerVariant, &key.variant),
    )
}

/// F3: `N_ijk / N_i(run, marker) < cutoff`, with optional per-series overrides.
pub fn lfn_per_variant_replicate_series(
    surviving: &Surviving<'_>,
    cutoff: &CutoffSpec<SeriesKey>,
) -> Vec<Verdict> {
    ratio_rule(surviving, OccurrenceKey::series, |key| {
        cutoff.resolve(FilterKind::PerVariantReplicateSeries, &key.series())
    })
}

/// Absolute read count: `N_ijk < cutoff`.
pub fn lfn_absolute_read_count(surviving: &Surviving<'_>, cutoff: u64) -> Vec<Verdict> {
    surviving
        .iter()
        .map(|(idx, occurrence)| Verdict::new(idx, occurrence.read_count < cutoff))
        .collect()
}

/// F5: the F2 ratio with a cutoff that every surviving variant must define.
pub fn lfn_variant_dependent(
    surviving: &Surviving<'_>,
    cutoffs: &Overrides<VariantId>,
) -> Result<Vec<Verdict>> {
    let filter = FilterKind::VariantDependent;
    if let Some(missing) = surviving
        .iter()
        .map(|(_, o)| o.key.variant)
        .filter(|variant| !cutoffs.contains_key(variant))
        .min()
    {
        return Err(FilterError::MissingOverride {
            filter,
            key: format!("variant {}", missing),
        });
    }
    try_ratio_rule(
        surviving,
        |key| key.variant,
        |key| resolve_required(filter, &key.variant, cutoffs),
    )
}

/// The F3 ratio with a cutoff that every surviving replicate series must define.
pub fn lfn_variant_replicate_series_dependent(
    surviving: &Surviving<'_>,
    cutoffs: &Overrides<SeriesKey>,
) -> Result<Vec<Verdict>> {
    let filter = FilterKind::VariantReplicateSeriesDependent;
    if let Some(series) = surviving
        .iter()
        .map(|(_, o)| o.key.series())
        .filter(|series| !cutoffs.contains_key(series))
        .min()
    {
        return Err(FilterError::MissingOverride {
            filter,
            key: format!("series {}", series),
        });
    }
    try_ratio_rule(surviving, OccurrenceKey::series, |key| {
        resolve_required(filter, &key.series(), cutoffs)
    })
}

/// F6: `N_ijk / N_jk < cutoff`, the total being the replicate's own reads.
///
/// `N_jk` is the replicate's surviving reads and nothing wider. Hand-computed
/// expectations for the LFN test dataset disagree on this total (46 and 1186
/// for variant 24, biosample 1, replicate 3); the full replicate holds 1187.
pub fn lfn_biosample_replicate(surviving: &Surviving<'_>, cutoff: f64) -> Vec<Verdict> {
    ratio_rule(surviving, OccurrenceKey::replicate_key, |_| cutoff)
}
