//! Minimum replicate number: a variant is kept in a biosample only if it
//! survives in enough PCR replicates there.

use super::{Surviving, Verdict};
use crate::utils::parallel::grouped_totals;

pub fn min_replicate_number(surviving: &Surviving<'_>, min_replicates: u64) -> Vec<Verdict> {
    let replicates = grouped_totals(
        surviving,
        |o| (o.key.biosample_key(), o.key.variant),
        |_| 1,
    );
    surviving
        .iter()
        .map(|(idx, occurrence)| {
            let seen = replicates
                .get(&(occurrence.key.biosample_key(), occurrence.key.variant))
                .copied()
                .unwrap_or(0);
            Verdict::new(idx, seen < min_replicates)
        })
        .collect()
}
