use crate::count_table::Occurrence;
use crate::filter::Surviving;
use indexmap::IndexMap;
use log::debug;
use rayon::prelude::*;
use std::collections::HashMap;
use std::hash::Hash;

/// Sums `value` over the surviving occurrences, grouped by `key`.
///
/// Each rayon worker folds its own map over a disjoint slice of the
/// surviving indices; the partial maps are merged afterwards.
pub fn grouped_totals<K, F, V>(surviving: &Surviving<'_>, key: F, value: V) -> HashMap<K, u64>
where
    K: Hash + Eq + Send,
    F: Fn(&Occurrence) -> K + Send + Sync,
    V: Fn(&Occurrence) -> u64 + Send + Sync,
{
    let occurrences = surviving.table().occurrences();
    let totals = surviving
        .indices()
        .par_iter()
        .fold(HashMap::new, |mut acc: HashMap<K, u64>, &idx| {
            let occurrence = &occurrences[idx];
            *acc.entry(key(occurrence)).or_insert(0) += value(occurrence);
            acc
        })
        .reduce(HashMap::new, merge_totals);
    debug!(
        "Computed {} group totals over {} occurrences",
        totals.len(),
        surviving.len()
    );
    totals
}

/// Read-count sums over the surviving occurrences, grouped by `key`.
pub fn grouped_sums<K, F>(surviving: &Surviving<'_>, key: F) -> HashMap<K, u64>
where
    K: Hash + Eq + Send,
    F: Fn(&Occurrence) -> K + Send + Sync,
{
    grouped_totals(surviving, key, |o| o.read_count)
}

fn merge_totals<K: Hash + Eq>(mut left: HashMap<K, u64>, right: HashMap<K, u64>) -> HashMap<K, u64> {
    if left.len() < right.len() {
        return merge_totals(right, left);
    }
    for (k, v) in right {
        *left.entry(k).or_insert(0) += v;
    }
    left
}

/// Splits the surviving indices into disjoint partitions, ordered by the
/// first appearance of each key.
pub fn partition_by<K, F>(surviving: &Surviving<'_>, key: F) -> IndexMap<K, Vec<usize>>
where
    K: Hash + Eq,
    F: Fn(&Occurrence) -> K,
{
    let mut partitions: IndexMap<K, Vec<usize>> = IndexMap::new();
    for (idx, occurrence) in surviving.iter() {
        partitions.entry(key(occurrence)).or_default().push(idx);
    }
    partitions
}

/// Maps every partition in parallel and stops at the first error.
pub fn try_map_partitions<K, U, E, F>(partitions: &IndexMap<K, Vec<usize>>, f: F) -> Result<Vec<U>, E>
where
    K: Sync,
    U: Send,
    E: Send,
    F: Fn(&K, &[usize]) -> Result<U, E> + Send + Sync,
{
    partitions
        .par_iter()
        .map(|(key, indices)| f(key, indices))
        .collect()
}
