//! Cutoff resolution: a global default with optional per-key overrides.

use crate::error::{FilterError, Result};
use crate::filter::FilterKind;
use log::trace;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

/// Override maps, keyed by variant id or by replicate series.
pub type Overrides<K> = HashMap<K, f64>;

/// Returns the override for `key` if one exists, otherwise `global`.
pub fn resolve<K>(filter: FilterKind, key: &K, global: f64, overrides: Option<&Overrides<K>>) -> f64
where
    K: Hash + Eq + Display,
{
    match overrides.and_then(|map| map.get(key)) {
        Some(&cutoff) => {
            trace!("{}: override cutoff {} for {}", filter, cutoff, key);
            cutoff
        }
        None => global,
    }
}

/// Returns the override for `key`, or a configuration error if there is none.
pub fn resolve_required<K>(filter: FilterKind, key: &K, overrides: &Overrides<K>) -> Result<f64>
where
    K: Hash + Eq + Display,
{
    overrides
        .get(key)
        .copied()
        .ok_or_else(|| FilterError::MissingOverride {
            filter,
            key: key.to_string(),
        })
}

/// Adds one override. A key that is already present must carry the same cutoff.
pub fn insert_cutoff<K>(map: &mut Overrides<K>, key: K, cutoff: f64) -> Result<()>
where
    K: Hash + Eq + Display,
{
    match map.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(cutoff);
            Ok(())
        }
        Entry::Occupied(slot) if *slot.get() == cutoff => Ok(()),
        Entry::Occupied(slot) => Err(FilterError::InvalidParameter(format!(
            "conflicting cutoffs {} and {} for {}",
            slot.get(),
            cutoff,
            slot.key()
        ))),
    }
}

/// Checks that a ratio cutoff lies in `[0, 1]`.
pub fn check_ratio(filter: FilterKind, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(FilterError::InvalidCutoff { filter, value })
    }
}

/// Global cutoff plus an optional override map for one ratio filter.
#[derive(Debug, Clone, PartialEq)]
pub struct CutoffSpec<K: Hash + Eq> {
    pub global: f64,
    pub overrides: Option<Overrides<K>>,
}

impl<K> CutoffSpec<K>
where
    K: Hash + Eq + Display,
{
    pub fn global(global: f64) -> Self {
        CutoffSpec {
            global,
            overrides: None,
        }
    }

    pub fn with_overrides(global: f64, overrides: Overrides<K>) -> Self {
        CutoffSpec {
            global,
            overrides: Some(overrides),
        }
    }

    pub fn resolve(&self, filter: FilterKind, key: &K) -> f64 {
        resolve(filter, key, self.global, self.overrides.as_ref())
    }

    pub fn validate(&self, filter: FilterKind) -> Result<()> {
        check_ratio(filter, self.global)?;
        if let Some(overrides) = &self.overrides {
            for &value in overrides.values() {
                check_ratio(filter, value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::count_table::SeriesKey;
    use crate::error::ErrorKind;

    #[test]
    fn test_insert_cutoff_accepts_repeats_rejects_conflicts() {
        let mut map: Overrides<u64> = Overrides::new();
        insert_cutoff(&mut map, 9, 0.05).unwrap();
        insert_cutoff(&mut map, 9, 0.05).unwrap();
        assert_eq!(map.len(), 1);
        let err = insert_cutoff(&mut map, 9, 0.02).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(map[&9], 0.05);
    }

    #[test]
    fn test_resolve_prefers_override() {
        let overrides: Overrides<u64> = [(9, 0.05), (22, 0.01)].into_iter().collect();
        let filter = FilterKind::PerVariant;
        assert_eq!(resolve(filter, &9, 0.001, Some(&overrides)), 0.05);
        assert_eq!(resolve(filter, &22, 0.001, Some(&overrides)), 0.01);
        assert_eq!(resolve(filter, &1, 0.001, Some(&overrides)), 0.001);
        assert_eq!(resolve(filter, &9, 0.001, None), 0.001);
    }

    #[test]
    fn test_resolve_does_not_mutate() {
        let overrides: Overrides<u64> = [(9, 0.05)].into_iter().collect();
        let before = overrides.clone();
        let _ = resolve(FilterKind::PerVariant, &3, 0.2, Some(&overrides));
        assert_eq!(overrides, before);
    }

    #[test]
    fn test_resolve_required() {
        let overrides: Overrides<SeriesKey> =
            [(SeriesKey::new(1, 1, 9), 0.02)].into_iter().collect();
        let filter = FilterKind::VariantReplicateSeriesDependent;
        assert_eq!(
            resolve_required(filter, &SeriesKey::new(1, 1, 9), &overrides).unwrap(),
            0.02
        );
        let err = resolve_required(filter, &SeriesKey::new(1, 2, 9), &overrides).unwrap_err();
        assert!(matches!(err, FilterError::MissingOverride { .. }));
    }

    #[test]
    fn test_validate_ranges() {
        let filter = FilterKind::PerVariant;
        assert!(CutoffSpec::<u64>::global(0.0).validate(filter).is_ok());
        assert!(CutoffSpec::<u64>::global(1.0).validate(filter).is_ok());
        assert!(CutoffSpec::<u64>::global(1.5).validate(filter).is_err());
        assert!(CutoffSpec::<u64>::global(f64::NAN).validate(filter).is_err());

        let spec = CutoffSpec::with_overrides(0.001, [(4u64, -0.1)].into_iter().collect());
        assert!(matches!(
            spec.validate(filter),
            Err(FilterError::InvalidCutoff { .. })
        ));
    }
}
