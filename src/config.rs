//! Cascade configuration.
//!
//! Parameters are read from a YAML file whose keys mirror [`ParamsFile`]. Any
//! key that is left out takes its default; an unknown key is an error. The file is converted into a typed
//! [`CascadeConfig`], which is validated before any filter runs.

use crate::count_table::{MarkerId, RunId, SeriesKey, VariantId};
use crate::error::{FilterError, Result};
use crate::filter::{FilterKind, CANONICAL_ORDER, DEFAULT_ORDER};
use crate::threshold::{check_ratio, insert_cutoff, CutoffSpec, Overrides};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// One per-series cutoff entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeriesCutoff {
    pub run: RunId,
    pub marker: MarkerId,
    pub variant: VariantId,
    pub cutoff: f64,
}

impl SeriesCutoff {
    pub fn series(&self) -> SeriesKey {
        SeriesKey::new(self.run, self.marker, self.variant)
    }
}

/// The parameter file as written on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParamsFile {
    pub order: Vec<String>,
    pub lfn_variant_cutoff: f64,
    pub lfn_variant_replicate_cutoff: f64,
    pub lfn_read_count_cutoff: u64,
    pub lfn_biosample_replicate_cutoff: f64,
    pub min_replicate_number: u64,
    pub pcr_error_var_prop: f64,
    pub pcr_error_required: bool,
    pub lfn_variant_specific: Option<HashMap<VariantId, f64>>,
    pub lfn_variant_replicate_specific: Option<Vec<SeriesCutoff>>,
    pub lfn_variant_dependent: Option<HashMap<VariantId, f64>>,
    pub lfn_variant_replicate_dependent: Option<Vec<SeriesCutoff>>,
}

impl Default for ParamsFile {
    fn default() -> Self {
        ParamsFile {
            order: DEFAULT_ORDER.iter().map(|kind| kind.name().to_string()).collect(),
            lfn_variant_cutoff: 0.001,
            lfn_variant_replicate_cutoff: 0.001,
            lfn_read_count_cutoff: 10,
            lfn_biosample_replicate_cutoff: 0.001,
            min_replicate_number: 2,
            pcr_error_var_prop: 0.1,
            pcr_error_required: false,
            lfn_variant_specific: None,
            lfn_variant_replicate_specific: None,
            lfn_variant_dependent: None,
            lfn_variant_replicate_dependent: None,
        }
    }
}

/// Typed cascade parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeConfig {
    pub order: Vec<FilterKind>,
    pub lfn_variant: CutoffSpec<VariantId>,
    pub lfn_variant_replicate: CutoffSpec<SeriesKey>,
    pub lfn_read_count_cutoff: u64,
    pub lfn_variant_dependent: Option<Overrides<VariantId>>,
    pub lfn_variant_replicate_dependent: Option<Overrides<SeriesKey>>,
    pub lfn_biosample_replicate_cutoff: f64,
    pub min_replicate_number: u64,
    pub pcr_error_var_prop: f64,
    /// When false, a failing neighbor collaborator skips the PCR-error stage.
    pub pcr_error_required: bool,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        CascadeConfig {
            order: DEFAULT_ORDER.to_vec(),
            lfn_variant: CutoffSpec::global(0.001),
            lfn_variant_replicate: CutoffSpec::global(0.001),
            lfn_read_count_cutoff: 10,
            lfn_variant_dependent: None,
            lfn_variant_replicate_dependent: None,
            lfn_biosample_replicate_cutoff: 0.001,
            min_replicate_number: 2,
            pcr_error_var_prop: 0.1,
            pcr_error_required: false,
        }
    }
}

fn series_map(filter: FilterKind, entries: Vec<SeriesCutoff>) -> Result<Overrides<SeriesKey>> {
    let mut map = Overrides::with_capacity(entries.len());
    for entry in entries {
        if map.insert(entry.series(), entry.cutoff).is_some() {
            return Err(FilterError::InvalidParameter(format!(
                "{}: series {} is listed more than once",
                filter,
                entry.series()
            )));
        }
    }
    Ok(map)
}

impl TryFrom<ParamsFile> for CascadeConfig {
    type Error = FilterError;

    fn try_from(params: ParamsFile) -> Result<Self> {
        let order = params
            .order
            .iter()
            .map(|name| name.parse::<FilterKind>())
            .collect::<Result<Vec<_>>>()?;

        let lfn_variant = match params.lfn_variant_specific {
            Some(map) => CutoffSpec::with_overrides(params.lfn_variant_cutoff, map),
            None => CutoffSpec::global(params.lfn_variant_cutoff),
        };
        let lfn_variant_replicate = match params.lfn_variant_replicate_specific {
            Some(entries) => CutoffSpec::with_overrides(
                params.lfn_variant_replicate_cutoff,
                series_map(FilterKind::PerVariantReplicateSeries, entries)?,
            ),
            None => CutoffSpec::global(params.lfn_variant_replicate_cutoff),
        };
        let lfn_variant_replicate_dependent = params
            .lfn_variant_replicate_dependent
            .map(|entries| series_map(FilterKind::VariantReplicateSeriesDependent, entries))
            .transpose()?;

        Ok(CascadeConfig {
            order,
            lfn_variant,
            lfn_variant_replicate,
            lfn_read_count_cutoff: params.lfn_read_count_cutoff,
            lfn_variant_dependent: params.lfn_variant_dependent,
            lfn_variant_replicate_dependent,
            lfn_biosample_replicate_cutoff: params.lfn_biosample_replicate_cutoff,
            min_replicate_number: params.min_replicate_number,
            pcr_error_var_prop: params.pcr_error_var_prop,
            pcr_error_required: params.pcr_error_required,
        })
    }
}

impl CascadeConfig {
    /// Parses and validates a YAML parameter document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let params: ParamsFile = serde_yaml::from_str(yaml)?;
        let config = CascadeConfig::try_from(params)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading cascade parameters from {}", path.display());
        let yaml = fs::read_to_string(path)?;
        CascadeConfig::from_yaml_str(&yaml)
    }

    /// Returns a copy running `order` instead of the configured cascade.
    pub fn with_order(mut self, order: Vec<FilterKind>) -> Self {
        self.order = order;
        self
    }

    /// Merges per-variant cutoffs loaded from a file. They override F2 for
    /// those variants and form the strict map of `lfn_variant_dependent`.
    /// A variant already configured with a different cutoff is an error.
    pub fn with_variant_cutoffs(mut self, cutoffs: Overrides<VariantId>) -> Result<Self> {
        let specific = self.lfn_variant.overrides.get_or_insert_with(Overrides::new);
        let dependent = self.lfn_variant_dependent.get_or_insert_with(Overrides::new);
        for (variant, cutoff) in cutoffs {
            insert_cutoff(specific, variant, cutoff)?;
            insert_cutoff(dependent, variant, cutoff)?;
        }
        Ok(self)
    }

    /// Merges per-series cutoffs loaded from a file, like [`Self::with_variant_cutoffs`].
    pub fn with_series_cutoffs(mut self, cutoffs: Overrides<SeriesKey>) -> Result<Self> {
        let specific = self
            .lfn_variant_replicate
            .overrides
            .get_or_insert_with(Overrides::new);
        let dependent = self
            .lfn_variant_replicate_dependent
            .get_or_insert_with(Overrides::new);
        for (series, cutoff) in cutoffs {
            insert_cutoff(specific, series, cutoff)?;
            insert_cutoff(dependent, series, cutoff)?;
        }
        Ok(self)
    }

    /// Checks every parameter the configured stages will use.
    pub fn validate(&self) -> Result<()> {
        self.validate_order()?;

        self.lfn_variant.validate(FilterKind::PerVariant)?;
        self.lfn_variant_replicate
            .validate(FilterKind::PerVariantReplicateSeries)?;
        check_ratio(
            FilterKind::BiosampleReplicate,
            self.lfn_biosample_replicate_cutoff,
        )?;
        check_ratio(FilterKind::PcrErrorNeighborRatio, self.pcr_error_var_prop)?;

        if let Some(map) = &self.lfn_variant_dependent {
            for &value in map.values() {
                check_ratio(FilterKind::VariantDependent, value)?;
            }
        }
        if let Some(map) = &self.lfn_variant_replicate_dependent {
            for &value in map.values() {
                check_ratio(FilterKind::VariantReplicateSeriesDependent, value)?;
            }
        }

        if self.runs(FilterKind::VariantDependent) && self.lfn_variant_dependent.is_none() {
            return Err(FilterError::MissingFilterParams(FilterKind::VariantDependent));
        }
        if self.runs(FilterKind::VariantReplicateSeriesDependent)
            && self.lfn_variant_replicate_dependent.is_none()
        {
            return Err(FilterError::MissingFilterParams(
                FilterKind::VariantReplicateSeriesDependent,
            ));
        }
        if self.min_replicate_number == 0 {
            return Err(FilterError::InvalidParameter(
                "min_replicate_number must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// True when `filter` is part of the configured cascade.
    pub fn runs(&self, filter: FilterKind) -> bool {
        self.order.contains(&filter)
    }

    fn validate_order(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for kind in &self.order {
            if !seen.insert(*kind) {
                return Err(FilterError::FilterOrder(format!(
                    "'{}' appears more than once",
                    kind
                )));
            }
        }
        for pair in self.order.windows(2) {
            if pair[0].rank() > pair[1].rank() {
                return Err(FilterError::FilterOrder(format!(
                    "'{}' must run before '{}' (canonical order: {})",
                    pair[1],
                    pair[0],
                    CANONICAL_ORDER
                        .iter()
                        .map(FilterKind::name)
                        .collect::<Vec<_>>()
                        .join(", ")
                )));
            }
        }
        Ok(())
    }
}
