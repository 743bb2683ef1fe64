//! Per-stage counts collected while the cascade runs, and their text rendering.

use crate::filter::FilterKind;
use serde::{Deserialize, Serialize};

/// Counts for one executed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub filter: FilterKind,
    pub evaluated: usize,
    pub deleted: usize,
    pub surviving: usize,
    pub surviving_reads: u64,
}

impl StageSummary {
    pub fn new<I>(filter: FilterKind, evaluated: usize, deleted: usize, surviving_reads: I) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        let mut surviving = 0;
        let mut reads = 0;
        for read_count in surviving_reads {
            surviving += 1;
            reads += read_count;
        }
        StageSummary {
            filter,
            evaluated,
            deleted,
            surviving,
            surviving_reads: reads,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeSummary {
    pub input_occurrences: usize,
    pub input_reads: u64,
    pub stages: Vec<StageSummary>,
    /// Optional stages that could not run.
    pub skipped: Vec<FilterKind>,
    pub kept_occurrences: usize,
    pub kept_reads: u64,
}

impl CascadeSummary {
    pub fn new(input_occurrences: usize, input_reads: u64) -> Self {
        CascadeSummary {
            input_occurrences,
            input_reads,
            kept_occurrences: input_occurrences,
            kept_reads: input_reads,
            ..CascadeSummary::default()
        }
    }

    pub fn stage(&self, filter: FilterKind) -> Option<&StageSummary> {
        self.stages.iter().find(|s| s.filter == filter)
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    100.0 * part as f64 / whole.max(1) as f64
}

/// Generate a formatted text report from a cascade summary.
pub fn generate_report(summary: &CascadeSummary) -> String {
    let mut report = String::new();

    report.push_str("Low-Frequency-Noise Filter Report\n");
    report.push_str("=================================\n\n");

    report.push_str("Input:\n");
    report.push_str(&format!(
        "  Occurrences: {}\n",
        summary.input_occurrences
    ));
    report.push_str(&format!("  Reads: {}\n\n", summary.input_reads));

    if summary.stages.is_empty() {
        report.push_str("Filters: none executed.\n\n");
    } else {
        report.push_str("Filters:\n");
        for stage in &summary.stages {
            report.push_str(&format!(
                "  {:<40} evaluated {:>8}  deleted {:>8}  remaining {:>8} ({} reads)\n",
                stage.filter.name(),
                stage.evaluated,
                stage.deleted,
                stage.surviving,
                stage.surviving_reads
            ));
        }
        report.push('\n');
    }

    if !summary.skipped.is_empty() {
        report.push_str("Skipped (collaborator unavailable):\n");
        for filter in &summary.skipped {
            report.push_str(&format!("  - {}\n", filter));
        }
        report.push('\n');
    }

    report.push_str("Result:\n");
    report.push_str(&format!(
        "  Kept occurrences: {} ({:.1}%)\n",
        summary.kept_occurrences,
        percent(
            summary.kept_occurrences as u64,
            summary.input_occurrences as u64
        )
    ));
    report.push_str(&format!(
        "  Kept reads: {} ({:.1}%)\n",
        summary.kept_reads,
        percent(summary.kept_reads, summary.input_reads)
    ));

    report
}
