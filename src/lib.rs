//! Low-frequency-noise filtering of amplicon read-count tables.
//!
//! A read-count table holds one occurrence per (run, marker, biosample,
//! replicate, variant). The [`pipeline::Cascade`] applies the configured
//! filters in a fixed order; each filter only sees the occurrences that
//! survived the ones before it. The outcome carries the surviving
//! occurrences and an append-only decision log naming, for every occurrence,
//! the outcome of every filter that ran.
//!
//! ```no_run
//! use amplicon_filter::prelude::*;
//!
//! # fn main() -> amplicon_filter::error::Result<()> {
//! let table = amplicon_filter::io::read_read_counts("read_counts.tsv")?;
//! let outcome = Cascade::new(CascadeConfig::default()).run(&table)?;
//! println!("{} occurrences kept", outcome.surviving().count());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod count_table;
pub mod error;
pub mod filter;
pub mod io;
pub mod neighbor;
pub mod optimize;
pub mod pipeline;
pub mod threshold;
pub mod utils;

#[cfg(test)]
mod test_fixtures;

pub mod prelude {
    pub use crate::config::CascadeConfig;
    pub use crate::count_table::{
        Occurrence, OccurrenceKey, ReadCountRecord, ReadCountTable, SeriesKey, Variant,
        VariantCatalog,
    };
    pub use crate::error::{ErrorKind, FilterError};
    pub use crate::filter::FilterKind;
    pub use crate::neighbor::{LevenshteinNeighborFinder, NeighborFinder, NeighborPair};
    pub use crate::pipeline::{Cascade, CascadeOutcome, FinalStatus};
    pub use crate::threshold::CutoffSpec;
}
