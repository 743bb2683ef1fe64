use crate::config::CascadeConfig;
use crate::filter::FilterKind;
use crate::io;
use crate::neighbor::{LevenshteinNeighborFinder, NeighborFinder, PrecomputedNeighbors};
use crate::optimize::pcr_error_ratios;
use crate::pipeline::{generate_report, Cascade};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Number of worker threads
    #[arg(short, long, global = true, default_value_t = num_cpus::get())]
    pub threads: usize,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the filter cascade over a read-count table
    Filter {
        /// Read counts: run, marker, biosample, replicate, variant, read_count
        #[arg(short, long)]
        read_counts: PathBuf,

        /// Variant sequences: id, sequence (needed by the PCR-error filter)
        #[arg(long)]
        variants: Option<PathBuf>,

        /// YAML parameter file
        #[arg(short, long)]
        params: Option<PathBuf>,

        /// Filters to run, comma separated, overriding the parameter file
        #[arg(long, value_delimiter = ',')]
        order: Option<Vec<String>>,

        /// Per-variant cutoffs: variant, lfn_variant_cutoff
        #[arg(long)]
        cutoff_specific_variant: Option<PathBuf>,

        /// Per-series cutoffs: run, marker, variant, lfn_variant_replicate_cutoff
        #[arg(long)]
        cutoff_specific_series: Option<PathBuf>,

        /// Precomputed one-mismatch pairs: expected, unexpected
        #[arg(long)]
        neighbor_pairs: Option<PathBuf>,

        /// Surviving occurrences
        #[arg(short, long)]
        output: PathBuf,

        /// Decision log
        #[arg(short, long)]
        decisions: Option<PathBuf>,

        /// Summary in JSON
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Tabulate PCR-error ratios in mock biosamples to calibrate pcr_error_var_prop
    OptimizePcrError {
        /// Read counts: run, marker, biosample, replicate, variant, read_count
        #[arg(short, long)]
        read_counts: PathBuf,

        /// Variant sequences: id, sequence
        #[arg(long)]
        variants: PathBuf,

        /// Known occurrences: run, marker, biosample, mock, variant, action
        #[arg(short, long)]
        known: PathBuf,

        /// Precomputed one-mismatch pairs: expected, unexpected
        #[arg(long)]
        neighbor_pairs: Option<PathBuf>,

        /// Ratio table
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn load_finder(neighbor_pairs: Option<&Path>) -> Result<Box<dyn NeighborFinder>> {
    match neighbor_pairs {
        Some(path) => {
            let pairs = io::read_neighbor_pairs(path)
                .with_context(|| format!("reading neighbor pairs from {}", path.display()))?;
            info!("Using {} precomputed neighbor pairs", pairs.len());
            Ok(Box::new(PrecomputedNeighbors::new(pairs)))
        }
        None => Ok(Box::new(LevenshteinNeighborFinder)),
    }
}

/// Main entry point for CLI
pub fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Filter {
            read_counts,
            variants,
            params,
            order,
            cutoff_specific_variant,
            cutoff_specific_series,
            neighbor_pairs,
            output,
            decisions,
            summary,
        } => {
            let mut config = match &params {
                Some(path) => CascadeConfig::from_yaml_file(path)
                    .with_context(|| format!("loading parameters from {}", path.display()))?,
                None => CascadeConfig::default(),
            };
            if let Some(names) = order {
                let order = names
                    .iter()
                    .map(|name| name.parse::<FilterKind>())
                    .collect::<Result<Vec<_>, _>>()?;
                config = config.with_order(order);
            }
            if let Some(path) = &cutoff_specific_variant {
                config = config
                    .with_variant_cutoffs(io::read_variant_cutoffs(path)?)
                    .with_context(|| format!("merging cutoffs from {}", path.display()))?;
            }
            if let Some(path) = &cutoff_specific_series {
                config = config
                    .with_series_cutoffs(io::read_series_cutoffs(path)?)
                    .with_context(|| format!("merging cutoffs from {}", path.display()))?;
            }

            let table = io::read_read_counts(&read_counts)
                .with_context(|| format!("reading read counts from {}", read_counts.display()))?;
            let catalog = variants.as_deref().map(io::read_variants).transpose()?;
            let finder = load_finder(neighbor_pairs.as_deref())?;

            let cascade = match &catalog {
                Some(catalog) => Cascade::new(config).with_neighbors(catalog, &*finder),
                None => Cascade::new(config),
            };
            let outcome = cascade.run(&table)?;

            io::write_read_counts(&outcome.surviving_table()?, &output)?;
            info!("Wrote surviving occurrences to {}", output.display());
            if let Some(path) = &decisions {
                io::write_decisions(outcome.decision_log(), path)?;
            }
            if let Some(path) = &summary {
                io::write_summary_json(outcome.summary(), path)?;
            }
            println!("{}", generate_report(outcome.summary()));
            Ok(())
        }

        Commands::OptimizePcrError {
            read_counts,
            variants,
            known,
            neighbor_pairs,
            output,
        } => {
            let table = io::read_read_counts(&read_counts)?;
            let catalog = io::read_variants(&variants)?;
            let known = io::read_known_occurrences(&known)?;
            if !known.iter().any(|o| o.is_mock()) {
                bail!("no mock biosamples in the known occurrences");
            }
            let finder = load_finder(neighbor_pairs.as_deref())?;
            let rows = pcr_error_ratios(&table, &known, &catalog, &*finder)?;
            io::write_pcr_error_ratios(&rows, &output)?;
            info!("Wrote {} ratios to {}", rows.len(), output.display());
            Ok(())
        }
    }
}
