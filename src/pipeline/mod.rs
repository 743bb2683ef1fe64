pub mod cascade;
pub mod report;

pub use cascade::{
    Cascade, CascadeOutcome, DecisionLog, FilterDecision, FinalStatus, OccurrenceStatus,
};
pub use report::{generate_report, CascadeSummary, StageSummary};
