//! Callsight Insights - Cache Decisions and Aggregation Pipeline
//!
//! Decides when a stored agent or city insight may be served as-is, builds
//! the call corpora fed to the narrative engine, rolls up windowed metrics
//! and persists each refresh with a single atomic upsert.

pub mod corpus;
pub mod decision;
pub mod metrics;
pub mod pipeline;

pub use decision::{
    coaching_gate, decide, same_local_month, CoachingDecision, RefreshDecision, RefreshReason,
};
pub use pipeline::{InsightPipeline, RefreshReport, RefreshSource};
