//! Sales cycle engine: job catalog, stage classification, batched enrichment
//! and funnel aggregation.
//!
//! [`SalesCycleEngine::run`] wires the pieces together and streams
//! [`EngineState`](salescycle_shared::EngineState) snapshots to a sink.

pub mod catalog;
pub mod directory;
pub mod engine;
pub mod enrichment;
pub mod extract;
pub mod funnel;
pub mod period;
pub mod stages;

#[cfg(test)]
mod testing;

pub use engine::{SalesCycleEngine, SnapshotSink, run};
pub use enrichment::EnrichmentPhase;
pub use funnel::{AggregationContext, FunnelReport, RepDenylist, aggregate};
pub use period::ReportingPeriod;
pub use stages::{STAGES, StageDefinition, classify};
