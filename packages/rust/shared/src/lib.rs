//! Shared types, error model, and configuration for the sales cycle engine.
//!
//! This crate is the foundation depended on by all other salescycle crates.
//! It provides:
//! - [`SalesCycleError`]: the unified error type
//! - Domain types ([`EnrichedJob`], [`FunnelRow`], [`EngineState`], [`RunId`])
//! - Configuration ([`AppConfig`], [`EngineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrmConfig, EngineConfig, EngineSection, FunnelSection, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_api_key,
};
pub use error::{Result, SalesCycleError};
pub use types::{
    ConversionRate, EngineState, EnrichedJob, FunnelRow, LoadingPhase, MilestoneCategory,
    RawJobRecord, RepConversions, RepFunnel, RepPerformance, RunId, Stage,
};
