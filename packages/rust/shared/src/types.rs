//! Core domain types for the sales cycle engine.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one engine run (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// MilestoneCategory
// ---------------------------------------------------------------------------

/// Top-level CRM job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MilestoneCategory {
    Lead,
    Prospect,
    Approved,
    Completed,
    Invoiced,
    Closed,
    Unknown,
}

impl MilestoneCategory {
    /// Categories fetched from the CRM, in merge order.
    pub const TRACKED: [Self; 5] = [
        Self::Lead,
        Self::Prospect,
        Self::Approved,
        Self::Completed,
        Self::Invoiced,
    ];

    /// Derive the category from an upstream milestone name (case-insensitive).
    pub fn from_milestone(milestone: &str) -> Self {
        match milestone.trim().to_ascii_uppercase().as_str() {
            "LEAD" => Self::Lead,
            "PROSPECT" => Self::Prospect,
            "APPROVED" => Self::Approved,
            "COMPLETED" => Self::Completed,
            "INVOICED" => Self::Invoiced,
            "CLOSED" => Self::Closed,
            _ => Self::Unknown,
        }
    }

    /// Milestone name as the CRM spells it in query filters.
    pub fn query_name(&self) -> &'static str {
        match self {
            Self::Lead => "Lead",
            Self::Prospect => "Prospect",
            Self::Approved => "Approved",
            Self::Completed => "Completed",
            Self::Invoiced => "Invoiced",
            Self::Closed => "Closed",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether the job was approved and may carry invoices.
    pub fn is_post_approved(&self) -> bool {
        matches!(self, Self::Approved | Self::Completed | Self::Invoiced)
    }
}

impl std::fmt::Display for MilestoneCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.query_name())
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// A funnel position, or the explicit `Unclassified` bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "Initial Visit Scheduled")]
    InitialVisitScheduled,
    #[serde(rename = "Adjuster Meeting Scheduled")]
    AdjusterMeetingScheduled,
    #[serde(rename = "Bought Job")]
    BoughtJob,
    #[serde(rename = "Scheduled Design Meeting")]
    ScheduledDesignMeeting,
    #[serde(rename = "Completed Design Meeting")]
    CompletedDesignMeeting,
    #[serde(rename = "Approved")]
    Approved,
    #[serde(rename = "Unclassified")]
    Unclassified,
}

impl Stage {
    /// Display name, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialVisitScheduled => "Initial Visit Scheduled",
            Self::AdjusterMeetingScheduled => "Adjuster Meeting Scheduled",
            Self::BoughtJob => "Bought Job",
            Self::ScheduledDesignMeeting => "Scheduled Design Meeting",
            Self::CompletedDesignMeeting => "Completed Design Meeting",
            Self::Approved => "Approved",
            Self::Unclassified => "Unclassified",
        }
    }

    pub fn is_classified(&self) -> bool {
        !matches!(self, Self::Unclassified)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RawJobRecord
// ---------------------------------------------------------------------------

/// A job as returned by the CRM `/jobs` listing.
///
/// Decoding is lenient: every field defaults to empty and numeric values are
/// rendered as strings, since upstream shapes are not guaranteed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawJobRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub job_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub job_number: String,
    #[serde(deserialize_with = "lenient_string")]
    pub current_milestone: String,
    #[serde(deserialize_with = "lenient_string")]
    pub created_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub milestone_date: String,
}

/// Accept strings, numbers, booleans, or null, rendering everything as text.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

// ---------------------------------------------------------------------------
// EnrichedJob
// ---------------------------------------------------------------------------

/// A job record as it moves through enrichment.
///
/// `milestone_category` is fixed at creation. The remaining classification,
/// ownership, and money fields are each written by a single enrichment phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedJob {
    pub id: String,
    pub job_name: String,
    pub job_number: String,
    pub current_milestone: String,
    pub created_date: String,
    /// Date the job entered its current milestone.
    pub milestone_date: String,
    /// Earliest invoice date, empty when none is known.
    pub invoice_date: String,
    pub milestone_category: MilestoneCategory,
    pub status_name: String,
    pub stage: Stage,
    pub sales_owner: String,
    pub contract_amount: f64,
    /// Current-year invoiced amount.
    pub built_amount: f64,
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Count and value of jobs currently at one funnel stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelRow {
    pub stage: Stage,
    pub milestone: MilestoneCategory,
    pub count: usize,
    pub value: f64,
    pub order: u8,
}

/// Percentage of jobs at-or-past `from` that are also at-or-past `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRate {
    pub from: String,
    pub to: String,
    /// 0–100.
    pub rate: u32,
}

/// Month-to-date performance of one representative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepPerformance {
    pub rep: String,
    pub leads: usize,
    pub ivs_rate: u32,
    pub adjuster_rate: u32,
    pub close_rate: u32,
    pub approved_count: usize,
    pub approved_value: f64,
}

/// Funnel rows restricted to one representative's jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepFunnel {
    pub rep: String,
    pub funnel: Vec<FunnelRow>,
}

/// Conversion rates restricted to one representative's jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepConversions {
    pub rep: String,
    pub conversions: Vec<ConversionRate>,
}

// ---------------------------------------------------------------------------
// EngineState
// ---------------------------------------------------------------------------

/// Which step of a run produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadingPhase {
    FetchingJobs,
    EnrichingStatus,
    EnrichingSalesOwner,
    EnrichingFinancials,
    EnrichingInvoices,
    Complete,
}

impl LoadingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchingJobs => "fetching-jobs",
            Self::EnrichingStatus => "enriching-status",
            Self::EnrichingSalesOwner => "enriching-sales-owner",
            Self::EnrichingFinancials => "enriching-financials",
            Self::EnrichingInvoices => "enriching-invoices",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for LoadingPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete, self-contained view of a run at one observation point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineState {
    pub run_id: RunId,
    pub jobs: Vec<EnrichedJob>,
    pub funnel: Vec<FunnelRow>,
    pub conversions: Vec<ConversionRate>,
    pub rep_performance: Vec<RepPerformance>,
    pub rep_funnel: Vec<RepFunnel>,
    pub rep_conversions: Vec<RepConversions>,
    #[serde(rename = "salesYTD")]
    pub sales_ytd: f64,
    #[serde(rename = "builtYTD")]
    pub built_ytd: f64,
    pub phase: LoadingPhase,
    pub phase_message: String,
    /// 0–100.
    pub progress: u8,
    pub error: Option<String>,
}

impl EngineState {
    pub fn is_complete(&self) -> bool {
        self.phase == LoadingPhase::Complete
    }
}
