//! Batched enrichment orchestrator.
//!
//! Each phase selects its subset of jobs by index, then walks that subset in
//! fixed-size batches. Every job in a batch runs on its own spawned task that
//! owns a copy of the job id and returns a [`JobPatch`]; the batch is a barrier,
//! and patches are applied to the job vector only after every task has settled.
//! Phases write disjoint fields, so the vector never needs a lock.

use std::sync::Arc;

use salescycle_crm::{CrmClient, endpoints};
use salescycle_shared::{EnrichedJob, LoadingPhase, MilestoneCategory, Result, Stage};
use tracing::{debug, info, instrument};

use crate::directory::RepDirectory;
use crate::extract::{self, ContractValue};
use crate::period::ReportingPeriod;
use crate::stages::classify;

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// The four enrichment phases, run in [`EnrichmentPhase::ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrichmentPhase {
    Status,
    SalesOwner,
    Financials,
    Invoices,
}

impl EnrichmentPhase {
    pub const ORDER: [Self; 4] = [
        Self::Status,
        Self::SalesOwner,
        Self::Financials,
        Self::Invoices,
    ];

    /// Short label used in progress messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Status => "Status",
            Self::SalesOwner => "Sales owners",
            Self::Financials => "Financials",
            Self::Invoices => "Invoices",
        }
    }

    pub fn loading_phase(&self) -> LoadingPhase {
        match self {
            Self::Status => LoadingPhase::EnrichingStatus,
            Self::SalesOwner => LoadingPhase::EnrichingSalesOwner,
            Self::Financials => LoadingPhase::EnrichingFinancials,
            Self::Invoices => LoadingPhase::EnrichingInvoices,
        }
    }

    /// Whether `job` is in this phase's subset. `Unknown` jobs are in none.
    pub fn applies_to(&self, job: &EnrichedJob) -> bool {
        let category = job.milestone_category;
        match self {
            Self::Status => matches!(
                category,
                MilestoneCategory::Lead | MilestoneCategory::Prospect
            ),
            Self::SalesOwner | Self::Financials => category != MilestoneCategory::Unknown,
            Self::Invoices => category.is_post_approved(),
        }
    }

    /// Indices of the jobs this phase enriches, in job order.
    pub fn subset(&self, jobs: &[EnrichedJob]) -> Vec<usize> {
        jobs.iter()
            .enumerate()
            .filter(|(_, job)| self.applies_to(job))
            .map(|(i, _)| i)
            .collect()
    }

    /// Slice of the global 0–100 progress scale owned by this phase.
    pub fn band(&self) -> ProgressBand {
        match self {
            Self::Status => ProgressBand::new(20, 20, 25, 45),
            Self::SalesOwner => ProgressBand::new(50, 55, 15, 70),
            Self::Financials => ProgressBand::new(72, 72, 18, 90),
            Self::Invoices => ProgressBand::new(91, 91, 8, 99),
        }
    }

    /// Message emitted before the first batch.
    pub fn start_message(&self, jobs: usize) -> String {
        match self {
            Self::Status => format!("Loading status for {jobs} jobs..."),
            Self::SalesOwner => "Loading user directory...".to_string(),
            Self::Financials => format!("Loading financials for {jobs} jobs..."),
            Self::Invoices => format!("Loading invoice dates for {jobs} jobs..."),
        }
    }

    /// Message emitted after the last batch (or immediately, for an empty
    /// subset). The invoice phase has none: the run's completion follows it.
    pub fn complete_message(&self) -> Option<&'static str> {
        match self {
            Self::Status => Some("Status enrichment complete"),
            Self::SalesOwner => Some("Sales owner enrichment complete"),
            Self::Financials => Some("Financial enrichment complete"),
            Self::Invoices => None,
        }
    }

    /// Message emitted after a batch settles.
    pub fn batch_message(&self, done: usize, total: usize) -> String {
        format!("{}: {done}/{total}", self.label())
    }
}

impl std::fmt::Display for EnrichmentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Progress values a phase reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressBand {
    /// Progress at the phase start message.
    pub start: u8,
    /// Progress before the first batch completes.
    pub batch_base: u8,
    /// Span covered by the batches.
    pub width: u8,
    /// Progress at the completion message, and after the last batch.
    pub end: u8,
}

impl ProgressBand {
    const fn new(start: u8, batch_base: u8, width: u8, end: u8) -> Self {
        Self {
            start,
            batch_base,
            width,
            end,
        }
    }

    /// Map phase-local completion onto the global scale.
    pub fn progress_at(&self, done: usize, total: usize) -> u8 {
        if total == 0 {
            return self.batch_base;
        }
        let fraction = done.min(total) as f64 / total as f64;
        self.batch_base + (fraction * f64::from(self.width)).round() as u8
    }
}

// ---------------------------------------------------------------------------
// Patches
// ---------------------------------------------------------------------------

/// The fields one enrichment call resolved for one job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobPatch {
    Status { status_name: String, stage: Stage },
    SalesOwner(String),
    ContractAmount(f64),
    Invoices {
        invoice_date: Option<String>,
        built_amount: f64,
    },
    /// The call succeeded but carried nothing to store.
    Unchanged,
}

impl JobPatch {
    pub fn apply(self, job: &mut EnrichedJob) {
        match self {
            Self::Status { status_name, stage } => {
                job.status_name = status_name;
                job.stage = stage;
            }
            Self::SalesOwner(name) => job.sales_owner = name,
            Self::ContractAmount(amount) => job.contract_amount = amount.max(0.0),
            Self::Invoices {
                invoice_date,
                built_amount,
            } => {
                if let Some(date) = invoice_date {
                    job.invoice_date = date;
                }
                job.built_amount = built_amount.max(0.0);
            }
            Self::Unchanged => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Per-job work
// ---------------------------------------------------------------------------

/// Read-only inputs shared by every task of a phase.
#[derive(Debug, Clone)]
pub struct PhaseContext {
    pub directory: Arc<RepDirectory>,
    pub period: ReportingPeriod,
}

/// Run one phase's remote calls for one job.
pub async fn enrich_job<C: CrmClient>(
    phase: EnrichmentPhase,
    client: &C,
    job_id: &str,
    category: MilestoneCategory,
    ctx: &PhaseContext,
) -> Result<JobPatch> {
    match phase {
        EnrichmentPhase::Status => {
            let response = client
                .detail_fetch(&endpoints::current_milestone_with_status(job_id))
                .await?;
            let status_name = extract::status_name(&response);
            let stage = classify(category, &status_name);
            Ok(JobPatch::Status { status_name, stage })
        }
        EnrichmentPhase::SalesOwner => {
            let response = client
                .detail_fetch(&endpoints::representatives(job_id))
                .await?;
            let owner = extract::select_rep(extract::items_of(&response))
                .and_then(extract::rep_user_id)
                .map(|user_id| ctx.directory.resolve(&user_id).to_string());
            Ok(owner.map_or(JobPatch::Unchanged, JobPatch::SalesOwner))
        }
        EnrichmentPhase::Financials => {
            let response = client.detail_fetch(&endpoints::job_financials(job_id)).await?;
            let amount = match extract::contract_value(&response) {
                ContractValue::Direct(amount) => Some(amount),
                ContractValue::Reference(financial_id) => {
                    let full = client
                        .detail_fetch(&endpoints::financial_by_id(&financial_id))
                        .await?;
                    match extract::contract_value(&full) {
                        ContractValue::Direct(amount) => Some(amount),
                        _ => None,
                    }
                }
                ContractValue::Missing => None,
            };
            Ok(amount.map_or(JobPatch::Unchanged, JobPatch::ContractAmount))
        }
        EnrichmentPhase::Invoices => {
            let response = client.detail_fetch(&endpoints::invoices(job_id)).await?;
            Ok(invoice_patch(extract::items_of(&response), &ctx.period))
        }
    }
}

/// Earliest invoice date plus the current-year invoiced total.
fn invoice_patch(invoices: &[serde_json::Value], period: &ReportingPeriod) -> JobPatch {
    if invoices.is_empty() {
        return JobPatch::Unchanged;
    }

    let dated: Vec<(&str, &serde_json::Value)> = invoices
        .iter()
        .filter_map(|inv| {
            let date = inv.get("invoiceDate")?.as_str()?;
            (!date.is_empty()).then_some((date, inv))
        })
        .collect();

    let invoice_date = dated.iter().map(|(date, _)| *date).min().map(str::to_string);

    let built_amount = dated
        .iter()
        .filter(|(date, _)| period.is_current_year(date))
        .map(|(_, inv)| extract::invoice_amount_of(inv))
        .sum();

    JobPatch::Invoices {
        invoice_date,
        built_amount,
    }
}

// ---------------------------------------------------------------------------
// Batch driver
// ---------------------------------------------------------------------------

/// Counts for one finished phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseSummary {
    pub total: usize,
    pub failed: usize,
    pub batches: usize,
}

/// Run `phase` over `subset` (indices into `jobs`) in batches of `batch_size`.
///
/// `on_batch` is called after each batch barrier with the updated jobs and the
/// number of subset jobs processed so far. Per-job failures are logged and
/// leave the job untouched.
#[instrument(skip_all, fields(phase = %phase, jobs = subset.len(), batch_size = batch_size))]
pub async fn run_phase<C, F>(
    phase: EnrichmentPhase,
    client: &Arc<C>,
    jobs: &mut [EnrichedJob],
    subset: &[usize],
    batch_size: usize,
    ctx: &PhaseContext,
    mut on_batch: F,
) -> PhaseSummary
where
    C: CrmClient,
    F: FnMut(&[EnrichedJob], usize, usize),
{
    let total = subset.len();
    let mut summary = PhaseSummary {
        total,
        ..Default::default()
    };
    let mut done = 0usize;

    for batch in subset.chunks(batch_size.max(1)) {
        let mut handles = Vec::with_capacity(batch.len());

        for &index in batch {
            let job_id = jobs[index].id.clone();
            let category = jobs[index].milestone_category;
            let client = Arc::clone(client);
            let ctx = ctx.clone();

            handles.push(tokio::spawn(async move {
                let outcome = enrich_job(phase, client.as_ref(), &job_id, category, &ctx).await;
                (index, outcome)
            }));
        }

        // Barrier: every task settles before any patch lands.
        for handle in handles {
            match handle.await {
                Ok((index, Ok(patch))) => patch.apply(&mut jobs[index]),
                Ok((index, Err(e))) => {
                    debug!(job_id = %jobs[index].id, error = %e, "enrichment call failed, keeping defaults");
                    summary.failed += 1;
                }
                Err(e) => {
                    debug!(error = %e, "enrichment task aborted");
                    summary.failed += 1;
                }
            }
        }

        done += batch.len();
        summary.batches += 1;
        on_batch(jobs, done, total);
    }

    info!(
        total = summary.total,
        failed = summary.failed,
        batches = summary.batches,
        "phase finished"
    );

    summary
}
