//! Engine entrypoint: fetch → seed → four enrichment phases → complete.
//!
//! All output flows through a [`SnapshotSink`]. Each snapshot is recomputed
//! from the whole job set, so a consumer can render any one of them alone.

use std::sync::Arc;

use salescycle_crm::CrmClient;
use salescycle_shared::{EngineConfig, EngineState, EnrichedJob, LoadingPhase, RunId};
use tracing::{info, instrument, warn};

use crate::catalog::{dedupe_by_id, fetch_catalog, seed_job};
use crate::directory::RepDirectory;
use crate::enrichment::{EnrichmentPhase, PhaseContext, run_phase};
use crate::funnel::{AggregationContext, RepDenylist, aggregate};
use crate::period::ReportingPeriod;

/// Receives every snapshot of a run, in order.
pub trait SnapshotSink: Send {
    fn emit(&mut self, state: EngineState);
}

impl<F> SnapshotSink for F
where
    F: FnMut(EngineState) + Send,
{
    fn emit(&mut self, state: EngineState) {
        self(state)
    }
}

/// Drives one run against a CRM client.
pub struct SalesCycleEngine<C> {
    client: Arc<C>,
    config: EngineConfig,
}

impl<C: CrmClient> SalesCycleEngine<C> {
    pub fn new(client: Arc<C>, config: EngineConfig) -> Self {
        Self { client, config }
    }

    /// Run the full pipeline. The last snapshot always has phase `complete`.
    pub async fn run(&self, sink: &mut dyn SnapshotSink) {
        self.run_with_id(RunId::new(), sink).await
    }

    #[instrument(skip_all, fields(run_id = %run_id))]
    async fn run_with_id(&self, run_id: RunId, sink: &mut dyn SnapshotSink) {
        let period = self
            .config
            .reference_date
            .map(ReportingPeriod::containing)
            .unwrap_or_else(ReportingPeriod::current);
        let ctx = AggregationContext {
            period,
            denylist: RepDenylist::new(&self.config.inactive_reps),
        };
        let mut out = Snapshots::new(run_id, ctx, sink);

        info!(
            batch_size = self.config.batch_size,
            year = period.year(),
            month = period.month(),
            "starting run"
        );

        // --- Catalog ---
        out.emit(&[], LoadingPhase::FetchingJobs, "Fetching jobs...", 5);

        let records =
            match fetch_catalog(self.client.as_ref(), self.config.max_jobs_per_milestone).await {
                Ok(records) => records,
                Err(e) => {
                    warn!(error = %e, "job catalog unavailable, ending run");
                    out.fail(e.to_string());
                    return;
                }
            };

        let records = if self.config.dedupe_jobs {
            dedupe_by_id(records)
        } else {
            records
        };

        let mut jobs: Vec<EnrichedJob> = records.into_iter().map(seed_job).collect();
        out.emit(
            &jobs,
            LoadingPhase::FetchingJobs,
            format!("Found {} jobs", jobs.len()),
            15,
        );

        // --- Enrichment ---
        let mut directory = Arc::new(RepDirectory::default());
        let mut failed_calls = 0usize;

        for phase in EnrichmentPhase::ORDER {
            let subset = phase.subset(&jobs);
            let band = phase.band();
            let loading = phase.loading_phase();

            if !subset.is_empty() {
                out.emit(&jobs, loading, phase.start_message(subset.len()), band.start);

                if phase == EnrichmentPhase::SalesOwner {
                    directory =
                        Arc::new(RepDirectory::load(self.client.as_ref(), self.config.max_users).await);
                    out.emit(
                        &jobs,
                        loading,
                        format!("Matching reps for {} jobs...", subset.len()),
                        band.batch_base,
                    );
                }

                let phase_ctx = PhaseContext {
                    directory: Arc::clone(&directory),
                    period,
                };

                let summary = run_phase(
                    phase,
                    &self.client,
                    &mut jobs,
                    &subset,
                    self.config.batch_size,
                    &phase_ctx,
                    |jobs, done, total| {
                        out.emit(
                            jobs,
                            loading,
                            phase.batch_message(done, total),
                            band.progress_at(done, total),
                        );
                    },
                )
                .await;
                failed_calls += summary.failed;
            }

            if let Some(message) = phase.complete_message() {
                out.emit(&jobs, loading, message, band.end);
            }
        }

        out.emit(&jobs, LoadingPhase::Complete, "All data loaded", 100);
        info!(
            jobs = jobs.len(),
            failed_calls,
            snapshots = out.emitted,
            "run complete"
        );
    }
}

/// Convenience wrapper for a single run.
pub async fn run<C: CrmClient>(client: Arc<C>, config: EngineConfig, sink: &mut dyn SnapshotSink) {
    SalesCycleEngine::new(client, config).run(sink).await
}

// ---------------------------------------------------------------------------
// Snapshot assembly
// ---------------------------------------------------------------------------

struct Snapshots<'a> {
    run_id: RunId,
    ctx: AggregationContext,
    sink: &'a mut dyn SnapshotSink,
    emitted: usize,
}

impl<'a> Snapshots<'a> {
    fn new(run_id: RunId, ctx: AggregationContext, sink: &'a mut dyn SnapshotSink) -> Self {
        Self {
            run_id,
            ctx,
            sink,
            emitted: 0,
        }
    }

    fn emit(
        &mut self,
        jobs: &[EnrichedJob],
        phase: LoadingPhase,
        message: impl Into<String>,
        progress: u8,
    ) {
        let state = self.build(jobs, phase, message.into(), progress, None);
        self.send(state);
    }

    /// Terminal snapshot for a run that could not load its catalog.
    fn fail(&mut self, error: String) {
        let state = self.build(&[], LoadingPhase::Complete, String::new(), 0, Some(error));
        self.send(state);
    }

    fn send(&mut self, state: EngineState) {
        self.emitted += 1;
        self.sink.emit(state);
    }

    fn build(
        &self,
        jobs: &[EnrichedJob],
        phase: LoadingPhase,
        phase_message: String,
        progress: u8,
        error: Option<String>,
    ) -> EngineState {
        let report = aggregate(jobs, &self.ctx);
        EngineState {
            run_id: self.run_id,
            jobs: jobs.to_vec(),
            funnel: report.funnel,
            conversions: report.conversions,
            rep_performance: report.rep_performance,
            rep_funnel: report.rep_funnel,
            rep_conversions: report.rep_conversions,
            sales_ytd: report.sales_ytd,
            built_ytd: report.built_ytd,
            phase,
            phase_message,
            progress: progress.min(100),
            error,
        }
    }
}
