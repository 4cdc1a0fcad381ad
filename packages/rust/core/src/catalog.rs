//! Job catalog: one paged listing per tracked milestone, merged in order.

use std::collections::HashSet;

use salescycle_crm::{CrmClient, endpoints};
use salescycle_shared::{EnrichedJob, MilestoneCategory, RawJobRecord, Result};
use tracing::{debug, info, instrument, warn};

use crate::stages::classify;

/// Fetch every tracked milestone category and concatenate the results.
///
/// The five listings run concurrently; any failure fails the whole catalog.
#[instrument(skip(client))]
pub async fn fetch_catalog<C: CrmClient>(
    client: &C,
    max_per_milestone: usize,
) -> Result<Vec<RawJobRecord>> {
    let [lead, prospect, approved, completed, invoiced] = MilestoneCategory::TRACKED;

    let batches = tokio::try_join!(
        fetch_category(client, lead, max_per_milestone),
        fetch_category(client, prospect, max_per_milestone),
        fetch_category(client, approved, max_per_milestone),
        fetch_category(client, completed, max_per_milestone),
        fetch_category(client, invoiced, max_per_milestone),
    )?;

    let (a, b, c, d, e) = batches;
    let records: Vec<RawJobRecord> = [a, b, c, d, e].into_iter().flatten().collect();

    info!(jobs = records.len(), "job catalog loaded");
    Ok(records)
}

/// Fetch the listing for one milestone category.
async fn fetch_category<C: CrmClient>(
    client: &C,
    category: MilestoneCategory,
    max_items: usize,
) -> Result<Vec<RawJobRecord>> {
    let params = vec![
        ("milestones".to_string(), category.query_name().to_string()),
        ("sortOrder".to_string(), "Descending".to_string()),
    ];

    let page = client
        .paginated_fetch(endpoints::JOBS, &params, max_items)
        .await?;

    let mut records = Vec::with_capacity(page.items.len());
    for item in page.items {
        match serde_json::from_value::<RawJobRecord>(item) {
            Ok(record) => records.push(record),
            Err(e) => warn!(%category, error = %e, "skipping undecodable job record"),
        }
    }

    debug!(%category, fetched = records.len(), upstream_count = page.count, "milestone listing fetched");
    Ok(records)
}

/// Drop later records whose id was already seen. First occurrence wins.
pub fn dedupe_by_id(records: Vec<RawJobRecord>) -> Vec<RawJobRecord> {
    let mut seen = HashSet::new();
    let before = records.len();
    let unique: Vec<RawJobRecord> = records
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect();

    if unique.len() < before {
        debug!(dropped = before - unique.len(), "removed duplicate job ids");
    }
    unique
}

/// Build the initial enriched record for a raw job.
///
/// The milestone category is fixed here. Approved jobs are classified right
/// away; every other job waits for status enrichment.
pub fn seed_job(raw: RawJobRecord) -> EnrichedJob {
    let milestone_category = MilestoneCategory::from_milestone(&raw.current_milestone);
    let stage = classify(milestone_category, "");

    let job_name = if raw.job_name.trim().is_empty() {
        let number = if raw.job_number.is_empty() {
            &raw.id
        } else {
            &raw.job_number
        };
        format!("Job #{number}")
    } else {
        raw.job_name
    };

    EnrichedJob {
        id: raw.id,
        job_name,
        job_number: raw.job_number,
        current_milestone: raw.current_milestone,
        created_date: raw.created_date,
        milestone_date: raw.milestone_date,
        invoice_date: String::new(),
        milestone_category,
        status_name: String::new(),
        stage,
        sales_owner: String::new(),
        contract_amount: 0.0,
        built_amount: 0.0,
    }
}
