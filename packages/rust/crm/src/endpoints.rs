//! CRM endpoint paths used by the engine.

/// Job listing, filtered with `milestones=<name>`.
pub const JOBS: &str = "/jobs";

/// Company user directory.
pub const USERS: &str = "/users";

/// Current milestone of a job, with its status expanded.
pub fn current_milestone_with_status(job_id: &str) -> String {
    format!("/jobs/{job_id}/milestones/current?includes=status")
}

pub fn representatives(job_id: &str) -> String {
    format!("/jobs/{job_id}/representatives")
}

pub fn job_financials(job_id: &str) -> String {
    format!("/jobs/{job_id}/financials")
}

/// Full financials record, when the job endpoint only returns a reference.
pub fn financial_by_id(financial_id: &str) -> String {
    format!("/financials/{financial_id}")
}

pub fn invoices(job_id: &str) -> String {
    format!("/jobs/{job_id}/invoices")
}
