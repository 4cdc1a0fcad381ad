//! In-memory CRM double for engine tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use salescycle_crm::{CrmClient, Page, endpoints};
use salescycle_shared::{Result, SalesCycleError};
use serde_json::{Value, json};

/// Serves canned listings and detail documents.
///
/// Unknown detail endpoints answer 404. Listing requests are logged with
/// their params; detail calls are logged and counted so tests can check
/// concurrency.
#[derive(Default)]
pub struct MockCrm {
    jobs: HashMap<String, Vec<Value>>,
    failing_milestones: HashSet<String>,
    users: Vec<Value>,
    users_fail: bool,
    details: HashMap<String, Value>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<String>>,
    listings: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl MockCrm {
    pub fn new() -> Self {
        Self {
            delay: Duration::from_millis(1),
            ..Default::default()
        }
    }

    pub fn with_jobs(mut self, milestone: &str, jobs: Vec<Value>) -> Self {
        self.jobs.entry(milestone.to_string()).or_default().extend(jobs);
        self
    }

    pub fn failing_milestone(mut self, milestone: &str) -> Self {
        self.failing_milestones.insert(milestone.to_string());
        self
    }

    pub fn with_users(mut self, users: Vec<Value>) -> Self {
        self.users = users;
        self
    }

    pub fn failing_users(mut self) -> Self {
        self.users_fail = true;
        self
    }

    pub fn with_detail(mut self, endpoint: &str, body: Value) -> Self {
        self.details.insert(endpoint.to_string(), body);
        self
    }

    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Highest number of detail calls observed running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Detail endpoints requested so far, in call order.
    pub fn detail_calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Listing requests so far: endpoint plus query params, in call order.
    pub fn listing_calls(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.listings.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn listing(&self, endpoint: &str, params: &[(String, String)]) -> Result<Vec<Value>> {
        if endpoint == endpoints::USERS {
            if self.users_fail {
                return Err(SalesCycleError::Network("connection reset".into()));
            }
            return Ok(self.users.clone());
        }

        let milestone = params
            .iter()
            .find(|(k, _)| k == "milestones")
            .map(|(_, v)| v.as_str())
            .unwrap_or_default();

        if self.failing_milestones.contains(milestone) {
            return Err(SalesCycleError::Api {
                status: 500,
                endpoint: endpoint.to_string(),
            });
        }
        Ok(self.jobs.get(milestone).cloned().unwrap_or_default())
    }
}

impl CrmClient for MockCrm {
    async fn paginated_fetch(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        max_items: usize,
    ) -> Result<Page> {
        if let Ok(mut listings) = self.listings.lock() {
            listings.push((endpoint.to_string(), params.to_vec()));
        }
        let mut items = self.listing(endpoint, params)?;
        let count = items.len();
        items.truncate(max_items);
        Ok(Page { items, count })
    }

    async fn detail_fetch(&self, endpoint: &str) -> Result<Value> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(endpoint.to_string());
        }

        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.details
            .get(endpoint)
            .cloned()
            .ok_or_else(|| SalesCycleError::Api {
                status: 404,
                endpoint: endpoint.to_string(),
            })
    }
}

/// Raw job listing entry.
pub fn job(id: &str, milestone: &str, created: &str, milestone_date: &str) -> Value {
    json!({
        "id": id,
        "jobName": "",
        "jobNumber": "",
        "currentMilestone": milestone,
        "createdDate": created,
        "milestoneDate": milestone_date,
    })
}
