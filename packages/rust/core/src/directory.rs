//! User directory: resolves representative user ids to display names.

use std::collections::HashMap;

use salescycle_crm::{CrmClient, endpoints};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::extract::{USER_NAME, first_match, user_id};

/// Id → display name lookup, loaded once per run.
#[derive(Debug, Clone, Default)]
pub struct RepDirectory {
    names: HashMap<String, String>,
}

impl RepDirectory {
    /// Load the user list. A failed load yields an empty directory so that
    /// sales owners resolve to empty names instead of failing the run.
    #[instrument(skip(client))]
    pub async fn load<C: CrmClient>(client: &C, max_users: usize) -> Self {
        match client.paginated_fetch(endpoints::USERS, &[], max_users).await {
            Ok(page) => {
                let directory = Self::from_users(&page.items);
                info!(users = directory.len(), "user directory loaded");
                directory
            }
            Err(e) => {
                warn!(error = %e, "user directory unavailable, sales owners will stay empty");
                Self::default()
            }
        }
    }

    /// Build from raw user objects. Users without an id or a name are skipped.
    pub fn from_users(users: &[Value]) -> Self {
        let names = users
            .iter()
            .filter_map(|u| Some((user_id(u)?, first_match(USER_NAME, u)?)))
            .collect();
        Self { names }
    }

    /// Display name for `user_id`, or empty when unknown.
    pub fn resolve(&self, user_id: &str) -> &str {
        self.names.get(user_id).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCrm;

    fn fixture_users() -> Vec<Value> {
        let content = std::fs::read_to_string("../../../fixtures/crm/users.json")
            .expect("read users fixture");
        let parsed: Value = serde_json::from_str(&content).expect("parse users fixture");
        crate::extract::items_of(&parsed).to_vec()
    }

    #[test]
    fn builds_lookup_with_name_priority() {
        let directory = RepDirectory::from_users(&fixture_users());

        assert_eq!(directory.resolve("u-100"), "Dana Smith");
        assert_eq!(directory.resolve("u-101"), "Marcus Lee");
        assert_eq!(directory.resolve("u-102"), "pat.o");
        assert_eq!(directory.resolve("u-404"), "");
        // Nameless and id-less users are dropped.
        assert_eq!(directory.len(), 3);
    }

    #[tokio::test]
    async fn load_failure_yields_empty_directory() {
        let crm = MockCrm::new().failing_users();
        let directory = RepDirectory::load(&crm, 100).await;
        assert!(directory.is_empty());
        assert_eq!(directory.resolve("u-100"), "");
    }

    #[tokio::test]
    async fn load_reads_paged_users() {
        let crm = MockCrm::new().with_users(fixture_users());
        let directory = RepDirectory::load(&crm, 100).await;
        assert_eq!(directory.resolve("u-101"), "Marcus Lee");
    }
}
