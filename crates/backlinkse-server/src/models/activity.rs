use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Validate;
use crate::store::{new_id, Document};

/// Feed entry shown on the customer dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Activity {
    const COLLECTION: &'static str = "activities";
    fn id(&self) -> &str {
        &self.id
    }
}

impl Validate for Activity {}

impl Activity {
    pub fn new(user_id: &str, action: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            user_id: user_id.to_owned(),
            action: action.into(),
            site: None,
            domain_rating: None,
            order_id: None,
            project_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    pub fn domain_rating(mut self, dr: u8) -> Self {
        self.domain_rating = Some(dr.min(100));
        self
    }

    pub fn order(mut self, order_id: &str) -> Self {
        self.order_id = Some(order_id.to_owned());
        self
    }

    pub fn project(mut self, project_id: &str) -> Self {
        self.project_id = Some(project_id.to_owned());
        self
    }
}
