use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn create(name: impl Into<String>, description: Option<String>) -> Self {
        Self { id: Uuid::now_v7(), name: name.into(), description, created_at: Utc::now() }
    }
}
