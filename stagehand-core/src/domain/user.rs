//! User domain model
//!
//! Users own pipelines. Identity issuance and authentication live outside
//! Stagehand; only the record needed to validate ownership is kept here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered pipeline owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier for the user
    pub id: Uuid,

    /// Contact email, unique across users
    pub email: String,

    /// When this user was registered
    pub created_at: DateTime<Utc>,

    /// Last time the record changed
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
