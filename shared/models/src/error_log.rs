//! Persisted diagnostic entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row of the diagnostic error log, keyed by a free-text title.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ErrorLogEntry {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
