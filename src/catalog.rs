//! Backup catalog capability used by the rotation cycle.
//!
//! The catalog is the external backup service. The rotation logic only
//! needs to create, list, count and delete backups through this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::RotationError;

/// A backup as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupSummary {
    pub table_name: String,
    pub backup_arn: String,
    pub creation_time: DateTime<Utc>,
}

/// A freshly requested on-demand backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupHandle {
    pub table_name: String,
    pub backup_arn: String,
    pub backup_name: String,
}

/// One page of a backup listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupPage {
    pub items: Vec<BackupSummary>,
    pub continuation_token: Option<String>,
}

impl BackupPage {
    pub fn has_more_pages(&self) -> bool {
        self.continuation_token.is_some()
    }
}

/// Filters for a backup listing.
///
/// `lower_bound` is inclusive and `upper_bound` exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListBackupsQuery {
    pub lower_bound: Option<DateTime<Utc>>,
    pub upper_bound: Option<DateTime<Utc>>,
    pub continuation_token: Option<String>,
}

impl ListBackupsQuery {
    /// Backups created strictly before `boundary`.
    pub fn outdated(boundary: DateTime<Utc>) -> Self {
        Self {
            upper_bound: Some(boundary),
            ..Self::default()
        }
    }

    pub fn in_range(lower: DateTime<Utc>, upper: DateTime<Utc>) -> Self {
        Self {
            lower_bound: Some(lower),
            upper_bound: Some(upper),
            continuation_token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.continuation_token = token;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The backup no longer existed.
    AlreadyGone,
}

#[async_trait]
pub trait BackupCatalog: Send + Sync {
    async fn create_backup(
        &self,
        table_name: &str,
        backup_name: &str,
    ) -> Result<BackupHandle, RotationError>;

    async fn list_backups(
        &self,
        table_name: &str,
        query: &ListBackupsQuery,
    ) -> Result<BackupPage, RotationError>;

    /// Exact number of backups created within `[lower, upper)`.
    async fn count_backups_in_range(
        &self,
        table_name: &str,
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
    ) -> Result<usize, RotationError> {
        let mut count = 0;
        let mut query = ListBackupsQuery::in_range(lower, upper);

        loop {
            let page = self.list_backups(table_name, &query).await?;
            count += page.items.len();

            match page.continuation_token {
                Some(token) if query.continuation_token.as_deref() == Some(token.as_str()) => {
                    return Err(RotationError::service(
                        "ListBackups",
                        format!("pagination did not advance past token {}", token),
                    ));
                }
                Some(token) => query.continuation_token = Some(token),
                None => return Ok(count),
            }
        }
    }

    async fn delete_backup(&self, backup_arn: &str) -> Result<DeleteOutcome, RotationError>;

    fn name(&self) -> &str;
}
