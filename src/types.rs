use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::RotationError;
use crate::retention::SkipReason;

/// Progress of a single table through its rotation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableState {
    Pending,
    Created,
    Listed,
    Deleting,
    Skipped,
    Done,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionStats {
    pub pages: usize,
    pub deleted: usize,
    pub already_gone: usize,
    /// Backups that would have been deleted in dry run mode.
    pub would_delete: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableOutcome {
    Skipped(SkipReason),
    Done(DeletionStats),
    Failed {
        /// Last state reached before the error.
        state: TableState,
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub table_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundary: Option<DateTime<Utc>>,
    pub outdated_first_page: usize,
    pub has_more_pages: bool,
    pub recent_count: usize,
    pub outcome: TableOutcome,
    pub duration_seconds: f64,
}

impl TableReport {
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            backup_arn: None,
            boundary: None,
            outdated_first_page: 0,
            has_more_pages: false,
            recent_count: 0,
            outcome: TableOutcome::Skipped(SkipReason::NoOutdatedBackups),
            duration_seconds: 0.0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, TableOutcome::Failed { .. })
    }

    pub fn deletion_stats(&self) -> Option<&DeletionStats> {
        match &self.outcome {
            TableOutcome::Done(stats) => Some(stats),
            _ => None,
        }
    }
}

/// Aggregate result of one invocation, printed as JSON on exit.
#[derive(Debug, Clone, Serialize)]
pub struct RotationSummary {
    pub status: String,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub total_execution_time_seconds: f64,
    pub retention_seconds: i64,
    pub min_retained_count: u32,
    pub dry_run: bool,
    pub tables: Vec<TableReport>,
}

impl RotationSummary {
    pub fn failed_tables(&self) -> Vec<String> {
        self.tables
            .iter()
            .filter(|t| t.is_failed())
            .map(|t| t.table_name.clone())
            .collect()
    }

    pub fn total_deleted(&self) -> usize {
        self.tables
            .iter()
            .filter_map(TableReport::deletion_stats)
            .map(|s| s.deleted)
            .sum()
    }

    pub fn is_success(&self) -> bool {
        self.tables.iter().all(|t| !t.is_failed())
    }

    /// Fail the invocation when any table did not complete its cycle.
    pub fn into_result(self) -> Result<Self, RotationError> {
        let failed = self.failed_tables();
        if failed.is_empty() {
            Ok(self)
        } else {
            Err(RotationError::PartialCycleFailure {
                failed,
                total: self.tables.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(tables: Vec<TableReport>) -> RotationSummary {
        RotationSummary {
            status: "Success".to_string(),
            message: String::new(),
            started_at: Utc::now(),
            total_execution_time_seconds: 0.0,
            retention_seconds: 60,
            min_retained_count: 1,
            dry_run: false,
            tables,
        }
    }

    #[test]
    fn test_into_result_reports_failed_tables() {
        let ok = TableReport::new("orders");
        let mut failed = TableReport::new("users");
        failed.outcome = TableOutcome::Failed {
            state: TableState::Created,
            error: "throttled".to_string(),
        };

        let err = summary(vec![ok, failed]).into_result().unwrap_err();
        match err {
            RotationError::PartialCycleFailure { failed, total } => {
                assert_eq!(failed, vec!["users"]);
                assert_eq!(total, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_total_deleted_sums_done_tables() {
        let mut a = TableReport::new("orders");
        a.outcome = TableOutcome::Done(DeletionStats {
            pages: 1,
            deleted: 3,
            ..DeletionStats::default()
        });
        let mut b = TableReport::new("users");
        b.outcome = TableOutcome::Done(DeletionStats {
            pages: 2,
            deleted: 8,
            ..DeletionStats::default()
        });

        let summary = summary(vec![a, b, TableReport::new("payments")]);
        assert!(summary.is_success());
        assert_eq!(summary.total_deleted(), 11);
    }

    #[test]
    fn test_outcome_serialization() {
        let skipped = TableOutcome::Skipped(SkipReason::BelowMinimum {
            recent: 5,
            minimum: 7,
        });
        assert_eq!(
            serde_json::to_value(&skipped).unwrap(),
            serde_json::json!({"status": "skipped", "reason": "below_minimum", "recent": 5, "minimum": 7})
        );

        let failed = TableOutcome::Failed {
            state: TableState::Listed,
            error: "boom".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({"status": "failed", "state": "listed", "error": "boom"})
        );
    }
}
