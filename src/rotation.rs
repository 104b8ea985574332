//! Per-table backup rotation cycle.
//!
//! Every table goes through create → list → decide → delete on its own.
//! Tables run concurrently and a failure in one never stops the others.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::boundary::outdated_boundary;
use crate::catalog::{BackupCatalog, BackupPage, DeleteOutcome, ListBackupsQuery};
use crate::config::RetentionConfig;
use crate::error::RotationError;
use crate::retention::{RetentionDecision, RetentionPolicy};
use crate::types::{DeletionStats, RotationSummary, TableOutcome, TableReport, TableState};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct Rotator<'a, C: ?Sized> {
    catalog: &'a C,
    config: &'a RetentionConfig,
    policy: RetentionPolicy,
    clock: Arc<dyn Clock>,
}

impl<'a, C: BackupCatalog + ?Sized> Rotator<'a, C> {
    pub fn new(catalog: &'a C, config: &'a RetentionConfig) -> Self {
        Self {
            catalog,
            config,
            policy: RetentionPolicy::new(config.min_retained_count()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Rotate every configured table and collect the per-table results.
    pub async fn run(&self) -> RotationSummary {
        let started_at = self.clock.now();
        let run_start = Instant::now();

        info!(
            catalog = self.catalog.name(),
            table_count = self.config.table_names().len(),
            retention_seconds = self.config.retention_seconds(),
            min_retained_count = self.config.min_retained_count(),
            "Backup rotation started"
        );

        let cycles = self.config.table_names().iter().map(|table_name| {
            self.rotate_table(table_name)
                .instrument(info_span!("rotate_table", table_name = %table_name))
        });
        let tables = join_all(cycles).await;

        let failed = tables.iter().filter(|t| t.is_failed()).count();
        let (status, message) = if failed == 0 {
            (
                "Success".to_string(),
                "DynamoDB backup rotation completed successfully".to_string(),
            )
        } else {
            (
                "Failed".to_string(),
                format!(
                    "DynamoDB backup rotation failed for {} of {} table(s)",
                    failed,
                    tables.len()
                ),
            )
        };

        RotationSummary {
            status,
            message,
            started_at,
            total_execution_time_seconds: run_start.elapsed().as_secs_f64(),
            retention_seconds: self.config.retention_seconds(),
            min_retained_count: self.config.min_retained_count(),
            dry_run: self.config.dry_run(),
            tables,
        }
    }

    /// Run one table's cycle. Errors are captured in the report.
    pub async fn rotate_table(&self, table_name: &str) -> TableReport {
        let cycle_start = Instant::now();
        let mut report = TableReport::new(table_name);
        let mut state = TableState::Pending;

        let result = self.cycle(table_name, &mut report, &mut state).await;
        report.duration_seconds = cycle_start.elapsed().as_secs_f64();

        match result {
            Ok(outcome) => {
                info!(
                    table_name = %table_name,
                    state = ?state,
                    duration_seconds = report.duration_seconds,
                    "Table rotation finished"
                );
                report.outcome = outcome;
            }
            Err(e) => {
                error!(
                    table_name = %table_name,
                    state = ?state,
                    error = %e,
                    duration_seconds = report.duration_seconds,
                    "Table rotation failed"
                );
                report.outcome = TableOutcome::Failed {
                    state,
                    error: e.to_string(),
                };
            }
        }

        report
    }

    async fn cycle(
        &self,
        table_name: &str,
        report: &mut TableReport,
        state: &mut TableState,
    ) -> Result<TableOutcome, RotationError> {
        // Step 1: Create backup
        let backup_name = format!(
            "{}_{}",
            self.config.backup_name_prefix(),
            self.clock.now().timestamp_millis()
        );
        debug!(table_name = %table_name, backup_name = %backup_name, "Creating on-demand backup");

        let handle = self.catalog.create_backup(table_name, &backup_name).await?;
        *state = TableState::Created;
        report.backup_arn = Some(handle.backup_arn.clone());
        info!(
            table_name = %table_name,
            backup_name = %handle.backup_name,
            backup_arn = %handle.backup_arn,
            "Backup created"
        );

        // Step 2: Inventory
        let now = self.clock.now();
        let boundary = outdated_boundary(self.config.retention_seconds(), now)?;
        report.boundary = Some(boundary);

        let first_page = self
            .catalog
            .list_backups(table_name, &ListBackupsQuery::outdated(boundary))
            .await?;
        let recent_count = self
            .catalog
            .count_backups_in_range(table_name, boundary, now)
            .await?;
        *state = TableState::Listed;

        // Only backups strictly before the boundary count as outdated
        let outdated_count = self.policy.eligible(&first_page, boundary).count();
        report.outdated_first_page = outdated_count;
        report.has_more_pages = first_page.has_more_pages();
        report.recent_count = recent_count;

        info!(
            table_name = %table_name,
            boundary = %boundary.to_rfc3339(),
            outdated_count,
            listed_count = first_page.items.len(),
            has_more_pages = first_page.has_more_pages(),
            recent_count,
            "Backup inventory listed"
        );

        // Step 3: Decide
        let decision =
            self.policy
                .evaluate(outdated_count, first_page.has_more_pages(), recent_count);
        if let RetentionDecision::Skip(reason) = decision {
            *state = TableState::Skipped;
            info!(
                table_name = %table_name,
                reason = ?reason,
                min_retained_count = self.policy.min_retained_count(),
                "Skipping outdated backup deletion"
            );
            return Ok(TableOutcome::Skipped(reason));
        }

        // Step 4: Delete page by page
        *state = TableState::Deleting;
        let mut stats = DeletionStats::default();
        let mut page = first_page;

        loop {
            stats.pages += 1;
            self.delete_page(table_name, &page, boundary, &mut stats)
                .await?;

            let Some(token) = page.continuation_token.take() else {
                break;
            };

            debug!(
                table_name = %table_name,
                page = stats.pages + 1,
                "More outdated backups available, continuing pagination"
            );

            let next = self
                .catalog
                .list_backups(
                    table_name,
                    &ListBackupsQuery::outdated(boundary).with_token(Some(token.clone())),
                )
                .await?;

            if next.continuation_token.as_deref() == Some(token.as_str()) {
                return Err(RotationError::service(
                    "ListBackups",
                    format!("pagination did not advance past token {}", token),
                ));
            }

            page = next;
        }

        *state = TableState::Done;
        info!(
            table_name = %table_name,
            pages = stats.pages,
            deleted = stats.deleted,
            already_gone = stats.already_gone,
            would_delete = stats.would_delete,
            "Outdated backup deletion completed"
        );

        Ok(TableOutcome::Done(stats))
    }

    /// Delete every eligible backup of one page concurrently.
    ///
    /// All sibling deletions are awaited before the first error, if any, is
    /// returned.
    async fn delete_page(
        &self,
        table_name: &str,
        page: &BackupPage,
        boundary: DateTime<Utc>,
        stats: &mut DeletionStats,
    ) -> Result<(), RotationError> {
        let eligible: Vec<_> = self.policy.eligible(page, boundary).collect();

        if eligible.len() < page.items.len() {
            warn!(
                table_name = %table_name,
                ignored = page.items.len() - eligible.len(),
                boundary = %boundary.to_rfc3339(),
                "Listing returned backups newer than the boundary, leaving them in place"
            );
        }

        if self.config.dry_run() {
            for backup in &eligible {
                info!(
                    table_name = %backup.table_name,
                    backup_arn = %backup.backup_arn,
                    creation_time = %backup.creation_time.to_rfc3339(),
                    "DRY RUN: would delete outdated backup"
                );
            }
            stats.would_delete += eligible.len();
            return Ok(());
        }

        let deletions = eligible.iter().map(|backup| async move {
            let result = self.catalog.delete_backup(&backup.backup_arn).await;
            (*backup, result)
        });
        let results = join_all(deletions).await;

        let mut first_error = None;
        for (backup, result) in results {
            match result {
                Ok(DeleteOutcome::Deleted) => {
                    stats.deleted += 1;
                    info!(
                        table_name = %backup.table_name,
                        backup_arn = %backup.backup_arn,
                        creation_time = %backup.creation_time.to_rfc3339(),
                        "Backup deleted"
                    );
                }
                Ok(DeleteOutcome::AlreadyGone) => {
                    stats.already_gone += 1;
                    warn!(
                        table_name = %backup.table_name,
                        backup_arn = %backup.backup_arn,
                        "Backup already deleted"
                    );
                }
                Err(e) => {
                    warn!(
                        table_name = %backup.table_name,
                        backup_arn = %backup.backup_arn,
                        error = %e,
                        "Failed to delete backup"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
