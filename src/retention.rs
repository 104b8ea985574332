use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::{BackupPage, BackupSummary};

/// Why a table's outdated backups were left in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    NoOutdatedBackups,
    BelowMinimum { recent: usize, minimum: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionDecision {
    Proceed,
    Skip(SkipReason),
}

impl RetentionDecision {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }
}

/// Minimum-count retention rule applied once per table cycle, before any
/// deletion.
///
/// Outdated backups are deleted only when at least one exists and either the
/// outdated listing spans more than one page or the recent backups alone
/// already satisfy the minimum. The multi-page case is trusted to leave
/// enough near-boundary backups; it is not re-verified after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    min_retained_count: u32,
}

impl RetentionPolicy {
    pub fn new(min_retained_count: u32) -> Self {
        Self { min_retained_count }
    }

    pub fn min_retained_count(&self) -> u32 {
        self.min_retained_count
    }

    pub fn should_proceed(
        &self,
        outdated_count: usize,
        has_more_pages: bool,
        recent_count: usize,
    ) -> bool {
        self.evaluate(outdated_count, has_more_pages, recent_count)
            .is_proceed()
    }

    pub fn evaluate(
        &self,
        outdated_count: usize,
        has_more_pages: bool,
        recent_count: usize,
    ) -> RetentionDecision {
        if outdated_count == 0 {
            return RetentionDecision::Skip(SkipReason::NoOutdatedBackups);
        }

        if !has_more_pages && recent_count < self.min_retained_count as usize {
            return RetentionDecision::Skip(SkipReason::BelowMinimum {
                recent: recent_count,
                minimum: self.min_retained_count,
            });
        }

        RetentionDecision::Proceed
    }

    /// Entries of an outdated page that may be deleted.
    ///
    /// Anything created at or after `boundary` is never eligible, whatever the
    /// listing returned.
    pub fn eligible<'a>(
        &self,
        page: &'a BackupPage,
        boundary: DateTime<Utc>,
    ) -> impl Iterator<Item = &'a BackupSummary> + 'a {
        page.items
            .iter()
            .filter(move |backup| backup.creation_time < boundary)
    }
}
