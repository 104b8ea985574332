//! Validated rotation configuration.

use chrono::Utc;
use tracing::{info, warn};

use crate::boundary::outdated_boundary;
use crate::cli::Args;
use crate::error::RotationError;

pub const DEFAULT_RETENTION_SECONDS: i64 = 7 * 86_400;
pub const DEFAULT_MIN_RETAINED_COUNT: u32 = 7;
pub const DEFAULT_BACKUP_NAME_PREFIX: &str = "Scheduled";

/// Immutable settings for one invocation, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionConfig {
    table_names: Vec<String>,
    retention_seconds: i64,
    min_retained_count: u32,
    backup_name_prefix: String,
    dry_run: bool,
}

impl RetentionConfig {
    /// Validate raw values. Blank table names are ignored and duplicates are
    /// dropped, keeping the first occurrence.
    pub fn new<I, S>(
        tables: I,
        retention_seconds: i64,
        min_retained_count: i64,
    ) -> Result<Self, RotationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table_names: Vec<String> = Vec::new();
        for table in tables {
            let name = table.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            if table_names.iter().any(|existing| existing == name) {
                warn!(table_name = %name, "Duplicate table name ignored");
                continue;
            }
            table_names.push(name.to_string());
        }

        if table_names.is_empty() {
            return Err(RotationError::invalid_config(
                "at least one table name is required",
            ));
        }

        // Rejects non-positive and out-of-range retentions before any table runs
        outdated_boundary(retention_seconds, Utc::now())?;

        let min_retained_count = u32::try_from(min_retained_count).map_err(|_| {
            RotationError::invalid_config(format!(
                "backup minimum count must be between 0 and {}, got {}",
                u32::MAX,
                min_retained_count
            ))
        })?;

        Ok(Self {
            table_names,
            retention_seconds,
            min_retained_count,
            backup_name_prefix: DEFAULT_BACKUP_NAME_PREFIX.to_string(),
            dry_run: false,
        })
    }

    pub fn from_args(args: &Args) -> Result<Self, RotationError> {
        let prefix = args.backup_name_prefix.trim();
        if prefix.is_empty() {
            return Err(RotationError::invalid_config(
                "backup name prefix must not be empty",
            ));
        }

        Ok(
            Self::new(&args.tables, args.backup_retention, args.backup_min_count)?
                .with_backup_name_prefix(prefix)
                .with_dry_run(args.dry_run),
        )
    }

    pub fn with_backup_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.backup_name_prefix = prefix.into();
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn table_names(&self) -> &[String] {
        &self.table_names
    }

    pub fn retention_seconds(&self) -> i64 {
        self.retention_seconds
    }

    pub fn min_retained_count(&self) -> u32 {
        self.min_retained_count
    }

    pub fn backup_name_prefix(&self) -> &str {
        &self.backup_name_prefix
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn display(&self, region: &str) {
        info!(
            tables = ?self.table_names,
            table_count = self.table_names.len(),
            retention_seconds = self.retention_seconds,
            min_retained_count = self.min_retained_count,
            backup_name_prefix = %self.backup_name_prefix,
            dry_run = self.dry_run,
            region = %region,
            "Configuration initialized"
        );

        if self.dry_run {
            warn!("DRY RUN MODE ENABLED - Outdated backups will only be logged, not deleted");
        }
    }
}
