use clap::{Parser, ValueEnum};
use tracing::level_filters::LevelFilter;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, for log shippers
    Json,
    /// Compact human-readable lines
    #[value(alias = "compact", alias = "text")]
    Pretty,
}

/// Scheduled DynamoDB on-demand backup with retention-based rotation
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Comma-separated DynamoDB table names to back up
    #[arg(long, env = "TABLES", value_delimiter = ',', required = true)]
    pub tables: Vec<String>,

    /// Backup retention in seconds (must be larger than 0)
    #[arg(
        long,
        env = "BACKUP_RETENTION",
        default_value = "604800",
        allow_negative_numbers = true
    )]
    pub backup_retention: i64,

    /// Minimum number of recent backups kept before outdated ones are deleted
    #[arg(
        long,
        env = "BACKUP_MIN_COUNT",
        default_value = "7",
        allow_negative_numbers = true
    )]
    pub backup_min_count: i64,

    /// Prefix of the generated backup name (<prefix>_<unix millis>)
    #[arg(long, env = "BACKUP_NAME_PREFIX", default_value = "Scheduled")]
    pub backup_name_prefix: String,

    /// AWS region (falls back to the AWS SDK default chain)
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Dry run mode (outdated backups are only logged, never deleted)
    #[arg(long, env = "DRY_RUN", default_value = "false")]
    pub dry_run: bool,

    /// Log format
    #[arg(long, env = "LOG_FORMAT", value_enum, ignore_case = true, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LevelFilter,
}
