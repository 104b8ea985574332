use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::cli::LogFormat;

/// AWS SDK crates that log every retry and credential refresh at debug.
const SDK_TARGETS: [&str; 3] = ["aws_config", "aws_smithy_runtime", "aws_sdk_dynamodb"];

/// Install the global tracing subscriber.
///
/// `RUST_LOG` replaces the whole filter when set. Otherwise `level` applies to
/// the rotation logs and the SDK crates are capped at `warn`.
pub fn init(format: LogFormat, level: LevelFilter) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(level.into())
            .parse_lossy(sdk_directives(level))
    });

    // Table spans carry table_name into every JSON line
    let layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_timer(UtcTime::rfc_3339())
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_target(false)
            .compact()
            .boxed(),
    };

    tracing_subscriber::registry().with(filter).with(layer).init();

    tracing::debug!(
        log_format = ?format,
        log_level = %level,
        "Logging system initialized"
    );
}

fn sdk_directives(level: LevelFilter) -> String {
    let sdk_level = level.min(LevelFilter::WARN);
    SDK_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, sdk_level))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdk_capped_at_warn() {
        assert_eq!(
            sdk_directives(LevelFilter::DEBUG),
            "aws_config=warn,aws_smithy_runtime=warn,aws_sdk_dynamodb=warn"
        );
    }

    #[test]
    fn test_sdk_follows_quieter_level() {
        assert_eq!(
            sdk_directives(LevelFilter::ERROR),
            "aws_config=error,aws_smithy_runtime=error,aws_sdk_dynamodb=error"
        );
        assert!(sdk_directives(LevelFilter::OFF).ends_with("aws_sdk_dynamodb=off"));
    }
}
