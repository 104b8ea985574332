//! DynamoDB-backed backup catalog.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::delete_backup::DeleteBackupError;
use aws_smithy_types::DateTime as SmithyDateTime;
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::catalog::{
    BackupCatalog, BackupHandle, BackupPage, BackupSummary, DeleteOutcome, ListBackupsQuery,
};
use crate::error::RotationError;

pub struct DynamoDbCatalog {
    client: Client,
    region: String,
}

impl DynamoDbCatalog {
    /// Creates a DynamoDB client with AWS SDK configuration
    ///
    /// Region resolution priority:
    /// 1. Explicit region from Args (--region CLI arg or AWS_REGION env var)
    /// 2. AWS SDK defaults (environment variables, ~/.aws/config, IMDS)
    pub async fn new(region: Option<&str>) -> Self {
        let config = match region {
            Some(r) => {
                info!(region = %r, "Using explicit AWS region from configuration");
                aws_config::defaults(BehaviorVersion::latest())
                    .region(aws_config::Region::new(r.to_string()))
                    .load()
                    .await
            }
            None => {
                debug!("Using default AWS region from AWS SDK (environment/credentials file/IMDS)");
                aws_config::load_defaults(BehaviorVersion::latest()).await
            }
        };

        let region = config
            .region()
            .map(|r| r.as_ref())
            .unwrap_or("unknown")
            .to_string();

        info!(region = %region, "AWS DynamoDB client initialized");

        Self::from_client(Client::new(&config), region)
    }

    pub fn from_client(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

pub(crate) fn to_smithy(time: DateTime<Utc>) -> SmithyDateTime {
    SmithyDateTime::from_secs_and_nanos(time.timestamp(), time.timestamp_subsec_nanos())
}

pub(crate) fn from_smithy(time: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos())
}

/// Service error code and message, falling back to the full error chain for
/// transport failures.
fn sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> RotationError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = match (err.code(), err.message()) {
        (Some(code), Some(message)) => format!("{}: {}", code, message),
        (Some(code), None) => code.to_string(),
        (None, Some(message)) => message.to_string(),
        (None, None) => DisplayErrorContext(&err).to_string(),
    };
    RotationError::service(operation, message)
}

fn is_not_found(err: &SdkError<DeleteBackupError>) -> bool {
    err.as_service_error()
        .is_some_and(DeleteBackupError::is_backup_not_found_exception)
}

#[async_trait]
impl BackupCatalog for DynamoDbCatalog {
    async fn create_backup(
        &self,
        table_name: &str,
        backup_name: &str,
    ) -> Result<BackupHandle, RotationError> {
        let start = Instant::now();

        let response = self
            .client
            .create_backup()
            .table_name(table_name)
            .backup_name(backup_name)
            .send()
            .await
            .map_err(|e| sdk_error("CreateBackup", e))?;

        let backup_arn = response
            .backup_details()
            .map(|details| details.backup_arn().to_string())
            .ok_or_else(|| {
                RotationError::service(
                    "CreateBackup",
                    format!("no backup details returned for table {}", table_name),
                )
            })?;

        debug!(
            table_name = %table_name,
            backup_arn = %backup_arn,
            duration_seconds = start.elapsed().as_secs_f64(),
            "CreateBackup request completed"
        );

        Ok(BackupHandle {
            table_name: table_name.to_string(),
            backup_arn,
            backup_name: backup_name.to_string(),
        })
    }

    async fn list_backups(
        &self,
        table_name: &str,
        query: &ListBackupsQuery,
    ) -> Result<BackupPage, RotationError> {
        let response = self
            .client
            .list_backups()
            .table_name(table_name)
            .set_time_range_lower_bound(query.lower_bound.map(to_smithy))
            .set_time_range_upper_bound(query.upper_bound.map(to_smithy))
            .set_exclusive_start_backup_arn(query.continuation_token.clone())
            .send()
            .await
            .map_err(|e| sdk_error("ListBackups", e))?;

        let mut items = Vec::new();
        for summary in response.backup_summaries() {
            let (Some(backup_arn), Some(created)) =
                (summary.backup_arn(), summary.backup_creation_date_time())
            else {
                warn!(
                    table_name = %table_name,
                    backup_arn = summary.backup_arn().unwrap_or("unknown"),
                    "Skipping backup summary without ARN or creation time"
                );
                continue;
            };

            let Some(creation_time) = from_smithy(created) else {
                warn!(
                    table_name = %table_name,
                    backup_arn = %backup_arn,
                    "Skipping backup summary with out-of-range creation time"
                );
                continue;
            };

            items.push(BackupSummary {
                table_name: summary.table_name().unwrap_or(table_name).to_string(),
                backup_arn: backup_arn.to_string(),
                creation_time,
            });
        }

        let continuation_token = response.last_evaluated_backup_arn().map(str::to_string);

        debug!(
            table_name = %table_name,
            batch_size = items.len(),
            has_more_pages = continuation_token.is_some(),
            "Retrieved backup summaries batch"
        );

        Ok(BackupPage {
            items,
            continuation_token,
        })
    }

    async fn delete_backup(&self, backup_arn: &str) -> Result<DeleteOutcome, RotationError> {
        match self
            .client
            .delete_backup()
            .backup_arn(backup_arn)
            .send()
            .await
        {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(e) if is_not_found(&e) => Ok(DeleteOutcome::AlreadyGone),
            Err(e) => Err(sdk_error("DeleteBackup", e)),
        }
    }

    fn name(&self) -> &str {
        "dynamodb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smithy_conversion_keeps_subsecond_precision() {
        let time = DateTime::parse_from_rfc3339("2024-01-03T00:00:00.250Z")
            .unwrap()
            .with_timezone(&Utc);

        let smithy = to_smithy(time);
        assert_eq!(smithy.secs(), time.timestamp());
        assert_eq!(smithy.subsec_nanos(), 250_000_000);
        assert_eq!(from_smithy(&smithy), Some(time));
    }

    #[test]
    fn test_smithy_conversion_before_epoch() {
        let time = DateTime::parse_from_rfc3339("1969-12-31T23:59:59Z")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(from_smithy(&to_smithy(time)), Some(time));
    }

    mod replay {
        use super::*;
        use aws_sdk_dynamodb::config::{Credentials, Region};
        use aws_smithy_http_client::test_util::{ReplayEvent, StaticReplayClient};
        use aws_smithy_types::body::SdkBody;

        fn catalog_replaying(status: u16, body: &'static str) -> DynamoDbCatalog {
            let http_client = StaticReplayClient::new(vec![ReplayEvent::new(
                http::Request::builder()
                    .uri("https://dynamodb.us-east-1.amazonaws.com/")
                    .body(SdkBody::empty())
                    .unwrap(),
                http::Response::builder()
                    .status(status)
                    .header("content-type", "application/x-amz-json-1.0")
                    .body(SdkBody::from(body))
                    .unwrap(),
            )]);

            let config = aws_sdk_dynamodb::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .region(Region::new("us-east-1"))
                .credentials_provider(Credentials::new("akid", "secret", None, None, "test"))
                .http_client(http_client)
                .build();

            DynamoDbCatalog::from_client(Client::from_conf(config), "us-east-1")
        }

        #[tokio::test]
        async fn test_delete_not_found_is_already_gone() {
            let catalog = catalog_replaying(
                400,
                r#"{"__type":"com.amazonaws.dynamodb.v20120810#BackupNotFoundException","message":"Backup not found"}"#,
            );

            let outcome = catalog.delete_backup("arn:aws:dynamodb:backup/1").await.unwrap();

            assert_eq!(outcome, DeleteOutcome::AlreadyGone);
        }

        #[tokio::test]
        async fn test_delete_in_use_is_service_error() {
            let catalog = catalog_replaying(
                400,
                r#"{"__type":"com.amazonaws.dynamodb.v20120810#BackupInUseException","message":"Backup is being created"}"#,
            );

            let err = catalog.delete_backup("arn:aws:dynamodb:backup/1").await.unwrap_err();

            assert_eq!(
                err.to_string(),
                "[DeleteBackup] Backup service error: BackupInUseException: Backup is being created"
            );
        }

        #[tokio::test]
        async fn test_delete_success() {
            let catalog = catalog_replaying(200, r#"{}"#);

            let outcome = catalog.delete_backup("arn:aws:dynamodb:backup/1").await.unwrap();

            assert_eq!(outcome, DeleteOutcome::Deleted);
        }

        #[tokio::test]
        async fn test_list_parses_summaries_and_token() {
            let catalog = catalog_replaying(
                200,
                r#"{
                    "BackupSummaries": [
                        {"TableName": "orders", "BackupArn": "arn:backup/a", "BackupCreationDateTime": 1704240000.5},
                        {"TableName": "orders", "BackupCreationDateTime": 1704240100},
                        {"TableName": "orders", "BackupArn": "arn:backup/c"},
                        {"BackupArn": "arn:backup/d", "BackupCreationDateTime": 1704240200}
                    ],
                    "LastEvaluatedBackupArn": "arn:backup/d"
                }"#,
            );

            let page = catalog
                .list_backups("orders", &ListBackupsQuery::default())
                .await
                .unwrap();

            let arns: Vec<&str> = page.items.iter().map(|b| b.backup_arn.as_str()).collect();
            assert_eq!(arns, vec!["arn:backup/a", "arn:backup/d"]);
            assert_eq!(
                page.items[0].creation_time,
                DateTime::from_timestamp(1_704_240_000, 500_000_000).unwrap()
            );
            assert_eq!(page.items[1].table_name, "orders");
            assert_eq!(page.continuation_token.as_deref(), Some("arn:backup/d"));
        }

        #[tokio::test]
        async fn test_list_last_page_has_no_token() {
            let catalog = catalog_replaying(200, r#"{"BackupSummaries": []}"#);

            let page = catalog
                .list_backups("orders", &ListBackupsQuery::default())
                .await
                .unwrap();

            assert!(page.items.is_empty());
            assert!(!page.has_more_pages());
        }

        #[tokio::test]
        async fn test_create_returns_backup_arn() {
            let catalog = catalog_replaying(
                200,
                r#"{"BackupDetails": {
                    "BackupArn": "arn:backup/new",
                    "BackupName": "Scheduled_1704240000000",
                    "BackupStatus": "CREATING",
                    "BackupType": "USER",
                    "BackupCreationDateTime": 1704240000
                }}"#,
            );

            let handle = catalog
                .create_backup("orders", "Scheduled_1704240000000")
                .await
                .unwrap();

            assert_eq!(handle.backup_arn, "arn:backup/new");
            assert_eq!(handle.table_name, "orders");
            assert_eq!(handle.backup_name, "Scheduled_1704240000000");
        }
    }
}
