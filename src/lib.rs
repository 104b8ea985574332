pub mod boundary;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod dynamodb;
pub mod error;
pub mod logging;
pub mod retention;
pub mod rotation;
pub mod types;

pub use catalog::BackupCatalog;
pub use config::RetentionConfig;
pub use error::RotationError;
pub use rotation::Rotator;
