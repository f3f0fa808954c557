//! Persistence: the `Storage` trait the rest of the workspace programs
//! against, its `sea-orm` implementation, snapshot types for the in-memory
//! config cache, and the event sink that feeds the admin event stream.

pub mod entities;
pub mod db;
pub mod seaorm;
pub mod sinks;
pub mod snapshot;
pub mod storage;

pub use seaorm::SeaOrmStorage;
pub use sinks::DbEventSink;
pub use snapshot::{CredentialRow, GlobalConfigRow, ProviderRow, StorageSnapshot, UserKeyRow, UserRow};
pub use storage::{
    LogCursor, LogQueryFilter, LogQueryResult, LogRecord, LogRecordKind, Storage, StorageError,
    StorageResult, UsageAggregate, UsageAggregateFilter,
};
