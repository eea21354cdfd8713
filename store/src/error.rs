use thiserror::Error;

/// Every fault the embedded engine can report, collapsed to one type.
///
/// Key-not-found is never represented here — callers get `Ok(None)` from
/// `get`/`get_dup` instead, matching the contract in spec §4.A.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("failed to start transaction: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("failed to open table: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage engine fault: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("failed to commit write transaction: {0}")]
    Commit(#[from] redb::CommitError),

    #[error(
        "store schema version {found} is newer than the {supported} this binary understands"
    )]
    SchemaTooNew { found: u32, supported: u32 },
}

pub type Result<T> = std::result::Result<T, StoreError>;
