use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the versioned store.
///
/// Version-resolution failures (`VersionDowngrade`, `UpgradeTransform`) are
/// fatal for the open attempt and are never retried automatically.
/// `Constraint` and `Unavailable` are recoverable by the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The on-disk schema version is newer than this build understands.
    /// Happens when the application is downgraded after its store was
    /// already upgraded. Requires user intervention (update the app or
    /// clear its data); opening anyway would silently truncate data.
    #[error(
        "store is at schema version {on_disk}, newer than the latest supported version {latest}; update the application or clear its data"
    )]
    VersionDowngrade { on_disk: i64, latest: i64 },

    /// A data-rewrite callback failed while upgrading to `version`. The
    /// whole upgrade transaction was rolled back; the store remains at its
    /// prior version.
    #[error("upgrade to schema version {version} failed: {message}")]
    UpgradeTransform { version: i64, message: String },

    /// A write violated a unique key or a referential guard. The store is
    /// intact; the caller should fix the input and retry.
    #[error("{0}")]
    Constraint(String),

    #[error("{what} '{key}' not found")]
    NotFound { what: &'static str, key: String },

    /// A persisted value (e.g. a JSON line list) failed to decode.
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),

    /// The underlying storage is unusable (file locked, disk full, cannot
    /// open). Structurally the store is intact; the operation may succeed
    /// later.
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] rusqlite::Error),
}

impl StoreError {
    pub(crate) fn not_found(what: &'static str, key: impl Into<String>) -> Self {
        StoreError::NotFound {
            what,
            key: key.into(),
        }
    }

    pub(crate) fn constraint(message: impl Into<String>) -> Self {
        StoreError::Constraint(message.into())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(e, ref message) = err {
            if e.code == rusqlite::ErrorCode::ConstraintViolation {
                let detail = message
                    .clone()
                    .unwrap_or_else(|| "constraint violation".to_string());
                return StoreError::Constraint(detail);
            }
        }
        StoreError::Unavailable(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}
