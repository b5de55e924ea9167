// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

/// Errors that can occur during persistence operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// A database error occurred.
    DatabaseError(String),
    /// Database connection failed.
    DatabaseConnectionFailed(String),
    /// Database migration failed.
    MigrationFailed(String),
    /// Query execution failed.
    QueryFailed(String),
    /// Serialization/deserialization error.
    SerializationError(String),
    /// Initialization error.
    InitializationError(String),
    /// Configuration could not be loaded.
    ConfigError(String),
    /// Foreign key enforcement is not enabled.
    ForeignKeyEnforcementNotEnabled,
    /// Another connection holds the lock this statement needs.
    ///
    /// This is the only error class the retrying executor retries.
    Busy(String),
    /// Lock contention outlasted the retry budget.
    StoreBusy {
        /// How many attempts were made.
        attempts: u32,
        /// The last lock error reported by the engine.
        detail: String,
    },
    /// The requested employee was not found.
    EmployeeNotFound(String),
    /// An employee with this identifier already exists.
    DuplicateEmployee(String),
    /// The operation requires an archived record.
    NotArchived(String),
    /// The requested attachment was not found.
    AttachmentNotFound(i64),
    /// An attachment with this name already exists for the employee.
    DuplicateAttachment {
        /// The owning employee.
        emp_id: String,
        /// The clashing file name.
        file_name: String,
    },
    /// The requested user was not found.
    UserNotFound(String),
    /// A user with this username already exists.
    DuplicateUser(String),
    /// The change would leave the store without an admin.
    LastAdmin(String),
    /// Another user holds a live edit lock on the record.
    EditLockHeld {
        /// The locked record.
        emp_id: String,
        /// The user holding the lock.
        holder: String,
    },
    /// A file system operation failed.
    FileSystem(String),
    /// A backup could not be written.
    BackupFailed(String),
    /// A backup could not be restored; the current database is unchanged.
    RestoreFailed(String),
    /// The requested resource was not found.
    NotFound(String),
    /// A general error occurred.
    Other(String),
}

impl PersistenceError {
    /// Returns true if this error is transient lock contention that a
    /// retry may resolve.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }

    /// Returns true if the engine reported a damaged or foreign database
    /// file.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        match self {
            Self::DatabaseError(msg)
            | Self::DatabaseConnectionFailed(msg)
            | Self::MigrationFailed(msg)
            | Self::QueryFailed(msg)
            | Self::InitializationError(msg) => is_corruption_message(msg),
            _ => false,
        }
    }
}

/// Returns true if an engine message describes a damaged database file.
fn is_corruption_message(message: &str) -> bool {
    let lowered: String = message.to_lowercase();
    ["malformed", "not a database", "corrupt"]
        .iter()
        .any(|needle| lowered.contains(needle))
}

/// Returns true if an engine message describes lock contention.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let lowered: String = message.to_lowercase();
    lowered.contains("locked") || lowered.contains("busy")
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::DatabaseConnectionFailed(msg) => {
                write!(f, "Database connection failed: {msg}")
            }
            Self::MigrationFailed(msg) => write!(f, "Migration failed: {msg}"),
            Self::QueryFailed(msg) => write!(f, "Query failed: {msg}"),
            Self::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
            Self::InitializationError(msg) => write!(f, "Initialization error: {msg}"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
            Self::ForeignKeyEnforcementNotEnabled => {
                write!(f, "Foreign key enforcement is not enabled")
            }
            Self::Busy(msg) => write!(f, "Database is locked: {msg}"),
            Self::StoreBusy { attempts, detail } => write!(
                f,
                "Database is busy - another user is currently saving data. \
                 Please wait a moment and try again. ({attempts} attempts, last error: {detail})"
            ),
            Self::EmployeeNotFound(id) => write!(f, "Employee not found: {id}"),
            Self::DuplicateEmployee(id) => write!(f, "Employee ID already exists: {id}"),
            Self::NotArchived(id) => write!(f, "Employee {id} must be archived first"),
            Self::AttachmentNotFound(id) => write!(f, "Attachment not found: {id}"),
            Self::DuplicateAttachment { emp_id, file_name } => {
                write!(f, "Employee {emp_id} already has an attachment named {file_name}")
            }
            Self::UserNotFound(name) => write!(f, "User not found: {name}"),
            Self::DuplicateUser(name) => write!(f, "Username already exists: {name}"),
            Self::LastAdmin(name) => {
                write!(f, "User {name} is the last admin and cannot be removed")
            }
            Self::EditLockHeld { emp_id, holder } => {
                write!(f, "Employee {emp_id} is being edited by {holder}")
            }
            Self::FileSystem(msg) => write!(f, "File system error: {msg}"),
            Self::BackupFailed(msg) => write!(f, "Backup failed: {msg}"),
            Self::RestoreFailed(msg) => write!(f, "Restore failed: {msg}"),
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<diesel::result::Error> for PersistenceError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => Self::NotFound("Record not found".to_string()),
            diesel::result::Error::DatabaseError(_, ref info) if is_lock_message(info.message()) => {
                Self::Busy(info.message().to_string())
            }
            _ => Self::DatabaseError(err.to_string()),
        }
    }
}

impl From<diesel::ConnectionError> for PersistenceError {
    fn from(err: diesel::ConnectionError) -> Self {
        Self::DatabaseConnectionFailed(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref code, _)
                if matches!(
                    code.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                Self::Busy(err.to_string())
            }
            _ => Self::DatabaseError(err.to_string()),
        }
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem(err.to_string())
    }
}
