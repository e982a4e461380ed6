use serde_json::json;
use thiserror::Error;

/// Kinds of stored entity a lookup can fail to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Student,
    Group,
    Discipline,
    Session,
    TeacherAssignment,
    AdminAssignment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Student => "student",
            EntityKind::Group => "group",
            EntityKind::Discipline => "discipline",
            EntityKind::Session => "session",
            EntityKind::TeacherAssignment => "teacher_assignment",
            EntityKind::AdminAssignment => "admin_assignment",
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Forbidden(String),

    #[error("{message}")]
    NotFound { entity: EntityKind, message: String },

    #[error("{message}")]
    InvalidInput {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("{0}")]
    AlreadyExists(String),

    /// Unique-key collision on insert. Grade writes turn this into an update.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{0}")]
    Internal(String),

    #[error("entry {index} ({student}): {source}")]
    BatchEntry {
        index: usize,
        student: String,
        source: Box<ServiceError>,
    },
}

pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(entity: EntityKind, message: impl Into<String>) -> Self {
        ServiceError::NotFound {
            entity,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::InvalidInput {
            message: message.into(),
            details: None,
        }
    }

    pub fn invalid_with(message: impl Into<String>, details: serde_json::Value) -> Self {
        ServiceError::InvalidInput {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::NotFound { .. } => "not_found",
            ServiceError::InvalidInput { .. } => "bad_params",
            ServiceError::AlreadyExists(_) => "already_exists",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::Unavailable(_) => "unavailable",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::Database(_) => "db_query_failed",
            ServiceError::Internal(_) => "internal",
            ServiceError::BatchEntry { source, .. } => source.code(),
        }
    }

    /// Message without the batch prefix; batch position goes into details.
    pub fn message(&self) -> String {
        match self {
            ServiceError::BatchEntry { source, .. } => source.message(),
            other => other.to_string(),
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ServiceError::NotFound { entity, .. } => Some(json!({ "entity": entity.as_str() })),
            ServiceError::InvalidInput { details, .. } => details.clone(),
            ServiceError::BatchEntry {
                index,
                student,
                source,
            } => {
                let mut details = json!({ "index": index, "student": student });
                if let Some(serde_json::Value::Object(extra)) = source.details() {
                    if let Some(obj) = details.as_object_mut() {
                        for (k, v) in extra {
                            obj.entry(k).or_insert(v);
                        }
                    }
                }
                Some(details)
            }
            _ => None,
        }
    }

    /// True when a rusqlite error is a UNIQUE/PRIMARY KEY violation.
    pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation
                    && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        )
    }
}
