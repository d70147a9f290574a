// SPDX-License-Identifier: MIT OR Apache-2.0
//! Failure → (category, status, message, errors) mapping.

use crate::{
    ConstraintKind, DatabaseFailure, Failure, FailureCategory, FailureKind, NotFoundScope,
};
use serde::{Deserialize, Serialize};

/// SQLSTATE for a unique violation.
pub const SQLSTATE_DUPLICATE: &str = "23505";
/// SQLSTATE class-level integrity violation; MySQL reports duplicates this way.
pub const SQLSTATE_INTEGRITY: &str = "23000";
/// SQLSTATE for a foreign key violation.
pub const SQLSTATE_FOREIGN_KEY: &str = "23503";
/// SQLSTATE for a NOT NULL violation.
pub const SQLSTATE_NOT_NULL: &str = "23502";

/// Status used for API failures that do not ask for one, and for any
/// requested status outside the error range.
pub const DEFAULT_API_STATUS: u16 = 500;

/// Result of classifying a [`Failure`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// The single category the failure belongs to.
    pub category: FailureCategory,
    /// HTTP status, always within `400..=599`.
    pub status: u16,
    /// Client-facing message.
    pub message: String,
    /// Structured error detail, for the envelope's errors key.
    pub errors: Option<serde_json::Value>,
}

impl Classification {
    fn new(category: FailureCategory, status: u16, message: impl Into<String>) -> Self {
        Self {
            category,
            status,
            message: message.into(),
            errors: None,
        }
    }
}

/// Clamp a failure-supplied status into the error range.
pub fn error_status(status: u16) -> u16 {
    if (400..=599).contains(&status) {
        status
    } else {
        DEFAULT_API_STATUS
    }
}

/// Map a SQLSTATE-style code onto a constraint flavour.
pub fn constraint_kind(code: Option<&str>) -> ConstraintKind {
    match code {
        Some(SQLSTATE_DUPLICATE | SQLSTATE_INTEGRITY) => ConstraintKind::Duplicate,
        Some(SQLSTATE_FOREIGN_KEY) => ConstraintKind::ForeignKey,
        Some(SQLSTATE_NOT_NULL) => ConstraintKind::NotNull,
        _ => ConstraintKind::Other,
    }
}

/// Classify a failure. Total: every kind has exactly one outcome and the
/// status is always in `400..=599`.
pub fn classify(failure: &Failure) -> Classification {
    let own_or = |fallback: &str| -> String {
        if failure.message.trim().is_empty() {
            fallback.to_string()
        } else {
            failure.message.clone()
        }
    };

    match &failure.kind {
        FailureKind::Api { status, errors } => Classification {
            category: FailureCategory::Api,
            status: error_status(*status),
            message: own_or("Error"),
            errors: errors.clone(),
        },
        FailureKind::Validation { errors } => Classification {
            category: FailureCategory::Validation,
            status: 422,
            message: "Validation failed".into(),
            errors: serde_json::to_value(errors).ok(),
        },
        FailureKind::Authentication => Classification::new(
            FailureCategory::Authentication,
            401,
            own_or("Unauthenticated"),
        ),
        FailureKind::Authorization => Classification::new(
            FailureCategory::Authorization,
            403,
            own_or("This action is forbidden"),
        ),
        FailureKind::NotFound(NotFoundScope::Resource) => Classification::new(
            FailureCategory::NotFound(NotFoundScope::Resource),
            404,
            "Resource not found",
        ),
        FailureKind::NotFound(NotFoundScope::Route) => Classification::new(
            FailureCategory::NotFound(NotFoundScope::Route),
            404,
            "API endpoint not found",
        ),
        FailureKind::MethodNotAllowed { .. } => Classification::new(
            FailureCategory::MethodNotAllowed,
            405,
            "HTTP method not allowed",
        ),
        FailureKind::RateLimited { .. } => Classification::new(
            FailureCategory::RateLimit,
            429,
            "Too many requests. Please try again later.",
        ),
        FailureKind::Http { status } => Classification::new(
            FailureCategory::Http,
            error_status(*status),
            own_or("HTTP error"),
        ),
        FailureKind::Database(DatabaseFailure::Query { code }) => {
            let kind = constraint_kind(code.as_deref());
            let (status, message) = match kind {
                ConstraintKind::Duplicate => (409, "Duplicate resource"),
                ConstraintKind::ForeignKey => (409, "Resource conflict"),
                ConstraintKind::NotNull => (422, "Missing required field"),
                ConstraintKind::Other => (500, "Database error"),
            };
            Classification::new(FailureCategory::DatabaseConstraint(kind), status, message)
        }
        FailureKind::Database(DatabaseFailure::Connection { .. }) => Classification::new(
            FailureCategory::DatabaseConnection,
            500,
            "Database connection error",
        ),
        FailureKind::Unknown => {
            Classification::new(FailureCategory::Unknown, 500, "Internal server error")
        }
    }
}
