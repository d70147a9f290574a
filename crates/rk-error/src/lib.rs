// SPDX-License-Identifier: MIT OR Apache-2.0
//! Closed failure taxonomy for restkit.
//!
//! Every request-handling failure is a [`Failure`]: a [`FailureKind`] (the
//! closed set of conditions this layer knows how to render), a message, an
//! optional cause chain, arbitrary key-value context, and the source location
//! where it was constructed. [`classify`] maps a failure onto exactly one
//! [`FailureCategory`] together with an HTTP status, a client-facing message
//! and an optional structured `errors` payload.
//!
//! ```
//! use rk_error::{Failure, FailureCategory, classify};
//!
//! let failure = Failure::validation()
//!     .with_field_error("email", "The email field is required.");
//! let c = classify(&failure);
//! assert_eq!(c.category, FailureCategory::Validation);
//! assert_eq!(c.status, 422);
//! assert_eq!(c.message, "Validation failed");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod classify;

pub use classify::{
    Classification, DEFAULT_API_STATUS, SQLSTATE_DUPLICATE, SQLSTATE_FOREIGN_KEY,
    SQLSTATE_INTEGRITY, SQLSTATE_NOT_NULL, classify, constraint_kind, error_status,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;

// ---------------------------------------------------------------------------
// FailureCategory
// ---------------------------------------------------------------------------

/// Which not-found condition was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundScope {
    /// A looked-up record does not exist.
    Resource,
    /// No route matched the request.
    Route,
}

/// Integrity-constraint flavour of a database query failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Unique / primary key violation.
    Duplicate,
    /// Foreign key violation.
    ForeignKey,
    /// NOT NULL violation.
    NotNull,
    /// Any other query-level failure.
    Other,
}

/// Closed classification of a request-handling failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Explicit, application-constructed failure.
    Api,
    /// Input validation failed.
    Validation,
    /// The caller is not authenticated.
    Authentication,
    /// The caller is authenticated but not allowed.
    Authorization,
    /// A resource or route was not found.
    NotFound(NotFoundScope),
    /// The route exists but not for this method.
    MethodNotAllowed,
    /// The caller was throttled.
    RateLimit,
    /// Any other HTTP-level failure carrying its own status.
    Http,
    /// A query violated a database constraint.
    DatabaseConstraint(ConstraintKind),
    /// The database could not be reached.
    DatabaseConnection,
    /// Catch-all.
    Unknown,
}

impl FailureCategory {
    /// Stable snake_case tag, also used as the debug `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api_error",
            Self::Validation => "validation_error",
            Self::Authentication => "authentication_error",
            Self::Authorization => "authorization_error",
            Self::NotFound(NotFoundScope::Resource) => "resource_not_found_error",
            Self::NotFound(NotFoundScope::Route) => "route_not_found_error",
            Self::MethodNotAllowed => "method_not_allowed_error",
            Self::RateLimit => "rate_limit_error",
            Self::Http => "http_error",
            Self::DatabaseConstraint(ConstraintKind::Duplicate) => "database_duplicate_error",
            Self::DatabaseConstraint(ConstraintKind::ForeignKey) => "database_foreign_key_error",
            Self::DatabaseConstraint(ConstraintKind::NotNull) => "database_not_null_error",
            Self::DatabaseConstraint(ConstraintKind::Other) => "database_error",
            Self::DatabaseConnection => "database_connection_error",
            Self::Unknown => "unknown_error",
        }
    }

    /// Returns `true` for both database categories.
    pub fn is_database(&self) -> bool {
        matches!(self, Self::DatabaseConstraint(_) | Self::DatabaseConnection)
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FailureKind
// ---------------------------------------------------------------------------

/// Database failure as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseFailure {
    /// A statement failed; `code` is the SQLSTATE-style driver code.
    Query {
        /// Driver error code, if reported.
        code: Option<String>,
    },
    /// Driver-level failure not tied to a statement (connect, pool, I/O).
    Connection {
        /// Driver error code, if reported.
        code: Option<String>,
    },
}

impl DatabaseFailure {
    /// The driver code, whichever flavour this is.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Query { code } | Self::Connection { code } => code.as_deref(),
        }
    }
}

/// What went wrong. One variant per condition this layer renders.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    /// Explicit failure with a caller-chosen status and optional errors payload.
    Api {
        /// Requested HTTP status.
        status: u16,
        /// Structured errors payload.
        errors: Option<serde_json::Value>,
    },
    /// Field-level validation failure.
    Validation {
        /// Field name → messages, in field order.
        errors: BTreeMap<String, Vec<String>>,
    },
    /// Missing or invalid credentials.
    Authentication,
    /// Credentials valid, action denied.
    Authorization,
    /// Record or route lookup failed.
    NotFound(NotFoundScope),
    /// Method not supported by the matched route.
    MethodNotAllowed {
        /// Methods the route does support, for the `Allow` header.
        allowed: Vec<String>,
    },
    /// Request was throttled.
    RateLimited {
        /// Seconds until the caller may retry.
        retry_after_secs: Option<u64>,
    },
    /// Generic HTTP failure with its own status.
    Http {
        /// HTTP status to report.
        status: u16,
    },
    /// Database failure.
    Database(DatabaseFailure),
    /// Anything else.
    Unknown,
}

// ---------------------------------------------------------------------------
// Failure
// ---------------------------------------------------------------------------

/// A request-handling failure.
///
/// Construct with one of the kind-specific constructors and refine with the
/// builder methods:
///
/// ```
/// use rk_error::Failure;
///
/// let err = Failure::api(409, "Order already shipped")
///     .with_errors(serde_json::json!({"order": ["locked"]}))
///     .with_context("order_id", 42);
/// assert_eq!(err.to_string(), r#"[api_error] Order already shipped {"order_id":42}"#);
/// ```
pub struct Failure {
    /// What went wrong.
    pub kind: FailureKind,
    /// Failure-supplied message; may be empty.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
    location: &'static Location<'static>,
}

impl Failure {
    /// Create a failure of the given kind.
    #[track_caller]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
            location: Location::caller(),
        }
    }

    /// Explicit application failure with a custom status and message.
    #[track_caller]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::new(
            FailureKind::Api {
                status,
                errors: None,
            },
            message,
        )
    }

    /// Empty validation failure; add fields with [`with_field_error`](Self::with_field_error).
    #[track_caller]
    pub fn validation() -> Self {
        Self::new(
            FailureKind::Validation {
                errors: BTreeMap::new(),
            },
            "",
        )
    }

    /// Validation failure from a prepared field → messages map.
    #[track_caller]
    pub fn validation_errors(errors: BTreeMap<String, Vec<String>>) -> Self {
        Self::new(FailureKind::Validation { errors }, "")
    }

    /// Caller is not authenticated.
    #[track_caller]
    pub fn unauthenticated() -> Self {
        Self::new(FailureKind::Authentication, "")
    }

    /// Caller may not perform this action.
    #[track_caller]
    pub fn forbidden() -> Self {
        Self::new(FailureKind::Authorization, "")
    }

    /// A looked-up record does not exist.
    #[track_caller]
    pub fn not_found() -> Self {
        Self::new(FailureKind::NotFound(NotFoundScope::Resource), "")
    }

    /// No route matched.
    #[track_caller]
    pub fn route_not_found() -> Self {
        Self::new(FailureKind::NotFound(NotFoundScope::Route), "")
    }

    /// Route exists but not for this method.
    #[track_caller]
    pub fn method_not_allowed(allowed: Vec<String>) -> Self {
        Self::new(FailureKind::MethodNotAllowed { allowed }, "")
    }

    /// Caller was throttled.
    #[track_caller]
    pub fn too_many_requests(retry_after_secs: Option<u64>) -> Self {
        Self::new(FailureKind::RateLimited { retry_after_secs }, "")
    }

    /// Generic HTTP failure.
    #[track_caller]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(FailureKind::Http { status }, message)
    }

    /// Statement-level database failure with an optional SQLSTATE code.
    #[track_caller]
    pub fn database(code: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(
            FailureKind::Database(DatabaseFailure::Query {
                code: code.map(str::to_string),
            }),
            message,
        )
    }

    /// Driver-level database failure.
    #[track_caller]
    pub fn database_connection(message: impl Into<String>) -> Self {
        Self::new(
            FailureKind::Database(DatabaseFailure::Connection { code: None }),
            message,
        )
    }

    /// Unclassified failure.
    #[track_caller]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unknown, message)
    }

    /// Wrap any error as an unclassified failure, keeping it as the source.
    #[track_caller]
    pub fn from_error(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::unknown(err.to_string()).with_source(err)
    }

    /// Replace the failure-supplied message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach a structured errors payload to an [`FailureKind::Api`] failure.
    ///
    /// Ignored for other kinds; validation failures carry field errors instead.
    pub fn with_errors(mut self, value: serde_json::Value) -> Self {
        if let FailureKind::Api { errors, .. } = &mut self.kind {
            *errors = Some(value);
        }
        self
    }

    /// Append one message for `field` to a validation failure.
    ///
    /// Ignored for other kinds.
    pub fn with_field_error(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        if let FailureKind::Validation { errors } = &mut self.kind {
            errors
                .entry(field.into())
                .or_default()
                .push(message.into());
        }
        self
    }

    /// Set the driver code on a database failure. Ignored for other kinds.
    pub fn with_code(mut self, value: impl Into<String>) -> Self {
        if let FailureKind::Database(DatabaseFailure::Query { code } | DatabaseFailure::Connection { code }) =
            &mut self.kind
        {
            *code = Some(value.into());
        }
        self
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `classify(self).category`.
    pub fn category(&self) -> FailureCategory {
        classify(self).category
    }

    /// Source file where the failure was constructed.
    pub fn file(&self) -> &'static str {
        self.location.file()
    }

    /// Source line where the failure was constructed.
    pub fn line(&self) -> u32 {
        self.location.line()
    }

    /// The code the failure originated with: the driver code for database
    /// failures, the requested status for API/HTTP failures.
    pub fn originating_code(&self) -> Option<serde_json::Value> {
        match &self.kind {
            FailureKind::Database(db) => db.code().map(serde_json::Value::from),
            FailureKind::Api { status, .. } | FailureKind::Http { status } => {
                Some(serde_json::Value::from(*status))
            }
            _ => None,
        }
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Failure");
        d.field("kind", &self.kind);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.field("location", &format_args!("{}:{}", self.file(), self.line()));
        d.finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = if self.message.is_empty() {
            classify(self).message
        } else {
            self.message.clone()
        };
        write!(f, "[{}] {}", self.category(), message)?;
        if !self.context.is_empty() {
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<anyhow::Error> for Failure {
    /// Recovers a wrapped [`Failure`] when there is one; anything else
    /// becomes an unknown failure with the error kept as its source.
    #[track_caller]
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<Failure>() {
            Ok(failure) => failure,
            Err(err) => {
                let message = err.to_string();
                let mut failure = Failure::unknown(message);
                failure.source = Some(err.into());
                failure
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`Failure`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureDto {
    /// Classified category.
    pub category: FailureCategory,
    /// Classified status.
    pub status: u16,
    /// Classified client-facing message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
    /// `file:line` of the construction site.
    pub location: String,
}

impl From<&Failure> for FailureDto {
    fn from(err: &Failure) -> Self {
        let c = classify(err);
        Self {
            category: c.category,
            status: c.status,
            message: c.message,
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
            location: format!("{}:{}", err.file(), err.line()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn basic_construction() {
        let err = Failure::unknown("boom");
        assert_eq!(err.kind, FailureKind::Unknown);
        assert_eq!(err.message, "boom");
        assert!(err.source.is_none());
        assert!(err.context.is_empty());
    }

    #[test]
    fn display_uses_classified_message_when_empty() {
        let err = Failure::unauthenticated();
        assert_eq!(err.to_string(), "[authentication_error] Unauthenticated");
    }

    #[test]
    fn display_with_context() {
        let err = Failure::not_found().with_context("id", 7);
        let s = err.to_string();
        assert!(s.starts_with("[resource_not_found_error] Resource not found"));
        assert!(s.contains(r#""id":7"#));
    }

    #[test]
    fn location_points_at_constructor_call() {
        let err = Failure::forbidden();
        assert!(err.file().ends_with("lib.rs"), "file was {}", err.file());
        assert!(err.line() > 0);
    }

    #[test]
    fn debug_with_source() {
        let src = io::Error::new(io::ErrorKind::NotFound, "file missing");
        let err = Failure::unknown("init failed").with_source(src);
        let dbg = format!("{err:?}");
        assert!(dbg.contains("source"));
        assert!(dbg.contains("file missing"));
        assert!(dbg.contains("location"));
    }

    #[test]
    fn with_errors_only_applies_to_api() {
        let api = Failure::api(400, "bad").with_errors(serde_json::json!({"a": 1}));
        assert!(matches!(api.kind, FailureKind::Api { errors: Some(_), .. }));

        let other = Failure::forbidden().with_errors(serde_json::json!({"a": 1}));
        assert_eq!(other.kind, FailureKind::Authorization);
    }

    #[test]
    fn field_errors_accumulate_per_field() {
        let err = Failure::validation()
            .with_field_error("email", "required")
            .with_field_error("email", "must be an email")
            .with_field_error("name", "required");
        let FailureKind::Validation { errors } = &err.kind else {
            panic!("expected validation kind");
        };
        assert_eq!(errors["email"], vec!["required", "must be an email"]);
        assert_eq!(errors["name"], vec!["required"]);
    }

    #[test]
    fn with_code_sets_database_code() {
        let err = Failure::database_connection("refused").with_code("08006");
        assert_eq!(err.originating_code(), Some(serde_json::json!("08006")));
    }

    #[test]
    fn originating_code_for_http_is_status() {
        assert_eq!(
            Failure::http(418, "teapot").originating_code(),
            Some(serde_json::json!(418))
        );
        assert_eq!(Failure::unauthenticated().originating_code(), None);
    }

    #[test]
    fn anyhow_roundtrip_recovers_failure() {
        let err: anyhow::Error = Failure::api(402, "pay up").into();
        let back = Failure::from(err);
        assert_eq!(back.category(), FailureCategory::Api);
        assert_eq!(back.message, "pay up");
    }

    #[test]
    fn anyhow_other_error_becomes_unknown_with_source() {
        let err = anyhow::anyhow!("disk on fire");
        let failure = Failure::from(err);
        assert_eq!(failure.category(), FailureCategory::Unknown);
        let src = std::error::Error::source(&failure).expect("source kept");
        assert_eq!(src.to_string(), "disk on fire");
    }

    #[test]
    fn from_error_keeps_source() {
        let failure = Failure::from_error(io::Error::other("pipe"));
        assert_eq!(failure.category(), FailureCategory::Unknown);
        assert_eq!(failure.message, "pipe");
        assert!(failure.source.is_some());
    }

    #[test]
    fn dto_carries_classification() {
        let src = io::Error::new(io::ErrorKind::BrokenPipe, "pipe broke");
        let err = Failure::database(Some("23505"), "dup").with_source(src);
        let dto = FailureDto::from(&err);
        assert_eq!(
            dto.category,
            FailureCategory::DatabaseConstraint(ConstraintKind::Duplicate)
        );
        assert_eq!(dto.status, 409);
        assert_eq!(dto.source_message.as_deref(), Some("pipe broke"));
        let json = serde_json::to_string(&dto).unwrap();
        let back: FailureDto = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dto);
    }

    #[test]
    fn category_tags_are_unique() {
        let all = [
            FailureCategory::Api,
            FailureCategory::Validation,
            FailureCategory::Authentication,
            FailureCategory::Authorization,
            FailureCategory::NotFound(NotFoundScope::Resource),
            FailureCategory::NotFound(NotFoundScope::Route),
            FailureCategory::MethodNotAllowed,
            FailureCategory::RateLimit,
            FailureCategory::Http,
            FailureCategory::DatabaseConstraint(ConstraintKind::Duplicate),
            FailureCategory::DatabaseConstraint(ConstraintKind::ForeignKey),
            FailureCategory::DatabaseConstraint(ConstraintKind::NotNull),
            FailureCategory::DatabaseConstraint(ConstraintKind::Other),
            FailureCategory::DatabaseConnection,
            FailureCategory::Unknown,
        ];
        let mut seen = std::collections::HashSet::new();
        for c in all {
            assert!(seen.insert(c.as_str()), "duplicate tag {c}");
        }
    }

    #[test]
    fn category_serde_shape() {
        let json = serde_json::to_string(&FailureCategory::Validation).unwrap();
        assert_eq!(json, r#""validation""#);
        let json =
            serde_json::to_string(&FailureCategory::NotFound(NotFoundScope::Route)).unwrap();
        assert_eq!(json, r#"{"not_found":"route"}"#);
    }
}
