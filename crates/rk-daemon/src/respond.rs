// SPDX-License-Identifier: MIT OR Apache-2.0
//! Success and explicit error responses for handlers.

use crate::error::ApiError;
use crate::pagination::Paginated;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rk_envelope::{DEFAULT_ERROR_MESSAGE, DEFAULT_SUCCESS_MESSAGE, Envelope, ResponseEnvelope};
use rk_error::Failure;
use serde::Serialize;
use serde_json::{Map, Value};

/// Serialise an envelope with its own status and `Content-Type: application/json`.
pub fn envelope_response(envelope: &Envelope) -> Response {
    let status =
        StatusCode::from_u16(envelope.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(envelope)).into_response()
}

/// Controller-style response helpers.
#[derive(Debug, Clone, Default)]
pub struct Responder {
    envelopes: ResponseEnvelope,
}

impl Responder {
    /// Create a responder rendering through `envelopes`.
    pub fn new(envelopes: ResponseEnvelope) -> Self {
        Self { envelopes }
    }

    /// `200 Success` with `data`.
    pub fn success<T: Serialize>(&self, data: T) -> Response {
        self.success_with(data, DEFAULT_SUCCESS_MESSAGE, StatusCode::OK, Map::new())
    }

    /// `201 Created` with `data`.
    pub fn created<T: Serialize>(&self, data: T) -> Response {
        self.success_with(data, "Created", StatusCode::CREATED, Map::new())
    }

    /// Success with `data: null`.
    pub fn empty(&self, message: &str) -> Response {
        let envelope = self
            .envelopes
            .render_success(None, message, StatusCode::OK.as_u16(), Map::new());
        envelope_response(&envelope)
    }

    /// A page of items with pagination meta.
    pub fn paginated<T: Serialize>(&self, page: Paginated<T>) -> Response {
        let meta = page.meta();
        self.success_with(page.items, DEFAULT_SUCCESS_MESSAGE, StatusCode::OK, meta)
    }

    /// Success with every field chosen by the caller.
    pub fn success_with<T: Serialize>(
        &self,
        data: T,
        message: &str,
        status: StatusCode,
        meta: Map<String, Value>,
    ) -> Response {
        match serde_json::to_value(data) {
            Ok(value) => {
                let envelope =
                    self.envelopes
                        .render_success(Some(value), message, status.as_u16(), meta);
                envelope_response(&envelope)
            }
            Err(e) => ApiError::from(Failure::from_error(e)).into_response(),
        }
    }

    /// An explicit error envelope, rendered regardless of the request.
    pub fn error(&self, message: &str, status: StatusCode, errors: Option<Value>) -> Response {
        let message = if message.is_empty() {
            DEFAULT_ERROR_MESSAGE
        } else {
            message
        };
        let envelope =
            self.envelopes
                .render_error(message, status.as_u16(), errors, Map::new(), None);
        envelope_response(&envelope)
    }
}
