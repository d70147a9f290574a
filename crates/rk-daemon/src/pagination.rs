// SPDX-License-Identifier: MIT OR Apache-2.0
//! `?page=&per_page=` handling and pagination meta.

use crate::AppState;
use crate::error::ApiError;
use axum::{
    extract::{FromRef, FromRequestParts, Query},
    http::request::Parts,
};
use rk_config::PaginationConfig;
use rk_error::Failure;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    page: Option<u32>,
    per_page: Option<u32>,
}

/// A clamped page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    /// Items per page, within `1..=max_per_page`.
    pub per_page: u32,
}

impl PageRequest {
    /// Clamp raw query values against the configured limits.
    pub fn resolve(page: Option<u32>, per_page: Option<u32>, limits: &PaginationConfig) -> Self {
        let max = limits.max_per_page().max(1);
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or_else(|| limits.default_per_page())
                .clamp(1, max),
        }
    }

    /// Zero-based index of the first item on this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    /// Slice `items` down to this page.
    pub fn paginate<T: Clone>(&self, items: &[T]) -> Paginated<T> {
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX).min(items.len());
        let end = start.saturating_add(self.per_page as usize).min(items.len());
        Paginated {
            items: items[start..end].to_vec(),
            page: *self,
            total: items.len() as u64,
        }
    }
}

impl<S> FromRequestParts<S> for PageRequest
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<PageQuery>::from_request_parts(parts, state)
            .await
            .map_err(|e| Failure::validation().with_field_error("page", e.body_text()))?;
        let app = Arc::<AppState>::from_ref(state);
        Ok(Self::resolve(query.page, query.per_page, &app.config.pagination))
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// The request that produced the page.
    pub page: PageRequest,
    /// Total items across all pages.
    pub total: u64,
}

impl<T> Paginated<T> {
    /// Last page number; at least 1.
    pub fn last_page(&self) -> u64 {
        self.total.div_ceil(u64::from(self.page.per_page)).max(1)
    }

    /// `meta` for a success envelope.
    pub fn meta(&self) -> Map<String, Value> {
        let (from, to) = if self.items.is_empty() {
            (Value::Null, Value::Null)
        } else {
            let from = self.page.offset() + 1;
            (
                Value::from(from),
                Value::from(from + self.items.len() as u64 - 1),
            )
        };
        let mut meta = Map::new();
        meta.insert("current_page".into(), Value::from(self.page.page));
        meta.insert("per_page".into(), Value::from(self.page.per_page));
        meta.insert("total".into(), Value::from(self.total));
        meta.insert("last_page".into(), Value::from(self.last_page()));
        meta.insert("from".into(), from);
        meta.insert("to".into(), to);
        meta
    }
}
