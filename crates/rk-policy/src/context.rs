// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-request routing snapshot.

use crate::accept::wants_json;
use serde::{Deserialize, Serialize};

/// Value of `X-Requested-With` sent by XMLHttpRequest-style clients.
pub const XML_HTTP_REQUEST: &str = "XMLHttpRequest";

/// What the decision policy knows about the request that failed.
///
/// Built by the host adapter when a failure surfaces; read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingContext {
    /// Request path, as received.
    pub path: String,
    /// Route groups declared on the matched route, in declaration order.
    #[serde(default)]
    pub route_groups: Vec<String>,
    /// Raw `Accept` header, if sent.
    #[serde(default)]
    pub accept: Option<String>,
    /// Raw `X-Requested-With` header, if sent.
    #[serde(default)]
    pub requested_with: Option<String>,
    /// Set when the force-JSON middleware rewrote `Accept` for this request.
    #[serde(default)]
    pub forced_json: bool,
}

impl RoutingContext {
    /// Context for `path` with no headers and no groups.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the `Accept` header.
    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Set the `X-Requested-With` header.
    pub fn with_requested_with(mut self, value: impl Into<String>) -> Self {
        self.requested_with = Some(value.into());
        self
    }

    /// Mark as an XMLHttpRequest.
    pub fn ajax(self) -> Self {
        self.with_requested_with(XML_HTTP_REQUEST)
    }

    /// Declare a route group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.route_groups.push(group.into());
        self
    }

    /// Mark the request as forced to JSON.
    pub fn forced(mut self) -> Self {
        self.forced_json = true;
        self
    }

    /// Whether the client asked for JSON, or JSON was forced on it.
    pub fn expects_json(&self) -> bool {
        self.forced_json || self.accept.as_deref().is_some_and(wants_json)
    }

    /// Whether the request carries the AJAX signal.
    pub fn is_ajax(&self) -> bool {
        self.requested_with
            .as_deref()
            .is_some_and(|v| v.trim().eq_ignore_ascii_case(XML_HTTP_REQUEST))
    }

    /// Whether the route declares `group`.
    pub fn in_group(&self, group: &str) -> bool {
        self.route_groups.iter().any(|g| g == group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_counts_as_expecting_json() {
        assert!(!RoutingContext::new("/x").expects_json());
        assert!(RoutingContext::new("/x").forced().expects_json());
        assert!(
            RoutingContext::new("/x")
                .with_accept("application/json")
                .expects_json()
        );
    }

    #[test]
    fn ajax_header_is_case_insensitive() {
        assert!(RoutingContext::new("/").with_requested_with("xmlhttprequest").is_ajax());
        assert!(!RoutingContext::new("/").with_requested_with("fetch").is_ajax());
        assert!(!RoutingContext::new("/").is_ajax());
    }

    #[test]
    fn groups_accumulate() {
        let ctx = RoutingContext::new("/").with_group("web").with_group("api");
        assert!(ctx.in_group("api"));
        assert!(ctx.in_group("web"));
        assert!(!ctx.in_group("admin"));
    }
}
