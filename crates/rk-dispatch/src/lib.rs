// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

use rk_config::RestKitConfig;
use rk_envelope::{Envelope, EnvelopeSettings, ResponseEnvelope};
use rk_error::{Failure, FailureDto, classify};
use rk_policy::{DecisionConfig, JsonDecisionPolicy, PolicyError, RoutingContext};
use serde_json::Map;
use tracing::{debug, warn};

/// What the host should do with a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Send this envelope with this status.
    Render {
        /// Classified HTTP status.
        status: u16,
        /// Error envelope.
        envelope: Envelope,
    },
    /// Not for us; the host renders it its own way.
    Passthrough,
}

impl Dispatch {
    /// Returns `true` for [`Dispatch::Passthrough`].
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::Passthrough)
    }

    /// The envelope, if one was rendered.
    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Self::Render { envelope, .. } => Some(envelope),
            Self::Passthrough => None,
        }
    }
}

/// Failure → response dispatcher.
#[derive(Debug, Clone, Default)]
pub struct ExceptionDispatcher {
    policy: JsonDecisionPolicy,
    envelopes: ResponseEnvelope,
}

impl ExceptionDispatcher {
    /// Create a dispatcher from its parts.
    pub fn new(policy: JsonDecisionPolicy, envelopes: ResponseEnvelope) -> Self {
        Self { policy, envelopes }
    }

    /// Build policy and envelope settings from a loaded configuration.
    pub fn from_config(config: &RestKitConfig) -> Result<Self, PolicyError> {
        Ok(Self::new(
            JsonDecisionPolicy::new(DecisionConfig::from_config(config)?),
            ResponseEnvelope::new(EnvelopeSettings::from_config(config)),
        ))
    }

    /// The decision policy.
    pub fn policy(&self) -> &JsonDecisionPolicy {
        &self.policy
    }

    /// The envelope builder.
    pub fn envelopes(&self) -> &ResponseEnvelope {
        &self.envelopes
    }

    /// Decide how `failure`, raised while handling `ctx`, is rendered.
    pub fn dispatch(&self, failure: &Failure, ctx: &RoutingContext) -> Dispatch {
        let classification = classify(failure);
        let decision = self.policy.decide(ctx, classification.category);

        if !decision.render_json {
            debug!(
                category = %classification.category,
                status = classification.status,
                path = %ctx.path,
                rule = ?decision.rule,
                "failure passed through to host rendering"
            );
            return Dispatch::Passthrough;
        }

        if classification.status >= 500 {
            let report = serde_json::to_string(&FailureDto::from(failure)).unwrap_or_default();
            warn!(
                category = %classification.category,
                status = classification.status,
                path = %ctx.path,
                error = %failure,
                report = %report,
                "server error rendered as envelope"
            );
        } else {
            debug!(
                category = %classification.category,
                status = classification.status,
                path = %ctx.path,
                rule = ?decision.rule,
                "failure rendered as envelope"
            );
        }

        let status = classification.status;
        let envelope = self.envelopes.render_error(
            &classification.message,
            status,
            classification.errors,
            Map::new(),
            Some(failure),
        );
        Dispatch::Render { status, envelope }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_envelope::DEBUG_KEY;
    use rk_policy::Condition;
    use serde_json::json;

    fn dispatcher() -> ExceptionDispatcher {
        ExceptionDispatcher::default()
    }

    fn rendered(d: Dispatch) -> (u16, serde_json::Value) {
        match d {
            Dispatch::Render { status, envelope } => (status, envelope.to_value()),
            Dispatch::Passthrough => panic!("expected an envelope"),
        }
    }

    // -- Scenarios ---------------------------------------------------------

    #[test]
    fn api_validation_failure_renders_422() {
        let failure = Failure::validation().with_field_error("name", "The name field is required.");
        let ctx = RoutingContext::new("/api/v1/users");
        let (status, body) = rendered(dispatcher().dispatch(&failure, &ctx));
        assert_eq!(status, 422);
        assert_eq!(
            body,
            json!({
                "success": false,
                "message": "Validation failed",
                "status": 422,
                "errors": {"name": ["The name field is required."]},
                "meta": {}
            })
        );
    }

    #[test]
    fn web_form_validation_passes_through() {
        let failure = Failure::validation().with_field_error("name", "required");
        let ctx = RoutingContext::new("/profile/update").with_accept("text/html");
        assert!(dispatcher().dispatch(&failure, &ctx).is_passthrough());
    }

    #[test]
    fn web_form_ajax_renders_422() {
        let failure = Failure::validation().with_field_error("name", "required");
        let ctx = RoutingContext::new("/profile/update").ajax();
        let (status, body) = rendered(dispatcher().dispatch(&failure, &ctx));
        assert_eq!(status, 422);
        assert_eq!(body["message"], "Validation failed");
    }

    #[test]
    fn unauthenticated_api_request_renders_401() {
        let ctx = RoutingContext::new("/api/v1/admin/settings");
        let (status, body) = rendered(dispatcher().dispatch(&Failure::unauthenticated(), &ctx));
        assert_eq!(status, 401);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Unauthenticated");
    }

    #[test]
    fn unmatched_api_route_renders_404() {
        let ctx = RoutingContext::new("/api/v1/nonexistent");
        let (status, body) = rendered(dispatcher().dispatch(&Failure::route_not_found(), &ctx));
        assert_eq!(status, 404);
        assert_eq!(body["message"], "API endpoint not found");
    }

    #[test]
    fn duplicate_key_renders_409() {
        let ctx = RoutingContext::new("/api/v1/orders");
        let failure = Failure::database(Some("23505"), "duplicate key value violates unique constraint");
        let (status, body) = rendered(dispatcher().dispatch(&failure, &ctx));
        assert_eq!(status, 409);
        assert_eq!(body["message"], "Duplicate resource");
    }

    // -- Behaviour ---------------------------------------------------------

    #[test]
    fn explicit_api_failure_keeps_everything() {
        let failure = Failure::api(404, "User not found").with_errors(json!({"id": ["unknown"]}));
        let ctx = RoutingContext::new("/api/users/9");
        let (status, body) = rendered(dispatcher().dispatch(&failure, &ctx));
        assert_eq!(status, 404);
        assert_eq!(body["message"], "User not found");
        assert_eq!(body["errors"], json!({"id": ["unknown"]}));
    }

    #[test]
    fn unknown_failure_becomes_generic_500() {
        let ctx = RoutingContext::new("/api/jobs");
        let (status, body) = rendered(dispatcher().dispatch(&Failure::unknown("segfault in worker"), &ctx));
        assert_eq!(status, 500);
        assert_eq!(body["message"], "Internal server error");
        assert!(body.get(DEBUG_KEY).is_none());
    }

    #[test]
    fn status_matches_envelope_code() {
        let ctx = RoutingContext::new("/api/x");
        let d = dispatcher().dispatch(&Failure::too_many_requests(Some(5)), &ctx);
        let Dispatch::Render { status, envelope } = d else {
            panic!("expected render");
        };
        assert_eq!(status, envelope.status());
        assert_eq!(envelope.body()["status"], json!(429));
    }

    #[test]
    fn condition_receives_classified_category() {
        let cfg = DecisionConfig::default().with_condition(Condition::custom("db", |_, cat| {
            cat.is_database()
        }));
        let d = ExceptionDispatcher::new(JsonDecisionPolicy::new(cfg), ResponseEnvelope::default());
        let web = RoutingContext::new("/checkout");
        assert!(!d.dispatch(&Failure::database(Some("23503"), "fk"), &web).is_passthrough());
        assert!(d.dispatch(&Failure::forbidden(), &web).is_passthrough());
    }

    #[test]
    fn debug_config_attaches_exception_block() {
        let cfg = rk_config::parse_toml("debug = true").unwrap();
        let d = ExceptionDispatcher::from_config(&cfg).unwrap();
        let failure = Failure::http(418, "teapot");
        let envelope = d
            .dispatch(&failure, &RoutingContext::new("/api/tea"))
            .envelope()
            .cloned()
            .expect("rendered");
        let exc = &envelope.debug().expect("debug block")["exception"];
        assert_eq!(exc["type"], "http_error");
        assert_eq!(exc["code"], 418);
    }
}
