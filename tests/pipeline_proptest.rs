// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property tests across classifier, policy, and envelope.

use proptest::prelude::*;
use rk_config::RestKitConfig;
use rk_dispatch::{Dispatch, ExceptionDispatcher};
use rk_error::{Failure, classify};
use rk_policy::RoutingContext;

fn arb_failure() -> impl Strategy<Value = Failure> {
    prop_oneof![
        (any::<u16>(), "[ -~]{0,20}").prop_map(|(s, m)| Failure::api(s, m)),
        "[a-z]{1,8}".prop_map(|f| Failure::validation().with_field_error(f, "bad")),
        Just(()).prop_map(|_| Failure::unauthenticated()),
        Just(()).prop_map(|_| Failure::forbidden()),
        Just(()).prop_map(|_| Failure::not_found()),
        Just(()).prop_map(|_| Failure::route_not_found()),
        prop::option::of(1u64..600).prop_map(Failure::too_many_requests),
        (any::<u16>(), "[ -~]{0,20}").prop_map(|(s, m)| Failure::http(s, m)),
        prop::option::of("[0-9]{5}").prop_map(|c| Failure::database(c.as_deref(), "db")),
        "[ -~]{0,20}".prop_map(Failure::unknown),
    ]
}

fn arb_accept() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop_oneof![
        Just("text/html".to_string()),
        Just("application/json".to_string()),
        Just("*/*".to_string()),
        Just("application/vnd.api+json;q=0.5, text/html;q=0.9".to_string()),
    ])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn api_paths_always_render_with_classified_status(
        failure in arb_failure(),
        rest in "[a-z/]{0,16}",
        accept in arb_accept(),
    ) {
        let dispatcher = ExceptionDispatcher::from_config(&RestKitConfig::default()).unwrap();
        let mut ctx = RoutingContext::new(format!("/api/{rest}"));
        ctx.accept = accept;
        match dispatcher.dispatch(&failure, &ctx) {
            Dispatch::Render { status, envelope } => {
                let c = classify(&failure);
                prop_assert_eq!(status, c.status);
                let body = envelope.to_value();
                prop_assert_eq!(&body["status"], &serde_json::Value::from(c.status));
                prop_assert_eq!(&body["message"], &serde_json::Value::from(c.message));
                for key in ["success", "message", "status", "errors", "meta"] {
                    prop_assert!(body.get(key).is_some(), "missing {}", key);
                }
            }
            Dispatch::Passthrough => prop_assert!(false, "api path passed through"),
        }
    }

    #[test]
    fn web_paths_follow_the_client(failure in arb_failure(), accept in arb_accept()) {
        let dispatcher = ExceptionDispatcher::from_config(&RestKitConfig::default()).unwrap();
        let mut ctx = RoutingContext::new("/dashboard");
        ctx.accept = accept;
        let rendered = !dispatcher.dispatch(&failure, &ctx).is_passthrough();
        prop_assert_eq!(rendered, ctx.expects_json());
    }
}
