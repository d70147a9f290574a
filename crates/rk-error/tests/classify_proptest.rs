// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property-based tests: classification is total and always lands in the
//! error status range.

use proptest::prelude::*;
use rk_error::{Failure, FailureCategory, classify};

fn arb_message() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), Just("  ".to_string()), "[ -~]{0,40}"]
}

fn arb_code() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop_oneof![
        Just("23505".to_string()),
        Just("23000".to_string()),
        Just("23503".to_string()),
        Just("23502".to_string()),
        "[0-9A-Z]{5}",
    ])
}

fn arb_failure() -> impl Strategy<Value = Failure> {
    prop_oneof![
        (any::<u16>(), arb_message()).prop_map(|(s, m)| Failure::api(s, m)),
        prop::collection::btree_map("[a-z]{1,8}", prop::collection::vec("[a-z ]{1,12}", 1..3), 0..4)
            .prop_map(Failure::validation_errors),
        arb_message().prop_map(|m| Failure::unauthenticated().with_message(m)),
        arb_message().prop_map(|m| Failure::forbidden().with_message(m)),
        Just(()).prop_map(|_| Failure::not_found()),
        Just(()).prop_map(|_| Failure::route_not_found()),
        Just(()).prop_map(|_| Failure::method_not_allowed(vec!["GET".into()])),
        prop::option::of(0u64..3600).prop_map(Failure::too_many_requests),
        (any::<u16>(), arb_message()).prop_map(|(s, m)| Failure::http(s, m)),
        (arb_code(), arb_message()).prop_map(|(c, m)| Failure::database(c.as_deref(), m)),
        arb_message().prop_map(Failure::database_connection),
        arb_message().prop_map(Failure::unknown),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn status_is_always_an_error_status(failure in arb_failure()) {
        let c = classify(&failure);
        prop_assert!((400..=599).contains(&c.status), "status {} for {:?}", c.status, failure);
    }

    #[test]
    fn classification_is_deterministic(failure in arb_failure()) {
        prop_assert_eq!(classify(&failure), classify(&failure));
    }

    #[test]
    fn message_is_never_blank_for_framework_categories(failure in arb_failure()) {
        let c = classify(&failure);
        if c.category != FailureCategory::Api {
            prop_assert!(!c.message.trim().is_empty());
        }
    }

    #[test]
    fn only_api_and_validation_carry_errors(failure in arb_failure()) {
        let c = classify(&failure);
        if c.errors.is_some() {
            prop_assert!(matches!(c.category, FailureCategory::Api | FailureCategory::Validation));
        }
    }
}
