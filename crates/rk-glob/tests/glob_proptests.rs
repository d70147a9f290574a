// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property-based tests for `rk-glob` path matching.

use rk_glob::{PathPatterns, PrefixSet, matches_prefix, normalize_path};
use proptest::prelude::*;

/// Strategy: safe path segments (alphanumeric, underscore, hyphen).
fn path_segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,7}".prop_map(|s| s.to_string())
}

/// Strategy: request path with 1–5 segments and optional slashes around it.
fn request_path() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(path_segment(), 1..=5),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(segs, lead, trail)| {
            let mut p = segs.join("/");
            if lead {
                p.insert(0, '/');
            }
            if trail {
                p.push('/');
            }
            p
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn path_is_under_its_own_first_segment(path in request_path()) {
        let first = normalize_path(&path).split('/').next().unwrap_or_default().to_string();
        prop_assert!(matches_prefix(&path, &first));
        let slashed_first = format!("/{first}/");
        prop_assert!(matches_prefix(&path, &slashed_first));
    }

    #[test]
    fn surrounding_slashes_do_not_change_decisions(path in request_path(), prefix in path_segment()) {
        let bare = normalize_path(&path).to_string();
        let slashed = format!("/{bare}/");
        prop_assert_eq!(matches_prefix(&bare, &prefix), matches_prefix(&slashed, &prefix));
    }

    #[test]
    fn star_suffix_matches_every_nested_path(prefix in path_segment(), rest in request_path()) {
        let patterns = PathPatterns::new(&[format!("{prefix}/*")]).unwrap();
        let path = format!("/{prefix}/{}", normalize_path(&rest));
        prop_assert!(patterns.is_match(&path));
    }

    #[test]
    fn prefix_set_agrees_with_single_prefix(path in request_path(), prefix in path_segment()) {
        let set = PrefixSet::new(&[prefix.clone()]);
        prop_assert_eq!(set.is_match(&path), matches_prefix(&path, &prefix));
    }
}
