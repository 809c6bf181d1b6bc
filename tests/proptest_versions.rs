//! Property-based tests for version window selection.
//!
//! Ensures the selection invariants hold across arbitrary version lists:
//! the window never overlaps the excluded newest releases, output is always
//! ascending, and malformed input never panics.

use bundle_scan::version::select_window;
use proptest::prelude::*;
use semver::Version;

fn arb_version() -> impl Strategy<Value = String> {
    (0u64..20, 0u64..20, 0u64..20).prop_map(|(ma, mi, pa)| format!("{ma}.{mi}.{pa}"))
}

proptest! {
    #[test]
    fn window_is_ascending_and_sized(
        versions in proptest::collection::vec(arb_version(), 0..30),
        n in 0usize..10,
        exclude in 0usize..5,
    ) {
        if let Ok(window) = select_window(&versions, n, exclude) {
            prop_assert_eq!(window.len(), n - exclude);
            let parsed: Vec<Version> = window
                .iter()
                .map(|v| Version::parse(v).unwrap())
                .collect();
            prop_assert!(parsed.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn selected_versions_never_exceed_the_excluded_newest(
        versions in proptest::collection::vec(arb_version(), 3..30),
        n in 3usize..10,
    ) {
        let exclude = 2;
        if let Ok(window) = select_window(&versions, n, exclude) {
            let mut all: Vec<Version> = versions
                .iter()
                .map(|v| Version::parse(v).unwrap())
                .collect();
            all.sort();
            // Every selected version sorts at or below the oldest excluded one.
            let cutoff = &all[all.len() - exclude];
            for v in &window {
                prop_assert!(Version::parse(v).unwrap() <= *cutoff);
            }
        }
    }

    #[test]
    fn arbitrary_strings_never_panic(
        versions in proptest::collection::vec("\\PC{0,20}", 0..10),
        n in 0usize..10,
        exclude in 0usize..5,
    ) {
        let _ = select_window(&versions, n, exclude);
    }
}
