//! Property-based tests for the content classifier.
//!
//! Classification must be total (never panic), deterministic, and honor the
//! documented precedence for arbitrary inputs in each family.

use bmarks::services::content_classifier::{classify, ClassifiedContent};
use proptest::prelude::*;

/// Strategy producing valid 3- or 6-digit hex colors, with and without `#`.
fn arb_hex_color() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just(true), Just(false)],
        prop_oneof!["[0-9a-fA-F]{3}", "[0-9a-fA-F]{6}"],
    )
        .prop_map(|(hash, digits)| {
            if hash {
                format!("#{}", digits)
            } else {
                digits
            }
        })
}

/// Strategy producing plausible schemeless hostnames.
fn arb_host() -> impl Strategy<Value = String> {
    (
        "[a-z][a-z0-9]{2,12}",
        prop_oneof![Just(".com"), Just(".org"), Just(".net"), Just(".io")],
    )
        .prop_map(|(host, tld)| format!("{}{}", host, tld))
}

/// Strategy producing text with internal whitespace, which can never parse
/// as a URL.
fn arb_wordy_text() -> impl Strategy<Value = String> {
    ("[a-z]{2,8}", "[a-z]{2,8}", "[a-z]{2,8}")
        .prop_map(|(a, b, c)| format!("{} {} {}", a, b, c))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any input at all classifies without panicking, and twice in a row
    /// gives the same answer.
    #[test]
    fn classification_is_total_and_deterministic(input in ".{0,200}") {
        let first = classify(&input);
        let second = classify(&input);
        prop_assert_eq!(first, second);
    }

    /// Every well-formed hex color lands in the color branch with a `#`
    /// prefix.
    #[test]
    fn hex_colors_always_classify_as_color(input in arb_hex_color()) {
        match classify(&input) {
            ClassifiedContent::Color { value } => {
                prop_assert!(value.starts_with('#'));
                prop_assert!(value.trim_start_matches('#').eq_ignore_ascii_case(
                    input.trim_start_matches('#')
                ));
            }
            other => prop_assert!(false, "{:?} should be color, got {:?}", input, other),
        }
    }

    /// Schemeless hostnames become https links with the host preserved.
    #[test]
    fn hostnames_always_classify_as_link(host in arb_host()) {
        match classify(&host) {
            ClassifiedContent::Link { url, hostname } => {
                prop_assert!(url.starts_with("https://"));
                prop_assert_eq!(hostname, host);
            }
            other => prop_assert!(false, "{:?} should be link, got {:?}", host, other),
        }
    }

    /// Multi-word text always falls through to the text branch, trimmed.
    #[test]
    fn wordy_text_always_classifies_as_text(text in arb_wordy_text()) {
        let padded = format!("  {}  ", text);
        match classify(&padded) {
            ClassifiedContent::Text { content } => prop_assert_eq!(content, text),
            other => prop_assert!(false, "{:?} should be text, got {:?}", text, other),
        }
    }
}
