//! End-to-end retrievals over the seed pages: exact-text selection,
//! category disambiguation, and the strategy-chain fallback.

mod common;

use common::{child, el, harness, page};
use selectron::{canonicalize, evaluate, CancelToken, CanonicalizeConfig, Intent, Status};

#[tokio::test]
async fn button_by_exact_text() {
    let harness = harness();
    let mut session = harness.engine.session();

    // One button "Sign In" inside div.nav; one link "Sign in to continue".
    let raw = page(
        "/login",
        vec![
            el(1, "div", "", &[("class", "nav")]),
            child(2, 1, "button", "Sign In", &[]),
            el(3, "a", "Sign in to continue", &[("href", "/login")]),
        ],
    );
    let intent = selectron::parse_intent(r#"Click "Sign In""#).unwrap();
    let result = session
        .retrieve(&intent, &raw, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, Status::Success);
    assert_eq!(result.xpath, r#"//button[normalize-space()="Sign In"]"#);
    assert_eq!(result.strategy, "text-exact");
    assert!(result.confidence >= 0.25);
    assert!(result.degraded_reasons.is_empty());

    // The returned selector resolves to exactly the chosen element.
    let snapshot = canonicalize(&raw, &CanonicalizeConfig::default()).unwrap();
    assert_eq!(evaluate(&result.xpath, &snapshot, None).unwrap(), vec![2]);
}

#[tokio::test]
async fn category_hint_disambiguates_duplicate_labels() {
    let harness = harness();
    let mut session = harness.engine.session();

    // Two "Apple" items: one under ul#brands, one under ul#colors.
    let raw = page(
        "/filters",
        vec![
            el(1, "ul", "", &[("id", "brands")]),
            child(2, 1, "li", "Apple", &[("data-value", "apple")]),
            el(3, "ul", "", &[("id", "colors")]),
            child(4, 3, "li", "Apple", &[("data-value", "apple")]),
        ],
    );
    let intent = Intent::new(selectron::Action::Select, "Apple").with_hint("brand");
    let result = session
        .retrieve(&intent, &raw, &CancelToken::new())
        .await
        .unwrap();

    assert!(result.status.has_selector());
    let snapshot = canonicalize(&raw, &CanonicalizeConfig::default()).unwrap();
    // The brand item (backend 2) must win; the color one carries the
    // entity-type penalty.
    assert_eq!(evaluate(&result.xpath, &snapshot, None).unwrap(), vec![2]);
}

#[tokio::test]
async fn verifier_falls_back_through_the_strategy_chain() {
    let harness = harness();
    let mut session = harness.engine.session();

    // Two inputs share placeholder text and have no id; only the combined
    // attribute selector separates them.
    let raw = page(
        "/search",
        vec![
            el(1, "input", "", &[("type", "text"), ("placeholder", "Search")]),
            el(2, "input", "", &[("type", "email"), ("placeholder", "Search")]),
        ],
    );
    let intent = selectron::parse_intent(r#"Type $"a@b.c" into "Email Search""#).unwrap();
    let result = session
        .retrieve(&intent, &raw, &CancelToken::new())
        .await
        .unwrap();

    assert!(result.status.has_selector());
    assert_eq!(result.strategy, "attr-combo");
    assert_eq!(
        result.xpath,
        r#"//input[@type="email" and @placeholder="Search"]"#
    );
}

#[tokio::test]
async fn click_ignores_non_interactive_text() {
    let harness = harness();
    let mut session = harness.engine.session();

    // The plain div carrying the target text must not be selected for a
    // click; the button wins even though both carry the label.
    let raw = page(
        "/cart",
        vec![
            el(1, "div", "Checkout", &[]),
            el(2, "button", "Checkout", &[]),
        ],
    );
    let intent = selectron::parse_intent(r#"Click "Checkout""#).unwrap();
    let result = session
        .retrieve(&intent, &raw, &CancelToken::new())
        .await
        .unwrap();

    let snapshot = canonicalize(&raw, &CanonicalizeConfig::default()).unwrap();
    assert_eq!(evaluate(&result.xpath, &snapshot, None).unwrap(), vec![2]);
}

#[tokio::test]
async fn near_misses_are_reported_on_failure() {
    let harness = harness();
    let mut session = harness.engine.session();

    let raw = page(
        "/",
        vec![
            el(1, "button", "Export", &[]),
            el(2, "button", "Import", &[]),
        ],
    );
    // Nothing on the page relates to the target.
    let intent = selectron::parse_intent(r#"Click "Delete Account Permanently""#).unwrap();
    let result = session
        .retrieve(&intent, &raw, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, Status::ElementNotFound);
    assert!(result.xpath.is_empty());
    assert!(result.near_misses.len() <= 3);
    for miss in &result.near_misses {
        assert!(miss.confidence < 1.0);
        assert!(!miss.reasons.is_empty());
    }
}

#[tokio::test]
async fn selectors_never_reference_html_or_body() {
    let harness = harness();
    let mut session = harness.engine.session();

    let raw = page(
        "/",
        vec![
            el(1, "html", "", &[]),
            child(2, 1, "body", "", &[]),
            child(3, 2, "main", "", &[]),
            child(4, 3, "button", "Go", &[]),
        ],
    );
    let intent = selectron::parse_intent(r#"Click "Go""#).unwrap();
    let result = session
        .retrieve(&intent, &raw, &CancelToken::new())
        .await
        .unwrap();

    assert!(result.status.has_selector());
    assert!(result.xpath.starts_with("//"));
    assert!(!result.xpath.contains("/html"));
    assert!(!result.xpath.contains("/body"));
}
