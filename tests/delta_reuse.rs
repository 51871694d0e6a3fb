//! Index reuse across snapshots of the same single-page app: cold first
//! contact, warm reuse, and in-place delta with exact embed accounting.

mod common;

use common::{child, el, harness, page};
use selectron::{canonicalize, CancelToken, CanonicalizeConfig, IndexMode, RawSnapshot};

/// A list page: container and list enter the page skeleton, rows are
/// depth-2 content that can churn without moving `page_signature`.
fn list_page(labels: &[&str]) -> RawSnapshot {
    let mut elements = vec![
        el(1, "div", "", &[("id", "app")]),
        child(2, 1, "div", "", &[("class", "list")]),
    ];
    for (offset, label) in labels.iter().enumerate() {
        elements.push(child(10 + offset as u64, 2, "button", label, &[]));
    }
    page("/inbox", elements)
}

#[tokio::test]
async fn cold_then_warm_then_delta() {
    let harness = harness();
    let mut session = harness.engine.session();
    let cancel = CancelToken::new();

    let first = list_page(&["One", "Two", "Three", "Four", "Five", "Six", "Seven"]);
    let intent = selectron::parse_intent(r#"Click "One""#).unwrap();
    let result = session.retrieve(&intent, &first, &cancel).await.unwrap();
    assert_eq!(result.mode, IndexMode::Cold);
    // Every element of the snapshot was embedded once.
    let after_cold = harness.elements.embedded_count();
    assert_eq!(after_cold, 9);

    // Unchanged page: warm reuse, nothing embedded.
    let intent_two = selectron::parse_intent(r#"Click "Two""#).unwrap();
    let result = session.retrieve(&intent_two, &first, &cancel).await.unwrap();
    assert_eq!(result.mode, IndexMode::Warm);
    assert_eq!(harness.elements.embedded_count(), after_cold);

    // Three new rows appear within the same logical page.
    let second = list_page(&[
        "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten",
    ]);
    let config = CanonicalizeConfig::default();
    assert_eq!(
        canonicalize(&first, &config).unwrap().page_signature,
        canonicalize(&second, &config).unwrap().page_signature,
    );

    let intent_ten = selectron::parse_intent(r#"Click "Ten""#).unwrap();
    let result = session.retrieve(&intent_ten, &second, &cancel).await.unwrap();
    assert_eq!(result.mode, IndexMode::Delta);
    // The embedding provider was called for exactly the three new rows.
    assert_eq!(harness.elements.embedded_count(), after_cold + 3);
    assert!(result.status.has_selector());
}

#[tokio::test]
async fn fresh_session_is_cold_again() {
    let harness = harness();
    let cancel = CancelToken::new();
    let raw = list_page(&["One", "Two"]);
    let intent = selectron::parse_intent(r#"Click "One""#).unwrap();

    let mut first_session = harness.engine.session();
    let result = first_session.retrieve(&intent, &raw, &cancel).await.unwrap();
    assert_eq!(result.mode, IndexMode::Cold);

    // Indexes are session-owned: a new session starts cold even though
    // the shared cache spares it the embedding work.
    let embedded = harness.elements.embedded_count();
    let mut second_session = harness.engine.session();
    let result = second_session.retrieve(&intent, &raw, &cancel).await.unwrap();
    assert_eq!(result.mode, IndexMode::Cold);
    assert_eq!(harness.elements.embedded_count(), embedded);
}
