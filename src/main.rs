//! Demo binary: one scripted retrieval against the deterministic stub
//! providers, printing the selector the pipeline settles on.

use std::error::Error;
use std::sync::Arc;

use selectron::{
    CancelToken, Engine, EngineConfig, RawElement, RawSnapshot, StubElementEmbedder,
    StubQueryEmbedder, StubReranker,
};

fn login_page() -> RawSnapshot {
    let mut elements = vec![RawElement {
        backend_id: Some(1),
        tag: Some("form".into()),
        attrs: [("id".to_string(), "login-form".to_string())]
            .into_iter()
            .collect(),
        ..Default::default()
    }];
    let mut field = |id: u64, tag: &str, text: &str, attrs: &[(&str, &str)]| {
        elements.push(RawElement {
            backend_id: Some(id),
            parent_id: Some(1),
            tag: Some(tag.into()),
            text: Some(text.into()),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        });
    };
    field(2, "input", "", &[("type", "email"), ("placeholder", "Email")]);
    field(
        3,
        "input",
        "",
        &[("type", "password"), ("placeholder", "Password")],
    );
    field(4, "button", "Sign In", &[("type", "submit")]);
    RawSnapshot {
        origin: "https://app.example.com".into(),
        path: "/login".into(),
        elements,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let engine = Engine::new(
        EngineConfig::in_memory(),
        Arc::new(StubQueryEmbedder::new(128)),
        Arc::new(StubElementEmbedder::new(128)),
        Arc::new(StubReranker::new()),
    )?;
    let mut session = engine.session();
    let cancel = CancelToken::new();
    let raw = login_page();

    for instruction in [
        r#"Click "Sign In""#,
        r#"Type $"jane@example.com" into "Email""#,
    ] {
        let intent = selectron::parse_intent(instruction)?;
        let result = session.retrieve(&intent, &raw, &cancel).await?;
        println!(
            "{instruction}\n  -> [{}] {} (strategy {}, confidence {:.2}, mode {})",
            result.status.as_str(),
            result.xpath,
            result.strategy,
            result.confidence,
            result.mode.as_str(),
        );
    }
    Ok(())
}
