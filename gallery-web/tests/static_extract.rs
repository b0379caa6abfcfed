use gallery_web::dom::ImageMatcher;
use gallery_web::extract::{ExtractSettings, MetaExtractor, StaticExtractor};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings() -> ExtractSettings {
    ExtractSettings {
        user_agent: "gallery-test/1.0".into(),
        static_timeout: Duration::from_secs(5),
        settle_delay: Duration::ZERO,
        description_limit: 120,
        default_description: "Explore this resource to learn more.".into(),
        images: ImageMatcher::new("/wp-content/uploads/").unwrap(),
    }
}

#[tokio::test]
async fn fetches_and_extracts_page_metadata() {
    let server = MockServer::start().await;
    let html = r#"<html><head>
        <title>Fallback Title</title>
        <meta name="description" content="A printable planner.">
      </head><body>
        <h1>Weekly Planner</h1>
        <img src="/wp-content/uploads/2024/05/planner.jpg">
      </body></html>"#;
    Mock::given(method("GET"))
        .and(path("/planner"))
        .and(header("user-agent", "gallery-test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = StaticExtractor::new(settings()).unwrap();
    let meta = extractor.extract(&format!("{}/planner", server.uri())).await;

    assert_eq!(meta.title.as_deref(), Some("Weekly Planner"));
    assert_eq!(meta.description, "A printable planner.");
    assert_eq!(
        meta.image,
        Some(format!("{}/wp-content/uploads/2024/05/planner.jpg", server.uri()))
    );
}

#[tokio::test]
async fn http_failure_degrades_to_fallback_meta() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
        .mount(&server)
        .await;

    let extractor = StaticExtractor::new(settings()).unwrap();
    let meta = extractor.extract(&format!("{}/gone", server.uri())).await;

    assert!(meta.title.is_none());
    assert!(meta.image.is_none());
    assert_eq!(meta.description, "Explore this resource to learn more.");
}

#[tokio::test]
async fn latin1_pages_keep_their_accents() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/menu"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            b"<html><body><h1>Caf\xE9 Menu</h1><h2>About</h2><p>Cr\xEApes all day.</p></body></html>"
                .to_vec(),
            "text/html; charset=windows-1252",
        ))
        .mount(&server)
        .await;

    let extractor = StaticExtractor::new(settings()).unwrap();
    let meta = extractor.extract(&format!("{}/menu", server.uri())).await;

    assert_eq!(meta.title.as_deref(), Some("Café Menu"));
    assert_eq!(meta.description, "Crêpes all day.");
}
