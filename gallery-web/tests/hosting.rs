use gallery_web::hosting::{CloudinaryHost, CloudinarySettings, ImageHost};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn host_for(server: &MockServer) -> CloudinaryHost {
    CloudinaryHost::new(CloudinarySettings {
        cloud_name: "demo".into(),
        api_key: "key123".into(),
        api_secret: "shh".into(),
        folder: "gallery".into(),
        api_base: format!("{}/v1_1", server.uri()),
        delivery_base: "https://res.cloudinary.com".into(),
        placeholder_public_id: "sample".into(),
        width: 1200,
        height: 800,
        upload_timeout: Duration::from_secs(5),
        user_agent: "gallery-test/1.0".into(),
    })
    .unwrap()
}

const HOSTED: &str = "https://res.cloudinary.com/demo/image/upload/v1/gallery/abc.jpg";

#[tokio::test]
async fn remote_upload_is_tried_first() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1_1/demo/image/upload"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("api_key=key123"))
        .and(body_string_contains("overwrite=true"))
        .and(body_string_contains("signature="))
        .and(body_string_contains("transformation=c_fill%2Ch_800%2Cw_1200%2Ff_auto%2Cq_auto"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "secure_url": HOSTED })))
        .expect(1)
        .mount(&server)
        .await;

    let hosted = host_for(&server).rehost("https://cdn.example/a.jpg").await;
    assert_eq!(hosted.as_deref(), Some(HOSTED));
}

#[tokio::test]
async fn rejected_remote_upload_falls_back_to_fetched_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1_1/demo/image/upload"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "error": { "message": "Resource not found" } })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/protected/cover.png"))
        .and(header_regex("accept", "image/"))
        .and(header("referer", format!("{}/", server.uri()).as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1_1/demo/image/upload"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .and(body_string_contains("cover.png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "secure_url": HOSTED })))
        .expect(1)
        .mount(&server)
        .await;

    let source = format!("{}/protected/cover.png", server.uri());
    let hosted = host_for(&server).rehost(&source).await;
    assert_eq!(hosted.as_deref(), Some(HOSTED));
}

#[tokio::test]
async fn both_attempts_failing_yields_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "secure_url": HOSTED })))
        .expect(0)
        .mount(&server)
        .await;

    let source = format!("{}/missing.jpg", server.uri());
    assert!(host_for(&server).rehost(&source).await.is_none());
}

#[tokio::test]
async fn blank_source_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    assert!(host_for(&server).rehost("   ").await.is_none());
}

#[tokio::test]
async fn placeholder_lives_on_the_delivery_host() {
    let server = MockServer::start().await;
    assert_eq!(
        host_for(&server).placeholder_url(),
        "https://res.cloudinary.com/demo/image/upload/c_fill,h_800,w_1200/f_auto,q_auto/sample"
    );
}
