use gallery_http::{HttpClient, HttpError, RequestOpts};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize)]
struct Uploaded {
    secure_url: String,
}

#[tokio::test]
async fn get_text_sends_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("user-agent", "gallery-test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new("gallery-test/1.0").unwrap();
    let body = client
        .get_text(&format!("{}/page", server.uri()), RequestOpts::default())
        .await
        .unwrap();
    assert_eq!(body, "<html>ok</html>");
}

#[tokio::test]
async fn get_text_honours_declared_charset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/menu"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            b"<h1>Caf\xE9 Menu</h1>".to_vec(),
            "text/html; charset=windows-1252",
        ))
        .mount(&server)
        .await;

    let client = HttpClient::new("t").unwrap();
    let body = client
        .get_text(&format!("{}/menu", server.uri()), RequestOpts::default())
        .await
        .unwrap();
    assert_eq!(body, "<h1>Café Menu</h1>");
}

#[tokio::test]
async fn non_success_status_is_an_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let client = HttpClient::new("t").unwrap();
    let err = client
        .get_text(&server.uri(), RequestOpts::default())
        .await
        .unwrap_err();
    match err {
        HttpError::Api {
            status, message, ..
        } => {
            assert_eq!(status, StatusCode::FORBIDDEN);
            assert_eq!(message, "forbidden");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn timeout_surfaces_as_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let client = HttpClient::new("t").unwrap();
    let opts = RequestOpts {
        timeout: Some(Duration::from_millis(50)),
        ..Default::default()
    };
    let err = client.get_text(&server.uri(), opts).await.unwrap_err();
    assert!(matches!(err, HttpError::Network(_)));
}

#[tokio::test]
async fn get_bytes_reports_content_type_and_custom_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img.png"))
        .and(header("accept", "image/*"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
        )
        .mount(&server)
        .await;

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("image/*"));
    let client = HttpClient::new("t").unwrap();
    let fetched = client
        .get_bytes(
            &format!("{}/img.png", server.uri()),
            RequestOpts {
                headers: Some(headers),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(fetched.content_type.as_deref(), Some("image/png"));
    assert_eq!(fetched.bytes.len(), 4);
}

#[tokio::test]
async fn post_form_json_resolves_against_base() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1_1/demo/image/upload"))
        .and(body_string_contains("folder=gallery"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"secure_url": "https://cdn.example/x.jpg"})),
        )
        .mount(&server)
        .await;

    let client = HttpClient::new("t")
        .unwrap()
        .with_base(&format!("{}/v1_1", server.uri()))
        .unwrap();
    let form = vec![("folder", "gallery".to_string())];
    let uploaded: Uploaded = client
        .post_form_json("demo/image/upload", &form, RequestOpts::default())
        .await
        .unwrap();
    assert_eq!(uploaded.secure_url, "https://cdn.example/x.jpg");
}

#[tokio::test]
async fn undecodable_json_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = HttpClient::new("t").unwrap();
    let form = reqwest::multipart::Form::new().text("folder", "gallery");
    let err = client
        .post_multipart_json::<Uploaded>(&server.uri(), form, RequestOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Decode(_, _)));
}
