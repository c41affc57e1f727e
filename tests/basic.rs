use std::path::Path;

use anyhow::Result;
use apirig::bootstrap::bootstrap_with;
use apirig::client::{ApiVersion, FileAttachment, Headers, HelperError, RequestHelper, ResponseBody};
use apirig::config::{settings_path, EnvSelection, Environment, RunConfig, ALL_MODULES};
use apirig::env::EnvMap;
use httpmock::prelude::*;
use httpmock::Method::PATCH;
use serde_json::json;
use tempfile::tempdir;

fn helper_for(server: &MockServer) -> RequestHelper {
    apirig::logging::init_for_tests();
    RequestHelper::new(server.base_url())
}

#[tokio::test]
async fn get_decodes_json_and_sends_token() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/items")
                .query_param("page", "2")
                .header("authorization", "Token abc")
                .header("content-type", "application/json");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"a": 1}"#);
        })
        .await;

    let body = helper_for(&server)
        .get("/items")
        .version(ApiVersion::V1)
        .param("page", "2")
        .token("abc")
        .fresh()
        .send()
        .await?;

    assert_eq!(body, ResponseBody::Json(json!({"a": 1})));
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn get_returns_raw_text_for_other_content_types() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/health");
            then.status(200).header("content-type", "text/plain").body("ok");
        })
        .await;

    let body = helper_for(&server).get("/health").fresh().send().await?;
    assert_eq!(body, ResponseBody::Text("ok".to_string()));
    Ok(())
}

#[tokio::test]
async fn unexpected_status_reports_expected_actual_and_url() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        })
        .await;

    let err = helper_for(&server)
        .get("/missing")
        .fresh()
        .send()
        .await
        .unwrap_err();

    match &err {
        HelperError::UnexpectedStatus {
            expected,
            actual,
            url,
        } => {
            assert_eq!((*expected, *actual), (200, 404));
            assert_eq!(url, &server.url("/missing"));
        }
        other => panic!("unexpected error: {other}"),
    }
    let message = err.to_string();
    assert!(message.contains("200") && message.contains("404"));
    assert!(message.contains(&server.url("/missing")));
}

#[tokio::test]
async fn missing_cache_directive_never_reaches_the_server() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.any_request();
            then.status(200);
        })
        .await;

    let err = helper_for(&server)
        .post("/users")
        .json(json!({"name": "ada"}))
        .send()
        .await
        .unwrap_err();

    assert!(matches!(err, HelperError::MissingCacheDirective));
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn post_sends_json_body() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/users")
                .json_body(json!({"name": "ada", "admin": false}));
            then.status(201)
                .header("content-type", "application/json; charset=utf-8")
                .json_body(json!({"id": 7}));
        })
        .await;

    let body = helper_for(&server)
        .post("/users")
        .json(json!({"name": "ada", "admin": false}))
        .expect_status(201)
        .fresh()
        .send()
        .await?;

    assert_eq!(body.into_json(), Some(json!({"id": 7})));
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn put_sends_form_payload_under_default_version() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT).path("/v2/users/7").body("name=grace");
            then.status(200).body("updated");
        })
        .await;

    let helper = helper_for(&server).with_version(ApiVersion::V2);
    let body = helper
        .put("/users/7")
        .form([("name", "grace")])
        .fresh()
        .send()
        .await?;

    assert_eq!(body.as_text(), Some("updated"));
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn patch_and_delete_accept_version_overrides() -> Result<()> {
    let server = MockServer::start_async().await;
    let patch = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/v1/users/7")
                .json_body(json!({"admin": true}));
            then.status(200).header("content-type", "application/json").body("{}");
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/v2/users/7");
            then.status(500).body("boom");
        })
        .await;

    let helper = helper_for(&server);
    helper
        .patch("/users/7")
        .version(ApiVersion::V1)
        .json(json!({"admin": true}))
        .fresh()
        .send()
        .await?;
    let body = helper
        .delete("/users/7")
        .version(ApiVersion::V2)
        .no_status_check()
        .fresh()
        .send()
        .await?;

    assert_eq!(body.as_text(), Some("boom"));
    patch.assert_async().await;
    delete.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn post_uploads_files_as_multipart() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/upload")
                .header("authorization", "Token abc")
                .body_contains("filename=\"notes.txt\"")
                .body_contains("hello from a file")
                .body_contains("quarterly");
            then.status(201);
        })
        .await;

    let mut headers = Headers::new();
    headers.insert("Authorization".to_string(), "Token abc".to_string());

    helper_for(&server)
        .post("/upload")
        .headers(headers)
        .form([("title", "quarterly")])
        .file(
            FileAttachment::from_bytes("doc", "notes.txt", b"hello from a file".to_vec())
                .with_content_type("text/plain"),
        )
        .expect_status(201)
        .fresh()
        .send()
        .await?;

    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn attachments_can_be_read_from_disk() -> Result<()> {
    let temp = tempdir()?;
    let path = temp.path().join("report.csv");
    std::fs::write(&path, "a,b\n1,2\n")?;

    let file = FileAttachment::from_path("report", &path).await?;
    assert_eq!(file.file_name, "report.csv");
    assert_eq!(file.bytes, b"a,b\n1,2\n");

    let err = FileAttachment::from_path("report", &temp.path().join("nope.csv"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("nope.csv"));
    Ok(())
}

#[tokio::test]
async fn cached_transport_serves_repeat_requests() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/catalog");
            then.status(200)
                .header("content-type", "application/json")
                .header("cache-control", "public, max-age=300")
                .body(r#"{"items": []}"#);
        })
        .await;

    let helper = helper_for(&server);
    let first = helper.get("/catalog").cached().send().await?;
    let second = helper.get("/catalog").cached().send().await?;

    assert_eq!(first, second);
    assert!(mock.hits_async().await >= 1);
    Ok(())
}

#[tokio::test]
async fn fresh_transport_always_hits_the_server() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/catalog");
            then.status(200)
                .header("cache-control", "public, max-age=300")
                .body("listing");
        })
        .await;

    let helper = helper_for(&server);
    helper.get("/catalog").fresh().send().await?;
    helper.get("/catalog").fresh().send().await?;

    mock.assert_hits_async(2).await;
    Ok(())
}

#[tokio::test]
async fn connection_failures_surface_as_transport_errors() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    apirig::logging::init_for_tests();
    let helper = RequestHelper::new(format!("http://127.0.0.1:{port}"));

    let err = helper.get("/ping").fresh().send().await.unwrap_err();
    assert!(matches!(err, HelperError::Transport(_)));
}

fn write_settings(root: &Path, env: Environment, contents: &str) -> Result<()> {
    let path = settings_path(root, env.settings_module());
    std::fs::create_dir_all(path.parent().unwrap())?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[tokio::test]
async fn bootstrapped_helper_targets_selected_environment() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/status");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"env": "qa"}"#);
        })
        .await;

    let temp = tempdir()?;
    write_settings(temp.path(), Environment::Qa, r#"{"API_HOST": "{QA_HOST}"}"#)?;
    write_settings(temp.path(), Environment::Prod, r#"{"API_HOST": "https://prod.invalid"}"#)?;
    let mut env = EnvMap::new();
    env.insert("QA_HOST".to_string(), server.base_url());

    let selection = EnvSelection {
        envtest: Some(Environment::Qa),
        ..Default::default()
    };
    let run = RunConfig::from_selection(&selection, ALL_MODULES, false);
    let ready = bootstrap_with(run, temp.path(), &env)?;

    let body = ready.helper.get("/status").fresh().send().await?;
    assert_eq!(body.as_json(), Some(&json!({"env": "qa"})));
    mock.assert_async().await;
    Ok(())
}
