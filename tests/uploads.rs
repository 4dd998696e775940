//! Attachment uploads against a mock backend.

use devochat::api::BackendClient;
use devochat::chat::ContentPart;
use devochat::config::{BackendConfig, UploadConfig};
use devochat::error::ClientError;
use devochat::upload::{LocalFile, UploadQueue};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn queue(server: &MockServer, limits: UploadConfig) -> UploadQueue {
    let config = BackendConfig {
        base_url: server.uri(),
        ..BackendConfig::default()
    };
    match BackendClient::new(&config) {
        Ok(c) => UploadQueue::new(c, limits),
        Err(e) => unreachable!("client: {e}"),
    }
}

#[tokio::test]
async fn images_and_documents_use_their_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "image", "name": "cat.png", "content": "/images/cat.png"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload/file"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "file", "name": "notes.txt", "content": "some notes", "file_path": "/files/notes.txt"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let queue = queue(&server, UploadConfig::default());
    let files = vec![
        LocalFile::new("cat.png", vec![0x89, b'P', b'N', b'G']),
        LocalFile::new("notes.txt", b"some notes".to_vec()),
    ];
    let report = match queue.process_files(files, true).await {
        Ok(r) => r,
        Err(e) => unreachable!("upload: {e}"),
    };
    assert_eq!(report.uploaded, 2);
    assert!(report.notices.is_empty(), "{:?}", report.notices);
    assert!(!queue.is_uploading());
    assert!(queue.has_image());

    let parts = queue.take_ready();
    assert_eq!(parts.len(), 2);
    assert!(parts.iter().any(|p| matches!(
        p,
        ContentPart::Image { content, .. } if content == "/images/cat.png"
    )));
    assert!(parts.iter().any(|p| matches!(
        p,
        ContentPart::File { name, file_path: Some(fp), .. } if name == "notes.txt" && fp == "/files/notes.txt"
    )));
    assert!(queue.slots().get().is_empty());
}

#[tokio::test]
async fn rejected_files_become_notices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/file"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"detail": "unsupported"})))
        .mount(&server)
        .await;

    let queue = queue(&server, UploadConfig::default());
    let report = match queue
        .process_files(vec![LocalFile::new("data.bin", vec![0, 1, 2])], true)
        .await
    {
        Ok(r) => r,
        Err(e) => unreachable!("upload: {e}"),
    };
    assert_eq!(report.uploaded, 0);
    assert_eq!(report.notices, vec!["data.bin cannot be uploaded.".to_string()]);
    assert!(queue.slots().get().is_empty());
}

#[tokio::test]
async fn error_field_is_reported_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/file"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "File too complex."})))
        .mount(&server)
        .await;

    let queue = queue(&server, UploadConfig::default());
    let report = match queue
        .process_files(vec![LocalFile::new("doc.pdf", b"%PDF".to_vec())], true)
        .await
    {
        Ok(r) => r,
        Err(e) => unreachable!("upload: {e}"),
    };
    assert_eq!(report.notices, vec!["File too complex.".to_string()]);
}

#[tokio::test]
async fn expired_session_aborts_the_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let queue = queue(&server, UploadConfig::default());
    let result = queue
        .process_files(vec![LocalFile::new("a.txt", b"a".to_vec())], true)
        .await;
    assert!(matches!(result, Err(ClientError::AuthExpired(_))), "{result:?}");
}

#[tokio::test]
async fn limits_are_checked_before_uploading() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/file"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"type": "file", "content": ""})))
        .expect(1)
        .mount(&server)
        .await;

    let limits = UploadConfig {
        max_files: 1,
        ..UploadConfig::default()
    };
    let queue = queue(&server, limits);

    let report = match queue
        .process_files(vec![LocalFile::new("cat.png", vec![1, 2, 3])], false)
        .await
    {
        Ok(r) => r,
        Err(e) => unreachable!("upload: {e}"),
    };
    assert_eq!(report.notices, vec!["This model does not support image uploads.".to_string()]);

    let report = match queue
        .process_files(
            vec![LocalFile::new("a.txt", b"a".to_vec()), LocalFile::new("b.txt", b"b".to_vec())],
            true,
        )
        .await
    {
        Ok(r) => r,
        Err(e) => unreachable!("upload: {e}"),
    };
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.notices, vec!["Maximum number of files exceeded.".to_string()]);
}
