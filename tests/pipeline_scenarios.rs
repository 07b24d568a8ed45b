use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use docpipe_lib::browser::mock::{MockBehavior, MockProvisioner};
use docpipe_lib::{
    Config, DocumentKind, EnvironmentProfile, Orchestrator, OsFamily, PipelineError, PipelineStage,
    RenderRequest, UploadError, UploadTarget, ValidationError,
};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PDF: &[u8] = b"%PDF-1.7\n%docpipe test\n";

fn test_config(output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.documents.output_dir = output_dir.to_path_buf();
    config.render.grace_delay = Duration::ZERO;
    config.render.quiet_window = Duration::from_millis(1);
    config.render.navigation_timeout = Duration::from_millis(200);
    config
}

fn orchestrator(mock: &MockProvisioner, output_dir: &Path) -> Orchestrator {
    Orchestrator::from_config(&test_config(output_dir), Arc::new(mock.clone())).expect("orchestrator")
}

fn local() -> EnvironmentProfile {
    EnvironmentProfile::local(OsFamily::Linux)
}

fn serverless() -> EnvironmentProfile {
    EnvironmentProfile::serverless(OsFamily::Linux)
}

async fn storage(storage_id: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/upload"))
        .and(header("content-type", "application/pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "storageId": storage_id })))
        .mount(&server)
        .await;
    server
}

fn target(server: &MockServer) -> UploadTarget {
    UploadTarget::parse(&format!("{}/upload", server.uri())).expect("upload target")
}

#[tokio::test]
async fn local_quote_is_written_to_output_dir() {
    let out = TempDir::new().expect("tempdir");
    let mock = MockProvisioner::rendering(PDF);
    let request = RenderRequest::new(DocumentKind::Quote, "Q1").unwrap();

    let outcome = orchestrator(&mock, out.path()).run(&request, &local()).await.unwrap();

    let artifact = &outcome.artifact;
    assert!(artifact.filename.starts_with("quote-Q1-"));
    assert!(artifact.filename.ends_with(".pdf"));
    let written = artifact.local_path().expect("local path");
    assert!(written.starts_with(out.path()));
    assert_eq!(std::fs::read(written).unwrap(), PDF);
    assert!(artifact.storage_id().is_none());
    assert_eq!(mock.ledger().live(), 0);
}

#[tokio::test]
async fn serverless_invoice_is_uploaded_and_not_written() {
    let out = TempDir::new().expect("tempdir");
    let server = storage("kg2abc").await;
    let mock = MockProvisioner::rendering(PDF);
    let request = RenderRequest::new(DocumentKind::Invoice, "I1")
        .unwrap()
        .with_upload_target(target(&server));

    let outcome = orchestrator(&mock, out.path())
        .run(&request, &serverless())
        .await
        .unwrap();

    assert_eq!(outcome.artifact.storage_id(), Some("kg2abc"));
    assert!(outcome.artifact.local_path().is_none());
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);

    let received = server.received_requests().await.expect("recording enabled");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].body, PDF);
    assert_eq!(mock.ledger().live(), 0);
}

#[tokio::test]
async fn serverless_without_upload_target_fails_before_launch() {
    let out = TempDir::new().expect("tempdir");
    let mock = MockProvisioner::rendering(PDF);
    let request = RenderRequest::new(DocumentKind::Invoice, "I1").unwrap();

    let err = orchestrator(&mock, out.path())
        .run(&request, &serverless())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Validation(ValidationError::UploadTargetRequired)
    ));
    assert_eq!(err.http_status(), 500);
    assert_eq!(mock.ledger().launched(), 0);
    assert!(mock.visited().is_empty());
}

#[tokio::test]
async fn local_with_upload_target_saves_both() {
    let out = TempDir::new().expect("tempdir");
    let server = storage("st-42").await;
    let mock = MockProvisioner::rendering(PDF);
    let request = RenderRequest::new(DocumentKind::Quote, "Q1")
        .unwrap()
        .with_upload_target(target(&server));

    let outcome = orchestrator(&mock, out.path()).run(&request, &local()).await.unwrap();

    assert_eq!(outcome.artifact.locators.len(), 2);
    assert!(outcome.artifact.local_path().is_some());
    assert_eq!(outcome.artifact.storage_id(), Some("st-42"));
}

#[tokio::test]
async fn rejected_upload_fails_in_persisting_and_releases_browser() {
    let out = TempDir::new().expect("tempdir");
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(403).set_body_string("signature expired"))
        .mount(&server)
        .await;
    let mock = MockProvisioner::rendering(PDF);
    let request = RenderRequest::new(DocumentKind::Invoice, "I7")
        .unwrap()
        .with_upload_target(target(&server));

    let err = orchestrator(&mock, out.path())
        .run(&request, &serverless())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), PipelineStage::Persisting);
    match err {
        PipelineError::Upload(UploadError::Status { status, body }) => {
            assert_eq!(status.as_u16(), 403);
            assert!(body.contains("signature expired"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(mock.ledger().launched(), 1);
    assert_eq!(mock.ledger().live(), 0);
}

#[tokio::test]
async fn unwritable_output_dir_is_tolerated_when_upload_succeeds() {
    let dir = TempDir::new().expect("tempdir");
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();
    let server = storage("st-7").await;
    let mock = MockProvisioner::rendering(PDF);
    let request = RenderRequest::new(DocumentKind::Quote, "Q9")
        .unwrap()
        .with_upload_target(target(&server));

    let outcome = orchestrator(&mock, &blocker).run(&request, &local()).await.unwrap();

    assert!(outcome.artifact.local_path().is_none());
    assert_eq!(outcome.artifact.storage_id(), Some("st-7"));
}

#[tokio::test]
async fn unwritable_output_dir_is_fatal_without_upload() {
    let dir = TempDir::new().expect("tempdir");
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();
    let mock = MockProvisioner::rendering(PDF);
    let request = RenderRequest::new(DocumentKind::Quote, "Q9").unwrap();

    let err = orchestrator(&mock, &blocker).run(&request, &local()).await.unwrap_err();

    assert!(matches!(err, PipelineError::LocalPersist(_)));
    assert_eq!(mock.ledger().live(), 0);
}

#[tokio::test]
async fn failed_navigation_and_capture_release_every_browser() {
    let out = TempDir::new().expect("tempdir");
    for behavior in [
        MockBehavior::NavigationFails("net::ERR_CONNECTION_REFUSED".into()),
        MockBehavior::CaptureFails("printToPDF failed".into()),
        MockBehavior::NavigationHangs,
    ] {
        let mock = MockProvisioner::with_behavior(behavior);
        let request = RenderRequest::new(DocumentKind::Quote, "Q1").unwrap();

        let err = orchestrator(&mock, out.path()).run(&request, &local()).await.unwrap_err();

        assert_eq!(err.stage(), PipelineStage::Rendering);
        assert_eq!(mock.ledger().launched(), 1);
        assert_eq!(mock.ledger().live(), 0);
    }
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn launch_failure_is_reported_as_provisioning() {
    let out = TempDir::new().expect("tempdir");
    let mock = MockProvisioner::failing_launch("chrome exited with status 127");
    let request = RenderRequest::new(DocumentKind::Invoice, "I1").unwrap();

    let err = orchestrator(&mock, out.path()).run(&request, &local()).await.unwrap_err();

    assert_eq!(err.stage(), PipelineStage::Provisioning);
    assert!(err.to_string().contains("status 127"));
}

#[tokio::test]
async fn repeated_requests_produce_distinct_artifacts() {
    let out = TempDir::new().expect("tempdir");
    let mock = MockProvisioner::rendering(PDF);
    let orchestrator = Arc::new(orchestrator(&mock, out.path()));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let orchestrator = Arc::clone(&orchestrator);
        tasks.push(tokio::spawn(async move {
            let request = RenderRequest::new(DocumentKind::Quote, "Q1").unwrap();
            orchestrator.run(&request, &local()).await
        }));
    }

    let mut names = HashSet::new();
    for task in tasks {
        let outcome = task.await.expect("join").expect("render");
        names.insert(outcome.artifact.filename);
    }
    assert_eq!(names.len(), 8);
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 8);
    assert_eq!(mock.ledger().launched(), 8);
    assert_eq!(mock.ledger().live(), 0);
}
