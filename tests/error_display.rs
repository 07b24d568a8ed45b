use std::path::PathBuf;
use std::time::Duration;

use docpipe_lib::error::ProvisioningFailure;
use docpipe_lib::{
    ErrorCategory, LocalPersistError, OsFamily, PipelineError, PipelineStage, ProvisionStrategy,
    ProvisioningError, RenderError, UploadError, ValidationError,
};

#[test]
fn unknown_kind_names_the_value() {
    let err = ValidationError::UnknownKind("receipt".into());

    assert_eq!(
        format!("{}", err),
        "unsupported document type \"receipt\" (expected quote or invoice)"
    );
}

#[test]
fn browser_not_found_lists_searched_paths() {
    let err = ProvisioningError::new(
        ProvisionStrategy::LocalBinary,
        ProvisioningFailure::BrowserNotFound {
            os: OsFamily::Linux,
            searched: vec![PathBuf::from("/usr/bin/google-chrome"), PathBuf::from("/usr/bin/chromium")],
        },
    );
    let rendered = format!("{}", err);

    assert!(rendered.starts_with("browser provisioning failed (local-binary): "));
    assert!(rendered.contains("/usr/bin/google-chrome"));
    assert!(rendered.contains("/usr/bin/chromium"));
}

#[test]
fn timeout_mentions_url_and_budget() {
    let err = RenderError::Timeout {
        url: "http://localhost:3000/print/quote/Q1".into(),
        after: Duration::from_secs(30),
    };
    let rendered = format!("{}", err);

    assert!(rendered.contains("http://localhost:3000/print/quote/Q1"));
    assert!(rendered.contains("30s"));
}

#[test]
fn upload_status_includes_code_and_body() {
    let err = UploadError::Status {
        status: reqwest::StatusCode::FORBIDDEN,
        body: "expired".into(),
    };
    let rendered = format!("{}", err);

    assert!(rendered.contains("403"));
    assert!(rendered.contains("expired"));
}

#[test]
fn pipeline_error_maps_stage_category_and_status() {
    let cases: Vec<(PipelineError, PipelineStage, ErrorCategory, u16)> = vec![
        (
            ValidationError::MissingKind.into(),
            PipelineStage::Idle,
            ErrorCategory::Validation,
            400,
        ),
        (
            ValidationError::UploadTargetRequired.into(),
            PipelineStage::Idle,
            ErrorCategory::Validation,
            500,
        ),
        (
            RenderError::Capture("blank".into()).into(),
            PipelineStage::Rendering,
            ErrorCategory::Render,
            500,
        ),
        (
            UploadError::InvalidResponse("{}".into()).into(),
            PipelineStage::Persisting,
            ErrorCategory::Upload,
            500,
        ),
        (
            LocalPersistError {
                path: PathBuf::from("/read-only/x.pdf"),
                source: std::io::Error::other("read-only file system"),
            }
            .into(),
            PipelineStage::Persisting,
            ErrorCategory::LocalPersist,
            500,
        ),
    ];

    for (err, stage, category, status) in cases {
        assert_eq!(err.stage(), stage, "{err}");
        assert_eq!(err.category(), category, "{err}");
        assert_eq!(err.http_status(), status, "{err}");
        assert!(err.to_payload().remediation.is_some());
    }
}
