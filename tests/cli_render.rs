use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const PDF: &[u8] = b"%PDF-1.7\n%cli\n";

fn docpipe(home: &Path, mock_pdf: &Path, environment: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_docpipe"));
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("DOCPIPE_MOCK_PDF", mock_pdf)
        .env("DOCPIPE_ENVIRONMENT", environment)
        .env_remove("VERCEL")
        .env_remove("CHROME_PATH")
        .env_remove("DOCPIPE_CHROME_PATH")
        .env_remove("DOCPIPE_OUTPUT_DIR")
        .env_remove("DOCPIPE_BASE_URL")
        .env_remove("RUST_LOG");
    cmd
}

fn setup() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let pdf = dir.path().join("fixture.pdf");
    std::fs::write(&pdf, PDF).expect("write fixture");
    (dir, pdf)
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("json on stdout")
}

#[test]
fn render_writes_pdf_and_exits_zero() {
    let (dir, pdf) = setup();
    let out_dir = dir.path().join("pdfs");

    let output = docpipe(dir.path(), &pdf, "local")
        .args(["render", "--type", "quote", "--id", "Q1", "--output-dir"])
        .arg(&out_dir)
        .output()
        .expect("run docpipe");
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));

    let body = stdout_json(&output);
    assert_eq!(body["mode"], "render");
    assert_eq!(body["documentKind"], "quote");
    assert_eq!(body["success"], true);
    let filepath = body["filepath"].as_str().expect("filepath");
    assert!(Path::new(filepath).starts_with(&out_dir));
    assert_eq!(std::fs::read(filepath).unwrap(), PDF);
}

#[test]
fn render_in_serverless_mode_without_upload_exits_one() {
    let (dir, pdf) = setup();

    let output = docpipe(dir.path(), &pdf, "serverless")
        .args(["render", "--type", "invoice", "--id", "I1"])
        .output()
        .expect("run docpipe");
    assert_eq!(output.status.code(), Some(1));

    let body = stdout_json(&output);
    assert_eq!(body["mode"], "error");
    assert_eq!(body["error"]["category"], "validation");
    assert_eq!(body["environment"]["mode"], "serverless-readonly");
}

#[test]
fn render_rejects_unknown_type_with_exit_one() {
    let (dir, pdf) = setup();

    let status = docpipe(dir.path(), &pdf, "local")
        .args(["render", "--type", "receipt", "--id", "R1"])
        .status()
        .expect("run docpipe");
    assert_eq!(status.code(), Some(1));
}

#[test]
fn invalid_config_file_exits_two() {
    let (dir, pdf) = setup();
    let cfg = dir.path().join("docpipe.toml");
    std::fs::write(&cfg, "[documents]\nbase_url = \"ftp://pages\"\n").unwrap();

    let output = docpipe(dir.path(), &pdf, "local")
        .args(["render", "--type", "quote", "--id", "Q1", "--config"])
        .arg(&cfg)
        .output()
        .expect("run docpipe");
    assert_eq!(output.status.code(), Some(2));
    let body = stdout_json(&output);
    assert_eq!(body["error"]["category"], "config");
}

#[test]
fn doctor_reports_environment() {
    let (dir, pdf) = setup();

    let output = docpipe(dir.path(), &pdf, "serverless")
        .arg("doctor")
        .output()
        .expect("run docpipe");
    assert_eq!(output.status.code(), Some(0));

    let body = stdout_json(&output);
    assert_eq!(body["mode"], "doctor");
    assert_eq!(body["environment"]["mode"], "serverless-readonly");
    assert_eq!(body["executable"]["strategy"], "remote-archive");
    assert!(body.get("outputDir").is_none());
}
