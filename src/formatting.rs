use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use docpipe_lib::error::{ErrorCategory, ErrorPayload};
use docpipe_lib::{ConfigError, DocpipeOutput, EnvironmentProfile, ErrorOutput, PipelineError};

use crate::cli::OutputFormat;

/// Write output in the requested format.
pub fn write_output(
    body: &DocpipeOutput,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => write_json_output(body, output.as_deref())?,
        OutputFormat::Pretty => write_pretty_output(body, output.as_deref())?,
    };
    Ok(())
}

/// Render a pipeline failure and return its exit code.
pub fn render_error(
    err: &PipelineError,
    profile: &EnvironmentProfile,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let payload = DocpipeOutput::Error(ErrorOutput::from_pipeline(err, profile));
    emit_error(&payload, format, output);
    exit_code_for(err.category())
}

/// Render a configuration failure. Always exit code 2.
pub fn render_config_error(err: &ConfigError, format: OutputFormat, output: Option<PathBuf>) -> ExitCode {
    let payload = DocpipeOutput::Error(ErrorOutput::new(ErrorPayload::new(
        ErrorCategory::Config,
        err.to_string(),
        "Check the --config file and DOCPIPE_* environment variables.",
    )));
    emit_error(&payload, format, output);
    exit_code_for(ErrorCategory::Config)
}

/// Validation problems exit 1; everything else is fatal and exits 2.
pub fn exit_code_for(category: ErrorCategory) -> ExitCode {
    match category {
        ErrorCategory::Validation => ExitCode::from(1),
        _ => ExitCode::from(2),
    }
}

fn emit_error(payload: &DocpipeOutput, format: OutputFormat, output: Option<PathBuf>) {
    match format {
        OutputFormat::Json => {
            let content =
                serde_json::to_string(payload).unwrap_or_else(|_| "{\"mode\":\"error\"}".into());
            if let Some(path) = output {
                if let Err(write_err) = std::fs::write(&path, &content) {
                    eprintln!("Failed to write error output: {}", write_err);
                    println!("{content}");
                }
            } else {
                println!("{content}");
            }
        }
        OutputFormat::Pretty => {
            if let Err(write_err) = write_pretty_output(payload, output.as_deref()) {
                eprintln!("Failed to write error output: {}", write_err);
            }
        }
    }
}

fn write_json_output(body: &DocpipeOutput, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let content = serde_json::to_string(body)?;
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

fn write_pretty_output(body: &DocpipeOutput, output: Option<&Path>) -> io::Result<()> {
    let use_human = output.is_none() && std::io::stdout().is_terminal();

    if use_human {
        println!("{}", format_pretty(body, true));
        return Ok(());
    }

    // Non-tty or file output: keep JSON shape for pipelines/files.
    let content =
        serde_json::to_string_pretty(body).unwrap_or_else(|_| "{\"mode\":\"error\"}".to_string());
    if let Some(path) = output {
        std::fs::write(path, &content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Format output for human consumption in a terminal.
pub fn format_pretty(body: &DocpipeOutput, colorize: bool) -> String {
    let mut buf = String::new();
    match body {
        DocpipeOutput::Render(out) => {
            let header = color("[DONE]", "32", colorize);
            writeln!(
                buf,
                "{} {} {} rendered in {}ms",
                header, out.document_kind, out.document_id, out.elapsed_ms
            )
            .ok();
            writeln!(buf, "Source:   {}", out.response.url).ok();
            writeln!(buf, "Filename: {}", out.response.filename).ok();
            if let Some(path) = &out.response.filepath {
                writeln!(buf, "Saved:    {}", path.display()).ok();
            }
            if let Some(id) = &out.response.storage_id {
                writeln!(buf, "Uploaded: {}", id).ok();
            }
        }
        DocpipeOutput::Doctor(out) => {
            let header = color("[DOCTOR]", "36", colorize);
            writeln!(
                buf,
                "{} {} on {}",
                header, out.environment.mode, out.environment.os
            )
            .ok();
            writeln!(
                buf,
                "Vercel: {}  Production: {}",
                out.environment.is_vercel, out.environment.is_production
            )
            .ok();
            let exe = &out.executable;
            let found = if exe.materialized {
                color("ready", "32", colorize)
            } else {
                color("missing", "33", colorize)
            };
            writeln!(buf, "Browser:  {} via {} ({})", exe.strategy, exe.kind, found).ok();
            if let Some(path) = &exe.resolved {
                writeln!(buf, "- path    {}", path.display()).ok();
            }
            if let Some(url) = &exe.archive_url {
                writeln!(buf, "- archive {}", url).ok();
            }
            if !exe.materialized && !exe.candidates.is_empty() {
                writeln!(buf, "Searched:").ok();
                for candidate in &exe.candidates {
                    writeln!(buf, "- {}", candidate.display()).ok();
                }
            }
            writeln!(buf, "Pages:    {}", out.base_url).ok();
            if let Some(dir) = &out.output_dir {
                writeln!(buf, "Output:   {}", dir.display()).ok();
            }
            match out.max_concurrent_sessions {
                Some(limit) => writeln!(buf, "Sessions: at most {}", limit).ok(),
                None => writeln!(buf, "Sessions: unlimited").ok(),
            };
        }
        DocpipeOutput::Error(out) => {
            let header = color("[ERROR]", "31", colorize);
            match out.stage {
                Some(stage) => writeln!(buf, "{} ({}) {}", header, stage, out.error.message).ok(),
                None => writeln!(buf, "{} {}", header, out.error.message).ok(),
            };
            if let Some(remediation) = &out.error.remediation {
                writeln!(buf, "Hint: {}", remediation).ok();
            }
        }
    }
    buf
}

/// Apply ANSI color codes when enabled.
fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}
