use std::path::PathBuf;
use std::process::ExitCode;

use docpipe_lib::output::DOCPIPE_OUTPUT_VERSION;
use docpipe_lib::{
    DocpipeOutput, Orchestrator, PipelineError, RenderOutput, RenderRequest, RenderResponse,
    RequestParams,
};
use tracing::debug;

use crate::cli::{ModeArg, OutputFormat};
use crate::formatting::{render_config_error, render_error, write_output};
use crate::settings::{build_provisioner, load_config, profile_source, CliOverrides};

/// Flags of the render command.
#[derive(Debug, Clone)]
pub struct RenderArgs {
    pub kind: String,
    pub id: String,
    pub url: Option<String>,
    pub upload_url: Option<String>,
    pub mode: Option<ModeArg>,
    pub output_dir: Option<PathBuf>,
}

impl RenderArgs {
    fn params(&self) -> RequestParams {
        RequestParams {
            kind: Some(self.kind.clone()),
            url: self.url.clone(),
            upload_url: self.upload_url.clone(),
        }
    }
}

/// Run one document through the pipeline.
pub async fn run_render(
    config_path: Option<PathBuf>,
    args: RenderArgs,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let overrides = CliOverrides {
        bind: None,
        mode: args.mode,
        output_dir: args.output_dir.clone(),
    };
    let config = match load_config(config_path.as_deref(), &overrides) {
        Ok(cfg) => cfg,
        Err(err) => return render_config_error(&err, format, output),
    };
    let profile = profile_source(&config).resolve();
    debug!(mode = %profile.mode, platform = %profile.os, "environment detected");

    let request = match RenderRequest::from_params(&args.id, &args.params()) {
        Ok(request) => request,
        Err(err) => return render_error(&PipelineError::from(err), &profile, format, output),
    };

    let orchestrator = match build_provisioner(&config)
        .and_then(|provisioner| Orchestrator::from_config(&config, provisioner))
    {
        Ok(orchestrator) => orchestrator,
        Err(err) => return render_config_error(&err, format, output),
    };

    let outcome = match orchestrator.run(&request, &profile).await {
        Ok(outcome) => outcome,
        Err(err) => return render_error(&err, &profile, format, output),
    };

    let body = DocpipeOutput::Render(RenderOutput {
        version: DOCPIPE_OUTPUT_VERSION.to_string(),
        document_kind: request.kind(),
        document_id: request.document_id().to_string(),
        elapsed_ms: outcome.elapsed.as_millis() as u64,
        response: RenderResponse::from_outcome(&outcome),
    });

    if let Err(err) = write_output(&body, format, output) {
        eprintln!("Failed to write output: {}", err);
        return ExitCode::from(2);
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_carry_type_and_optional_urls() {
        let args = RenderArgs {
            kind: "invoice".into(),
            id: "I1".into(),
            url: None,
            upload_url: Some("https://storage.example.com/u/1".into()),
            mode: None,
            output_dir: None,
        };
        let params = args.params();
        assert_eq!(params.kind.as_deref(), Some("invoice"));
        assert!(params.url.is_none());
        let request = RenderRequest::from_params(&args.id, &params).unwrap();
        assert!(request.upload_target().is_some());
    }
}
