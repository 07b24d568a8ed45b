use std::path::PathBuf;
use std::process::ExitCode;

use docpipe_lib::output::DOCPIPE_OUTPUT_VERSION;
use docpipe_lib::{ChromiumProvisioner, DocpipeOutput, DoctorOutput};

use crate::cli::{ModeArg, OutputFormat};
use crate::formatting::{render_config_error, write_output};
use crate::settings::{load_config, profile_source, CliOverrides};

/// Report the detected environment and where the browser would come from.
/// Never launches or downloads anything.
pub async fn run_doctor(config_path: Option<PathBuf>, mode: Option<ModeArg>, format: OutputFormat) -> ExitCode {
    let overrides = CliOverrides {
        mode,
        ..CliOverrides::default()
    };
    let config = match load_config(config_path.as_deref(), &overrides) {
        Ok(cfg) => cfg,
        Err(err) => return render_config_error(&err, format, None),
    };
    let profile = profile_source(&config).resolve();

    let provisioner = ChromiumProvisioner::new(config.browser.clone(), config.render.navigation_timeout);
    let executable = provisioner.source_for(&profile).diagnose();

    let body = DocpipeOutput::Doctor(DoctorOutput {
        version: DOCPIPE_OUTPUT_VERSION.to_string(),
        environment: profile,
        executable,
        base_url: config.documents.base_url.clone(),
        output_dir: (!profile.is_read_only()).then(|| config.documents.output_dir.clone()),
        max_concurrent_sessions: config.browser.max_concurrent_sessions,
    });

    if let Err(err) = write_output(&body, format, None) {
        eprintln!("Failed to write output: {}", err);
        return ExitCode::from(2);
    }
    ExitCode::SUCCESS
}
