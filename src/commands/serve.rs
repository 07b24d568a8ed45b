use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use docpipe_lib::server::{self, AppState};
use docpipe_lib::Orchestrator;
use tracing::{error, info};

use crate::cli::ModeArg;
use crate::settings::{build_provisioner, load_config, profile_source, CliOverrides};

/// Run the HTTP surface until the process is stopped.
pub async fn run_serve(config_path: Option<PathBuf>, bind: Option<String>, mode: Option<ModeArg>) -> ExitCode {
    let overrides = CliOverrides {
        bind,
        mode,
        output_dir: None,
    };
    let config = match load_config(config_path.as_deref(), &overrides) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "cannot start server");
            return ExitCode::from(2);
        }
    };

    let orchestrator = match build_provisioner(&config)
        .and_then(|provisioner| Orchestrator::from_config(&config, provisioner))
    {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            error!(error = %err, "cannot start server");
            return ExitCode::from(2);
        }
    };

    let profiles = profile_source(&config);
    let profile = profiles.resolve();
    info!(
        mode = %profile.mode,
        platform = %profile.os,
        vercel = profile.is_vercel,
        pages = %orchestrator.base_url(),
        "environment detected"
    );

    let state = AppState::new(Arc::new(orchestrator), profiles);
    match server::run(&config.server.bind, state).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, bind = %config.server.bind, "server stopped");
            ExitCode::from(2)
        }
    }
}
