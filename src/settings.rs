use std::path::{Path, PathBuf};
use std::sync::Arc;

use docpipe_lib::browser::mock::MockProvisioner;
use docpipe_lib::config::Config;
use docpipe_lib::environment::{ModeOverride, ProfileSource};
use docpipe_lib::{ChromiumProvisioner, ConfigError, Provisioner};
use tracing::{debug, warn};

use crate::cli::ModeArg;

/// Replaces the browser with a fixed PDF file when set.
pub const MOCK_PDF_ENV: &str = "DOCPIPE_MOCK_PDF";

/// Flags that override config values when given.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub bind: Option<String>,
    pub mode: Option<ModeArg>,
    pub output_dir: Option<PathBuf>,
}

impl CliOverrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(mode) = self.mode {
            config.environment.mode = match mode {
                ModeArg::Local => ModeOverride::Local,
                ModeArg::Serverless => ModeOverride::Serverless,
            };
        }
        if let Some(dir) = &self.output_dir {
            config.documents.output_dir = dir.clone();
        }
    }
}

/// Load config from a TOML file, central config, or defaults, then apply
/// `DOCPIPE_*` environment overrides and CLI flags, then validate.
/// Priority: CLI flag > environment > explicit path > central config > defaults
pub fn load_config(path: Option<&Path>, overrides: &CliOverrides) -> Result<Config, ConfigError> {
    let mut cfg = Config::load(path)?;
    cfg.apply_env(|key| std::env::var(key).ok())?;
    overrides.apply(&mut cfg);
    cfg.validate()?;
    log_effective_config(path, &cfg);
    Ok(cfg)
}

pub fn profile_source(config: &Config) -> ProfileSource {
    ProfileSource::Detect(config.environment.mode)
}

/// Real Chromium unless [`MOCK_PDF_ENV`] points at a PDF file.
pub fn build_provisioner(config: &Config) -> Result<Arc<dyn Provisioner>, ConfigError> {
    match std::env::var(MOCK_PDF_ENV) {
        Ok(path) if !path.trim().is_empty() => {
            warn!(path = %path, "mock rendering enabled; no browser will be launched");
            let mock = MockProvisioner::from_pdf_file(Path::new(&path))
                .map_err(|e| ConfigError::Invalid(format!("{MOCK_PDF_ENV}={path}: {e}")))?;
            Ok(Arc::new(mock))
        }
        _ => Ok(Arc::new(ChromiumProvisioner::new(
            config.browser.clone(),
            config.render.navigation_timeout,
        ))),
    }
}

fn log_effective_config(path: Option<&Path>, cfg: &Config) {
    let source = path
        .map(|p| p.display().to_string())
        .or_else(|| {
            Config::central_config_path()
                .filter(|p| p.is_file())
                .map(|p| p.display().to_string())
        })
        .unwrap_or_else(|| "defaults".to_string());
    debug!(
        source = %source,
        base_url = %cfg.documents.base_url,
        page_path = %cfg.documents.page_path,
        output_dir = %cfg.documents.output_dir.display(),
        mode = ?cfg.environment.mode,
        viewport = %cfg.browser.viewport,
        max_sessions = ?cfg.browser.max_concurrent_sessions,
        navigation_timeout = ?cfg.render.navigation_timeout,
        grace_delay = ?cfg.render.grace_delay,
        upload_method = ?cfg.upload.method,
        "effective config"
    );
}
