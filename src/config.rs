use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::environment::ModeOverride;
use crate::error::ConfigError;
use crate::Viewport;

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_PAGE_PATH: &str = "/print/{type}/{id}";
pub const DEFAULT_OUTPUT_DIR: &str = "public/pdfs";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub documents: DocumentConfig,
    pub environment: EnvironmentConfig,
    pub browser: BrowserConfig,
    pub render: RenderConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocumentConfig {
    /// Origin of the page-serving collaborator.
    pub base_url: String,
    /// Path template with `{type}` and `{id}` placeholders.
    pub page_path: String,
    /// Local output directory for interactive environments.
    pub output_dir: PathBuf,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_path: DEFAULT_PAGE_PATH.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    pub mode: ModeOverride,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserConfig {
    /// Explicit browser binary; skips the well-known path search.
    pub executable: Option<PathBuf>,
    /// Pinned archive with a prebuilt browser for serverless hosts.
    pub archive_url: Option<String>,
    /// Executable path relative to the unpacked archive root.
    pub archive_executable: PathBuf,
    pub cache_dir: PathBuf,
    pub viewport: Viewport,
    /// Optional cap on live browsers. Unset means one browser per request
    /// with no limit; when set, requests over the cap fail immediately.
    pub max_concurrent_sessions: Option<usize>,
    #[serde(with = "humantime_serde")]
    pub launch_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            archive_url: None,
            archive_executable: PathBuf::from("chromium"),
            cache_dir: std::env::temp_dir().join("docpipe-browser"),
            viewport: Viewport::default(),
            max_concurrent_sessions: None,
            launch_timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    #[serde(with = "humantime_serde")]
    pub navigation_timeout: Duration,
    /// Trailing window with no in-flight requests that counts as quiescent.
    #[serde(with = "humantime_serde")]
    pub quiet_window: Duration,
    /// Fixed pause after quiescence before capture.
    #[serde(with = "humantime_serde")]
    pub grace_delay: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            quiet_window: Duration::from_millis(500),
            grace_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMethod {
    Post,
    #[default]
    Put,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    pub method: UploadMethod,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            method: UploadMethod::Put,
            timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load from an explicit path, else the central config, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::central_config_path() {
                Some(central) if central.is_file() => Self::from_file(&central),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `~/.config/docpipe/config.toml` (platform config dir).
    pub fn central_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("docpipe").join("config.toml"))
    }

    /// Apply `DOCPIPE_*` overrides from a variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(bind) = get("DOCPIPE_BIND") {
            self.server.bind = bind;
        }
        if let Some(base) = get("DOCPIPE_BASE_URL") {
            self.documents.base_url = base;
        }
        if let Some(dir) = get("DOCPIPE_OUTPUT_DIR") {
            self.documents.output_dir = PathBuf::from(dir);
        }
        if let Some(path) = get("DOCPIPE_CHROME_PATH").or_else(|| get("CHROME_PATH")) {
            self.browser.executable = Some(PathBuf::from(path));
        }
        if let Some(url) = get("DOCPIPE_BROWSER_ARCHIVE_URL") {
            self.browser.archive_url = Some(url);
        }
        if let Some(mode) = get(crate::environment::MODE_ENV) {
            self.environment.mode = mode
                .parse::<ModeOverride>()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;
        if !self.documents.page_path.contains("{id}") {
            return Err(ConfigError::Invalid(format!(
                "documents.page_path must contain {{id}} (got {:?})",
                self.documents.page_path
            )));
        }
        if let Some(raw) = &self.browser.archive_url {
            parse_http(raw, "browser.archive_url")?;
        }
        if self.browser.max_concurrent_sessions == Some(0) {
            return Err(ConfigError::Invalid(
                "browser.max_concurrent_sessions must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("browser.launch_timeout", self.browser.launch_timeout),
            ("render.navigation_timeout", self.render.navigation_timeout),
            ("render.quiet_window", self.render.quiet_window),
            ("upload.timeout", self.upload.timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        parse_http(&self.documents.base_url, "documents.base_url")
    }
}

fn parse_http(raw: &str, field: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::Invalid(format!("{field} {raw:?} is not a valid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!(
            "{field} must use http or https (got {raw:?})"
        )));
    }
    Ok(url)
}
