//! Execution-environment classification.
//!
//! The profile decides which provisioning strategy and which artifact sinks
//! are legal for a request. It is cheap to compute and is resolved once per
//! request, since pooled serverless hosts can change between invocations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Environment variable that forces the execution mode (`local` or `serverless`).
pub const MODE_ENV: &str = "DOCPIPE_ENVIRONMENT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Developer machine or long-lived host with a writable disk.
    InteractiveLocal,
    /// Read-only function runtime; only remote delivery is possible.
    ServerlessReadonly,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::InteractiveLocal => write!(f, "interactive-local"),
            ExecutionMode::ServerlessReadonly => write!(f, "serverless-readonly"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Linux,
    Macos,
    Windows,
    Other,
}

impl OsFamily {
    pub fn current() -> Self {
        Self::from_target(std::env::consts::OS)
    }

    pub fn from_target(os: &str) -> Self {
        match os {
            "linux" => OsFamily::Linux,
            "macos" => OsFamily::Macos,
            "windows" => OsFamily::Windows,
            _ => OsFamily::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Linux => "linux",
            OsFamily::Macos => "macos",
            OsFamily::Windows => "windows",
            OsFamily::Other => "other",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentProfile {
    pub mode: ExecutionMode,
    pub os: OsFamily,
    pub is_vercel: bool,
    pub is_production: bool,
}

impl EnvironmentProfile {
    /// Classify the current process environment.
    pub fn detect() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Classify from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_vercel = flag_set(lookup("VERCEL"));
        let is_lambda = lookup("AWS_LAMBDA_FUNCTION_NAME").is_some_and(|v| !v.trim().is_empty());

        let forced = lookup(MODE_ENV).and_then(|raw| match raw.parse::<ModeOverride>() {
            Ok(mode) => mode.forced(),
            Err(err) => {
                warn!(error = %err, "ignoring execution mode override");
                None
            }
        });
        let mode = forced.unwrap_or(if is_vercel || is_lambda {
            ExecutionMode::ServerlessReadonly
        } else {
            ExecutionMode::InteractiveLocal
        });

        let is_production = ["VERCEL_ENV", "APP_ENV", "NODE_ENV"]
            .iter()
            .any(|key| lookup(key).is_some_and(|v| v.eq_ignore_ascii_case("production")));

        Self {
            mode,
            os: OsFamily::current(),
            is_vercel,
            is_production,
        }
    }

    pub fn local(os: OsFamily) -> Self {
        Self {
            mode: ExecutionMode::InteractiveLocal,
            os,
            is_vercel: false,
            is_production: false,
        }
    }

    pub fn serverless(os: OsFamily) -> Self {
        Self {
            mode: ExecutionMode::ServerlessReadonly,
            os,
            is_vercel: true,
            is_production: true,
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.mode == ExecutionMode::ServerlessReadonly
    }
}

/// Configured override for the detected mode.
///
/// Accepted spellings are shared by the TOML file, `DOCPIPE_ENVIRONMENT`
/// and per-request detection: `auto`, `local` (`interactive`,
/// `interactive-local`) and `serverless` (`readonly`, `serverless-readonly`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeOverride {
    #[default]
    Auto,
    #[serde(alias = "interactive", alias = "interactive-local")]
    Local,
    #[serde(alias = "readonly", alias = "serverless-readonly")]
    Serverless,
}

impl ModeOverride {
    /// The mode this override pins, or `None` to keep detection.
    pub fn forced(self) -> Option<ExecutionMode> {
        match self {
            ModeOverride::Auto => None,
            ModeOverride::Local => Some(ExecutionMode::InteractiveLocal),
            ModeOverride::Serverless => Some(ExecutionMode::ServerlessReadonly),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("DOCPIPE_ENVIRONMENT must be auto, local or serverless (got {0:?})")]
pub struct UnknownMode(pub String);

impl FromStr for ModeOverride {
    type Err = UnknownMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ModeOverride::Auto),
            "local" | "interactive" | "interactive-local" => Ok(ModeOverride::Local),
            "serverless" | "readonly" | "serverless-readonly" => Ok(ModeOverride::Serverless),
            _ => Err(UnknownMode(value.to_string())),
        }
    }
}

/// Where each request gets its profile from.
#[derive(Debug, Clone, Copy)]
pub enum ProfileSource {
    Detect(ModeOverride),
    Fixed(EnvironmentProfile),
}

impl ProfileSource {
    pub fn resolve(&self) -> EnvironmentProfile {
        match self {
            ProfileSource::Detect(mode) => {
                let detected = EnvironmentProfile::detect();
                match mode.forced() {
                    Some(forced) => detected.with_mode(forced),
                    None => detected,
                }
            }
            ProfileSource::Fixed(profile) => *profile,
        }
    }
}

fn flag_set(value: Option<String>) -> bool {
    match value {
        Some(v) => {
            let v = v.trim();
            !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false")
        }
        None => false,
    }
}
