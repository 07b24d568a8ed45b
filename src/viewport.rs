use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Browser window size used for every launched session.
///
/// Written as `WIDTHxHEIGHT` in config files and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    /// A4 proportions at 150 dpi.
    fn default() -> Self {
        Self {
            width: 1240,
            height: 1754,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewportParseError {
    #[error("invalid viewport {0:?}: expected WIDTHxHEIGHT (e.g. 1240x1754)")]
    InvalidFormat(String),
    #[error("invalid viewport dimension {0:?}")]
    InvalidDimension(String),
    #[error("viewport dimensions must be positive")]
    Zero,
}

impl FromStr for Viewport {
    type Err = ViewportParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| ViewportParseError::InvalidFormat(s.to_string()))?;

        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| ViewportParseError::InvalidDimension(part.trim().to_string()))
        };
        let (width, height) = (parse(w)?, parse(h)?);

        if width == 0 || height == 0 {
            return Err(ViewportParseError::Zero);
        }
        Ok(Viewport { width, height })
    }
}

impl TryFrom<String> for Viewport {
    type Error = ViewportParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Viewport> for String {
    fn from(vp: Viewport) -> Self {
        vp.to_string()
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
