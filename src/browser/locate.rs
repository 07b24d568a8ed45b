//! Well-known install locations for Chrome-family browsers.

use std::path::{Path, PathBuf};

use crate::environment::OsFamily;

const LINUX_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
];

const MACOS_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
];

const WINDOWS_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];

/// Candidate paths in search order.
pub fn well_known_paths(os: OsFamily) -> Vec<PathBuf> {
    let paths: &[&str] = match os {
        OsFamily::Linux => LINUX_PATHS,
        OsFamily::Macos => MACOS_PATHS,
        OsFamily::Windows => WINDOWS_PATHS,
        OsFamily::Other => &[],
    };
    paths.iter().map(PathBuf::from).collect()
}

/// First candidate that exists as a file.
pub fn first_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| is_file(p)).cloned()
}

fn is_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}
