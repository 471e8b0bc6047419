//! Launch settings for the browser-backed driver.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use which::which;

/// Browser launch configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Explicit browser binary. Detected when unset.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub sandbox: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Upper bound for launching the browser and opening the first page.
    pub launch_timeout_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: resolve_headless_default(),
            sandbox: true,
            window_width: 1280,
            window_height: 900,
            launch_timeout_ms: 20_000,
        }
    }
}

impl DriverConfig {
    /// The configured executable if it exists, otherwise whatever detection finds.
    pub fn resolve_executable(&self) -> Option<PathBuf> {
        match &self.executable {
            Some(path) if path.exists() => Some(path.clone()),
            _ => detect_chrome_executable(),
        }
    }
}

fn resolve_headless_default() -> bool {
    match env::var("UIRESOLVE_HEADLESS") {
        Ok(value) => !matches!(
            value.to_ascii_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        Err(_) => true,
    }
}

/// Finds a Chrome/Chromium binary: `UIRESOLVE_CHROME`, then `PATH`, then well-known locations.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("UIRESOLVE_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    os_specific_chrome_paths()
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Ok(value) = env::var(key) {
                let root = PathBuf::from(value.trim());
                paths.push(root.join("Google/Chrome/Application/chrome.exe"));
                paths.push(root.join("Microsoft/Edge/Application/msedge.exe"));
            }
        }
        paths
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }
}
