//! Chrome/Chromium discovery, one-time installation and launch
//!
//! Installation is an explicit setup step (`ensure_browser_installed`).
//! Launching never installs: when no executable can be resolved the
//! extraction call fails with `CatalogueError::Launch`.

use anyhow::Context;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{error, info, trace, warn};

use crate::BrowserConfig;
use crate::utils::CatalogueError;
use crate::utils::constants::CHROME_USER_AGENT;

/// Records where the managed Chromium was unpacked by the setup step
const MANAGED_MARKER_FILE: &str = "executable-path";

/// RAII guard for the per-session profile directory
///
/// Removes the directory on drop unless consumed by `into_path()`, so a
/// failed launch never leaves a profile behind.
struct TempDirGuard {
    path: PathBuf,
    keep: bool,
}

impl TempDirGuard {
    fn new(path: PathBuf) -> Result<Self, CatalogueError> {
        std::fs::create_dir_all(&path).map_err(|e| {
            CatalogueError::Launch(format!(
                "Failed to create profile directory {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self { path, keep: false })
    }

    fn into_path(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if !self.keep {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!("Failed to clean up profile dir {}: {}", self.path.display(), e);
            } else {
                info!("Cleaned up profile dir after launch failure: {}", self.path.display());
            }
        }
    }
}

fn managed_browser_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| {
            let fallback = std::env::temp_dir().join(".cache");
            warn!(
                "Could not determine system cache directory, using temp directory fallback: {}",
                fallback.display()
            );
            fallback
        })
        .join("crzp_thesis/chromium")
}

/// Find a system Chrome/Chromium executable
///
/// Checks `CHROMIUM_PATH`, the usual install locations for the platform
/// and finally `which` on Unix.
pub fn find_browser_executable() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from CHROMIUM_PATH: {}", path.display());
            return Some(path);
        }
        warn!(
            "CHROMIUM_PATH environment variable points to non-existent file: {}",
            path.display()
        );
    }

    let candidates: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    if let Some(path) = candidates.iter().map(PathBuf::from).find(|p| p.exists()) {
        info!("Found browser at: {}", path.display());
        return Some(path);
    }

    if !cfg!(target_os = "windows") {
        for cmd in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = Command::new("which").arg(cmd).output()
                && output.status.success()
            {
                let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !found.is_empty() {
                    info!("Found browser using 'which' command: {}", found);
                    return Some(PathBuf::from(found));
                }
            }
        }
    }

    None
}

/// Executable previously installed by `ensure_browser_installed`
fn managed_browser_executable(dir: &Path) -> Option<PathBuf> {
    let recorded = std::fs::read_to_string(dir.join(MANAGED_MARKER_FILE)).ok()?;
    let path = PathBuf::from(recorded.trim());
    path.exists().then_some(path)
}

/// Resolve the executable to launch without installing anything
///
/// Order: explicit config path, system browser, managed browser from a
/// previous setup run.
pub fn resolve_browser_executable(config: &BrowserConfig) -> Result<PathBuf, CatalogueError> {
    if let Some(path) = &config.executable {
        if path.exists() {
            return Ok(path.clone());
        }
        return Err(CatalogueError::Launch(format!(
            "Configured browser executable does not exist: {}",
            path.display()
        )));
    }

    find_browser_executable()
        .or_else(|| managed_browser_executable(&managed_browser_dir()))
        .ok_or_else(|| {
            CatalogueError::Launch(
                "Chrome/Chromium executable not found. Run `crzp-thesis setup` first.".into(),
            )
        })
}

/// Download a managed Chromium through the chromiumoxide fetcher
async fn download_managed_browser(cache_dir: &Path) -> anyhow::Result<PathBuf> {
    info!("Downloading managed Chromium browser...");

    std::fs::create_dir_all(cache_dir).context("Failed to create cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );

    let revision_info = fetcher.fetch().await.context("Failed to fetch browser")?;

    info!("Downloaded Chromium to: {}", revision_info.folder_path.display());

    std::fs::write(
        cache_dir.join(MANAGED_MARKER_FILE),
        revision_info.executable_path.to_string_lossy().as_bytes(),
    )
    .context("Failed to record managed browser location")?;

    Ok(revision_info.executable_path)
}

/// Explicit, idempotent setup step run once before any extraction call
///
/// Returns the resolved executable. Downloads Chromium only when nothing
/// is resolvable; a failed download is reported, never retried.
pub async fn ensure_browser_installed(config: &BrowserConfig) -> Result<PathBuf, CatalogueError> {
    if let Ok(path) = resolve_browser_executable(config) {
        info!("Browser already available: {}", path.display());
        return Ok(path);
    }

    download_managed_browser(&managed_browser_dir())
        .await
        .map_err(|e| CatalogueError::Launch(format!("Browser installation failed: {e:#}")))
}

/// Launch a headless, sandbox-disabled Chromium with its own profile
///
/// The returned handler task drives the CDP connection and MUST be
/// aborted when the browser is done.
pub async fn launch_browser(
    config: &BrowserConfig,
    profile_dir: PathBuf,
) -> Result<(Browser, JoinHandle<()>, PathBuf), CatalogueError> {
    let chrome_path = resolve_browser_executable(config)?;

    let guard = TempDirGuard::new(profile_dir)?;

    let mut builder = BrowserConfigBuilder::default()
        .request_timeout(Duration::from_secs(30))
        .window_size(config.window.width, config.window.height)
        .user_data_dir(guard.path.clone())
        .chrome_executable(chrome_path);

    builder = if config.headless {
        builder.headless_mode(HeadlessMode::default())
    } else {
        builder.with_head()
    };

    builder = builder
        .arg(format!("--user-agent={}", CHROME_USER_AGENT))
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-notifications")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg("--disable-breakpad")
        .arg("--disable-features=TranslateUI")
        .arg("--password-store=basic")
        .arg("--use-mock-keychain")
        .arg("--mute-audio")
        // Sessions are isolated by profile directory, not by the OS sandbox
        .arg("--no-sandbox")
        .arg("--disable-setuid-sandbox");

    if config.disable_security {
        info!("WARNING: Disabling browser security features (disable_security=true)");
        builder = builder
            .arg("--disable-web-security")
            .arg("--ignore-certificate-errors");
    }

    let browser_config = builder
        .build()
        .map_err(|e| CatalogueError::Launch(format!("Failed to build browser config: {e}")))?;

    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .map_err(|e| CatalogueError::Launch(e.to_string()))?;

    let handler_task = task::spawn(async move {
        while let Some(h) = handler.next().await {
            if let Err(e) = h {
                let error_msg = e.to_string();

                // chromiumoxide does not know every CDP event Chrome emits
                // https://github.com/mattsse/chromiumoxide/issues/167
                let is_benign_serialization_error = error_msg
                    .contains("data did not match any variant of untagged enum Message")
                    || error_msg.contains("Failed to deserialize WS response");

                if is_benign_serialization_error {
                    trace!("Suppressed benign CDP serialization error: {}", error_msg);
                } else {
                    error!("Browser handler error: {:?}", e);
                }
            }
        }
        trace!("Browser handler task completed");
    });

    Ok((browser, handler_task, guard.into_path()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_executable_must_exist() {
        let config = BrowserConfig {
            executable: Some(PathBuf::from("/definitely/not/a/chrome")),
            ..BrowserConfig::default()
        };
        let err = resolve_browser_executable(&config).unwrap_err();
        assert!(matches!(err, CatalogueError::Launch(_)));
    }

    #[test]
    fn configured_executable_wins_over_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("chrome");
        std::fs::write(&fake, b"").unwrap();

        let config = BrowserConfig {
            executable: Some(fake.clone()),
            ..BrowserConfig::default()
        };
        assert_eq!(resolve_browser_executable(&config).unwrap(), fake);
    }

    #[test]
    fn managed_marker_is_honoured_only_when_target_exists() {
        let dir = tempfile::tempdir().unwrap();
        assert!(managed_browser_executable(dir.path()).is_none());

        let exe = dir.path().join("chrome-linux/chrome");
        std::fs::create_dir_all(exe.parent().unwrap()).unwrap();
        std::fs::write(&exe, b"").unwrap();
        std::fs::write(dir.path().join(MANAGED_MARKER_FILE), exe.to_string_lossy().as_bytes())
            .unwrap();
        assert_eq!(managed_browser_executable(dir.path()), Some(exe.clone()));

        std::fs::remove_file(&exe).unwrap();
        assert!(managed_browser_executable(dir.path()).is_none());
    }

    #[test]
    fn profile_guard_removes_directory_unless_kept() {
        let root = tempfile::tempdir().unwrap();

        let dropped = root.path().join("dropped");
        drop(TempDirGuard::new(dropped.clone()).unwrap());
        assert!(!dropped.exists());

        let kept = root.path().join("kept");
        let path = TempDirGuard::new(kept.clone()).unwrap().into_path();
        assert_eq!(path, kept);
        assert!(kept.exists());
    }
}
