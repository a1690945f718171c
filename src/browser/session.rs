//! One isolated browser per extraction call
//!
//! A `BrowserSession` owns the Chromium process, its CDP handler task, its
//! profile directory and the working page. Nothing is shared between
//! sessions and nothing survives `shutdown()`.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::target::EventTargetCreated;
use chromiumoxide::page::Page;
use futures::StreamExt;
use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::Config;
use crate::utils::{CatalogueError, CatalogueResult, validate_navigation_timeout};

/// How long teardown waits for the browser process before killing it
const EXIT_TIMEOUT: Duration = Duration::from_secs(10);

/// The parts of a browser process that teardown drives
trait BrowserProcess {
    async fn close(&mut self) -> Result<(), String>;
    async fn wait(&mut self) -> std::io::Result<()>;
    async fn kill(&mut self) -> std::io::Result<()>;
}

impl BrowserProcess for Browser {
    async fn close(&mut self) -> Result<(), String> {
        Browser::close(self).await.map(|_| ()).map_err(|e| e.to_string())
    }

    async fn wait(&mut self) -> std::io::Result<()> {
        Browser::wait(self).await.map(|_| ())
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        Browser::kill(self).await.unwrap_or(Ok(()))
    }
}

/// Ask the browser to close, then reap it; kill when it does not go
///
/// A failed close (dead CDP connection) goes straight to kill. The wait is
/// bounded either way, so teardown always finishes.
async fn close_then_reap<P: BrowserProcess>(process: &mut P, exit_timeout: Duration) {
    if let Err(e) = process.close().await {
        warn!("Failed to close browser cleanly, killing it: {}", e);
        if let Err(e) = process.kill().await {
            warn!("Failed to kill browser: {}", e);
        }
    }

    match tokio::time::timeout(exit_timeout, process.wait()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to wait for browser exit: {}", e),
        Err(_) => {
            warn!("Browser did not exit within {:?}, killing it", exit_timeout);
            if let Err(e) = process.kill().await {
                warn!("Failed to kill browser: {}", e);
            }
            if tokio::time::timeout(exit_timeout, process.wait()).await.is_err() {
                warn!("Browser still running after kill");
            }
        }
    }
}

pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
    profile_dir: Option<PathBuf>,
    config: Config,
}

impl BrowserSession {
    /// Launch a fresh browser with a unique profile and one blank page
    pub async fn launch(config: &Config) -> CatalogueResult<Self> {
        let profile_dir = std::env::temp_dir().join(format!(
            "crzp_thesis_{}_{}",
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ));

        let (mut browser, handler, profile_dir) =
            crate::browser_setup::launch_browser(&config.browser, profile_dir).await?;

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                // Never leak the process when the first page cannot be created
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler.abort();
                let _ = std::fs::remove_dir_all(&profile_dir);
                return Err(CatalogueError::Launch(format!("Failed to create page: {e}")));
            }
        };

        info!("Browser session started (profile {})", profile_dir.display());

        Ok(Self {
            browser,
            handler,
            page,
            profile_dir: Some(profile_dir),
            config: config.clone(),
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Per-session profile directory, removed on shutdown
    pub fn profile_dir(&self) -> Option<&Path> {
        self.profile_dir.as_deref()
    }

    /// Navigate the working page and wait for the load to complete
    pub async fn goto(&self, url: &str) -> CatalogueResult<()> {
        let timeout = validate_navigation_timeout(self.config.timeouts.navigation_ms)?;

        tokio::time::timeout(timeout, async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        })
        .await
        .map_err(|_| CatalogueError::Navigation {
            url: url.to_string(),
            reason: format!("timeout after {}ms", timeout.as_millis()),
        })?
        .map_err(|e| CatalogueError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        debug!("Navigated to {}", url);
        Ok(())
    }

    /// Run `action` and return the tab it opens, once that tab has loaded
    ///
    /// The target subscription is scoped to this one action and made
    /// before it runs. No assumption is made about how many pages exist.
    pub async fn open_in_new_page<F, Fut>(&self, action: F) -> CatalogueResult<Page>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CatalogueResult<()>>,
    {
        let timeout_ms = self.config.timeouts.new_tab_ms;
        let timeout = validate_navigation_timeout(timeout_ms)?;
        let deadline = Instant::now() + timeout;

        let mut created = self.browser.event_listener::<EventTargetCreated>().await?;
        let own_target = self.page.target_id().clone();

        action().await?;

        let target_id = tokio::time::timeout_at(deadline, async {
            while let Some(event) = created.next().await {
                let info = &event.target_info;
                if info.r#type == "page" && info.target_id != own_target {
                    return Some(info.target_id.clone());
                }
            }
            None
        })
        .await
        .ok()
        .flatten()
        .ok_or(CatalogueError::NewTabTimeout { timeout_ms })?;

        // The handler attaches to the target asynchronously
        let page = loop {
            let pages = self.browser.pages().await?;
            if let Some(page) = pages.into_iter().find(|p| *p.target_id() == target_id) {
                break page;
            }
            if Instant::now() >= deadline {
                return Err(CatalogueError::NewTabTimeout { timeout_ms });
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        };

        tokio::time::timeout_at(deadline, page.wait_for_navigation())
            .await
            .map_err(|_| CatalogueError::NewTabTimeout { timeout_ms })??;

        debug!("New tab {:?} loaded", target_id);
        Ok(page)
    }

    /// Close the browser, wait for the process to exit and remove the profile
    ///
    /// Both `close()` and `wait()` are needed: dropping only aborts the
    /// handler and leaves a zombie process behind.
    pub async fn shutdown(mut self) {
        close_then_reap(&mut self.browser, EXIT_TIMEOUT).await;
        self.handler.abort();

        if let Some(path) = self.profile_dir.take()
            && let Err(e) = std::fs::remove_dir_all(&path)
        {
            warn!(
                "Failed to clean up profile directory {}: {}. Manual cleanup may be required.",
                path.display(),
                e
            );
        }

        info!("Browser session closed");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // Reached without shutdown() only on panic; Browser::drop kills Chrome
        self.handler.abort();
        if let Some(path) = self.profile_dir.take() {
            warn!(
                "BrowserSession dropped without shutdown, removing profile {}",
                path.display()
            );
            let _ = std::fs::remove_dir_all(&path);
        }
    }
}

/// Run `f` against a fresh session and tear the session down afterwards
///
/// Teardown happens on every path: success, error, and the overall
/// `timeouts.session_ms` bound.
///
/// ```no_run
/// # use futures::FutureExt;
/// # async fn demo(config: &crzp_thesis::Config) -> crzp_thesis::CatalogueResult<()> {
/// let title = crzp_thesis::with_session(config, |session| {
///     async move {
///         session.goto("https://opac.crzp.sk/").await?;
///         Ok(session.page().get_title().await?)
///     }
///     .boxed()
/// })
/// .await?;
/// # Ok(()) }
/// ```
pub async fn with_session<T, F>(config: &Config, f: F) -> CatalogueResult<T>
where
    F: for<'s> FnOnce(&'s BrowserSession) -> BoxFuture<'s, CatalogueResult<T>>,
{
    let session = BrowserSession::launch(config).await?;
    let timeout_ms = config.timeouts.session_ms;

    let outcome = match tokio::time::timeout(Duration::from_millis(timeout_ms), f(&session)).await {
        Ok(result) => result,
        Err(_) => Err(CatalogueError::SessionTimeout { timeout_ms }),
    };

    session.shutdown().await;
    outcome
}
