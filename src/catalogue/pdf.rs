//! PDF retrieval from a detail page
//!
//! Navigate -> look for the download link -> open the download dialog ->
//! dismiss the cookie banner if visible -> click the confirmation while
//! listening for the download -> move the file into the download directory.
//!
//! The outcome is always a complete file or `PdfArtifact::Absent`.

use std::path::{Path, PathBuf};

use chromiumoxide::cdp::browser_protocol::browser::{
    DownloadProgressState, EventDownloadProgress, EventDownloadWillBegin,
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use futures::{FutureExt, StreamExt};
use tracing::{debug, info, trace, warn};

use super::types::{ConsentState, PdfArtifact};
use super::{open_detail_page, validate_detail_url};
use crate::Config;
use crate::browser::{BrowserSession, evaluate, with_session};
use crate::utils::constants::MARKER_ATTRIBUTE;
use crate::utils::{
    CatalogueError, CatalogueResult, click_element, reserve_unique_path, sanitize_filename,
    validate_navigation_timeout, wait_for_element,
};

const PDF_LINK_MARK: &str = "pdf-link";
const CONSENT_MARK: &str = "cookie-consent";

/// Tag the first link/button whose trimmed text equals `label`
fn pdf_link_check_script(label: &str) -> String {
    format!(
        r#"(() => {{
    const label = {label};
    const link = Array.from(document.querySelectorAll('a, button'))
        .find(el => (el.innerText || el.textContent || '').trim() === label);
    if (!link) return false;
    link.setAttribute('{attr}', '{mark}');
    return true;
}})()"#,
        label = js_string(label),
        attr = MARKER_ATTRIBUTE,
        mark = PDF_LINK_MARK,
    )
}

/// Classify the consent banner as absent, hidden or visible
fn consent_check_script(selector: &str) -> String {
    format!(
        r#"(() => {{
    const el = document.querySelector({selector});
    if (!el) return 'absent';
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    const shown = style.display !== 'none'
        && style.visibility !== 'hidden'
        && style.opacity !== '0'
        && rect.width > 0 && rect.height > 0;
    if (!shown) return 'hidden';
    el.setAttribute('{attr}', '{mark}');
    return 'visible';
}})()"#,
        selector = js_string(selector),
        attr = MARKER_ATTRIBUTE,
        mark = CONSENT_MARK,
    )
}

/// JSON string literals are valid JavaScript string literals
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn marked(mark: &str) -> String {
    format!(r#"[{}="{}"]"#, MARKER_ATTRIBUTE, mark)
}

/// Download the detail page's PDF into the download directory, if it has one
///
/// The caller owns the returned file.
pub async fn retrieve_pdf(config: &Config, detail_url: &str) -> CatalogueResult<PdfArtifact> {
    let url = validate_detail_url(detail_url)?;
    let staging = std::env::temp_dir().join(format!(
        "crzp_download_{}",
        uuid::Uuid::new_v4().simple()
    ));

    let outcome = {
        let staging = staging.clone();
        with_session(config, move |session| {
            async move { retrieve_in_session(session, &url, &staging).await }.boxed()
        })
        .await
    };

    // The browser has exited by now, nothing holds the staged files
    if let Err(e) = tokio::fs::remove_dir_all(&staging).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!("Failed to remove download staging dir {}: {}", staging.display(), e);
    }

    outcome
}

async fn retrieve_in_session(
    session: &BrowserSession,
    url: &str,
    staging: &Path,
) -> CatalogueResult<PdfArtifact> {
    let page = session.page();
    let site = &session.config().site;

    // Navigate
    let element_timeout = open_detail_page(session, url).await?;

    // Look for the link
    let has_link: bool = evaluate(page, &pdf_link_check_script(&site.pdf_link_label)).await?;
    if !has_link {
        info!("No PDF offered on {}", url);
        return Ok(PdfArtifact::Absent);
    }

    // Open
    let link = page.find_element(marked(PDF_LINK_MARK)).await?;
    click_element(page, &link, "PDF link").await?;
    let confirm = wait_for_element(page, &site.download_confirm_selector, element_timeout).await?;

    // Consent
    let answer: String = evaluate(page, &consent_check_script(&site.cookie_consent_selector)).await?;
    let consent = ConsentState::from_script(&answer);
    debug!("Cookie consent banner: {:?}", consent);
    if consent.needs_dismissal() {
        match page.find_element(marked(CONSENT_MARK)).await {
            Ok(button) => {
                if let Err(e) = click_element(page, &button, "cookie consent").await {
                    warn!("Failed to dismiss cookie consent, continuing: {}", e);
                }
            }
            Err(e) => warn!("Cookie consent vanished before dismissal: {}", e),
        }
    }

    // Download
    let (suggested_filename, staged) = download_via(session, staging, || async {
        click_element(page, &confirm, "download confirmation").await
    })
    .await?;

    // Persist
    let dest_dir = session.config().browser.download_dir();
    tokio::fs::create_dir_all(&dest_dir).await?;
    let path = persist_download(&staged, &suggested_filename, &dest_dir).await?;
    info!("Saved PDF from {} to {}", url, path.display());
    Ok(PdfArtifact::Downloaded(path))
}

/// Run `trigger` with download events subscribed and wait for the file
///
/// Returns the server-suggested filename and the staged file path.
async fn download_via<F, Fut>(
    session: &BrowserSession,
    staging: &Path,
    trigger: F,
) -> CatalogueResult<(String, PathBuf)>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = CatalogueResult<()>>,
{
    let browser = session.browser();
    let timeouts = &session.config().timeouts;
    let start_ms = timeouts.download_start_ms;
    let complete_ms = timeouts.download_complete_ms;
    let start_timeout = validate_navigation_timeout(start_ms)?;
    let complete_timeout = validate_navigation_timeout(complete_ms)?;

    tokio::fs::create_dir_all(staging).await?;

    // allowAndName stores the file as <staging>/<guid>
    let behavior = SetDownloadBehaviorParams::builder()
        .behavior(SetDownloadBehaviorBehavior::AllowAndName)
        .download_path(staging.to_string_lossy().to_string())
        .events_enabled(true)
        .build()
        .map_err(CatalogueError::Browser)?;
    browser.execute(behavior).await?;

    let mut will_begin = browser.event_listener::<EventDownloadWillBegin>().await?;
    let mut progress = browser.event_listener::<EventDownloadProgress>().await?;

    trigger().await?;

    let begun = tokio::time::timeout(start_timeout, will_begin.next())
        .await
        .ok()
        .flatten()
        .ok_or(CatalogueError::DownloadTimeout {
            phase: "start",
            timeout_ms: start_ms,
        })?;
    info!(
        "Download started: {} -> {}",
        begun.url, begun.suggested_filename
    );

    let guid = begun.guid.clone();
    tokio::time::timeout(complete_timeout, async {
        while let Some(event) = progress.next().await {
            if event.guid != guid {
                continue;
            }
            match event.state {
                DownloadProgressState::Completed => return Ok(()),
                DownloadProgressState::Canceled => {
                    return Err(CatalogueError::Browser("Download was canceled".into()));
                }
                DownloadProgressState::InProgress => {
                    trace!(
                        "Download {}: {}/{} bytes",
                        guid, event.received_bytes, event.total_bytes
                    );
                }
            }
        }
        Err(CatalogueError::Browser("Download events ended before completion".into()))
    })
    .await
    .map_err(|_| CatalogueError::DownloadTimeout {
        phase: "complete",
        timeout_ms: complete_ms,
    })??;

    Ok((begun.suggested_filename.clone(), staging.join(&begun.guid)))
}

/// Move a finished download to `dest_dir` under its sanitized name
///
/// Empty files are discarded and reported, never returned.
pub async fn persist_download(
    staged: &Path,
    suggested_filename: &str,
    dest_dir: &Path,
) -> CatalogueResult<PathBuf> {
    let size = tokio::fs::metadata(staged).await?.len();
    if size == 0 {
        let _ = tokio::fs::remove_file(staged).await;
        return Err(CatalogueError::Io(format!(
            "Downloaded file {} is empty",
            staged.display()
        )));
    }

    let dest = std::path::absolute(
        reserve_unique_path(dest_dir, &sanitize_filename(suggested_filename)).await?,
    )?;

    // Replaces only our own empty placeholder
    if tokio::fs::rename(staged, &dest).await.is_err() {
        // Different filesystems
        if let Err(e) = tokio::fs::copy(staged, &dest).await {
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(e.into());
        }
        let _ = tokio::fs::remove_file(staged).await;
    }

    debug!("Persisted {} bytes to {}", size, dest.display());
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        Banner, FixtureServer, PDF_BYTES, Route, browser_available, browser_test_config,
        detail_page, dir_entries, pdf_detail_page,
    };

    async fn download_with(banner: Banner) {
        let server = FixtureServer::start(vec![
            ("/detail", Route::html(&pdf_detail_page(banner))),
            ("/files/thesis.pdf", Route::pdf("thesis.pdf")),
        ])
        .await;
        let downloads = tempfile::tempdir().unwrap();
        let config = browser_test_config(downloads.path());

        let artifact = retrieve_pdf(&config, &server.url("/detail")).await.unwrap();

        let path = artifact.path().unwrap().to_path_buf();
        assert_eq!(path, std::path::absolute(downloads.path().join("thesis.pdf")).unwrap());
        assert_eq!(tokio::fs::read(&path).await.unwrap(), PDF_BYTES);
        assert_eq!(dir_entries(downloads.path()), ["thesis.pdf"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "needs a local Chrome/Chromium"]
    async fn downloads_after_dismissing_visible_cookie_banner() {
        if !browser_available() {
            return;
        }
        download_with(Banner::Visible).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "needs a local Chrome/Chromium"]
    async fn downloads_without_touching_hidden_cookie_banner() {
        if !browser_available() {
            return;
        }
        download_with(Banner::Hidden).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "needs a local Chrome/Chromium"]
    async fn downloads_when_no_cookie_banner_exists() {
        if !browser_available() {
            return;
        }
        download_with(Banner::Absent).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "needs a local Chrome/Chromium"]
    async fn page_without_pdf_link_is_absent_and_writes_nothing() {
        if !browser_available() {
            return;
        }
        let page = detail_page(r#"<a href="/other">Stiahnuť PDF verziu</a>"#);
        let server = FixtureServer::start(vec![("/detail", Route::html(&page))]).await;
        let downloads = tempfile::tempdir().unwrap();
        let config = browser_test_config(downloads.path());

        let artifact = retrieve_pdf(&config, &server.url("/detail")).await.unwrap();

        assert_eq!(artifact, PdfArtifact::Absent);
        assert!(dir_entries(downloads.path()).is_empty());
    }

    #[test]
    fn check_scripts_embed_values_as_string_literals() {
        let script = pdf_link_check_script(r#"Stiahnuť "PDF"'"#);
        assert!(script.contains(r#"const label = "Stiahnuť \"PDF\"'";"#));
        assert!(script.contains(MARKER_ATTRIBUTE));

        let script = consent_check_script("#cookie-accept");
        assert!(script.contains(r##"document.querySelector("#cookie-accept")"##));
        assert!(script.contains("'absent'"));
        assert!(script.contains("'hidden'"));
        assert!(script.contains("'visible'"));
    }

    #[test]
    fn marked_selector_targets_marker_attribute() {
        assert_eq!(marked(PDF_LINK_MARK), r#"[data-crzp-target="pdf-link"]"#);
    }

    #[tokio::test]
    async fn persist_moves_file_under_sanitized_name() {
        let staging = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let staged = staging.path().join("0f1e2d3c-guid");
        tokio::fs::write(&staged, b"%PDF-1.7 test").await.unwrap();

        let path = persist_download(&staged, "../../Diplomová práca.pdf", dest.path())
            .await
            .unwrap();

        assert!(path.is_absolute());
        assert_eq!(path, dest.path().join("Diplomová práca.pdf"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF-1.7 test");
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn persist_does_not_overwrite_existing_files() {
        let staging = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        tokio::fs::write(dest.path().join("thesis.pdf"), b"older").await.unwrap();

        let staged = staging.path().join("guid");
        tokio::fs::write(&staged, b"%PDF newer").await.unwrap();

        let path = persist_download(&staged, "thesis.pdf", dest.path()).await.unwrap();
        assert_eq!(path, dest.path().join("thesis-1.pdf"));
        assert_eq!(tokio::fs::read(dest.path().join("thesis.pdf")).await.unwrap(), b"older");
    }

    #[tokio::test]
    async fn concurrent_downloads_with_same_name_keep_both_files() {
        let staging = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let first = staging.path().join("guid-a");
        let second = staging.path().join("guid-b");
        tokio::fs::write(&first, b"%PDF first").await.unwrap();
        tokio::fs::write(&second, b"%PDF second").await.unwrap();

        let (a, b) = tokio::join!(
            persist_download(&first, "thesis.pdf", dest.path()),
            persist_download(&second, "thesis.pdf", dest.path()),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a, b);
        let mut contents = vec![tokio::fs::read(&a).await.unwrap(), tokio::fs::read(&b).await.unwrap()];
        contents.sort();
        assert_eq!(contents, vec![b"%PDF first".to_vec(), b"%PDF second".to_vec()]);
    }

    #[tokio::test]
    async fn persist_rejects_empty_download_and_leaves_nothing() {
        let staging = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let staged = staging.path().join("guid");
        tokio::fs::write(&staged, b"").await.unwrap();

        let err = persist_download(&staged, "thesis.pdf", dest.path()).await.unwrap_err();
        assert!(matches!(err, CatalogueError::Io(_)));
        assert!(!staged.exists());
        assert_eq!(std::fs::read_dir(dest.path()).unwrap().count(), 0);
    }
}
