//! Search form and RSS export flow
//!
//! The result list itself is script-rendered and unstable; the RSS export
//! of the same result set is the structured source. Exporting opens the
//! feed in a second tab.

use futures::FutureExt;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::feed::parse_feed;
use super::types::ListingRecord;
use crate::Config;
use crate::browser::{BrowserSession, evaluate, with_session};
use crate::utils::{
    CatalogueError, CatalogueResult, NetworkIdleWatcher, click_element,
    validate_interaction_timeout, wait_for_element,
};

/// Raw feed source of the current tab
///
/// Chrome wraps XML in its viewer, so the original document is serialized
/// back when possible and re-fetched otherwise.
const FEED_SOURCE_SCRIPT: &str = r#"(async () => {
    if (document instanceof XMLDocument) {
        return new XMLSerializer().serializeToString(document);
    }
    try {
        const response = await fetch(location.href, { credentials: 'include' });
        return await response.text();
    } catch (e) {
        return null;
    }
})()"#;

/// Search the catalogue and return one record per feed item, in feed order
///
/// Zero matches is a valid, empty result.
pub async fn search_theses(config: &Config, search_term: &str) -> CatalogueResult<Vec<ListingRecord>> {
    let term = search_term.trim().to_string();
    if term.is_empty() {
        return Err(CatalogueError::InvalidArgument("Search term cannot be empty".into()));
    }

    with_session(config, move |session| {
        async move { search_in_session(session, &term).await }.boxed()
    })
    .await
}

async fn search_in_session(session: &BrowserSession, term: &str) -> CatalogueResult<Vec<ListingRecord>> {
    let page = session.page();
    let site = &session.config().site;
    let timeouts = &session.config().timeouts;
    let element_timeout = validate_interaction_timeout(timeouts.element_ms)?;

    info!("Searching catalogue for '{}'", term);
    session.goto(&site.search_url).await?;

    let input = wait_for_element(page, &site.search_input_selector, element_timeout).await?;
    click_element(page, &input, "search input").await?;
    input.type_str(term).await?;

    let watcher = NetworkIdleWatcher::attach(page).await?;
    input.press_key("Enter").await?;
    watcher
        .settle(
            Duration::from_millis(timeouts.quiescence_window_ms),
            Duration::from_millis(timeouts.quiescence_max_ms),
        )
        .await;

    let export = match wait_for_element(page, &site.rss_export_selector, element_timeout).await {
        Ok(export) => export,
        Err(not_found) => {
            // The export affordance is not rendered for an empty result list
            if page.find_element(site.no_results_selector.as_str()).await.is_ok() {
                info!("No theses found for '{}'", term);
                return Ok(Vec::new());
            }
            return Err(not_found);
        }
    };

    let feed_page = session
        .open_in_new_page(|| async { click_element(page, &export, "RSS export").await })
        .await?;

    let source = evaluate::<Option<String>>(&feed_page, FEED_SOURCE_SCRIPT).await?;
    let xml = match source {
        Some(xml) if !xml.trim().is_empty() => xml,
        _ => {
            debug!("Feed source unavailable via script, falling back to page content");
            feed_page.content().await?
        }
    };

    if let Err(e) = feed_page.close().await {
        warn!("Failed to close feed tab: {}", e);
    }

    let records = parse_feed(&xml)?;
    info!("Found {} record(s) for '{}'", records.len(), term);
    Ok(records)
}
