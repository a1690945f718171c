//! Element polling utility for script-rendered pages
//!
//! Provides wait_for_element() which polls for DOM elements with exponential backoff.
//! The catalogue renders its search box, result list and detail blocks via
//! JavaScript after the load event fires, so a plain `find_element` is not enough.

use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::element::Element;
use tracing::debug;

use crate::utils::errors::CatalogueError;

/// Wait for an element to appear in the DOM using exponential backoff polling
///
/// # Returns
/// * `Ok(Element)` - The element was found
/// * `Err(CatalogueError::ElementNotFound)` - Timeout exceeded
///
/// # Polling Strategy
/// - Starts at 100ms intervals
/// - Doubles each retry, capped at 1 second
/// - Total duration limited by timeout parameter
pub async fn wait_for_element(
    page: &Page,
    selector: &str,
    timeout: Duration,
) -> Result<Element, CatalogueError> {
    let start = std::time::Instant::now();
    let mut poll_interval = Duration::from_millis(100);
    let max_interval = Duration::from_secs(1);

    loop {
        if let Ok(element) = page.find_element(selector).await {
            debug!("Found '{}' after {}ms", selector, start.elapsed().as_millis());
            return Ok(element);
        }

        if start.elapsed() >= timeout {
            return Err(CatalogueError::ElementNotFound {
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }

        tokio::time::sleep(poll_interval).await;
        poll_interval = (poll_interval * 2).min(max_interval);
    }
}

/// Scroll an element into view and click its centre point
///
/// Clicks through the page rather than `Element::click` to avoid the
/// IntersectionObserver hang chromiumoxide hits on some layouts.
pub async fn click_element(page: &Page, element: &Element, label: &str) -> Result<(), CatalogueError> {
    element.scroll_into_view().await.map_err(|e| {
        CatalogueError::Browser(format!("Failed to scroll '{}' into view: {}", label, e))
    })?;

    let point = element.clickable_point().await.map_err(|e| {
        CatalogueError::Browser(format!(
            "Failed to get clickable point for '{}'. Element may not be visible. Error: {}",
            label, e
        ))
    })?;

    page.click(point).await.map_err(|e| {
        CatalogueError::Browser(format!("Click failed for '{}': {}", label, e))
    })?;

    Ok(())
}
