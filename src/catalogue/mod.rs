//! Catalogue extractors
//!
//! Three independent operations, each owning one browser session end to
//! end:
//! - `search_theses` - search form, RSS export, listing records
//! - `fetch_abstracts` - abstract blocks of a detail page
//! - `retrieve_pdf` - optional PDF behind a two-step download flow

mod abstracts;
mod feed;
mod pdf;
mod search;
mod types;

pub use abstracts::fetch_abstracts;
pub use feed::{
    ABSTRACT_HEADER, LISTING_HEADER, format_abstracts, format_listing, format_listing_row,
    parse_feed, parse_listing, parse_listing_line,
};
pub use pdf::{persist_download, retrieve_pdf};
pub use search::search_theses;
pub use types::{AbstractSet, ConsentState, ListingRecord, PdfArtifact};

use std::time::Duration;

use url::Url;

use crate::browser::BrowserSession;
use crate::utils::{CatalogueError, CatalogueResult, validate_interaction_timeout, wait_for_element};

/// Accept only absolute http(s) URLs as detail-page input
pub(crate) fn validate_detail_url(detail_url: &str) -> CatalogueResult<String> {
    let trimmed = detail_url.trim();
    let parsed = Url::parse(trimmed).map_err(|e| {
        CatalogueError::InvalidArgument(format!("Detail URL '{}' is not a valid URL: {}", trimmed, e))
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(CatalogueError::InvalidArgument(format!(
            "Detail URL must start with http:// or https:// (got '{}')",
            other
        ))),
    }
}

/// Load a detail page and wait for its abstract container
///
/// A page without the container is indistinguishable from a slow one at
/// this layer, so both surface as `ElementNotFound`.
pub(crate) async fn open_detail_page(
    session: &BrowserSession,
    detail_url: &str,
) -> CatalogueResult<Duration> {
    let element_timeout = validate_interaction_timeout(session.config().timeouts.element_ms)?;

    session.goto(detail_url).await?;
    wait_for_element(
        session.page(),
        &session.config().site.abstract_selector,
        element_timeout,
    )
    .await?;

    Ok(element_timeout)
}
