//! Abstract extraction from a detail page

use futures::FutureExt;
use tracing::info;

use super::types::AbstractSet;
use super::{open_detail_page, validate_detail_url};
use crate::Config;
use crate::browser::{BrowserSession, with_session};
use crate::utils::CatalogueResult;

/// Every abstract block of a detail page, in DOM order
///
/// The first block is the primary-language abstract by site convention.
/// No language detection or translation happens here.
pub async fn fetch_abstracts(config: &Config, detail_url: &str) -> CatalogueResult<AbstractSet> {
    let url = validate_detail_url(detail_url)?;

    with_session(config, move |session| {
        async move { abstracts_in_session(session, &url).await }.boxed()
    })
    .await
}

async fn abstracts_in_session(session: &BrowserSession, url: &str) -> CatalogueResult<AbstractSet> {
    open_detail_page(session, url).await?;

    let elements = session
        .page()
        .find_elements(session.config().site.abstract_selector.as_str())
        .await?;

    let mut blocks = Vec::with_capacity(elements.len());
    for element in &elements {
        blocks.push(element.inner_text().await?.unwrap_or_default());
    }

    info!("Extracted {} abstract block(s) from {}", blocks.len(), url);
    Ok(AbstractSet::new(blocks))
}
