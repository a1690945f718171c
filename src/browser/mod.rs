//! Browser session lifecycle and page helpers

mod session;

pub use session::{BrowserSession, with_session};

use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::js::EvaluationResult;
use chromiumoxide::page::Page;
use serde::de::DeserializeOwned;

use crate::utils::CatalogueError;

/// Evaluate a script in the page, awaiting a returned promise
pub(crate) async fn evaluate<T: DeserializeOwned>(
    page: &Page,
    script: &str,
) -> Result<T, CatalogueError> {
    let params = EvaluateParams::builder()
        .expression(script)
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(CatalogueError::Browser)?;

    decode_result(&page.evaluate_expression(params).await?)
}

/// Deserialize a by-value result
///
/// CDP reports `null` and `undefined` without a `value`, which would make
/// `EvaluationResult::into_value` fail; both decode as JSON null here.
fn decode_result<T: DeserializeOwned>(result: &EvaluationResult) -> Result<T, CatalogueError> {
    let value = result.value().cloned().unwrap_or(serde_json::Value::Null);
    serde_json::from_value(value)
        .map_err(|e| CatalogueError::Browser(format!("Failed to parse script result: {e}")))
}
