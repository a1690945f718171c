//! Tool facade for the conversation layer
//!
//! Each tool takes JSON arguments and answers with plain text. Failures
//! never escape `ThesisTools::execute`; they come back as a readable
//! message that invites a retry.

mod thesis_abstract_fetch;
mod thesis_fetch;
mod thesis_retrieve_pdf;

pub use thesis_abstract_fetch::{ThesisAbstractFetchArgs, ThesisAbstractFetchTool};
pub use thesis_fetch::{ThesisFetchArgs, ThesisFetchTool};
pub use thesis_retrieve_pdf::{ThesisRetrievePdfArgs, ThesisRetrievePdfTool};

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use crate::Config;
use crate::utils::{CatalogueError, CatalogueResult};

pub trait ThesisTool: Send + Sync {
    type Args: DeserializeOwned + Send;

    fn name() -> &'static str;

    fn description() -> &'static str;

    /// JSON Schema of `Args`
    fn input_schema() -> Value;

    fn execute(&self, args: Self::Args) -> impl Future<Output = CatalogueResult<String>> + Send;
}

/// Text shown to the user in place of a tool result
pub fn render_error(error: &CatalogueError) -> String {
    format!("Error: {}\nPlease try again.", error)
}

/// The three catalogue tools behind one name-based dispatcher
#[derive(Clone)]
pub struct ThesisTools {
    fetch: ThesisFetchTool,
    abstracts: ThesisAbstractFetchTool,
    pdf: ThesisRetrievePdfTool,
}

impl ThesisTools {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        Self {
            fetch: ThesisFetchTool::new(config.clone()),
            abstracts: ThesisAbstractFetchTool::new(config.clone()),
            pdf: ThesisRetrievePdfTool::new(config),
        }
    }

    /// Name, description and input schema of every tool
    pub fn definitions() -> Vec<Value> {
        fn definition<T: ThesisTool>() -> Value {
            json!({
                "name": T::name(),
                "description": T::description(),
                "input_schema": T::input_schema(),
            })
        }

        vec![
            definition::<ThesisFetchTool>(),
            definition::<ThesisAbstractFetchTool>(),
            definition::<ThesisRetrievePdfTool>(),
        ]
    }

    /// Run the named tool; errors are rendered, never returned
    pub async fn execute(&self, name: &str, args: Value) -> String {
        info!("Tool call: {}", name);

        let result = if name == ThesisFetchTool::name() {
            run(&self.fetch, args).await
        } else if name == ThesisAbstractFetchTool::name() {
            run(&self.abstracts, args).await
        } else if name == ThesisRetrievePdfTool::name() {
            run(&self.pdf, args).await
        } else {
            Err(CatalogueError::InvalidArgument(format!("Unknown tool '{}'", name)))
        };

        result.unwrap_or_else(|e| {
            warn!("Tool {} failed: {}", name, e);
            render_error(&e)
        })
    }
}

async fn run<T: ThesisTool>(tool: &T, args: Value) -> CatalogueResult<String> {
    let args: T::Args = serde_json::from_value(args).map_err(|e| {
        CatalogueError::InvalidArgument(format!("Invalid arguments for {}: {}", T::name(), e))
    })?;
    tool.execute(args).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools() -> ThesisTools {
        ThesisTools::new(Config::default())
    }

    #[test]
    fn definitions_cover_every_tool() {
        let names: Vec<String> = ThesisTools::definitions()
            .iter()
            .map(|d| d["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            ["thesis_fetch", "thesis_abstract_fetch", "thesis_retrieve_pdf_if_available"]
        );
        for definition in ThesisTools::definitions() {
            assert_eq!(definition["input_schema"]["type"], "object");
        }
    }

    #[test]
    fn errors_render_with_retry_hint() {
        let rendered = render_error(&CatalogueError::ElementNotFound {
            selector: "div.abstract".into(),
            timeout_ms: 10_000,
        });
        assert!(rendered.starts_with("Error: "));
        assert!(rendered.contains("div.abstract"));
        assert!(rendered.ends_with("Please try again."));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_not_raised() {
        let out = tools().execute("thesis_delete", json!({})).await;
        assert!(out.starts_with("Error: "));
        assert!(out.contains("thesis_delete"));
    }

    #[tokio::test]
    async fn missing_arguments_are_reported() {
        let out = tools().execute("thesis_fetch", json!({"query": "x"})).await;
        assert!(out.contains("search_term"));
        assert!(out.ends_with("Please try again."));
    }

    #[tokio::test]
    async fn blank_search_term_is_rejected_before_launch() {
        let out = tools().execute("thesis_fetch", json!({"search_term": "   "})).await;
        assert!(out.contains("Search term cannot be empty"));
    }

    #[tokio::test]
    async fn non_http_detail_urls_are_rejected_before_launch() {
        let t = tools();
        for name in ["thesis_abstract_fetch", "thesis_retrieve_pdf_if_available"] {
            let out = t.execute(name, json!({"detail_url": "ftp://opac.crzp.sk/x"})).await;
            assert!(out.contains("http:// or https://"), "{name}: {out}");
        }
    }
}
