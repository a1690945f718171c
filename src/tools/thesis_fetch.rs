//! `thesis_fetch` - search the catalogue and list matching theses

use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::ThesisTool;
use crate::Config;
use crate::catalogue::{format_listing, search_theses};
use crate::utils::CatalogueResult;

#[derive(Debug, Clone, Deserialize)]
pub struct ThesisFetchArgs {
    pub search_term: String,
}

#[derive(Clone)]
pub struct ThesisFetchTool {
    config: Arc<Config>,
}

impl ThesisFetchTool {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

impl ThesisTool for ThesisFetchTool {
    type Args = ThesisFetchArgs;

    fn name() -> &'static str {
        "thesis_fetch"
    }

    fn description() -> &'static str {
        "Search https://opac.crzp.sk for diploma, bachelor and doctoral theses matching a word.\n\n\
         Returns one line per thesis as `title|description|detail URL`, preceded by a \
         `Title|Description|Detail URL` header line. The detail URL is the input for \
         thesis_abstract_fetch and thesis_retrieve_pdf_if_available.\n\n\
         Example: thesis_fetch({\"search_term\": \"strojové učenie\"})"
    }

    fn input_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "search_term": {
                    "type": "string",
                    "description": "Word or phrase typed into the catalogue search box"
                }
            },
            "required": ["search_term"]
        })
    }

    async fn execute(&self, args: Self::Args) -> CatalogueResult<String> {
        let records = search_theses(&self.config, &args.search_term).await?;
        Ok(format_listing(&records))
    }
}
