//! `thesis_abstract_fetch` - abstracts of one thesis

use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::ThesisTool;
use crate::Config;
use crate::catalogue::{fetch_abstracts, format_abstracts};
use crate::utils::CatalogueResult;

#[derive(Debug, Clone, Deserialize)]
pub struct ThesisAbstractFetchArgs {
    pub detail_url: String,
}

#[derive(Clone)]
pub struct ThesisAbstractFetchTool {
    config: Arc<Config>,
}

impl ThesisAbstractFetchTool {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

impl ThesisTool for ThesisAbstractFetchTool {
    type Args = ThesisAbstractFetchArgs;

    fn name() -> &'static str {
        "thesis_abstract_fetch"
    }

    fn description() -> &'static str {
        "Read the abstracts from a thesis detail page on https://opac.crzp.sk.\n\n\
         Returns an `Abstract` header followed by every abstract block in page order. \
         The first block is the abstract in the thesis' primary language; the next one \
         is usually its English version.\n\n\
         Example: thesis_abstract_fetch({\"detail_url\": \"https://opac.crzp.sk/?fn=detailBiblioForm&sid=...\"})"
    }

    fn input_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "detail_url": {
                    "type": "string",
                    "description": "Detail URL from a thesis_fetch result line"
                }
            },
            "required": ["detail_url"]
        })
    }

    async fn execute(&self, args: Self::Args) -> CatalogueResult<String> {
        let abstracts = fetch_abstracts(&self.config, &args.detail_url).await?;
        Ok(format_abstracts(&abstracts))
    }
}
