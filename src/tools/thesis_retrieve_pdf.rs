//! `thesis_retrieve_pdf_if_available` - download a thesis PDF when offered

use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::ThesisTool;
use crate::Config;
use crate::catalogue::{PdfArtifact, retrieve_pdf};
use crate::utils::CatalogueResult;

#[derive(Debug, Clone, Deserialize)]
pub struct ThesisRetrievePdfArgs {
    pub detail_url: String,
}

#[derive(Clone)]
pub struct ThesisRetrievePdfTool {
    config: Arc<Config>,
}

impl ThesisRetrievePdfTool {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

impl ThesisTool for ThesisRetrievePdfTool {
    type Args = ThesisRetrievePdfArgs;

    fn name() -> &'static str {
        "thesis_retrieve_pdf_if_available"
    }

    fn description() -> &'static str {
        "Download the full-text PDF of a thesis from its https://opac.crzp.sk detail page.\n\n\
         Returns the absolute path of the saved PDF, or `No PDF available` when the \
         catalogue offers no download for this thesis. The saved file can be handed to \
         the PDF-to-text helper.\n\n\
         Example: thesis_retrieve_pdf_if_available({\"detail_url\": \"https://opac.crzp.sk/?fn=detailBiblioForm&sid=...\"})"
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
        let artifact: PdfArtifact = retrieve_pdf(&self.config, &args.detail_url).await?;
        Ok(artifact.to_string())
    }
}
