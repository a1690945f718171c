//! Shared configuration constants for the catalogue tools
//!
//! Default values used throughout the codebase so the site-specific
//! strings live in one place. Every selector here can be overridden
//! through `config.yaml`.

/// Chrome user agent string presented to the catalogue
///
/// Updated: 2025-01-29 to Chrome 132 (current stable)
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Advanced search entry point of the CRZP catalogue
pub const DEFAULT_SEARCH_URL: &str =
    "https://opac.crzp.sk/?seo=CRZP-H%C4%BEadanie&fn=AdvancedSearchChildQ17GQP";

/// Free-text search box on the search page
pub const DEFAULT_SEARCH_INPUT_SELECTOR: &str = r#"input[placeholder="Zadajte text pre hľadanie..."]"#;

/// Result-list affordance that opens the RSS export in a new tab
pub const DEFAULT_RSS_EXPORT_SELECTOR: &str = r#"a[href*="rss"], a[title*="RSS"]"#;

/// Notice shown in place of the result list when nothing matched
pub const DEFAULT_NO_RESULTS_SELECTOR: &str = "div.alert-info, .no-results";

/// Abstract blocks on a detail page, primary language first
pub const DEFAULT_ABSTRACT_SELECTOR: &str = "div.abstract, div.abstrakt";

/// Exact visible label of the PDF download link on a detail page
pub const DEFAULT_PDF_LINK_LABEL: &str = "Stiahnuť PDF";

/// Second-step control that actually starts the download
pub const DEFAULT_DOWNLOAD_CONFIRM_SELECTOR: &str = r#"a[download], a.btn-primary[href*="download"]"#;

/// Accept button of the cookie-consent banner
pub const DEFAULT_COOKIE_CONSENT_SELECTOR: &str = "#cookie-consent-accept, button.cookie-accept";

/// Helper launched by the process supervisor (PDF-to-text MCP server)
pub const DEFAULT_HELPER_COMMAND: &str = "uvx";
pub const DEFAULT_HELPER_PACKAGE: &str = "pymupdf4llm-mcp@latest";

/// Fallback local name when the server suggests nothing usable
pub const FALLBACK_PDF_FILENAME: &str = "thesis.pdf";

/// Attribute used to tag elements located by script so they can be
/// re-queried through CSS
pub const MARKER_ATTRIBUTE: &str = "data-crzp-target";
