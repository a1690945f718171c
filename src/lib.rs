//! Thesis retrieval from the CRZP catalogue
//!
//! Drives a headless Chromium through the catalogue's search UI and RSS
//! export to list theses, reads abstracts from detail pages and downloads
//! attached PDFs. Each extraction call owns its own browser session.

mod browser;
pub mod browser_setup;
pub mod catalogue;
pub mod supervisor;
#[cfg(test)]
mod test_support;
mod tools;
mod utils;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::constants::{
    DEFAULT_ABSTRACT_SELECTOR, DEFAULT_COOKIE_CONSENT_SELECTOR, DEFAULT_DOWNLOAD_CONFIRM_SELECTOR,
    DEFAULT_HELPER_COMMAND, DEFAULT_HELPER_PACKAGE, DEFAULT_NO_RESULTS_SELECTOR,
    DEFAULT_PDF_LINK_LABEL, DEFAULT_RSS_EXPORT_SELECTOR, DEFAULT_SEARCH_INPUT_SELECTOR, DEFAULT_SEARCH_URL,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub site: SiteConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub helper: HelperConfig,
}

/// Browser security and launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features (Same-Origin Policy, etc.)
    /// WARNING: Only enable for trusted content
    #[serde(default = "default_disable_security")]
    pub disable_security: bool,

    /// Explicit Chrome/Chromium binary, skips discovery
    #[serde(default)]
    pub executable: Option<PathBuf>,

    /// Where downloaded PDFs are saved, defaults to the system temp dir
    #[serde(default)]
    pub download_dir: Option<PathBuf>,

    /// Window dimensions
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

/// Site-specific entry point and selectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_search_url")]
    pub search_url: String,

    #[serde(default = "default_search_input_selector")]
    pub search_input_selector: String,

    #[serde(default = "default_rss_export_selector")]
    pub rss_export_selector: String,

    /// Rendered instead of the result list when nothing matched
    #[serde(default = "default_no_results_selector")]
    pub no_results_selector: String,

    #[serde(default = "default_abstract_selector")]
    pub abstract_selector: String,

    /// Matched against the trimmed visible text of links, exactly
    #[serde(default = "default_pdf_link_label")]
    pub pdf_link_label: String,

    #[serde(default = "default_download_confirm_selector")]
    pub download_confirm_selector: String,

    #[serde(default = "default_cookie_consent_selector")]
    pub cookie_consent_selector: String,
}

/// Bounds for every wait point, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_navigation_ms")]
    pub navigation_ms: u64,

    #[serde(default = "default_element_ms")]
    pub element_ms: u64,

    /// No request in flight for this long counts as settled
    #[serde(default = "default_quiescence_window_ms")]
    pub quiescence_window_ms: u64,

    #[serde(default = "default_quiescence_max_ms")]
    pub quiescence_max_ms: u64,

    #[serde(default = "default_new_tab_ms")]
    pub new_tab_ms: u64,

    #[serde(default = "default_download_start_ms")]
    pub download_start_ms: u64,

    #[serde(default = "default_download_complete_ms")]
    pub download_complete_ms: u64,

    /// Upper bound for one whole extraction call
    #[serde(default = "default_session_ms")]
    pub session_ms: u64,
}

/// External PDF-to-text helper run under the process supervisor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelperConfig {
    #[serde(default = "default_helper_command")]
    pub command: String,

    #[serde(default = "default_helper_args")]
    pub args: Vec<String>,

    /// Time after spawn before the helper is assumed ready
    #[serde(default = "default_readiness_delay_ms")]
    pub readiness_delay_ms: u64,
}

fn default_headless() -> bool {
    true
}

fn default_disable_security() -> bool {
    false // SECURE BY DEFAULT
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

fn default_search_url() -> String {
    DEFAULT_SEARCH_URL.to_string()
}
fn default_search_input_selector() -> String {
    DEFAULT_SEARCH_INPUT_SELECTOR.to_string()
}
fn default_rss_export_selector() -> String {
    DEFAULT_RSS_EXPORT_SELECTOR.to_string()
}
fn default_no_results_selector() -> String {
    DEFAULT_NO_RESULTS_SELECTOR.to_string()
}
fn default_abstract_selector() -> String {
    DEFAULT_ABSTRACT_SELECTOR.to_string()
}
fn default_pdf_link_label() -> String {
    DEFAULT_PDF_LINK_LABEL.to_string()
}
fn default_download_confirm_selector() -> String {
    DEFAULT_DOWNLOAD_CONFIRM_SELECTOR.to_string()
}
fn default_cookie_consent_selector() -> String {
    DEFAULT_COOKIE_CONSENT_SELECTOR.to_string()
}

fn default_navigation_ms() -> u64 {
    30_000
}
fn default_element_ms() -> u64 {
    10_000
}
fn default_quiescence_window_ms() -> u64 {
    500
}
fn default_quiescence_max_ms() -> u64 {
    15_000
}
fn default_new_tab_ms() -> u64 {
    15_000
}
fn default_download_start_ms() -> u64 {
    30_000
}
fn default_download_complete_ms() -> u64 {
    120_000
}
fn default_session_ms() -> u64 {
    300_000
}

fn default_helper_command() -> String {
    DEFAULT_HELPER_COMMAND.to_string()
}
fn default_helper_args() -> Vec<String> {
    vec![DEFAULT_HELPER_PACKAGE.to_string()]
}
fn default_readiness_delay_ms() -> u64 {
    5_000
}

impl BrowserConfig {
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: default_disable_security(),
            executable: None,
            download_dir: None,
            window: WindowConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            search_input_selector: default_search_input_selector(),
            rss_export_selector: default_rss_export_selector(),
            no_results_selector: default_no_results_selector(),
            abstract_selector: default_abstract_selector(),
            pdf_link_label: default_pdf_link_label(),
            download_confirm_selector: default_download_confirm_selector(),
            cookie_consent_selector: default_cookie_consent_selector(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation_ms: default_navigation_ms(),
            element_ms: default_element_ms(),
            quiescence_window_ms: default_quiescence_window_ms(),
            quiescence_max_ms: default_quiescence_max_ms(),
            new_tab_ms: default_new_tab_ms(),
            download_start_ms: default_download_start_ms(),
            download_complete_ms: default_download_complete_ms(),
            session_ms: default_session_ms(),
        }
    }
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            command: default_helper_command(),
            args: default_helper_args(),
            readiness_delay_ms: default_readiness_delay_ms(),
        }
    }
}

impl Config {
    /// Load config from a YAML file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self, CatalogueError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, CatalogueError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject timeouts outside the navigation/interaction ceilings
    pub fn validate(&self) -> Result<(), CatalogueError> {
        let t = &self.timeouts;
        validate_interaction_timeout(t.element_ms)?;
        validate_interaction_timeout(t.quiescence_window_ms)?;
        for ms in [
            t.navigation_ms,
            t.quiescence_max_ms,
            t.new_tab_ms,
            t.download_start_ms,
            t.download_complete_ms,
            t.session_ms,
        ] {
            validate_navigation_timeout(ms)?;
        }
        if self.helper.command.trim().is_empty() {
            return Err(CatalogueError::Config("helper.command cannot be empty".into()));
        }
        Ok(())
    }
}

/// Load config from `$CRZP_CONFIG`, else `config.yaml` in the working
/// directory, else defaults
pub fn load_yaml_config() -> Result<Config, CatalogueError> {
    let config_path = std::env::var_os("CRZP_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yaml"));

    if config_path.exists() {
        Config::load(&config_path)
    } else {
        Ok(Config::default())
    }
}

pub use browser::{BrowserSession, with_session};
pub use browser_setup::{ensure_browser_installed, find_browser_executable, resolve_browser_executable};
pub use catalogue::{
    AbstractSet, ConsentState, ListingRecord, PdfArtifact, fetch_abstracts, format_abstracts,
    format_listing, parse_feed, parse_listing, parse_listing_line, retrieve_pdf, search_theses,
};
pub use supervisor::{ChildProcess, ProcessSpawner, ProcessSupervisor, SupervisorError, TokioSpawner};
pub use tools::{
    ThesisAbstractFetchArgs, ThesisAbstractFetchTool, ThesisFetchArgs, ThesisFetchTool,
    ThesisRetrievePdfArgs, ThesisRetrievePdfTool, ThesisTool, ThesisTools, render_error,
};
pub use utils::{CatalogueError, CatalogueResult, sanitize_filename};
use utils::{validate_interaction_timeout, validate_navigation_timeout};
