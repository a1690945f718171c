// Browser utility modules shared by the extractors
pub mod constants;
mod errors;
mod filename;
mod network_idle;
mod timeout;
mod wait_for_element;

pub use errors::{CatalogueError, CatalogueResult};
pub use filename::{reserve_unique_path, sanitize_filename};
pub use network_idle::NetworkIdleWatcher;
pub use timeout::{validate_interaction_timeout, validate_navigation_timeout};
pub use wait_for_element::{click_element, wait_for_element};
