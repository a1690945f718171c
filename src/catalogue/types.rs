//! Records produced by the extractors

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One thesis listing taken from a feed item
///
/// Fields are single-line and never contain the `|` column separator, so
/// a record always renders as exactly one three-column listing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub title: String,
    pub description: String,
    pub detail_url: String,
}

impl ListingRecord {
    pub fn new(
        title: impl AsRef<str>,
        description: impl AsRef<str>,
        detail_url: impl AsRef<str>,
    ) -> Self {
        Self {
            title: normalize_field(title.as_ref()),
            description: normalize_field(description.as_ref()),
            detail_url: normalize_field(detail_url.as_ref()),
        }
    }
}

/// Trim and flatten a field onto one line without the column separator
fn normalize_field(raw: &str) -> String {
    raw.split(|c: char| c == '|' || c == '\n' || c == '\r')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Abstract text blocks of one detail page, in DOM order
///
/// The site renders the primary-language abstract first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbstractSet(Vec<String>);

impl AbstractSet {
    pub fn new(blocks: Vec<String>) -> Self {
        Self(blocks)
    }

    pub fn primary(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn blocks(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

/// Outcome of a PDF retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum PdfArtifact {
    /// Absolute path of the downloaded file; the caller owns cleanup
    Downloaded(PathBuf),
    /// The detail page offers no PDF
    Absent,
}

impl PdfArtifact {
    pub fn path(&self) -> Option<&Path> {
        match self {
            PdfArtifact::Downloaded(path) => Some(path),
            PdfArtifact::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, PdfArtifact::Absent)
    }
}

impl fmt::Display for PdfArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdfArtifact::Downloaded(path) => write!(f, "{}", path.display()),
            PdfArtifact::Absent => write!(f, "No PDF available"),
        }
    }
}

/// Cookie-consent banner as seen by a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentState {
    Absent,
    Hidden,
    Visible,
}

impl ConsentState {
    /// Map the check script's answer; anything unexpected counts as absent
    pub fn from_script(value: &str) -> Self {
        match value {
            "visible" => ConsentState::Visible,
            "hidden" => ConsentState::Hidden,
            _ => ConsentState::Absent,
        }
    }

    /// Only a visible banner is clicked away
    pub fn needs_dismissal(self) -> bool {
        self == ConsentState::Visible
    }
}
