//! Local file naming for downloaded documents
//!
//! The suggested filename comes from the remote server and is untrusted.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;

use crate::utils::constants::FALLBACK_PDF_FILENAME;

const MAX_FILENAME_BYTES: usize = 200;

/// Reduce a server-suggested filename to a single safe path component
///
/// Strips directory parts, `..`, control characters and the characters
/// reserved on Windows, trims leading/trailing dots and spaces, bounds the
/// length and guarantees an extension.
pub fn sanitize_filename(suggested: &str) -> String {
    // Last component only, whichever separator the server used
    let base = suggested
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let mut cleaned: String = base
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", ".");
    }

    let mut cleaned = cleaned
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        return FALLBACK_PDF_FILENAME.to_string();
    }

    if Path::new(&cleaned).extension().is_none() {
        cleaned.push_str(".pdf");
    }

    truncate_preserving_extension(&cleaned, MAX_FILENAME_BYTES)
}

fn truncate_preserving_extension(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }

    let (stem, ext) = match name.rfind('.') {
        Some(idx) if name.len() - idx <= 16 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    };

    let mut budget = max_bytes.saturating_sub(ext.len());
    while !stem.is_char_boundary(budget) {
        budget -= 1;
    }

    format!("{}{}", &stem[..budget], ext)
}

/// Upper bound on `-N` suffixes tried before giving up
const MAX_SUFFIX: u32 = 10_000;

/// `report.pdf`, then `report-1.pdf`, `report-2.pdf`, ...
fn candidate_names(filename: &str) -> impl Iterator<Item = String> + '_ {
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    std::iter::once(filename.to_string())
        .chain((1..=MAX_SUFFIX).map(move |n| format!("{}-{}{}", stem, n, ext)))
}

/// Claim the first free name for `filename` in `dir`
///
/// The name is reserved by creating an empty file with `create_new`, so
/// concurrent callers never receive the same path. The caller replaces the
/// placeholder with the real content.
pub async fn reserve_unique_path(dir: &Path, filename: &str) -> io::Result<PathBuf> {
    for name in candidate_names(filename) {
        let candidate = dir.join(name);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("No free name for {} in {}", filename, dir.display()),
    ))
}
