//! Source path classification for imports.
//!
//! Accepted inputs are Google Docs/Sheets/Slides URLs, Drive file URLs and
//! `gs://` objects. Docs and Drive URLs are normalized to the Drive file-view
//! form the import API understands.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static DOCS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https://docs\.google\.com/(?:document|spreadsheets|presentation)/d/([a-zA-Z0-9_-]+)(?:/|$)",
    )
    .expect("valid regex")
});

static DRIVE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://drive\.google\.com/(?:file/d/|open\?id=)([a-zA-Z0-9_-]+)(?:/|$)")
        .expect("valid regex")
});

const GCS_PREFIX: &str = "gs://";

/// Outcome of classifying a batch of source paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedSources {
    /// Paths to import, already normalized, in input order.
    pub valid: Vec<String>,
    /// Rejected inputs, each suffixed with the reason.
    pub invalid: Vec<String>,
    /// `"{input} -> {normalized}"` for every rewritten path.
    pub conversions: Vec<String>,
}

pub fn drive_view_url(file_id: &str) -> String {
    format!("https://drive.google.com/file/d/{}/view", file_id)
}

/// Drive file id of a Drive or Docs URL, if it is one.
pub fn drive_file_id(url: &str) -> Option<String> {
    DRIVE_URL
        .captures(url)
        .or_else(|| DOCS_URL.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn normalize_sources(paths: &[String]) -> NormalizedSources {
    let mut out = NormalizedSources::default();

    for path in paths {
        if path.is_empty() {
            out.invalid.push(format!("{:?} (not a valid string)", path));
            continue;
        }

        if let Some(file_id) = DOCS_URL.captures(path).and_then(|caps| caps.get(1)) {
            let url = drive_view_url(file_id.as_str());
            out.conversions.push(format!("{} -> {}", path, url));
            out.valid.push(url);
            continue;
        }

        if let Some(file_id) = DRIVE_URL.captures(path).and_then(|caps| caps.get(1)) {
            let url = drive_view_url(file_id.as_str());
            if url != *path {
                out.conversions.push(format!("{} -> {}", path, url));
            }
            out.valid.push(url);
            continue;
        }

        if path.starts_with(GCS_PREFIX) {
            out.valid.push(path.clone());
            continue;
        }

        out.invalid.push(format!("{} (not a valid path)", path));
    }

    tracing::debug!(
        valid = out.valid.len(),
        invalid = out.invalid.len(),
        conversions = out.conversions.len(),
        "Classified import sources"
    );
    out
}
