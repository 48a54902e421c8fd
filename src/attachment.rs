use std::fs;

use mime_guess::mime::{self, Mime};

use crate::error::MailerError;
use crate::remote::{self, RemoteSessionRegistry};

/// Suffixes that signal a content-encoding transform (compression), meaning
/// the guessed media type would not describe the actual byte stream.
const ENCODING_SUFFIXES: &[&str] = &[
    ".gz", ".bz2", ".xz", ".z", ".br", ".zst", ".tgz", ".tbz2", ".txz",
];

/// Attachment references as supplied by the caller: either bare locators
/// (attached under their own name) or locator/display-name pairs.
#[derive(Debug, Clone)]
pub enum Attachments {
    Paths(Vec<String>),
    Named(Vec<(String, String)>),
}

impl Attachments {
    pub fn none() -> Self {
        Attachments::Paths(Vec::new())
    }

    /// Normalize to locator/display-name pairs, preserving caller order.
    pub fn into_named(self) -> Vec<(String, String)> {
        match self {
            Attachments::Paths(paths) => {
                paths.into_iter().map(|path| (path.clone(), path)).collect()
            }
            Attachments::Named(pairs) => pairs,
        }
    }
}

impl Default for Attachments {
    fn default() -> Self {
        Attachments::none()
    }
}

impl From<Vec<String>> for Attachments {
    fn from(paths: Vec<String>) -> Self {
        Attachments::Paths(paths)
    }
}

impl From<Vec<&str>> for Attachments {
    fn from(paths: Vec<&str>) -> Self {
        Attachments::Paths(paths.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<(String, String)>> for Attachments {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Attachments::Named(pairs)
    }
}

impl From<Vec<(&str, &str)>> for Attachments {
    fn from(pairs: Vec<(&str, &str)>) -> Self {
        Attachments::Named(
            pairs
                .into_iter()
                .map(|(locator, name)| (locator.to_string(), name.to_string()))
                .collect(),
        )
    }
}

/// One attachment with its bytes already in hand, ready to become a message
/// part.
#[derive(Debug, Clone)]
pub struct ResolvedAttachment {
    /// Filename exposed in the outgoing message.
    pub filename: String,
    /// MIME essence, e.g. `application/pdf`.
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Infer the MIME type for a locator from its name.
///
/// Falls back to `application/octet-stream` when the name is unrecognized or
/// carries a compression suffix.
pub fn content_type_for(locator: &str) -> Mime {
    let lower = locator.to_ascii_lowercase();
    if ENCODING_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix)) {
        return mime::APPLICATION_OCTET_STREAM;
    }

    mime_guess::from_path(locator)
        .first()
        .unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

pub fn is_url(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

/// Resolve a locator to raw bytes.
///
/// Sources are tried by kind: HTTP(S) for URL locators, then the registered
/// SFTP sessions in registration order, and the local filesystem only when no
/// sessions are registered. `Ok(None)` means the locator was not found on any
/// applicable non-terminal source; a local read is the terminal fallback, so
/// its failures propagate.
pub fn resolve_contents(
    locator: &str,
    registry: &RemoteSessionRegistry,
    http: &reqwest::blocking::Client,
) -> Result<Option<Vec<u8>>, MailerError> {
    if is_url(locator) {
        return fetch_url(locator, http);
    }

    if !registry.is_empty() {
        for (label, opts) in registry.iter() {
            log::debug!("attempting to retrieve {} from sftp {:?}", locator, label);
            match remote::fetch(opts, locator) {
                Ok(contents) => return Ok(Some(contents)),
                Err(e) => log::warn!("{} not available from {}: {}", locator, opts.host, e),
            }
        }
        return Ok(None);
    }

    log::debug!("retrieving {} from the local file system", locator);
    Ok(Some(fs::read(locator)?))
}

fn fetch_url(
    url: &str,
    http: &reqwest::blocking::Client,
) -> Result<Option<Vec<u8>>, MailerError> {
    let response = http
        .get(url)
        .send()
        .map_err(|e| MailerError::Transport(format!("GET {} failed: {}", url, e)))?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        log::warn!("could not retrieve {}: status {}", url, status);
        return Ok(None);
    }

    let contents = response
        .bytes()
        .map_err(|e| MailerError::Transport(format!("reading body of {} failed: {}", url, e)))?;
    Ok(Some(contents.to_vec()))
}
