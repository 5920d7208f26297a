//! Observable application state types.
//!
//! The view model a frontend renders: transcript lines and peer listings,
//! without any key material.

use std::path::Path;

use kqsp_core::PeerId;

/// Origin of a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Echo of something the local user sent.
    Local,
    /// Content from a peer.
    Remote,
    /// Status and prompts.
    System,
    /// Failures.
    Error,
}

/// One line of the chat transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    /// Origin
    pub kind: LineKind,
    /// Rendered text
    pub text: String,
}

impl TranscriptLine {
    /// Create a line.
    pub fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self { kind, text: text.into() }
    }
}

/// A peer link as listed by `/peers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEntry {
    /// Remote peer id
    pub peer: PeerId,
    /// Whether the link is open (otherwise still connecting)
    pub open: bool,
}

/// Reduce a peer-supplied file name to a bare name safe to create in the
/// download directory.
pub fn safe_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    match Path::new(base).file_name().and_then(|n| n.to_str()) {
        Some(name) if !name.is_empty() && name != "." && name != ".." => name.to_owned(),
        _ => "download".to_owned(),
    }
}

/// File extension for a media type, e.g. `audio/webm;codecs=opus` → `webm`.
pub fn audio_extension(mime_type: &str) -> &str {
    mime_type
        .split(';')
        .next()
        .and_then(|essence| essence.split('/').nth(1))
        .map(str::trim)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin")
}
