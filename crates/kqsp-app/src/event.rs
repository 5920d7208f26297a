//! Application input events.
//!
//! Events originate from two sources:
//! - User input lines from the frontend.
//! - Session results translated by the [`crate::Bridge`], plus the outcome
//!   of file I/O performed by the runtime.

use kqsp_client::{IncomingFile, Notice};

use crate::PeerEntry;

/// Events processed by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A line typed by the user.
    Input(String),

    /// Session status line.
    Notice(Notice),

    /// Chat text from a peer.
    TextReceived {
        /// Sender display address
        from: String,
        /// Deciphered text
        text: String,
    },

    /// Audio clip from a peer.
    AudioReceived {
        /// Sender display address
        from: String,
        /// Media type
        mime_type: String,
        /// Audio bytes
        data: Vec<u8>,
    },

    /// Unprotected file from a peer, already deciphered.
    FileReceived {
        /// Sender display address
        from: String,
        /// File name as sent
        filename: String,
        /// File contents
        data: Vec<u8>,
    },

    /// Password-protected file from a peer, still enciphered.
    ProtectedFileReceived(IncomingFile),

    /// The password attempt for the file at the head of the queue worked.
    FileUnlocked {
        /// File contents
        data: Vec<u8>,
    },

    /// The password attempt for the file at the head of the queue was wrong.
    WrongPassword,

    /// The file at the head of the queue cannot be unlocked at all.
    FileDropped {
        /// Why
        reason: String,
    },

    /// Local echo of sent text.
    TextSent {
        /// Text as typed
        text: String,
    },

    /// Local echo of a sent file.
    FileSent {
        /// File name as sent
        filename: String,
        /// Whether a password was set
        protected: bool,
    },

    /// A received file was written to disk.
    FileSaved {
        /// Sender display address
        from: String,
        /// File name
        filename: String,
        /// Where it was written
        path: String,
    },

    /// Result of `/peers`.
    Peers(Vec<PeerEntry>),

    /// Error occurred.
    Error {
        /// Error description
        message: String,
    },
}
