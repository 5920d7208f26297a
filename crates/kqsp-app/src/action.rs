//! Application side-effects and intents.
//!
//! [`AppAction`]s are produced by the [`crate::App`] state machine for the
//! runtime to execute.

use kqsp_client::{IncomingFile, PeerId};

/// Actions produced by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Render the transcript.
    Render,

    /// Quit the application.
    Quit,

    /// Open a link to a peer.
    Connect {
        /// Target peer id
        peer: PeerId,
    },

    /// Close the link to a peer.
    Disconnect {
        /// Linked peer id
        peer: PeerId,
    },

    /// Send chat text to every open link.
    SendText {
        /// Text as typed
        text: String,
    },

    /// Read a file from disk and send it to every open link.
    SendFile {
        /// Path on disk
        path: String,
        /// Optional password
        password: Option<String>,
    },

    /// List peer links.
    ListPeers,

    /// Try one password on a protected file.
    UnlockFile {
        /// The file
        file: IncomingFile,
        /// Candidate password
        password: String,
    },

    /// Write a received file to the download directory.
    SaveFile {
        /// Sender display address
        from: String,
        /// Bare file name
        filename: String,
        /// Contents
        data: Vec<u8>,
    },
}
