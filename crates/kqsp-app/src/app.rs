//! Application state machine.
//!
//! [`App`] owns the chat transcript and the queue of protected files waiting
//! for a password, completely decoupled from I/O and protocol mechanics. It
//! consumes [`crate::AppEvent`] inputs and produces [`crate::AppAction`]
//! instructions for the runtime to execute.
//!
//! # Password prompts
//!
//! Protected files are queued in arrival order. While the queue is not
//! empty, every input line is a password attempt for its head; a blank line
//! or `/cancel` abandons that file and moves on to the next. Other traffic
//! keeps flowing into the transcript meanwhile.

use std::collections::VecDeque;

use kqsp_client::{IncomingFile, Notice, PeerId};

use crate::{
    AppAction, AppEvent, LineKind, PeerEntry, TranscriptLine,
    command::{Command, CommandError, HELP},
    state::{audio_extension, safe_filename},
};

/// Application state machine.
#[derive(Debug, Clone, Default)]
pub struct App {
    /// Local peer id and display address, once known.
    identity: Option<(PeerId, String)>,
    /// Peer to connect to as soon as the identity opens.
    auto_connect: Option<PeerId>,
    /// Everything shown so far.
    transcript: Vec<TranscriptLine>,
    /// Protected files waiting for a password, head first.
    pending_files: VecDeque<IncomingFile>,
    /// Open links as last reported.
    connections: usize,
    /// Audio clips received, for naming saved clips.
    audio_clips: u32,
}

impl App {
    /// Create an empty app.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to `peer` once the identity is ready.
    #[must_use]
    pub fn with_auto_connect(mut self, peer: PeerId) -> Self {
        self.auto_connect = Some(peer);
        self
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: AppEvent) -> Vec<AppAction> {
        match event {
            AppEvent::Input(line) => self.handle_input(&line),
            AppEvent::Notice(notice) => self.handle_notice(notice),
            AppEvent::TextReceived { from, text } => {
                self.push(LineKind::Remote, format!("{from}: {text}"))
            },
            AppEvent::AudioReceived { from, mime_type, data } => {
                self.audio_clips += 1;
                let extension = audio_extension(&mime_type);
                let filename = format!("audio-{}.{extension}", self.audio_clips);
                self.line(LineKind::Remote, format!("{from} sent an audio clip ({mime_type})"));
                vec![AppAction::SaveFile { from, filename, data }, AppAction::Render]
            },
            AppEvent::FileReceived { from, filename, data } => {
                let filename = safe_filename(&filename);
                self.line(LineKind::Remote, format!("{from} sent file {filename}"));
                vec![AppAction::SaveFile { from, filename, data }, AppAction::Render]
            },
            AppEvent::ProtectedFileReceived(file) => {
                self.line(
                    LineKind::Remote,
                    format!("{} sent password-protected file {}", file.from, file.filename),
                );
                self.pending_files.push_back(file);
                if self.pending_files.len() == 1 {
                    self.prompt_head();
                }
                vec![AppAction::Render]
            },
            AppEvent::FileUnlocked { data } => {
                let Some(file) = self.pending_files.pop_front() else {
                    return vec![];
                };
                self.prompt_head();
                let filename = safe_filename(&file.filename);
                vec![AppAction::SaveFile { from: file.from, filename, data }, AppAction::Render]
            },
            AppEvent::WrongPassword => {
                let Some(file) = self.pending_files.front() else {
                    return vec![];
                };
                let text = format!(
                    "Wrong password for {}. Try again (empty line or /cancel to skip):",
                    file.filename
                );
                self.push(LineKind::Error, text)
            },
            AppEvent::FileDropped { reason } => {
                if let Some(file) = self.pending_files.pop_front() {
                    self.line(LineKind::Error, format!("Dropped {}: {reason}", file.filename));
                }
                self.prompt_head();
                vec![AppAction::Render]
            },
            AppEvent::TextSent { text } => self.push(LineKind::Local, format!("You: {text}")),
            AppEvent::FileSent { filename, protected } => {
                let suffix = if protected { " (password protected)" } else { "" };
                self.push(LineKind::Local, format!("You sent file: {filename}{suffix}"))
            },
            AppEvent::FileSaved { from, filename, path } => {
                self.push(LineKind::System, format!("Saved {filename} from {from} to {path}"))
            },
            AppEvent::Peers(entries) => self.handle_peers(&entries),
            AppEvent::Error { message } => self.push(LineKind::Error, format!("Error: {message}")),
        }
    }

    fn handle_input(&mut self, line: &str) -> Vec<AppAction> {
        if !self.pending_files.is_empty() && line.trim() != "/quit" {
            return self.handle_password(line);
        }

        match Command::parse(line) {
            Ok(None) => vec![],
            Ok(Some(command)) => self.handle_command(command),
            Err(err @ CommandError::Unknown { .. }) => {
                self.line(LineKind::Error, err.to_string());
                for help in HELP {
                    self.line(LineKind::System, *help);
                }
                vec![AppAction::Render]
            },
            Err(err) => self.push(LineKind::Error, err.to_string()),
        }
    }

    fn handle_password(&mut self, line: &str) -> Vec<AppAction> {
        let password = line.trim_end_matches(['\r', '\n']);
        let Some(file) = self.pending_files.front() else {
            return vec![];
        };

        if password.trim().is_empty() || password.trim() == "/cancel" {
            let filename = file.filename.clone();
            self.pending_files.pop_front();
            self.line(LineKind::System, format!("Cancelled receiving {filename}"));
            self.prompt_head();
            return vec![AppAction::Render];
        }

        vec![AppAction::UnlockFile { file: file.clone(), password: password.to_owned() }]
    }

    fn handle_command(&mut self, command: Command) -> Vec<AppAction> {
        match command {
            Command::Connect(peer) => {
                self.line(LineKind::System, format!("Connecting to {peer}..."));
                vec![AppAction::Connect { peer }, AppAction::Render]
            },
            Command::Disconnect(peer) => vec![AppAction::Disconnect { peer }],
            Command::Peers => vec![AppAction::ListPeers],
            Command::MyId => {
                let text = match &self.identity {
                    Some((id, display)) => format!("Your K(addr): {display}  Peer ID: {id}"),
                    None => "Identity not ready yet".to_owned(),
                };
                self.push(LineKind::System, text)
            },
            Command::File { path, password } => vec![AppAction::SendFile { path, password }],
            Command::Cancel => self.push(LineKind::System, "Nothing to cancel"),
            Command::Help => {
                for help in HELP {
                    self.line(LineKind::System, *help);
                }
                vec![AppAction::Render]
            },
            Command::Quit => vec![AppAction::Quit],
            Command::Text(text) => vec![AppAction::SendText { text }],
        }
    }

    fn handle_notice(&mut self, notice: Notice) -> Vec<AppAction> {
        match &notice {
            Notice::Ignored { .. } => return vec![],
            Notice::IdentityReady { id, display } => {
                self.identity = Some((id.clone(), display.clone()));
            },
            Notice::PeerConnected { connections, .. }
            | Notice::PeerDisconnected { connections, .. } => {
                self.connections = *connections;
            },
            Notice::IdentityClosed => self.connections = 0,
            Notice::SignalingLost
            | Notice::SignalingRestored
            | Notice::IdentityError { .. }
            | Notice::IncomingPeer { .. }
            | Notice::ConnectionFailed { .. }
            | Notice::DecodeFailed { .. }
            | Notice::PeerSystemMessage { .. } => {},
        }

        let kind = match notice {
            Notice::IdentityError { .. }
            | Notice::ConnectionFailed { .. }
            | Notice::DecodeFailed { .. } => LineKind::Error,
            Notice::PeerSystemMessage { .. } => LineKind::Remote,
            _ => LineKind::System,
        };
        self.line(kind, notice.to_string());

        let mut actions = Vec::new();
        if matches!(notice, Notice::IdentityReady { .. })
            && let Some(peer) = self.auto_connect.take()
        {
            self.line(LineKind::System, format!("Connecting to {peer}..."));
            actions.push(AppAction::Connect { peer });
        }
        actions.push(AppAction::Render);
        actions
    }

    fn handle_peers(&mut self, entries: &[PeerEntry]) -> Vec<AppAction> {
        if entries.is_empty() {
            return self.push(LineKind::System, "No peers connected");
        }
        self.line(LineKind::System, format!("Peers ({}):", entries.len()));
        for entry in entries {
            let state = if entry.open { "open" } else { "connecting" };
            self.line(LineKind::System, format!("  {} ({state})", entry.peer));
        }
        vec![AppAction::Render]
    }

    fn prompt_head(&mut self) {
        if let Some(file) = self.pending_files.front() {
            let text = format!(
                "Enter password for {} from {} (empty line or /cancel to skip):",
                file.filename, file.from
            );
            self.line(LineKind::System, text);
        }
    }

    fn line(&mut self, kind: LineKind, text: impl Into<String>) {
        self.transcript.push(TranscriptLine::new(kind, text));
    }

    fn push(&mut self, kind: LineKind, text: impl Into<String>) -> Vec<AppAction> {
        self.line(kind, text);
        vec![AppAction::Render]
    }

    /// Every line shown so far.
    pub fn transcript(&self) -> &[TranscriptLine] {
        &self.transcript
    }

    /// Local peer id and display address, once the identity is ready.
    pub fn identity(&self) -> Option<(&PeerId, &str)> {
        self.identity.as_ref().map(|(id, display)| (id, display.as_str()))
    }

    /// Protected file currently prompting for a password.
    pub fn awaiting_password(&self) -> Option<&IncomingFile> {
        self.pending_files.front()
    }

    /// Protected files queued, including the one prompting.
    pub fn pending_file_count(&self) -> usize {
        self.pending_files.len()
    }

    /// Open links as last reported by the session.
    pub fn connections(&self) -> usize {
        self.connections
    }
}
