//! Terminal driver for the chat client.
//!
//! Implements the [`Driver`] trait with line-oriented stdin for input, plain
//! stdout for the transcript and a TCP [`RelayConnection`] for the network.
//! Received files land in the download directory.

use std::{
    io::{self, Stdout, Write},
    path::{Path, PathBuf},
};

use kqsp_app::{App, Driver, DriverEvent, LineKind, TranscriptLine, safe_filename};
use kqsp_client::transport::{RelayConnection, TransportError};
use kqsp_proto::relay::ClientFrame;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

/// Terminal driver errors.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// I/O error from terminal or file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The relay connection task is gone.
    #[error("relay connection closed")]
    ChannelSend,
}

/// Terminal driver implementing the [`Driver`] trait.
///
/// Generic over its input and output so tests can script a session.
pub struct TerminalDriver<R = BufReader<Stdin>, W = Stdout> {
    lines: Lines<R>,
    output: W,
    connection: RelayConnection,
    download_dir: PathBuf,
    printed: usize,
}

impl TerminalDriver {
    /// Create a driver on stdin and stdout.
    pub fn new(connection: RelayConnection, download_dir: PathBuf) -> Self {
        Self::with_io(BufReader::new(tokio::io::stdin()), io::stdout(), connection, download_dir)
    }
}

impl<R, W> TerminalDriver<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    /// Create a driver on explicit input and output.
    pub fn with_io(
        input: R,
        output: W,
        connection: RelayConnection,
        download_dir: PathBuf,
    ) -> Self {
        Self { lines: input.lines(), output, connection, download_dir, printed: 0 }
    }

    /// The transcript sink.
    pub fn output(&self) -> &W {
        &self.output
    }
}

impl<R, W> Driver for TerminalDriver<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    type Error = TerminalError;

    async fn next_event(&mut self) -> Result<Option<DriverEvent>, Self::Error> {
        tokio::select! {
            biased;

            // Relay events before input
            event = self.connection.from_relay.recv() => Ok(event.map(DriverEvent::Session)),

            line = self.lines.next_line() => Ok(line?.map(DriverEvent::Input)),
        }
    }

    async fn send_frame(&mut self, frame: ClientFrame) -> Result<(), Self::Error> {
        self.connection.to_relay.send(frame).await.map_err(|_| TerminalError::ChannelSend)
    }

    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, Self::Error> {
        Ok(std::fs::read(path)?)
    }

    fn save_file(&mut self, filename: &str, data: &[u8]) -> Result<String, Self::Error> {
        std::fs::create_dir_all(&self.download_dir)?;
        let path = unique_path(&self.download_dir, &safe_filename(filename));
        std::fs::write(&path, data)?;
        Ok(path.display().to_string())
    }

    fn render(&mut self, app: &App) -> Result<(), Self::Error> {
        let transcript = app.transcript();
        for line in transcript.iter().skip(self.printed) {
            writeln!(self.output, "{}", format_line(line))?;
        }
        self.printed = transcript.len();
        self.output.flush()?;
        Ok(())
    }

    fn stop(&mut self) {
        self.connection.stop();
    }
}

impl<R, W> Drop for TerminalDriver<R, W> {
    fn drop(&mut self) {
        self.connection.stop();
    }
}

/// Render one transcript line for a plain terminal.
pub fn format_line(line: &TranscriptLine) -> String {
    match line.kind {
        LineKind::Local | LineKind::Remote => line.text.clone(),
        LineKind::System => format!("[*] {}", line.text),
        LineKind::Error => format!("[!] {}", line.text),
    }
}

/// First path under `dir` for `filename` that does not exist yet.
///
/// Collisions get ` (n)` before the extension: `a.txt`, `a (1).txt`, ...
pub fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(filename);
    let stem = name.file_stem().and_then(|s| s.to_str()).unwrap_or(filename);
    let extension = name.extension().and_then(|e| e.to_str());

    (1..=u16::MAX)
        .map(|n| match extension {
            Some(ext) => dir.join(format!("{stem} ({n}).{ext}")),
            None => dir.join(format!("{stem} ({n})")),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}
