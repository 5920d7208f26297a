//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` provides the same interface as the terminal driver but for
//! deterministic testing. It implements [`Driver`] so the same
//! [`kqsp_app::Runtime`] orchestration code runs in both production and
//! simulation.

use std::collections::{BTreeMap, VecDeque};

use kqsp_app::{App, Driver, DriverEvent};
use kqsp_client::SessionEvent;
use kqsp_proto::relay::ClientFrame;

/// Error type for simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

/// Simulation driver for deterministic testing.
///
/// Replays a script of input lines and session events, captures outgoing
/// frames and keeps files in memory.
#[derive(Debug, Default)]
pub struct SimDriver {
    script: VecDeque<DriverEvent>,
    sent: Vec<ClientFrame>,
    disk: BTreeMap<String, Vec<u8>>,
    saved: Vec<(String, Vec<u8>)>,
    renders: usize,
    stopped: bool,
}

impl SimDriver {
    /// Create a new simulation driver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a typed line.
    pub fn inject_input(&mut self, line: &str) {
        self.script.push_back(DriverEvent::Input(line.to_owned()));
    }

    /// Queue a relay event.
    pub fn inject_session(&mut self, event: SessionEvent) {
        self.script.push_back(DriverEvent::Session(event));
    }

    /// Make a file readable by `/file`.
    pub fn put_file(&mut self, path: &str, data: &[u8]) {
        self.disk.insert(path.to_owned(), data.to_vec());
    }

    /// Take all captured outgoing frames.
    pub fn take_outgoing(&mut self) -> Vec<ClientFrame> {
        std::mem::take(&mut self.sent)
    }

    /// Files written so far as `(name, contents)`.
    pub fn saved(&self) -> &[(String, Vec<u8>)] {
        &self.saved
    }

    /// Number of renders requested.
    pub fn renders(&self) -> usize {
        self.renders
    }

    /// Whether the runtime stopped the driver.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Check if there are scripted events left.
    pub fn has_pending(&self) -> bool {
        !self.script.is_empty()
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;

    async fn next_event(&mut self) -> Result<Option<DriverEvent>, Self::Error> {
        Ok(self.script.pop_front())
    }

    async fn send_frame(&mut self, frame: ClientFrame) -> Result<(), Self::Error> {
        if self.stopped {
            return Err(SimDriverError("driver stopped".into()));
        }
        self.sent.push(frame);
        Ok(())
    }

    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, Self::Error> {
        self.disk.get(path).cloned().ok_or_else(|| SimDriverError(format!("no such file {path}")))
    }

    fn save_file(&mut self, filename: &str, data: &[u8]) -> Result<String, Self::Error> {
        self.saved.push((filename.to_owned(), data.to_vec()));
        Ok(format!("sim://{filename}"))
    }

    fn render(&mut self, _app: &App) -> Result<(), Self::Error> {
        self.renders += 1;
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}
