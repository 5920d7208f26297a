//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the application runtime from specific I/O
//! implementations. Each frontend implements the trait to provide
//! platform-specific I/O, while the generic [`crate::Runtime`] handles all
//! orchestration.

use std::future::Future;

use kqsp_client::SessionEvent;
use kqsp_proto::relay::ClientFrame;

use crate::App;

/// Input the driver hands to the runtime.
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// A line typed by the user.
    Input(String),
    /// Something the relay reported.
    Session(SessionEvent),
}

/// Abstracts I/O operations for the application runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`Runtime`](crate::Runtime) handles orchestration logic, so the same
/// orchestration code runs in the terminal client and in simulation.
///
/// # Implementations
///
/// - **Terminal**: stdin lines and a TCP relay connection
/// - **Simulation**: scripted input and captured frames
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Wait for the next input event.
    ///
    /// Returns `None` once both input and relay are exhausted.
    fn next_event(
        &mut self,
    ) -> impl Future<Output = Result<Option<DriverEvent>, Self::Error>> + Send;

    /// Send a frame to the relay.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay connection is gone.
    fn send_frame(
        &mut self,
        frame: ClientFrame,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Read a file to send.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, Self::Error>;

    /// Store a received file and return where it went.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn save_file(&mut self, filename: &str, data: &[u8]) -> Result<String, Self::Error>;

    /// Render the application state.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&mut self, app: &App) -> Result<(), Self::Error>;

    /// Stop the relay connection and clean up resources.
    fn stop(&mut self);
}
