//! Generic runtime for application orchestration.
//!
//! The Runtime drives the application event loop, coordinating between:
//! - [`App`]: transcript and prompt state machine
//! - [`Bridge`]: bridge to the session
//! - [`Driver`]: platform-specific I/O

use std::path::Path;

use kqsp_client::{Cipher, XorCipher};

use crate::{App, AppAction, AppEvent, Bridge, Driver, DriverEvent};

/// Generic runtime that orchestrates App, Bridge, and Driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
/// - `C`: Cipher used by the session
pub struct Runtime<D, C = XorCipher>
where
    D: Driver,
    C: Cipher,
{
    driver: D,
    app: App,
    bridge: Bridge<C>,
}

impl<D, C> Runtime<D, C>
where
    D: Driver,
    C: Cipher + Send,
{
    /// Create a runtime from its parts.
    pub fn new(driver: D, app: App, bridge: Bridge<C>) -> Self {
        Self { driver, app, bridge }
    }

    /// Run the main event loop until the user quits, the identity is
    /// destroyed, or the driver runs dry.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error. File read and
    /// write failures are reported in the transcript instead.
    pub async fn run(mut self) -> Result<Self, D::Error> {
        self.driver.render(&self.app)?;

        while let Some(event) = self.driver.next_event().await? {
            if self.handle_event(event).await? || self.bridge.is_destroyed() {
                break;
            }
        }

        self.shutdown().await?;
        Ok(self)
    }

    /// Process one driver event.
    ///
    /// Returns `true` if the application should quit.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails to send or render.
    pub async fn handle_event(&mut self, event: DriverEvent) -> Result<bool, D::Error> {
        match event {
            DriverEvent::Input(line) => {
                let actions = self.app.handle(AppEvent::Input(line));
                self.process_actions(actions).await
            },
            DriverEvent::Session(event) => {
                let events = self.bridge.handle_session_event(event);
                self.send_outgoing_frames().await?;
                self.process_bridge_events(events).await
            },
        }
    }

    /// Process actions returned by the App.
    ///
    /// Returns `true` if should quit.
    async fn process_actions(&mut self, initial_actions: Vec<AppAction>) -> Result<bool, D::Error> {
        let mut pending_actions = initial_actions;

        while !pending_actions.is_empty() {
            let actions = std::mem::take(&mut pending_actions);

            for action in actions {
                let events = match action {
                    AppAction::Render => {
                        self.driver.render(&self.app)?;
                        continue;
                    },
                    AppAction::Quit => return Ok(true),
                    AppAction::SendFile { path, password } => self.send_file(&path, password),
                    AppAction::SaveFile { from, filename, data } => {
                        match self.driver.save_file(&filename, &data) {
                            Ok(path) => vec![AppEvent::FileSaved { from, filename, path }],
                            Err(e) => {
                                tracing::warn!(%filename, error = %e, "failed to save file");
                                vec![AppEvent::Error {
                                    message: format!("could not save {filename}: {e}"),
                                }]
                            },
                        }
                    },
                    AppAction::Connect { .. }
                    | AppAction::Disconnect { .. }
                    | AppAction::SendText { .. }
                    | AppAction::ListPeers
                    | AppAction::UnlockFile { .. } => self.bridge.process_app_action(action),
                };

                self.send_outgoing_frames().await?;
                for event in events {
                    pending_actions.extend(self.app.handle(event));
                }
            }
        }
        Ok(false)
    }

    fn send_file(&mut self, path: &str, password: Option<String>) -> Vec<AppEvent> {
        let data = match self.driver.read_file(path) {
            Ok(data) => data,
            Err(e) => {
                return vec![AppEvent::Error { message: format!("could not read {path}: {e}") }];
            },
        };
        let filename = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(path)
            .to_owned();

        tracing::debug!(%filename, size = data.len(), "sending file");
        self.bridge.send_file(filename, data, password)
    }

    /// Process events from Bridge back to App.
    async fn process_bridge_events(&mut self, events: Vec<AppEvent>) -> Result<bool, D::Error> {
        for event in events {
            let actions = self.app.handle(event);
            if self.process_actions(actions).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Destroy the identity if it is still alive and stop the driver.
    async fn shutdown(&mut self) -> Result<(), D::Error> {
        if !self.bridge.is_destroyed() {
            let events = self.bridge.destroy();
            self.send_outgoing_frames().await?;
            for event in events {
                self.app.handle(event);
            }
            self.driver.render(&self.app)?;
        }
        self.driver.stop();
        Ok(())
    }

    /// Send all pending outgoing frames to the relay.
    async fn send_outgoing_frames(&mut self) -> Result<(), D::Error> {
        let frames = self.bridge.take_outgoing();
        for frame in frames {
            self.driver.send_frame(frame).await?;
        }
        Ok(())
    }

    /// Get a reference to the App
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Get a reference to the Bridge
    pub fn bridge(&self) -> &Bridge<C> {
        &self.bridge
    }

    /// Get a reference to the Driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get a mutable reference to the Driver
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}
