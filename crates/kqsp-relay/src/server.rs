//! TCP runtime for the relay driver.
//!
//! One task per client socket reads frames and feeds them to the shared
//! [`RelayDriver`]; a writer task per socket drains that session's outbound
//! queue so a slow client cannot stall routing for the others.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use kqsp_proto::relay::{self, ClientFrame, ERROR_INVALID_FRAME, ServerFrame};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex, RwLock, mpsc},
};
use tracing::{debug, error, info, warn};

use crate::{
    driver::{RelayAction, RelayConfig, RelayDriver, RelayEvent, SessionId},
    error::RelayError,
};

const OUTBOUND_CAPACITY: usize = 256;

type Outbound = RwLock<HashMap<SessionId, mpsc::Sender<ServerFrame>>>;

/// Production relay.
///
/// Wraps [`RelayDriver`] with a Tokio TCP listener.
pub struct RelayServer {
    driver: RelayDriver,
    listener: TcpListener,
}

impl RelayServer {
    /// Create and bind a relay.
    ///
    /// # Errors
    ///
    /// - `RelayError::Config` if `max_sessions` is zero
    /// - `RelayError::Transport` if the address cannot be bound
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        if config.max_sessions == 0 {
            return Err(RelayError::Config("max_sessions must be at least 1".into()));
        }
        let listener = TcpListener::bind(&config.bind_address).await?;
        Ok(Self { driver: RelayDriver::new(config), listener })
    }

    /// Local address the relay is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients until the task is cancelled.
    pub async fn run(self) -> Result<(), RelayError> {
        info!(addr = %self.local_addr()?, "relay listening");

        let driver = Arc::new(Mutex::new(self.driver));
        let outbound: Arc<Outbound> = Arc::new(RwLock::new(HashMap::new()));
        let mut next_session: SessionId = 0;

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    next_session += 1;
                    let session = next_session;
                    debug!(session, %addr, "client connected");

                    let driver = Arc::clone(&driver);
                    let outbound = Arc::clone(&outbound);
                    tokio::spawn(async move {
                        if let Err(err) = handle_session(stream, session, driver, outbound).await {
                            warn!(session, %err, "session ended with error");
                        }
                    });
                },
                Err(err) => error!(%err, "accept failed"),
            }
        }
    }
}

async fn handle_session(
    stream: TcpStream,
    session: SessionId,
    driver: Arc<Mutex<RelayDriver>>,
    outbound: Arc<Outbound>,
) -> Result<(), RelayError> {
    let (read, write) = stream.into_split();
    let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
    outbound.write().await.insert(session, tx);
    let writer = tokio::spawn(write_frames(session, write, rx));

    let result = read_frames(session, read, &driver, &outbound).await;

    let actions = {
        let mut driver = driver.lock().await;
        if driver.is_accepted(session) {
            driver.process_event(RelayEvent::SessionClosed { session })
        } else {
            Ok(vec![])
        }
    };
    outbound.write().await.remove(&session);
    match actions {
        Ok(actions) => {
            execute_actions(session, actions, &outbound).await;
        },
        Err(err) => warn!(session, %err, "close not processed"),
    }

    let _ = writer.await;
    debug!(session, "client disconnected");
    result
}

async fn read_frames(
    session: SessionId,
    read: OwnedReadHalf,
    driver: &Mutex<RelayDriver>,
    outbound: &Outbound,
) -> Result<(), RelayError> {
    let actions = driver.lock().await.process_event(RelayEvent::SessionAccepted { session })?;
    if !execute_actions(session, actions, outbound).await {
        return Ok(());
    }

    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let frame = match relay::decode_line::<ClientFrame>(&line) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(session, %err, "undecodable frame");
                let reply = ServerFrame::Error {
                    kind: ERROR_INVALID_FRAME.to_owned(),
                    message: err.to_string(),
                };
                let reply = RelayAction::SendTo { session, frame: reply };
                execute_actions(session, vec![reply], outbound).await;
                continue;
            },
        };

        let event = RelayEvent::FrameReceived { session, frame };
        let actions = driver.lock().await.process_event(event)?;
        if !execute_actions(session, actions, outbound).await {
            return Ok(());
        }
    }
    Ok(())
}

/// Execute driver actions.
///
/// Returns `false` once `current` has been told to close.
async fn execute_actions(
    current: SessionId,
    actions: Vec<RelayAction>,
    outbound: &Outbound,
) -> bool {
    let mut keep_open = true;
    for action in actions {
        match action {
            RelayAction::SendTo { session, frame } => {
                let sender = outbound.read().await.get(&session).cloned();
                match sender {
                    Some(sender) => {
                        if sender.send(frame).await.is_err() {
                            debug!(session, "dropping frame for closing session");
                        }
                    },
                    None => debug!(session, "no such session"),
                }
            },
            RelayAction::Close { session, reason } => {
                info!(session, %reason, "closing session");
                if session == current {
                    keep_open = false;
                }
            },
        }
    }
    keep_open
}

async fn write_frames(
    session: SessionId,
    mut write: OwnedWriteHalf,
    mut frames: mpsc::Receiver<ServerFrame>,
) {
    while let Some(frame) = frames.recv().await {
        let line = match relay::encode_line(&frame) {
            Ok(line) => line,
            Err(err) => {
                error!(session, %err, "frame encode failed");
                continue;
            },
        };
        if let Err(err) = write.write_all(line.as_bytes()).await {
            debug!(session, %err, "write failed");
            break;
        }
    }
    let _ = write.shutdown().await;
}
