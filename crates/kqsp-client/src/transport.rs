//! TCP transport to the relay.
//!
//! Provides [`RelayConnection`], which owns the socket and translates relay
//! frames into [`SessionEvent`]s. This is a thin layer: protocol logic stays
//! in the Sans-IO [`crate::SessionManager`].
//!
//! When the relay drops the socket, the task reports
//! [`SessionEvent::IdentityDisconnected`] plus a close for every link it saw
//! open, then redials with exponential backoff and re-registers the same
//! peer id. If every attempt fails it reports
//! [`SessionEvent::IdentityClosed`].

use std::{collections::BTreeSet, time::Duration};

use kqsp_core::PeerId;
use kqsp_proto::{
    ProtocolError,
    relay::{self, ClientFrame, ServerFrame},
};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpStream, tcp::OwnedWriteHalf},
    sync::mpsc,
};
use tracing::{debug, info, warn};

use crate::{bridge::frame_to_event, event::SessionEvent};

/// Redial attempts after the relay drops the socket.
pub const RECONNECT_ATTEMPTS: u32 = 5;

const INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const CHANNEL_CAPACITY: usize = 64;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Stream error.
    #[error("stream error: {0}")]
    Stream(String),

    /// Frame could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Handle to a relay session.
///
/// Frames are sent and events received through the channels; an internal
/// task does the socket I/O.
pub struct RelayConnection {
    /// Send frames to the relay.
    pub to_relay: mpsc::Sender<ClientFrame>,
    /// Receive session events translated from relay frames.
    pub from_relay: mpsc::Receiver<SessionEvent>,
    abort_handle: tokio::task::AbortHandle,
}

impl RelayConnection {
    /// Stop the connection task.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }
}

/// Connect to a relay and register `peer_id`.
///
/// The registration outcome arrives as the first event on
/// [`RelayConnection::from_relay`].
///
/// # Errors
///
/// - `TransportError::Connection` if the relay cannot be reached
pub async fn connect(relay_addr: &str, peer_id: PeerId) -> Result<RelayConnection, TransportError> {
    let stream = dial(relay_addr).await?;

    let (to_relay_tx, to_relay_rx) = mpsc::channel::<ClientFrame>(CHANNEL_CAPACITY);
    let (from_relay_tx, from_relay_rx) = mpsc::channel::<SessionEvent>(CHANNEL_CAPACITY);

    let handle = tokio::spawn(run_connection(
        relay_addr.to_owned(),
        peer_id,
        stream,
        to_relay_rx,
        from_relay_tx,
    ));

    Ok(RelayConnection {
        to_relay: to_relay_tx,
        from_relay: from_relay_rx,
        abort_handle: handle.abort_handle(),
    })
}

enum Exit {
    /// Local side hung up.
    Shutdown,
    /// Relay closed the socket.
    RelayClosed,
}

async fn dial(addr: &str) -> Result<TcpStream, TransportError> {
    TcpStream::connect(addr)
        .await
        .map_err(|e| TransportError::Connection(format!("{addr}: {e}")))
}

async fn run_connection(
    addr: String,
    peer_id: PeerId,
    mut stream: TcpStream,
    mut outgoing: mpsc::Receiver<ClientFrame>,
    events: mpsc::Sender<SessionEvent>,
) {
    loop {
        let mut open = BTreeSet::new();
        match serve(stream, &peer_id, &mut outgoing, &events, &mut open).await {
            Ok(Exit::Shutdown) => return,
            Ok(Exit::RelayClosed) => info!(%addr, "relay closed the connection"),
            Err(err) => warn!(%addr, %err, "relay connection failed"),
        }

        if events.send(SessionEvent::IdentityDisconnected).await.is_err() {
            return;
        }
        for peer in open {
            let event = SessionEvent::ConnectionClosed { peer: PeerId::from(peer) };
            if events.send(event).await.is_err() {
                return;
            }
        }

        match redial(&addr).await {
            Some(next) => stream = next,
            None => {
                warn!(%addr, attempts = RECONNECT_ATTEMPTS, "giving up on relay");
                let _ = events.send(SessionEvent::IdentityClosed).await;
                return;
            },
        }
    }
}

async fn serve(
    stream: TcpStream,
    peer_id: &PeerId,
    outgoing: &mut mpsc::Receiver<ClientFrame>,
    events: &mpsc::Sender<SessionEvent>,
    open: &mut BTreeSet<String>,
) -> Result<Exit, TransportError> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    send_frame(&mut write, &ClientFrame::Register { id: peer_id.to_string() }).await?;

    loop {
        tokio::select! {
            frame = outgoing.recv() => match frame {
                Some(frame) => send_frame(&mut write, &frame).await?,
                None => return Ok(Exit::Shutdown),
            },
            line = lines.next_line() => {
                let line = line.map_err(|e| TransportError::Stream(format!("read failed: {e}")))?;
                let Some(line) = line else {
                    return Ok(Exit::RelayClosed);
                };
                if line.trim().is_empty() {
                    continue;
                }

                let frame = match relay::decode_line::<ServerFrame>(&line) {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!(%err, "dropping undecodable relay frame");
                        continue;
                    },
                };
                track_links(open, &frame);

                if events.send(frame_to_event(frame)).await.is_err() {
                    return Ok(Exit::Shutdown);
                }
            },
        }
    }
}

fn track_links(open: &mut BTreeSet<String>, frame: &ServerFrame) {
    match frame {
        ServerFrame::Opened { peer } => {
            open.insert(peer.clone());
        },
        ServerFrame::Closed { peer } | ServerFrame::ConnectionError { peer, .. } => {
            open.remove(peer);
        },
        ServerFrame::Registered { .. }
        | ServerFrame::Error { .. }
        | ServerFrame::Incoming { .. }
        | ServerFrame::Data { .. } => {},
    }
}

async fn send_frame(write: &mut OwnedWriteHalf, frame: &ClientFrame) -> Result<(), TransportError> {
    let line = relay::encode_line(frame)?;
    write
        .write_all(line.as_bytes())
        .await
        .map_err(|e| TransportError::Stream(format!("write failed: {e}")))
}

async fn redial(addr: &str) -> Option<TcpStream> {
    let mut backoff = INITIAL_BACKOFF;
    for attempt in 1..=RECONNECT_ATTEMPTS {
        tokio::time::sleep(backoff).await;
        match dial(addr).await {
            Ok(stream) => {
                info!(%addr, attempt, "reconnected to relay");
                return Some(stream);
            },
            Err(err) => {
                debug!(%addr, attempt, %err, "redial failed");
                backoff *= 2;
            },
        }
    }
    None
}
