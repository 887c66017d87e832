//! Event transports.
//!
//! A live session reaches the player through a [`Feed`]: a stream of
//! [`Inbound`] batches plus an acknowledgement channel back to the sender.
//! The sender waits for one acknowledgement per event it delivered before
//! sending more, so the player controls how fast a live session drains.
//!
//! [`channel`] builds an in-process feed. The [`websocket`] module connects
//! one to a recorder server.

pub mod websocket;

use std::future::Future;

use tokio::sync::mpsc;

use crate::error::{PlaybackError, Result};
use crate::event::SessionEvent;

/// Text frame acknowledging one applied live event.
pub const ACK_FRAME: &str = "ack";

/// Something that can acknowledge applied live events.
pub trait Acknowledge: Send {
    /// Acknowledge one event.
    fn ack(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Acknowledger for feeds that do not expect acknowledgements.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAck;

impl Acknowledge for NoAck {
    async fn ack(&mut self) -> Result<()> {
        Ok(())
    }
}

/// What a feed delivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Events to append to the session.
    Events(Vec<SessionEvent>),
    /// The remote side went away.
    Disconnected,
}

/// Acknowledgement half of a [`Feed`].
#[derive(Debug, Clone)]
pub struct AckSender {
    tx: mpsc::UnboundedSender<()>,
}

impl Acknowledge for AckSender {
    async fn ack(&mut self) -> Result<()> {
        self.tx.send(()).map_err(|_| PlaybackError::TransportClosed)
    }
}

/// The player's end of a transport.
#[derive(Debug)]
pub struct Feed {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    acks: AckSender,
}

impl Feed {
    /// Split into the inbound stream and the acknowledger.
    #[must_use]
    pub fn into_parts(self) -> (mpsc::UnboundedReceiver<Inbound>, AckSender) {
        (self.inbound, self.acks)
    }
}

/// The sending end of an in-process feed.
#[derive(Debug)]
pub struct FeedSource {
    events: mpsc::UnboundedSender<Inbound>,
    acks: mpsc::UnboundedReceiver<()>,
}

impl FeedSource {
    /// Deliver a batch of events.
    pub fn send(&self, events: Vec<SessionEvent>) -> Result<()> {
        self.events
            .send(Inbound::Events(events))
            .map_err(|_| PlaybackError::TransportClosed)
    }

    /// Deliver one event.
    pub fn send_event(&self, event: SessionEvent) -> Result<()> {
        self.send(vec![event])
    }

    /// Signal that the remote side disconnected.
    pub fn disconnect(&self) -> Result<()> {
        self.events
            .send(Inbound::Disconnected)
            .map_err(|_| PlaybackError::TransportClosed)
    }

    /// Wait for the next acknowledgement. `None` once the feed is dropped.
    pub async fn recv_ack(&mut self) -> Option<()> {
        self.acks.recv().await
    }

    /// Take an acknowledgement if one is already waiting.
    pub fn try_recv_ack(&mut self) -> bool {
        self.acks.try_recv().is_ok()
    }

    /// Send one event and wait until it is acknowledged.
    pub async fn send_acked(&mut self, event: SessionEvent) -> Result<()> {
        self.send_event(event)?;
        self.recv_ack().await.ok_or(PlaybackError::TransportClosed)
    }
}

/// Create a connected in-process feed.
#[must_use]
pub fn channel() -> (FeedSource, Feed) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (acks_tx, acks_rx) = mpsc::unbounded_channel();
    (
        FeedSource {
            events: events_tx,
            acks: acks_rx,
        },
        Feed {
            inbound: events_rx,
            acks: AckSender { tx: acks_tx },
        },
    )
}

/// Opening request sent to a recorder server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Fetch a session by key.
    Get {
        /// Session key.
        key: String,
    },
    /// Fetch a session through the viewer interface.
    ViewerGet {
        /// Viewer secret.
        secret: String,
        /// Session key.
        key: String,
    },
}

impl Request {
    /// Fetch `key`.
    pub fn get(key: impl Into<String>) -> Self {
        Self::Get { key: key.into() }
    }

    /// Fetch `key` with a viewer secret.
    pub fn viewer_get(secret: impl Into<String>, key: impl Into<String>) -> Self {
        Self::ViewerGet {
            secret: secret.into(),
            key: key.into(),
        }
    }

    /// The text frames to send, in order.
    #[must_use]
    pub fn frames(&self) -> Vec<String> {
        match self {
            Self::Get { key } => vec!["get".to_string(), key.clone()],
            Self::ViewerGet { secret, key } => {
                vec!["viewer-get".to_string(), secret.clone(), key.clone()]
            }
        }
    }
}
