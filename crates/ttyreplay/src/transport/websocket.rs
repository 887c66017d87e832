//! WebSocket client for recorder servers.
//!
//! After the opening [`Request`] frames, the server sends one JSON session
//! event per text frame and waits for an `ack` text frame before sending the
//! next. Frames that are not events (for example `could not find session`)
//! are logged and skipped.

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{ACK_FRAME, Feed, FeedSource, Request, channel};
use crate::error::{PlaybackError, Result};
use crate::event::SessionEvent;

/// Parse a text frame into a session event.
pub fn parse_frame(text: &str) -> Result<SessionEvent> {
    SessionEvent::from_json(text).map_err(|_| PlaybackError::unexpected_frame(text))
}

/// Connect to `url`, send `request` and return the resulting feed.
///
/// The socket is driven by a background task that forwards events into the
/// feed and acknowledgements back to the server. The feed reports
/// [`Inbound::Disconnected`](super::Inbound::Disconnected) when the socket
/// closes.
pub async fn connect(url: &str, request: &Request) -> Result<Feed> {
    let (ws_stream, _) = connect_async(url).await?;
    info!(%url, "connected to recorder");

    let (mut sink, stream) = ws_stream.split();
    for frame in request.frames() {
        sink.send(Message::Text(frame)).await?;
    }

    let (source, feed) = channel();
    tokio::spawn(pump(sink, stream, source));
    Ok(feed)
}

async fn pump<S, R>(mut sink: S, mut stream: R, mut source: FeedSource)
where
    S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    R: futures::Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match parse_frame(&text) {
                    Ok(event) => {
                        debug!(%event, "received event");
                        if source.send_event(event).is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(%err, "skipping frame"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(%err, "websocket read failed");
                    break;
                }
            },
            ack = source.recv_ack() => {
                if ack.is_none() {
                    break;
                }
                if let Err(err) = sink.send(Message::Text(ACK_FRAME.to_string())).await {
                    warn!(%err, "websocket ack failed");
                    break;
                }
            }
        }
    }

    info!("recorder connection closed");
    let _ = source.disconnect();
    let _ = sink.close().await;
}
