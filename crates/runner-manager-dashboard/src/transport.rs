use futures_util::{SinkExt, StreamExt};
use runner_manager_core::{FrameSink, SyncError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

pub const OUTBOUND_QUEUE_CAPACITY: usize = 64;
pub const EVENT_QUEUE_CAPACITY: usize = 256;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Connected,
    Disconnected,
    Text(String),
}

/// Session-facing sender. Never blocks; a full or closed queue drops the frame.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: mpsc::Sender<String>,
}

impl OutboundQueue {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }
}

impl FrameSink for OutboundQueue {
    fn send_text(&mut self, text: String) -> Result<(), SyncError> {
        self.tx
            .try_send(text)
            .map_err(|_| SyncError::ChannelUnavailable)
    }
}

/// Keeps one websocket to `url` alive, reconnecting with backoff.
///
/// Returns once the event receiver is gone. Frames queued while no socket is
/// up are discarded before the next connect attempt.
pub async fn socket_loop(
    url: Url,
    events: mpsc::Sender<SocketEvent>,
    mut outbound: mpsc::Receiver<String>,
) {
    let display_url = redact(&url);
    let mut backoff = INITIAL_BACKOFF;
    let mut outbound_open = true;

    loop {
        let dropped = discard_pending(&mut outbound);
        if dropped > 0 {
            debug!(event = "socket_outbound_discarded", frames = dropped);
        }

        let mut ws = match connect_async(url.as_str()).await {
            Ok((ws, _)) => ws,
            Err(err) => {
                warn!(event = "socket_connect_error", url = %display_url, error = %err);
                if events.is_closed() {
                    return;
                }
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff);
                continue;
            }
        };
        backoff = INITIAL_BACKOFF;
        info!(event = "socket_connected", url = %display_url);
        if events.send(SocketEvent::Connected).await.is_err() {
            let _ = ws.close(None).await;
            return;
        }

        loop {
            tokio::select! {
                incoming = ws.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            if events.send(SocketEvent::Text(text)).await.is_err() {
                                let _ = ws.close(None).await;
                                return;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            debug!(event = "socket_close_frame", frame = ?frame);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!(event = "socket_read_error", error = %err);
                            break;
                        }
                        None => break,
                    }
                }
                maybe_frame = outbound.recv(), if outbound_open => {
                    match maybe_frame {
                        Some(text) => {
                            if let Err(err) = ws.send(Message::Text(text)).await {
                                warn!(event = "socket_write_error", error = %err);
                                break;
                            }
                        }
                        None => {
                            outbound_open = false;
                        }
                    }
                }
            }
        }

        let _ = ws.close(None).await;
        info!(event = "socket_disconnected", url = %display_url);
        if events.send(SocketEvent::Disconnected).await.is_err() {
            return;
        }
        tokio::time::sleep(backoff).await;
        backoff = next_backoff(backoff);
    }
}

fn discard_pending(outbound: &mut mpsc::Receiver<String>) -> usize {
    let mut dropped = 0;
    while outbound.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}

fn next_backoff(current: Duration) -> Duration {
    let next = current + current;
    if next > MAX_BACKOFF {
        MAX_BACKOFF
    } else {
        next
    }
}

// Query parameters carry the credential token.
fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}
