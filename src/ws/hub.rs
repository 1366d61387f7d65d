//! WebSocket Hub (spec §4.5): a single cooperative loop that accepts
//! inbound chat-client connections and fans out `ServerEvent`s.
//!
//! The teacher's only tungstenite usage (`channels::slack::socket`) is a
//! *client* connecting outward to Slack's socket-mode endpoint. This hub
//! adapts the same non-blocking poll idiom — `set_nonblocking`, a
//! `WouldBlock`/`TimedOut` sleep branch, matching on `Message` variants —
//! to the server-accept side: a `TcpListener` instead of `connect`, and a
//! set of subscribers instead of one outbound socket.

use super::bridge;
use super::events::{ClientFrame, ServerEvent};
use crate::shared::ids::ChatId;
use std::io::ErrorKind;
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::{Duration, Instant};
use tungstenite::{Message, WebSocket};

const IDLE_SLEEP: Duration = Duration::from_millis(20);

struct Subscriber {
    socket: WebSocket<TcpStream>,
    chat_id: Option<ChatId>,
}

/// Cooperative, single-threaded WebSocket server. Not `Send` across an
/// accept boundary on purpose — everything here runs on one thread, per
/// spec §5's three-domain concurrency model.
pub struct Hub {
    listener: TcpListener,
    max_connections: usize,
    subscribers: Vec<Subscriber>,
    events: Receiver<ServerEvent>,
}

impl Hub {
    /// Binds the listener and installs the cross-thread bridge. Must be
    /// called exactly once per process.
    pub fn bind(addr: &str, max_connections: usize) -> Result<Self, super::error::WsError> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let events = bridge::install()?;
        Ok(Self {
            listener,
            max_connections,
            subscribers: Vec::new(),
            events,
        })
    }

    pub fn connection_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Runs the accept-and-pump loop until `deadline` elapses, then
    /// returns so the caller can decide whether to keep going. Call this
    /// repeatedly from a dedicated thread (spec §5: the hub owns one
    /// thread and never blocks other domains).
    pub fn run_for(&mut self, budget: Duration) {
        let started = Instant::now();
        while started.elapsed() < budget {
            self.accept_pending();
            self.drain_bridge_events();
            self.pump_subscribers();
            thread::sleep(IDLE_SLEEP);
        }
    }

    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    if self.subscribers.len() >= self.max_connections {
                        // Reject: best-effort handshake+close, then drop.
                        if let Ok(mut socket) = tungstenite::accept(stream) {
                            let _ = socket.close(None);
                        }
                        continue;
                    }
                    let _ = stream.set_nonblocking(true);
                    match tungstenite::accept(stream) {
                        Ok(mut socket) => {
                            let now = crate::shared::time::now().to_rfc3339();
                            let _ = socket.send(Message::Text(
                                serde_json::to_string(&ServerEvent::Connected {
                                    chat_id: String::new(),
                                    timestamp: now,
                                })
                                .expect("serialize connected event"),
                            ));
                            self.subscribers.push(Subscriber {
                                socket,
                                chat_id: None,
                            });
                        }
                        Err(_) => continue,
                    }
                }
                Err(ref err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }
    }

    fn drain_bridge_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.broadcast(&event);
        }
    }

    fn broadcast(&mut self, event: &ServerEvent) {
        let Ok(text) = serde_json::to_string(event) else {
            return;
        };
        let target_chat = event.chat_id();
        self.subscribers.retain_mut(|subscriber| {
            let matches = match target_chat {
                Some(chat_id) => subscriber.chat_id.as_ref().map(ChatId::as_str) == Some(chat_id),
                None => true,
            };
            if !matches {
                return true;
            }
            subscriber.socket.send(Message::Text(text.clone())).is_ok()
        });
    }

    fn pump_subscribers(&mut self) {
        self.subscribers.retain_mut(|subscriber| {
            match subscriber.socket.read() {
                Ok(Message::Text(text)) => {
                    handle_client_frame(subscriber, &text);
                    true
                }
                Ok(Message::Binary(_)) | Ok(Message::Frame(_)) => true,
                Ok(Message::Ping(payload)) => subscriber.socket.send(Message::Pong(payload)).is_ok(),
                Ok(Message::Pong(_)) => true,
                Ok(Message::Close(_)) => false,
                Err(tungstenite::Error::Io(err))
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    true
                }
                Err(tungstenite::Error::ConnectionClosed) => false,
                Err(_) => false,
            }
        });
    }
}

fn handle_client_frame(subscriber: &mut Subscriber, text: &str) {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(ClientFrame::Ping) => {
            let now = crate::shared::time::now().to_rfc3339();
            let _ = subscriber.socket.send(Message::Text(
                serde_json::to_string(&ServerEvent::Pong { timestamp: now })
                    .expect("serialize pong event"),
            ));
        }
        Ok(ClientFrame::Subscribe { chat_id }) => match ChatId::parse(&chat_id) {
            Ok(chat_id) => subscriber.chat_id = Some(chat_id),
            Err(reason) => {
                let _ = subscriber.socket.send(Message::Text(
                    serde_json::to_string(&ServerEvent::Error { message: reason })
                        .expect("serialize error event"),
                ));
            }
        },
        Err(_) => {
            let _ = subscriber.socket.send(Message::Text(
                serde_json::to_string(&ServerEvent::Error {
                    message: "malformed websocket frame".to_string(),
                })
                .expect("serialize error event"),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_rejects_connections_past_capacity() {
        // `max_connections` enforcement is exercised at the accept layer,
        // which needs a live TCP loop; covered by the integration test
        // `ws_connection_limit` instead. This unit test only checks the
        // bookkeeping helper used by that accept path.
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.set_nonblocking(true).expect("nonblocking");
        let hub = Hub {
            listener,
            max_connections: 0,
            subscribers: Vec::new(),
            events: std::sync::mpsc::channel().1,
        };
        assert_eq!(hub.connection_count(), 0);
        assert!(hub.subscribers.len() >= hub.max_connections);
    }
}
