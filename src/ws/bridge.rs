//! Cross-thread event bridge (spec §4.6).
//!
//! Background job workers and the HTTP handler threads run outside the
//! WebSocket Hub's single cooperative loop, so they cannot touch its
//! subscriber map directly. They instead send `ServerEvent`s down an
//! `mpsc::Sender` that the Hub drains once per poll iteration. The
//! channel is installed exactly once at startup; anything published
//! before that returns `BridgeNotReady` rather than silently dropping.

use super::error::WsError;
use super::events::ServerEvent;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Mutex, OnceLock};

static SENDER: OnceLock<Mutex<Option<Sender<ServerEvent>>>> = OnceLock::new();

fn slot() -> &'static Mutex<Option<Sender<ServerEvent>>> {
    SENDER.get_or_init(|| Mutex::new(None))
}

/// Creates the channel and installs its sending half as the process-wide
/// bridge. Returns the receiving half for the Hub to drain. Must be
/// called exactly once; a second call is rejected rather than silently
/// replacing the first (per-producer-thread ordering would otherwise be
/// broken for anyone holding a clone of the old sender).
pub fn install() -> Result<Receiver<ServerEvent>, WsError> {
    let (tx, rx) = std::sync::mpsc::channel();
    let mut guard = slot().lock().expect("bridge mutex poisoned");
    if guard.is_some() {
        return Err(WsError::BridgeAlreadyInstalled);
    }
    *guard = Some(tx);
    Ok(rx)
}

/// Publishes an event from any thread. Fails with `BridgeNotReady` if
/// [`install`] has not run yet, or if the Hub's receiver has been dropped.
pub fn publish(event: ServerEvent) -> Result<(), WsError> {
    let guard = slot().lock().expect("bridge mutex poisoned");
    let sender = guard.as_ref().ok_or(WsError::BridgeNotReady)?;
    sender.send(event).map_err(|_| WsError::BridgeNotReady)
}

#[cfg(test)]
pub(crate) fn reset_for_test() {
    let mut guard = slot().lock().expect("bridge mutex poisoned");
    *guard = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    static TEST_LOCK: StdMutex<()> = StdMutex::new(());

    #[test]
    fn publish_before_install_is_not_ready() {
        let _guard = TEST_LOCK.lock().unwrap();
        reset_for_test();
        let err = publish(ServerEvent::Pong {
            timestamp: "0".to_string(),
        })
        .expect_err("should not be ready");
        assert!(matches!(err, WsError::BridgeNotReady));
    }

    #[test]
    fn install_then_publish_is_received() {
        let _guard = TEST_LOCK.lock().unwrap();
        reset_for_test();
        let rx = install().expect("install");
        publish(ServerEvent::Pong {
            timestamp: "123".to_string(),
        })
        .expect("publish");
        let received = rx.recv().expect("recv");
        assert!(matches!(received, ServerEvent::Pong { .. }));
    }

    #[test]
    fn second_install_is_rejected() {
        let _guard = TEST_LOCK.lock().unwrap();
        reset_for_test();
        let _rx = install().expect("first install");
        let err = install().expect_err("second install should fail");
        assert!(matches!(err, WsError::BridgeAlreadyInstalled));
    }
}
