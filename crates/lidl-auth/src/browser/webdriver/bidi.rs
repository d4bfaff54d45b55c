//! Network capture over a WebDriver BiDi socket (Firefox).

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use super::network::NetworkLog;
use crate::error::{AuthError, Result};

/// Events folded into the [`NetworkLog`].
const NETWORK_EVENTS: [&str; 3] = [
    "network.beforeRequestSent",
    "network.responseStarted",
    "network.responseCompleted",
];

const SUBSCRIBE_ID: u64 = 1;

/// Bound of the subscribe handshake.
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Background reader feeding BiDi network events into a shared log.
///
/// The reader stops when the browser closes the socket or this value is dropped.
#[derive(Debug)]
pub(crate) struct BidiCapture {
    task: JoinHandle<()>,
}

impl BidiCapture {
    /// Connect to the session's `webSocketUrl` and subscribe to network events.
    pub(crate) async fn connect(url: &str, network: Arc<Mutex<NetworkLog>>) -> Result<Self> {
        let (ws_stream, _) = connect_async(url).await.map_err(unavailable)?;
        let (mut write, mut read) = ws_stream.split();

        let subscribe = json!({
            "id": SUBSCRIBE_ID,
            "method": "session.subscribe",
            "params": { "events": NETWORK_EVENTS },
        });
        write
            .send(Message::Text(subscribe.to_string().into()))
            .await
            .map_err(unavailable)?;

        let reply = tokio::time::timeout(SUBSCRIBE_TIMEOUT, async {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let Ok(value) = serde_json::from_str::<Value>(text.as_str()) else {
                            continue;
                        };
                        if value["id"].as_u64() == Some(SUBSCRIBE_ID) {
                            return Ok(value);
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Err(e) => return Err(unavailable(e)),
                    _ => {}
                }
            }
            Err(unavailable("socket closed before subscribing"))
        })
        .await
        .map_err(|_| unavailable("subscribe timed out"))??;

        if reply["type"] == "error" {
            let error = reply["message"].as_str().or_else(|| reply["error"].as_str());
            return Err(unavailable(error.unwrap_or("subscribe rejected")));
        }
        debug!(url, "Subscribed to network events");

        let task = tokio::spawn(async move {
            // Holding the sink keeps the socket open
            let _write = write;
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<Value>(text.as_str()) {
                        Ok(value) => network.lock().ingest_bidi(&value),
                        Err(e) => debug!(error = %e, "Unreadable BiDi message"),
                    },
                    Ok(Message::Close(_)) => break,
                    Err(e) => {
                        warn!(error = %e, "Network capture stopped");
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(Self { task })
    }
}

fn unavailable(e: impl std::fmt::Display) -> AuthError {
    AuthError::BrowserUnavailable(format!("network capture: {}", e))
}

impl Drop for BidiCapture {
    fn drop(&mut self) {
        self.task.abort();
    }
}
