use futures_util::{SinkExt, StreamExt};
use pixelboard_shared::{encode_binary, encode_text, RelayMessage};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

use crate::config::WireFormat;
use crate::sync::{Transport, TransportError};

#[derive(Debug)]
pub enum WsEvent {
    Open,
    Close,
    Error(String),
    Text(String),
    Binary(Vec<u8>),
}

pub struct WsSender {
    tx: mpsc::UnboundedSender<Message>,
    format: WireFormat,
}

impl WsSender {
    /// A sender with no connection behind it; every send fails with `Closed`.
    pub fn detached(format: WireFormat) -> Self {
        let (tx, _) = mpsc::unbounded_channel();
        Self { tx, format }
    }
}

impl Transport for WsSender {
    fn send(&mut self, message: &RelayMessage) -> Result<(), TransportError> {
        let encode_error = |reason: String| TransportError::Encode {
            kind: message.kind(),
            reason,
        };
        let frame = match self.format {
            WireFormat::Json => encode_text(message)
                .map(Message::text)
                .map_err(|error| encode_error(error.to_string()))?,
            WireFormat::Binary => encode_binary(message)
                .map(Message::binary)
                .map_err(|error| encode_error(error.to_string()))?,
        };
        self.tx.send(frame).map_err(|_| TransportError::Closed)
    }
}

/// Opens a relay connection. The returned receiver yields `Open` first and
/// `Close` last; frames are passed through undecoded.
pub async fn connect_ws(
    url: &str,
    format: WireFormat,
) -> Result<(WsSender, mpsc::UnboundedReceiver<WsEvent>), TransportError> {
    let (socket, _) = connect_async(url)
        .await
        .map_err(|error| TransportError::Connect {
            url: url.to_string(),
            reason: error.to_string(),
        })?;
    info!(url, "WS connected");

    let (mut socket_sender, mut socket_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<WsEvent>();
    let _ = event_tx.send(WsEvent::Open);

    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(error) = socket_sender.send(message).await {
                debug!(%error, "WS send failed");
                break;
            }
        }
        let _ = socket_sender.close().await;
    });

    let url = url.to_string();
    tokio::spawn(async move {
        while let Some(frame) = socket_receiver.next().await {
            let event = match frame {
                Ok(Message::Text(text)) => WsEvent::Text(text.as_str().to_owned()),
                Ok(Message::Binary(data)) => WsEvent::Binary(data.to_vec()),
                Ok(Message::Close(frame)) => {
                    debug!(url = %url, ?frame, "WS close frame");
                    break;
                }
                Ok(_) => continue,
                Err(error) => WsEvent::Error(error.to_string()),
            };
            let failed = matches!(event, WsEvent::Error(_));
            if event_tx.send(event).is_err() || failed {
                break;
            }
        }
        info!(url = %url, "WS disconnected");
        let _ = event_tx.send(WsEvent::Close);
    });

    Ok((WsSender { tx, format }, event_rx))
}
