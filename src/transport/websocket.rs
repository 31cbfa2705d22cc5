//! WebSocket transport over tokio-tungstenite.
//!
//! `wss://` endpoints use rustls with the webpki root set.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt, future};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};

use super::connection::{Connector, Frame, FrameSink, Transport};

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// WsConnector
// ============================================================================

/// Opens WebSocket connections with [`connect_async`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Transport> {
        let (ws_stream, response) = connect_async(url.as_str()).await?;
        debug!(%url, status = %response.status(), "WebSocket handshake completed");

        let (ws_write, ws_read) = ws_stream.split();

        let stream = ws_read
            .take_while(|message| future::ready(!matches!(message, Ok(Message::Close(_)))))
            .filter_map(|message| {
                future::ready(match message {
                    Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.as_str().to_owned()))),
                    Ok(Message::Binary(bytes)) => Some(Ok(Frame::Binary(bytes.to_vec()))),
                    // Ping/Pong are answered by tungstenite itself
                    Ok(_) => None,
                    Err(e) => Some(Err(Error::from(e))),
                })
            })
            .boxed();

        Ok(Transport::new(Box::new(WsSink(ws_write)), stream))
    }
}

// ============================================================================
// WsSink
// ============================================================================

/// Write half of a WebSocket connection.
struct WsSink(SplitSink<WsStream, Message>);

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(bytes) => Message::Binary(bytes.into()),
        };

        self.0.send(message).await?;
        trace!("Frame written");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.0.close().await?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
