use crate::types::error::Result;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// The stream type every connection runs over
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket factory for creating WebSocket connections
pub struct WebSocketFactory;

impl WebSocketFactory {
    /// Perform the WebSocket handshake against the given URL
    pub async fn create(url: &str) -> Result<WsStream> {
        tracing::debug!("Creating WebSocket connection to: {}", url);
        let (stream, response) = connect_async(url).await?;
        tracing::debug!("WebSocket handshake completed: {}", response.status());
        Ok(stream)
    }
}
