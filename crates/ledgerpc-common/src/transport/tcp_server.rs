use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::protocol::error::{LedgerError, Result};
use crate::protocol::status::Code;
use crate::protocol::{CallKind, CallResponse};
use crate::transport::codec::JsonCodec;
use crate::transport::tcp::{read_frame, write_frame};
use crate::transport::{ItemStream, TransportError};

/// Server-side handler for the calls a [`TcpServer`] accepts.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    async fn unary(&self, method: &str, payload: Value) -> std::result::Result<Value, TransportError>;

    async fn server_streaming(
        &self,
        method: &str,
        _payload: Value,
    ) -> std::result::Result<ItemStream, TransportError> {
        Err(TransportError::new(
            Code::Unimplemented,
            format!("method {} does not stream", method),
        ))
    }
}

/// Async TCP server speaking the length-prefixed JSON frame protocol.
///
/// Each accepted connection is served on its own task and may carry several
/// calls in sequence.
pub struct TcpServer {
    listener: TcpListener,
}

impl TcpServer {
    /// Creates a new TCP server bound to `bind_addr` (e.g. "127.0.0.1:0").
    pub async fn new(bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| LedgerError::Connection(format!("Failed to bind to {}: {}", bind_addr, e)))?;

        Ok(Self { listener })
    }

    /// Gets the actual bound address.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| LedgerError::Connection(format!("Failed to get local addr: {}", e)))
    }

    /// Accepts connections until the listener fails.
    pub async fn run<S: Service>(&self, service: Arc<S>) -> Result<()> {
        loop {
            let (stream, peer_addr) = self
                .listener
                .accept()
                .await
                .map_err(|e| LedgerError::Connection(format!("Failed to accept connection: {}", e)))?;

            debug!(peer = %peer_addr, "connection established");

            let service = service.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, service).await {
                    warn!(peer = %peer_addr, error = %e, "connection error");
                }
            });
        }
    }
}

async fn handle_connection<S: Service>(mut stream: TcpStream, service: Arc<S>) -> Result<()> {
    loop {
        let data = match read_frame(&mut stream).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("connection closed by peer");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let request = match JsonCodec::decode_request(&data) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "failed to decode request");
                let response = CallResponse::error(0, Code::InvalidArgument, e.to_string());
                send_response(&mut stream, &response).await?;
                continue;
            }
        };

        let id = request.id;
        match request.kind {
            CallKind::Unary => {
                let response = match service.unary(&request.method, request.payload).await {
                    Ok(payload) => CallResponse::success(id, payload),
                    Err(e) => CallResponse::error(id, e.code, e.message),
                };
                send_response(&mut stream, &response).await?;
            }
            CallKind::ServerStreaming => {
                let mut items = match service.server_streaming(&request.method, request.payload).await {
                    Ok(items) => items,
                    Err(e) => {
                        send_response(&mut stream, &CallResponse::error(id, e.code, e.message)).await?;
                        continue;
                    }
                };

                let mut terminal = CallResponse::end(id);
                while let Some(item) = items.next().await {
                    match item {
                        Ok(payload) => {
                            send_response(&mut stream, &CallResponse::success(id, payload)).await?;
                        }
                        Err(e) => {
                            terminal = CallResponse::error(id, e.code, e.message);
                            break;
                        }
                    }
                }
                send_response(&mut stream, &terminal).await?;
            }
        }
    }
}

async fn send_response(stream: &mut TcpStream, response: &CallResponse) -> Result<()> {
    let encoded = JsonCodec::encode_response(response)?;
    write_frame(stream, &encoded).await?;
    Ok(())
}
