use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::protocol::error::{LedgerError, Result};
use crate::protocol::status::Code;
use crate::protocol::{CallRequest, CallResponse};
use crate::transport::codec::JsonCodec;
use crate::transport::{Channel, Connector, ItemStream, TransportError};

/// Maximum frame size (100 MB)
pub(crate) const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// Default timeout for establishing a TCP connection (5 seconds)
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Writes one frame: `[4-byte length as u32 big-endian] + [data]`.
pub(crate) async fn write_frame<W>(stream: &mut W, data: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(data.len())
        .ok()
        .filter(|len| *len as usize <= MAX_MESSAGE_SIZE)
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Message too large: {} bytes (max {} bytes)", data.len(), MAX_MESSAGE_SIZE),
            )
        })?;

    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(data).await?;
    stream.flush().await
}

/// Reads one frame written by [`write_frame`].
pub(crate) async fn read_frame<R>(stream: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Message too large: {} bytes (max {} bytes)", len, MAX_MESSAGE_SIZE),
        ));
    }

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Maps IO errors to transport codes.
///
/// - Timeouts -> `DeadlineExceeded`
/// - Refused, reset or closed connections -> `Unavailable`
/// - Oversized or corrupt frames -> `Internal`
fn map_io_error(err: std::io::Error, context: &str) -> TransportError {
    use std::io::ErrorKind;

    let code = match err.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => Code::DeadlineExceeded,
        ErrorKind::ConnectionRefused
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected
        | ErrorKind::BrokenPipe
        | ErrorKind::UnexpectedEof
        | ErrorKind::AddrNotAvailable => Code::Unavailable,
        ErrorKind::InvalidData => Code::Internal,
        _ => Code::Unknown,
    };

    TransportError::new(code, format!("{}: {}", context, err))
}

/// TCP client channel to one node.
///
/// Each call opens a fresh connection, trying the node's addresses in order
/// until one accepts.
///
/// # Example
///
/// ```no_run
/// use ledgerpc_common::transport::{Channel, TcpChannel};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let channel = TcpChannel::new(vec!["127.0.0.1:50211".to_string()])?;
/// let value = channel
///     .unary("proto.CryptoService/cryptoGetBalance", json!({}), None)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TcpChannel {
    addresses: Vec<String>,
    connect_timeout: Duration,
}

impl TcpChannel {
    /// Creates a channel over `addresses`, each of the form `host:port`.
    pub fn new(addresses: Vec<String>) -> Result<Self> {
        if addresses.is_empty() {
            return Err(LedgerError::Config("node has no addresses".to_string()));
        }

        for address in &addresses {
            let valid = address
                .rsplit_once(':')
                .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
            if !valid {
                return Err(LedgerError::Config(format!(
                    "invalid address '{}', expected host:port",
                    address
                )));
            }
        }

        Ok(Self {
            addresses,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    async fn connect(&self) -> std::result::Result<TcpStream, TransportError> {
        let mut last_err = None;
        for address in &self.addresses {
            match tokio::time::timeout(self.connect_timeout, TcpStream::connect(address.as_str())).await {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(e)) => {
                    debug!(address = %address, error = %e, "connect failed");
                    last_err = Some(e.to_string());
                }
                Err(_) => {
                    debug!(address = %address, "connect timed out");
                    last_err = Some("connect timed out".to_string());
                }
            }
        }

        Err(TransportError::unavailable(format!(
            "Failed to connect to {}: {}",
            self.addresses.join(", "),
            last_err.unwrap_or_else(|| "Unknown error".to_string())
        )))
    }

    async fn open_call(&self, request: &CallRequest) -> std::result::Result<TcpStream, TransportError> {
        let encoded = JsonCodec::encode_request(request)
            .map_err(|e| TransportError::internal(format!("encoding request: {}", e)))?;

        let mut stream = self.connect().await?;
        write_frame(&mut stream, &encoded)
            .await
            .map_err(|e| map_io_error(e, "writing request"))?;

        Ok(stream)
    }

    async fn call(&self, request: CallRequest) -> std::result::Result<Value, TransportError> {
        let mut stream = self.open_call(&request).await?;
        read_response(&mut stream).await?.into_result()
    }
}

async fn read_response(stream: &mut TcpStream) -> std::result::Result<CallResponse, TransportError> {
    let data = read_frame(stream)
        .await
        .map_err(|e| map_io_error(e, "reading response"))?;

    JsonCodec::decode_response(&data)
        .map_err(|e| TransportError::internal(format!("decoding response: {}", e)))
}

#[async_trait]
impl Channel for TcpChannel {
    async fn unary(
        &self,
        method: &str,
        payload: Value,
        timeout: Option<Duration>,
    ) -> std::result::Result<Value, TransportError> {
        let request = CallRequest::unary(method, payload);

        match timeout {
            Some(timeout) => {
                let request = request.with_timeout(timeout.as_millis() as u64);
                tokio::time::timeout(timeout, self.call(request))
                    .await
                    .map_err(|_| {
                        TransportError::new(
                            Code::DeadlineExceeded,
                            format!("call timed out after {}ms", timeout.as_millis()),
                        )
                    })?
            }
            None => self.call(request).await,
        }
    }

    async fn server_streaming(
        &self,
        method: &str,
        payload: Value,
    ) -> std::result::Result<ItemStream, TransportError> {
        let request = CallRequest::server_streaming(method, payload);
        let stream = self.open_call(&request).await?;

        let items = futures::stream::unfold(Some(stream), |state| async move {
            let mut stream = state?;
            match read_response(&mut stream).await {
                Ok(response) if response.end_of_stream => match response.into_result() {
                    Ok(_) => None,
                    Err(e) => Some((Err(e), None)),
                },
                Ok(response) => match response.into_result() {
                    Ok(value) => Some((Ok(value), Some(stream))),
                    Err(e) => Some((Err(e), None)),
                },
                Err(e) => Some((Err(e), None)),
            }
        });

        Ok(Box::pin(items))
    }
}

/// Opens a [`TcpChannel`] per node.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn open(&self, addresses: &[String]) -> Result<Arc<dyn Channel>> {
        Ok(Arc::new(TcpChannel::new(addresses.to_vec())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_channel_requires_addresses() {
        assert!(matches!(TcpChannel::new(vec![]), Err(LedgerError::Config(_))));
    }

    #[test]
    fn test_tcp_channel_rejects_address_without_port() {
        let result = TcpChannel::new(vec!["localhost".to_string()]);
        assert!(matches!(result, Err(LedgerError::Config(_))));

        let result = TcpChannel::new(vec!["localhost:notaport".to_string()]);
        assert!(matches!(result, Err(LedgerError::Config(_))));
    }

    #[test]
    fn test_map_io_error_codes() {
        use std::io::{Error, ErrorKind};

        assert_eq!(map_io_error(Error::from(ErrorKind::TimedOut), "x").code, Code::DeadlineExceeded);
        assert_eq!(map_io_error(Error::from(ErrorKind::ConnectionRefused), "x").code, Code::Unavailable);
        assert_eq!(map_io_error(Error::from(ErrorKind::UnexpectedEof), "x").code, Code::Unavailable);
        assert_eq!(map_io_error(Error::from(ErrorKind::InvalidData), "x").code, Code::Internal);
    }

    #[tokio::test]
    async fn test_frame_roundtrip_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_frame(&mut client, b"hello").await.unwrap();
        assert_eq!(read_frame(&mut server).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_read_frame_rejects_oversized_length() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
        let err = read_frame(&mut server).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
