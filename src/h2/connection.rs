//! Async wrapper that owns the socket and drives an [`H2Transport`].
//!
//! The transport itself is sans-IO; this layer performs the actual
//! reads and writes, applies the configured timeouts, runs the optional
//! keepalive PING timer, and reports the connection-level error callback
//! exactly once on teardown.

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::oneshot::error::TryRecvError;

use crate::h2::stream::CompletionReceiver;
use crate::h2::transport::H2Transport;
use crate::stream::{create_h2_tls_stream, create_tcp_stream, TransportStream};
use crate::types::{
    ClientTimeouts, H2ConnectionErrorKind, HttpProtocol, ProtocolError, Request, Response, Target,
};
use crate::utils::timeout_result;

const READ_CHUNK: usize = 16 * 1024;

pub struct H2Connection {
    stream: TransportStream,
    transport: H2Transport,
    timeouts: ClientTimeouts,
    error_reported: bool,
}

impl H2Connection {
    /// Connect and complete the HTTP/2 handshake. `https`/`h2` schemes
    /// negotiate TLS with ALPN `h2`; `http`/`h2c` use cleartext with
    /// prior knowledge.
    pub async fn connect(target: &Target, timeouts: &ClientTimeouts) -> Result<Self, ProtocolError> {
        Self::connect_with_verification(target, timeouts, true).await
    }

    pub async fn connect_with_verification(
        target: &Target,
        timeouts: &ClientTimeouts,
        verify_certificates: bool,
    ) -> Result<Self, ProtocolError> {
        let scheme = target.scheme();
        let is_tls = matches!(scheme, "https" | "h2");
        let is_h2c = matches!(scheme, "h2c" | "http");
        if !is_tls && !is_h2c {
            return Err(ProtocolError::RequestFailed(format!(
                "HTTP/2 requires the https, h2, h2c, or http scheme (got '{}')",
                scheme
            )));
        }

        let host = target
            .host()
            .ok_or_else(|| ProtocolError::InvalidTarget("Target missing host".to_string()))?;
        let port = target
            .port()
            .ok_or_else(|| ProtocolError::InvalidTarget("Target missing port".to_string()))?;

        let stream = if is_tls {
            create_h2_tls_stream(host, port, timeouts.connect, verify_certificates)
                .await
                .map_err(|e| ProtocolError::ConnectionFailed(e.to_string()))?
        } else {
            create_tcp_stream(host, port, timeouts.connect)
                .await
                .map_err(|e| ProtocolError::ConnectionFailed(e.to_string()))?
        };

        log::debug!("connected to {}:{} (tls={})", host, port, is_tls);

        let mut connection = Self {
            transport: H2Transport::new(stream.is_tls()),
            stream,
            timeouts: timeouts.clone(),
            error_reported: false,
        };
        connection.flush().await?;
        connection.await_initial_settings().await?;
        Ok(connection)
    }

    /// Read until the peer's first SETTINGS frame has been applied.
    async fn await_initial_settings(&mut self) -> Result<(), ProtocolError> {
        while !self.transport.handshake_complete() {
            self.pump_once().await?;
        }
        Ok(())
    }

    /// Submit a request on this connection. The returned receiver
    /// resolves once the exchange finishes; [`drive`] must run for
    /// progress to happen.
    ///
    /// [`drive`]: H2Connection::drive
    pub fn dispatch(&mut self, request: &Request) -> Result<CompletionReceiver, ProtocolError> {
        let prepared = request.prepare()?;
        self.transport.dispatch(prepared)
    }

    /// Dispatch a request and drive the connection until its response
    /// arrives.
    pub async fn execute(&mut self, request: &Request) -> Result<Response, ProtocolError> {
        let receiver = self.dispatch(request)?;
        self.flush().await?;
        self.drive_until(receiver).await
    }

    async fn drive_until(
        &mut self,
        mut receiver: CompletionReceiver,
    ) -> Result<Response, ProtocolError> {
        loop {
            match receiver.try_recv() {
                Ok(result) => return result,
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Closed) => {
                    return Err(self.connection_error());
                }
            }
            self.drive().await?;
        }
    }

    /// One iteration of the connection loop: read, feed the transport,
    /// flush whatever it queued, honor a deferred reconnect request.
    pub async fn drive(&mut self) -> Result<(), ProtocolError> {
        let keepalive = self.timeouts.keepalive;
        let read_timeout = self.timeouts.read;
        let mut buf = [0u8; READ_CHUNK];

        let stream = &mut self.stream;
        let read = async {
            let n = match stream {
                TransportStream::Tcp(tcp) => tcp.read(&mut buf).await.map_err(ProtocolError::Io)?,
                TransportStream::Tls(tls) => tls.read(&mut buf).await.map_err(ProtocolError::Io)?,
            };
            Ok(n)
        };

        let n = match keepalive {
            Some(interval) => {
                match timeout_result(Some(interval), read).await {
                    Ok(n) => n,
                    Err(ProtocolError::Timeout) => {
                        // Idle interval elapsed: probe the peer instead.
                        self.transport.send_ping([0u8; 8]);
                        self.flush().await?;
                        return Ok(());
                    }
                    Err(err) => return Err(err),
                }
            }
            None => timeout_result(read_timeout, read).await?,
        };

        if n == 0 {
            self.transport.force_close("peer closed the connection");
            return Err(ProtocolError::H2ConnectionError(
                H2ConnectionErrorKind::PeerClosed,
            ));
        }

        let result = self.transport.recv(&buf[..n]);
        // A fatal transport error still leaves a GOAWAY to deliver.
        self.flush().await?;
        result?;

        if self.transport.reconnect_requested() {
            log::debug!("stream id space nearly exhausted; recycling connection");
            self.transport.begin_graceful_shutdown();
            self.flush().await?;
            self.shutdown().await;
        }
        Ok(())
    }

    async fn pump_once(&mut self) -> Result<(), ProtocolError> {
        let read_timeout = self.timeouts.read;
        let mut buf = [0u8; READ_CHUNK];
        let stream = &mut self.stream;
        let read = async {
            let n = match stream {
                TransportStream::Tcp(tcp) => tcp.read(&mut buf).await.map_err(ProtocolError::Io)?,
                TransportStream::Tls(tls) => tls.read(&mut buf).await.map_err(ProtocolError::Io)?,
            };
            Ok(n)
        };
        let n = timeout_result(read_timeout, read).await?;
        if n == 0 {
            self.transport.force_close("peer closed during handshake");
            return Err(ProtocolError::H2ConnectionError(
                H2ConnectionErrorKind::PeerClosed,
            ));
        }
        let result = self.transport.recv(&buf[..n]);
        self.flush().await?;
        result
    }

    /// Write out everything the transport has queued.
    pub async fn flush(&mut self) -> Result<(), ProtocolError> {
        if !self.transport.has_pending_send() {
            return Ok(());
        }
        let data: Bytes = self.transport.take_pending_send();
        let write_timeout = self.timeouts.write;
        timeout_result(write_timeout, async {
            match &mut self.stream {
                TransportStream::Tcp(tcp) => {
                    tcp.write_all(&data).await.map_err(ProtocolError::Io)
                }
                TransportStream::Tls(tls) => {
                    tls.write_all(&data).await.map_err(ProtocolError::Io)
                }
            }
        })
        .await
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    pub fn protocol(&self) -> HttpProtocol {
        if self.stream.is_tls() {
            HttpProtocol::Http2
        } else {
            HttpProtocol::H2c
        }
    }

    pub fn transport(&self) -> &H2Transport {
        &self.transport
    }

    pub fn bytes_sent(&self) -> u64 {
        self.transport.bytes_sent()
    }

    pub fn bytes_received(&self) -> u64 {
        self.transport.bytes_received()
    }

    /// The connection-level error, reported at most once.
    fn connection_error(&mut self) -> ProtocolError {
        if self.error_reported {
            return ProtocolError::ConnectionFailed("HTTP/2 connection closed".to_string());
        }
        self.error_reported = true;
        match self.transport.take_close_reason() {
            Some(kind) => ProtocolError::H2ConnectionError(kind),
            None => ProtocolError::ConnectionFailed("HTTP/2 connection closed".to_string()),
        }
    }

    pub async fn shutdown(&mut self) {
        let _ = self.flush().await;
        let result = match &mut self.stream {
            TransportStream::Tcp(tcp) => tcp.shutdown().await,
            TransportStream::Tls(tls) => tls.shutdown().await,
        };
        if let Err(err) = result {
            log::debug!("socket shutdown: {}", err);
        }
    }
}
