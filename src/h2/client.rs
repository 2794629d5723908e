//! High-level HTTP/2 client.

use async_trait::async_trait;

use crate::h2::connection::H2Connection;
use crate::types::{ClientTimeouts, Protocol, ProtocolError, Request, Response};

/// HTTP/2 protocol client. Each `send_request` opens a connection,
/// performs the exchange, and tears the connection down; use
/// [`H2Connection`] directly to multiplex many requests over one
/// connection.
#[derive(Clone)]
pub struct H2 {
    timeouts: ClientTimeouts,
    verify_certificates: bool,
}

impl Default for H2 {
    fn default() -> Self {
        Self::new()
    }
}

impl H2 {
    pub fn new() -> Self {
        Self {
            timeouts: ClientTimeouts::default(),
            verify_certificates: true,
        }
    }

    pub fn with_timeouts(timeouts: ClientTimeouts) -> Self {
        Self {
            timeouts,
            verify_certificates: true,
        }
    }

    /// Accept any server certificate. Useful against test servers; never
    /// appropriate for production traffic.
    pub fn danger_accept_invalid_certs(mut self) -> Self {
        self.verify_certificates = false;
        self
    }

    pub fn timeouts(&self) -> &ClientTimeouts {
        &self.timeouts
    }

    pub async fn send_request(&self, request: Request) -> Result<Response, ProtocolError> {
        let timeouts = request.timeouts(&self.timeouts);
        let mut connection = H2Connection::connect_with_verification(
            &request.target,
            &timeouts,
            self.verify_certificates,
        )
        .await?;
        let response = connection.execute(&request).await;
        connection.shutdown().await;
        response
    }
}

#[async_trait(?Send)]
impl Protocol for H2 {
    async fn response(&self, request: Request) -> Result<Response, ProtocolError> {
        self.send_request(request).await
    }
}
