use super::error::ProtocolError;
use super::{Request, Response};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpProtocol {
    Http2,
    H2c,
}

impl std::fmt::Display for HttpProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            HttpProtocol::Http2 => "HTTP/2",
            HttpProtocol::H2c => "HTTP/2 (h2c)",
        };
        write!(f, "{}", label)
    }
}

#[async_trait(?Send)]
pub trait Protocol {
    async fn response(&self, request: Request) -> Result<Response, ProtocolError>;

    async fn send_request(&self, request: Request) -> Result<Response, ProtocolError> {
        self.response(request).await
    }
}
