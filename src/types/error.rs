use crate::h2::hpack::HpackError;

#[derive(Debug)]
pub enum ProtocolError {
    ConnectionFailed(String),
    RequestFailed(String),
    InvalidResponse(String),
    Timeout,
    Io(std::io::Error),

    // HTTP/2 specific errors
    H2FrameSizeError(String),
    H2FlowControlError(String),
    H2CompressionError(HpackError),
    H2StreamError(H2StreamErrorKind),
    H2ConnectionError(H2ConnectionErrorKind),
    H2ProtocolError(String),

    // Header handling errors
    MalformedHeaders(String),

    // Target errors
    InvalidTarget(String),
}

#[derive(Debug)]
pub enum H2StreamErrorKind {
    Reset(H2ErrorCode),
    FlowControlViolation,
    /// The response cannot be delivered: the peer refused the stream or
    /// the connection went away before the exchange finished.
    BadResponse(String),
    InvalidHeaders(String),
    ContentLengthMismatch { declared: u64, received: u64 },
}

#[derive(Debug)]
pub enum H2ConnectionErrorKind {
    GoAway(H2ErrorCode, String),
    ProtocolViolation(String),
    FlowControlViolation(String),
    StreamIdExhausted,
    PeerClosed,
}

// HTTP/2 Error Codes (RFC 7540 Section 7)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum H2ErrorCode {
    NoError = 0x0,
    ProtocolError = 0x1,
    InternalError = 0x2,
    FlowControlError = 0x3,
    SettingsTimeout = 0x4,
    StreamClosed = 0x5,
    FrameSizeError = 0x6,
    RefusedStream = 0x7,
    Cancel = 0x8,
    CompressionError = 0x9,
    ConnectError = 0xa,
    EnhanceYourCalm = 0xb,
    InadequateSecurity = 0xc,
    Http11Required = 0xd,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            ProtocolError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
            ProtocolError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            ProtocolError::Timeout => write!(f, "Request timeout"),
            ProtocolError::Io(err) => write!(f, "IO error: {}", err),

            ProtocolError::H2FrameSizeError(msg) => write!(f, "HTTP/2 frame size error: {}", msg),
            ProtocolError::H2FlowControlError(msg) => {
                write!(f, "HTTP/2 flow control error: {}", msg)
            }
            ProtocolError::H2CompressionError(err) => {
                write!(f, "HTTP/2 compression error: {}", err)
            }
            ProtocolError::H2StreamError(kind) => write!(f, "HTTP/2 stream error: {}", kind),
            ProtocolError::H2ConnectionError(kind) => {
                write!(f, "HTTP/2 connection error: {}", kind)
            }
            ProtocolError::H2ProtocolError(msg) => write!(f, "HTTP/2 protocol error: {}", msg),

            ProtocolError::MalformedHeaders(msg) => write!(f, "Malformed headers: {}", msg),
            ProtocolError::InvalidTarget(msg) => write!(f, "Invalid target: {}", msg),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Io(err) => Some(err),
            ProtocolError::H2CompressionError(err) => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for H2StreamErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            H2StreamErrorKind::Reset(code) => write!(f, "stream reset by peer: {}", code),
            H2StreamErrorKind::FlowControlViolation => write!(f, "flow control violation"),
            H2StreamErrorKind::BadResponse(msg) => write!(f, "bad response: {}", msg),
            H2StreamErrorKind::InvalidHeaders(msg) => write!(f, "invalid headers: {}", msg),
            H2StreamErrorKind::ContentLengthMismatch { declared, received } => write!(
                f,
                "content-length mismatch: declared {} but received {}",
                declared, received
            ),
        }
    }
}

impl std::fmt::Display for H2ConnectionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            H2ConnectionErrorKind::GoAway(code, debug) => {
                write!(f, "connection terminated with GOAWAY ({}): {}", code, debug)
            }
            H2ConnectionErrorKind::ProtocolViolation(msg) => {
                write!(f, "protocol violation: {}", msg)
            }
            H2ConnectionErrorKind::FlowControlViolation(msg) => {
                write!(f, "flow control violation: {}", msg)
            }
            H2ConnectionErrorKind::StreamIdExhausted => {
                write!(f, "client stream id space exhausted")
            }
            H2ConnectionErrorKind::PeerClosed => write!(f, "peer closed the connection"),
        }
    }
}

impl std::fmt::Display for H2ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            H2ErrorCode::NoError => "NO_ERROR",
            H2ErrorCode::ProtocolError => "PROTOCOL_ERROR",
            H2ErrorCode::InternalError => "INTERNAL_ERROR",
            H2ErrorCode::FlowControlError => "FLOW_CONTROL_ERROR",
            H2ErrorCode::SettingsTimeout => "SETTINGS_TIMEOUT",
            H2ErrorCode::StreamClosed => "STREAM_CLOSED",
            H2ErrorCode::FrameSizeError => "FRAME_SIZE_ERROR",
            H2ErrorCode::RefusedStream => "REFUSED_STREAM",
            H2ErrorCode::Cancel => "CANCEL",
            H2ErrorCode::CompressionError => "COMPRESSION_ERROR",
            H2ErrorCode::ConnectError => "CONNECT_ERROR",
            H2ErrorCode::EnhanceYourCalm => "ENHANCE_YOUR_CALM",
            H2ErrorCode::InadequateSecurity => "INADEQUATE_SECURITY",
            H2ErrorCode::Http11Required => "HTTP_1_1_REQUIRED",
        };
        write!(f, "{} (0x{:x})", name, *self as u32)
    }
}

// From conversions
impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        ProtocolError::Io(err)
    }
}

impl From<HpackError> for ProtocolError {
    fn from(err: HpackError) -> Self {
        ProtocolError::H2CompressionError(err)
    }
}

impl From<H2StreamErrorKind> for ProtocolError {
    fn from(kind: H2StreamErrorKind) -> Self {
        ProtocolError::H2StreamError(kind)
    }
}

impl From<H2ConnectionErrorKind> for ProtocolError {
    fn from(kind: H2ConnectionErrorKind) -> Self {
        ProtocolError::H2ConnectionError(kind)
    }
}

impl From<u32> for H2ErrorCode {
    fn from(code: u32) -> Self {
        match code {
            0x0 => H2ErrorCode::NoError,
            0x1 => H2ErrorCode::ProtocolError,
            0x2 => H2ErrorCode::InternalError,
            0x3 => H2ErrorCode::FlowControlError,
            0x4 => H2ErrorCode::SettingsTimeout,
            0x5 => H2ErrorCode::StreamClosed,
            0x6 => H2ErrorCode::FrameSizeError,
            0x7 => H2ErrorCode::RefusedStream,
            0x8 => H2ErrorCode::Cancel,
            0x9 => H2ErrorCode::CompressionError,
            0xa => H2ErrorCode::ConnectError,
            0xb => H2ErrorCode::EnhanceYourCalm,
            0xc => H2ErrorCode::InadequateSecurity,
            0xd => H2ErrorCode::Http11Required,
            _ => H2ErrorCode::InternalError, // unknown codes map to a generic fault
        }
    }
}
