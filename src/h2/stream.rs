//! Per-exchange stream state.
//!
//! A `Stream` is one logical request/response multiplexed on the
//! connection. It is owned exclusively by the transport's stream table
//! and lives from dispatch until the exchange completes or fails.

use bytes::{Bytes, BytesMut};
use tokio::sync::oneshot;

use crate::types::{Header, MultipartForm, ProtocolError, Response};
use crate::utils::HTTP_VERSION_2_0;

/// What the stream expects from the peer next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Waiting for the response HEADERS frame.
    ExpectingHeaders,
    /// A HEADERS frame arrived without END_HEADERS; collecting fragments.
    ExpectingContinuation,
    /// Response headers are complete; waiting for DATA or trailers.
    ExpectingData,
    /// A trailer HEADERS frame arrived without END_HEADERS.
    ExpectingContinuationTrailers,
    /// Terminal. Observed only transiently: the transport removes the
    /// stream from its table in the same call that produces this state.
    Finished,
}

/// Sending half of a stream's completion channel. Consuming it is what
/// guarantees the exactly-once completion contract.
pub type Completion = oneshot::Sender<Result<Response, ProtocolError>>;

/// Receiving half handed back to the caller on dispatch.
pub type CompletionReceiver = oneshot::Receiver<Result<Response, ProtocolError>>;

pub(crate) struct Stream {
    pub id: u32,
    pub state: StreamState,
    /// Outbound flow-control credit. Signed: a peer SETTINGS shrinking
    /// INITIAL_WINDOW_SIZE can push it below zero.
    pub tx_window: i64,
    pub rx_window: i64,

    // Accumulated response.
    pub status: Option<u16>,
    pub headers: Vec<Header>,
    pub trailers: Option<Vec<Header>>,
    pub body: BytesMut,
    pub content_length: Option<u64>,

    /// Header block fragments buffered across HEADERS + CONTINUATION.
    pub fragment_buf: BytesMut,
    /// END_STREAM flag carried by the HEADERS frame that opened the
    /// buffered fragment sequence.
    pub fragment_end_stream: bool,

    // Outbound body.
    body_data: Option<Bytes>,
    multipart: Option<MultipartForm>,
    pub body_offset: usize,
    pub end_stream_sent: bool,
    pub outbound_trailers: Vec<Header>,

    completion: Option<Completion>,
}

impl Stream {
    pub fn new(
        id: u32,
        tx_window: i64,
        rx_window: i64,
        body: Option<Bytes>,
        multipart: Option<MultipartForm>,
        outbound_trailers: Vec<Header>,
        completion: Completion,
    ) -> Self {
        Self {
            id,
            state: StreamState::ExpectingHeaders,
            tx_window,
            rx_window,
            status: None,
            headers: Vec::new(),
            trailers: None,
            body: BytesMut::new(),
            content_length: None,
            fragment_buf: BytesMut::new(),
            fragment_end_stream: false,
            body_data: body,
            multipart,
            body_offset: 0,
            end_stream_sent: false,
            outbound_trailers,
            completion: Some(completion),
        }
    }

    pub fn has_outbound_body(&self) -> bool {
        self.body_data.is_some() || self.multipart.is_some()
    }

    pub fn has_outbound_trailers(&self) -> bool {
        !self.outbound_trailers.is_empty()
    }

    /// The outbound body bytes, rendering a multipart form into memory on
    /// first use.
    pub fn outbound_body(&mut self) -> Bytes {
        if self.body_data.is_none() {
            if let Some(form) = &self.multipart {
                self.body_data = Some(form.render());
            }
        }
        self.body_data.clone().unwrap_or_else(Bytes::new)
    }

    /// Drop the rendered body buffer once it is fully on the wire.
    pub fn release_outbound_body(&mut self) {
        self.body_data = None;
        self.multipart = None;
    }

    /// Complete the exchange. The first call consumes the channel; any
    /// later call is a no-op, which is what makes completion exactly-once.
    pub fn finish(&mut self, result: Result<Response, ProtocolError>) {
        self.state = StreamState::Finished;
        if let Some(tx) = self.completion.take() {
            // The caller may have dropped the receiver; that is not an error.
            let _ = tx.send(result);
        }
    }

    /// Assemble the accumulated response.
    pub fn take_response(&mut self) -> Response {
        Response {
            status: self.status.unwrap_or(0),
            protocol: HTTP_VERSION_2_0.to_string(),
            headers: std::mem::take(&mut self.headers),
            body: std::mem::take(&mut self.body).freeze(),
            trailers: self.trailers.take(),
        }
    }
}
