//! Connection-level HTTP/2 state machine.
//!
//! `H2Transport` is sans-IO: inbound bytes are fed through [`recv`],
//! outbound bytes accumulate in a batched buffer drained with
//! [`take_pending_send`]. The async connection wrapper owns the socket
//! and flushes after every top-level operation, so frame send order
//! matches call order and each operation ends with one flush.
//!
//! All state lives behind `&mut self` on a single owner; there is no
//! locking anywhere in the transport.
//!
//! [`recv`]: H2Transport::recv
//! [`take_pending_send`]: H2Transport::take_pending_send

use std::collections::{HashMap, VecDeque};

use bytes::{Buf, Bytes, BytesMut};
use tokio::sync::oneshot;

use crate::h2::consts::*;
use crate::h2::framing::{
    parse_frame, ContinuationFrame, DataFrame, Frame, GoAwayFrame, HeadersFrame, ParsedFrame,
    PingFrame, RstStreamFrame, SettingsFrame, WindowUpdateFrame,
};
use crate::h2::hpack::{Decoder, Encoder, HeaderField, HpackError};
use crate::h2::stream::{Completion, CompletionReceiver, Stream, StreamState};
use crate::types::{
    H2ConnectionErrorKind, H2ErrorCode, H2StreamErrorKind, Header, PreparedRequest, ProtocolError,
};
use crate::utils::{header_value, CONNECTION_HEADER, CONTENT_LENGTH_HEADER, HOST_HEADER};

/// Trailer blocks must not smuggle in message-framing or routing headers
/// (RFC 7230 Section 4.1.2).
const BANNED_TRAILER_HEADERS: &[&str] = &[
    "content-length",
    "host",
    "cache-control",
    "expect",
    "max-forwards",
    "pragma",
    "range",
    "te",
    "authorization",
    "set-cookie",
    "content-encoding",
    "content-type",
    "content-range",
    "trailer",
];

/// Request headers encoded as never-indexed literals so their values stay
/// out of both HPACK dynamic tables.
const SENSITIVE_HEADERS: &[&str] = &["authorization", "proxy-authorization", "cookie", "set-cookie"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransportState {
    Open,
    /// GOAWAY seen; streams at or below the peer's last id may finish,
    /// nothing new starts.
    Closing,
    Closed,
}

struct BufferedRequest {
    prepared: PreparedRequest,
    completion: Completion,
}

pub struct H2Transport {
    state: TransportState,
    is_tls: bool,

    next_stream_id: u32,
    streams: HashMap<u32, Stream>,
    buffered_requests: VecDeque<BufferedRequest>,
    /// Streams whose body is blocked on flow control, in the order they
    /// blocked. Resumption always walks from the front.
    pending_data_send: Vec<u32>,

    /// Unbounded until the peer's first SETTINGS says otherwise.
    max_concurrent_streams: Option<u32>,
    max_frame_size: usize,
    /// Peer's SETTINGS_INITIAL_WINDOW_SIZE; seeds new streams' tx windows.
    peer_initial_window: u32,
    /// What we advertise as SETTINGS_INITIAL_WINDOW_SIZE; seeds rx windows.
    local_initial_window: u32,
    /// Connection-level windows, 31-bit signed semantics.
    tx_window: i64,
    rx_window: i64,

    first_settings_received: bool,
    first_initial_window_received: bool,
    /// Nonzero while a header block is split across CONTINUATION frames;
    /// no other HEADERS/CONTINUATION may interleave.
    expecting_continuation_stream_id: u32,
    goaway_received: bool,
    reconnection_issued: bool,
    reconnect_requested: bool,
    close_reason: Option<H2ConnectionErrorKind>,

    encoder: Encoder,
    decoder: Decoder,

    recv_buf: BytesMut,
    out: BytesMut,
    bytes_sent: u64,
    bytes_received: u64,
}

impl H2Transport {
    pub fn new(is_tls: bool) -> Self {
        Self::with_recv_window(is_tls, DESIRED_RECV_WINDOW)
    }

    /// Build a transport advertising `recv_window` as the per-stream
    /// receive window. The connection preface and initial SETTINGS are
    /// queued immediately.
    pub fn with_recv_window(is_tls: bool, recv_window: u32) -> Self {
        let mut transport = Self {
            state: TransportState::Open,
            is_tls,
            next_stream_id: 1,
            streams: HashMap::new(),
            buffered_requests: VecDeque::new(),
            pending_data_send: Vec::new(),
            max_concurrent_streams: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE as usize,
            peer_initial_window: DEFAULT_INITIAL_WINDOW_SIZE,
            local_initial_window: recv_window,
            tx_window: DEFAULT_INITIAL_WINDOW_SIZE as i64,
            rx_window: DEFAULT_INITIAL_WINDOW_SIZE as i64,
            first_settings_received: false,
            first_initial_window_received: false,
            expecting_continuation_stream_id: 0,
            goaway_received: false,
            reconnection_issued: false,
            reconnect_requested: false,
            close_reason: None,
            encoder: Encoder::new(DEFAULT_HEADER_TABLE_SIZE as usize),
            decoder: Decoder::new(DEFAULT_HEADER_TABLE_SIZE as usize),
            recv_buf: BytesMut::new(),
            out: BytesMut::new(),
            bytes_sent: 0,
            bytes_received: 0,
        };
        transport.send_preface();
        transport
    }

    fn send_preface(&mut self) {
        let before = self.out.len();
        self.out.extend_from_slice(CONNECTION_PREFACE);
        SettingsFrame::new(vec![
            (SETTINGS_HEADER_TABLE_SIZE, DEFAULT_HEADER_TABLE_SIZE),
            (SETTINGS_ENABLE_PUSH, 0),
            (SETTINGS_INITIAL_WINDOW_SIZE, self.local_initial_window),
            (SETTINGS_MAX_FRAME_SIZE, DEFAULT_MAX_FRAME_SIZE),
        ])
        .serialize(&mut self.out);
        self.note_sent(before);
    }

    // -- Outbound dispatch --

    /// Submit a request. At the concurrency limit the request queues and
    /// is dispatched FIFO as streams complete. The returned receiver
    /// resolves exactly once, whatever happens to the stream.
    pub fn dispatch(
        &mut self,
        prepared: PreparedRequest,
    ) -> Result<CompletionReceiver, ProtocolError> {
        if self.state != TransportState::Open {
            return Err(ProtocolError::ConnectionFailed(
                "HTTP/2 connection is shut down".to_string(),
            ));
        }
        let (tx, rx) = oneshot::channel();
        if self.has_capacity() {
            self.start_stream(prepared, tx);
        } else {
            log::debug!(
                "at concurrency limit ({:?}); buffering request",
                self.max_concurrent_streams
            );
            self.buffered_requests.push_back(BufferedRequest {
                prepared,
                completion: tx,
            });
        }
        Ok(rx)
    }

    fn has_capacity(&self) -> bool {
        match self.max_concurrent_streams {
            Some(limit) => (self.streams.len() as u64) < u64::from(limit),
            None => true,
        }
    }

    fn start_stream(&mut self, prepared: PreparedRequest, completion: Completion) {
        let fields = match self.build_header_fields(&prepared) {
            Ok(fields) => fields,
            Err(err) => {
                let _ = completion.send(Err(err));
                return;
            }
        };

        if self.next_stream_id > MAX_STREAM_ID {
            let _ = completion.send(Err(ProtocolError::H2ConnectionError(
                H2ConnectionErrorKind::StreamIdExhausted,
            )));
            self.force_close("stream id space exhausted");
            return;
        }
        let stream_id = self.next_stream_id;
        self.next_stream_id += 2;

        let block = self.encoder.encode(&fields);

        let body = prepared.body.filter(|b| !b.is_empty());
        let has_body = body.is_some() || prepared.multipart.is_some();
        let has_trailers = !prepared.trailers.is_empty();
        let end_stream = !has_body && !has_trailers;

        log::debug!(
            "stream {}: {} {} ({} header bytes)",
            stream_id,
            prepared.method,
            prepared.path,
            block.len()
        );
        self.write_header_block(stream_id, block, end_stream);

        let mut stream = Stream::new(
            stream_id,
            i64::from(self.peer_initial_window),
            i64::from(self.local_initial_window),
            body,
            prepared.multipart,
            prepared.trailers,
            completion,
        );

        if end_stream {
            stream.end_stream_sent = true;
            self.streams.insert(stream_id, stream);
        } else if !has_body {
            // Trailers but no body: the trailing block follows directly.
            let fields = trailer_fields(&stream.outbound_trailers);
            let trailer_block = self.encoder.encode(&fields);
            self.write_header_block(stream_id, trailer_block, true);
            stream.outbound_trailers.clear();
            stream.end_stream_sent = true;
            self.streams.insert(stream_id, stream);
        } else {
            self.streams.insert(stream_id, stream);
            if !self.send_body_for_stream(stream_id) {
                self.pending_data_send.push(stream_id);
            }
        }
    }

    /// Pseudo-headers first, then the request headers minus `host` and
    /// `connection`. `:scheme` comes from the connection's TLS state;
    /// `:authority` prefers an explicit Host header.
    fn build_header_fields(
        &self,
        prepared: &PreparedRequest,
    ) -> Result<Vec<HeaderField>, ProtocolError> {
        let mut fields = Vec::with_capacity(prepared.headers.len() + 4);
        let method = prepared.method.to_ascii_uppercase();
        fields.push(HeaderField::new(&b":method"[..], method.as_bytes()));

        if method != "CONNECT" {
            fields.push(HeaderField::new(&b":path"[..], prepared.path.as_bytes()));
            let scheme: &[u8] = if self.is_tls { b"https" } else { b"http" };
            fields.push(HeaderField::new(&b":scheme"[..], scheme));
        }

        let authority = header_value(&prepared.headers, HOST_HEADER)
            .map(str::to_string)
            .or_else(|| prepared.authority.clone());
        if let Some(authority) = authority {
            fields.push(HeaderField::new(&b":authority"[..], authority.as_bytes()));
        }

        for header in &prepared.headers {
            let name = header.name.to_ascii_lowercase();
            if name == HOST_HEADER || name == CONNECTION_HEADER {
                continue;
            }
            let value = header.value_str();
            if name.bytes().any(|b| matches!(b, b'\r' | b'\n' | b'\0' | b' '))
                || value.bytes().any(|b| matches!(b, b'\r' | b'\n' | b'\0'))
            {
                return Err(ProtocolError::MalformedHeaders(format!(
                    "control characters in header '{}'",
                    header.name
                )));
            }
            let field = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                HeaderField::sensitive(name.into_bytes(), value.as_bytes().to_vec())
            } else {
                HeaderField::new(name.into_bytes(), value.as_bytes().to_vec())
            };
            fields.push(field);
        }

        Ok(fields)
    }

    /// Split an encoded header block into HEADERS + CONTINUATION frames
    /// bounded by the peer's max frame size. END_HEADERS goes on the last
    /// fragment, END_STREAM (if requested) on the HEADERS frame.
    fn write_header_block(&mut self, stream_id: u32, block: Bytes, end_stream: bool) {
        let before = self.out.len();
        let mut rest = block;
        let mut first = true;
        loop {
            let take = rest.len().min(self.max_frame_size);
            let fragment = rest.split_to(take);
            let last = rest.is_empty();
            if first {
                HeadersFrame::new(fragment, last, end_stream).serialize(stream_id, &mut self.out);
            } else {
                ContinuationFrame::new(fragment, last).serialize(stream_id, &mut self.out);
            }
            if last {
                break;
            }
            first = false;
        }
        self.note_sent(before);
    }

    // -- Body sending and flow control --

    /// Send as much of the stream's body as both windows allow. Returns
    /// true once the body (and any trailers) are fully written.
    fn send_body_for_stream(&mut self, stream_id: u32) -> bool {
        let Some(mut stream) = self.streams.remove(&stream_id) else {
            return true;
        };
        let fully = self.send_body_inner(&mut stream);
        self.streams.insert(stream_id, stream);
        fully
    }

    fn send_body_inner(&mut self, stream: &mut Stream) -> bool {
        if stream.end_stream_sent {
            return true;
        }
        let body = stream.outbound_body();
        let total = body.len();
        let has_trailers = stream.has_outbound_trailers();
        let before = self.out.len();

        while stream.body_offset < total {
            let budget = stream
                .tx_window
                .min(self.tx_window)
                .clamp(0, (total - stream.body_offset) as i64) as usize;
            if budget == 0 {
                break;
            }
            let chunk_len = budget.min(self.max_frame_size);
            let chunk = body.slice(stream.body_offset..stream.body_offset + chunk_len);
            let last = stream.body_offset + chunk_len == total;
            DataFrame::new(chunk, last && !has_trailers).serialize(stream.id, &mut self.out);
            stream.tx_window -= chunk_len as i64;
            self.tx_window -= chunk_len as i64;
            stream.body_offset += chunk_len;
        }
        self.note_sent(before);

        let fully = stream.body_offset == total;
        if fully {
            stream.release_outbound_body();
            if has_trailers {
                let fields = trailer_fields(&stream.outbound_trailers);
                let block = self.encoder.encode(&fields);
                self.write_header_block(stream.id, block, true);
                stream.outbound_trailers.clear();
            }
            stream.end_stream_sent = true;
        }
        fully
    }

    /// Strict-FIFO resumption of flow-blocked streams after connection
    /// window credit arrives.
    fn resume_pending_sends(&mut self) {
        let mut index = 0;
        while index < self.pending_data_send.len() {
            if self.tx_window <= 0 {
                break;
            }
            let stream_id = self.pending_data_send[index];
            if self.send_body_for_stream(stream_id) {
                self.pending_data_send.remove(index);
            } else {
                index += 1;
            }
        }
    }

    fn resume_stream_send(&mut self, stream_id: u32) {
        if !self.pending_data_send.contains(&stream_id) {
            return;
        }
        if self.tx_window > 0 && self.send_body_for_stream(stream_id) {
            self.pending_data_send.retain(|id| *id != stream_id);
        }
    }

    // -- Inbound processing --

    /// Feed received bytes. Parses as many complete frames as are
    /// buffered; a partial frame stalls until more bytes arrive. On a
    /// connection-fatal error every in-flight and buffered completion has
    /// already been failed by the time this returns `Err`; the caller
    /// still flushes the pending GOAWAY bytes.
    pub fn recv(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        if self.state == TransportState::Closed {
            return Ok(());
        }
        self.recv_buf.extend_from_slice(data);
        loop {
            self.maybe_update_connection_window();
            let parsed = match parse_frame(&self.recv_buf) {
                Ok(Some(parsed)) => parsed,
                Ok(None) => break,
                Err(err) => {
                    let code = match &err {
                        ProtocolError::H2FrameSizeError(_) => H2ErrorCode::FrameSizeError,
                        _ => H2ErrorCode::ProtocolError,
                    };
                    return Err(self.teardown(code, err));
                }
            };
            self.recv_buf.advance(parsed.consumed);
            self.bytes_received += parsed.consumed as u64;
            self.handle_parsed(parsed)?;
            if self.state == TransportState::Closed {
                break;
            }
        }
        self.maybe_request_reconnect();
        Ok(())
    }

    fn handle_parsed(&mut self, parsed: ParsedFrame) -> Result<(), ProtocolError> {
        let payload_len = parsed.payload_len();
        let stream_id = parsed.stream_id;

        if !self.first_settings_received {
            let is_settings = matches!(
                &parsed.frame,
                Some(Frame::Settings(settings)) if !settings.ack && stream_id == 0
            );
            if !is_settings {
                return self.fatal(
                    H2ErrorCode::ProtocolError,
                    "first frame on connection was not SETTINGS",
                );
            }
        }

        if self.expecting_continuation_stream_id != 0 {
            match &parsed.frame {
                Some(Frame::Continuation(_))
                    if stream_id == self.expecting_continuation_stream_id => {}
                Some(Frame::Headers(_)) | Some(Frame::Continuation(_)) => {
                    return self.fatal(
                        H2ErrorCode::ProtocolError,
                        "frame interleaved inside a CONTINUATION sequence",
                    );
                }
                _ => {}
            }
        }

        let Some(frame) = parsed.frame else {
            // Unknown frame type: consumed and ignored.
            return Ok(());
        };

        match frame {
            Frame::GoAway(goaway) => self.handle_goaway(goaway),
            Frame::Ping(ping) => {
                if !ping.ack {
                    self.send_ping_ack(ping.data);
                }
                Ok(())
            }
            Frame::PushPromise(_) => self.fatal(
                H2ErrorCode::ProtocolError,
                "PUSH_PROMISE received but server push is disabled",
            ),
            Frame::Priority(_) => Ok(()),
            frame if stream_id == 0 => self.handle_connection_frame(frame),
            frame => self.handle_stream_frame(stream_id, frame, payload_len),
        }
    }

    fn handle_connection_frame(&mut self, frame: Frame) -> Result<(), ProtocolError> {
        match frame {
            Frame::Settings(settings) => self.handle_settings(settings),
            Frame::WindowUpdate(update) => {
                let increment = i64::from(update.increment);
                if self.tx_window + increment > MAX_WINDOW_SIZE {
                    return Err(self.teardown(
                        H2ErrorCode::FlowControlError,
                        ProtocolError::H2ConnectionError(
                            H2ConnectionErrorKind::FlowControlViolation(
                                "connection send window overflow".to_string(),
                            ),
                        ),
                    ));
                }
                self.tx_window += increment;
                self.resume_pending_sends();
                Ok(())
            }
            Frame::Data(_) | Frame::Headers(_) | Frame::Continuation(_) | Frame::RstStream(_) => {
                self.fatal(H2ErrorCode::ProtocolError, "stream frame on stream 0")
            }
            _ => Ok(()),
        }
    }

    fn handle_settings(&mut self, settings: SettingsFrame) -> Result<(), ProtocolError> {
        if settings.ack {
            return Ok(());
        }
        for (id, value) in settings.entries {
            match id {
                SETTINGS_HEADER_TABLE_SIZE => {
                    let clamped = value.min(HEADER_TABLE_SIZE_CEILING);
                    // The encoder emits the matching table-size-update
                    // instruction at the front of the next header block.
                    self.encoder.set_max_table_size(clamped as usize);
                }
                SETTINGS_ENABLE_PUSH => {
                    // We never accept pushes regardless of this value.
                }
                SETTINGS_MAX_CONCURRENT_STREAMS => {
                    // 0 is legal: requests queue until the peer raises it.
                    self.max_concurrent_streams = Some(value);
                }
                SETTINGS_INITIAL_WINDOW_SIZE => {
                    if i64::from(value) > MAX_WINDOW_SIZE {
                        return Err(self.teardown(
                            H2ErrorCode::FlowControlError,
                            ProtocolError::H2ConnectionError(
                                H2ConnectionErrorKind::FlowControlViolation(
                                    "INITIAL_WINDOW_SIZE exceeds 2^31-1".to_string(),
                                ),
                            ),
                        ));
                    }
                    if self.first_initial_window_received {
                        // RFC 7540 Section 6.9.2: later changes adjust
                        // every open stream's window by the delta, which
                        // may drive them negative.
                        let delta = i64::from(value) - i64::from(self.peer_initial_window);
                        for stream in self.streams.values_mut() {
                            stream.tx_window += delta;
                        }
                    } else {
                        self.first_initial_window_received = true;
                    }
                    self.peer_initial_window = value;
                }
                SETTINGS_MAX_FRAME_SIZE => {
                    if !(MAX_FRAME_SIZE_LOWER_BOUND..=MAX_FRAME_SIZE_UPPER_BOUND).contains(&value)
                    {
                        return self
                            .fatal(H2ErrorCode::ProtocolError, "MAX_FRAME_SIZE out of range");
                    }
                    self.max_frame_size = value as usize;
                }
                SETTINGS_MAX_HEADER_LIST_SIZE => {
                    // Advisory; not enforced on our side.
                }
                _ => {
                    // Unknown settings are ignored (RFC 7540 Section 6.5.2).
                }
            }
        }
        self.send_settings_ack();
        self.first_settings_received = true;
        // A raised concurrency limit may free slots for queued requests.
        self.dispatch_buffered();
        Ok(())
    }

    fn handle_goaway(&mut self, goaway: GoAwayFrame) -> Result<(), ProtocolError> {
        let code = H2ErrorCode::from(goaway.error_code);
        let debug = String::from_utf8_lossy(&goaway.debug_data).to_string();
        log::debug!(
            "GOAWAY received: last_stream_id={} code={}",
            goaway.last_stream_id,
            code
        );
        self.goaway_received = true;
        self.close_reason = Some(H2ConnectionErrorKind::GoAway(code, debug));

        // The peer accepts no new streams; queued requests cannot run.
        while let Some(buffered) = self.buffered_requests.pop_front() {
            let _ = buffered.completion.send(Err(ProtocolError::H2StreamError(
                H2StreamErrorKind::BadResponse(
                    "connection is shutting down (GOAWAY)".to_string(),
                ),
            )));
        }

        // Streams above the acknowledged id will never be processed.
        let mut abandoned: Vec<u32> = self
            .streams
            .keys()
            .copied()
            .filter(|id| *id > goaway.last_stream_id)
            .collect();
        abandoned.sort_unstable();
        for stream_id in abandoned {
            if let Some(mut stream) = self.streams.remove(&stream_id) {
                stream.finish(Err(ProtocolError::H2StreamError(
                    H2StreamErrorKind::BadResponse(format!(
                        "GOAWAY: stream {} not processed by peer",
                        stream_id
                    )),
                )));
            }
            self.pending_data_send.retain(|id| *id != stream_id);
        }

        if self.streams.is_empty() {
            self.state = TransportState::Closed;
        } else {
            self.state = TransportState::Closing;
        }
        Ok(())
    }

    fn handle_stream_frame(
        &mut self,
        stream_id: u32,
        frame: Frame,
        payload_len: usize,
    ) -> Result<(), ProtocolError> {
        if !self.streams.contains_key(&stream_id) {
            // A reset racing with our own completion is tolerated; any
            // other frame for a stream we do not know is fatal.
            if matches!(frame, Frame::RstStream(_)) && stream_id < self.next_stream_id {
                return Ok(());
            }
            return self.fatal(
                H2ErrorCode::ProtocolError,
                "frame addressed to unknown stream",
            );
        }

        match frame {
            Frame::Headers(headers) => self.handle_headers(stream_id, headers),
            Frame::Continuation(continuation) => self.handle_continuation(stream_id, continuation),
            Frame::Data(data) => self.handle_data(stream_id, data, payload_len),
            Frame::WindowUpdate(update) => {
                let increment = i64::from(update.increment);
                let tx_window = self.streams[&stream_id].tx_window;
                if tx_window + increment > MAX_WINDOW_SIZE {
                    self.fail_stream(stream_id, H2StreamErrorKind::FlowControlViolation, true);
                    return Ok(());
                }
                if let Some(stream) = self.streams.get_mut(&stream_id) {
                    stream.tx_window += increment;
                }
                if self.tx_window > 0 {
                    self.resume_stream_send(stream_id);
                }
                Ok(())
            }
            Frame::RstStream(rst) => {
                let code = H2ErrorCode::from(rst.error_code);
                log::debug!("stream {} reset by peer: {}", stream_id, code);
                self.fail_stream(stream_id, H2StreamErrorKind::Reset(code), false);
                Ok(())
            }
            _ => self.fatal(
                H2ErrorCode::ProtocolError,
                "connection-level frame on a stream",
            ),
        }
    }

    fn handle_headers(
        &mut self,
        stream_id: u32,
        headers: HeadersFrame,
    ) -> Result<(), ProtocolError> {
        let state = self.streams[&stream_id].state;
        let is_trailers = match state {
            StreamState::ExpectingHeaders => false,
            StreamState::ExpectingData => true,
            _ => {
                return self.fatal(
                    H2ErrorCode::ProtocolError,
                    "HEADERS in unexpected stream state",
                )
            }
        };

        if headers.end_headers {
            if is_trailers && !headers.end_stream {
                return self.fatal(
                    H2ErrorCode::ProtocolError,
                    "trailer block without END_STREAM",
                );
            }
            let fields = match self.decoder.decode(&headers.header_block) {
                Ok(fields) => fields,
                Err(err) => return Err(self.teardown_hpack(err)),
            };
            self.process_header_fields(stream_id, fields, headers.end_stream, is_trailers)
        } else {
            if let Some(stream) = self.streams.get_mut(&stream_id) {
                stream.fragment_buf.extend_from_slice(&headers.header_block);
                stream.fragment_end_stream = headers.end_stream;
                stream.state = if is_trailers {
                    StreamState::ExpectingContinuationTrailers
                } else {
                    StreamState::ExpectingContinuation
                };
            }
            self.expecting_continuation_stream_id = stream_id;
            Ok(())
        }
    }

    fn handle_continuation(
        &mut self,
        stream_id: u32,
        continuation: ContinuationFrame,
    ) -> Result<(), ProtocolError> {
        let state = self.streams[&stream_id].state;
        let is_trailers = match state {
            StreamState::ExpectingContinuation => false,
            StreamState::ExpectingContinuationTrailers => true,
            _ => {
                return self.fatal(
                    H2ErrorCode::ProtocolError,
                    "CONTINUATION without an open header block",
                )
            }
        };

        if let Some(stream) = self.streams.get_mut(&stream_id) {
            stream
                .fragment_buf
                .extend_from_slice(&continuation.header_block);
        }
        if !continuation.end_headers {
            return Ok(());
        }

        self.expecting_continuation_stream_id = 0;
        let (block, end_stream) = match self.streams.get_mut(&stream_id) {
            Some(stream) => (
                std::mem::take(&mut stream.fragment_buf).freeze(),
                stream.fragment_end_stream,
            ),
            None => return Ok(()),
        };
        if is_trailers && !end_stream {
            return self.fatal(
                H2ErrorCode::ProtocolError,
                "trailer block without END_STREAM",
            );
        }
        let fields = match self.decoder.decode(&block) {
            Ok(fields) => fields,
            Err(err) => return Err(self.teardown_hpack(err)),
        };
        self.process_header_fields(stream_id, fields, end_stream, is_trailers)
    }

    fn process_header_fields(
        &mut self,
        stream_id: u32,
        fields: Vec<HeaderField>,
        end_stream: bool,
        is_trailers: bool,
    ) -> Result<(), ProtocolError> {
        for field in &fields {
            if let Err(msg) = validate_field_octets(&field.name, &field.value) {
                self.fail_stream(stream_id, H2StreamErrorKind::InvalidHeaders(msg), true);
                return Ok(());
            }
        }

        if is_trailers {
            let mut trailers = Vec::with_capacity(fields.len());
            for field in fields {
                let name = String::from_utf8_lossy(&field.name).to_string();
                if name.starts_with(':') {
                    self.fail_stream(
                        stream_id,
                        H2StreamErrorKind::InvalidHeaders(format!(
                            "pseudo-header '{}' in trailers",
                            name
                        )),
                        true,
                    );
                    return Ok(());
                }
                if BANNED_TRAILER_HEADERS.contains(&name.as_str()) {
                    self.fail_stream(
                        stream_id,
                        H2StreamErrorKind::InvalidHeaders(format!(
                            "'{}' is not allowed in trailers",
                            name
                        )),
                        true,
                    );
                    return Ok(());
                }
                let value = String::from_utf8_lossy(&field.value).to_string();
                trailers.push(Header::new(name, value));
            }
            // A trailer block always carries END_STREAM (checked by the
            // callers), so the stream completes here.
            let declared = self.streams.get(&stream_id).and_then(|s| s.content_length);
            let received = self.streams.get(&stream_id).map_or(0, |s| s.body.len()) as u64;
            if let Some(stream) = self.streams.get_mut(&stream_id) {
                stream.trailers = Some(trailers);
            }
            if let Some(declared) = declared {
                if declared != received {
                    self.fail_stream(
                        stream_id,
                        H2StreamErrorKind::ContentLengthMismatch { declared, received },
                        true,
                    );
                    return Ok(());
                }
            }
            self.complete_stream(stream_id);
            return Ok(());
        }

        let mut status: Option<u16> = None;
        let mut content_length: Option<u64> = None;
        let mut response_headers = Vec::with_capacity(fields.len());
        for field in fields {
            let name = String::from_utf8_lossy(&field.name).to_string();
            let value = String::from_utf8_lossy(&field.value).to_string();
            if name == ":status" {
                match value.parse::<u16>() {
                    Ok(code) if (100..=599).contains(&code) => status = Some(code),
                    _ => {
                        self.fail_stream(
                            stream_id,
                            H2StreamErrorKind::InvalidHeaders(format!(
                                "invalid :status value '{}'",
                                value
                            )),
                            true,
                        );
                        return Ok(());
                    }
                }
            } else if name.starts_with(':') {
                self.fail_stream(
                    stream_id,
                    H2StreamErrorKind::InvalidHeaders(format!(
                        "unexpected response pseudo-header '{}'",
                        name
                    )),
                    true,
                );
                return Ok(());
            } else {
                if name == CONTENT_LENGTH_HEADER {
                    match value.parse::<u64>() {
                        Ok(length) => content_length = Some(length),
                        Err(_) => {
                            self.fail_stream(
                                stream_id,
                                H2StreamErrorKind::InvalidHeaders(format!(
                                    "invalid content-length '{}'",
                                    value
                                )),
                                true,
                            );
                            return Ok(());
                        }
                    }
                }
                response_headers.push(Header::new(name, value));
            }
        }

        let Some(status) = status else {
            self.fail_stream(
                stream_id,
                H2StreamErrorKind::InvalidHeaders("response is missing :status".to_string()),
                true,
            );
            return Ok(());
        };

        if status < 200 {
            // Interim response: discarded, the final headers are still due.
            if end_stream {
                self.fail_stream(
                    stream_id,
                    H2StreamErrorKind::InvalidHeaders(
                        "interim response carried END_STREAM".to_string(),
                    ),
                    true,
                );
            } else if let Some(stream) = self.streams.get_mut(&stream_id) {
                stream.state = StreamState::ExpectingHeaders;
            }
            return Ok(());
        }

        if let Some(stream) = self.streams.get_mut(&stream_id) {
            stream.status = Some(status);
            stream.headers = response_headers;
            stream.content_length = content_length;
        }

        if end_stream {
            if let Some(declared) = content_length {
                if declared != 0 {
                    self.fail_stream(
                        stream_id,
                        H2StreamErrorKind::ContentLengthMismatch {
                            declared,
                            received: 0,
                        },
                        true,
                    );
                    return Ok(());
                }
            }
            self.complete_stream(stream_id);
        } else if let Some(stream) = self.streams.get_mut(&stream_id) {
            stream.state = StreamState::ExpectingData;
        }
        Ok(())
    }

    fn handle_data(
        &mut self,
        stream_id: u32,
        data: DataFrame,
        payload_len: usize,
    ) -> Result<(), ProtocolError> {
        if self.streams[&stream_id].state != StreamState::ExpectingData {
            return self.fatal(H2ErrorCode::ProtocolError, "DATA before response headers");
        }

        // Flow control covers the whole payload, padding included. Both
        // windows are checked before either is charged.
        let charged = payload_len as i64;
        if charged > self.rx_window {
            return Err(self.teardown(
                H2ErrorCode::FlowControlError,
                ProtocolError::H2ConnectionError(H2ConnectionErrorKind::FlowControlViolation(
                    "DATA exceeds connection receive window".to_string(),
                )),
            ));
        }
        if charged > self.streams[&stream_id].rx_window {
            self.fail_stream(stream_id, H2StreamErrorKind::FlowControlViolation, true);
            return Ok(());
        }
        self.rx_window -= charged;
        if let Some(stream) = self.streams.get_mut(&stream_id) {
            stream.rx_window -= charged;
            stream.body.extend_from_slice(&data.data);
        }

        if data.end_stream {
            let declared = self.streams.get(&stream_id).and_then(|s| s.content_length);
            let received = self.streams.get(&stream_id).map_or(0, |s| s.body.len()) as u64;
            if let Some(declared) = declared {
                if declared != received {
                    self.fail_stream(
                        stream_id,
                        H2StreamErrorKind::ContentLengthMismatch { declared, received },
                        true,
                    );
                    return Ok(());
                }
            }
            self.complete_stream(stream_id);
        } else {
            let rx_window = self.streams[&stream_id].rx_window;
            let target = i64::from(self.local_initial_window);
            if rx_window < target / 2 {
                let increment = (target - rx_window) as u32;
                self.send_window_update(stream_id, increment);
                if let Some(stream) = self.streams.get_mut(&stream_id) {
                    stream.rx_window = target;
                }
            }
        }
        Ok(())
    }

    // -- Stream completion and failure --

    fn complete_stream(&mut self, stream_id: u32) {
        if let Some(mut stream) = self.streams.remove(&stream_id) {
            let response = stream.take_response();
            log::debug!(
                "stream {} complete: {} ({} body bytes)",
                stream_id,
                response.status,
                response.body.len()
            );
            stream.finish(Ok(response));
        }
        self.pending_data_send.retain(|id| *id != stream_id);
        self.after_stream_removed();
    }

    fn fail_stream(&mut self, stream_id: u32, kind: H2StreamErrorKind, send_rst: bool) {
        if let Some(mut stream) = self.streams.remove(&stream_id) {
            if send_rst {
                let code = match &kind {
                    H2StreamErrorKind::FlowControlViolation => H2ErrorCode::FlowControlError,
                    _ => H2ErrorCode::ProtocolError,
                };
                self.send_rst(stream_id, code);
            }
            log::debug!("stream {} failed: {}", stream_id, kind);
            stream.finish(Err(ProtocolError::H2StreamError(kind)));
        }
        if self.expecting_continuation_stream_id == stream_id {
            self.expecting_continuation_stream_id = 0;
        }
        self.pending_data_send.retain(|id| *id != stream_id);
        self.after_stream_removed();
    }

    fn after_stream_removed(&mut self) {
        if self.state == TransportState::Closing && self.streams.is_empty() {
            self.state = TransportState::Closed;
        } else if self.state == TransportState::Open {
            self.dispatch_buffered();
        }
    }

    fn dispatch_buffered(&mut self) {
        while self.state == TransportState::Open && self.has_capacity() {
            let Some(buffered) = self.buffered_requests.pop_front() else {
                break;
            };
            self.start_stream(buffered.prepared, buffered.completion);
        }
    }

    // -- Teardown --

    fn fatal(&mut self, code: H2ErrorCode, msg: &str) -> Result<(), ProtocolError> {
        Err(self.teardown(
            code,
            ProtocolError::H2ConnectionError(H2ConnectionErrorKind::ProtocolViolation(
                msg.to_string(),
            )),
        ))
    }

    fn teardown_hpack(&mut self, err: HpackError) -> ProtocolError {
        self.teardown(
            H2ErrorCode::CompressionError,
            ProtocolError::H2CompressionError(err),
        )
    }

    /// Connection-fatal path: GOAWAY, fail every completion exactly once,
    /// close. Returns the error for the caller to propagate.
    fn teardown(&mut self, code: H2ErrorCode, err: ProtocolError) -> ProtocolError {
        if self.state != TransportState::Closed {
            log::debug!("connection teardown: {} ({})", err, code);
            self.send_goaway(code);
            self.fail_all(&err.to_string());
            if self.close_reason.is_none() {
                self.close_reason = Some(H2ConnectionErrorKind::ProtocolViolation(err.to_string()));
            }
            self.state = TransportState::Closed;
        }
        err
    }

    /// Immediate close without GOAWAY (stream-id exhaustion, I/O death).
    pub fn force_close(&mut self, reason: &str) {
        if self.state != TransportState::Closed {
            log::debug!("force close: {}", reason);
            self.fail_all(reason);
            self.state = TransportState::Closed;
        }
    }

    fn fail_all(&mut self, reason: &str) {
        let stream_ids: Vec<u32> = self.streams.keys().copied().collect();
        for stream_id in stream_ids {
            if let Some(mut stream) = self.streams.remove(&stream_id) {
                stream.finish(Err(ProtocolError::H2StreamError(
                    H2StreamErrorKind::BadResponse(reason.to_string()),
                )));
            }
        }
        while let Some(buffered) = self.buffered_requests.pop_front() {
            let _ = buffered.completion.send(Err(ProtocolError::H2StreamError(
                H2StreamErrorKind::BadResponse(reason.to_string()),
            )));
        }
        self.pending_data_send.clear();
        self.expecting_continuation_stream_id = 0;
    }

    /// Graceful self-initiated shutdown (used for id-space recycling).
    pub fn begin_graceful_shutdown(&mut self) {
        if self.state == TransportState::Closed {
            return;
        }
        self.send_goaway(H2ErrorCode::NoError);
        self.fail_all("connection recycled");
        self.state = TransportState::Closed;
    }

    // -- Window upkeep and reconnection --

    /// Keep the peer unblocked: top the connection receive window back up
    /// as soon as it drops below half the desired level.
    fn maybe_update_connection_window(&mut self) {
        if self.state != TransportState::Open {
            return;
        }
        let target = i64::from(self.local_initial_window);
        if self.rx_window < target / 2 {
            let increment = (target - self.rx_window) as u32;
            self.send_window_update(0, increment);
            self.rx_window = target;
        }
    }

    /// Near id exhaustion with nothing in flight, ask the owner to
    /// reconnect so the id space starts over. Deferred: the owner acts on
    /// the flag after this recv pass, never mid-loop.
    fn maybe_request_reconnect(&mut self) {
        if self.reconnection_issued || self.state != TransportState::Open {
            return;
        }
        let remaining = MAX_STREAM_ID.saturating_sub(self.next_stream_id) / 2;
        if remaining < STREAM_ID_EXHAUSTION_MARGIN
            && self.streams.is_empty()
            && self.buffered_requests.is_empty()
        {
            self.reconnection_issued = true;
            self.reconnect_requested = true;
        }
    }

    // -- Frame emission helpers --

    fn note_sent(&mut self, before: usize) {
        self.bytes_sent += (self.out.len() - before) as u64;
    }

    fn send_settings_ack(&mut self) {
        let before = self.out.len();
        SettingsFrame::ack().serialize(&mut self.out);
        self.note_sent(before);
    }

    pub fn send_ping(&mut self, data: [u8; 8]) {
        let before = self.out.len();
        PingFrame::new(data).serialize(&mut self.out);
        self.note_sent(before);
    }

    fn send_ping_ack(&mut self, data: [u8; 8]) {
        let before = self.out.len();
        PingFrame::ack(data).serialize(&mut self.out);
        self.note_sent(before);
    }

    fn send_window_update(&mut self, stream_id: u32, increment: u32) {
        let before = self.out.len();
        WindowUpdateFrame::new(increment).serialize(stream_id, &mut self.out);
        self.note_sent(before);
    }

    fn send_rst(&mut self, stream_id: u32, code: H2ErrorCode) {
        let before = self.out.len();
        RstStreamFrame::new(code as u32).serialize(stream_id, &mut self.out);
        self.note_sent(before);
    }

    fn send_goaway(&mut self, code: H2ErrorCode) {
        let before = self.out.len();
        // We never accept pushed streams, so the peer's last processed
        // server-initiated id is always 0.
        GoAwayFrame::new(0, code as u32, Bytes::new()).serialize(&mut self.out);
        self.note_sent(before);
    }

    // -- Accessors --

    /// Drain the batched outbound buffer.
    pub fn take_pending_send(&mut self) -> Bytes {
        self.out.split().freeze()
    }

    pub fn has_pending_send(&self) -> bool {
        !self.out.is_empty()
    }

    pub fn handshake_complete(&self) -> bool {
        self.first_settings_received
    }

    pub fn is_open(&self) -> bool {
        self.state == TransportState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state == TransportState::Closed
    }

    pub fn reconnect_requested(&self) -> bool {
        self.reconnect_requested
    }

    pub fn take_close_reason(&mut self) -> Option<H2ConnectionErrorKind> {
        self.close_reason.take()
    }

    pub fn active_streams(&self) -> usize {
        self.streams.len()
    }

    pub fn buffered_requests(&self) -> usize {
        self.buffered_requests.len()
    }

    pub fn next_stream_id(&self) -> u32 {
        self.next_stream_id
    }

    pub fn max_concurrent_streams(&self) -> Option<u32> {
        self.max_concurrent_streams
    }

    pub fn connection_tx_window(&self) -> i64 {
        self.tx_window
    }

    pub fn connection_rx_window(&self) -> i64 {
        self.rx_window
    }

    pub fn stream_tx_window(&self, stream_id: u32) -> Option<i64> {
        self.streams.get(&stream_id).map(|s| s.tx_window)
    }

    pub fn stream_rx_window(&self, stream_id: u32) -> Option<i64> {
        self.streams.get(&stream_id).map(|s| s.rx_window)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }
}

fn trailer_fields(trailers: &[Header]) -> Vec<HeaderField> {
    trailers
        .iter()
        .map(|h| {
            HeaderField::new(
                h.name.to_ascii_lowercase().into_bytes(),
                h.value_str().as_bytes().to_vec(),
            )
        })
        .collect()
}

/// Octet-level header validation shared by response headers and trailers:
/// no CR/LF/NUL anywhere, no embedded colon or space in names, and no
/// uppercase names (RFC 7540 Section 8.1.2).
fn validate_field_octets(name: &[u8], value: &[u8]) -> Result<(), String> {
    if name.is_empty() {
        return Err("empty header name".to_string());
    }
    let bare = name.strip_prefix(b":").unwrap_or(name);
    for &b in bare {
        match b {
            b'\r' | b'\n' | b'\0' | b':' | b' ' => {
                return Err(format!(
                    "illegal octet 0x{:02x} in header name '{}'",
                    b,
                    String::from_utf8_lossy(name)
                ));
            }
            b'A'..=b'Z' => {
                return Err(format!(
                    "uppercase header name '{}'",
                    String::from_utf8_lossy(name)
                ));
            }
            _ => {}
        }
    }
    for &b in value {
        if matches!(b, b'\r' | b'\n' | b'\0') {
            return Err(format!(
                "illegal octet 0x{:02x} in value of '{}'",
                b,
                String::from_utf8_lossy(name)
            ));
        }
    }
    Ok(())
}
