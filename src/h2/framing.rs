//! HTTP/2 frame parsing and serialization (RFC 7540 Section 4 and 6).
//!
//! `Frame` is a sum type with one variant per frame kind; every variant
//! owns its `parse`/`serialize` pair. `parse_frame` consumes at most one
//! complete frame from the receive buffer and never reads past the
//! declared payload length.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::h2::consts::*;
use crate::types::ProtocolError;

// HTTP/2 Frame Format (RFC 7540 Section 4.1):
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                 Length (24)                   |
// +---------------+---------------+---------------+
// |   Type (8)    |   Flags (8)   |
// +-+-+-----------+---------------+-------------------------------+
// |R|                 Stream Identifier (31)                      |
// +=+=============================================================+
// |                   Frame Payload (0...)                      ...
// +---------------------------------------------------------------+

#[derive(Debug, Clone)]
pub enum Frame {
    Data(DataFrame),
    Headers(HeadersFrame),
    Priority(PriorityFrame),
    RstStream(RstStreamFrame),
    Settings(SettingsFrame),
    PushPromise(PushPromiseFrame),
    Ping(PingFrame),
    GoAway(GoAwayFrame),
    WindowUpdate(WindowUpdateFrame),
    Continuation(ContinuationFrame),
}

/// One frame lifted off the wire. `frame` is `None` for unknown frame
/// types, which are consumed and ignored per RFC 7540 Section 4.1.
#[derive(Debug)]
pub struct ParsedFrame {
    pub frame: Option<Frame>,
    pub stream_id: u32,
    pub flags: u8,
    /// Total bytes consumed, header included.
    pub consumed: usize,
}

impl ParsedFrame {
    /// Declared payload length of the consumed frame.
    pub fn payload_len(&self) -> usize {
        self.consumed - FRAME_HEADER_SIZE
    }
}

/// Try to parse one frame from the front of `buf`.
///
/// Returns `Ok(None)` while the frame is not fully buffered. A recognized
/// frame that fails its type-specific parse is a connection-fatal error.
pub fn parse_frame(buf: &[u8]) -> Result<Option<ParsedFrame>, ProtocolError> {
    if buf.len() < FRAME_HEADER_SIZE {
        return Ok(None);
    }

    let length = ((buf[0] as usize) << 16) | ((buf[1] as usize) << 8) | buf[2] as usize;
    let frame_type = buf[3];
    let flags = buf[4];
    let stream_id = u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]) & 0x7FFF_FFFF;

    let total = FRAME_HEADER_SIZE + length;
    if buf.len() < total {
        return Ok(None);
    }
    let payload = &buf[FRAME_HEADER_SIZE..total];

    let frame = match frame_type {
        DATA_FRAME_TYPE => Some(Frame::Data(DataFrame::parse(payload, flags)?)),
        HEADERS_FRAME_TYPE => Some(Frame::Headers(HeadersFrame::parse(payload, flags)?)),
        PRIORITY_FRAME_TYPE => Some(Frame::Priority(PriorityFrame::parse(payload)?)),
        RST_STREAM_FRAME_TYPE => Some(Frame::RstStream(RstStreamFrame::parse(payload)?)),
        SETTINGS_FRAME_TYPE => Some(Frame::Settings(SettingsFrame::parse(payload, flags)?)),
        PUSH_PROMISE_FRAME_TYPE => {
            Some(Frame::PushPromise(PushPromiseFrame::parse(payload, flags)?))
        }
        PING_FRAME_TYPE => Some(Frame::Ping(PingFrame::parse(payload, flags)?)),
        GOAWAY_FRAME_TYPE => Some(Frame::GoAway(GoAwayFrame::parse(payload)?)),
        WINDOW_UPDATE_FRAME_TYPE => {
            Some(Frame::WindowUpdate(WindowUpdateFrame::parse(payload)?))
        }
        CONTINUATION_FRAME_TYPE => {
            Some(Frame::Continuation(ContinuationFrame::parse(payload, flags)?))
        }
        // Unknown frame types are skipped, not errors.
        _ => None,
    };

    Ok(Some(ParsedFrame {
        frame,
        stream_id,
        flags,
        consumed: total,
    }))
}

/// Write a frame header plus payload into `out`.
fn write_frame(out: &mut BytesMut, frame_type: u8, flags: u8, stream_id: u32, payload: &[u8]) {
    debug_assert!(payload.len() <= MAX_FRAME_SIZE_UPPER_BOUND as usize);
    let length = payload.len() as u32;
    out.reserve(FRAME_HEADER_SIZE + payload.len());
    out.put_u8((length >> 16) as u8);
    out.put_u8((length >> 8) as u8);
    out.put_u8(length as u8);
    out.put_u8(frame_type);
    out.put_u8(flags);
    out.put_u32(stream_id & 0x7FFF_FFFF);
    out.put_slice(payload);
}

fn frame_size_error(msg: &str) -> ProtocolError {
    ProtocolError::H2FrameSizeError(msg.to_string())
}

/// Strip the pad-length prefix when the PADDED flag is set. Returns the
/// pad length and the unpadded remainder of the payload.
fn split_padding<'a>(
    payload: &'a [u8],
    flags: u8,
    what: &str,
) -> Result<(Option<u8>, &'a [u8]), ProtocolError> {
    if flags & PADDED_FLAG == 0 {
        return Ok((None, payload));
    }
    let (&pad, rest) = payload
        .split_first()
        .ok_or_else(|| frame_size_error(&format!("{} padded but empty", what)))?;
    if pad as usize > rest.len() {
        return Err(frame_size_error(&format!(
            "{} pad length {} exceeds payload",
            what, pad
        )));
    }
    Ok((Some(pad), &rest[..rest.len() - pad as usize]))
}

fn put_padding(out: &mut BytesMut, pad: Option<u8>) {
    if let Some(pad) = pad {
        out.put_bytes(0, pad as usize);
    }
}

// -- DATA (Section 6.1) --

#[derive(Debug, Clone)]
pub struct DataFrame {
    pub data: Bytes,
    pub end_stream: bool,
    pub pad_length: Option<u8>,
}

impl DataFrame {
    pub fn new(data: Bytes, end_stream: bool) -> Self {
        Self {
            data,
            end_stream,
            pad_length: None,
        }
    }

    pub fn parse(payload: &[u8], flags: u8) -> Result<Self, ProtocolError> {
        let (pad_length, data) = split_padding(payload, flags, "DATA")?;
        Ok(Self {
            data: Bytes::copy_from_slice(data),
            end_stream: flags & END_STREAM_FLAG != 0,
            pad_length,
        })
    }

    pub fn serialize(&self, stream_id: u32, out: &mut BytesMut) {
        let mut flags = 0u8;
        if self.end_stream {
            flags |= END_STREAM_FLAG;
        }
        let mut payload = BytesMut::with_capacity(self.data.len() + 1);
        if let Some(pad) = self.pad_length {
            flags |= PADDED_FLAG;
            payload.put_u8(pad);
        }
        payload.put_slice(&self.data);
        put_padding(&mut payload, self.pad_length);
        write_frame(out, DATA_FRAME_TYPE, flags, stream_id, &payload);
    }
}

// -- HEADERS (Section 6.2) --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrioritySpec {
    pub exclusive: bool,
    pub stream_dependency: u32,
    pub weight: u8,
}

#[derive(Debug, Clone)]
pub struct HeadersFrame {
    pub header_block: Bytes,
    pub end_headers: bool,
    pub end_stream: bool,
    pub priority: Option<PrioritySpec>,
    pub pad_length: Option<u8>,
}

impl HeadersFrame {
    pub fn new(header_block: Bytes, end_headers: bool, end_stream: bool) -> Self {
        Self {
            header_block,
            end_headers,
            end_stream,
            priority: None,
            pad_length: None,
        }
    }

    pub fn parse(payload: &[u8], flags: u8) -> Result<Self, ProtocolError> {
        let (pad_length, mut rest) = split_padding(payload, flags, "HEADERS")?;
        let priority = if flags & PRIORITY_FLAG != 0 {
            if rest.len() < 5 {
                return Err(frame_size_error("HEADERS priority block truncated"));
            }
            let dep = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]);
            let weight = rest[4];
            rest = &rest[5..];
            Some(PrioritySpec {
                exclusive: dep & 0x8000_0000 != 0,
                stream_dependency: dep & 0x7FFF_FFFF,
                weight,
            })
        } else {
            None
        };
        Ok(Self {
            header_block: Bytes::copy_from_slice(rest),
            end_headers: flags & END_HEADERS_FLAG != 0,
            end_stream: flags & END_STREAM_FLAG != 0,
            priority,
            pad_length,
        })
    }

    pub fn serialize(&self, stream_id: u32, out: &mut BytesMut) {
        let mut flags = 0u8;
        if self.end_headers {
            flags |= END_HEADERS_FLAG;
        }
        if self.end_stream {
            flags |= END_STREAM_FLAG;
        }
        let mut payload = BytesMut::with_capacity(self.header_block.len() + 6);
        if let Some(pad) = self.pad_length {
            flags |= PADDED_FLAG;
            payload.put_u8(pad);
        }
        if let Some(priority) = &self.priority {
            flags |= PRIORITY_FLAG;
            let mut dep = priority.stream_dependency & 0x7FFF_FFFF;
            if priority.exclusive {
                dep |= 0x8000_0000;
            }
            payload.put_u32(dep);
            payload.put_u8(priority.weight);
        }
        payload.put_slice(&self.header_block);
        put_padding(&mut payload, self.pad_length);
        write_frame(out, HEADERS_FRAME_TYPE, flags, stream_id, &payload);
    }
}

// -- PRIORITY (Section 6.3): parsed, never acted upon --

#[derive(Debug, Clone, Copy)]
pub struct PriorityFrame {
    pub priority: PrioritySpec,
}

impl PriorityFrame {
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() != 5 {
            return Err(frame_size_error("PRIORITY payload must be 5 bytes"));
        }
        let dep = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        Ok(Self {
            priority: PrioritySpec {
                exclusive: dep & 0x8000_0000 != 0,
                stream_dependency: dep & 0x7FFF_FFFF,
                weight: payload[4],
            },
        })
    }

    pub fn serialize(&self, stream_id: u32, out: &mut BytesMut) {
        let mut payload = BytesMut::with_capacity(5);
        let mut dep = self.priority.stream_dependency & 0x7FFF_FFFF;
        if self.priority.exclusive {
            dep |= 0x8000_0000;
        }
        payload.put_u32(dep);
        payload.put_u8(self.priority.weight);
        write_frame(out, PRIORITY_FRAME_TYPE, 0, stream_id, &payload);
    }
}

// -- RST_STREAM (Section 6.4) --

#[derive(Debug, Clone, Copy)]
pub struct RstStreamFrame {
    pub error_code: u32,
}

impl RstStreamFrame {
    pub fn new(error_code: u32) -> Self {
        Self { error_code }
    }

    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() != 4 {
            return Err(frame_size_error("RST_STREAM payload must be 4 bytes"));
        }
        Ok(Self {
            error_code: u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]),
        })
    }

    pub fn serialize(&self, stream_id: u32, out: &mut BytesMut) {
        let mut payload = BytesMut::with_capacity(4);
        payload.put_u32(self.error_code);
        write_frame(out, RST_STREAM_FRAME_TYPE, 0, stream_id, &payload);
    }
}

// -- SETTINGS (Section 6.5) --

#[derive(Debug, Clone, Default)]
pub struct SettingsFrame {
    pub ack: bool,
    pub entries: Vec<(u16, u32)>,
}

impl SettingsFrame {
    pub fn new(entries: Vec<(u16, u32)>) -> Self {
        Self {
            ack: false,
            entries,
        }
    }

    pub fn ack() -> Self {
        Self {
            ack: true,
            entries: Vec::new(),
        }
    }

    pub fn parse(payload: &[u8], flags: u8) -> Result<Self, ProtocolError> {
        let ack = flags & ACK_FLAG != 0;
        if ack && !payload.is_empty() {
            return Err(frame_size_error("SETTINGS ACK must have empty payload"));
        }
        if payload.len() % 6 != 0 {
            return Err(frame_size_error(
                "SETTINGS payload must be a multiple of 6 bytes",
            ));
        }
        let mut entries = Vec::with_capacity(payload.len() / 6);
        let mut rest = payload;
        while rest.has_remaining() {
            let id = rest.get_u16();
            let value = rest.get_u32();
            entries.push((id, value));
        }
        Ok(Self { ack, entries })
    }

    pub fn serialize(&self, out: &mut BytesMut) {
        let flags = if self.ack { ACK_FLAG } else { 0 };
        let mut payload = BytesMut::with_capacity(self.entries.len() * 6);
        for &(id, value) in &self.entries {
            payload.put_u16(id);
            payload.put_u32(value);
        }
        write_frame(out, SETTINGS_FRAME_TYPE, flags, 0, &payload);
    }
}

// -- PUSH_PROMISE (Section 6.6): parsed so it can be rejected --

#[derive(Debug, Clone)]
pub struct PushPromiseFrame {
    pub promised_stream_id: u32,
    pub header_block: Bytes,
    pub end_headers: bool,
    pub pad_length: Option<u8>,
}

impl PushPromiseFrame {
    pub fn parse(payload: &[u8], flags: u8) -> Result<Self, ProtocolError> {
        let (pad_length, rest) = split_padding(payload, flags, "PUSH_PROMISE")?;
        if rest.len() < 4 {
            return Err(frame_size_error("PUSH_PROMISE missing promised stream id"));
        }
        let promised =
            u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) & 0x7FFF_FFFF;
        Ok(Self {
            promised_stream_id: promised,
            header_block: Bytes::copy_from_slice(&rest[4..]),
            end_headers: flags & END_HEADERS_FLAG != 0,
            pad_length,
        })
    }

    pub fn serialize(&self, stream_id: u32, out: &mut BytesMut) {
        let mut flags = 0u8;
        if self.end_headers {
            flags |= END_HEADERS_FLAG;
        }
        let mut payload = BytesMut::with_capacity(self.header_block.len() + 5);
        if let Some(pad) = self.pad_length {
            flags |= PADDED_FLAG;
            payload.put_u8(pad);
        }
        payload.put_u32(self.promised_stream_id & 0x7FFF_FFFF);
        payload.put_slice(&self.header_block);
        put_padding(&mut payload, self.pad_length);
        write_frame(out, PUSH_PROMISE_FRAME_TYPE, flags, stream_id, &payload);
    }
}

// -- PING (Section 6.7) --

#[derive(Debug, Clone, Copy)]
pub struct PingFrame {
    pub ack: bool,
    pub data: [u8; 8],
}

impl PingFrame {
    pub fn new(data: [u8; 8]) -> Self {
        Self { ack: false, data }
    }

    pub fn ack(data: [u8; 8]) -> Self {
        Self { ack: true, data }
    }

    pub fn parse(payload: &[u8], flags: u8) -> Result<Self, ProtocolError> {
        if payload.len() != 8 {
            return Err(frame_size_error("PING payload must be 8 bytes"));
        }
        let mut data = [0u8; 8];
        data.copy_from_slice(payload);
        Ok(Self {
            ack: flags & ACK_FLAG != 0,
            data,
        })
    }

    pub fn serialize(&self, out: &mut BytesMut) {
        let flags = if self.ack { ACK_FLAG } else { 0 };
        write_frame(out, PING_FRAME_TYPE, flags, 0, &self.data);
    }
}

// -- GOAWAY (Section 6.8) --

#[derive(Debug, Clone)]
pub struct GoAwayFrame {
    pub last_stream_id: u32,
    pub error_code: u32,
    pub debug_data: Bytes,
}

impl GoAwayFrame {
    pub fn new(last_stream_id: u32, error_code: u32, debug_data: Bytes) -> Self {
        Self {
            last_stream_id,
            error_code,
            debug_data,
        }
    }

    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() < 8 {
            return Err(frame_size_error("GOAWAY payload must be at least 8 bytes"));
        }
        Ok(Self {
            last_stream_id: u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]])
                & 0x7FFF_FFFF,
            error_code: u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]),
            debug_data: Bytes::copy_from_slice(&payload[8..]),
        })
    }

    pub fn serialize(&self, out: &mut BytesMut) {
        let mut payload = BytesMut::with_capacity(8 + self.debug_data.len());
        payload.put_u32(self.last_stream_id & 0x7FFF_FFFF);
        payload.put_u32(self.error_code);
        payload.put_slice(&self.debug_data);
        write_frame(out, GOAWAY_FRAME_TYPE, 0, 0, &payload);
    }
}

// -- WINDOW_UPDATE (Section 6.9) --

#[derive(Debug, Clone, Copy)]
pub struct WindowUpdateFrame {
    pub increment: u32,
}

impl WindowUpdateFrame {
    pub fn new(increment: u32) -> Self {
        Self { increment }
    }

    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() != 4 {
            return Err(frame_size_error("WINDOW_UPDATE payload must be 4 bytes"));
        }
        let increment =
            u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) & 0x7FFF_FFFF;
        if increment == 0 {
            return Err(ProtocolError::H2ProtocolError(
                "WINDOW_UPDATE increment must be nonzero".to_string(),
            ));
        }
        Ok(Self { increment })
    }

    pub fn serialize(&self, stream_id: u32, out: &mut BytesMut) {
        let mut payload = BytesMut::with_capacity(4);
        payload.put_u32(self.increment & 0x7FFF_FFFF);
        write_frame(out, WINDOW_UPDATE_FRAME_TYPE, 0, stream_id, &payload);
    }
}

// -- CONTINUATION (Section 6.10) --

#[derive(Debug, Clone)]
pub struct ContinuationFrame {
    pub header_block: Bytes,
    pub end_headers: bool,
}

impl ContinuationFrame {
    pub fn new(header_block: Bytes, end_headers: bool) -> Self {
        Self {
            header_block,
            end_headers,
        }
    }

    pub fn parse(payload: &[u8], flags: u8) -> Result<Self, ProtocolError> {
        Ok(Self {
            header_block: Bytes::copy_from_slice(payload),
            end_headers: flags & END_HEADERS_FLAG != 0,
        })
    }

    pub fn serialize(&self, stream_id: u32, out: &mut BytesMut) {
        let flags = if self.end_headers { END_HEADERS_FLAG } else { 0 };
        write_frame(out, CONTINUATION_FRAME_TYPE, flags, stream_id, &self.header_block);
    }
}
