use bytes::{Bytes, BytesMut};
use h2wire::h2::consts::{END_HEADERS_FLAG, END_STREAM_FLAG, PADDED_FLAG, PRIORITY_FLAG};
use h2wire::h2::framing::{
    parse_frame, ContinuationFrame, DataFrame, Frame, GoAwayFrame, HeadersFrame, PingFrame,
    PriorityFrame, PrioritySpec, RstStreamFrame, SettingsFrame, WindowUpdateFrame,
};
use h2wire::types::ProtocolError;

fn roundtrip(serialized: &[u8]) -> (Frame, u32, u8) {
    let parsed = parse_frame(serialized)
        .expect("parse succeeds")
        .expect("frame complete");
    assert_eq!(parsed.consumed, serialized.len());
    (parsed.frame.expect("known frame type"), parsed.stream_id, parsed.flags)
}

#[test]
fn data_roundtrip() {
    let mut out = BytesMut::new();
    DataFrame::new(Bytes::from_static(b"hello"), true).serialize(3, &mut out);
    let (frame, stream_id, flags) = roundtrip(&out);
    let data = match frame {
        Frame::Data(d) => d,
        other => panic!("expected DATA, got {:?}", other),
    };
    assert_eq!(stream_id, 3);
    assert!(flags & END_STREAM_FLAG != 0);
    assert!(data.end_stream);
    assert_eq!(data.data.as_ref(), b"hello");
}

#[test]
fn data_with_padding_roundtrip() {
    let mut frame = DataFrame::new(Bytes::from_static(b"payload"), false);
    frame.pad_length = Some(9);
    let mut out = BytesMut::new();
    frame.serialize(5, &mut out);

    let (parsed, stream_id, flags) = roundtrip(&out);
    let data = match parsed {
        Frame::Data(d) => d,
        other => panic!("expected DATA, got {:?}", other),
    };
    assert_eq!(stream_id, 5);
    assert!(flags & PADDED_FLAG != 0);
    assert_eq!(data.pad_length, Some(9));
    // Padding is stripped from the delivered payload.
    assert_eq!(data.data.as_ref(), b"payload");
}

#[test]
fn data_padding_beyond_payload_is_rejected() {
    // PADDED flag, pad length 10, but only 3 octets follow.
    let raw = [0x00, 0x00, 0x04, 0x00, PADDED_FLAG, 0x00, 0x00, 0x00, 0x01, 10, 1, 2, 3];
    assert!(matches!(
        parse_frame(&raw),
        Err(ProtocolError::H2FrameSizeError(_))
    ));
}

#[test]
fn headers_roundtrip_with_priority_and_padding() {
    let mut frame = HeadersFrame::new(Bytes::from_static(&[0x88, 0x40]), true, true);
    frame.priority = Some(PrioritySpec {
        exclusive: true,
        stream_dependency: 7,
        weight: 200,
    });
    frame.pad_length = Some(4);
    let mut out = BytesMut::new();
    frame.serialize(9, &mut out);

    let (parsed, stream_id, flags) = roundtrip(&out);
    let headers = match parsed {
        Frame::Headers(h) => h,
        other => panic!("expected HEADERS, got {:?}", other),
    };
    assert_eq!(stream_id, 9);
    assert!(flags & PRIORITY_FLAG != 0);
    assert!(headers.end_headers);
    assert!(headers.end_stream);
    assert_eq!(headers.pad_length, Some(4));
    assert_eq!(
        headers.priority,
        Some(PrioritySpec {
            exclusive: true,
            stream_dependency: 7,
            weight: 200,
        })
    );
    assert_eq!(headers.header_block.as_ref(), &[0x88, 0x40]);
}

#[test]
fn continuation_roundtrip() {
    let mut out = BytesMut::new();
    ContinuationFrame::new(Bytes::from_static(&[1, 2, 3]), true).serialize(11, &mut out);
    let (parsed, stream_id, flags) = roundtrip(&out);
    let continuation = match parsed {
        Frame::Continuation(c) => c,
        other => panic!("expected CONTINUATION, got {:?}", other),
    };
    assert_eq!(stream_id, 11);
    assert!(flags & END_HEADERS_FLAG != 0);
    assert!(continuation.end_headers);
    assert_eq!(continuation.header_block.as_ref(), &[1, 2, 3]);
}

#[test]
fn settings_roundtrip() {
    let mut out = BytesMut::new();
    SettingsFrame::new(vec![(0x3, 100), (0x4, 65_535)]).serialize(&mut out);
    let (parsed, stream_id, _) = roundtrip(&out);
    let settings = match parsed {
        Frame::Settings(s) => s,
        other => panic!("expected SETTINGS, got {:?}", other),
    };
    assert_eq!(stream_id, 0);
    assert!(!settings.ack);
    assert_eq!(settings.entries, vec![(0x3, 100), (0x4, 65_535)]);
}

#[test]
fn settings_ack_with_payload_is_rejected() {
    // ACK flag set, 6-byte payload.
    let raw = [
        0x00, 0x00, 0x06, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x64,
    ];
    assert!(matches!(
        parse_frame(&raw),
        Err(ProtocolError::H2FrameSizeError(_))
    ));
}

#[test]
fn settings_length_must_be_multiple_of_six() {
    let raw = [0x00, 0x00, 0x05, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 1, 2, 3, 4, 5];
    assert!(parse_frame(&raw).is_err());
}

#[test]
fn window_update_roundtrip_and_zero_rejection() {
    let mut out = BytesMut::new();
    WindowUpdateFrame::new(0x1234).serialize(7, &mut out);
    let (parsed, stream_id, _) = roundtrip(&out);
    match parsed {
        Frame::WindowUpdate(w) => assert_eq!(w.increment, 0x1234),
        other => panic!("expected WINDOW_UPDATE, got {:?}", other),
    }
    assert_eq!(stream_id, 7);

    // Increment 0 is a protocol error.
    let raw = [0x00, 0x00, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0, 0, 0, 0];
    assert!(parse_frame(&raw).is_err());
}

#[test]
fn ping_requires_exactly_eight_bytes() {
    let mut out = BytesMut::new();
    PingFrame::new([0xde; 8]).serialize(&mut out);
    let (parsed, _, _) = roundtrip(&out);
    match parsed {
        Frame::Ping(p) => {
            assert!(!p.ack);
            assert_eq!(p.data, [0xde; 8]);
        }
        other => panic!("expected PING, got {:?}", other),
    }

    let raw = [0x00, 0x00, 0x03, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 1, 2, 3];
    assert!(matches!(
        parse_frame(&raw),
        Err(ProtocolError::H2FrameSizeError(_))
    ));
}

#[test]
fn goaway_roundtrip_and_minimum_size() {
    let mut out = BytesMut::new();
    GoAwayFrame::new(41, 0x2, Bytes::from_static(b"diagnostic")).serialize(&mut out);
    let (parsed, stream_id, _) = roundtrip(&out);
    let goaway = match parsed {
        Frame::GoAway(g) => g,
        other => panic!("expected GOAWAY, got {:?}", other),
    };
    assert_eq!(stream_id, 0);
    assert_eq!(goaway.last_stream_id, 41);
    assert_eq!(goaway.error_code, 0x2);
    assert_eq!(goaway.debug_data.as_ref(), b"diagnostic");

    let raw = [0x00, 0x00, 0x04, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00, 0, 0, 0, 1];
    assert!(matches!(
        parse_frame(&raw),
        Err(ProtocolError::H2FrameSizeError(_))
    ));
}

#[test]
fn priority_roundtrip() {
    let mut out = BytesMut::new();
    PriorityFrame {
        priority: PrioritySpec {
            exclusive: false,
            stream_dependency: 3,
            weight: 15,
        },
    }
    .serialize(5, &mut out);
    let (parsed, stream_id, _) = roundtrip(&out);
    match parsed {
        Frame::Priority(p) => {
            assert!(!p.priority.exclusive);
            assert_eq!(p.priority.stream_dependency, 3);
            assert_eq!(p.priority.weight, 15);
        }
        other => panic!("expected PRIORITY, got {:?}", other),
    }
    assert_eq!(stream_id, 5);
}

#[test]
fn rst_stream_roundtrip() {
    let mut out = BytesMut::new();
    RstStreamFrame::new(0x8).serialize(13, &mut out);
    let (parsed, stream_id, _) = roundtrip(&out);
    match parsed {
        Frame::RstStream(r) => assert_eq!(r.error_code, 0x8),
        other => panic!("expected RST_STREAM, got {:?}", other),
    }
    assert_eq!(stream_id, 13);
}

#[test]
fn reserved_bit_in_stream_id_is_masked() {
    // Stream id with the reserved high bit set.
    let raw = [0x00, 0x00, 0x00, 0x00, 0x00, 0x80, 0x00, 0x00, 0x05];
    let parsed = parse_frame(&raw).unwrap().unwrap();
    assert_eq!(parsed.stream_id, 5);
}

#[test]
fn partial_frames_stall_without_consuming() {
    let mut out = BytesMut::new();
    DataFrame::new(Bytes::from_static(b"abcdef"), false).serialize(1, &mut out);

    // Header alone, then header + partial payload: both incomplete.
    assert!(parse_frame(&out[..4]).unwrap().is_none());
    assert!(parse_frame(&out[..9]).unwrap().is_none());
    assert!(parse_frame(&out[..12]).unwrap().is_none());
    assert!(parse_frame(&out).unwrap().is_some());
}

#[test]
fn unknown_frame_type_is_skipped_not_an_error() {
    let raw = [0x00, 0x00, 0x02, 0x42, 0x00, 0x00, 0x00, 0x00, 0x00, 0xaa, 0xbb];
    let parsed = parse_frame(&raw).unwrap().unwrap();
    assert!(parsed.frame.is_none());
    assert_eq!(parsed.consumed, raw.len());
}
