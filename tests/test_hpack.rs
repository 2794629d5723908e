use h2wire::h2::hpack::{
    decode_integer, encode_integer, Decoder, Encoder, HeaderField, HpackError, HuffmanPolicy,
};

fn pair(name: &str, value: &str) -> HeaderField {
    HeaderField::new(name.as_bytes(), value.as_bytes())
}

#[test]
fn round_trip_mixed_header_shapes() {
    let mut encoder = Encoder::new(4096);
    let mut decoder = Decoder::new(4096);

    let fields = vec![
        pair(":method", "PUT"),
        pair(":path", "/a/b/c?x=%20y"),
        pair(":scheme", "https"),
        pair(":authority", "api.example.com:8443"),
        pair("accept-encoding", "gzip, deflate"),
        pair("x-empty-value", ""),
        pair("x-long", &"v".repeat(2000)),
        HeaderField::new(b"x-binary".to_vec(), vec![0u8, 1, 2, 0xfe, 0xff]),
        pair("etag", "\"33a64df551425fcc55e4d42a148795d9f25f89d4\""),
    ];

    let block = encoder.encode(&fields);
    let decoded = decoder.decode(&block).unwrap();
    assert_eq!(decoded, fields);
}

#[test]
fn paired_tables_remain_identical_over_many_exchanges() {
    let mut encoder = Encoder::new(1024);
    let mut decoder = Decoder::new(1024);

    for round in 0..100 {
        let fields = vec![
            pair(":method", "GET"),
            pair(":path", "/stream"),
            HeaderField::new(
                format!("x-rotating-{}", round % 13).into_bytes(),
                format!("value-{}", round % 5).into_bytes(),
            ),
            pair("x-stable", "constant"),
        ];
        let block = encoder.encode(&fields);
        let decoded = decoder.decode(&block).unwrap();
        assert_eq!(decoded, fields, "round {}", round);

        assert_eq!(
            encoder.dynamic_table_size(),
            decoder.dynamic_table_size(),
            "table size diverged at round {}",
            round
        );
        assert_eq!(
            encoder.dynamic_table_snapshot(),
            decoder.dynamic_table_snapshot(),
            "table contents diverged at round {}",
            round
        );
        // The eviction invariant holds at every step.
        assert!(encoder.dynamic_table_size() <= 1024);
    }
}

#[test]
fn eviction_is_oldest_first() {
    // Each entry costs 32 + name + value; size the table for ~2 entries.
    let mut encoder = Encoder::new(150);
    encoder.encode(&[pair("x-one", "11111111111111111111")]);
    encoder.encode(&[pair("x-two", "22222222222222222222")]);
    encoder.encode(&[pair("x-three", "3333333333333333333")]);

    let snapshot = encoder.dynamic_table_snapshot();
    let names: Vec<&[u8]> = snapshot.iter().map(|(n, _)| n.as_slice()).collect();
    // Newest first; x-one was evicted from the back.
    assert_eq!(names, vec![&b"x-three"[..], &b"x-two"[..]]);
    assert!(encoder.dynamic_table_size() <= 150);
}

#[test]
fn integer_boundaries_for_every_prefix_width() {
    for prefix in 1..=8u8 {
        let edge = 1u64 << prefix;
        for value in [edge - 2, edge - 1, edge, 1u64 << 53] {
            let mut buf = Vec::new();
            encode_integer(&mut buf, value, prefix, 0x00);
            let (decoded, consumed) = decode_integer(&buf, prefix).unwrap();
            assert_eq!(decoded, value, "prefix {} value {}", prefix, value);
            assert_eq!(consumed, buf.len());
        }
    }
}

#[test]
fn runaway_continuation_is_overflow_not_wraparound() {
    let mut buf = vec![0xff]; // 8-bit prefix saturated
    buf.extend_from_slice(&[0x80; 16]); // endless continuation
    buf.push(0x01);
    assert_eq!(decode_integer(&buf, 8), Err(HpackError::IntegerOverflow));
}

#[test]
fn huffman_and_octet_encodings_interoperate() {
    let fields = vec![
        pair("x-ascii", "plain words compress well"),
        HeaderField::new(b"x-dense".to_vec(), vec![0xfa; 64]),
    ];

    for policy in [
        HuffmanPolicy::Always,
        HuffmanPolicy::Never,
        HuffmanPolicy::Shortest,
    ] {
        let mut encoder = Encoder::with_policy(4096, policy);
        let mut decoder = Decoder::new(4096);
        let block = encoder.encode(&fields);
        assert_eq!(decoder.decode(&block).unwrap(), fields, "{:?}", policy);
    }
}

#[test]
fn decoder_rejects_truncated_blocks() {
    let mut encoder = Encoder::new(4096);
    let block = encoder.encode(&[pair("x-header", "some-value")]);
    for cut in 1..block.len() {
        let mut decoder = Decoder::new(4096);
        assert!(
            decoder.decode(&block[..cut]).is_err(),
            "truncation at {} decoded successfully",
            cut
        );
    }
}

#[test]
fn indexed_reference_survives_eviction_pressure() {
    let mut encoder = Encoder::new(4096);
    let mut decoder = Decoder::new(4096);

    // Insert, then reference the same pair: second block is one byte.
    let fields = vec![pair("x-api-key", "0123456789")];
    let first = encoder.encode(&fields);
    decoder.decode(&first).unwrap();
    let second = encoder.encode(&fields);
    assert_eq!(second.len(), 1);
    assert_eq!(decoder.decode(&second).unwrap(), fields);
}
