use bytes::{Bytes, BytesMut};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use h2wire::h2::framing::{parse_frame, DataFrame, HeadersFrame};
use h2wire::h2::hpack::{Decoder, Encoder, HeaderField};

fn request_fields() -> Vec<HeaderField> {
    vec![
        HeaderField::new(&b":method"[..], &b"GET"[..]),
        HeaderField::new(&b":path"[..], &b"/api/v2/users?page=3&per_page=50"[..]),
        HeaderField::new(&b":scheme"[..], &b"https"[..]),
        HeaderField::new(&b":authority"[..], &b"api.example.com"[..]),
        HeaderField::new(&b"accept"[..], &b"application/json"[..]),
        HeaderField::new(&b"accept-encoding"[..], &b"gzip, deflate"[..]),
        HeaderField::new(&b"user-agent"[..], &b"h2wire/0.1.0"[..]),
        HeaderField::new(&b"x-request-id"[..], &b"4f2c1de8a9b04c11"[..]),
    ]
}

fn bench_hpack_encode(c: &mut Criterion) {
    let fields = request_fields();
    c.bench_function("hpack_encode_request", |b| {
        let mut encoder = Encoder::new(4096);
        b.iter(|| black_box(encoder.encode(black_box(&fields))))
    });
}

fn bench_hpack_decode(c: &mut Criterion) {
    let fields = request_fields();
    // A warm encoder so the block exercises dynamic table references.
    let mut encoder = Encoder::new(4096);
    let mut warm_decoder = Decoder::new(4096);
    let warmup = encoder.encode(&fields);
    warm_decoder.decode(&warmup).unwrap();
    let block = encoder.encode(&fields);

    c.bench_function("hpack_decode_request", |b| {
        b.iter(|| {
            let mut decoder = Decoder::new(4096);
            decoder.decode(&warmup).unwrap();
            black_box(decoder.decode(black_box(&block)).unwrap())
        })
    });
}

fn bench_frame_serialize(c: &mut Criterion) {
    let payload = Bytes::from(vec![0x5au8; 16_384]);
    c.bench_function("data_frame_serialize_16k", |b| {
        b.iter(|| {
            let mut out = BytesMut::with_capacity(16_393);
            DataFrame::new(payload.clone(), false).serialize(1, &mut out);
            black_box(out)
        })
    });
}

fn bench_frame_parse(c: &mut Criterion) {
    let mut out = BytesMut::new();
    HeadersFrame::new(Bytes::from(vec![0x88u8; 512]), true, true).serialize(1, &mut out);
    let wire = out.freeze();
    c.bench_function("headers_frame_parse", |b| {
        b.iter(|| black_box(parse_frame(black_box(&wire)).unwrap().unwrap()))
    });
}

criterion_group!(
    benches,
    bench_hpack_encode,
    bench_hpack_decode,
    bench_frame_serialize,
    bench_frame_parse
);
criterion_main!(benches);
