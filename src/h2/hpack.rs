//! HPACK header compression (RFC 7541).
//!
//! Full encoder and decoder: prefix integer codec, string literals with
//! optional Huffman coding, the 61-entry static table, and per-direction
//! dynamic tables with size-bounded eviction. The transport owns one
//! `Encoder` for the tx direction and one `Decoder` for rx; their dynamic
//! tables must stay in lock-step with the peer's, which is why every
//! codec failure is fatal to the whole connection.

mod huffman;
mod static_table;

use std::collections::VecDeque;

use bytes::Bytes;

use static_table::{StaticLookup, STATIC_TABLE_LEN};

/// A single header field as the codec sees it: raw octets, plus a marker
/// for values that must never enter a dynamic table (RFC 7541 Section
/// 7.1.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: Vec<u8>,
    pub value: Vec<u8>,
    pub sensitive: bool,
}

impl HeaderField {
    pub fn new(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            sensitive: false,
        }
    }

    pub fn sensitive(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            sensitive: true,
        }
    }

    /// Octets this entry occupies in a dynamic table (RFC 7541 Section 4.1).
    fn table_size(&self) -> usize {
        self.name.len() + self.value.len() + 32
    }
}

/// How string literals are coded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HuffmanPolicy {
    Always,
    Never,
    /// Pick whichever form is shorter; ties go to Huffman.
    #[default]
    Shortest,
}

/// HPACK codec failures. All of them poison the connection-wide table
/// state, so the transport treats every variant as a connection error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HpackError {
    /// A prefix integer's continuation bytes exceed the accumulator.
    IntegerOverflow,
    /// The header block ended in the middle of an integer or literal.
    UnexpectedEnd,
    /// An indexed representation carried index zero.
    ZeroIndex,
    /// An index beyond the static and dynamic tables.
    IndexOutOfRange(usize),
    /// Huffman padding was not a short all-ones EOS prefix.
    InvalidPadding,
    /// The EOS symbol appeared inside a Huffman-coded literal.
    EosInLiteral,
    /// A dynamic table size update exceeded the negotiated maximum.
    TableSizeOverflow,
}

impl std::fmt::Display for HpackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HpackError::IntegerOverflow => write!(f, "prefix integer overflows accumulator"),
            HpackError::UnexpectedEnd => write!(f, "header block truncated"),
            HpackError::ZeroIndex => write!(f, "indexed field with index 0"),
            HpackError::IndexOutOfRange(idx) => write!(f, "table index {} out of range", idx),
            HpackError::InvalidPadding => write!(f, "invalid Huffman padding"),
            HpackError::EosInLiteral => write!(f, "EOS symbol inside string literal"),
            HpackError::TableSizeOverflow => {
                write!(f, "dynamic table size update exceeds negotiated maximum")
            }
        }
    }
}

impl std::error::Error for HpackError {}

// -- Prefix integer codec (RFC 7541 Section 5.1) --

/// Encode `value` with an N-bit prefix. `pattern` supplies the
/// representation bits above the prefix.
pub fn encode_integer(buf: &mut Vec<u8>, value: u64, prefix_bits: u8, pattern: u8) {
    let max_prefix = (1u64 << prefix_bits) - 1;
    if value < max_prefix {
        buf.push(pattern | value as u8);
        return;
    }
    buf.push(pattern | max_prefix as u8);
    let mut rest = value - max_prefix;
    while rest >= 128 {
        buf.push(0x80 | (rest & 0x7f) as u8);
        rest >>= 7;
    }
    buf.push(rest as u8);
}

/// Decode an N-bit-prefix integer. Returns the value and bytes consumed.
pub fn decode_integer(buf: &[u8], prefix_bits: u8) -> Result<(u64, usize), HpackError> {
    if buf.is_empty() {
        return Err(HpackError::UnexpectedEnd);
    }
    let max_prefix = (1u64 << prefix_bits) - 1;
    let prefix = u64::from(buf[0]) & max_prefix;
    if prefix < max_prefix {
        return Ok((prefix, 1));
    }

    let mut value = max_prefix;
    let mut shift = 0u32;
    for (i, &byte) in buf[1..].iter().enumerate() {
        let chunk = u64::from(byte & 0x7f);
        let addend = chunk
            .checked_shl(shift)
            .filter(|_| shift < 63)
            .ok_or(HpackError::IntegerOverflow)?;
        value = value.checked_add(addend).ok_or(HpackError::IntegerOverflow)?;
        if byte & 0x80 == 0 {
            return Ok((value, i + 2));
        }
        shift += 7;
        if shift > 63 {
            return Err(HpackError::IntegerOverflow);
        }
    }
    Err(HpackError::UnexpectedEnd)
}

// -- String literals (RFC 7541 Section 5.2) --

fn encode_string(buf: &mut Vec<u8>, data: &[u8], policy: HuffmanPolicy) {
    let use_huffman = match policy {
        HuffmanPolicy::Always => true,
        HuffmanPolicy::Never => false,
        HuffmanPolicy::Shortest => huffman::encoded_len(data) <= data.len(),
    };
    if use_huffman {
        encode_integer(buf, huffman::encoded_len(data) as u64, 7, 0x80);
        huffman::encode(data, buf);
    } else {
        encode_integer(buf, data.len() as u64, 7, 0x00);
        buf.extend_from_slice(data);
    }
}

fn decode_string(buf: &[u8]) -> Result<(Vec<u8>, usize), HpackError> {
    if buf.is_empty() {
        return Err(HpackError::UnexpectedEnd);
    }
    let coded = buf[0] & 0x80 != 0;
    let (len, consumed) = decode_integer(buf, 7)?;
    let len = len as usize;
    let total = consumed
        .checked_add(len)
        .ok_or(HpackError::IntegerOverflow)?;
    if buf.len() < total {
        return Err(HpackError::UnexpectedEnd);
    }
    let octets = &buf[consumed..total];
    let data = if coded {
        huffman::decode(octets)?
    } else {
        octets.to_vec()
    };
    Ok((data, total))
}

// -- Dynamic table (RFC 7541 Section 2.3.2) --

/// Insertion-ordered dynamic table, newest entry at the front. The front
/// entry carries HPACK index `STATIC_TABLE_LEN + 1`.
struct DynamicTable {
    entries: VecDeque<HeaderField>,
    size: usize,
    max_size: usize,
}

impl DynamicTable {
    fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            size: 0,
            max_size,
        }
    }

    fn get(&self, index: usize) -> Option<&HeaderField> {
        self.entries.get(index)
    }

    fn insert(&mut self, field: HeaderField) {
        let entry_size = field.table_size();
        while self.size + entry_size > self.max_size {
            match self.entries.pop_back() {
                Some(evicted) => self.size -= evicted.table_size(),
                // An entry larger than the whole table empties it and is
                // itself discarded (RFC 7541 Section 4.4).
                None => return,
            }
        }
        self.size += entry_size;
        self.entries.push_front(field);
    }

    fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        while self.size > self.max_size {
            if let Some(evicted) = self.entries.pop_back() {
                self.size -= evicted.table_size();
            }
        }
    }

    fn find_exact(&self, name: &[u8], value: &[u8]) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.name == name && e.value == value)
            .map(|i| STATIC_TABLE_LEN + 1 + i)
    }

    fn find_name(&self, name: &[u8]) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.name == name)
            .map(|i| STATIC_TABLE_LEN + 1 + i)
    }

    fn snapshot(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.entries
            .iter()
            .map(|e| (e.name.clone(), e.value.clone()))
            .collect()
    }
}

/// Result of a combined static + dynamic table lookup.
enum TableMatch {
    Exact(usize),
    Name(usize),
    Miss,
}

fn find(table: &DynamicTable, name: &[u8], value: &[u8]) -> TableMatch {
    let static_name = match static_table::lookup(name, value) {
        StaticLookup::Exact(idx) => return TableMatch::Exact(idx),
        StaticLookup::Name(idx) => Some(idx),
        StaticLookup::Miss => None,
    };
    if let Some(idx) = table.find_exact(name, value) {
        return TableMatch::Exact(idx);
    }
    // Static name references sit at lower indices than any dynamic entry.
    match static_name.or_else(|| table.find_name(name)) {
        Some(idx) => TableMatch::Name(idx),
        None => TableMatch::Miss,
    }
}

// -- Encoder --

pub struct Encoder {
    table: DynamicTable,
    policy: HuffmanPolicy,
    /// Size update to signal to the peer's decoder at the start of the
    /// next header block (RFC 7541 Section 4.2).
    pending_size_update: Option<usize>,
}

impl Encoder {
    pub fn new(max_table_size: usize) -> Self {
        Self {
            table: DynamicTable::new(max_table_size),
            policy: HuffmanPolicy::default(),
            pending_size_update: None,
        }
    }

    pub fn with_policy(max_table_size: usize, policy: HuffmanPolicy) -> Self {
        Self {
            table: DynamicTable::new(max_table_size),
            policy,
            pending_size_update: None,
        }
    }

    /// Encode one header block.
    pub fn encode(&mut self, fields: &[HeaderField]) -> Bytes {
        let mut buf = Vec::with_capacity(fields.iter().map(|f| f.table_size()).sum());

        if let Some(size) = self.pending_size_update.take() {
            // Dynamic table size update: 001xxxxx, 5-bit prefix.
            encode_integer(&mut buf, size as u64, 5, 0x20);
        }

        for field in fields {
            self.encode_field(field, &mut buf);
        }
        Bytes::from(buf)
    }

    fn encode_field(&mut self, field: &HeaderField, buf: &mut Vec<u8>) {
        if field.sensitive {
            // Literal never indexed: 0001xxxx, 4-bit name index.
            match find(&self.table, &field.name, &field.value) {
                TableMatch::Exact(idx) | TableMatch::Name(idx) => {
                    encode_integer(buf, idx as u64, 4, 0x10);
                }
                TableMatch::Miss => {
                    buf.push(0x10);
                    encode_string(buf, &field.name, self.policy);
                }
            }
            encode_string(buf, &field.value, self.policy);
            return;
        }

        match find(&self.table, &field.name, &field.value) {
            TableMatch::Exact(idx) => {
                // Indexed field: 1xxxxxxx, 7-bit index.
                encode_integer(buf, idx as u64, 7, 0x80);
            }
            TableMatch::Name(idx) => {
                // Literal with incremental indexing: 01xxxxxx, 6-bit index.
                encode_integer(buf, idx as u64, 6, 0x40);
                encode_string(buf, &field.value, self.policy);
                self.table.insert(field.clone());
            }
            TableMatch::Miss => {
                buf.push(0x40);
                encode_string(buf, &field.name, self.policy);
                encode_string(buf, &field.value, self.policy);
                self.table.insert(field.clone());
            }
        }
    }

    /// Shrink or grow the dynamic table. The matching size-update
    /// instruction is emitted at the front of the next header block.
    pub fn set_max_table_size(&mut self, size: usize) {
        self.table.set_max_size(size);
        self.pending_size_update = Some(size);
    }

    pub fn dynamic_table_size(&self) -> usize {
        self.table.size
    }

    pub fn dynamic_table_len(&self) -> usize {
        self.table.entries.len()
    }

    pub fn dynamic_table_snapshot(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.table.snapshot()
    }
}

// -- Decoder --

pub struct Decoder {
    table: DynamicTable,
    /// Ceiling for size updates: whatever we advertised in
    /// SETTINGS_HEADER_TABLE_SIZE. A larger update is a protocol error.
    size_limit: usize,
}

impl Decoder {
    pub fn new(max_table_size: usize) -> Self {
        Self {
            table: DynamicTable::new(max_table_size),
            size_limit: max_table_size,
        }
    }

    /// Decode a complete header block.
    pub fn decode(&mut self, block: &[u8]) -> Result<Vec<HeaderField>, HpackError> {
        let mut fields = Vec::new();
        let mut pos = 0;

        while pos < block.len() {
            let first = block[pos];

            if first & 0x80 != 0 {
                // Indexed field (Section 6.1).
                let (index, n) = decode_integer(&block[pos..], 7)?;
                pos += n;
                fields.push(self.field_at(index as usize)?);
            } else if first & 0x40 != 0 {
                // Literal with incremental indexing (Section 6.2.1).
                let (name_index, n) = decode_integer(&block[pos..], 6)?;
                pos += n;
                let (field, n) = self.read_literal(&block[pos..], name_index as usize, false)?;
                pos += n;
                self.table.insert(field.clone());
                fields.push(field);
            } else if first & 0x20 != 0 {
                // Dynamic table size update (Section 6.3).
                let (new_size, n) = decode_integer(&block[pos..], 5)?;
                pos += n;
                let new_size = new_size as usize;
                if new_size > self.size_limit {
                    return Err(HpackError::TableSizeOverflow);
                }
                self.table.set_max_size(new_size);
            } else if first & 0x10 != 0 {
                // Literal never indexed (Section 6.2.3).
                let (name_index, n) = decode_integer(&block[pos..], 4)?;
                pos += n;
                let (field, n) = self.read_literal(&block[pos..], name_index as usize, true)?;
                pos += n;
                fields.push(field);
            } else {
                // Literal without indexing (Section 6.2.2).
                let (name_index, n) = decode_integer(&block[pos..], 4)?;
                pos += n;
                let (field, n) = self.read_literal(&block[pos..], name_index as usize, false)?;
                pos += n;
                fields.push(field);
            }
        }

        Ok(fields)
    }

    fn read_literal(
        &self,
        buf: &[u8],
        name_index: usize,
        sensitive: bool,
    ) -> Result<(HeaderField, usize), HpackError> {
        let mut pos = 0;
        let name = if name_index > 0 {
            self.name_at(name_index)?
        } else {
            let (name, n) = decode_string(buf)?;
            pos += n;
            name
        };
        let (value, n) = decode_string(&buf[pos..])?;
        pos += n;
        Ok((
            HeaderField {
                name,
                value,
                sensitive,
            },
            pos,
        ))
    }

    fn field_at(&self, index: usize) -> Result<HeaderField, HpackError> {
        if index == 0 {
            return Err(HpackError::ZeroIndex);
        }
        if let Some((name, value)) = static_table::get(index) {
            return Ok(HeaderField::new(name, value));
        }
        self.table
            .get(index - STATIC_TABLE_LEN - 1)
            .cloned()
            .ok_or(HpackError::IndexOutOfRange(index))
    }

    fn name_at(&self, index: usize) -> Result<Vec<u8>, HpackError> {
        if index == 0 {
            return Err(HpackError::ZeroIndex);
        }
        if let Some((name, _)) = static_table::get(index) {
            return Ok(name.to_vec());
        }
        self.table
            .get(index - STATIC_TABLE_LEN - 1)
            .map(|e| e.name.clone())
            .ok_or(HpackError::IndexOutOfRange(index))
    }

    /// Raise or lower the ceiling we will accept in size-update
    /// instructions (tracks our advertised SETTINGS_HEADER_TABLE_SIZE).
    pub fn set_size_limit(&mut self, limit: usize) {
        self.size_limit = limit;
        if self.table.max_size > limit {
            self.table.set_max_size(limit);
        }
    }

    pub fn dynamic_table_size(&self) -> usize {
        self.table.size
    }

    pub fn dynamic_table_len(&self) -> usize {
        self.table.entries.len()
    }

    pub fn dynamic_table_snapshot(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.table.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(name: &str, value: &str) -> HeaderField {
        HeaderField::new(name.as_bytes(), value.as_bytes())
    }

    #[test]
    fn integer_round_trip_across_prefix_widths() {
        for prefix in 1..=8u8 {
            let boundary = 1u64 << prefix;
            for value in [0, 1, boundary - 2, boundary - 1, boundary, 1 << 53] {
                let mut buf = Vec::new();
                encode_integer(&mut buf, value, prefix, 0x00);
                let (decoded, used) = decode_integer(&buf, prefix).unwrap();
                assert_eq!(decoded, value, "prefix={} value={}", prefix, value);
                assert_eq!(used, buf.len());
            }
        }
    }

    #[test]
    fn integer_continuation_overflow_is_an_error() {
        // 11 continuation bytes push the shift past a u64.
        let mut buf = vec![0x1f];
        buf.extend_from_slice(&[0xff; 10]);
        buf.push(0x7f);
        assert_eq!(decode_integer(&buf, 5), Err(HpackError::IntegerOverflow));
    }

    #[test]
    fn integer_truncated_continuation() {
        let buf = [0x1f, 0x9a]; // continuation bit set, no terminator
        assert_eq!(decode_integer(&buf, 5), Err(HpackError::UnexpectedEnd));
    }

    #[test]
    fn rfc7541_c1_integer_examples() {
        let mut buf = Vec::new();
        encode_integer(&mut buf, 10, 5, 0x00);
        assert_eq!(buf, [0x0a]);

        let mut buf = Vec::new();
        encode_integer(&mut buf, 1337, 5, 0x00);
        assert_eq!(buf, [0x1f, 0x9a, 0x0a]);

        let mut buf = Vec::new();
        encode_integer(&mut buf, 42, 8, 0x00);
        assert_eq!(buf, [0x2a]);
    }

    #[test]
    fn round_trip_request_headers() {
        let mut encoder = Encoder::new(4096);
        let mut decoder = Decoder::new(4096);
        let fields = vec![
            pair(":method", "GET"),
            pair(":path", "/api/items?page=2"),
            pair(":scheme", "https"),
            pair(":authority", "example.com"),
            pair("accept", "*/*"),
            pair("x-request-id", "f00d"),
        ];
        let block = encoder.encode(&fields);
        let decoded = decoder.decode(&block).unwrap();
        assert_eq!(decoded, fields);
    }

    #[test]
    fn dynamic_tables_stay_in_lock_step() {
        let mut encoder = Encoder::new(4096);
        let mut decoder = Decoder::new(4096);
        for i in 0..40 {
            let fields = vec![
                pair(":method", "GET"),
                pair("x-token", "abcdef"),
                HeaderField::new(
                    format!("x-counter-{}", i % 7).into_bytes(),
                    format!("{}", i).into_bytes(),
                ),
            ];
            let block = encoder.encode(&fields);
            let decoded = decoder.decode(&block).unwrap();
            assert_eq!(decoded.len(), fields.len());
            assert_eq!(encoder.dynamic_table_size(), decoder.dynamic_table_size());
            assert_eq!(
                encoder.dynamic_table_snapshot(),
                decoder.dynamic_table_snapshot()
            );
        }
    }

    #[test]
    fn second_block_reuses_dynamic_entries() {
        let mut encoder = Encoder::new(4096);
        let fields = vec![pair("x-session", "0123456789abcdef")];
        let first = encoder.encode(&fields);
        let second = encoder.encode(&fields);
        assert!(second.len() < first.len());
        // Second encoding is a single indexed field referencing index 62.
        assert_eq!(second.as_ref(), &[0x80 | 62]);
    }

    #[test]
    fn eviction_keeps_size_within_budget_and_drops_oldest() {
        let mut encoder = Encoder::new(128);
        for i in 0..20 {
            let fields = vec![HeaderField::new(
                format!("x-header-{}", i).into_bytes(),
                b"some-value-payload".to_vec(),
            )];
            encoder.encode(&fields);
            assert!(encoder.dynamic_table_size() <= 128);
        }
        // Only the newest entries survive; the front is the latest insert.
        let snapshot = encoder.dynamic_table_snapshot();
        assert!(!snapshot.is_empty());
        assert_eq!(snapshot[0].0, b"x-header-19".to_vec());
    }

    #[test]
    fn oversized_entry_clears_the_table() {
        let mut encoder = Encoder::new(64);
        encoder.encode(&[pair("a", "b")]);
        assert_eq!(encoder.dynamic_table_len(), 1);
        encoder.encode(&[HeaderField::new(vec![b'n'; 100], vec![b'v'; 100])]);
        assert_eq!(encoder.dynamic_table_len(), 0);
        assert_eq!(encoder.dynamic_table_size(), 0);
    }

    #[test]
    fn sensitive_fields_skip_the_dynamic_table() {
        let mut encoder = Encoder::new(4096);
        let mut decoder = Decoder::new(4096);
        let fields = vec![HeaderField::sensitive(
            b"authorization".to_vec(),
            b"Bearer shhh".to_vec(),
        )];
        let block = encoder.encode(&fields);
        // Never-indexed representation: 0001xxxx.
        assert_eq!(block[0] & 0xf0, 0x10);
        let decoded = decoder.decode(&block).unwrap();
        assert!(decoded[0].sensitive);
        assert_eq!(encoder.dynamic_table_len(), 0);
        assert_eq!(decoder.dynamic_table_len(), 0);
    }

    #[test]
    fn size_update_is_emitted_and_applied() {
        let mut encoder = Encoder::new(4096);
        let mut decoder = Decoder::new(4096);
        let warmup = encoder.encode(&[pair("x-a", "1"), pair("x-b", "2")]);
        decoder.decode(&warmup).unwrap();
        assert_eq!(decoder.dynamic_table_len(), 2);

        encoder.set_max_table_size(0);
        let block = encoder.encode(&[pair(":method", "GET")]);
        // Block leads with the size-update instruction (001xxxxx).
        assert_eq!(block[0] & 0xe0, 0x20);
        decoder.decode(&block).unwrap();
        assert_eq!(decoder.dynamic_table_size(), 0);
        assert_eq!(encoder.dynamic_table_size(), 0);
    }

    #[test]
    fn size_update_beyond_limit_is_rejected() {
        let mut decoder = Decoder::new(4096);
        let mut block = Vec::new();
        encode_integer(&mut block, 8192, 5, 0x20);
        assert_eq!(
            decoder.decode(&block),
            Err(HpackError::TableSizeOverflow)
        );
    }

    #[test]
    fn indexed_zero_and_out_of_range_are_rejected() {
        let mut decoder = Decoder::new(4096);
        assert_eq!(decoder.decode(&[0x80]), Err(HpackError::ZeroIndex));
        assert_eq!(
            decoder.decode(&[0x80 | 62]),
            Err(HpackError::IndexOutOfRange(62))
        );
    }

    #[test]
    fn truncated_literal_is_rejected() {
        let mut decoder = Decoder::new(4096);
        // Literal with incremental indexing, new name, declared name
        // length 10 but only 3 octets follow.
        let block = [0x40, 0x0a, b'f', b'o', b'o'];
        assert_eq!(decoder.decode(&block), Err(HpackError::UnexpectedEnd));
    }

    #[test]
    fn rfc7541_c2_1_literal_with_indexing() {
        let block: &[u8] = &[
            0x40, 0x0a, 0x63, 0x75, 0x73, 0x74, 0x6f, 0x6d, 0x2d, 0x6b, 0x65, 0x79, 0x0d, 0x63,
            0x75, 0x73, 0x74, 0x6f, 0x6d, 0x2d, 0x68, 0x65, 0x61, 0x64, 0x65, 0x72,
        ];
        let mut decoder = Decoder::new(4096);
        let fields = decoder.decode(block).unwrap();
        assert_eq!(fields, vec![pair("custom-key", "custom-header")]);
        assert_eq!(decoder.dynamic_table_len(), 1);
        assert_eq!(decoder.dynamic_table_size(), 55);
    }

    #[test]
    fn rfc7541_c2_2_literal_without_indexing() {
        let block: &[u8] = &[
            0x04, 0x0c, 0x2f, 0x73, 0x61, 0x6d, 0x70, 0x6c, 0x65, 0x2f, 0x70, 0x61, 0x74, 0x68,
        ];
        let mut decoder = Decoder::new(4096);
        let fields = decoder.decode(block).unwrap();
        assert_eq!(fields, vec![pair(":path", "/sample/path")]);
        assert_eq!(decoder.dynamic_table_len(), 0);
    }

    #[test]
    fn empty_values_and_binary_octets_round_trip() {
        let mut encoder = Encoder::new(4096);
        let mut decoder = Decoder::new(4096);
        let fields = vec![
            HeaderField::new(b"x-empty".to_vec(), Vec::new()),
            HeaderField::new(b"x-binary".to_vec(), vec![0x00, 0xff, 0x7f, 0x80]),
        ];
        let block = encoder.encode(&fields);
        assert_eq!(decoder.decode(&block).unwrap(), fields);
    }

    #[test]
    fn huffman_policy_is_honored() {
        let fields = vec![pair("x-n", "aaaaaaaaaaaaaaaa")];
        let always = Encoder::with_policy(4096, HuffmanPolicy::Always).encode(&fields);
        let never = Encoder::with_policy(4096, HuffmanPolicy::Never).encode(&fields);
        assert!(always.len() < never.len());

        let mut decoder = Decoder::new(4096);
        assert_eq!(decoder.decode(&always).unwrap(), fields);
        let mut decoder = Decoder::new(4096);
        assert_eq!(decoder.decode(&never).unwrap(), fields);
    }
}
