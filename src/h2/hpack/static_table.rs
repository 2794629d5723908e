//! HPACK static table (RFC 7541 Appendix A).
//!
//! 61 fixed entries, 1-indexed; index 0 is invalid on the wire. A reverse
//! map by name is built once for O(1) candidate lookup.

use std::collections::HashMap;
use std::sync::OnceLock;

pub(crate) const STATIC_TABLE: [(&[u8], &[u8]); 61] = [
    (b":authority", b""),                   // 1
    (b":method", b"GET"),                   // 2
    (b":method", b"POST"),                  // 3
    (b":path", b"/"),                       // 4
    (b":path", b"/index.html"),             // 5
    (b":scheme", b"http"),                  // 6
    (b":scheme", b"https"),                 // 7
    (b":status", b"200"),                   // 8
    (b":status", b"204"),                   // 9
    (b":status", b"206"),                   // 10
    (b":status", b"304"),                   // 11
    (b":status", b"400"),                   // 12
    (b":status", b"404"),                   // 13
    (b":status", b"500"),                   // 14
    (b"accept-charset", b""),               // 15
    (b"accept-encoding", b"gzip, deflate"), // 16
    (b"accept-language", b""),              // 17
    (b"accept-ranges", b""),                // 18
    (b"accept", b""),                       // 19
    (b"access-control-allow-origin", b""),  // 20
    (b"age", b""),                          // 21
    (b"allow", b""),                        // 22
    (b"authorization", b""),                // 23
    (b"cache-control", b""),                // 24
    (b"content-disposition", b""),          // 25
    (b"content-encoding", b""),             // 26
    (b"content-language", b""),             // 27
    (b"content-length", b""),               // 28
    (b"content-location", b""),             // 29
    (b"content-range", b""),                // 30
    (b"content-type", b""),                 // 31
    (b"cookie", b""),                       // 32
    (b"date", b""),                         // 33
    (b"etag", b""),                         // 34
    (b"expect", b""),                       // 35
    (b"expires", b""),                      // 36
    (b"from", b""),                         // 37
    (b"host", b""),                         // 38
    (b"if-match", b""),                     // 39
    (b"if-modified-since", b""),            // 40
    (b"if-none-match", b""),                // 41
    (b"if-range", b""),                     // 42
    (b"if-unmodified-since", b""),          // 43
    (b"last-modified", b""),                // 44
    (b"link", b""),                         // 45
    (b"location", b""),                     // 46
    (b"max-forwards", b""),                 // 47
    (b"proxy-authenticate", b""),           // 48
    (b"proxy-authorization", b""),          // 49
    (b"range", b""),                        // 50
    (b"referer", b""),                      // 51
    (b"refresh", b""),                      // 52
    (b"retry-after", b""),                  // 53
    (b"server", b""),                       // 54
    (b"set-cookie", b""),                   // 55
    (b"strict-transport-security", b""),    // 56
    (b"transfer-encoding", b""),            // 57
    (b"user-agent", b""),                   // 58
    (b"vary", b""),                         // 59
    (b"via", b""),                          // 60
    (b"www-authenticate", b""),             // 61
];

pub(crate) const STATIC_TABLE_LEN: usize = STATIC_TABLE.len();

/// Outcome of a static table lookup.
pub(crate) enum StaticLookup {
    /// Name and value both match; holds the 1-based index.
    Exact(usize),
    /// Only the name matches; holds the lowest 1-based index with that name.
    Name(usize),
    Miss,
}

/// Reverse map: name -> 1-based indices of every entry carrying it, in
/// table order (so the first element is the lowest index).
fn by_name() -> &'static HashMap<&'static [u8], Vec<usize>> {
    static MAP: OnceLock<HashMap<&'static [u8], Vec<usize>>> = OnceLock::new();
    MAP.get_or_init(|| {
        let mut map: HashMap<&'static [u8], Vec<usize>> = HashMap::new();
        for (i, (name, _)) in STATIC_TABLE.iter().enumerate() {
            map.entry(name).or_default().push(i + 1);
        }
        map
    })
}

pub(crate) fn lookup(name: &[u8], value: &[u8]) -> StaticLookup {
    match by_name().get(name) {
        Some(indices) => {
            for &idx in indices {
                if STATIC_TABLE[idx - 1].1 == value {
                    return StaticLookup::Exact(idx);
                }
            }
            StaticLookup::Name(indices[0])
        }
        None => StaticLookup::Miss,
    }
}

/// Entry by 1-based index, or `None` when out of range (including 0).
pub(crate) fn get(index: usize) -> Option<(&'static [u8], &'static [u8])> {
    if index == 0 || index > STATIC_TABLE_LEN {
        return None;
    }
    Some(STATIC_TABLE[index - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_61_entries() {
        assert_eq!(STATIC_TABLE_LEN, 61);
    }

    #[test]
    fn exact_lookup_disambiguates_by_value() {
        assert!(matches!(lookup(b":method", b"GET"), StaticLookup::Exact(2)));
        assert!(matches!(lookup(b":method", b"POST"), StaticLookup::Exact(3)));
        assert!(matches!(lookup(b":status", b"404"), StaticLookup::Exact(13)));
    }

    #[test]
    fn name_lookup_returns_lowest_index() {
        assert!(matches!(lookup(b":method", b"PUT"), StaticLookup::Name(2)));
        assert!(matches!(lookup(b":status", b"418"), StaticLookup::Name(8)));
        assert!(matches!(lookup(b"cookie", b"a=b"), StaticLookup::Name(32)));
    }

    #[test]
    fn miss_for_unknown_name() {
        assert!(matches!(lookup(b"x-custom", b"1"), StaticLookup::Miss));
    }

    #[test]
    fn get_bounds() {
        assert!(get(0).is_none());
        assert_eq!(get(1), Some((&b":authority"[..], &b""[..])));
        assert_eq!(get(61), Some((&b"www-authenticate"[..], &b""[..])));
        assert!(get(62).is_none());
    }
}
