//! Escaping of reserved line-protocol bytes.
//!
//! Four bytes are reserved by the text format: `,` separates tags and
//! fields, `=` separates names from values, space separates the key, field,
//! and timestamp blocks, and `"` delimits string field values. Each is
//! escaped as a backslash followed by the original byte. The reserved bytes
//! and the two-byte sequences they map to occupy disjoint parts of the byte
//! alphabet, so the substitutions can be applied in any order.

/// The reserved bytes and their two-byte escape sequences.
pub const ESCAPE_CODES: [(u8, [u8; 2]); 4] = [
    (b',', [b'\\', b',']),
    (b'"', [b'\\', b'"']),
    (b' ', [b'\\', b' ']),
    (b'=', [b'\\', b'=']),
];

fn is_reserved(b: u8) -> bool {
    ESCAPE_CODES.iter().any(|&(r, _)| r == b)
}

/// Escape every reserved byte in `src`.
pub fn escape(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    for &b in src {
        if is_reserved(b) {
            out.push(b'\\');
        }
        out.push(b);
    }
    out
}

/// Reverse [`escape`]: collapse every two-byte escape of a reserved byte.
///
/// A backslash followed by anything else is left untouched.
pub fn unescape(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        if src[i] == b'\\' && i + 1 < src.len() && is_reserved(src[i + 1]) {
            out.push(src[i + 1]);
            i += 2;
        } else {
            out.push(src[i]);
            i += 1;
        }
    }
    out
}

/// [`escape`] for `&str` input.
pub fn escape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, ',' | '"' | ' ' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// [`unescape`] for `&str` input.
pub fn unescape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, ',' | '"' | ' ' | '=') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_reserved_bytes() {
        assert_eq!(escape(b"a,b"), b"a\\,b");
        assert_eq!(escape(b"a=b"), b"a\\=b");
        assert_eq!(escape(b"a b"), b"a\\ b");
        assert_eq!(escape(b"a\"b"), b"a\\\"b");
        assert_eq!(escape(b"plain"), b"plain");
    }

    #[test]
    fn test_escape_all_reserved_at_once() {
        assert_eq!(escape(b", =\""), b"\\,\\ \\=\\\"");
    }

    #[test]
    fn test_unescape_reverses_escape() {
        for input in [
            &b"cpu load"[..],
            b"us,west",
            b"name=value",
            b"say \"hi\"",
            b"no-reserved-bytes",
        ] {
            assert_eq!(unescape(&escape(input)), input);
        }
    }

    #[test]
    fn test_unescape_leaves_other_backslashes() {
        assert_eq!(unescape(b"a\\nb"), b"a\\nb");
        assert_eq!(unescape(b"trailing\\"), b"trailing\\");
    }

    #[test]
    fn test_str_variants_match_byte_variants() {
        let s = "host name=server,1";
        assert_eq!(escape_str(s).as_bytes(), escape(s.as_bytes()).as_slice());
        assert_eq!(unescape_str(&escape_str(s)), s);
    }

    #[test]
    fn test_table_covers_exactly_four_bytes() {
        assert_eq!(ESCAPE_CODES.len(), 4);
        for (b, esc) in ESCAPE_CODES {
            assert!(is_reserved(b));
            assert_eq!(esc, [b'\\', b]);
        }
    }
}
