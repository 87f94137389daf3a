//! Cursor-based scanners over raw line-protocol bytes.
//!
//! Every scanner takes an immutable buffer and a cursor, and returns the new
//! cursor position together with the byte range it consumed. There is no
//! backtracking: a failed scan returns an [`Error`] carrying the partial
//! range as text. The two composite scanners, [`scan_key`] and
//! [`scan_fields`], validate one block of a point each and are fed disjoint
//! ranges of the same line by the parser.

use std::borrow::Cow;

use crate::error::{Error, Result};

/// Lossy text of a byte range, for embedding in errors.
pub(crate) fn to_text(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf).into_owned()
}

fn is_numeric(b: u8) -> bool {
    b.is_ascii_digit() || b == b'.'
}

/// Advance the cursor past spaces and tabs.
pub fn skip_whitespace(buf: &[u8], mut i: usize) -> usize {
    while i < buf.len() && (buf[i] == b' ' || buf[i] == b'\t') {
        i += 1;
    }
    i
}

/// Scan to the next `stop` byte. This is the coarse, escape-unaware split
/// used for delimiter search; escaped stop bytes terminate it too.
pub fn scan_to(buf: &[u8], i: usize, stop: u8) -> (usize, &[u8]) {
    let start = i;
    let mut i = i;
    while i < buf.len() && buf[i] != stop {
        i += 1;
    }
    (i, &buf[start..i])
}

/// Scan to the next `stop` byte or space, whichever comes first.
pub fn scan_to_space_or(buf: &[u8], i: usize, stop: u8) -> (usize, &[u8]) {
    let start = i;
    let mut i = i;
    while i < buf.len() && buf[i] != stop && buf[i] != b' ' {
        i += 1;
    }
    (i, &buf[start..i])
}

/// Scan a tag value: stops at an unescaped comma. A backslash escapes
/// exactly the next byte.
pub fn scan_tag_value(buf: &[u8], i: usize) -> (usize, &[u8]) {
    let start = i.min(buf.len());
    let mut i = start;
    while i < buf.len() {
        if buf[i] == b'\\' {
            i += 2;
            continue;
        }
        if buf[i] == b',' {
            break;
        }
        i += 1;
    }
    let i = i.min(buf.len());
    (i, &buf[start..i])
}

/// Scan a field value: stops at an unescaped comma outside quotes.
pub fn scan_field_value(buf: &[u8], i: usize) -> (usize, &[u8]) {
    let start = i.min(buf.len());
    let mut i = start;
    let mut quoted = false;
    while i < buf.len() {
        if buf[i] == b'"' {
            quoted = !quoted;
            i += 1;
            continue;
        }
        if buf[i] == b'\\' {
            i += 2;
            continue;
        }
        if buf[i] == b',' && !quoted {
            break;
        }
        i += 1;
    }
    let i = i.min(buf.len());
    (i, &buf[start..i])
}

/// Scan a numeric value: an optional leading `-`, at most one `.`, and
/// scientific notation where `e` may appear anywhere after the first
/// character; `+`/`-` are accepted mid-number only directly after an `e`.
/// Any other non-digit fails.
pub fn scan_number(buf: &[u8], i: usize) -> Result<(usize, &[u8])> {
    let start = i;
    let mut i = i;

    if i < buf.len() && buf[i] == b'-' {
        i += 1;
    }

    let mut decimals = 0;
    while i < buf.len() {
        let b = buf[i];
        if b == b',' || b == b' ' {
            break;
        }
        if b == b'.' {
            decimals += 1;
        }
        // 1.1.1 must fail
        if decimals > 1 {
            return Err(Error::InvalidNumber(to_text(&buf[start..i])));
        }
        if b == b'e' && i > start {
            i += 1;
            continue;
        }
        if (b == b'+' || b == b'-') && i > 0 && buf[i - 1] == b'e' {
            i += 1;
            continue;
        }
        if !is_numeric(b) {
            return Err(Error::InvalidNumber(to_text(&buf[start..i])));
        }
        i += 1;
    }

    Ok((i, &buf[start..i]))
}

/// Scan a boolean value. The only accepted spellings are `t`, `T`, `f`,
/// `F`, `true`, `TRUE`, `false`, `FALSE`.
pub fn scan_boolean(buf: &[u8], i: usize) -> Result<(usize, &[u8])> {
    let start = i.min(buf.len());
    let mut i = start;
    while i < buf.len() && buf[i] != b',' && buf[i] != b' ' {
        i += 1;
    }

    let tok = &buf[start..i];
    let valid = match tok.len() {
        // single-char spellings
        1 => matches!(tok[0], b't' | b'T' | b'f' | b'F'),
        4 => tok == b"true" || tok == b"TRUE",
        5 => tok == b"false" || tok == b"FALSE",
        _ => false,
    };
    if !valid {
        return Err(Error::InvalidBoolean(to_text(tok)));
    }

    Ok((i, tok))
}

/// Scan the optional timestamp block: a run of ASCII digits up to the first
/// newline or end of buffer. Anything else in that position is an error.
pub fn scan_time(buf: &[u8], i: usize) -> Result<(usize, &[u8])> {
    let start = skip_whitespace(buf, i);
    let mut i = start;
    while i < buf.len() {
        if buf[i] == b'\n' {
            break;
        }
        if !buf[i].is_ascii_digit() {
            return Err(Error::BadTimestamp(to_text(&buf[start..i])));
        }
        i += 1;
    }
    Ok((i, &buf[start..i]))
}

/// Scan and canonicalize the measurement + tags block of a point, up to the
/// first unescaped space.
///
/// While scanning, the start offset of every tag pair is recorded. An
/// ends-inward pass then compares tag names at mirror positions: equal
/// names fail with [`Error::DuplicateTags`]. Sortedness is decided by a
/// separate adjacent-pair scan over the same offsets, since the mirror walk
/// never visits the inner pairs of a set whose outer pairs are in order.
/// An unsorted set is rebuilt by insertion-sorting the recorded offsets
/// (keyed on tag name only) and re-joining the pairs; an already-sorted key
/// is returned as `Cow::Borrowed` straight out of `buf`.
pub fn scan_key(buf: &[u8], i: usize) -> Result<(usize, Cow<'_, [u8]>)> {
    let start = skip_whitespace(buf, i);
    let mut i = start;

    // Start offsets of each tag pair within buf, plus one sentinel just past
    // the end of the block, so pair j spans indices[j]..indices[j + 1] - 1.
    let mut indices: Vec<usize> = Vec::new();

    // whether an '=' has been seen in the pair being scanned
    let mut has_separator = false;

    let mut sorted = true;

    loop {
        if i >= buf.len() {
            i = buf.len();
            if !has_separator && !indices.is_empty() {
                return Err(Error::MissingTagValue(to_text(&buf[start..i])));
            }
            indices.push(i + 1);
            break;
        }
        match buf[i] {
            b'=' => {
                i += 1;
                has_separator = true;
            }
            b'\\' => {
                // escaped byte
                i += 2;
            }
            b',' => {
                if !has_separator && !indices.is_empty() {
                    return Err(Error::MissingTagValue(to_text(&buf[start..i])));
                }
                i += 1;
                indices.push(i);
                has_separator = false;
            }
            b' ' => {
                // end of block; fields come next
                if !has_separator && !indices.is_empty() {
                    return Err(Error::MissingTagValue(to_text(&buf[start..i])));
                }
                indices.push(i + 1);
                break;
            }
            _ => i += 1,
        }
    }

    // Walk the tag list from both ends toward the center, comparing names
    // at mirror positions. Equal names are duplicates.
    let separators = indices.len() - 1;
    for j in 0..separators / 2 {
        let (_, left) = scan_to(&buf[indices[j]..indices[j + 1] - 1], 0, b'=');
        let mirror = separators - j - 1;
        let (_, right) = scan_to(&buf[indices[mirror]..indices[mirror + 1] - 1], 0, b'=');

        if left == right {
            return Err(Error::DuplicateTags(to_text(&buf[start..i])));
        }
    }

    // Sortedness needs every adjacent pair checked; the mirror walk skips
    // the inner pairs of a set whose outer pairs are already in order.
    for j in 0..separators.saturating_sub(1) {
        let (_, name) = scan_to(&buf[indices[j]..indices[j + 1] - 1], 0, b'=');
        let (_, next) = scan_to(&buf[indices[j + 1]..indices[j + 2] - 1], 0, b'=');
        if name > next {
            sorted = false;
            break;
        }
    }

    if !sorted && separators > 0 {
        let measurement = &buf[start..indices[0] - 1];

        let mut tag_starts = indices[..separators].to_vec();
        insertion_sort(buf, &mut tag_starts);

        let mut key = Vec::with_capacity(i - start);
        key.extend_from_slice(measurement);
        for &t in &tag_starts {
            key.push(b',');
            let (_, pair) = scan_to_space_or(buf, t, b',');
            key.extend_from_slice(pair);
        }
        return Ok((i, Cow::Owned(key)));
    }

    Ok((i, Cow::Borrowed(&buf[start..i])))
}

fn insertion_sort(buf: &[u8], indices: &mut [usize]) {
    for i in 1..indices.len() {
        let mut j = i;
        while j > 0 && less(buf, indices, j, j - 1) {
            indices.swap(j, j - 1);
            j -= 1;
        }
    }
}

// Compares the tag names at two offsets; values are not part of the key.
fn less(buf: &[u8], indices: &[usize], i: usize, j: usize) -> bool {
    let (_, a) = scan_to(buf, indices[i], b'=');
    let (_, b) = scan_to(buf, indices[j], b'=');
    a < b
}

/// Scan and validate the field block of a point, up to the first unquoted
/// space. Each value's grammar is checked inline: numbers through
/// [`scan_number`], boolean-looking values through [`scan_boolean`], quoted
/// strings through quote-balance tracking. The validated range is returned
/// unparsed.
pub fn scan_fields(buf: &[u8], i: usize) -> Result<(usize, &[u8])> {
    let start = skip_whitespace(buf, i);
    let mut i = start;
    let mut quoted = false;

    while i < buf.len() {
        if buf[i] == b'\\' {
            i += 2;
            continue;
        }

        if buf[i] == b'"' {
            quoted = !quoted;
            i += 1;
            continue;
        }

        if buf[i] == b'=' && !quoted {
            // "... value=" at end of input
            if i + 1 >= buf.len() {
                return Err(Error::MissingFieldValue(to_text(&buf[start..i])));
            }
            // "... value=,value2=..." or "... value= ..."
            if buf[i + 1] == b',' || buf[i + 1] == b' ' {
                return Err(Error::MissingFieldValue(to_text(&buf[start..i])));
            }

            if is_numeric(buf[i + 1]) || buf[i + 1] == b'-' {
                let (pos, _) = scan_number(buf, i + 1)?;
                i = pos;
                continue;
            }
            // anything unquoted that does not look numeric must be a boolean
            if buf[i + 1] != b'"' {
                let (pos, _) = scan_boolean(buf, i + 1)?;
                i = pos;
                continue;
            }
        }

        if buf[i] == b' ' && !quoted {
            break;
        }
        i += 1;
    }

    let i = i.min(buf.len());
    if quoted {
        return Err(Error::UnbalancedQuotes(to_text(&buf[start..i])));
    }
    Ok((i, &buf[start..i]))
}
