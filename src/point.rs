//! The point entity and the line-protocol parsing entry points.
//!
//! A point owns two independently mutable byte ranges: the canonical series
//! key (escaped measurement plus sorted tags) and the validated field text.
//! Mutating the name or tags regenerates only the key; mutating a field
//! regenerates only the field bytes. Structured views (`tags()`,
//! `fields()`) are decoded from those ranges on demand and never cached.

use std::fmt;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};

use crate::error::{Error, Result};
use crate::field::Fields;
use crate::key::{make_key, tags_from_key, Tags};
use crate::scan::{scan_fields, scan_key, scan_time, scan_to, to_text};
use crate::value::FieldValue;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// The time unit used to interpret an explicit timestamp and to truncate a
/// default one. Storage is always nanoseconds; precision is a parse-time
/// input only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precision {
    /// `n` — nanoseconds.
    Nanosecond,
    /// `u` — microseconds.
    Microsecond,
    /// `ms` — milliseconds.
    Millisecond,
    /// `s` — seconds.
    Second,
    /// `m` — minutes.
    Minute,
    /// `h` — hours.
    Hour,
}

impl Precision {
    /// Map a precision token to a unit. Unrecognized tokens mean
    /// nanoseconds; the write path has always treated them that way rather
    /// than erroring.
    pub fn from_token(token: &str) -> Self {
        match token {
            "u" => Precision::Microsecond,
            "ms" => Precision::Millisecond,
            "s" => Precision::Second,
            "m" => Precision::Minute,
            "h" => Precision::Hour,
            _ => Precision::Nanosecond,
        }
    }

    /// Duration of one unit, in nanoseconds.
    pub fn multiplier(self) -> i64 {
        match self {
            Precision::Nanosecond => 1,
            Precision::Microsecond => 1_000,
            Precision::Millisecond => 1_000_000,
            Precision::Second => 1_000_000_000,
            Precision::Minute => 60 * 1_000_000_000,
            Precision::Hour => 3_600 * 1_000_000_000,
        }
    }

    fn delta(self) -> TimeDelta {
        TimeDelta::nanoseconds(self.multiplier())
    }
}

/// A single time-series data point.
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    time: DateTime<Utc>,

    // canonical key: escaped measurement plus tags sorted by name
    key: Vec<u8>,

    // validated text encoding of the field assignments
    fields: Vec<u8>,

    // opaque payload for the storage layer; not interpreted here
    data: Vec<u8>,
}

impl Point {
    /// Build a point from its structured parts. The key and field ranges
    /// are encoded immediately.
    pub fn new(name: &str, tags: &Tags, fields: &Fields, time: DateTime<Utc>) -> Point {
        Point {
            time,
            key: make_key(name.as_bytes(), tags),
            fields: fields.to_encoded(),
            data: Vec::new(),
        }
    }

    /// The canonical series key. Two points denote the same series iff
    /// their keys are byte-equal.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    fn name_bytes(&self) -> &[u8] {
        let (_, name) = scan_to(&self.key, 0, b',');
        name
    }

    /// The measurement name, unescaped.
    pub fn name(&self) -> String {
        to_text(&crate::escape::unescape(self.name_bytes()))
    }

    /// Replace the measurement name, rebuilding the key.
    pub fn set_name(&mut self, name: &str) {
        self.key = make_key(name.as_bytes(), &self.tags());
    }

    /// Decode the tag set from the key.
    pub fn tags(&self) -> Tags {
        tags_from_key(&self.key)
    }

    /// Replace the tag set, rebuilding the key.
    pub fn set_tags(&mut self, tags: &Tags) {
        self.key = make_key(&crate::escape::unescape(self.name_bytes()), tags);
    }

    /// Add or replace one tag, rebuilding the key.
    pub fn add_tag(&mut self, name: &str, value: &str) {
        let mut tags = self.tags();
        tags.insert(name, value);
        self.set_tags(&tags);
    }

    /// Decode the field set from the stored field bytes. Decoding happens
    /// on every call; nothing is cached between reads.
    pub fn fields(&self) -> Result<Fields> {
        Fields::from_encoded(&self.fields)
    }

    /// The validated field bytes as stored on the point.
    pub fn field_bytes(&self) -> &[u8] {
        &self.fields
    }

    /// Add or replace one field, re-encoding the field bytes.
    pub fn add_field(&mut self, name: &str, value: FieldValue) -> Result<()> {
        let mut fields = self.fields()?;
        fields.insert(name, value);
        self.fields = fields.to_encoded();
        Ok(())
    }

    /// The point's timestamp. Always nanosecond resolution.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Replace the timestamp.
    pub fn set_time(&mut self, time: DateTime<Utc>) {
        self.time = time;
    }

    /// Truncate the current timestamp to the given precision.
    pub fn set_precision(&mut self, precision: Precision) {
        if precision != Precision::Nanosecond {
            self.time = self.time.duration_trunc(precision.delta()).unwrap_or(self.time);
        }
    }

    /// Nanoseconds since the epoch.
    pub fn timestamp_nanos(&self) -> i64 {
        self.time.timestamp_nanos_opt().unwrap_or_default()
    }

    /// The opaque payload handed through to the storage layer.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Attach an opaque payload.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
    }

    /// A 64-bit FNV-1a hash over the key bytes: a fast, non-cryptographic
    /// series identifier. No collision detection happens at this layer;
    /// callers that need collision safety must compare full keys.
    pub fn hash_id(&self) -> u64 {
        let mut hash = FNV_OFFSET;
        for &b in &self.key {
            hash ^= u64::from(b);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            String::from_utf8_lossy(&self.key),
            String::from_utf8_lossy(&self.fields),
            self.timestamp_nanos()
        )
    }
}

/// Parse newline-delimited lines with the current time as the default
/// timestamp and nanosecond precision.
pub fn parse_points(buf: &[u8]) -> Result<Vec<Point>> {
    parse_points_with_precision(buf, Utc::now(), "n")
}

/// [`parse_points`] over a `&str`.
pub fn parse_points_str(s: &str) -> Result<Vec<Point>> {
    parse_points(s.as_bytes())
}

/// Parse newline-delimited lines into points, in input order.
///
/// `default_time`, truncated to `precision`, is assigned to every line that
/// carries no explicit timestamp; an explicit timestamp is interpreted as a
/// count of `precision` units since the epoch. The first line that fails
/// aborts the whole batch with [`Error::Line`] carrying that line's raw
/// text.
pub fn parse_points_with_precision(
    buf: &[u8],
    default_time: DateTime<Utc>,
    precision: &str,
) -> Result<Vec<Point>> {
    let precision = Precision::from_token(precision);
    let mut points = Vec::new();
    let mut pos = 0;

    loop {
        let (next, block) = scan_to(buf, pos, b'\n');
        pos = next + 1;

        if block.is_empty() {
            break;
        }

        let point = parse_point(block, default_time, precision).map_err(|e| Error::Line {
            line: to_text(block),
            source: Box::new(e),
        })?;
        points.push(point);

        if pos >= buf.len() {
            break;
        }
    }

    Ok(points)
}

fn parse_point(buf: &[u8], default_time: DateTime<Utc>, precision: Precision) -> Result<Point> {
    // first block: measurement[,tag=value...], canonicalized while scanning
    let (pos, key) = scan_key(buf, 0)?;
    if key.is_empty() {
        return Err(Error::MissingMeasurement(to_text(buf)));
    }

    // second block: field=value[,field=value...]
    let (pos, fields) = scan_fields(buf, pos)?;
    if fields.is_empty() {
        return Err(Error::MissingFields(to_text(buf)));
    }

    // last block: optional integer timestamp
    let (_, ts) = scan_time(buf, pos)?;

    let mut point = Point {
        time: default_time,
        key: key.into_owned(),
        fields: fields.to_vec(),
        data: Vec::new(),
    };

    if ts.is_empty() {
        point.set_precision(precision);
    } else {
        let count: i64 = to_text(ts)
            .parse()
            .map_err(|_| Error::BadTimestamp(to_text(ts)))?;
        let nanos = count
            .checked_mul(precision.multiplier())
            .ok_or_else(|| Error::BadTimestamp(to_text(ts)))?;
        point.time = DateTime::from_timestamp_nanos(nanos);
    }

    Ok(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordered_float::OrderedFloat;

    fn parse_one(line: &str) -> Point {
        let points = parse_points_str(line).unwrap();
        assert_eq!(points.len(), 1);
        points.into_iter().next().unwrap()
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn test_parse_full_line() {
        let pt = parse_one("cpu,host=serverB,region=us-west value=1.0 1257894000000000000");
        assert_eq!(pt.name(), "cpu");
        assert_eq!(pt.key(), b"cpu,host=serverB,region=us-west");
        assert_eq!(pt.tags().get("host"), Some("serverB"));
        assert_eq!(pt.tags().get("region"), Some("us-west"));
        assert_eq!(
            pt.fields().unwrap().get("value"),
            Some(&FieldValue::Float(OrderedFloat(1.0)))
        );
        assert_eq!(pt.timestamp_nanos(), 1257894000000000000);
    }

    #[test]
    fn test_parse_resorts_tags() {
        let sorted = parse_one("cpu,host=serverB,region=us-west value=1");
        let unsorted = parse_one("cpu,region=us-west,host=serverB value=1");
        assert_eq!(sorted.key(), unsorted.key());
        assert_eq!(sorted.hash_id(), unsorted.hash_id());
    }

    #[test]
    fn test_parse_no_tags() {
        let pt = parse_one("cpu value=1,value2=2");
        assert_eq!(pt.key(), b"cpu");
        assert!(pt.tags().is_empty());
        assert_eq!(pt.fields().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_errors() {
        let cases: [(&str, fn(&Error) -> bool); 6] = [
            ("cpu,host=a,host=b value=1", |e| {
                matches!(e, Error::DuplicateTags(_))
            }),
            ("cpu,host value=1", |e| matches!(e, Error::MissingTagValue(_))),
            ("cpu,host=a", |e| matches!(e, Error::MissingFields(_))),
            ("cpu value=1.1.1", |e| matches!(e, Error::InvalidNumber(_))),
            ("cpu value=\"open", |e| matches!(e, Error::UnbalancedQuotes(_))),
            ("cpu value=1 -123", |e| matches!(e, Error::BadTimestamp(_))),
        ];
        for (line, check) in cases {
            let err = parse_points_str(line).unwrap_err();
            match &err {
                Error::Line { line: text, source } => {
                    assert_eq!(text, line);
                    assert!(check(source.as_ref()), "line {line}: {source}");
                }
                other => panic!("expected Error::Line, got {other}"),
            }
        }
    }

    #[test]
    fn test_parse_batch_preserves_order() {
        let buf = "m1 value=1 100\nm2 value=2 200\nm3 value=3 300\n";
        let points = parse_points_str(buf).unwrap();
        let names: Vec<String> = points.iter().map(Point::name).collect();
        assert_eq!(names, ["m1", "m2", "m3"]);
    }

    #[test]
    fn test_parse_batch_aborts_on_first_error() {
        let buf = "m1 value=1\nm2 value=oops\nm3 value=3\n";
        let err = parse_points_str(buf).unwrap_err();
        match err {
            Error::Line { line, .. } => assert_eq!(line, "m2 value=oops"),
            other => panic!("expected Error::Line, got {other}"),
        }
    }

    #[test]
    fn test_parse_missing_measurement() {
        let err = parse_points_str("   ").unwrap_err();
        match err {
            Error::Line { source, .. } => {
                assert!(matches!(*source, Error::MissingMeasurement(_)))
            }
            other => panic!("expected Error::Line, got {other}"),
        }
    }

    // =========================================================================
    // Timestamps and precision
    // =========================================================================

    #[test]
    fn test_explicit_timestamp_scaled_by_precision() {
        let now = Utc::now();
        for (token, expected) in [
            ("n", 1434055562000000000i64),
            ("u", 1434055562000000000),
            ("ms", 1434055562000000000),
            ("s", 1434055562000000000),
        ] {
            let count = expected / Precision::from_token(token).multiplier();
            let line = format!("cpu value=1 {count}");
            let points = parse_points_with_precision(line.as_bytes(), now, token).unwrap();
            assert_eq!(points[0].timestamp_nanos(), expected, "token {token}");
        }
    }

    #[test]
    fn test_default_time_truncated_to_precision() {
        let default_time = DateTime::from_timestamp_nanos(1_700_000_000_123_456_789);
        let cases = [
            ("n", 1_700_000_000_123_456_789i64),
            ("u", 1_700_000_000_123_456_000),
            ("ms", 1_700_000_000_123_000_000),
            ("s", 1_700_000_000_000_000_000),
        ];
        for (token, expected) in cases {
            let points =
                parse_points_with_precision(b"cpu value=1,value2=2 ", default_time, token).unwrap();
            assert_eq!(points[0].timestamp_nanos(), expected, "token {token}");
        }
    }

    #[test]
    fn test_unknown_precision_token_means_nanoseconds() {
        // unknown tokens fall back to nanoseconds silently; this is the
        // documented contract, not an oversight
        let default_time = DateTime::from_timestamp_nanos(1_700_000_000_123_456_789);
        let points =
            parse_points_with_precision(b"cpu value=1", default_time, "parsecs").unwrap();
        assert_eq!(points[0].time(), default_time);

        let points =
            parse_points_with_precision(b"cpu value=1 42", default_time, "parsecs").unwrap();
        assert_eq!(points[0].timestamp_nanos(), 42);
    }

    // =========================================================================
    // Construction and mutation
    // =========================================================================

    #[test]
    fn test_new_matches_parsed() {
        let tags: Tags = [("host", "serverB"), ("region", "us-west")]
            .into_iter()
            .collect();
        let fields: Fields = [("value", 1.0f64)].into_iter().collect();
        let time = DateTime::from_timestamp_nanos(1257894000000000000);

        let built = Point::new("cpu", &tags, &fields, time);
        let parsed = parse_one("cpu,host=serverB,region=us-west value=1.0 1257894000000000000");
        assert_eq!(built, parsed);
    }

    #[test]
    fn test_set_name_rebuilds_only_key() {
        let mut pt = parse_one("cpu,host=a value=1 100");
        let fields_before = pt.field_bytes().to_vec();
        pt.set_name("mem");
        assert_eq!(pt.key(), b"mem,host=a");
        assert_eq!(pt.field_bytes(), fields_before.as_slice());
    }

    #[test]
    fn test_add_tag_keeps_key_sorted() {
        let mut pt = parse_one("cpu,host=a value=1 100");
        pt.add_tag("aisle", "3");
        assert_eq!(pt.key(), b"cpu,aisle=3,host=a");
    }

    #[test]
    fn test_add_field_reencodes_fields() {
        let mut pt = parse_one("cpu value=1 100");
        let key_before = pt.key().to_vec();
        pt.add_field("other", FieldValue::from(2.0)).unwrap();
        assert_eq!(pt.field_bytes(), b"other=2.0,value=1");
        assert_eq!(pt.key(), key_before.as_slice());
    }

    #[test]
    fn test_escaped_name_round_trip() {
        let tags = Tags::new();
        let fields: Fields = [("value", 1i64)].into_iter().collect();
        let pt = Point::new("cpu load", &tags, &fields, Utc::now());
        assert_eq!(pt.key(), b"cpu\\ load");
        assert_eq!(pt.name(), "cpu load");
    }

    #[test]
    fn test_data_payload_is_opaque() {
        let mut pt = parse_one("cpu value=1 100");
        assert!(pt.data().is_empty());
        pt.set_data(vec![0xde, 0xad]);
        assert_eq!(pt.data(), &[0xde, 0xad]);
        // attaching a payload touches neither key nor fields
        assert_eq!(pt.key(), b"cpu");
        assert_eq!(pt.field_bytes(), b"value=1");
    }

    // =========================================================================
    // Identity
    // =========================================================================

    #[test]
    fn test_hash_id_is_fnv1a_of_key() {
        // FNV-1a reference values for known inputs
        let tags = Tags::new();
        let fields: Fields = [("value", 1i64)].into_iter().collect();
        let pt = Point::new("a", &tags, &fields, Utc::now());
        // fnv1a("a") = offset ^ 'a' then * prime
        let expected = (FNV_OFFSET ^ u64::from(b'a')).wrapping_mul(FNV_PRIME);
        assert_eq!(pt.hash_id(), expected);
    }

    #[test]
    fn test_hash_id_equal_iff_same_series() {
        let a = parse_one("cpu,host=a value=1 100");
        let b = parse_one("cpu,host=a value=99 200");
        let c = parse_one("cpu,host=b value=1 100");
        assert_eq!(a.hash_id(), b.hash_id());
        assert_ne!(a.hash_id(), c.hash_id());
    }

    #[test]
    fn test_display() {
        let pt = parse_one("cpu,host=a value=1 100");
        assert_eq!(pt.to_string(), "cpu,host=a value=1 100");
    }
}
