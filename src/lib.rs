//! # influxdb-line
//!
//! Codec for the InfluxDB line protocol: parse text lines of the form
//! `measurement[,tag=value]* field=value[,field=value]* [timestamp]` into
//! structured points, and serialize points back into a canonical series key
//! and a deterministic field encoding suitable for storage, comparison, and
//! hashing.
//!
//! ## Why?
//!
//! The text form of a point is not canonical: tags may arrive in any order,
//! yet every permutation of the same tag set names the same series. This
//! crate canonicalizes while it scans — tags are sorted (and duplicates
//! rejected) as part of parsing, and an already-sorted key is reused
//! without copying — so the key bytes coming out of the parser can be
//! compared and hashed directly.
//!
//! ## Quick Start
//!
//! ```
//! use influxdb_line::parse_points_with_precision;
//! use chrono::Utc;
//!
//! let lines = "cpu,host=serverB,region=us-west value=0.64 1434055562000000000\n";
//! let points = parse_points_with_precision(lines.as_bytes(), Utc::now(), "n").unwrap();
//!
//! assert_eq!(points[0].name(), "cpu");
//! assert_eq!(points[0].tags().get("host"), Some("serverB"));
//! assert_eq!(points[0].timestamp_nanos(), 1434055562000000000);
//! ```
//!
//! ## Features
//!
//! - **Canonical keys**: tag sets are sorted by name during the scan; two
//!   points with equal structured content have byte-identical keys
//! - **Zero-copy**: an already-sorted key is borrowed from the input buffer,
//!   not rebuilt
//! - **Typed fields**: integer, float, boolean, string, raw bytes, and null
//!   field values, with an exactly reversible text encoding
//! - **Error handling**: all parse and decode failures are returned as
//!   `Result`s carrying the offending text, no panics

pub mod error;
pub mod escape;
pub mod field;
pub mod key;
pub mod point;
pub mod scan;
pub mod value;

// Re-export main types at crate root
pub use error::{Error, Result};
pub use field::Fields;
pub use key::{make_key, Tags};
pub use point::{parse_points, parse_points_str, parse_points_with_precision, Point, Precision};
pub use value::FieldValue;
