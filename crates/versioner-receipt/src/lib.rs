//! Build timestamp determination and build receipt persistence.
//!
//! A snapshot build stamps its version with a timestamp. The producing
//! stage writes that timestamp to a build receipt so that a later, separate
//! invocation (for example a stage that tests the produced distributions)
//! can replay it and compute the identical snapshot version.
//!
//! The receipt is a flat key/value properties file:
//!
//! ```text
//! #Mon Jan 01 12:00:00 UTC 2024
//! buildTimestamp=20240101120000+0000
//! ```
//!
//! # Example
//!
//! ```
//! use versioner_receipt::{BuildTimestamp, persist_timestamp, read_timestamp};
//!
//! let td = tempfile::tempdir().expect("tempdir");
//! let path = td.path().join("build-receipt.properties");
//!
//! let ts = BuildTimestamp::from("20240101120000+0000");
//! persist_timestamp(&ts, &path).expect("persist");
//!
//! let replayed = read_timestamp(&path).expect("read");
//! assert_eq!(replayed, ts);
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use versioner_types::{ReleaseError, Reporter};

/// Receipt file name
pub const BUILD_RECEIPT_NAME: &str = "build-receipt.properties";

/// Directory (relative to the source root) holding distributions from a prior build
pub const INCOMING_DISTRIBUTIONS_DIR: &str = "incoming-distributions";

/// Property key holding the build timestamp
pub const BUILD_TIMESTAMP_PROPERTY: &str = "buildTimestamp";

/// `yyyyMMddHHmmssZ`
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%z";

/// Where a producing build writes its receipt
pub fn receipt_path(root: &Path) -> PathBuf {
    root.join(BUILD_RECEIPT_NAME)
}

/// Where a consuming build looks for a prior build's receipt
pub fn incoming_receipt_path(root: &Path) -> PathBuf {
    root.join(INCOMING_DISTRIBUTIONS_DIR).join(BUILD_RECEIPT_NAME)
}

/// The authoritative timestamp of a build.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildTimestamp(String);

impl BuildTimestamp {
    /// Mint a timestamp for the current instant.
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Format the given instant in UTC.
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(instant.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for BuildTimestamp {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BuildTimestamp {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for BuildTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decide the timestamp for this build.
///
/// A fresh timestamp is minted when `ignore_incoming_receipt` is set or no
/// receipt file exists at `receipt_path`. Otherwise the receipt's
/// `buildTimestamp` is replayed verbatim.
pub fn determine_timestamp(
    ignore_incoming_receipt: bool,
    receipt_path: &Path,
    reporter: &mut dyn Reporter,
) -> Result<BuildTimestamp, ReleaseError> {
    if ignore_incoming_receipt || !receipt_path.is_file() {
        return Ok(BuildTimestamp::now());
    }

    let timestamp = read_timestamp(receipt_path)?;
    reporter.warn(&format!(
        "Using build timestamp from incoming build receipt: {timestamp}"
    ));
    Ok(timestamp)
}

/// Read the `buildTimestamp` property of a receipt.
pub fn read_timestamp(path: &Path) -> Result<BuildTimestamp, ReleaseError> {
    let content = fs::read_to_string(path).map_err(|source| ReleaseError::ReceiptIo {
        path: path.to_path_buf(),
        source,
    })?;

    let mut properties = parse_properties(&content);
    properties
        .remove(BUILD_TIMESTAMP_PROPERTY)
        .map(BuildTimestamp)
        .ok_or_else(|| ReleaseError::MissingTimestamp {
            path: path.to_path_buf(),
        })
}

/// Write a receipt holding only `buildTimestamp`, replacing any existing file.
pub fn persist_timestamp(timestamp: &BuildTimestamp, output_path: &Path) -> Result<(), ReleaseError> {
    let io_err = |source: std::io::Error| ReleaseError::ReceiptIo {
        path: output_path.to_path_buf(),
        source,
    };

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut properties = BTreeMap::new();
    properties.insert(
        BUILD_TIMESTAMP_PROPERTY.to_string(),
        timestamp.as_str().to_string(),
    );
    let header = Utc::now().format("%a %b %d %H:%M:%S UTC %Y").to_string();
    let content = write_properties(&properties, Some(&header));

    // Write to temp file first, then rename for atomicity
    let tmp_path = output_path.with_extension("tmp");
    fs::write(&tmp_path, content).map_err(io_err)?;
    fs::rename(&tmp_path, output_path).map_err(io_err)?;

    Ok(())
}

const PROPERTY_WHITESPACE: [char; 3] = [' ', '\t', '\u{c}'];

/// Parse a flat properties document. Later duplicate keys win.
pub fn parse_properties(input: &str) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    let mut lines = input.lines();

    while let Some(raw) = lines.next() {
        let mut logical = raw.trim_start_matches(PROPERTY_WHITESPACE).to_string();
        if logical.is_empty() || logical.starts_with('#') || logical.starts_with('!') {
            continue;
        }

        while continues(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start_matches(PROPERTY_WHITESPACE)),
                None => break,
            }
        }

        let (key, value) = split_entry(&logical);
        properties.insert(unescape(key), unescape(value));
    }

    properties
}

/// Render properties, one `key=value` per line, with an optional `#` header.
pub fn write_properties(properties: &BTreeMap<String, String>, header: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(header) = header {
        out.push('#');
        out.push_str(header);
        out.push('\n');
    }
    for (key, value) in properties {
        out.push_str(&escape(key, true));
        out.push('=');
        out.push_str(&escape(value, false));
        out.push('\n');
    }
    out
}

// An odd run of trailing backslashes joins the next physical line.
fn continues(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '=' | ':' => {
                let value = line[idx + 1..].trim_start_matches(PROPERTY_WHITESPACE);
                return (&line[..idx], value);
            }
            ' ' | '\t' | '\u{c}' => {
                let rest = line[idx..].trim_start_matches(PROPERTY_WHITESPACE);
                let value = match rest.strip_prefix(['=', ':']) {
                    Some(after) => after.trim_start_matches(PROPERTY_WHITESPACE),
                    None => rest,
                };
                return (&line[..idx], value);
            }
            _ => {}
        }
    }
    (line, "")
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn escape(raw: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for (idx, ch) in raw.chars().enumerate() {
        match ch {
            ' ' if is_key || idx == 0 => out.push_str("\\ "),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{c}' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}
