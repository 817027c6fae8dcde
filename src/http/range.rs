//! HTTP Range request resolution
//!
//! Resolves a `Range` header against a known file size, following RFC 7233
//! for the single `bytes=start-end` and `bytes=start-` forms. Suffix ranges
//! and multi-range requests are rejected so the caller serves the full file
//! instead of guessing.

use crate::error::GatewayError;

/// Inclusive byte window over a file
///
/// Always satisfies `start <= end < total`, which implies `total >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start: u64,
    end: u64,
    total: u64,
}

impl ByteRange {
    /// Build a window, returning `None` when it would break the invariant
    pub const fn new(start: u64, end: u64, total: u64) -> Option<Self> {
        if start <= end && end < total {
            Some(Self { start, end, total })
        } else {
            None
        }
    }

    /// The whole file; `None` for an empty file
    pub const fn full(total: u64) -> Option<Self> {
        if total == 0 {
            None
        } else {
            Self::new(0, total - 1, total)
        }
    }

    pub const fn start(&self) -> u64 {
        self.start
    }

    pub const fn end(&self) -> u64 {
        self.end
    }

    pub const fn total(&self) -> u64 {
        self.total
    }

    #[inline]
    pub const fn content_length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value, e.g. `bytes 0-999/10000`
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

/// Outcome of a successful resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSelection {
    /// No Range header: the whole file with status 200
    Full(ByteRange),
    /// A satisfiable range: status 206 with `Content-Range`
    Partial(ByteRange),
}

impl RangeSelection {
    pub const fn window(&self) -> ByteRange {
        match self {
            Self::Full(r) | Self::Partial(r) => *r,
        }
    }

    pub const fn status(&self) -> u16 {
        match self {
            Self::Full(_) => 200,
            Self::Partial(_) => 206,
        }
    }

    pub const fn is_partial(&self) -> bool {
        matches!(self, Self::Partial(_))
    }
}

/// Resolve an optional `Range` header against `total_size`
///
/// # Examples
/// ```
/// use ftp_gateway::http::range::{resolve, RangeSelection};
///
/// let sel = resolve(Some("bytes=100-"), 1000).unwrap();
/// assert!(sel.is_partial());
/// assert_eq!(sel.window().start(), 100);
/// assert_eq!(sel.window().end(), 999);
/// assert_eq!(sel.window().content_length(), 900);
///
/// assert!(matches!(resolve(None, 1000), Ok(RangeSelection::Full(_))));
/// assert!(resolve(Some("bytes=-500"), 1000).is_err());
/// ```
pub fn resolve(range_header: Option<&str>, total_size: u64) -> Result<RangeSelection, GatewayError> {
    let Some(header) = range_header else {
        return ByteRange::full(total_size)
            .map(RangeSelection::Full)
            .ok_or_else(|| unsatisfiable("", total_size));
    };

    let spec = strip_bytes_unit(header.trim()).ok_or_else(|| malformed(header))?;

    // Only a single range is served
    if spec.contains(',') {
        return Err(malformed(header));
    }

    let (start_str, end_str) = spec.split_once('-').ok_or_else(|| malformed(header))?;
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    // Suffix form "-N" is refused rather than reinterpreted
    if start_str.is_empty() {
        return Err(malformed(header));
    }

    let start = parse_position(start_str).ok_or_else(|| malformed(header))?;
    let end = if end_str.is_empty() {
        None
    } else {
        Some(parse_position(end_str).ok_or_else(|| malformed(header))?)
    };

    if start >= total_size {
        return Err(unsatisfiable(header, total_size));
    }

    // An end past the last byte means "through the end" (RFC 7233 §2.1)
    let end = end.map_or(total_size - 1, |e| e.min(total_size - 1));

    ByteRange::new(start, end, total_size)
        .map(RangeSelection::Partial)
        .ok_or_else(|| unsatisfiable(header, total_size))
}

fn strip_bytes_unit(header: &str) -> Option<&str> {
    let (unit, spec) = header.split_once('=')?;
    unit.trim().eq_ignore_ascii_case("bytes").then_some(spec)
}

/// Digits only: rejects signs, which `u64::from_str` would accept as `+`
fn parse_position(s: &str) -> Option<u64> {
    if s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

fn malformed(header: &str) -> GatewayError {
    GatewayError::MalformedRange(header.to_string())
}

fn unsatisfiable(header: &str, total: u64) -> GatewayError {
    GatewayError::UnsatisfiableRange {
        header: header.to_string(),
        total,
    }
}
