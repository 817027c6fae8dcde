//! HTTP response building module
//!
//! Builders for the fixed status responses and for the headers of a
//! streamed file.

use super::body::{self, GatewayBody};
use super::cache::CachePolicy;
use super::range::RangeSelection;
use hyper::Response;

/// Header set for a streamed (or HEAD) file response
#[derive(Debug, Clone)]
pub struct StreamHead<'a> {
    pub content_type: &'a str,
    /// `None` when the upstream size is unknown
    pub selection: Option<RangeSelection>,
    /// Upstream size known to be zero
    pub empty: bool,
    pub cache: CachePolicy,
    pub enable_cors: bool,
    pub server_name: &'a str,
}

impl StreamHead<'_> {
    pub const fn status(&self) -> u16 {
        match &self.selection {
            Some(sel) => sel.status(),
            None => 200,
        }
    }

    /// Exact body length, if known
    pub const fn content_length(&self) -> Option<u64> {
        match &self.selection {
            Some(sel) => Some(sel.window().content_length()),
            None if self.empty => Some(0),
            None => None,
        }
    }
}

/// Build the 200/206 response for a file body
pub fn build_stream_response(head: &StreamHead<'_>, body: GatewayBody) -> Response<GatewayBody> {
    let mut builder = Response::builder()
        .status(head.status())
        .header("Content-Type", head.content_type)
        .header("Server", head.server_name);

    // Without a known size a Range header is ignored, so none is advertised
    if head.selection.is_some() || head.empty {
        builder = builder.header("Accept-Ranges", "bytes");
    }
    if let Some(length) = head.content_length() {
        builder = builder.header("Content-Length", length);
    }
    if let Some(RangeSelection::Partial(range)) = &head.selection {
        builder = builder.header("Content-Range", range.content_range());
    }
    if let Some(value) = head.cache.to_header_value() {
        builder = builder.header("Cache-Control", value);
    }
    if head.enable_cors {
        builder = builder.header("Access-Control-Allow-Origin", "*");
    }

    builder.body(body).unwrap_or_else(|e| {
        log_build_error("stream", &e);
        Response::new(body::empty())
    })
}

/// Build a short plain-text error response
pub fn build_status_response(status: u16, message: &str) -> Response<GatewayBody> {
    let text = format!("{status} {message}");
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("Content-Length", text.len())
        .body(body::full(text.clone()))
        .unwrap_or_else(|e| {
            log_build_error(&status.to_string(), &e);
            Response::new(body::full(text))
        })
}

/// Build 403 Forbidden response
pub fn build_403_response() -> Response<GatewayBody> {
    build_status_response(403, "Forbidden")
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<GatewayBody> {
    build_status_response(404, "Not Found")
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<GatewayBody> {
    let mut resp = build_status_response(405, "Method Not Allowed");
    resp.headers_mut().insert(
        "Allow",
        hyper::header::HeaderValue::from_static("GET, HEAD, OPTIONS"),
    );
    resp
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(enable_cors: bool) -> Response<GatewayBody> {
    let mut builder = Response::builder()
        .status(204)
        .header("Allow", "GET, HEAD, OPTIONS");

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "GET, HEAD, OPTIONS")
            .header("Access-Control-Allow-Headers", "Content-Type, Range")
            .header("Access-Control-Expose-Headers", "Content-Length, Content-Range")
            .header("Access-Control-Max-Age", "86400");
    }

    builder.body(body::empty()).unwrap_or_else(|e| {
        log_build_error("OPTIONS", &e);
        Response::new(body::empty())
    })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::range::{self, ByteRange};

    fn head(selection: Option<RangeSelection>) -> StreamHead<'static> {
        StreamHead {
            content_type: "video/mp4",
            selection,
            empty: false,
            cache: CachePolicy::Public(86_400),
            enable_cors: true,
            server_name: "test",
        }
    }

    fn header<'r>(resp: &'r Response<GatewayBody>, name: &str) -> Option<&'r str> {
        resp.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[test]
    fn test_partial_headers() {
        let sel = range::resolve(Some("bytes=0-999"), 10_000).unwrap();
        let resp = build_stream_response(&head(Some(sel)), body::empty());
        assert_eq!(resp.status(), 206);
        assert_eq!(header(&resp, "content-range"), Some("bytes 0-999/10000"));
        assert_eq!(header(&resp, "content-length"), Some("1000"));
        assert_eq!(header(&resp, "accept-ranges"), Some("bytes"));
        assert_eq!(header(&resp, "access-control-allow-origin"), Some("*"));
        assert_eq!(header(&resp, "cache-control"), Some("public, max-age=86400"));
    }

    #[test]
    fn test_full_headers() {
        let sel = RangeSelection::Full(ByteRange::full(500).unwrap());
        let resp = build_stream_response(&head(Some(sel)), body::empty());
        assert_eq!(resp.status(), 200);
        assert_eq!(header(&resp, "content-length"), Some("500"));
        assert!(header(&resp, "content-range").is_none());
    }

    #[test]
    fn test_unknown_length() {
        let resp = build_stream_response(&head(None), body::empty());
        assert_eq!(resp.status(), 200);
        assert!(header(&resp, "content-length").is_none());
        assert!(header(&resp, "accept-ranges").is_none());
    }

    #[test]
    fn test_empty_file() {
        let mut h = head(None);
        h.empty = true;
        let resp = build_stream_response(&h, body::empty());
        assert_eq!(header(&resp, "content-length"), Some("0"));
        assert_eq!(header(&resp, "accept-ranges"), Some("bytes"));
    }

    #[test]
    fn test_error_responses() {
        assert_eq!(build_403_response().status(), 403);
        assert_eq!(build_404_response().status(), 404);
        let resp = build_405_response();
        assert_eq!(resp.status(), 405);
        assert_eq!(header(&resp, "allow"), Some("GET, HEAD, OPTIONS"));
        assert_eq!(build_options_response(true).status(), 204);
    }
}
