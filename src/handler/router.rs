//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, path
//! validation, then hand-off to the gateway.

use super::gateway;
use super::path::{self, UpstreamPath};
use crate::config::AppState;
use crate::error::GatewayError;
use crate::http::{self, GatewayBody};
use crate::logger::{self, AccessLogEntry, TransferOutcome};
use hyper::header::{HeaderMap, REFERER, RANGE, USER_AGENT};
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Everything the gateway needs from the request, owned so it can move into
/// the transfer task
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub is_head: bool,
    pub raw_path: String,
    pub query: Option<String>,
    pub upstream: UpstreamPath,
    pub range_header: Option<String>,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    pub http_version: &'static str,
    pub peer: SocketAddr,
    pub started: Instant,
}

impl RequestContext {
    /// Access log entry for this request
    pub fn access_entry(
        &self,
        status: u16,
        body_bytes: u64,
        outcome: TransferOutcome,
    ) -> AccessLogEntry {
        let mut entry = AccessLogEntry::new(
            self.peer.ip().to_string(),
            self.method.to_string(),
            self.raw_path.clone(),
        );
        entry.query.clone_from(&self.query);
        entry.http_version = self.http_version.to_string();
        entry.status = status;
        entry.body_bytes = body_bytes;
        entry.range.clone_from(&self.range_header);
        entry.outcome = outcome;
        entry.referer.clone_from(&self.referer);
        entry.user_agent.clone_from(&self.user_agent);
        entry.request_time_us = u64::try_from(self.started.elapsed().as_micros()).unwrap_or(u64::MAX);
        entry
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer: SocketAddr,
) -> Result<Response<GatewayBody>, Infallible> {
    let started = Instant::now();

    // 1. Check HTTP method
    if let Some(resp) = check_http_method(req.method(), state.config.http.enable_cors) {
        log_rejected(&req, &state, peer, started, resp.status().as_u16());
        return Ok(resp);
    }

    // 2. Reserved or unsafe paths never reach upstream
    let Some(upstream) = path::resolve(req.uri().path(), &state.config.upstream.root) else {
        let err = GatewayError::Forbidden(req.uri().path().to_string());
        logger::log_warning(&err.to_string());
        log_rejected(&req, &state, peer, started, err.status());
        return Ok(http::build_403_response());
    };

    // 3. Extract what the gateway needs and dispatch
    let headers = req.headers();
    let ctx = RequestContext {
        method: req.method().clone(),
        is_head: req.method() == Method::HEAD,
        raw_path: req.uri().path().to_string(),
        query: req.uri().query().map(ToString::to_string),
        upstream,
        range_header: header_string(headers, &RANGE),
        referer: header_string(headers, &REFERER),
        user_agent: header_string(headers, &USER_AGENT),
        http_version: version_str(req.version()),
        peer,
        started,
    };

    Ok(gateway::serve(ctx, state).await)
}

/// Check HTTP method and return appropriate response for non-GET/HEAD methods
fn check_http_method(method: &Method, enable_cors: bool) -> Option<Response<GatewayBody>> {
    match *method {
        Method::GET | Method::HEAD => None,
        Method::OPTIONS => Some(http::build_options_response(enable_cors)),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

/// Access log line for a request answered before any upstream contact
fn log_rejected<B>(
    req: &Request<B>,
    state: &AppState,
    peer: SocketAddr,
    started: Instant,
    status: u16,
) {
    let logging = &state.config.logging;
    if !logging.access_log {
        return;
    }
    let mut entry = AccessLogEntry::new(
        peer.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = version_str(req.version()).to_string();
    entry.status = status;
    entry.user_agent = header_string(req.headers(), &USER_AGENT);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    logger::log_access(&entry, &logging.access_log_format);
}

fn header_string(headers: &HeaderMap, name: &hyper::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
