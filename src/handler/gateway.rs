//! File gateway
//!
//! Per request: size probe, content type, byte window, then either a
//! header-only answer or a transfer task feeding the response body. The
//! pooled session is released exactly once on every path.

use super::router::RequestContext;
use crate::config::AppState;
use crate::error::GatewayError;
use crate::http::cache::CachePolicy;
use crate::http::{self, body, range, ByteRange, GatewayBody, RangeSelection, StreamHead};
use crate::logger::{self, TransferOutcome};
use crate::pool::PooledConnection;
use crate::transfer::{ChannelSink, DataTransfer, PumpEnd};
use hyper::Response;
use std::io;
use std::sync::Arc;
use tokio::sync::oneshot;

/// What the size probe told us about the file
enum FileSize {
    Known(u64),
    /// Upstream refused SIZE for a reason other than absence
    Unknown,
}

/// Serve one validated GET or HEAD request
pub async fn serve(ctx: RequestContext, state: Arc<AppState>) -> Response<GatewayBody> {
    let content_type = state.mime.resolve(&ctx.upstream.file_name);

    let mut pooled = match state.pool.acquire().await {
        Ok(pooled) => pooled,
        Err(e) => {
            logger::log_error(&format!("[Gateway] {}: {e}", ctx.raw_path));
            return finish_early(&ctx, &state, &e);
        }
    };

    let size = match pooled.size(&ctx.upstream.path).await {
        Ok(total) => FileSize::Known(total),
        Err(e) if e.is_not_found() => {
            state.pool.release(pooled, true).await;
            let err = GatewayError::from_upstream(&ctx.upstream.path, &e);
            return finish_early(&ctx, &state, &err);
        }
        Err(e) if e.is_transport() => {
            state.pool.release(pooled, false).await;
            logger::log_error(&format!("[Gateway] SIZE {}: {e}", ctx.upstream.path));
            let err = GatewayError::from_upstream(&ctx.upstream.path, &e);
            return finish_early(&ctx, &state, &err);
        }
        Err(e) => {
            logger::log_warning(&format!(
                "[Gateway] SIZE {} unavailable ({e}), streaming without length",
                ctx.upstream.path
            ));
            FileSize::Unknown
        }
    };

    let (selection, empty) = match size {
        FileSize::Known(0) => (None, true),
        FileSize::Known(total) => (select_window(&ctx, total), false),
        FileSize::Unknown => (None, false),
    };

    let http_config = &state.config.http;
    let head = StreamHead {
        content_type,
        selection,
        empty,
        cache: CachePolicy::for_content_type(content_type, http_config.media_max_age),
        enable_cors: http_config.enable_cors,
        server_name: &http_config.server_name,
    };

    if ctx.is_head || empty {
        state.pool.release(pooled, true).await;
        let resp = http::build_stream_response(&head, body::empty());
        log_access(&ctx, &state, head.status(), 0, TransferOutcome::Complete);
        return resp;
    }

    let (offset, length) = head.selection.as_ref().map_or((0, None), |sel| {
        let window = sel.window();
        (window.start(), Some(window.content_length()))
    });

    let path = ctx.upstream.path.clone();
    let (sink, channel_body) = ChannelSink::channel(head.content_length());
    let (ready_tx, ready_rx) = oneshot::channel();
    let job = TransferJob {
        ctx,
        state: Arc::clone(&state),
        status: head.status(),
        offset,
        length,
    };
    tokio::spawn(job.run(pooled, sink, ready_tx));

    match ready_rx.await {
        Ok(Ok(())) => http::build_stream_response(&head, channel_body.into_body()),
        Ok(Err(e)) => error_response(&e),
        Err(_) => {
            logger::log_error(&format!("[Gateway] {path}: transfer task ended without a result"));
            http::build_403_response()
        }
    }
}

/// Window to serve for a file of known, non-zero size
///
/// A range header that does not parse or does not fit falls back to the
/// whole file.
fn select_window(ctx: &RequestContext, total: u64) -> Option<RangeSelection> {
    match range::resolve(ctx.range_header.as_deref(), total) {
        Ok(selection) => Some(selection),
        Err(e) => {
            logger::log_warning(&format!(
                "[Gateway] {}: {e}, serving full content",
                ctx.raw_path
            ));
            ByteRange::full(total).map(RangeSelection::Full)
        }
    }
}

/// One RETR, owned by its own task so it survives the handler returning
struct TransferJob {
    ctx: RequestContext,
    state: Arc<AppState>,
    status: u16,
    offset: u64,
    length: Option<u64>,
}

impl TransferJob {
    /// Open the transfer, report the open result, then pump and release
    async fn run(
        self,
        mut pooled: PooledConnection,
        mut sink: ChannelSink,
        ready: oneshot::Sender<Result<(), GatewayError>>,
    ) {
        let path = self.ctx.upstream.path.as_str();
        let transfer = match DataTransfer::open(&mut *pooled, path, self.offset, self.length).await {
            Ok(transfer) => transfer,
            Err(e) => {
                let err = GatewayError::from_upstream(path, &e);
                if !matches!(err, GatewayError::NotFound(_)) {
                    logger::log_error(&format!("[Gateway] RETR {path}: {e}"));
                }
                let status = err.status();
                let _ = ready.send(Err(err));
                drop(sink);
                self.state.pool.release(pooled, !e.is_transport()).await;
                log_access(&self.ctx, &self.state, status, 0, TransferOutcome::Complete);
                return;
            }
        };
        let _ = ready.send(Ok(()));

        let (healthy, delivered, outcome) = match self.state.pump.drain(transfer, &mut sink).await {
            Ok(done) => {
                let outcome = match done.end {
                    PumpEnd::Completed => TransferOutcome::Complete,
                    PumpEnd::Cancelled => TransferOutcome::Cancelled,
                };
                (done.reusable, done.delivered, outcome)
            }
            Err(e) => {
                logger::log_error(&format!("[Gateway] {path}: {e}"));
                let delivered = match &e {
                    GatewayError::StreamInterrupted { delivered, .. } => *delivered,
                    _ => 0,
                };
                sink.fail(io::Error::other(e.to_string())).await;
                (false, delivered, TransferOutcome::Interrupted)
            }
        };
        drop(sink);

        self.state.pool.release(pooled, healthy).await;
        log_access(&self.ctx, &self.state, self.status, delivered, outcome);
    }
}

/// Answer a request that failed before any header was committed
fn finish_early(ctx: &RequestContext, state: &AppState, err: &GatewayError) -> Response<GatewayBody> {
    log_access(ctx, state, err.status(), 0, TransferOutcome::Complete);
    error_response(err)
}

/// Status page with a short cause; anything unmapped is refused with 403
fn error_response(err: &GatewayError) -> Response<GatewayBody> {
    match err.status() {
        404 => http::build_404_response(),
        500 => http::build_status_response(500, &format!("Internal Server Error: {}", err.cause())),
        503 => http::build_status_response(503, &format!("Service Unavailable: {}", err.cause())),
        _ => http::build_403_response(),
    }
}

fn log_access(
    ctx: &RequestContext,
    state: &AppState,
    status: u16,
    body_bytes: u64,
    outcome: TransferOutcome,
) {
    let logging = &state.config.logging;
    if logging.access_log {
        logger::log_access(
            &ctx.access_entry(status, body_bytes, outcome),
            &logging.access_log_format,
        );
    }
}
