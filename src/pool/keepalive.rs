//! Background keepalive sweep over idle sessions

use super::ConnectionPool;
use crate::ftp::UpstreamConnection;
use crate::logger;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub(super) fn spawn(pool: ConnectionPool) -> Option<JoinHandle<()>> {
    let secs = pool.inner.settings.keepalive_interval;
    if secs == 0 {
        return None;
    }
    let period = Duration::from_secs(secs);

    Some(tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let shutdown = pool.inner.shutdown.clone();

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => sweep(&pool).await,
            }
        }
    }))
}

/// Reap sessions idle past `max_idle_time`, NOOP the rest
///
/// The idle list is emptied under the lock and probed after it is released.
/// A session being probed is not in the pool, so no worker can check it out
/// mid-probe, and a hung upstream never blocks `acquire`.
pub(super) async fn sweep(pool: &ConnectionPool) {
    let max_idle_time = Duration::from_secs(pool.inner.settings.max_idle_time);
    let parked: Vec<UpstreamConnection> = std::mem::take(&mut *pool.inner.idle.lock().await);
    if parked.is_empty() {
        return;
    }

    let mut alive = Vec::with_capacity(parked.len());
    let mut reaped = 0usize;
    let mut failed = 0usize;
    for mut conn in parked {
        if conn.idle_for() > max_idle_time {
            reaped += 1;
            conn.close().await;
            continue;
        }
        let answered = conn.last_probe().elapsed();
        match conn.probe().await {
            Ok(()) => alive.push(conn),
            Err(e) => {
                failed += 1;
                logger::log_warning(&format!(
                    "[Pool] Keepalive probe on session #{} failed ({e}), last answered {}s ago",
                    conn.id(),
                    answered.as_secs()
                ));
                conn.close().await;
            }
        }
    }

    // Workers may have parked sessions meanwhile; survivors fill the rest
    let mut surplus = Vec::new();
    let kept = {
        let mut idle = pool.inner.idle.lock().await;
        for conn in alive {
            if idle.len() < pool.inner.settings.max_idle && !pool.inner.shutdown.is_cancelled() {
                idle.push(conn);
            } else {
                surplus.push(conn);
            }
        }
        idle.len()
    };
    let closed = surplus.len();
    for conn in surplus {
        conn.close().await;
    }

    if reaped + failed + closed > 0 {
        logger::log_info(&format!(
            "[Pool] Keepalive: {kept} idle, {reaped} reaped, {failed} failed, {closed} over capacity"
        ));
    }
}
