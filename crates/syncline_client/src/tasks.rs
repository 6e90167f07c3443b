//! Background task loops scheduled while a session is active.
//!
//! Every loop terminates itself when it observes the session ending, so
//! a forced sign-out (idle timeout, token rejection) winds the machinery
//! down even though only an explicit logout aborts the tasks from
//! outside.

use std::sync::Arc;

use chrono::Utc;
use syncline_net::Transport;
use syncline_session::SessionState;
use tokio::time::{interval, MissedTickBehavior};

use crate::client::ClientCore;

/// Samples the idle timer, driving warning and timeout transitions.
pub(crate) async fn idle_watch<T: Transport>(core: Arc<ClientCore<T>>) {
    let mut ticker = interval(core.config.idle_check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if core.session.poll_idle(Utc::now()) == SessionState::Unauthenticated {
            core.clear_engine_after_sign_out().await;
            break;
        }
    }
    tracing::debug!("idle watch loop finished");
}

/// Exchanges the token ahead of its expiry.
pub(crate) async fn token_refresh<T: Transport>(core: Arc<ClientCore<T>>) {
    let mut ticker = interval(core.config.refresh_check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if !core.session.state().is_authenticated() {
            break;
        }
        // poll_refresh absorbs transient failures; an error means the
        // token was rejected and the session is already gone
        if let Err(e) = core.session.poll_refresh(Utc::now()).await {
            tracing::warn!(error = %e, "token refresh ended the session");
            core.clear_engine_after_sign_out().await;
            break;
        }
    }
    tracing::debug!("token refresh loop finished");
}

/// Drains the pending-action queue.
///
/// Runs on the configured interval and immediately when backend
/// availability flips back on. A recovery observed while a pass is in
/// flight runs a follow-up pass right after it instead of waiting out
/// the interval.
pub(crate) async fn queue_drain<T: Transport>(core: Arc<ClientCore<T>>) {
    let mut availability = core.net.availability();
    let mut ticker = interval(core.config.engine.drain_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = availability.changed() => {
                if changed.is_err() {
                    break;
                }
                if !*availability.borrow_and_update() {
                    continue;
                }
                tracing::debug!("connectivity restored, draining immediately");
            }
        }
        if !core.session.state().is_authenticated() {
            break;
        }
        let Some(token) = core.session.token() else {
            break;
        };
        match core.engine.drain_once(&token, Utc::now()).await {
            Ok(report) if report.attempted > 0 => {
                tracing::debug!(
                    attempted = report.attempted,
                    delivered = report.delivered,
                    failed = report.failed,
                    abandoned = report.abandoned,
                    "drain pass finished"
                );
            }
            Ok(_) => {}
            Err(e) if e.is_auth() => {
                core.session.handle_auth_rejection();
                core.clear_engine_after_sign_out().await;
                break;
            }
            Err(e) => tracing::warn!(error = %e, "drain pass failed"),
        }
    }
    tracing::debug!("queue drain loop finished");
}

/// Fetches collections that a read reported missing or stale.
///
/// Woken by the engine's refresh signal for prompt first fetches; the
/// ticker retries keys whose refresh failed transiently.
pub(crate) async fn collection_fetch<T: Transport>(core: Arc<ClientCore<T>>) {
    let mut ticker = interval(core.config.fetch_retry_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = core.engine.refresh_signal().notified() => {}
        }
        if !core.session.state().is_authenticated() {
            break;
        }
        let Some(token) = core.session.token() else {
            break;
        };
        match core.engine.flush_refreshes(&token, Utc::now()).await {
            Ok(refreshed) if refreshed > 0 => {
                tracing::debug!(refreshed, "collection refresh round finished");
            }
            Ok(_) => {}
            Err(e) if e.is_auth() => {
                core.session.handle_auth_rejection();
                core.clear_engine_after_sign_out().await;
                break;
            }
            Err(e) => tracing::warn!(error = %e, "collection refresh round failed"),
        }
    }
    tracing::debug!("collection fetch loop finished");
}
