//! API Middleware
//!
//! Admission control and response-time recording, applied to every route.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::handlers::AppState;
use crate::error::Result;
use crate::limiter::client_identity;

/// Rejects requests from clients over their burst or sustained limit.
///
/// The peer address is only available when the server is run with connect
/// info; without it clients fall back to the forwarded header or the shared
/// unknown bucket.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_identity(req.headers(), peer);

    if let Err(e) = state.limiter.admit(&client).into_result() {
        warn!(client = %client, path = %req.uri().path(), "request rate limited");
        return Err(e);
    }

    Ok(next.run(req).await)
}

/// Measures each request and feeds the duration into the cache statistics.
///
/// Wraps the rate limiter, so rejected requests are timed too.
pub async fn response_time_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let response = next.run(req).await;
    state
        .users
        .record_response_time(started.elapsed().as_millis() as u64)
        .await;
    response
}
