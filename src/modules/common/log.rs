// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::{
    num::NonZeroU32,
    sync::LazyLock,
    time::{Duration, Instant},
};

use governor::{
    clock::{QuantaClock, QuantaInstant},
    middleware::NoOpMiddleware,
    state::InMemoryState,
    Quota, RateLimiter,
};
use poem::{
    web::RealIp, Endpoint, FromRequest, IntoResponse, Middleware, Request, Response, Result,
};
use poem_openapi::OperationId;
use tracing::{error, info, warn, Instrument};

pub type GovRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    InMemoryState,
    QuantaClock,
    NoOpMiddleware<QuantaInstant>,
>;

const LOG_PER_SECOND: NonZeroU32 = NonZeroU32::MIN.saturating_add(9);

static RATE_LIMITER: LazyLock<LogRateLimiter> = LazyLock::new(LogRateLimiter::new);

/// Keeps a polling dashboard from flooding the log with request lines.
pub struct LogRateLimiter {
    limiter: GovRateLimiter,
}

impl LogRateLimiter {
    pub fn new() -> Self {
        Self {
            limiter: RateLimiter::direct(Quota::per_second(LOG_PER_SECOND)),
        }
    }

    pub fn should_log(&self, status: u16) -> bool {
        // errors are cheap, successes expensive
        let cost = match status {
            500_u16.. => NonZeroU32::MIN,
            400_u16..=499_u16 => NonZeroU32::MIN.saturating_add(2),
            _ => NonZeroU32::MIN.saturating_add(4),
        };
        self.limiter.check_n(cost).is_ok_and(|r| r.is_ok())
    }
}

#[derive(Default)]
pub struct Tracing;

impl<E: Endpoint> Middleware<E> for Tracing {
    type Output = TracingEndpoint<E>;

    fn transform(&self, ep: E) -> Self::Output {
        TracingEndpoint { inner: ep }
    }
}

pub struct TracingEndpoint<E> {
    inner: E,
}

impl<E: Endpoint> Endpoint for TracingEndpoint<E> {
    type Output = Response;

    async fn call(&self, req: Request) -> Result<Self::Output> {
        let remote_addr = RealIp::from_request_without_body(&req)
            .await
            .ok()
            .and_then(|real_ip| real_ip.0)
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| req.remote_addr().to_string());
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let span = tracing::info_span!(
            "request",
            remote_addr = %remote_addr,
            method = %method,
            path = %path,
        );

        async move {
            let now = Instant::now();
            let res = self.inner.call(req).await;
            let duration = now.elapsed();

            match res {
                Ok(resp) => {
                    let resp = resp.into_response();
                    let operation = resp.data::<OperationId>().map(|id| id.0);
                    log_response(resp.status().as_u16(), operation, duration);
                    Ok(resp)
                }
                Err(err) => {
                    log_response(err.status().as_u16(), None, duration);
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[inline]
fn log_response(status: u16, operation: Option<&'static str>, duration: Duration) {
    if !RATE_LIMITER.should_log(status) {
        return;
    }
    match status {
        500.. => {
            error!(status = %status, operation = ?operation, duration = ?duration, "request completed with server error");
        }
        400..=499 => {
            warn!(status = %status, operation = ?operation, duration = ?duration, "request completed with client error");
        }
        _ => {
            info!(status = %status, operation = ?operation, duration = ?duration, "request completed successfully");
        }
    }
}
