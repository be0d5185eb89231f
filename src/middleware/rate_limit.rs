use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::RETRY_AFTER,
    rt, Error, HttpResponse,
};
use futures_util::future::LocalBoxFuture;
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use std::future::{ready, Ready};
use std::net::{IpAddr, Ipv4Addr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

type IpRateLimiter = RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>;

/// Per-client-IP request quota. Clones share one limiter.
#[derive(Clone)]
pub struct RateLimitMiddleware {
    limiter: Arc<IpRateLimiter>,
}

impl RateLimitMiddleware {
    pub fn new(quota: Quota) -> Self {
        RateLimitMiddleware {
            limiter: Arc::new(RateLimiter::dashmap(quota)),
        }
    }

    pub fn per_minute(requests_per_minute: NonZeroU32) -> Self {
        Self::new(Quota::per_minute(requests_per_minute))
    }

    /// Forgets clients whose quota has fully replenished.
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Runs [`retain_recent`](Self::retain_recent) every `period` on the
    /// current actix runtime.
    pub fn spawn_cleanup(&self, period: Duration) {
        let limiter = self.clone();
        rt::spawn(async move {
            let mut interval = rt::time::interval(period);
            loop {
                interval.tick().await;
                limiter.retain_recent();
                debug!(tracked_clients = limiter.limiter.len(), "Rate limiter pruned");
            }
        });
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service,
            limiter: self.limiter.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: S,
    limiter: Arc<IpRateLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let ip = req
            .peer_addr()
            .map(|addr| addr.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

        if let Err(not_until) = self.limiter.check_key(&ip) {
            let retry_after = not_until
                .wait_time_from(DefaultClock::default().now())
                .as_secs()
                .max(1);
            warn!(ip = %ip, retry_after, "Rate limit exceeded");

            let (req, _pl) = req.into_parts();
            let res = HttpResponse::TooManyRequests()
                .insert_header((RETRY_AFTER, retry_after.to_string()))
                .json(serde_json::json!({
                    "error": "Too many requests. Please try again later."
                }));
            return Box::pin(
                async move { Ok(ServiceResponse::new(req, res).map_into_boxed_body()) },
            );
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, web, App};

    #[actix_web::test]
    async fn test_requests_over_quota_rejected() {
        let limit = RateLimitMiddleware::per_minute(NonZeroU32::new(2).unwrap());
        let app = test::init_service(
            App::new().service(
                web::scope("/api/auth")
                    .wrap(limit)
                    .route("/login", web::post().to(HttpResponse::Ok)),
            ),
        )
        .await;

        for _ in 0..2 {
            let req = test::TestRequest::post().uri("/api/auth/login").to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let req = test::TestRequest::post().uri("/api/auth/login").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(resp.headers().contains_key(RETRY_AFTER));
    }

    #[actix_web::test]
    async fn test_stale_clients_are_forgotten() {
        let quota = Quota::with_period(Duration::from_millis(5)).unwrap();
        let limit = RateLimitMiddleware::new(quota);

        for octet in 1..=3u8 {
            let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, octet));
            assert!(limit.limiter.check_key(&ip).is_ok());
        }
        assert_eq!(limit.limiter.len(), 3);

        rt::time::sleep(Duration::from_millis(50)).await;
        limit.retain_recent();
        assert!(limit.limiter.is_empty());
    }

    #[actix_web::test]
    async fn test_cleanup_task_prunes_periodically() {
        let quota = Quota::with_period(Duration::from_millis(5)).unwrap();
        let limit = RateLimitMiddleware::new(quota);
        assert!(limit
            .limiter
            .check_key(&IpAddr::V4(Ipv4Addr::LOCALHOST))
            .is_ok());

        limit.spawn_cleanup(Duration::from_millis(10));
        rt::time::sleep(Duration::from_millis(100)).await;
        assert!(limit.limiter.is_empty());
    }

    #[actix_web::test]
    async fn test_clients_limited_separately() {
        let limit = RateLimitMiddleware::per_minute(NonZeroU32::new(1).unwrap());
        let app = test::init_service(
            App::new().service(
                web::scope("/api/auth")
                    .wrap(limit)
                    .route("/login", web::post().to(HttpResponse::Ok)),
            ),
        )
        .await;

        for peer in ["10.0.0.1:5000", "10.0.0.2:5000"] {
            let req = test::TestRequest::post()
                .uri("/api/auth/login")
                .peer_addr(peer.parse().unwrap())
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }
    }
}
