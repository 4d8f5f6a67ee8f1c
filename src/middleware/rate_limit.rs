use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{config::Config, error::AppError};

/// 超过这个客户端数量时，顺带清理窗口内已无记录的客户端
const SWEEP_THRESHOLD: usize = 10_000;

/// 按客户端的滑动窗口限流（进程内）
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    trust_proxy_headers: bool,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32, trust_proxy_headers: bool) -> Self {
        Self {
            window,
            max_requests,
            trust_proxy_headers,
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.rate_limit_window(),
            config.rate_limit_requests,
            config.trust_proxy_headers,
        )
    }

    /// 记录一次请求。超限时返回需要等待的秒数，被拒绝的请求不计入窗口。
    pub fn check(&self, client: &str, now: Instant) -> Result<(), u64> {
        let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);

        if hits.len() > SWEEP_THRESHOLD {
            let window = self.window;
            hits.retain(|_, q| q.back().is_some_and(|t| now.duration_since(*t) < window));
        }

        let queue = hits.entry(client.to_string()).or_default();
        while queue
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            queue.pop_front();
        }

        if queue.len() >= self.max_requests as usize {
            let oldest = queue.front().copied().unwrap_or(now);
            let wait = self.window.saturating_sub(now.duration_since(oldest));
            return Err(wait.as_secs().max(1));
        }

        queue.push_back(now);
        Ok(())
    }

    fn client_key(&self, req: &Request<Body>) -> String {
        // 从连接信息获取原始IP
        let remote_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string());

        // 只有部署在可信反向代理之后才读取代理头，否则客户端可以随意伪造
        let forwarded = if self.trust_proxy_headers {
            req.headers()
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .or_else(|| {
                    req.headers()
                        .get("x-forwarded-for")
                        .and_then(|h| h.to_str().ok())
                        .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
                })
                .map(|s| s.trim().to_string())
        } else {
            None
        };

        forwarded
            .or(remote_ip)
            .unwrap_or_else(|| "unknown".to_string())
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let client = limiter.client_key(&req);

    if let Err(retry_after_secs) = limiter.check(&client, Instant::now()) {
        tracing::warn!(client = %client, retry_after_secs, "rate limit exceeded");
        return AppError::RateLimited { retry_after_secs }.into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hundred_first_request_is_rejected() {
        let limiter = RateLimiter::new(Duration::from_secs(900), 100, false);
        let start = Instant::now();
        for i in 0..100 {
            let now = start + Duration::from_millis(i);
            assert!(limiter.check("1.2.3.4", now).is_ok(), "request {} rejected", i + 1);
        }
        let retry = limiter
            .check("1.2.3.4", start + Duration::from_secs(1))
            .unwrap_err();
        assert!((898..=900).contains(&retry), "retry_after = {}", retry);

        // 其他客户端不受影响
        assert!(limiter.check("5.6.7.8", start).is_ok());
    }

    #[test]
    fn window_slides() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2, false);
        let t0 = Instant::now();
        assert!(limiter.check("c", t0).is_ok());
        assert!(limiter.check("c", t0 + Duration::from_secs(30)).is_ok());
        assert!(limiter.check("c", t0 + Duration::from_secs(59)).is_err());
        // 第一个请求滑出窗口后腾出一个名额
        assert!(limiter.check("c", t0 + Duration::from_secs(60)).is_ok());
        assert!(limiter.check("c", t0 + Duration::from_secs(61)).is_err());
    }

    #[test]
    fn proxy_headers_only_when_trusted() {
        let req = || {
            Request::builder()
                .header("x-forwarded-for", "9.9.9.9, 10.0.0.1")
                .body(Body::empty())
                .unwrap()
        };
        let trusting = RateLimiter::new(Duration::from_secs(1), 1, true);
        assert_eq!(trusting.client_key(&req()), "9.9.9.9");
        let strict = RateLimiter::new(Duration::from_secs(1), 1, false);
        assert_eq!(strict.client_key(&req()), "unknown");
    }
}
