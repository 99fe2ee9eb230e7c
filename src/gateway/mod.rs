//! API gateway: token verification, role checks, rate limiting and
//! reverse proxying to the backend services.

pub mod jwt;
pub mod proxy;
pub mod rate_limit;
pub mod routes;

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{Next, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::utils::{net, time};
use jwt::{JwksKeySource, KeySource, TokenVerifier};
use proxy::Proxy;
use rate_limit::{Decision, RateLimiter};
use routes::{RouteTable, Upstream};

#[derive(Clone)]
pub struct GatewayState {
    routes: Arc<RouteTable>,
    upstreams: Arc<HashMap<Upstream, String>>,
    verifier: TokenVerifier,
    limiter: RateLimiter,
    proxy: Proxy,
    window_minutes: u64,
}

impl GatewayState {
    /// State whose signing keys come from the configured JWKS endpoint.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, reqwest::Error> {
        let keys = Arc::new(JwksKeySource::new(config.jwks_url.clone())?);
        Self::new(config, keys)
    }

    pub fn new(config: &GatewayConfig, keys: Arc<dyn KeySource>) -> Result<Self, reqwest::Error> {
        let mut upstreams = HashMap::new();
        for (upstream, url, var) in [
            (Upstream::Tasks, &config.tasks_url, "TASKS_API_INTERNAL_URL"),
            (Upstream::Projects, &config.projects_url, "PROJECTS_API_INTERNAL_URL"),
            (Upstream::Errors, &config.errors_url, "ERROR_SERVICE_INTERNAL_URL"),
        ] {
            match url {
                Some(url) => {
                    tracing::info!("{} proxy enabled, targeting {}", upstream.display_name(), url);
                    upstreams.insert(upstream, url.clone());
                }
                None => tracing::warn!(
                    "{} not defined. {} proxy is disabled.",
                    var,
                    upstream.display_name()
                ),
            }
        }
        let routes = RouteTable::standard().retain_upstreams(|u| upstreams.contains_key(&u));

        Ok(Self {
            routes: Arc::new(routes),
            upstreams: Arc::new(upstreams),
            verifier: TokenVerifier::new(keys, config.issuer.clone(), config.audience.clone()),
            limiter: RateLimiter::new(config.rate_limit_max, config.rate_limit_window),
            proxy: Proxy::new(config.connect_timeout, config.proxy_timeout)?,
            window_minutes: config.rate_limit_window.as_secs().div_ceil(60),
        })
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "message": "Not Found - The requested resource does not exist on the API Gateway."
        })),
    )
        .into_response()
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": "API Gateway is operational.",
        "timestamp": time::now(),
    }))
}

async fn rate_limit(State(state): State<GatewayState>, req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = net::client_ip(peer, req.headers()).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    match state.limiter.check(ip) {
        Decision::Allowed { .. } => next.run(req).await,
        Decision::Limited { retry_after } => {
            tracing::warn!(%ip, path = %req.uri().path(), "rate limit exceeded");
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "message": format!(
                        "Too many requests from this IP, please try again after {} minutes",
                        state.window_minutes
                    )
                })),
            )
                .into_response();
            let secs = retry_after.as_secs().max(1);
            if let Ok(v) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, v);
            }
            response
        }
    }
}

async fn forward(State(state): State<GatewayState>, req: Request) -> Response {
    let path = req.uri().path().to_string();
    let Some(matched) = state.routes.resolve(&path) else {
        tracing::debug!(path = %path, "no gateway route");
        return not_found();
    };
    let Some(base_url) = state.upstreams.get(&matched.route.upstream) else {
        return not_found();
    };

    let access = matched.route.access(req.method());
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let identity = match state.verifier.verify(authorization.as_deref(), access).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::debug!(route = matched.route.name, reason = %e.message(), "request rejected");
            return e.into_response();
        }
    };

    state.proxy.forward(base_url, &matched, &identity, req).await
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(forward)
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
