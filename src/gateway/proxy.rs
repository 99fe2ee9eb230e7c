//! Forwarding of verified requests to the upstream services.

use std::time::Duration;

use axum::{
    Json,
    body::Body,
    extract::Request,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::jwt::Identity;
use super::routes::Matched;
use crate::auth::{USER_ID_HEADER, USER_ROLES_HEADER};
use crate::utils::net::join_url;

/// Largest request body the gateway buffers for forwarding
pub const MAX_PROXY_BODY: usize = 16 * 1024 * 1024;

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_LENGTH,
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name) || name.as_str() == "keep-alive"
}

/// Request headers for the upstream: end-to-end headers only, client
/// supplied identity headers replaced by the verified identity.
pub fn upstream_headers(incoming: &HeaderMap, identity: &Identity) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(incoming.len() + 2);
    for (name, value) in incoming {
        if is_hop_by_hop(name) || name == header::HOST || name.as_str().starts_with("x-user-") {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    if let Ok(v) = HeaderValue::from_str(&identity.subject) {
        headers.insert(USER_ID_HEADER, v);
    }
    if !identity.roles.is_empty() {
        if let Ok(v) = HeaderValue::from_str(&identity.roles.join(",")) {
            headers.insert(USER_ROLES_HEADER, v);
        }
    }
    headers
}

fn proxy_error(status: StatusCode, service: &str, reason: String) -> Response {
    (
        status,
        Json(json!({
            "message": format!("Error connecting to the {}.", service),
            "proxyError": reason,
        })),
    )
        .into_response()
}

#[derive(Clone)]
pub struct Proxy {
    client: reqwest::Client,
}

impl Proxy {
    pub fn new(connect_timeout: Duration, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    pub async fn forward(
        &self,
        base_url: &str,
        matched: &Matched<'_>,
        identity: &Identity,
        req: Request,
    ) -> Response {
        let (parts, body) = req.into_parts();
        let service = matched.route.upstream.display_name();

        let body = match axum::body::to_bytes(body, MAX_PROXY_BODY).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(route = matched.route.name, error = %e, "request body rejected");
                return (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    Json(json!({ "message": "Request body too large." })),
                )
                    .into_response();
            }
        };

        let mut url = join_url(base_url, &matched.path);
        if let Some(query) = parts.uri.query() {
            url.push('?');
            url.push_str(query);
        }

        let upstream = self
            .client
            .request(parts.method.clone(), &url)
            .headers(upstream_headers(&parts.headers, identity))
            .body(body)
            .send()
            .await;

        let upstream = match upstream {
            Ok(resp) => resp,
            Err(e) => {
                let status = if e.is_timeout() {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                };
                tracing::error!(
                    route = matched.route.name,
                    method = %parts.method,
                    path = %parts.uri.path(),
                    target = %url,
                    error = %e,
                    "proxying failed"
                );
                return proxy_error(status, service, e.to_string());
            }
        };

        let status = upstream.status();
        tracing::info!(
            route = matched.route.name,
            method = %parts.method,
            path = %parts.uri.path(),
            upstream_path = %matched.path,
            status = status.as_u16(),
            "proxied request"
        );

        let mut headers = HeaderMap::with_capacity(upstream.headers().len());
        for (name, value) in upstream.headers() {
            if !is_hop_by_hop(name) {
                headers.append(name.clone(), value.clone());
            }
        }
        let bytes = match upstream.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                let status = if e.is_timeout() {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                };
                return proxy_error(status, service, e.to_string());
            }
        };

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_headers_replace_client_supplied_ones() {
        let mut incoming = HeaderMap::new();
        incoming.insert("x-user-id", HeaderValue::from_static("spoofed"));
        incoming.insert("x-user-roles", HeaderValue::from_static("admin"));
        incoming.insert("x-user-anything", HeaderValue::from_static("1"));
        incoming.insert(header::HOST, HeaderValue::from_static("gateway:3001"));
        incoming.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        incoming.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        incoming.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));

        let identity = Identity {
            subject: "user-1".to_string(),
            roles: vec!["user".to_string(), "offline_access".to_string()],
        };
        let out = upstream_headers(&incoming, &identity);

        assert_eq!(out.get("x-user-id").unwrap(), "user-1");
        assert_eq!(out.get("x-user-roles").unwrap(), "user,offline_access");
        assert!(out.get("x-user-anything").is_none());
        assert!(out.get(header::HOST).is_none());
        assert!(out.get(header::CONNECTION).is_none());
        assert_eq!(out.get(header::ACCEPT).unwrap(), "application/json");
        assert_eq!(out.get(header::AUTHORIZATION).unwrap(), "Bearer t");
    }

    #[test]
    fn roles_header_is_omitted_without_roles() {
        let identity = Identity {
            subject: "svc".to_string(),
            roles: Vec::new(),
        };
        let out = upstream_headers(&HeaderMap::new(), &identity);
        assert!(out.get("x-user-roles").is_none());
    }
}
