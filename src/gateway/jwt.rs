//! Bearer token verification against the identity provider's JWKS.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header, errors::ErrorKind};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use super::routes::Access;
use crate::domain::{ADMIN_ROLE, SERVICE_ROLE};

const KEYS_TTL: Duration = Duration::from_secs(10 * 60);
const MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(6);
const JWKS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    Expired,
    Invalid(String),
    MissingServiceRole,
    NotAdmin,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken | AuthError::Expired | AuthError::Invalid(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::MissingServiceRole | AuthError::NotAdmin => StatusCode::FORBIDDEN,
        }
    }

    pub fn message(&self) -> String {
        match self {
            AuthError::MissingToken => {
                "Unauthorized: No token provided or malformed token.".to_string()
            }
            AuthError::Expired => "Unauthorized: Token has expired.".to_string(),
            AuthError::Invalid(reason) => format!("Unauthorized: Invalid token - {}", reason),
            AuthError::MissingServiceRole => {
                "Forbidden (Service): Missing required service role.".to_string()
            }
            AuthError::NotAdmin => "Forbidden: Administrator access required.".to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "message": self.message() }))).into_response()
    }
}

/// Verified caller, as forwarded to the services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RealmAccess {
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
    azp: Option<String>,
    #[serde(default)]
    realm_access: RealmAccess,
}

/// Where signing keys come from, by `kid`.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn key(&self, kid: &str) -> Result<DecodingKey, AuthError>;
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: Option<String>,
    kty: String,
    #[serde(rename = "use")]
    usage: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Default)]
struct KeyCache {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
    last_attempt: Option<Instant>,
}

/// JWKS endpoint client with a key cache. Unknown key ids trigger a refetch,
/// at most once per [`MIN_REFETCH_INTERVAL`] unless configured otherwise.
pub struct JwksKeySource {
    client: reqwest::Client,
    url: String,
    min_refetch: Duration,
    cache: Mutex<KeyCache>,
}

impl JwksKeySource {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(JWKS_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
            min_refetch: MIN_REFETCH_INTERVAL,
            cache: Mutex::new(KeyCache::default()),
        })
    }

    pub fn with_refetch_interval(mut self, interval: Duration) -> Self {
        self.min_refetch = interval;
        self
    }

    async fn fetch(&self) -> Result<HashMap<String, DecodingKey>, AuthError> {
        let unavailable =
            |e: reqwest::Error| AuthError::Invalid(format!("unable to fetch signing keys: {}", e));
        let jwks: Jwks = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(unavailable)?
            .json()
            .await
            .map_err(unavailable)?;

        let mut keys = HashMap::new();
        for jwk in jwks.keys {
            if jwk.kty != "RSA" || jwk.usage.as_deref().is_some_and(|u| u != "sig") {
                continue;
            }
            let (Some(kid), Some(n), Some(e)) = (jwk.kid, jwk.n, jwk.e) else {
                continue;
            };
            match DecodingKey::from_rsa_components(&n, &e) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(err) => tracing::warn!(kid = %kid, error = %err, "skipping unusable JWKS key"),
            }
        }
        tracing::debug!(url = %self.url, keys = keys.len(), "JWKS refreshed");
        Ok(keys)
    }
}

#[async_trait]
impl KeySource for JwksKeySource {
    async fn key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        let mut cache = self.cache.lock().await;
        let fresh = cache.fetched_at.is_some_and(|t| t.elapsed() < KEYS_TTL);
        if fresh {
            if let Some(key) = cache.keys.get(kid) {
                return Ok(key.clone());
            }
        }

        let throttled = cache
            .last_attempt
            .is_some_and(|t| t.elapsed() < self.min_refetch);
        if !throttled {
            cache.last_attempt = Some(Instant::now());
            match self.fetch().await {
                Ok(keys) => {
                    cache.keys = keys;
                    cache.fetched_at = Some(Instant::now());
                }
                Err(e) if cache.keys.is_empty() => return Err(e),
                Err(e) => tracing::warn!(error = %e.message(), "keeping stale JWKS keys"),
            }
        }

        cache
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::Invalid(format!("no signing key found for kid '{}'", kid)))
    }
}

#[derive(Clone)]
pub struct TokenVerifier {
    keys: Arc<dyn KeySource>,
    issuer: String,
    audience: Option<String>,
}

fn bearer(header: Option<&str>) -> Result<&str, AuthError> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)
}

impl TokenVerifier {
    pub fn new(keys: Arc<dyn KeySource>, issuer: impl Into<String>, audience: Option<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience,
        }
    }

    /// Verify the `Authorization` header value for a route with `access`.
    /// User tokens are checked for issuer and audience, service tokens for
    /// issuer only.
    pub async fn verify(
        &self,
        authorization: Option<&str>,
        access: Access,
    ) -> Result<Identity, AuthError> {
        let token = bearer(authorization)?;
        let header = decode_header(token).map_err(|e| AuthError::Invalid(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::Invalid("invalid algorithm".to_string()));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::Invalid("token has no key id".to_string()))?;
        let key = self.keys.key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        match (&self.audience, access) {
            (Some(aud), Access::User | Access::Admin) => validation.set_audience(&[aud]),
            _ => validation.validate_aud = false,
        }

        let claims = decode::<Claims>(token, &key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid(e.to_string()),
            })?
            .claims;

        let roles = claims.realm_access.roles;
        let has = |role: &str| roles.iter().any(|r| r == role);
        match access {
            Access::Service if !has(SERVICE_ROLE) => return Err(AuthError::MissingServiceRole),
            Access::Admin if !has(ADMIN_ROLE) => return Err(AuthError::NotAdmin),
            _ => {}
        }

        let subject = claims
            .sub
            .or(claims.azp)
            .ok_or_else(|| AuthError::Invalid("token has no subject".to_string()))?;
        Ok(Identity { subject, roles })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PRIVATE_KEY: &str = include_str!("../../tests/fixtures/rsa_private.pem");
    const JWKS: &str = include_str!("../../tests/fixtures/jwks.json");
    const ISSUER: &str = "http://idp/realms/todo";

    fn token(claims: serde_json::Value, kid: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        let key = EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).unwrap();
        encode(&header, &claims, &key).unwrap()
    }

    fn claims(roles: &[&str], exp_offset: i64) -> serde_json::Value {
        json!({
            "sub": "user-1",
            "iss": ISSUER,
            "aud": "whattodo-app",
            "exp": chrono::Utc::now().timestamp() + exp_offset,
            "realm_access": { "roles": roles },
        })
    }

    async fn verifier(server: &MockServer) -> TokenVerifier {
        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(JWKS.as_bytes().to_vec(), "application/json"),
            )
            .mount(server)
            .await;
        let keys = Arc::new(JwksKeySource::new(format!("{}/certs", server.uri())).unwrap());
        TokenVerifier::new(keys, ISSUER, Some("whattodo-app".to_string()))
    }

    #[tokio::test]
    async fn valid_user_token_yields_identity() {
        let server = MockServer::start().await;
        let verifier = verifier(&server).await;
        let bearer = format!("Bearer {}", token(claims(&["user"], 300), "test-key"));

        let identity = verifier.verify(Some(&bearer), Access::User).await.unwrap();
        assert_eq!(identity.subject, "user-1");
        assert_eq!(identity.roles, vec!["user".to_string()]);
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_rejected() {
        let server = MockServer::start().await;
        let verifier = verifier(&server).await;
        assert_eq!(
            verifier.verify(None, Access::User).await,
            Err(AuthError::MissingToken)
        );
        assert_eq!(
            verifier.verify(Some("Basic abc"), Access::User).await,
            Err(AuthError::MissingToken)
        );
    }

    #[tokio::test]
    async fn expired_token_is_reported_as_expired() {
        let server = MockServer::start().await;
        let verifier = verifier(&server).await;
        let bearer = format!("Bearer {}", token(claims(&[], -3600), "test-key"));
        assert_eq!(
            verifier.verify(Some(&bearer), Access::User).await,
            Err(AuthError::Expired)
        );
    }

    #[tokio::test]
    async fn wrong_audience_only_matters_for_user_tokens() {
        let server = MockServer::start().await;
        let verifier = verifier(&server).await;
        let mut c = claims(&["service-role"], 300);
        c["aud"] = json!("account");
        let bearer = format!("Bearer {}", token(c, "test-key"));

        assert!(matches!(
            verifier.verify(Some(&bearer), Access::User).await,
            Err(AuthError::Invalid(_))
        ));
        assert!(verifier.verify(Some(&bearer), Access::Service).await.is_ok());
    }

    #[tokio::test]
    async fn role_requirements_are_enforced() {
        let server = MockServer::start().await;
        let verifier = verifier(&server).await;
        let bearer = format!("Bearer {}", token(claims(&["user"], 300), "test-key"));
        assert_eq!(
            verifier.verify(Some(&bearer), Access::Admin).await,
            Err(AuthError::NotAdmin)
        );
        assert_eq!(
            verifier.verify(Some(&bearer), Access::Service).await,
            Err(AuthError::MissingServiceRole)
        );
    }

    #[tokio::test]
    async fn unknown_kid_is_invalid() {
        let server = MockServer::start().await;
        let verifier = verifier(&server).await;
        let bearer = format!("Bearer {}", token(claims(&[], 300), "rotated-away"));
        match verifier.verify(Some(&bearer), Access::User).await {
            Err(AuthError::Invalid(reason)) => assert!(reason.contains("rotated-away")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn keys_are_cached_between_verifications() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(JWKS.as_bytes().to_vec(), "application/json"),
            )
            .expect(1)
            .mount(&server)
            .await;
        let source = JwksKeySource::new(format!("{}/certs", server.uri())).unwrap();
        assert!(source.key("test-key").await.is_ok());
        assert!(source.key("test-key").await.is_ok());
        // Within the refetch interval an unknown kid does not hit the endpoint again
        assert!(source.key("other").await.is_err());
    }

    #[tokio::test]
    async fn unknown_kid_refetches_after_the_throttle() {
        let server = MockServer::start().await;
        let mut before_rotation: serde_json::Value = serde_json::from_str(JWKS).unwrap();
        before_rotation["keys"][0]["kid"] = json!("previous-key");
        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(before_rotation))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(JWKS.as_bytes().to_vec(), "application/json"),
            )
            .mount(&server)
            .await;

        let source = JwksKeySource::new(format!("{}/certs", server.uri()))
            .unwrap()
            .with_refetch_interval(Duration::from_millis(200));
        assert!(source.key("previous-key").await.is_ok());
        // Throttled: the rotated key is not looked up yet
        assert!(source.key("test-key").await.is_err());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(source.key("test-key").await.is_ok());
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[test]
    fn errors_map_to_statuses_and_messages() {
        assert_eq!(AuthError::Expired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::NotAdmin.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::Invalid("bad signature".into()).message(),
            "Unauthorized: Invalid token - bad signature"
        );
    }
}
