use std::env;
use std::str::FromStr;
use std::time::Duration;

fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    var(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn origins() -> Vec<String> {
    var("CORS_ALLOWED_ORIGINS")
        .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_else(Vec::new)
}

/// Identity provider coordinates. Services use the client credentials for
/// M2M tokens; the gateway only needs the realm to locate its JWKS.
#[derive(Clone, Debug, Default)]
pub struct OAuthClientConfig {
    pub url: Option<String>,
    pub realm: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl OAuthClientConfig {
    pub fn from_env() -> Self {
        Self {
            url: var("KEYCLOAK_URL"),
            realm: var("KEYCLOAK_REALM"),
            client_id: var("KEYCLOAK_CLIENT_ID"),
            client_secret: var("KEYCLOAK_CLIENT_SECRET"),
        }
    }

    fn realm_base(&self) -> Option<String> {
        let url = self.url.as_deref()?;
        let realm = self.realm.as_deref()?;
        Some(format!("{}/realms/{}", url.trim_end_matches('/'), realm))
    }

    pub fn token_url(&self) -> Option<String> {
        self.realm_base()
            .map(|base| format!("{}/protocol/openid-connect/token", base))
    }

    pub fn jwks_url(&self) -> Option<String> {
        self.realm_base()
            .map(|base| format!("{}/protocol/openid-connect/certs", base))
    }

    pub fn issuer(&self) -> Option<String> {
        self.realm_base()
    }

    pub fn has_client_credentials(&self) -> bool {
        self.token_url().is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }
}

/// Settings every backend service reads.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub service_name: String,
    pub port: u16,
    pub database_url: String,
    pub cors_allowed_origins: Vec<String>,
    /// Gateway endpoint that accepts error reports; reporting is log-only without it
    pub error_endpoint: Option<String>,
    pub oauth: OAuthClientConfig,
}

impl ServiceConfig {
    pub fn from_env(default_name: &str, default_port: u16, default_db: &str) -> Self {
        Self {
            service_name: var("SERVICE_NAME").unwrap_or_else(|| default_name.to_string()),
            port: parse_or("PORT", default_port),
            database_url: var("DATABASE_URL").unwrap_or_else(|| default_db.to_string()),
            cors_allowed_origins: origins(),
            error_endpoint: var("API_GATEWAY_INTERNAL_ERROR_ENDPOINT"),
            oauth: OAuthClientConfig::from_env(),
        }
    }

    /// Configuration for tests and embedded use: in-memory database, no
    /// identity provider, no error endpoint.
    pub fn local(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            cors_allowed_origins: Vec::new(),
            error_endpoint: None,
            oauth: OAuthClientConfig::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TasksConfig {
    pub service: ServiceConfig,
    /// Public gateway URL used to build export download links
    pub public_gateway_url: String,
    /// How long a finished export stays downloadable
    pub export_ttl: Duration,
}

impl TasksConfig {
    pub fn from_env() -> Self {
        Self {
            service: ServiceConfig::from_env("tasks-api", 3100, "sqlite://whattodo.db?mode=rwc"),
            public_gateway_url: var("API_GATEWAY_PUBLIC_URL")
                .unwrap_or_else(|| "http://localhost:3001".to_string()),
            export_ttl: Duration::from_secs(parse_or("EXPORT_TTL_SECS", 300)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProjectsConfig {
    pub service: ServiceConfig,
    /// Task listing endpoint reached with an M2M token
    pub tasks_api_url: String,
}

impl ProjectsConfig {
    pub fn from_env() -> Self {
        Self {
            service: ServiceConfig::from_env(
                "projects-api",
                3200,
                "sqlite://whattodo.db?mode=rwc",
            ),
            tasks_api_url: var("TASKS_API_URL")
                .unwrap_or_else(|| "http://api-gateway:3001/gw/tasks".to_string()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ErrorsConfig {
    pub service: ServiceConfig,
    pub retention_days: i64,
}

impl ErrorsConfig {
    pub fn from_env() -> Self {
        Self {
            service: ServiceConfig::from_env(
                "errors-api",
                3400,
                "sqlite://whattodo_errors.db?mode=rwc",
            ),
            retention_days: parse_or("ERROR_RETENTION_DAYS", 90),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub tasks_url: Option<String>,
    pub projects_url: Option<String>,
    pub errors_url: Option<String>,
    pub jwks_url: String,
    pub issuer: String,
    /// Expected `aud` of user tokens; not checked when unset
    pub audience: Option<String>,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub connect_timeout: Duration,
    pub proxy_timeout: Duration,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, String> {
        let idp = OAuthClientConfig {
            url: var("API_GATEWAY_KEYCLOAK_URL"),
            realm: var("API_GATEWAY_KEYCLOAK_REALM"),
            ..Default::default()
        };
        let jwks_url = idp.jwks_url().ok_or(
            "API_GATEWAY_KEYCLOAK_URL and API_GATEWAY_KEYCLOAK_REALM must be set".to_string(),
        )?;
        let issuer = var("API_GATEWAY_KEYCLOAK_ISSUER")
            .or_else(|| idp.issuer())
            .ok_or("API_GATEWAY_KEYCLOAK_ISSUER must be set".to_string())?;

        Ok(Self {
            port: parse_or("PORT", 3001),
            cors_allowed_origins: origins(),
            tasks_url: var("TASKS_API_INTERNAL_URL"),
            projects_url: var("PROJECTS_API_INTERNAL_URL"),
            errors_url: var("ERROR_SERVICE_INTERNAL_URL"),
            jwks_url,
            issuer,
            audience: var("API_GATEWAY_KEYCLOAK_AUDIENCE"),
            rate_limit_max: parse_or("RATE_LIMIT_MAX", 100),
            rate_limit_window: Duration::from_secs(parse_or("RATE_LIMIT_WINDOW_SECS", 15 * 60)),
            connect_timeout: Duration::from_secs(parse_or("PROXY_CONNECT_TIMEOUT_SECS", 60)),
            proxy_timeout: Duration::from_secs(parse_or("PROXY_TIMEOUT_SECS", 300)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oauth_urls_derive_from_realm() {
        let cfg = OAuthClientConfig {
            url: Some("http://keycloak:8080/".to_string()),
            realm: Some("todo".to_string()),
            client_id: Some("tasks".to_string()),
            client_secret: None,
        };
        assert_eq!(
            cfg.token_url().as_deref(),
            Some("http://keycloak:8080/realms/todo/protocol/openid-connect/token")
        );
        assert_eq!(
            cfg.jwks_url().as_deref(),
            Some("http://keycloak:8080/realms/todo/protocol/openid-connect/certs")
        );
        assert_eq!(cfg.issuer().as_deref(), Some("http://keycloak:8080/realms/todo"));
        assert!(!cfg.has_client_credentials());
    }

    #[test]
    fn missing_realm_disables_urls() {
        let cfg = OAuthClientConfig {
            url: Some("http://keycloak:8080".to_string()),
            ..Default::default()
        };
        assert!(cfg.token_url().is_none());
        assert!(cfg.jwks_url().is_none());
    }
}
