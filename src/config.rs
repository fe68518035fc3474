use anyhow::Result;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub environment: String,
    /// How long a transaction waits for a balance row lock before giving up.
    pub lock_timeout_ms: u64,
    pub calendar: CalendarConfig,
}

#[derive(Debug, Clone)]
pub struct CalendarConfig {
    pub mock_enabled: bool,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub authority_url: String,
    pub graph_base_url: String,
    pub timeout_secs: u64,
}

impl CalendarConfig {
    pub fn has_credentials(&self) -> bool {
        [&self.tenant_id, &self.client_id, &self.client_secret]
            .iter()
            .all(|value| value.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn from_env_vars() -> Self {
        CalendarConfig {
            mock_enabled: parse_bool(env::var("CALENDAR_MOCK_ENABLED").ok(), true),
            tenant_id: non_empty_var("GRAPH_TENANT_ID"),
            client_id: non_empty_var("GRAPH_CLIENT_ID"),
            client_secret: non_empty_var("GRAPH_CLIENT_SECRET"),
            authority_url: env::var("GRAPH_AUTHORITY_URL")
                .unwrap_or_else(|_| "https://login.microsoftonline.com".to_string()),
            graph_base_url: env::var("GRAPH_BASE_URL")
                .unwrap_or_else(|_| "https://graph.microsoft.com/v1.0".to_string()),
            timeout_secs: env::var("GRAPH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();
        Self::from_env_only()
    }

    /// Load configuration from environment variables only (without loading .env files)
    pub fn from_env_only() -> Result<Self> {
        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://@localhost:5432/leave".to_string()),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| {
                "change-this-jwt-secret-before-deploying-anywhere".to_string()
            }),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            lock_timeout_ms: env::var("LOCK_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            calendar: CalendarConfig::from_env_vars(),
        })
    }

    pub fn test_config() -> Self {
        Config {
            database_url: "postgres://@localhost:5432/leave_test".to_string(),
            database_max_connections: 2,
            jwt_secret: "test-jwt-secret-key-that-is-long-enough".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            lock_timeout_ms: 200,
            calendar: CalendarConfig {
                mock_enabled: true,
                tenant_id: None,
                client_id: None,
                client_secret: None,
                authority_url: "http://127.0.0.1:9".to_string(),
                graph_base_url: "http://127.0.0.1:9".to_string(),
                timeout_secs: 1,
            },
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => true,
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_falls_back_on_garbage() {
        assert!(parse_bool(None, true));
        assert!(!parse_bool(Some("FALSE".into()), true));
        assert!(parse_bool(Some("1".into()), false));
        assert!(!parse_bool(Some("maybe".into()), false));
    }

    #[test]
    fn credentials_require_all_three_values() {
        let mut calendar = Config::test_config().calendar;
        assert!(!calendar.has_credentials());

        calendar.tenant_id = Some("tenant".into());
        calendar.client_id = Some("client".into());
        calendar.client_secret = Some("  ".into());
        assert!(!calendar.has_credentials());

        calendar.client_secret = Some("secret".into());
        assert!(calendar.has_credentials());
    }
}
