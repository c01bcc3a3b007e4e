#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tunevault_api::{ApiState, RateLimitConfig, RateLimiter};
use tunevault_storage::{migrate_with_pool, PostgresStorage};
use url::Url;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub environment: String,
    pub rate_limit: RateLimitConfig,
    pub cors_trusted_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_values(
            std::env::var("LISTEN_ADDR").ok(),
            std::env::var("DATABASE_URL").ok(),
            std::env::var("ENVIRONMENT").ok(),
            std::env::var("RATE_LIMIT_ENABLED").ok(),
            std::env::var("RATE_LIMIT_RPS").ok(),
            std::env::var("RATE_LIMIT_BURST").ok(),
            std::env::var("CORS_TRUSTED_ORIGINS").ok(),
        )
    }

    fn from_values(
        listen_addr: Option<String>,
        database_url: Option<String>,
        environment: Option<String>,
        rate_limit_enabled: Option<String>,
        rate_limit_rps: Option<String>,
        rate_limit_burst: Option<String>,
        cors_trusted_origins: Option<String>,
    ) -> anyhow::Result<Self> {
        let listen_addr = SocketAddr::from_str(listen_addr.as_deref().unwrap_or("0.0.0.0:4000"))?;
        let database_url =
            database_url.ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let environment = environment.unwrap_or_else(|| "development".to_owned());
        let rate_limit = parse_rate_limit(rate_limit_enabled, rate_limit_rps, rate_limit_burst)?;
        let cors_trusted_origins = parse_trusted_origins(cors_trusted_origins)?;

        Ok(Self {
            listen_addr,
            database_url,
            environment,
            rate_limit,
            cors_trusted_origins,
        })
    }
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let storage = Arc::new(PostgresStorage::connect(&config.database_url).await?);
    migrate_with_pool(storage.pool()).await?;

    let limiter = Arc::new(RateLimiter::new(config.rate_limit));
    limiter.start_reaper();

    let state = ApiState::new(storage, Arc::clone(&limiter))
        .with_environment(config.environment.clone());
    let app =
        tunevault_api::router(state).layer(build_cors_layer(&config.cors_trusted_origins)?);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(
        addr = %config.listen_addr,
        environment = %config.environment,
        "server listening"
    );
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    limiter.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown signal received");
    }
}

fn build_cors_layer(trusted_origins: &[String]) -> anyhow::Result<CorsLayer> {
    if trusted_origins.is_empty() {
        return Ok(CorsLayer::new());
    }
    let origins = trusted_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|_| anyhow::anyhow!("invalid trusted origin {origin:?}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]))
}

fn parse_rate_limit(
    enabled: Option<String>,
    requests_per_second: Option<String>,
    burst: Option<String>,
) -> anyhow::Result<RateLimitConfig> {
    let defaults = RateLimitConfig::default();

    let enabled = match enabled.as_deref() {
        None => defaults.enabled,
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        Some(other) => {
            return Err(anyhow::anyhow!(
                "invalid RATE_LIMIT_ENABLED {other:?}: expected \"true\" or \"false\""
            ))
        }
    };

    let requests_per_second = match requests_per_second {
        None => defaults.requests_per_second,
        Some(raw) => {
            let value: f64 = raw
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid RATE_LIMIT_RPS {raw:?}"))?;
            if value <= 0.0 {
                return Err(anyhow::anyhow!("RATE_LIMIT_RPS must be positive"));
            }
            value
        }
    };

    let burst = match burst {
        None => defaults.burst,
        Some(raw) => {
            let value: u32 = raw
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid RATE_LIMIT_BURST {raw:?}"))?;
            if value == 0 {
                return Err(anyhow::anyhow!("RATE_LIMIT_BURST must be at least 1"));
            }
            value
        }
    };

    Ok(RateLimitConfig {
        enabled,
        requests_per_second,
        burst,
    })
}

fn parse_trusted_origins(value: Option<String>) -> anyhow::Result<Vec<String>> {
    let mut origins = Vec::new();
    for entry in value.unwrap_or_default().split_whitespace() {
        validate_http_url(entry, "trusted origin")?;
        origins.push(entry.to_owned());
    }
    Ok(origins)
}

fn validate_http_url(raw: &str, label: &str) -> anyhow::Result<()> {
    let parsed =
        Url::parse(raw).map_err(|error| anyhow::anyhow!("invalid {label} URL {raw:?}: {error}"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(anyhow::anyhow!(
            "invalid {label} URL {raw:?}: must use http or https"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::AppConfig;

    fn from_values(
        listen_addr: Option<&str>,
        database_url: Option<&str>,
        enabled: Option<&str>,
        rps: Option<&str>,
        burst: Option<&str>,
        origins: Option<&str>,
    ) -> anyhow::Result<AppConfig> {
        AppConfig::from_values(
            listen_addr.map(ToOwned::to_owned),
            database_url.map(ToOwned::to_owned),
            None,
            enabled.map(ToOwned::to_owned),
            rps.map(ToOwned::to_owned),
            burst.map(ToOwned::to_owned),
            origins.map(ToOwned::to_owned),
        )
    }

    #[test]
    fn defaults_apply_when_env_is_sparse() {
        let config = from_values(
            None,
            Some("postgres://localhost/tunevault"),
            None,
            None,
            None,
            None,
        )
        .expect("parse config");

        assert_eq!(config.listen_addr.to_string(), "0.0.0.0:4000");
        assert_eq!(config.environment, "development");
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.requests_per_second, 2.0);
        assert_eq!(config.rate_limit.burst, 4);
        assert!(config.cors_trusted_origins.is_empty());
    }

    #[test]
    fn requires_database_url() {
        let error = from_values(Some("127.0.0.1:4000"), None, None, None, None, None)
            .expect_err("missing DATABASE_URL should fail");
        assert!(error.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn validates_listen_addr() {
        let error = from_values(
            Some("not-an-address"),
            Some("postgres://localhost/tunevault"),
            None,
            None,
            None,
            None,
        )
        .expect_err("invalid listen address should fail");
        assert!(error.to_string().contains("invalid"));
    }

    #[test]
    fn parses_rate_limit_overrides() {
        let config = from_values(
            None,
            Some("postgres://localhost/tunevault"),
            Some("false"),
            Some("10.5"),
            Some("20"),
            None,
        )
        .expect("parse config");

        assert!(!config.rate_limit.enabled);
        assert_eq!(config.rate_limit.requests_per_second, 10.5);
        assert_eq!(config.rate_limit.burst, 20);
    }

    #[test]
    fn rejects_bad_rate_limit_values() {
        let database_url = Some("postgres://localhost/tunevault");

        let error = from_values(None, database_url, Some("maybe"), None, None, None)
            .expect_err("bad enabled flag should fail");
        assert!(error.to_string().contains("RATE_LIMIT_ENABLED"));

        let error = from_values(None, database_url, None, Some("-1"), None, None)
            .expect_err("negative rps should fail");
        assert!(error.to_string().contains("RATE_LIMIT_RPS"));

        let error = from_values(None, database_url, None, None, Some("0"), None)
            .expect_err("zero burst should fail");
        assert!(error.to_string().contains("RATE_LIMIT_BURST"));
    }

    #[test]
    fn parses_space_separated_trusted_origins() {
        let config = from_values(
            None,
            Some("postgres://localhost/tunevault"),
            None,
            None,
            None,
            Some("https://app.example.com http://localhost:3000"),
        )
        .expect("parse config");

        assert_eq!(
            config.cors_trusted_origins,
            vec!["https://app.example.com", "http://localhost:3000"]
        );
    }

    #[test]
    fn rejects_non_http_trusted_origins() {
        let error = from_values(
            None,
            Some("postgres://localhost/tunevault"),
            None,
            None,
            None,
            Some("ftp://files.example.com"),
        )
        .expect_err("non-http origin should fail");
        assert!(error.to_string().contains("must use http or https"));
    }
}
