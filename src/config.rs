use clap::{Args, Parser, ValueEnum};
use ipnetwork::IpNetwork;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub provider: ProviderConfig,

    #[command(flatten)]
    pub session: SessionConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "STATSPRO_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "STATSPRO_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the management server (health checks)
    #[arg(long, env = "STATSPRO_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// How long to wait for background tasks at shutdown
    #[arg(long, env = "STATSPRO_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,

    /// Comma-separated list of CIDRs to trust for X-Forwarded-For IP extraction
    #[arg(
        long,
        env = "STATSPRO_TRUSTED_PROXIES",
        default_value = "10.0.0.0/8,172.16.0.0/12,192.168.0.0/16,127.0.0.1/32",
        value_delimiter = ','
    )]
    pub trusted_proxies: Vec<IpNetwork>,
}

#[derive(Clone, Debug, Args)]
pub struct ProviderConfig {
    /// WordPress GraphQL endpoint
    #[arg(long = "provider-url", env = "STATSPRO_PROVIDER_URL", default_value = "http://localhost/graphql")]
    pub graphql_url: String,

    /// Fallback GraphQL endpoints probed when the primary one is unreachable during registration
    #[arg(long = "provider-alternate-urls", env = "STATSPRO_PROVIDER_ALTERNATE_URLS", value_delimiter = ',')]
    pub alternate_urls: Vec<String>,

    /// Timeout for the readiness probe against the provider
    #[arg(long, env = "STATSPRO_PROVIDER_HEALTH_TIMEOUT_MS", default_value_t = 2000)]
    pub health_timeout_ms: u64,
}

#[derive(Clone, Debug, Args)]
pub struct SessionConfig {
    /// Hard ceiling on a session's age, counted from the original login
    #[arg(long, env = "STATSPRO_SESSION_MAX_AGE_HOURS", default_value_t = 24)]
    pub max_age_hours: i64,

    /// How often clients refresh their access token
    #[arg(long, env = "STATSPRO_SESSION_REFRESH_INTERVAL_SECS", default_value_t = 1800)]
    pub refresh_interval_secs: u64,

    /// Length of the trial granted to newly registered users
    #[arg(long, env = "STATSPRO_TRIAL_DAYS", default_value_t = 14)]
    pub trial_days: i64,

    /// How often revoked tokens past the session ceiling are purged
    #[arg(long, env = "STATSPRO_REVOCATION_CLEANUP_INTERVAL_SECS", default_value_t = 600)]
    pub revocation_cleanup_interval_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Requests per second allowed for standard endpoints
    #[arg(long, env = "STATSPRO_RATE_LIMIT_PER_SECOND", default_value_t = 10)]
    pub per_second: u32,

    /// Burst allowance for standard endpoints
    #[arg(long, env = "STATSPRO_RATE_LIMIT_BURST", default_value_t = 20)]
    pub burst: u32,

    /// Stricter rate limit for login and registration
    #[arg(long, env = "STATSPRO_AUTH_RATE_LIMIT_PER_SECOND", default_value_t = 1)]
    pub auth_per_second: u32,

    /// Burst allowance for login and registration
    #[arg(long, env = "STATSPRO_AUTH_RATE_LIMIT_BURST", default_value_t = 5)]
    pub auth_burst: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "STATSPRO_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; traces and metrics are exported only when set
    #[arg(long, env = "STATSPRO_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}

impl SessionConfig {
    #[must_use]
    pub const fn max_age(&self) -> time::Duration {
        time::Duration::hours(self.max_age_hours)
    }

    #[must_use]
    pub const fn trial_length(&self) -> time::Duration {
        time::Duration::days(self.trial_days)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { max_age_hours: 24, refresh_interval_secs: 1800, trial_days: 14, revocation_cleanup_interval_secs: 600 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse_without_env() {
        let config = Config::parse_from(["statspro-server"]);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.session.max_age_hours, 24);
        assert_eq!(config.session.refresh_interval_secs, 1800);
        assert!(config.provider.alternate_urls.is_empty());
        assert_eq!(config.telemetry.log_format, LogFormat::Text);
    }

    #[test]
    fn test_alternate_urls_are_comma_separated() {
        let config = Config::parse_from([
            "statspro-server",
            "--provider-alternate-urls",
            "http://a/graphql,http://b/?graphql",
        ]);
        assert_eq!(config.provider.alternate_urls, vec!["http://a/graphql", "http://b/?graphql"]);
    }
}
