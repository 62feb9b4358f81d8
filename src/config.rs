use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64,  // seconds
    pub refresh_token_expires_in: i64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    /// Base URL of the external checkout provider.
    pub base_url: String,
    /// URL the provider redirects the customer back to after checkout.
    pub return_url: String,
    /// Shared secret for webhook HMAC-SHA256 signatures.
    pub webhook_secret: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    10
}

/// Product rules that affect real money and points. Values are centavos
/// unless stated otherwise; defaults mirror the live product decisions and
/// must not be changed without product confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub topup_min: i64,
    pub topup_max: i64,
    pub debit_ceiling: i64,
    /// One reward point per this many centavos of delivered order total.
    pub points_award_divisor: i64,
    pub late_full_minutes: i64,
    pub late_partial_minutes: i64,
    pub late_review_minutes: i64,
    pub late_partial_percent: i64,
    pub quality_percent: i64,
    pub voucher_expiry_days: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            topup_min: 50_00,
            topup_max: 10_000_00,
            debit_ceiling: 10_000_00,
            points_award_divisor: 100_00,
            late_full_minutes: 60,
            late_partial_minutes: 30,
            late_review_minutes: 15,
            late_partial_percent: 30,
            quality_percent: 50,
            voucher_expiry_days: 30,
        }
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                toml::from_str(&config_str).map_err(|e| format!("Failed to parse config: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // No config file: build from environment variables and defaults.
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                let database_url = get_env("DATABASE_URL")
                    .ok_or("DATABASE_URL is not set and no config.toml was found")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                        access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 7200i64),
                        refresh_token_expires_in: get_env_parse(
                            "JWT_REFRESH_EXPIRES_IN",
                            2_592_000i64,
                        ),
                    },
                    payments: PaymentsConfig {
                        base_url: get_env("PAYMENTS_BASE_URL")
                            .unwrap_or_else(|| "https://pay.example.com".to_string()),
                        return_url: get_env("PAYMENTS_RETURN_URL")
                            .unwrap_or_else(|| "https://app.bitebay.ph/wallet".to_string()),
                        webhook_secret: get_env("PAYMENTS_WEBHOOK_SECRET").unwrap_or_default(),
                        request_timeout_secs: get_env_parse("PAYMENTS_TIMEOUT_SECS", 10u64),
                    },
                    policy: PolicyConfig::default(),
                }
            }
            Err(e) => {
                return Err(format!("Failed to read config file {config_path}: {e}").into());
            }
        };

        // Environment overrides apply even when the file exists.
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT") {
            if let Ok(p) = v.parse() {
                config.server.port = p;
            }
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS") {
            if let Ok(mc) = v.parse() {
                config.database.max_connections = mc;
            }
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            config.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_EXPIRES_IN") {
            if let Ok(n) = v.parse() {
                config.jwt.access_token_expires_in = n;
            }
        }
        if let Ok(v) = env::var("JWT_REFRESH_EXPIRES_IN") {
            if let Ok(n) = v.parse() {
                config.jwt.refresh_token_expires_in = n;
            }
        }
        if let Ok(v) = env::var("PAYMENTS_BASE_URL") {
            config.payments.base_url = v;
        }
        if let Ok(v) = env::var("PAYMENTS_RETURN_URL") {
            config.payments.return_url = v;
        }
        if let Ok(v) = env::var("PAYMENTS_WEBHOOK_SECRET") {
            config.payments.webhook_secret = v;
        }
        if let Ok(v) = env::var("PAYMENTS_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                config.payments.request_timeout_secs = n;
            }
        }

        Ok(config)
    }
}
