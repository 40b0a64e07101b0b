use std::{env, net::SocketAddr, time::Duration};

use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_OTP_TTL_SECONDS: u64 = 300;
pub const DEFAULT_OTP_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_OTP_SWEEP_INTERVAL_SECONDS: u64 = 60;
pub const DEFAULT_PASSWORD_SETUP_TTL_HOURS: i64 = 72;
pub const DEFAULT_CHECKOUT_SUCCESS_PATH: &str =
    "/payment/success?session_id={CHECKOUT_SESSION_ID}";
pub const DEFAULT_CHECKOUT_CANCEL_PATH: &str = "/signup?canceled=true";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Clone)]
pub struct StripeSettings {
    pub secret_key: String,
    /// `None` disables signature checks on the webhook (development only).
    pub webhook_secret: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub tls_disabled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OtpSettings {
    pub ttl: Duration,
    pub max_attempts: u32,
    pub sweep_interval: Duration,
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_OTP_TTL_SECONDS),
            max_attempts: DEFAULT_OTP_MAX_ATTEMPTS,
            sweep_interval: Duration::from_secs(DEFAULT_OTP_SWEEP_INTERVAL_SECONDS),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub global_per_millisecond: u64,
    pub global_burst: u32,
    pub auth_per_second: u64,
    pub auth_burst: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            // 200ms/token (~5 req/sec) with room for client polling bursts
            global_per_millisecond: 200,
            global_burst: 20,
            auth_per_second: 1,
            auth_burst: 10,
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub frontend_origin: String,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub auth_cookie_secure: bool,
    pub stripe: StripeSettings,
    pub checkout_success_path: String,
    pub checkout_cancel_path: String,
    pub otp: OtpSettings,
    pub password_setup_ttl_hours: i64,
    pub smtp: Option<SmtpSettings>,
    pub rate_limits: RateLimitSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok(); // Load .env file
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so tests do not
    /// have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let database_url = required("DATABASE_URL")?;
        let frontend_origin = required("FRONTEND_ORIGIN")?
            .trim_end_matches('/')
            .to_string();
        let jwt_secret = required("JWT_SECRET")?;
        let stripe_secret_key = required("STRIPE_SECRET_KEY")?;

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let otp = OtpSettings {
            ttl: Duration::from_secs(parse_or(
                &get,
                "OTP_TTL_SECONDS",
                DEFAULT_OTP_TTL_SECONDS,
            )?),
            max_attempts: parse_or(&get, "OTP_MAX_ATTEMPTS", DEFAULT_OTP_MAX_ATTEMPTS)?,
            sweep_interval: Duration::from_secs(parse_or(
                &get,
                "OTP_SWEEP_INTERVAL_SECONDS",
                DEFAULT_OTP_SWEEP_INTERVAL_SECONDS,
            )?),
        };
        if otp.ttl.is_zero() {
            return Err(ConfigError::Invalid {
                name: "OTP_TTL_SECONDS",
                reason: "must be greater than zero".into(),
            });
        }
        if otp.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "OTP_MAX_ATTEMPTS",
                reason: "must be greater than zero".into(),
            });
        }
        if otp.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: "OTP_SWEEP_INTERVAL_SECONDS",
                reason: "must be greater than zero".into(),
            });
        }

        let smtp = match get("SMTP_HOST") {
            Some(host) => Some(SmtpSettings {
                host,
                port: parse_or(&get, "SMTP_PORT", 587u16)?,
                username: get("SMTP_USERNAME"),
                password: get("SMTP_PASSWORD"),
                from: get("SMTP_FROM").ok_or(ConfigError::Missing("SMTP_FROM"))?,
                tls_disabled: flag(&get, "SMTP_TLS_DISABLED", false),
            }),
            None => None,
        };

        let defaults = RateLimitSettings::default();
        let rate_limits = RateLimitSettings {
            global_per_millisecond: parse_or(
                &get,
                "RATE_LIMITER_MILLISECONDS",
                defaults.global_per_millisecond,
            )?,
            global_burst: parse_or(&get, "RATE_LIMITER_BURST", defaults.global_burst)?,
            auth_per_second: parse_or(
                &get,
                "RATE_LIMITER_AUTH_SECONDS",
                defaults.auth_per_second,
            )?,
            auth_burst: parse_or(&get, "RATE_LIMITER_AUTH_BURST", defaults.auth_burst)?,
        };

        Ok(Config {
            database_url,
            frontend_origin,
            bind_addr,
            jwt_secret,
            jwt_issuer: get("JWT_ISSUER").unwrap_or_else(|| "pitchlab".to_string()),
            jwt_audience: get("JWT_AUDIENCE").unwrap_or_else(|| "pitchlab-web".to_string()),
            auth_cookie_secure: flag(&get, "AUTH_COOKIE_SECURE", true),
            stripe: StripeSettings {
                secret_key: stripe_secret_key,
                webhook_secret: get("STRIPE_WEBHOOK_SECRET"),
            },
            checkout_success_path: get("CHECKOUT_SUCCESS_PATH")
                .unwrap_or_else(|| DEFAULT_CHECKOUT_SUCCESS_PATH.to_string()),
            checkout_cancel_path: get("CHECKOUT_CANCEL_PATH")
                .unwrap_or_else(|| DEFAULT_CHECKOUT_CANCEL_PATH.to_string()),
            otp,
            password_setup_ttl_hours: parse_or(
                &get,
                "PASSWORD_SETUP_TTL_HOURS",
                DEFAULT_PASSWORD_SETUP_TTL_HOURS,
            )?,
            smtp,
            rate_limits,
        })
    }

    pub fn checkout_success_url(&self) -> String {
        format!("{}{}", self.frontend_origin, self.checkout_success_path)
    }

    pub fn checkout_cancel_url(&self) -> String {
        format!("{}{}", self.frontend_origin, self.checkout_cancel_path)
    }

    pub fn webhook_signing_enabled(&self) -> bool {
        self.stripe.webhook_secret.is_some()
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn flag<G>(get: &G, name: &str, default: bool) -> bool
where
    G: Fn(&str) -> Option<String>,
{
    get(name)
        .map(|value| matches!(value.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

#[cfg(test)]
pub(crate) fn test_config() -> std::sync::Arc<Config> {
    std::sync::Arc::new(Config {
        database_url: String::new(),
        frontend_origin: "http://localhost:5173".into(),
        bind_addr: DEFAULT_BIND_ADDR.parse().unwrap(),
        jwt_secret: "0123456789abcdef0123456789abcdef".into(),
        jwt_issuer: "test-issuer".into(),
        jwt_audience: "test-audience".into(),
        auth_cookie_secure: false,
        stripe: StripeSettings {
            secret_key: "sk_test_stub".into(),
            webhook_secret: None,
        },
        checkout_success_path: DEFAULT_CHECKOUT_SUCCESS_PATH.into(),
        checkout_cancel_path: DEFAULT_CHECKOUT_CANCEL_PATH.into(),
        otp: OtpSettings::default(),
        password_setup_ttl_hours: DEFAULT_PASSWORD_SETUP_TTL_HOURS,
        smtp: None,
        rate_limits: RateLimitSettings::default(),
    })
}
