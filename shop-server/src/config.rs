//! Shop server configuration
//!
//! 所有配置均来自环境变量 (启动时先加载 `.env`)。
//!
//! | 变量 | 默认值 | 说明 |
//! |------|--------|------|
//! | `ENVIRONMENT` | `development` | development / staging / production |
//! | `HTTP_PORT` | `5000` | HTTP 监听端口 |
//! | `DATABASE_URL` | - | PostgreSQL；development 下缺省则使用内存存储 |
//! | `JWT_SECRET` / `JWT_ISSUER` / `JWT_AUDIENCE` | - | 外部认证服务签发令牌的校验参数 |
//! | `RAZORPAY_KEY_ID` / `RAZORPAY_KEY_SECRET` | - | 支付网关凭据 |
//! | `PAYMENT_CURRENCY` | `INR` | 支付币种 |
//! | `EMAIL_BACKEND` | `log` (dev) / `ses` | 邮件发送方式 |
//! | `SES_FROM_EMAIL` | `orders@shop.local` | 发件人 |
//! | `STATUS_TRANSITIONS` | `permissive` | 订单状态迁移策略 |
//! | `CORS_ORIGINS` | `*` | 逗号分隔 |
//! | `REQUEST_TIMEOUT_MS` | `30000` | 单请求超时 |
//! | `LOG_LEVEL` / `LOG_JSON` / `LOG_DIR` | `info` / `false` / - | 日志 |

use shared::error::{AppError, ErrorCode};
use shared::order::TransitionPolicy;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How order emails leave the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailBackend {
    /// AWS SES
    Ses,
    /// Write to the log only
    Log,
}

/// Shop server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Environment: development | staging | production
    pub environment: String,
    /// HTTP port
    pub http_port: u16,
    /// PostgreSQL connection URL (None = in-memory storage)
    pub database_url: Option<String>,
    /// HS256 secret shared with the auth service
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    /// Gateway public key id (returned to the checkout client)
    pub razorpay_key_id: String,
    /// Gateway secret (API auth + receipt signature key)
    pub razorpay_key_secret: String,
    pub payment_currency: String,
    pub email_backend: EmailBackend,
    /// SES sender email address
    pub ses_from_email: String,
    pub status_transitions: TransitionPolicy,
    /// Allowed CORS origins; empty = any
    pub cors_origins: Vec<String>,
    pub request_timeout_ms: u64,
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".into(),
            http_port: 5000,
            database_url: None,
            jwt_secret: "dev-JWT_SECRET-not-for-production".into(),
            jwt_issuer: "shop-auth".into(),
            jwt_audience: "shop-clients".into(),
            razorpay_key_id: "dev-RAZORPAY_KEY_ID-not-for-production".into(),
            razorpay_key_secret: "dev-RAZORPAY_KEY_SECRET-not-for-production".into(),
            payment_currency: "INR".into(),
            email_backend: EmailBackend::Log,
            ses_from_email: "orders@shop.local".into(),
            status_transitions: TransitionPolicy::Permissive,
            cors_origins: Vec::new(),
            request_timeout_ms: 30_000,
            log_level: "info".into(),
            log_json: false,
            log_dir: None,
        }
    }
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(config_error(format!(
                        "{name} must be set in {environment} environment"
                    )));
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(config_error(format!(
                "{name} must not be empty in {environment} environment"
            )));
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let defaults = Self::default();
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let is_dev = environment == "development";

        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        if database_url.is_none() && !is_dev {
            return Err(config_error(format!(
                "DATABASE_URL must be set in {environment} environment"
            )));
        }

        let email_backend =
            parse_email_backend(std::env::var("EMAIL_BACKEND").ok().as_deref(), is_dev)?;

        let status_transitions = match std::env::var("STATUS_TRANSITIONS") {
            Ok(v) => parse_transitions(&v)?,
            Err(_) => defaults.status_transitions,
        };

        Ok(Self {
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.http_port),
            database_url,
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            jwt_issuer: std::env::var("JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
            jwt_audience: std::env::var("JWT_AUDIENCE").unwrap_or(defaults.jwt_audience),
            razorpay_key_id: Self::require_secret("RAZORPAY_KEY_ID", &environment)?,
            razorpay_key_secret: Self::require_secret("RAZORPAY_KEY_SECRET", &environment)?,
            payment_currency: std::env::var("PAYMENT_CURRENCY")
                .unwrap_or(defaults.payment_currency),
            email_backend,
            ses_from_email: std::env::var("SES_FROM_EMAIL").unwrap_or(defaults.ses_from_email),
            status_transitions,
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|v| parse_origins(&v))
                .unwrap_or_default(),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.request_timeout_ms),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_json: std::env::var("LOG_JSON")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(!is_dev),
            log_dir: std::env::var("LOG_DIR").ok().filter(|s| !s.is_empty()),
            environment,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn config_error(message: String) -> BoxError {
    AppError::with_message(ErrorCode::ConfigError, message).into()
}

/// Unset means `log` in development, `ses` elsewhere
fn parse_email_backend(value: Option<&str>, is_dev: bool) -> Result<EmailBackend, AppError> {
    match value {
        Some("ses") => Ok(EmailBackend::Ses),
        Some("log") => Ok(EmailBackend::Log),
        Some(other) => Err(AppError::with_message(
            ErrorCode::ConfigError,
            format!("Unknown EMAIL_BACKEND: {other}"),
        )),
        None if is_dev => Ok(EmailBackend::Log),
        None => Ok(EmailBackend::Ses),
    }
}

fn parse_transitions(value: &str) -> Result<TransitionPolicy, AppError> {
    TransitionPolicy::parse(value).ok_or_else(|| {
        AppError::with_message(
            ErrorCode::ConfigError,
            format!("Unknown STATUS_TRANSITIONS: {value}"),
        )
    })
}

/// `"a, b,,c"` -> `["a", "b", "c"]`; `"*"` -> any origin
fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "*")
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("https://shop.example, https://admin.example,,"),
            vec!["https://shop.example", "https://admin.example"]
        );
        assert!(parse_origins("*").is_empty());
    }

    #[test]
    fn test_email_backend_and_transitions() {
        assert_eq!(parse_email_backend(None, true).unwrap(), EmailBackend::Log);
        assert_eq!(parse_email_backend(None, false).unwrap(), EmailBackend::Ses);
        assert_eq!(
            parse_email_backend(Some("ses"), true).unwrap(),
            EmailBackend::Ses
        );
        let err = parse_email_backend(Some("smtp"), true).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigError);

        assert_eq!(
            parse_transitions("strict").unwrap(),
            TransitionPolicy::Strict
        );
        assert_eq!(
            parse_transitions("loose").unwrap_err().code,
            ErrorCode::ConfigError
        );
    }

    #[test]
    fn test_default_is_development() {
        let config = Config::default();
        assert!(!config.is_production());
        assert!(config.database_url.is_none());
        assert_eq!(config.email_backend, EmailBackend::Log);
        assert_eq!(config.status_transitions, TransitionPolicy::Permissive);
    }
}
