//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{DaemonError, DaemonResult};
use chrono::NaiveTime;
use paperdesk_domain::Leverage;
use paperdesk_engine::{OrderPolicy, ProtectionDefaults, SessionSchedule, SuspectPricePolicy};
use paperdesk_exec::RetryPolicy;
use rust_decimal::Decimal;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Ledger and order defaults
    pub engine: EngineConfig,

    /// Real-time monitor configuration
    pub monitor: MonitorConfig,

    /// HTTP quote feed; the stub feed is used when unset
    pub price_feed: Option<PriceFeedConfig>,

    /// Snapshot file, if any
    pub snapshot_path: Option<PathBuf>,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

/// Ledger and order configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Starting cash of a fresh paper account
    pub initial_cash: Decimal,
    /// Leverage multiplier (>= 1)
    pub leverage: Decimal,
    /// Stop distance used when an order omits one (2 = 2%)
    pub default_stop_loss_pct: Decimal,
    /// Target distance used when an order omits one (4 = 4%)
    pub default_target_pct: Decimal,
    /// Known provider fallback quotes
    pub suspect_prices: Vec<Decimal>,
}

/// Real-time monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Cycle interval during regular trading
    pub poll_interval: Duration,
    /// Cycle interval between pre-close and cutoff
    pub pre_close_interval: Duration,
    /// Local time the tighter interval starts
    pub pre_close_time: NaiveTime,
    /// Local time every position is squared off
    pub cutoff_time: NaiveTime,
    /// Price lookups per symbol per cycle
    pub price_retry_attempts: u32,
    /// Delay before the first retry; doubles per attempt
    pub price_retry_backoff: Duration,
    /// Square-off rounds at the cutoff before a symbol is reported failed
    pub square_off_attempts: u32,
    /// How long `stop_monitor` waits for the loop to finish
    pub join_timeout: Duration,
}

/// HTTP quote feed configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceFeedConfig {
    /// Quote URL with a `{symbol}` placeholder
    pub url_template: String,
    /// Per-request timeout
    pub timeout: Duration,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (uses stubs)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> DaemonResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let environment = Self::load_environment(&vars)?;
        let api = Self::load_api_config(&vars)?;
        let engine = Self::load_engine_config(&vars)?;
        let monitor = Self::load_monitor_config(&vars)?;
        let price_feed = Self::load_price_feed_config(&vars)?;
        let snapshot_path = vars.get("PAPERDESK_SNAPSHOT_PATH").map(PathBuf::from);

        let config = Self {
            api,
            engine,
            monitor,
            price_feed,
            snapshot_path,
            environment,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            engine: EngineConfig::default(),
            monitor: MonitorConfig {
                poll_interval: Duration::from_millis(20),
                pre_close_interval: Duration::from_millis(10),
                price_retry_attempts: 2,
                price_retry_backoff: Duration::from_millis(1),
                square_off_attempts: 2,
                join_timeout: Duration::from_secs(2),
                ..MonitorConfig::default()
            },
            price_feed: None,
            snapshot_path: None,
            environment: Environment::Test,
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> DaemonResult<()> {
        self.leverage()?;
        self.schedule()?;

        if self.engine.initial_cash < Decimal::ZERO {
            return Err(DaemonError::Config(format!(
                "PAPERDESK_INITIAL_CASH must be >= 0, got {}",
                self.engine.initial_cash
            )));
        }
        if self.engine.default_stop_loss_pct <= Decimal::ZERO
            || self.engine.default_target_pct <= Decimal::ZERO
        {
            return Err(DaemonError::Config(
                "default stop-loss and target percentages must be positive".to_string(),
            ));
        }
        if self.engine.default_stop_loss_pct >= Decimal::ONE_HUNDRED {
            return Err(DaemonError::Config(format!(
                "PAPERDESK_DEFAULT_STOP_LOSS_PCT must be below 100, got {}",
                self.engine.default_stop_loss_pct
            )));
        }

        let monitor = &self.monitor;
        if monitor.poll_interval.is_zero() || monitor.pre_close_interval.is_zero() {
            return Err(DaemonError::Config("monitor intervals must be non-zero".to_string()));
        }
        if monitor.price_retry_attempts == 0 || monitor.square_off_attempts == 0 {
            return Err(DaemonError::Config("retry and square-off attempts must be non-zero".to_string()));
        }

        if let Some(feed) = &self.price_feed {
            if !feed.url_template.contains("{symbol}") {
                return Err(DaemonError::Config(format!(
                    "PAPERDESK_PRICE_URL must contain {{symbol}}, got {}",
                    feed.url_template
                )));
            }
            if feed.timeout.is_zero() {
                return Err(DaemonError::Config("price feed timeout must be non-zero".to_string()));
            }
        }

        Ok(())
    }

    pub fn leverage(&self) -> DaemonResult<Leverage> {
        Leverage::new(self.engine.leverage)
            .map_err(|e| DaemonError::Config(format!("Invalid PAPERDESK_LEVERAGE: {}", e)))
    }

    pub fn schedule(&self) -> DaemonResult<SessionSchedule> {
        SessionSchedule::new(self.monitor.pre_close_time, self.monitor.cutoff_time)
            .map_err(|e| DaemonError::Config(e.to_string()))
    }

    pub fn order_policy(&self) -> OrderPolicy {
        OrderPolicy {
            protection: ProtectionDefaults {
                stop_loss_pct: Some(self.engine.default_stop_loss_pct),
                target_pct: Some(self.engine.default_target_pct),
            },
            suspect_prices: SuspectPricePolicy::new(self.engine.suspect_prices.iter().copied()),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.monitor.price_retry_attempts, self.monitor.price_retry_backoff)
    }

    fn load_environment(vars: &Vars<'_>) -> DaemonResult<Environment> {
        let env_str = vars.get("PAPERDESK_ENV").unwrap_or_else(|| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid PAPERDESK_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_api_config(vars: &Vars<'_>) -> DaemonResult<ApiConfig> {
        let host = vars.get("PAPERDESK_API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = vars.parse("PAPERDESK_API_PORT", 8080u16)?;

        Ok(ApiConfig { host, port })
    }

    fn load_engine_config(vars: &Vars<'_>) -> DaemonResult<EngineConfig> {
        let defaults = EngineConfig::default();

        let suspect_prices = match vars.get("PAPERDESK_SUSPECT_PRICES") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    Decimal::from_str(s).map_err(|_| {
                        DaemonError::Config(format!("Invalid PAPERDESK_SUSPECT_PRICES entry: {}", s))
                    })
                })
                .collect::<DaemonResult<Vec<_>>>()?,
            None => defaults.suspect_prices,
        };

        Ok(EngineConfig {
            initial_cash: vars.decimal("PAPERDESK_INITIAL_CASH", defaults.initial_cash)?,
            leverage: vars.decimal("PAPERDESK_LEVERAGE", defaults.leverage)?,
            default_stop_loss_pct: vars.decimal("PAPERDESK_DEFAULT_STOP_LOSS_PCT", defaults.default_stop_loss_pct)?,
            default_target_pct: vars.decimal("PAPERDESK_DEFAULT_TARGET_PCT", defaults.default_target_pct)?,
            suspect_prices,
        })
    }

    fn load_price_feed_config(vars: &Vars<'_>) -> DaemonResult<Option<PriceFeedConfig>> {
        let Some(url_template) = vars.get("PAPERDESK_PRICE_URL") else {
            return Ok(None);
        };

        Ok(Some(PriceFeedConfig {
            url_template,
            timeout: Duration::from_secs(vars.parse("PAPERDESK_PRICE_TIMEOUT_SECS", 10u64)?),
        }))
    }

    fn load_monitor_config(vars: &Vars<'_>) -> DaemonResult<MonitorConfig> {
        let defaults = MonitorConfig::default();

        Ok(MonitorConfig {
            poll_interval: Duration::from_secs(
                vars.parse("PAPERDESK_POLL_INTERVAL_SECS", defaults.poll_interval.as_secs())?,
            ),
            pre_close_interval: Duration::from_secs(
                vars.parse("PAPERDESK_PRE_CLOSE_INTERVAL_SECS", defaults.pre_close_interval.as_secs())?,
            ),
            pre_close_time: vars.time("PAPERDESK_PRE_CLOSE_TIME", defaults.pre_close_time)?,
            cutoff_time: vars.time("PAPERDESK_CUTOFF_TIME", defaults.cutoff_time)?,
            price_retry_attempts: vars.parse("PAPERDESK_PRICE_RETRY_ATTEMPTS", defaults.price_retry_attempts)?,
            price_retry_backoff: Duration::from_millis(vars.parse(
                "PAPERDESK_PRICE_RETRY_BACKOFF_MS",
                u64::try_from(defaults.price_retry_backoff.as_millis()).map_err(|_| {
                    DaemonError::Config("default price retry backoff does not fit in u64 milliseconds".to_string())
                })?,
            )?),
            square_off_attempts: vars.parse("PAPERDESK_SQUARE_OFF_ATTEMPTS", defaults.square_off_attempts)?,
            join_timeout: Duration::from_secs(
                vars.parse("PAPERDESK_MONITOR_JOIN_TIMEOUT_SECS", defaults.join_timeout.as_secs())?,
            ),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            engine: EngineConfig::default(),
            monitor: MonitorConfig::default(),
            price_feed: None,
            snapshot_path: None,
            environment: Environment::Development,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_cash: Decimal::new(100_000, 0),
            leverage: Decimal::new(5, 0),
            default_stop_loss_pct: Decimal::new(2, 0),
            default_target_pct: Decimal::new(4, 0),
            suspect_prices: vec![Decimal::new(1000, 0)],
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let schedule = SessionSchedule::default();
        Self {
            poll_interval: Duration::from_secs(10),
            pre_close_interval: Duration::from_secs(2),
            pre_close_time: schedule.pre_close(),
            cutoff_time: schedule.cutoff(),
            price_retry_attempts: 3,
            price_retry_backoff: Duration::from_millis(500),
            square_off_attempts: 5,
            join_timeout: Duration::from_secs(5),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Variable parsing
// =============================================================================

struct Vars<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Vars<'_> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> DaemonResult<T> {
        match self.get(key) {
            Some(val) => val
                .parse::<T>()
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            None => Ok(default),
        }
    }

    fn decimal(&self, key: &str, default: Decimal) -> DaemonResult<Decimal> {
        self.parse(key, default)
    }

    fn time(&self, key: &str, default: NaiveTime) -> DaemonResult<NaiveTime> {
        match self.get(key) {
            Some(val) => NaiveTime::parse_from_str(&val, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(&val, "%H:%M"))
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {} (expected HH:MM)", key, val))),
            None => Ok(default),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> DaemonResult<Config> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.api.port, 8080);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.engine.initial_cash, dec!(100000));
        assert_eq!(config.engine.leverage, dec!(5));
        assert_eq!(config.monitor.poll_interval, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_test_config() {
        let config = Config::test();

        assert_eq!(config.api.port, 0);
        assert_eq!(config.environment, Environment::Test);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.monitor.pre_close_time, NaiveTime::from_hms_opt(15, 10, 0).unwrap());
        assert_eq!(config.monitor.cutoff_time, NaiveTime::from_hms_opt(15, 15, 0).unwrap());
        assert_eq!(config.engine.suspect_prices, vec![dec!(1000)]);
        assert_eq!(config.monitor.price_retry_backoff, Duration::from_millis(500));
        assert!(config.snapshot_path.is_none());
        assert!(config.price_feed.is_none());
    }

    #[test]
    fn test_price_feed_config() {
        let config = load(&[("PAPERDESK_PRICE_URL", "http://quotes.local/ltp/{symbol}")]).unwrap();
        let feed = config.price_feed.unwrap();
        assert_eq!(feed.url_template, "http://quotes.local/ltp/{symbol}");
        assert_eq!(feed.timeout, Duration::from_secs(10));

        assert!(load(&[("PAPERDESK_PRICE_URL", "http://quotes.local/ltp")]).is_err());
        assert!(load(&[
            ("PAPERDESK_PRICE_URL", "http://quotes.local/{symbol}"),
            ("PAPERDESK_PRICE_TIMEOUT_SECS", "0"),
        ])
        .is_err());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("PAPERDESK_ENV", "prod"),
            ("PAPERDESK_API_PORT", "9090"),
            ("PAPERDESK_INITIAL_CASH", "250000.50"),
            ("PAPERDESK_LEVERAGE", "3"),
            ("PAPERDESK_PRE_CLOSE_TIME", "15:20"),
            ("PAPERDESK_CUTOFF_TIME", "15:25:30"),
            ("PAPERDESK_SUSPECT_PRICES", "1000, 0.05"),
            ("PAPERDESK_PRICE_RETRY_BACKOFF_MS", "250"),
            ("PAPERDESK_SNAPSHOT_PATH", "/tmp/book.json"),
        ])
        .unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.api.port, 9090);
        assert_eq!(config.engine.initial_cash, dec!(250000.50));
        assert_eq!(config.leverage().unwrap().as_decimal(), dec!(3));
        assert_eq!(config.monitor.cutoff_time, NaiveTime::from_hms_opt(15, 25, 30).unwrap());
        assert_eq!(config.engine.suspect_prices, vec![dec!(1000), dec!(0.05)]);
        assert_eq!(config.retry_policy().initial_backoff, Duration::from_millis(250));
        assert_eq!(config.snapshot_path, Some(PathBuf::from("/tmp/book.json")));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(load(&[("PAPERDESK_ENV", "staging")]).is_err());
        assert!(load(&[("PAPERDESK_API_PORT", "http")]).is_err());
        assert!(load(&[("PAPERDESK_LEVERAGE", "0.5")]).is_err());
        assert!(load(&[("PAPERDESK_CUTOFF_TIME", "3pm")]).is_err());
        assert!(load(&[("PAPERDESK_POLL_INTERVAL_SECS", "0")]).is_err());
        assert!(load(&[("PAPERDESK_DEFAULT_TARGET_PCT", "-1")]).is_err());
    }

    #[test]
    fn test_pre_close_must_precede_cutoff() {
        let err = load(&[("PAPERDESK_PRE_CLOSE_TIME", "15:30")]).unwrap_err();
        assert!(matches!(err, DaemonError::Config(_)));
    }

    #[test]
    fn test_order_policy_from_config() {
        let policy = Config::default().order_policy();

        assert_eq!(policy.protection.stop_loss_pct, Some(dec!(2)));
        assert_eq!(policy.protection.target_pct, Some(dec!(4)));
        assert_eq!(policy.suspect_prices.sentinels(), &[dec!(1000)]);
    }
}
