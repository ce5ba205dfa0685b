use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_queue_key")]
    pub queue_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    #[serde(default = "default_payment_deadline_minutes")]
    pub payment_deadline_minutes: i64,
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_gateway_delay_ms")]
    pub gateway_delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_connections() -> u32 { 5 }
fn default_queue_key() -> String { "boxoffice:payments".into() }
fn default_payment_deadline_minutes() -> i64 { 15 }
fn default_sweep_interval_seconds() -> u64 { 60 }
fn default_workers() -> usize { 1 }
fn default_gateway_delay_ms() -> u64 { 2000 }
fn default_max_retries() -> usize { 5 }
fn default_initial_backoff_ms() -> u64 { 200 }
fn default_max_backoff_ms() -> u64 { 10_000 }

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            payment_deadline_minutes: default_payment_deadline_minutes(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            gateway_delay_ms: default_gateway_delay_ms(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl BookingConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}

impl PaymentsConfig {
    pub fn gateway_delay(&self) -> Duration {
        Duration::from_millis(self.gateway_delay_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. BOXOFFICE__PAYMENTS__WORKERS=4
            .add_source(config::Environment::with_prefix("BOXOFFICE").separator("__"))
            .build()?;

        s.try_deserialize::<Self>()?.validated()
    }

    /// Parse a single TOML document. Missing optional sections take their
    /// defaults.
    pub fn from_toml(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize::<Self>()?
            .validated()
    }

    fn validated(self) -> Result<Self, config::ConfigError> {
        let minutes = self.booking.payment_deadline_minutes;
        if minutes <= 0 || chrono::Duration::try_minutes(minutes).is_none() {
            return Err(config::ConfigError::Message(format!(
                "booking.payment_deadline_minutes must be a positive number of minutes, got {}",
                minutes
            )));
        }
        Ok(self)
    }
}
