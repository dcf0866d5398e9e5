pub mod decode;
pub mod domain;
pub mod error;
pub mod session;
pub mod time;
pub mod wire;

pub use error::{RefDataError, Result};

pub mod config {
    use crate::domain::TimeCoercion;
    use crate::session::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT, REFDATA_SERVICE};
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub host: String,
        pub port: u16,
        pub service: String,
        pub request_timeout_secs: u64,
        pub time_coercion: TimeCoercion,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let port = match std::env::var("REFDATA_PORT") {
                Ok(s) => s
                    .trim()
                    .parse::<u16>()
                    .with_context(|| format!("REFDATA_PORT is not a port number: {s}"))?,
                Err(_) => DEFAULT_PORT,
            };

            let request_timeout_secs = match std::env::var("REFDATA_TIMEOUT_SECS") {
                Ok(s) => parse_timeout_secs(&s)?,
                Err(_) => DEFAULT_REQUEST_TIMEOUT.as_secs(),
            };

            let time_coercion = match std::env::var("REFDATA_TIME_COERCION") {
                Ok(s) => TimeCoercion::parse(&s).with_context(|| {
                    format!("REFDATA_TIME_COERCION must be time_of_day or legacy_datetime (got {s})")
                })?,
                Err(_) => TimeCoercion::default(),
            };

            Ok(Self {
                host: std::env::var("REFDATA_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
                port,
                service: std::env::var("REFDATA_SERVICE")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| REFDATA_SERVICE.to_string()),
                request_timeout_secs,
                time_coercion,
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }
    }

    fn parse_timeout_secs(s: &str) -> anyhow::Result<u64> {
        let secs = s
            .trim()
            .parse::<u64>()
            .with_context(|| format!("REFDATA_TIMEOUT_SECS is not a number of seconds: {s}"))?;
        anyhow::ensure!(secs > 0, "REFDATA_TIMEOUT_SECS must be at least 1");
        Ok(secs)
    }

}
