use std::time::Duration;

use anyhow::Context;

use crate::context::{DEFAULT_SYNC_INTERVAL, DEFAULT_SYNC_TIMEOUT};
use crate::poll::PollSettings;

const DEFAULT_ENDPOINT: &str = "https://api.cloudbox.dev";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_key: String,
    pub endpoint: String,
    pub request_timeout: Duration,
    pub sync: PollSettings,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            sync: PollSettings::new(DEFAULT_SYNC_TIMEOUT, DEFAULT_SYNC_INTERVAL),
        }
    }

    /// Reads `CLOUDBOX_*` variables from the process environment. Callers
    /// that want `.env` support load it first.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("CLOUDBOX_API_KEY")
            .filter(|value| !value.trim().is_empty())
            .context("CLOUDBOX_API_KEY is not set")?;
        let endpoint =
            lookup("CLOUDBOX_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let request_timeout = Duration::from_millis(read_u64(
            &lookup,
            "CLOUDBOX_REQUEST_TIMEOUT_MS",
            DEFAULT_REQUEST_TIMEOUT_MS,
        ));
        let sync = PollSettings::new(
            Duration::from_secs(read_u64(
                &lookup,
                "CLOUDBOX_SYNC_TIMEOUT_SECS",
                DEFAULT_SYNC_TIMEOUT.as_secs(),
            )),
            Duration::from_millis(read_u64(
                &lookup,
                "CLOUDBOX_SYNC_INTERVAL_MS",
                DEFAULT_SYNC_INTERVAL.as_millis() as u64,
            )),
        );

        Ok(Self {
            api_key,
            endpoint,
            request_timeout,
            sync,
        })
    }
}

fn read_u64<F>(lookup: &F, name: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn requires_api_key() {
        let err = ClientConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("CLOUDBOX_API_KEY"));

        let blank = ClientConfig::from_lookup(lookup(&[("CLOUDBOX_API_KEY", "  ")]));
        assert!(blank.is_err());
    }

    #[test]
    fn falls_back_to_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[("CLOUDBOX_API_KEY", "key")])).unwrap();
        assert_eq!(config.api_key, "key");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.sync.timeout, DEFAULT_SYNC_TIMEOUT);
        assert_eq!(config.sync.interval, DEFAULT_SYNC_INTERVAL);
    }

    #[test]
    fn reads_overrides_and_ignores_garbage() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("CLOUDBOX_API_KEY", "key"),
            ("CLOUDBOX_ENDPOINT", "http://localhost:8080"),
            ("CLOUDBOX_REQUEST_TIMEOUT_MS", "not-a-number"),
            ("CLOUDBOX_SYNC_TIMEOUT_SECS", "30"),
            ("CLOUDBOX_SYNC_INTERVAL_MS", " 250 "),
        ]))
        .unwrap();
        assert_eq!(config.endpoint, "http://localhost:8080");
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.sync.timeout, Duration::from_secs(30));
        assert_eq!(config.sync.interval, Duration::from_millis(250));
    }

    #[test]
    fn read_u64_uses_default_when_missing() {
        assert_eq!(read_u64(&|_: &str| None, "NO_SUCH_ENV_FOR_TEST", 42), 42);
    }
}
