use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Process configuration, read once from `PADEL_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub compact_threshold: u64,
    pub sweep_interval: Duration,
    pub gateway_token: Option<String>,
    /// Email and display name of the ADMIN bootstrapped at startup.
    pub admin: Option<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            metrics_port: None,
            compact_threshold: 1000,
            sweep_interval: Duration::from_secs(60),
            gateway_token: None,
            admin: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparsable numbers fall back to the default.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
            var(key).and_then(|s| s.trim().parse().ok())
        }

        let defaults = Self::default();
        let admin = var("PADEL_ADMIN_EMAIL")
            .filter(|email| !email.trim().is_empty())
            .map(|email| {
                let name = var("PADEL_ADMIN_NAME").unwrap_or_else(|| "Administrator".into());
                (email, name)
            });

        Self {
            bind: var("PADEL_BIND").unwrap_or(defaults.bind),
            port: parsed(&var, "PADEL_PORT").unwrap_or(defaults.port),
            data_dir: var("PADEL_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            metrics_port: parsed(&var, "PADEL_METRICS_PORT"),
            compact_threshold: parsed(&var, "PADEL_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            sweep_interval: parsed(&var, "PADEL_SWEEP_INTERVAL_SECS")
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            gateway_token: var("PADEL_GATEWAY_TOKEN").filter(|t| !t.is_empty()),
            admin,
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("padelbook.wal")
    }
}
