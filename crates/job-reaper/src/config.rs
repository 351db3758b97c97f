use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

pub const DEFAULT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

#[derive(Clone)]
pub struct Config {
    pub kube: KubeConfig,
    pub reconciler: ReconcilerConfig,
}

#[derive(Clone)]
pub struct KubeConfig {
    pub host: String,
    pub port: u16,
    pub token_path: PathBuf,
    pub token: String,
    pub insecure_skip_tls_verify: bool,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub poll_interval_secs: u64,
    pub succeeded_threshold: i32,
    pub failed_threshold: i32,
    pub capture_logs: bool,
    pub max_consecutive_failures: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            succeeded_threshold: 1,
            failed_threshold: 1,
            capture_logs: false,
            max_consecutive_failures: 5,
        }
    }
}

impl ReconcilerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl KubeConfig {
    /// API server URL built from the service host and port.
    pub fn cluster_url(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("https://[{}]:{}", self.host, self.port)
        } else {
            format!("https://{}:{}", self.host, self.port)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// The bearer token must never end up in logs.
impl fmt::Debug for KubeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("token_path", &self.token_path)
            .field("token", &"<redacted>")
            .field("insecure_skip_tls_verify", &self.insecure_skip_tls_verify)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("kube", &self.kube)
            .field("reconciler", &self.reconciler)
            .finish()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup, reading the
    /// service account token once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("KUBERNETES_SERVICE_HOST").filter(|v| !v.trim().is_empty());
        let port = lookup("KUBERNETES_SERVICE_PORT").filter(|v| !v.trim().is_empty());
        let (host, port) = match (host, port) {
            (Some(host), Some(port)) => (host.trim().to_string(), port),
            _ => {
                return Err(Error::Config(
                    "KUBERNETES_SERVICE_HOST and KUBERNETES_SERVICE_PORT must be set".to_string(),
                ))
            }
        };
        let port = parse_value::<u16>("KUBERNETES_SERVICE_PORT", &port)?;

        let token_path = lookup("REAPER_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_PATH));
        let token = read_token(&token_path)?;

        let defaults = ReconcilerConfig::default();
        let config = Config {
            kube: KubeConfig {
                host,
                port,
                token_path,
                token,
                insecure_skip_tls_verify: parse_var(
                    &lookup,
                    "REAPER_INSECURE_SKIP_TLS_VERIFY",
                    true,
                )?,
                request_timeout_secs: parse_var(&lookup, "REAPER_REQUEST_TIMEOUT_SECS", 30)?,
            },
            reconciler: ReconcilerConfig {
                poll_interval_secs: parse_var(
                    &lookup,
                    "REAPER_POLL_INTERVAL_SECS",
                    defaults.poll_interval_secs,
                )?,
                succeeded_threshold: parse_var(
                    &lookup,
                    "REAPER_SUCCEEDED_THRESHOLD",
                    defaults.succeeded_threshold,
                )?,
                failed_threshold: parse_var(
                    &lookup,
                    "REAPER_FAILED_THRESHOLD",
                    defaults.failed_threshold,
                )?,
                capture_logs: parse_var(&lookup, "REAPER_CAPTURE_LOGS", defaults.capture_logs)?,
                max_consecutive_failures: parse_var(
                    &lookup,
                    "REAPER_MAX_CONSECUTIVE_FAILURES",
                    defaults.max_consecutive_failures,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.kube.request_timeout_secs == 0 {
            return Err(Error::Config(
                "REAPER_REQUEST_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        if self.reconciler.poll_interval_secs == 0 {
            return Err(Error::Config(
                "REAPER_POLL_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }
        // A threshold of zero would reap every job, including ones still running.
        if self.reconciler.succeeded_threshold < 1 || self.reconciler.failed_threshold < 1 {
            return Err(Error::Config(
                "REAPER_SUCCEEDED_THRESHOLD and REAPER_FAILED_THRESHOLD must be at least 1"
                    .to_string(),
            ));
        }
        if self.reconciler.max_consecutive_failures == 0 {
            return Err(Error::Config(
                "REAPER_MAX_CONSECUTIVE_FAILURES must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_token(path: &Path) -> Result<String> {
    let token = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "issue while reading token file {}: {}",
            path.display(),
            e
        ))
    })?;
    let token = token.trim().to_string();
    if token.is_empty() {
        return Err(Error::Config(format!(
            "token file {} is empty",
            path.display()
        )));
    }
    Ok(token)
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => parse_value(key, &raw),
        _ => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .to_lowercase()
        .parse()
        .map_err(|_| Error::Config(format!("invalid value for {}: {:?}", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn token_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "job-reaper-{}-{}-token",
            name,
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn env(token_path: &PathBuf, extra: &[(&str, &str)]) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("KUBERNETES_SERVICE_HOST".to_string(), "10.96.0.1".to_string());
        vars.insert("KUBERNETES_SERVICE_PORT".to_string(), "443".to_string());
        vars.insert(
            "REAPER_TOKEN_PATH".to_string(),
            token_path.display().to_string(),
        );
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        vars
    }

    #[test]
    fn test_defaults_and_trimmed_token() {
        let path = token_file("defaults", "secret-token\n");
        let vars = env(&path, &[]);
        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.kube.cluster_url(), "https://10.96.0.1:443");
        assert_eq!(config.kube.token, "secret-token");
        assert!(config.kube.insecure_skip_tls_verify);
        assert_eq!(config.kube.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.reconciler, ReconcilerConfig::default());
        assert_eq!(config.reconciler.poll_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let path = token_file("overrides", "t");
        let vars = env(
            &path,
            &[
                ("REAPER_POLL_INTERVAL_SECS", "60"),
                ("REAPER_SUCCEEDED_THRESHOLD", "3"),
                ("REAPER_FAILED_THRESHOLD", "2"),
                ("REAPER_CAPTURE_LOGS", "TRUE"),
                ("REAPER_MAX_CONSECUTIVE_FAILURES", "1"),
            ],
        );
        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.reconciler.poll_interval_secs, 60);
        assert_eq!(config.reconciler.succeeded_threshold, 3);
        assert_eq!(config.reconciler.failed_threshold, 2);
        assert!(config.reconciler.capture_logs);
        assert_eq!(config.reconciler.max_consecutive_failures, 1);
    }

    #[test]
    fn test_missing_endpoint_is_fatal() {
        let path = token_file("missing", "t");
        let mut vars = env(&path, &[]);
        vars.remove("KUBERNETES_SERVICE_PORT");
        let err = Config::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_unreadable_token_is_fatal() {
        let missing = std::env::temp_dir().join("job-reaper-no-such-token");
        let vars = env(&missing, &[]);
        let err = Config::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let empty = token_file("empty", "  \n");
        let vars = env(&empty, &[]);
        assert!(Config::from_lookup(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let path = token_file("invalid", "t");
        for (key, value) in [
            ("REAPER_POLL_INTERVAL_SECS", "soon"),
            ("REAPER_POLL_INTERVAL_SECS", "0"),
            ("REAPER_SUCCEEDED_THRESHOLD", "0"),
            ("REAPER_FAILED_THRESHOLD", "-1"),
            ("REAPER_CAPTURE_LOGS", "yes please"),
            ("KUBERNETES_SERVICE_PORT", "https"),
        ] {
            let vars = env(&path, &[(key, value)]);
            assert!(
                Config::from_lookup(|k| vars.get(k).cloned()).is_err(),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }

    #[test]
    fn test_ipv6_host_is_bracketed() {
        let path = token_file("ipv6", "t");
        let vars = env(&path, &[("KUBERNETES_SERVICE_HOST", "fd00::1")]);
        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.kube.cluster_url(), "https://[fd00::1]:443");
    }

    #[test]
    fn test_debug_redacts_token() {
        let path = token_file("debug", "super-secret");
        let vars = env(&path, &[]);
        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
