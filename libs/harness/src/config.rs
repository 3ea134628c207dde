//! Configuration for a harness run.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{HarnessError, Result};

/// Default service image.
pub const DEFAULT_IMAGE: &str = "ghcr.io/coder/coder";

/// Default service image tag.
pub const DEFAULT_VERSION: &str = "latest";

/// Default run deadline in minutes.
pub const DEFAULT_TIMEOUT_MINS: u64 = 10;

/// URL the service listens on inside the container.
pub const LOCAL_ACCESS_URL: &str = "http://localhost:3000";

/// How readiness is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Pause between failed health checks.
    pub interval: Duration,

    /// Give up once this much time has passed since the first check.
    pub timeout: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Account created by first-time setup.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub username: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            email: "testing@coder.com".to_string(),
            password: "InsecurePassw0rd!".to_string(),
            username: "testing".to_string(),
        }
    }
}

/// Harness configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Service image reference (without tag).
    pub image: String,

    /// Service image tag.
    pub version: String,

    /// Deadline for the whole run, from provisioning to release.
    pub run_timeout: Duration,

    /// Readiness polling.
    pub readiness: ReadinessPolicy,

    /// Repository root, bind-mounted at `/src`.
    pub src_dir: PathBuf,

    /// File name of the locally built provider under `src_dir`.
    pub provider_binary: String,

    /// First-time setup account.
    pub credentials: Credentials,

    /// Set when acceptance tests are running; the live suite stays out of their way.
    pub skip_live: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            version: DEFAULT_VERSION.to_string(),
            run_timeout: Duration::from_secs(DEFAULT_TIMEOUT_MINS * 60),
            readiness: ReadinessPolicy::default(),
            src_dir: PathBuf::from(".."),
            provider_binary: "terraform-provider-coder".to_string(),
            credentials: Credentials::default(),
            skip_live: false,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let image = non_empty("CODER_IMAGE").unwrap_or(defaults.image);
        let version = non_empty("CODER_VERSION").unwrap_or(defaults.version);

        let run_timeout = match non_empty("TIMEOUT_MINS") {
            Some(raw) => {
                let mins: u64 = raw.trim().parse().map_err(|_| {
                    HarnessError::Config(format!("TIMEOUT_MINS must be a whole number, got {raw:?}"))
                })?;
                run_timeout_from_mins(mins)?
            }
            None => defaults.run_timeout,
        };

        let readiness = ReadinessPolicy {
            interval: secs_var(&non_empty, "E2E_READY_INTERVAL_SECS")?
                .unwrap_or(defaults.readiness.interval),
            timeout: secs_var(&non_empty, "E2E_READY_TIMEOUT_SECS")?
                .unwrap_or(defaults.readiness.timeout),
        };

        let src_dir = non_empty("E2E_SRC_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.src_dir);

        let provider_binary = non_empty("E2E_PROVIDER_BINARY").unwrap_or(defaults.provider_binary);

        let skip_live = lookup("TF_ACC").as_deref() == Some("1");

        Ok(Self {
            image,
            version,
            run_timeout,
            readiness,
            src_dir,
            provider_binary,
            credentials: defaults.credentials,
            skip_live,
        })
    }

    /// `image:version`.
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.version)
    }
}

/// Run deadline for a whole number of minutes.
pub fn run_timeout_from_mins(mins: u64) -> Result<Duration> {
    mins.checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| HarnessError::Config(format!("TIMEOUT_MINS too large: {mins}")))
}

fn secs_var<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| HarnessError::Config(format!("{key} must be whole seconds, got {raw:?}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = HarnessConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.image_ref(), "ghcr.io/coder/coder:latest");
        assert_eq!(config.run_timeout, Duration::from_secs(600));
        assert_eq!(config.readiness, ReadinessPolicy::default());
        assert!(!config.skip_live);
    }

    #[test]
    fn test_overrides() {
        let config = HarnessConfig::from_lookup(lookup(&[
            ("CODER_IMAGE", "registry.local/coder"),
            ("CODER_VERSION", "v2.12.0"),
            ("TIMEOUT_MINS", "3"),
            ("E2E_READY_TIMEOUT_SECS", "30"),
            ("TF_ACC", "1"),
        ]))
        .unwrap();
        assert_eq!(config.image_ref(), "registry.local/coder:v2.12.0");
        assert_eq!(config.run_timeout, Duration::from_secs(180));
        assert_eq!(config.readiness.timeout, Duration::from_secs(30));
        assert_eq!(config.readiness.interval, Duration::from_secs(1));
        assert!(config.skip_live);
    }

    #[test]
    fn test_empty_values_fall_back() {
        let config =
            HarnessConfig::from_lookup(lookup(&[("CODER_IMAGE", ""), ("TIMEOUT_MINS", "")])).unwrap();
        assert_eq!(config.image, DEFAULT_IMAGE);
        assert_eq!(config.run_timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let err = HarnessConfig::from_lookup(lookup(&[("TIMEOUT_MINS", "ten")])).unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
        assert!(err.to_string().contains("TIMEOUT_MINS"));
    }

    #[test]
    fn test_oversized_timeout_rejected() {
        let err = HarnessConfig::from_lookup(lookup(&[("TIMEOUT_MINS", "307445734561825861")]))
            .unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
        assert!(err.to_string().contains("too large"));

        assert_eq!(run_timeout_from_mins(2).unwrap(), Duration::from_secs(120));
        assert!(run_timeout_from_mins(u64::MAX).is_err());
    }

    #[test]
    fn test_max_readiness_timeout_accepted() {
        let config =
            HarnessConfig::from_lookup(lookup(&[("E2E_READY_TIMEOUT_SECS", "18446744073709551615")]))
                .unwrap();
        assert_eq!(config.readiness.timeout, Duration::from_secs(u64::MAX));
    }
}
