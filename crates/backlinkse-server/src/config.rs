use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            other => bail!("unknown environment {other:?} (expected development, test or production)"),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub cors_origins: Vec<String>,
    pub rate_limit_window: Duration,
    pub rate_limit_max: u32,
    /// Key the rate limit on forwarding headers instead of the socket peer.
    pub trust_proxy: bool,
    /// `$BACKLINKSE_DATA_DIR`; the platform data dir when unset.
    pub data_dir: Option<PathBuf>,
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{name}: {e}")),
        None => Ok(default),
    }
}

fn ttl(name: &str, default: &str) -> Result<Duration> {
    let raw = var(name).unwrap_or_else(|| default.to_owned());
    humantime::parse_duration(raw.trim()).with_context(|| format!("{name}: invalid duration {raw:?}"))
}

impl ServerConfig {
    /// Read every `BACKLINKSE_*` variable. Missing token secrets are fatal.
    pub fn from_env() -> Result<Self> {
        let Some(jwt_secret) = var("BACKLINKSE_JWT_SECRET") else {
            bail!("BACKLINKSE_JWT_SECRET environment variable is required");
        };
        let Some(jwt_refresh_secret) = var("BACKLINKSE_JWT_REFRESH_SECRET") else {
            bail!("BACKLINKSE_JWT_REFRESH_SECRET environment variable is required");
        };

        Ok(Self {
            host: var("BACKLINKSE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed("BACKLINKSE_PORT", 5004)?,
            environment: parsed("BACKLINKSE_ENV", Environment::Development)?,
            jwt_secret,
            jwt_refresh_secret,
            access_ttl: ttl("BACKLINKSE_JWT_EXPIRES_IN", "7d")?,
            refresh_ttl: ttl("BACKLINKSE_JWT_REFRESH_EXPIRES_IN", "30d")?,
            cors_origins: var("BACKLINKSE_CORS_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".into())
                .split(',')
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
                .collect(),
            rate_limit_window: Duration::from_millis(parsed(
                "BACKLINKSE_RATE_LIMIT_WINDOW_MS",
                900_000u64,
            )?),
            rate_limit_max: parsed("BACKLINKSE_RATE_LIMIT_MAX_REQUESTS", 100)?,
            trust_proxy: parsed("BACKLINKSE_TRUST_PROXY", false)?,
            data_dir: var("BACKLINKSE_DATA_DIR").map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_names() {
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("Dev".parse::<Environment>().unwrap(), Environment::Development);
        assert!("staging".parse::<Environment>().is_err());
        assert!(!Environment::Test.is_production());
    }

    #[test]
    fn humantime_ttls() {
        assert_eq!(
            humantime::parse_duration("7d").unwrap(),
            Duration::from_secs(7 * 86_400)
        );
        assert_eq!(
            humantime::parse_duration("15m").unwrap(),
            Duration::from_secs(900)
        );
    }
}
