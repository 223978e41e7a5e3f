use anyhow::{bail, Context};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetConfig {
    pub ttl_minutes: i64,
    /// Log freshly issued reset tokens. Development stand-in for mail delivery.
    pub log_tokens: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub reset: ResetConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. The signing secret has no fallback:
    /// a missing or empty `JWT_SECRET` fails startup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        let secret = lookup("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }

        let jwt = JwtConfig {
            secret,
            ttl_minutes: parse_or(&lookup, "JWT_TTL_MINUTES", 60 * 24),
        };
        let reset = ResetConfig {
            ttl_minutes: parse_or(&lookup, "RESET_TOKEN_TTL_MINUTES", 60),
            log_tokens: lookup("RESET_TOKEN_LOG")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        };
        Ok(Self {
            database_url,
            jwt,
            reset,
        })
    }
}

fn parse_or<F>(lookup: &F, key: &str, default: i64) -> i64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_keys_missing() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/tips"),
            ("JWT_SECRET", "s3cret"),
        ]))
        .expect("config should load");
        assert_eq!(cfg.jwt.ttl_minutes, 1440);
        assert_eq!(cfg.reset.ttl_minutes, 60);
        assert!(!cfg.reset.log_tokens);
    }

    #[test]
    fn missing_secret_fails() {
        let err = AppConfig::from_lookup(lookup_from(&[(
            "DATABASE_URL",
            "postgres://localhost/tips",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn blank_secret_fails() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/tips"),
            ("JWT_SECRET", "   "),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn garbage_ttl_falls_back_to_default() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/tips"),
            ("JWT_SECRET", "s3cret"),
            ("JWT_TTL_MINUTES", "soon"),
            ("RESET_TOKEN_TTL_MINUTES", "15"),
            ("RESET_TOKEN_LOG", "true"),
        ]))
        .expect("config should load");
        assert_eq!(cfg.jwt.ttl_minutes, 1440);
        assert_eq!(cfg.reset.ttl_minutes, 15);
        assert!(cfg.reset.log_tokens);
    }
}
