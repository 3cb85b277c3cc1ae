use crate::error::{ApiError, Result};
use std::env;
use std::path::PathBuf;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_ICON_DIR: &str = "icons";

/// Process-wide configuration, built once at startup from environment
/// variables. A missing connection string is a startup fault, not
/// something to recover from per request.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Either a local database file path or a remote libsql:// URL.
    pub database_url: String,
    /// Auth token for remote databases; ignored for local files.
    pub database_auth_token: String,
    /// Directory holding one `<id>.png` per catalog entry.
    pub icon_dir: PathBuf,
    /// Generic icon served when a specific one is missing or empty.
    pub fallback_icon: PathBuf,
    /// Optional absolute prefix for icon_url values. Empty means the
    /// API hands out relative `/icons/<id>.png` paths.
    pub public_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::build(|key| env::var(key).ok())
    }

    fn build(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("APP_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match lookup("APP_PORT") {
            Some(raw) => raw.parse().map_err(|_| {
                ApiError::Config(format!("APP_PORT must be a port number, got '{raw}'"))
            })?,
            None => DEFAULT_PORT,
        };

        let database_url = lookup("DATABASE_URL").ok_or_else(|| {
            ApiError::Config(
                "DATABASE_URL not set (e.g. libsql://catalog.turso.io or ./catalog.db)".to_string(),
            )
        })?;

        let database_auth_token = lookup("DATABASE_AUTH_TOKEN").unwrap_or_default();

        let icon_dir = PathBuf::from(
            lookup("ICON_DIR").unwrap_or_else(|| DEFAULT_ICON_DIR.to_string()),
        );

        let fallback_icon = match lookup("FALLBACK_ICON") {
            Some(path) => PathBuf::from(path),
            None => icon_dir.join("missing.png"),
        };

        let public_base_url = lookup("PUBLIC_BASE_URL").unwrap_or_default();

        Ok(Self {
            host,
            port,
            database_url,
            database_auth_token,
            icon_dir,
            fallback_icon,
            public_base_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn missing_database_url_is_a_config_fault() {
        let err = Config::build(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = Config::build(lookup_from(&[("DATABASE_URL", "./catalog.db")])).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.icon_dir, PathBuf::from("icons"));
        assert_eq!(config.fallback_icon, PathBuf::from("icons/missing.png"));
        assert_eq!(config.public_base_url, "");
    }

    #[test]
    fn fallback_icon_default_follows_custom_icon_dir() {
        let config = Config::build(lookup_from(&[
            ("DATABASE_URL", "./catalog.db"),
            ("ICON_DIR", "/srv/tierlist/icons"),
        ]))
        .unwrap();
        assert_eq!(
            config.fallback_icon,
            PathBuf::from("/srv/tierlist/icons/missing.png")
        );
    }

    #[test]
    fn explicit_settings_win_over_defaults() {
        let config = Config::build(lookup_from(&[
            ("APP_HOST", "127.0.0.1"),
            ("APP_PORT", "9000"),
            ("DATABASE_URL", "libsql://catalog.turso.io"),
            ("DATABASE_AUTH_TOKEN", "secret"),
            ("FALLBACK_ICON", "/tmp/other.png"),
            ("PUBLIC_BASE_URL", "https://tierlist.example.com"),
        ]))
        .unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.database_auth_token, "secret");
        assert_eq!(config.fallback_icon, PathBuf::from("/tmp/other.png"));
        assert_eq!(config.public_base_url, "https://tierlist.example.com");
    }

    #[test]
    fn non_numeric_port_is_rejected() {
        let err = Config::build(lookup_from(&[
            ("APP_PORT", "not-a-port"),
            ("DATABASE_URL", "./catalog.db"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }
}
