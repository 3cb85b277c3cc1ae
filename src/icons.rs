use crate::config::Config;
use crate::error::{ApiError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Build the icon URL handed out with every listing entry. Pure
/// function of the identifier and the configured base; no I/O.
pub fn icon_url(public_base_url: &str, id: i64) -> String {
    format!("{}/icons/{}.png", public_base_url.trim_end_matches('/'), id)
}

/// Locates per-monster icon files on the content store and falls back
/// to a generic image when a specific one is missing or empty.
pub struct IconResolver {
    icon_dir: PathBuf,
    fallback_icon: PathBuf,
}

impl IconResolver {
    pub fn new(icon_dir: impl Into<PathBuf>, fallback_icon: impl Into<PathBuf>) -> Self {
        Self {
            icon_dir: icon_dir.into(),
            fallback_icon: fallback_icon.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.icon_dir, &config.fallback_icon)
    }

    pub fn icon_path(&self, id: i64) -> PathBuf {
        self.icon_dir.join(format!("{id}.png"))
    }

    /// Resolve the icon for a catalog identifier, first match wins:
    /// the specific file when it exists with non-zero size (zero-byte
    /// placeholders from an incomplete asset sync are treated as
    /// missing), then the fallback icon, then a not-found failure.
    pub async fn resolve(&self, id: i64) -> Result<Vec<u8>> {
        let path = self.icon_path(id);

        if file_has_content(&path).await {
            debug!("Serving icon {}", path.display());
            return Ok(fs::read(&path).await?);
        }

        if fs::metadata(&self.fallback_icon).await.is_ok() {
            debug!("Serving fallback icon for monster {}", id);
            return Ok(fs::read(&self.fallback_icon).await?);
        }

        warn!(
            "No icon for monster {} and no fallback at {}",
            id,
            self.fallback_icon.display()
        );
        Err(ApiError::IconNotFound)
    }
}

async fn file_has_content(path: &Path) -> bool {
    match fs::metadata(path).await {
        Ok(meta) => meta.len() > 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icon_url_without_base_is_a_relative_path() {
        assert_eq!(icon_url("", 123), "/icons/123.png");
    }

    #[test]
    fn icon_url_prefixes_the_configured_base() {
        assert_eq!(
            icon_url("https://tierlist.example.com", 123),
            "https://tierlist.example.com/icons/123.png"
        );
    }

    #[test]
    fn icon_url_tolerates_a_trailing_slash_on_the_base() {
        assert_eq!(
            icon_url("https://tierlist.example.com/", 7),
            "https://tierlist.example.com/icons/7.png"
        );
    }
}
