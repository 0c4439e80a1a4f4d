//! Server configuration and shared request state.

use crate::api::{
    media::MediaStore,
    token::{DEFAULT_TOKEN_TTL_DAYS, TokenCodec},
};
use secrecy::SecretString;
use std::{path::PathBuf, sync::Arc};

const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:8080";
const DEFAULT_MEDIA_ROOT: &str = "./media";

#[derive(Clone, Debug)]
pub struct AppConfig {
    frontend_url: String,
    public_url: String,
    media_root: PathBuf,
    notify_email: String,
    token_ttl_days: i64,
}

impl AppConfig {
    #[must_use]
    pub fn new(notify_email: String) -> Self {
        Self {
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            media_root: PathBuf::from(DEFAULT_MEDIA_ROOT),
            notify_email,
            token_ttl_days: DEFAULT_TOKEN_TTL_DAYS,
        }
    }

    #[must_use]
    pub fn with_frontend_url(mut self, url: String) -> Self {
        self.frontend_url = url;
        self
    }

    #[must_use]
    pub fn with_public_url(mut self, url: String) -> Self {
        // A trailing slash would double up when media keys are appended.
        self.public_url = url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_media_root(mut self, root: PathBuf) -> Self {
        self.media_root = root;
        self
    }

    #[must_use]
    pub fn with_token_ttl_days(mut self, days: i64) -> Self {
        self.token_ttl_days = days;
        self
    }

    #[must_use]
    pub fn frontend_url(&self) -> &str {
        &self.frontend_url
    }

    #[must_use]
    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    #[must_use]
    pub fn media_root(&self) -> &PathBuf {
        &self.media_root
    }

    #[must_use]
    pub fn notify_email(&self) -> &str {
        &self.notify_email
    }

    #[must_use]
    pub fn token_ttl_days(&self) -> i64 {
        self.token_ttl_days
    }
}

/// Shared state handed to handlers via `Extension<Arc<AppState>>`.
///
/// The token codec and media store live here so every handler verifies
/// against the same secret and writes through the same backend.
pub struct AppState {
    config: AppConfig,
    codec: TokenCodec,
    media: Arc<dyn MediaStore>,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, secret: SecretString, media: Arc<dyn MediaStore>) -> Self {
        let codec = TokenCodec::new(secret, config.token_ttl_days());
        Self {
            config,
            codec,
            media,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    #[must_use]
    pub fn media(&self) -> &Arc<dyn MediaStore> {
        &self.media
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::media::LocalMediaStore;

    fn state() -> AppState {
        let config = AppConfig::new("chantier@gbexo.net".to_string())
            .with_public_url("https://gbexo.net/".to_string());
        let media = Arc::new(LocalMediaStore::new(
            config.media_root().clone(),
            config.public_url().to_string(),
        ));
        AppState::new(
            config,
            SecretString::from("0123456789abcdef0123456789abcdef".to_string()),
            media,
        )
    }

    #[test]
    fn public_url_drops_trailing_slash() {
        let state = state();
        assert_eq!(state.config().public_url(), "https://gbexo.net");
    }

    #[test]
    fn defaults_match_local_dev() {
        let config = AppConfig::new("chantier@gbexo.net".to_string());
        assert_eq!(config.frontend_url(), "http://localhost:5173");
        assert_eq!(config.token_ttl_days(), 7);
        assert_eq!(config.media_root(), &PathBuf::from("./media"));
    }
}
