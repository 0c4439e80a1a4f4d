//! HTTP client for the console.

use crate::APP_USER_AGENT;
use crate::console::session::SessionStore;
use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConsoleAdmin {
    pub id: String,
    pub email: String,
}

#[derive(Serialize, Debug)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize, Debug)]
struct LoginReply {
    token: String,
    admin: ConsoleAdmin,
}

/// Console-side API client.
///
/// Owns the session store: a successful login persists the token, and any
/// observed 401 clears it so the guard resolves to logged-out.
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    session: SessionStore,
}

impl ApiClient {
    /// # Errors
    /// Returns an error when the underlying HTTP client cannot be built.
    pub fn new(base_url: &str, session: SessionStore) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            session,
        })
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Authenticate and persist the returned token.
    ///
    /// # Errors
    /// Returns an error on connection failure, bad credentials, or when the
    /// session file cannot be written.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<ConsoleAdmin> {
        let response = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&LoginBody { email, password })
            .send()
            .await
            .context("Failed to reach the API")?;

        match response.status() {
            StatusCode::OK => {
                let reply: LoginReply = response
                    .json()
                    .await
                    .context("Unexpected login response body")?;
                self.session.save(reply.token)?;
                Ok(reply.admin)
            }
            StatusCode::UNAUTHORIZED => bail!("Invalid email or password."),
            status => bail!("Login failed with status {status}"),
        }
    }

    /// Tell the server goodbye and clear the local session.
    ///
    /// The local session is cleared even when the server call fails; the
    /// token is stateless, so local removal is what actually logs out.
    ///
    /// # Errors
    /// Returns an error when the session file cannot be removed.
    pub async fn logout(&mut self) -> Result<()> {
        if let Some(token) = self.session.token().map(str::to_string) {
            let _ = self
                .http
                .post(self.url("/api/auth/logout"))
                .bearer_auth(token)
                .send()
                .await;
        }
        self.session.clear()
    }

    /// Fetch the identity behind the stored token.
    ///
    /// # Errors
    /// Returns an error when no session exists, the token is rejected, or the
    /// API is unreachable. A 401 clears the session store.
    pub async fn me(&mut self) -> Result<ConsoleAdmin> {
        let Some(token) = self.session.token().map(str::to_string) else {
            // No round-trip needed to know we are logged out.
            return Err(anyhow!("Not logged in."));
        };

        let response = self
            .http
            .get(self.url("/api/auth/me"))
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to reach the API")?;

        match response.status() {
            StatusCode::OK => response
                .json::<ConsoleAdmin>()
                .await
                .context("Unexpected identity response body"),
            StatusCode::UNAUTHORIZED => {
                self.session.clear()?;
                Err(anyhow!("Session expired, log in again."))
            }
            status => Err(anyhow!("Identity request failed with status {status}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn client() -> ApiClient {
        let path = std::env::temp_dir()
            .join(format!("gbexo-console-api-{}", Ulid::new()))
            .join("session.json");
        let session = SessionStore::with_path(PathBuf::from(path));
        ApiClient::new("http://localhost:8080/", session).unwrap()
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = client();
        assert_eq!(client.url("/api/auth/login"), "http://localhost:8080/api/auth/login");
    }

    #[tokio::test]
    async fn me_without_session_needs_no_server() {
        let mut client = client();
        let err = client.me().await.unwrap_err();
        assert_eq!(err.to_string(), "Not logged in.");
    }

    #[tokio::test]
    async fn logout_without_session_is_quiet() -> Result<()> {
        let mut client = client();
        // No token stored, so no request is made and nothing fails.
        client.logout().await
    }
}
