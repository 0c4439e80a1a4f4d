//! # GBEXO BTP website API and back-office
//!
//! `gbexo` is the backend for the GBEXO BTP marketing site and its admin
//! back-office. The public surface serves the company's content (projects,
//! services, team, testimonials, job postings, announcements) and accepts
//! quote requests and contact messages. The admin surface manages that
//! content and the submission inboxes.
//!
//! ## Authentication
//!
//! Administrators authenticate with email and password (`bcrypt` hashes at
//! rest) and receive a signed HS256 token valid for seven days. Every admin
//! endpoint re-verifies the token signature and expiry on each request; the
//! console's route guard only inspects the token structurally and is never
//! an authorization boundary.
//!
//! ## Notifications
//!
//! Quote and contact submissions enqueue rows in `email_outbox` within the
//! same transaction as the insert. A background worker drains the outbox and
//! retries failures with exponential backoff.

pub mod api;
pub mod cli;
pub mod console;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        // Should be a hex string (full SHA-1 is 40 chars, but could be short)
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
