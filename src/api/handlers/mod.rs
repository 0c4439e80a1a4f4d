//! API handlers and shared utilities.
//!
//! Public content endpoints live next to their admin counterparts, one module
//! per resource. Everything that mutates data calls
//! [`auth::principal::require_admin`] before touching the database.

pub mod announcements;
pub mod auth;
pub mod contact;
pub mod health;
pub mod jobs;
pub mod projects;
pub mod quotes;
pub mod root;
pub mod services;
pub(crate) mod storage;
pub mod team;
pub mod testimonials;
pub mod uploads;

use regex::Regex;

/// Lightweight email sanity check used before persisting submissions.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_email_accepts_simple() {
        assert!(valid_email("devis@gbexo.net"));
    }

    #[test]
    fn valid_email_rejects_missing_at() {
        assert!(!valid_email("devis.gbexo.net"));
    }

    #[test]
    fn valid_email_rejects_spaces() {
        assert!(!valid_email("devis @gbexo.net"));
    }
}
