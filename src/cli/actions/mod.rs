pub mod seed_admin;
pub mod server;

use crate::api::{AppConfig, EmailWorkerConfig};
use secrecy::SecretString;

/// Parsed CLI action, produced by `dispatch::handler`.
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        secret: SecretString,
        config: AppConfig,
        email_config: EmailWorkerConfig,
    },
    SeedAdmin {
        dsn: String,
        email: String,
        password: SecretString,
    },
}
