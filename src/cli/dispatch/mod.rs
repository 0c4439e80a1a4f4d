use crate::{
    api::{AppConfig, EmailWorkerConfig, token::MIN_SECRET_BYTES},
    cli::actions::Action,
};
use anyhow::{Context, Result, anyhow};
use secrecy::SecretString;
use std::path::PathBuf;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some(("server", sub)) => server_action(sub),
        Some(("seed-admin", sub)) => seed_admin_action(sub),
        _ => Err(anyhow!("missing subcommand")),
    }
}

fn server_action(matches: &clap::ArgMatches) -> Result<Action> {
    let secret = required(matches, "token-secret")?;
    // The server never starts with a weak signing secret.
    if secret.len() < MIN_SECRET_BYTES {
        return Err(anyhow!(
            "token secret must be at least {MIN_SECRET_BYTES} bytes, got {}",
            secret.len()
        ));
    }

    let config = AppConfig::new(required(matches, "notify-email")?)
        .with_frontend_url(required(matches, "frontend-url")?)
        .with_public_url(required(matches, "public-url")?)
        .with_media_root(PathBuf::from(required(matches, "media-root")?))
        .with_token_ttl_days(matches.get_one::<i64>("token-ttl-days").copied().unwrap_or(7));

    let email_config = EmailWorkerConfig::new()
        .with_poll_interval_seconds(matches.get_one("outbox-poll-seconds").copied().unwrap_or(5))
        .with_batch_size(matches.get_one("outbox-batch-size").copied().unwrap_or(10))
        .with_max_attempts(matches.get_one("outbox-max-attempts").copied().unwrap_or(5))
        .with_backoff_base_seconds(
            matches
                .get_one("outbox-backoff-base-seconds")
                .copied()
                .unwrap_or(5),
        )
        .with_backoff_max_seconds(
            matches
                .get_one("outbox-backoff-max-seconds")
                .copied()
                .unwrap_or(300),
        );

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: required(matches, "dsn")?,
        secret: SecretString::from(secret),
        config,
        email_config,
    })
}

fn seed_admin_action(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::SeedAdmin {
        dsn: required(matches, "dsn")?,
        email: required(matches, "email")?.trim().to_lowercase(),
        password: SecretString::from(required(matches, "password")?),
    })
}

fn required(matches: &clap::ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .map(String::to_string)
        .with_context(|| format!("missing required argument: --{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn server_action_from_matches() -> Result<()> {
        let matches = commands::new().get_matches_from(vec![
            "gbexo",
            "server",
            "--dsn",
            "postgres://localhost/gbexo",
            "--token-secret",
            SECRET,
            "--notify-email",
            "chantier@gbexo.net",
        ]);

        let action = handler(&matches)?;
        match action {
            Action::Server {
                port,
                dsn,
                secret,
                config,
                ..
            } => {
                assert_eq!(port, 8080);
                assert_eq!(dsn, "postgres://localhost/gbexo");
                assert_eq!(secret.expose_secret(), SECRET);
                assert_eq!(config.notify_email(), "chantier@gbexo.net");
                assert_eq!(config.token_ttl_days(), 7);
            }
            Action::SeedAdmin { .. } => panic!("expected server action"),
        }
        Ok(())
    }

    #[test]
    fn short_secret_is_rejected() {
        let matches = commands::new().get_matches_from(vec![
            "gbexo",
            "server",
            "--dsn",
            "postgres://localhost/gbexo",
            "--token-secret",
            "too-short",
            "--notify-email",
            "chantier@gbexo.net",
        ]);

        assert!(handler(&matches).is_err());
    }

    #[test]
    fn seed_admin_lowercases_email() -> Result<()> {
        let matches = commands::new().get_matches_from(vec![
            "gbexo",
            "seed-admin",
            "--dsn",
            "postgres://localhost/gbexo",
            "--email",
            "Admin@GBEXO.net ",
            "--password",
            "hunter2hunter2",
        ]);

        match handler(&matches)? {
            Action::SeedAdmin { email, .. } => assert_eq!(email, "admin@gbexo.net"),
            Action::Server { .. } => panic!("expected seed-admin action"),
        }
        Ok(())
    }
}
