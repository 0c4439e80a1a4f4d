use crate::{
    api,
    api::{AppState, media::LocalMediaStore},
    cli::actions::Action,
};
use anyhow::{Result, anyhow};
use std::sync::Arc;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            secret,
            config,
            email_config,
        } => {
            let media = Arc::new(LocalMediaStore::new(
                config.media_root().clone(),
                config.public_url().to_string(),
            ));
            let state = Arc::new(AppState::new(config, secret, media));

            api::new(port, dsn, state, email_config).await?;

            Ok(())
        }
        Action::SeedAdmin { .. } => Err(anyhow!("unexpected action")),
    }
}
