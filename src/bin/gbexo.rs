use anyhow::Result;
use gbexo::cli::{actions, actions::Action, start};

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    // Start the program
    let action = start()?;

    // Handle the action
    match action {
        Action::Server { .. } => actions::server::handle(action).await?,
        Action::SeedAdmin { .. } => actions::seed_admin::handle(action).await?,
    }

    Ok(())
}
