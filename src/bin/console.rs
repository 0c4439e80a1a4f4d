//! `gbexo-console` — command line admin client.

use anyhow::{Context, Result};
use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};
use gbexo::console::{
    api::ApiClient,
    guard::{self, GuardState},
    session::SessionStore,
};

fn command() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("gbexo-console")
        .about("GBEXO BTP back-office console")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg(
            Arg::new("server")
                .short('s')
                .long("server")
                .help("API base URL")
                .default_value("http://localhost:8080")
                .env("GBEXO_CONSOLE_URL")
                .global(true),
        )
        .subcommand(
            Command::new("login")
                .about("Authenticate and store the session")
                .arg(
                    Arg::new("email")
                        .long("email")
                        .help("Admin email address")
                        .required(true),
                )
                .arg(
                    Arg::new("password")
                        .long("password")
                        .help("Admin password")
                        .env("GBEXO_CONSOLE_PASSWORD")
                        .required(true),
                ),
        )
        .subcommand(Command::new("logout").about("Drop the stored session"))
        .subcommand(Command::new("whoami").about("Show the identity behind the stored session"))
        .subcommand(
            Command::new("status").about("Inspect the stored session without a network call"),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = command().get_matches();
    let server = matches
        .get_one::<String>("server")
        .map(String::to_string)
        .context("missing required argument: --server")?;

    let mut session = SessionStore::new()?;
    session.load()?;

    match matches.subcommand() {
        Some(("login", sub)) => {
            let email = sub
                .get_one::<String>("email")
                .context("missing required argument: --email")?;
            let password = sub
                .get_one::<String>("password")
                .context("missing required argument: --password")?;

            let mut client = ApiClient::new(&server, session)?;
            let admin = client.login(email, password).await?;
            println!("Logged in as {} ({})", admin.email, admin.id);
        }
        Some(("logout", _)) => {
            let mut client = ApiClient::new(&server, session)?;
            client.logout().await?;
            println!("Logged out.");
        }
        Some(("whoami", _)) => {
            let mut client = ApiClient::new(&server, session)?;
            let admin = client.me().await?;
            println!("{} ({})", admin.email, admin.id);
        }
        Some(("status", _)) => match guard::resolve(&session) {
            GuardState::Authenticated(claims) => {
                println!("Logged in as {} until {}", claims.email, claims.exp);
            }
            GuardState::Loading | GuardState::Unauthenticated => println!("Not logged in."),
        },
        _ => unreachable!("subcommand is required"),
    }

    Ok(())
}
