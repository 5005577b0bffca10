mod chat;
mod config;
mod error;
mod provider;
mod store;

use std::io;
use std::path::PathBuf;

use aski_core::Persistence;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::chat::Session;
use crate::config::{config_dir, load_config};
use crate::provider::Client;
use crate::store::{load_session, new_session_name, open_store, seed_graph, validate_session_name};

#[derive(Parser)]
#[command(name = "aski")]
#[command(about = "A small terminal chat client with branchable history", long_about = None)]
struct Cli {
    /// Profile to use, as defined in the config file
    #[arg(short, long, global = true)]
    profile: Option<String>,

    /// Text sent as the first message of the conversation
    #[arg(short, long)]
    content: Option<String>,

    /// Override the profile's system context
    #[arg(short, long)]
    system: Option<String>,

    /// Use the REST API instead of streaming
    #[arg(short, long)]
    rest: bool,

    /// Resume a stored session by name
    #[arg(long)]
    session: Option<String>,

    /// Path to the history store
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List configured profiles
    Profile,
    /// List stored sessions
    Sessions,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config();
    let store_path = config.store_path(cli.store);

    match cli.command {
        Some(Command::Profile) => {
            let selected = config.profile(cli.profile.as_deref())?.name.clone();
            for profile in &config.profiles {
                let mark = if profile.name == selected { "*" } else { " " };
                println!(
                    "{} {:<16} {:<10} {}",
                    mark,
                    profile.name,
                    profile.provider().to_string(),
                    profile.model
                );
            }
            return Ok(());
        }
        Some(Command::Sessions) => {
            let store = open_store(&store_path)?;
            chat::render::sessions(&mut io::stdout(), &store.sessions()?)?;
            return Ok(());
        }
        None => {}
    }

    let profile = config.profile(cli.profile.as_deref())?;
    let client = Client::from_config(&config, profile.provider(), cli.rest)?;

    let store = open_store(&store_path)?;
    let (name, graph) = match cli.session {
        Some(name) => {
            let graph = load_session(&store, &name)?;
            (name, graph)
        }
        None => {
            let name = new_session_name();
            validate_session_name(&name)?;
            (name, seed_graph(profile, cli.system.as_deref())?)
        }
    };

    Session::new(name, graph, profile.params(), store)
        .with_policy(config.on_stream_error)
        .with_config_dir(config_dir())
        .run(&client, cli.content.as_deref())
        .await?;

    Ok(())
}
