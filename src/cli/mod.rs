use std::path::PathBuf;

use clap::{Parser, Subcommand};

use agora::config::{default_config_path, AgoraConfig};
use agora::session::Session;

pub mod assert;
pub mod draft;
pub mod enroll;
pub mod polls;
pub mod results;
pub mod status;
pub mod version;
pub mod vote;
pub mod watch;

#[derive(Parser)]
#[command(name = "agora")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Client for the Agora governance Exchange", long_about = None)]
pub struct Cli {
    /// Path to config file (default: platform data dir, created on first run)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create this device's identity via the proof-of-work challenge
    Enroll {
        /// Preferred public alias (the Exchange may assign its own)
        #[arg(long)]
        alias: Option<String>,

        /// Replace an existing identity (orphans everything the old key signed)
        #[arg(long)]
        replace: bool,
    },

    /// Show Exchange liveness, identity, and stamp reserve
    Status,

    /// List polls: local drafts first, then the remote index
    Polls,

    /// Create a local draft poll
    Draft {
        /// Poll title
        title: String,

        /// An option label; repeat for each option
        #[arg(long = "option", required = true)]
        options: Vec<String>,

        /// Longer description
        #[arg(long)]
        description: Option<String>,

        /// Poll type understood by the Exchange
        #[arg(long, default_value = "single")]
        poll_type: String,
    },

    /// Cast a vote on a poll (draft or remote)
    Vote {
        /// Draft id or remote poll id
        poll_id: String,

        /// Option label (or option id on remote polls)
        choice: String,
    },

    /// Assert a draft: promote it to a live poll on the Exchange
    Assert {
        /// Draft id to promote
        poll_id: String,
    },

    /// Show current results for a poll
    Results {
        /// Draft id or remote poll id
        poll_id: String,
    },

    /// Follow a remote poll's live result stream until it closes
    Watch {
        /// Remote poll id
        poll_id: String,
    },

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Commands::Version = cli.command {
        version::execute();
        return Ok(());
    }

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let config = AgoraConfig::load_or_create(&config_path)?;
    init_logging(&config.logging.level);

    let session = Session::open(config)?;

    match cli.command {
        Commands::Enroll { alias, replace } => enroll::execute(&session, alias, replace).await,
        Commands::Status => status::execute(&session).await,
        Commands::Polls => polls::execute(&session).await,
        Commands::Draft {
            title,
            options,
            description,
            poll_type,
        } => draft::execute(&session, title, options, description, poll_type).await,
        Commands::Vote { poll_id, choice } => vote::execute(&session, poll_id, choice).await,
        Commands::Assert { poll_id } => assert::execute(&session, poll_id).await,
        Commands::Results { poll_id } => results::execute(&session, poll_id).await,
        Commands::Watch { poll_id } => watch::execute(&session, poll_id).await,
        Commands::Version => unreachable!("handled above"),
    }
}

fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    // RUST_LOG wins over the config file when set.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_enroll() {
        let cli = Cli::parse_from(["agora", "enroll", "--alias", "kit"]);
        match cli.command {
            Commands::Enroll { alias, replace } => {
                assert_eq!(alias.as_deref(), Some("kit"));
                assert!(!replace);
            }
            _ => panic!("expected enroll"),
        }
    }

    #[test]
    fn parse_draft_with_options() {
        let cli = Cli::parse_from([
            "agora", "draft", "Lunch?", "--option", "Pizza", "--option", "Tacos",
        ]);
        match cli.command {
            Commands::Draft { title, options, .. } => {
                assert_eq!(title, "Lunch?");
                assert_eq!(options, vec!["Pizza", "Tacos"]);
            }
            _ => panic!("expected draft"),
        }
    }

    #[test]
    fn parse_vote() {
        let cli = Cli::parse_from(["agora", "vote", "poll-1", "Tacos"]);
        match cli.command {
            Commands::Vote { poll_id, choice } => {
                assert_eq!(poll_id, "poll-1");
                assert_eq!(choice, "Tacos");
            }
            _ => panic!("expected vote"),
        }
    }
}
