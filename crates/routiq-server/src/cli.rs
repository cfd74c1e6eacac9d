use clap::{Parser, Subcommand};

/// Routiq webhook server - verifies and records identity-provider webhooks
#[derive(Parser, Debug)]
#[command(name = "routiqd")]
#[command(version = routiq_core::VERSION)]
#[command(about = "Routiq webhook receiver daemon", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Default)]
pub enum Commands {
    /// Run server in foreground (default if no command given)
    #[default]
    Run,

    /// Print the headers of a signed test delivery
    Sign {
        /// Raw JSON payload to sign
        #[arg(long)]
        payload: String,

        /// Unix timestamp in seconds (default: now)
        #[arg(long)]
        timestamp: Option<i64>,

        /// Delivery id (default: a fresh msg_<ulid>)
        #[arg(long)]
        id: Option<String>,

        /// Signing secret
        #[arg(long, env = "CLERK_WEBHOOK_SECRET", hide_env_values = true)]
        secret: String,
    },

    /// Generate a new whsec_ signing secret
    GenerateSecret,
}
