//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "brokerauth")]
#[command(about = "Per-user authorization cache for MQTT bridge sessions", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, env = "BROKERAUTH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Use the built-in demo users instead of the [users] tables
    #[arg(long, global = true)]
    pub demo: bool,

    /// Artificial delay for every permission fetch, in milliseconds
    #[arg(long, env = "BROKERAUTH_FETCH_DELAY_MS", default_value_t = 0, global = true)]
    pub fetch_delay_ms: u64,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the configured broker addresses
    Brokers,

    /// List the users the store knows about
    Users,

    /// Print the decision table of a user as JSON
    Table {
        #[arg(short, long)]
        user: String,

        /// Session token
        #[arg(short, long, default_value = "")]
        token: String,
    },

    /// Open a session and run authorization checks against it
    ///
    /// Examples:
    ///   brokerauth --demo check -u user1 -t ikgdfigdfhihdsih --subscribe topics/topic_1
    ///   brokerauth --demo check -u user2 -t slaoejkauekalkew --broker tcp://localhost:1883
    Check {
        #[arg(short, long)]
        user: String,

        /// Session token
        #[arg(short, long, default_value = "")]
        token: String,

        /// Broker address to connect to
        #[arg(short, long)]
        broker: Option<String>,

        /// Topic to publish to (can be repeated)
        #[arg(short, long)]
        publish: Vec<String>,

        /// Topic filter to subscribe to (can be repeated)
        #[arg(short, long)]
        subscribe: Vec<String>,
    },
}
