//! brokerauth CLI entry point

mod cli;

use crate::cli::{Cli, Commands};
use anyhow::{Context, Result};
use brokerauth::store::StaticStore;
use brokerauth::{AuthHook, Config, ConnectionId, Denial, PermissionStore};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display()))?,
        None => Config::default(),
    };

    match &cli.command {
        Commands::Brokers => brokers(&config),
        Commands::Users => users(&build_store(&cli, &config)),
        Commands::Table { user, token } => {
            let hook = build_hook(&cli, &config);
            table(&hook, user, token).await
        }
        Commands::Check {
            user,
            token,
            broker,
            publish,
            subscribe,
        } => {
            let hook = build_hook(&cli, &config);
            check(&hook, user, token, broker.as_deref(), publish, subscribe).await
        }
    }
}

fn build_store(cli: &Cli, config: &Config) -> StaticStore {
    let store = if cli.demo {
        StaticStore::demo(&config.broker_addresses())
    } else {
        StaticStore::from_config(config)
    };
    store.with_fetch_delay(Duration::from_millis(cli.fetch_delay_ms))
}

fn build_hook(cli: &Cli, config: &Config) -> AuthHook {
    let store: Arc<dyn PermissionStore> = Arc::new(build_store(cli, config));
    AuthHook::new(config, store)
}

fn brokers(config: &Config) -> Result<()> {
    let addresses = config.broker_addresses();
    if addresses.is_empty() {
        println!("(no brokers configured)");
    }
    for address in addresses {
        println!("{}", address);
    }
    Ok(())
}

fn users(store: &StaticStore) -> Result<()> {
    let names = store.users();
    if names.is_empty() {
        println!("(no users configured)");
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

async fn table(hook: &AuthHook, user: &str, token: &str) -> Result<()> {
    let conn = ConnectionId::generate();
    hook.can_open_session(&conn, user, token)
        .await
        .context("Failed to open session")?;

    let result = hook.manager().authorization_table(&conn).await;
    hook.on_connection_close(&conn);

    let table = result.context("Failed to read authorizations")?;
    println!("{}", serde_json::to_string_pretty(&table)?);
    Ok(())
}

async fn check(
    hook: &AuthHook,
    user: &str,
    token: &str,
    broker: Option<&str>,
    publish: &[String],
    subscribe: &[String],
) -> Result<()> {
    let conn = ConnectionId::generate();

    if let Err(denial) = hook.can_open_session(&conn, user, token).await {
        report("session", user, &Err(denial));
        return Ok(());
    }
    report("session", user, &Ok(()));

    if let Some(broker) = broker {
        report("connect", broker, &hook.can_connect(&conn, broker).await);
    }
    for topic in publish {
        report("publish", topic, &hook.can_publish(&conn, topic).await);
    }
    for filter in subscribe {
        report("subscribe", filter, &hook.can_subscribe(&conn, filter).await);
    }

    hook.on_connection_close(&conn);

    let stats = hook.stats();
    info!(
        fetches = stats.fetches_dispatched,
        failed = stats.fetches_failed,
        "Session finished"
    );
    Ok(())
}

fn report(action: &str, target: &str, result: &Result<(), Denial>) {
    match result {
        Ok(()) => println!("{:<10} {:<32} OK", action, target),
        Err(denial) => println!(
            "{:<10} {:<32} DENIED ({}): {}",
            action,
            target,
            denial.code(),
            denial
        ),
    }
}
