use clap::{Parser, ValueEnum};
use lottery_adapters::{
    bootstrap_account_store, AccountStoreConfig, EvmLedgerClient, EvmLedgerConfig,
};
use lottery_core::{ChainAddress, LotteryConfig};
use lottery_service::{build_router, ServiceState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AccountsStoreMode {
    Auto,
    Memory,
    File,
    Postgres,
}

#[derive(Debug, Parser)]
#[command(name = "lotteryd", version, about = "RLUSD lottery confirm-then-commit service")]
struct Cli {
    /// HTTP socket address to bind, e.g. 127.0.0.1:8095
    #[arg(long, default_value = "127.0.0.1:8095")]
    listen: SocketAddr,
    /// Ethereum JSON-RPC endpoint.
    #[arg(long, env = "ETHEREUM_PROVIDER_URL", default_value = "http://127.0.0.1:8545")]
    rpc_url: String,
    /// Lottery contract address. Commands fail with a configuration error while unset.
    #[arg(long, env = "LOTTERY_ADDRESS")]
    lottery_address: Option<String>,
    /// RLUSD token contract address.
    #[arg(long, env = "RLUSD_ADDRESS")]
    token_address: Option<String>,
    /// Seconds to wait for each transaction confirmation.
    #[arg(long, default_value_t = 60)]
    confirmation_timeout_secs: u64,
    /// Seconds an unanswered prompt stays open.
    #[arg(long, default_value_t = 900)]
    prompt_ttl_secs: u64,
    /// Linked-wallet backend. `auto` picks postgres when a database url is configured.
    #[arg(
        long,
        value_enum,
        default_value_t = AccountsStoreMode::Auto,
        env = "LOTTERY_ACCOUNTS_STORE"
    )]
    accounts_store: AccountsStoreMode,
    /// JSON file for the `file` accounts backend.
    #[arg(long, default_value = "data/lottery-accounts.json")]
    accounts_file: PathBuf,
    /// PostgreSQL url for the `postgres` accounts backend.
    #[arg(long, env = "LOTTERY_ACCOUNTS_DATABASE_URL")]
    accounts_database_url: Option<String>,
    /// Max PostgreSQL pool connections for the accounts backend.
    #[arg(long, default_value_t = 5, env = "LOTTERY_ACCOUNTS_PG_MAX_CONNECTIONS")]
    accounts_pg_max_connections: u32,
}

fn resolve_accounts_store(cli: &Cli) -> anyhow::Result<AccountStoreConfig> {
    let resolved_url = cli
        .accounts_database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok());

    let store = match cli.accounts_store {
        AccountsStoreMode::Memory => AccountStoreConfig::Memory,
        AccountsStoreMode::File => AccountStoreConfig::File {
            path: cli.accounts_file.clone(),
        },
        AccountsStoreMode::Postgres => {
            let database_url = resolved_url.ok_or_else(|| {
                anyhow::anyhow!(
                    "accounts_store=postgres requires --accounts-database-url or DATABASE_URL"
                )
            })?;
            AccountStoreConfig::Postgres {
                database_url,
                max_connections: cli.accounts_pg_max_connections,
            }
        }
        AccountsStoreMode::Auto => match resolved_url {
            Some(database_url) => AccountStoreConfig::Postgres {
                database_url,
                max_connections: cli.accounts_pg_max_connections,
            },
            None => AccountStoreConfig::Memory,
        },
    };

    Ok(store)
}

fn resolve_lottery_config(cli: &Cli) -> anyhow::Result<LotteryConfig> {
    let mut config = LotteryConfig::default();
    if let Some(raw) = cli.lottery_address.as_deref() {
        let address = ChainAddress::parse(raw)
            .map_err(|e| anyhow::anyhow!("--lottery-address: {e}"))?;
        config = config.with_lottery_address(address);
    } else {
        warn!("LOTTERY_ADDRESS is not set; lottery commands will be rejected");
    }
    if let Some(raw) = cli.token_address.as_deref() {
        config.token_address =
            ChainAddress::parse(raw).map_err(|e| anyhow::anyhow!("--token-address: {e}"))?;
    }
    config.confirmation_timeout = Duration::from_secs(cli.confirmation_timeout_secs);
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "lottery_service=info,lottery_core=info,info".to_string()
        }))
        .init();

    let cli = Cli::parse();
    let config = resolve_lottery_config(&cli)?;
    let accounts = bootstrap_account_store(resolve_accounts_store(&cli)?).await?;
    let ledger = EvmLedgerClient::new(EvmLedgerConfig::new(cli.rpc_url.clone()))?;
    info!(rpc_url = %ledger.rpc_url(), "ledger client ready");

    let state = ServiceState::new(config, accounts, Arc::new(ledger));
    let app = build_router(state.clone());

    let ttl = Duration::from_secs(cli.prompt_ttl_secs);
    let engine = Arc::clone(&state.engine);
    tokio::spawn(async move {
        let period = ttl.clamp(Duration::from_secs(1), Duration::from_secs(30));
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(err) = engine.sweep_expired(ttl) {
                warn!(error = %err, "prompt sweep failed");
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!("lottery-service listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
