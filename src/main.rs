mod config;
mod server;
mod models;
mod services;
mod contracts;
mod storage;
mod handlers;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::contracts::abi::AbiRegistry;
use crate::contracts::encoding::AlloyEncoder;
use crate::contracts::execution::AlloyExecutor;
use crate::server::ConsoleServer;
use crate::services::{LendingPoolTools, PoolContracts, ReceiptPolicy, ToolRegistry, TransactionDispatcher};
use crate::storage::memory::MemoryStorage;

#[actix_web::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Lending Pool Console");

    let config = AppConfig::load().await?;
    info!("Configuration loaded successfully");

    let abis = AbiRegistry::from_config(&config.contracts)?;
    let encoder = Arc::new(AlloyEncoder::new(Arc::new(abis)));
    let engine = Arc::new(AlloyExecutor::new(&config.chain)?);

    let dispatcher = Arc::new(TransactionDispatcher::new(
        engine,
        encoder,
        config.chain.chain_id,
        ReceiptPolicy::from_config(&config.receipts),
    ));

    let contracts = PoolContracts::from_config(&config)?;
    let tools = Arc::new(LendingPoolTools::new(
        dispatcher.clone(),
        contracts,
        config.gas.clone(),
        config.assets.clone(),
    ));
    let registry = Arc::new(ToolRegistry::new(tools));
    info!("{} tools registered", registry.definitions().len());

    let storage = MemoryStorage::new();
    info!("Storage initialized");

    let server = ConsoleServer::new(storage, dispatcher, registry, config.clone());
    server.run().await?;

    Ok(())
}
