use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub chain: ChainDetails,
    pub contracts: ContractConfig,
    pub gas: GasConfig,
    pub signers: SignerConfig,
    pub assets: AssetConfig,
    pub receipts: ReceiptConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainDetails {
    pub rpc_url: String,
    pub chain_id: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContractConfig {
    pub lending_pool: String,
    #[serde(default)]
    pub trust_mint_sbt: Option<String>,
    #[serde(default)]
    pub asset_token: Option<String>,
    #[serde(default)]
    pub lending_pool_abi_path: Option<String>,
    #[serde(default)]
    pub trust_mint_sbt_abi_path: Option<String>,
    #[serde(default)]
    pub asset_token_abi_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GasConfig {
    pub default_gas_limit: u64,
    /// Legacy gas price in gwei. When unset the price is read from the node per call.
    #[serde(default)]
    pub gas_price_gwei: Option<String>,
    /// EIP-1559 fields in gwei; both must be set to take effect.
    #[serde(default)]
    pub max_fee_gwei: Option<String>,
    #[serde(default)]
    pub max_priority_fee_gwei: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SignerConfig {
    /// Default signing key, used for the Owner role when no owner key is set.
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub owner_private_key: Option<String>,
    #[serde(default)]
    pub lender_private_key: Option<String>,
    #[serde(default)]
    pub borrower_private_key: Option<String>,
    #[serde(default)]
    pub owner_address: Option<String>,
    #[serde(default)]
    pub lender_address: Option<String>,
    #[serde(default)]
    pub borrower_address: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssetConfig {
    pub token_decimals: u8,
    pub native_decimals: u8,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReceiptConfig {
    /// How long a local dispatch waits for inclusion after broadcast. Zero skips the wait.
    pub wait_after_send_seconds: u64,
    pub poll_interval_millis: u64,
    /// Upper bound accepted from callers of the receipt endpoint.
    pub max_wait_seconds: u64,
}

impl AppConfig {
    pub async fn load() -> Result<Self> {
        tracing::info!("Loading configuration...");

        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("POOL_CONSOLE").separator("__"))
            .build()?;

        let mut config: AppConfig = match settings.try_deserialize() {
            Ok(config) => {
                tracing::info!("Configuration loaded from file/environment");
                config
            }
            Err(e) => {
                tracing::warn!("Could not load configuration from file/environment ({}), using defaults", e);
                AppConfig::default()
            }
        };

        config.apply_env_overrides()?;

        tracing::info!("Final configuration:");
        tracing::info!("  Server: {}:{}", config.server.host, config.server.port);
        tracing::info!("  RPC: {} (chain {})", config.chain.rpc_url, config.chain.chain_id);
        tracing::info!("  LendingPool: {}", config.contracts.lending_pool);
        tracing::info!("  TrustMint SBT: {:?}", config.contracts.trust_mint_sbt);
        tracing::info!("  Default gas limit: {}", config.gas.default_gas_limit);
        tracing::info!(
            "  Signing keys configured: default={} owner={} lender={} borrower={}",
            config.signers.private_key.is_some(),
            config.signers.owner_private_key.is_some(),
            config.signers.lender_private_key.is_some(),
            config.signers.borrower_private_key.is_some()
        );

        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(rpc_url) = env_value("ARC_RPC_URL") {
            self.chain.rpc_url = rpc_url;
        }

        if let Some(raw) = env_value("ARC_CHAIN_ID") {
            self.chain.chain_id = parse_chain_id(&raw)
                .ok_or_else(|| anyhow::anyhow!("ARC_CHAIN_ID is not a decimal or hex chain id: {}", raw))?;
        }

        if let Some(address) = env_value("LENDING_POOL_ADDRESS") {
            self.contracts.lending_pool = address;
        }
        if let Some(address) = env_value("TRUSTMINT_SBT_ADDRESS") {
            self.contracts.trust_mint_sbt = Some(address);
        }
        if let Some(address) = env_value("ASSET_TOKEN_ADDRESS") {
            self.contracts.asset_token = Some(address);
        }
        if let Some(path) = env_value("LENDING_POOL_ABI_PATH") {
            self.contracts.lending_pool_abi_path = Some(path);
        }
        if let Some(path) = env_value("TRUSTMINT_SBT_ABI_PATH") {
            self.contracts.trust_mint_sbt_abi_path = Some(path);
        }

        if let Some(limit) = env_value("DEFAULT_GAS_LIMIT") {
            self.gas.default_gas_limit = limit
                .parse()
                .map_err(|e| anyhow::anyhow!("DEFAULT_GAS_LIMIT is not an integer: {}", e))?;
        }
        if let Some(price) = env_value("GAS_PRICE_GWEI") {
            self.gas.gas_price_gwei = Some(price);
        }

        if let Some(key) = env_value("PRIVATE_KEY") {
            self.signers.private_key = Some(key);
        }
        if let Some(key) = env_value("OWNER_PRIVATE_KEY") {
            self.signers.owner_private_key = Some(key);
        }
        if let Some(key) = env_value("LENDER_PRIVATE_KEY") {
            self.signers.lender_private_key = Some(key);
        }
        if let Some(key) = env_value("BORROWER_PRIVATE_KEY") {
            self.signers.borrower_private_key = Some(key);
        }

        if let Some(decimals) = env_value("TOKEN_DECIMALS") {
            self.assets.token_decimals = decimals
                .parse()
                .map_err(|e| anyhow::anyhow!("TOKEN_DECIMALS is not an integer: {}", e))?;
        }
        if let Some(decimals) = env_value("NATIVE_DECIMALS") {
            self.assets.native_decimals = decimals
                .parse()
                .map_err(|e| anyhow::anyhow!("NATIVE_DECIMALS is not an integer: {}", e))?;
        }

        Ok(())
    }
}

/// Non-empty environment value.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Accepts `5042002` as well as `0x4cef52`.
pub fn parse_chain_id(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex_digits) => u64::from_str_radix(hex_digits, 16).ok(),
        None => raw.parse().ok(),
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            chain: ChainDetails {
                rpc_url: "https://rpc.testnet.arc.network".to_string(),
                chain_id: 5042002,
            },
            contracts: ContractConfig {
                lending_pool: "0x0000000000000000000000000000000000000000".to_string(),
                trust_mint_sbt: None,
                asset_token: None,
                lending_pool_abi_path: None,
                trust_mint_sbt_abi_path: None,
                asset_token_abi_path: None,
            },
            gas: GasConfig {
                default_gas_limit: 300_000,
                gas_price_gwei: None,
                max_fee_gwei: None,
                max_priority_fee_gwei: None,
            },
            signers: SignerConfig::default(),
            assets: AssetConfig {
                token_decimals: 6,
                native_decimals: 18,
            },
            receipts: ReceiptConfig {
                wait_after_send_seconds: 0,
                poll_interval_millis: 1_000,
                max_wait_seconds: 120,
            },
        }
    }
}
