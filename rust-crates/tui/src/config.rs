use crate::{
    units::{
        DEFAULT_DECIMALS,
        MAX_DECIMALS,
    },
    wallets::{
        self,
        WalletDescriptor,
    },
};
use clap::{
    ArgGroup,
    Parser,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use deployments::{
    DeploymentEnv,
    DeploymentRecord,
    DeploymentStore,
};
use fuels::{
    prelude::Provider,
    types::ContractId,
};
use std::{
    path::PathBuf,
    str::FromStr,
};

pub const DEFAULT_TESTNET_RPC_URL: &str = "https://testnet.fuel.network";
pub const DEFAULT_DEVNET_RPC_URL: &str = "https://devnet.fuel.network";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://localhost:4000/";

#[derive(Parser, Debug)]
#[command(
    name = "higher-lower",
    about = "Play higher/lower against the on-chain game contract",
    version,
    group(
        ArgGroup::new("network")
            .args(["devnet", "testnet", "local"])
            .required(true)
    )
)]
pub struct Args {
    /// Connect to Fuel devnet
    #[arg(long)]
    pub devnet: bool,

    /// Connect to Fuel testnet
    #[arg(long)]
    pub testnet: bool,

    /// Connect to a local Fuel node
    #[arg(long)]
    pub local: bool,

    /// Override the RPC URL for the selected network
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// forc-wallet profile name
    #[arg(long)]
    pub wallet: String,

    /// Override forc-wallet directory (defaults to ~/.fuel/wallets)
    #[arg(long)]
    pub wallet_dir: Option<String>,

    /// Game contract address (defaults to the recorded deployment)
    #[arg(long)]
    pub contract_id: Option<String>,

    /// Write --contract-id to the deployment record for the selected network
    #[arg(long, requires = "contract_id")]
    pub remember: bool,

    /// Chain id the wallet may connect to; repeat to allow several
    #[arg(long = "chain-id", default_values_t = [0u64])]
    pub chain_ids: Vec<u64>,

    /// Decimals of the base asset, used for wagers
    #[arg(
        long,
        default_value_t = DEFAULT_DECIMALS,
        value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_DECIMALS))
    )]
    pub decimals: u32,

    /// Directory for the rolling log file
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkTarget {
    Testnet { url: String },
    Devnet { url: String },
    LocalNode { url: String },
}

impl NetworkTarget {
    pub fn url(&self) -> &str {
        match self {
            NetworkTarget::Testnet { url }
            | NetworkTarget::Devnet { url }
            | NetworkTarget::LocalNode { url } => url,
        }
    }

    pub fn deployment_env(&self) -> DeploymentEnv {
        match self {
            NetworkTarget::Testnet { .. } => DeploymentEnv::Test,
            NetworkTarget::Devnet { .. } => DeploymentEnv::Dev,
            NetworkTarget::LocalNode { .. } => DeploymentEnv::Local,
        }
    }
}

/// The game contract to bind and the first block that can hold its rounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContractTarget {
    pub contract_id: ContractId,
    pub start_height: u32,
}

impl ContractTarget {
    /// A contract whose deployment block is unknown; history is read from genesis.
    pub fn from_genesis(contract_id: ContractId) -> Self {
        Self {
            contract_id,
            start_height: 0,
        }
    }

    fn from_record(contract_id: ContractId, record: &DeploymentRecord) -> Result<Self> {
        let start_height = match record.deployment_block_height {
            Some(height) => u32::try_from(height).map_err(|_| {
                eyre!("recorded deployment block height {height} is out of range")
            })?,
            None => 0,
        };
        Ok(Self {
            contract_id,
            start_height,
        })
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: NetworkTarget,
    pub wallet: WalletDescriptor,
    pub contract: Option<ContractTarget>,
    pub allowed_chain_ids: Vec<u64>,
    pub decimals: u32,
}

impl Args {
    pub fn network(&self) -> NetworkTarget {
        let custom = self.rpc_url.clone();
        if self.devnet {
            NetworkTarget::Devnet {
                url: custom.unwrap_or_else(|| DEFAULT_DEVNET_RPC_URL.to_string()),
            }
        } else if self.testnet {
            NetworkTarget::Testnet {
                url: custom.unwrap_or_else(|| DEFAULT_TESTNET_RPC_URL.to_string()),
            }
        } else {
            NetworkTarget::LocalNode {
                url: custom.unwrap_or_else(|| DEFAULT_LOCAL_RPC_URL.to_string()),
            }
        }
    }

    /// Locates the wallet keystore. A missing keystore is not fatal here; it
    /// surfaces as a failed connection attempt.
    pub fn wallet_descriptor(&self) -> Result<WalletDescriptor> {
        let dir = wallets::resolve_wallet_dir(self.wallet_dir.as_deref())?;
        match wallets::find_wallet(&dir, &self.wallet) {
            Ok(descriptor) => Ok(descriptor),
            Err(err) => {
                tracing::warn!(error = %err, "wallet keystore not found");
                let path = dir.join(format!("{}.wallet", self.wallet));
                Ok(WalletDescriptor::new(self.wallet.clone(), path))
            }
        }
    }
}

pub fn parse_contract_id(raw: &str) -> Result<ContractId> {
    let trimmed = raw.trim();
    let prefixed = if trimmed.starts_with("0x") {
        trimmed.to_string()
    } else {
        format!("0x{trimmed}")
    };
    ContractId::from_str(&prefixed).map_err(|e| eyre!("Invalid contract id '{raw}': {e}"))
}

/// Current chain height, recorded with `--remember` as the point history
/// scans start from.
pub async fn current_block_height(network: &NetworkTarget) -> Result<u32> {
    let provider = Provider::connect(network.url())
        .await
        .wrap_err_with(|| format!("Failed to connect to provider at {}", network.url()))?;
    provider
        .latest_block_height()
        .await
        .wrap_err("Failed to fetch latest block height")
}

/// Picks the contract: an explicit address wins; otherwise the recorded
/// deployment is used, provided it was made with the interface compiled into
/// this binary. `current_height` is only consulted when `--remember` records
/// a new deployment.
pub fn resolve_contract_id(
    args: &Args,
    network: &NetworkTarget,
    store: &DeploymentStore,
    abi_hash: &str,
    current_height: Option<u32>,
) -> Result<Option<ContractTarget>> {
    if let Some(raw) = args.contract_id.as_deref() {
        let contract_id = parse_contract_id(raw)?;
        if args.remember {
            let record = deployments::record_deployment(
                store,
                format!("0x{}", hex::encode(contract_id)),
                network.url(),
                abi_hash,
                current_height.map(u64::from),
            )
            .map_err(|e| eyre!(e))
            .wrap_err("recording deployment")?;
            tracing::info!(
                contract = %record.contract_id,
                block = ?record.deployment_block_height,
                path = %store.path().display(),
                "deployment recorded"
            );
            return ContractTarget::from_record(contract_id, &record).map(Some);
        }
        // a record of this very contract still knows where its history starts
        let recorded = store.load().map_err(|e| eyre!(e))?.filter(|record| {
            parse_contract_id(&record.contract_id).is_ok_and(|id| id == contract_id)
        });
        return match recorded {
            Some(record) => ContractTarget::from_record(contract_id, &record).map(Some),
            None => Ok(Some(ContractTarget::from_genesis(contract_id))),
        };
    }

    let record = store.load().map_err(|e| eyre!(e))?;
    match record {
        None => {
            tracing::warn!(env = %network.deployment_env(), "no contract configured");
            Ok(None)
        }
        Some(record) if record.is_compatible_with_hash(abi_hash) => {
            let contract_id = parse_contract_id(&record.contract_id)?;
            ContractTarget::from_record(contract_id, &record).map(Some)
        }
        Some(record) => Err(eyre!(format_deployment_summary(
            network,
            store,
            &record,
            abi_hash,
        ))),
    }
}

fn format_deployment_summary(
    network: &NetworkTarget,
    store: &DeploymentStore,
    record: &DeploymentRecord,
    current_hash: &str,
) -> String {
    let env = network.deployment_env();
    let mut message = format!(
        "No compatible deployment recorded for {env} at {}.\n\nRecorded deployment for {env}:",
        network.url()
    );
    let block = record
        .deployment_block_height
        .map(|h| format!(" block {h}"))
        .unwrap_or_default();
    message.push_str(&format!(
        "\n  {} - {} @ {} (abi {}){}",
        record.deployed_at,
        record.contract_id,
        record.network_url,
        hash_preview(&record.abi_hash),
        block,
    ));
    message.push_str(&format!(
        "\n\nCurrent interface hash: {}",
        hash_preview(current_hash)
    ));
    message.push_str(&format!(
        "\nDeployment records file: {}",
        store.path().display()
    ));
    message.push_str(
        "\n\nRun again with --contract-id <id> --remember to record a compatible deployment.",
    );
    message
}

fn hash_preview(hash: &str) -> String {
    let preview: String = hash.chars().take(16).collect();
    if hash.chars().count() > 16 {
        format!("{preview}...")
    } else {
        preview
    }
}

impl AppConfig {
    pub fn new(
        args: &Args,
        store: &DeploymentStore,
        current_height: Option<u32>,
    ) -> Result<Self> {
        let network = args.network();
        let contract = resolve_contract_id(
            args,
            &network,
            store,
            &generated_abi::abi_hash(),
            current_height,
        )?;
        Ok(Self {
            wallet: args.wallet_descriptor()?,
            contract,
            allowed_chain_ids: args.chain_ids.clone(),
            decimals: args.decimals,
            network,
        })
    }
}
