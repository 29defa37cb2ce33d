use crate::{
    binding::FuelSigner,
    wallets::{
        self,
        WalletDescriptor,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use fuels::{
    accounts::ViewOnlyAccount,
    prelude::Provider,
    types::Address,
};
use std::future::Future;

/// A wallet that has authorized this client on a supported network.
#[derive(Clone, Debug)]
pub struct ConnectedWallet<S> {
    pub account: Address,
    pub chain_id: u64,
    pub signer: S,
}

/// Asks a wallet to authorize this client.
pub trait WalletAuthorizer: Clone + Send + Sync + 'static {
    type Signer: Clone + Send + Sync + 'static;

    fn authorize(
        &self,
        password: String,
    ) -> impl Future<Output = Result<ConnectedWallet<Self::Signer>>> + Send;
}

#[derive(Clone, Debug)]
pub struct WalletConnector {
    url: String,
    allowed_chain_ids: Vec<u64>,
    wallet: WalletDescriptor,
}

impl WalletConnector {
    pub fn new(
        url: impl Into<String>,
        allowed_chain_ids: Vec<u64>,
        wallet: WalletDescriptor,
    ) -> Self {
        Self {
            url: url.into(),
            allowed_chain_ids,
            wallet,
        }
    }

    pub fn wallet_name(&self) -> &str {
        &self.wallet.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn connect(&self, password: String) -> Result<ConnectedWallet<FuelSigner>> {
        let provider = Provider::connect(&self.url)
            .await
            .wrap_err_with(|| format!("Failed to connect to provider at {}", self.url))?;
        let consensus_parameters = provider
            .consensus_parameters()
            .await
            .wrap_err("Failed to fetch consensus parameters")?;
        let chain_id = u64::from(consensus_parameters.chain_id());
        ensure_supported_chain(chain_id, &self.allowed_chain_ids)?;

        let wallet = wallets::unlock_wallet(&self.wallet, &password, &provider)?;
        let account: Address = (*wallet.address()).into();
        let base_asset_id = *consensus_parameters.base_asset_id();
        tracing::info!(%account, chain_id, wallet = %self.wallet.name, "wallet connected");

        Ok(ConnectedWallet {
            account,
            chain_id,
            signer: FuelSigner {
                wallet,
                base_asset_id,
            },
        })
    }
}

impl WalletAuthorizer for WalletConnector {
    type Signer = FuelSigner;

    async fn authorize(&self, password: String) -> Result<ConnectedWallet<FuelSigner>> {
        self.connect(password).await
    }
}

pub fn ensure_supported_chain(chain_id: u64, allowed: &[u64]) -> Result<()> {
    if allowed.contains(&chain_id) {
        Ok(())
    } else {
        Err(eyre!(
            "Unsupported network: chain id {chain_id} is not one of {allowed:?}"
        ))
    }
}
