//! Wallet and contract capability sets over a JSON-RPC endpoint.
//!
//! The endpoint plays the part of the wallet: accounts come from `eth_accounts` /
//! `eth_requestAccounts` and waves are sent with `eth_sendTransaction` from the bound account, so
//! the node (or the wallet behind it) does the signing.

use std::sync::Arc;

use alloy_primitives::{Address, TxHash, U256};
use alloy_provider::{
    DynProvider, PendingTransactionBuilder, PendingTransactionError, Provider, ProviderBuilder,
};
use alloy_sol_types::{SolEvent, sol};
use alloy_transport::TransportError;
use async_trait::async_trait;
use futures::StreamExt;

use crate::{
    config::WavePortalConfig,
    contract::{ContractBinder, RawWave, WaveContract, WaveReceipt, WaveStream},
    error::{ProviderError, USER_REJECTED_CODE},
    provider::{AccountsRequest, WalletProvider},
};

sol! {
    #[sol(rpc)]
    interface IWavePortal {
        struct Wave {
            address waver;
            string message;
            uint256 timestamp;
        }

        event NewWave(address indexed from, uint256 timestamp, string message);

        function wave(string memory _message) external;
        function getAllWaves() external view returns (Wave[] memory);
        function getTotalWaves() external view returns (uint256);
    }
}

/// Connects to `config.rpc_url` over HTTP.
pub fn connect_http(config: &WavePortalConfig) -> Result<DynProvider, ProviderError> {
    let url = config.rpc_url.parse().map_err(|err| {
        ProviderError::Transport(format!("invalid rpc url {:?}: {err}", config.rpc_url))
    })?;
    let provider = ProviderBuilder::new().connect_http(url);
    provider.client().set_poll_interval(config.poll_interval());
    Ok(provider.erased())
}

/// Wallet provider backed by the accounts a JSON-RPC endpoint exposes.
#[derive(Clone, Debug, Default)]
pub struct RpcWalletProvider {
    provider: Option<DynProvider>,
}

impl RpcWalletProvider {
    pub fn new(provider: DynProvider) -> Self {
        Self { provider: Some(provider) }
    }
}

#[async_trait]
impl WalletProvider for RpcWalletProvider {
    fn is_present(&self) -> bool {
        self.provider.is_some()
    }

    async fn request_accounts(&self, mode: AccountsRequest) -> Result<Vec<Address>, ProviderError> {
        let provider = self.provider.as_ref().ok_or(ProviderError::Unavailable)?;
        let params: [(); 0] = [];
        provider
            .raw_request::<_, Vec<Address>>(mode.method().into(), params)
            .await
            .map_err(rpc_error)
    }
}

/// Builds [`RpcWaveContract`]s for one deployment.
#[derive(Clone, Debug)]
pub struct RpcContractBinder {
    provider: DynProvider,
    address: Address,
    confirmations: u64,
}

impl RpcContractBinder {
    pub fn new(provider: DynProvider, config: &WavePortalConfig) -> Self {
        Self { provider, address: config.contract_address, confirmations: config.confirmations }
    }
}

impl ContractBinder for RpcContractBinder {
    fn bind(&self, account: Address) -> Arc<dyn WaveContract> {
        Arc::new(RpcWaveContract {
            provider: self.provider.clone(),
            address: self.address,
            account,
            confirmations: self.confirmations,
        })
    }
}

/// A WavePortal deployment reached over JSON-RPC, sending from `account`.
#[derive(Clone, Debug)]
pub struct RpcWaveContract {
    provider: DynProvider,
    address: Address,
    account: Address,
    confirmations: u64,
}

impl RpcWaveContract {
    fn instance(&self) -> IWavePortal::IWavePortalInstance<DynProvider> {
        IWavePortal::new(self.address, self.provider.clone())
    }

    async fn block_timestamp(&self, number: u64) -> Option<u64> {
        match self.provider.get_block_by_number(number.into()).await {
            Ok(Some(block)) => Some(block.header.timestamp),
            Ok(None) => {
                warn!(number, "mined block not found");
                None
            }
            Err(err) => {
                warn!(number, %err, "failed to fetch mined block");
                None
            }
        }
    }
}

#[async_trait]
impl WaveContract for RpcWaveContract {
    async fn total_waves(&self) -> Result<U256, ProviderError> {
        Ok(self.instance().getTotalWaves().call().await?)
    }

    async fn all_waves(&self) -> Result<Vec<RawWave>, ProviderError> {
        let waves = self.instance().getAllWaves().call().await?;
        Ok(waves
            .into_iter()
            .map(|wave| RawWave::new(wave.waver, wave.timestamp.saturating_to(), wave.message))
            .collect())
    }

    async fn wave(&self, message: &str, gas_limit: u64) -> Result<TxHash, ProviderError> {
        let pending = self
            .instance()
            .wave(message.to_string())
            .from(self.account)
            .gas(gas_limit)
            .send()
            .await?;
        Ok(*pending.tx_hash())
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<WaveReceipt, ProviderError> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
            .with_required_confirmations(self.confirmations)
            .get_receipt()
            .await
            .map_err(pending_error)?;

        let wave = receipt
            .inner
            .logs()
            .iter()
            .filter(|log| log.address() == self.address)
            .find_map(|log| IWavePortal::NewWave::decode_log_data(log.data()).ok())
            .map(|event| RawWave::new(event.from, event.timestamp.saturating_to(), event.message));

        let block_timestamp = match (&wave, receipt.block_number) {
            (None, Some(number)) => self.block_timestamp(number).await,
            _ => None,
        };

        Ok(WaveReceipt { tx_hash, success: receipt.status(), wave, block_timestamp })
    }

    async fn new_waves(&self) -> Result<WaveStream, ProviderError> {
        let poller = self.instance().NewWave_filter().watch().await.map_err(rpc_error)?;
        let events = poller.into_stream().filter_map(|item| async move {
            match item {
                Ok((event, _)) => {
                    Some(RawWave::new(event.from, event.timestamp.saturating_to(), event.message))
                }
                Err(err) => {
                    warn!(%err, "skipping undecodable NewWave log");
                    None
                }
            }
        });
        Ok(events.boxed())
    }
}

impl From<alloy_contract::Error> for ProviderError {
    fn from(err: alloy_contract::Error) -> Self {
        match err {
            alloy_contract::Error::TransportError(err) => rpc_error(err),
            alloy_contract::Error::PendingTransactionError(err) => pending_error(err),
            err => Self::transport(err),
        }
    }
}

fn rpc_error(err: TransportError) -> ProviderError {
    match err.as_error_resp() {
        Some(payload) if payload.code == USER_REJECTED_CODE => {
            ProviderError::Rejected(payload.message.to_string())
        }
        _ => ProviderError::transport(err),
    }
}

fn pending_error(err: PendingTransactionError) -> ProviderError {
    match err {
        PendingTransactionError::TransportError(err) => rpc_error(err),
        err => ProviderError::transport(err),
    }
}
