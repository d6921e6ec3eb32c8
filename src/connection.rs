//! Network connections and the provider factory.
//!
//! [`NetworkConnection`] is the seam between the dispatch core and the RPC
//! layer: one endpoint, one chain, shared behind an `Arc`. The concrete
//! implementation, [`RpcConnection`], rides alloy's HTTP provider; tests
//! exercise the dispatch core through mock implementations of the trait.
//!
//! A connection is signer-free by default. [`NetworkConnection::with_signer`]
//! produces the signer-connected variant of the same endpoint; the two are
//! never interchangeable, which is what keeps the read and write handle
//! pools disjoint.

use std::fmt;
use std::sync::Arc;

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Result, SdkError};
use crate::network::ChainId;

/// Per-call configuration overrides, merged into every outgoing request.
///
/// Explicit per-call fields win over the facade-wide defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CallOverrides {
    pub from: Option<Address>,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
    pub value: Option<U256>,
}

impl CallOverrides {
    /// Merge, with `per_call` taking precedence field by field.
    pub fn merged_with(&self, per_call: &CallOverrides) -> CallOverrides {
        CallOverrides {
            from: per_call.from.or(self.from),
            gas_limit: per_call.gas_limit.or(self.gas_limit),
            gas_price: per_call.gas_price.or(self.gas_price),
            value: per_call.value.or(self.value),
        }
    }

    fn apply(&self, tx: &mut TransactionRequest) {
        if let Some(from) = self.from {
            tx.set_from(from);
        }
        if let Some(gas_limit) = self.gas_limit {
            tx.set_gas_limit(gas_limit);
        }
        if let Some(gas_price) = self.gas_price {
            tx.set_gas_price(gas_price);
        }
        if let Some(value) = self.value {
            tx.set_value(value);
        }
    }
}

/// Shared handle to one network endpoint.
#[async_trait]
pub trait NetworkConnection: Send + Sync {
    /// The chain id the endpoint reports. A live query; callers memoize.
    async fn chain_id(&self) -> Result<ChainId>;

    /// Deployed bytecode at `address`, empty if no contract exists there.
    async fn code_at(&self, address: Address) -> Result<Bytes>;

    /// Side-effect-free `eth_call`.
    async fn call(&self, to: Address, input: Bytes, overrides: &CallOverrides) -> Result<Bytes>;

    /// Submit a state-mutating transaction. Returns the transaction hash as
    /// soon as the node accepts it; confirmation is the caller's business.
    async fn send_transaction(
        &self,
        to: Address,
        input: Bytes,
        overrides: &CallOverrides,
    ) -> Result<TxHash>;

    /// Receipt for a previously submitted transaction, `None` while pending.
    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TransactionReceipt>>;

    /// Whether this connection can sign transactions on its own.
    fn can_sign(&self) -> bool;

    /// Address of the attached signer, when one is known.
    fn signer_address(&self) -> Option<Address>;

    /// Signer-connected variant of this endpoint.
    fn with_signer(&self, signer: &PrivateKeySigner) -> Result<Arc<dyn NetworkConnection>>;
}

/// Service descriptor for constructing a connection to a hosted endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceConfig {
    /// Alchemy API key.
    Alchemy(String),
    /// Infura project id.
    Infura(String),
    /// Raw JSON-RPC endpoint.
    Rpc(String),
}

impl ServiceConfig {
    /// Concrete HTTPS endpoint for `chain_id`.
    ///
    /// Fails with [`SdkError::UnsupportedNetwork`] when the service does not
    /// host that network.
    pub fn endpoint(&self, chain_id: ChainId) -> Result<Url> {
        let url = match self {
            ServiceConfig::Alchemy(key) => {
                let host = match chain_id {
                    1 => "eth-mainnet.g.alchemy.com",
                    5 => "eth-goerli.g.alchemy.com",
                    42 => "eth-kovan.alchemyapi.io",
                    137 => "polygon-mainnet.g.alchemy.com",
                    80001 => "polygon-mumbai.g.alchemy.com",
                    _ => {
                        return Err(SdkError::UnsupportedNetwork(format!(
                            "alchemy has no endpoint for chain {chain_id}"
                        )))
                    }
                };
                format!("https://{host}/v2/{key}")
            }
            ServiceConfig::Infura(project) => {
                let host = match chain_id {
                    1 => "mainnet.infura.io",
                    5 => "goerli.infura.io",
                    42 => "kovan.infura.io",
                    137 => "polygon-mainnet.infura.io",
                    80001 => "polygon-mumbai.infura.io",
                    _ => {
                        return Err(SdkError::UnsupportedNetwork(format!(
                            "infura has no endpoint for chain {chain_id}"
                        )))
                    }
                };
                format!("https://{host}/v3/{project}")
            }
            ServiceConfig::Rpc(url) => url.clone(),
        };
        url.parse()
            .map_err(|e| SdkError::InvalidConfig(format!("bad endpoint url {url}: {e}")))
    }

    /// Build a connection for `chain_id` against this service.
    pub fn connect(&self, chain_id: ChainId) -> Result<Arc<dyn NetworkConnection>> {
        let url = self.endpoint(chain_id)?;
        Ok(Arc::new(RpcConnection::http(url)))
    }
}

/// Alloy-backed [`NetworkConnection`].
#[derive(Clone)]
pub struct RpcConnection {
    provider: DynProvider,
    /// Endpoint the provider was built from; absent for injected providers.
    endpoint: Option<Url>,
    signer_address: Option<Address>,
    /// Injected providers sign internally (wallet-style); plain HTTP ones
    /// do not.
    signing: bool,
}

impl RpcConnection {
    /// Plain HTTP connection; no signing capability.
    pub fn http(url: Url) -> Self {
        let provider = ProviderBuilder::new().connect_http(url.clone()).erased();
        Self {
            provider,
            endpoint: Some(url),
            signer_address: None,
            signing: false,
        }
    }

    /// Wrap a caller-supplied raw provider (the injected-wallet case).
    ///
    /// The provider is assumed to sign transactions internally; its chain id
    /// is discovered on first use.
    pub fn injected(provider: DynProvider) -> Self {
        Self {
            provider,
            endpoint: None,
            signer_address: None,
            signing: true,
        }
    }
}

#[async_trait]
impl NetworkConnection for RpcConnection {
    async fn chain_id(&self) -> Result<ChainId> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes> {
        Ok(self.provider.get_code_at(address).await?)
    }

    async fn call(&self, to: Address, input: Bytes, overrides: &CallOverrides) -> Result<Bytes> {
        let mut tx = TransactionRequest::default().with_to(to).with_input(input);
        overrides.apply(&mut tx);
        Ok(self.provider.call(tx).await?)
    }

    async fn send_transaction(
        &self,
        to: Address,
        input: Bytes,
        overrides: &CallOverrides,
    ) -> Result<TxHash> {
        let mut tx = TransactionRequest::default().with_to(to).with_input(input);
        overrides.apply(&mut tx);
        if tx.from.is_none() {
            if let Some(from) = self.signer_address {
                tx.set_from(from);
            }
        }
        let pending = self.provider.send_transaction(tx).await?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TransactionReceipt>> {
        Ok(self.provider.get_transaction_receipt(hash).await?)
    }

    fn can_sign(&self) -> bool {
        self.signing || self.signer_address.is_some()
    }

    fn signer_address(&self) -> Option<Address> {
        self.signer_address
    }

    fn with_signer(&self, signer: &PrivateKeySigner) -> Result<Arc<dyn NetworkConnection>> {
        let address = signer.address();
        let wallet = EthereumWallet::from(signer.clone());
        let provider = match &self.endpoint {
            Some(url) => ProviderBuilder::new()
                .wallet(wallet)
                .connect_http(url.clone())
                .erased(),
            None => ProviderBuilder::new()
                .wallet(wallet)
                .connect_provider(self.provider.clone())
                .erased(),
        };
        Ok(Arc::new(Self {
            provider,
            endpoint: self.endpoint.clone(),
            signer_address: Some(address),
            signing: true,
        }))
    }
}

/// Handle to a submitted, not yet confirmed transaction.
///
/// The dispatcher never awaits confirmation; callers poll [`receipt`] or
/// pipeline further work against the hash.
///
/// [`receipt`]: PendingWrite::receipt
#[derive(Clone)]
pub struct PendingWrite {
    chain_id: ChainId,
    tx_hash: TxHash,
    connection: Arc<dyn NetworkConnection>,
}

impl PendingWrite {
    pub(crate) fn new(
        chain_id: ChainId,
        tx_hash: TxHash,
        connection: Arc<dyn NetworkConnection>,
    ) -> Self {
        Self {
            chain_id,
            tx_hash,
            connection,
        }
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    /// Current receipt, `None` while the transaction is still pending.
    pub async fn receipt(&self) -> Result<Option<TransactionReceipt>> {
        self.connection.transaction_receipt(self.tx_hash).await
    }
}

impl fmt::Debug for PendingWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingWrite")
            .field("chain_id", &self.chain_id)
            .field("tx_hash", &self.tx_hash)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alchemy_endpoints_cover_supported_chains() {
        let service = ServiceConfig::Alchemy("key".into());
        for chain in crate::network::SUPPORTED_CHAINS {
            let url = service.endpoint(chain).unwrap();
            assert!(url.as_str().ends_with("/v2/key"), "unexpected url {url}");
        }
    }

    #[test]
    fn unsupported_service_chain_combination_fails() {
        let service = ServiceConfig::Infura("project".into());
        match service.endpoint(10) {
            Err(SdkError::UnsupportedNetwork(_)) => {}
            other => panic!("expected UnsupportedNetwork, got {other:?}"),
        }
    }

    #[test]
    fn per_call_overrides_win_over_facade_defaults() {
        let facade = CallOverrides {
            gas_limit: Some(100_000),
            gas_price: Some(30),
            ..Default::default()
        };
        let per_call = CallOverrides {
            gas_limit: Some(250_000),
            ..Default::default()
        };
        let merged = facade.merged_with(&per_call);
        assert_eq!(merged.gas_limit, Some(250_000));
        assert_eq!(merged.gas_price, Some(30));
    }
}
