//! Multi-network contract dispatch.
//!
//! The dispatcher resolves a logical operation ("read method M on contract
//! C") against the registry, the connection pool and the handle cache, and
//! exposes three shapes of invocation:
//!
//! - [`read_contract`](Dispatcher::read_contract): single-network call,
//!   errors propagate directly;
//! - [`write_contract`](Dispatcher::write_contract): single-network
//!   transaction submission, returns a [`PendingWrite`] without awaiting
//!   confirmation;
//! - [`fetch_all_networks`](Dispatcher::fetch_all_networks): concurrent
//!   fan-out over every configured chain, settled-all — one unreachable
//!   network never aborts visibility into the others. Partial results are
//!   first-class, not an error condition.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use futures::future::join_all;

use crate::cache::{ContractHandle, HandleCache, HandleKind};
use crate::connection::{CallOverrides, PendingWrite};
use crate::error::{Result, SdkError};
use crate::network::ChainId;
use crate::pool::ConnectionPool;
use crate::registry::{ContractRegistry, ProtocolContract};

/// Outcome of one network's branch of a multi-network read.
#[derive(Debug)]
pub enum NetworkOutcome<T> {
    Fulfilled(T),
    Rejected(SdkError),
}

impl<T> NetworkOutcome<T> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, NetworkOutcome::Fulfilled(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            NetworkOutcome::Fulfilled(value) => Some(value),
            NetworkOutcome::Rejected(_) => None,
        }
    }

    pub fn error(&self) -> Option<&SdkError> {
        match self {
            NetworkOutcome::Fulfilled(_) => None,
            NetworkOutcome::Rejected(error) => Some(error),
        }
    }
}

/// Per-chain-id keyed outcome of a multi-network fan-out read.
///
/// Chains skipped by the existence probe are absent entirely; chains whose
/// call failed are present as rejected. The two are distinguishable by
/// design.
#[derive(Debug, Default)]
pub struct AggregatedResult<T> {
    outcomes: BTreeMap<ChainId, NetworkOutcome<T>>,
}

impl<T> AggregatedResult<T> {
    fn from_settled(settled: Vec<(ChainId, Result<T>)>) -> Self {
        let outcomes = settled
            .into_iter()
            .map(|(chain_id, result)| {
                let outcome = match result {
                    Ok(value) => NetworkOutcome::Fulfilled(value),
                    Err(error) => NetworkOutcome::Rejected(error),
                };
                (chain_id, outcome)
            })
            .collect();
        Self { outcomes }
    }

    pub fn get(&self, chain_id: ChainId) -> Option<&NetworkOutcome<T>> {
        self.outcomes.get(&chain_id)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChainId, &NetworkOutcome<T>)> {
        self.outcomes.iter().map(|(id, outcome)| (*id, outcome))
    }

    pub fn fulfilled(&self) -> impl Iterator<Item = (ChainId, &T)> {
        self.iter()
            .filter_map(|(id, outcome)| outcome.value().map(|v| (id, v)))
    }

    pub fn rejected(&self) -> impl Iterator<Item = (ChainId, &SdkError)> {
        self.iter()
            .filter_map(|(id, outcome)| outcome.error().map(|e| (id, e)))
    }

    /// Convert every fulfilled value; a conversion failure moves that chain
    /// to rejected.
    pub fn try_map<U>(self, f: impl Fn(T) -> Result<U>) -> AggregatedResult<U> {
        let outcomes = self
            .outcomes
            .into_iter()
            .map(|(chain_id, outcome)| {
                let outcome = match outcome {
                    NetworkOutcome::Fulfilled(value) => match f(value) {
                        Ok(mapped) => NetworkOutcome::Fulfilled(mapped),
                        Err(error) => NetworkOutcome::Rejected(error),
                    },
                    NetworkOutcome::Rejected(error) => NetworkOutcome::Rejected(error),
                };
                (chain_id, outcome)
            })
            .collect();
        AggregatedResult { outcomes }
    }

    pub fn into_inner(self) -> BTreeMap<ChainId, NetworkOutcome<T>> {
        self.outcomes
    }
}

/// Dispatcher configuration carried over from the facade options.
#[derive(Debug, Clone, Default)]
pub struct DispatchSettings {
    /// Enables the pre-write bridging guard. Off by default: the guard
    /// costs one RPC round trip per candidate network.
    pub nft_bridge_check: bool,
    /// Facade-wide call overrides, merged into every outgoing request.
    pub call_overrides: CallOverrides,
}

pub struct Dispatcher {
    pool: ConnectionPool,
    registry: ContractRegistry,
    cache: HandleCache,
    /// The single designated mutable cell of the facade.
    signer: RwLock<Option<PrivateKeySigner>>,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        pool: ConnectionPool,
        registry: ContractRegistry,
        signer: Option<PrivateKeySigner>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            pool,
            registry,
            cache: HandleCache::default(),
            signer: RwLock::new(signer),
            settings,
        }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Replace the facade signer.
    ///
    /// Write handles embed the signer-connected connection, so the write
    /// pool is cleared; read handles survive.
    pub fn set_signer(&self, signer: Option<PrivateKeySigner>) {
        *self
            .signer
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = signer;
        self.cache.clear_write_pool();
        tracing::debug!(target: "charged::dispatch", "signer replaced, write handle pool cleared");
    }

    fn signer(&self) -> Option<PrivateKeySigner> {
        self.signer
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Resolve the target chain for a single-network call.
    pub async fn resolve_target(&self, explicit: Option<ChainId>) -> Result<ChainId> {
        self.pool.resolve_single_target(explicit).await
    }

    /// Obtain (or create and cache) the handle for `contract` on `chain_id`.
    ///
    /// The address comes from the registry unless `explicit_address` is
    /// given. A `(chain id, address)` pair always maps to the same handle
    /// within a pool.
    pub async fn handle(
        &self,
        contract: ProtocolContract,
        chain_id: ChainId,
        kind: HandleKind,
        explicit_address: Option<Address>,
    ) -> Result<Arc<ContractHandle>> {
        let address = match explicit_address {
            Some(address) => address,
            None => self.registry.address(chain_id, contract)?,
        };

        if let Some(handle) = self.cache.get(kind, chain_id, address) {
            return Ok(handle);
        }

        let connection = match kind {
            HandleKind::Read => self.pool.connection_for(chain_id).await?,
            HandleKind::Write => {
                if let Some(signer) = self.signer() {
                    let connection = self.pool.connection_for(chain_id).await?;
                    connection.with_signer(&signer)?
                } else if let Some(external) = self.pool.external().filter(|c| c.can_sign()) {
                    external.clone()
                } else {
                    return Err(SdkError::NoSignerAvailable);
                }
            }
        };

        Ok(self.cache.get_or_insert(kind, chain_id, address, || {
            Arc::new(ContractHandle::new(contract, address, connection, kind))
        }))
    }

    /// Single-network read. Errors propagate directly to the caller.
    pub async fn read_contract(
        &self,
        contract: ProtocolContract,
        method: &str,
        chain: Option<ChainId>,
        args: &[DynSolValue],
        explicit_address: Option<Address>,
        overrides: Option<&CallOverrides>,
    ) -> Result<Vec<DynSolValue>> {
        let chain_id = self.resolve_target(chain).await?;
        let per_call = overrides.cloned().unwrap_or_default();
        let merged = self.settings.call_overrides.merged_with(&per_call);
        self.read_on(contract, method, chain_id, args, explicit_address, &merged)
            .await
    }

    async fn read_on(
        &self,
        contract: ProtocolContract,
        method: &str,
        chain_id: ChainId,
        args: &[DynSolValue],
        explicit_address: Option<Address>,
        overrides: &CallOverrides,
    ) -> Result<Vec<DynSolValue>> {
        let handle = self
            .handle(contract, chain_id, HandleKind::Read, explicit_address)
            .await?;
        handle.call(method, args, overrides).await
    }

    /// Single-network write. Returns the pending transaction without
    /// awaiting confirmation, so callers can pipeline or skip it.
    pub async fn write_contract(
        &self,
        contract: ProtocolContract,
        method: &str,
        chain: Option<ChainId>,
        args: &[DynSolValue],
        explicit_address: Option<Address>,
        overrides: Option<&CallOverrides>,
    ) -> Result<PendingWrite> {
        let chain_id = self.resolve_target(chain).await?;
        let per_call = overrides.cloned().unwrap_or_default();
        let merged = self.settings.call_overrides.merged_with(&per_call);
        let handle = self
            .handle(contract, chain_id, HandleKind::Write, explicit_address)
            .await?;
        let tx_hash = handle.send(method, args, &merged).await?;
        tracing::debug!(
            target: "charged::dispatch",
            chain_id,
            method,
            tx_hash = %tx_hash,
            "transaction submitted"
        );
        Ok(PendingWrite::new(chain_id, tx_hash, handle.connection().clone()))
    }

    /// Concurrent read across every configured network, settled-all.
    ///
    /// With an explicit address, chains where no contract code exists at
    /// that address are probed first and skipped — absent from the result,
    /// not rejected. Each remaining chain's read runs independently; every
    /// branch is awaited to completion and failures land in that chain's
    /// rejected entry.
    pub async fn fetch_all_networks(
        &self,
        contract: ProtocolContract,
        method: &str,
        args: &[DynSolValue],
        explicit_address: Option<Address>,
        overrides: Option<&CallOverrides>,
    ) -> Result<AggregatedResult<Vec<DynSolValue>>> {
        let mut chains = self.pool.chain_ids().await?;

        if let Some(address) = explicit_address {
            let probes = chains.iter().map(|&chain_id| async move {
                let deployed = match self.pool.connection_for(chain_id).await {
                    Ok(connection) => match connection.code_at(address).await {
                        Ok(code) => !code.is_empty(),
                        // Transport failure: keep the chain, the read phase
                        // will report it as rejected.
                        Err(_) => true,
                    },
                    Err(_) => true,
                };
                (chain_id, deployed)
            });
            let deployed: Vec<(ChainId, bool)> = join_all(probes).await;
            for (chain_id, _) in deployed.iter().filter(|(_, deployed)| !deployed) {
                tracing::debug!(
                    target: "charged::dispatch",
                    chain_id,
                    address = %address,
                    "no contract code, skipping chain"
                );
            }
            chains = deployed
                .into_iter()
                .filter(|(_, deployed)| *deployed)
                .map(|(chain_id, _)| chain_id)
                .collect();
        }

        let per_call = overrides.cloned().unwrap_or_default();
        let merged = self.settings.call_overrides.merged_with(&per_call);
        let merged = &merged;

        // Each launched read is paired with its chain id before awaiting,
        // so completion order cannot misattribute results.
        let reads = chains.into_iter().map(|chain_id| async move {
            let result = self
                .read_on(contract, method, chain_id, args, explicit_address, merged)
                .await;
            (chain_id, result)
        });
        let settled = join_all(reads).await;

        let aggregated = AggregatedResult::from_settled(settled);
        for (chain_id, error) in aggregated.rejected() {
            tracing::debug!(
                target: "charged::dispatch",
                chain_id,
                method,
                error = %error,
                "network branch rejected"
            );
        }
        Ok(aggregated)
    }

    /// Chains on which the token at `(nft_address, token_id)` exists: code
    /// deployed and `ownerOf` answering. With `owner` given, ownership must
    /// match too.
    pub async fn token_chains(
        &self,
        nft_address: Address,
        token_id: U256,
        owner: Option<Address>,
    ) -> Result<Vec<ChainId>> {
        let chains = self.pool.chain_ids().await?;
        let probes = chains.into_iter().map(|chain_id| async move {
            let connection = match self.pool.connection_for(chain_id).await {
                Ok(connection) => connection,
                Err(_) => return (chain_id, false),
            };
            match connection.code_at(nft_address).await {
                Ok(code) if !code.is_empty() => {}
                _ => return (chain_id, false),
            }
            let result = self
                .read_on(
                    ProtocolContract::Erc721,
                    "ownerOf",
                    chain_id,
                    &[DynSolValue::Uint(token_id, 256)],
                    Some(nft_address),
                    &CallOverrides::default(),
                )
                .await;
            let holds = match result {
                Ok(values) => match owner {
                    Some(owner) => values.first().and_then(DynSolValue::as_address) == Some(owner),
                    None => true,
                },
                Err(_) => false,
            };
            (chain_id, holds)
        });
        Ok(join_all(probes)
            .await
            .into_iter()
            .filter(|(_, holds)| *holds)
            .map(|(chain_id, _)| chain_id)
            .collect())
    }

    /// Bridging guard: before a write touching `(nft_address, token_id)`,
    /// verify the target chain actually holds that token.
    ///
    /// Disabled by default (`sdk.NftBridgeCheck`), in which case no probe
    /// runs and the call proceeds unfiltered.
    pub async fn assert_token_on_chain(
        &self,
        nft_address: Address,
        token_id: U256,
        target_chain: ChainId,
    ) -> Result<()> {
        if !self.settings.nft_bridge_check {
            return Ok(());
        }
        let owner = self.signer().map(|signer| signer.address());
        let token_chains = self.token_chains(nft_address, token_id, owner).await?;
        if token_chains.contains(&target_chain) {
            return Ok(());
        }
        Err(SdkError::SignerNetworkMismatch {
            signer_chain: target_chain,
            token_chains,
        })
    }
}

/// Decode helpers for single-value return data.
pub(crate) mod decode {
    use super::*;

    pub fn address(values: &[DynSolValue]) -> Result<Address> {
        values
            .first()
            .and_then(DynSolValue::as_address)
            .ok_or_else(|| shape_error("address", values))
    }

    pub fn uint(values: &[DynSolValue]) -> Result<U256> {
        values
            .first()
            .and_then(DynSolValue::as_uint)
            .map(|(value, _)| value)
            .ok_or_else(|| shape_error("uint", values))
    }

    pub fn string(values: &[DynSolValue]) -> Result<String> {
        values
            .first()
            .and_then(DynSolValue::as_str)
            .map(str::to_owned)
            .ok_or_else(|| shape_error("string", values))
    }

    fn shape_error(expected: &str, values: &[DynSolValue]) -> SdkError {
        SdkError::UnexpectedReturnData(format!(
            "expected a single {expected}, got {} value(s)",
            values.len()
        ))
    }
}
