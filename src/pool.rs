//! Per-facade connection pool.
//!
//! Holds one active connection per configured chain id, plus at most one
//! externally supplied connection under the `External` slot. Built once at
//! facade construction and immutable afterward, except that the external
//! entry's chain id is discovered lazily on first use and memoized.

use std::sync::Arc;

use alloy::providers::DynProvider;
use tokio::sync::OnceCell;

use crate::connection::{NetworkConnection, RpcConnection, ServiceConfig};
use crate::error::{Result, SdkError};
use crate::network::{self, ChainId, NetworkIdentifier, SUPPORTED_CHAINS};

/// One `{network, service}` descriptor of the `providers` option.
#[derive(Debug, Clone)]
pub struct NetworkService {
    pub network: NetworkIdentifier,
    pub service: ServiceConfig,
}

/// Pre-built connection pinned to a network (dependency-injection form of
/// [`NetworkService`]).
#[derive(Clone)]
pub struct ChainConnection {
    pub network: NetworkIdentifier,
    pub connection: Arc<dyn NetworkConnection>,
}

/// The `providers` facade option.
pub enum ProviderSetup {
    /// One connection per `{network, service}` descriptor.
    Services(Vec<NetworkService>),
    /// Pre-built connections, one per network.
    Connections(Vec<ChainConnection>),
    /// A single pre-built connection, stored under the external slot.
    Connection(Arc<dyn NetworkConnection>),
    /// A raw injected provider (e.g. a browser wallet handle), wrapped and
    /// stored under the external slot.
    Injected(DynProvider),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionKey {
    Chain(ChainId),
    External,
}

/// Pool of network connections keyed by chain id, insertion order =
/// configuration order.
pub struct ConnectionPool {
    entries: Vec<(ConnectionKey, Arc<dyn NetworkConnection>)>,
    external_chain: OnceCell<ChainId>,
}

impl ConnectionPool {
    /// Build the pool from the facade's `providers` option.
    ///
    /// With no option given, one default connection is constructed per
    /// well-known network that has a public endpoint; the rest are skipped
    /// and an advisory is logged for each default in use.
    pub fn new(setup: Option<ProviderSetup>) -> Result<Self> {
        let mut entries: Vec<(ConnectionKey, Arc<dyn NetworkConnection>)> = Vec::new();

        match setup {
            Some(ProviderSetup::Services(services)) => {
                for NetworkService { network, service } in services {
                    let chain_id = network::resolve(Some(&network))?;
                    if entries.iter().any(|(k, _)| *k == ConnectionKey::Chain(chain_id)) {
                        tracing::warn!(
                            target: "charged::pool",
                            chain_id,
                            "duplicate network entry ignored"
                        );
                        continue;
                    }
                    entries.push((ConnectionKey::Chain(chain_id), service.connect(chain_id)?));
                }
            }
            Some(ProviderSetup::Connections(connections)) => {
                for ChainConnection { network, connection } in connections {
                    let chain_id = network::resolve(Some(&network))?;
                    if entries.iter().any(|(k, _)| *k == ConnectionKey::Chain(chain_id)) {
                        tracing::warn!(
                            target: "charged::pool",
                            chain_id,
                            "duplicate network entry ignored"
                        );
                        continue;
                    }
                    entries.push((ConnectionKey::Chain(chain_id), connection));
                }
            }
            Some(ProviderSetup::Connection(connection)) => {
                entries.push((ConnectionKey::External, connection));
            }
            Some(ProviderSetup::Injected(provider)) => {
                entries.push((
                    ConnectionKey::External,
                    Arc::new(RpcConnection::injected(provider)) as Arc<dyn NetworkConnection>,
                ));
            }
            None => {
                for chain_id in SUPPORTED_CHAINS {
                    let Some((connection, advisory)) = network::default_connection_for(chain_id)
                    else {
                        continue;
                    };
                    tracing::info!(
                        target: "charged::pool",
                        chain_id = advisory.chain_id,
                        "{}", advisory.message
                    );
                    entries.push((ConnectionKey::Chain(chain_id), connection));
                }
            }
        }

        Ok(Self {
            entries,
            external_chain: OnceCell::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The externally supplied connection, if one was configured.
    pub fn external(&self) -> Option<&Arc<dyn NetworkConnection>> {
        self.entries
            .iter()
            .find(|(k, _)| *k == ConnectionKey::External)
            .map(|(_, c)| c)
    }

    /// Chain id of the external connection, queried once and memoized.
    async fn external_chain_id(&self) -> Result<Option<ChainId>> {
        let Some(connection) = self.external() else {
            return Ok(None);
        };
        let id = self
            .external_chain
            .get_or_try_init(|| connection.chain_id())
            .await?;
        Ok(Some(*id))
    }

    /// Every chain id the pool covers, in configuration order, deduplicated.
    pub async fn chain_ids(&self) -> Result<Vec<ChainId>> {
        let mut ids = Vec::with_capacity(self.entries.len());
        for (key, _) in &self.entries {
            let id = match key {
                ConnectionKey::Chain(id) => *id,
                ConnectionKey::External => match self.external_chain_id().await? {
                    Some(id) => id,
                    None => continue,
                },
            };
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Resolve the target chain for a single-network call.
    ///
    /// A pool with exactly one entry needs no explicit target; more than one
    /// entry makes the explicit chain id mandatory. An explicit id is only
    /// accepted when a connection covers it.
    pub async fn resolve_single_target(&self, explicit: Option<ChainId>) -> Result<ChainId> {
        if self.entries.is_empty() {
            return Err(SdkError::NoNetworkConfigured);
        }
        if let Some(chain_id) = explicit {
            if self
                .entries
                .iter()
                .any(|(k, _)| *k == ConnectionKey::Chain(chain_id))
            {
                return Ok(chain_id);
            }
            if self.external_chain_id().await? == Some(chain_id) {
                return Ok(chain_id);
            }
            return Err(SdkError::ChainNotConfigured(chain_id));
        }
        if self.entries.len() > 1 {
            return Err(SdkError::AmbiguousNetwork);
        }
        match self.entries[0].0 {
            ConnectionKey::Chain(id) => Ok(id),
            ConnectionKey::External => self
                .external_chain_id()
                .await?
                .ok_or(SdkError::NoNetworkConfigured),
        }
    }

    /// Connection serving `chain_id`: the configured entry for that id, or
    /// the external entry when its discovered chain id matches.
    pub async fn connection_for(&self, chain_id: ChainId) -> Result<Arc<dyn NetworkConnection>> {
        if self.entries.is_empty() {
            return Err(SdkError::NoNetworkConfigured);
        }
        for (key, connection) in &self.entries {
            if *key == ConnectionKey::Chain(chain_id) {
                return Ok(connection.clone());
            }
        }
        if let Some(external_id) = self.external_chain_id().await? {
            if external_id == chain_id {
                if let Some(connection) = self.external() {
                    return Ok(connection.clone());
                }
            }
        }
        Err(SdkError::ChainNotConfigured(chain_id))
    }
}
