//! Bound contract handles and their per-facade cache.
//!
//! A handle is the `(address, abi, connection)` triple that actually invokes
//! named methods. Read handles bind a plain connection, write handles a
//! signer-connected one; the two live in disjoint pools so a read handle can
//! never submit a state-changing call.
//!
//! Cache entries are created lazily and never evicted for the facade's
//! lifetime, with one documented exception: replacing the facade signer
//! clears the write pool, since write handles embed the signer-connected
//! connection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy::dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy::json_abi::{Function, JsonAbi};
use alloy::primitives::{Address, TxHash};

use crate::connection::{CallOverrides, NetworkConnection};
use crate::error::{Result, SdkError};
use crate::network::ChainId;
use crate::registry::ProtocolContract;

/// Which pool a handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Bound to a plain connection; side-effect-free calls only.
    Read,
    /// Bound to a signer-connected connection; submits transactions.
    Write,
}

/// A contract handle bound to one address on one connection.
pub struct ContractHandle {
    contract: ProtocolContract,
    address: Address,
    abi: &'static JsonAbi,
    connection: Arc<dyn NetworkConnection>,
    kind: HandleKind,
}

impl ContractHandle {
    pub(crate) fn new(
        contract: ProtocolContract,
        address: Address,
        connection: Arc<dyn NetworkConnection>,
        kind: HandleKind,
    ) -> Self {
        Self {
            contract,
            address,
            abi: contract.abi(),
            connection,
            kind,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub(crate) fn connection(&self) -> &Arc<dyn NetworkConnection> {
        &self.connection
    }

    fn function(&self, method: &str) -> Result<&Function> {
        self.abi
            .function(method)
            .and_then(|overloads| overloads.first())
            .ok_or_else(|| SdkError::UnknownMethod {
                contract: self.contract.name(),
                method: method.to_owned(),
            })
    }

    /// Invoke `method` in call mode (no state mutation) and decode the
    /// outputs. Argument lists that don't match the parameter schema fail
    /// here, before any network traffic.
    pub async fn call(
        &self,
        method: &str,
        args: &[DynSolValue],
        overrides: &CallOverrides,
    ) -> Result<Vec<DynSolValue>> {
        let function = self.function(method)?;
        let input = function.abi_encode_input(args)?;
        let output = self
            .connection
            .call(self.address, input.into(), overrides)
            .await?;
        Ok(function.abi_decode_output(&output)?)
    }

    /// Submit `method` as a state-mutating transaction. Only valid on write
    /// handles.
    pub async fn send(
        &self,
        method: &str,
        args: &[DynSolValue],
        overrides: &CallOverrides,
    ) -> Result<TxHash> {
        debug_assert_eq!(self.kind, HandleKind::Write);
        let function = self.function(method)?;
        let input = function.abi_encode_input(args)?;
        self.connection
            .send_transaction(self.address, input.into(), overrides)
            .await
    }
}

/// Memoized contract handles keyed by `(pool, chain id, address)`.
///
/// The chain id is part of the key: a handle embeds one chain's connection,
/// and the same explicit address can be deployed on several chains (bridged
/// NFTs). Create-if-absent only; concurrent callers racing to create the
/// same handle may construct redundantly but converge on the entry that
/// lands first, which is behaviorally identical.
#[derive(Default)]
pub struct HandleCache {
    handles: Mutex<HashMap<(HandleKind, ChainId, Address), Arc<ContractHandle>>>,
}

impl HandleCache {
    pub fn get(
        &self,
        kind: HandleKind,
        chain_id: ChainId,
        address: Address,
    ) -> Option<Arc<ContractHandle>> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&(kind, chain_id, address))
            .cloned()
    }

    pub fn get_or_insert(
        &self,
        kind: HandleKind,
        chain_id: ChainId,
        address: Address,
        build: impl FnOnce() -> Arc<ContractHandle>,
    ) -> Arc<ContractHandle> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry((kind, chain_id, address))
            .or_insert_with(build)
            .clone()
    }

    /// Drop every write handle. Read handles are untouched.
    pub fn clear_write_pool(&self) {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|(kind, _, _), _| *kind == HandleKind::Read);
    }
}
