//! Error taxonomy for the SDK.
//!
//! Single-network calls propagate these errors directly to the caller.
//! Multi-network reads never propagate a per-network failure: each one is
//! captured inside the [`AggregatedResult`](crate::dispatch::AggregatedResult)
//! under that chain id's rejected entry.

use thiserror::Error;

use crate::network::ChainId;

#[derive(Debug, Error)]
pub enum SdkError {
    /// A network identifier that the resolver's lookup table does not know.
    /// Distinct from the absent case, which defaults to mainnet.
    #[error("unsupported network identifier: {0}")]
    UnsupportedNetwork(String),

    /// More than one network is configured and the call gave no explicit
    /// target chain id.
    #[error("multiple networks configured, an explicit chain id is required")]
    AmbiguousNetwork,

    /// The connection pool is empty.
    #[error("no network configured")]
    NoNetworkConfigured,

    /// A specific chain id was requested but no configured connection
    /// covers it.
    #[error("no connection configured for chain {0}")]
    ChainNotConfigured(ChainId),

    /// A write was attempted with no facade signer and no externally
    /// signing connection to fall back to.
    #[error("no usable signer available for write operation")]
    NoSignerAvailable,

    /// Bridging guard failure: the write targets a chain that does not hold
    /// the token.
    #[error("signer is connected to chain {signer_chain} but the token exists on chains {token_chains:?}")]
    SignerNetworkMismatch {
        signer_chain: ChainId,
        token_chains: Vec<ChainId>,
    },

    /// The registry has no deployment of this contract on this chain.
    #[error("contract {contract} is not deployed on chain {chain_id}")]
    NotDeployed {
        contract: &'static str,
        chain_id: ChainId,
    },

    /// A logical contract name outside the registry's closed set.
    #[error("unknown contract name: {0}")]
    UnknownContract(String),

    /// The contract's ABI has no function with this name.
    #[error("contract {contract} has no method {method}")]
    UnknownMethod {
        contract: &'static str,
        method: String,
    },

    /// Argument list does not match the method's parameter schema, or the
    /// returned data does not match its output schema.
    #[error("abi error: {0}")]
    Abi(#[from] alloy::dyn_abi::Error),

    /// Construction-time configuration error; the message names the
    /// offending key.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Opaque per-call failure from the underlying RPC layer.
    #[error("rpc error: {0}")]
    Rpc(#[from] alloy::transports::TransportError),

    /// A call returned data of an unexpected shape for a typed helper.
    #[error("unexpected return data: {0}")]
    UnexpectedReturnData(String),
}

pub type Result<T> = std::result::Result<T, SdkError>;
