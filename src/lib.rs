//! Charged SDK - multi-network client for the Charged Particles protocol.
//!
//! The crate's core is the multi-network contract dispatch layer: given a
//! logical operation ("read method M on contract C"), it resolves the
//! per-network contract address and ABI, picks or validates a connection
//! (and, for writes, a signer), fans reads out across every configured
//! network concurrently, and aggregates partial successes and failures into
//! a single chain-id-keyed result.
//!
//! # Components
//!
//! - [`Charged`]: the facade applications instantiate; owns its own
//!   connection pool, signer and handle cache
//! - [`NftHandle`]: per-(contract address, token id) view with the
//!   protocol's particle operations
//! - [`Dispatcher`]: read/write/fan-out dispatch over the pool, registry
//!   and handle cache
//! - [`ConnectionPool`] / [`NetworkConnection`]: one connection per
//!   configured chain, plus an optional externally supplied one
//! - [`ContractRegistry`]: static address and ABI tables per network and
//!   logical contract name
//!
//! # Example
//!
//! ```rust,ignore
//! use charged_sdk::{Charged, ChargedOptions, NetworkService, ProviderSetup, ServiceConfig};
//!
//! let charged = Charged::new(ChargedOptions {
//!     providers: Some(ProviderSetup::Services(vec![
//!         NetworkService { network: "mainnet".into(), service: ServiceConfig::Alchemy(key.clone()) },
//!         NetworkService { network: "polygon".into(), service: ServiceConfig::Alchemy(key) },
//!     ])),
//!     ..Default::default()
//! })?;
//!
//! // One rejected network never hides the others.
//! let state = charged.state_address_all().await?;
//! for (chain_id, address) in state.fulfilled() {
//!     println!("{chain_id}: {address}");
//! }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod network;
pub mod pool;
pub mod registry;

pub use cache::{ContractHandle, HandleKind};
pub use client::{Charged, ChargedOptions, NftHandle};
pub use config::{SdkFlags, SdkSettings};
pub use connection::{
    CallOverrides, NetworkConnection, PendingWrite, RpcConnection, ServiceConfig,
};
pub use dispatch::{AggregatedResult, Dispatcher, NetworkOutcome};
pub use error::{Result, SdkError};
pub use network::{ChainId, NetworkDescriptor, NetworkIdentifier};
pub use pool::{ChainConnection, ConnectionPool, NetworkService, ProviderSetup};
pub use registry::{ContractRegistry, ProtocolContract};

// Re-export dependencies that appear in the public API, for external
// implementors of [`NetworkConnection`].
pub use alloy;
pub use async_trait::async_trait;

pub use alloy::dyn_abi::DynSolValue;
pub use alloy::primitives::{Address, Bytes, TxHash, U256};
pub use alloy::signers::local::PrivateKeySigner;
