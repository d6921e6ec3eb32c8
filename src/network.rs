//! Network identifier resolution.
//!
//! Callers hand the SDK a heterogeneous network identifier: a string alias
//! ("homestead", "matic"), a numeric EIP-155 chain id, or a descriptor
//! object carrying one. Everything downstream keys on the canonical
//! [`ChainId`], so resolution happens exactly once at the edge.

use std::sync::Arc;

use crate::connection::{NetworkConnection, RpcConnection};
use crate::error::{Result, SdkError};

/// An EIP-155 chain id (e.g. 1 for mainnet, 137 for Polygon).
pub type ChainId = u64;

/// Chain id used when no network identifier is given at all.
pub const DEFAULT_CHAIN_ID: ChainId = 1;

/// Networks the protocol is deployed on, in configuration order.
pub const SUPPORTED_CHAINS: [ChainId; 4] = [1, 42, 137, 80001];

/// A network identifier as accepted at the SDK boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkIdentifier {
    /// String alias, e.g. "homestead", "kovan", "matic".
    Name(String),
    /// Numeric chain id.
    Id(ChainId),
    /// Descriptor object exposing a chain id field.
    Descriptor(NetworkDescriptor),
}

/// Descriptor form of a network identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDescriptor {
    pub chain_id: ChainId,
    pub name: Option<String>,
}

impl From<ChainId> for NetworkIdentifier {
    fn from(id: ChainId) -> Self {
        NetworkIdentifier::Id(id)
    }
}

impl From<&str> for NetworkIdentifier {
    fn from(name: &str) -> Self {
        NetworkIdentifier::Name(name.to_owned())
    }
}

impl From<NetworkDescriptor> for NetworkIdentifier {
    fn from(descriptor: NetworkDescriptor) -> Self {
        NetworkIdentifier::Descriptor(descriptor)
    }
}

/// Maps a string alias to its canonical chain id. Aliases for the same
/// network map to the same id.
fn chain_id_for_alias(name: &str) -> Option<ChainId> {
    match name.to_ascii_lowercase().as_str() {
        "homestead" | "mainnet" => Some(1),
        "ropsten" => Some(3),
        "rinkeby" => Some(4),
        "goerli" => Some(5),
        "kovan" => Some(42),
        "matic" | "polygon" => Some(137),
        "maticmum" | "mumbai" => Some(80001),
        _ => None,
    }
}

fn is_known_chain_id(id: ChainId) -> bool {
    matches!(id, 1 | 3 | 4 | 5 | 42 | 137 | 80001)
}

/// Resolves a network identifier into its canonical chain id.
///
/// Absent input defaults to mainnet. An unrecognized value fails with
/// [`SdkError::UnsupportedNetwork`] carrying the offending input; it is
/// never silently replaced with the default.
pub fn resolve(network: Option<&NetworkIdentifier>) -> Result<ChainId> {
    let Some(network) = network else {
        return Ok(DEFAULT_CHAIN_ID);
    };

    match network {
        NetworkIdentifier::Name(name) => chain_id_for_alias(name)
            .ok_or_else(|| SdkError::UnsupportedNetwork(name.clone())),
        NetworkIdentifier::Id(id) => {
            if is_known_chain_id(*id) {
                Ok(*id)
            } else {
                Err(SdkError::UnsupportedNetwork(id.to_string()))
            }
        }
        NetworkIdentifier::Descriptor(descriptor) => {
            if is_known_chain_id(descriptor.chain_id) {
                Ok(descriptor.chain_id)
            } else {
                Err(SdkError::UnsupportedNetwork(format!(
                    "descriptor with chain id {}",
                    descriptor.chain_id
                )))
            }
        }
    }
}

/// Structured advisory emitted alongside a default connection.
///
/// Default connections ride public rate-limited endpoints; the advisory
/// tells the caller to supply their own service credentials. Whether to log
/// it is the composition root's decision, not this module's.
#[derive(Debug, Clone)]
pub struct Advisory {
    pub chain_id: ChainId,
    pub message: String,
}

/// Returns a default connection for a well-known network, if one exists.
///
/// Only networks with a public endpoint get a default; the rest return
/// `None` and are skipped by the pool.
pub fn default_connection_for(
    chain_id: ChainId,
) -> Option<(Arc<dyn NetworkConnection>, Advisory)> {
    let url = match chain_id {
        1 => "https://cloudflare-eth.com",
        137 => "https://polygon-rpc.com",
        _ => return None,
    };
    let url = url.parse().ok()?;
    let connection: Arc<dyn NetworkConnection> = Arc::new(RpcConnection::http(url));
    let advisory = Advisory {
        chain_id,
        message: format!(
            "using public default endpoint for chain {chain_id}; supply your own \
             service credentials for production traffic"
        ),
    };
    Some((connection, advisory))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_for_the_same_network_agree() {
        for (a, b) in [("homestead", "mainnet"), ("matic", "polygon"), ("maticmum", "mumbai")] {
            let left = resolve(Some(&NetworkIdentifier::from(a))).unwrap();
            let right = resolve(Some(&NetworkIdentifier::from(b))).unwrap();
            assert_eq!(left, right);
        }
    }

    #[test]
    fn alias_id_and_descriptor_forms_agree() {
        let by_name = resolve(Some(&NetworkIdentifier::from("kovan"))).unwrap();
        let by_id = resolve(Some(&NetworkIdentifier::Id(42))).unwrap();
        let by_descriptor = resolve(Some(&NetworkIdentifier::Descriptor(NetworkDescriptor {
            chain_id: 42,
            name: Some("kovan".into()),
        })))
        .unwrap();
        assert_eq!(by_name, 42);
        assert_eq!(by_id, 42);
        assert_eq!(by_descriptor, 42);
    }

    #[test]
    fn absent_input_defaults_to_mainnet() {
        assert_eq!(resolve(None).unwrap(), DEFAULT_CHAIN_ID);
    }

    #[test]
    fn unsupported_identifiers_do_not_default() {
        for network in [
            NetworkIdentifier::from("hyperspace"),
            NetworkIdentifier::Id(999_999),
        ] {
            match resolve(Some(&network)) {
                Err(SdkError::UnsupportedNetwork(_)) => {}
                other => panic!("expected UnsupportedNetwork, got {other:?}"),
            }
        }
    }

    #[test]
    fn only_public_endpoint_chains_have_defaults() {
        assert!(default_connection_for(1).is_some());
        assert!(default_connection_for(137).is_some());
        assert!(default_connection_for(42).is_none());
        assert!(default_connection_for(80001).is_none());
    }
}
