//! Cross-module dispatch scenarios over mock connections.
//!
//! The mocks implement [`NetworkConnection`] directly, so everything from
//! the pool up through the facade runs for real; only the RPC transport is
//! canned.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use charged_sdk::alloy::rpc::types::TransactionReceipt;
use charged_sdk::alloy::transports::TransportErrorKind;
use charged_sdk::{
    async_trait, Address, Bytes, CallOverrides, ChainConnection, ChainId, Charged, ChargedOptions,
    ContractRegistry, DynSolValue, HandleKind, NetworkConnection, NetworkIdentifier,
    PrivateKeySigner, ProtocolContract, ProviderSetup, Result, SdkError, TxHash, U256,
};
use charged_sdk::alloy::primitives::keccak256;
use serde_json::json;

type Selector = [u8; 4];

fn selector(contract: ProtocolContract, method: &str) -> Selector {
    contract
        .abi()
        .function(method)
        .and_then(|overloads| overloads.first())
        .unwrap_or_else(|| panic!("{method} not in abi"))
        .selector()
        .0
}

#[derive(Clone)]
enum Response {
    Value(Vec<u8>),
    Fail,
}

/// Canned-transport connection for one chain.
#[derive(Clone)]
struct MockConnection {
    chain: ChainId,
    code: HashSet<Address>,
    responses: HashMap<(Address, Selector), Response>,
    signing: bool,
    signer: Option<Address>,
    sent: Arc<Mutex<Vec<(Address, Bytes)>>>,
    chain_id_queries: Arc<AtomicUsize>,
}

impl MockConnection {
    fn new(chain: ChainId) -> Self {
        Self {
            chain,
            code: HashSet::new(),
            responses: HashMap::new(),
            signing: false,
            signer: None,
            sent: Arc::new(Mutex::new(Vec::new())),
            chain_id_queries: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_code(mut self, address: Address) -> Self {
        self.code.insert(address);
        self
    }

    fn respond(mut self, address: Address, selector: Selector, value: DynSolValue) -> Self {
        self.responses
            .insert((address, selector), Response::Value(value.abi_encode()));
        // A contract that answers calls has code.
        self.code.insert(address);
        self
    }

    fn fail(mut self, address: Address, selector: Selector) -> Self {
        self.responses.insert((address, selector), Response::Fail);
        self.code.insert(address);
        self
    }

    /// Connection that signs on its own, like an injected wallet provider.
    fn signing(mut self) -> Self {
        self.signing = true;
        self
    }
}

#[async_trait]
impl NetworkConnection for MockConnection {
    async fn chain_id(&self) -> Result<ChainId> {
        self.chain_id_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.chain)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes> {
        if self.code.contains(&address) {
            Ok(Bytes::from(vec![0x60, 0x80]))
        } else {
            Ok(Bytes::new())
        }
    }

    async fn call(&self, to: Address, input: Bytes, _overrides: &CallOverrides) -> Result<Bytes> {
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&input[..4]);
        match self.responses.get(&(to, selector)) {
            Some(Response::Value(data)) => Ok(Bytes::from(data.clone())),
            Some(Response::Fail) => {
                Err(TransportErrorKind::custom_str("mock rpc failure").into())
            }
            None => Err(TransportErrorKind::custom_str("no response configured").into()),
        }
    }

    async fn send_transaction(
        &self,
        to: Address,
        input: Bytes,
        _overrides: &CallOverrides,
    ) -> Result<TxHash> {
        let hash = keccak256(&input);
        self.sent.lock().unwrap().push((to, input));
        Ok(hash)
    }

    async fn transaction_receipt(&self, _hash: TxHash) -> Result<Option<TransactionReceipt>> {
        Ok(None)
    }

    fn can_sign(&self) -> bool {
        self.signing || self.signer.is_some()
    }

    fn signer_address(&self) -> Option<Address> {
        self.signer
    }

    fn with_signer(&self, signer: &PrivateKeySigner) -> Result<Arc<dyn NetworkConnection>> {
        let mut signing = self.clone();
        signing.signer = Some(signer.address());
        signing.signing = true;
        Ok(Arc::new(signing))
    }
}

fn pool_of(mocks: Vec<MockConnection>) -> ProviderSetup {
    ProviderSetup::Connections(
        mocks
            .into_iter()
            .map(|mock| ChainConnection {
                network: NetworkIdentifier::Id(mock.chain),
                connection: Arc::new(mock) as Arc<dyn NetworkConnection>,
            })
            .collect(),
    )
}

fn charged_particles_at(chain: ChainId) -> Address {
    ContractRegistry::default()
        .address(chain, ProtocolContract::ChargedParticles)
        .unwrap()
}

fn state_selector() -> Selector {
    selector(ProtocolContract::ChargedParticles, "getStateAddress")
}

fn addr(byte: u8) -> Address {
    Address::from([byte; 20])
}

#[tokio::test]
async fn settle_all_captures_one_failure_among_many() {
    let mocks = vec![
        MockConnection::new(1).respond(
            charged_particles_at(1),
            state_selector(),
            DynSolValue::Address(addr(0x11)),
        ),
        MockConnection::new(42).fail(charged_particles_at(42), state_selector()),
        MockConnection::new(137).respond(
            charged_particles_at(137),
            state_selector(),
            DynSolValue::Address(addr(0x22)),
        ),
    ];
    let charged = Charged::new(ChargedOptions {
        providers: Some(pool_of(mocks)),
        ..Default::default()
    })
    .unwrap();

    let aggregated = charged.state_address_all().await.unwrap();
    assert_eq!(aggregated.len(), 3);
    assert_eq!(aggregated.fulfilled().count(), 2);
    assert_eq!(aggregated.rejected().count(), 1);
    let (rejected_chain, error) = aggregated.rejected().next().unwrap();
    assert_eq!(rejected_chain, 42);
    assert!(matches!(error, SdkError::Rpc(_)));
}

#[tokio::test]
async fn explicit_address_probe_skips_chains_without_code() {
    let nft = addr(0xaa);
    let token_id = U256::from(7u64);
    let uri_selector = selector(ProtocolContract::Erc721, "tokenURI");

    let mocks = vec![
        MockConnection::new(1).respond(
            nft,
            uri_selector,
            DynSolValue::String("ipfs://proton/7".into()),
        ),
        // No code at the NFT address on kovan.
        MockConnection::new(42),
    ];
    let charged = Charged::new(ChargedOptions {
        providers: Some(pool_of(mocks)),
        ..Default::default()
    })
    .unwrap();

    let uris = charged.nft(nft, token_id).token_uri_all().await.unwrap();
    assert_eq!(uris.len(), 1);
    assert_eq!(
        uris.get(1).and_then(|outcome| outcome.value()).map(String::as_str),
        Some("ipfs://proton/7")
    );
    // Skipped, not rejected.
    assert!(uris.get(42).is_none());
}

#[tokio::test]
async fn handle_cache_is_idempotent_and_pools_are_disjoint() {
    let mocks = vec![MockConnection::new(1)];
    let charged = Charged::new(ChargedOptions {
        providers: Some(pool_of(mocks)),
        signer: Some(PrivateKeySigner::random()),
        ..Default::default()
    })
    .unwrap();
    let dispatcher = charged.dispatcher();

    let read_a = dispatcher
        .handle(ProtocolContract::ChargedParticles, 1, HandleKind::Read, None)
        .await
        .unwrap();
    let read_b = dispatcher
        .handle(ProtocolContract::ChargedParticles, 1, HandleKind::Read, None)
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&read_a, &read_b));

    let write = dispatcher
        .handle(ProtocolContract::ChargedParticles, 1, HandleKind::Write, None)
        .await
        .unwrap();
    assert!(!Arc::ptr_eq(&read_a, &write));
    assert_eq!(write.kind(), HandleKind::Write);
    assert_eq!(write.address(), read_a.address());
}

#[tokio::test]
async fn cross_chain_reads_bind_each_chains_connection() {
    let nft = addr(0xaa);
    let token_id = U256::from(7u64);
    let uri_selector = selector(ProtocolContract::Erc721, "tokenURI");

    // The same bridged NFT address answers on both chains with distinct
    // metadata.
    let mocks = vec![
        MockConnection::new(1).respond(
            nft,
            uri_selector,
            DynSolValue::String("ipfs://proton/7-on-mainnet".into()),
        ),
        MockConnection::new(42).respond(
            nft,
            uri_selector,
            DynSolValue::String("ipfs://proton/7-on-kovan".into()),
        ),
    ];
    let charged = Charged::new(ChargedOptions {
        providers: Some(pool_of(mocks)),
        ..Default::default()
    })
    .unwrap();
    let handle = charged.nft(nft, token_id);

    // Prime the cache with mainnet's handle first; kovan's read must still
    // run on kovan's connection.
    assert_eq!(
        handle.token_uri(Some(1)).await.unwrap(),
        "ipfs://proton/7-on-mainnet"
    );

    let uris = handle.token_uri_all().await.unwrap();
    assert_eq!(uris.len(), 2);
    assert_eq!(
        uris.get(1).and_then(|o| o.value()).map(String::as_str),
        Some("ipfs://proton/7-on-mainnet")
    );
    assert_eq!(
        uris.get(42).and_then(|o| o.value()).map(String::as_str),
        Some("ipfs://proton/7-on-kovan")
    );
}

#[tokio::test]
async fn write_without_any_signer_fails() {
    let mocks = vec![MockConnection::new(1)];
    let charged = Charged::new(ChargedOptions {
        providers: Some(pool_of(mocks)),
        ..Default::default()
    })
    .unwrap();

    let result = charged
        .write_contract(
            ProtocolContract::Ionx,
            "transfer",
            Some(1),
            &[
                DynSolValue::Address(addr(0x33)),
                DynSolValue::Uint(U256::from(10u64), 256),
            ],
        )
        .await;
    assert!(matches!(result, Err(SdkError::NoSignerAvailable)));
}

#[tokio::test]
async fn externally_signing_connection_serves_writes_without_facade_signer() {
    let mock = MockConnection::new(1).signing();
    let sent = mock.sent.clone();
    let charged = Charged::new(ChargedOptions {
        providers: Some(ProviderSetup::Connection(Arc::new(mock))),
        ..Default::default()
    })
    .unwrap();

    let pending = charged
        .write_contract(
            ProtocolContract::Ionx,
            "transfer",
            None,
            &[
                DynSolValue::Address(addr(0x33)),
                DynSolValue::Uint(U256::from(10u64), 256),
            ],
        )
        .await
        .unwrap();

    assert_eq!(pending.chain_id(), 1);
    let submitted = sent.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(
        submitted[0].0,
        ContractRegistry::default()
            .address(1, ProtocolContract::Ionx)
            .unwrap()
    );
}

#[tokio::test]
async fn replacing_the_signer_invalidates_write_handles_only() {
    let mocks = vec![MockConnection::new(1)];
    let charged = Charged::new(ChargedOptions {
        providers: Some(pool_of(mocks)),
        signer: Some(PrivateKeySigner::random()),
        ..Default::default()
    })
    .unwrap();
    let dispatcher = charged.dispatcher();

    let read_before = dispatcher
        .handle(ProtocolContract::Ionx, 1, HandleKind::Read, None)
        .await
        .unwrap();
    let write_before = dispatcher
        .handle(ProtocolContract::Ionx, 1, HandleKind::Write, None)
        .await
        .unwrap();

    charged.set_signer(PrivateKeySigner::random());

    let read_after = dispatcher
        .handle(ProtocolContract::Ionx, 1, HandleKind::Read, None)
        .await
        .unwrap();
    let write_after = dispatcher
        .handle(ProtocolContract::Ionx, 1, HandleKind::Write, None)
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&read_before, &read_after));
    assert!(!Arc::ptr_eq(&write_before, &write_after));
}

#[tokio::test]
async fn single_network_pool_needs_no_explicit_target() {
    let mocks = vec![MockConnection::new(137).respond(
        charged_particles_at(137),
        state_selector(),
        DynSolValue::Address(addr(0x44)),
    )];
    let charged = Charged::new(ChargedOptions {
        providers: Some(pool_of(mocks)),
        ..Default::default()
    })
    .unwrap();

    assert_eq!(charged.state_address(None).await.unwrap(), addr(0x44));
}

#[tokio::test]
async fn multi_network_pool_without_target_is_ambiguous() {
    let mocks = vec![MockConnection::new(1), MockConnection::new(137)];
    let charged = Charged::new(ChargedOptions {
        providers: Some(pool_of(mocks)),
        ..Default::default()
    })
    .unwrap();

    let result = charged.state_address(None).await;
    assert!(matches!(result, Err(SdkError::AmbiguousNetwork)));
}

#[tokio::test]
async fn explicit_target_outside_the_pool_is_not_configured() {
    let mocks = vec![MockConnection::new(1), MockConnection::new(42)];
    let charged = Charged::new(ChargedOptions {
        providers: Some(pool_of(mocks)),
        ..Default::default()
    })
    .unwrap();

    let result = charged.state_address(Some(137)).await;
    assert!(matches!(result, Err(SdkError::ChainNotConfigured(137))));

    // With the bridging guard on, the uncovered chain is still reported as
    // unconfigured, not as a bridging mismatch.
    let signer = PrivateKeySigner::random();
    let nft = addr(0x77);
    let charged = bridged_setup(&signer, nft);
    let result = charged
        .nft(nft, U256::from(3u64))
        .energize("aave", addr(0x88), U256::from(1_000u64), None, Some(137))
        .await;
    assert!(matches!(result, Err(SdkError::ChainNotConfigured(137))));
}

#[tokio::test]
async fn empty_pool_reports_no_network_configured() {
    let charged = Charged::new(ChargedOptions {
        providers: Some(ProviderSetup::Connections(Vec::new())),
        ..Default::default()
    })
    .unwrap();

    let result = charged.state_address(None).await;
    assert!(matches!(result, Err(SdkError::NoNetworkConfigured)));
}

#[tokio::test]
async fn external_connection_chain_id_is_discovered_once() {
    let mock = MockConnection::new(1).respond(
        charged_particles_at(1),
        state_selector(),
        DynSolValue::Address(addr(0x55)),
    );
    let queries = mock.chain_id_queries.clone();
    let charged = Charged::new(ChargedOptions {
        providers: Some(ProviderSetup::Connection(Arc::new(mock))),
        ..Default::default()
    })
    .unwrap();

    assert_eq!(charged.state_address(None).await.unwrap(), addr(0x55));
    assert_eq!(charged.state_address(None).await.unwrap(), addr(0x55));
    assert_eq!(queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn aggregated_read_keys_results_by_chain() {
    let mocks = vec![
        MockConnection::new(1).respond(
            charged_particles_at(1),
            state_selector(),
            DynSolValue::Address(addr(0x61)),
        ),
        MockConnection::new(42).respond(
            charged_particles_at(42),
            state_selector(),
            DynSolValue::Address(addr(0x62)),
        ),
    ];
    let charged = Charged::new(ChargedOptions {
        providers: Some(pool_of(mocks)),
        ..Default::default()
    })
    .unwrap();

    let aggregated = charged.state_address_all().await.unwrap();
    assert_eq!(aggregated.len(), 2);
    let on_mainnet = aggregated.get(1).and_then(|o| o.value()).copied().unwrap();
    let on_kovan = aggregated.get(42).and_then(|o| o.value()).copied().unwrap();
    assert_eq!(on_mainnet, addr(0x61));
    assert_eq!(on_kovan, addr(0x62));
    assert_ne!(on_mainnet, on_kovan);
}

/// Bridging guard scenario: the token lives on kovan only.
fn bridged_setup(signer: &PrivateKeySigner, nft: Address) -> Charged {
    let owner_selector = selector(ProtocolContract::Erc721, "ownerOf");
    let mocks = vec![
        // Mainnet: no code at the NFT address.
        MockConnection::new(1),
        MockConnection::new(42).respond(
            nft,
            owner_selector,
            DynSolValue::Address(signer.address()),
        ),
    ];
    Charged::new(ChargedOptions {
        providers: Some(pool_of(mocks)),
        signer: Some(signer.clone()),
        settings: Some(json!({"sdk": {"NftBridgeCheck": true}})),
    })
    .unwrap()
}

#[tokio::test]
async fn bridging_guard_rejects_a_mismatched_chain() {
    let signer = PrivateKeySigner::random();
    let nft = addr(0x77);
    let token_id = U256::from(3u64);
    let charged = bridged_setup(&signer, nft);

    let result = charged
        .nft(nft, token_id)
        .energize("aave", addr(0x88), U256::from(1_000u64), None, Some(1))
        .await;
    match result {
        Err(SdkError::SignerNetworkMismatch {
            signer_chain,
            token_chains,
        }) => {
            assert_eq!(signer_chain, 1);
            assert_eq!(token_chains, vec![42]);
        }
        other => panic!("expected SignerNetworkMismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn bridging_guard_allows_the_holding_chain() {
    let signer = PrivateKeySigner::random();
    let nft = addr(0x77);
    let token_id = U256::from(3u64);
    let charged = bridged_setup(&signer, nft);

    let pending = charged
        .nft(nft, token_id)
        .energize("aave", addr(0x88), U256::from(1_000u64), None, Some(42))
        .await
        .unwrap();
    assert_eq!(pending.chain_id(), 42);
}

#[tokio::test]
async fn disabled_guard_passes_writes_through_unfiltered() {
    let signer = PrivateKeySigner::random();
    let nft = addr(0x77);
    // Token exists nowhere; with the guard off (default) the write still
    // reaches the transport.
    let mocks = vec![MockConnection::new(1), MockConnection::new(42)];
    let charged = Charged::new(ChargedOptions {
        providers: Some(pool_of(mocks)),
        signer: Some(signer),
        ..Default::default()
    })
    .unwrap();

    let pending = charged
        .nft(nft, U256::from(3u64))
        .energize("aave", addr(0x88), U256::from(1_000u64), None, Some(1))
        .await
        .unwrap();
    assert_eq!(pending.chain_id(), 1);
}

#[tokio::test]
async fn malformed_argument_lists_fail_before_the_transport() {
    let mocks = vec![MockConnection::new(1)];
    let charged = Charged::new(ChargedOptions {
        providers: Some(pool_of(mocks)),
        ..Default::default()
    })
    .unwrap();

    // balanceOf(address) called with a uint.
    let result = charged
        .read_contract(
            ProtocolContract::Ionx,
            "balanceOf",
            Some(1),
            &[DynSolValue::Uint(U256::from(1u64), 256)],
        )
        .await;
    assert!(matches!(result, Err(SdkError::Abi(_))));
}

#[tokio::test]
async fn unknown_method_names_the_contract() {
    let mocks = vec![MockConnection::new(1)];
    let charged = Charged::new(ChargedOptions {
        providers: Some(pool_of(mocks)),
        ..Default::default()
    })
    .unwrap();

    let result = charged
        .read_contract(ProtocolContract::Ionx, "ownerOf", Some(1), &[])
        .await;
    match result {
        Err(SdkError::UnknownMethod { contract, method }) => {
            assert_eq!(contract, "ionx");
            assert_eq!(method, "ownerOf");
        }
        other => panic!("expected UnknownMethod, got {other:?}"),
    }
}

#[tokio::test]
async fn unrecognized_settings_key_fails_construction() {
    let result = Charged::new(ChargedOptions {
        providers: Some(pool_of(vec![MockConnection::new(1)])),
        settings: Some(json!({"contractCallOverides": {}})),
        ..Default::default()
    });
    match result {
        Err(SdkError::InvalidConfig(message)) => {
            assert!(message.contains("contractCallOverides"))
        }
        other => panic!("expected InvalidConfig, got {:?}", other.map(|_| ())),
    }
}
