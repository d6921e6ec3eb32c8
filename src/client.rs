//! The `Charged` facade and per-token handles.
//!
//! Applications instantiate one [`Charged`] per configuration; each instance
//! owns its own connection pool, signer cell and handle cache — there is no
//! process-wide state. [`Charged::nft`] returns a thin per-(contract
//! address, token id) view whose methods dispatch the protocol's contract
//! calls through the shared [`Dispatcher`].

use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;

use crate::config::SdkSettings;
use crate::connection::PendingWrite;
use crate::dispatch::{decode, AggregatedResult, Dispatcher};
use crate::error::Result;
use crate::network::ChainId;
use crate::pool::{ConnectionPool, ProviderSetup};
use crate::registry::{ContractRegistry, ProtocolContract};

/// Constructor options for [`Charged`].
///
/// The struct is closed: unknown typed options are unrepresentable, and the
/// stringly `settings` blob rejects unrecognized keys by name.
#[derive(Default)]
pub struct ChargedOptions {
    /// Network connections; absent falls back to public default endpoints
    /// for the well-known networks.
    pub providers: Option<ProviderSetup>,
    /// Transaction signer for write operations.
    pub signer: Option<PrivateKeySigner>,
    /// `{sdk: {NftBridgeCheck}, contractCallOverrides: {...}}`.
    pub settings: Option<serde_json::Value>,
}

/// Top-level client for the Charged Particles protocol.
pub struct Charged {
    dispatcher: Arc<Dispatcher>,
}

impl Charged {
    /// Build a facade from options. Fails on unresolvable networks, bad
    /// service descriptors, or unrecognized settings keys.
    pub fn new(options: ChargedOptions) -> Result<Self> {
        let settings = match options.settings {
            Some(value) => SdkSettings::from_value(value)?,
            None => SdkSettings::default(),
        };
        let pool = ConnectionPool::new(options.providers)?;
        let dispatcher = Dispatcher::new(
            pool,
            ContractRegistry::default(),
            options.signer,
            settings.into_dispatch_settings(),
        );
        Ok(Self {
            dispatcher: Arc::new(dispatcher),
        })
    }

    /// Replace the signer. Cached write handles are invalidated; read
    /// handles are untouched.
    pub fn set_signer(&self, signer: PrivateKeySigner) {
        self.dispatcher.set_signer(Some(signer));
    }

    pub fn clear_signer(&self) {
        self.dispatcher.set_signer(None);
    }

    /// Per-token view on an NFT contract.
    pub fn nft(&self, address: Address, token_id: U256) -> NftHandle {
        NftHandle {
            dispatcher: self.dispatcher.clone(),
            address,
            token_id,
        }
    }

    /// The dispatcher behind this facade, for generic contract access.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Generic single-network read.
    pub async fn read_contract(
        &self,
        contract: ProtocolContract,
        method: &str,
        chain: Option<ChainId>,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>> {
        self.dispatcher
            .read_contract(contract, method, chain, args, None, None)
            .await
    }

    /// Generic single-network write.
    pub async fn write_contract(
        &self,
        contract: ProtocolContract,
        method: &str,
        chain: Option<ChainId>,
        args: &[DynSolValue],
    ) -> Result<PendingWrite> {
        self.dispatcher
            .write_contract(contract, method, chain, args, None, None)
            .await
    }

    /// Generic multi-network read, settled-all.
    pub async fn fetch_all_networks(
        &self,
        contract: ProtocolContract,
        method: &str,
        args: &[DynSolValue],
    ) -> Result<AggregatedResult<Vec<DynSolValue>>> {
        self.dispatcher
            .fetch_all_networks(contract, method, args, None, None)
            .await
    }

    async fn charged_particles_address_getter(
        &self,
        method: &str,
        chain: Option<ChainId>,
    ) -> Result<Address> {
        let values = self
            .read_contract(ProtocolContract::ChargedParticles, method, chain, &[])
            .await?;
        decode::address(&values)
    }

    async fn charged_particles_address_getter_all(
        &self,
        method: &str,
    ) -> Result<AggregatedResult<Address>> {
        let aggregated = self
            .fetch_all_networks(ProtocolContract::ChargedParticles, method, &[])
            .await?;
        Ok(aggregated.try_map(|values| decode::address(&values)))
    }

    /// ChargedState address as deployed on one network.
    pub async fn state_address(&self, chain: Option<ChainId>) -> Result<Address> {
        self.charged_particles_address_getter("getStateAddress", chain).await
    }

    /// ChargedState address on every configured network.
    pub async fn state_address_all(&self) -> Result<AggregatedResult<Address>> {
        self.charged_particles_address_getter_all("getStateAddress").await
    }

    pub async fn settings_address(&self, chain: Option<ChainId>) -> Result<Address> {
        self.charged_particles_address_getter("getSettingsAddress", chain).await
    }

    pub async fn settings_address_all(&self) -> Result<AggregatedResult<Address>> {
        self.charged_particles_address_getter_all("getSettingsAddress").await
    }

    pub async fn managers_address(&self, chain: Option<ChainId>) -> Result<Address> {
        self.charged_particles_address_getter("getManagersAddress", chain).await
    }

    pub async fn managers_address_all(&self) -> Result<AggregatedResult<Address>> {
        self.charged_particles_address_getter_all("getManagersAddress").await
    }

    /// IONX balance of `holder` on one network.
    pub async fn ionx_balance(&self, holder: Address, chain: Option<ChainId>) -> Result<U256> {
        let values = self
            .read_contract(
                ProtocolContract::Ionx,
                "balanceOf",
                chain,
                &[DynSolValue::Address(holder)],
            )
            .await?;
        decode::uint(&values)
    }
}

/// A per-(contract address, token id) view of an NFT.
///
/// Read methods dispatch the protocol's particle queries; write methods run
/// the bridging guard (when enabled) before submitting.
#[derive(Clone)]
pub struct NftHandle {
    dispatcher: Arc<Dispatcher>,
    address: Address,
    token_id: U256,
}

impl NftHandle {
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn token_id(&self) -> U256 {
        self.token_id
    }

    /// Chains on which this token exists (code deployed and `ownerOf`
    /// answering).
    pub async fn chains(&self) -> Result<Vec<ChainId>> {
        self.dispatcher
            .token_chains(self.address, self.token_id, None)
            .await
    }

    /// Current owner on one network.
    pub async fn owner_of(&self, chain: Option<ChainId>) -> Result<Address> {
        let values = self
            .dispatcher
            .read_contract(
                ProtocolContract::Erc721,
                "ownerOf",
                chain,
                &[DynSolValue::Uint(self.token_id, 256)],
                Some(self.address),
                None,
            )
            .await?;
        decode::address(&values)
    }

    /// Metadata URI on one network.
    pub async fn token_uri(&self, chain: Option<ChainId>) -> Result<String> {
        let values = self
            .dispatcher
            .read_contract(
                ProtocolContract::Erc721,
                "tokenURI",
                chain,
                &[DynSolValue::Uint(self.token_id, 256)],
                Some(self.address),
                None,
            )
            .await?;
        decode::string(&values)
    }

    /// Metadata URI on every network where this contract is deployed.
    pub async fn token_uri_all(&self) -> Result<AggregatedResult<String>> {
        let aggregated = self
            .dispatcher
            .fetch_all_networks(
                ProtocolContract::Erc721,
                "tokenURI",
                &[DynSolValue::Uint(self.token_id, 256)],
                Some(self.address),
                None,
            )
            .await?;
        Ok(aggregated.try_map(|values| decode::string(&values)))
    }

    async fn particle_uint_query(
        &self,
        method: &str,
        wallet_manager_id: &str,
        asset_token: Address,
        chain: Option<ChainId>,
    ) -> Result<U256> {
        let values = self
            .dispatcher
            .read_contract(
                ProtocolContract::ChargedParticles,
                method,
                chain,
                &[
                    DynSolValue::Address(self.address),
                    DynSolValue::Uint(self.token_id, 256),
                    DynSolValue::String(wallet_manager_id.to_owned()),
                    DynSolValue::Address(asset_token),
                ],
                None,
                None,
            )
            .await?;
        decode::uint(&values)
    }

    /// Principal amount of `asset_token` held by the particle.
    pub async fn mass(
        &self,
        wallet_manager_id: &str,
        asset_token: Address,
        chain: Option<ChainId>,
    ) -> Result<U256> {
        self.particle_uint_query("baseParticleMass", wallet_manager_id, asset_token, chain)
            .await
    }

    /// Interest accrued on top of the principal.
    pub async fn charge(
        &self,
        wallet_manager_id: &str,
        asset_token: Address,
        chain: Option<ChainId>,
    ) -> Result<U256> {
        self.particle_uint_query("currentParticleCharge", wallet_manager_id, asset_token, chain)
            .await
    }

    /// Portion of the charge flowing to the creator annuity.
    pub async fn kinetics(
        &self,
        wallet_manager_id: &str,
        asset_token: Address,
        chain: Option<ChainId>,
    ) -> Result<U256> {
        self.particle_uint_query("currentParticleKinetics", wallet_manager_id, asset_token, chain)
            .await
    }

    /// Number of NFTs covalently bonded into this token's basket.
    pub async fn bonds(&self, basket_manager_id: &str, chain: Option<ChainId>) -> Result<U256> {
        let values = self
            .dispatcher
            .read_contract(
                ProtocolContract::ChargedParticles,
                "currentParticleCovalentBonds",
                chain,
                &[
                    DynSolValue::Address(self.address),
                    DynSolValue::Uint(self.token_id, 256),
                    DynSolValue::String(basket_manager_id.to_owned()),
                ],
                None,
                None,
            )
            .await?;
        decode::uint(&values)
    }

    async fn guarded_write(
        &self,
        method: &str,
        chain: Option<ChainId>,
        args: Vec<DynSolValue>,
    ) -> Result<PendingWrite> {
        let chain_id = self.dispatcher.resolve_target(chain).await?;
        self.dispatcher
            .assert_token_on_chain(self.address, self.token_id, chain_id)
            .await?;
        self.dispatcher
            .write_contract(
                ProtocolContract::ChargedParticles,
                method,
                Some(chain_id),
                &args,
                None,
                None,
            )
            .await
    }

    /// Deposit `asset_amount` of `asset_token` into the particle.
    pub async fn energize(
        &self,
        wallet_manager_id: &str,
        asset_token: Address,
        asset_amount: U256,
        referrer: Option<Address>,
        chain: Option<ChainId>,
    ) -> Result<PendingWrite> {
        self.guarded_write(
            "energizeParticle",
            chain,
            vec![
                DynSolValue::Address(self.address),
                DynSolValue::Uint(self.token_id, 256),
                DynSolValue::String(wallet_manager_id.to_owned()),
                DynSolValue::Address(asset_token),
                DynSolValue::Uint(asset_amount, 256),
                DynSolValue::Address(referrer.unwrap_or(Address::ZERO)),
            ],
        )
        .await
    }

    /// Withdraw accrued interest to `receiver`.
    pub async fn discharge(
        &self,
        receiver: Address,
        wallet_manager_id: &str,
        asset_token: Address,
        chain: Option<ChainId>,
    ) -> Result<PendingWrite> {
        self.guarded_write(
            "dischargeParticle",
            chain,
            vec![
                DynSolValue::Address(receiver),
                DynSolValue::Address(self.address),
                DynSolValue::Uint(self.token_id, 256),
                DynSolValue::String(wallet_manager_id.to_owned()),
                DynSolValue::Address(asset_token),
            ],
        )
        .await
    }

    /// Withdraw principal plus interest to `receiver`.
    pub async fn release(
        &self,
        receiver: Address,
        wallet_manager_id: &str,
        asset_token: Address,
        chain: Option<ChainId>,
    ) -> Result<PendingWrite> {
        self.guarded_write(
            "releaseParticle",
            chain,
            vec![
                DynSolValue::Address(receiver),
                DynSolValue::Address(self.address),
                DynSolValue::Uint(self.token_id, 256),
                DynSolValue::String(wallet_manager_id.to_owned()),
                DynSolValue::Address(asset_token),
            ],
        )
        .await
    }

    /// Covalently bond another NFT into this token's basket.
    pub async fn bond(
        &self,
        basket_manager_id: &str,
        nft_token_address: Address,
        nft_token_id: U256,
        nft_token_amount: U256,
        chain: Option<ChainId>,
    ) -> Result<PendingWrite> {
        self.guarded_write(
            "covalentBond",
            chain,
            vec![
                DynSolValue::Address(self.address),
                DynSolValue::Uint(self.token_id, 256),
                DynSolValue::String(basket_manager_id.to_owned()),
                DynSolValue::Address(nft_token_address),
                DynSolValue::Uint(nft_token_id, 256),
                DynSolValue::Uint(nft_token_amount, 256),
            ],
        )
        .await
    }

    /// Break a covalent bond, sending the nested NFT to `receiver`.
    pub async fn break_bond(
        &self,
        receiver: Address,
        basket_manager_id: &str,
        nft_token_address: Address,
        nft_token_id: U256,
        nft_token_amount: U256,
        chain: Option<ChainId>,
    ) -> Result<PendingWrite> {
        self.guarded_write(
            "breakCovalentBond",
            chain,
            vec![
                DynSolValue::Address(receiver),
                DynSolValue::Address(self.address),
                DynSolValue::Uint(self.token_id, 256),
                DynSolValue::String(basket_manager_id.to_owned()),
                DynSolValue::Address(nft_token_address),
                DynSolValue::Uint(nft_token_id, 256),
                DynSolValue::Uint(nft_token_amount, 256),
            ],
        )
        .await
    }
}
