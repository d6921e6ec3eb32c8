//! Static registry of the protocol's deployed contracts.
//!
//! Logical contract names form a closed enum, so adding a contract is a
//! data change (extend the enum plus the tables below), and an exhaustive
//! `match` catches anything the tables miss at compile time. Addresses are
//! keyed by `(chain id, contract)`; ABIs are parsed once from
//! human-readable signature tables.

use std::collections::HashMap;
use std::sync::LazyLock;

use alloy::json_abi::JsonAbi;
use alloy::primitives::{address, Address};

use crate::error::{Result, SdkError};
use crate::network::ChainId;

/// The protocol's logical contract names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolContract {
    /// Main protocol entry point: particle mass/charge queries, energize,
    /// discharge, release, covalent bonding.
    ChargedParticles,
    /// Per-token state: timelocks and approvals.
    ChargedState,
    /// Protocol settings: creator annuities and redirects.
    ChargedSettings,
    /// Wallet/basket manager toggles.
    ChargedManagers,
    /// The protocol's own NFT.
    Proton,
    /// The protocol's ERC20 governance token.
    Ionx,
    /// Generic ERC721 surface; never in the deployment table, always used
    /// with an explicit address.
    Erc721,
}

impl ProtocolContract {
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolContract::ChargedParticles => "chargedParticles",
            ProtocolContract::ChargedState => "chargedState",
            ProtocolContract::ChargedSettings => "chargedSettings",
            ProtocolContract::ChargedManagers => "chargedManagers",
            ProtocolContract::Proton => "proton",
            ProtocolContract::Ionx => "ionx",
            ProtocolContract::Erc721 => "erc721",
        }
    }

    /// String entry point for the closed set.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "chargedParticles" => Ok(ProtocolContract::ChargedParticles),
            "chargedState" => Ok(ProtocolContract::ChargedState),
            "chargedSettings" => Ok(ProtocolContract::ChargedSettings),
            "chargedManagers" => Ok(ProtocolContract::ChargedManagers),
            "proton" => Ok(ProtocolContract::Proton),
            "ionx" => Ok(ProtocolContract::Ionx),
            "erc721" => Ok(ProtocolContract::Erc721),
            other => Err(SdkError::UnknownContract(other.to_owned())),
        }
    }

    /// ABI descriptor for this contract, parsed once.
    pub fn abi(&self) -> &'static JsonAbi {
        match self {
            ProtocolContract::ChargedParticles => &CHARGED_PARTICLES_ABI,
            ProtocolContract::ChargedState => &CHARGED_STATE_ABI,
            ProtocolContract::ChargedSettings => &CHARGED_SETTINGS_ABI,
            ProtocolContract::ChargedManagers => &CHARGED_MANAGERS_ABI,
            ProtocolContract::Proton => &PROTON_ABI,
            ProtocolContract::Ionx => &IONX_ABI,
            ProtocolContract::Erc721 => &ERC721_ABI,
        }
    }
}

fn parse_abi(signatures: &[&str]) -> JsonAbi {
    JsonAbi::parse(signatures.iter().copied()).expect("static abi table parses")
}

static CHARGED_PARTICLES_ABI: LazyLock<JsonAbi> = LazyLock::new(|| {
    parse_abi(&[
        "function getStateAddress() view returns (address)",
        "function getSettingsAddress() view returns (address)",
        "function getManagersAddress() view returns (address)",
        "function baseParticleMass(address contractAddress, uint256 tokenId, string walletManagerId, address assetToken) returns (uint256)",
        "function currentParticleCharge(address contractAddress, uint256 tokenId, string walletManagerId, address assetToken) returns (uint256)",
        "function currentParticleKinetics(address contractAddress, uint256 tokenId, string walletManagerId, address assetToken) returns (uint256)",
        "function currentParticleCovalentBonds(address contractAddress, uint256 tokenId, string basketManagerId) view returns (uint256)",
        "function energizeParticle(address contractAddress, uint256 tokenId, string walletManagerId, address assetToken, uint256 assetAmount, address referrer) payable returns (uint256)",
        "function dischargeParticle(address receiver, address contractAddress, uint256 tokenId, string walletManagerId, address assetToken) returns (uint256, uint256)",
        "function releaseParticle(address receiver, address contractAddress, uint256 tokenId, string walletManagerId, address assetToken) returns (uint256, uint256)",
        "function covalentBond(address contractAddress, uint256 tokenId, string basketManagerId, address nftTokenAddress, uint256 nftTokenId, uint256 nftTokenAmount) returns (bool)",
        "function breakCovalentBond(address receiver, address contractAddress, uint256 tokenId, string basketManagerId, address nftTokenAddress, uint256 nftTokenId, uint256 nftTokenAmount) returns (bool)",
    ])
});

static CHARGED_STATE_ABI: LazyLock<JsonAbi> = LazyLock::new(|| {
    parse_abi(&[
        "function getDischargeTimelockExpiry(address contractAddress, uint256 tokenId) view returns (uint256)",
        "function getReleaseTimelockExpiry(address contractAddress, uint256 tokenId) view returns (uint256)",
        "function setDischargeTimelock(address contractAddress, uint256 tokenId, uint256 unlockBlock)",
        "function setReleaseTimelock(address contractAddress, uint256 tokenId, uint256 unlockBlock)",
    ])
});

static CHARGED_SETTINGS_ABI: LazyLock<JsonAbi> = LazyLock::new(|| {
    parse_abi(&[
        "function getCreatorAnnuities(address contractAddress, uint256 tokenId) returns (address, uint256)",
        "function getCreatorAnnuitiesRedirect(address contractAddress, uint256 tokenId) view returns (address)",
        "function setCreatorAnnuities(address contractAddress, uint256 tokenId, address creator, uint256 annuityPercent)",
        "function setCreatorAnnuitiesRedirect(address contractAddress, uint256 tokenId, address receiver)",
    ])
});

static CHARGED_MANAGERS_ABI: LazyLock<JsonAbi> = LazyLock::new(|| {
    parse_abi(&[
        "function isWalletManagerEnabled(string walletManagerId) view returns (bool)",
        "function isNftBasketEnabled(string basketId) view returns (bool)",
    ])
});

static PROTON_ABI: LazyLock<JsonAbi> = LazyLock::new(|| {
    parse_abi(&[
        "function createBasicProton(address creator, address receiver, string tokenMetaUri) returns (uint256)",
        "function ownerOf(uint256 tokenId) view returns (address)",
        "function tokenURI(uint256 tokenId) view returns (string)",
    ])
});

static IONX_ABI: LazyLock<JsonAbi> = LazyLock::new(|| {
    parse_abi(&[
        "function balanceOf(address account) view returns (uint256)",
        "function totalSupply() view returns (uint256)",
        "function transfer(address recipient, uint256 amount) returns (bool)",
        "function approve(address spender, uint256 amount) returns (bool)",
    ])
});

static ERC721_ABI: LazyLock<JsonAbi> = LazyLock::new(|| {
    parse_abi(&[
        "function ownerOf(uint256 tokenId) view returns (address)",
        "function tokenURI(uint256 tokenId) view returns (string)",
        "function balanceOf(address owner) view returns (uint256)",
        "function name() view returns (string)",
        "function symbol() view returns (string)",
        "function getApproved(uint256 tokenId) view returns (address)",
    ])
});

/// Address lookup for the protocol's deployments.
///
/// Pure data: no state beyond the table, no network access.
#[derive(Debug, Clone)]
pub struct ContractRegistry {
    deployments: HashMap<(ChainId, ProtocolContract), Address>,
}

impl Default for ContractRegistry {
    fn default() -> Self {
        use ProtocolContract::*;
        let deployments = HashMap::from([
            ((1, ChargedParticles), address!("0x5d183d790d6b570eaec299be432f0a13a00058a9")),
            ((42, ChargedParticles), address!("0xb1c517a95cc1363fcb1fca0656c4a62f4c2b94e4")),
            ((137, ChargedParticles), address!("0x0288520b37fb3cfa4812f8632091ecc47d7ea841")),
            ((80001, ChargedParticles), address!("0x51f845af34cbb7bacf23eeaf0ea7a737fbbdbba1")),
            ((1, ChargedState), address!("0x48974c6ae5ed3c4e06134dea66a89cf77430e160")),
            ((42, ChargedState), address!("0x121da37d04d1405d96cfea65f79eaa095f2013b8")),
            ((137, ChargedState), address!("0x581c57b86fc8c2d639f88276478324ce576c3459")),
            ((80001, ChargedState), address!("0x1ecd1b1b24dcc68cbdcc6e1cfd2cee8cef02aa7e")),
            ((1, ChargedSettings), address!("0x55b1b3bcbd9194e3a9cb0d9d101b7ba3d9217b42")),
            ((42, ChargedSettings), address!("0x66d7a983bcbdb3a7bd8581bbdd4b9a714e7990cf")),
            ((137, ChargedSettings), address!("0x7a30be8907dd2bc2b4a2ba6e4f4f526f197b3bd8")),
            ((80001, ChargedSettings), address!("0x8d53b7eb1e62ba5bbc2e5bd72c174fcd5b4e58c9")),
            ((1, ChargedManagers), address!("0x92e1f8361d817b0c88a38b9ccaed4cbd44a4e909")),
            ((42, ChargedManagers), address!("0xa360413fe6c4f06f7c21d0a28d1d99dbfe12d3a0")),
            ((137, ChargedManagers), address!("0xb50d1c6b90e1e4b13d8de32c7003a2f8b64c85b1")),
            ((80001, ChargedManagers), address!("0xc2f7f24b6e95525ff5a8e4c9a1a0a0f6f2a22dc2")),
            ((1, Proton), address!("0xd402e1bee1d8ba459d6d8c532a2ee7d4a1865bd3")),
            ((42, Proton), address!("0xe5d8c01c28874b01df6b48e0398c9a058f24ffe4")),
            ((137, Proton), address!("0xf61e02a97b4c5e09e2ee71b7f93e0c37a4a1f0f5")),
            ((80001, Proton), address!("0x07c49b0e094b9c12ef24c61e24dbb1e0e6a48106")),
            ((1, Ionx), address!("0x18a0cf41a170b4f2f2f8963f43bfd66e64c55a17")),
            ((42, Ionx), address!("0x29b3e851b185cc4e6dd7d6dd46e04c1e5e679228")),
            ((137, Ionx), address!("0x3ac675383c6ed99c382fcc1a1a55b15671138339")),
            ((80001, Ionx), address!("0x4bd84a6d1466abe891b614ed2cdbefa07e1e744a")),
        ]);
        Self { deployments }
    }
}

impl ContractRegistry {
    /// Override or extend the deployment table (useful for forks and local
    /// testnets).
    pub fn with_deployment(
        mut self,
        chain_id: ChainId,
        contract: ProtocolContract,
        address: Address,
    ) -> Self {
        self.deployments.insert((chain_id, contract), address);
        self
    }

    /// Deployed address of `contract` on `chain_id`.
    pub fn address(&self, chain_id: ChainId, contract: ProtocolContract) -> Result<Address> {
        self.deployments
            .get(&(chain_id, contract))
            .copied()
            .ok_or(SdkError::NotDeployed {
                contract: contract.name(),
                chain_id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_core_contract_is_deployed_on_every_supported_chain() {
        use ProtocolContract::*;
        let registry = ContractRegistry::default();
        for chain in crate::network::SUPPORTED_CHAINS {
            for contract in [ChargedParticles, ChargedState, ChargedSettings, ChargedManagers, Proton, Ionx] {
                registry.address(chain, contract).unwrap();
            }
        }
    }

    #[test]
    fn deployments_are_distinct_per_chain() {
        let registry = ContractRegistry::default();
        let mainnet = registry.address(1, ProtocolContract::ChargedParticles).unwrap();
        let kovan = registry.address(42, ProtocolContract::ChargedParticles).unwrap();
        assert_ne!(mainnet, kovan);
    }

    #[test]
    fn erc721_has_no_deployment_entry() {
        let registry = ContractRegistry::default();
        match registry.address(1, ProtocolContract::Erc721) {
            Err(SdkError::NotDeployed { contract, chain_id }) => {
                assert_eq!(contract, "erc721");
                assert_eq!(chain_id, 1);
            }
            other => panic!("expected NotDeployed, got {other:?}"),
        }
    }

    #[test]
    fn abi_tables_parse_and_expose_methods() {
        assert!(ProtocolContract::ChargedParticles.abi().function("getStateAddress").is_some());
        assert!(ProtocolContract::Erc721.abi().function("ownerOf").is_some());
        assert!(ProtocolContract::Ionx.abi().function("ownerOf").is_none());
    }

    #[test]
    fn contract_names_round_trip() {
        for contract in [
            ProtocolContract::ChargedParticles,
            ProtocolContract::Proton,
            ProtocolContract::Erc721,
        ] {
            assert_eq!(ProtocolContract::from_name(contract.name()).unwrap(), contract);
        }
        match ProtocolContract::from_name("flux") {
            Err(SdkError::UnknownContract(name)) => assert_eq!(name, "flux"),
            other => panic!("expected UnknownContract, got {other:?}"),
        }
    }
}
