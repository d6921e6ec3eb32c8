//! Facade configuration.
//!
//! The settings blob mirrors the shape the protocol's JS tooling uses
//! (`{sdk: {NftBridgeCheck}, contractCallOverrides: {...}}`). Every level
//! rejects unknown keys, so a misspelled option fails construction with the
//! offending key named instead of being silently ignored.

use serde::Deserialize;

use crate::connection::CallOverrides;
use crate::dispatch::DispatchSettings;
use crate::error::{Result, SdkError};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SdkSettings {
    #[serde(default)]
    pub sdk: SdkFlags,
    #[serde(default)]
    pub contract_call_overrides: CallOverrides,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SdkFlags {
    /// Enables the pre-write bridging guard (one RPC round trip per
    /// candidate network). Off by default.
    #[serde(rename = "NftBridgeCheck", default)]
    pub nft_bridge_check: bool,
}

impl SdkSettings {
    /// Parse a settings blob, rejecting unrecognized keys at any level.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| SdkError::InvalidConfig(e.to_string()))
    }

    pub(crate) fn into_dispatch_settings(self) -> DispatchSettings {
        DispatchSettings {
            nft_bridge_check: self.sdk.nft_bridge_check,
            call_overrides: self.contract_call_overrides,
        }
    }
}
