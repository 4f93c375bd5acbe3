//! NUT-06: Mint Information
//!
//! <https://github.com/cashubtc/nuts/blob/main/06.md>

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::nut00::{CurrencyUnit, PaymentMethod};
use super::nut01::PublicKey;
use super::{nut04, nut05, nut15, nut17};

/// Mint Version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MintVersion {
    /// Mint implementation name
    pub name: String,
    /// Mint version
    pub version: String,
}

impl Serialize for MintVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let combined = format!("{}/{}", self.name, self.version);
        serializer.serialize_str(&combined)
    }
}

impl<'de> Deserialize<'de> for MintVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let combined = String::deserialize(deserializer)?;
        let parts: Vec<&str> = combined.split('/').collect();
        if parts.len() != 2 {
            return Err(serde::de::Error::custom("Invalid version string"));
        }
        Ok(MintVersion {
            name: parts[0].to_string(),
            version: parts[1].to_string(),
        })
    }
}

/// Mint Info [NUT-06]
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintInfo {
    /// name of the mint and should be recognizable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// hex pubkey of the mint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<PublicKey>,
    /// implementation name and the version running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<MintVersion>,
    /// short description of the mint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// long description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_long: Option<String>,
    /// shows which NUTs the mint supports
    #[serde(default)]
    pub nuts: Nuts,
    /// message of the day that the wallet must display to the user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motd: Option<String>,
}

impl MintInfo {
    /// Whether the mint advertises NUT-15 MPP for `(method, unit)`
    pub fn supports_mpp(&self, method: &PaymentMethod, unit: &CurrencyUnit) -> bool {
        self.nuts
            .nut15
            .methods
            .iter()
            .any(|m| &m.method == method && &m.unit == unit)
    }

    /// Whether the mint advertises the NUT-17 websocket `command` for
    /// `(method, unit)`
    pub fn supports_ws_command(
        &self,
        method: &PaymentMethod,
        unit: &CurrencyUnit,
        command: &str,
    ) -> bool {
        self.nuts.nut17.supported.iter().any(|m| {
            &m.method == method && &m.unit == unit && m.commands.iter().any(|c| c == command)
        })
    }
}

/// Supported nuts and settings
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nuts {
    /// NUT04 Settings
    #[serde(default)]
    #[serde(rename = "4")]
    pub nut04: nut04::Settings,
    /// NUT05 Settings
    #[serde(default)]
    #[serde(rename = "5")]
    pub nut05: nut05::Settings,
    /// NUT07 Settings
    #[serde(default)]
    #[serde(rename = "7")]
    pub nut07: SupportedSettings,
    /// NUT08 Settings
    #[serde(default)]
    #[serde(rename = "8")]
    pub nut08: SupportedSettings,
    /// NUT09 Settings
    #[serde(default)]
    #[serde(rename = "9")]
    pub nut09: SupportedSettings,
    /// NUT12 Settings
    #[serde(default)]
    #[serde(rename = "12")]
    pub nut12: SupportedSettings,
    /// NUT15 Settings
    #[serde(default)]
    #[serde(rename = "15")]
    pub nut15: nut15::Settings,
    /// NUT17 Settings
    #[serde(default)]
    #[serde(rename = "17")]
    pub nut17: nut17::SupportedSettings,
}

/// Boolean supported setting
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SupportedSettings {
    /// Supported
    #[serde(default)]
    pub supported: bool,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_deserialize_mint_info() {
        let mint_info_str = r#"{
  "name": "Bob's Cashu mint",
  "pubkey": "0283bf290884eed3a7ca2663fc0260de2e2064d6b355ea13f98dec004b7a7ead99",
  "version": "Nutshell/0.15.0",
  "description": "The short mint description",
  "nuts": {
    "4": {
      "methods": [{"method": "bolt11", "unit": "sat", "min_amount": 0, "max_amount": 10000}],
      "disabled": false
    },
    "5": {
      "methods": [{"method": "bolt11", "unit": "sat", "min_amount": 0, "max_amount": 10000}],
      "disabled": false
    },
    "7": {"supported": true},
    "15": {"methods": [{"method": "bolt11", "unit": "sat"}]},
    "17": {"supported": [{"method": "bolt11", "unit": "sat", "commands": ["bolt11_mint_quote", "proof_state"]}]}
  }
}"#;
        let info: MintInfo = serde_json::from_str(mint_info_str).unwrap();

        assert_eq!(info.version.as_ref().unwrap().name, "Nutshell");
        assert!(info.supports_mpp(&PaymentMethod::Bolt11, &CurrencyUnit::Sat));
        assert!(!info.supports_mpp(&PaymentMethod::Bolt11, &CurrencyUnit::Usd));
        assert!(info.supports_ws_command(
            &PaymentMethod::Bolt11,
            &CurrencyUnit::Sat,
            "proof_state"
        ));
        assert!(!info.supports_ws_command(
            &PaymentMethod::Bolt11,
            &CurrencyUnit::Sat,
            "bolt11_melt_quote"
        ));
        assert!(!info.supports_ws_command(
            &PaymentMethod::from_str("bolt12").unwrap(),
            &CurrencyUnit::Sat,
            "proof_state"
        ));
    }
}
