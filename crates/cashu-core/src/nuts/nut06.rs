//! NUT-06: Mint information
//!
//! <https://github.com/cashubtc/nuts/blob/main/06.md>

use serde::{Deserialize, Serialize};

use super::nut01::PublicKey;

/// Mint info [NUT-06]
///
/// Everything here is advisory; the wallet only stores it for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintInfo {
    /// Mint name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Mint public key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<PublicKey>,
    /// Implementation version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Short description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Long description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_long: Option<String>,
    /// Message of the day
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motd: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_info_tolerates_unknown_fields() {
        let json = r#"{"name":"test mint","version":"Nutshell/0.16.0","nuts":{"4":{"disabled":false}}}"#;
        let info: MintInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.name.as_deref(), Some("test mint"));
        assert!(info.pubkey.is_none());
    }
}
