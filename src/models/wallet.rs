use std::fmt;

use serde::{Deserialize, Serialize};

const ADDRESS_HEX_LEN: usize = 40;
const INVITE_PREFIX: &str = "/invite/";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid wallet address: {0:?}")]
pub struct InvalidWalletAddress(pub String);

/// Lowercase `0x` + 40 hex EVM address. Construction is the only place
/// normalization happens, so every stored or compared address goes through it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn parse(raw: &str) -> Result<Self, InvalidWalletAddress> {
        let normalized = raw.trim().to_ascii_lowercase();

        let hex = match normalized.strip_prefix("0x") {
            Some(hex) => hex,
            None => return Err(InvalidWalletAddress(raw.to_string())),
        };

        if hex.len() != ADDRESS_HEX_LEN || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidWalletAddress(raw.to_string()));
        }

        Ok(WalletAddress(normalized))
    }

    /// Extracts the inviter address from an invite link. Accepts the bare path
    /// (`/invite/0x...`) or a full URL ending in it; query strings and
    /// fragments are ignored.
    pub fn from_invite_path(path: &str) -> Result<Self, InvalidWalletAddress> {
        let path = path.split(['?', '#']).next().unwrap_or_default();

        match path.rfind(INVITE_PREFIX) {
            Some(idx) => {
                let tail = &path[idx + INVITE_PREFIX.len()..];
                WalletAddress::parse(tail.trim_end_matches('/'))
            }
            None => Err(InvalidWalletAddress(path.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = InvalidWalletAddress;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        WalletAddress::parse(&value)
    }
}

impl From<WalletAddress> for String {
    fn from(value: WalletAddress) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x52908400098527886e0f7030069857d2e4169ee7";

    #[test]
    fn test_parse_lowercases_and_trims() {
        let wallet = WalletAddress::parse("  0X52908400098527886E0F7030069857D2E4169EE7 ").unwrap();
        assert_eq!(wallet.as_str(), ADDR);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(WalletAddress::parse("0xZZZZ").is_err());
        assert!(WalletAddress::parse("52908400098527886e0f7030069857d2e4169ee7").is_err());
        assert!(WalletAddress::parse("0x52908400098527886e0f7030069857d2e4169ee").is_err());
        assert!(WalletAddress::parse("0x52908400098527886e0f7030069857d2e4169ee7a").is_err());
        assert!(WalletAddress::parse("0x52908400098527886e0f7030069857d2e4169eeg").is_err());
        assert!(WalletAddress::parse("").is_err());
    }

    #[test]
    fn test_invite_path() {
        let wallet = WalletAddress::from_invite_path(&format!("/invite/{}", ADDR)).unwrap();
        assert_eq!(wallet.as_str(), ADDR);

        let from_url = WalletAddress::from_invite_path(&format!(
            "https://app.example.com/invite/{}/?utm=x",
            ADDR.to_uppercase().replace("0X", "0x")
        ))
        .unwrap();
        assert_eq!(from_url, wallet);

        assert!(WalletAddress::from_invite_path("/profile/0xabc").is_err());
        assert!(WalletAddress::from_invite_path("/invite/").is_err());
    }

    #[test]
    fn test_serde_validates() {
        let wallet: WalletAddress = serde_json::from_str(&format!("\"{}\"", ADDR)).unwrap();
        assert_eq!(wallet.as_str(), ADDR);
        assert!(serde_json::from_str::<WalletAddress>("\"0xZZZZ\"").is_err());
    }
}
