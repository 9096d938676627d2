use serde::Deserialize;

use crate::models::wallet::WalletAddress;

/// Body of `POST /referrals/register`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub new_user_wallet: String,
    #[serde(default)]
    pub inviter_wallet: Option<String>,
    /// Invite link the user arrived through, e.g. `/invite/0x...`.
    #[serde(default)]
    pub invite_path: Option<String>,
}

impl RegisterRequest {
    /// The inviter hint to hand to the engine. An explicit `inviterWallet`
    /// wins over `invitePath`; an unparseable path is passed through as-is so
    /// the engine records it as an invalid hint.
    pub fn inviter_hint(&self) -> Option<String> {
        let explicit = self
            .inviter_wallet
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty());

        if let Some(wallet) = explicit {
            return Some(wallet.to_string());
        }

        self.invite_path
            .as_deref()
            .map(|path| match WalletAddress::from_invite_path(path) {
                Ok(wallet) => wallet.to_string(),
                Err(_) => path.to_string(),
            })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}
